use crate::batch::{read_batch, BatchFile, DumpLayout};
use crate::client::{ClientError, SearchDestination};
use crate::state::RunState;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("invalid dump at '{}': {reason}", .path.display())]
    InvalidDump { path: PathBuf, reason: String },

    #[error("index '{index}' already exists")]
    CollectionExists { index: String },

    #[error("bulk write failed for batch {batch}: {succeeded} succeeded, {failed} failed: {reason}")]
    BulkWrite {
        batch: u64,
        succeeded: usize,
        failed: usize,
        reason: String,
    },

    #[error("cluster error: {0}")]
    Client(#[from] ClientError),

    #[error("batch size must be greater than zero")]
    InvalidBatchSize,
}

impl RestoreError {
    fn invalid(path: &Path, reason: impl ToString) -> Self {
        RestoreError::InvalidDump {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreSummary {
    pub index: String,
    pub documents: usize,
    pub batches: u64,
}

/// Replays a dump directory into a new index
pub struct Restorer {
    destination: Arc<dyn SearchDestination>,
    state: RunState,
}

impl Restorer {
    pub fn new(destination: Arc<dyn SearchDestination>) -> Self {
        Self {
            destination,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Restore the dump at `dump_path` into `index`.
    ///
    /// Each stored batch becomes one bulk request, or several of at most
    /// `batch_size_override` documents when an override is given.
    pub async fn restore(
        &mut self,
        dump_path: &Path,
        index: &str,
        batch_size_override: Option<usize>,
    ) -> Result<RestoreSummary, RestoreError> {
        self.state = RunState::Running;
        info!(dump = %dump_path.display(), index = %index, "Starting restore");

        let result = self.run(dump_path, index, batch_size_override).await;
        self.state = RunState::finish(&result);

        match &result {
            Ok(summary) => info!(
                index = %summary.index,
                documents = summary.documents,
                batches = summary.batches,
                "Restore completed"
            ),
            Err(e) => tracing::error!(error = %e, "Restore failed"),
        }
        result
    }

    async fn run(
        &self,
        dump_path: &Path,
        index: &str,
        batch_size_override: Option<usize>,
    ) -> Result<RestoreSummary, RestoreError> {
        if batch_size_override == Some(0) {
            return Err(RestoreError::InvalidBatchSize);
        }

        let layout = DumpLayout::new(dump_path);
        let mapping = read_mapping(&layout)?;
        let batches = list_batches(&layout)?;
        info!(batches = batches.len(), "Found batch files");

        self.destination
            .create_index(index, &mapping)
            .await
            .map_err(|e| match e {
                ClientError::IndexExists(index) => RestoreError::CollectionExists { index },
                other => RestoreError::Client(other),
            })?;
        info!(index = %index, "Created index");

        let mut documents = 0;
        for batch in &batches {
            documents += self.restore_batch(batch, index, batch_size_override).await?;
        }

        Ok(RestoreSummary {
            index: index.to_string(),
            documents,
            batches: batches.len() as u64,
        })
    }

    async fn restore_batch(
        &self,
        batch: &BatchFile,
        index: &str,
        batch_size_override: Option<usize>,
    ) -> Result<usize, RestoreError> {
        let docs = read_batch(&batch.path).map_err(|e| RestoreError::invalid(&batch.path, e))?;
        let chunk_size = batch_size_override.unwrap_or(docs.len()).max(1);

        let mut succeeded = 0;
        for chunk in docs.chunks(chunk_size) {
            let report = self
                .destination
                .bulk_index(index, chunk)
                .await
                .map_err(|e| RestoreError::BulkWrite {
                    batch: batch.index,
                    succeeded,
                    failed: docs.len() - succeeded,
                    reason: e.to_string(),
                })?;

            if !report.is_success() {
                // chunks after this one are never sent, so they count as failed too
                let succeeded = succeeded + report.succeeded;
                return Err(RestoreError::BulkWrite {
                    batch: batch.index,
                    succeeded,
                    failed: docs.len() - succeeded,
                    reason: report.first_error.unwrap_or_else(|| "unknown error".to_string()),
                });
            }
            succeeded += report.succeeded;
        }

        info!(
            batch = batch.index,
            documents = docs.len(),
            path = %batch.path.display(),
            "Restored batch"
        );
        Ok(docs.len())
    }
}

fn read_mapping(layout: &DumpLayout) -> Result<Value, RestoreError> {
    let path = layout.mapping_path();
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(RestoreError::invalid(&path, "missing mapping.json"));
        }
        Err(e) => return Err(RestoreError::invalid(&path, e)),
    };

    let mapping: Value = serde_json::from_str(&text)
        .map_err(|e| RestoreError::invalid(&path, format!("unparsable mapping: {}", e)))?;
    if !mapping.is_object() {
        return Err(RestoreError::invalid(&path, "mapping is not a JSON object"));
    }
    Ok(mapping)
}

fn list_batches(layout: &DumpLayout) -> Result<Vec<BatchFile>, RestoreError> {
    layout.list_batches().map_err(|e| {
        let data_dir = layout.data_dir();
        if e.kind() == io::ErrorKind::NotFound {
            RestoreError::invalid(&data_dir, "missing data directory")
        } else {
            RestoreError::invalid(&data_dir, e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_mapping_missing() {
        let dir = TempDir::new().unwrap();
        let layout = DumpLayout::new(dir.path());

        match read_mapping(&layout) {
            Err(RestoreError::InvalidDump { path, reason }) => {
                assert_eq!(path, layout.mapping_path());
                assert_eq!(reason, "missing mapping.json");
            }
            other => panic!("expected invalid dump, got {:?}", other),
        }
    }

    #[test]
    fn test_read_mapping_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let layout = DumpLayout::new(dir.path());
        fs::write(layout.mapping_path(), b"[1, 2]").unwrap();

        assert!(matches!(
            read_mapping(&layout),
            Err(RestoreError::InvalidDump { .. })
        ));
    }

    #[test]
    fn test_list_batches_requires_data_dir() {
        let dir = TempDir::new().unwrap();
        let layout = DumpLayout::new(dir.path());

        match list_batches(&layout) {
            Err(RestoreError::InvalidDump { path, .. }) => assert_eq!(path, layout.data_dir()),
            other => panic!("expected invalid dump, got {:?}", other),
        }
    }
}
