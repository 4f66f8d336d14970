pub mod writer;

use crate::batch::{BatchError, DumpLayout};
use crate::client::{ClientError, Page, SearchSource};
use crate::config::ScrollConfig;
use crate::document::FieldMode;
use crate::state::RunState;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub use writer::BatchWriter;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("destination '{}' is not empty (use overwrite to replace it)", .path.display())]
    DestinationExists { path: PathBuf },

    #[error("failed to read mapping of index '{index}': {source}")]
    Mapping {
        index: String,
        #[source]
        source: ClientError,
    },

    #[error("source read failed at page {page} after {batches_written} stored batches: {source}")]
    SourceRead {
        page: usize,
        batches_written: u64,
        #[source]
        source: ClientError,
    },

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to store batch {index}: {source}")]
    Batch {
        index: u64,
        #[source]
        source: BatchError,
    },

    #[error("failed to encode mapping: {0}")]
    Json(#[from] serde_json::Error),

    #[error("batch size must be greater than zero")]
    InvalidBatchSize,
}

/// Parameters of one dump run
#[derive(Debug, Clone)]
pub struct DumpRequest {
    pub index: String,
    /// Search body in the cluster's query DSL, sent as-is
    pub query: Value,
    pub destination: PathBuf,
    pub batch_size: usize,
    pub mode: FieldMode,
    pub overwrite: bool,
}

impl DumpRequest {
    pub fn match_all() -> Value {
        serde_json::json!({ "query": { "match_all": {} } })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpSummary {
    pub destination: PathBuf,
    pub documents: usize,
    pub batches: u64,
}

/// Reads matching documents from a cluster into a dump directory
pub struct Dumper {
    source: Arc<dyn SearchSource>,
    page_size: usize,
    state: RunState,
}

impl Dumper {
    pub fn new(source: Arc<dyn SearchSource>, scroll: &ScrollConfig) -> Self {
        Self {
            source,
            page_size: scroll.page_size.max(1),
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn dump(&mut self, request: &DumpRequest) -> Result<DumpSummary, DumpError> {
        self.state = RunState::Running;
        info!(
            index = %request.index,
            destination = %request.destination.display(),
            batch_size = request.batch_size,
            mode = ?request.mode,
            "Starting dump"
        );

        let result = self.run(request).await;
        self.state = RunState::finish(&result);

        match &result {
            Ok(summary) => info!(
                documents = summary.documents,
                batches = summary.batches,
                "Dump completed"
            ),
            Err(e) => tracing::error!(error = %e, "Dump failed"),
        }
        result
    }

    async fn run(&self, request: &DumpRequest) -> Result<DumpSummary, DumpError> {
        if request.batch_size == 0 {
            return Err(DumpError::InvalidBatchSize);
        }

        let layout = DumpLayout::new(&request.destination);
        let replace = check_destination(&layout, request.overwrite)?;

        let mapping = self
            .source
            .get_mapping(&request.index)
            .await
            .map_err(|source| DumpError::Mapping {
                index: request.index.clone(),
                source,
            })?;

        prepare_destination(&layout, replace)?;
        let mapping_path = layout.mapping_path();
        fs::write(&mapping_path, serde_json::to_vec(&mapping)?).map_err(|source| DumpError::Io {
            path: mapping_path.clone(),
            source,
        })?;
        info!(path = %mapping_path.display(), "Stored mapping");

        let mut writer = BatchWriter::new(layout, request.batch_size);
        let mut scroll_id = None;
        let result = self.scroll_into(request, &mut writer, &mut scroll_id).await;

        if let Some(id) = scroll_id {
            if let Err(e) = self.source.clear_scroll(&id).await {
                warn!(error = %e, "Failed to clear scroll context");
            }
        }
        result?;

        let (batches, documents) = writer.finish()?;
        Ok(DumpSummary {
            destination: request.destination.clone(),
            documents,
            batches,
        })
    }

    /// Fetch pages until an empty one, pushing every hit into `writer`.
    /// The latest scroll id is left in `scroll_id` so the caller can release it.
    async fn scroll_into(
        &self,
        request: &DumpRequest,
        writer: &mut BatchWriter,
        scroll_id: &mut Option<String>,
    ) -> Result<(), DumpError> {
        let mut page_index = 0;
        let mut page: Page = self
            .source
            .open_scroll(&request.index, &request.query, self.page_size, request.mode)
            .await
            .map_err(|source| DumpError::SourceRead {
                page: page_index,
                batches_written: 0,
                source,
            })?;

        loop {
            if page.scroll_id.is_some() {
                *scroll_id = page.scroll_id.take();
            }
            if page.documents.is_empty() {
                break;
            }

            let Some(id) = scroll_id.as_deref() else {
                return Err(DumpError::SourceRead {
                    page: page_index,
                    batches_written: writer.batches_written(),
                    source: ClientError::MalformedResponse(
                        "page without _scroll_id".to_string(),
                    ),
                });
            };

            tracing::debug!(page = page_index, hits = page.documents.len(), "Received page");
            for document in page.documents.drain(..) {
                writer.push(document)?;
            }
            page_index += 1;

            page = self
                .source
                .next_page(id, request.mode)
                .await
                .map_err(|source| DumpError::SourceRead {
                    page: page_index,
                    batches_written: writer.batches_written(),
                    source,
                })?;
        }

        Ok(())
    }
}

fn io_err(path: PathBuf) -> impl FnOnce(std::io::Error) -> DumpError {
    move |source| DumpError::Io { path, source }
}

/// Refuse a non-empty destination unless `overwrite` is set. Touches nothing;
/// returns whether an earlier dump has to be cleared.
fn check_destination(layout: &DumpLayout, overwrite: bool) -> Result<bool, DumpError> {
    if layout.is_vacant().map_err(io_err(layout.root().to_path_buf()))? {
        return Ok(false);
    }
    if !overwrite {
        return Err(DumpError::DestinationExists {
            path: layout.root().to_path_buf(),
        });
    }
    Ok(true)
}

/// Create the directory tree, clearing a previous dump first when `replace` is set
fn prepare_destination(layout: &DumpLayout, replace: bool) -> Result<(), DumpError> {
    let data_dir = layout.data_dir();

    if replace {
        warn!(path = %layout.root().display(), "Overwriting existing dump");
        let mapping_path = layout.mapping_path();
        if mapping_path.exists() {
            fs::remove_file(&mapping_path).map_err(io_err(mapping_path.clone()))?;
        }
        if data_dir.exists() {
            fs::remove_dir_all(&data_dir).map_err(io_err(data_dir.clone()))?;
        }
    }

    fs::create_dir_all(&data_dir).map_err(io_err(data_dir.clone()))?;
    Ok(())
}
