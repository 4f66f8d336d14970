use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const MAPPING_FILE: &str = "mapping.json";
pub const DATA_DIR: &str = "data";

const BATCH_PREFIX: &str = "data_";
const BATCH_EXTENSION: &str = ".zip";

/// Paths inside a dump directory
#[derive(Debug, Clone)]
pub struct DumpLayout {
    root: PathBuf,
}

/// A batch file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub index: u64,
    pub path: PathBuf,
}

impl DumpLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.root.join(MAPPING_FILE)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn batch_path(&self, index: u64) -> PathBuf {
        self.data_dir()
            .join(format!("{}{}{}", BATCH_PREFIX, index, BATCH_EXTENSION))
    }

    /// Name of the JSON entry inside batch `index`
    pub fn batch_entry_name(index: u64) -> String {
        format!("{}{}.json", BATCH_PREFIX, index)
    }

    /// True if the root is missing or an empty directory
    pub fn is_vacant(&self) -> io::Result<bool> {
        match fs::read_dir(&self.root) {
            Ok(mut entries) => Ok(entries.next().is_none()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Batch files under `data/`, ascending by numeric suffix.
    /// Anything not named `data_<n>.zip` is skipped.
    pub fn list_batches(&self) -> io::Result<Vec<BatchFile>> {
        let mut batches = Vec::new();

        for entry in fs::read_dir(self.data_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let name = entry.file_name();
            match name.to_str().and_then(parse_batch_index) {
                Some(index) => batches.push(BatchFile {
                    index,
                    path: entry.path(),
                }),
                None => {
                    tracing::warn!(path = %entry.path().display(), "Ignoring unrecognized file in dump data directory");
                }
            }
        }

        batches.sort_by_key(|b| b.index);
        Ok(batches)
    }
}

fn parse_batch_index(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(BATCH_PREFIX)?
        .strip_suffix(BATCH_EXTENSION)?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
