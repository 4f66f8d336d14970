use crate::document::Document;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("batch archive has no entries: {0}")]
    MissingEntry(PathBuf),
}

pub type Result<T> = std::result::Result<T, BatchError>;

/// Write `documents` as a single-entry deflated zip at `path`.
///
/// The archive is assembled under a temporary name and renamed into place,
/// so `path` either holds a complete batch or does not exist.
pub fn write_batch(path: &Path, entry_name: &str, documents: &[Document]) -> Result<()> {
    let tmp_path = temp_path(path);

    let result = write_archive(&tmp_path, entry_name, documents);
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn write_archive(tmp_path: &Path, entry_name: &str, documents: &[Document]) -> Result<()> {
    let file = File::create(tmp_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(entry_name, options)?;
    {
        let mut writer = BufWriter::new(&mut zip);
        serde_json::to_writer(&mut writer, documents)?;
        writer.flush()?;
    }

    let file = zip.finish()?;
    file.sync_all()?;
    Ok(())
}

/// Read the document array stored in the first entry of a batch archive
pub fn read_batch(path: &Path) -> Result<Vec<Document>> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    if archive.len() == 0 {
        return Err(BatchError::MissingEntry(path.to_path_buf()));
    }

    let entry = archive.by_index(0)?;
    let documents = serde_json::from_reader(BufReader::new(entry))?;
    Ok(documents)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
