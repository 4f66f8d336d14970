use super::DumpError;
use crate::batch::{write_batch, DumpLayout};
use crate::document::Document;

/// Accumulates documents and flushes them as numbered batch files
pub struct BatchWriter {
    layout: DumpLayout,
    batch_size: usize,
    buffer: Vec<Document>,
    next_index: u64,
    documents_written: usize,
}

impl BatchWriter {
    pub fn new(layout: DumpLayout, batch_size: usize) -> Self {
        Self {
            layout,
            batch_size,
            buffer: Vec::with_capacity(batch_size.min(10_000)),
            next_index: 0,
            documents_written: 0,
        }
    }

    /// Buffer a document, flushing a batch once the buffer is full
    pub fn push(&mut self, document: Document) -> Result<(), DumpError> {
        self.buffer.push(document);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Number of batch files written so far
    pub fn batches_written(&self) -> u64 {
        self.next_index
    }

    pub fn documents_written(&self) -> usize {
        self.documents_written
    }

    /// Flush the partial buffer, if any. Returns `(batches, documents)`.
    pub fn finish(mut self) -> Result<(u64, usize), DumpError> {
        self.flush()?;
        Ok((self.next_index, self.documents_written))
    }

    fn flush(&mut self) -> Result<(), DumpError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let index = self.next_index;
        let path = self.layout.batch_path(index);
        write_batch(&path, &DumpLayout::batch_entry_name(index), &self.buffer)
            .map_err(|source| DumpError::Batch { index, source })?;

        tracing::info!(
            batch = index,
            documents = self.buffer.len(),
            path = %path.display(),
            "Stored batch"
        );

        self.documents_written += self.buffer.len();
        self.next_index += 1;
        self.buffer.clear();
        Ok(())
    }
}
