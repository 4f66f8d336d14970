pub mod elastic;

use crate::document::{Document, FieldMode};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use elastic::ElasticClient;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cluster returned error status {status}: {message}")]
    Cluster { status: u16, message: String },

    #[error("index already exists: {0}")]
    IndexExists(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// One page of a scroll. An empty `documents` list means the scroll is exhausted.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub scroll_id: Option<String>,
    pub documents: Vec<Document>,
}

/// Per-document outcome of a bulk write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub succeeded: usize,
    pub failed: usize,
    pub first_error: Option<String>,
}

impl BulkReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Read side of a cluster: mapping retrieval and scrolled search
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn get_mapping(&self, index: &str) -> Result<Value>;

    async fn open_scroll(
        &self,
        index: &str,
        query: &Value,
        page_size: usize,
        mode: FieldMode,
    ) -> Result<Page>;

    async fn next_page(&self, scroll_id: &str, mode: FieldMode) -> Result<Page>;

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()>;
}

/// Write side of a cluster: index creation and bulk indexing
#[async_trait]
pub trait SearchDestination: Send + Sync {
    /// Fails with [`ClientError::IndexExists`] if `index` is already present
    async fn create_index(&self, index: &str, mapping: &Value) -> Result<()>;

    async fn bulk_index(&self, index: &str, documents: &[Document]) -> Result<BulkReport>;
}
