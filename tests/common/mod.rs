#![allow(dead_code)]

use async_trait::async_trait;
use esdump::client::{BulkReport, ClientError, Page, Result, SearchDestination, SearchSource};
use esdump::{Document, FieldMode};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-process stand-in for a search cluster, with fault injection
#[derive(Default)]
pub struct MemoryCluster {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    indices: HashMap<String, MemoryIndex>,
    scrolls: HashMap<String, ScrollCursor>,
    next_scroll: u64,
    pages_served: usize,
    fail_after_pages: Option<usize>,
    omit_scroll_id: bool,
    rejected_ids: HashSet<String>,
    bulk_sizes: Vec<usize>,
    cleared_scrolls: Vec<String>,
    last_query: Option<Value>,
}

#[derive(Default)]
struct MemoryIndex {
    mapping: Value,
    docs: Vec<Document>,
}

struct ScrollCursor {
    docs: Vec<Document>,
    offset: usize,
    page_size: usize,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an index holding `count` documents with ids `doc-0..`
    pub fn seed(&self, index: &str, count: usize) {
        let docs = (0..count)
            .map(|i| {
                let mut fields = Map::new();
                fields.insert("n".to_string(), json!(i));
                fields.insert("title".to_string(), json!(format!("document {}", i)));
                let mut meta = Map::new();
                meta.insert("_index".to_string(), json!(index));
                meta.insert("_routing".to_string(), json!(format!("shard-{}", i % 3)));
                Document {
                    id: format!("doc-{}", i),
                    fields,
                    meta: Some(meta),
                }
            })
            .collect();

        let mapping = json!({
            "properties": {
                "n": {"type": "long"},
                "title": {"type": "text", "analyzer": "english"}
            }
        });

        self.inner
            .lock()
            .unwrap()
            .indices
            .insert(index.to_string(), MemoryIndex { mapping, docs });
    }

    /// Fail every scroll request after `pages` pages have been served
    pub fn fail_after_pages(&self, pages: usize) {
        self.inner.lock().unwrap().fail_after_pages = Some(pages);
    }

    /// Serve pages without a scroll id
    pub fn omit_scroll_id(&self) {
        self.inner.lock().unwrap().omit_scroll_id = true;
    }

    /// Make bulk writes report a failure for this document id
    pub fn reject_id(&self, id: &str) {
        self.inner.lock().unwrap().rejected_ids.insert(id.to_string());
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.inner.lock().unwrap().indices.contains_key(index)
    }

    pub fn mapping(&self, index: &str) -> Option<Value> {
        self.inner
            .lock()
            .unwrap()
            .indices
            .get(index)
            .map(|i| i.mapping.clone())
    }

    /// Documents of `index` keyed by id, without metadata
    pub fn documents(&self, index: &str) -> HashMap<String, Map<String, Value>> {
        self.inner
            .lock()
            .unwrap()
            .indices
            .get(index)
            .map(|i| {
                i.docs
                    .iter()
                    .map(|d| (d.id.clone(), d.fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn routing_of(&self, index: &str, id: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .indices
            .get(index)
            .and_then(|i| i.docs.iter().find(|d| d.id == id))
            .and_then(|d| d.routing().map(str::to_string))
    }

    pub fn bulk_sizes(&self) -> Vec<usize> {
        self.inner.lock().unwrap().bulk_sizes.clone()
    }

    pub fn cleared_scrolls(&self) -> Vec<String> {
        self.inner.lock().unwrap().cleared_scrolls.clone()
    }

    pub fn last_query(&self) -> Option<Value> {
        self.inner.lock().unwrap().last_query.clone()
    }
}

impl Inner {
    fn serve_page(&mut self, scroll_id: &str, mode: FieldMode) -> Result<Page> {
        if let Some(limit) = self.fail_after_pages {
            if self.pages_served >= limit {
                return Err(ClientError::Cluster {
                    status: 503,
                    message: "injected transport failure".to_string(),
                });
            }
        }
        self.pages_served += 1;

        let cursor = self
            .scrolls
            .get_mut(scroll_id)
            .ok_or_else(|| ClientError::Cluster {
                status: 404,
                message: format!("no scroll context {}", scroll_id),
            })?;

        let end = (cursor.offset + cursor.page_size).min(cursor.docs.len());
        let documents = cursor.docs[cursor.offset..end]
            .iter()
            .cloned()
            .map(|mut d| {
                if mode == FieldMode::Source {
                    d.meta = None;
                }
                d
            })
            .collect();
        cursor.offset = end;

        Ok(Page {
            scroll_id: (!self.omit_scroll_id).then(|| scroll_id.to_string()),
            documents,
        })
    }
}

#[async_trait]
impl SearchSource for MemoryCluster {
    async fn get_mapping(&self, index: &str) -> Result<Value> {
        let inner = self.inner.lock().unwrap();
        let idx = inner.indices.get(index).ok_or_else(|| ClientError::Cluster {
            status: 404,
            message: format!("no such index [{}]", index),
        })?;
        Ok(json!({ index: { "mappings": idx.mapping } }))
    }

    async fn open_scroll(
        &self,
        index: &str,
        query: &Value,
        page_size: usize,
        mode: FieldMode,
    ) -> Result<Page> {
        let mut inner = self.inner.lock().unwrap();
        inner.last_query = Some(query.clone());

        let docs = inner
            .indices
            .get(index)
            .map(|i| i.docs.clone())
            .ok_or_else(|| ClientError::Cluster {
                status: 404,
                message: format!("no such index [{}]", index),
            })?;

        let scroll_id = format!("scroll-{}", inner.next_scroll);
        inner.next_scroll += 1;
        inner.scrolls.insert(
            scroll_id.clone(),
            ScrollCursor {
                docs,
                offset: 0,
                page_size,
            },
        );

        inner.serve_page(&scroll_id, mode)
    }

    async fn next_page(&self, scroll_id: &str, mode: FieldMode) -> Result<Page> {
        self.inner.lock().unwrap().serve_page(scroll_id, mode)
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.scrolls.remove(scroll_id);
        inner.cleared_scrolls.push(scroll_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl SearchDestination for MemoryCluster {
    async fn create_index(&self, index: &str, mapping: &Value) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.indices.contains_key(index) {
            return Err(ClientError::IndexExists(index.to_string()));
        }
        inner.indices.insert(
            index.to_string(),
            MemoryIndex {
                mapping: mapping.clone(),
                docs: Vec::new(),
            },
        );
        Ok(())
    }

    async fn bulk_index(&self, index: &str, documents: &[Document]) -> Result<BulkReport> {
        let mut inner = self.inner.lock().unwrap();
        inner.bulk_sizes.push(documents.len());

        let rejected = inner.rejected_ids.clone();
        let idx = inner.indices.get_mut(index).ok_or_else(|| ClientError::Cluster {
            status: 404,
            message: format!("no such index [{}]", index),
        })?;

        let mut report = BulkReport::default();
        for doc in documents {
            if rejected.contains(&doc.id) {
                report.failed += 1;
                report
                    .first_error
                    .get_or_insert_with(|| format!("document {} rejected", doc.id));
                continue;
            }

            let stored = Document {
                id: doc.id.clone(),
                fields: doc.fields.clone(),
                meta: doc.routing().map(|r| {
                    let mut meta = Map::new();
                    meta.insert("_routing".to_string(), json!(r));
                    meta
                }),
            };
            match idx.docs.iter_mut().find(|d| d.id == doc.id) {
                Some(existing) => *existing = stored,
                None => idx.docs.push(stored),
            }
            report.succeeded += 1;
        }

        Ok(report)
    }
}
