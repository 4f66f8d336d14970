use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single document as transported between the cluster and a dump.
///
/// `fields` is never interpreted, only carried. `meta` holds the hit
/// metadata (`_index`, `_routing`, `_version`, ...) and is only captured
/// in [`FieldMode::Raw`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
            meta: None,
        }
    }

    /// Routing value recorded in raw mode, if the hit carried one
    pub fn routing(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|m| m.get("_routing"))
            .and_then(Value::as_str)
    }
}

/// What gets captured for each hit during a dump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldMode {
    /// Only the rendered `_source` document
    #[default]
    Source,
    /// `_source` plus the hit metadata
    Raw,
}
