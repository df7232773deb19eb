//! Item table entry and the metadata filter predicate.

use serde::{Deserialize, Serialize};

/// A single catalog entry: an opaque id, the text contributed for
/// embedding/fuzzy/keyword scoring, and an optional metadata payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Item {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A predicate over an item's metadata, applied before scoring. Implemented
/// for any `Fn(Option<&Value>) -> bool` closure so callers don't need to
/// define a struct for simple filters.
pub trait MetadataFilter {
    fn keep(&self, metadata: Option<&serde_json::Value>) -> bool;
}

impl<F> MetadataFilter for F
where
    F: Fn(Option<&serde_json::Value>) -> bool,
{
    fn keep(&self, metadata: Option<&serde_json::Value>) -> bool {
        self(metadata)
    }
}
