use crate::consts::DEFAULT_MAX_KEYS;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Input event for the list-bucket task.
///
/// `listBucket` names which event field holds the bucket to list, so the
/// same event can be routed at either its source or its destination bucket
/// by the invoking workflow.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListEvent {
    list_bucket: String,

    #[serde(default)]
    pub(crate) source_region: Option<String>,

    /// The previous page's result, carried forward for its token
    #[serde(default)]
    list_result: Option<PriorListResult>,

    #[serde(default)]
    max_keys: Option<usize>,

    #[serde(default)]
    prefix: Option<String>,

    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct PriorListResult {
    #[serde(default)]
    token: String,
}

impl ListEvent {
    /// The bucket the event selects via its `listBucket` field
    pub(crate) fn bucket(&self) -> Result<&str, EventError> {
        let value = self
            .fields
            .get(&self.list_bucket)
            .ok_or_else(|| EventError::NoBucketField {
                field: self.list_bucket.clone(),
            })?;
        value.as_str().ok_or_else(|| EventError::BucketNotAString {
            field: self.list_bucket.clone(),
        })
    }

    /// The continuation token to resume from, if the previous page left one
    pub(crate) fn token(&self) -> Option<&str> {
        self.list_result
            .as_ref()
            .map(|r| r.token.as_str())
            .filter(|t| !t.is_empty())
    }

    pub(crate) fn max_keys(&self) -> usize {
        self.max_keys.unwrap_or(DEFAULT_MAX_KEYS)
    }

    pub(crate) fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or_default()
    }
}

/// Input event shared by the copy-keys and delete-orphans tasks
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SyncEvent {
    pub(crate) source: String,

    #[serde(default)]
    pub(crate) source_region: Option<String>,

    pub(crate) destination: String,

    pub(crate) list_result: KeyBatch,
}

/// The key list handed over from a previous list-bucket invocation
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct KeyBatch {
    pub(crate) keys: Vec<String>,
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub(crate) enum EventError {
    #[error("event has no field {field:?} naming a bucket")]
    NoBucketField { field: String },

    #[error("event field {field:?} does not hold a bucket name")]
    BucketNotAString { field: String },
}

/// Merge a list of result objects into one, later members overriding
/// earlier ones on key collision.  Used to join parallel workflow branches
/// back into a single state.
pub(crate) fn merge_results(parts: Vec<Map<String, Value>>) -> Map<String, Value> {
    let mut merged = Map::new();
    for part in parts {
        merged.extend(part);
    }
    merged
}
