use crate::consts::MAX_RESULT_LENGTH;
use crate::store::ObjectStore;
use serde::{Deserialize, Serialize};

/// One size-bounded page of object keys, as handed back to the invoking
/// workflow.
///
/// `token` is the cursor for resuming the listing; it is the empty string
/// once the listing is exhausted.  The serialized form of a page produced by
/// [`list_bounded`] never exceeds [`MAX_RESULT_LENGTH`] bytes.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub(crate) struct ListPage {
    pub(crate) keys: Vec<String>,
    #[serde(default)]
    pub(crate) token: String,
}

/// List one page of keys under `prefix`, shrinking the page size until the
/// serialized result fits the byte budget.
///
/// Each retry is a fresh listing call with the same `token` and `prefix` and
/// a page size of half the number of keys the previous call returned; the
/// oversized result is discarded, not filtered.  Degrading the page size all
/// the way to zero means no page can satisfy the budget and is fatal.
pub(crate) async fn list_bounded<S: ObjectStore>(
    store: &S,
    bucket: &str,
    prefix: &str,
    token: Option<&str>,
    max_keys: usize,
) -> anyhow::Result<ListPage> {
    let mut max_keys = max_keys;
    loop {
        tracing::info!(
            bucket = %bucket,
            prefix = %prefix,
            token = %token.unwrap_or_default(),
            max_keys,
            "Listing bucket contents",
        );
        let raw = store.list_page(bucket, prefix, token, max_keys).await?;
        tracing::info!(count = raw.keys.len(), "Got result keys");
        let page = ListPage {
            keys: raw.keys,
            token: raw.next_token.unwrap_or_default(),
        };
        let length = serde_json::to_string(&page)?.len();
        if length <= MAX_RESULT_LENGTH {
            return Ok(page);
        }
        tracing::warn!(
            length,
            budget = MAX_RESULT_LENGTH,
            "Result size exceeds budget",
        );
        // Ask for half the number of keys we actually got.
        max_keys = page.keys.len() / 2;
        if max_keys == 0 {
            anyhow::bail!(
                "downsized page size all the way to zero while listing bucket {bucket:?}; \
                 result cannot fit the size budget"
            );
        }
        tracing::info!(max_keys, "Trying again with a smaller page size");
    }
}
