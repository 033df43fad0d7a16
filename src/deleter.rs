use crate::consts::WORKERS;
use crate::pool::{run_pool, MultiError, Processor};
use crate::store::ObjectStore;

/// Pool worker that deletes destination keys whose source counterpart is
/// gone.
///
/// Only presence in the source bucket is ever inspected; content and
/// metadata are irrelevant here.
#[derive(Clone, Debug)]
pub(crate) struct OrphanDeleter<S> {
    store: S,
    source: String,
    destination: String,
}

impl<S: ObjectStore> OrphanDeleter<S> {
    async fn delete_if_orphaned(&self, key: &str) -> anyhow::Result<()> {
        if self.store.head_object(&self.source, key).await?.is_some() {
            tracing::info!(
                key = %key,
                source = %self.source,
                "Key is present in source bucket; nothing to do",
            );
        } else {
            tracing::info!(
                key = %key,
                source = %self.source,
                destination = %self.destination,
                "Key is not present in source bucket; deleting orphaned key",
            );
            self.store.delete_object(&self.destination, key).await?;
        }
        Ok(())
    }
}

impl<S: ObjectStore> Processor for OrphanDeleter<S> {
    type Item = String;

    async fn process(&self, key: String) -> anyhow::Result<()> {
        self.delete_if_orphaned(&key).await
    }
}

/// Delete each of `keys` from `destination` if it no longer exists in
/// `source`.
///
/// Idempotent: deleting a key that is already absent from the destination
/// is a successful no-op, so retrying a whole batch is always safe.
pub(crate) async fn delete_orphans<S: ObjectStore>(
    store: S,
    source: &str,
    destination: &str,
    keys: Vec<String>,
) -> Result<(), MultiError> {
    tracing::info!(
        count = keys.len(),
        source = %source,
        destination = %destination,
        "Deleting orphaned keys from destination bucket",
    );
    let deleter = OrphanDeleter {
        store,
        source: source.to_owned(),
        destination: destination.to_owned(),
    };
    run_pool(WORKERS, keys, &deleter).await
}
