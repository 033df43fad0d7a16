use crate::consts::WORKERS;
use crate::pool::{run_pool, MultiError, Processor};
use crate::store::{ObjectDescriptor, ObjectStore};

/// What the copy engine decided to do for one key
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum SyncAction {
    /// Destination is already current; no side effect
    Skip,

    /// Write the destination as a redirect to the given target
    CopyRedirect(String),

    /// Server-side copy of content and metadata from source to destination
    CopyObject,
}

/// Decide what to do for a key given its source descriptor and, if the key
/// exists in the destination, its destination descriptor.
///
/// A source redirect takes precedence over everything else: redirect objects
/// are only ever compared by target, never by content or metadata.  For
/// ordinary objects, differing entity tags mean the content changed;
/// matching entity tags with differing metadata bags still force a copy so
/// that the copy refreshes the destination's metadata.
pub(crate) fn decide(
    source: &ObjectDescriptor,
    destination: Option<&ObjectDescriptor>,
) -> SyncAction {
    let Some(destination) = destination else {
        return match source.redirect_target {
            Some(ref target) => SyncAction::CopyRedirect(target.clone()),
            None => SyncAction::CopyObject,
        };
    };
    if let Some(ref target) = source.redirect_target {
        if destination.redirect_target.as_deref() != Some(target) {
            return SyncAction::CopyRedirect(target.clone());
        }
        return SyncAction::Skip;
    }
    if source.etag != destination.etag {
        return SyncAction::CopyObject;
    }
    if source.metadata != destination.metadata {
        return SyncAction::CopyObject;
    }
    SyncAction::Skip
}

/// Pool worker that makes the destination bucket consistent with the source
/// bucket for each key handed to it
#[derive(Clone, Debug)]
pub(crate) struct KeySynchronizer<S> {
    store: S,
    source: String,
    destination: String,
}

impl<S: ObjectStore> KeySynchronizer<S> {
    async fn sync_key(&self, key: &str) -> anyhow::Result<()> {
        let Some(source) = self.store.head_object(&self.source, key).await? else {
            // The key was listed from the source bucket, so its absence now
            // means the lister's snapshot and our view disagree.
            anyhow::bail!(
                "key {key:?} was listed in bucket {:?} but no longer exists there",
                self.source
            );
        };
        let destination = self.store.head_object(&self.destination, key).await?;
        match decide(&source, destination.as_ref()) {
            SyncAction::Skip => {
                tracing::info!(
                    key = %key,
                    source = %self.source,
                    destination = %self.destination,
                    "Key is already current in destination bucket",
                );
            }
            SyncAction::CopyRedirect(target) => {
                tracing::info!(
                    key = %key,
                    source = %self.source,
                    destination = %self.destination,
                    target = %target,
                    "Copying redirect",
                );
                self.store
                    .put_redirect(&self.destination, key, &target)
                    .await?;
            }
            SyncAction::CopyObject => {
                tracing::info!(
                    key = %key,
                    source = %self.source,
                    destination = %self.destination,
                    "Copying key",
                );
                self.store
                    .copy_object(&self.source, &self.destination, key)
                    .await?;
            }
        }
        Ok(())
    }
}

impl<S: ObjectStore> Processor for KeySynchronizer<S> {
    type Item = String;

    async fn process(&self, key: String) -> anyhow::Result<()> {
        self.sync_key(&key).await
    }
}

/// Make `destination` consistent with `source` for each of `keys`.
///
/// Returns once every key has been processed, or once the worker pool has
/// drained after a fatal error.  Running this twice in a row with no source
/// changes performs zero copy or put operations on the second run.
pub(crate) async fn sync_keys<S: ObjectStore>(
    store: S,
    source: &str,
    destination: &str,
    keys: Vec<String>,
) -> Result<(), MultiError> {
    tracing::info!(
        count = keys.len(),
        source = %source,
        destination = %destination,
        "Copying keys between buckets",
    );
    let synchronizer = KeySynchronizer {
        store,
        source: source.to_owned(),
        destination: destination.to_owned(),
    };
    run_pool(WORKERS, keys, &synchronizer).await
}
