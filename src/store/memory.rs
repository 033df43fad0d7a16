use super::{ObjectDescriptor, ObjectMetadata, ObjectStore, RawPage};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Etag S3 reports for a zero-byte body, as written for redirect objects
pub(crate) const EMPTY_ETAG: &str = "\"d41d8cd98f00b204e9800998ecf8427e\"";

/// In-memory stand-in for the S3 backend.
///
/// Clones share the same buckets, mirroring how per-worker S3 clients all
/// observe the same remote state.  Counters record how many mutating calls
/// were issued, so tests can assert that an already-consistent key produces
/// no side effects.
#[derive(Clone, Debug, Default)]
pub(crate) struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, ObjectDescriptor>>>,
    head_faults: Mutex<BTreeSet<(String, String)>>,
    copies: AtomicUsize,
    redirect_puts: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryStore {
    pub(crate) fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub(crate) fn put(&self, bucket: &str, key: &str, descriptor: ObjectDescriptor) {
        let mut buckets = self.lock_buckets();
        buckets
            .entry(bucket.to_owned())
            .or_default()
            .insert(key.to_owned(), descriptor);
    }

    pub(crate) fn get(&self, bucket: &str, key: &str) -> Option<ObjectDescriptor> {
        let buckets = self.lock_buckets();
        buckets.get(bucket).and_then(|b| b.get(key)).cloned()
    }

    /// All keys currently present in `bucket`, in listing order
    pub(crate) fn keys(&self, bucket: &str) -> Vec<String> {
        let buckets = self.lock_buckets();
        buckets
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Make every subsequent head of `bucket`/`key` fail with a backend
    /// error that is not a not-found outcome
    pub(crate) fn fail_heads_of(&self, bucket: &str, key: &str) {
        let mut faults = self
            .inner
            .head_faults
            .lock()
            .expect("head_faults mutex should not be poisoned");
        faults.insert((bucket.to_owned(), key.to_owned()));
    }

    pub(crate) fn copies(&self) -> usize {
        self.inner.copies.load(Ordering::Relaxed)
    }

    pub(crate) fn redirect_puts(&self) -> usize {
        self.inner.redirect_puts.load(Ordering::Relaxed)
    }

    pub(crate) fn deletes(&self) -> usize {
        self.inner.deletes.load(Ordering::Relaxed)
    }

    fn lock_buckets(
        &self,
    ) -> std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, ObjectDescriptor>>> {
        self.inner
            .buckets
            .lock()
            .expect("buckets mutex should not be poisoned")
    }
}

/// Error injected via [`MemoryStore::fail_heads_of`] or raised when a copy
/// names a nonexistent source object
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("injected {op} failure for s3://{bucket}/{key}")]
pub(crate) struct MemoryStoreError {
    op: &'static str,
    bucket: String,
    key: String,
}

impl ObjectStore for MemoryStore {
    type Error = MemoryStoreError;

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectDescriptor>, MemoryStoreError> {
        let faulted = {
            let faults = self
                .inner
                .head_faults
                .lock()
                .expect("head_faults mutex should not be poisoned");
            faults.contains(&(bucket.to_owned(), key.to_owned()))
        };
        if faulted {
            return Err(MemoryStoreError {
                op: "head",
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            });
        }
        Ok(self.get(bucket, key))
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        destination_bucket: &str,
        key: &str,
    ) -> Result<(), MemoryStoreError> {
        self.inner.copies.fetch_add(1, Ordering::Relaxed);
        let Some(descriptor) = self.get(source_bucket, key) else {
            return Err(MemoryStoreError {
                op: "copy",
                bucket: source_bucket.to_owned(),
                key: key.to_owned(),
            });
        };
        self.put(destination_bucket, key, descriptor);
        Ok(())
    }

    async fn put_redirect(
        &self,
        bucket: &str,
        key: &str,
        target: &str,
    ) -> Result<(), MemoryStoreError> {
        self.inner.redirect_puts.fetch_add(1, Ordering::Relaxed);
        self.put(
            bucket,
            key,
            ObjectDescriptor {
                etag: Some(EMPTY_ETAG.to_owned()),
                redirect_target: Some(target.to_owned()),
                metadata: ObjectMetadata::default(),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), MemoryStoreError> {
        self.inner.deletes.fetch_add(1, Ordering::Relaxed);
        let mut buckets = self.lock_buckets();
        if let Some(b) = buckets.get_mut(bucket) {
            b.remove(key);
        }
        Ok(())
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<&str>,
        max_keys: usize,
    ) -> Result<RawPage, MemoryStoreError> {
        let keys: Vec<String> = {
            let buckets = self.lock_buckets();
            buckets
                .get(bucket)
                .map(|b| {
                    b.keys()
                        .filter(|k| k.starts_with(prefix))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        let start = token
            .and_then(|t| t.parse::<usize>().ok())
            .unwrap_or_default();
        let end = keys.len().min(start.saturating_add(max_keys));
        let page = keys.get(start..end).map(<[String]>::to_vec).unwrap_or_default();
        let next_token = (end < keys.len()).then(|| end.to_string());
        Ok(RawPage {
            keys: page,
            next_token,
        })
    }
}

/// Descriptor with the given etag and no redirect or metadata
pub(crate) fn plain(etag: &str) -> ObjectDescriptor {
    ObjectDescriptor {
        etag: Some(etag.to_owned()),
        ..ObjectDescriptor::default()
    }
}

/// Descriptor for an object redirecting to `target`
pub(crate) fn redirect(target: &str) -> ObjectDescriptor {
    ObjectDescriptor {
        etag: Some(EMPTY_ETAG.to_owned()),
        redirect_target: Some(target.to_owned()),
        metadata: ObjectMetadata::default(),
    }
}

/// Descriptor with the given etag and content type
pub(crate) fn typed(etag: &str, content_type: &str) -> ObjectDescriptor {
    ObjectDescriptor {
        etag: Some(etag.to_owned()),
        redirect_target: None,
        metadata: ObjectMetadata {
            content_type: Some(content_type.to_owned()),
            ..ObjectMetadata::default()
        },
    }
}
