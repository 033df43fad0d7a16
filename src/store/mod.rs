#[cfg(test)]
pub(crate) mod memory;

use std::collections::BTreeMap;
use std::future::Future;

/// The attributes of a stored object that sync decisions are made from.
///
/// A descriptor is fetched fresh for every comparison; descriptors are never
/// cached across operations.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ObjectDescriptor {
    /// The object's entity tag, an opaque content fingerprint
    pub(crate) etag: Option<String>,

    /// Where requests for the object are redirected to, for objects that
    /// carry a website redirect in lieu of meaningful content
    pub(crate) redirect_target: Option<String>,

    /// The comparable metadata bag
    pub(crate) metadata: ObjectMetadata,
}

/// The metadata attributes that participate in sync comparisons.
///
/// Fixed fields plus a `BTreeMap` for the free-form pairs give the bag a
/// canonical ordering, so equality of two bags is equality of their
/// canonical forms.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ObjectMetadata {
    pub(crate) cache_control: Option<String>,
    pub(crate) content_disposition: Option<String>,
    pub(crate) content_encoding: Option<String>,
    pub(crate) content_language: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) expires: Option<String>,

    /// Free-form `x-amz-meta-*` key/value pairs
    pub(crate) user_defined: BTreeMap<String, String>,
}

/// One backend page of object keys, in listing order
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct RawPage {
    pub(crate) keys: Vec<String>,

    /// Opaque cursor for the next page; `None` when the listing is exhausted
    pub(crate) next_token: Option<String>,
}

/// The storage operations the sync tasks are built on.
///
/// Cloning a store must yield a handle onto the same remote state; the S3
/// implementation gives each clone a dedicated client, so that every pool
/// worker talks to the backend over its own connections.
///
/// Absence of an object is an expected outcome and is modeled as `Ok(None)`
/// from [`ObjectStore::head_object`]; implementations must report every
/// other failure as an error so that distinct failure classes are never
/// conflated with absence.
pub(crate) trait ObjectStore: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the descriptor for an object, or `None` if the object does not
    /// exist
    fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<ObjectDescriptor>, Self::Error>> + Send;

    /// Server-side copy of an object between buckets, replacing the
    /// destination's content and metadata with the source's
    fn copy_object(
        &self,
        source_bucket: &str,
        destination_bucket: &str,
        key: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Create (or overwrite) an object that redirects to `target`
    fn put_redirect(
        &self,
        bucket: &str,
        key: &str,
        target: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Delete an object.  Deleting a nonexistent key is a successful no-op.
    fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Fetch one page of at most `max_keys` object keys under `prefix`,
    /// resuming from `token` if given
    fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<&str>,
        max_keys: usize,
    ) -> impl Future<Output = Result<RawPage, Self::Error>> + Send;
}
