use crate::store::{ObjectDescriptor, ObjectMetadata, ObjectStore, RawPage};
use anyhow::Context;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::operation::copy_object::CopyObjectError;
use aws_sdk_s3::operation::delete_object::DeleteObjectError;
use aws_sdk_s3::operation::head_object::{HeadObjectError, HeadObjectOutput};
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::types::{BucketLocationConstraint, MetadataDirective};
use aws_sdk_s3::Client;
use aws_smithy_runtime_api::client::{orchestrator::HttpResponse, result::SdkError};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;

/// Characters percent-encoded in the key portion of an `x-amz-copy-source`
/// header.  `/` is left alone, as it separates key components.
const COPY_SOURCE_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Handle for interacting with S3
#[derive(Debug)]
pub(crate) struct S3Store {
    config: SdkConfig,
    client: Client,
}

impl S3Store {
    /// Load AWS configuration and construct a store.  If `region` is given,
    /// it overrides the region from the environment's own configuration;
    /// otherwise the store operates in the region this process is deployed
    /// in.
    pub(crate) async fn new(region: Option<String>) -> S3Store {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        S3Store::from_config(loader.load().await)
    }

    fn from_config(config: SdkConfig) -> S3Store {
        let client = Client::new(&config);
        S3Store { config, client }
    }

    pub(crate) fn region(&self) -> Option<&Region> {
        self.config.region()
    }
}

impl Clone for S3Store {
    /// Each clone constructs its own client, so that every pool worker
    /// talks to S3 over a dedicated connection pool.
    fn clone(&self) -> S3Store {
        S3Store::from_config(self.config.clone())
    }
}

impl ObjectStore for S3Store {
    type Error = S3StoreError;

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectDescriptor>, S3StoreError> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(descriptor_from_head(output))),
            Err(e) if e.as_service_error().is_some_and(HeadObjectError::is_not_found) => Ok(None),
            Err(source) => Err(S3StoreError::Head {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
                source,
            }),
        }
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        destination_bucket: &str,
        key: &str,
    ) -> Result<(), S3StoreError> {
        self.client
            .copy_object()
            .copy_source(copy_source(source_bucket, key))
            .bucket(destination_bucket)
            .key(key)
            .metadata_directive(MetadataDirective::Copy)
            .send()
            .await
            .map_err(|source| S3StoreError::Copy {
                source_bucket: source_bucket.to_owned(),
                destination_bucket: destination_bucket.to_owned(),
                key: key.to_owned(),
                source,
            })?;
        Ok(())
    }

    async fn put_redirect(
        &self,
        bucket: &str,
        key: &str,
        target: &str,
    ) -> Result<(), S3StoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .website_redirect_location(target)
            .send()
            .await
            .map_err(|source| S3StoreError::PutRedirect {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
                source,
            })?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), S3StoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|source| S3StoreError::Delete {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
                source,
            })?;
        Ok(())
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<&str>,
        max_keys: usize,
    ) -> Result<RawPage, S3StoreError> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(i32::try_from(max_keys).unwrap_or(i32::MAX));
        if let Some(token) = token {
            request = request.continuation_token(token);
        }
        let output = request.send().await.map_err(|source| S3StoreError::List {
            bucket: bucket.to_owned(),
            prefix: prefix.to_owned(),
            source,
        })?;
        let keys = output
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|obj| obj.key)
            .collect();
        Ok(RawPage {
            keys,
            next_token: output.next_continuation_token,
        })
    }
}

fn descriptor_from_head(output: HeadObjectOutput) -> ObjectDescriptor {
    ObjectDescriptor {
        etag: output.e_tag,
        redirect_target: output.website_redirect_location,
        metadata: ObjectMetadata {
            cache_control: output.cache_control,
            content_disposition: output.content_disposition,
            content_encoding: output.content_encoding,
            content_language: output.content_language,
            content_type: output.content_type,
            expires: output.expires_string,
            user_defined: output
                .metadata
                .map(|m| m.into_iter().collect())
                .unwrap_or_default(),
        },
    }
}

fn copy_source(bucket: &str, key: &str) -> String {
    format!("{bucket}/{}", utf8_percent_encode(key, COPY_SOURCE_ESCAPES))
}

/// Resolve the region a bucket lives in, using the environment's own region
/// to issue the query.
///
/// Buckets created before location constraints existed report no
/// constraint; those map to `us-east-1`.  The legacy `EU` constraint maps
/// to `eu-west-1`.
pub(crate) async fn get_bucket_region(bucket: &str) -> anyhow::Result<String> {
    let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let client = Client::new(&config);
    let output = client
        .get_bucket_location()
        .bucket(bucket)
        .send()
        .await
        .with_context(|| format!("failed to query location for bucket {bucket:?}"))?;
    Ok(region_for_constraint(output.location_constraint))
}

fn region_for_constraint(constraint: Option<BucketLocationConstraint>) -> String {
    match constraint.as_ref().map(BucketLocationConstraint::as_str) {
        None | Some("") => String::from("us-east-1"),
        Some("EU") => String::from("eu-west-1"),
        Some(region) => String::from(region),
    }
}

#[derive(Debug, Error)]
pub(crate) enum S3StoreError {
    #[error("failed to query object s3://{bucket}/{key}")]
    Head {
        bucket: String,
        key: String,
        source: SdkError<HeadObjectError, HttpResponse>,
    },

    #[error("failed to copy s3://{source_bucket}/{key} to s3://{destination_bucket}/{key}")]
    Copy {
        source_bucket: String,
        destination_bucket: String,
        key: String,
        source: SdkError<CopyObjectError, HttpResponse>,
    },

    #[error("failed to write redirect object s3://{bucket}/{key}")]
    PutRedirect {
        bucket: String,
        key: String,
        source: SdkError<PutObjectError, HttpResponse>,
    },

    #[error("failed to delete object s3://{bucket}/{key}")]
    Delete {
        bucket: String,
        key: String,
        source: SdkError<DeleteObjectError, HttpResponse>,
    },

    #[error("failed to list objects in bucket {bucket:?} with prefix {prefix:?}")]
    List {
        bucket: String,
        prefix: String,
        source: SdkError<ListObjectsV2Error, HttpResponse>,
    },
}
