//! Path-style S3 client for the dataset bucket

use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{
    Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use datavault_core::{Error, RemoteConfig, Result, DEFAULT_REGION};

const BACKEND: &str = "remote";

/// One entry of a bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ObjectSummary {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Metadata stored alongside an uploaded object
pub(crate) struct ObjectMetadata {
    pub content_type: &'static str,
    pub compression: &'static str,
    pub original_size: usize,
}

pub(crate) struct BucketClient {
    s3: Client,
    bucket: String,
    region: String,
}

impl BucketClient {
    pub(crate) async fn new(config: &RemoteConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "datavault",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.base_url())
            .credentials_provider(credentials)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.request_timeout)
                    .build(),
            )
            .retry_config(RetryConfig::standard().with_max_attempts(1))
            .load()
            .await;

        // Objects are addressed as /<bucket>/<key> so any S3-compatible
        // endpoint works without wildcard DNS.
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        Self {
            s3: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
        }
    }

    pub(crate) fn bucket(&self) -> &str {
        &self.bucket
    }

    pub(crate) async fn bucket_exists(&self) -> Result<bool> {
        match self.s3.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if status_of(&e) == Some(404) => Ok(false),
            Err(e) => Err(sdk_error("head bucket", e)),
        }
    }

    pub(crate) async fn create_bucket(&self) -> Result<()> {
        let mut request = self.s3.create_bucket().bucket(&self.bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|e| sdk_error("create bucket", e))?;
        Ok(())
    }

    pub(crate) async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<()> {
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(metadata.content_type)
            .metadata("compression", metadata.compression)
            .metadata("original-size", metadata.original_size.to_string())
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| sdk_error("put object", e))?;
        Ok(())
    }

    /// Object body, or `None` when the key does not exist. Objects larger than
    /// `limit` bytes are refused before the body is read.
    pub(crate) async fn get_object(&self, key: &str, limit: u64) -> Result<Option<Vec<u8>>> {
        let output = match self.s3.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(output) => output,
            Err(e) if status_of(&e) == Some(404) => return Ok(None),
            Err(e) => return Err(sdk_error("get object", e)),
        };

        let declared = output
            .content_length()
            .and_then(|length| u64::try_from(length).ok());
        if declared.is_some_and(|length| length > limit) {
            tracing::warn!(key, limit, "Refusing to read oversized object");
            return Err(Error::decompression_bomb(limit));
        }

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| {
                Error::backend_unavailable_with_source(BACKEND, format!("reading {key}"), e)
            })?
            .into_bytes();
        if bytes.len() as u64 > limit {
            return Err(Error::decompression_bomb(limit));
        }
        Ok(Some(bytes.to_vec()))
    }

    /// Deleting a missing key succeeds
    pub(crate) async fn delete_object(&self, key: &str) -> Result<()> {
        match self.s3.delete_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(()),
            Err(e) if status_of(&e) == Some(404) => Ok(()),
            Err(e) => Err(sdk_error("delete object", e)),
        }
    }

    /// Every object under `prefix`, following continuation tokens
    pub(crate) async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
        let mut pages = self
            .s3
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("list objects", e))?;
            objects.extend(page.contents().iter().filter_map(|object| {
                let key = object.key()?.to_string();
                let last_modified = object.last_modified().and_then(|t| {
                    DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())
                });
                Some(ObjectSummary { key, last_modified })
            }));
        }
        Ok(objects)
    }
}

fn status_of<E>(error: &SdkError<E, HttpResponse>) -> Option<u16> {
    error.raw_response().map(|response| response.status().as_u16())
}

fn sdk_error<E>(operation: &str, error: SdkError<E, HttpResponse>) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = format!("{operation} failed: {}", DisplayErrorContext(&error));
    Error::backend_unavailable_with_source(BACKEND, message, error)
}
