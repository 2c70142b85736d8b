use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};

use crate::storage::{Storage, StorageError, StorageResult};
use crate::target::ObjectTarget;

/// Connection settings for [`S3Storage`].
#[derive(Clone, Debug, Default)]
pub struct S3StorageConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub request_timeout: Option<Duration>,
    pub path_style: bool,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// An S3-compatible storage client bound to a single bucket.
pub struct S3Storage {
    bucket: Box<Bucket>,
}

impl S3Storage {
    /// Creates a new S3 compatible storage client bound to the configured bucket.
    ///
    /// Without explicit keys, credentials are resolved through the default chain (environment,
    /// profile, instance metadata). This may block on network I/O, so call it outside of async
    /// contexts.
    pub fn new(config: S3StorageConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            config.access_key.as_deref(),
            config.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|cause| StorageError::Generic {
            context: "failed to resolve S3 credentials".to_owned(),
            cause: Some(Box::new(cause)),
        })?;

        let region = match config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region,
                endpoint,
            },
            None => config
                .region
                .parse::<Region>()
                .map_err(|cause| StorageError::Generic {
                    context: format!("invalid region `{}`", config.region),
                    cause: Some(Box::new(cause)),
                })?,
        };

        let mut bucket = Bucket::new(&config.bucket, region, credentials).map_err(|cause| {
            StorageError::S3 {
                context: format!("failed to configure bucket `{}`", config.bucket),
                cause,
            }
        })?;

        if config.path_style {
            bucket = bucket.with_path_style();
        }

        if let Some(request_timeout) = config.request_timeout {
            bucket = bucket
                .with_request_timeout(request_timeout)
                .map_err(|cause| StorageError::S3 {
                    context: "failed to set request timeout".to_owned(),
                    cause,
                })?;
        }

        Ok(Self { bucket })
    }

    fn check_bucket(&self, target: &ObjectTarget) -> StorageResult<()> {
        let bound = self.bucket.name();
        if bound != target.bucket {
            return Err(StorageError::BucketMismatch {
                bound,
                requested: target.bucket.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Storage")
            .field("bucket", &self.bucket.name())
            .field("endpoint", &self.bucket.host())
            .finish_non_exhaustive()
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[async_trait::async_trait]
impl Storage for S3Storage {
    fn name(&self) -> &'static str {
        "s3-compatible"
    }

    #[tracing::instrument(level = "trace", fields(%target, len = body.len()), skip_all)]
    async fn put_object(&self, target: &ObjectTarget, body: Bytes) -> StorageResult<()> {
        self.check_bucket(target)?;

        let response = self
            .bucket
            .put_object(&target.key, &body)
            .await
            .map_err(|cause| StorageError::S3 {
                context: format!("putting {target}"),
                cause,
            })?;

        let status = response.status_code();
        if !is_success(status) {
            return Err(StorageError::Status {
                context: format!("putting {target}"),
                status,
            });
        }

        Ok(())
    }

    #[tracing::instrument(level = "trace", fields(%target), skip_all)]
    async fn get_object(&self, target: &ObjectTarget) -> StorageResult<u64> {
        self.check_bucket(target)?;

        let response = match self.bucket.get_object(&target.key).await {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(404, _)) => {
                return Err(StorageError::NotFound(target.clone()));
            }
            Err(cause) => {
                return Err(StorageError::S3 {
                    context: format!("getting {target}"),
                    cause,
                });
            }
        };

        let status = response.status_code();
        if status == 404 {
            return Err(StorageError::NotFound(target.clone()));
        }
        if !is_success(status) {
            return Err(StorageError::Status {
                context: format!("getting {target}"),
                status,
            });
        }

        Ok(response.bytes().len() as u64)
    }
}
