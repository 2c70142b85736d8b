//! The storage seam the benchmark driver issues its requests through.

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use crate::target::ObjectTarget;

mod in_memory;
mod s3_compatible;

pub use in_memory::{InMemoryStorage, StorageEvent};
pub use s3_compatible::{S3Storage, S3StorageConfig};

/// A shareable, type-erased [`Storage`] instance.
pub type SharedStorage = Arc<dyn Storage>;

/// An object-storage client exposing the two operations the benchmark times.
#[async_trait::async_trait]
pub trait Storage: Debug + Send + Sync + 'static {
    /// The storage name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Uploads `body` to the given target, replacing any existing object.
    async fn put_object(&self, target: &ObjectTarget, body: Bytes) -> StorageResult<()>;

    /// Downloads the object at the given target and returns the number of bytes received.
    async fn get_object(&self, target: &ObjectTarget) -> StorageResult<u64>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    /// Errors returned by the S3 client, including transport failures and error responses.
    #[error("s3 error: {context}")]
    S3 {
        context: String,
        #[source]
        cause: s3::error::S3Error,
    },

    /// The service answered with a status code that does not indicate success.
    #[error("unexpected status {status} while {context}")]
    Status { context: String, status: u16 },

    /// The requested object does not exist.
    #[error("object {0} not found")]
    NotFound(ObjectTarget),

    /// The storage client is bound to a different bucket than the one requested.
    #[error("storage is bound to bucket `{bound}`, but `{requested}` was requested")]
    BucketMismatch { bound: String, requested: String },

    /// Any other error stemming from a storage implementation.
    #[error("storage error: {context}")]
    Generic {
        context: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    /// Creates a [`StorageError::Generic`] without an underlying cause.
    pub fn generic(context: impl Into<String>) -> Self {
        Self::Generic {
            context: context.into(),
            cause: None,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
