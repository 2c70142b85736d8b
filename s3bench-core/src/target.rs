use std::fmt;

/// The single object every batch of a run reads and writes.
///
/// The target is fixed for the whole run. Only the payload and the concurrency level vary between
/// batches.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ObjectTarget {
    /// Name of the bucket holding the object.
    pub bucket: String,
    /// Key of the object within the bucket.
    pub key: String,
}

impl ObjectTarget {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}
