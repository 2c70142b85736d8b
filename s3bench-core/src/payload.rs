use bytes::{Bytes, BytesMut};

/// Allocates a zero-filled buffer of `len` bytes for a write batch.
///
/// The returned [`Bytes`] is immutable; cloning it for every worker of a batch shares the same
/// allocation.
pub fn filler(len: u64) -> Bytes {
    BytesMut::zeroed(len as usize).freeze()
}
