//! Fallible allocation for the memory resource kind.

/// Allocate a zeroed buffer of `len` bytes, or `None` if the allocator
/// refuses the request.
///
/// Unlike `vec![0; len]` this never aborts the process on exhaustion or on a
/// nonsensical length.
pub fn try_alloc_bytes(len: usize) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).ok()?;
    buf.resize(len, 0);
    Some(buf)
}
