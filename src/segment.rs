//! Consumer-side segment header.
//!
//! Every block handed out by the allocator begins with an 8-byte segment
//! header written by the consumer (the node layer of the database). The
//! allocator itself never writes these headers; it only reads them back in
//! [`crate::SlabAlloc::free`] to learn how large the block being freed is:
//! the capacity for mutable (slab) blocks, the byte size for blocks in the
//! immutable file region.
//!
//! Layout, little-endian:
//!
//! ```text
//! offset 0  u32  capacity in bytes (the full allocated block size)
//! offset 4  u32  byte size (bytes in use, header included)
//! ```

pub const SEGMENT_HEADER_SIZE: usize = 8;

/// Reads the capacity field of the segment header at `addr`.
///
/// # Safety
/// `addr` must point to at least [`SEGMENT_HEADER_SIZE`] readable bytes
/// holding a segment header.
#[inline]
pub unsafe fn capacity_from_header(addr: *const u8) -> usize {
    let mut raw = [0; 4];
    unsafe { core::ptr::copy_nonoverlapping(addr, raw.as_mut_ptr(), 4) };
    u32::from_le_bytes(raw) as usize
}

/// Reads the byte-size field of the segment header at `addr`.
///
/// # Safety
/// As for [`capacity_from_header`].
#[inline]
pub unsafe fn byte_size_from_header(addr: *const u8) -> usize {
    let mut raw = [0; 4];
    unsafe { core::ptr::copy_nonoverlapping(addr.add(4), raw.as_mut_ptr(), 4) };
    u32::from_le_bytes(raw) as usize
}

/// Writes a segment header at `addr`.
///
/// # Safety
/// `addr` must point to at least [`SEGMENT_HEADER_SIZE`] writable bytes.
#[inline]
pub unsafe fn write_header(addr: *mut u8, capacity: usize, byte_size: usize) {
    let capacity = u32::try_from(capacity).expect("segment capacity exceeds u32");
    let byte_size = u32::try_from(byte_size).expect("segment byte size exceeds u32");
    unsafe {
        core::ptr::copy_nonoverlapping(capacity.to_le_bytes().as_ptr(), addr, 4);
        core::ptr::copy_nonoverlapping(byte_size.to_le_bytes().as_ptr(), addr.add(4), 4);
    }
}
