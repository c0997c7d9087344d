//! Slab allocator backing a memory-mapped TideDB database file.
//!
//! The allocator provides a uniform, integer-addressed memory space made of
//! an immutable region (the mapped file, a user buffer, or nothing) and a
//! growing sequence of heap slabs holding mutable allocations. Every
//! allocation is identified by a [`Ref`], a byte offset into this unified
//! space; refs below the attach-time baseline address the immutable region,
//! refs at or above it address a slab.
//!
//! See [`SlabAlloc`] for the allocation and attachment API, [`header`] for
//! the on-disk header/footer codec, and [`segment`] for the consumer-side
//! segment header that [`SlabAlloc::free`] reads block sizes from.

use core::sync::atomic::{AtomicBool, Ordering};

mod alloc;
mod error;
pub mod header;
mod os;
pub mod segment;

pub use crate::alloc::{AttachConfig, Chunk, MemRef, SlabAlloc};
pub use crate::error::Error;

/// Byte offset into the unified address space. The stored form is a
/// little-endian `u64`; a file whose refs do not fit in `usize` is rejected
/// at validation.
pub type Ref = usize;

static DISABLE_SYNC_TO_DISK: AtomicBool = AtomicBool::new(false);

/// Globally disables (or re-enables) the `fsync`/`msync` calls performed by
/// [`SlabAlloc::attach_file`] and [`SlabAlloc::prepare_for_update`].
///
/// Intended for test runs where durability is irrelevant. In no-sync mode
/// the streaming conversion elides the footer sync and the select-bit sync
/// together, never one without the other.
pub fn set_disable_sync_to_disk(disable: bool) {
    DISABLE_SYNC_TO_DISK.store(disable, Ordering::Relaxed);
}

/// Whether sync-to-disk is currently disabled.
pub fn sync_to_disk_disabled() -> bool {
    DISABLE_SYNC_TO_DISK.load(Ordering::Relaxed)
}
