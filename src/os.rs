//! File mapping primitives over the unix syscall layer.

use core::ffi::c_void;
use core::num::NonZeroUsize;
use core::ptr::NonNull;
use std::fs::File;
use std::os::fd::AsFd;

use nix::sys::mman::{MapFlags, MsFlags, ProtFlags, mmap, msync, munmap};

use crate::Error;

/// A shared mapping of a file range, unmapped on drop.
pub(crate) struct FileMap {
    ptr: NonNull<c_void>,
    len: usize,
}

impl FileMap {
    /// Maps `len` bytes of `file` from offset 0 with the given protection.
    pub(crate) fn map(file: &File, len: usize, prot: ProtFlags) -> Result<Self, Error> {
        let size = match NonZeroUsize::new(len) {
            Some(size) => size,
            None => return Err(nix::errno::Errno::EINVAL.into()),
        };
        let ptr = unsafe { mmap(None, size, prot, MapFlags::MAP_SHARED, file.as_fd(), 0)? };
        Ok(Self { ptr, len })
    }

    pub(crate) fn map_read_only(file: &File, len: usize) -> Result<Self, Error> {
        Self::map(file, len, ProtFlags::PROT_READ)
    }

    pub(crate) fn map_read_write(file: &File, len: usize) -> Result<Self, Error> {
        Self::map(file, len, ProtFlags::PROT_READ | ProtFlags::PROT_WRITE)
    }

    #[inline]
    pub(crate) fn addr(&self) -> *mut u8 {
        self.ptr.as_ptr().cast()
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.addr(), self.len) }
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.addr(), self.len) }
    }

    /// Flushes the mapped range to the file (`MS_SYNC`).
    pub(crate) fn sync(&self) -> Result<(), Error> {
        unsafe { msync(self.ptr, self.len, MsFlags::MS_SYNC)? };
        Ok(())
    }
}

impl Drop for FileMap {
    fn drop(&mut self) {
        // Nowhere to report a failure; the mapping is gone either way.
        let _ = unsafe { munmap(self.ptr, self.len) };
    }
}

pub(crate) fn file_size(file: &File) -> Result<u64, Error> {
    let stat = nix::sys::stat::fstat(file.as_fd())?;
    Ok(stat.st_size as u64)
}

/// Ensures `len` bytes are allocated on disk for `file`.
pub(crate) fn prealloc(file: &File, len: usize) -> Result<(), Error> {
    nix::fcntl::posix_fallocate(file.as_fd(), 0, len as i64)?;
    Ok(())
}

pub(crate) fn sync_file(file: &File) -> Result<(), Error> {
    nix::unistd::fsync(file.as_fd())?;
    Ok(())
}
