//! The slab allocator.
//!
//! A [`SlabAlloc`] glues an immutable baseline region (mapped file, user
//! buffer, or nothing) to a growing list of heap slabs and serves
//! variable-size allocations out of a free list. Refs below the baseline
//! address the immutable region and are never handed out by [`SlabAlloc::alloc`];
//! refs at or above it land in exactly one slab.

use core::ptr::{self, NonNull};
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use memory_addr::{align_up, is_aligned};

use crate::header;
use crate::os::{self, FileMap};
use crate::segment;
use crate::{Error, Ref, sync_to_disk_disabled};

/// Size of the initial disk preallocation for a newly created file.
const INITIAL_FILE_SIZE: usize = 4096;

/// Slab sizes are rounded up to this granularity.
const SLAB_GRANULARITY: usize = 256;

/// An allocated block: its address in memory and its ref in the unified
/// address space.
#[derive(Debug, Clone, Copy)]
pub struct MemRef {
    pub addr: *mut u8,
    pub ref_: Ref,
}

/// A free block. `size` is always a positive multiple of 8, and the range
/// `[ref_, ref_ + size)` never crosses a slab boundary or the
/// immutable/mutable divide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub ref_: Ref,
    pub size: usize,
}

/// One owned heap buffer. Its ref range starts where the previous slab
/// ends (or at the baseline for the first slab) and runs to `ref_end`.
struct Slab {
    addr: NonNull<u8>,
    ref_end: Ref,
}

/// What the allocator is attached to, owning whatever the mode owns.
enum Attachment {
    None,
    /// `attach_empty`: no baseline buffer exists, only slabs.
    OwnedBuffer,
    /// A caller-owned buffer; nothing is released on detach.
    UsersBuffer,
    SharedFile { file: File, map: FileMap },
    UnsharedFile { file: File, map: FileMap },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FreeSpaceState {
    /// One free chunk per slab, covering it entirely; no live allocation.
    Clean,
    /// Allocations or frees have happened since the last reset.
    Dirty,
    /// A free could not be recorded; allocation is refused until the next
    /// [`SlabAlloc::reset_free_space_tracking`].
    Invalid,
}

/// Options for [`SlabAlloc::attach_file`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachConfig {
    /// Opened through the shared-access layer. Enables the read-only
    /// format 2→3 upgrade path and must never combine with `read_only`.
    pub is_shared: bool,
    pub read_only: bool,
    /// Fail instead of creating a missing file.
    pub no_create: bool,
    /// Skip header validation (the caller vouches for the file).
    pub skip_validate: bool,
    /// The file is used with client/server synchronization. Stored in the
    /// header on creation, checked against the header otherwise.
    pub server_sync_mode: bool,
}

/// Slab allocator backing a memory-mapped database file.
///
/// Mutating operations require external synchronization; a `SlabAlloc` is
/// a single-writer structure.
pub struct SlabAlloc {
    data: *mut u8,
    baseline: usize,
    attachment: Attachment,
    file_on_streaming_form: bool,
    file_format: u8,
    slabs: Vec<Slab>,
    free_space: Vec<Chunk>,
    free_read_only: Vec<Chunk>,
    free_space_state: FreeSpaceState,
    /// Makes the next free-list append behave as if the allocation of the
    /// list entry failed.
    #[cfg(test)]
    pub(crate) fail_free_space_push: bool,
}

impl Default for SlabAlloc {
    fn default() -> Self {
        Self::new()
    }
}

impl SlabAlloc {
    /// Creates a detached allocator.
    pub fn new() -> Self {
        Self {
            data: ptr::null_mut(),
            baseline: 0,
            attachment: Attachment::None,
            file_on_streaming_form: false,
            file_format: 0,
            slabs: Vec::new(),
            free_space: Vec::new(),
            free_read_only: Vec::new(),
            free_space_state: FreeSpaceState::Clean,
            #[cfg(test)]
            fail_free_space_push: false,
        }
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        !matches!(self.attachment, Attachment::None)
    }

    /// Size of the immutable region; the boundary between immutable and
    /// mutable refs.
    #[inline]
    pub fn baseline(&self) -> usize {
        self.baseline
    }

    /// Whether `ref_` addresses the immutable file region.
    #[inline]
    pub fn is_read_only(&self, ref_: Ref) -> bool {
        ref_ < self.baseline
    }

    /// Whether the attached file is in streaming form and must go through
    /// [`Self::prepare_for_update`] before mutation.
    #[inline]
    pub fn is_file_on_streaming_form(&self) -> bool {
        self.file_on_streaming_form
    }

    /// File format byte read from the selected header slot at attach time.
    #[inline]
    pub fn file_format(&self) -> u8 {
        self.file_format
    }

    /// One byte past the highest mapped ref: the baseline if no slab
    /// exists, otherwise the last slab's `ref_end`.
    pub fn get_total_size(&self) -> usize {
        self.slabs.last().map_or(self.baseline, |slab| slab.ref_end)
    }

    /// Allocates `size` bytes and returns its address and ref.
    ///
    /// `size` must be a positive multiple of 8. Fails with
    /// [`Error::InvalidFreeSpace`] if free-space tracking was lost, and
    /// with [`Error::OutOfMemory`] if slab growth fails.
    pub fn alloc(&mut self, size: usize) -> Result<MemRef, Error> {
        debug_assert!(size > 0);
        debug_assert!(is_aligned(size, 8));
        debug_assert!(self.is_attached());

        // If a free could not be recorded, the list understates what is
        // actually free; handing out memory from it could double-allocate.
        if self.free_space_state == FreeSpaceState::Invalid {
            return Err(Error::InvalidFreeSpace);
        }
        self.free_space_state = FreeSpaceState::Dirty;

        // Reverse first-fit over the free list.
        for i in (0..self.free_space.len()).rev() {
            let chunk = self.free_space[i];
            if size <= chunk.size {
                let ref_ = chunk.ref_;
                let rest = chunk.size - size;
                if rest == 0 {
                    self.free_space.swap_remove(i);
                } else {
                    let chunk = &mut self.free_space[i];
                    chunk.ref_ += size;
                    chunk.size = rest;
                }

                #[cfg(feature = "tracing")]
                tracing::debug!("alloc {size} bytes at ref {ref_} from free list");

                let addr = self.translate(ref_);
                return Ok(MemRef { addr, ref_ });
            }
        }

        // Nothing fits; grow a new slab. At least the rounded request, and
        // at least twice the span of the current last slab so that slab
        // count stays logarithmic in the total mutable size.
        let mut new_size = align_up(size, SLAB_GRANULARITY);
        let ref_ = match self.slabs.last() {
            None => self.baseline,
            Some(last) => {
                let curr_ref_end = last.ref_end;
                let prev_ref_end = if self.slabs.len() == 1 {
                    self.baseline
                } else {
                    self.slabs[self.slabs.len() - 2].ref_end
                };
                let min_size = 2 * (curr_ref_end - prev_ref_end);
                if new_size < min_size {
                    new_size = min_size;
                }
                curr_ref_end
            }
        };
        debug_assert!(new_size > 0);

        // Reserve list capacity up front so nothing can fail after the
        // buffer is handed over.
        self.slabs.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
        let unused = new_size - size;
        if unused > 0 {
            self.free_space
                .try_reserve(1)
                .map_err(|_| Error::OutOfMemory)?;
        }

        let layout = Layout::from_size_align(new_size, 8).map_err(|_| Error::OutOfMemory)?;
        let addr = NonNull::new(unsafe { alloc_zeroed(layout) }).ok_or(Error::OutOfMemory)?;

        self.slabs.push(Slab {
            addr,
            ref_end: ref_ + new_size,
        });
        if unused > 0 {
            self.free_space.push(Chunk {
                ref_: ref_ + size,
                size: unused,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("alloc {size} bytes at ref {ref_} from new {new_size}-byte slab");

        Ok(MemRef {
            addr: addr.as_ptr(),
            ref_,
        })
    }

    /// Returns the block at `ref_` to the free list, coalescing with
    /// adjacent free neighbors where no slab boundary intervenes.
    ///
    /// `addr` must be the translation of `ref_`; the block's size is read
    /// back from its segment header. Never fails: if recording the chunk
    /// is impossible, free-space tracking is marked invalid instead.
    pub fn free(&mut self, ref_: Ref, addr: *const u8) {
        debug_assert!(ptr::eq(self.translate(ref_), addr.cast_mut()));

        // Free space in the read-only region is tracked separately.
        let read_only = self.is_read_only(ref_);

        // The block size lives in the segment header: immutable segments
        // record their byte size, mutable ones their capacity.
        let size = unsafe {
            if read_only {
                segment::byte_size_from_header(addr)
            } else {
                segment::capacity_from_header(addr)
            }
        };
        let ref_end = ref_ + size;

        #[cfg(feature = "tracing")]
        tracing::debug!("free {size} bytes at ref {ref_}");

        // The list is already known-lossy; one more lost chunk changes
        // nothing.
        if self.free_space_state == FreeSpaceState::Invalid {
            return;
        }

        // Mutable memory cannot be freed unless something was allocated
        // first, and any allocation marks the tracking dirty.
        debug_assert!(read_only || self.free_space_state == FreeSpaceState::Dirty);
        self.free_space_state = FreeSpaceState::Dirty;

        let slabs = &self.slabs;
        let list = if read_only {
            &mut self.free_read_only
        } else {
            &mut self.free_space
        };

        // Merge with the succeeding free chunk, unless a slab ends exactly
        // at `ref_end` (chunks from different slabs are different heap
        // buffers and must not fuse).
        let mut merged_with = None;
        if let Some(i) = list.iter().position(|chunk| chunk.ref_ == ref_end) {
            if !slabs.iter().any(|slab| slab.ref_end == ref_end) {
                list[i].ref_ = ref_;
                list[i].size += size;
                merged_with = Some(i);
            }
        }

        // Merge with the preceding free chunk, unless a slab ends at `ref_`.
        if !slabs.iter().any(|slab| slab.ref_end == ref_) {
            if let Some(p) = list.iter().position(|chunk| chunk.ref_ + chunk.size == ref_) {
                match merged_with {
                    Some(i) => {
                        let merged_size = list[i].size;
                        list[p].size += merged_size;
                        list.swap_remove(i);
                    }
                    None => list[p].size += size,
                }
                return;
            }
        }

        // No neighbor absorbed the block; record it as a chunk of its own.
        if merged_with.is_none() {
            let mut push_failed = list.try_reserve(1).is_err();
            #[cfg(test)]
            {
                push_failed = push_failed || self.fail_free_space_push;
            }
            if push_failed {
                // The chunk is lost. Refuse further allocation until the
                // list is rebuilt.
                self.free_space_state = FreeSpaceState::Invalid;
                return;
            }
            list.push(Chunk { ref_, size });
        }
    }

    /// Moves the block at `ref_` to a new allocation of `new_size` bytes,
    /// copying `old_size` bytes of content and freeing the old block.
    pub fn realloc(
        &mut self,
        ref_: Ref,
        addr: *const u8,
        old_size: usize,
        new_size: usize,
    ) -> Result<MemRef, Error> {
        debug_assert!(ptr::eq(self.translate(ref_), addr.cast_mut()));
        debug_assert!(new_size > 0);
        debug_assert!(is_aligned(new_size, 8));

        // TODO: try extending into a free successor chunk in place before
        // falling back to allocate-copy-free.
        let new_mem = self.alloc(new_size)?;
        unsafe { ptr::copy_nonoverlapping(addr, new_mem.addr, old_size) };
        self.free(ref_, addr);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "realloc ref {ref_} ({old_size} bytes) to ref {} ({new_size} bytes)",
            new_mem.ref_
        );

        Ok(new_mem)
    }

    /// Translates a ref to its current memory address.
    ///
    /// Refs below the baseline resolve into the immutable region, others
    /// into the slab that contains them. The ref must be live: translating
    /// a freed ref is undefined.
    pub fn translate(&self, ref_: Ref) -> *mut u8 {
        debug_assert!(self.is_attached());

        if ref_ < self.baseline {
            return unsafe { self.data.add(ref_) };
        }

        let i = self.slabs.partition_point(|slab| slab.ref_end <= ref_);
        debug_assert!(i < self.slabs.len());
        let slab_start = if i == 0 {
            self.baseline
        } else {
            self.slabs[i - 1].ref_end
        };
        unsafe { self.slabs[i].addr.as_ptr().add(ref_ - slab_start) }
    }

    /// Attaches to a database file, creating it when permitted, and
    /// returns the top ref stored in the file.
    ///
    /// On any failure the allocator is left detached and the file closed.
    pub fn attach_file(&mut self, path: &Path, cfg: AttachConfig) -> Result<Ref, Error> {
        debug_assert!(!self.is_attached());
        // Concurrent access goes through the shared-access layer, which
        // never opens read-only.
        debug_assert!(!(cfg.is_shared && cfg.read_only));

        let file = OpenOptions::new()
            .read(true)
            .write(!cfg.read_only)
            .create(!cfg.read_only && !cfg.no_create)
            .open(path)?;

        let size64 = os::file_size(&file)?;
        let mut size =
            usize::try_from(size64).map_err(|_| Error::InvalidDatabase("file too large"))?;

        let mut did_create = false;
        if size == 0 {
            did_create = true;
            // An existing empty file may be another process mid-creation;
            // only a writer may take over and initialize it.
            if cfg.read_only {
                return Err(Error::InvalidDatabase("read-only access to empty file"));
            }
            (&file).write_all(&header::empty_header())?;
            os::prealloc(&file, INITIAL_FILE_SIZE)?;
            if !sync_to_disk_disabled() {
                os::sync_file(&file)?;
            }
            size = INITIAL_FILE_SIZE;
        }

        let map = FileMap::map_read_only(&file, size)?;

        let mut top_ref = 0;
        let mut streaming = false;
        if !cfg.skip_validate {
            let validated = header::validate_buffer(map.as_slice(), cfg.is_shared)?;
            top_ref = validated.top_ref;
            streaming = validated.streaming;
        }

        if did_create {
            // Record the server-sync choice through a writable view of
            // just the header.
            let mut wmap = FileMap::map_read_write(&file, header::HEADER_SIZE)?;
            let data = wmap.as_mut_slice();
            if cfg.server_sync_mode {
                header::set_flags(data, header::flags(data) | header::FLAGS_SERVER_SYNC_MODE);
            }
            debug_assert_eq!(header::server_sync_mode(data), cfg.server_sync_mode);
        } else {
            let stored = header::server_sync_mode(map.as_slice());
            if cfg.server_sync_mode && !stored {
                return Err(Error::InvalidDatabase(
                    "file was not created with support for client/server synchronization",
                ));
            }
            if !cfg.server_sync_mode && stored {
                return Err(Error::InvalidDatabase(
                    "file requires support for client/server synchronization",
                ));
            }
        }

        {
            let data = map.as_slice();
            self.file_format = header::file_format(data, header::select(data));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("attached file {} ({size} bytes)", path.display());

        // Commit point: from here on nothing may fail. Dropping `map` or
        // `file` before this line is what detaches on error.
        self.data = map.addr();
        self.baseline = size;
        self.file_on_streaming_form = streaming;
        self.attachment = if cfg.is_shared {
            Attachment::SharedFile { file, map }
        } else {
            Attachment::UnsharedFile { file, map }
        };

        // No free chunk describes the (empty) slab vector yet; the first
        // reset_free_space_tracking is mandatory before any mutation.
        self.free_space_state = FreeSpaceState::Invalid;

        Ok(top_ref)
    }

    /// Attaches to a caller-owned buffer holding a database image and
    /// returns its top ref. The buffer stays owned by the caller and is
    /// untouched by [`Self::detach`].
    ///
    /// # Safety
    /// `data` must point to `size` bytes that stay valid and unmodified
    /// for as long as the allocator is attached to them.
    pub unsafe fn attach_buffer(&mut self, data: *mut u8, size: usize) -> Result<Ref, Error> {
        debug_assert!(!self.is_attached());

        let buf = unsafe { core::slice::from_raw_parts(data, size) };
        let validated = header::validate_buffer(buf, false)?;
        self.file_format = header::file_format(buf, header::select(buf));

        // Commit point; see attach_file.
        self.data = data;
        self.baseline = size;
        self.file_on_streaming_form = validated.streaming;
        self.attachment = Attachment::UsersBuffer;

        Ok(validated.top_ref)
    }

    /// Attaches to nothing: all refs will live in slabs. The baseline is a
    /// header-sized placeholder because no ref may ever be smaller than
    /// the file header.
    pub fn attach_empty(&mut self) {
        debug_assert!(!self.is_attached());

        self.attachment = Attachment::OwnedBuffer;
        self.data = ptr::null_mut();
        self.baseline = header::HEADER_SIZE;
    }

    /// Releases what the attach mode owns and leaves the allocator
    /// detached. Slab memory stays alive until the allocator is dropped.
    pub fn detach(&mut self) {
        // Dropping the attachment releases per-mode resources: file modes
        // unmap and close, a user's buffer is left alone, and the owned
        // arm has no baseline buffer to free.
        self.attachment = Attachment::None;
        self.data = ptr::null_mut();
    }

    /// Rebuilds the free lists so that every slab is one whole free chunk
    /// and marks tracking clean. Called after pending writes have moved to
    /// persistent space.
    pub fn reset_free_space_tracking(&mut self) -> Result<(), Error> {
        if self.free_space_state == FreeSpaceState::Clean {
            return Ok(());
        }

        self.free_read_only.clear();
        self.free_space.clear();

        if self.free_space.try_reserve(self.slabs.len()).is_err() {
            self.free_space_state = FreeSpaceState::Invalid;
            return Err(Error::OutOfMemory);
        }

        let mut ref_ = self.baseline;
        for slab in &self.slabs {
            self.free_space.push(Chunk {
                ref_,
                size: slab.ref_end - ref_,
            });
            ref_ = slab.ref_end;
        }

        #[cfg(debug_assertions)]
        assert!(self.is_all_free());

        self.free_space_state = FreeSpaceState::Clean;
        Ok(())
    }

    /// Follows growth of the underlying file: remaps it at `file_size`
    /// and rebases the slab ranges and their (clean) free chunks above
    /// the new baseline.
    ///
    /// Returns whether the mapping moved, in which case the caller must
    /// re-derive every pointer it holds.
    pub fn remap(&mut self, file_size: usize) -> Result<bool, Error> {
        debug_assert!(is_aligned(file_size, 8));
        debug_assert_eq!(self.free_space_state, FreeSpaceState::Clean);
        debug_assert!(self.baseline <= file_size);

        let (file, map) = match &mut self.attachment {
            Attachment::SharedFile { file, map } | Attachment::UnsharedFile { file, map } => {
                (file, map)
            }
            _ => {
                debug_assert!(false, "remap requires a file attachment");
                return Err(nix::errno::Errno::EBADF.into());
            }
        };

        let new_map = FileMap::map_read_only(file, file_size)?;
        let addr_changed = new_map.addr() != self.data;
        *map = new_map;
        self.data = map.addr();
        self.baseline = file_size;

        #[cfg(feature = "tracing")]
        tracing::debug!("remapped file at {file_size} bytes (moved: {addr_changed})");

        // Rebase slabs and free chunks in lockstep. Clean guarantees one
        // chunk per slab, in slab order, so both walks stay aligned.
        debug_assert_eq!(self.free_space.len(), self.slabs.len());
        let mut slab_ref = file_size;
        for (chunk, slab) in self.free_space.iter_mut().zip(&mut self.slabs) {
            chunk.ref_ = slab_ref;
            slab_ref += chunk.size;
            slab.ref_end = slab_ref;
        }

        Ok(addr_changed)
    }

    /// Converts a file in streaming form to the canonical dual-top-ref
    /// header, in place. Must be called (and succeeds exactly once) before
    /// the first mutation of such a file.
    ///
    /// The footer's top ref is copied into header slot 1 and flushed
    /// before the select bit flips to 1; a crash between the two leaves
    /// the footer authoritative, indistinguishable from never converting.
    ///
    /// # Panics
    /// If the file is not in streaming form, or the header/footer no
    /// longer match the streaming template.
    pub fn prepare_for_update(&mut self) -> Result<(), Error> {
        assert!(self.file_on_streaming_form);
        let file = match &self.attachment {
            Attachment::SharedFile { file, .. } | Attachment::UnsharedFile { file, .. } => file,
            _ => panic!("streaming conversion requires a file attachment"),
        };

        let mut wmap = FileMap::map_read_write(file, self.baseline)?;
        {
            let data = wmap.as_mut_slice();
            // Format and reserved bytes may differ; everything else must
            // still be the streaming template.
            assert!(header::matches_streaming_header(data));
            assert_eq!(header::footer_cookie(data), header::FOOTER_MAGIC_COOKIE);

            let top_ref = header::footer_top_ref(data);
            header::set_top_ref(data, 1, top_ref);
        }

        // The slot-1 copy must be durable before the select flip makes it
        // authoritative. In no-sync mode both are elided together.
        if !sync_to_disk_disabled() {
            wmap.sync()?;
        }

        let data = wmap.as_mut_slice();
        header::set_flags(data, header::flags(data) | header::FLAGS_SELECT_BIT);
        self.file_on_streaming_form = false;

        #[cfg(feature = "tracing")]
        tracing::debug!("converted streaming file to canonical header form");

        Ok(())
    }

    /// File format byte of the currently selected slot, read straight
    /// from the mapped header.
    pub fn get_committed_file_format(&self) -> u8 {
        debug_assert!(self.is_attached());
        debug_assert!(!self.data.is_null());

        let data = unsafe { core::slice::from_raw_parts(self.data, header::HEADER_SIZE) };
        header::file_format(data, header::select(data))
    }

    /// Free chunks of the immutable region, for reuse by the layer that
    /// rewrites the file.
    pub fn get_free_read_only(&self) -> Result<&[Chunk], Error> {
        if self.free_space_state == FreeSpaceState::Invalid {
            return Err(Error::InvalidFreeSpace);
        }
        Ok(&self.free_read_only)
    }

    #[cfg(test)]
    pub(crate) fn mutable_free_chunks(&self) -> &[Chunk] {
        &self.free_space
    }

    #[cfg(test)]
    pub(crate) fn slab_ref_ends(&self) -> Vec<Ref> {
        self.slabs.iter().map(|slab| slab.ref_end).collect()
    }
}

#[cfg(debug_assertions)]
impl SlabAlloc {
    /// Whether the mutable free list is exactly one whole-slab chunk per
    /// slab.
    pub fn is_all_free(&self) -> bool {
        if self.free_space.len() != self.slabs.len() {
            return false;
        }
        let mut slab_ref = self.baseline;
        for slab in &self.slabs {
            let slab_size = slab.ref_end - slab_ref;
            match self.free_space.iter().find(|chunk| chunk.ref_ == slab_ref) {
                Some(chunk) if chunk.size == slab_size => {}
                _ => return false,
            }
            slab_ref = slab.ref_end;
        }
        true
    }

    /// Asserts that every mutable free chunk lies entirely within one slab.
    pub fn verify(&self) {
        for chunk in &self.free_space {
            let i = self.slabs.partition_point(|slab| slab.ref_end <= chunk.ref_);
            assert!(i < self.slabs.len());
            assert!(chunk.ref_ + chunk.size <= self.slabs[i].ref_end);
        }
    }

    /// Dumps the attachment, slab ranges and free lists to stdout.
    pub fn print(&self) {
        let allocated_for_slabs = self
            .slabs
            .last()
            .map_or(0, |slab| slab.ref_end - self.baseline);
        let free: usize = self.free_space.iter().map(|chunk| chunk.size).sum();
        println!(
            "Attached: {} Allocated: {}",
            if self.data.is_null() { 0 } else { self.baseline },
            allocated_for_slabs - free
        );

        if !self.slabs.is_empty() {
            let mut first_ref = self.baseline;
            let entries: Vec<String> = self
                .slabs
                .iter()
                .map(|slab| {
                    let entry = format!(
                        "({}->{}, size={}, addr={:p})",
                        first_ref,
                        slab.ref_end - 1,
                        slab.ref_end - first_ref,
                        slab.addr.as_ptr()
                    );
                    first_ref = slab.ref_end;
                    entry
                })
                .collect();
            println!("Slabs: {}", entries.join(", "));
        }
        for (name, list) in [("FreeSpace", &self.free_space), ("FreeSpace (ro)", &self.free_read_only)] {
            if list.is_empty() {
                continue;
            }
            let entries: Vec<String> = list
                .iter()
                .map(|chunk| {
                    format!(
                        "({}->{}, size={})",
                        chunk.ref_,
                        chunk.ref_ + chunk.size - 1,
                        chunk.size
                    )
                })
                .collect();
            println!("{name}: {}", entries.join(", "));
        }
    }
}

impl Drop for SlabAlloc {
    fn drop(&mut self) {
        // Slab spans are implicit between consecutive ref_ends; remap
        // preserves them, so they still equal the allocation sizes.
        let mut prev_end = self.baseline;
        for slab in &self.slabs {
            let size = slab.ref_end - prev_end;
            unsafe {
                dealloc(slab.addr.as_ptr(), Layout::from_size_align_unchecked(size, 8));
            }
            prev_end = slab.ref_end;
        }
        self.slabs.clear();

        if self.is_attached() {
            self.detach();
        }
    }
}
