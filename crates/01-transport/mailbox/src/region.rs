//! Memory mapping helpers for the guest address space.
//!
//! The bus spans several megabytes of which only the worker windows and the
//! mailbox are normally touched, so native targets prefer anonymous `mmap`
//! regions (pages commit lazily). When that is not possible, or on
//! WebAssembly, we fall back to zeroed heap allocations while honoring the
//! requested alignment.

use crate::{MailboxError, MailboxResult};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

#[cfg(not(target_arch = "wasm32"))]
type NativeMap = memmap2::MmapMut;

#[derive(Debug)]
enum Backing {
    /// Held only so the mapping is unmapped when the region drops.
    #[cfg(not(target_arch = "wasm32"))]
    Native(#[allow(dead_code)] NativeMap),
    Owned { layout: Layout },
}

/// Zero-initialised, contiguous backing memory.
///
/// The base pointer is captured once at construction; every view handed out
/// later derives from it, so the region never needs `&mut self` to be written.
#[derive(Debug)]
pub struct SharedRegion {
    ptr: NonNull<u8>,
    len: usize,
    backing: Backing,
}

impl SharedRegion {
    /// Allocates a zeroed region of `len` bytes aligned to `alignment`.
    ///
    /// On native builds we first try to satisfy the request via `mmap`. If the
    /// returned pointer is not suitably aligned, we fall back to the heap.
    pub fn new_zeroed(len: usize, alignment: usize) -> MailboxResult<Self> {
        if len == 0 || alignment == 0 || !alignment.is_power_of_two() {
            return Err(MailboxError::AllocationFailed {
                size: len,
                alignment,
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Some(region) = Self::mmap_backed(len, alignment)? {
                return Ok(region);
            }
        }

        Self::heap_backed(len, alignment)
    }

    fn heap_backed(len: usize, alignment: usize) -> MailboxResult<Self> {
        let layout = Layout::from_size_align(len, alignment).map_err(|_| {
            MailboxError::AllocationFailed {
                size: len,
                alignment,
            }
        })?;

        // SAFETY: `layout` has a non-zero size (checked by `new_zeroed`).
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(MailboxError::AllocationFailed {
            size: len,
            alignment,
        })?;
        Ok(Self {
            ptr,
            len,
            backing: Backing::Owned { layout },
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn mmap_backed(len: usize, alignment: usize) -> MailboxResult<Option<Self>> {
        let mut map = memmap2::MmapOptions::new()
            .len(len)
            .map_anon()
            .map_err(|_| MailboxError::AllocationFailed {
                size: len,
                alignment,
            })?;

        let raw = map.as_mut_ptr();
        if raw as usize % alignment != 0 {
            return Ok(None);
        }
        let ptr = NonNull::new(raw).ok_or(MailboxError::AllocationFailed {
            size: len,
            alignment,
        })?;

        // Anonymous mappings are zero-filled by the kernel.
        Ok(Some(Self {
            ptr,
            len,
            backing: Backing::Native(map),
        }))
    }

    /// Total number of bytes managed by this region.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when the region has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base pointer of the region, valid for `len` bytes while `self` lives.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if let Backing::Owned { layout } = &self.backing {
            // SAFETY: `ptr` was returned by `alloc_zeroed(layout)` and is freed exactly once.
            unsafe {
                dealloc(self.ptr.as_ptr(), *layout);
            }
        }
    }
}
