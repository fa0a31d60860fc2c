// block.rs - Aligned, zero-initialised byte arenas
//
// Every allocation (chunk) and every shared value lives in one RawBlock.
// Columns are byte ranges inside the block; typed access goes through
// bytemuck so a misaligned or mis-sized view panics instead of being UB.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use crate::ecs::error::StorageError;

/// A fixed-size heap block with a guaranteed alignment.
pub struct RawBlock {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: RawBlock owns its memory exclusively. Mutation requires `&mut`,
// and the bytes are plain data with no thread affinity.
unsafe impl Send for RawBlock {}
unsafe impl Sync for RawBlock {}

impl RawBlock {
    /// Allocate `size` zeroed bytes aligned to `align`.
    ///
    /// Fails with `OutOfMemory` if the allocator returns null or the layout
    /// itself cannot be represented.
    pub fn zeroed(size: usize, align: usize) -> Result<Self, StorageError> {
        let layout = Layout::from_size_align(size, align)
            .map_err(|_| StorageError::OutOfMemory { bytes: size })?;

        if size == 0 {
            // Zero-sized blocks never touch the allocator; any non-null
            // pointer aligned to `align` is valid for empty slices.
            let dangling = std::ptr::null_mut::<u8>().wrapping_add(align);
            let ptr = NonNull::new(dangling).ok_or(StorageError::OutOfMemory { bytes: 0 })?;
            return Ok(Self { ptr, layout });
        }

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(StorageError::OutOfMemory { bytes: size })?;
        Ok(Self { ptr, layout })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.layout.align()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for `len` initialised (zeroed) bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) }
    }

    /// Base pointer for splitting the block into disjoint column views.
    #[inline]
    pub(crate) fn base_ptr(&self) -> NonNull<u8> {
        self.ptr
    }
}

impl Drop for RawBlock {
    fn drop(&mut self) {
        if self.layout.size() != 0 {
            // SAFETY: allocated in `zeroed` with this exact layout.
            unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
        }
    }
}

impl std::fmt::Debug for RawBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawBlock")
            .field("size", &self.layout.size())
            .field("align", &self.layout.align())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_zeroed_and_aligned() {
        let block = RawBlock::zeroed(256, 64).unwrap();
        assert_eq!(block.len(), 256);
        assert_eq!(block.as_slice().as_ptr() as usize % 64, 0);
        assert!(block.as_slice().iter().all(|b| *b == 0));
    }

    #[test]
    fn zero_sized_blocks_do_not_allocate() {
        let mut block = RawBlock::zeroed(0, 16).unwrap();
        assert!(block.is_empty());
        assert!(block.as_mut_slice().is_empty());
        assert_eq!(block.base_ptr().as_ptr() as usize % 16, 0);
    }

    #[test]
    fn unrepresentable_layouts_are_out_of_memory() {
        let err = RawBlock::zeroed(usize::MAX, 8).unwrap_err();
        assert_eq!(err, StorageError::OutOfMemory { bytes: usize::MAX });
    }
}
