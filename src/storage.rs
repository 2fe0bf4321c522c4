// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Raw chunked column storage.
//!
//! `Vec<u8>` alone only guarantees 1-byte alignment, which is not
//! enough for arbitrary component types, so each column is backed by
//! manually allocated chunks sized to the component's own alignment.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use crate::error::{EcsError, Result};

/// Round `value` up to the nearest multiple of `alignment`, which must
/// be a power of two.
fn align_to(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

/// Target bytes per chunk. Chosen, not derived from the source (§9 open
/// question 3 leaves this unspecified); 16 KiB keeps a chunk within a
/// few pages for typical component sizes while bounding per-archetype
/// memory for archetypes with very large components.
pub const TARGET_CHUNK_BYTES: usize = 16 * 1024;

/// Pick a chunk capacity (entities per chunk) so that `sum_of_component_sizes
/// * capacity` is close to [`TARGET_CHUNK_BYTES`], never less than 1.
pub fn choose_chunk_capacity(sum_of_component_sizes: usize) -> usize {
    if sum_of_component_sizes == 0 {
        return TARGET_CHUNK_BYTES;
    }
    (TARGET_CHUNK_BYTES / sum_of_component_sizes).max(1)
}

/// Layout of a single component column: element size and alignment.
#[derive(Debug, Clone, Copy)]
pub struct ColumnLayout {
    pub size: usize,
    pub align: usize,
}

/// One fixed-capacity, correctly aligned allocation holding up to
/// `capacity` elements of a single component's byte representation.
struct RawChunk {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl RawChunk {
    fn alloc(column: ColumnLayout, capacity: usize) -> Result<Self> {
        let align = column.align.max(1);
        let size = column.size.checked_mul(capacity).ok_or(EcsError::ArchetypeAllocationFailed)?;
        // Layout requires a non-zero size for `alloc`; zero-sized
        // components get a 1-byte placeholder allocation that is never
        // read through (size 0 columns never get indexed).
        let alloc_size = align_to(size.max(1), align);
        let layout = Layout::from_size_align(alloc_size, align)
            .map_err(|_| EcsError::ArchetypeAllocationFailed)?;
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(EcsError::ArchetypeAllocationFailed)?;
        Ok(Self { ptr, layout })
    }

    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for RawChunk {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// A single component's storage, split into fixed-capacity chunks.
///
/// Does **not** run component destructors on drop: callers (the
/// archetype) own the responsibility of destroying live elements via
/// the registered lifecycle callbacks before a column's bytes are
/// reclaimed or reused, matching the split between `DataStorage`
/// (raw bytes) and the archetype (lifecycle) in §4.2/§4.3.
pub struct RawChunkColumn {
    layout: ColumnLayout,
    chunk_capacity: usize,
    chunks: Vec<RawChunk>,
}

impl RawChunkColumn {
    pub fn new(layout: ColumnLayout, chunk_capacity: usize) -> Self {
        Self {
            layout,
            chunk_capacity: chunk_capacity.max(1),
            chunks: Vec::new(),
        }
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Ensure chunk storage exists to hold `storage_index`, allocating
    /// whole chunks as needed.
    pub fn ensure_capacity(&mut self, storage_index: usize) -> Result<()> {
        let needed_chunk = storage_index / self.chunk_capacity;
        while self.chunks.len() <= needed_chunk {
            self.chunks.push(RawChunk::alloc(self.layout, self.chunk_capacity)?);
        }
        Ok(())
    }

    /// Address of the cell at `storage_index`. Caller must have called
    /// `ensure_capacity` for an index at least this large.
    ///
    /// # Safety
    /// `storage_index` must address a chunk that has been allocated.
    pub unsafe fn get_unchecked(&self, storage_index: usize) -> *mut u8 {
        let chunk = storage_index / self.chunk_capacity;
        let offset = storage_index % self.chunk_capacity;
        self.chunks[chunk].as_ptr().add(offset * self.layout.size)
    }

    /// Safe indexed access: returns `None` if the index falls outside
    /// allocated chunks, matching `get_data<Safety>`'s safe-mode
    /// null-on-out-of-range contract.
    pub fn get(&self, storage_index: usize) -> Option<*mut u8> {
        let chunk = storage_index / self.chunk_capacity;
        if chunk >= self.chunks.len() {
            return None;
        }
        Some(unsafe { self.get_unchecked(storage_index) })
    }

    /// Drop all chunks, returning the column to empty. The archetype
    /// must have already destroyed every live element.
    pub fn clear_chunks(&mut self) {
        self.chunks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_to_rounds_up_to_the_next_multiple() {
        assert_eq!(align_to(0, 8), 0);
        assert_eq!(align_to(1, 8), 8);
        assert_eq!(align_to(7, 8), 8);
        assert_eq!(align_to(8, 8), 8);
        assert_eq!(align_to(9, 8), 16);
    }

    #[test]
    fn chunk_capacity_targets_budget() {
        let cap = choose_chunk_capacity(64);
        assert!(cap >= 1);
        assert!(cap * 64 <= TARGET_CHUNK_BYTES || cap == 1);
    }

    #[test]
    fn column_grows_across_chunk_boundary() {
        let layout = ColumnLayout { size: 4, align: 4 };
        let mut col = RawChunkColumn::new(layout, 4);
        for i in 0..10 {
            col.ensure_capacity(i).unwrap();
            let ptr = col.get(i).unwrap() as *mut u32;
            unsafe { ptr.write(i as u32) };
        }
        assert_eq!(col.chunk_count(), 3);
        for i in 0..10 {
            let ptr = col.get(i).unwrap() as *const u32;
            assert_eq!(unsafe { *ptr }, i as u32);
        }
    }

    #[test]
    fn out_of_range_is_none() {
        let layout = ColumnLayout { size: 4, align: 4 };
        let col = RawChunkColumn::new(layout, 4);
        assert!(col.get(0).is_none());
    }
}
