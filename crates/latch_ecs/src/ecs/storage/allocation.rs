// allocation.rs - Fixed-capacity chunks of entity rows
//
// An allocation holds up to `capacity` entities of one archetype in a single
// block: one dense column per fragment plus the chunk-wide values. Rows are
// kept gap-free; removal moves the last row into the hole.

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use thiserror::Error;

use crate::ecs::archetype::{ArchetypeId, ArchetypeLayout, ColumnLayout};
use crate::ecs::component::{Component, ComponentTypeId};
use crate::ecs::entity::EntityId;
use crate::ecs::error::StorageError;
use crate::ecs::mask::ComponentMask;
use crate::ecs::storage::block::RawBlock;
use crate::ecs::storage::shared::SharedValueSet;

/// Stable address of an allocation inside an `EntityManager`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationHandle {
    pub archetype: ArchetypeId,
    pub allocation: u32,
}

impl fmt::Display for AllocationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/chunk{}", self.archetype, self.allocation)
    }
}

/// `insert_row` on an allocation with no free row. The archetype recovers by
/// creating a new allocation, so this never leaves the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("allocation is full ({capacity} rows)")]
pub struct AllocationFull {
    pub capacity: u32,
}

pub struct Allocation {
    layout: Arc<ArchetypeLayout>,
    block: RawBlock,
    entities: Vec<EntityId>,
    serial: u64,
    shared: SharedValueSet,
}

impl Allocation {
    /// Reserve a block for `layout` and default-initialise its chunk values.
    pub fn new(layout: Arc<ArchetypeLayout>, shared: SharedValueSet) -> Result<Self, StorageError> {
        let mut block = RawBlock::zeroed(layout.block_size, layout.block_align)?;
        for value in &layout.chunk_values {
            let bytes = block.as_mut_slice();
            (value.default_init)(&mut bytes[value.offset..value.offset + value.stride]);
        }
        Ok(Self {
            entities: Vec::with_capacity(layout.capacity as usize),
            layout,
            block,
            serial: 0,
            shared,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.layout.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entities.len() >= self.layout.capacity as usize
    }

    /// Change counter, bumped on every row insertion or removal.
    #[inline]
    pub fn serial(&self) -> u64 {
        self.serial
    }

    #[inline]
    pub fn mask(&self) -> &ComponentMask {
        &self.layout.mask
    }

    pub fn layout(&self) -> &Arc<ArchetypeLayout> {
        &self.layout
    }

    /// Entity ids, row-aligned with every column.
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn shared_values(&self) -> &SharedValueSet {
        &self.shared
    }

    pub fn reserved_bytes(&self) -> usize {
        self.block.len()
    }

    /// Append a default-initialised row for `entity`.
    pub(crate) fn insert_row(&mut self, entity: EntityId) -> Result<u32, AllocationFull> {
        if self.is_full() {
            return Err(AllocationFull {
                capacity: self.layout.capacity,
            });
        }
        let row = self.entities.len();
        self.entities.push(entity);
        let bytes = self.block.as_mut_slice();
        for column in &self.layout.columns {
            let start = column.offset + row * column.stride;
            (column.default_init)(&mut bytes[start..start + column.stride]);
        }
        self.serial += 1;
        Ok(row as u32)
    }

    /// Remove `row`, filling the hole with the last row.
    ///
    /// Returns the entity that now occupies `row`, if one was moved. Its
    /// location has to be patched by the caller.
    pub(crate) fn remove_row_swap_back(&mut self, row: u32) -> Option<EntityId> {
        let row = row as usize;
        assert!(row < self.entities.len(), "row {row} out of bounds");
        let last = self.entities.len() - 1;
        if row != last {
            let bytes = self.block.as_mut_slice();
            for column in &self.layout.columns {
                let src = column.offset + last * column.stride;
                let dst = column.offset + row * column.stride;
                bytes.copy_within(src..src + column.stride, dst);
            }
        }
        self.entities.swap_remove(row);
        self.serial += 1;
        (row != last).then(|| self.entities[row])
    }

    fn column_range(&self, column: &ColumnLayout) -> std::ops::Range<usize> {
        column.offset..column.offset + column.stride * self.entities.len()
    }

    /// Occupied bytes of a fragment column.
    pub fn column_bytes(&self, component: ComponentTypeId) -> Option<&[u8]> {
        let column = self.layout.column(component)?;
        Some(&self.block.as_slice()[self.column_range(column)])
    }

    pub fn column_bytes_mut(&mut self, component: ComponentTypeId) -> Option<&mut [u8]> {
        let range = self.column_range(self.layout.column(component)?);
        Some(&mut self.block.as_mut_slice()[range])
    }

    /// Typed fragment column. The caller checks that `T` is the registered type.
    pub fn column<T: Component>(&self, component: ComponentTypeId) -> Option<&[T]> {
        self.column_bytes(component).map(bytemuck::cast_slice)
    }

    pub fn column_mut<T: Component>(&mut self, component: ComponentTypeId) -> Option<&mut [T]> {
        self.column_bytes_mut(component).map(bytemuck::cast_slice_mut)
    }

    pub fn row_bytes(&self, component: ComponentTypeId, row: u32) -> Option<&[u8]> {
        let stride = self.layout.column(component)?.stride;
        let start = row as usize * stride;
        self.column_bytes(component)?.get(start..start + stride)
    }

    pub fn row_bytes_mut(&mut self, component: ComponentTypeId, row: u32) -> Option<&mut [u8]> {
        let stride = self.layout.column(component)?.stride;
        let start = row as usize * stride;
        self.column_bytes_mut(component)?.get_mut(start..start + stride)
    }

    pub fn chunk_value_bytes(&self, component: ComponentTypeId) -> Option<&[u8]> {
        let value = self.layout.chunk_value(component)?;
        Some(&self.block.as_slice()[value.offset..value.offset + value.stride])
    }

    pub fn chunk_value_bytes_mut(&mut self, component: ComponentTypeId) -> Option<&mut [u8]> {
        let value = self.layout.chunk_value(component)?;
        let range = value.offset..value.offset + value.stride;
        Some(&mut self.block.as_mut_slice()[range])
    }

    /// Pointer to the start of the block, for binding several disjoint
    /// column views at once. Requires exclusive access to stay sound.
    pub(crate) fn base_ptr_mut(&mut self) -> NonNull<u8> {
        self.block.base_ptr()
    }
}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocation")
            .field("mask", &self.layout.mask)
            .field("len", &self.entities.len())
            .field("capacity", &self.layout.capacity)
            .field("serial", &self.serial)
            .finish()
    }
}
