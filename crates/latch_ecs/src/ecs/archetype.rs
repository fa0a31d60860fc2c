// archetype.rs - Archetype identification and column layout
//
// An archetype is a unique set of component types. Every allocation of an
// archetype shares one layout: per-entity columns packed back to back in a
// single block, followed by chunk-wide values.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ecs::component::{ComponentKind, ComponentRegistry, ComponentTypeId};
use crate::ecs::entity::EntityId;
use crate::ecs::error::StorageError;
use crate::ecs::mask::ComponentMask;
use crate::ecs::storage::{Allocation, AllocationFull, SharedValueSet};

/// Index of an archetype in creation order. Never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "archetype{}", self.0)
    }
}

/// Placement of one component inside an allocation block.
#[derive(Clone, Debug)]
pub struct ColumnLayout {
    pub component: ComponentTypeId,
    /// Byte offset of the column (or chunk value) from the block start.
    pub offset: usize,
    /// Bytes per element.
    pub stride: usize,
    pub default_init: fn(&mut [u8]),
}

/// Memory plan shared by every allocation of an archetype.
#[derive(Clone, Debug)]
pub struct ArchetypeLayout {
    pub mask: ComponentMask,
    /// Rows per allocation.
    pub capacity: u32,
    /// Per-entity columns, ascending by component id.
    pub columns: Vec<ColumnLayout>,
    /// One value per allocation, ascending by component id.
    pub chunk_values: Vec<ColumnLayout>,
    /// Shared components; their values live in the `SharedValueStore`.
    pub shared: Vec<ComponentTypeId>,
    pub block_size: usize,
    pub block_align: usize,
}

fn align_up(offset: usize, align: usize) -> Option<usize> {
    offset.checked_add(align - 1).map(|v| v & !(align - 1))
}

impl ArchetypeLayout {
    /// Lay out `mask` for allocations holding `capacity` rows.
    pub fn plan(
        mask: ComponentMask,
        registry: &ComponentRegistry,
        capacity: u32,
    ) -> Result<Self, StorageError> {
        let overflow = StorageError::OutOfMemory { bytes: usize::MAX };
        let mut columns = Vec::new();
        let mut chunk_values = Vec::new();
        let mut shared = Vec::new();
        let mut cursor = 0usize;
        let mut block_align = 1usize;

        for component in mask.iter() {
            let info = registry
                .info(component)
                .ok_or(StorageError::UnknownComponent { component })?;
            let bytes = match info.kind {
                ComponentKind::Tag => continue,
                ComponentKind::Shared => {
                    shared.push(component);
                    continue;
                }
                ComponentKind::Fragment => info
                    .size
                    .checked_mul(capacity as usize)
                    .ok_or(overflow.clone())?,
                ComponentKind::Chunk => info.size,
            };

            let offset = align_up(cursor, info.align).ok_or(overflow.clone())?;
            cursor = offset.checked_add(bytes).ok_or(overflow.clone())?;
            block_align = block_align.max(info.align);

            let column = ColumnLayout {
                component,
                offset,
                stride: info.size,
                default_init: info.default_init,
            };
            if info.kind == ComponentKind::Fragment {
                columns.push(column);
            } else {
                chunk_values.push(column);
            }
        }

        Ok(Self {
            mask,
            capacity,
            columns,
            chunk_values,
            shared,
            block_size: cursor,
            block_align,
        })
    }

    pub fn column(&self, component: ComponentTypeId) -> Option<&ColumnLayout> {
        self.columns
            .binary_search_by_key(&component, |c| c.component)
            .ok()
            .map(|i| &self.columns[i])
    }

    pub fn chunk_value(&self, component: ComponentTypeId) -> Option<&ColumnLayout> {
        self.chunk_values
            .binary_search_by_key(&component, |c| c.component)
            .ok()
            .map(|i| &self.chunk_values[i])
    }

    /// Bytes of per-entity data in one row.
    pub fn row_size(&self) -> usize {
        self.columns.iter().map(|c| c.stride).sum()
    }
}

/// A unique component mask and the allocations holding its entities.
#[derive(Debug)]
pub struct Archetype {
    id: ArchetypeId,
    layout: Arc<ArchetypeLayout>,
    allocations: Vec<Allocation>,
    /// Allocations with at least one free row, per shared value set. The
    /// last entry of each list is the one filled next.
    vacancies: HashMap<SharedValueSet, Vec<u32>>,
}

impl Archetype {
    pub fn new(id: ArchetypeId, layout: ArchetypeLayout) -> Self {
        Self {
            id,
            layout: Arc::new(layout),
            allocations: Vec::new(),
            vacancies: HashMap::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    #[inline]
    pub fn mask(&self) -> &ComponentMask {
        &self.layout.mask
    }

    #[inline]
    pub fn layout(&self) -> &Arc<ArchetypeLayout> {
        &self.layout
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    pub(crate) fn allocations_mut(&mut self) -> &mut [Allocation] {
        &mut self.allocations
    }

    pub fn allocation(&self, index: u32) -> Option<&Allocation> {
        self.allocations.get(index as usize)
    }

    pub fn entity_count(&self) -> usize {
        self.allocations.iter().map(Allocation::len).sum()
    }

    /// Index of an allocation bound to `shared` with a free row, creating a
    /// new allocation when every existing one is full. The flag reports
    /// whether an allocation was created.
    pub fn find_or_create_allocation_with_space(
        &mut self,
        shared: &SharedValueSet,
    ) -> Result<(u32, bool), StorageError> {
        if let Some(free) = self.vacancies.get_mut(shared) {
            while let Some(&index) = free.last() {
                if !self.allocations[index as usize].is_full() {
                    return Ok((index, false));
                }
                free.pop();
            }
        }
        let allocation = Allocation::new(Arc::clone(&self.layout), shared.clone())?;
        let index = self.allocations.len() as u32;
        self.allocations.push(allocation);
        self.vacancies.entry(shared.clone()).or_default().push(index);
        Ok((index, true))
    }

    /// Append a row for `entity` to allocation `index`, retiring the
    /// allocation from the vacancy list once it fills up.
    pub(crate) fn insert_row(&mut self, index: u32, entity: EntityId) -> Result<u32, AllocationFull> {
        let allocation = &mut self.allocations[index as usize];
        let result = allocation.insert_row(entity);
        if allocation.is_full() {
            if let Some(free) = self.vacancies.get_mut(allocation.shared_values()) {
                if free.last() == Some(&index) {
                    free.pop();
                } else {
                    free.retain(|&i| i != index);
                }
            }
        }
        result
    }

    /// Swap-remove `row` of allocation `index`. An allocation that was full
    /// becomes a vacancy again.
    pub(crate) fn remove_row_swap_back(&mut self, index: u32, row: u32) -> Option<EntityId> {
        let allocation = &mut self.allocations[index as usize];
        let was_full = allocation.is_full();
        let moved = allocation.remove_row_swap_back(row);
        if was_full {
            self.vacancies
                .entry(allocation.shared_values().clone())
                .or_default()
                .push(index);
        }
        moved
    }

    /// Number of allocations bound to `shared` that can take another row.
    pub fn vacant_allocations(&self, shared: &SharedValueSet) -> usize {
        self.vacancies.get(shared).map_or(0, |free| {
            free.iter()
                .filter(|&&i| !self.allocations[i as usize].is_full())
                .count()
        })
    }

    /// Drop every empty allocation, returning the bytes released. Indices of
    /// the remaining allocations shift down, so entity locations must be
    /// rewritten afterwards.
    pub(crate) fn release_empty_allocations(&mut self) -> (usize, usize) {
        let before = self.allocations.len();
        let mut bytes = 0;
        self.allocations.retain(|a| {
            if a.is_empty() {
                bytes += a.reserved_bytes();
                false
            } else {
                true
            }
        });

        self.vacancies.clear();
        for (index, allocation) in self.allocations.iter().enumerate() {
            if !allocation.is_full() {
                self.vacancies
                    .entry(allocation.shared_values().clone())
                    .or_default()
                    .push(index as u32);
            }
        }
        (before - self.allocations.len(), bytes)
    }
}
