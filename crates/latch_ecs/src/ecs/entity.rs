//! Entity handles and the table resolving them to storage rows
//!
//! Entities are lightweight handles (8 bytes). The generation counter makes a
//! destroyed handle permanently invalid: an index is only handed out again
//! after its generation has been bumped, so a stale id never aliases a live
//! entity.

use std::fmt;

use crate::ecs::archetype::ArchetypeId;
use crate::ecs::error::StorageError;

/// Entity handle (generation-indexed for safety)
///
/// Format: [32-bit index | 32-bit generation]
/// - Index: slot in the `EntityLocationTable`
/// - Generation: incremented when the entity is destroyed
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Serialize to 64-bit integer (for networking/save files)
    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Deserialize from 64-bit integer
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Where an entity's row currently lives.
///
/// Only the `EntityId` is a stable identity. Row indices change whenever a
/// swap-back removal moves the last row of an allocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityLocation {
    pub archetype: ArchetypeId,
    pub allocation: u32,
    pub row: u32,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    location: Option<EntityLocation>,
}

/// Maps `EntityId::index` to the entity's current location.
///
/// Mutated only by the `EntityManager` during structural operations. Freed
/// indices are reused last-in first-out, which keeps id assignment
/// deterministic for a given sequence of operations.
#[derive(Clone, Debug, Default)]
pub struct EntityLocationTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl EntityLocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Reserve an id. It does not resolve until `set` gives it a location.
    pub fn allocate(&mut self) -> EntityId {
        if let Some(index) = self.free.pop() {
            let slot = &self.slots[index as usize];
            debug_assert!(slot.location.is_none());
            return EntityId::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            location: None,
        });
        EntityId::new(index, 0)
    }

    fn slot(&self, id: EntityId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }

    /// Resolve a live id to its location.
    pub fn get(&self, id: EntityId) -> Result<EntityLocation, StorageError> {
        self.slot(id)
            .and_then(|slot| slot.location)
            .ok_or(StorageError::StaleHandle { entity: id })
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.get(id).is_ok()
    }

    /// Record the location of an allocated id.
    pub(crate) fn set(&mut self, id: EntityId, location: EntityLocation) {
        let slot = &mut self.slots[id.index as usize];
        debug_assert_eq!(slot.generation, id.generation);
        if slot.location.is_none() {
            self.live += 1;
        }
        slot.location = Some(location);
    }

    /// Patch the row of an entity moved by a swap-back removal.
    pub(crate) fn set_row(&mut self, id: EntityId, row: u32) {
        if let Some(location) = self.slots[id.index as usize].location.as_mut() {
            location.row = row;
        }
    }

    /// Invalidate a live id, returning where it lived.
    pub(crate) fn release(&mut self, id: EntityId) -> Result<EntityLocation, StorageError> {
        let location = self.get(id)?;
        self.retire(id.index);
        self.live -= 1;
        Ok(location)
    }

    /// Give back an id that never received a location (failed placement).
    pub(crate) fn abandon(&mut self, id: EntityId) {
        if let Some(slot) = self.slot(id) {
            if slot.location.is_none() {
                self.retire(id.index);
            }
        }
    }

    fn retire(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.generation = slot.generation.wrapping_add(1);
        slot.location = None;
        self.free.push(index);
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live entities with their locations, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, EntityLocation)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.location
                .map(|location| (EntityId::new(index as u32, slot.generation), location))
        })
    }

    /// Current generation of every slot, live or free.
    pub fn generations(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots.iter().map(|slot| slot.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(row: u32) -> EntityLocation {
        EntityLocation {
            archetype: ArchetypeId::new(0),
            allocation: 0,
            row,
        }
    }

    #[test]
    fn bits_round_trip() {
        let id = EntityId::new(42, 7);
        assert_eq!(EntityId::from_bits(id.to_bits()), id);
        assert_eq!(id.to_string(), "42v7");
    }

    #[test]
    fn reserved_ids_do_not_resolve_until_placed() {
        let mut table = EntityLocationTable::new();
        let id = table.allocate();
        assert_eq!(table.get(id), Err(StorageError::StaleHandle { entity: id }));
        table.set(id, location(3));
        assert_eq!(table.get(id).unwrap().row, 3);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn released_index_is_reused_with_a_new_generation() {
        let mut table = EntityLocationTable::new();
        let first = table.allocate();
        table.set(first, location(0));
        table.release(first).unwrap();
        assert!(!table.is_alive(first));

        let second = table.allocate();
        assert_eq!(second.index(), first.index());
        assert_eq!(second.generation(), first.generation() + 1);
        table.set(second, location(0));
        assert!(table.is_alive(second));
        assert!(table.get(first).is_err());
        assert!(table.release(first).is_err());
    }

    #[test]
    fn abandoned_ids_are_invalidated() {
        let mut table = EntityLocationTable::new();
        let id = table.allocate();
        table.abandon(id);
        let next = table.allocate();
        assert_eq!(next.index(), id.index());
        assert_ne!(next, id);
        assert!(table.is_empty());
    }

    #[test]
    fn iter_lists_live_entities() {
        let mut table = EntityLocationTable::with_capacity(4);
        let ids: Vec<_> = (0..3).map(|_| table.allocate()).collect();
        for (row, id) in ids.iter().enumerate() {
            table.set(*id, location(row as u32));
        }
        table.release(ids[1]).unwrap();
        let live: Vec<_> = table.iter().map(|(id, _)| id).collect();
        assert_eq!(live, vec![ids[0], ids[2]]);
        assert_eq!(table.generations().collect::<Vec<_>>(), vec![0, 1, 0]);
    }
}
