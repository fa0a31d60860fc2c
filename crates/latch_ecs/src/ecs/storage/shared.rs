// shared.rs - Shared component values
//
// A shared component stores one value per distinct value rather than one per
// entity. Allocations reference the values they were created for, and every
// entity in an allocation sees the same value. Values are deduplicated by
// their bytes so equal values land in the same allocations.

use std::collections::HashMap;
use std::ptr::NonNull;

use crate::ecs::component::{Component, ComponentTypeId};
use crate::ecs::error::StorageError;
use crate::ecs::storage::block::RawBlock;

/// Index of a value in the `SharedValueStore`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SharedValueHandle(u32);

impl SharedValueHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The shared values an allocation is bound to, sorted by component id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SharedValueSet {
    entries: Vec<(ComponentTypeId, SharedValueHandle)>,
}

impl SharedValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, component: ComponentTypeId) -> Option<SharedValueHandle> {
        self.entries
            .binary_search_by_key(&component, |(id, _)| *id)
            .ok()
            .map(|i| self.entries[i].1)
    }

    /// Bind `component` to `handle`, replacing any previous binding.
    pub fn insert(&mut self, component: ComponentTypeId, handle: SharedValueHandle) {
        match self.entries.binary_search_by_key(&component, |(id, _)| *id) {
            Ok(i) => self.entries[i].1 = handle,
            Err(i) => self.entries.insert(i, (component, handle)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentTypeId, SharedValueHandle)> + '_ {
        self.entries.iter().copied()
    }
}

#[derive(Debug)]
struct SharedSlot {
    component: ComponentTypeId,
    block: RawBlock,
}

/// Owner of every shared value used by an `EntityManager`.
///
/// Values live as long as the manager; a value no allocation references any
/// more is kept so its handle stays valid.
#[derive(Debug, Default)]
pub struct SharedValueStore {
    slots: Vec<SharedSlot>,
    by_component: HashMap<ComponentTypeId, Vec<SharedValueHandle>>,
}

impl SharedValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the value equal to `bytes`, storing it if it is new.
    pub fn intern(
        &mut self,
        component: ComponentTypeId,
        bytes: &[u8],
        align: usize,
    ) -> Result<SharedValueHandle, StorageError> {
        let existing = self.by_component.get(&component).and_then(|handles| {
            handles
                .iter()
                .copied()
                .find(|handle| self.slots[handle.index()].block.as_slice() == bytes)
        });
        if let Some(handle) = existing {
            return Ok(handle);
        }

        let mut block = RawBlock::zeroed(bytes.len(), align)?;
        block.as_mut_slice().copy_from_slice(bytes);
        let handle = SharedValueHandle(self.slots.len() as u32);
        self.slots.push(SharedSlot { component, block });
        self.by_component.entry(component).or_default().push(handle);
        Ok(handle)
    }

    pub fn component(&self, handle: SharedValueHandle) -> Option<ComponentTypeId> {
        self.slots.get(handle.index()).map(|slot| slot.component)
    }

    pub fn bytes(&self, handle: SharedValueHandle) -> Option<&[u8]> {
        self.slots.get(handle.index()).map(|slot| slot.block.as_slice())
    }

    pub fn bytes_mut(&mut self, handle: SharedValueHandle) -> Option<&mut [u8]> {
        self.slots
            .get_mut(handle.index())
            .map(|slot| slot.block.as_mut_slice())
    }

    /// Typed view of a value. The caller checks that `T` is the registered type.
    pub fn get<T: Component>(&self, handle: SharedValueHandle) -> Option<&T> {
        self.bytes(handle).map(bytemuck::from_bytes)
    }

    pub(crate) fn value_ptr(&self, handle: SharedValueHandle) -> Option<NonNull<u8>> {
        self.slots.get(handle.index()).map(|slot| slot.block.base_ptr())
    }

    /// Number of distinct values stored.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_share_a_handle() {
        let mut store = SharedValueStore::new();
        let team = ComponentTypeId::new(1);
        let other = ComponentTypeId::new(2);
        let red = store.intern(team, &7u32.to_ne_bytes(), 4).unwrap();
        let blue = store.intern(team, &9u32.to_ne_bytes(), 4).unwrap();
        let red_again = store.intern(team, &7u32.to_ne_bytes(), 4).unwrap();
        let other_red = store.intern(other, &7u32.to_ne_bytes(), 4).unwrap();

        assert_eq!(red, red_again);
        assert_ne!(red, blue);
        assert_ne!(red, other_red);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get::<u32>(blue), Some(&9));
        assert_eq!(store.component(other_red), Some(other));
    }

    #[test]
    fn sets_stay_sorted_and_replace_bindings() {
        let mut set = SharedValueSet::new();
        set.insert(ComponentTypeId::new(5), SharedValueHandle(0));
        set.insert(ComponentTypeId::new(2), SharedValueHandle(1));
        set.insert(ComponentTypeId::new(5), SharedValueHandle(3));
        let ids: Vec<u16> = set.iter().map(|(id, _)| id.raw()).collect();
        assert_eq!(ids, vec![2, 5]);
        assert_eq!(set.get(ComponentTypeId::new(5)), Some(SharedValueHandle(3)));
        assert_eq!(set.get(ComponentTypeId::new(9)), None);
    }
}
