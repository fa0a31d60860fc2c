// iter.rs - Lazy, filtered traversal of allocations
//
// Iterators scan archetypes in creation order and yield each non-empty
// allocation whose mask matches the filter. Each iterator holds an
// IterationGuard for its whole lifetime, so the manager knows a traversal is
// in progress until the iterator is dropped.

use std::slice;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ecs::archetype::{Archetype, ArchetypeId};
use crate::ecs::filter::ComponentFilter;
use crate::ecs::storage::{Allocation, AllocationHandle};

/// Registers one traversal with a manager's iteration counter.
///
/// Created by `AllocationIterator::new`; dropping it unregisters exactly once.
/// Moving the guard (or the iterator holding it) moves the obligation.
#[derive(Debug)]
pub struct IterationGuard<'m> {
    depth: &'m AtomicU32,
}

impl<'m> IterationGuard<'m> {
    pub(crate) fn begin(depth: &'m AtomicU32) -> Self {
        depth.fetch_add(1, Ordering::AcqRel);
        Self { depth }
    }
}

impl Drop for IterationGuard<'_> {
    fn drop(&mut self) {
        let released = self
            .depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| depth.checked_sub(1));
        // A stray end_iteration already took this guard's count.
        if released.is_err() && !std::thread::panicking() {
            panic!("iteration counter underflow: end_iteration called without a matching begin_iteration");
        }
    }
}

/// Read-only cursor over matching allocations.
pub struct AllocationIterator<'m> {
    _guard: IterationGuard<'m>,
    filter: ComponentFilter,
    archetypes: slice::Iter<'m, Archetype>,
    current: Option<(ArchetypeId, slice::Iter<'m, Allocation>, u32)>,
}

impl<'m> AllocationIterator<'m> {
    pub(crate) fn new(
        depth: &'m AtomicU32,
        archetypes: &'m [Archetype],
        filter: ComponentFilter,
    ) -> Self {
        Self {
            _guard: IterationGuard::begin(depth),
            filter,
            archetypes: archetypes.iter(),
            current: None,
        }
    }
}

impl<'m> Iterator for AllocationIterator<'m> {
    type Item = (AllocationHandle, &'m Allocation);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((archetype, allocations, index)) = self.current.as_mut() {
                for allocation in allocations.by_ref() {
                    let handle = AllocationHandle {
                        archetype: *archetype,
                        allocation: *index,
                    };
                    *index += 1;
                    if !allocation.is_empty() {
                        return Some((handle, allocation));
                    }
                }
            }
            let archetype = self.archetypes.find(|a| self.filter.matches(a.mask()))?;
            self.current = Some((archetype.id(), archetype.allocations().iter(), 0));
        }
    }
}

/// Cursor handing out exclusive access to each matching allocation in turn.
pub struct AllocationIteratorMut<'m> {
    _guard: IterationGuard<'m>,
    filter: ComponentFilter,
    archetypes: slice::IterMut<'m, Archetype>,
    current: Option<(ArchetypeId, slice::IterMut<'m, Allocation>, u32)>,
}

impl<'m> AllocationIteratorMut<'m> {
    pub(crate) fn new(
        depth: &'m AtomicU32,
        archetypes: &'m mut [Archetype],
        filter: ComponentFilter,
    ) -> Self {
        Self {
            _guard: IterationGuard::begin(depth),
            filter,
            archetypes: archetypes.iter_mut(),
            current: None,
        }
    }
}

impl<'m> Iterator for AllocationIteratorMut<'m> {
    type Item = (AllocationHandle, &'m mut Allocation);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((archetype, allocations, index)) = self.current.as_mut() {
                for allocation in allocations.by_ref() {
                    let handle = AllocationHandle {
                        archetype: *archetype,
                        allocation: *index,
                    };
                    *index += 1;
                    if !allocation.is_empty() {
                        return Some((handle, allocation));
                    }
                }
            }
            let filter = self.filter;
            let archetype = self.archetypes.find(|a| filter.matches(a.mask()))?;
            let id = archetype.id();
            self.current = Some((id, archetype.allocations_mut().iter_mut(), 0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_pair_begin_and_end() {
        let depth = AtomicU32::new(0);
        {
            let _outer = IterationGuard::begin(&depth);
            let inner = IterationGuard::begin(&depth);
            assert_eq!(depth.load(Ordering::Acquire), 2);
            let moved = inner;
            assert_eq!(depth.load(Ordering::Acquire), 2);
            drop(moved);
            assert_eq!(depth.load(Ordering::Acquire), 1);
        }
        assert_eq!(depth.load(Ordering::Acquire), 0);
    }

    #[test]
    #[should_panic(expected = "without a matching begin_iteration")]
    fn guard_underflow_panics_instead_of_wrapping() {
        let depth = AtomicU32::new(0);
        let guard = IterationGuard::begin(&depth);
        depth.store(0, Ordering::Release);
        drop(guard);
    }

    #[test]
    fn empty_storage_yields_nothing() {
        let depth = AtomicU32::new(0);
        let mut iter = AllocationIterator::new(&depth, &[], ComponentFilter::new());
        assert!(iter.next().is_none());
        assert_eq!(depth.load(Ordering::Acquire), 1);
        drop(iter);
        assert_eq!(depth.load(Ordering::Acquire), 0);
    }
}
