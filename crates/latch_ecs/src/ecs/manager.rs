// manager.rs - Sole owner of entity storage
//
// The EntityManager owns every archetype, the entity location table and the
// shared value store. It is the only place where structural mutation happens
// and it refuses such mutation while any traversal is registered with its
// iteration counter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use latch_metrics::Counter;
use tracing::{debug, debug_span, trace, warn};

use crate::config::{ConfigError, StorageConfig};
use crate::ecs::archetype::{Archetype, ArchetypeId, ArchetypeLayout};
use crate::ecs::builder::{ComponentBytes, EntityBlueprint};
use crate::ecs::command::{CommandFailure, DeferredCommandBuffer, FlushReport};
use crate::ecs::component::{Component, ComponentInfo, ComponentKind, ComponentRegistry, ComponentTypeId};
use crate::ecs::entity::{EntityId, EntityLocation, EntityLocationTable};
use crate::ecs::error::StorageError;
use crate::ecs::filter::ComponentFilter;
use crate::ecs::iter::{AllocationIterator, AllocationIteratorMut};
use crate::ecs::mask::ComponentMask;
use crate::ecs::storage::{Allocation, AllocationHandle, SharedValueSet, SharedValueStore};
use crate::memory::AllocationTracker;

/// Disjoint borrows of a manager needed to run a query over its allocations.
pub struct ExecutionParts<'m> {
    pub allocations: AllocationIteratorMut<'m>,
    pub shared: &'m mut SharedValueStore,
    pub registry: &'m ComponentRegistry,
}

pub struct EntityManager {
    registry: Arc<ComponentRegistry>,
    config: StorageConfig,
    archetypes: Vec<Archetype>,
    archetype_index: HashMap<ComponentMask, ArchetypeId>,
    locations: EntityLocationTable,
    shared: SharedValueStore,
    iteration_depth: AtomicU32,
    counters: Counter,
    memory: AllocationTracker,
}

impl EntityManager {
    /// Manager with the default `StorageConfig`.
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self::build(registry, StorageConfig::default())
    }

    pub fn with_config(
        registry: Arc<ComponentRegistry>,
        config: StorageConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(registry, config))
    }

    fn build(registry: Arc<ComponentRegistry>, config: StorageConfig) -> Self {
        Self {
            registry,
            archetypes: Vec::new(),
            archetype_index: HashMap::new(),
            locations: EntityLocationTable::with_capacity(config.initial_entity_capacity),
            shared: SharedValueStore::new(),
            iteration_depth: AtomicU32::new(0),
            counters: Counter::new(),
            memory: AllocationTracker::new(),
            config,
        }
    }

    // ------------------------------------------------------------------
    // Iteration counter
    // ------------------------------------------------------------------

    /// Register a traversal that is not tied to an `AllocationIterator`
    /// (an external scheduler spanning several queries, for example).
    pub fn begin_iteration(&self) {
        self.iteration_depth.fetch_add(1, Ordering::AcqRel);
    }

    /// Unregister a traversal started with `begin_iteration`.
    pub fn end_iteration(&self) {
        let ended = self
            .iteration_depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| depth.checked_sub(1));
        assert!(ended.is_ok(), "end_iteration called without a matching begin_iteration");
    }

    pub fn is_iterating(&self) -> bool {
        self.iteration_depth.load(Ordering::Acquire) > 0
    }

    fn assert_mutable(&self, operation: &'static str) {
        let depth = self.iteration_depth.load(Ordering::Acquire);
        if depth != 0 {
            panic!(
                "IllegalMutationDuringIteration: {operation} called while {depth} iteration(s) \
                 are live; queue it in a DeferredCommandBuffer instead"
            );
        }
    }

    /// Lazily visit non-empty allocations matching `filter`.
    pub fn iter_allocations(&self, filter: ComponentFilter) -> AllocationIterator<'_> {
        AllocationIterator::new(&self.iteration_depth, &self.archetypes, filter)
    }

    pub fn iter_allocations_mut(&mut self, filter: ComponentFilter) -> AllocationIteratorMut<'_> {
        AllocationIteratorMut::new(&self.iteration_depth, &mut self.archetypes, filter)
    }

    pub fn execution_parts(&mut self, filter: ComponentFilter) -> ExecutionParts<'_> {
        ExecutionParts {
            allocations: AllocationIteratorMut::new(
                &self.iteration_depth,
                &mut self.archetypes,
                filter,
            ),
            shared: &mut self.shared,
            registry: &self.registry,
        }
    }

    // ------------------------------------------------------------------
    // Structural mutation
    // ------------------------------------------------------------------

    /// Create an entity carrying `mask`, every component default-initialised.
    pub fn create_entity(&mut self, mask: &ComponentMask) -> Result<EntityId, StorageError> {
        self.spawn(&EntityBlueprint::from_mask(*mask))
    }

    /// Create an entity from a blueprint, writing its supplied values over
    /// the defaults.
    pub fn spawn(&mut self, blueprint: &EntityBlueprint) -> Result<EntityId, StorageError> {
        self.assert_mutable("spawn");
        for value in blueprint.components().iter().chain(blueprint.shared()) {
            self.check_value(value)?;
        }

        let archetype = self.archetype_for(*blueprint.mask())?;
        let layout = Arc::clone(self.archetypes[archetype.index()].layout());
        let shared = self.resolve_shared(&layout, None, blueprint.shared())?;

        let entity = self.locations.allocate();
        let (allocation, row) = match self.insert_into(archetype, entity, &shared) {
            Ok(placed) => placed,
            Err(err) => {
                self.locations.abandon(entity);
                return Err(err);
            }
        };

        let dest = &mut self.archetypes[archetype.index()].allocations_mut()[allocation as usize];
        for value in blueprint.components() {
            if let Some(dst) = dest.row_bytes_mut(value.component(), row) {
                dst.copy_from_slice(value.bytes());
            }
        }

        self.locations.set(
            entity,
            EntityLocation {
                archetype,
                allocation,
                row,
            },
        );
        self.counters.increment("entities_created", 1);
        trace!(%entity, %archetype, allocation, row, "created entity");
        Ok(entity)
    }

    /// Create `count` entities from the same blueprint.
    ///
    /// All or nothing: if one spawn fails, the entities already created by
    /// this call are destroyed before the error is returned.
    pub fn spawn_batch(
        &mut self,
        blueprint: &EntityBlueprint,
        count: usize,
    ) -> Result<Vec<EntityId>, StorageError> {
        self.spawn_all(count, |manager| manager.spawn(blueprint))
    }

    fn spawn_all(
        &mut self,
        count: usize,
        mut spawn_one: impl FnMut(&mut Self) -> Result<EntityId, StorageError>,
    ) -> Result<Vec<EntityId>, StorageError> {
        let mut spawned = Vec::with_capacity(count);
        for _ in 0..count {
            match spawn_one(self) {
                Ok(entity) => spawned.push(entity),
                Err(err) => {
                    for entity in spawned.into_iter().rev() {
                        if let Err(rollback) = self.destroy_entity(entity) {
                            warn!(%entity, error = %rollback, "failed to roll back batch spawn");
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(spawned)
    }

    /// Destroy an entity. Its row is swap-removed and the handle is
    /// invalidated for good.
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<(), StorageError> {
        self.assert_mutable("destroy_entity");
        let location = self.locations.release(entity)?;
        let archetype = &mut self.archetypes[location.archetype.index()];
        if let Some(moved) = archetype.remove_row_swap_back(location.allocation, location.row) {
            self.locations.set_row(moved, location.row);
        }
        self.counters.increment("entities_destroyed", 1);
        trace!(%entity, "destroyed entity");
        Ok(())
    }

    /// Add a component with its default value. Adding a component the entity
    /// already carries does nothing.
    pub fn add_fragment(
        &mut self,
        entity: EntityId,
        component: ComponentTypeId,
    ) -> Result<(), StorageError> {
        self.assert_mutable("add_fragment");
        let location = self.locations.get(entity)?;
        self.component_info(component)?;
        let mask = *self.allocation_at(location).mask();
        if mask.contains(component) {
            return Ok(());
        }
        self.relocate(entity, location, mask.with(component), None, &[])?;
        Ok(())
    }

    /// Add a fragment with a value, or overwrite it in place if present.
    ///
    /// Shared values are routed to `set_shared_value`.
    pub fn add_fragment_value(
        &mut self,
        entity: EntityId,
        value: &ComponentBytes,
    ) -> Result<(), StorageError> {
        self.assert_mutable("add_fragment");
        let location = self.locations.get(entity)?;
        let component = value.component();
        let kind = self.check_value(value)?.kind;
        match kind {
            ComponentKind::Fragment => {}
            ComponentKind::Shared => return self.set_shared_value(entity, value),
            ComponentKind::Tag => return self.add_fragment(entity, component),
            ComponentKind::Chunk => {
                return Err(StorageError::KindMismatch {
                    component,
                    expected: ComponentKind::Fragment,
                    actual: kind,
                })
            }
        }

        let mask = *self.allocation_at(location).mask();
        if mask.contains(component) {
            if let Some(dst) = self
                .allocation_at_mut(location)
                .row_bytes_mut(component, location.row)
            {
                dst.copy_from_slice(value.bytes());
            }
            return Ok(());
        }
        self.relocate(entity, location, mask.with(component), Some(value), &[])?;
        Ok(())
    }

    /// Typed `add_fragment_value`.
    pub fn insert<T: Component>(&mut self, entity: EntityId, value: T) -> Result<(), StorageError> {
        let value = ComponentBytes::of(&self.registry, value)?;
        self.add_fragment_value(entity, &value)
    }

    /// Remove a component. Removing one the entity lacks does nothing.
    pub fn remove_fragment(
        &mut self,
        entity: EntityId,
        component: ComponentTypeId,
    ) -> Result<(), StorageError> {
        self.assert_mutable("remove_fragment");
        let location = self.locations.get(entity)?;
        self.component_info(component)?;
        let mask = *self.allocation_at(location).mask();
        if !mask.contains(component) {
            return Ok(());
        }
        self.relocate(entity, location, mask.without(component), None, &[])?;
        Ok(())
    }

    /// Bind the entity to a shared value, adding the component if needed.
    /// The entity moves to an allocation referencing that value.
    pub fn set_shared_value(
        &mut self,
        entity: EntityId,
        value: &ComponentBytes,
    ) -> Result<(), StorageError> {
        self.assert_mutable("set_shared");
        let location = self.locations.get(entity)?;
        let component = value.component();
        let info = self.check_value(value)?;
        if info.kind != ComponentKind::Shared {
            return Err(StorageError::KindMismatch {
                component,
                expected: ComponentKind::Shared,
                actual: info.kind,
            });
        }

        let current = self.allocation_at(location);
        let mask = *current.mask();
        if let Some(handle) = current.shared_values().get(component) {
            if self.shared.bytes(handle) == Some(value.bytes()) {
                return Ok(());
            }
        }
        self.relocate(
            entity,
            location,
            mask.with(component),
            None,
            std::slice::from_ref(value),
        )?;
        Ok(())
    }

    /// Typed `set_shared_value`.
    pub fn set_shared<T: Component>(&mut self, entity: EntityId, value: T) -> Result<(), StorageError> {
        let value = ComponentBytes::of(&self.registry, value)?;
        self.set_shared_value(entity, &value)
    }

    /// Release empty allocations and return their memory. Archetype records
    /// are kept so ids and scan order stay stable. Returns the number of
    /// allocations released.
    pub fn compact(&mut self) -> usize {
        self.assert_mutable("compact");
        let mut total = 0;
        for archetype in &mut self.archetypes {
            let (released, bytes) = archetype.release_empty_allocations();
            if released == 0 {
                continue;
            }
            total += released;
            let block_size = archetype.layout().block_size;
            for _ in 0..released {
                self.memory.record_release(block_size);
            }
            for (index, allocation) in archetype.allocations().iter().enumerate() {
                for (row, entity) in allocation.entities().iter().enumerate() {
                    self.locations.set(
                        *entity,
                        EntityLocation {
                            archetype: archetype.id(),
                            allocation: index as u32,
                            row: row as u32,
                        },
                    );
                }
            }
            debug!(archetype = %archetype.id(), released, bytes, "released empty allocations");
        }
        self.counters.increment("allocations_released", total as u64);
        total
    }

    /// Replay a buffer in enqueue order.
    ///
    /// A command that fails (stale handle, unknown component, ...) is
    /// recorded in the report and the flush continues with the next one.
    /// `OutOfMemory` aborts the flush and is returned; later commands stay
    /// unapplied.
    ///
    /// # Panics
    ///
    /// `IllegalMutationDuringIteration` if an iteration is in progress.
    pub fn flush_deferred(
        &mut self,
        buffer: DeferredCommandBuffer,
    ) -> Result<FlushReport, StorageError> {
        self.assert_mutable("flush_deferred");
        let span = debug_span!("flush_deferred", commands = buffer.len());
        let _enter = span.enter();

        let mut report = FlushReport::default();
        for (index, command) in buffer.into_commands().into_iter().enumerate() {
            let name = command.name();
            let target = command.target();
            match command.apply(self) {
                Ok(created) => {
                    report.applied += 1;
                    report.created.extend(created);
                    self.counters.increment("commands_applied", 1);
                    trace!(index, command = name, "applied deferred command");
                }
                Err(error @ StorageError::OutOfMemory { .. }) => {
                    warn!(index, command = name, %error, "aborting flush");
                    return Err(error);
                }
                Err(error) => {
                    warn!(index, command = name, entity = ?target, %error, "deferred command rejected");
                    self.counters.increment("commands_rejected", 1);
                    report.failures.push(CommandFailure {
                        index,
                        command: name,
                        error,
                    });
                }
            }
        }
        Ok(report)
    }

    /// Flush several buffers in submission order, each one contiguously.
    /// Failure indices count from the first command of the first buffer.
    pub fn flush_deferred_all(
        &mut self,
        buffers: impl IntoIterator<Item = DeferredCommandBuffer>,
    ) -> Result<FlushReport, StorageError> {
        let mut report = FlushReport::default();
        let mut offset = 0;
        for buffer in buffers {
            let len = buffer.len();
            report.merge(self.flush_deferred(buffer)?, offset);
            offset += len;
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn component_info(&self, component: ComponentTypeId) -> Result<&ComponentInfo, StorageError> {
        self.registry
            .info(component)
            .ok_or(StorageError::UnknownComponent { component })
    }

    fn check_value(&self, value: &ComponentBytes) -> Result<&ComponentInfo, StorageError> {
        let info = self.component_info(value.component())?;
        if value.bytes().len() != info.size {
            return Err(StorageError::SizeMismatch {
                component: value.component(),
                expected: info.size,
                actual: value.bytes().len(),
            });
        }
        Ok(info)
    }

    fn allocation_at(&self, location: EntityLocation) -> &Allocation {
        &self.archetypes[location.archetype.index()].allocations()[location.allocation as usize]
    }

    fn allocation_at_mut(&mut self, location: EntityLocation) -> &mut Allocation {
        &mut self.archetypes[location.archetype.index()].allocations_mut()
            [location.allocation as usize]
    }

    fn archetype_for(&mut self, mask: ComponentMask) -> Result<ArchetypeId, StorageError> {
        if let Some(&id) = self.archetype_index.get(&mask) {
            return Ok(id);
        }
        let layout = ArchetypeLayout::plan(mask, &self.registry, self.config.allocation_capacity)?;
        let id = ArchetypeId::new(self.archetypes.len() as u32);
        debug!(
            archetype = %id,
            ?mask,
            block_size = layout.block_size,
            row_size = layout.row_size(),
            "created archetype"
        );
        self.archetypes.push(Archetype::new(id, layout));
        self.archetype_index.insert(mask, id);
        self.counters.increment("archetypes_created", 1);
        Ok(id)
    }

    /// Shared value set for an allocation of `layout`: explicit values first,
    /// then values inherited from the entity's previous allocation, then the
    /// registered defaults.
    fn resolve_shared(
        &mut self,
        layout: &ArchetypeLayout,
        inherited: Option<&SharedValueSet>,
        overrides: &[ComponentBytes],
    ) -> Result<SharedValueSet, StorageError> {
        let mut set = SharedValueSet::new();
        for &component in &layout.shared {
            let info = self
                .registry
                .info(component)
                .ok_or(StorageError::UnknownComponent { component })?;
            let handle = if let Some(value) = overrides.iter().find(|v| v.component() == component) {
                self.shared.intern(component, value.bytes(), info.align)?
            } else if let Some(handle) = inherited.and_then(|s| s.get(component)) {
                handle
            } else {
                self.shared
                    .intern(component, &info.default_bytes(), info.align)?
            };
            set.insert(component, handle);
        }
        Ok(set)
    }

    /// Insert a default-initialised row, creating an allocation if needed.
    fn insert_into(
        &mut self,
        archetype: ArchetypeId,
        entity: EntityId,
        shared: &SharedValueSet,
    ) -> Result<(u32, u32), StorageError> {
        let archetype = &mut self.archetypes[archetype.index()];
        loop {
            let (index, created) = archetype.find_or_create_allocation_with_space(shared)?;
            if created {
                let bytes = archetype.layout().block_size;
                self.memory.record_allocation(bytes);
                self.counters.increment("allocations_created", 1);
                debug!(archetype = %archetype.id(), allocation = index, bytes, "created allocation");
            }
            match archetype.insert_row(index, entity) {
                Ok(row) => return Ok((index, row)),
                // Unreachable in practice: the allocation was picked for its
                // free row. Look again, which creates a fresh allocation.
                Err(full) => trace!(capacity = full.capacity, "allocation full, retrying"),
            }
        }
    }

    /// Move an entity to the allocation matching `target_mask` (and the
    /// resolved shared values), carrying over every column both layouts have.
    fn relocate(
        &mut self,
        entity: EntityId,
        from: EntityLocation,
        target_mask: ComponentMask,
        value: Option<&ComponentBytes>,
        shared_overrides: &[ComponentBytes],
    ) -> Result<EntityLocation, StorageError> {
        let target = self.archetype_for(target_mask)?;
        let layout = Arc::clone(self.archetypes[target.index()].layout());

        let source = self.allocation_at(from);
        let inherited = source.shared_values().clone();
        let carried: Vec<(ComponentTypeId, Vec<u8>)> = layout
            .columns
            .iter()
            .filter_map(|column| {
                source
                    .row_bytes(column.component, from.row)
                    .map(|bytes| (column.component, bytes.to_vec()))
            })
            .collect();

        let shared = self.resolve_shared(&layout, Some(&inherited), shared_overrides)?;
        let (allocation, row) = self.insert_into(target, entity, &shared)?;

        let dest = &mut self.archetypes[target.index()].allocations_mut()[allocation as usize];
        for (component, bytes) in &carried {
            if let Some(dst) = dest.row_bytes_mut(*component, row) {
                dst.copy_from_slice(bytes);
            }
        }
        if let Some(value) = value {
            if let Some(dst) = dest.row_bytes_mut(value.component(), row) {
                dst.copy_from_slice(value.bytes());
            }
        }

        if let Some(moved) = self.archetypes[from.archetype.index()]
            .remove_row_swap_back(from.allocation, from.row)
        {
            self.locations.set_row(moved, from.row);
        }
        let location = EntityLocation {
            archetype: target,
            allocation,
            row,
        };
        self.locations.set(entity, location);
        self.counters.increment("entity_moves", 1);
        trace!(%entity, from = %from.archetype, to = %target, "moved entity");
        Ok(location)
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.locations.is_alive(entity)
    }

    pub fn location(&self, entity: EntityId) -> Result<EntityLocation, StorageError> {
        self.locations.get(entity)
    }

    pub fn mask_of(&self, entity: EntityId) -> Result<ComponentMask, StorageError> {
        let location = self.locations.get(entity)?;
        Ok(*self.allocation_at(location).mask())
    }

    pub fn has_component(
        &self,
        entity: EntityId,
        component: ComponentTypeId,
    ) -> Result<bool, StorageError> {
        Ok(self.mask_of(entity)?.contains(component))
    }

    /// Bytes of a per-entity fragment, chunk value or shared value.
    pub fn component_bytes(
        &self,
        entity: EntityId,
        component: ComponentTypeId,
    ) -> Result<&[u8], StorageError> {
        let location = self.locations.get(entity)?;
        let kind = self.component_info(component)?.kind;
        let allocation = self.allocation_at(location);
        let missing = StorageError::MissingComponent { entity, component };
        match kind {
            ComponentKind::Fragment => allocation.row_bytes(component, location.row).ok_or(missing),
            ComponentKind::Chunk => allocation.chunk_value_bytes(component).ok_or(missing),
            ComponentKind::Shared => allocation
                .shared_values()
                .get(component)
                .and_then(|handle| self.shared.bytes(handle))
                .ok_or(missing),
            ComponentKind::Tag => Err(StorageError::KindMismatch {
                component,
                expected: ComponentKind::Fragment,
                actual: kind,
            }),
        }
    }

    /// Writable bytes of a per-entity fragment or chunk value.
    pub fn component_bytes_mut(
        &mut self,
        entity: EntityId,
        component: ComponentTypeId,
    ) -> Result<&mut [u8], StorageError> {
        let location = self.locations.get(entity)?;
        let kind = self.component_info(component)?.kind;
        let missing = StorageError::MissingComponent { entity, component };
        let allocation = self.allocation_at_mut(location);
        match kind {
            ComponentKind::Fragment => allocation
                .row_bytes_mut(component, location.row)
                .ok_or(missing),
            ComponentKind::Chunk => allocation.chunk_value_bytes_mut(component).ok_or(missing),
            ComponentKind::Shared | ComponentKind::Tag => Err(StorageError::KindMismatch {
                component,
                expected: ComponentKind::Fragment,
                actual: kind,
            }),
        }
    }

    /// Typed read of a fragment, chunk value or shared value.
    pub fn get<T: Component>(&self, entity: EntityId) -> Result<&T, StorageError> {
        let component = self.registry.require::<T>()?;
        self.component_bytes(entity, component)
            .map(bytemuck::from_bytes)
    }

    /// Typed write access to a fragment or chunk value.
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Result<&mut T, StorageError> {
        let component = self.registry.require::<T>()?;
        self.component_bytes_mut(entity, component)
            .map(bytemuck::from_bytes_mut)
    }

    /// Shared value the entity's allocation references.
    pub fn shared_value<T: Component>(&self, entity: EntityId) -> Result<&T, StorageError> {
        let component = self.registry.require::<T>()?;
        let kind = self.component_info(component)?.kind;
        if kind != ComponentKind::Shared {
            return Err(StorageError::KindMismatch {
                component,
                expected: ComponentKind::Shared,
                actual: kind,
            });
        }
        self.get::<T>(entity)
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn entity_count(&self) -> usize {
        self.locations.len()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn allocation_count(&self) -> usize {
        self.archetypes.iter().map(|a| a.allocations().len()).sum()
    }

    /// Archetypes in creation order.
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    pub fn archetype_with_mask(&self, mask: &ComponentMask) -> Option<ArchetypeId> {
        self.archetype_index.get(mask).copied()
    }

    pub fn allocation(&self, handle: AllocationHandle) -> Option<&Allocation> {
        self.archetype(handle.archetype)?.allocation(handle.allocation)
    }

    pub fn locations(&self) -> &EntityLocationTable {
        &self.locations
    }

    pub fn shared_values(&self) -> &SharedValueStore {
        &self.shared
    }

    pub fn counters(&self) -> &Counter {
        &self.counters
    }

    pub fn memory(&self) -> &AllocationTracker {
        &self.memory
    }
}

impl std::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("entities", &self.locations.len())
            .field("archetypes", &self.archetypes.len())
            .field("allocations", &self.allocation_count())
            .field("iteration_depth", &self.iteration_depth.load(Ordering::Relaxed))
            .finish()
    }
}
