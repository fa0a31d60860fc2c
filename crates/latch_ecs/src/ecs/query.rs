// query.rs - Requirement sets executed chunk by chunk
//
// An EntityQuery pairs a list of fragment requirements with the filter that
// guarantees every required fragment is present. Running it binds one
// ExecutionContext per matching allocation, sequentially or on the rayon pool.

use std::any::type_name;

use rayon::prelude::*;
use tracing::trace;

use crate::ecs::command::{DeferredCommandBuffer, FlushReport};
use crate::ecs::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::ecs::context::{ExecutionContext, SharedValues};
use crate::ecs::error::{QueryError, StorageError};
use crate::ecs::filter::ComponentFilter;
use crate::ecs::manager::{EntityManager, ExecutionParts};
use crate::ecs::mask::ComponentMask;
use crate::ecs::requirement::{Access, BindingScope, FragmentRequirement, Presence};
use crate::ecs::storage::{Allocation, AllocationHandle, SharedValueStore};

/// Validated requirements plus the filter derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityQuery {
    requirements: Vec<FragmentRequirement>,
    filter: ComponentFilter,
}

impl EntityQuery {
    pub fn filter(&self) -> ComponentFilter {
        self.filter
    }

    pub fn requirements(&self) -> &[FragmentRequirement] {
        &self.requirements
    }

    /// Run `system` once per matching allocation, in scan order.
    ///
    /// Structural changes go to `commands`; the manager cannot be touched
    /// until the run returns. Returns the number of allocations visited.
    pub fn for_each_chunk<F>(
        &self,
        manager: &mut EntityManager,
        commands: &mut DeferredCommandBuffer,
        mut system: F,
    ) -> usize
    where
        F: FnMut(&ExecutionContext<'_>),
    {
        let ExecutionParts {
            allocations,
            shared,
            registry,
        } = manager.execution_parts(self.filter);

        let mut visited = 0;
        for (handle, allocation) in allocations {
            let context = ExecutionContext::bind(
                &self.requirements,
                handle,
                allocation,
                SharedValues::Exclusive(&mut *shared),
                registry,
                &mut *commands,
            );
            system(&context);
            visited += 1;
        }
        trace!(visited, "query finished");
        visited
    }

    /// Run `system` over matching allocations on the rayon pool.
    ///
    /// Each allocation gets its own command buffer; the returned buffer is
    /// their concatenation in scan order, so a later flush is deterministic
    /// regardless of scheduling.
    ///
    /// # Panics
    ///
    /// If any requirement writes a `Shared` value: several contexts would
    /// alias it.
    pub fn par_for_each_chunk<F>(&self, manager: &mut EntityManager, system: F) -> DeferredCommandBuffer
    where
        F: Fn(&ExecutionContext<'_>) + Sync + Send,
    {
        if let Some(req) = self
            .requirements
            .iter()
            .find(|r| r.is_write() && r.scope == BindingScope::Shared)
        {
            panic!(
                "component {} is written as a shared value and cannot run in parallel",
                req.component
            );
        }

        let ExecutionParts {
            mut allocations,
            shared,
            registry,
        } = manager.execution_parts(self.filter);
        let shared: &SharedValueStore = shared;
        let work: Vec<(AllocationHandle, &mut Allocation)> = allocations.by_ref().collect();

        let buffers: Vec<DeferredCommandBuffer> = work
            .into_par_iter()
            .map(|(handle, allocation)| {
                let mut commands = DeferredCommandBuffer::new();
                let context = ExecutionContext::bind(
                    &self.requirements,
                    handle,
                    allocation,
                    SharedValues::ReadOnly(shared),
                    registry,
                    &mut commands,
                );
                system(&context);
                drop(context);
                commands
            })
            .collect();
        // Held until every context is gone.
        drop(allocations);

        let mut combined = DeferredCommandBuffer::new();
        for mut buffer in buffers {
            combined.append(&mut buffer);
        }
        trace!(commands = combined.len(), "parallel query finished");
        combined
    }

    /// Run sequentially, then flush the commands the system queued.
    pub fn run<F>(&self, manager: &mut EntityManager, system: F) -> Result<FlushReport, StorageError>
    where
        F: FnMut(&ExecutionContext<'_>),
    {
        let mut commands = DeferredCommandBuffer::new();
        self.for_each_chunk(manager, &mut commands, system);
        manager.flush_deferred(commands)
    }

    pub fn matching_allocation_count(&self, manager: &EntityManager) -> usize {
        manager.iter_allocations(self.filter).count()
    }

    pub fn matching_entity_count(&self, manager: &EntityManager) -> usize {
        manager
            .iter_allocations(self.filter)
            .map(|(_, allocation)| allocation.len())
            .sum()
    }
}

/// Builder for `EntityQuery`. The first error is kept and reported by
/// `build`, so calls can be chained.
pub struct QueryBuilder<'r> {
    registry: &'r ComponentRegistry,
    requirements: Vec<FragmentRequirement>,
    tags: ComponentMask,
    excluded: ComponentMask,
    any: ComponentMask,
    error: Option<QueryError>,
}

impl<'r> QueryBuilder<'r> {
    pub fn new(registry: &'r ComponentRegistry) -> Self {
        Self {
            registry,
            requirements: Vec::new(),
            tags: ComponentMask::new(),
            excluded: ComponentMask::new(),
            any: ComponentMask::new(),
            error: None,
        }
    }

    fn typed<T: Component>(mut self, access: Access, presence: Presence, scope: BindingScope) -> Self {
        match self.registry.id_of::<T>() {
            Some(component) => self
                .requirements
                .push(FragmentRequirement::new(component, access, presence, scope)),
            None => {
                self.error.get_or_insert(QueryError::UnregisteredType {
                    name: type_name::<T>(),
                });
            }
        }
        self
    }

    pub fn read<T: Component>(self) -> Self {
        self.typed::<T>(Access::Read, Presence::Required, BindingScope::PerEntity)
    }

    pub fn write<T: Component>(self) -> Self {
        self.typed::<T>(Access::Write, Presence::Required, BindingScope::PerEntity)
    }

    pub fn optional_read<T: Component>(self) -> Self {
        self.typed::<T>(Access::Read, Presence::Optional, BindingScope::PerEntity)
    }

    pub fn optional_write<T: Component>(self) -> Self {
        self.typed::<T>(Access::Write, Presence::Optional, BindingScope::PerEntity)
    }

    pub fn chunk_read<T: Component>(self) -> Self {
        self.typed::<T>(Access::Read, Presence::Required, BindingScope::PerChunk)
    }

    pub fn chunk_write<T: Component>(self) -> Self {
        self.typed::<T>(Access::Write, Presence::Required, BindingScope::PerChunk)
    }

    pub fn shared_const<T: Component>(self) -> Self {
        self.typed::<T>(Access::Read, Presence::Required, BindingScope::SharedConst)
    }

    pub fn shared_write<T: Component>(self) -> Self {
        self.typed::<T>(Access::Write, Presence::Required, BindingScope::Shared)
    }

    /// Add a requirement by id (raw components, scripting).
    pub fn requirement(mut self, requirement: FragmentRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Only visit allocations carrying `component`, without binding it.
    pub fn with_tag(mut self, component: ComponentTypeId) -> Self {
        self.tags.insert(component);
        self
    }

    pub fn without(mut self, component: ComponentTypeId) -> Self {
        self.excluded.insert(component);
        self
    }

    pub fn any_of(mut self, components: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        for component in components {
            self.any.insert(component);
        }
        self
    }

    pub fn build(self) -> Result<EntityQuery, QueryError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut seen = ComponentMask::new();
        let mut require_all = self.tags;
        for req in &self.requirements {
            let component = req.component;
            let info = self
                .registry
                .info(component)
                .ok_or(QueryError::UnknownComponent { component })?;
            if seen.contains(component) {
                return Err(QueryError::DuplicateRequirement { component });
            }
            seen.insert(component);
            if info.kind != req.scope.expected_kind() {
                return Err(QueryError::ScopeMismatch {
                    component,
                    scope: req.scope.describe(),
                    kind: info.kind,
                });
            }
            if req.is_write() && req.scope == BindingScope::SharedConst {
                return Err(QueryError::WriteToConstShared { component });
            }
            if req.is_required() {
                require_all.insert(component);
            }
        }
        let filtered = self.tags | self.excluded | self.any;
        if let Err(component) = self.registry.check_mask(&filtered) {
            return Err(QueryError::UnknownComponent { component });
        }

        Ok(EntityQuery {
            requirements: self.requirements,
            filter: ComponentFilter {
                require_all,
                require_none: self.excluded,
                require_any: self.any,
            },
        })
    }
}
