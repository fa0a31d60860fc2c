//! Entity storage core types.
//!
//! Components are plain-old-data values identified by a `ComponentTypeId`.
//! Entities sharing a component mask live in one archetype, packed into
//! fixed-capacity allocations laid out column by column. The
//! `EntityManager` owns all of it; systems read and write through
//! `ExecutionContext` views and defer structural changes to a
//! `DeferredCommandBuffer`.

mod archetype;
mod builder;
mod command;
mod component;
mod context;
mod entity;
mod error;
mod filter;
mod iter;
mod manager;
mod mask;
mod query;
mod requirement;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use archetype::{Archetype, ArchetypeId, ArchetypeLayout, ColumnLayout};
pub use builder::{ComponentBytes, EntityBlueprint, EntityBuilder};
pub use command::{Command, CommandFailure, DeferredCommandBuffer, FlushReport};
pub use component::{Component, ComponentInfo, ComponentKind, ComponentRegistry, ComponentTypeId};
pub use context::{ExecutionContext, SharedValues};
pub use entity::{EntityId, EntityLocation, EntityLocationTable};
pub use error::{BuilderError, QueryError, RegistryError, StorageError};
pub use filter::ComponentFilter;
pub use iter::{AllocationIterator, AllocationIteratorMut, IterationGuard};
pub use manager::{EntityManager, ExecutionParts};
pub use mask::{ComponentMask, MAX_COMPONENT_TYPES};
pub use query::{EntityQuery, QueryBuilder};
pub use requirement::{Access, BindingScope, FragmentRequirement, Presence};
pub use storage::{Allocation, AllocationFull, AllocationHandle, SharedValueHandle, SharedValueSet, SharedValueStore};
