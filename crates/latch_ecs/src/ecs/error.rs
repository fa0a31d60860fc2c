//! Error types for the entity storage engine.
//!
//! Recoverable conditions are returned as values. Misuse of the engine by the
//! systems built on top of it (mutating while an iterator is live, binding a
//! required fragment the allocation does not carry, aliasing views inside one
//! execution context) panics instead, because it is a bug in the caller.

use crate::ecs::{ComponentKind, ComponentTypeId, EntityId};
use thiserror::Error;

/// Errors returned by `EntityManager` operations and deferred command replay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("entity {entity} is stale: it was destroyed and its index may have been reused")]
    StaleHandle { entity: EntityId },

    #[error("out of memory reserving {bytes} bytes for entity storage")]
    OutOfMemory { bytes: usize },

    #[error("component {component} is not registered")]
    UnknownComponent { component: ComponentTypeId },

    #[error("type '{name}' is not registered as a component")]
    UnregisteredType { name: &'static str },

    #[error("entity {entity} does not carry component {component}")]
    MissingComponent {
        entity: EntityId,
        component: ComponentTypeId,
    },

    #[error("component {component} expects {expected} bytes but received {actual} bytes")]
    SizeMismatch {
        component: ComponentTypeId,
        expected: usize,
        actual: usize,
    },

    #[error("component {component} is a {actual} component, expected {expected}")]
    KindMismatch {
        component: ComponentTypeId,
        expected: ComponentKind,
        actual: ComponentKind,
    },
}

/// Errors raised while registering component types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("component registry is full ({max} component types)")]
    CapacityExceeded { max: usize },

    #[error("type '{name}' is already registered")]
    DuplicateType { name: String },

    #[error("component '{name}' has an invalid layout (size {size}, align {align})")]
    InvalidLayout {
        name: String,
        size: usize,
        align: usize,
    },
}

/// Errors raised while assembling an `EntityQuery`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("type '{name}' is not registered as a component")]
    UnregisteredType { name: &'static str },

    #[error("component {component} is not registered")]
    UnknownComponent { component: ComponentTypeId },

    #[error("component {component} is a {kind} component and cannot be bound {scope}")]
    ScopeMismatch {
        component: ComponentTypeId,
        scope: &'static str,
        kind: ComponentKind,
    },

    #[error("component {component} is bound as a constant shared value and cannot be written")]
    WriteToConstShared { component: ComponentTypeId },

    #[error("component {component} is requested more than once")]
    DuplicateRequirement { component: ComponentTypeId },
}

/// Errors raised while building an entity blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuilderError {
    #[error("type '{name}' is not registered as a component")]
    UnregisteredType { name: &'static str },

    #[error("component {component} is not registered")]
    UnknownComponent { component: ComponentTypeId },

    #[error("component {component} expects {expected} bytes but received {actual} bytes")]
    SizeMismatch {
        component: ComponentTypeId,
        expected: usize,
        actual: usize,
    },

    #[error("component {component} is a {kind} component and cannot carry a per-entity value")]
    KindMismatch {
        component: ComponentTypeId,
        kind: ComponentKind,
    },
}

impl From<BuilderError> for StorageError {
    fn from(err: BuilderError) -> Self {
        match err {
            BuilderError::UnregisteredType { name } => StorageError::UnregisteredType { name },
            BuilderError::UnknownComponent { component } => {
                StorageError::UnknownComponent { component }
            }
            BuilderError::SizeMismatch {
                component,
                expected,
                actual,
            } => StorageError::SizeMismatch {
                component,
                expected,
                actual,
            },
            BuilderError::KindMismatch { component, kind } => StorageError::KindMismatch {
                component,
                expected: ComponentKind::Fragment,
                actual: kind,
            },
        }
    }
}
