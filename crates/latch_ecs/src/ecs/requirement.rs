// requirement.rs - What a query needs from each allocation it visits

use std::fmt;

use crate::ecs::component::{ComponentKind, ComponentTypeId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Presence {
    /// The allocation must carry the component; the query filter requires it.
    Required,
    /// Bound when present, `None` otherwise.
    Optional,
}

/// Granularity at which a requirement binds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BindingScope {
    /// A column slice with one element per row.
    PerEntity,
    /// One value for the whole allocation.
    PerChunk,
    /// A shared value that systems treat as constant.
    SharedConst,
    /// A shared value, writable by the single context holding it.
    Shared,
}

impl BindingScope {
    /// Component kind a requirement with this scope binds to.
    pub fn expected_kind(self) -> ComponentKind {
        match self {
            BindingScope::PerEntity => ComponentKind::Fragment,
            BindingScope::PerChunk => ComponentKind::Chunk,
            BindingScope::SharedConst | BindingScope::Shared => ComponentKind::Shared,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            BindingScope::PerEntity => "per entity",
            BindingScope::PerChunk => "per chunk",
            BindingScope::SharedConst => "as a constant shared value",
            BindingScope::Shared => "as a shared value",
        }
    }
}

impl fmt::Display for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FragmentRequirement {
    pub component: ComponentTypeId,
    pub access: Access,
    pub presence: Presence,
    pub scope: BindingScope,
}

impl FragmentRequirement {
    pub fn new(
        component: ComponentTypeId,
        access: Access,
        presence: Presence,
        scope: BindingScope,
    ) -> Self {
        Self {
            component,
            access,
            presence,
            scope,
        }
    }

    pub fn read(component: ComponentTypeId) -> Self {
        Self::new(component, Access::Read, Presence::Required, BindingScope::PerEntity)
    }

    pub fn write(component: ComponentTypeId) -> Self {
        Self::new(component, Access::Write, Presence::Required, BindingScope::PerEntity)
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.presence = Presence::Optional;
        self
    }

    #[must_use]
    pub fn scoped(mut self, scope: BindingScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }

    pub fn is_write(&self) -> bool {
        self.access == Access::Write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_compose() {
        let id = ComponentTypeId::new(4);
        let req = FragmentRequirement::write(id)
            .optional()
            .scoped(BindingScope::PerChunk);
        assert!(req.is_write());
        assert!(!req.is_required());
        assert_eq!(req.scope.expected_kind(), ComponentKind::Chunk);
        assert_eq!(
            BindingScope::SharedConst.expected_kind(),
            BindingScope::Shared.expected_kind()
        );
    }
}
