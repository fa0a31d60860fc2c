// filter.rs - Mask predicates selecting archetypes for a query

use crate::ecs::component::ComponentTypeId;
use crate::ecs::mask::ComponentMask;

/// Immutable predicate over component masks.
///
/// A mask matches when it carries every `require_all` component, none of the
/// `require_none` components, and at least one `require_any` component (an
/// empty `require_any` places no constraint).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ComponentFilter {
    pub require_all: ComponentMask,
    pub require_none: ComponentMask,
    pub require_any: ComponentMask,
}

impl ComponentFilter {
    /// Filter matching every mask.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_of(ids: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        Self {
            require_all: ComponentMask::from_ids(ids),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with(mut self, id: ComponentTypeId) -> Self {
        self.require_all.insert(id);
        self
    }

    #[must_use]
    pub fn without(mut self, id: ComponentTypeId) -> Self {
        self.require_none.insert(id);
        self
    }

    #[must_use]
    pub fn any_of(mut self, ids: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        for id in ids {
            self.require_any.insert(id);
        }
        self
    }

    #[inline]
    pub fn matches(&self, mask: &ComponentMask) -> bool {
        mask.contains_all(&self.require_all)
            && !mask.intersects(&self.require_none)
            && (self.require_any.is_empty() || mask.intersects(&self.require_any))
    }

    /// False when no mask can match (a component both required and excluded,
    /// or every any-of component excluded).
    pub fn is_satisfiable(&self) -> bool {
        if self.require_all.intersects(&self.require_none) {
            return false;
        }
        self.require_any.is_empty() || !self.require_none.contains_all(&self.require_any)
    }
}
