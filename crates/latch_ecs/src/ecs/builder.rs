use std::any::type_name;
use std::collections::BTreeMap;

use crate::ecs::component::{Component, ComponentKind, ComponentRegistry, ComponentTypeId};
use crate::ecs::error::BuilderError;
use crate::ecs::mask::ComponentMask;

/// Owned byte payload for a single component instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentBytes {
    component: ComponentTypeId,
    bytes: Box<[u8]>,
}

impl ComponentBytes {
    /// Encode a Rust-typed value.
    pub fn of<T: Component>(registry: &ComponentRegistry, value: T) -> Result<Self, BuilderError> {
        let component = registry
            .id_of::<T>()
            .ok_or(BuilderError::UnregisteredType {
                name: type_name::<T>(),
            })?;
        Ok(Self {
            component,
            bytes: bytemuck::bytes_of(&value).into(),
        })
    }

    /// Wrap raw bytes (scripting, serialization, etc.), checking the size
    /// against the registered layout.
    pub fn from_raw(
        registry: &ComponentRegistry,
        component: ComponentTypeId,
        bytes: impl Into<Box<[u8]>>,
    ) -> Result<Self, BuilderError> {
        let info = registry
            .info(component)
            .ok_or(BuilderError::UnknownComponent { component })?;
        let bytes = bytes.into();
        if bytes.len() != info.size {
            return Err(BuilderError::SizeMismatch {
                component,
                expected: info.size,
                actual: bytes.len(),
            });
        }
        Ok(Self { component, bytes })
    }

    #[inline]
    pub fn component(&self) -> ComponentTypeId {
        self.component
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Fully constructed entity blueprint used during spawning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityBlueprint {
    mask: ComponentMask,
    components: Vec<ComponentBytes>,
    shared: Vec<ComponentBytes>,
}

impl EntityBlueprint {
    /// Blueprint carrying only default values.
    pub fn from_mask(mask: ComponentMask) -> Self {
        Self {
            mask,
            components: Vec::new(),
            shared: Vec::new(),
        }
    }

    #[inline]
    pub fn mask(&self) -> &ComponentMask {
        &self.mask
    }

    /// Per-entity fragment values, ascending by component id.
    #[inline]
    pub fn components(&self) -> &[ComponentBytes] {
        &self.components
    }

    /// Shared values, ascending by component id.
    #[inline]
    pub fn shared(&self) -> &[ComponentBytes] {
        &self.shared
    }
}

/// Builder for constructing entity blueprints prior to spawning.
///
/// Errors are remembered and reported by `build`, so calls can be chained.
pub struct EntityBuilder<'r> {
    registry: &'r ComponentRegistry,
    mask: ComponentMask,
    values: BTreeMap<ComponentTypeId, Box<[u8]>>,
    error: Option<BuilderError>,
}

impl<'r> EntityBuilder<'r> {
    /// Create a new empty builder.
    pub fn new(registry: &'r ComponentRegistry) -> Self {
        Self {
            registry,
            mask: ComponentMask::new(),
            values: BTreeMap::new(),
            error: None,
        }
    }

    fn fail(&mut self, error: BuilderError) {
        self.error.get_or_insert(error);
    }

    fn kind_of(&mut self, component: ComponentTypeId) -> Option<ComponentKind> {
        match self.registry.info(component) {
            Some(info) => Some(info.kind),
            None => {
                self.fail(BuilderError::UnknownComponent { component });
                None
            }
        }
    }

    fn insert_value(&mut self, value: ComponentBytes) {
        let component = value.component();
        match self.kind_of(component) {
            Some(ComponentKind::Fragment | ComponentKind::Shared) => {
                self.mask.insert(component);
                self.values.insert(component, value.bytes);
            }
            Some(ComponentKind::Tag) => self.mask.insert(component),
            Some(kind) => self.fail(BuilderError::KindMismatch { component, kind }),
            None => {}
        }
    }

    /// Add a Rust-typed fragment or shared value.
    pub fn with<T: Component>(mut self, value: T) -> Self {
        match ComponentBytes::of(self.registry, value) {
            Ok(bytes) => self.insert_value(bytes),
            Err(err) => self.fail(err),
        }
        self
    }

    /// Add a shared value. Fails the build if `T` is not a shared component.
    pub fn with_shared<T: Component>(mut self, value: T) -> Self {
        match ComponentBytes::of(self.registry, value) {
            Ok(bytes) => {
                let component = bytes.component();
                match self.kind_of(component) {
                    Some(ComponentKind::Shared) => self.insert_value(bytes),
                    Some(kind) => self.fail(BuilderError::KindMismatch { component, kind }),
                    None => {}
                }
            }
            Err(err) => self.fail(err),
        }
        self
    }

    /// Add a component by raw bytes (scripting, serialization, etc.).
    pub fn with_raw(mut self, component: ComponentTypeId, bytes: impl Into<Box<[u8]>>) -> Self {
        match ComponentBytes::from_raw(self.registry, component, bytes) {
            Ok(bytes) => self.insert_value(bytes),
            Err(err) => self.fail(err),
        }
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, component: ComponentTypeId) -> Self {
        match self.kind_of(component) {
            Some(ComponentKind::Tag) => self.mask.insert(component),
            Some(kind) => self.fail(BuilderError::KindMismatch { component, kind }),
            None => {}
        }
        self
    }

    /// Add any registered component with its default value.
    pub fn include(mut self, component: ComponentTypeId) -> Self {
        if self.kind_of(component).is_some() {
            self.mask.insert(component);
        }
        self
    }

    /// Finalize the builder into an `EntityBlueprint` suitable for spawning.
    pub fn build(self) -> Result<EntityBlueprint, BuilderError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut components = Vec::new();
        let mut shared = Vec::new();
        for (component, bytes) in self.values {
            let value = ComponentBytes { component, bytes };
            match self.registry.info(component).map(|info| info.kind) {
                Some(ComponentKind::Shared) => shared.push(value),
                _ => components.push(value),
            }
        }

        Ok(EntityBlueprint {
            mask: self.mask,
            components,
            shared,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    struct Team(u32);

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    struct ChunkBounds([f32; 4]);

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    struct Unregistered(u8);

    struct Ids {
        position: ComponentTypeId,
        team: ComponentTypeId,
        bounds: ComponentTypeId,
        frozen: ComponentTypeId,
        blob: ComponentTypeId,
    }

    fn registry() -> (ComponentRegistry, Ids) {
        let mut registry = ComponentRegistry::new();
        let ids = Ids {
            position: registry.register::<Position>().unwrap(),
            team: registry.register_shared::<Team>().unwrap(),
            bounds: registry.register_chunk::<ChunkBounds>().unwrap(),
            frozen: registry.register_tag("Frozen").unwrap(),
            blob: registry.register_raw("Blob", 4, 4).unwrap(),
        };
        (registry, ids)
    }

    #[test]
    fn builds_sorted_values_and_mask() {
        let (registry, ids) = registry();
        let blueprint = EntityBuilder::new(&registry)
            .with_raw(ids.blob, vec![1, 2, 3, 4])
            .with(Position { x: 1.0, y: 2.0 })
            .with_shared(Team(3))
            .with_tag(ids.frozen)
            .include(ids.bounds)
            .build()
            .unwrap();

        assert_eq!(
            *blueprint.mask(),
            ComponentMask::from_ids([ids.position, ids.team, ids.bounds, ids.frozen, ids.blob])
        );
        let order: Vec<_> = blueprint.components().iter().map(|c| c.component()).collect();
        assert_eq!(order, vec![ids.position, ids.blob]);
        assert_eq!(blueprint.shared().len(), 1);
        assert_eq!(blueprint.shared()[0].bytes(), &3u32.to_ne_bytes());
    }

    #[test]
    fn later_values_replace_earlier_ones() {
        let (registry, _) = registry();
        let blueprint = EntityBuilder::new(&registry)
            .with(Position { x: 1.0, y: 1.0 })
            .with(Position { x: 5.0, y: 5.0 })
            .build()
            .unwrap();
        let bytes = blueprint.components()[0].bytes();
        assert_eq!(*bytemuck::from_bytes::<Position>(bytes), Position { x: 5.0, y: 5.0 });
    }

    #[test]
    fn first_error_is_reported() {
        let (registry, ids) = registry();
        let err = EntityBuilder::new(&registry)
            .with(Unregistered(1))
            .with_raw(ids.blob, vec![0u8; 3])
            .build()
            .unwrap_err();
        assert!(matches!(err, BuilderError::UnregisteredType { .. }));

        let err = EntityBuilder::new(&registry)
            .with_raw(ids.blob, vec![0u8; 3])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            BuilderError::SizeMismatch {
                component: ids.blob,
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn kinds_are_checked() {
        let (registry, ids) = registry();
        let err = EntityBuilder::new(&registry)
            .with(ChunkBounds([0.0; 4]))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            BuilderError::KindMismatch {
                component: ids.bounds,
                kind: ComponentKind::Chunk
            }
        );
        assert!(EntityBuilder::new(&registry)
            .with_tag(ids.position)
            .build()
            .is_err());
        assert!(EntityBuilder::new(&registry)
            .with_shared(Position::default())
            .build()
            .is_err());
        assert!(EntityBuilder::new(&registry)
            .include(ComponentTypeId::new(200))
            .build()
            .is_err());
    }
}
