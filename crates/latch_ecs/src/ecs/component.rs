// component.rs - Runtime component registration
//
// Components are identified by dense u16 ids handed out by an explicitly
// constructed registry, not by Rust TypeIds. Untyped (scripted) components
// coexist with Rust components: the storage only needs size, alignment and
// a default initializer for each id.

use bytemuck::Pod;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::mem::{align_of, size_of};
use tracing::debug;

use crate::ecs::error::{RegistryError, StorageError};
use crate::ecs::mask::{ComponentMask, MAX_COMPONENT_TYPES};

/// Dense identifier of a registered component type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(u16);

impl ComponentTypeId {
    /// Wrap a raw id. Panics if it does not fit in a `ComponentMask`.
    pub const fn new(raw: u16) -> Self {
        assert!(
            (raw as usize) < MAX_COMPONENT_TYPES,
            "component type id exceeds mask capacity"
        );
        Self(raw)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a component's data is stored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// One value per entity, stored in a column of the allocation.
    Fragment,
    /// Presence only; occupies a mask bit but no bytes.
    Tag,
    /// One value per allocation, uniform across its rows.
    Chunk,
    /// One value per unique shared value, referenced by allocations.
    Shared,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Fragment => "fragment",
            ComponentKind::Tag => "tag",
            ComponentKind::Chunk => "chunk",
            ComponentKind::Shared => "shared",
        };
        f.write_str(name)
    }
}

/// Metadata describing a component's memory layout.
#[derive(Clone, Debug)]
pub struct ComponentInfo {
    pub id: ComponentTypeId,
    pub name: String,
    pub kind: ComponentKind,
    pub size: usize,
    pub align: usize,
    /// Rust type backing the component, `None` for raw components.
    pub type_id: Option<TypeId>,
    /// Writes the default value into a buffer of exactly `size` bytes.
    pub default_init: fn(&mut [u8]),
}

impl ComponentInfo {
    /// Default value bytes for this component.
    pub fn default_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.size];
        (self.default_init)(&mut bytes);
        bytes
    }

    /// Whether `T` is the Rust type this component was registered with.
    pub fn is_type<T: 'static>(&self) -> bool {
        self.type_id == Some(TypeId::of::<T>())
    }
}

/// Rust-defined components: plain data with a default value.
///
/// `Pod` guarantees the bytes stored in a column can be reinterpreted as the
/// type and copied freely between allocations.
pub trait Component: Pod + Default + Send + Sync + 'static {}

impl<T: Pod + Default + Send + Sync + 'static> Component for T {}

fn write_default<T: Component>(dst: &mut [u8]) {
    dst.copy_from_slice(bytemuck::bytes_of(&T::default()));
}

fn write_zeroed(dst: &mut [u8]) {
    dst.fill(0);
}

/// Registry of every component type an `EntityManager` can store.
///
/// Built once during startup and then shared immutably (usually through an
/// `Arc`) with the managers that use it, so registration order and ids are
/// deterministic.
#[derive(Debug, Default, Clone)]
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    by_type: HashMap<TypeId, ComponentTypeId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a per-entity fragment. Zero-sized types become tags.
    pub fn register<T: Component>(&mut self) -> Result<ComponentTypeId, RegistryError> {
        let kind = if size_of::<T>() == 0 {
            ComponentKind::Tag
        } else {
            ComponentKind::Fragment
        };
        self.register_typed::<T>(kind)
    }

    /// Register a component stored once per allocation.
    pub fn register_chunk<T: Component>(&mut self) -> Result<ComponentTypeId, RegistryError> {
        self.register_typed::<T>(ComponentKind::Chunk)
    }

    /// Register a component whose values are shared between entities.
    pub fn register_shared<T: Component>(&mut self) -> Result<ComponentTypeId, RegistryError> {
        self.register_typed::<T>(ComponentKind::Shared)
    }

    /// Register a data-less tag.
    pub fn register_tag(&mut self, name: impl Into<String>) -> Result<ComponentTypeId, RegistryError> {
        self.push(ComponentInfo {
            id: ComponentTypeId(0),
            name: name.into(),
            kind: ComponentKind::Tag,
            size: 0,
            align: 1,
            type_id: None,
            default_init: write_zeroed,
        })
    }

    /// Register an untyped per-entity fragment (scripted data, serialized
    /// payloads). Its default value is all zero bytes.
    pub fn register_raw(
        &mut self,
        name: impl Into<String>,
        size: usize,
        align: usize,
    ) -> Result<ComponentTypeId, RegistryError> {
        let name = name.into();
        if size == 0 || !align.is_power_of_two() || size % align != 0 {
            return Err(RegistryError::InvalidLayout { name, size, align });
        }
        self.push(ComponentInfo {
            id: ComponentTypeId(0),
            name,
            kind: ComponentKind::Fragment,
            size,
            align,
            type_id: None,
            default_init: write_zeroed,
        })
    }

    fn register_typed<T: Component>(
        &mut self,
        kind: ComponentKind,
    ) -> Result<ComponentTypeId, RegistryError> {
        let type_id = TypeId::of::<T>();
        if self.by_type.contains_key(&type_id) {
            return Err(RegistryError::DuplicateType {
                name: type_name::<T>().to_string(),
            });
        }
        if kind != ComponentKind::Tag && size_of::<T>() == 0 {
            return Err(RegistryError::InvalidLayout {
                name: type_name::<T>().to_string(),
                size: 0,
                align: align_of::<T>(),
            });
        }

        let id = self.push(ComponentInfo {
            id: ComponentTypeId(0),
            name: type_name::<T>().to_string(),
            kind,
            size: size_of::<T>(),
            align: align_of::<T>(),
            type_id: Some(type_id),
            default_init: write_default::<T>,
        })?;
        self.by_type.insert(type_id, id);
        Ok(id)
    }

    fn push(&mut self, mut info: ComponentInfo) -> Result<ComponentTypeId, RegistryError> {
        if self.infos.len() >= MAX_COMPONENT_TYPES {
            return Err(RegistryError::CapacityExceeded {
                max: MAX_COMPONENT_TYPES,
            });
        }
        let id = ComponentTypeId(self.infos.len() as u16);
        info.id = id;
        debug!(
            component = %id,
            name = %info.name,
            kind = %info.kind,
            size = info.size,
            align = info.align,
            "registered component"
        );
        self.infos.push(info);
        Ok(id)
    }

    /// Look up component metadata by id.
    pub fn info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Id assigned to the Rust type `T`, if registered.
    pub fn id_of<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Id assigned to `T`, or `UnregisteredType`.
    pub fn require<T: 'static>(&self) -> Result<ComponentTypeId, StorageError> {
        self.id_of::<T>().ok_or(StorageError::UnregisteredType {
            name: type_name::<T>(),
        })
    }

    /// Mask with the given ids set, rejecting ids this registry never issued.
    pub fn mask_of(&self, ids: &[ComponentTypeId]) -> Result<ComponentMask, StorageError> {
        let mask = ComponentMask::from_ids(ids.iter().copied());
        self.check_mask(&mask)
            .map_err(|component| StorageError::UnknownComponent { component })?;
        Ok(mask)
    }

    /// Whether every id set in `mask` is registered. Returns the first
    /// unknown id otherwise.
    pub fn check_mask(&self, mask: &ComponentMask) -> Result<(), ComponentTypeId> {
        match mask.iter().find(|id| id.index() >= self.infos.len()) {
            Some(unknown) => Err(unknown),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Health {
        value: i32,
    }

    impl Default for Health {
        fn default() -> Self {
            Self { value: 100 }
        }
    }

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[test]
    fn ids_are_dense_in_registration_order() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register::<Position>().unwrap();
        let b = registry.register_tag("Frozen").unwrap();
        let c = registry.register_raw("ScriptBlob", 16, 8).unwrap();
        assert_eq!((a.raw(), b.raw(), c.raw()), (0, 1, 2));
        assert_eq!(registry.id_of::<Position>(), Some(a));
        assert_eq!(registry.info(b).unwrap().kind, ComponentKind::Tag);
        assert_eq!(registry.info(c).unwrap().size, 16);
    }

    #[test]
    fn default_init_uses_the_type_default() {
        let mut registry = ComponentRegistry::new();
        let id = registry.register::<Health>().unwrap();
        let bytes = registry.info(id).unwrap().default_bytes();
        assert_eq!(bytemuck::pod_read_unaligned::<Health>(&bytes), Health { value: 100 });
    }

    #[test]
    fn duplicate_types_are_rejected() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Position>().unwrap();
        let err = registry.register_shared::<Position>().unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateType { .. }));
    }

    #[test]
    fn raw_layouts_are_validated() {
        let mut registry = ComponentRegistry::new();
        assert!(registry.register_raw("Zero", 0, 1).is_err());
        assert!(registry.register_raw("Odd", 6, 4).is_err());
        assert!(registry.register_raw("NotPow2", 12, 3).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn capacity_is_bounded_by_mask_width() {
        let mut registry = ComponentRegistry::new();
        for i in 0..MAX_COMPONENT_TYPES {
            registry.register_tag(format!("Tag{i}")).unwrap();
        }
        let err = registry.register_tag("OneTooMany").unwrap_err();
        assert_eq!(err, RegistryError::CapacityExceeded { max: MAX_COMPONENT_TYPES });
    }

    #[test]
    fn check_mask_reports_unknown_ids() {
        let mut registry = ComponentRegistry::new();
        let known = registry.register::<Position>().unwrap();
        let unknown = ComponentTypeId::new(9);
        assert!(registry.check_mask(&ComponentMask::from_ids([known])).is_ok());
        assert_eq!(
            registry.check_mask(&ComponentMask::from_ids([known, unknown])),
            Err(unknown)
        );
    }
}
