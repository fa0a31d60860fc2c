// context.rs - Fragment views bound to one allocation
//
// An ExecutionContext resolves a query's requirements against the allocation
// currently being visited. Views are checked typed slices whose lifetime is
// bounded by the context; aliasing between views of the same component is
// caught at runtime, in the manner of RefCell.

use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::ecs::builder::{ComponentBytes, EntityBlueprint};
use crate::ecs::command::{Command, DeferredCommandBuffer};
use crate::ecs::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::ecs::entity::EntityId;
use crate::ecs::error::BuilderError;
use crate::ecs::mask::ComponentMask;
use crate::ecs::requirement::{Access, BindingScope, FragmentRequirement};
use crate::ecs::storage::{Allocation, AllocationHandle, SharedValueStore};

/// Access to the shared value store granted to a context.
pub enum SharedValues<'a> {
    /// Sequential execution: `Shared` requirements may be written.
    Exclusive(&'a mut SharedValueStore),
    /// Parallel execution: shared values are read-only.
    ReadOnly(&'a SharedValueStore),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum BorrowState {
    Unborrowed,
    Shared,
    Exclusive,
}

struct Binding {
    requirement: FragmentRequirement,
    /// `None` for an optional requirement absent from the allocation.
    ptr: Option<NonNull<u8>>,
    /// Elements behind `ptr`: the row count for columns, 1 otherwise.
    len: usize,
    stride: usize,
    state: Cell<BorrowState>,
}

/// Views into one allocation for the duration of processing it.
///
/// Valid only for the allocation serial observed at bind time. The context
/// holds the allocation exclusively, so no structural change can happen
/// while it is alive.
pub struct ExecutionContext<'a> {
    handle: AllocationHandle,
    serial: u64,
    mask: ComponentMask,
    entities: &'a [EntityId],
    registry: &'a ComponentRegistry,
    bindings: Vec<Binding>,
    commands: RefCell<&'a mut DeferredCommandBuffer>,
    _allocation: PhantomData<&'a mut Allocation>,
}

impl<'a> ExecutionContext<'a> {
    /// Resolve `requirements` against `allocation`.
    ///
    /// # Panics
    ///
    /// - `MissingRequiredFragment` if a required component is not in the
    ///   allocation's mask (the query filter did not cover the requirements).
    /// - If a requirement's scope does not match how the component is stored,
    ///   or a `Shared` write is requested with read-only shared values.
    pub fn bind(
        requirements: &[FragmentRequirement],
        handle: AllocationHandle,
        allocation: &'a mut Allocation,
        shared: SharedValues<'a>,
        registry: &'a ComponentRegistry,
        commands: &'a mut DeferredCommandBuffer,
    ) -> Self {
        let base = allocation.base_ptr_mut();
        let allocation: &'a Allocation = allocation;
        let (store, shared_writable): (&'a SharedValueStore, bool) = match shared {
            SharedValues::Exclusive(store) => (&*store, true),
            SharedValues::ReadOnly(store) => (store, false),
        };
        let layout = allocation.layout();
        let count = allocation.len();

        let bindings = requirements
            .iter()
            .map(|&requirement| {
                let component = requirement.component;
                let unbound = |stride| Binding {
                    requirement,
                    ptr: None,
                    len: 0,
                    stride,
                    state: Cell::new(BorrowState::Unborrowed),
                };

                if !allocation.mask().contains(component) {
                    if requirement.is_required() {
                        panic!(
                            "MissingRequiredFragment: component {component} is required but \
                             allocation {handle} has mask {:?}",
                            allocation.mask()
                        );
                    }
                    return unbound(0);
                }

                let (offset_ptr, len, stride) = match requirement.scope {
                    BindingScope::PerEntity => {
                        let column = layout.column(component).unwrap_or_else(|| {
                            panic!("component {component} is not a per-entity fragment")
                        });
                        // SAFETY: offset lies inside the block.
                        let ptr = unsafe { NonNull::new_unchecked(base.as_ptr().add(column.offset)) };
                        (ptr, count, column.stride)
                    }
                    BindingScope::PerChunk => {
                        let value = layout.chunk_value(component).unwrap_or_else(|| {
                            panic!("component {component} is not a chunk component")
                        });
                        // SAFETY: offset lies inside the block.
                        let ptr = unsafe { NonNull::new_unchecked(base.as_ptr().add(value.offset)) };
                        (ptr, 1, value.stride)
                    }
                    BindingScope::SharedConst | BindingScope::Shared => {
                        if requirement.is_write()
                            && (requirement.scope == BindingScope::SharedConst || !shared_writable)
                        {
                            panic!("component {component}: shared value cannot be bound for write here");
                        }
                        let value = allocation
                            .shared_values()
                            .get(component)
                            .and_then(|h| store.value_ptr(h).zip(store.bytes(h).map(<[u8]>::len)));
                        let (ptr, size) = value.unwrap_or_else(|| {
                            panic!("component {component} has no shared value in allocation {handle}")
                        });
                        (ptr, 1, size)
                    }
                };

                Binding {
                    requirement,
                    ptr: Some(offset_ptr),
                    len,
                    stride,
                    state: Cell::new(BorrowState::Unborrowed),
                }
            })
            .collect();

        Self {
            handle,
            serial: allocation.serial(),
            mask: *allocation.mask(),
            entities: allocation.entities(),
            registry,
            bindings,
            commands: RefCell::new(commands),
            _allocation: PhantomData,
        }
    }

    #[inline]
    pub fn handle(&self) -> AllocationHandle {
        self.handle
    }

    /// Allocation serial at bind time.
    #[inline]
    pub fn serial(&self) -> u64 {
        self.serial
    }

    #[inline]
    pub fn mask(&self) -> &ComponentMask {
        &self.mask
    }

    /// Entity ids, row-aligned with every per-entity view.
    #[inline]
    pub fn entities(&self) -> &[EntityId] {
        self.entities
    }

    #[inline]
    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    pub fn registry(&self) -> &ComponentRegistry {
        self.registry
    }

    /// Whether an optional requirement found its component.
    pub fn is_bound(&self, component: ComponentTypeId) -> bool {
        self.bindings
            .iter()
            .any(|b| b.requirement.component == component && b.ptr.is_some())
    }

    fn typed_id<T: Component>(&self) -> ComponentTypeId {
        self.registry
            .id_of::<T>()
            .unwrap_or_else(|| panic!("type '{}' is not registered", type_name::<T>()))
    }

    fn binding(&self, component: ComponentTypeId, scope: BindingScope) -> &Binding {
        let binding = self
            .bindings
            .iter()
            .find(|b| b.requirement.component == component)
            .unwrap_or_else(|| panic!("component {component} was not requested by this query"));
        let bound_scope = binding.requirement.scope;
        let compatible = bound_scope == scope
            || (scope == BindingScope::SharedConst && bound_scope == BindingScope::Shared);
        assert!(
            compatible,
            "component {component} is bound {bound_scope}, not {scope}"
        );
        binding
    }

    fn acquire(binding: &Binding, access: Access) {
        let component = binding.requirement.component;
        if access == Access::Write {
            assert!(
                binding.requirement.is_write(),
                "component {component} was requested read-only"
            );
        }
        let next = match (access, binding.state.get()) {
            (Access::Read, BorrowState::Exclusive) => {
                panic!("component {component} is already borrowed mutably")
            }
            (Access::Write, BorrowState::Shared | BorrowState::Exclusive) => {
                panic!("component {component} is already borrowed")
            }
            (Access::Read, _) => BorrowState::Shared,
            (Access::Write, BorrowState::Unborrowed) => BorrowState::Exclusive,
        };
        binding.state.set(next);
    }

    fn bytes(&self, binding: &Binding) -> Option<&[u8]> {
        Self::acquire(binding, Access::Read);
        binding.ptr.map(|ptr| {
            // SAFETY: ptr covers len * stride bytes inside storage held for 'a;
            // no exclusive view of this binding exists (checked above).
            unsafe { std::slice::from_raw_parts(ptr.as_ptr(), binding.len * binding.stride) }
        })
    }

    #[allow(clippy::mut_from_ref)]
    fn bytes_mut(&self, binding: &Binding) -> Option<&mut [u8]> {
        Self::acquire(binding, Access::Write);
        binding.ptr.map(|ptr| {
            // SAFETY: as above, and this is the only view ever handed out for
            // this binding. Bindings of distinct components never overlap.
            unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), binding.len * binding.stride) }
        })
    }

    fn check_type<T: Component>(&self, component: ComponentTypeId) {
        let info = self.registry.info(component);
        assert!(
            info.is_some_and(|info| info.is_type::<T>()),
            "component {component} is not stored as '{}'",
            type_name::<T>()
        );
    }

    /// Per-entity column of a required fragment.
    pub fn fragment<T: Component>(&self) -> &[T] {
        self.optional_fragment::<T>()
            .unwrap_or_else(|| panic!("optional fragment '{}' is absent", type_name::<T>()))
    }

    pub fn optional_fragment<T: Component>(&self) -> Option<&[T]> {
        let id = self.typed_id::<T>();
        let binding = self.binding(id, BindingScope::PerEntity);
        self.bytes(binding).map(bytemuck::cast_slice)
    }

    /// Writable per-entity column. Each column can be borrowed mutably once.
    #[allow(clippy::mut_from_ref)]
    pub fn fragment_mut<T: Component>(&self) -> &mut [T] {
        self.optional_fragment_mut::<T>()
            .unwrap_or_else(|| panic!("optional fragment '{}' is absent", type_name::<T>()))
    }

    #[allow(clippy::mut_from_ref)]
    pub fn optional_fragment_mut<T: Component>(&self) -> Option<&mut [T]> {
        let id = self.typed_id::<T>();
        let binding = self.binding(id, BindingScope::PerEntity);
        self.bytes_mut(binding).map(bytemuck::cast_slice_mut)
    }

    /// Value stored once for the whole allocation.
    pub fn chunk_fragment<T: Component>(&self) -> Option<&T> {
        let id = self.typed_id::<T>();
        let binding = self.binding(id, BindingScope::PerChunk);
        self.bytes(binding).map(bytemuck::from_bytes)
    }

    #[allow(clippy::mut_from_ref)]
    pub fn chunk_fragment_mut<T: Component>(&self) -> Option<&mut T> {
        let id = self.typed_id::<T>();
        let binding = self.binding(id, BindingScope::PerChunk);
        self.bytes_mut(binding).map(bytemuck::from_bytes_mut)
    }

    /// Shared value referenced by the allocation.
    pub fn shared_fragment<T: Component>(&self) -> Option<&T> {
        let id = self.typed_id::<T>();
        let binding = self.binding(id, BindingScope::SharedConst);
        self.bytes(binding).map(bytemuck::from_bytes)
    }

    /// Writable shared value. Every allocation referencing the value sees
    /// the change.
    #[allow(clippy::mut_from_ref)]
    pub fn shared_fragment_mut<T: Component>(&self) -> Option<&mut T> {
        let id = self.typed_id::<T>();
        let binding = self.binding(id, BindingScope::Shared);
        self.bytes_mut(binding).map(bytemuck::from_bytes_mut)
    }

    /// Untyped view of any bound requirement: `len * size` bytes for
    /// per-entity columns, one value otherwise.
    pub fn raw_fragment(&self, component: ComponentTypeId) -> Option<&[u8]> {
        let binding = self.raw_binding(component);
        self.bytes(binding)
    }

    #[allow(clippy::mut_from_ref)]
    pub fn raw_fragment_mut(&self, component: ComponentTypeId) -> Option<&mut [u8]> {
        let binding = self.raw_binding(component);
        self.bytes_mut(binding)
    }

    fn raw_binding(&self, component: ComponentTypeId) -> &Binding {
        self.bindings
            .iter()
            .find(|b| b.requirement.component == component)
            .unwrap_or_else(|| panic!("component {component} was not requested by this query"))
    }

    /// Typed variants check the registered Rust type before viewing bytes.
    pub fn fragment_of<T: Component>(&self, component: ComponentTypeId) -> Option<&[T]> {
        self.check_type::<T>(component);
        let binding = self.binding(component, BindingScope::PerEntity);
        self.bytes(binding).map(bytemuck::cast_slice)
    }

    // -- deferred commands --

    pub fn queue(&self, command: Command) {
        self.commands.borrow_mut().enqueue(command);
    }

    pub fn queue_create(&self, mask: ComponentMask) {
        self.commands.borrow_mut().create(mask);
    }

    pub fn queue_spawn(&self, blueprint: EntityBlueprint) {
        self.commands.borrow_mut().spawn(blueprint);
    }

    pub fn queue_destroy(&self, entity: EntityId) {
        self.commands.borrow_mut().destroy(entity);
    }

    pub fn queue_add_fragment(&self, entity: EntityId, component: ComponentTypeId) {
        self.commands.borrow_mut().add_fragment(entity, component);
    }

    /// Queue adding (or overwriting) a typed fragment value.
    pub fn queue_insert<T: Component>(&self, entity: EntityId, value: T) -> Result<(), BuilderError> {
        let value = ComponentBytes::of(self.registry, value)?;
        self.commands.borrow_mut().add_fragment_value(entity, value);
        Ok(())
    }

    pub fn queue_remove_fragment(&self, entity: EntityId, component: ComponentTypeId) {
        self.commands.borrow_mut().remove_fragment(entity, component);
    }

    pub fn queue_set_shared<T: Component>(&self, entity: EntityId, value: T) -> Result<(), BuilderError> {
        let value = ComponentBytes::of(self.registry, value)?;
        self.commands.borrow_mut().set_shared(entity, value);
        Ok(())
    }

    /// Commands queued so far through this context's buffer.
    pub fn queued_commands(&self) -> usize {
        self.commands.borrow().len()
    }
}
