// command.rs - Deferred structural mutation
//
// Systems running inside a query cannot touch the storage layout. They record
// their intent in a DeferredCommandBuffer instead, and the buffer is replayed
// against the EntityManager once no iterator is alive.

use crate::ecs::builder::{ComponentBytes, EntityBlueprint};
use crate::ecs::component::ComponentTypeId;
use crate::ecs::entity::EntityId;
use crate::ecs::error::StorageError;
use crate::ecs::manager::EntityManager;
use crate::ecs::mask::ComponentMask;

/// One queued structural mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an entity from a blueprint (a bare mask uses default values).
    Create { blueprint: EntityBlueprint },
    Destroy { entity: EntityId },
    /// Add a fragment, with a value or the registered default.
    AddFragment {
        entity: EntityId,
        component: ComponentTypeId,
        value: Option<ComponentBytes>,
    },
    RemoveFragment {
        entity: EntityId,
        component: ComponentTypeId,
    },
    SetShared {
        entity: EntityId,
        value: ComponentBytes,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Create { .. } => "create",
            Command::Destroy { .. } => "destroy",
            Command::AddFragment { .. } => "add_fragment",
            Command::RemoveFragment { .. } => "remove_fragment",
            Command::SetShared { .. } => "set_shared",
        }
    }

    /// Entity the command operates on, if it targets an existing one.
    pub fn target(&self) -> Option<EntityId> {
        match self {
            Command::Create { .. } => None,
            Command::Destroy { entity }
            | Command::AddFragment { entity, .. }
            | Command::RemoveFragment { entity, .. }
            | Command::SetShared { entity, .. } => Some(*entity),
        }
    }

    /// Apply the command, returning the entity it created, if any.
    pub(crate) fn apply(self, manager: &mut EntityManager) -> Result<Option<EntityId>, StorageError> {
        match self {
            Command::Create { blueprint } => manager.spawn(&blueprint).map(Some),
            Command::Destroy { entity } => manager.destroy_entity(entity).map(|_| None),
            Command::AddFragment {
                entity,
                component,
                value: None,
            } => manager.add_fragment(entity, component).map(|_| None),
            Command::AddFragment {
                entity,
                value: Some(value),
                ..
            } => manager.add_fragment_value(entity, &value).map(|_| None),
            Command::RemoveFragment { entity, component } => {
                manager.remove_fragment(entity, component).map(|_| None)
            }
            Command::SetShared { entity, value } => {
                manager.set_shared_value(entity, &value).map(|_| None)
            }
        }
    }
}

/// A command that failed during a flush. The flush continued past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// Position of the command in the flushed sequence.
    pub index: usize,
    pub command: &'static str,
    pub error: StorageError,
}

/// Outcome of replaying deferred commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub applied: usize,
    /// Entities created, in command order.
    pub created: Vec<EntityId>,
    pub failures: Vec<CommandFailure>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn merge(&mut self, other: FlushReport, index_offset: usize) {
        self.applied += other.applied;
        self.created.extend(other.created);
        self.failures
            .extend(other.failures.into_iter().map(|mut failure| {
                failure.index += index_offset;
                failure
            }));
    }
}

/// Ordered list of structural mutations waiting for a safe point.
///
/// Appending never touches storage. Payloads are type-checked when their
/// `ComponentBytes` are built; everything else is validated on flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeferredCommandBuffer {
    commands: Vec<Command>,
}

impl DeferredCommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn create(&mut self, mask: ComponentMask) {
        self.spawn(EntityBlueprint::from_mask(mask));
    }

    pub fn spawn(&mut self, blueprint: EntityBlueprint) {
        self.enqueue(Command::Create { blueprint });
    }

    pub fn destroy(&mut self, entity: EntityId) {
        self.enqueue(Command::Destroy { entity });
    }

    pub fn add_fragment(&mut self, entity: EntityId, component: ComponentTypeId) {
        self.enqueue(Command::AddFragment {
            entity,
            component,
            value: None,
        });
    }

    pub fn add_fragment_value(&mut self, entity: EntityId, value: ComponentBytes) {
        self.enqueue(Command::AddFragment {
            entity,
            component: value.component(),
            value: Some(value),
        });
    }

    pub fn remove_fragment(&mut self, entity: EntityId, component: ComponentTypeId) {
        self.enqueue(Command::RemoveFragment { entity, component });
    }

    pub fn set_shared(&mut self, entity: EntityId, value: ComponentBytes) {
        self.enqueue(Command::SetShared { entity, value });
    }

    /// Move every command of `other` to the end of this buffer.
    pub fn append(&mut self, other: &mut DeferredCommandBuffer) {
        self.commands.append(&mut other.commands);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    /// Replay into `manager`. See `EntityManager::flush_deferred`.
    pub fn flush(self, manager: &mut EntityManager) -> Result<FlushReport, StorageError> {
        manager.flush_deferred(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u16) -> ComponentTypeId {
        ComponentTypeId::new(raw)
    }

    #[test]
    fn commands_keep_enqueue_order() {
        let entity = EntityId::new(3, 1);
        let mut buffer = DeferredCommandBuffer::new();
        buffer.create(ComponentMask::from_ids([id(0)]));
        buffer.add_fragment(entity, id(1));
        buffer.remove_fragment(entity, id(0));
        buffer.destroy(entity);

        let names: Vec<_> = buffer.iter().map(Command::name).collect();
        assert_eq!(names, vec!["create", "add_fragment", "remove_fragment", "destroy"]);
        let targets: Vec<_> = buffer.iter().map(Command::target).collect();
        assert_eq!(targets, vec![None, Some(entity), Some(entity), Some(entity)]);
    }

    #[test]
    fn append_moves_commands() {
        let mut first = DeferredCommandBuffer::new();
        let mut second = DeferredCommandBuffer::new();
        first.destroy(EntityId::new(0, 0));
        second.destroy(EntityId::new(1, 0));
        second.destroy(EntityId::new(2, 0));
        first.append(&mut second);
        assert!(second.is_empty());
        let targets: Vec<_> = first
            .into_commands()
            .into_iter()
            .filter_map(|c| c.target())
            .map(|e| e.index())
            .collect();
        assert_eq!(targets, vec![0, 1, 2]);
    }

    #[test]
    fn report_merge_offsets_failure_indices() {
        let mut total = FlushReport::default();
        let failure = CommandFailure {
            index: 1,
            command: "destroy",
            error: StorageError::StaleHandle {
                entity: EntityId::new(0, 0),
            },
        };
        total.merge(
            FlushReport {
                applied: 2,
                created: vec![EntityId::new(4, 0)],
                failures: vec![failure.clone()],
            },
            10,
        );
        assert_eq!(total.applied, 2);
        assert_eq!(total.failures[0].index, 11);
        assert!(!total.is_clean());
    }
}
