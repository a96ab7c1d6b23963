//! Deferred Scene Commands
//!
//! Import and loading threads never touch a live [`Scene`]. They build their
//! own scene and hand it over through a [`CommandSender`]; the owning scene
//! applies queued commands at its safe point (the start of
//! [`Scene::update`] or an explicit [`Scene::flush_commands`]).

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::ecs::{Entity, EntityRemap};
use crate::scene::Scene;

const PENDING: u8 = 0;
const CANCELLED: u8 = 1;
const COMMITTED: u8 = 2;

pub(crate) enum SceneCommand {
    Merge {
        scene: Box<Scene>,
        state: Arc<AtomicU8>,
        remap: flume::Sender<EntityRemap>,
    },
    Remove(Entity),
}

/// Ticket for a queued merge.
///
/// The merge can be cancelled until the scene commits it. Once committed only
/// an undo snapshot can roll it back.
#[derive(Debug)]
pub struct PendingMerge {
    state: Arc<AtomicU8>,
    remap: flume::Receiver<EntityRemap>,
}

impl PendingMerge {
    /// Withdraws the merge. Returns `false` if it was already committed.
    pub fn cancel(&self) -> bool {
        match self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(state) => state == CANCELLED,
        }
    }

    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state.load(Ordering::Acquire) == COMMITTED
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// The old → new entity table, available once the merge is committed.
    pub fn try_remap(&self) -> Option<EntityRemap> {
        self.remap.try_recv().ok()
    }
}

/// Cloneable producer handle for a scene's command queue.
#[derive(Clone)]
pub struct CommandSender {
    sender: flume::Sender<SceneCommand>,
}

impl CommandSender {
    /// Queues `scene` to be merged into the owning scene.
    pub fn merge(&self, scene: Scene) -> PendingMerge {
        let state = Arc::new(AtomicU8::new(PENDING));
        let (remap_tx, remap_rx) = flume::bounded(1);
        let command = SceneCommand::Merge {
            scene: Box::new(scene),
            state: state.clone(),
            remap: remap_tx,
        };
        if self.sender.send(command).is_err() {
            log::error!("Failed to queue merge: the scene was dropped");
            state.store(CANCELLED, Ordering::Release);
        }
        PendingMerge {
            state,
            remap: remap_rx,
        }
    }

    /// Queues the removal of `entity`.
    pub fn remove(&self, entity: Entity) {
        if let Err(e) = self.sender.send(SceneCommand::Remove(entity)) {
            log::error!("Failed to queue removal: {e}");
        }
    }
}

pub(crate) struct CommandQueue {
    sender: flume::Sender<SceneCommand>,
    receiver: flume::Receiver<SceneCommand>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }
}

impl CommandQueue {
    pub(crate) fn sender(&self) -> CommandSender {
        CommandSender {
            sender: self.sender.clone(),
        }
    }

    pub(crate) fn drain(&self) -> impl Iterator<Item = SceneCommand> + '_ {
        self.receiver.try_iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.receiver.len()
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.receiver.len())
            .finish()
    }
}

/// Claims a queued merge for commit. Fails if it was cancelled first.
pub(crate) fn try_commit(state: &AtomicU8) -> bool {
    state
        .compare_exchange(PENDING, COMMITTED, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}
