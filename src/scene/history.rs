//! Undo / Redo and Clipboard
//!
//! Both are built on entity-group archives. Undo snapshots are taken with
//! seed 0, so restoring one brings back the exact IDs that were captured.
//! Pastes use a fresh seed every time, so repeated pastes never collide.

use crate::archive::Archive;
use crate::ecs::{Entity, create_entity};
use crate::errors::Result;
use crate::scene::Scene;
use crate::scene::serialize::EntityRecord;

const DEFAULT_HISTORY_LIMIT: usize = 128;

/// An edit in progress: the state of its entities before the change.
#[derive(Debug)]
pub struct PendingEdit {
    entities: Vec<Entity>,
    before: Vec<u8>,
}

impl PendingEdit {
    /// Adds an entity the edit created, so redo brings it back and undo
    /// removes it.
    pub fn track(&mut self, entity: Entity) {
        if !self.entities.contains(&entity) {
            self.entities.push(entity);
        }
    }
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    entities: Vec<Entity>,
    before: Vec<u8>,
    after: Vec<u8>,
}

/// Linear undo stack of entity snapshots.
///
/// ```rust,ignore
/// let mut edit = history.begin(&scene, &[entity])?;
/// scene.transforms.get_mut(entity).unwrap().translate(Vec3::X);
/// history.commit(&scene, edit)?;
///
/// history.undo(&mut scene)?;
/// ```
#[derive(Debug)]
pub struct UndoHistory {
    entries: Vec<HistoryEntry>,
    /// Number of entries currently applied.
    position: usize,
    limit: usize,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl UndoHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            position: 0,
            limit: limit.max(1),
        }
    }

    /// Snapshots `entities` before an edit.
    pub fn begin(&self, scene: &Scene, entities: &[Entity]) -> Result<PendingEdit> {
        Ok(PendingEdit {
            entities: entities.to_vec(),
            before: snapshot(scene, entities)?,
        })
    }

    /// Snapshots the same entities after the edit and records the pair.
    /// Discards any entries that were undone.
    pub fn commit(&mut self, scene: &Scene, edit: PendingEdit) -> Result<()> {
        let after = snapshot(scene, &edit.entities)?;
        self.entries.truncate(self.position);
        self.entries.push(HistoryEntry {
            entities: edit.entities,
            before: edit.before,
            after,
        });
        if self.entries.len() > self.limit {
            self.entries.remove(0);
        }
        self.position = self.entries.len();
        Ok(())
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.position < self.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.position = 0;
    }

    /// Restores the state before the last applied edit. Returns `false` when
    /// there is nothing to undo.
    pub fn undo(&mut self, scene: &mut Scene) -> Result<bool> {
        if !self.can_undo() {
            return Ok(false);
        }
        let entry = &self.entries[self.position - 1];
        restore(scene, &entry.entities, &entry.before)?;
        self.position -= 1;
        Ok(true)
    }

    /// Re-applies the next undone edit. Returns `false` when there is nothing
    /// to redo.
    pub fn redo(&mut self, scene: &mut Scene) -> Result<bool> {
        if !self.can_redo() {
            return Ok(false);
        }
        let entry = &self.entries[self.position];
        restore(scene, &entry.entities, &entry.after)?;
        self.position += 1;
        Ok(true)
    }
}

fn snapshot(scene: &Scene, entities: &[Entity]) -> Result<Vec<u8>> {
    let mut archive = Archive::new();
    scene.serialize_entities(&mut archive, entities)?;
    Ok(archive.into_bytes())
}

/// Replaces `entities` by the snapshot. Entities absent from the snapshot end
/// up removed.
fn restore(scene: &mut Scene, entities: &[Entity], bytes: &[u8]) -> Result<()> {
    let mut archive = Archive::from_bytes(bytes.to_vec())?;
    // Decode before touching the scene
    let records: Vec<EntityRecord> = archive.read()?;

    for &entity in entities {
        scene.remove_entity(entity);
    }
    for record in records {
        scene.restore_entity(record);
    }
    Ok(())
}

/// Copy / paste of entity groups.
#[derive(Debug, Default)]
pub struct Clipboard {
    contents: Option<Vec<u8>>,
}

impl Clipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.is_none()
    }

    pub fn clear(&mut self) {
        self.contents = None;
    }

    /// Copies `entities` (each with its subtree). Returns the number of
    /// entities copied.
    pub fn copy(&mut self, scene: &Scene, entities: &[Entity]) -> Result<usize> {
        let mut group: Vec<Entity> = Vec::new();
        for &entity in entities {
            for e in scene.subtree(entity) {
                if !group.contains(&e) {
                    group.push(e);
                }
            }
        }

        let mut archive = Archive::new();
        let count = scene.serialize_entities(&mut archive, &group)?;
        self.contents = Some(archive.into_bytes());
        Ok(count)
    }

    /// Pastes the copied group under fresh IDs. References between copied
    /// entities are redirected to the pasted copies. Returns the new entities,
    /// or an empty list if nothing was copied.
    pub fn paste(&self, scene: &mut Scene) -> Result<Vec<Entity>> {
        let Some(bytes) = &self.contents else {
            return Ok(Vec::new());
        };
        let mut archive = Archive::from_bytes(bytes.clone())?;
        let seed = create_entity().to_raw();
        scene.deserialize_entities(&mut archive, seed, true)
    }
}
