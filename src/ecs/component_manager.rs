use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ecs::Entity;
use crate::ecs::entity::reserve_entity;
use crate::errors::{Result, SceneError};

/// Dense component table keyed by entity.
///
/// Components and their owning entities are stored in two parallel arrays, with
/// a hash map from entity to row index. Row `i` of `components` always belongs
/// to row `i` of `entities`.
///
/// # Index stability
///
/// [`remove`](Self::remove) swaps the last row into the removed slot. Any raw
/// index obtained before a removal (from [`index_of`](Self::index_of) or a loop
/// counter) is stale afterwards and must be re-resolved through the entity.
#[derive(Debug, Clone)]
pub struct ComponentManager<T> {
    components: Vec<T>,
    entities: Vec<Entity>,
    lookup: FxHashMap<Entity, usize>,
    // Receives values rejected by `insert`; never part of the table
    discard: Option<T>,
}

impl<T> Default for ComponentManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ComponentManager<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            components: Vec::with_capacity(capacity),
            entities: Vec::with_capacity(capacity),
            lookup: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            discard: None,
        }
    }

    /// Rebuilds a table from its two columns, validating the invariants.
    pub fn from_parts(components: Vec<T>, entities: Vec<Entity>) -> Result<Self> {
        if components.len() != entities.len() {
            return Err(SceneError::TableShape {
                components: components.len(),
                entities: entities.len(),
            });
        }
        let mut lookup = FxHashMap::with_capacity_and_hasher(entities.len(), Default::default());
        for (index, &entity) in entities.iter().enumerate() {
            if !entity.is_valid() {
                return Err(SceneError::InvalidEntity);
            }
            if lookup.insert(entity, index).is_some() {
                return Err(SceneError::DuplicateEntity(entity));
            }
        }
        entities.iter().copied().for_each(reserve_entity);
        Ok(Self {
            components,
            entities,
            lookup,
            discard: None,
        })
    }

    pub fn clear(&mut self) {
        self.components.clear();
        self.entities.clear();
        self.lookup.clear();
        self.discard = None;
    }

    /// Inserts `value` for `entity` and returns a reference to the stored row.
    ///
    /// Each entity may own at most one component per table. Inserting a second
    /// one is a programmer error: it asserts in debug builds, and in release
    /// builds the existing row is returned unchanged. `Entity::INVALID` is
    /// rejected the same way; the returned reference then points at a detached
    /// value that is not stored in the table.
    pub fn insert(&mut self, entity: Entity, value: T) -> &mut T {
        if !entity.is_valid() {
            debug_assert!(false, "INVALID entity cannot own a {}", std::any::type_name::<T>());
            log::error!(
                "INVALID entity cannot own a {}, component dropped",
                std::any::type_name::<T>()
            );
            return self.discard.insert(value);
        }

        if let Some(&index) = self.lookup.get(&entity) {
            debug_assert!(
                false,
                "entity {entity} already owns a {}",
                std::any::type_name::<T>()
            );
            log::error!(
                "Entity {entity} already owns a {}, keeping the existing component",
                std::any::type_name::<T>()
            );
            return &mut self.components[index];
        }

        reserve_entity(entity);
        self.lookup.insert(entity, self.components.len());
        self.entities.push(entity);
        self.components.push(value);

        debug_assert_eq!(self.components.len(), self.entities.len());
        debug_assert_eq!(self.lookup.len(), self.components.len());

        let last = self.components.len() - 1;
        &mut self.components[last]
    }

    /// Fallible insert: reports duplicates instead of asserting.
    pub fn try_insert(&mut self, entity: Entity, value: T) -> Result<&mut T> {
        if !entity.is_valid() {
            return Err(SceneError::InvalidEntity);
        }
        if self.contains(entity) {
            return Err(SceneError::ComponentExists {
                entity,
                component: std::any::type_name::<T>(),
            });
        }
        Ok(self.insert(entity, value))
    }

    /// Removes the component of `entity` by swapping the last row into its
    /// slot. Absent entities are a no-op.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let index = self.lookup.remove(&entity)?;

        let removed = self.components.swap_remove(index);
        self.entities.swap_remove(index);

        // The former last row now lives at `index`
        if let Some(&moved) = self.entities.get(index) {
            self.lookup.insert(moved, index);
        }

        Some(removed)
    }

    /// Removes the component of `entity` while keeping the order of every other
    /// row intact. O(n).
    pub fn remove_keep_sorted(&mut self, entity: Entity) -> Option<T> {
        let index = self.lookup.remove(&entity)?;

        let removed = self.components.remove(index);
        self.entities.remove(index);

        for (i, &moved) in self.entities.iter().enumerate().skip(index) {
            self.lookup.insert(moved, i);
        }

        Some(removed)
    }

    /// Moves the row at `from` to `to`, shifting the rows in between by one.
    pub fn move_item(&mut self, from: usize, to: usize) {
        debug_assert!(from < self.len() && to < self.len());
        if from == to || from >= self.len() || to >= self.len() {
            return;
        }

        if from < to {
            self.components[from..=to].rotate_left(1);
            self.entities[from..=to].rotate_left(1);
        } else {
            self.components[to..=from].rotate_right(1);
            self.entities[to..=from].rotate_right(1);
        }

        let (lo, hi) = (from.min(to), from.max(to));
        for i in lo..=hi {
            self.lookup.insert(self.entities[i], i);
        }
    }

    /// Stable-sorts the rows by `key`, keeping both columns and the lookup in
    /// step. Rows with equal keys keep their relative order.
    pub fn sort_by_key<K: Ord>(&mut self, mut key: impl FnMut(Entity, &T) -> K) {
        let mut rows: Vec<(K, Entity, T)> = self
            .entities
            .drain(..)
            .zip(self.components.drain(..))
            .map(|(entity, component)| (key(entity, &component), entity, component))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        self.lookup.clear();
        for (index, (_, entity, component)) in rows.into_iter().enumerate() {
            self.lookup.insert(entity, index);
            self.entities.push(entity);
            self.components.push(component);
        }
    }

    /// Appends every row of `other` and leaves `other` empty.
    ///
    /// The two tables must not share entities. A shared entity keeps the row
    /// already present in `self`.
    pub fn merge(&mut self, other: &mut ComponentManager<T>) {
        self.components.reserve(other.len());
        self.entities.reserve(other.len());
        self.lookup.reserve(other.len());

        other.lookup.clear();
        for (entity, component) in other.entities.drain(..).zip(other.components.drain(..)) {
            if self.contains(entity) {
                debug_assert!(false, "merge: entity {entity} present in both tables");
                log::warn!("Merge skipped entity {entity}: already present in target table");
                continue;
            }
            self.lookup.insert(entity, self.components.len());
            self.entities.push(entity);
            self.components.push(component);
        }
    }

    /// Rewrites the entity column through `map` and rebuilds the lookup. Row
    /// order is unchanged. `map` must be injective over this table's entities.
    pub fn remap_keys(&mut self, mut map: impl FnMut(Entity) -> Entity) {
        self.lookup.clear();
        for (index, entity) in self.entities.iter_mut().enumerate() {
            *entity = map(*entity);
            let previous = self.lookup.insert(*entity, index);
            debug_assert!(previous.is_none(), "remap_keys: {entity} mapped twice");
        }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.lookup.contains_key(&entity)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.lookup.get(&entity).map(|&i| &self.components[i])
    }

    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.lookup.get(&entity).map(|&i| &mut self.components[i])
    }

    #[inline]
    #[must_use]
    pub fn index_of(&self, entity: Entity) -> Option<usize> {
        self.lookup.get(&entity).copied()
    }

    #[inline]
    #[must_use]
    pub fn entity_at(&self, index: usize) -> Option<Entity> {
        self.entities.get(index).copied()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn components(&self) -> &[T] {
        &self.components
    }

    /// Mutable view of the component column. The entity column cannot be
    /// modified through it, so the row mapping stays valid.
    #[inline]
    pub fn components_mut(&mut self) -> &mut [T] {
        &mut self.components
    }

    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities.iter().copied().zip(self.components.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.entities.iter().copied().zip(self.components.iter_mut())
    }
}

impl<T: Default> ComponentManager<T> {
    /// Creates a default component for `entity`. See [`insert`](Self::insert)
    /// for the duplicate policy.
    pub fn create(&mut self, entity: Entity) -> &mut T {
        self.insert(entity, T::default())
    }

    pub fn try_create(&mut self, entity: Entity) -> Result<&mut T> {
        self.try_insert(entity, T::default())
    }
}

impl<T> std::ops::Index<usize> for ComponentManager<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.components[index]
    }
}

impl<T> std::ops::IndexMut<usize> for ComponentManager<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.components[index]
    }
}

// ============================================================================
// Serialization: the lookup is derived state and is rebuilt on load
// ============================================================================

#[derive(Serialize)]
struct TableRef<'a, T> {
    components: &'a [T],
    entities: &'a [Entity],
}

#[derive(Deserialize)]
struct TableOwned<T> {
    components: Vec<T>,
    entities: Vec<Entity>,
}

impl<T: Serialize> Serialize for ComponentManager<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        TableRef {
            components: &self.components,
            entities: &self.entities,
        }
        .serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for ComponentManager<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = TableOwned::<T>::deserialize(deserializer)?;
        Self::from_parts(raw.components, raw.entities).map_err(serde::de::Error::custom)
    }
}
