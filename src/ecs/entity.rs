use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Opaque row key shared by every component table.
///
/// An entity carries no data of its own. It is only meaningful as a key into the
/// `ComponentManager`s of a scene. `Entity::INVALID` is never issued.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(u64);

/// IDs derived from a seed live in the upper half of the ID space, the
/// allocator only ever hands out IDs in the lower half.
const DERIVED_BIT: u64 = 1 << 63;

// Global entity ID generator
static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

impl Entity {
    pub const INVALID: Entity = Entity(0);

    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Returns `true` if this ID was produced by [`derive_entity`] rather than
    /// the allocator.
    #[inline]
    #[must_use]
    pub const fn is_derived(self) -> bool {
        self.0 & DERIVED_BIT != 0
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({:#x})", self.0)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Issues a new, process-unique entity ID.
#[must_use]
pub fn create_entity() -> Entity {
    Entity(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed) & !DERIVED_BIT)
}

/// Moves the allocator past `entity` so [`create_entity`] never reissues it.
///
/// Called for every entity that enters a table with an ID the allocator did
/// not just hand out (loaded scenes, restored snapshots). Derived IDs live in
/// their own half of the ID space and are ignored.
pub(crate) fn reserve_entity(entity: Entity) {
    if entity.is_valid() && !entity.is_derived() {
        NEXT_ENTITY_ID.fetch_max(entity.0 + 1, Ordering::Relaxed);
    }
}

/// Deterministically derives a fresh entity ID from `(seed, original)`.
///
/// - `seed == 0` returns `original` unchanged (persistent IDs, full save/load).
/// - `Entity::INVALID` always maps to itself, so empty references stay empty.
/// - Otherwise the result is a hash of both inputs tagged into the derived half
///   of the ID space, so it can never collide with an allocator-issued ID.
///
/// The function is pure: replaying the same operation with the same seed
/// reproduces bit-identical IDs, which undo/redo and paste rely on.
#[must_use]
pub fn derive_entity(seed: u64, original: Entity) -> Entity {
    if seed == 0 || !original.is_valid() {
        return original;
    }
    let hash = xxh3_64_with_seed(&original.0.to_le_bytes(), seed);
    Entity(DERIVED_BIT | (hash & !DERIVED_BIT))
}

/// Implemented by every component that stores references to other entities.
///
/// Merge and seeded deserialization both rewrite those references through a
/// single mapping function, so a new entity-valued field only has to be
/// registered here once.
pub trait EntityRefs {
    fn remap_entities(&mut self, map: &mut impl FnMut(Entity) -> Entity);
}

/// Old → new entity table built by a scene merge.
#[derive(Debug, Default, Clone)]
pub struct EntityRemap {
    table: FxHashMap<Entity, Entity>,
}

impl EntityRemap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new ID for `old`, allocating one on first sight.
    ///
    /// `Entity::INVALID` is never remapped.
    pub fn map_or_create(&mut self, old: Entity) -> Entity {
        if !old.is_valid() {
            return old;
        }
        *self.table.entry(old).or_insert_with(create_entity)
    }

    #[must_use]
    pub fn get(&self, old: Entity) -> Option<Entity> {
        self.table.get(&old).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, Entity)> + '_ {
        self.table.iter().map(|(&old, &new)| (old, new))
    }
}
