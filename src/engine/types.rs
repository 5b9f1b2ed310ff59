//! Core ECS Types, Identifiers, and Signatures
//!
//! This module defines the **fundamental types, identifiers, and signatures**
//! used throughout the ECS engine. These definitions form the *semantic
//! backbone* of the system and are shared across all subsystems, including
//! entity management, archetypes, worlds, and the structure-event handler.
//!
//! ## Design Philosophy
//!
//! The ECS is designed around:
//!
//! - **Dense columnar storage**
//! - **Versioned, copyable handles**
//! - **Canonical sorted-set signatures**
//! - **Stable numeric identifiers**
//!
//! ## Handle Representation
//!
//! Entities and worlds are encoded as a packed 64-bit integer with the
//! following layout:
//!
//! ```text
//! | version | index |
//! ```
//!
//! - **Index** identifies the slot within the owning table.
//! - **Version** enables stale-handle detection after slot reuse.
//!
//! A handle resolves iff the stored slot version matches the handle version.
//! The zero handle is permanently invalid: slot 0 of every table is
//! initialized with version 1 and is never allocated.
//!
//! ## Signatures
//!
//! Archetypes are described by [`Signature`] values: canonically sorted sets
//! of component type ids. Two signatures compare equal (and hash equal) iff
//! they contain the same ids, independent of insertion order.

/// Bit-width type used for compile-time layout calculations.
pub type Bits = u8;

/// Globally unique entity identifier encoded as a packed 64-bit value.
pub type EntityId = u64;
/// Index within the entity table or world registry.
pub type IndexId = u32;
/// Generation counter used to detect stale handles.
pub type VersionId = u32;

/// Dense, process-global identifier for a component type.
pub type ComponentTypeId = u32;

/// Token identifying a registered set or remove callback.
pub type CallbackId = u64;

/// Number of bits reserved for the index portion of a packed handle.
pub const INDEX_BITS: Bits = 32;

/// Mask selecting the index portion of a packed handle.
pub const INDEX_MASK: EntityId = (1 << INDEX_BITS) - 1;

/// Initial slot count of the process-global entity table.
pub const ENTITY_TABLE_INITIAL_CAPACITY: usize = 1024;

/// Initial slot count of the process-global world registry.
pub const WORLD_REGISTRY_INITIAL_CAPACITY: usize = 4;

/// Minimum backing capacity of an archetype column.
pub const MIN_COLUMN_CAPACITY: usize = 8;

/// Returns the backing capacity for `rows` entities: the smallest power of
/// two that holds them, never below [`MIN_COLUMN_CAPACITY`].
#[inline]
pub const fn column_capacity_for(rows: usize) -> usize {
    let target = rows.next_power_of_two();
    if target < MIN_COLUMN_CAPACITY {
        MIN_COLUMN_CAPACITY
    } else {
        target
    }
}

#[inline]
const fn pack(index: IndexId, version: VersionId) -> EntityId {
    ((version as EntityId) << INDEX_BITS) | (index as EntityId)
}

/// Opaque, versioned identifier for an ECS entity.
///
/// ## Purpose
/// `Entity` is a compact handle that uniquely identifies an entity instance
/// at a point in time. Two handles with the same index but different versions
/// are distinct; equality on stale handles is well-defined and never matches
/// a live one.
///
/// ## Notes
/// `Entity` values are cheap to copy and compare. [`Entity::NULL`] is never
/// valid.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Entity(pub EntityId);

impl Entity {
    /// The permanently invalid zero handle.
    pub const NULL: Entity = Entity(0);

    /// Builds a handle from its `(index, version)` pair.
    #[inline]
    pub const fn new(index: IndexId, version: VersionId) -> Self {
        Entity(pack(index, version))
    }

    /// Returns the index component of this handle.
    #[inline]
    pub const fn index(self) -> IndexId {
        (self.0 & INDEX_MASK) as IndexId
    }

    /// Returns the version component of this handle.
    #[inline]
    pub const fn version(self) -> VersionId {
        (self.0 >> INDEX_BITS) as VersionId
    }

    /// Returns `true` if this is the zero handle.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Opaque, versioned identifier for a world in the process-global registry.
///
/// Same invalidity rules as [`Entity`]: slot 0 of the registry starts at
/// version 1, so [`WorldId::NULL`] never resolves.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct WorldId(pub EntityId);

impl WorldId {
    /// The permanently invalid zero handle.
    pub const NULL: WorldId = WorldId(0);

    /// Builds a handle from its `(index, version)` pair.
    #[inline]
    pub const fn new(index: IndexId, version: VersionId) -> Self {
        WorldId(pack(index, version))
    }

    /// Returns the index component of this handle.
    #[inline]
    pub const fn index(self) -> IndexId {
        (self.0 & INDEX_MASK) as IndexId
    }

    /// Returns the version component of this handle.
    #[inline]
    pub const fn version(self) -> VersionId {
        (self.0 >> INDEX_BITS) as VersionId
    }
}

/// Versioned identifier for an archetype slot within a specific world.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ArchetypeId {
    /// World owning the archetype slot.
    pub world: WorldId,
    /// Index into the world's archetype slot array.
    pub index: IndexId,
    /// Slot version at the time the handle was issued.
    pub version: VersionId,
}

/// Canonical sorted set of component type ids.
///
/// ## Purpose
/// A `Signature` describes the exact component set of an archetype. Ids are
/// kept sorted ascending so that equality and hashing are independent of
/// insertion order, and so that the position of an id doubles as the local
/// column index inside an archetype.
///
/// ## Invariants
/// - `ids` is sorted strictly ascending (no duplicates).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    ids: Vec<ComponentTypeId>,
}

impl Signature {
    /// Creates an empty signature.
    #[inline]
    pub const fn new() -> Self {
        Self { ids: Vec::new() }
    }

    /// Builds a signature from a list of component type ids.
    pub fn of(component_ids: &[ComponentTypeId]) -> Self {
        let mut signature = Self::new();
        for &id in component_ids {
            signature.add(id);
        }
        signature
    }

    /// Inserts `component_id`, maintaining sort order. Idempotent.
    ///
    /// Returns `true` if the id was newly inserted.
    pub fn add(&mut self, component_id: ComponentTypeId) -> bool {
        match self.ids.binary_search(&component_id) {
            Ok(_) => false,
            Err(position) => {
                self.ids.insert(position, component_id);
                true
            }
        }
    }

    /// Removes `component_id` if present. Idempotent.
    ///
    /// Returns `true` if the id was removed.
    pub fn remove(&mut self, component_id: ComponentTypeId) -> bool {
        match self.ids.binary_search(&component_id) {
            Ok(position) => {
                self.ids.remove(position);
                true
            }
            Err(_) => false,
        }
    }

    /// Replaces the contents of this signature with a copy of `other`.
    pub fn copy_from(&mut self, other: &Signature) {
        self.ids.clear();
        self.ids.extend_from_slice(&other.ids);
    }

    /// Removes all ids.
    #[inline]
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Returns `true` if `component_id` is present.
    #[inline]
    pub fn contains(&self, component_id: ComponentTypeId) -> bool {
        self.ids.binary_search(&component_id).is_ok()
    }

    /// Returns the local column index of `component_id`, if present.
    #[inline]
    pub fn position_of(&self, component_id: ComponentTypeId) -> Option<usize> {
        self.ids.binary_search(&component_id).ok()
    }

    /// Returns the number of ids in this signature.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if the signature contains no ids.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the ids in canonical (ascending) order.
    #[inline]
    pub fn ids(&self) -> &[ComponentTypeId] {
        &self.ids
    }

    /// Iterates over the ids in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.ids.iter().copied()
    }
}
