//! # Entity Table
//!
//! This module defines entity identity, lifecycle, and the process-global
//! slot table that backs every entity handle.
//!
//! ## Purpose
//! Entities are lightweight, opaque identifiers that reference rows in
//! archetype storage. This module is responsible for:
//!
//! - Allocating stable entity slots with a recycling free queue
//! - Tracking entity liveness via versioning
//! - Mapping entities to their archetype and row slot
//!
//! ## Entity Model
//! Each slot holds an [`EntityRecord`]: a version counter, the row slot
//! inside the owning archetype, and an optional [`EntityLink`] naming the
//! owning world and archetype. An entity is live iff the handle version
//! matches the slot version **and** the link is present.
//!
//! The link is the validated-handle form of an archetype back-pointer: it is
//! non-owning and must be checked against the world's archetype slot version
//! on every dereference.
//!
//! ## Invariants
//! - Slot 0 is initialized at version 1 and never allocated, making the zero
//!   handle permanently invalid.
//! - Versions advance when a slot is freed (or reserved for a deferred
//!   create), never on allocation.
//! - Freed indices are recycled FIFO, so a destroyed entity's index is
//!   eventually reallocated with a strictly greater version.
//!
//! ## Concurrency
//! The table is a process-global singleton behind an `RwLock`. All accesses
//! are short-lived lock acquisitions; no guard is ever held across callback
//! dispatch. The core assumes a single mutator at a time (see the crate
//! documentation); the lock exists so the singleton is sound under Rust's
//! multi-threaded test runner.

use std::collections::VecDeque;
use std::sync::{OnceLock, RwLock};

use crate::engine::types::{Entity, IndexId, VersionId, ENTITY_TABLE_INITIAL_CAPACITY};

/// Non-owning back-reference from an entity record to its archetype.
///
/// Validity is governed by `archetype_version`: the link dereferences only
/// if the world's archetype slot still carries the same version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityLink {
    /// Registry index of the owning world.
    pub world: IndexId,
    /// Index of the archetype slot within the world.
    pub archetype: IndexId,
    /// Archetype slot version at link time.
    pub archetype_version: VersionId,
}

/// One slot of the process-global entity table.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntityRecord {
    /// Owning archetype, or `None` while the slot is dead or reserved.
    pub link: Option<EntityLink>,
    /// Row slot inside the owning archetype.
    pub slot: IndexId,
    /// Current slot version; handles with a different version are stale.
    pub version: VersionId,
}

/// Process-global entity slot table.
///
/// ## Design
/// - Dense `Vec` of records grown by doubling from
///   [`ENTITY_TABLE_INITIAL_CAPACITY`], with a high-water mark above which
///   slots have never been handed out.
/// - FIFO free queue of recycled indices.
struct EntityTable {
    records: Vec<EntityRecord>,
    free: VecDeque<IndexId>,
    high_water: IndexId,
}

impl EntityTable {
    fn new() -> Self {
        let mut records = vec![EntityRecord::default(); ENTITY_TABLE_INITIAL_CAPACITY];
        records[0].version = 1;
        Self {
            records,
            free: VecDeque::new(),
            high_water: 1,
        }
    }

    /// Allocates an entity slot and returns its handle.
    ///
    /// Reuses a free index if available, otherwise bumps the high-water
    /// mark, doubling the slot array when exhausted. The returned version
    /// equals the slot's current version.
    fn allocate(&mut self) -> Entity {
        let index = match self.free.pop_front() {
            Some(index) => index,
            None => {
                if self.high_water as usize == self.records.len() {
                    let target = self.records.len() * 2;
                    self.records.resize(target, EntityRecord::default());
                }
                let index = self.high_water;
                self.high_water += 1;
                index
            }
        };

        let record = &mut self.records[index as usize];
        record.link = None;
        record.slot = 0;
        Entity::new(index, record.version)
    }

    /// Invalidates a slot: version++, link cleared, index recycled.
    fn free(&mut self, index: IndexId) {
        let record = &mut self.records[index as usize];
        record.version = record.version.wrapping_add(1);
        record.link = None;
        record.slot = 0;
        self.free.push_back(index);
    }

    fn resolve(&self, entity: Entity) -> Option<EntityRecord> {
        let record = self.records.get(entity.index() as usize)?;
        if record.version != entity.version() {
            return None;
        }
        Some(*record)
    }
}

static ENTITY_TABLE: OnceLock<RwLock<EntityTable>> = OnceLock::new();

fn entity_table() -> &'static RwLock<EntityTable> {
    ENTITY_TABLE.get_or_init(|| RwLock::new(EntityTable::new()))
}

/// Allocates a fresh entity slot.
pub(crate) fn allocate() -> Entity {
    entity_table()
        .write()
        .expect("entity table lock poisoned")
        .allocate()
}

/// Invalidates the slot at `index`: version++, link cleared, index pushed
/// onto the free queue.
pub(crate) fn free_slot(index: IndexId) {
    entity_table()
        .write()
        .expect("entity table lock poisoned")
        .free(index);
}

/// Reserves a freshly allocated handle for a deferred create by advancing
/// the slot version past it, so the handle is not observable as live while
/// the create sits in the queue.
pub(crate) fn reserve(entity: Entity) {
    let mut table = entity_table().write().expect("entity table lock poisoned");
    let record = &mut table.records[entity.index() as usize];
    record.version = entity.version().wrapping_add(1);
    record.link = None;
}

/// Commits a handle into an archetype: restores the handle's version and
/// installs the link. Used by entity creation (immediate and playback).
pub(crate) fn commit(entity: Entity, link: EntityLink, slot: IndexId) {
    let mut table = entity_table().write().expect("entity table lock poisoned");
    let record = &mut table.records[entity.index() as usize];
    record.version = entity.version();
    record.link = Some(link);
    record.slot = slot;
}

/// Returns the slot at `index` to the free queue without touching its
/// version. Used when a deferred create is cancelled: the reservation bump
/// already invalidated the handle.
pub(crate) fn release_index(index: IndexId) {
    entity_table()
        .write()
        .expect("entity table lock poisoned")
        .free
        .push_back(index);
}

/// Resolves a handle to a copy of its record, or `None` on version mismatch.
pub(crate) fn resolve(entity: Entity) -> Option<EntityRecord> {
    entity_table()
        .read()
        .expect("entity table lock poisoned")
        .resolve(entity)
}

/// Returns `true` if the handle resolves to a live record.
pub(crate) fn is_alive(entity: Entity) -> bool {
    resolve(entity).is_some_and(|record| record.link.is_some())
}

/// Rewrites the row slot of a live entity after a swap-remove moved it.
pub(crate) fn update_slot(index: IndexId, slot: IndexId) {
    let mut table = entity_table().write().expect("entity table lock poisoned");
    table.records[index as usize].slot = slot;
}

/// Rewrites the archetype link of a live entity after a structural move.
pub(crate) fn update_link(index: IndexId, link: EntityLink, slot: IndexId) {
    let mut table = entity_table().write().expect("entity table lock poisoned");
    let record = &mut table.records[index as usize];
    record.link = Some(link);
    record.slot = slot;
}
