//! # Structure-Event Handler
//!
//! Every world owns one structure-event handler: a FIFO event queue plus a
//! reentry counter that decides whether structural mutations (create,
//! destroy, set, remove, transfer, archetype/world teardown) apply
//! immediately or are recorded for later playback.
//!
//! ## Deferral model
//!
//! - While the reentry count is positive, mutating entry points enqueue a
//!   fixed-size event record instead of touching storage. Component payloads
//!   never live in the record; they are pushed onto the per-type side queue
//!   in FIFO order.
//! - When the count returns to zero, the queue drains in enqueue order.
//!   Events enqueued *by a callback executing during the drain* are appended
//!   to the same queue and executed in the same pass.
//! - Callback dispatch itself raises the reentry count, so operations issued
//!   from inside a callback are always queued and played back when dispatch
//!   unwinds. Nested begin/end pairs compose.
//!
//! ## Ordering guarantees
//!
//! Deferred mutations observe FIFO ordering on drain: a `set` followed by a
//! `remove` of the same component resolves in that order. Callbacks fire
//! only after the corresponding mutation has been applied to storage, and in
//! the destroy paths every affected entity is invalidated *before* the first
//! remove callback runs.

use std::collections::VecDeque;
use std::mem;
use std::ops::{Deref, DerefMut};

use tracing::{debug, trace};

use crate::engine::component;
use crate::engine::entity::{self, EntityLink};
use crate::engine::registry;
use crate::engine::storage::ErasedValue;
use crate::engine::types::{
    ArchetypeId, ComponentTypeId, Entity, IndexId, Signature, WorldId,
};
use crate::engine::world::World;

/// A recorded structural mutation.
///
/// Fixed-size: component payloads live in the owning world's per-type set
/// queue, not in the record.
pub(crate) enum StructureEvent {
    CreateEntity {
        entity: Entity,
        archetype: ArchetypeId,
        /// Set when a later deferred destroy cancelled this create.
        cancelled: bool,
    },
    DestroyEntity {
        entity: Entity,
    },
    SetComponent {
        entity: Entity,
        type_id: ComponentTypeId,
    },
    RemoveComponent {
        entity: Entity,
        type_id: ComponentTypeId,
    },
    TransferEntity {
        entity: Entity,
        target_world: WorldId,
    },
    DestroyArchetype {
        archetype: ArchetypeId,
    },
    DestroyWorld,
    ResizeBackingArrays {
        archetype: ArchetypeId,
    },
}

/// Per-world deferral state.
pub(crate) struct StructureEventHandler {
    pub(crate) queue: VecDeque<StructureEvent>,
    /// Externally controlled defer depth (begin/end pairs compose).
    pub(crate) defer_depth: u32,
    /// Raised around callback dispatch so reentrant operations enqueue.
    pub(crate) dispatch_depth: u32,
    /// Set while the queue is draining to keep the drain loop flat.
    pub(crate) draining: bool,
}

impl StructureEventHandler {
    pub(crate) fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            defer_depth: 0,
            dispatch_depth: 0,
            draining: false,
        }
    }
}

/// Guard holding a world in deferred mode.
///
/// Dereferences to the world; dropping the guard ends the scope on every
/// exit path and drains the queue if the reentry count reached zero.
pub struct DeferScope<'w> {
    world: &'w mut World,
}

impl Deref for DeferScope<'_> {
    type Target = World;

    fn deref(&self) -> &World {
        self.world
    }
}

impl DerefMut for DeferScope<'_> {
    fn deref_mut(&mut self) -> &mut World {
        self.world
    }
}

impl Drop for DeferScope<'_> {
    fn drop(&mut self) {
        self.world.end_deferred();
    }
}

impl World {
    // ─── Deferral control ───────────────────────────────────────────────

    /// Raises the reentry count; structural mutations enqueue until the
    /// matching [`World::end_deferred`].
    pub fn begin_deferred(&mut self) {
        self.handler.defer_depth += 1;
    }

    /// Lowers the reentry count; reaching zero drains the event queue in
    /// FIFO order.
    pub fn end_deferred(&mut self) {
        self.handler.defer_depth = self.handler.defer_depth.saturating_sub(1);
        self.maybe_drain();
    }

    /// Enters deferred mode for the lifetime of the returned guard.
    pub fn defer_scope(&mut self) -> DeferScope<'_> {
        self.begin_deferred();
        DeferScope { world: self }
    }

    /// Returns `true` if structural mutations currently enqueue rather than
    /// apply: the defer depth is positive, the queue is draining, or a
    /// callback is being dispatched.
    pub fn is_deferred(&self) -> bool {
        self.handler.defer_depth > 0
            || self.handler.draining
            || self.handler.dispatch_depth > 0
    }

    // ─── Structural entry points ────────────────────────────────────────

    /// Creates a new entity in this world's empty archetype.
    ///
    /// ## Behavior
    /// - Immediate: the entity is appended to the empty-signature archetype
    ///   and its handle is live on return.
    /// - Deferred: the handle is reserved (its slot version is advanced so
    ///   it does not resolve as live mid-queue) and committed at playback if
    ///   the intended archetype still exists; otherwise the slot returns to
    ///   the free queue.
    ///
    /// The returned handle may be used by subsequent deferred operations in
    /// the same scope.
    pub fn create_entity(&mut self) -> Entity {
        let entity = entity::allocate();
        let empty = Signature::new();
        let archetype_index = self.get_or_create_archetype(&empty);
        let version = self.archetype_slots[archetype_index as usize].version;
        let archetype = ArchetypeId {
            world: self.id,
            index: archetype_index,
            version,
        };

        if self.is_deferred() {
            entity::reserve(entity);
            self.handler.queue.push_back(StructureEvent::CreateEntity {
                entity,
                archetype,
                cancelled: false,
            });
        } else {
            let slot = self.archetype_mut(archetype_index).append_entity(entity);
            entity::commit(
                entity,
                EntityLink {
                    world: self.id.index(),
                    archetype: archetype_index,
                    archetype_version: version,
                },
                slot as IndexId,
            );
            self.entity_count += 1;
        }
        entity
    }

    /// Destroys an entity, firing remove callbacks for every component whose
    /// type registered one. No-op on an invalid handle.
    ///
    /// A deferred destroy whose handle is still reserved by a pending
    /// deferred create cancels that create instead: the entity never becomes
    /// observable and no callbacks fire for it.
    pub fn destroy_entity(&mut self, entity: Entity) {
        if self.is_deferred() {
            if entity::is_alive(entity) {
                self.handler
                    .queue
                    .push_back(StructureEvent::DestroyEntity { entity });
                return;
            }
            for event in self.handler.queue.iter_mut() {
                if let StructureEvent::CreateEntity {
                    entity: pending,
                    cancelled,
                    ..
                } = event
                {
                    if *pending == entity && !*cancelled {
                        *cancelled = true;
                        return;
                    }
                }
            }
        } else {
            self.apply_destroy_entity(entity);
        }
    }

    /// Writes component `T` on `entity`, moving the entity to the extended
    /// archetype if it did not already carry the component. No-op on an
    /// invalid handle.
    ///
    /// Set callbacks fire after the value is in storage; on the add path the
    /// old value handed to them is `T::default()`.
    pub fn set<T: Send + Sync + 'static>(&mut self, entity: Entity, value: T) {
        let component_id = component::type_id_of::<T>();
        let boxed: Box<ErasedValue> = Box::new(value);
        if self.is_deferred() {
            self.type_data_entry(component_id).set_queue.push_back(boxed);
            self.handler.queue.push_back(StructureEvent::SetComponent {
                entity,
                type_id: component_id,
            });
        } else {
            self.apply_set(entity, component_id, boxed);
        }
    }

    /// Detaches component `T` from `entity`, moving the entity to the
    /// narrowed archetype. No-op if the entity is invalid or does not carry
    /// the component. Remove callbacks receive the detached value.
    pub fn remove<T: Send + Sync + 'static>(&mut self, entity: Entity) {
        let component_id = component::type_id_of::<T>();
        if self.is_deferred() {
            self.handler.queue.push_back(StructureEvent::RemoveComponent {
                entity,
                type_id: component_id,
            });
        } else {
            self.apply_remove(entity, component_id);
        }
    }

    /// Moves `entity` and all its component values into `target_world`,
    /// preserving its signature. No set or remove callbacks fire in either
    /// world. No-op if the target equals this world or is invalid.
    pub fn transfer(&mut self, entity: Entity, target_world: WorldId) {
        if self.is_deferred() {
            self.handler.queue.push_back(StructureEvent::TransferEntity {
                entity,
                target_world,
            });
        } else {
            self.apply_transfer(entity, target_world);
        }
    }

    /// Destroys the archetype addressed by `archetype`, invalidating every
    /// contained entity before remove callbacks fire. No-op on a stale
    /// handle.
    pub fn destroy_archetype(&mut self, archetype: ArchetypeId) {
        if self.is_deferred() {
            self.handler
                .queue
                .push_back(StructureEvent::DestroyArchetype { archetype });
        } else {
            self.apply_destroy_archetype(archetype);
        }
    }

    /// Requests destruction of every archetype whose entity count is zero.
    pub fn destroy_empty_archetypes(&mut self) {
        let empty: Vec<ArchetypeId> = self
            .archetypes()
            .filter(|archetype| archetype.entity_count() == 0)
            .map(|archetype| archetype.id())
            .collect();
        for id in empty {
            self.destroy_archetype(id);
        }
    }

    /// Rewrites the backing arrays of one archetype to fit its current
    /// entity count.
    pub fn resize_archetype(&mut self, archetype: ArchetypeId) {
        if self.is_deferred() {
            self.handler
                .queue
                .push_back(StructureEvent::ResizeBackingArrays { archetype });
        } else {
            self.apply_resize(archetype);
        }
    }

    /// Rewrites the backing arrays of every archetype in this world.
    pub fn resize_backing_arrays(&mut self) {
        let ids: Vec<ArchetypeId> = self.archetypes().map(|archetype| archetype.id()).collect();
        for id in ids {
            self.resize_archetype(id);
        }
    }

    /// Destroys this world. The registry slot is reclaimed up front, so the
    /// world is invalid to outside callers immediately; all entities are
    /// invalidated before remove callbacks fire.
    pub fn destroy(&mut self) {
        if self.is_deferred() {
            self.handler.queue.push_back(StructureEvent::DestroyWorld);
        } else {
            self.apply_destroy_world();
        }
    }

    // ─── Drain ──────────────────────────────────────────────────────────

    pub(crate) fn maybe_drain(&mut self) {
        if self.handler.defer_depth == 0
            && self.handler.dispatch_depth == 0
            && !self.handler.draining
            && !self.dead
            && !self.handler.queue.is_empty()
        {
            self.drain_events();
        }
    }

    fn drain_events(&mut self) {
        self.handler.draining = true;
        let mut applied = 0usize;
        while let Some(event) = self.handler.queue.pop_front() {
            self.apply_event(event);
            applied += 1;
            if self.dead {
                break;
            }
        }
        self.handler.draining = false;
        trace!(
            world = self.id.index(),
            events = applied,
            "structure event queue drained"
        );
    }

    fn apply_event(&mut self, event: StructureEvent) {
        match event {
            StructureEvent::CreateEntity {
                entity,
                archetype,
                cancelled,
            } => self.apply_create(entity, archetype, cancelled),
            StructureEvent::DestroyEntity { entity } => self.apply_destroy_entity(entity),
            StructureEvent::SetComponent { entity, type_id } => {
                let value = self
                    .type_data_mut(type_id)
                    .and_then(|data| data.set_queue.pop_front());
                if let Some(value) = value {
                    self.apply_set(entity, type_id, value);
                }
            }
            StructureEvent::RemoveComponent { entity, type_id } => {
                self.apply_remove(entity, type_id)
            }
            StructureEvent::TransferEntity {
                entity,
                target_world,
            } => self.apply_transfer(entity, target_world),
            StructureEvent::DestroyArchetype { archetype } => {
                self.apply_destroy_archetype(archetype)
            }
            StructureEvent::DestroyWorld => self.apply_destroy_world(),
            StructureEvent::ResizeBackingArrays { archetype } => self.apply_resize(archetype),
        }
    }

    // ─── Immediate appliers ─────────────────────────────────────────────

    fn apply_create(&mut self, entity: Entity, archetype: ArchetypeId, cancelled: bool) {
        if cancelled {
            entity::release_index(entity.index());
            return;
        }
        let valid = archetype.world == self.id
            && self
                .archetype_slots
                .get(archetype.index as usize)
                .is_some_and(|slot| {
                    slot.version == archetype.version && slot.archetype.is_some()
                });
        if !valid {
            entity::release_index(entity.index());
            return;
        }

        let slot = self.archetype_mut(archetype.index).append_entity(entity);
        entity::commit(
            entity,
            EntityLink {
                world: self.id.index(),
                archetype: archetype.index,
                archetype_version: archetype.version,
            },
            slot as IndexId,
        );
        self.entity_count += 1;
    }

    /// Applies a set to storage.
    ///
    /// ## Behavior
    /// - **In-place**: the entity's archetype already carries the component;
    ///   the slot is overwritten and set callbacks receive the old value.
    /// - **Add**: the entity migrates to the archetype extended by the
    ///   component. Every source column moves into the target at the
    ///   entity's new row, the new value is written into the added column,
    ///   and set callbacks receive the type's default as the old value.
    pub(crate) fn apply_set(
        &mut self,
        entity: Entity,
        component_id: ComponentTypeId,
        value: Box<ErasedValue>,
    ) {
        let Some((archetype_index, slot)) = self.locate(entity) else {
            return;
        };

        if let Some(position) = self.archetype_ref(archetype_index).column_position(component_id)
        {
            let has_callback = self.has_set_callback(component_id);
            let archetype = self.archetype_mut(archetype_index);
            let old = archetype
                .column_mut_by_position(position)
                .replace_boxed(slot as usize, value);
            if has_callback {
                self.dispatch_set(component_id, entity, &*old);
            }
            return;
        }

        // Add path: migrate to the extended archetype.
        let source_index = archetype_index;
        let mut scratch = mem::take(&mut self.scratch_signature);
        scratch.copy_from(self.archetype_ref(source_index).signature());
        scratch.add(component_id);
        let target_index = self.get_or_create_archetype(&scratch);
        scratch.clear();
        self.scratch_signature = scratch;

        let target_version = self.archetype_slots[target_index as usize].version;
        let (source, target) = self.archetype_pair_mut(source_index, target_index);

        let moved = source.swap_remove_entity(slot as usize);
        let new_slot = target.append_entity(entity);
        source.move_columns_to(target, slot as usize, None);

        let added_position = target
            .column_position(component_id)
            .expect("added component column missing from target archetype after structural move");
        target
            .column_mut_by_position(added_position)
            .push_boxed(value);

        if let Some(moved_entity) = moved {
            entity::update_slot(moved_entity.index(), slot);
        }
        entity::update_link(
            entity.index(),
            EntityLink {
                world: self.id.index(),
                archetype: target_index,
                archetype_version: target_version,
            },
            new_slot as IndexId,
        );

        if self.has_set_callback(component_id) {
            let make_default = self
                .type_data_ref(component_id)
                .and_then(|data| data.make_default)
                .expect("set callback registered without a default constructor");
            let old = make_default();
            self.dispatch_set(component_id, entity, &*old);
        }
    }

    /// Detaches a component, migrating the entity to the narrowed archetype.
    pub(crate) fn apply_remove(&mut self, entity: Entity, component_id: ComponentTypeId) {
        let Some((source_index, slot)) = self.locate(entity) else {
            return;
        };
        let Some(source_position) = self
            .archetype_ref(source_index)
            .column_position(component_id)
        else {
            return;
        };

        let mut scratch = mem::take(&mut self.scratch_signature);
        scratch.copy_from(self.archetype_ref(source_index).signature());
        scratch.remove(component_id);
        let target_index = self.get_or_create_archetype(&scratch);
        scratch.clear();
        self.scratch_signature = scratch;

        let target_version = self.archetype_slots[target_index as usize].version;
        let has_callback = self.has_remove_callback(component_id);
        let (source, target) = self.archetype_pair_mut(source_index, target_index);

        // Capture the removed value before the remaining columns move.
        let removed = if has_callback {
            Some(
                source
                    .column_mut_by_position(source_position)
                    .swap_remove_boxed(slot as usize),
            )
        } else {
            source
                .column_mut_by_position(source_position)
                .swap_remove(slot as usize);
            None
        };

        let new_slot = target.append_entity(entity);
        source.move_columns_to(target, slot as usize, Some(component_id));
        let moved = source.swap_remove_entity(slot as usize);

        if let Some(moved_entity) = moved {
            entity::update_slot(moved_entity.index(), slot);
        }
        entity::update_link(
            entity.index(),
            EntityLink {
                world: self.id.index(),
                archetype: target_index,
                archetype_version: target_version,
            },
            new_slot as IndexId,
        );

        if let Some(value) = removed {
            self.dispatch_remove(component_id, entity, &*value);
        }
    }

    /// Destroys an entity: swap-removes its row from every column, frees its
    /// table slot, then fires remove callbacks from the staged values.
    /// Callbacks observe the entity as already destroyed.
    pub(crate) fn apply_destroy_entity(&mut self, entity: Entity) {
        let Some((archetype_index, slot)) = self.locate(entity) else {
            return;
        };

        let callback_flags: Vec<bool> = {
            let archetype = self.archetype_ref(archetype_index);
            archetype
                .signature()
                .iter()
                .map(|component_id| self.has_remove_callback(component_id))
                .collect()
        };

        let mut staging = mem::take(&mut self.callback_scratch);
        {
            let archetype = self.archetype_mut(archetype_index);
            for (position, &has_callback) in callback_flags.iter().enumerate() {
                let component_id = archetype.column_type_id(position);
                if has_callback {
                    let value = archetype
                        .column_mut_by_position(position)
                        .swap_remove_boxed(slot as usize);
                    staging.push((component_id, value));
                } else {
                    archetype
                        .column_mut_by_position(position)
                        .swap_remove(slot as usize);
                }
            }
            let moved = archetype.swap_remove_entity(slot as usize);
            if let Some(moved_entity) = moved {
                entity::update_slot(moved_entity.index(), slot);
            }
        }

        entity::free_slot(entity.index());
        self.entity_count -= 1;

        for (component_id, value) in staging.drain(..) {
            self.dispatch_remove(component_id, entity, &*value);
        }
        self.callback_scratch = staging;
    }

    fn apply_transfer(&mut self, entity: Entity, target_world: WorldId) {
        if target_world == self.id {
            return;
        }
        let Some((source_index, slot)) = self.locate(entity) else {
            return;
        };
        let Some(mut target) = registry::checkout(target_world) else {
            return;
        };

        let target_archetype_index = {
            let signature = self.archetype_ref(source_index).signature().clone();
            target.get_or_create_archetype(&signature)
        };
        let target_version = target.archetype_slots[target_archetype_index as usize].version;

        let source = self.archetype_mut(source_index);
        let target_archetype = target.archetype_mut(target_archetype_index);
        let new_slot = target_archetype.append_entity(entity);
        source.move_columns_to(target_archetype, slot as usize, None);
        let moved = source.swap_remove_entity(slot as usize);

        if let Some(moved_entity) = moved {
            entity::update_slot(moved_entity.index(), slot);
        }
        entity::update_link(
            entity.index(),
            EntityLink {
                world: target.id.index(),
                archetype: target_archetype_index,
                archetype_version: target_version,
            },
            new_slot as IndexId,
        );

        self.entity_count -= 1;
        target.entity_count += 1;
        registry::checkin(target);
    }

    /// Destroys an archetype slot.
    ///
    /// ## Behavior
    /// 1. The slot version advances, the signature leaves the map, and the
    ///    slot joins the free stack; the structure-update counter bumps.
    /// 2. Every contained entity is invalidated.
    /// 3. Remove callbacks fire per column, in row order within each type.
    pub(crate) fn apply_destroy_archetype(&mut self, archetype: ArchetypeId) {
        if archetype.world != self.id {
            return;
        }
        let Some(slot_entry) = self.archetype_slots.get_mut(archetype.index as usize) else {
            return;
        };
        if slot_entry.version != archetype.version {
            return;
        }
        let Some(mut dead) = slot_entry.archetype.take() else {
            return;
        };
        slot_entry.version = slot_entry.version.wrapping_add(1);
        self.free_slots.push(archetype.index);
        self.signature_index.remove(dead.signature());
        self.structure_update_count += 1;
        self.entity_count -= dead.entity_count();
        trace!(
            world = self.id.index(),
            archetype = archetype.index,
            entities = dead.entity_count(),
            "archetype destroyed"
        );

        // Entities are invalidated before any callback runs.
        for &contained in dead.entities() {
            entity::free_slot(contained.index());
        }

        let entities: Vec<Entity> = dead.entities().to_vec();
        for position in 0..dead.column_count() {
            let component_id = dead.column_type_id(position);
            if !self.has_remove_callback(component_id) {
                continue;
            }
            let values = dead.drain_column(position);
            for (target, value) in entities.iter().zip(values.iter()) {
                self.dispatch_remove(component_id, *target, &**value);
            }
        }
    }

    /// Tears the whole world down.
    ///
    /// All entities of all archetypes are invalidated first; remove
    /// callbacks run in a second pass over the dead archetypes. The world is
    /// marked dead so the registry reclaims its slot.
    pub(crate) fn apply_destroy_world(&mut self) {
        if self.dead {
            return;
        }
        self.dead = true;
        self.handler.queue.clear();
        registry::finalize_destroyed(self.id);

        let slots = mem::take(&mut self.archetype_slots);
        self.signature_index.clear();
        self.free_slots.clear();
        self.archetype_terminating_index = 0;
        self.entity_count = 0;

        for slot in &slots {
            if let Some(archetype) = &slot.archetype {
                for &contained in archetype.entities() {
                    entity::free_slot(contained.index());
                }
            }
        }

        for slot in slots {
            let Some(mut archetype) = slot.archetype else {
                continue;
            };
            self.structure_update_count += 1;
            let entities: Vec<Entity> = archetype.entities().to_vec();
            for position in 0..archetype.column_count() {
                let component_id = archetype.column_type_id(position);
                if !self.has_remove_callback(component_id) {
                    continue;
                }
                let values = archetype.drain_column(position);
                for (target, value) in entities.iter().zip(values.iter()) {
                    self.dispatch_remove(component_id, *target, &**value);
                }
            }
        }

        debug!(world = self.id.index(), name = %self.name, "world destroyed");
    }

    fn apply_resize(&mut self, archetype: ArchetypeId) {
        if archetype.world != self.id {
            return;
        }
        let Some(slot) = self.archetype_slots.get_mut(archetype.index as usize) else {
            return;
        };
        if slot.version != archetype.version {
            return;
        }
        if let Some(archetype) = slot.archetype.as_mut() {
            archetype.resize_backing_arrays();
        }
    }

    // ─── Callback dispatch ──────────────────────────────────────────────

    /// Invokes the set callbacks registered for `component_id`, in
    /// registration order, with the reentry count raised.
    ///
    /// The list is checked out for the duration of the dispatch;
    /// registrations and removals made by a callback are merged back in
    /// afterwards.
    pub(crate) fn dispatch_set(
        &mut self,
        component_id: ComponentTypeId,
        entity: Entity,
        old: &ErasedValue,
    ) {
        let mut entries = match self.type_data_mut(component_id) {
            Some(data) if !data.set_callbacks.is_empty() => {
                mem::take(&mut data.set_callbacks)
            }
            _ => return,
        };

        self.handler.dispatch_depth += 1;
        for entry in entries.iter_mut() {
            (entry.callback)(&mut *self, entity, old);
        }
        self.handler.dispatch_depth -= 1;

        if let Some(data) = self.type_data_mut(component_id) {
            let added = mem::take(&mut data.set_callbacks);
            entries.extend(added);
            if !data.retired_set.is_empty() {
                let retired = mem::take(&mut data.retired_set);
                entries.retain(|entry| !retired.contains(&entry.id));
            }
            data.set_callbacks = entries;
            data.has_set_callback = !data.set_callbacks.is_empty();
        }

        self.maybe_drain();
    }

    /// Invokes the remove callbacks registered for `component_id`; same
    /// check-out discipline as [`World::dispatch_set`].
    pub(crate) fn dispatch_remove(
        &mut self,
        component_id: ComponentTypeId,
        entity: Entity,
        removed: &ErasedValue,
    ) {
        let mut entries = match self.type_data_mut(component_id) {
            Some(data) if !data.remove_callbacks.is_empty() => {
                mem::take(&mut data.remove_callbacks)
            }
            _ => return,
        };

        self.handler.dispatch_depth += 1;
        for entry in entries.iter_mut() {
            (entry.callback)(&mut *self, entity, removed);
        }
        self.handler.dispatch_depth -= 1;

        if let Some(data) = self.type_data_mut(component_id) {
            let added = mem::take(&mut data.remove_callbacks);
            entries.extend(added);
            if !data.retired_remove.is_empty() {
                let retired = mem::take(&mut data.retired_remove);
                entries.retain(|entry| !retired.contains(&entry.id));
            }
            data.remove_callbacks = entries;
            data.has_remove_callback = !data.remove_callbacks.is_empty();
        }

        self.maybe_drain();
    }
}
