//! # World State
//!
//! A [`World`] owns a set of archetypes, the signature → archetype index
//! that routes structural changes, and the per-component-type data attached
//! to this world (callbacks, deferred payload queues, and the optional
//! world-scoped datum).
//!
//! ## Design
//! - Archetypes live in a slot array of `(archetype, version)` pairs with a
//!   free-slot stack; `archetype_terminating_index` is the watermark above
//!   which all slots are unused. Destroying an archetype bumps its slot
//!   version, invalidating outstanding [`ArchetypeId`] handles.
//! - The signature map keys on owned canonical signatures; probing uses the
//!   world's scratch signature to avoid per-call allocation.
//! - Per-type data is a flat array indexed by dense component type id,
//!   grown by doubling and filled lazily.
//!
//! Structural mutations (create/destroy/set/remove/transfer) are routed
//! through the structure-event handler; see `engine::events`.

use std::any::type_name;
use std::collections::VecDeque;

use ahash::AHashMap;

use crate::engine::component;
use crate::engine::archetype::Archetype;
use crate::engine::entity;
use crate::engine::error::MissingWorldDataError;
use crate::engine::events::StructureEventHandler;
use crate::engine::storage::ErasedValue;
use crate::engine::types::{
    ArchetypeId, CallbackId, ComponentTypeId, Entity, IndexId, Signature, VersionId, WorldId,
};

/// Type-erased callback invoked after a structural mutation.
///
/// The third argument is the staged component value: the old value for set
/// callbacks (the type's default on the add path), the removed value for
/// remove callbacks. Callbacks receive the world mutably so they can observe
/// post-mutation state and issue further operations, which are enqueued and
/// played back when dispatch unwinds.
pub(crate) type ErasedCallback = Box<dyn FnMut(&mut World, Entity, &ErasedValue) + Send + Sync>;

pub(crate) struct CallbackEntry {
    pub(crate) id: CallbackId,
    pub(crate) callback: ErasedCallback,
}

/// Per-(world, component type) data, lazily created.
pub(crate) struct TypeData {
    pub(crate) set_callbacks: Vec<CallbackEntry>,
    pub(crate) remove_callbacks: Vec<CallbackEntry>,
    /// Callback ids cleared while their list was checked out for dispatch.
    pub(crate) retired_set: Vec<CallbackId>,
    pub(crate) retired_remove: Vec<CallbackId>,
    /// Opaque world-scoped datum of this component type.
    pub(crate) datum: Option<Box<ErasedValue>>,
    /// FIFO queue of payloads for deferred set events.
    pub(crate) set_queue: VecDeque<Box<ErasedValue>>,
    /// Constructs the default value handed to set callbacks on the add path.
    pub(crate) make_default: Option<fn() -> Box<ErasedValue>>,
    pub(crate) has_set_callback: bool,
    pub(crate) has_remove_callback: bool,
}

impl TypeData {
    fn new() -> Self {
        Self {
            set_callbacks: Vec::new(),
            remove_callbacks: Vec::new(),
            retired_set: Vec::new(),
            retired_remove: Vec::new(),
            datum: None,
            set_queue: VecDeque::new(),
            make_default: None,
            has_set_callback: false,
            has_remove_callback: false,
        }
    }
}

/// One slot of a world's archetype array.
#[derive(Default)]
pub(crate) struct ArchetypeSlot {
    pub(crate) archetype: Option<Archetype>,
    pub(crate) version: VersionId,
}

fn default_box<T: Default + Send + Sync + 'static>() -> Box<ErasedValue> {
    Box::new(T::default())
}

/// A container of entities, archetypes, and per-type world data.
///
/// Worlds are owned by the process-global registry and accessed through
/// [`crate::engine::registry::with_world`]. All structural entry points
/// resolve handles against current versions first; a mismatch makes the
/// operation a silent no-op.
pub struct World {
    pub(crate) id: WorldId,
    pub(crate) name: String,
    pub(crate) archetype_slots: Vec<ArchetypeSlot>,
    pub(crate) free_slots: Vec<IndexId>,
    pub(crate) archetype_terminating_index: IndexId,
    pub(crate) signature_index: AHashMap<Signature, IndexId>,
    pub(crate) scratch_signature: Signature,
    pub(crate) type_data: Vec<Option<TypeData>>,
    pub(crate) entity_count: usize,
    pub(crate) structure_update_count: u64,
    pub(crate) handler: StructureEventHandler,
    /// Reusable staging buffer for destroy-entity callback payloads.
    pub(crate) callback_scratch: Vec<(ComponentTypeId, Box<ErasedValue>)>,
    pub(crate) next_callback_id: CallbackId,
    pub(crate) dead: bool,
}

impl World {
    pub(crate) fn new(id: WorldId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            archetype_slots: Vec::new(),
            free_slots: Vec::new(),
            archetype_terminating_index: 0,
            signature_index: AHashMap::new(),
            scratch_signature: Signature::new(),
            type_data: Vec::new(),
            entity_count: 0,
            structure_update_count: 0,
            handler: StructureEventHandler::new(),
            callback_scratch: Vec::new(),
            next_callback_id: 0,
            dead: false,
        }
    }

    /// Returns this world's handle.
    #[inline]
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Returns this world's human-readable name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of live entities across all archetypes.
    #[inline]
    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    /// Returns the number of live archetypes.
    #[inline]
    pub fn archetype_count(&self) -> usize {
        self.archetype_terminating_index as usize - self.free_slots.len()
    }

    /// Monotonic counter incremented whenever the set of archetype slots
    /// changes. Query caches key their invalidation on this value.
    #[inline]
    pub fn structure_update_count(&self) -> u64 {
        self.structure_update_count
    }

    #[inline]
    pub(crate) fn is_dead(&self) -> bool {
        self.dead
    }

    // ─── Archetype management ───────────────────────────────────────────

    /// Returns the archetype for `signature`, creating it if absent.
    ///
    /// ## Behavior
    /// 1. Look up the signature in the map; return the slot index if found.
    /// 2. Otherwise pop a free slot if any, else append at the terminating
    ///    index, doubling the slot array when exhausted.
    /// 3. Construct a fresh archetype carrying the slot's current version,
    ///    insert an owned signature copy into the map, and bump the
    ///    structure-update counter.
    pub(crate) fn get_or_create_archetype(&mut self, signature: &Signature) -> IndexId {
        if let Some(&index) = self.signature_index.get(signature) {
            return index;
        }

        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                let index = self.archetype_terminating_index;
                self.archetype_terminating_index += 1;
                if index as usize == self.archetype_slots.len() {
                    let target = self.archetype_slots.len().max(1) * 2;
                    self.archetype_slots.resize_with(target, ArchetypeSlot::default);
                }
                index
            }
        };

        let slot = &mut self.archetype_slots[index as usize];
        let version = slot.version;
        let owned = signature.clone();
        slot.archetype = Some(Archetype::new(
            ArchetypeId {
                world: self.id,
                index,
                version,
            },
            owned.clone(),
        ));
        self.signature_index.insert(owned, index);
        self.structure_update_count += 1;
        index
    }

    /// Returns the archetype addressed by a handle, if still valid.
    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        if id.world != self.id {
            return None;
        }
        let slot = self.archetype_slots.get(id.index as usize)?;
        if slot.version != id.version {
            return None;
        }
        slot.archetype.as_ref()
    }

    /// Returns the handle of the archetype matching `signature`, if one
    /// exists.
    pub fn try_get_archetype(&self, signature: &Signature) -> Option<ArchetypeId> {
        let &index = self.signature_index.get(signature)?;
        self.archetype_slots[index as usize]
            .archetype
            .as_ref()
            .map(Archetype::id)
    }

    /// Iterates over all live archetypes.
    pub fn archetypes(&self) -> impl Iterator<Item = &Archetype> {
        self.archetype_slots
            .iter()
            .filter_map(|slot| slot.archetype.as_ref())
    }

    #[inline]
    pub(crate) fn archetype_ref(&self, index: IndexId) -> &Archetype {
        self.archetype_slots[index as usize]
            .archetype
            .as_ref()
            .expect("archetype slot unexpectedly empty")
    }

    #[inline]
    pub(crate) fn archetype_mut(&mut self, index: IndexId) -> &mut Archetype {
        self.archetype_slots[index as usize]
            .archetype
            .as_mut()
            .expect("archetype slot unexpectedly empty")
    }

    /// Mutably borrows two distinct archetypes at once.
    pub(crate) fn archetype_pair_mut(
        &mut self,
        first: IndexId,
        second: IndexId,
    ) -> (&mut Archetype, &mut Archetype) {
        assert!(first != second, "source and destination archetype must differ");
        let (low, high) = if first < second {
            (first as usize, second as usize)
        } else {
            (second as usize, first as usize)
        };

        let (head, tail) = self.archetype_slots.split_at_mut(high);
        let low_slot = head[low]
            .archetype
            .as_mut()
            .expect("archetype slot unexpectedly empty");
        let high_slot = tail[0]
            .archetype
            .as_mut()
            .expect("archetype slot unexpectedly empty");
        if first < second {
            (low_slot, high_slot)
        } else {
            (high_slot, low_slot)
        }
    }

    // ─── Entity resolution and component access ─────────────────────────

    /// Resolves `entity` to `(archetype slot index, row slot)` within this
    /// world. `None` on version mismatch, foreign entity, or stale link.
    pub(crate) fn locate(&self, entity: Entity) -> Option<(IndexId, IndexId)> {
        let record = entity::resolve(entity)?;
        let link = record.link?;
        if link.world != self.id.index() {
            return None;
        }
        let slot = self.archetype_slots.get(link.archetype as usize)?;
        if slot.version != link.archetype_version {
            return None;
        }
        slot.archetype.as_ref()?;
        Some((link.archetype, record.slot))
    }

    /// Returns `true` if `entity` is live in this world.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.locate(entity).is_some()
    }

    /// Returns `true` if `entity` currently has a component of type `T`.
    pub fn has<T: Send + Sync + 'static>(&self, entity: Entity) -> bool {
        let Some((archetype_index, _)) = self.locate(entity) else {
            return false;
        };
        self.archetype_ref(archetype_index)
            .has(component::type_id_of::<T>())
    }

    /// Returns the component of type `T` attached to `entity`, if any.
    pub fn get<T: Send + Sync + 'static>(&self, entity: Entity) -> Option<&T> {
        let (archetype_index, slot) = self.locate(entity)?;
        self.archetype_ref(archetype_index)
            .column_slice::<T>()?
            .get(slot as usize)
    }

    /// Mutable variant of [`World::get`].
    pub fn get_mut<T: Send + Sync + 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        let (archetype_index, slot) = self.locate(entity)?;
        self.archetype_mut(archetype_index)
            .column_slice_mut::<T>()?
            .get_mut(slot as usize)
    }

    // ─── Per-type world data ────────────────────────────────────────────

    pub(crate) fn type_data_entry(&mut self, component_id: ComponentTypeId) -> &mut TypeData {
        let index = component_id as usize;
        if index >= self.type_data.len() {
            let target = (index + 1).next_power_of_two().max(8);
            self.type_data.resize_with(target, || None);
        }
        self.type_data[index].get_or_insert_with(TypeData::new)
    }

    #[inline]
    pub(crate) fn type_data_ref(&self, component_id: ComponentTypeId) -> Option<&TypeData> {
        self.type_data.get(component_id as usize)?.as_ref()
    }

    #[inline]
    pub(crate) fn type_data_mut(&mut self, component_id: ComponentTypeId) -> Option<&mut TypeData> {
        self.type_data.get_mut(component_id as usize)?.as_mut()
    }

    #[inline]
    pub(crate) fn has_set_callback(&self, component_id: ComponentTypeId) -> bool {
        self.type_data_ref(component_id)
            .is_some_and(|data| data.has_set_callback)
    }

    #[inline]
    pub(crate) fn has_remove_callback(&self, component_id: ComponentTypeId) -> bool {
        self.type_data_ref(component_id)
            .is_some_and(|data| data.has_remove_callback)
    }

    /// Stores a world-scoped datum of type `T`, replacing any previous one.
    pub fn set_data<T: Send + Sync + 'static>(&mut self, value: T) {
        let component_id = component::type_id_of::<T>();
        self.type_data_entry(component_id).datum = Some(Box::new(value));
    }

    /// Returns the world-scoped datum of type `T`.
    ///
    /// ## Errors
    /// Fails if no datum of this type was stored. Callers must check world
    /// validity before reaching this accessor.
    pub fn data<T: Send + Sync + 'static>(&self) -> Result<&T, MissingWorldDataError> {
        let component_id = component::type_id_of::<T>();
        self.type_data_ref(component_id)
            .and_then(|data| data.datum.as_ref())
            .and_then(|datum| datum.downcast_ref::<T>())
            .ok_or(MissingWorldDataError {
                type_name: type_name::<T>(),
            })
    }

    /// Mutable variant of [`World::data`].
    pub fn data_mut<T: Send + Sync + 'static>(&mut self) -> Result<&mut T, MissingWorldDataError> {
        let component_id = component::type_id_of::<T>();
        self.type_data_mut(component_id)
            .and_then(|data| data.datum.as_mut())
            .and_then(|datum| datum.downcast_mut::<T>())
            .ok_or(MissingWorldDataError {
                type_name: type_name::<T>(),
            })
    }

    // ─── Callback registration ──────────────────────────────────────────

    fn next_callback_id(&mut self) -> CallbackId {
        let id = self.next_callback_id;
        self.next_callback_id += 1;
        id
    }

    /// Registers a set callback for component type `T`.
    ///
    /// ## Behavior
    /// The callback fires after every `set::<T>` has been applied to
    /// storage, receiving the world, the entity, and the **previous** value
    /// of the component (`T::default()` when the set added the component).
    /// The new value is observable through the world, e.g. `world.get::<T>`.
    ///
    /// Returns a token for [`World::clear_on_set`]. Callbacks run in
    /// registration order.
    pub fn on_set<T, F>(&mut self, callback: F) -> CallbackId
    where
        T: Default + Send + Sync + 'static,
        F: FnMut(&mut World, Entity, &T) + Send + Sync + 'static,
    {
        let component_id = component::type_id_of::<T>();
        let id = self.next_callback_id();
        let mut callback = callback;
        let erased: ErasedCallback = Box::new(move |world, entity, old| {
            let old = old
                .downcast_ref::<T>()
                .expect("set callback invoked with mismatched component value");
            callback(world, entity, old);
        });
        let data = self.type_data_entry(component_id);
        data.make_default = Some(default_box::<T>);
        data.set_callbacks.push(CallbackEntry { id, callback: erased });
        data.has_set_callback = true;
        id
    }

    /// Registers a set callback that only observes the written value.
    ///
    /// Adapted internally into the full set-callback shape; the value is
    /// read back from storage, so the reference points at the slot the
    /// component lives in.
    pub fn on_set_ref<T, F>(&mut self, callback: F) -> CallbackId
    where
        T: Default + Send + Sync + 'static,
        F: FnMut(&T) + Send + Sync + 'static,
    {
        let mut callback = callback;
        self.on_set::<T, _>(move |world, entity, _old| {
            if let Some(value) = world.get::<T>(entity) {
                callback(value);
            }
        })
    }

    /// Registers a remove callback for component type `T`.
    ///
    /// Fires after the component has been detached from storage (or the
    /// entity destroyed), receiving the removed value. Inside the callback
    /// the entity no longer has the component; on destroy paths the entity
    /// is already invalid.
    pub fn on_remove<T, F>(&mut self, callback: F) -> CallbackId
    where
        T: Send + Sync + 'static,
        F: FnMut(&mut World, Entity, &T) + Send + Sync + 'static,
    {
        let component_id = component::type_id_of::<T>();
        let id = self.next_callback_id();
        let mut callback = callback;
        let erased: ErasedCallback = Box::new(move |world, entity, removed| {
            let removed = removed
                .downcast_ref::<T>()
                .expect("remove callback invoked with mismatched component value");
            callback(world, entity, removed);
        });
        let data = self.type_data_entry(component_id);
        data.remove_callbacks.push(CallbackEntry { id, callback: erased });
        data.has_remove_callback = true;
        id
    }

    /// Unregisters a set callback by its token.
    pub fn clear_on_set<T: Send + Sync + 'static>(&mut self, id: CallbackId) {
        let component_id = component::type_id_of::<T>();
        let dispatching = self.handler.dispatch_depth > 0;
        if let Some(data) = self.type_data_mut(component_id) {
            data.set_callbacks.retain(|entry| entry.id != id);
            if dispatching {
                data.retired_set.push(id);
            }
            data.has_set_callback = !data.set_callbacks.is_empty();
        }
    }

    /// Unregisters a remove callback by its token.
    pub fn clear_on_remove<T: Send + Sync + 'static>(&mut self, id: CallbackId) {
        let component_id = component::type_id_of::<T>();
        let dispatching = self.handler.dispatch_depth > 0;
        if let Some(data) = self.type_data_mut(component_id) {
            data.remove_callbacks.retain(|entry| entry.id != id);
            if dispatching {
                data.retired_remove.push(id);
            }
            data.has_remove_callback = !data.remove_callbacks.is_empty();
        }
    }
}
