//! # World Registry
//!
//! Process-global slot table owning every live [`World`], addressed by
//! versioned [`WorldId`] handles.
//!
//! ## Design
//! - Same slot/version/free-list shape as the entity table, sized small
//!   (initial 4, doubling). Slot 0 starts at version 1 so the zero handle
//!   never resolves.
//! - Destroying a world advances its slot version, invalidating all
//!   outstanding handles without pointer chasing.
//! - [`with_world`] checks the world out of its slot for the duration of
//!   the closure. The core assumes a single mutator at a time; a reentrant
//!   checkout of the same world resolves as invalid.

use std::sync::{OnceLock, RwLock};

use tracing::debug;

use crate::engine::error::{EcsError, EcsResult, StaleWorldError};
use crate::engine::types::{IndexId, WorldId, WORLD_REGISTRY_INITIAL_CAPACITY};
use crate::engine::world::World;

#[derive(Default)]
struct WorldSlot {
    /// The world, absent while checked out through [`with_world`].
    world: Option<Box<World>>,
    version: u32,
    /// True from creation until destruction, independent of checkout state.
    occupied: bool,
    /// Name copy kept in the slot so lookups work during checkout.
    name: String,
}

struct WorldRegistry {
    slots: Vec<WorldSlot>,
    free: Vec<IndexId>,
    high_water: IndexId,
}

impl WorldRegistry {
    fn new() -> Self {
        let mut slots: Vec<WorldSlot> = (0..WORLD_REGISTRY_INITIAL_CAPACITY)
            .map(|_| WorldSlot::default())
            .collect();
        slots[0].version = 1;
        Self {
            slots,
            free: Vec::new(),
            high_water: 1,
        }
    }
}

static WORLD_REGISTRY: OnceLock<RwLock<WorldRegistry>> = OnceLock::new();

fn world_registry() -> &'static RwLock<WorldRegistry> {
    WORLD_REGISTRY.get_or_init(|| RwLock::new(WorldRegistry::new()))
}

/// Creates a new world with the given name and returns its handle.
pub fn create_world(name: &str) -> WorldId {
    let mut registry = world_registry()
        .write()
        .expect("world registry lock poisoned");

    let index = match registry.free.pop() {
        Some(index) => index,
        None => {
            if registry.high_water as usize == registry.slots.len() {
                let target = registry.slots.len() * 2;
                registry.slots.resize_with(target, WorldSlot::default);
            }
            let index = registry.high_water;
            registry.high_water += 1;
            index
        }
    };

    let slot = &mut registry.slots[index as usize];
    let version = slot.version;
    let id = WorldId::new(index, version);
    slot.world = Some(Box::new(World::new(id, name)));
    slot.occupied = true;
    slot.name = name.to_string();
    debug!(world = index, name, "world created");
    id
}

/// Returns the world named `name`, creating it if absent.
pub fn get_or_create_world(name: &str) -> WorldId {
    if let Some(id) = find_world(name) {
        return id;
    }
    create_world(name)
}

/// Returns the handle of the world named `name`, if one is live.
pub fn find_world(name: &str) -> Option<WorldId> {
    let registry = world_registry()
        .read()
        .expect("world registry lock poisoned");
    registry
        .slots
        .iter()
        .enumerate()
        .take(registry.high_water as usize)
        .find(|(_, slot)| slot.occupied && slot.name == name)
        .map(|(index, slot)| WorldId::new(index as IndexId, slot.version))
}

/// Returns the handles of all live worlds.
pub fn all_worlds() -> Vec<WorldId> {
    let registry = world_registry()
        .read()
        .expect("world registry lock poisoned");
    registry
        .slots
        .iter()
        .enumerate()
        .take(registry.high_water as usize)
        .filter(|(_, slot)| slot.occupied)
        .map(|(index, slot)| WorldId::new(index as IndexId, slot.version))
        .collect()
}

/// Returns `true` if `id` addresses a live world.
pub fn is_world_valid(id: WorldId) -> bool {
    let registry = world_registry()
        .read()
        .expect("world registry lock poisoned");
    registry
        .slots
        .get(id.index() as usize)
        .is_some_and(|slot| slot.occupied && slot.version == id.version())
}

/// Returns the name of the world addressed by `id`, if live.
pub fn world_name(id: WorldId) -> Option<String> {
    let registry = world_registry()
        .read()
        .expect("world registry lock poisoned");
    let slot = registry.slots.get(id.index() as usize)?;
    if slot.occupied && slot.version == id.version() {
        Some(slot.name.clone())
    } else {
        None
    }
}

/// Runs `f` with mutable access to the world addressed by `id`.
///
/// Returns `None` if the handle does not resolve (destroyed world, stale
/// version, or the world is already checked out by an enclosing scope).
/// If `f` destroys the world, its slot is reclaimed when the scope ends.
pub fn with_world<R>(id: WorldId, f: impl FnOnce(&mut World) -> R) -> Option<R> {
    let mut world = checkout(id)?;
    let result = f(&mut world);
    checkin(world);
    Some(result)
}

/// Like [`with_world`], but reports a stale handle as a recoverable error
/// instead of `None`.
pub fn try_with_world<R>(id: WorldId, f: impl FnOnce(&mut World) -> R) -> EcsResult<R> {
    with_world(id, f).ok_or(EcsError::StaleWorld(StaleWorldError { world: id }))
}

/// Destroys the world addressed by `id`.
///
/// Routed through the world's structure-event handler: in deferred mode the
/// teardown is queued, otherwise it applies immediately. Returns `false` if
/// the handle did not resolve.
pub fn destroy_world(id: WorldId) -> bool {
    with_world(id, |world| world.destroy()).is_some()
}

/// Takes the world out of its registry slot. The slot stays occupied so the
/// handle remains nominally valid; it resolves again at [`checkin`].
pub(crate) fn checkout(id: WorldId) -> Option<Box<World>> {
    let mut registry = world_registry()
        .write()
        .expect("world registry lock poisoned");
    let slot = registry.slots.get_mut(id.index() as usize)?;
    if !slot.occupied || slot.version != id.version() {
        return None;
    }
    slot.world.take()
}

/// Returns a checked-out world to its slot. A world that destroyed itself
/// while checked out is dropped here; its slot was already reclaimed by
/// [`finalize_destroyed`].
pub(crate) fn checkin(world: Box<World>) {
    if world.is_dead() {
        return;
    }
    let mut registry = world_registry()
        .write()
        .expect("world registry lock poisoned");
    let index = world.id().index();
    registry.slots[index as usize].world = Some(world);
}

/// Reclaims the registry slot of a world that is tearing itself down:
/// version++, slot cleared, index recycled. Called before the world's
/// entities are invalidated so the handle stops resolving immediately.
pub(crate) fn finalize_destroyed(id: WorldId) {
    let mut registry = world_registry()
        .write()
        .expect("world registry lock poisoned");
    let Some(slot) = registry.slots.get_mut(id.index() as usize) else {
        return;
    };
    if slot.occupied && slot.version == id.version() {
        slot.version = slot.version.wrapping_add(1);
        slot.occupied = false;
        slot.name.clear();
        registry.free.push(id.index());
    }
}
