//! # Component Type Registry
//!
//! This module provides a process-global registry that assigns dense
//! [`ComponentTypeId`] values to Rust component types and exposes type-erased
//! storage factories for archetype column allocation.
//!
//! ## Purpose
//! The registry decouples component type information (`TypeId`, name, size,
//! alignment) from runtime storage, enabling archetypes to store
//! heterogeneous component columns behind [`ComponentBuffer`].
//!
//! ## Design
//! - A component type is registered on **first mention**: the first call to
//!   [`type_id_of`] for a type assigns the next dense id.
//! - Ids are monotonically assigned, stable for the process lifetime, and
//!   never reused.
//! - A per-type factory function is stored for constructing empty column
//!   storage; lookups by id are O(1) through a flat table.
//!
//! ## Concurrency
//! The registry is protected by `RwLock` for concurrent reads and serialized
//! writes. Id assignment is write-once per type.

use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    mem::{align_of, size_of},
    sync::{OnceLock, RwLock},
};

use crate::engine::storage::{ColumnStorage, ComponentBuffer};
use crate::engine::types::ComponentTypeId;

/// Factory function for constructing an empty type-erased component column.
type FactoryFn = fn() -> Box<dyn ComponentBuffer>;

/// Describes a registered component type.
///
/// ## Notes
/// `ComponentDesc` is `Copy` and safe to clone freely for reporting and
/// diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComponentDesc {
    /// Dense identifier assigned to this component type.
    pub component_id: ComponentTypeId,

    /// Rust type name for diagnostics.
    pub name: &'static str,

    /// Runtime `TypeId` of the component.
    pub type_id: TypeId,

    /// Size of the component type in bytes.
    pub size: usize,

    /// Alignment of the component type in bytes.
    pub align: usize,
}

impl ComponentDesc {
    /// Constructs a descriptor for type `T` with the given dense id.
    #[inline]
    fn of<T: 'static>(component_id: ComponentTypeId) -> Self {
        Self {
            component_id,
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
        }
    }
}

impl std::fmt::Display for ComponentDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ComponentDesc {{ id: {}, name: {}, size: {}, align: {} }}",
            self.component_id, self.name, self.size, self.align
        )
    }
}

struct RegisteredComponent {
    desc: ComponentDesc,
    factory: FactoryFn,
}

/// Process-global mapping between Rust component types and dense ids.
///
/// ## Invariants
/// - Every entry in `by_type` has a matching `by_id[id]`.
/// - `by_id` is append-only; ids are never reused.
struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentTypeId>,
    by_id: Vec<RegisteredComponent>,
}

static REGISTRY: OnceLock<RwLock<ComponentRegistry>> = OnceLock::new();

fn component_registry() -> &'static RwLock<ComponentRegistry> {
    REGISTRY.get_or_init(|| {
        RwLock::new(ComponentRegistry {
            by_type: HashMap::new(),
            by_id: Vec::new(),
        })
    })
}

fn new_column_storage<T: Send + Sync + 'static>() -> Box<dyn ComponentBuffer> {
    Box::new(ColumnStorage::<T>::new())
}

/// Returns the dense id for component type `T`, assigning one on first
/// mention.
///
/// ## Behavior
/// - If `T` is already registered, returns the existing id (read lock only).
/// - Otherwise allocates the next id, stores a [`ComponentDesc`], and
///   installs the column storage factory for `T`.
pub fn type_id_of<T: Send + Sync + 'static>() -> ComponentTypeId {
    let runtime_id = TypeId::of::<T>();

    {
        let registry = component_registry()
            .read()
            .expect("component registry lock poisoned");
        if let Some(&id) = registry.by_type.get(&runtime_id) {
            return id;
        }
    }

    let mut registry = component_registry()
        .write()
        .expect("component registry lock poisoned");

    // A racing registration may have won between the two lock scopes.
    if let Some(&id) = registry.by_type.get(&runtime_id) {
        return id;
    }

    let id = registry.by_id.len() as ComponentTypeId;
    registry.by_type.insert(runtime_id, id);
    registry.by_id.push(RegisteredComponent {
        desc: ComponentDesc::of::<T>(id),
        factory: new_column_storage::<T>,
    });
    id
}

/// Explicitly registers component type `T`, returning its dense id.
///
/// Equivalent to [`type_id_of`]; provided for callers that want to pin id
/// assignment order during startup.
#[inline]
pub fn register_component<T: Send + Sync + 'static>() -> ComponentTypeId {
    type_id_of::<T>()
}

/// Returns the dense id associated with a runtime `TypeId`, if registered.
pub fn lookup_type_id(runtime_id: TypeId) -> Option<ComponentTypeId> {
    let registry = component_registry()
        .read()
        .expect("component registry lock poisoned");
    registry.by_type.get(&runtime_id).copied()
}

/// Returns a copy of the descriptor for `component_id`, if registered.
pub fn description(component_id: ComponentTypeId) -> Option<ComponentDesc> {
    let registry = component_registry()
        .read()
        .expect("component registry lock poisoned");
    registry
        .by_id
        .get(component_id as usize)
        .map(|entry| entry.desc)
}

/// Creates an empty type-erased storage column for `component_id`.
///
/// ## Panics
/// Panics if `component_id` was never assigned by this registry. Signatures
/// are only built from registered ids, so this indicates internal corruption.
pub(crate) fn make_column(component_id: ComponentTypeId) -> Box<dyn ComponentBuffer> {
    let registry = component_registry()
        .read()
        .expect("component registry lock poisoned");
    let factory = registry
        .by_id
        .get(component_id as usize)
        .map(|entry| entry.factory)
        .unwrap_or_else(|| panic!("component type id {component_id} has no registered storage factory"));
    drop(registry);
    factory()
}
