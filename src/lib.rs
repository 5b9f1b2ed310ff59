//! # archetype-ecs
//!
//! Sparse-archetype Entity-Component-System runtime: columnar per-component
//! storage grouped by exact component signature, stable versioned handles,
//! and deferred structural mutation with ordered lifecycle callbacks.
//!
//! ## Design Goals
//! - Archetype-based storage for cache efficiency
//! - Stable `(index, version)` handles for entities, worlds, and archetypes
//! - Well-defined ordering for deferred structural changes
//! - Set/remove callbacks that always observe post-mutation state
//!
//! ## Concurrency model
//! The core is single-mutator: it assumes at most one mutator and at most
//! one iterator at a time per process for the shared tables (entity table,
//! world registry, type registry) and per world for archetype state. The
//! process-global singletons are lock-guarded only so they remain sound
//! under Rust's multi-threaded test runner; there is no internal
//! fine-grained synchronization and no suspension point.

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

// Core handle and signature types

pub use engine::types::{
    ArchetypeId,
    CallbackId,
    ComponentTypeId,
    Entity,
    Signature,
    WorldId,
};

// World surface

pub use engine::world::World;
pub use engine::events::DeferScope;

// Process-global world registry

pub use engine::registry::{
    all_worlds,
    create_world,
    destroy_world,
    find_world,
    get_or_create_world,
    is_world_valid,
    try_with_world,
    with_world,
    world_name,
};

// Component type registry

pub use engine::component::{
    description,
    lookup_type_id,
    register_component,
    type_id_of,
    ComponentDesc,
};

// Archetype storage

pub use engine::archetype::Archetype;
pub use engine::storage::{ColumnStorage, ComponentBuffer};

pub use engine::error::{
    EcsError,
    EcsResult,
    MissingWorldDataError,
    StaleWorldError,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used ECS types.
///
/// Import with:
/// ```rust
/// use archetype_ecs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        all_worlds,
        create_world,
        destroy_world,
        find_world,
        get_or_create_world,
        is_world_valid,
        register_component,
        try_with_world,
        type_id_of,
        with_world,
        world_name,
        Archetype,
        ArchetypeId,
        Entity,
        Signature,
        World,
        WorldId,
    };
}
