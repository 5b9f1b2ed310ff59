//! Error types for world data access and handle resolution.
//!
//! This module declares focused, composable error types used across the
//! world and registry layers. Each error carries enough context to make
//! failures actionable while remaining small and cheap to pass around or
//! convert into the aggregate [`EcsError`].
//!
//! ## Goals
//! * **Specificity:** Each error type models a single failure mode (a stale
//!   world handle, an absent per-world datum).
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and provide `From<T>` conversions into [`EcsError`].
//!
//! ## Propagation policy
//! Invalid handles on mutating entry points are absorbed as silent no-ops
//! and never surface here; producing accessors report "absent" through
//! `Option`. Only programmer-recoverable failures (reading a datum that was
//! never stored, addressing a destroyed world) become error values. Internal
//! invariant violations are fatal and panic instead.

use std::fmt;

use crate::engine::types::WorldId;

/// Returned when `data::<T>()` is called for a type that has no world-scoped
/// datum stored in the target world.
///
/// Callers are expected to check world validity first; this error only
/// reports the absence of the datum itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingWorldDataError {
    /// Rust type name of the requested datum.
    pub type_name: &'static str,
}

impl fmt::Display for MissingWorldDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no world datum stored for type {}", self.type_name)
    }
}

impl std::error::Error for MissingWorldDataError {}

/// Returned when a world handle no longer matches a live registry slot,
/// typically because the world was destroyed and its slot version advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleWorldError {
    /// The offending handle.
    pub world: WorldId,
}

impl fmt::Display for StaleWorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stale world handle (index {}, version {})",
            self.world.index(),
            self.world.version()
        )
    }
}

impl std::error::Error for StaleWorldError {}

/// Aggregate error for recoverable ECS failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcsError {
    /// A requested per-world datum was absent.
    MissingWorldData(MissingWorldDataError),

    /// A world handle did not resolve to a live world.
    StaleWorld(StaleWorldError),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::MissingWorldData(e) => write!(f, "{e}"),
            EcsError::StaleWorld(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EcsError {}

impl From<MissingWorldDataError> for EcsError {
    fn from(e: MissingWorldDataError) -> Self {
        EcsError::MissingWorldData(e)
    }
}

impl From<StaleWorldError> for EcsError {
    fn from(e: StaleWorldError) -> Self {
        EcsError::StaleWorld(e)
    }
}

/// Convenience alias for results carrying [`EcsError`].
pub type EcsResult<T> = Result<T, EcsError>;
