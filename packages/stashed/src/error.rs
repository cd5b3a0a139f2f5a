//! Errors reported by entity and component operations.
//!
//! Only expected, per-call conditions are values. Broken internal invariants
//! (a row outside its archetype, a double free) panic instead.

use crate::component::ComponentTypeID;
use crate::entity::{EntityID, WorldID};

/// The error type for entity and component access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    /// The handle refers to an entity which has been destroyed, or which is
    /// waiting to be destroyed at the next commit.
    #[error("stale or dead entity reference {0}")]
    StaleHandle(EntityID),

    /// The handle was issued by a different world.
    #[error("entity {entity} does not belong to world {world}")]
    ForeignEntity {
        /// The offending handle.
        entity: EntityID,
        /// The world it was used with.
        world: WorldID,
    },

    /// The entity does not carry the requested component.
    #[error("entity {entity} has no {component:?} component")]
    ComponentNotFound {
        /// The entity that was queried.
        entity: EntityID,
        /// The missing component type.
        component: ComponentTypeID,
    },
}

impl EntityError {
    /// Returns true if this is a `ComponentNotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EntityError::ComponentNotFound { .. })
    }
}

/// A `Result` with `EntityError` as the error type.
pub type Result<T> = std::result::Result<T, EntityError>;
