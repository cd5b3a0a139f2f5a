//! An archetype-based entity component store.
//!
//! Component values live in per-type stashes and can be read and written at
//! any time. Entities are grouped into archetypes by their exact set of
//! component types, and filters enumerate the archetypes matching a query.
//! Changes to an entity's set of components are applied in batches by
//! `World::commit`.

pub use archetype::{Archetype, ArchetypeID, ComponentSet, ComponentSetExt, ComponentVecSet};
pub use component::{
    Component,
    ComponentTypeID,
};
pub use entity::{EntityID, WorldID};
pub use error::{EntityError, Result};
pub use filter::{Filter, FilterDescriptor, FilterIter};
pub use stash::{Stash, StashMut, StashRef};
pub use system::{
    BoxSystem,
    System,
    SystemGroup,
    Systems,
};
pub use world::{CommitState, CommitStats, World, WorldConfig};

pub mod component;
pub mod entity;
pub mod error;
pub mod archetype;
pub mod graph;

pub mod stash;
pub mod filter;

pub mod world;
pub mod system;
