//! The `World` ties together entities, stashes, archetypes and filters.
//!
//! Component reads and writes take effect immediately. Structural changes
//! (which archetype an entity lives in, and which filters see it) are only
//! applied by `World::commit`.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};

use rayon::prelude::*;

use crate::archetype::ComponentVecSet;
use crate::component::Component;
use crate::entity::{Entities, EntityID, WorldID};
use crate::error::{EntityError, Result};
use crate::filter::{Filter, FilterCache, FilterDescriptor, FilterIter};
use crate::graph::{ArchetypeGraph, EMPTY_ARCHETYPE};
use crate::stash::{ErasedStash, Stash, StashMut, StashRef};

pub use self::commit::CommitStats;
pub use self::config::WorldConfig;

mod commit;
pub mod config;

/// Where a world is in its change cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    /// No changes are waiting to be applied.
    Idle,
    /// Changes have been made since the last commit.
    Collecting,
    /// A commit is in progress.
    Committing,
}

/// A container of entities and their components.
///
/// A world has a single owner. All structural operations take `&mut World`,
/// so nothing can be iterating over it while it changes.
pub struct World {
    id: WorldID,
    name: String,
    config: WorldConfig,
    entities: Entities,
    archetypes: ArchetypeGraph,
    stashes: Vec<Option<Box<dyn ErasedStash>>>,
    filters: Vec<FilterCache>,
    filter_lookup: HashMap<FilterDescriptor, usize>,
    committing: bool,
}

impl World {
    /// Create a new, empty world with the default configuration.
    pub fn new() -> World {
        World::with_config(WorldConfig::default())
    }

    /// Create a new, empty world.
    pub fn with_config(config: WorldConfig) -> World {
        let id = WorldID::unique();
        let name = match config.name() {
            Some(name) => name.to_owned(),
            None => format!("World {}", id),
        };

        tracing::debug!(world = %id, %name, entity_capacity = config.entity_capacity,
                        "created world");

        World {
            id,
            name,
            entities: Entities::new(id, config.entity_capacity),
            archetypes: ArchetypeGraph::new(config.archetype_capacity),
            stashes: Vec::new(),
            filters: Vec::with_capacity(config.archetype_capacity),
            filter_lookup: HashMap::new(),
            committing: false,
            config,
        }
    }

    /// Return the unique ID of this world.
    pub fn id(&self) -> WorldID {
        self.id
    }

    /// Return the name of this world.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the configuration this world was created with.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Return the current commit state.
    pub fn commit_state(&self) -> CommitState {
        if self.committing {
            CommitState::Committing
        } else if self.entities.has_dirty() {
            CommitState::Collecting
        } else {
            CommitState::Idle
        }
    }

    /// Return the number of live entities.
    ///
    /// Entities destroyed since the last commit are still counted.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Return the number of archetypes, including the empty one.
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Return the archetype graph.
    pub fn archetypes(&self) -> &ArchetypeGraph {
        &self.archetypes
    }

    /// Create a new entity with no components.
    ///
    /// The entity is usable straight away but is only placed into an
    /// archetype, and so only seen by filters, at the next commit.
    pub fn create(&mut self) -> EntityID {
        self.entities.allocate()
    }

    /// Destroy an entity.
    ///
    /// The handle becomes stale immediately. Storage is released at the next
    /// commit.
    pub fn destroy(&mut self, id: EntityID) -> Result<()> {
        let slot = self.entities.validate(id)?;
        self.entities.mark_destroyed(slot);
        Ok(())
    }

    /// Returns true if the handle refers to a live entity of this world.
    pub fn is_alive(&self, id: EntityID) -> bool {
        self.entities.is_alive(id)
    }

    /// Return the component types of an entity as of the last commit.
    pub fn component_types(&self, id: EntityID) -> Result<&ComponentVecSet> {
        let slot = self.entities.validate(id)?;
        let archetype = self.entities.location(slot).map_or(EMPTY_ARCHETYPE, |l| l.archetype);
        Ok(self.archetypes[archetype].component_types())
    }

    /// Get read access to the stash of `T`.
    pub fn stash<T: Component>(&self) -> StashRef<'_, T> {
        let stash = self.stashes.get(T::type_id().index())
            .and_then(Option::as_deref)
            .and_then(|s| s.as_any().downcast_ref::<Stash<T>>());
        StashRef::new(&self.entities, stash)
    }

    /// Get write access to the stash of `T`, creating it if needed.
    pub fn stash_mut<T: Component>(&mut self) -> StashMut<'_, T> {
        let index = T::type_id().index();
        if self.stashes.len() <= index {
            self.stashes.resize_with(index + 1, || None);
        }

        let capacity = self.config.stash_capacity;
        let erased = self.stashes[index]
            .get_or_insert_with(|| Box::new(Stash::<T>::new(capacity)) as Box<dyn ErasedStash>);
        let stash = match erased.as_any_mut().downcast_mut::<Stash<T>>() {
            Some(stash) => stash,
            None => panic!("archetype graph corruption: stash #{} does not hold {:?}",
                           index, T::type_id()),
        };

        StashMut::new(&mut self.entities, stash)
    }

    /// Set a component on an entity, replacing any existing value.
    pub fn set<T: Component>(&mut self, id: EntityID, value: T) -> Result<()> {
        self.stash_mut::<T>().set(id, value)
    }

    /// Get a component of an entity.
    pub fn get<T: Component>(&self, id: EntityID) -> Result<&T> {
        self.stash::<T>().get(id)
    }

    /// Get a mutable reference to a component of an entity.
    pub fn get_mut<T: Component>(&mut self, id: EntityID) -> Result<&mut T> {
        let slot = self.entities.validate(id)?;
        self.stashes.get_mut(T::type_id().index())
            .and_then(Option::as_deref_mut)
            .and_then(|s| s.as_any_mut().downcast_mut::<Stash<T>>())
            .and_then(|stash| stash.get_mut(slot))
            .ok_or(EntityError::ComponentNotFound {
                entity: id,
                component: T::type_id(),
            })
    }

    /// Get a component of an entity, adding the default value if it is missing.
    pub fn add<T: Component + Default>(&mut self, id: EntityID) -> Result<&mut T> {
        self.entities.validate(id)?;
        if !self.has::<T>(id) {
            self.set(id, T::default())?;
        }
        self.get_mut(id)
    }

    /// Remove a component from an entity.
    pub fn remove<T: Component>(&mut self, id: EntityID) -> Result<()> {
        self.stash_mut::<T>().remove(id)
    }

    /// Returns true if the entity is alive and has component `T`.
    pub fn has<T: Component>(&self, id: EntityID) -> bool {
        self.stash::<T>().has(id)
    }

    /// Register a filter, or find the existing filter with the same descriptor.
    pub fn create_filter(&mut self, descriptor: FilterDescriptor) -> Filter {
        if let Some(&index) = self.filter_lookup.get(&descriptor) {
            return Filter::new(self.id, index);
        }

        let index = self.filters.len();
        tracing::debug!(world = %self.id, index, ?descriptor, "created filter");
        self.filters.push(FilterCache::new(descriptor.clone(), &self.archetypes));
        self.filter_lookup.insert(descriptor, index);
        Filter::new(self.id, index)
    }

    fn filter_cache(&self, filter: &Filter) -> &FilterCache {
        assert_eq!(filter.world(), self.id, "filter {:?} used with world {}", filter, self.id);
        &self.filters[filter.index()]
    }

    /// Return the descriptor a filter was created with.
    pub fn filter_descriptor(&self, filter: &Filter) -> &FilterDescriptor {
        self.filter_cache(filter).descriptor()
    }

    /// Iterate over the entities matched by a filter as of the last commit.
    ///
    /// # Panics
    /// If the filter belongs to a different world.
    pub fn entities(&self, filter: &Filter) -> FilterIter<'_> {
        FilterIter::new(&self.archetypes, self.filter_cache(filter).archetypes())
    }

    /// Return the number of entities matched by a filter as of the last commit.
    pub fn filter_len(&self, filter: &Filter) -> usize {
        self.filter_cache(filter).len(&self.archetypes)
    }

    /// Iterate over the entities matched by a filter in parallel.
    pub fn par_entities(&self, filter: &Filter) -> impl ParallelIterator<Item=EntityID> + '_ {
        let graph = &self.archetypes;
        self.filter_cache(filter)
            .archetypes()
            .par_iter()
            .flat_map_iter(move |&idx| graph[idx].entities().iter().copied())
    }

    /// Destroy every entity and commit.
    ///
    /// Archetypes and filters are kept.
    pub fn clear(&mut self) -> CommitStats {
        let ids: Vec<_> = self.entities.iter().collect();
        for id in ids {
            self.entities.mark_destroyed(id.index());
        }

        let stats = self.commit();
        tracing::debug!(world = %self.id, destroyed = stats.destroyed, "cleared world");
        stats
    }
}

impl Default for World {
    fn default() -> Self {
        World::new()
    }
}

impl Debug for World {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("entities", &self.entities.len())
            .field("archetypes", &self.archetypes.len())
            .field("filters", &self.filters.len())
            .finish()
    }
}
