//! Applying pending structural changes.

use crate::component::ComponentTypeID;
use crate::entity::EntityLocation;
use crate::graph::EMPTY_ARCHETYPE;

use super::World;

/// A summary of the work done by one commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// The number of entities with pending changes.
    pub processed: usize,
    /// The number of entities placed into or moved between archetypes.
    pub moved: usize,
    /// The number of entities which were destroyed.
    pub destroyed: usize,
    /// The number of archetypes created while committing.
    pub archetypes_created: usize,
}

impl World {
    /// Apply all pending structural changes.
    ///
    /// New entities are placed into their first archetype, every entity whose
    /// set of components changed is moved to the matching archetype, storage of removed components is reclaimed, destroyed
    /// entities are released and filters pick up any new archetypes.
    pub fn commit(&mut self) -> CommitStats {
        debug_assert!(!self.committing);
        self.committing = true;

        let archetypes_before = self.archetypes.len();
        let mut stats = CommitStats::default();

        for slot in self.entities.take_dirty() {
            stats.processed += 1;
            let touched = self.entities.take_touched(slot);

            if self.entities.is_destroying(slot) {
                self.release(slot, &touched);
                stats.destroyed += 1;
            } else if self.relocate(slot, &touched) {
                stats.moved += 1;
            }
        }

        stats.archetypes_created = self.archetypes.len() - archetypes_before;

        let graph = &self.archetypes;
        for cache in self.filters.iter_mut().filter(|c| c.is_stale(graph)) {
            cache.refresh(graph);
        }

        self.committing = false;
        tracing::trace!(world = %self.id, processed = stats.processed, moved = stats.moved,
                        destroyed = stats.destroyed, archetypes_created = stats.archetypes_created,
                        "committed");
        stats
    }

    fn stash_has(&self, component_type: ComponentTypeID, slot: u32) -> bool {
        self.stashes.get(component_type.index())
            .and_then(Option::as_deref)
            .map_or(false, |stash| stash.has(slot))
    }

    /// Take an entity out of its archetype, fixing up the entity moved into its row.
    fn detach(&mut self, location: EntityLocation) {
        if let Some(moved) = self.archetypes[location.archetype].remove_entity(location.row) {
            self.entities.set_row(moved.index(), location.row);
        }
    }

    /// Move a live entity to the archetype matching its visible components.
    ///
    /// Entities which were never placed start from the empty archetype.
    /// Returns true if the entity was placed or changed archetype.
    fn relocate(&mut self, slot: u32, touched: &[ComponentTypeID]) -> bool {
        let location = self.entities.location(slot);
        let source = location.map_or(EMPTY_ARCHETYPE, |l| l.archetype);
        let current = &self.archetypes[source];
        let changed: Vec<ComponentTypeID> = touched.iter()
            .copied()
            .filter(|ty| self.stash_has(*ty, slot) != current.has_component_type(ty))
            .collect();

        let target = match changed.as_slice() {
            [] => source,
            [ty] => self.archetypes.transition(source, *ty),
            _ => {
                let mut types = self.archetypes[source].component_types().clone();
                for ty in changed.iter() {
                    types.toggle(*ty);
                }
                self.archetypes.get_or_create(types)
            }
        };

        for ty in touched {
            if let Some(Some(stash)) = self.stashes.get_mut(ty.index()) {
                stash.flush(slot);
            }
        }

        match location {
            Some(location) if location.archetype == target => return false,
            Some(location) => self.detach(location),
            None => {}
        }

        let id = self.entities.id_at(slot);
        let row = self.archetypes[target].add_entity(id);
        self.entities.set_location(slot, EntityLocation { archetype: target, row });
        true
    }

    /// Remove a destroyed entity from everything and free its slot.
    fn release(&mut self, slot: u32, touched: &[ComponentTypeID]) {
        let location = self.entities.location(slot);
        if let Some(location) = location {
            self.detach(location);
        }

        let source = location.map_or(EMPTY_ARCHETYPE, |l| l.archetype);
        let archetype_types = self.archetypes[source].component_types().as_slice();
        for ty in archetype_types.iter().chain(touched) {
            if let Some(Some(stash)) = self.stashes.get_mut(ty.index()) {
                stash.erase(slot);
            }
        }

        let id = self.entities.id_at(slot);
        self.entities.free(slot);
        tracing::trace!(entity = %id, "destroyed entity");
    }
}

#[cfg(test)]
mod test {
    use crate::component;
    use crate::component::Component;
    use crate::filter::FilterDescriptor;
    use crate::world::{CommitState, World};

    #[derive(Debug, Default, PartialEq)]
    struct A(u32);
    #[derive(Debug, Default, PartialEq)]
    struct B(u32);
    #[derive(Debug, Default, PartialEq)]
    struct Tag;

    component!(A);
    component!(B);
    component!(Tag);

    #[test]
    fn test_commit_moves_entities() {
        let mut world = World::new();
        let e = world.create();
        world.set(e, A(1)).unwrap();
        world.set(e, B(2)).unwrap();
        assert_eq!(world.commit_state(), CommitState::Collecting);
        assert!(world.component_types(e).unwrap().is_empty());

        let stats = world.commit();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.moved, 1);
        assert_eq!(stats.archetypes_created, 1);
        assert_eq!(world.component_types(e).unwrap().as_slice().len(), 2);
        assert_eq!(world.commit_state(), CommitState::Idle);
    }

    #[test]
    fn test_add_then_remove_is_noop() {
        let mut world = World::new();
        let e = world.create();
        world.set(e, A(1)).unwrap();
        world.remove::<A>(e).unwrap();

        let stats = world.commit();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.moved, 1);
        assert_eq!(world.archetype_count(), 1);
        assert_eq!(world.archetypes()[0].entities(), &[e]);

        world.set(e, A(2)).unwrap();
        world.remove::<A>(e).unwrap();
        let stats = world.commit();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.moved, 0);
        assert!(world.stash::<A>().is_empty());
    }

    #[test]
    fn test_add_remove_returns_to_original_archetype() {
        let mut world = World::new();
        let e = world.create();
        world.set(e, A(1)).unwrap();
        world.commit();
        let original = world.archetypes().find(world.component_types(e).unwrap()).unwrap();

        world.set(e, B(1)).unwrap();
        world.commit();
        let with_b = world.archetypes().find(world.component_types(e).unwrap()).unwrap();
        assert_ne!(original, with_b);

        world.remove::<B>(e).unwrap();
        let stats = world.commit();
        assert_eq!(stats.archetypes_created, 0);
        assert_eq!(world.archetypes().find(world.component_types(e).unwrap()), Some(original));
        assert_eq!(world.archetypes()[original].edge(B::type_id()), Some(with_b));
        assert_eq!(world.archetypes()[with_b].edge(B::type_id()), Some(original));
    }

    #[test]
    fn test_moved_entity_row_is_fixed() {
        let mut world = World::new();
        let ids: Vec<_> = (0..3).map(|i| {
            let e = world.create();
            world.set(e, A(i)).unwrap();
            e
        }).collect();
        world.commit();

        world.remove::<A>(ids[0]).unwrap();
        world.commit();

        world.set(ids[2], B(0)).unwrap();
        world.commit();

        assert_eq!(world.get::<A>(ids[1]), Ok(&A(1)));
        assert_eq!(world.get::<A>(ids[2]), Ok(&A(2)));
        assert_eq!(world.get::<B>(ids[2]), Ok(&B(0)));
        assert!(!world.has::<A>(ids[0]));

        let filter = world.create_filter(FilterDescriptor::new().with::<A>());
        let mut matched: Vec<_> = world.entities(&filter).collect();
        matched.sort();
        assert_eq!(matched, vec![ids[1], ids[2]]);
    }

    #[test]
    fn test_destroy_erases_components() {
        let mut world = World::new();
        let e = world.create();
        world.set(e, A(1)).unwrap();
        world.set(e, Tag).unwrap();
        world.commit();

        let other = world.create();
        world.set(other, A(2)).unwrap();
        world.destroy(e).unwrap();
        assert!(!world.has::<A>(e));

        let stats = world.commit();
        assert_eq!(stats.destroyed, 1);
        assert_eq!(world.stash::<A>().len(), 1);
        assert!(world.stash::<Tag>().is_empty());
        assert_eq!(world.get::<A>(other), Ok(&A(2)));
    }

    #[test]
    fn test_destroy_before_first_commit() {
        let mut world = World::new();
        let e = world.create();
        world.set(e, A(1)).unwrap();
        world.destroy(e).unwrap();

        let stats = world.commit();
        assert_eq!(stats.destroyed, 1);
        assert_eq!(stats.moved, 0);
        assert!(world.stash::<A>().is_empty());
        assert!(world.archetypes()[0].is_empty());
    }

    #[test]
    fn test_new_entities_are_placed_on_commit() {
        let mut world = World::new();
        let plain = world.create();
        let tagged = world.create();
        world.set(tagged, Tag).unwrap();
        assert!(world.archetypes()[0].is_empty());

        let stats = world.commit();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.moved, 2);
        assert_eq!(world.archetypes()[0].entities(), &[plain]);

        let tag_archetype = world.archetypes().find(world.component_types(tagged).unwrap()).unwrap();
        assert_eq!(world.archetypes()[tag_archetype].entities(), &[tagged]);

        assert_eq!(world.commit(), Default::default());
    }
}
