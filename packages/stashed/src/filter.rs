//! Standing queries over archetypes.
//!
//! A filter names the component types an entity must have and the ones it must
//! not have. Each filter keeps the list of matching archetypes and only looks
//! at archetypes created since its last refresh.

use std::fmt::{self, Debug, Formatter};
use std::iter::FusedIterator;

use crate::archetype::{Archetype, ComponentSetExt, ComponentVecSet};
use crate::component::{Component, ComponentTypeID};
use crate::entity::{EntityID, WorldID};
use crate::graph::ArchetypeGraph;

/// Describes which archetypes a filter matches.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterDescriptor {
    with: ComponentVecSet,
    without: ComponentVecSet,
}

impl FilterDescriptor {
    /// Create a descriptor which matches every entity.
    pub fn new() -> FilterDescriptor {
        FilterDescriptor::default()
    }

    /// Require component `T`.
    pub fn with<T: Component>(self) -> FilterDescriptor {
        self.with_type(T::type_id())
    }

    /// Exclude component `T`.
    pub fn without<T: Component>(self) -> FilterDescriptor {
        self.without_type(T::type_id())
    }

    /// Require a component type.
    pub fn with_type(mut self, component_type: ComponentTypeID) -> FilterDescriptor {
        self.with.insert(component_type);
        self
    }

    /// Exclude a component type.
    pub fn without_type(mut self, component_type: ComponentTypeID) -> FilterDescriptor {
        self.without.insert(component_type);
        self
    }

    /// Return the required component types.
    pub fn required(&self) -> &ComponentVecSet {
        &self.with
    }

    /// Return the excluded component types.
    pub fn excluded(&self) -> &ComponentVecSet {
        &self.without
    }

    /// Returns true if an archetype with these component types matches.
    pub fn matches(&self, component_types: &ComponentVecSet) -> bool {
        component_types.len() >= self.with.len()
            && component_types.includes_all(&self.with)
            && component_types.excludes_all(&self.without)
    }
}

impl Debug for FilterDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDescriptor")
            .field("with", &self.with.as_slice())
            .field("without", &self.without.as_slice())
            .finish()
    }
}

/// A handle to a filter registered with a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Filter {
    world: WorldID,
    index: usize,
}

impl Filter {
    pub(crate) fn new(world: WorldID, index: usize) -> Filter {
        Filter { world, index }
    }

    /// Return the world this filter belongs to.
    pub fn world(&self) -> WorldID {
        self.world
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }
}

/// The cached archetype list of one filter.
pub(crate) struct FilterCache {
    descriptor: FilterDescriptor,
    archetypes: Vec<usize>,
    seen: usize,
    version: u64,
}

impl FilterCache {
    /// Build the cache from scratch.
    ///
    /// Archetypes with fewer component types than the filter requires are
    /// never looked at.
    pub fn new(descriptor: FilterDescriptor, graph: &ArchetypeGraph) -> FilterCache {
        let mut archetypes = Vec::new();
        for len in descriptor.with.len()..=graph.max_len() {
            archetypes.extend(graph.with_len(len)
                .iter()
                .copied()
                .filter(|&idx| descriptor.matches(graph[idx].component_types())));
        }
        archetypes.sort_unstable();

        FilterCache {
            descriptor,
            archetypes,
            seen: graph.len(),
            version: graph.version(),
        }
    }

    pub fn descriptor(&self) -> &FilterDescriptor {
        &self.descriptor
    }

    pub fn archetypes(&self) -> &[usize] {
        &self.archetypes
    }

    pub fn is_stale(&self, graph: &ArchetypeGraph) -> bool {
        self.version != graph.version()
    }

    /// Check archetypes created since the last refresh.
    pub fn refresh(&mut self, graph: &ArchetypeGraph) {
        for idx in self.seen..graph.len() {
            if self.descriptor.matches(graph[idx].component_types()) {
                self.archetypes.push(idx);
            }
        }
        self.seen = graph.len();
        self.version = graph.version();
    }

    pub fn len(&self, graph: &ArchetypeGraph) -> usize {
        self.archetypes.iter().map(|&idx| graph[idx].len()).sum()
    }
}

/// An iterator over the entities matched by a filter.
///
/// Cloning the iterator restarts from the clone's position.
#[derive(Clone)]
pub struct FilterIter<'w> {
    graph: &'w ArchetypeGraph,
    archetypes: std::slice::Iter<'w, usize>,
    current: std::slice::Iter<'w, EntityID>,
}

impl<'w> FilterIter<'w> {
    pub(crate) fn new(graph: &'w ArchetypeGraph, archetypes: &'w [usize]) -> FilterIter<'w> {
        FilterIter {
            graph,
            archetypes: archetypes.iter(),
            current: (&[]).iter(),
        }
    }

    /// Return the remaining archetypes, starting with the one in progress.
    pub fn archetypes(&self) -> impl Iterator<Item=&'w Archetype> + 'w {
        let graph = self.graph;
        self.archetypes.clone().map(move |&idx| &graph[idx])
    }
}

impl<'w> Iterator for FilterIter<'w> {
    type Item = EntityID;

    fn next(&mut self) -> Option<EntityID> {
        loop {
            if let Some(id) = self.current.next() {
                return Some(*id);
            }

            let idx = *self.archetypes.next()?;
            self.current = self.graph[idx].entities().iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let graph = self.graph;
        let rest: usize = self.archetypes.clone().map(|&idx| graph[idx].len()).sum();
        let len = self.current.len() + rest;
        (len, Some(len))
    }
}

impl<'w> ExactSizeIterator for FilterIter<'w> {}

impl<'w> FusedIterator for FilterIter<'w> {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{component, component_set};

    struct A;
    struct B;
    struct C;
    struct D;
    component!(A);
    component!(B);
    component!(C);
    component!(D);

    #[test]
    fn test_descriptor_matches() {
        let desc = FilterDescriptor::new().with::<A>().with::<B>().without::<C>();

        assert!(desc.matches(&component_set!(A::type_id(), B::type_id())));
        assert!(desc.matches(&component_set!(A::type_id(), B::type_id(), D::type_id())));
        assert!(!desc.matches(&component_set!(A::type_id(), B::type_id(), C::type_id())));
        assert!(!desc.matches(&component_set!(A::type_id())));
        assert!(FilterDescriptor::new().matches(&component_set!()));
    }

    #[test]
    fn test_descriptor_identity() {
        let first = FilterDescriptor::new().with::<B>().with::<A>().without::<C>();
        let second = FilterDescriptor::new().without::<C>().with::<A>().with::<B>();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cache_incremental_refresh() {
        let mut graph = ArchetypeGraph::new(4);
        let ab = graph.get_or_create(component_set!(A::type_id(), B::type_id()));
        graph.get_or_create(component_set!(A::type_id()));

        let mut cache = FilterCache::new(FilterDescriptor::new().with::<A>().with::<B>(), &graph);
        assert_eq!(cache.archetypes(), &[ab]);
        assert!(!cache.is_stale(&graph));

        let abd = graph.get_or_create(component_set!(A::type_id(), B::type_id(), D::type_id()));
        graph.get_or_create(component_set!(C::type_id()));
        assert!(cache.is_stale(&graph));

        cache.refresh(&graph);
        assert_eq!(cache.archetypes(), &[ab, abd]);
        assert!(!cache.is_stale(&graph));
    }

    #[test]
    fn test_iter_skips_empty_archetypes() {
        let world = WorldID::unique();
        let mut graph = ArchetypeGraph::new(4);
        let a = graph.get_or_create(component_set!(A::type_id()));
        let ab = graph.get_or_create(component_set!(A::type_id(), B::type_id()));
        let ac = graph.get_or_create(component_set!(A::type_id(), C::type_id()));

        let ids: Vec<_> = (0..3).map(|i| EntityID::new(i, 0, world)).collect();
        graph[a].add_entity(ids[0]);
        graph[ac].add_entity(ids[1]);
        graph[ac].add_entity(ids[2]);

        let cache = FilterCache::new(FilterDescriptor::new().with::<A>(), &graph);
        assert_eq!(cache.archetypes(), &[a, ab, ac]);
        assert_eq!(cache.len(&graph), 3);

        let iter = FilterIter::new(&graph, cache.archetypes());
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.clone().collect::<Vec<_>>(), ids);
        assert_eq!(iter.collect::<Vec<_>>(), ids);
    }
}
