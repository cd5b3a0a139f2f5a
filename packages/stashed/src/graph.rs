//! The archetype graph owns every archetype of a world.
//!
//! Archetypes are never removed. Index 0 is always the empty archetype, which
//! holds every entity without components.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use crate::archetype::{Archetype, ArchetypeID, ComponentSetExt, ComponentVecSet};
use crate::component::ComponentTypeID;

/// The index of the empty archetype.
pub const EMPTY_ARCHETYPE: usize = 0;

/// All archetypes of a world, indexed by ID and by component count.
pub struct ArchetypeGraph {
    archetypes: Vec<Archetype>,
    by_id: HashMap<ArchetypeID, Vec<usize>>,
    by_len: Vec<Vec<usize>>,
    version: u64,
}

impl ArchetypeGraph {
    /// Create a graph containing only the empty archetype.
    pub fn new(capacity: usize) -> ArchetypeGraph {
        let mut graph = ArchetypeGraph {
            archetypes: Vec::with_capacity(capacity),
            by_id: HashMap::with_capacity(capacity),
            by_len: Vec::new(),
            version: 0,
        };
        graph.insert(ComponentVecSet::default());
        graph
    }

    /// Return the number of archetypes.
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// The graph always holds the empty archetype.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Return the current version.
    ///
    /// The version changes whenever an archetype is created.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Get an archetype by index.
    pub fn get(&self, index: usize) -> Option<&Archetype> {
        self.archetypes.get(index)
    }

    /// Iterate over all archetypes in creation order.
    pub fn iter(&self) -> impl Iterator<Item=&Archetype> + '_ {
        self.archetypes.iter()
    }

    /// Return the indices of archetypes with exactly `len` component types.
    pub fn with_len(&self, len: usize) -> &[usize] {
        self.by_len.get(len).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Return the largest component count of any archetype.
    pub fn max_len(&self) -> usize {
        self.by_len.len().saturating_sub(1)
    }

    /// Find the archetype with exactly this set of component types.
    pub fn find(&self, component_types: &ComponentVecSet) -> Option<usize> {
        self.by_id.get(&component_types.archetype_id())?
            .iter()
            .copied()
            .find(|&idx| self.archetypes[idx].component_types() == component_types)
    }

    /// Find or create the archetype with exactly this set of component types.
    pub fn get_or_create(&mut self, component_types: ComponentVecSet) -> usize {
        match self.find(&component_types) {
            Some(idx) => idx,
            None => self.insert(component_types),
        }
    }

    /// Return the archetype reached by toggling one component type on `from`.
    ///
    /// The edge is cached in both directions the first time it is taken.
    pub fn transition(&mut self, from: usize, component_type: ComponentTypeID) -> usize {
        let source = &self[from];
        if let Some(to) = source.edge(component_type) {
            return to;
        }

        let mut target_types = source.component_types().clone();
        target_types.toggle(component_type);
        let to = self.get_or_create(target_types);

        self[from].set_edge(component_type, to);
        self[to].set_edge(component_type, from);
        to
    }

    fn insert(&mut self, component_types: ComponentVecSet) -> usize {
        let index = self.archetypes.len();
        let len = component_types.len();
        let archetype = Archetype::new(index, component_types);

        tracing::debug!(index, id = ?archetype.id(), types = ?archetype.component_types().as_slice(),
                        "created archetype");

        self.by_id.entry(archetype.id()).or_default().push(index);
        if self.by_len.len() <= len {
            self.by_len.resize_with(len + 1, Vec::new);
        }
        self.by_len[len].push(index);
        self.archetypes.push(archetype);
        self.version += 1;
        index
    }
}

impl Index<usize> for ArchetypeGraph {
    type Output = Archetype;

    fn index(&self, index: usize) -> &Archetype {
        match self.archetypes.get(index) {
            Some(archetype) => archetype,
            None => panic!("archetype graph corruption: archetype {} out of bounds (len {})",
                           index, self.archetypes.len()),
        }
    }
}

impl IndexMut<usize> for ArchetypeGraph {
    fn index_mut(&mut self, index: usize) -> &mut Archetype {
        let len = self.archetypes.len();
        match self.archetypes.get_mut(index) {
            Some(archetype) => archetype,
            None => panic!("archetype graph corruption: archetype {} out of bounds (len {})",
                           index, len),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::component::Component;
    use crate::{component, component_set};

    struct A;
    struct B;
    struct C;
    component!(A);
    component!(B);
    component!(C);

    #[test]
    fn test_empty_archetype() {
        let graph = ArchetypeGraph::new(4);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph[EMPTY_ARCHETYPE].id(), ArchetypeID::EMPTY);
        assert_eq!(graph.find(&component_set!()), Some(EMPTY_ARCHETYPE));
        assert_eq!(graph.with_len(0), &[EMPTY_ARCHETYPE]);
    }

    #[test]
    fn test_get_or_create_is_deterministic() {
        let mut graph = ArchetypeGraph::new(4);
        let abc = graph.get_or_create(component_set!(A::type_id(), B::type_id(), C::type_id()));
        let version = graph.version();

        let cba = graph.get_or_create(component_set!(C::type_id(), B::type_id(), A::type_id()));
        assert_eq!(abc, cba);
        assert_eq!(graph.version(), version);
        assert_eq!(graph.with_len(3), &[abc]);
        assert_eq!(graph.max_len(), 3);
    }

    #[test]
    fn test_transition_order_independent() {
        let mut graph = ArchetypeGraph::new(4);
        let a = graph.transition(EMPTY_ARCHETYPE, A::type_id());
        let ab = graph.transition(a, B::type_id());

        let b = graph.transition(EMPTY_ARCHETYPE, B::type_id());
        let ba = graph.transition(b, A::type_id());

        assert_eq!(ab, ba);
        assert_eq!(graph[ab].component_types(), &component_set!(A::type_id(), B::type_id()));
    }

    #[test]
    fn test_add_remove_inverse() {
        let mut graph = ArchetypeGraph::new(4);
        let a = graph.get_or_create(component_set!(A::type_id()));
        let ab = graph.transition(a, B::type_id());

        assert_eq!(graph[a].edge(B::type_id()), Some(ab));
        assert_eq!(graph[ab].edge(B::type_id()), Some(a));

        let version = graph.version();
        assert_eq!(graph.transition(ab, B::type_id()), a);
        assert_eq!(graph.version(), version);
    }

    #[test]
    #[should_panic(expected = "archetype graph corruption")]
    fn test_index_out_of_bounds() {
        let graph = ArchetypeGraph::new(4);
        let _ = &graph[7];
    }
}
