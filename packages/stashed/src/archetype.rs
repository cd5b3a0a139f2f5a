//! Archetypes group entities which have exactly the same set of components.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};

use crate::component::ComponentTypeID;
use crate::entity::EntityID;

/// A list of component types which is always sorted and free of duplicates.
pub trait ComponentSet {
    /// Returns a sorted slice of the component types in the set.
    fn as_slice(&self) -> &[ComponentTypeID];
}

pub trait ComponentSetExt: ComponentSet {
    /// Return the number of components in the component set.
    fn len(&self) -> usize { self.as_slice().len() }

    /// Returns true if the set has no component types.
    fn is_empty(&self) -> bool { self.as_slice().is_empty() }

    /// Returns true if this `ComponentSet` contains the given component.
    fn includes(&self, component_type: &ComponentTypeID) -> bool {
        self.as_slice().binary_search(component_type).is_ok()
    }

    /// Returns true if this `ComponentSet` contains all of the given component types.
    fn includes_all(&self, other: &impl ComponentSet) -> bool {
        let mine = self.as_slice();
        let mut i = 0;

        for ty in other.as_slice() {
            while i < mine.len() && mine[i] < *ty {
                i += 1;
            }

            if i == mine.len() || mine[i] != *ty {
                return false;
            }
        }

        true
    }

    /// Returns true if this `ComponentSet` shares no component types with `other`.
    fn excludes_all(&self, other: &impl ComponentSet) -> bool {
        other.as_slice().iter().all(|ty| !self.includes(ty))
    }

    /// Compute the archetype ID of this set.
    fn archetype_id(&self) -> ArchetypeID {
        ArchetypeID::from_types(self.as_slice().iter().copied())
    }
}

impl<T: ComponentSet + ?Sized> ComponentSetExt for T {}

/// A `Vec`-backed component set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ComponentVecSet(Vec<ComponentTypeID>);

impl ComponentVecSet {
    /// Create a new `ComponentVecSet` from a `Vec` of component types.
    pub fn new(mut component_types: Vec<ComponentTypeID>) -> ComponentVecSet {
        component_types.sort();
        component_types.dedup();
        ComponentVecSet(component_types)
    }

    /// Return the slice contents of this `ComponentVecSet`.
    pub fn as_slice(&self) -> &[ComponentTypeID] {
        &self.0
    }

    /// Return the number of entries in this set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert a component type into this set.
    pub fn insert(&mut self, component_type: ComponentTypeID) {
        if let Err(idx) = self.0.binary_search(&component_type) {
            self.0.insert(idx, component_type);
        }
    }

    /// Remove a component type from this set.
    pub fn remove(&mut self, component_type: ComponentTypeID) {
        if let Ok(idx) = self.0.binary_search(&component_type) {
            self.0.remove(idx);
        }
    }

    /// Insert the component type if it is missing, remove it otherwise.
    pub fn toggle(&mut self, component_type: ComponentTypeID) {
        match self.0.binary_search(&component_type) {
            Ok(idx) => { self.0.remove(idx); }
            Err(idx) => self.0.insert(idx, component_type),
        }
    }
}

impl ComponentSet for ComponentVecSet {
    fn as_slice(&self) -> &[ComponentTypeID] {
        &self.0
    }
}

impl From<Vec<ComponentTypeID>> for ComponentVecSet {
    fn from(component_types: Vec<ComponentTypeID>) -> Self {
        ComponentVecSet::new(component_types)
    }
}

/// Shortcut for neatly creating component sets.
#[macro_export]
macro_rules! component_set {
    () => { $crate::archetype::ComponentVecSet::new(Vec::new()) };
    ($($x:expr),+ $(,)?) => {
        $crate::archetype::ComponentVecSet::new(vec![$($x),+])
    };
}

/// The identity of a component set.
///
/// This is the XOR of the `bits()` of each member type. XOR is commutative and
/// self-inverse, so the order in which types were added does not matter and
/// adding then removing a type gives back the starting ID.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchetypeID(u64);

impl ArchetypeID {
    /// The ID of the archetype with no components.
    pub const EMPTY: ArchetypeID = ArchetypeID(0);

    /// Build the ID of a set of component types.
    pub fn from_types(component_types: impl IntoIterator<Item=ComponentTypeID>) -> ArchetypeID {
        component_types.into_iter()
            .fold(ArchetypeID::EMPTY, ArchetypeID::combine)
    }

    /// Add or remove a component type from this ID.
    #[must_use]
    pub fn combine(self, component_type: ComponentTypeID) -> ArchetypeID {
        ArchetypeID(self.0 ^ component_type.bits())
    }

    /// Merge two IDs.
    #[must_use]
    pub fn merge(self, other: ArchetypeID) -> ArchetypeID {
        ArchetypeID(self.0 ^ other.0)
    }

    /// Return the raw value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Debug for ArchetypeID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ArchetypeID({:#018x})", self.0)
    }
}

/// An archetype holds every entity with one exact set of component types.
///
/// Entities are stored densely; the row of an entity is its position in
/// `entities()`. The reverse mapping lives in the entity table.
pub struct Archetype {
    index: usize,
    id: ArchetypeID,
    component_types: ComponentVecSet,
    entities: Vec<EntityID>,
    add_edges: HashMap<ComponentTypeID, usize>,
    remove_edges: HashMap<ComponentTypeID, usize>,
}

impl Archetype {
    /// Create a new archetype given the component set.
    pub(crate) fn new(index: usize, component_types: ComponentVecSet) -> Archetype {
        Archetype {
            index,
            id: component_types.archetype_id(),
            component_types,
            entities: Vec::new(),
            add_edges: HashMap::new(),
            remove_edges: HashMap::new(),
        }
    }

    /// Return the position of this archetype in its graph.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Return the ID of this archetype.
    pub fn id(&self) -> ArchetypeID {
        self.id
    }

    /// Return the sorted list of component types in this archetype.
    pub fn component_types(&self) -> &ComponentVecSet {
        &self.component_types
    }

    /// Returns true if this archetype contains the given component.
    pub fn has_component_type(&self, component_type: &ComponentTypeID) -> bool {
        self.component_types.includes(component_type)
    }

    /// Return the entities in this archetype, indexed by row.
    pub fn entities(&self) -> &[EntityID] {
        &self.entities
    }

    /// Return the number of entities in this archetype.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if this archetype holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Append an entity and return its row.
    pub(crate) fn add_entity(&mut self, id: EntityID) -> usize {
        self.entities.push(id);
        self.entities.len() - 1
    }

    /// Remove the entity at `row` by swapping the last entity into its place.
    ///
    /// Returns the entity which now occupies `row`, if any.
    ///
    /// # Panics
    /// If `row` is out of bounds.
    pub(crate) fn remove_entity(&mut self, row: usize) -> Option<EntityID> {
        assert!(row < self.entities.len(),
                "archetype graph corruption: row {} out of bounds in archetype {:?} of length {}",
                row, self.id, self.entities.len());

        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }

    /// Return the cached destination of adding or removing one component type.
    pub fn edge(&self, component_type: ComponentTypeID) -> Option<usize> {
        if self.has_component_type(&component_type) {
            self.remove_edges.get(&component_type).copied()
        } else {
            self.add_edges.get(&component_type).copied()
        }
    }

    /// Cache the destination of toggling one component type.
    pub(crate) fn set_edge(&mut self, component_type: ComponentTypeID, target: usize) {
        if self.has_component_type(&component_type) {
            self.remove_edges.insert(component_type, target);
        } else {
            self.add_edges.insert(component_type, target);
        }
    }
}

impl Debug for Archetype {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("index", &self.index)
            .field("id", &self.id)
            .field("component_types", &self.component_types.as_slice())
            .field("len", &self.entities.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::component::Component;
    use crate::component;
    use crate::entity::WorldID;

    struct A;
    struct B;
    struct C;
    component!(A);
    component!(B);
    component!(C);

    #[test]
    fn test_id_is_order_independent() {
        let abc = ArchetypeID::from_types(vec![A::type_id(), B::type_id(), C::type_id()]);
        let cab = ArchetypeID::EMPTY
            .combine(C::type_id())
            .combine(A::type_id())
            .combine(B::type_id());

        assert_eq!(abc, cab);
        assert_eq!(abc, component_set!(B::type_id(), C::type_id(), A::type_id()).archetype_id());
    }

    #[test]
    fn test_id_is_self_inverse() {
        let ab = component_set!(A::type_id(), B::type_id()).archetype_id();
        assert_eq!(ab.combine(C::type_id()).combine(C::type_id()), ab);
        assert_eq!(ab.combine(B::type_id()), ArchetypeID::EMPTY.combine(A::type_id()));
        assert_eq!(ab.merge(ab), ArchetypeID::EMPTY);
    }

    #[test]
    fn test_set_relations() {
        let abc = component_set!(A::type_id(), B::type_id(), C::type_id());
        let ab = component_set!(B::type_id(), A::type_id(), A::type_id());
        let c = component_set!(C::type_id());

        assert_eq!(ab.len(), 2);
        assert!(abc.includes_all(&ab));
        assert!(!ab.includes_all(&abc));
        assert!(ab.excludes_all(&c));
        assert!(!abc.excludes_all(&c));
        assert!(ab.includes_all(&component_set!()));

        let mut toggled = ab.clone();
        toggled.toggle(C::type_id());
        assert_eq!(toggled, abc);
        toggled.toggle(C::type_id());
        assert_eq!(toggled, ab);
    }

    #[test]
    fn test_dense_compaction() {
        let world = WorldID::unique();
        let mut archetype = Archetype::new(0, component_set!(A::type_id()));
        let ids: Vec<_> = (0..4).map(|i| EntityID::new(i, 0, world)).collect();
        for id in ids.iter() {
            archetype.add_entity(*id);
        }

        assert_eq!(archetype.remove_entity(1), Some(ids[3]));
        assert_eq!(archetype.len(), 3);
        assert_eq!(archetype.entities(), &[ids[0], ids[3], ids[2]]);

        assert_eq!(archetype.remove_entity(2), None);
        assert_eq!(archetype.entities(), &[ids[0], ids[3]]);
    }

    #[test]
    #[should_panic(expected = "archetype graph corruption")]
    fn test_remove_out_of_bounds() {
        let mut archetype = Archetype::new(0, component_set!());
        archetype.remove_entity(0);
    }
}
