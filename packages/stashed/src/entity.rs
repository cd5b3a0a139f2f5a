//! Entity identity.
//!
//! An `EntityID` is a generational handle: a slot index into the owning world's
//! entity table, the generation of that slot when the handle was issued, and the
//! ID of the owning world. A slot's generation is bumped every time it is freed, so
//! handles to destroyed entities can be detected in O(1).

use std::fmt::{self, Debug, Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};

use bit_vec::BitVec;

use crate::component::ComponentTypeID;
use crate::error::{EntityError, Result};

static NEXT_WORLD_ID: AtomicU32 = AtomicU32::new(1);

/// The unique ID of a `World` within this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorldID(u32);

impl WorldID {
    /// Allocate a new process-unique world ID.
    pub(crate) fn unique() -> WorldID {
        WorldID(NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Return the inner unique ID.
    pub fn id(&self) -> u32 {
        self.0
    }
}

impl Display for WorldID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The ID of a single entity.
///
/// Entity IDs are only meaningful to the world which issued them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityID {
    index: u32,
    generation: u32,
    world: WorldID,
}

impl EntityID {
    pub(crate) fn new(index: u32, generation: u32, world: WorldID) -> EntityID {
        EntityID {
            index,
            generation,
            world,
        }
    }

    /// Return the slot index of this entity.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Return the generation of the slot when this handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Return the world which issued this handle.
    pub fn world(&self) -> WorldID {
        self.world
    }
}

impl Debug for EntityID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{}@{})", self.index, self.generation, self.world)
    }
}

impl Display for EntityID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Alive,
    Destroying,
}

/// Where an entity currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    /// Index of the archetype in the archetype graph.
    pub archetype: usize,
    /// Row of the entity inside the archetype.
    pub row: usize,
}

#[derive(Debug, Clone)]
struct EntityRecord {
    generation: u32,
    state: SlotState,
    location: Option<EntityLocation>,
    touched: Vec<ComponentTypeID>,
}

impl EntityRecord {
    fn free() -> EntityRecord {
        EntityRecord {
            generation: 0,
            state: SlotState::Free,
            location: None,
            touched: Vec::new(),
        }
    }
}

/// The entity table of a single world.
///
/// Owns the slot table, the free-slot list and the dirty set.
#[derive(Debug)]
pub struct Entities {
    world: WorldID,
    records: Vec<EntityRecord>,
    free: Vec<u32>,
    dirty_bits: BitVec,
    dirty: Vec<u32>,
    alive: usize,
}

impl Entities {
    /// Create an empty entity table for the given world.
    pub fn new(world: WorldID, capacity: usize) -> Entities {
        Entities {
            world,
            records: Vec::with_capacity(capacity),
            free: Vec::new(),
            dirty_bits: BitVec::from_elem(capacity, false),
            dirty: Vec::new(),
            alive: 0,
        }
    }

    /// Return the number of live entities, including those pending destruction.
    pub fn len(&self) -> usize {
        self.alive
    }

    /// Returns true if no entities are alive.
    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    /// Return the number of slots ever allocated.
    pub fn slots(&self) -> usize {
        self.records.len()
    }

    /// Allocate a slot, reusing the most recently freed one if possible.
    ///
    /// The new entity has no archetype until the next commit places it, so
    /// the slot starts out dirty.
    pub(crate) fn allocate(&mut self) -> EntityID {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = self.records.len() as u32;
                self.records.push(EntityRecord::free());
                index
            }
        };

        let record = &mut self.records[index as usize];
        debug_assert_eq!(record.state, SlotState::Free);
        record.state = SlotState::Alive;
        record.location = None;
        let id = EntityID::new(index, record.generation, self.world);
        self.alive += 1;
        self.mark_dirty(index);
        id
    }

    /// Returns true if the handle refers to a live entity of this world.
    pub fn is_alive(&self, id: EntityID) -> bool {
        self.validate(id).is_ok()
    }

    /// Check a handle and return its slot.
    pub(crate) fn validate(&self, id: EntityID) -> Result<u32> {
        if id.world != self.world {
            return Err(EntityError::ForeignEntity { entity: id, world: self.world });
        }

        match self.records.get(id.index as usize) {
            Some(r) if r.generation == id.generation && r.state == SlotState::Alive => Ok(id.index),
            _ => Err(EntityError::StaleHandle(id)),
        }
    }

    /// Return the current handle for an occupied slot.
    pub(crate) fn id_at(&self, slot: u32) -> EntityID {
        let record = &self.records[slot as usize];
        debug_assert_ne!(record.state, SlotState::Free, "slot {} is free", slot);
        EntityID::new(slot, record.generation, self.world)
    }

    /// Return the location of an occupied slot, or None if it has not been
    /// placed by a commit yet.
    pub(crate) fn location(&self, slot: u32) -> Option<EntityLocation> {
        self.records[slot as usize].location
    }

    /// Update the location of an occupied slot.
    pub(crate) fn set_location(&mut self, slot: u32, location: EntityLocation) {
        self.records[slot as usize].location = Some(location);
    }

    /// Update only the row of an occupied slot.
    pub(crate) fn set_row(&mut self, slot: u32, row: usize) {
        match &mut self.records[slot as usize].location {
            Some(location) => location.row = row,
            None => panic!("archetype graph corruption: slot {} has no archetype", slot),
        }
    }

    /// Add a slot to the pending-change set.
    ///
    /// Marking an already dirty slot does nothing.
    pub(crate) fn mark_dirty(&mut self, slot: u32) {
        let bit = slot as usize;
        if bit >= self.dirty_bits.len() {
            let grow_by = (bit + 1).max(self.dirty_bits.len() * 2) - self.dirty_bits.len();
            self.dirty_bits.grow(grow_by, false);
        }

        if !self.dirty_bits[bit] {
            self.dirty_bits.set(bit, true);
            self.dirty.push(slot);
        }
    }

    /// Record that the presence of a component type changed on a slot.
    pub(crate) fn touch(&mut self, slot: u32, component_type: ComponentTypeID) {
        let touched = &mut self.records[slot as usize].touched;
        if let Err(idx) = touched.binary_search(&component_type) {
            touched.insert(idx, component_type);
        }
        self.mark_dirty(slot);
    }

    /// Take the component types touched on a slot since the last commit.
    pub(crate) fn take_touched(&mut self, slot: u32) -> Vec<ComponentTypeID> {
        std::mem::take(&mut self.records[slot as usize].touched)
    }

    /// Returns true if there are pending changes.
    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Return the number of slots with pending changes.
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Take the current dirty set, leaving it empty.
    pub(crate) fn take_dirty(&mut self) -> Vec<u32> {
        let dirty = std::mem::take(&mut self.dirty);
        for slot in dirty.iter() {
            self.dirty_bits.set(*slot as usize, false);
        }
        dirty
    }

    /// Mark a live entity for destruction at the next commit.
    pub(crate) fn mark_destroyed(&mut self, slot: u32) {
        let record = &mut self.records[slot as usize];
        debug_assert_eq!(record.state, SlotState::Alive);
        record.state = SlotState::Destroying;
        self.mark_dirty(slot);
    }

    /// Returns true if the slot is waiting to be destroyed.
    pub(crate) fn is_destroying(&self, slot: u32) -> bool {
        self.records[slot as usize].state == SlotState::Destroying
    }

    /// Release a slot and bump its generation.
    pub(crate) fn free(&mut self, slot: u32) {
        let record = &mut self.records[slot as usize];
        assert_ne!(record.state, SlotState::Free, "archetype graph corruption: double free of slot {}", slot);
        record.state = SlotState::Free;
        record.generation = record.generation.wrapping_add(1);
        record.touched.clear();
        record.location = None;
        self.free.push(slot);
        self.alive -= 1;
    }

    /// Iterate over the handles of all live entities, in slot order.
    pub fn iter(&self) -> impl Iterator<Item=EntityID> + '_ {
        let world = self.world;
        self.records.iter()
            .enumerate()
            .filter(|(_, r)| r.state == SlotState::Alive)
            .map(move |(index, r)| EntityID::new(index as u32, r.generation, world))
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_allocate_and_free() {
        let mut entities = Entities::new(WorldID::unique(), 4);
        let a = entities.allocate();
        let b = entities.allocate();

        assert_ne!(a, b);
        assert!(entities.is_alive(a));
        assert_eq!(entities.len(), 2);

        entities.free(a.index());
        assert!(!entities.is_alive(a));
        assert_eq!(entities.validate(a), Err(EntityError::StaleHandle(a)));

        let c = entities.allocate();
        assert_eq!(c.index(), a.index());
        assert!(c.generation() > a.generation());
        assert!(!entities.is_alive(a));
        assert!(entities.is_alive(c));
    }

    #[test]
    fn test_foreign_handle() {
        let mut first = Entities::new(WorldID::unique(), 4);
        let second = Entities::new(WorldID::unique(), 4);
        let id = first.allocate();

        assert!(matches!(second.validate(id), Err(EntityError::ForeignEntity { .. })));
    }

    #[test]
    fn test_new_entities_are_unplaced() {
        let mut entities = Entities::new(WorldID::unique(), 4);
        let id = entities.allocate();
        assert_eq!(entities.location(id.index()), None);
        assert_eq!(entities.take_dirty(), vec![id.index()]);

        let location = EntityLocation { archetype: 3, row: 1 };
        entities.set_location(id.index(), location);
        assert_eq!(entities.location(id.index()), Some(location));

        entities.free(id.index());
        let reused = entities.allocate();
        assert_eq!(reused.index(), id.index());
        assert_eq!(entities.location(reused.index()), None);
    }

    #[test]
    fn test_destroying_is_not_alive() {
        let mut entities = Entities::new(WorldID::unique(), 4);
        let id = entities.allocate();
        entities.mark_destroyed(id.index());

        assert!(!entities.is_alive(id));
        assert!(entities.is_destroying(id.index()));
        assert_eq!(entities.dirty_count(), 1);
    }

    #[test]
    fn test_dirty_is_idempotent() {
        let mut entities = Entities::new(WorldID::unique(), 1);
        for _ in 0..3 {
            entities.allocate();
        }
        assert_eq!(entities.take_dirty(), vec![0, 1, 2]);

        entities.mark_dirty(2);
        entities.mark_dirty(2);
        entities.mark_dirty(0);
        assert_eq!(entities.take_dirty(), vec![2, 0]);
        assert!(!entities.has_dirty());

        entities.mark_dirty(2);
        assert_eq!(entities.dirty_count(), 1);
    }

    #[test]
    fn test_live_handles_are_unique() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut entities = Entities::new(WorldID::unique(), 16);
        let mut live: Vec<EntityID> = Vec::new();
        let mut dead: Vec<EntityID> = Vec::new();

        for _ in 0..5000 {
            if live.is_empty() || rng.gen_bool(0.6) {
                live.push(entities.allocate());
            } else {
                let id = live.swap_remove(rng.gen_range(0..live.len()));
                entities.free(id.index());
                dead.push(id);
            }

            let unique: HashSet<_> = live.iter().map(|id| (id.index(), id.generation())).collect();
            assert_eq!(unique.len(), live.len());
        }

        assert_eq!(entities.len(), live.len());
        assert!(live.iter().all(|id| entities.is_alive(*id)));
        assert!(dead.iter().all(|id| !entities.is_alive(*id)));
        assert_eq!(entities.iter().count(), live.len());
    }
}
