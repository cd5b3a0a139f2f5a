//! Dense per-component-type storage.
//!
//! A `Stash<T>` maps entity slots to values of `T`. Values are packed densely,
//! and removing one swaps the last value into its place. Zero-sized components
//! only need a membership bit per slot, so they use a separate tag layout.
//!
//! Removal happens in two steps. `mark_removed` hides the value from reads
//! straight away; `flush` drops it physically once the owning world commits.

use bit_vec::BitVec;

use crate::component::Component;
use crate::entity::{Entities, EntityID};
use crate::error::{EntityError, Result};

const NO_VALUE: u32 = u32::MAX;

fn bit(bits: &BitVec, index: usize) -> bool {
    bits.get(index).unwrap_or(false)
}

fn set_bit(bits: &mut BitVec, index: usize, value: bool) {
    if index >= bits.len() {
        if !value {
            return;
        }
        let grow_by = (index + 1).max(bits.len() * 2) - bits.len();
        bits.grow(grow_by, false);
    }
    bits.set(index, value);
}

enum Storage<T> {
    Data {
        sparse: Vec<u32>,
        slots: Vec<u32>,
        values: Vec<T>,
    },
    Tag {
        members: BitVec,
        count: usize,
        instance: Option<T>,
    },
}

/// Storage for every value of one component type in a world.
pub struct Stash<T: Component> {
    storage: Storage<T>,
    removed: BitVec,
    pending: usize,
}

impl<T: Component> Stash<T> {
    /// Create an empty stash with room for `capacity` values.
    pub fn new(capacity: usize) -> Stash<T> {
        let storage = if std::mem::size_of::<T>() == 0 {
            Storage::Tag {
                members: BitVec::new(),
                count: 0,
                instance: None,
            }
        } else {
            Storage::Data {
                sparse: Vec::new(),
                slots: Vec::with_capacity(capacity),
                values: Vec::with_capacity(capacity),
            }
        };

        Stash {
            storage,
            removed: BitVec::new(),
            pending: 0,
        }
    }

    /// Returns true if this stash only tracks membership.
    pub fn is_tag(&self) -> bool {
        matches!(self.storage, Storage::Tag { .. })
    }

    /// Returns true if a value is physically stored for `slot`, even if it is
    /// pending removal.
    pub fn contains(&self, slot: u32) -> bool {
        match &self.storage {
            Storage::Data { sparse, .. } =>
                sparse.get(slot as usize).map_or(false, |&idx| idx != NO_VALUE),
            Storage::Tag { members, .. } => bit(members, slot as usize),
        }
    }

    /// Returns true if `slot` has a value which is not pending removal.
    pub fn has(&self, slot: u32) -> bool {
        self.contains(slot) && !bit(&self.removed, slot as usize)
    }

    /// Returns true if the value of `slot` is waiting to be flushed.
    pub fn is_pending_removal(&self, slot: u32) -> bool {
        bit(&self.removed, slot as usize)
    }

    /// Return the number of values which are not pending removal.
    pub fn len(&self) -> usize {
        self.stored() - self.pending
    }

    /// Returns true if no values are visible.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stored(&self) -> usize {
        match &self.storage {
            Storage::Data { values, .. } => values.len(),
            Storage::Tag { count, .. } => *count,
        }
    }

    /// Get the value of a slot.
    pub fn get(&self, slot: u32) -> Option<&T> {
        if !self.has(slot) {
            return None;
        }

        match &self.storage {
            Storage::Data { sparse, values, .. } => values.get(sparse[slot as usize] as usize),
            Storage::Tag { instance, .. } => instance.as_ref(),
        }
    }

    /// Get a mutable reference to the value of a slot.
    pub fn get_mut(&mut self, slot: u32) -> Option<&mut T> {
        if !self.has(slot) {
            return None;
        }

        match &mut self.storage {
            Storage::Data { sparse, values, .. } => values.get_mut(sparse[slot as usize] as usize),
            Storage::Tag { instance, .. } => instance.as_mut(),
        }
    }

    /// Store a value for a slot, overwriting any existing value.
    ///
    /// Returns true if the value was not visible before this call.
    pub fn insert(&mut self, slot: u32, value: T) -> bool {
        let was_visible = self.has(slot);
        if self.is_pending_removal(slot) {
            set_bit(&mut self.removed, slot as usize, false);
            self.pending -= 1;
        }

        match &mut self.storage {
            Storage::Data { sparse, slots, values } => {
                let s = slot as usize;
                if s >= sparse.len() {
                    sparse.resize(s + 1, NO_VALUE);
                }

                match sparse[s] {
                    NO_VALUE => {
                        sparse[s] = values.len() as u32;
                        slots.push(slot);
                        values.push(value);
                    }
                    idx => values[idx as usize] = value,
                }
            }
            Storage::Tag { members, count, instance } => {
                if !bit(members, slot as usize) {
                    set_bit(members, slot as usize, true);
                    *count += 1;
                }
                instance.get_or_insert(value);
            }
        }

        !was_visible
    }

    /// Hide the value of a slot until it is flushed.
    ///
    /// Returns false if there was no visible value.
    pub fn mark_removed(&mut self, slot: u32) -> bool {
        if !self.has(slot) {
            return false;
        }

        set_bit(&mut self.removed, slot as usize, true);
        self.pending += 1;
        true
    }

    /// Physically drop the value of a slot if it is pending removal.
    pub fn flush(&mut self, slot: u32) {
        if self.is_pending_removal(slot) {
            self.erase(slot);
        }
    }

    /// Physically drop the value of a slot, pending or not.
    pub fn erase(&mut self, slot: u32) {
        if self.is_pending_removal(slot) {
            set_bit(&mut self.removed, slot as usize, false);
            self.pending -= 1;
        }

        match &mut self.storage {
            Storage::Data { sparse, slots, values } => {
                let s = slot as usize;
                let idx = match sparse.get(s) {
                    Some(&idx) if idx != NO_VALUE => idx as usize,
                    _ => return,
                };

                values.swap_remove(idx);
                slots.swap_remove(idx);
                if let Some(&moved) = slots.get(idx) {
                    sparse[moved as usize] = idx as u32;
                }
                sparse[s] = NO_VALUE;
            }
            Storage::Tag { members, count, .. } => {
                if bit(members, slot as usize) {
                    members.set(slot as usize, false);
                    *count -= 1;
                }
            }
        }
    }

    /// Drop every value.
    pub fn clear(&mut self) {
        match &mut self.storage {
            Storage::Data { sparse, slots, values } => {
                sparse.clear();
                slots.clear();
                values.clear();
            }
            Storage::Tag { members, count, instance } => {
                members.clear();
                *count = 0;
                *instance = None;
            }
        }
        self.removed.clear();
        self.pending = 0;
    }

    /// Iterate over the visible values and the slots owning them.
    pub fn iter(&self) -> Box<dyn Iterator<Item=(u32, &T)> + '_> {
        match &self.storage {
            Storage::Data { slots, values, .. } => Box::new(
                slots.iter()
                    .copied()
                    .zip(values.iter())
                    .filter(move |(slot, _)| !bit(&self.removed, *slot as usize))),
            Storage::Tag { members, instance, .. } => match instance.as_ref() {
                Some(instance) => Box::new(
                    members.iter()
                        .enumerate()
                        .filter(move |&(slot, present)| present && !bit(&self.removed, slot))
                        .map(move |(slot, _)| (slot as u32, instance))),
                None => Box::new(std::iter::empty()),
            },
        }
    }
}

/// The type-erased view a world keeps of each stash.
pub(crate) trait ErasedStash: Send + Sync {
    fn has(&self, slot: u32) -> bool;
    fn flush(&mut self, slot: u32);
    fn erase(&mut self, slot: u32);
    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

impl<T: Component> ErasedStash for Stash<T> {
    fn has(&self, slot: u32) -> bool { Stash::has(self, slot) }
    fn flush(&mut self, slot: u32) { Stash::flush(self, slot) }
    fn erase(&mut self, slot: u32) { Stash::erase(self, slot) }
    fn as_any(&self) -> &dyn std::any::Any { self }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
}

fn not_found<T: Component>(entity: EntityID) -> EntityError {
    EntityError::ComponentNotFound {
        entity,
        component: T::type_id(),
    }
}

/// Read access to the stash of one component type.
pub struct StashRef<'w, T: Component> {
    entities: &'w Entities,
    stash: Option<&'w Stash<T>>,
}

impl<'w, T: Component> StashRef<'w, T> {
    pub(crate) fn new(entities: &'w Entities, stash: Option<&'w Stash<T>>) -> StashRef<'w, T> {
        StashRef { entities, stash }
    }

    /// Get the value of `T` on an entity.
    pub fn get(&self, id: EntityID) -> Result<&'w T> {
        let slot = self.entities.validate(id)?;
        self.stash
            .and_then(|s| s.get(slot))
            .ok_or_else(|| not_found::<T>(id))
    }

    /// Returns true if the entity is alive and has a `T`.
    pub fn has(&self, id: EntityID) -> bool {
        match self.entities.validate(id) {
            Ok(slot) => self.stash.map_or(false, |s| s.has(slot)),
            Err(_) => false,
        }
    }

    /// Return the number of visible values.
    pub fn len(&self) -> usize {
        self.stash.map_or(0, Stash::len)
    }

    /// Returns true if there are no visible values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over live entities and their values, in storage order.
    pub fn iter(&self) -> impl Iterator<Item=(EntityID, &'w T)> + 'w {
        let entities = self.entities;
        self.stash
            .into_iter()
            .flat_map(Stash::iter)
            .filter(move |(slot, _)| !entities.is_destroying(*slot))
            .map(move |(slot, value)| (entities.id_at(slot), value))
    }
}

/// Write access to the stash of one component type.
///
/// Adding or removing a value records the change on the entity; the entity
/// moves to its new archetype at the next commit.
pub struct StashMut<'w, T: Component> {
    entities: &'w mut Entities,
    stash: &'w mut Stash<T>,
}

impl<'w, T: Component> StashMut<'w, T> {
    pub(crate) fn new(entities: &'w mut Entities, stash: &'w mut Stash<T>) -> StashMut<'w, T> {
        StashMut { entities, stash }
    }

    /// Set the value of `T` on an entity, overwriting any existing value.
    pub fn set(&mut self, id: EntityID, value: T) -> Result<()> {
        let slot = self.entities.validate(id)?;
        if self.stash.insert(slot, value) {
            self.entities.touch(slot, T::type_id());
        }
        Ok(())
    }

    /// Get the value of `T` on an entity, inserting the default if it is missing.
    pub fn add(&mut self, id: EntityID) -> Result<&mut T>
        where T: Default
    {
        let slot = self.entities.validate(id)?;
        if !self.stash.has(slot) {
            self.stash.insert(slot, T::default());
            self.entities.touch(slot, T::type_id());
        }
        self.stash.get_mut(slot).ok_or_else(|| not_found::<T>(id))
    }

    /// Get the value of `T` on an entity.
    pub fn get(&self, id: EntityID) -> Result<&T> {
        let slot = self.entities.validate(id)?;
        self.stash.get(slot).ok_or_else(|| not_found::<T>(id))
    }

    /// Get a mutable reference to the value of `T` on an entity.
    pub fn get_mut(&mut self, id: EntityID) -> Result<&mut T> {
        let slot = self.entities.validate(id)?;
        self.stash.get_mut(slot).ok_or_else(|| not_found::<T>(id))
    }

    /// Remove `T` from an entity.
    ///
    /// Reads stop seeing the value immediately. The storage is reclaimed at the
    /// next commit.
    pub fn remove(&mut self, id: EntityID) -> Result<()> {
        let slot = self.entities.validate(id)?;
        if self.stash.mark_removed(slot) {
            self.entities.touch(slot, T::type_id());
            Ok(())
        } else {
            Err(not_found::<T>(id))
        }
    }

    /// Returns true if the entity is alive and has a `T`.
    pub fn has(&self, id: EntityID) -> bool {
        match self.entities.validate(id) {
            Ok(slot) => self.stash.has(slot),
            Err(_) => false,
        }
    }

    /// Return the number of visible values.
    pub fn len(&self) -> usize {
        self.stash.len()
    }

    /// Returns true if there are no visible values.
    pub fn is_empty(&self) -> bool {
        self.stash.is_empty()
    }
}
