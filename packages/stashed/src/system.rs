//! A minimal system loop.
//!
//! Systems are run in the order they were added, and the world is committed
//! after each one so that the next system sees its structural changes.
//! `Systems` runs whole groups by ascending order key.

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};

use crate::world::World;

/// A unit of game logic run against a world.
pub trait System: Send {
    /// Called once before the first update.
    fn on_awake(&mut self, _world: &mut World) {}

    /// Called every update.
    fn on_update(&mut self, world: &mut World, delta: f32);

    /// Called once when the group is disposed.
    fn on_dispose(&mut self, _world: &mut World) {}
}

/// A boxed, type-erased system.
pub type BoxSystem = Box<dyn System + 'static>;

struct SystemEntry {
    system: BoxSystem,
    awake: bool,
}

/// An ordered list of systems.
#[derive(Default)]
pub struct SystemGroup {
    systems: Vec<SystemEntry>,
}

impl SystemGroup {
    /// Create an empty system group.
    pub fn new() -> SystemGroup {
        SystemGroup::default()
    }

    /// Add a system to the end of the group.
    pub fn add(&mut self, system: impl System + 'static) -> &mut SystemGroup {
        self.add_boxed(Box::new(system))
    }

    /// Add an already boxed system to the end of the group.
    pub fn add_boxed(&mut self, system: BoxSystem) -> &mut SystemGroup {
        self.systems.push(SystemEntry { system, awake: false });
        self
    }

    /// Add a system to the end of the group.
    pub fn with(mut self, system: impl System + 'static) -> SystemGroup {
        self.add(system);
        self
    }

    /// Move every system of `other` to the end of this group.
    pub fn append(&mut self, mut other: SystemGroup) -> &mut SystemGroup {
        self.systems.append(&mut other.systems);
        self
    }

    /// Return the number of systems in this group.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns true if this group has no systems.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Run every system once, committing the world after each.
    ///
    /// Systems added since the last update are woken first.
    pub fn update(&mut self, world: &mut World, delta: f32) {
        let mut woke = false;
        for entry in self.systems.iter_mut().filter(|e| !e.awake) {
            entry.system.on_awake(world);
            entry.awake = true;
            woke = true;
        }
        if woke {
            world.commit();
        }

        for entry in self.systems.iter_mut() {
            entry.system.on_update(world, delta);
            world.commit();
        }
    }

    /// Dispose every woken system and empty the group.
    pub fn dispose(&mut self, world: &mut World) {
        for mut entry in self.systems.drain(..) {
            if entry.awake {
                entry.system.on_dispose(world);
            }
        }
        world.commit();
    }
}

impl Debug for SystemGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemGroup")
            .field("systems", &self.systems.len())
            .finish()
    }
}

/// System groups keyed by the order they run in.
///
/// Groups added with `add_group` are held back until the start of the next
/// update, so a group never joins an update which is already running.
#[derive(Default)]
pub struct Systems {
    groups: BTreeMap<i32, SystemGroup>,
    pending: Vec<(i32, SystemGroup)>,
}

impl Systems {
    /// Create an empty set of groups.
    pub fn new() -> Systems {
        Systems::default()
    }

    /// Queue a group to run at `order`.
    ///
    /// Lower orders run first. A group added at an order which is already
    /// taken runs after the systems already there.
    pub fn add_group(&mut self, order: i32, group: SystemGroup) -> &mut Systems {
        self.pending.push((order, group));
        self
    }

    /// Queue a group to run at `order`.
    pub fn with_group(mut self, order: i32, group: SystemGroup) -> Systems {
        self.add_group(order, group);
        self
    }

    /// Return the number of groups, including ones not yet started.
    pub fn len(&self) -> usize {
        let mut queued: Vec<i32> = self.pending.iter()
            .map(|(order, _)| *order)
            .filter(|order| !self.groups.contains_key(order))
            .collect();
        queued.sort_unstable();
        queued.dedup();
        self.groups.len() + queued.len()
    }

    /// Returns true if there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.pending.is_empty()
    }

    /// Start any queued groups, then update every group in order.
    pub fn update(&mut self, world: &mut World, delta: f32) {
        for (order, group) in self.pending.drain(..) {
            tracing::debug!(order, systems = group.len(), "starting system group");
            self.groups.entry(order).or_default().append(group);
        }

        for group in self.groups.values_mut() {
            group.update(world, delta);
        }
    }

    /// Dispose every group in order.
    ///
    /// Queued groups were never woken and are dropped.
    pub fn dispose(&mut self, world: &mut World) {
        self.pending.clear();
        for (_, mut group) in std::mem::take(&mut self.groups) {
            group.dispose(world);
        }
    }
}

impl Debug for Systems {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Systems")
            .field("groups", &self.groups.keys().collect::<Vec<_>>())
            .field("pending", &self.pending.len())
            .finish()
    }
}
