//! World construction settings.

/// The number of entity slots reserved up front.
pub const DEFAULT_ENTITY_CAPACITY: usize = 128;
/// The number of values each new stash reserves.
pub const DEFAULT_STASH_CAPACITY: usize = 16;
/// The number of archetypes reserved up front.
pub const DEFAULT_ARCHETYPE_CAPACITY: usize = 16;

/// Settings used when creating a `World`.
///
/// ```
/// use stashed::{World, WorldConfig};
///
/// let world = World::with_config(WorldConfig::new()
///     .with_name("menu")
///     .with_entity_capacity(1024));
/// assert_eq!(world.name(), "menu");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldConfig {
    pub(crate) name: Option<String>,
    pub(crate) entity_capacity: usize,
    pub(crate) stash_capacity: usize,
    pub(crate) archetype_capacity: usize,
}

impl WorldConfig {
    /// Create the default configuration.
    pub fn new() -> WorldConfig {
        WorldConfig::default()
    }

    /// Give the world a human-readable name.
    pub fn with_name(mut self, name: impl Into<String>) -> WorldConfig {
        self.name = Some(name.into());
        self
    }

    /// Reserve room for this many entities.
    pub fn with_entity_capacity(mut self, capacity: usize) -> WorldConfig {
        self.entity_capacity = capacity;
        self
    }

    /// Reserve room for this many values in each stash.
    pub fn with_stash_capacity(mut self, capacity: usize) -> WorldConfig {
        self.stash_capacity = capacity;
        self
    }

    /// Reserve room for this many archetypes.
    pub fn with_archetype_capacity(mut self, capacity: usize) -> WorldConfig {
        self.archetype_capacity = capacity;
        self
    }

    /// Return the name given to worlds built from this config, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Return the number of entity slots reserved up front.
    pub fn entity_capacity(&self) -> usize {
        self.entity_capacity
    }

    /// Return the number of values each new stash reserves.
    pub fn stash_capacity(&self) -> usize {
        self.stash_capacity
    }

    /// Return the number of archetypes reserved up front.
    pub fn archetype_capacity(&self) -> usize {
        self.archetype_capacity
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            name: None,
            entity_capacity: DEFAULT_ENTITY_CAPACITY,
            stash_capacity: DEFAULT_STASH_CAPACITY,
            archetype_capacity: DEFAULT_ARCHETYPE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_builder_sets_getters() {
        let config = WorldConfig::new();
        assert_eq!(config.name(), None);
        assert_eq!(config.entity_capacity(), DEFAULT_ENTITY_CAPACITY);

        let config = config
            .with_name("level")
            .with_entity_capacity(8)
            .with_stash_capacity(4)
            .with_archetype_capacity(2);
        assert_eq!(config.name(), Some("level"));
        assert_eq!(config.entity_capacity(), 8);
        assert_eq!(config.stash_capacity(), 4);
        assert_eq!(config.archetype_capacity(), 2);
    }
}
