//! Base definitions for components.
//!
//! All entities in this library are built out of components. There is no intrinsic
//! value to an entity. This module provides means of defining and registering
//! component types.
//!
//! Each component type is allocated a unique ID the first time it is used. There
//! is a macro (`component`) to help you assign this unique ID.
//!
//! Every `ComponentTypeID` also carries a 64-bit value derived from its index by a
//! bijective mixer. Archetype IDs are formed by XORing these values together, so
//! two distinct component types can never produce the same value.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::{Lazy, OnceCell};

/// A component type ID which is unique for a specific component type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentTypeID(usize);

struct ComponentRegistry {
    component_types: Vec<Arc<ComponentRegistration>>,
    by_type: HashMap<TypeId, ComponentTypeID>,
    by_bits: HashMap<u64, ComponentTypeID>,
}

static COMPONENT_REGISTRY: Lazy<RwLock<ComponentRegistry>> = Lazy::new(|| {
    RwLock::new(ComponentRegistry {
        component_types: Vec::new(),
        by_type: HashMap::new(),
        by_bits: HashMap::new(),
    })
});

/// Spread a dense index over all 64 bits.
///
/// Every step is invertible, so distinct indices give distinct values.
fn disperse(index: usize) -> u64 {
    let mut z = (index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl ComponentTypeID {
    /// Register `T` and return its new globally unique `ComponentTypeID`.
    ///
    /// # Panics
    /// If `T` has already been registered. Use the `component` macro, which
    /// registers each type exactly once.
    pub fn register<T: Component>() -> ComponentTypeID {
        let mut r = COMPONENT_REGISTRY.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = r.by_type.get(&TypeId::of::<T>()) {
            panic!("duplicate component type registration: {} is already {:?}",
                   type_name::<T>(), existing.0);
        }

        let id = ComponentTypeID(r.component_types.len());
        let registration = ComponentRegistration::new::<T>(id);
        if let Some(other) = r.by_bits.insert(registration.bits, id) {
            panic!("duplicate component type registration: {} collides with #{}",
                   type_name::<T>(), other.0);
        }

        r.by_type.insert(TypeId::of::<T>(), id);
        r.component_types.push(Arc::new(registration));
        id
    }

    /// Fetch the registration for this `ComponentTypeID` returning None if it is
    /// missing from the registry.
    fn safe_registration(&self) -> Option<Arc<ComponentRegistration>> {
        let r = COMPONENT_REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
        r.component_types.get(self.0).cloned()
    }

    /// Fetch the registration information for a component type.
    ///
    /// # Panics
    /// If this ID was not produced by `register`.
    pub fn registration(&self) -> Arc<ComponentRegistration> {
        match self.safe_registration() {
            Some(registration) => registration,
            None => panic!("component type #{} is not registered", self.0),
        }
    }

    /// Return the dense index of this component type.
    pub fn index(&self) -> usize {
        self.0
    }

    /// Return the dispersed value used to build archetype IDs.
    pub fn bits(&self) -> u64 {
        disperse(self.0)
    }

    /// Return the name of this component type.
    pub fn name(&self) -> &'static str {
        self.registration().name()
    }

    /// Returns true if this component type carries no data.
    pub fn is_tag(&self) -> bool {
        self.registration().is_tag()
    }
}

impl Debug for ComponentTypeID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.safe_registration() {
            Some(reg) => write!(f, "{}", reg.name()),
            None => write!(f, "ComponentTypeID(#{} missing)", self.0),
        }
    }
}

/// A struct for lazily assigning unique `ComponentTypeID`s.
pub struct AutoComponentTypeID(OnceCell<ComponentTypeID>);

impl AutoComponentTypeID {
    /// Create a new `AutoComponentTypeID`.
    pub const fn new() -> AutoComponentTypeID {
        AutoComponentTypeID(OnceCell::new())
    }

    /// Get the `ComponentTypeID` this struct wraps, registering `T` on first use.
    pub fn get<T: Component>(&self) -> ComponentTypeID {
        *self.0.get_or_init(ComponentTypeID::register::<T>)
    }
}

impl Default for AutoComponentTypeID {
    fn default() -> Self {
        AutoComponentTypeID::new()
    }
}

/// The component trait is implemented on all component types.
///
/// Implement it with the `component` macro rather than by hand.
pub trait Component: Send + Sync + 'static {
    /// Get the unique type ID of this component.
    fn type_id() -> ComponentTypeID;
}

/// A ComponentRegistration is the dynamic description of a type implementing Component.
#[derive(Clone, Copy)]
pub struct ComponentRegistration {
    type_id: ComponentTypeID,
    bits: u64,
    size: usize,
    name: &'static str,
}

impl ComponentRegistration {
    /// Create a ComponentRegistration for a static type.
    fn new<T: Component>(type_id: ComponentTypeID) -> ComponentRegistration {
        ComponentRegistration {
            type_id,
            bits: disperse(type_id.0),
            size: std::mem::size_of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Return the unique type ID for this `ComponentRegistration`.
    pub fn type_id(&self) -> ComponentTypeID {
        self.type_id
    }

    /// Return the size of a single instance of this component.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns true if instances of this component are zero-sized.
    pub fn is_tag(&self) -> bool {
        self.size == 0
    }

    /// Get the name of this component type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Debug for ComponentRegistration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<ComponentRegistration {} #{}>", self.name, self.type_id.0)
    }
}

/// Implement the `Component` trait on a type.
#[macro_export]
macro_rules! component {
    ($i:ident) => {
        const _: () = {
            static INIT_TYPE: $crate::component::AutoComponentTypeID = $crate::component::AutoComponentTypeID::new();

            impl $crate::component::Component for $i {
                fn type_id() -> $crate::component::ComponentTypeID {
                    INIT_TYPE.get::<$i>()
                }
            }

            ()
        };
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_uniqueness() {
        struct A;
        struct B;

        component!(A);
        component!(B);

        assert_ne!(A::type_id(), B::type_id());
        assert_ne!(A::type_id().bits(), B::type_id().bits());
        assert_eq!(A::type_id(), A::type_id());
    }

    #[test]
    fn test_registration() {
        #[derive(Debug)]
        struct Health(u32);
        struct Marker;

        component!(Health);
        component!(Marker);

        let health = Health::type_id().registration();
        assert_eq!(health.type_id(), Health::type_id());
        assert_eq!(health.size(), 4);
        assert!(!health.is_tag());
        assert!(health.name().ends_with("Health"));
        assert!(Marker::type_id().is_tag());
    }

    #[test]
    fn test_disperse_is_injective_on_small_indices() {
        let mut seen = std::collections::HashSet::new();
        for index in 0..10_000 {
            let bits = disperse(index);
            assert_ne!(bits, 0);
            assert!(seen.insert(bits));
        }
    }

    #[test]
    #[should_panic(expected = "duplicate component type registration")]
    fn test_duplicate_registration() {
        struct Twice;
        component!(Twice);

        let _ = Twice::type_id();
        ComponentTypeID::register::<Twice>();
    }
}
