//! # Dependency Injection
//!
//! Values registered on the [`WorldBuilder`](super::WorldBuilder) are keyed
//! by their Rust type. While the world is being built, each system
//! constructor receives an [`Injector`] and pulls what it needs:
//!
//! ```rust,ignore
//! SystemDescriptor::interval(|inject| {
//!     Ok(SpawnSystem {
//!         rules: inject.resolve::<SpawnRules>()?,
//!         positions: inject.mapper::<Position>(),
//!     })
//! })
//! ```
//!
//! Resolution is explicit and happens once; systems keep what they got.
//! Shared mutable state is injected as a shared handle (`Rc<RefCell<_>>`).

use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::component::Component;
use super::family::{FamilyDef, FamilyId};
use super::mapper::ComponentMapper;
use super::store::EntityStore;
use crate::error::{EcsError, EcsResult};

struct Injectable {
    name: &'static str,
    value: Box<dyn Any>,
}

/// Values available to system constructors, one per type.
#[derive(Default)]
pub struct Injectables {
    values: HashMap<TypeId, Injectable>,
    /// Registration order, for stable error reports.
    order: Vec<TypeId>,
}

impl Injectables {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under its type.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateInjectable`] if a value of the same type
    /// is already registered; the existing value is kept.
    pub fn insert<T: Clone + 'static>(&mut self, value: T) -> EcsResult<()> {
        let type_id = TypeId::of::<T>();
        if self.values.contains_key(&type_id) {
            return Err(EcsError::DuplicateInjectable {
                injectable: type_name::<T>(),
            });
        }

        self.values.insert(
            type_id,
            Injectable {
                name: type_name::<T>(),
                value: Box::new(value),
            },
        );
        self.order.push(type_id);
        Ok(())
    }

    /// Returns `true` if a value of type `T` is registered.
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn get<T: 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|injectable| injectable.value.downcast_ref())
    }

    /// Names of the values whose type is not in `used`, in registration
    /// order.
    pub(crate) fn unused(&self, used: &HashSet<TypeId>) -> Vec<&'static str> {
        self.order
            .iter()
            .filter(|type_id| !used.contains(type_id))
            .filter_map(|type_id| self.values.get(type_id))
            .map(|injectable| injectable.name)
            .collect()
    }
}

impl fmt::Debug for Injectables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.order
                    .iter()
                    .filter_map(|type_id| self.values.get(type_id))
                    .map(|injectable| injectable.name),
            )
            .finish()
    }
}

/// Handed to a system constructor while the world is being built.
pub struct Injector<'a> {
    system: &'static str,
    injectables: &'a Injectables,
    used: &'a mut HashSet<TypeId>,
    store: &'a mut EntityStore,
}

impl<'a> Injector<'a> {
    pub(crate) fn new(
        system: &'static str,
        injectables: &'a Injectables,
        used: &'a mut HashSet<TypeId>,
        store: &'a mut EntityStore,
    ) -> Self {
        Self {
            system,
            injectables,
            used,
            store,
        }
    }

    /// Name of the system being built.
    #[must_use]
    pub fn system(&self) -> &'static str {
        self.system
    }

    /// Returns a clone of the injected value of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnresolvedDependency`] if no value of type `T`
    /// was injected.
    pub fn resolve<T: Clone + 'static>(&mut self) -> EcsResult<T> {
        let value = self
            .injectables
            .get::<T>()
            .ok_or(EcsError::UnresolvedDependency {
                system: self.system,
                dependency: type_name::<T>(),
            })?;
        self.used.insert(TypeId::of::<T>());
        Ok(value.clone())
    }

    /// Like [`resolve`](Self::resolve), for optional dependencies.
    pub fn try_resolve<T: Clone + 'static>(&mut self) -> Option<T> {
        let value = self.injectables.get::<T>()?;
        self.used.insert(TypeId::of::<T>());
        Some(value.clone())
    }

    /// Mapper for component `C`. Always available.
    pub fn mapper<C: Component>(&mut self) -> ComponentMapper<C> {
        self.store.mapper()
    }

    /// Registers (or finds) a family, for systems that watch more than the
    /// family they iterate.
    pub fn family(&mut self, def: &FamilyDef) -> FamilyId {
        self.store.family(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Gravity(f32);

    #[derive(Clone, Debug, PartialEq)]
    struct Seed(u64);

    #[test]
    fn test_duplicate_injectable() {
        let mut injectables = Injectables::new();
        injectables.insert(Gravity(9.8)).unwrap();

        let err = injectables.insert(Gravity(1.6)).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateInjectable { injectable } if injectable.ends_with("Gravity")));
        assert_eq!(injectables.get::<Gravity>(), Some(&Gravity(9.8)));
        assert_eq!(injectables.len(), 1);
    }

    #[test]
    fn test_resolve_marks_used() {
        let mut injectables = Injectables::new();
        injectables.insert(Gravity(9.8)).unwrap();
        injectables.insert(Seed(7)).unwrap();
        assert!(injectables.contains::<Seed>());

        let mut used = HashSet::new();
        let mut store = EntityStore::new(4);
        let mut injector = Injector::new("Physics", &injectables, &mut used, &mut store);

        assert_eq!(injector.resolve::<Gravity>(), Ok(Gravity(9.8)));
        assert_eq!(injector.system(), "Physics");

        let unused = injectables.unused(&used);
        assert_eq!(unused.len(), 1);
        assert!(unused[0].ends_with("Seed"));
    }

    #[test]
    fn test_unresolved_dependency() {
        let injectables = Injectables::new();
        let mut used = HashSet::new();
        let mut store = EntityStore::new(4);
        let mut injector = Injector::new("Spawner", &injectables, &mut used, &mut store);

        assert_eq!(
            injector.resolve::<Seed>().unwrap_err(),
            EcsError::UnresolvedDependency {
                system: "Spawner",
                dependency: type_name::<Seed>(),
            }
        );
        assert_eq!(injector.try_resolve::<Seed>(), None);
        assert!(used.is_empty());
    }
}
