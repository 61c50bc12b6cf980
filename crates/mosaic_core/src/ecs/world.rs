//! # ECS World
//!
//! The facade tying an [`EntityStore`] to a [`Scheduler`].
//!
//! A world is assembled once by a [`WorldBuilder`]: injectables and system
//! descriptors are declared, then [`build`](WorldBuilder::build) constructs
//! every system in declaration order. Any configuration error aborts the
//! build; there is no partially built world.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut world = World::builder()
//!     .inject(Gravity(9.81))?
//!     .system(SystemDescriptor::iterating(
//!         FamilyDef::new().all_of::<Position>().all_of::<Physics>(),
//!         |inject| PhysicsSystem::new(inject),
//!     ))?
//!     .build()?;
//!
//! let player = world.create(|e| {
//!     e.add(Position::default());
//!     e.add(Physics::default());
//! });
//! world.update(1.0 / 60.0)?;
//! ```

use std::any::{type_name, Any};
use std::collections::HashSet;

use super::component::Component;
use super::entity::Entity;
use super::family::{FamilyDef, FamilyId};
use super::inject::{Injectables, Injector};
use super::mapper::ComponentMapper;
use super::scheduler::Scheduler;
use super::store::{EntityEditor, EntityStore};
use super::system::SystemDescriptor;
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};

/// Declares the injectables and systems of a world.
#[derive(Debug, Default)]
pub struct WorldBuilder {
    config: WorldConfig,
    injectables: Injectables,
    systems: Vec<SystemDescriptor>,
}

impl WorldBuilder {
    /// Starts a builder with the given configuration.
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            injectables: Injectables::new(),
            systems: Vec::new(),
        }
    }

    /// Makes `value` available to system constructors, keyed by its type.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateInjectable`] if a value of the same type
    /// was already injected.
    pub fn inject<T: Clone + 'static>(mut self, value: T) -> EcsResult<Self> {
        self.injectables.insert(value)?;
        Ok(self)
    }

    /// Appends a system. Systems run in the order they are declared.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateSystem`] if a system of the same type was
    /// already declared.
    pub fn system(mut self, descriptor: SystemDescriptor) -> EcsResult<Self> {
        if self
            .systems
            .iter()
            .any(|declared| declared.type_id() == descriptor.type_id())
        {
            return Err(EcsError::DuplicateSystem {
                system: descriptor.name(),
            });
        }
        self.systems.push(descriptor);
        Ok(self)
    }

    /// Constructs every system and returns the world.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidConfig`] for a bad config or fixed interval.
    /// - [`EcsError::UnresolvedDependency`] when a constructor asks for a
    ///   value that was never injected.
    /// - [`EcsError::UnusedInjectables`] when injected values were never
    ///   asked for.
    /// - Any error returned by a system constructor.
    pub fn build(self) -> EcsResult<World> {
        self.config.validate()?;

        let mut store = EntityStore::new(self.config.entity_capacity);
        let mut used = HashSet::new();
        let mut units = Vec::with_capacity(self.systems.len());

        for descriptor in self.systems {
            let mut injector =
                Injector::new(descriptor.name(), &self.injectables, &mut used, &mut store);
            units.push(descriptor.instantiate(&mut injector)?);
        }

        let unused = self.injectables.unused(&used);
        if !unused.is_empty() {
            return Err(EcsError::UnusedInjectables { injectables: unused });
        }

        tracing::info!(
            "world built: {} systems, {} injectables, {} component types, {} families",
            units.len(),
            self.injectables.len(),
            store.components().len(),
            store.families().len()
        );

        Ok(World {
            store,
            scheduler: Scheduler::new(units),
            config: self.config,
            elapsed_time: 0.0,
        })
    }
}

/// Entities, components, families and the systems running over them.
#[derive(Debug)]
pub struct World {
    store: EntityStore,
    scheduler: Scheduler,
    config: WorldConfig,
    /// Sum of clamped deltas.
    elapsed_time: f32,
}

impl World {
    /// Starts a builder with the default configuration.
    #[must_use]
    pub fn builder() -> WorldBuilder {
        WorldBuilder::default()
    }

    /// Advances the world by `delta_time`, running every enabled system.
    ///
    /// The delta is clamped to `[0, max_delta_time]` before anything else.
    ///
    /// # Errors
    ///
    /// The first error returned by a system aborts the update and is
    /// returned unchanged. Systems later in the order do not run.
    pub fn update(&mut self, delta_time: f32) -> EcsResult<()> {
        let delta = delta_time.max(0.0).min(self.config.max_delta_time);
        if delta < delta_time {
            tracing::debug!("delta time {} clamped to {}", delta_time, delta);
        }

        self.elapsed_time += delta;
        self.scheduler.tick(&mut self.store, delta, self.elapsed_time)
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity and configures it with `setup`.
    pub fn create<F>(&mut self, setup: F) -> Entity
    where
        F: FnOnce(&mut EntityEditor<'_>),
    {
        self.store.create(setup)
    }

    /// Applies a batch of component changes to a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`] if `entity` is not alive.
    pub fn configure_entity<F, R>(&mut self, entity: Entity, changes: F) -> EcsResult<R>
    where
        F: FnOnce(&mut EntityEditor<'_>) -> R,
    {
        self.store.configure_entity(entity, changes)
    }

    /// Removes an entity and all its components.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`] if `entity` is not alive.
    pub fn remove(&mut self, entity: Entity) -> EcsResult<()> {
        self.store.remove(entity)
    }

    /// Removes every entity.
    pub fn remove_all(&mut self) {
        self.store.remove_all();
    }

    /// Checks if an entity is alive.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.store.is_alive(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.store.alive_count()
    }

    // =========================================================================
    // Components and families
    // =========================================================================

    /// Mapper for component `C`.
    pub fn mapper<C: Component>(&mut self) -> ComponentMapper<C> {
        self.store.mapper()
    }

    /// Gets component `C` of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if the entity has no `C`.
    pub fn get<C: Component>(&self, entity: Entity) -> EcsResult<&C> {
        self.store.get(entity)
    }

    /// Gets component `C` of `entity` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if the entity has no `C`.
    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> EcsResult<&mut C> {
        self.store.get_mut(entity)
    }

    /// Returns `true` if `entity` holds a `C`.
    #[must_use]
    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        self.store.has::<C>(entity)
    }

    /// Registers a family at runtime, back-filled with the live entities.
    pub fn family(&mut self, def: &FamilyDef) -> FamilyId {
        self.store.family(def)
    }

    /// Members of a family, in family order.
    #[must_use]
    pub fn family_entities(&self, id: FamilyId) -> &[Entity] {
        self.store.family_entities(id)
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// The system of type `S`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if the world has no such system.
    pub fn system<S: Any>(&self) -> EcsResult<&S> {
        self.scheduler.system::<S>().ok_or_else(unknown_system::<S>)
    }

    /// The system of type `S`, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if the world has no such system.
    pub fn system_mut<S: Any>(&mut self) -> EcsResult<&mut S> {
        self.scheduler.system_mut::<S>().ok_or_else(unknown_system::<S>)
    }

    /// Whether the system of type `S` is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if the world has no such system.
    pub fn is_enabled<S: Any>(&self) -> EcsResult<bool> {
        self.scheduler.is_enabled::<S>().ok_or_else(unknown_system::<S>)
    }

    /// Enables or disables the system of type `S`. Disabled systems do not
    /// run and their fixed-interval accumulator does not advance.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if the world has no such system.
    pub fn set_enabled<S: Any>(&mut self, enabled: bool) -> EcsResult<()> {
        if self.scheduler.set_enabled::<S>(enabled) {
            Ok(())
        } else {
            Err(unknown_system::<S>())
        }
    }

    /// Sorts the family of system `S` before its next pass.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if the world has no such system.
    pub fn request_sort<S: Any>(&mut self) -> EcsResult<()> {
        if self.scheduler.request_sort::<S>() {
            Ok(())
        } else {
            Err(unknown_system::<S>())
        }
    }

    /// The scheduler (system order and lookup).
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Sum of the clamped deltas of every update so far.
    #[must_use]
    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }

    /// The configuration the world was built with.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The entity store.
    #[must_use]
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// The entity store, mutably.
    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }
}

fn unknown_system<S: Any>() -> EcsError {
    EcsError::UnknownSystem {
        system: type_name::<S>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{IntervalSystem, SystemContext};

    #[derive(Clone, Debug, PartialEq)]
    struct Gravity(f32);

    #[derive(Clone, Debug, PartialEq)]
    struct Unused;

    struct Clock {
        seen: Vec<f32>,
        gravity: Gravity,
        enabled_hooks: u32,
        disabled_hooks: u32,
    }

    impl Clock {
        fn new(inject: &mut Injector<'_>) -> EcsResult<Self> {
            Ok(Self {
                seen: Vec::new(),
                gravity: inject.resolve()?,
                enabled_hooks: 0,
                disabled_hooks: 0,
            })
        }
    }

    impl IntervalSystem for Clock {
        fn on_tick(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
            self.seen.push(ctx.delta_time());
            Ok(())
        }

        fn on_enable(&mut self) {
            self.enabled_hooks += 1;
        }

        fn on_disable(&mut self) {
            self.disabled_hooks += 1;
        }
    }

    struct Other;
    impl IntervalSystem for Other {
        fn on_tick(&mut self, _ctx: &mut SystemContext<'_>) -> EcsResult<()> {
            Err(EcsError::System("other failed".into()))
        }
    }

    fn clock_world() -> World {
        World::builder()
            .inject(Gravity(9.81))
            .and_then(|b| b.system(SystemDescriptor::interval(Clock::new)))
            .and_then(WorldBuilder::build)
            .unwrap()
    }

    #[test]
    fn test_build_resolves_injectables() {
        let world = clock_world();
        assert_eq!(world.system::<Clock>().unwrap().gravity, Gravity(9.81));
        assert_eq!(world.scheduler().len(), 1);
    }

    #[test]
    fn test_duplicate_system() {
        let err = World::builder()
            .system(SystemDescriptor::interval(|_| Ok(Other)))
            .and_then(|b| b.system(SystemDescriptor::interval(|_| Ok(Other))))
            .unwrap_err();
        assert!(matches!(err, EcsError::DuplicateSystem { system } if system.ends_with("Other")));
    }

    #[test]
    fn test_duplicate_injectable() {
        let err = World::builder()
            .inject(Gravity(1.0))
            .and_then(|b| b.inject(Gravity(2.0)))
            .unwrap_err();
        assert!(matches!(err, EcsError::DuplicateInjectable { .. }));
    }

    #[test]
    fn test_unresolved_dependency() {
        let err = World::builder()
            .system(SystemDescriptor::interval(Clock::new))
            .and_then(WorldBuilder::build)
            .unwrap_err();
        assert!(matches!(err, EcsError::UnresolvedDependency { dependency, .. } if dependency.ends_with("Gravity")));
    }

    #[test]
    fn test_unused_injectables() {
        let err = World::builder()
            .inject(Gravity(9.81))
            .and_then(|b| b.inject(Unused))
            .and_then(|b| b.system(SystemDescriptor::interval(Clock::new)))
            .and_then(WorldBuilder::build)
            .unwrap_err();
        match err {
            EcsError::UnusedInjectables { injectables } => {
                assert_eq!(injectables.len(), 1);
                assert!(injectables[0].ends_with("Unused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_fixed_interval() {
        let err = World::builder()
            .system(
                SystemDescriptor::interval(|_| Ok(Other))
                    .with_interval(crate::ecs::Interval::Fixed(0.0)),
            )
            .and_then(WorldBuilder::build)
            .unwrap_err();
        assert!(matches!(err, EcsError::InvalidConfig(_)));
    }

    #[test]
    fn test_invalid_config() {
        let config = WorldConfig::default().max_delta_time(0.0);
        let err = WorldBuilder::new(config).build().unwrap_err();
        assert!(matches!(err, EcsError::InvalidConfig(_)));
    }

    #[test]
    fn test_update_clamps_delta() {
        let mut world = clock_world();
        world.update(1.0).unwrap();
        world.update(-2.0).unwrap();
        world.update(0.01).unwrap();

        let seen = &world.system::<Clock>().unwrap().seen;
        assert_eq!(seen, &vec![1.0 / 30.0, 0.0, 0.01]);
        assert!((world.elapsed_time() - (1.0 / 30.0 + 0.01)).abs() < 1e-6);
    }

    #[test]
    fn test_system_error_propagates() {
        let mut world = World::builder()
            .system(SystemDescriptor::interval(|_| Ok(Other)))
            .and_then(WorldBuilder::build)
            .unwrap();
        assert_eq!(
            world.update(0.01),
            Err(EcsError::System("other failed".into()))
        );
    }

    #[test]
    fn test_enable_hooks_fire_on_transitions() {
        let mut world = clock_world();
        world.set_enabled::<Clock>(true).unwrap();
        world.set_enabled::<Clock>(false).unwrap();
        world.set_enabled::<Clock>(false).unwrap();
        assert!(!world.is_enabled::<Clock>().unwrap());

        world.update(0.01).unwrap();
        world.set_enabled::<Clock>(true).unwrap();

        let clock = world.system_mut::<Clock>().unwrap();
        assert!(clock.seen.is_empty());
        assert_eq!((clock.enabled_hooks, clock.disabled_hooks), (1, 1));
    }

    #[test]
    fn test_unknown_system() {
        let mut world = clock_world();
        let expected = EcsError::UnknownSystem {
            system: type_name::<Other>(),
        };
        assert_eq!(world.set_enabled::<Other>(false), Err(expected.clone()));
        assert_eq!(world.is_enabled::<Other>(), Err(expected.clone()));
        assert_eq!(world.request_sort::<Other>(), Err(expected.clone()));
        assert!(world.system::<Other>().is_err());
        assert!(world.system_mut::<Other>().is_err());
    }
}
