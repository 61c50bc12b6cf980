//! # Systems
//!
//! Systems are the behaviour of a world. Two kinds exist:
//!
//! - [`IntervalSystem`]: runs once per firing.
//! - [`IteratingSystem`]: runs once per member of its family per firing.
//!
//! Both receive a [`SystemContext`]. Through it a system creates,
//! configures and removes entities and reads family members; components
//! are read and written with the [`ComponentMapper`]s the system was built
//! with. Changes are visible immediately.
//!
//! [`ComponentMapper`]: crate::ComponentMapper
//!
//! Systems are declared with a [`SystemDescriptor`] that carries their
//! metadata (interval, enabled flag, sorting) and a constructor that pulls
//! dependencies from an [`Injector`] when the world is built.

use std::any::{type_name, Any, TypeId};
use std::cmp::Ordering;
use std::fmt;

use super::component::Component;
use super::entity::Entity;
use super::family::{FamilyDef, FamilyId};
use super::inject::Injector;
use super::scheduler::{SystemUnit, UnitKind};
use super::store::{EntityEditor, EntityStore};
use crate::error::{EcsError, EcsResult};

/// Upcast helper so boxed systems can be looked up by concrete type.
///
/// Implemented for every `'static` type.
pub trait AsAny: Any {
    /// Upcast to `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Upcast to `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// How often a system fires.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Interval {
    /// Once per world update, with that update's delta time.
    #[default]
    EachFrame,
    /// Every `step` seconds of accumulated time; the remainder carries over
    /// to the next update.
    Fixed(f32),
}

/// When an iterating system with a comparator sorts its family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortPolicy {
    /// Before every pass.
    #[default]
    Automatic,
    /// Only before the pass following a sort request.
    Manual,
}

/// Orders two entities of a family. Must be a total order.
pub type EntityComparator = Box<dyn Fn(&EntityStore, Entity, Entity) -> Ordering>;

/// Per-firing view handed to systems.
pub struct SystemContext<'a> {
    store: &'a mut EntityStore,
    delta_time: f32,
    elapsed_time: f32,
    sort_requested: bool,
}

impl<'a> SystemContext<'a> {
    pub(crate) fn new(store: &'a mut EntityStore, delta_time: f32, elapsed_time: f32) -> Self {
        Self {
            store,
            delta_time,
            elapsed_time,
            sort_requested: false,
        }
    }

    /// Seconds covered by this firing: the update's clamped delta, or the
    /// step for fixed-interval systems.
    #[inline]
    #[must_use]
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Cumulative clamped time of the world, including the current update.
    #[inline]
    #[must_use]
    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }

    /// Asks for the running system's family to be sorted before its next
    /// pass. Only meaningful for [`SortPolicy::Manual`].
    pub fn request_sort(&mut self) {
        self.sort_requested = true;
    }

    pub(crate) fn sort_requested(&self) -> bool {
        self.sort_requested
    }

    pub(crate) fn entity_store(&self) -> &EntityStore {
        &*self.store
    }

    pub(crate) fn entity_store_mut(&mut self) -> &mut EntityStore {
        &mut *self.store
    }

    /// Creates an entity; see [`EntityStore::create`].
    pub fn create<F>(&mut self, setup: F) -> Entity
    where
        F: FnOnce(&mut EntityEditor<'_>),
    {
        self.store.create(setup)
    }

    /// Applies component changes to a live entity; see
    /// [`EntityStore::configure_entity`].
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

    /// Removes an entity and all of its components.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`] if `entity` is not alive.
    pub fn remove(&mut self, entity: Entity) -> EcsResult<()> {
        self.store.remove(entity)
    }

    /// Removes every live entity.
    pub fn remove_all(&mut self) {
        self.store.remove_all();
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.store.is_alive(entity)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.store.alive_count()
    }

    /// Current members of a family, in family order.
    #[inline]
    #[must_use]
    pub fn family_entities(&self, id: FamilyId) -> &[Entity] {
        self.store.family_entities(id)
    }
}

/// A system that runs once per firing.
pub trait IntervalSystem: AsAny {
    /// Runs the system.
    ///
    /// # Errors
    ///
    /// Any error aborts the current world update and is returned by it.
    fn on_tick(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()>;

    /// Called after the firings of a fixed-interval update with
    /// `accumulator / step`, for interpolation.
    ///
    /// # Errors
    ///
    /// Same as [`on_tick`](Self::on_tick).
    fn on_alpha(&mut self, _ctx: &mut SystemContext<'_>, _alpha: f32) -> EcsResult<()> {
        Ok(())
    }

    /// Called when the system goes from disabled to enabled.
    fn on_enable(&mut self) {}

    /// Called when the system goes from enabled to disabled.
    fn on_disable(&mut self) {}
}

/// A system that runs once per member of its family per firing.
pub trait IteratingSystem: AsAny {
    /// Processes one entity.
    ///
    /// # Errors
    ///
    /// Any error aborts the current world update and is returned by it.
    fn on_tick_entity(&mut self, ctx: &mut SystemContext<'_>, entity: Entity) -> EcsResult<()>;

    /// Per-entity counterpart of [`IntervalSystem::on_alpha`].
    ///
    /// # Errors
    ///
    /// Same as [`on_tick_entity`](Self::on_tick_entity).
    fn on_alpha_entity(
        &mut self,
        _ctx: &mut SystemContext<'_>,
        _entity: Entity,
        _alpha: f32,
    ) -> EcsResult<()> {
        Ok(())
    }

    /// Called when the system goes from disabled to enabled.
    fn on_enable(&mut self) {}

    /// Called when the system goes from enabled to disabled.
    fn on_disable(&mut self) {}
}

type IntervalCtor = Box<dyn FnOnce(&mut Injector<'_>) -> EcsResult<Box<dyn IntervalSystem>>>;
type IteratingCtor = Box<dyn FnOnce(&mut Injector<'_>) -> EcsResult<Box<dyn IteratingSystem>>>;
type ComparatorFactory = Box<dyn FnOnce(&mut Injector<'_>) -> EcsResult<EntityComparator>>;

enum DescriptorKind {
    Interval(IntervalCtor),
    Iterating { family: FamilyDef, ctor: IteratingCtor },
}

/// Declaration of one system: how to build it and how to schedule it.
///
/// # Example
///
/// ```rust,ignore
/// let movement = SystemDescriptor::iterating(
///     FamilyDef::new().all_of::<Position>().none_of::<Dead>(),
///     |inject| Ok(MoveSystem { positions: inject.mapper() }),
/// )
/// .with_interval(Interval::Fixed(1.0 / 60.0));
/// ```
pub struct SystemDescriptor {
    name: &'static str,
    type_id: TypeId,
    interval: Interval,
    enabled: bool,
    comparator: Option<ComparatorFactory>,
    sort_policy: SortPolicy,
    kind: DescriptorKind,
}

impl SystemDescriptor {
    /// Declares an [`IntervalSystem`] built by `ctor`.
    pub fn interval<S, F>(ctor: F) -> Self
    where
        S: IntervalSystem,
        F: FnOnce(&mut Injector<'_>) -> EcsResult<S> + 'static,
    {
        let ctor: IntervalCtor = Box::new(move |inject: &mut Injector<'_>| {
            ctor(inject).map(|s| Box::new(s) as Box<dyn IntervalSystem>)
        });
        Self::with_kind::<S>(DescriptorKind::Interval(ctor))
    }

    /// Declares an [`IteratingSystem`] over `family`, built by `ctor`.
    pub fn iterating<S, F>(family: FamilyDef, ctor: F) -> Self
    where
        S: IteratingSystem,
        F: FnOnce(&mut Injector<'_>) -> EcsResult<S> + 'static,
    {
        let ctor: IteratingCtor = Box::new(move |inject: &mut Injector<'_>| {
            ctor(inject).map(|s| Box::new(s) as Box<dyn IteratingSystem>)
        });
        Self::with_kind::<S>(DescriptorKind::Iterating { family, ctor })
    }

    fn with_kind<S: 'static>(kind: DescriptorKind) -> Self {
        Self {
            name: type_name::<S>(),
            type_id: TypeId::of::<S>(),
            interval: Interval::EachFrame,
            enabled: true,
            comparator: None,
            sort_policy: SortPolicy::Automatic,
            kind,
        }
    }

    /// Sets the firing interval (default [`Interval::EachFrame`]).
    #[must_use]
    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    /// Sets whether the system starts enabled (default `true`).
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sorts the family with `compare` before passes. Ignored for interval
    /// systems.
    #[must_use]
    pub fn sorted_by<F>(mut self, compare: F) -> Self
    where
        F: Fn(&EntityStore, Entity, Entity) -> Ordering + 'static,
    {
        self.comparator = Some(Box::new(move |_: &mut Injector<'_>| {
            Ok(Box::new(compare) as EntityComparator)
        }));
        self
    }

    /// Sorts the family by component `C`. Entities without `C` sort last.
    #[must_use]
    pub fn compare_by<C, F>(mut self, compare: F) -> Self
    where
        C: Component,
        F: Fn(&C, &C) -> Ordering + 'static,
    {
        self.comparator = Some(Box::new(move |inject: &mut Injector<'_>| {
            let mapper = inject.mapper::<C>();
            let comparator: EntityComparator =
                Box::new(move |store: &EntityStore, a: Entity, b: Entity| {
                    match (mapper.try_get(store, a), mapper.try_get(store, b)) {
                        (Some(x), Some(y)) => compare(x, y),
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    }
                });
            Ok(comparator)
        }));
        self
    }

    /// Sets the sort policy (default [`SortPolicy::Automatic`]).
    #[must_use]
    pub fn sort_policy(mut self, policy: SortPolicy) -> Self {
        self.sort_policy = policy;
        self
    }

    /// Type name of the declared system.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Builds the system and resolves its family and comparator.
    pub(crate) fn instantiate(self, inject: &mut Injector<'_>) -> EcsResult<SystemUnit> {
        if let Interval::Fixed(step) = self.interval {
            if !(step.is_finite() && step > 0.0) {
                return Err(EcsError::InvalidConfig(format!(
                    "fixed interval of `{}` must be positive, got {step}",
                    self.name
                )));
            }
        }

        let kind = match self.kind {
            DescriptorKind::Interval(ctor) => UnitKind::Interval(ctor(inject)?),
            DescriptorKind::Iterating { family, ctor } => {
                let system = ctor(inject)?;
                let family = inject.family(&family);
                let comparator = match self.comparator {
                    Some(factory) => Some(factory(inject)?),
                    None => None,
                };
                UnitKind::Iterating {
                    system,
                    family,
                    comparator,
                    sort_policy: self.sort_policy,
                    sort_requested: false,
                }
            }
        };

        Ok(SystemUnit::new(
            self.name,
            self.type_id,
            self.enabled,
            self.interval,
            kind,
        ))
    }
}

impl fmt::Debug for SystemDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DescriptorKind::Interval(_) => "interval",
            DescriptorKind::Iterating { .. } => "iterating",
        };
        f.debug_struct("SystemDescriptor")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("interval", &self.interval)
            .field("enabled", &self.enabled)
            .field("sorted", &self.comparator.is_some())
            .field("sort_policy", &self.sort_policy)
            .finish()
    }
}
