//! # Scheduler
//!
//! Runs the systems of a world in declaration order, once per update.
//!
//! ## Fixed intervals
//!
//! A fixed-interval unit accumulates the update's delta and fires while the
//! accumulator holds at least one step, subtracting a step per firing:
//!
//! ```text
//! step = 250      delta   acc before   firings   acc after
//!                 1000    1000         4         0
//!                  100     100         0         100
//!                  200     300         1         50
//! ```
//!
//! Inside such a firing the context's delta time is the step itself.
//!
//! ## Iterating passes
//!
//! A pass visits positions `0..len` of the family as it was when the pass
//! started, re-reading the entity at each position. Any member leaving the
//! family swaps the family's last member into its slot:
//!
//! - Leaving at the cursor: the swapped-in member is not visited until the
//!   next pass.
//! - Leaving behind the cursor (already visited): the swapped-in member
//!   lands in a visited slot and is skipped for this pass.
//! - Leaving ahead of the cursor: the swapped-in member is visited in its
//!   new slot.
//!
//! Members appended during the pass are not visited either. If the family
//! shrinks below the cursor the pass ends.

use std::any::{Any, TypeId};
use std::fmt;

use super::entity::Entity;
use super::family::FamilyId;
use super::store::EntityStore;
use super::system::{
    EntityComparator, Interval, IntervalSystem, IteratingSystem, SortPolicy, SystemContext,
};
use crate::error::EcsResult;

/// What a unit runs.
pub(crate) enum UnitKind {
    Interval(Box<dyn IntervalSystem>),
    Iterating {
        system: Box<dyn IteratingSystem>,
        family: FamilyId,
        comparator: Option<EntityComparator>,
        sort_policy: SortPolicy,
        sort_requested: bool,
    },
}

/// One scheduled system with its metadata and timing state.
pub(crate) struct SystemUnit {
    name: &'static str,
    type_id: TypeId,
    enabled: bool,
    interval: Interval,
    accumulator: f32,
    kind: UnitKind,
}

impl SystemUnit {
    pub(crate) fn new(
        name: &'static str,
        type_id: TypeId,
        enabled: bool,
        interval: Interval,
        kind: UnitKind,
    ) -> Self {
        Self {
            name,
            type_id,
            enabled,
            interval,
            accumulator: 0.0,
            kind,
        }
    }

    fn run(&mut self, store: &mut EntityStore, delta: f32, elapsed: f32) -> EcsResult<()> {
        match self.interval {
            Interval::EachFrame => self.kind.fire(store, delta, elapsed),
            Interval::Fixed(step) => {
                self.accumulator += delta;
                while self.accumulator >= step {
                    self.accumulator -= step;
                    self.kind.fire(store, step, elapsed)?;
                }
                self.kind.alpha(store, step, elapsed, self.accumulator / step)
            }
        }
    }

    fn system(&self) -> &dyn Any {
        match &self.kind {
            UnitKind::Interval(system) => (**system).as_any(),
            UnitKind::Iterating { system, .. } => (**system).as_any(),
        }
    }

    fn system_mut(&mut self) -> &mut dyn Any {
        match &mut self.kind {
            UnitKind::Interval(system) => (**system).as_any_mut(),
            UnitKind::Iterating { system, .. } => (**system).as_any_mut(),
        }
    }
}

impl UnitKind {
    fn fire(&mut self, store: &mut EntityStore, delta: f32, elapsed: f32) -> EcsResult<()> {
        match self {
            Self::Interval(system) => system.on_tick(&mut SystemContext::new(store, delta, elapsed)),
            Self::Iterating {
                system,
                family,
                comparator,
                sort_policy,
                sort_requested,
            } => {
                if let Some(compare) = comparator {
                    if *sort_policy == SortPolicy::Automatic || *sort_requested {
                        *sort_requested = false;
                        sort_family(store, *family, compare);
                    }
                }

                let mut ctx = SystemContext::new(store, delta, elapsed);
                let result = visit_family(&mut ctx, *family, |ctx, entity| {
                    system.on_tick_entity(ctx, entity)
                });
                if ctx.sort_requested() {
                    *sort_requested = true;
                }
                result
            }
        }
    }

    fn alpha(&mut self, store: &mut EntityStore, step: f32, elapsed: f32, alpha: f32) -> EcsResult<()> {
        let mut ctx = SystemContext::new(store, step, elapsed);
        match self {
            Self::Interval(system) => system.on_alpha(&mut ctx, alpha),
            Self::Iterating {
                system,
                family,
                sort_requested,
                ..
            } => {
                let result = visit_family(&mut ctx, *family, |ctx, entity| {
                    system.on_alpha_entity(ctx, entity, alpha)
                });
                if ctx.sort_requested() {
                    *sort_requested = true;
                }
                result
            }
        }
    }

    fn on_enable(&mut self) {
        match self {
            Self::Interval(system) => system.on_enable(),
            Self::Iterating { system, .. } => system.on_enable(),
        }
    }

    fn on_disable(&mut self) {
        match self {
            Self::Interval(system) => system.on_disable(),
            Self::Iterating { system, .. } => system.on_disable(),
        }
    }
}

/// Stable sort of a family's members.
fn sort_family(store: &mut EntityStore, family: FamilyId, compare: &EntityComparator) {
    let mut entities = store.families_mut().take_entities(family);
    let view: &EntityStore = store;
    entities.sort_by(|&a, &b| compare(view, a, b));
    store.families_mut().restore_entities(family, entities);
}

/// Visits the members present when the pass started; see the module docs.
fn visit_family<F>(ctx: &mut SystemContext<'_>, family: FamilyId, mut visit: F) -> EcsResult<()>
where
    F: FnMut(&mut SystemContext<'_>, Entity) -> EcsResult<()>,
{
    let original_len = ctx.entity_store().families().get(family).len();
    for position in 0..original_len {
        let Some(entity) = ctx.entity_store().families().entity_at(family, position) else {
            break;
        };
        visit(ctx, entity)?;
    }
    Ok(())
}

/// Ordered list of system units.
pub struct Scheduler {
    units: Vec<SystemUnit>,
}

impl Scheduler {
    pub(crate) fn new(units: Vec<SystemUnit>) -> Self {
        Self { units }
    }

    /// Number of systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if there are no systems.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// System type names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.units.iter().map(|unit| unit.name)
    }

    /// Runs every enabled unit once, in order. Stops at the first error.
    pub(crate) fn tick(&mut self, store: &mut EntityStore, delta: f32, elapsed: f32) -> EcsResult<()> {
        for unit in &mut self.units {
            if unit.enabled {
                unit.run(store, delta, elapsed)?;
            }
        }
        Ok(())
    }

    fn unit(&self, type_id: TypeId) -> Option<&SystemUnit> {
        self.units.iter().find(|unit| unit.type_id == type_id)
    }

    fn unit_mut(&mut self, type_id: TypeId) -> Option<&mut SystemUnit> {
        self.units.iter_mut().find(|unit| unit.type_id == type_id)
    }

    /// The system of type `S`.
    #[must_use]
    pub fn system<S: Any>(&self) -> Option<&S> {
        self.unit(TypeId::of::<S>())
            .and_then(|unit| unit.system().downcast_ref())
    }

    /// The system of type `S`, mutably.
    pub fn system_mut<S: Any>(&mut self) -> Option<&mut S> {
        self.unit_mut(TypeId::of::<S>())
            .and_then(|unit| unit.system_mut().downcast_mut())
    }

    /// Whether the system of type `S` is enabled, or `None` if absent.
    #[must_use]
    pub fn is_enabled<S: Any>(&self) -> Option<bool> {
        self.unit(TypeId::of::<S>()).map(|unit| unit.enabled)
    }

    /// Enables or disables the system of type `S`.
    ///
    /// The system's enable/disable hook runs only on an actual transition.
    /// Returns `false` if no such system exists.
    pub fn set_enabled<S: Any>(&mut self, enabled: bool) -> bool {
        let Some(unit) = self.unit_mut(TypeId::of::<S>()) else {
            return false;
        };
        if unit.enabled != enabled {
            unit.enabled = enabled;
            if enabled {
                unit.kind.on_enable();
            } else {
                unit.kind.on_disable();
            }
            tracing::debug!("system `{}` {}", unit.name, if enabled { "enabled" } else { "disabled" });
        }
        true
    }

    /// Marks the family of system `S` for sorting before its next pass.
    ///
    /// Returns `false` if no such system exists. A no-op for interval
    /// systems.
    pub fn request_sort<S: Any>(&mut self) -> bool {
        let Some(unit) = self.unit_mut(TypeId::of::<S>()) else {
            return false;
        };
        if let UnitKind::Iterating { sort_requested, .. } = &mut unit.kind {
            *sort_requested = true;
        }
        true
    }

    /// Family iterated by system `S`, if it is an iterating system.
    #[must_use]
    pub fn family_of<S: Any>(&self) -> Option<FamilyId> {
        match self.unit(TypeId::of::<S>())?.kind {
            UnitKind::Iterating { family, .. } => Some(family),
            UnitKind::Interval(_) => None,
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.units.iter().map(|unit| (unit.name, unit.enabled, unit.interval)))
            .finish()
    }
}
