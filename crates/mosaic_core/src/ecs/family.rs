//! # Families
//!
//! A family is a cached query: the ordered set of live entities whose
//! component mask satisfies
//!
//! ```text
//! mask ⊇ all  ∧  mask ∩ none = ∅  ∧  (any = ∅ ∨ mask ∩ any ≠ ∅)
//! ```
//!
//! Membership is maintained incrementally. Every bit transition reported by
//! the [`EntityStore`](super::EntityStore) re-evaluates only the families
//! that mention that component, and each of those either appends the entity
//! or swap-removes it. There is never a full rescan after registration.
//!
//! ## Ordering
//!
//! - Newly matching entities are appended at the end.
//! - Leaving entities are swap-removed: the last entity takes the hole.
//! - A sort (see the scheduler) reorders the sequence in place.
//!
//! ## Degenerate families
//!
//! An empty definition matches every live entity. A definition whose `all`
//! and `none` sets overlap can never match; it is kept and stays empty.

use std::collections::HashMap;

use super::component::{Component, ComponentId, ComponentKey, ComponentRegistry};
use super::entity::Entity;
use super::mask::ComponentMask;

/// Slot marker for "not a member".
const NOT_MEMBER: u32 = u32::MAX;

/// Declarative family definition over component types.
///
/// Resolved to component ids when the world is built (or when registered
/// at runtime), so it can be written before any component id exists.
///
/// # Example
///
/// ```rust,ignore
/// let moving = FamilyDef::new()
///     .all_of::<Position>()
///     .all_of::<Physics>()
///     .none_of::<Dead>();
/// ```
#[derive(Clone, Debug, Default)]
pub struct FamilyDef {
    all: Vec<ComponentKey>,
    none: Vec<ComponentKey>,
    any: Vec<ComponentKey>,
}

impl FamilyDef {
    /// Definition that matches every live entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires component `C`.
    #[must_use]
    pub fn all_of<C: Component>(mut self) -> Self {
        self.all.push(ComponentKey::of::<C>());
        self
    }

    /// Excludes entities holding component `C`.
    #[must_use]
    pub fn none_of<C: Component>(mut self) -> Self {
        self.none.push(ComponentKey::of::<C>());
        self
    }

    /// Adds `C` to the any-of set: at least one member must be present.
    #[must_use]
    pub fn any_of<C: Component>(mut self) -> Self {
        self.any.push(ComponentKey::of::<C>());
        self
    }

    /// Resolves the definition to masks, registering unseen component types.
    pub(crate) fn resolve(&self, registry: &mut ComponentRegistry) -> FamilyMasks {
        let mut resolve = |keys: &[ComponentKey]| {
            let mut mask = ComponentMask::new();
            for &key in keys {
                mask.insert(registry.register_key(key));
            }
            mask
        };

        FamilyMasks {
            all: resolve(&self.all),
            none: resolve(&self.none),
            any: resolve(&self.any),
        }
    }
}

/// Resolved AllOf / NoneOf / AnyOf masks. Two definitions with equal masks
/// are the same family.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FamilyMasks {
    /// Required components.
    pub all: ComponentMask,
    /// Excluded components.
    pub none: ComponentMask,
    /// At least one of these, unless empty.
    pub any: ComponentMask,
}

impl FamilyMasks {
    /// Evaluates the family predicate against an entity mask.
    #[inline]
    #[must_use]
    pub fn matches(&self, mask: &ComponentMask) -> bool {
        mask.contains_all(&self.all)
            && !mask.intersects(&self.none)
            && (self.any.is_empty() || mask.intersects(&self.any))
    }

    /// Returns `true` if an entity with no components matches.
    #[inline]
    fn matches_empty(&self) -> bool {
        self.all.is_empty() && self.any.is_empty()
    }

    /// Every component id this family depends on.
    fn referenced(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.all.iter().chain(self.none.iter()).chain(self.any.iter())
    }
}

/// Handle to a registered family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FamilyId(u32);

impl FamilyId {
    /// Returns the handle as an index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One registered family: its masks and its cached entity sequence.
#[derive(Debug)]
pub struct Family {
    masks: FamilyMasks,
    /// Cached members in family order.
    entities: Vec<Entity>,
    /// Entity index → position in `entities`, or `NOT_MEMBER`.
    slots: Vec<u32>,
}

impl Family {
    fn new(masks: FamilyMasks) -> Self {
        Self {
            masks,
            entities: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// The resolved masks.
    #[inline]
    #[must_use]
    pub fn masks(&self) -> &FamilyMasks {
        &self.masks
    }

    /// Members in family order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity matches.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns `true` if `entity` is a member.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index())
            .is_some_and(|&slot| slot != NOT_MEMBER)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn insert(&mut self, entity: Entity) {
        let index = entity.index();
        if index >= self.slots.len() {
            let grown = (index + 1).max(self.slots.len() * 2);
            self.slots.resize(grown, NOT_MEMBER);
        }
        self.slots[index] = self.entities.len() as u32;
        self.entities.push(entity);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn remove(&mut self, entity: Entity) {
        let slot = self.slots[entity.index()] as usize;
        self.slots[entity.index()] = NOT_MEMBER;

        self.entities.swap_remove(slot);
        if let Some(&moved) = self.entities.get(slot) {
            self.slots[moved.index()] = slot as u32;
        }
    }

    /// Re-evaluates one entity against the current mask.
    #[inline]
    fn update(&mut self, entity: Entity, mask: &ComponentMask) {
        match (self.masks.matches(mask), self.contains(entity)) {
            (true, false) => self.insert(entity),
            (false, true) => self.remove(entity),
            _ => {}
        }
    }

    /// Rebuilds the slot index after the sequence was reordered.
    #[allow(clippy::cast_possible_truncation)]
    fn reindex(&mut self) {
        for (position, entity) in self.entities.iter().enumerate() {
            self.slots[entity.index()] = position as u32;
        }
    }
}

/// All families of a world plus the reverse index that routes each bit
/// transition to the families that care about it.
#[derive(Debug, Default)]
pub struct FamilyIndex {
    families: Vec<Family>,
    /// Dedup table: masks → family.
    lookup: HashMap<FamilyMasks, FamilyId>,
    /// Component index → families referencing that component.
    by_component: Vec<Vec<FamilyId>>,
    /// Families that match an entity with no components. Notified on
    /// entity creation and removal.
    matches_empty: Vec<FamilyId>,
}

impl FamilyIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered families.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.families.len()
    }

    /// Returns `true` if no family is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Registers a family, or returns the existing one with equal masks.
    ///
    /// # Returns
    ///
    /// The family id and whether it was newly created. A new family is
    /// empty; the caller back-fills it with the live entities.
    #[allow(clippy::cast_possible_truncation)]
    pub fn register(&mut self, masks: FamilyMasks) -> (FamilyId, bool) {
        if let Some(&id) = self.lookup.get(&masks) {
            return (id, false);
        }

        let id = FamilyId(self.families.len() as u32);
        for component in masks.referenced() {
            let index = component.index();
            if index >= self.by_component.len() {
                self.by_component.resize_with(index + 1, Vec::new);
            }
            let routed = &mut self.by_component[index];
            if !routed.contains(&id) {
                routed.push(id);
            }
        }
        if masks.matches_empty() {
            self.matches_empty.push(id);
        }

        self.lookup.insert(masks.clone(), id);
        self.families.push(Family::new(masks));
        (id, true)
    }

    /// Registered family under `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not come from this index.
    #[inline]
    #[must_use]
    pub fn get(&self, id: FamilyId) -> &Family {
        &self.families[id.index()]
    }

    /// Member at `position`, if the family is still that long.
    #[inline]
    #[must_use]
    pub fn entity_at(&self, id: FamilyId, position: usize) -> Option<Entity> {
        self.families[id.index()].entities.get(position).copied()
    }

    /// Feeds one entity to a single family (used for back-filling).
    pub(crate) fn evaluate(&mut self, id: FamilyId, entity: Entity, mask: &ComponentMask) {
        self.families[id.index()].update(entity, mask);
    }

    /// A new entity with an empty mask exists.
    pub(crate) fn on_created(&mut self, entity: Entity) {
        for &id in &self.matches_empty {
            self.families[id.index()].insert(entity);
        }
    }

    /// The bit of `component` flipped for `entity`; `mask` is the new mask.
    pub(crate) fn on_changed(&mut self, entity: Entity, component: ComponentId, mask: &ComponentMask) {
        let Self {
            families,
            by_component,
            ..
        } = self;

        if let Some(routed) = by_component.get(component.index()) {
            for &id in routed {
                families[id.index()].update(entity, mask);
            }
        }
    }

    /// `entity` has lost all components and is about to be freed.
    pub(crate) fn on_removed(&mut self, entity: Entity) {
        for &id in &self.matches_empty {
            let family = &mut self.families[id.index()];
            if family.contains(entity) {
                family.remove(entity);
            }
        }
    }

    /// Moves the member sequence out so it can be sorted while the rest of
    /// the store is borrowed. Must be handed back with
    /// [`restore_entities`](Self::restore_entities) before any mutation.
    pub(crate) fn take_entities(&mut self, id: FamilyId) -> Vec<Entity> {
        std::mem::take(&mut self.families[id.index()].entities)
    }

    /// Puts a reordered member sequence back and rebuilds its slots.
    pub(crate) fn restore_entities(&mut self, id: FamilyId, entities: Vec<Entity>) {
        let family = &mut self.families[id.index()];
        family.entities = entities;
        family.reindex();
    }
}
