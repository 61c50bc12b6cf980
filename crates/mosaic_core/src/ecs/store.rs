//! # Entity Store
//!
//! Owns the three mutually dependent indexes of a world:
//!
//! ```text
//! EntityRegistry   entity → mask
//! ComponentRegistry  type → storage (entity → value)
//! FamilyIndex      masks → ordered members
//! ```
//!
//! Every mutation goes through here, one bit at a time: storage first, then
//! the mask, then the families referencing that bit. After each public call
//! returns, `bit set ⇔ value stored` and `member ⇔ predicate holds`.
//!
//! Systems receive the store (through their context), never the scheduler,
//! so they can create, configure and remove entities mid-tick.

use std::any::type_name;

use super::component::{Component, ComponentId, ComponentRegistry};
use super::entity::{Entity, EntityRegistry};
use super::family::{FamilyDef, FamilyId, FamilyIndex};
use super::mapper::ComponentMapper;
use super::mask::ComponentMask;
use crate::error::{EcsError, EcsResult};

/// Builds the error for a missing component of type `C`.
fn missing<C: Component>(entity: Entity) -> EcsError {
    EcsError::MissingComponent {
        entity,
        component: type_name::<C>(),
    }
}

/// Entities, their components and the families over them.
#[derive(Debug)]
pub struct EntityStore {
    entities: EntityRegistry,
    components: ComponentRegistry,
    families: FamilyIndex,
}

impl EntityStore {
    /// Creates an empty store sized for `capacity` entities.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entities: EntityRegistry::new(capacity),
            components: ComponentRegistry::new(capacity),
            families: FamilyIndex::new(),
        }
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity and runs `setup` on it before anyone else can see
    /// it.
    ///
    /// Each component added in `setup` updates the families immediately.
    pub fn create<F>(&mut self, setup: F) -> Entity
    where
        F: FnOnce(&mut EntityEditor<'_>),
    {
        let entity = self.entities.create();
        self.families.on_created(entity);
        tracing::trace!("entity {} created", entity);

        setup(&mut EntityEditor {
            store: self,
            entity,
        });
        entity
    }

    /// Applies a batch of component changes to a live entity.
    ///
    /// Families are updated after every single add or remove, not at the
    /// end of the batch.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`] if `entity` is not alive; nothing
    /// is applied in that case.
    pub fn configure_entity<F, R>(&mut self, entity: Entity, changes: F) -> EcsResult<R>
    where
        F: FnOnce(&mut EntityEditor<'_>) -> R,
    {
        if !self.entities.is_alive(entity) {
            return Err(EcsError::UnknownEntity { entity });
        }

        Ok(changes(&mut EntityEditor {
            store: self,
            entity,
        }))
    }

    /// Removes an entity: drops each of its components (families see every
    /// bit go away) and releases the id for reuse.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`] if `entity` is not alive, which
    /// includes removing the same entity twice.
    pub fn remove(&mut self, entity: Entity) -> EcsResult<()> {
        let Some(slot) = self.entities.mask_mut(entity) else {
            return Err(EcsError::UnknownEntity { entity });
        };

        // Work on a detached copy so each family sees the shrinking mask;
        // the slot gets the emptied mask back to keep its allocation.
        let mut mask = std::mem::take(slot);
        loop {
            let Some(component) = mask.iter().next() else {
                break;
            };
            mask.remove(component);
            if let Some(storage) = self.components.erased_mut(component) {
                storage.remove_entity(entity);
            }
            self.families.on_changed(entity, component, &mask);
        }
        self.families.on_removed(entity);

        if let Some(slot) = self.entities.mask_mut(entity) {
            *slot = mask;
        }
        self.entities.remove(entity);
        tracing::trace!("entity {} removed", entity);
        Ok(())
    }

    /// Removes every live entity.
    pub fn remove_all(&mut self) {
        let alive: Vec<Entity> = self.entities.iter_alive().collect();
        for entity in alive {
            let removed = self.remove(entity);
            debug_assert!(removed.is_ok());
        }
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Iterates over live entities in ascending id order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter_alive()
    }

    /// Component mask of a live entity.
    #[inline]
    #[must_use]
    pub fn mask(&self, entity: Entity) -> Option<&ComponentMask> {
        self.entities.mask(entity)
    }

    /// The entity registry.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Returns a mapper for `C`, registering the type if needed.
    pub fn mapper<C: Component>(&mut self) -> ComponentMapper<C> {
        ComponentMapper::new(self.components.register::<C>())
    }

    /// The component registry (ids and storages).
    #[inline]
    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Gets component `C` of `entity`, looked up by type.
    ///
    /// Prefer a [`ComponentMapper`] in per-entity code.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if the entity has no `C`.
    pub fn get<C: Component>(&self, entity: Entity) -> EcsResult<&C> {
        let id = self.components.id_of::<C>().ok_or_else(|| missing::<C>(entity))?;
        self.get_by_id(entity, id)
    }

    /// Gets component `C` of `entity` mutably, looked up by type.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if the entity has no `C`.
    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> EcsResult<&mut C> {
        let id = self.components.id_of::<C>().ok_or_else(|| missing::<C>(entity))?;
        self.get_mut_by_id(entity, id)
    }

    /// Returns `true` if `entity` holds a `C`. Never fails.
    #[must_use]
    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        self.components
            .id_of::<C>()
            .is_some_and(|id| self.has_by_id(entity, id))
    }

    // The downcast behind `storage::<C>` is the only type check left on the
    // mapper path; it cannot be dropped without unsafe code.
    pub(crate) fn get_by_id<C: Component>(&self, entity: Entity, id: ComponentId) -> EcsResult<&C> {
        self.components
            .storage::<C>(id)
            .and_then(|storage| storage.get(entity))
            .ok_or_else(|| missing::<C>(entity))
    }

    pub(crate) fn get_mut_by_id<C: Component>(
        &mut self,
        entity: Entity,
        id: ComponentId,
    ) -> EcsResult<&mut C> {
        self.components
            .storage_mut::<C>(id)
            .and_then(|storage| storage.get_mut(entity))
            .ok_or_else(|| missing::<C>(entity))
    }

    /// A set bit and a stored value always go together, so the mask alone
    /// answers.
    pub(crate) fn has_by_id(&self, entity: Entity, id: ComponentId) -> bool {
        self.entities
            .mask(entity)
            .is_some_and(|mask| mask.contains(id))
    }

    /// Stores `value` for `entity`; sets the bit and notifies families the
    /// first time only. Overwriting keeps family membership untouched.
    pub(crate) fn add_by_id<C: Component>(
        &mut self,
        entity: Entity,
        id: ComponentId,
        value: C,
    ) -> EcsResult<Option<C>> {
        if !self.entities.is_alive(entity) {
            return Err(EcsError::UnknownEntity { entity });
        }
        let storage = self
            .components
            .storage_mut::<C>(id)
            .ok_or_else(|| missing::<C>(entity))?;

        let previous = storage.insert(entity, value);
        if previous.is_none() {
            if let Some(mask) = self.entities.mask_mut(entity) {
                mask.insert(id);
                self.families.on_changed(entity, id, mask);
            }
        }
        Ok(previous)
    }

    /// Erases the value of `entity`, clears the bit and notifies families.
    /// Removing an absent component changes nothing.
    pub(crate) fn remove_by_id<C: Component>(
        &mut self,
        entity: Entity,
        id: ComponentId,
    ) -> EcsResult<Option<C>> {
        if !self.entities.is_alive(entity) {
            return Err(EcsError::UnknownEntity { entity });
        }
        let Some(storage) = self.components.storage_mut::<C>(id) else {
            return Ok(None);
        };

        let removed = storage.remove(entity);
        if removed.is_some() {
            if let Some(mask) = self.entities.mask_mut(entity) {
                mask.remove(id);
                self.families.on_changed(entity, id, mask);
            }
        }
        Ok(removed)
    }

    // =========================================================================
    // Families
    // =========================================================================

    /// Registers a family (or finds the existing one with the same masks).
    ///
    /// A new family is back-filled once with the live entities, in
    /// ascending id order; from then on it is maintained incrementally.
    pub fn family(&mut self, def: &FamilyDef) -> FamilyId {
        let masks = def.resolve(&mut self.components);
        let (id, created) = self.families.register(masks);

        if created {
            for entity in self.entities.iter_alive() {
                if let Some(mask) = self.entities.mask(entity) {
                    self.families.evaluate(id, entity, mask);
                }
            }
            tracing::debug!(
                "family {:?} registered with {} members",
                id,
                self.families.get(id).len()
            );
        }
        id
    }

    /// Members of a family, in family order.
    #[inline]
    #[must_use]
    pub fn family_entities(&self, id: FamilyId) -> &[Entity] {
        self.families.get(id).entities()
    }

    /// The family index.
    #[inline]
    #[must_use]
    pub fn families(&self) -> &FamilyIndex {
        &self.families
    }

    pub(crate) fn families_mut(&mut self) -> &mut FamilyIndex {
        &mut self.families
    }
}

/// Scoped access to one live entity while creating or configuring it.
pub struct EntityEditor<'a> {
    store: &'a mut EntityStore,
    entity: Entity,
}

impl EntityEditor<'_> {
    /// The entity being edited.
    #[inline]
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Adds (or overwrites) component `C`.
    ///
    /// # Returns
    ///
    /// The previous value, if the entity already had one.
    pub fn add<C: Component>(&mut self, value: C) -> Option<C> {
        let id = self.store.components.register::<C>();
        // The entity is alive for the whole scope and `id` belongs to `C`
        self.store.add_by_id(self.entity, id, value).ok().flatten()
    }

    /// Adds (or overwrites) a component through a mapper.
    pub fn add_with<C: Component>(&mut self, mapper: &ComponentMapper<C>, value: C) -> Option<C> {
        self.store
            .add_by_id(self.entity, mapper.id(), value)
            .ok()
            .flatten()
    }

    /// Removes component `C`, returning it if it was present.
    pub fn remove<C: Component>(&mut self) -> Option<C> {
        let id = self.store.components.id_of::<C>()?;
        self.store.remove_by_id(self.entity, id).ok().flatten()
    }

    /// Removes a component through a mapper.
    pub fn remove_with<C: Component>(&mut self, mapper: &ComponentMapper<C>) -> Option<C> {
        self.store
            .remove_by_id(self.entity, mapper.id())
            .ok()
            .flatten()
    }

    /// Returns `true` if the entity holds a `C`.
    #[must_use]
    pub fn has<C: Component>(&self) -> bool {
        self.store.has::<C>(self.entity)
    }

    /// Gets component `C`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if the entity has no `C`.
    pub fn get<C: Component>(&self) -> EcsResult<&C> {
        self.store.get::<C>(self.entity)
    }

    /// Gets component `C` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if the entity has no `C`.
    pub fn get_mut<C: Component>(&mut self) -> EcsResult<&mut C> {
        self.store.get_mut::<C>(self.entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Position(i32, i32);
    impl Component for Position {}

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Physics(f32);
    impl Component for Physics {}

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Dead;
    impl Component for Dead {}

    #[test]
    fn test_create_with_setup() {
        let mut store = EntityStore::new(8);
        let entity = store.create(|e| {
            e.add(Position(1, 2));
            e.add(Physics(0.5));
        });

        assert!(store.is_alive(entity));
        assert_eq!(store.get::<Position>(entity), Ok(&Position(1, 2)));
        assert!(store.has::<Physics>(entity));
        assert!(!store.has::<Dead>(entity));
        assert_eq!(store.mask(entity).unwrap().count(), 2);
    }

    #[test]
    fn test_missing_component_is_an_error() {
        let mut store = EntityStore::new(8);
        let entity = store.create(|_| {});

        // Unregistered type and registered-but-absent type both fail
        let err = store.get::<Position>(entity).unwrap_err();
        assert!(matches!(err, EcsError::MissingComponent { entity: e, .. } if e == entity));

        store.create(|e| {
            e.add(Position(0, 0));
        });
        assert!(store.get_mut::<Position>(entity).is_err());
    }

    #[test]
    fn test_add_then_remove_component() {
        let mut store = EntityStore::new(8);
        let entity = store.create(|e| {
            e.add(Position(3, 4));
        });

        let removed = store
            .configure_entity(entity, |e| e.remove::<Position>())
            .unwrap();
        assert_eq!(removed, Some(Position(3, 4)));
        assert!(!store.has::<Position>(entity));
        assert!(store.get::<Position>(entity).is_err());
        assert!(store.mask(entity).unwrap().is_empty());

        // Removing again is a no-op
        let again = store.configure_entity(entity, |e| e.remove::<Position>()).unwrap();
        assert_eq!(again, None);
    }

    #[test]
    fn test_double_add_overwrites_without_duplicating_membership() {
        let mut store = EntityStore::new(8);
        let family = store.family(&FamilyDef::new().all_of::<Position>());
        let entity = store.create(|e| {
            e.add(Position(1, 1));
        });

        let previous = store
            .configure_entity(entity, |e| e.add(Position(2, 2)))
            .unwrap();
        assert_eq!(previous, Some(Position(1, 1)));
        assert_eq!(store.get::<Position>(entity), Ok(&Position(2, 2)));
        assert_eq!(store.family_entities(family), &[entity]);
    }

    #[test]
    fn test_family_follows_configure() {
        let mut store = EntityStore::new(8);
        let family = store.family(
            &FamilyDef::new()
                .all_of::<Position>()
                .all_of::<Physics>()
                .none_of::<Dead>(),
        );

        let entity = store.create(|e| {
            e.add(Position(0, 0));
            e.add(Physics(1.0));
        });
        assert_eq!(store.family_entities(family), &[entity]);

        store
            .configure_entity(entity, |e| {
                e.add(Dead);
            })
            .unwrap();
        assert!(store.family_entities(family).is_empty());

        store
            .configure_entity(entity, |e| {
                e.remove::<Dead>();
            })
            .unwrap();
        assert_eq!(store.family_entities(family), &[entity]);
    }

    #[test]
    fn test_remove_entity_clears_everything() {
        let mut store = EntityStore::new(8);
        let with_pos = store.family(&FamilyDef::new().all_of::<Position>());
        let everything = store.family(&FamilyDef::new());

        let entity = store.create(|e| {
            e.add(Position(5, 5));
            e.add(Dead);
        });
        assert_eq!(store.family_entities(everything), &[entity]);

        store.remove(entity).unwrap();
        assert!(!store.is_alive(entity));
        assert!(store.family_entities(with_pos).is_empty());
        assert!(store.family_entities(everything).is_empty());
        let position = store.components().id_of::<Position>().unwrap();
        assert!(store.components().storage::<Position>(position).unwrap().is_empty());

        // The recycled id starts empty
        let reused = store.create(|_| {});
        assert_eq!(reused, entity);
        assert!(!store.has::<Position>(reused));
        assert!(!store.has::<Dead>(reused));
    }

    #[test]
    fn test_unknown_entity_policy() {
        let mut store = EntityStore::new(8);
        let entity = store.create(|_| {});
        store.remove(entity).unwrap();

        assert_eq!(store.remove(entity), Err(EcsError::UnknownEntity { entity }));
        assert_eq!(
            store.remove(Entity::new(42)),
            Err(EcsError::UnknownEntity {
                entity: Entity::new(42)
            })
        );
        let configured = store.configure_entity(entity, |e| {
            e.add(Dead);
        });
        assert_eq!(configured, Err(EcsError::UnknownEntity { entity }));
    }

    #[test]
    fn test_runtime_family_backfills() {
        let mut store = EntityStore::new(8);
        let a = store.create(|e| {
            e.add(Position(0, 0));
        });
        let _b = store.create(|e| {
            e.add(Physics(0.0));
        });
        let c = store.create(|e| {
            e.add(Position(1, 1));
        });

        let family = store.family(&FamilyDef::new().all_of::<Position>());
        assert_eq!(store.family_entities(family), &[a, c]);

        // Same definition resolves to the same family
        assert_eq!(store.family(&FamilyDef::new().all_of::<Position>()), family);
    }

    #[test]
    fn test_any_of() {
        let mut store = EntityStore::new(8);
        let family = store.family(&FamilyDef::new().any_of::<Position>().any_of::<Physics>());

        let a = store.create(|e| {
            e.add(Physics(1.0));
        });
        let _none = store.create(|e| {
            e.add(Dead);
        });
        assert_eq!(store.family_entities(family), &[a]);

        store
            .configure_entity(a, |e| {
                e.add(Position(0, 0));
                e.remove::<Physics>();
            })
            .unwrap();
        assert_eq!(store.family_entities(family), &[a]);

        store
            .configure_entity(a, |e| {
                e.remove::<Position>();
            })
            .unwrap();
        assert!(store.family_entities(family).is_empty());
    }

    #[test]
    fn test_remove_all() {
        let mut store = EntityStore::new(2);
        for i in 0..5 {
            store.create(|e| {
                e.add(Position(i, i));
            });
        }
        store.remove_all();
        assert_eq!(store.alive_count(), 0);
        assert_eq!(store.iter_alive().count(), 0);
    }

    #[test]
    fn test_editor_accessors() {
        let mut store = EntityStore::new(2);
        let physics = store.mapper::<Physics>();
        let entity = store.create(|e| {
            e.add_with(&physics, Physics(2.0));
            assert!(e.has::<Physics>());
            if let Ok(p) = e.get_mut::<Physics>() {
                p.0 *= 2.0;
            }
            assert_eq!(e.get::<Physics>(), Ok(&Physics(4.0)));
        });

        let removed = store
            .configure_entity(entity, |e| {
                assert_eq!(e.entity(), entity);
                e.remove_with(&physics)
            })
            .unwrap();
        assert_eq!(removed, Some(Physics(4.0)));
    }

    #[test]
    fn test_has_reads_the_mask() {
        let mut store = EntityStore::new(4);
        let physics = store.mapper::<Physics>();
        let entity = store.create(|e| {
            e.add(Physics(1.0));
        });

        assert!(store.mask(entity).unwrap().contains(physics.id()));
        assert!(store.has_by_id(entity, physics.id()));
        assert!(physics.has(&store, entity));

        store
            .configure_entity(entity, |e| e.remove::<Physics>())
            .unwrap();
        assert!(!store.mask(entity).unwrap().contains(physics.id()));
        assert!(!store.has_by_id(entity, physics.id()));

        // Dead and never-created entities have no mask at all
        store.remove(entity).unwrap();
        assert!(!store.has_by_id(entity, physics.id()));
        assert!(!store.has_by_id(Entity::new(40), physics.id()));
    }
}
