//! # Entity Management
//!
//! Entities are plain integer identifiers. The registry hands out ids,
//! recycles removed ones (smallest first, which keeps the per-entity arrays
//! short) and owns the component mask of every live entity.

use std::collections::BTreeSet;
use std::fmt;

use super::mask::ComponentMask;

/// Unique identifier for an entity.
///
/// Ids are recycled after removal; there is no generation counter, so a
/// handle kept past `remove` addresses whichever entity reuses the id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// Creates an entity handle from its raw id.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the id as an index into per-entity arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-id slot: liveness plus the current component mask.
#[derive(Clone, Debug, Default)]
struct EntitySlot {
    /// Whether this id is currently live.
    alive: bool,
    /// Components held by the entity. Empty while dead.
    mask: ComponentMask,
}

/// Allocates entity ids and tracks their component masks.
///
/// # Invariants
///
/// - An id is either live or in `free`, never both.
/// - Ids below `next` that are not live are in `free`.
#[derive(Debug)]
pub struct EntityRegistry {
    /// Slots indexed by entity id. Grown geometrically.
    slots: Vec<EntitySlot>,
    /// Removed ids awaiting reuse; smallest first.
    free: BTreeSet<u32>,
    /// Next never-used id.
    next: u32,
    /// Number of live entities.
    alive_count: usize,
}

impl EntityRegistry {
    /// Creates a registry with slots preallocated for `capacity` ids.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![EntitySlot::default(); capacity],
            free: BTreeSet::new(),
            next: 0,
            alive_count: 0,
        }
    }

    /// Number of preallocated slots. Grows on demand.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Allocates an id with an empty mask.
    ///
    /// Reuses the smallest removed id if there is one, otherwise mints the
    /// next never-used id.
    ///
    /// # Panics
    ///
    /// Panics if all `u32` ids are live.
    pub fn create(&mut self) -> Entity {
        let id = match self.free.pop_first() {
            Some(id) => id,
            None => {
                let id = self.next;
                self.next = self.next.checked_add(1).expect("entity id space exhausted");
                id
            }
        };

        let entity = Entity(id);
        let index = entity.index();
        if index >= self.slots.len() {
            let grown = (index + 1).max(self.slots.len() * 2);
            self.slots.resize(grown, EntitySlot::default());
        }

        let slot = &mut self.slots[index];
        slot.alive = true;
        slot.mask.clear();
        self.alive_count += 1;

        entity
    }

    /// Returns the id to the free set.
    ///
    /// The caller must already have emptied the entity's mask through the
    /// storages so families saw every bit go away.
    ///
    /// # Returns
    ///
    /// `true` if the entity was live, `false` if it was unknown or already
    /// removed (nothing changes in that case).
    pub fn remove(&mut self, entity: Entity) -> bool {
        let Some(slot) = self.slots.get_mut(entity.index()) else {
            return false;
        };
        if !slot.alive {
            return false;
        }

        debug_assert!(slot.mask.is_empty(), "removing {entity} with components attached");
        slot.alive = false;
        slot.mask.clear();
        self.alive_count -= 1;
        self.free.insert(entity.0);
        true
    }

    /// Checks if an entity is live.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots.get(entity.index()).is_some_and(|slot| slot.alive)
    }

    /// Component mask of a live entity.
    #[inline]
    #[must_use]
    pub fn mask(&self, entity: Entity) -> Option<&ComponentMask> {
        self.slots
            .get(entity.index())
            .filter(|slot| slot.alive)
            .map(|slot| &slot.mask)
    }

    /// Mutable component mask of a live entity.
    #[inline]
    pub(crate) fn mask_mut(&mut self, entity: Entity) -> Option<&mut ComponentMask> {
        self.slots
            .get_mut(entity.index())
            .filter(|slot| slot.alive)
            .map(|slot| &mut slot.mask)
    }

    /// Iterates over live entities in ascending id order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots
            .iter()
            .take(self.next as usize)
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, _)| Entity::new(u32::try_from(index).unwrap_or(u32::MAX)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::ComponentId;

    #[test]
    fn test_entity_roundtrip() {
        let entity = Entity::new(12345);
        assert_eq!(entity.id(), 12345);
        assert_eq!(entity.index(), 12345);
        assert_eq!(entity.to_string(), "#12345");
    }

    #[test]
    fn test_create_sequential() {
        let mut registry = EntityRegistry::new(4);
        let ids: Vec<u32> = (0..3).map(|_| registry.create().id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(registry.alive_count(), 3);
    }

    #[test]
    fn test_reuses_smallest_removed_id() {
        let mut registry = EntityRegistry::new(4);
        let entities: Vec<Entity> = (0..6).map(|_| registry.create()).collect();

        assert!(registry.remove(entities[4]));
        assert!(registry.remove(entities[1]));
        assert!(registry.remove(entities[3]));

        assert_eq!(registry.create(), entities[1]);
        assert_eq!(registry.create(), entities[3]);
        assert_eq!(registry.create(), entities[4]);
        // Free set drained: mint a new id
        assert_eq!(registry.create(), Entity::new(6));
    }

    #[test]
    fn test_remove_unknown_is_rejected() {
        let mut registry = EntityRegistry::new(4);
        let entity = registry.create();

        assert!(!registry.remove(Entity::new(99)));
        assert!(registry.remove(entity));
        assert!(!registry.remove(entity));
        assert!(!registry.is_alive(entity));
        assert_eq!(registry.alive_count(), 0);
    }

    #[test]
    fn test_grows_geometrically() {
        let mut registry = EntityRegistry::new(2);
        for _ in 0..3 {
            registry.create();
        }
        assert_eq!(registry.capacity(), 4);

        for _ in 0..2 {
            registry.create();
        }
        assert_eq!(registry.capacity(), 8);
    }

    #[test]
    fn test_mask_only_for_live() {
        let mut registry = EntityRegistry::new(2);
        let entity = registry.create();

        registry
            .mask_mut(entity)
            .unwrap()
            .insert(ComponentId::from_index(3));
        assert!(registry.mask(entity).unwrap().contains(ComponentId::from_index(3)));

        registry.mask_mut(entity).unwrap().clear();
        registry.remove(entity);
        assert!(registry.mask(entity).is_none());
        assert!(registry.mask_mut(entity).is_none());
    }

    #[test]
    fn test_iter_alive_ascending() {
        let mut registry = EntityRegistry::new(8);
        let entities: Vec<Entity> = (0..5).map(|_| registry.create()).collect();
        registry.remove(entities[2]);

        let alive: Vec<u32> = registry.iter_alive().map(Entity::id).collect();
        assert_eq!(alive, vec![0, 1, 3, 4]);
    }
}
