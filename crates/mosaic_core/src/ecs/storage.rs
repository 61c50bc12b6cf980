//! # Component Storage
//!
//! Sparse-to-dense storage for a single component type.
//!
//! The storage uses a sparse set strategy:
//! - `sparse[entity]` holds the slot of the entity's value in `dense`
//! - Values are packed contiguously, so iteration is cache-friendly
//! - Removal swaps the last value into the hole: O(1), no shifting
//!
//! Storages never touch masks or families themselves; the
//! [`EntityStore`](super::EntityStore) keeps those in step.

use std::any::{type_name, Any};

use super::component::Component;
use super::entity::Entity;

/// Sparse-slot marker for "no value".
const EMPTY: u32 = u32::MAX;

/// Storage for a single component type.
///
/// This storage guarantees:
/// - O(1) amortized insert, lookup and removal by entity
/// - Values of one type packed contiguously
/// - Sparse array growth is geometric, never per insert
///
/// # Type Parameters
///
/// * `C` - The component type to store
pub struct ComponentStorage<C: Component> {
    /// Entity index → slot in `dense`, or `EMPTY`.
    sparse: Vec<u32>,
    /// Packed component values.
    dense: Vec<C>,
    /// Owner of each packed value, parallel to `dense`.
    owners: Vec<Entity>,
}

impl<C: Component> ComponentStorage<C> {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty storage with room for `capacity` entities.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sparse: vec![EMPTY; capacity],
            dense: Vec::with_capacity(capacity),
            owners: Vec::with_capacity(capacity),
        }
    }

    /// Number of stored values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Returns `true` if no value is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    #[inline]
    fn slot(&self, entity: Entity) -> Option<usize> {
        match self.sparse.get(entity.index()) {
            Some(&slot) if slot != EMPTY => Some(slot as usize),
            _ => None,
        }
    }

    /// Returns `true` if `entity` has a value in this storage.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.slot(entity).is_some()
    }

    /// Gets the value of `entity`.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&C> {
        self.slot(entity).map(|slot| &self.dense[slot])
    }

    /// Gets the value of `entity` mutably.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut C> {
        self.slot(entity).map(move |slot| &mut self.dense[slot])
    }

    /// Stores `value` for `entity`.
    ///
    /// # Returns
    ///
    /// The previous value if the entity already had one (it is overwritten
    /// in place), `None` otherwise.
    #[allow(clippy::cast_possible_truncation)]
    pub fn insert(&mut self, entity: Entity, value: C) -> Option<C> {
        if let Some(slot) = self.slot(entity) {
            return Some(std::mem::replace(&mut self.dense[slot], value));
        }

        let index = entity.index();
        if index >= self.sparse.len() {
            let grown = (index + 1).max(self.sparse.len() * 2);
            self.sparse.resize(grown, EMPTY);
        }

        self.sparse[index] = self.dense.len() as u32;
        self.dense.push(value);
        self.owners.push(entity);
        None
    }

    /// Removes and returns the value of `entity`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn remove(&mut self, entity: Entity) -> Option<C> {
        let slot = self.slot(entity)?;
        self.sparse[entity.index()] = EMPTY;

        // Fill the hole with the last value
        let value = self.dense.swap_remove(slot);
        self.owners.swap_remove(slot);
        if let Some(&moved) = self.owners.get(slot) {
            self.sparse[moved.index()] = slot as u32;
        }

        Some(value)
    }

    /// Iterates over `(entity, value)` pairs in packed order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &C)> {
        self.owners.iter().copied().zip(self.dense.iter())
    }

    /// Iterates mutably over `(entity, value)` pairs in packed order.
    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut C)> {
        self.owners.iter().copied().zip(self.dense.iter_mut())
    }

    /// Entities holding a value, in packed order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.owners
    }

    /// Packed values, parallel to [`entities`](Self::entities).
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[C] {
        &self.dense
    }

    /// Mutable packed values, parallel to [`entities`](Self::entities).
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [C] {
        &mut self.dense
    }
}

impl<C: Component> Default for ComponentStorage<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a [`ComponentStorage`], used where the component
/// type is only known by id (entity removal, registry bookkeeping).
pub trait ErasedStorage: Any {
    /// Type name of the stored component.
    fn component_name(&self) -> &'static str;

    /// Returns `true` if `entity` has a value.
    fn contains_entity(&self, entity: Entity) -> bool;

    /// Drops the value of `entity`. Returns `true` if there was one.
    fn remove_entity(&mut self, entity: Entity) -> bool;

    /// Number of stored values.
    fn stored(&self) -> usize;

    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> ErasedStorage for ComponentStorage<C> {
    fn component_name(&self) -> &'static str {
        type_name::<C>()
    }

    fn contains_entity(&self, entity: Entity) -> bool {
        self.contains(entity)
    }

    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn stored(&self) -> usize {
        self.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    fn e(index: u32) -> Entity {
        Entity::new(index)
    }

    #[test]
    fn test_insert_get() {
        let mut storage: ComponentStorage<Health> = ComponentStorage::with_capacity(4);
        assert!(storage.is_empty());

        assert_eq!(storage.insert(e(2), Health(10)), None);
        assert_eq!(storage.get(e(2)), Some(&Health(10)));
        assert!(storage.contains(e(2)));
        assert!(!storage.contains(e(3)));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_insert_overwrites() {
        let mut storage = ComponentStorage::new();
        storage.insert(e(0), Health(1));

        assert_eq!(storage.insert(e(0), Health(2)), Some(Health(1)));
        assert_eq!(storage.get(e(0)), Some(&Health(2)));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_grows_past_capacity() {
        let mut storage = ComponentStorage::with_capacity(2);
        storage.insert(e(1000), Health(7));
        assert_eq!(storage.get(e(1000)), Some(&Health(7)));
        assert!(storage.get(e(999)).is_none());
    }

    #[test]
    fn test_remove_keeps_others_addressable() {
        let mut storage = ComponentStorage::new();
        for i in 0..5 {
            storage.insert(e(i), Health(i * 10));
        }

        assert_eq!(storage.remove(e(1)), Some(Health(10)));
        assert_eq!(storage.remove(e(1)), None);

        // The last value was swapped into slot 1
        assert_eq!(storage.entities(), &[e(0), e(4), e(2), e(3)]);
        for i in [0, 2, 3, 4] {
            assert_eq!(storage.get(e(i)), Some(&Health(i * 10)));
        }

        assert_eq!(storage.remove(e(3)), Some(Health(30)));
        assert_eq!(storage.len(), 3);
    }

    #[test]
    fn test_get_mut_and_iter() {
        let mut storage = ComponentStorage::new();
        storage.insert(e(3), Health(1));
        storage.insert(e(5), Health(2));

        if let Some(health) = storage.get_mut(e(5)) {
            health.0 += 40;
        }
        for (_, health) in storage.iter_mut() {
            health.0 += 1;
        }

        let collected: Vec<_> = storage.iter().map(|(ent, h)| (ent, *h)).collect();
        assert_eq!(collected, vec![(e(3), Health(2)), (e(5), Health(43))]);
        assert_eq!(storage.as_slice().len(), 2);
    }

    #[test]
    fn test_erased_removal() {
        let mut storage = ComponentStorage::new();
        storage.insert(e(0), Health(5));

        let erased: &mut dyn ErasedStorage = &mut storage;
        assert!(erased.contains_entity(e(0)));
        assert_eq!(erased.stored(), 1);
        assert!(erased.component_name().ends_with("Health"));
        assert!(erased.remove_entity(e(0)));
        assert!(!erased.remove_entity(e(0)));
        assert!(storage.is_empty());
    }
}
