//! # Component Mappers
//!
//! A mapper is a resolved, typed handle on one component type: it carries
//! the [`ComponentId`] so per-entity access skips the type lookup. Mappers
//! are `Copy` and hold no borrow; every call takes the store explicitly,
//! which lets a system keep mappers in its fields and still receive the
//! store mutably each tick.
//!
//! Inside a system the store is reached through the [`SystemContext`],
//! which offers no component access of its own: mappers are the only way
//! a system reads or writes components.

use std::fmt;
use std::marker::PhantomData;

use super::component::{Component, ComponentId};
use super::entity::Entity;
use super::store::EntityStore;
use super::system::SystemContext;
use crate::error::EcsResult;

mod sealed {
    pub trait Sealed {}

    /// Only this module can build one, so only mappers can call through
    /// [`super::StoreAccess`].
    #[derive(Clone, Copy, Debug)]
    pub struct Token(pub(super) ());
}

/// Something a [`ComponentMapper`] can read and write components through.
///
/// Implemented by [`EntityStore`] and [`SystemContext`]; sealed.
pub trait StoreAccess: sealed::Sealed {
    /// Shared access to the underlying store.
    #[doc(hidden)]
    fn store(&self, token: sealed::Token) -> &EntityStore;

    /// Exclusive access to the underlying store.
    #[doc(hidden)]
    fn store_mut(&mut self, token: sealed::Token) -> &mut EntityStore;
}

impl sealed::Sealed for EntityStore {}

impl StoreAccess for EntityStore {
    #[inline]
    fn store(&self, _token: sealed::Token) -> &EntityStore {
        self
    }

    #[inline]
    fn store_mut(&mut self, _token: sealed::Token) -> &mut EntityStore {
        self
    }
}

impl sealed::Sealed for SystemContext<'_> {}

impl StoreAccess for SystemContext<'_> {
    #[inline]
    fn store(&self, _token: sealed::Token) -> &EntityStore {
        self.entity_store()
    }

    #[inline]
    fn store_mut(&mut self, _token: sealed::Token) -> &mut EntityStore {
        self.entity_store_mut()
    }
}

const TOKEN: sealed::Token = sealed::Token(());

/// Typed accessor for component `C`.
///
/// Obtained from [`EntityStore::mapper`], a world, or injected into a
/// system at build time.
pub struct ComponentMapper<C: Component> {
    id: ComponentId,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Component> ComponentMapper<C> {
    pub(crate) const fn new(id: ComponentId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Id of the mapped component type.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.id
    }

    /// Gets the component of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`](crate::EcsError::MissingComponent)
    /// if the entity has no `C`.
    #[inline]
    pub fn get<'s, S>(&self, access: &'s S, entity: Entity) -> EcsResult<&'s C>
    where
        S: StoreAccess + ?Sized,
    {
        access.store(TOKEN).get_by_id(entity, self.id)
    }

    /// Gets the component of `entity` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`](crate::EcsError::MissingComponent)
    /// if the entity has no `C`.
    #[inline]
    pub fn get_mut<'s, S>(&self, access: &'s mut S, entity: Entity) -> EcsResult<&'s mut C>
    where
        S: StoreAccess + ?Sized,
    {
        access.store_mut(TOKEN).get_mut_by_id(entity, self.id)
    }

    /// Gets the component of `entity`, or `None`.
    #[inline]
    #[must_use]
    pub fn try_get<'s, S>(&self, access: &'s S, entity: Entity) -> Option<&'s C>
    where
        S: StoreAccess + ?Sized,
    {
        access.store(TOKEN).get_by_id(entity, self.id).ok()
    }

    /// Returns `true` if `entity` holds a `C`. Reads the entity's mask only.
    #[inline]
    #[must_use]
    pub fn has<S>(&self, access: &S, entity: Entity) -> bool
    where
        S: StoreAccess + ?Sized,
    {
        access.store(TOKEN).has_by_id(entity, self.id)
    }

    /// Adds or overwrites the component of `entity`; families are updated
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`](crate::EcsError::UnknownEntity)
    /// if `entity` is not alive.
    #[inline]
    pub fn add<S>(&self, access: &mut S, entity: Entity, value: C) -> EcsResult<Option<C>>
    where
        S: StoreAccess + ?Sized,
    {
        access.store_mut(TOKEN).add_by_id(entity, self.id, value)
    }

    /// Removes the component of `entity`. Absent components are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`](crate::EcsError::UnknownEntity)
    /// if `entity` is not alive.
    #[inline]
    pub fn remove<S>(&self, access: &mut S, entity: Entity) -> EcsResult<Option<C>>
    where
        S: StoreAccess + ?Sized,
    {
        access.store_mut(TOKEN).remove_by_id(entity, self.id)
    }
}

impl<C: Component> Clone for ComponentMapper<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Component> Copy for ComponentMapper<C> {}

impl<C: Component> fmt::Debug for ComponentMapper<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMapper")
            .field("component", &std::any::type_name::<C>())
            .field("id", &self.id)
            .finish()
    }
}
