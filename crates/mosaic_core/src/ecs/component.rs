//! # Component System
//!
//! Components are plain data attached to entities. Each distinct Rust type
//! gets a stable [`ComponentId`] the first time the world sees it; that id
//! is the bit position in every [`ComponentMask`](super::ComponentMask) and
//! the index into the storage table. Type identity is only consulted when
//! an id is assigned or looked up by type, never on the mapper hot path.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

use super::storage::{ComponentStorage, ErasedStorage};

/// Marker trait for ECS components.
///
/// Any `'static` type can be a component; implement the trait to opt in.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Copy)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Position {}
/// ```
pub trait Component: 'static {}

/// Stable small integer identifying a component type within one world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ComponentId(u32);

impl ComponentId {
    /// Creates an id from a raw index.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in 32 bits.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_index(index: usize) -> Self {
        assert!(index <= u32::MAX as usize, "component id overflow");
        Self(index as u32)
    }

    /// Returns the id as an index into storage tables and masks.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Type-level description of a component, resolved to a [`ComponentId`]
/// when a world is built.
#[derive(Clone, Copy)]
pub struct ComponentKey {
    type_id: TypeId,
    name: &'static str,
    /// Creates the empty storage for this type on first registration.
    make_storage: fn(usize) -> Box<dyn ErasedStorage>,
}

impl ComponentKey {
    /// Key for component type `C`.
    #[must_use]
    pub fn of<C: Component>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name: type_name::<C>(),
            make_storage: make_storage::<C>,
        }
    }

    /// Type name of the component.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentKey").field(&self.name).finish()
    }
}

fn make_storage<C: Component>(capacity: usize) -> Box<dyn ErasedStorage> {
    Box::new(ComponentStorage::<C>::with_capacity(capacity))
}

/// Assigns component ids and owns one storage per component type.
///
/// Storages are created lazily, the first time a type is registered.
pub struct ComponentRegistry {
    /// Type → assigned id.
    ids: HashMap<TypeId, ComponentId>,
    /// Indexed by `ComponentId`.
    storages: Vec<Box<dyn ErasedStorage>>,
    /// Initial capacity for new storages.
    capacity_hint: usize,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(capacity_hint: usize) -> Self {
        Self {
            ids: HashMap::new(),
            storages: Vec::new(),
            capacity_hint,
        }
    }

    /// Returns the id for `C`, assigning one (and creating its storage) if
    /// this is the first time the type is seen.
    pub fn register<C: Component>(&mut self) -> ComponentId {
        self.register_key(ComponentKey::of::<C>())
    }

    /// Same as [`register`](Self::register), from a type-erased key.
    pub fn register_key(&mut self, key: ComponentKey) -> ComponentId {
        if let Some(&id) = self.ids.get(&key.type_id) {
            return id;
        }

        let id = ComponentId::from_index(self.storages.len());
        self.storages.push((key.make_storage)(self.capacity_hint));
        self.ids.insert(key.type_id, id);
        tracing::trace!("component `{}` registered as {}", key.name, id);
        id
    }

    /// Returns the id of `C` if it has been registered.
    #[inline]
    #[must_use]
    pub fn id_of<C: Component>(&self) -> Option<ComponentId> {
        self.ids.get(&TypeId::of::<C>()).copied()
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.storages.len()
    }

    /// Returns `true` if no component type has been registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }

    /// Type name of a registered component.
    #[must_use]
    pub fn name(&self, id: ComponentId) -> &'static str {
        self.storages
            .get(id.index())
            .map_or("<unregistered>", |storage| storage.component_name())
    }

    /// Typed storage for `C` under `id`.
    ///
    /// Indexing is by `id`; the downcast only confirms that the slot holds a
    /// `ComponentStorage<C>`. Returns `None` if `id` is unknown or was
    /// assigned to another type.
    #[inline]
    #[must_use]
    pub fn storage<C: Component>(&self, id: ComponentId) -> Option<&ComponentStorage<C>> {
        self.storages
            .get(id.index())
            .and_then(|storage| storage.as_any().downcast_ref())
    }

    /// Mutable typed storage for `C` under `id`.
    #[inline]
    pub fn storage_mut<C: Component>(
        &mut self,
        id: ComponentId,
    ) -> Option<&mut ComponentStorage<C>> {
        self.storages
            .get_mut(id.index())
            .and_then(|storage| storage.as_any_mut().downcast_mut())
    }

    /// Type-erased storage under `id`.
    #[inline]
    pub(crate) fn erased_mut(&mut self, id: ComponentId) -> Option<&mut dyn ErasedStorage> {
        let storage: &mut dyn ErasedStorage = &mut **self.storages.get_mut(id.index())?;
        Some(storage)
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field(
                "components",
                &self
                    .storages
                    .iter()
                    .map(|s| s.component_name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
