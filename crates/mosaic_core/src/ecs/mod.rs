//! # Entity Component System
//!
//! A single-threaded ECS runtime built around incremental families.
//!
//! ## Design Philosophy
//!
//! - Entities are plain recycled integer ids
//! - Components live in one sparse-set storage per type
//! - Families (entity sets matching all/none/any component rules) are
//!   updated on every component bit transition, never re-scanned
//! - Systems run in declaration order and may mutate the world mid-pass

mod component;
mod entity;
mod family;
mod inject;
mod mapper;
mod mask;
mod scheduler;
mod storage;
mod store;
mod system;
mod world;

pub use component::{Component, ComponentId, ComponentKey, ComponentRegistry};
pub use entity::{Entity, EntityRegistry};
pub use family::{Family, FamilyDef, FamilyId, FamilyIndex, FamilyMasks};
pub use inject::{Injectables, Injector};
pub use mapper::{ComponentMapper, StoreAccess};
pub use mask::{ComponentMask, MaskIter};
pub use scheduler::Scheduler;
pub use storage::{ComponentStorage, ErasedStorage};
pub use store::{EntityEditor, EntityStore};
pub use system::{
    AsAny, EntityComparator, Interval, IntervalSystem, IteratingSystem, SortPolicy,
    SystemContext, SystemDescriptor,
};
pub use world::{World, WorldBuilder};
