//! # MOSAIC Core
//!
//! Entity Component System runtime for simulations and games:
//! - Recycled integer entity ids
//! - Sparse-set component storage, one per type
//! - Families kept up to date incrementally on every component change
//! - Ordered systems with per-frame or fixed-step intervals and sorting
//! - Construction-time dependency injection for systems
//!
//! ## Example
//!
//! ```rust,ignore
//! use mosaic_core::{FamilyDef, SystemDescriptor, World};
//!
//! let mut world = World::builder()
//!     .system(SystemDescriptor::iterating(
//!         FamilyDef::new().all_of::<Position>().none_of::<Dead>(),
//!         MoveSystem::new,
//!     ))?
//!     .build()?;
//!
//! world.create(|e| {
//!     e.add(Position::default());
//! });
//! world.update(1.0 / 60.0)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::WorldConfig;
pub use ecs::{
    Component, ComponentMapper, Entity, EntityEditor, EntityStore, FamilyDef, FamilyId,
    Injector, Interval, IntervalSystem, IteratingSystem, SortPolicy, StoreAccess,
    SystemContext, SystemDescriptor, World, WorldBuilder,
};
pub use error::{EcsError, EcsResult};
