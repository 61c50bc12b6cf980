//! # ECS Error Types
//!
//! All errors that can occur while configuring or running a world.
//!
//! Configuration-time variants abort `WorldBuilder::build`; no partial
//! world is ever handed out. Runtime variants propagate out of the call
//! that produced them, including out of `World::update` when raised inside
//! a system body.

use thiserror::Error;

use crate::ecs::Entity;

/// Errors that can occur in the ECS runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The same system type was declared twice.
    #[error("system `{system}` is registered more than once")]
    DuplicateSystem {
        /// Type name of the system.
        system: &'static str,
    },

    /// The same injectable type was declared twice.
    #[error("injectable `{injectable}` is registered more than once")]
    DuplicateInjectable {
        /// Type name of the injectable value.
        injectable: &'static str,
    },

    /// A system asked for a dependency that nobody provided.
    #[error("system `{system}` depends on `{dependency}`, which was never injected")]
    UnresolvedDependency {
        /// Type name of the system being constructed.
        system: &'static str,
        /// Type name of the missing dependency.
        dependency: &'static str,
    },

    /// Injectables were registered but no system asked for them.
    #[error("injectables never used by any system: {}", .injectables.join(", "))]
    UnusedInjectables {
        /// Type names of the unused injectables.
        injectables: Vec<&'static str>,
    },

    /// Accessed a component the entity does not have.
    #[error("entity {entity} has no component `{component}`")]
    MissingComponent {
        /// The entity that was accessed.
        entity: Entity,
        /// Type name of the component.
        component: &'static str,
    },

    /// The entity is not alive (never created, or already removed).
    #[error("entity {entity} is not alive")]
    UnknownEntity {
        /// The offending entity.
        entity: Entity,
    },

    /// The system type is not part of this world.
    #[error("system `{system}` is not registered in this world")]
    UnknownSystem {
        /// Type name of the system.
        system: &'static str,
    },

    /// Invalid configuration value or document.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A failure raised by user code inside a system body.
    #[error("system failure: {0}")]
    System(String),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
