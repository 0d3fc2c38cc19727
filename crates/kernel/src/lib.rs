//! Gear kernel: authoritative world state, connection-graph propagation,
//! energy-preserving network merges, and per-frame integration.
//!
//! # Invariants
//! - Connections are stored symmetrically with reciprocal multipliers.
//! - Every tile an entity covers points back at it.
//! - Committed networks are kinematically consistent; an inconsistent one is
//!   an invariant violation, not a validation failure.

pub mod config;
pub mod energy;
pub mod entity;
pub mod error;
pub mod propagate;
pub mod tick;
pub mod world;

pub use config::SimConfig;
pub use entity::{
    BELT_MASS, BeltEntity, BeltIntersectionEntity, BeltItem, Behavior, Connection,
    ConnectionType, Entity, GearEntity, MAX_GEAR_RADIUS,
};
pub use error::WorldError;
pub use propagate::{AccelerationMap, EntityLookup, Overlay, get_acceleration_map};
pub use tick::{ActiveTool, TickInput, apply_force, apply_friction, tick};
pub use world::{Tile, World};
