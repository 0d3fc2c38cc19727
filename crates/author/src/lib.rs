//! Authoring: the hand tools that plan and commit topology changes, and the
//! interactive force/friction tools applied during a tick.
//!
//! # Invariants
//! - Planning (`get_*_hand`) never mutates the world.
//! - Committing requires a valid hand planned against the current build
//!   version; anything else is an error, not a silent no-op.

pub mod adjacency;
pub mod belt;
pub mod build;
pub mod delete;
pub mod error;
pub mod hand;
pub mod tools;

pub use belt::{AddBeltHand, get_add_belt_hand};
pub use build::{BuildHand, BuildPlan, BuildRejection, Network, build, build_belt, build_gear, get_build_hand};
pub use delete::{DeleteHand, execute_delete, get_delete_hand};
pub use error::BuildError;
pub use hand::{Hand, tick};
pub use tools::{
    ApplyForceHand, ApplyFrictionHand, ConfigureHand, execute_configure, gear_at,
    update_apply_force, update_apply_friction, update_configure,
};
