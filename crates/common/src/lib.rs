//! Shared types for the gearbox workspace: entity ids, tile keys, and the
//! small amount of grid geometry every other crate leans on.

pub mod geometry;
pub mod types;

pub use geometry::{Direction, EPSILON, approx_eq, normalize_angle, wrap_unit};
pub use types::{EntityId, ParseTileKeyError, TileKey};
