//! Persistence: versioned, digest-checked world snapshots and a file-backed
//! store.
//!
//! # Invariants
//! - A loaded world has passed `World::validate`.
//! - Floats survive a save/load cycle bit for bit.

pub mod error;
pub mod snapshot;
pub mod store;

pub use error::PersistError;
pub use snapshot::{
    WORLD_SCHEMA_VERSION, WorldEnvelope, load_or_default, load_world_json, save_world_json,
    world_digest,
};
pub use store::{StoreMeta, WorldStore};
