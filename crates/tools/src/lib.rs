//! Developer tooling: read-only queries over a gear world for the CLI and
//! debugging.

pub mod inspector;

pub use inspector::{EntityInfo, InspectError, NetworkInfo, WorldInspector, WorldSummary};
