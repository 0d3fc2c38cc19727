use gearbox_common::{EntityId, TileKey};

/// Invariant violations in the world store.
///
/// These are programming errors in the caller. The simulation must stop when
/// one surfaces; nothing here is meant to be recovered from in place.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    #[error("entity {0} already exists")]
    DuplicateEntity(EntityId),
    #[error("entity {0} not found")]
    MissingEntity(EntityId),
    #[error("entity {0} is not a gear")]
    NotAGear(EntityId),
    #[error("tile {tile} already occupied by {occupant}")]
    TileOccupied { tile: TileKey, occupant: EntityId },
    #[error("tile {tile} does not hold the expected occupant {expected}")]
    TileMismatch { tile: TileKey, expected: EntityId },
    #[error("connection {from} -> {to} has no reciprocal")]
    AsymmetricConnection { from: EntityId, to: EntityId },
    #[error("connection {from} -> {to} joins gears of mismatched radius")]
    MismatchedConnectionRadius { from: EntityId, to: EntityId },
    #[error("committed network rooted at {0} is kinematically inconsistent")]
    InconsistentNetwork(EntityId),
    #[error("entity {id} replaced with a different shape")]
    ShapeMismatch { id: EntityId },
}
