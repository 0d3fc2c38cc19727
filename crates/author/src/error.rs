use gearbox_kernel::WorldError;

/// Errors from committing a hand.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("hand is not valid and cannot be committed")]
    InvalidHand,
    #[error("hand was planned at build version {planned}, world is at {current}")]
    StaleHand { planned: u64, current: u64 },
    #[error(transparent)]
    World(#[from] WorldError),
}
