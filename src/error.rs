use thiserror::Error;

use crate::feature::FeatureId;

/// Errors surfaced to the turn driver.
///
/// Everything here is a broken caller contract except `Unplaceable`, which is
/// what the stack reports once its reshuffle budget is spent. None of them
/// leave the world half-mutated: checks run before any state changes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("tile cannot be placed at ({x}, {y})")]
    IllegalPlacement { x: i32, y: i32 },
    #[error("tile is already anchored in a world")]
    TileAlreadyPlaced,
    #[error("feature {0:?} cannot be claimed")]
    NotOwnable(FeatureId),
    #[error("feature {0:?} is not live in this world")]
    UnknownFeature(FeatureId),
    #[error("no player with index {0}")]
    UnknownPlayer(usize),
    #[error("player {0} has no avatars left")]
    NoAvatarsLeft(usize),
    #[error("no legal placement after {attempts} draws")]
    Unplaceable { attempts: u32 },
}
