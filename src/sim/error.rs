/// Engine error types.

use thiserror::Error;

/// Rejected `Level::move_player` request. No state is mutated when
/// either variant is returned.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    #[error("invalid move ({dx}, {dy}): only single orthogonal steps are allowed")]
    InvalidMove { dx: i32, dy: i32 },
    #[error("game over: the player is dead or not placed")]
    GameOver,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown level symbol {symbol:?} at row {row}, column {col}")]
    UnknownSymbol { symbol: char, row: usize, col: usize },
}
