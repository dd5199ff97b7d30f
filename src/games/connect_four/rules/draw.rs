//! Draw detection logic for connect four.

use super::super::Board;
use tracing::instrument;

/// Checks if the board is full (all cells occupied).
///
/// A full board is only a draw once the win scan has found no line.
#[instrument(skip(board))]
pub fn is_full(board: &Board) -> bool {
    board.is_full()
}
