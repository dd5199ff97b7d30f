//! Game rules for connect four.
//!
//! Pure functions over a [`Board`]. Every client runs these locally after
//! each observed board change; nothing here touches the store.

pub mod draw;
pub mod win;

pub use draw::is_full;
pub use win::check_winner;

use super::{Board, Verdict};
use tracing::{debug, instrument};

/// Creates an empty 6x7 board.
pub fn new_board() -> Board {
    Board::new()
}

/// Evaluates a board.
///
/// The win scan runs to completion before the full-board check: the move
/// that fills the last cell can also complete a line, and that is a win.
#[instrument(skip(board))]
pub fn evaluate(board: &Board) -> Verdict {
    if let Some(slot) = check_winner(board) {
        debug!(?slot, "Line found");
        return Verdict::Win(slot);
    }
    if is_full(board) {
        debug!("Board full without a line");
        return Verdict::Draw;
    }
    Verdict::Ongoing
}
