//! Heuristic computer opponent for local play.
//!
//! Three tiers: take an immediate win, else block the opponent's immediate
//! win, else play a random legal column. Every tier asks
//! [`evaluate`](super::rules::evaluate) about a hypothetical copy of the
//! board instead of looking for lines itself.

use super::rules::evaluate;
use super::{Board, Slot, Verdict};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, instrument};

/// Computer player that plays as one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeuristicOpponent {
    slot: Slot,
}

impl HeuristicOpponent {
    /// Creates an opponent playing as `slot`.
    pub fn new(slot: Slot) -> Self {
        Self { slot }
    }

    /// Slot this opponent plays.
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Picks a column, or `None` when the board has no legal column.
    #[instrument(skip(self, board, rng), fields(slot = ?self.slot))]
    pub fn choose_column<R: Rng + ?Sized>(&self, board: &Board, rng: &mut R) -> Option<usize> {
        if let Some(col) = winning_column(board, self.slot) {
            debug!(col, "Taking the win");
            return Some(col);
        }
        if let Some(col) = winning_column(board, self.slot.opponent()) {
            debug!(col, "Blocking the opponent");
            return Some(col);
        }
        let col = board.legal_columns().choose(rng).copied();
        debug!(?col, "Random column");
        col
    }
}

/// First column (left to right) where dropping a piece for `slot` wins.
pub fn winning_column(board: &Board, slot: Slot) -> Option<usize> {
    board.legal_columns().into_iter().find(|&col| {
        let mut hypothetical = *board;
        hypothetical.drop_piece(col, slot).is_ok() && evaluate(&hypothetical) == Verdict::Win(slot)
    })
}
