mod opponent;
pub mod rules;
mod types;

pub use opponent::{HeuristicOpponent, winning_column};
pub use rules::{evaluate, new_board};
pub use types::{
    Board, COLS, Cell, DisplayAlphabet, DisplayBoard, DropError, Outcome, ROWS, Slot, Verdict,
};
