//! Win detection logic for connect four.

use super::super::{Board, COLS, Cell, ROWS, Slot};
use tracing::instrument;

/// Length of a winning line.
pub const LINE: usize = 4;

/// Run directions as (row step, column step): right, down, down-right,
/// down-left.
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Checks if there is a winner on the board.
///
/// Scans cells in row-major order and returns the owner of the first run of
/// four found starting at a cell and stepping in one of the four
/// directions.
#[instrument(skip(board))]
pub fn check_winner(board: &Board) -> Option<Slot> {
    for row in 0..ROWS {
        for col in 0..COLS {
            let Some(Cell::Occupied(slot)) = board.get(row, col) else {
                continue;
            };
            if DIRECTIONS
                .iter()
                .any(|&(dr, dc)| run_from(board, row, col, dr, dc, slot))
            {
                return Some(slot);
            }
        }
    }
    None
}

/// True if the `LINE` cells from (row, col) stepping by (dr, dc) all stay in
/// bounds and belong to `slot`.
fn run_from(board: &Board, row: usize, col: usize, dr: isize, dc: isize, slot: Slot) -> bool {
    (0..LINE as isize).all(|k| {
        let r = row as isize + dr * k;
        let c = col as isize + dc * k;
        r >= 0
            && c >= 0
            && board.get(r as usize, c as usize) == Some(Cell::Occupied(slot))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::connect_four::DisplayAlphabet;

    fn board(rows: [&str; 6]) -> Board {
        Board::parse(&rows, &DisplayAlphabet::default()).unwrap()
    }

    #[test]
    fn test_no_winner_empty_board() {
        assert_eq!(check_winner(&Board::new()), None);
    }

    #[test]
    fn test_winner_horizontal() {
        let b = board([
            "-------", "-------", "-------", "-------", "-------", "OOOO---",
        ]);
        assert_eq!(check_winner(&b), Some(Slot::PlayerOne));
    }

    #[test]
    fn test_winner_vertical() {
        let b = board([
            "--X----", "--X----", "--X----", "--X----", "-------", "-------",
        ]);
        assert_eq!(check_winner(&b), Some(Slot::PlayerTwo));
    }

    #[test]
    fn test_winner_rising_diagonal() {
        let b = board([
            "---O---", "--O----", "-O-----", "O------", "-------", "-------",
        ]);
        assert_eq!(check_winner(&b), Some(Slot::PlayerOne));
    }

    #[test]
    fn test_winner_falling_diagonal() {
        let b = board([
            "-------", "-------", "---X---", "----X--", "-----X-", "------X",
        ]);
        assert_eq!(check_winner(&b), Some(Slot::PlayerTwo));
    }

    #[test]
    fn test_three_is_not_a_line() {
        let b = board([
            "-------", "-------", "-------", "-------", "X------", "OOO-XX-",
        ]);
        assert_eq!(check_winner(&b), None);
    }

    #[test]
    fn test_line_does_not_wrap_rows() {
        // Four in row-major order across a row boundary is not a line.
        let b = board([
            "-------", "-------", "-------", "-------", "------O", "OOO----",
        ]);
        assert_eq!(check_winner(&b), None);
    }
}
