//! Core domain types for connect four.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Number of rows on the board.
pub const ROWS: usize = 6;

/// Number of columns on the board.
pub const COLS: usize = 7;

/// One of the two fixed participant positions in a match.
///
/// The wire names (`player1` / `player2`) are shared with every other
/// client reading the same session document.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
)]
pub enum Slot {
    /// First slot. Creates the session and moves first.
    #[serde(rename = "player1")]
    #[strum(serialize = "player1")]
    PlayerOne,
    /// Second slot. Filled by the joining participant.
    #[serde(rename = "player2")]
    #[strum(serialize = "player2")]
    PlayerTwo,
}

impl Slot {
    /// Returns the other slot.
    pub fn opponent(self) -> Self {
        match self {
            Slot::PlayerOne => Slot::PlayerTwo,
            Slot::PlayerTwo => Slot::PlayerOne,
        }
    }

    /// Integer code stored in the wire board (`1` or `2`).
    pub fn code(self) -> u8 {
        match self {
            Slot::PlayerOne => 1,
            Slot::PlayerTwo => 2,
        }
    }
}

/// A cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    /// No piece.
    Empty,
    /// Piece dropped by a slot.
    Occupied(Slot),
}

impl Cell {
    /// Integer code stored in the wire board (`0`, `1` or `2`).
    pub fn code(self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Occupied(slot) => slot.code(),
        }
    }

    /// Parses a wire board code. Anything outside `0..=2` is rejected.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Cell::Empty),
            1 => Some(Cell::Occupied(Slot::PlayerOne)),
            2 => Some(Cell::Occupied(Slot::PlayerTwo)),
            _ => None,
        }
    }
}

/// Result of evaluating a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// No line yet and at least one empty cell.
    Ongoing,
    /// The slot owns four in a line.
    Win(Slot),
    /// Board full with no line.
    Draw,
}

/// Terminal result recorded in a finished session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
pub enum Outcome {
    /// Slot one connected four or won by forfeit.
    #[serde(rename = "PLAYER1_WIN")]
    #[strum(serialize = "PLAYER1_WIN")]
    PlayerOneWin,
    /// Slot two connected four or won by forfeit.
    #[serde(rename = "PLAYER2_WIN")]
    #[strum(serialize = "PLAYER2_WIN")]
    PlayerTwoWin,
    /// Board filled without a line.
    #[serde(rename = "DRAW")]
    #[strum(serialize = "DRAW")]
    Draw,
}

impl Outcome {
    /// The outcome in which `slot` wins.
    pub fn win_for(slot: Slot) -> Self {
        match slot {
            Slot::PlayerOne => Outcome::PlayerOneWin,
            Slot::PlayerTwo => Outcome::PlayerTwoWin,
        }
    }

    /// Maps a board verdict to an outcome; `None` while the game is ongoing.
    pub fn from_verdict(verdict: Verdict) -> Option<Self> {
        match verdict {
            Verdict::Ongoing => None,
            Verdict::Win(slot) => Some(Self::win_for(slot)),
            Verdict::Draw => Some(Outcome::Draw),
        }
    }

    /// The winning slot, if any.
    pub fn winner(self) -> Option<Slot> {
        match self {
            Outcome::PlayerOneWin => Some(Slot::PlayerOne),
            Outcome::PlayerTwoWin => Some(Slot::PlayerTwo),
            Outcome::Draw => None,
        }
    }
}

/// Error when dropping a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum DropError {
    /// Column index outside `0..COLS`.
    #[display("Column {} is out of bounds (must be 0-{})", _0, COLS - 1)]
    InvalidColumn(#[error(not(source))] usize),
    /// No empty cell left in the column.
    #[display("Column {} is full", _0)]
    ColumnFull(#[error(not(source))] usize),
}

/// Characters used to present a board to a local consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayAlphabet {
    /// Symbol for an empty cell.
    #[serde(default = "default_empty")]
    pub empty: char,
    /// Symbol for slot one's pieces.
    #[serde(default = "default_player_one")]
    pub player_one: char,
    /// Symbol for slot two's pieces.
    #[serde(default = "default_player_two")]
    pub player_two: char,
}

fn default_empty() -> char {
    '-'
}

fn default_player_one() -> char {
    'O'
}

fn default_player_two() -> char {
    'X'
}

impl DisplayAlphabet {
    /// Symbol for a cell.
    pub fn symbol(&self, cell: Cell) -> char {
        match cell {
            Cell::Empty => self.empty,
            Cell::Occupied(Slot::PlayerOne) => self.player_one,
            Cell::Occupied(Slot::PlayerTwo) => self.player_two,
        }
    }

    /// Cell for a symbol, if the symbol belongs to this alphabet.
    pub fn cell(&self, symbol: char) -> Option<Cell> {
        if symbol == self.empty {
            Some(Cell::Empty)
        } else if symbol == self.player_one {
            Some(Cell::Occupied(Slot::PlayerOne))
        } else if symbol == self.player_two {
            Some(Cell::Occupied(Slot::PlayerTwo))
        } else {
            None
        }
    }

    /// True when all three symbols differ.
    pub fn is_distinct(&self) -> bool {
        self.empty != self.player_one
            && self.empty != self.player_two
            && self.player_one != self.player_two
    }
}

impl Default for DisplayAlphabet {
    fn default() -> Self {
        Self {
            empty: default_empty(),
            player_one: default_player_one(),
            player_two: default_player_two(),
        }
    }
}

/// A board translated into display symbols, row 0 at the top.
pub type DisplayBoard = [[char; COLS]; ROWS];

/// 6x7 connect four board. Row 0 is the top row, row 5 the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board {
    cells: [[Cell; COLS]; ROWS],
}

impl Board {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Empty; COLS]; ROWS],
        }
    }

    /// Gets the cell at the given position.
    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Sets the cell at the given position.
    pub fn set(&mut self, row: usize, col: usize, cell: Cell) -> Result<(), &'static str> {
        let target = self
            .cells
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or("Position out of bounds")?;
        *target = cell;
        Ok(())
    }

    /// Returns all rows.
    pub fn rows(&self) -> &[[Cell; COLS]; ROWS] {
        &self.cells
    }

    /// Checks if a column has no empty cell left.
    pub fn is_column_full(&self, col: usize) -> bool {
        self.landing_row(col).is_none()
    }

    /// Lowest empty row in a column, scanning from the bottom up. `None`
    /// for a full or out-of-range column.
    pub fn landing_row(&self, col: usize) -> Option<usize> {
        if col >= COLS {
            return None;
        }
        (0..ROWS).rev().find(|&row| self.cells[row][col] == Cell::Empty)
    }

    /// Columns that can still take a piece, left to right.
    pub fn legal_columns(&self) -> Vec<usize> {
        (0..COLS).filter(|&col| !self.is_column_full(col)).collect()
    }

    /// Drops a piece into a column and returns the row where it landed.
    ///
    /// The column is scanned from the bottom row upward for the first
    /// empty cell.
    pub fn drop_piece(&mut self, col: usize, slot: Slot) -> Result<usize, DropError> {
        if col >= COLS {
            return Err(DropError::InvalidColumn(col));
        }
        let row = self.landing_row(col).ok_or(DropError::ColumnFull(col))?;
        self.cells[row][col] = Cell::Occupied(slot);
        Ok(row)
    }

    /// Checks if every cell is occupied.
    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(|c| *c != Cell::Empty)
    }

    /// Translates the board into display symbols.
    pub fn render(&self, alphabet: &DisplayAlphabet) -> DisplayBoard {
        let mut out = [[alphabet.empty; COLS]; ROWS];
        for (row, cells) in self.cells.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                out[row][col] = alphabet.symbol(*cell);
            }
        }
        out
    }

    /// Parses a board from rows of display symbols (top row first).
    pub fn parse(rows: &[&str], alphabet: &DisplayAlphabet) -> Result<Self, String> {
        if rows.len() != ROWS {
            return Err(format!("expected {} rows, got {}", ROWS, rows.len()));
        }
        let mut board = Board::new();
        for (row, line) in rows.iter().enumerate() {
            let symbols: Vec<char> = line.chars().collect();
            if symbols.len() != COLS {
                return Err(format!(
                    "row {} has {} cells, expected {}",
                    row,
                    symbols.len(),
                    COLS
                ));
            }
            for (col, symbol) in symbols.into_iter().enumerate() {
                board.cells[row][col] = alphabet
                    .cell(symbol)
                    .ok_or_else(|| format!("unknown symbol {:?} at {},{}", symbol, row, col))?;
            }
        }
        Ok(board)
    }

    /// Formats the board as a human-readable string with column numbers.
    pub fn display(&self, alphabet: &DisplayAlphabet) -> String {
        let mut result = String::new();
        for row in self.render(alphabet) {
            let line: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            result.push_str(&line.join(" "));
            result.push('\n');
        }
        let footer: Vec<String> = (0..COLS).map(|c| c.to_string()).collect();
        result.push_str(&footer.join(" "));
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
