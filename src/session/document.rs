//! The shared session document and its wire encoding.

use crate::games::connect_four::{Board, COLS, Cell, DropError, Outcome, ROWS, Slot};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, instrument};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString)]
pub enum GameState {
    /// Fewer than two players.
    #[strum(serialize = "waiting")]
    Waiting,
    /// Both slots filled, moves in progress.
    #[strum(serialize = "playing")]
    Playing,
    /// A verdict or forfeit has been published.
    #[strum(serialize = "finished")]
    Finished,
}

/// A participant occupying a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    /// Opaque identity of the participant.
    pub uid: String,
}

/// Error decoding a session document.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum DocumentError {
    /// The value does not have the document shape.
    #[display("Malformed session document: {}", _0)]
    Malformed(#[error(not(source))] String),
    /// The board is not a 6x7 grid of 0/1/2.
    #[display("Invalid board: {}", _0)]
    InvalidBoard(#[error(not(source))] String),
    /// Unrecognized slot name.
    #[display("Unknown slot '{}'", _0)]
    UnknownSlot(#[error(not(source))] String),
    /// Unrecognized game state.
    #[display("Unknown game state '{}'", _0)]
    UnknownState(#[error(not(source))] String),
    /// Unrecognized winner value.
    #[display("Unknown winner '{}'", _0)]
    UnknownWinner(#[error(not(source))] String),
    /// Fields that contradict each other.
    #[display("Inconsistent session document: {}", _0)]
    Inconsistent(#[error(not(source))] String),
}

/// Why a move was not applied to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum MoveRejection {
    /// The session already has a winner.
    #[display("Game already finished")]
    GameFinished,
    /// The second slot is still empty.
    #[display("Waiting for an opponent")]
    NotStarted,
    /// The document says the other slot moves next.
    #[display("Not {}'s turn", _0)]
    NotYourTurn(Slot),
    /// No empty cell left in the column.
    #[display("Column {} is full", _0)]
    ColumnFull(usize),
    /// Column outside the board.
    #[display("Column {} is out of bounds", _0)]
    InvalidColumn(usize),
}

impl From<DropError> for MoveRejection {
    fn from(err: DropError) -> Self {
        match err {
            DropError::ColumnFull(col) => MoveRejection::ColumnFull(col),
            DropError::InvalidColumn(col) => MoveRejection::InvalidColumn(col),
        }
    }
}

/// Wire form. Field names and string values are shared with every other
/// client of the store.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSession {
    board: Vec<Vec<u8>>,
    current_player: String,
    #[serde(default)]
    players: BTreeMap<String, PlayerEntry>,
    game_state: String,
    #[serde(default)]
    winner: Option<String>,
    #[serde(default)]
    departed: Option<String>,
}

/// Wire value meaning "no winner yet".
pub const NOT_FINISHED: &str = "NOT_FINISHED";

/// One match: board, turn, participants and lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct SessionDocument {
    /// Current board.
    board: Board,
    /// Slot whose move it is.
    current_player: Slot,
    /// Occupied slots.
    players: BTreeMap<Slot, PlayerEntry>,
    /// Lifecycle state.
    game_state: GameState,
    /// Terminal result, present exactly when finished.
    winner: Option<Outcome>,
    /// Slot that left, when the game ended by forfeit.
    departed: Option<Slot>,
}

impl SessionDocument {
    /// A fresh session with `identity` in slot one, waiting for an opponent.
    #[instrument]
    pub fn new_waiting(identity: &str) -> Self {
        let mut players = BTreeMap::new();
        players.insert(
            Slot::PlayerOne,
            PlayerEntry {
                uid: identity.to_string(),
            },
        );
        Self {
            board: Board::new(),
            current_player: Slot::PlayerOne,
            players,
            game_state: GameState::Waiting,
            winner: None,
            departed: None,
        }
    }

    /// Slot held by `identity`.
    pub fn slot_of(&self, identity: &str) -> Option<Slot> {
        self.players
            .iter()
            .find(|(_, entry)| entry.uid == identity)
            .map(|(slot, _)| *slot)
    }

    /// Identity holding `slot`.
    pub fn identity_of(&self, slot: Slot) -> Option<&str> {
        self.players.get(&slot).map(|entry| entry.uid.as_str())
    }

    /// Number of occupied slots.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// True if `identity` may take slot two.
    pub fn is_joinable_by(&self, identity: &str) -> bool {
        self.game_state == GameState::Waiting
            && !self.players.contains_key(&Slot::PlayerTwo)
            && self.identity_of(Slot::PlayerOne).is_some_and(|uid| uid != identity)
    }

    /// Puts `identity` in slot two and starts play. Returns false, leaving
    /// the document untouched, when the session is not joinable.
    #[instrument(skip(self))]
    pub fn join(&mut self, identity: &str) -> bool {
        if !self.is_joinable_by(identity) {
            debug!(state = %self.game_state, players = self.players.len(), "Not joinable");
            return false;
        }
        self.players.insert(
            Slot::PlayerTwo,
            PlayerEntry {
                uid: identity.to_string(),
            },
        );
        self.game_state = GameState::Playing;
        true
    }

    /// Drops a piece for `slot` and hands the turn to the other slot.
    /// Returns the landing row. Only the slot named in `currentPlayer` may
    /// move.
    #[instrument(skip(self))]
    pub fn place(&mut self, column: usize, slot: Slot) -> Result<usize, MoveRejection> {
        match self.game_state {
            GameState::Finished => return Err(MoveRejection::GameFinished),
            GameState::Waiting => return Err(MoveRejection::NotStarted),
            GameState::Playing => {}
        }
        if self.current_player != slot {
            return Err(MoveRejection::NotYourTurn(slot));
        }
        let row = self.board.drop_piece(column, slot)?;
        self.current_player = self.current_player.opponent();
        Ok(row)
    }

    /// Records the terminal result. Returns false if the session was
    /// already finished; the first result stands.
    #[instrument(skip(self))]
    pub fn finish(&mut self, outcome: Outcome, departed: Option<Slot>) -> bool {
        if self.game_state == GameState::Finished {
            return false;
        }
        self.game_state = GameState::Finished;
        self.winner = Some(outcome);
        self.departed = departed;
        true
    }

    /// Frees a slot.
    pub fn remove_player(&mut self, slot: Slot) -> Option<PlayerEntry> {
        self.players.remove(&slot)
    }

    /// Encodes to the wire format.
    pub fn to_value(&self) -> Value {
        let board: Vec<Vec<u8>> = self
            .board
            .rows()
            .iter()
            .map(|row| row.iter().map(|cell| cell.code()).collect())
            .collect();
        let players: BTreeMap<String, &PlayerEntry> = self
            .players
            .iter()
            .map(|(slot, entry)| (slot.to_string(), entry))
            .collect();
        serde_json::json!({
            "board": board,
            "currentPlayer": self.current_player.as_ref(),
            "players": players,
            "gameState": self.game_state.as_ref(),
            "winner": self.winner.map(|outcome| outcome.to_string()),
            "departed": self.departed.map(|slot| slot.to_string()),
        })
    }

    /// Decodes from the wire format. Every enumerated string is parsed
    /// strictly; an unknown value is an error, never a default.
    #[instrument(skip(value))]
    pub fn from_value(value: &Value) -> Result<Self, DocumentError> {
        let wire = WireSession::deserialize(value)
            .map_err(|e| DocumentError::Malformed(e.to_string()))?;

        let board = decode_board(&wire.board)?;
        let current_player = parse_slot(&wire.current_player)?;
        let mut players = BTreeMap::new();
        for (key, entry) in wire.players {
            players.insert(parse_slot(&key)?, entry);
        }
        let game_state = GameState::from_str(&wire.game_state)
            .map_err(|_| DocumentError::UnknownState(wire.game_state.clone()))?;
        let winner = match wire.winner.as_deref() {
            None | Some("") | Some(NOT_FINISHED) => None,
            Some(raw) => Some(
                Outcome::from_str(raw).map_err(|_| DocumentError::UnknownWinner(raw.to_string()))?,
            ),
        };
        let departed = wire.departed.as_deref().map(parse_slot).transpose()?;

        match (game_state, winner) {
            (GameState::Finished, None) => {
                return Err(DocumentError::Inconsistent(
                    "finished without a winner".to_string(),
                ));
            }
            (GameState::Waiting | GameState::Playing, Some(outcome)) => {
                return Err(DocumentError::Inconsistent(format!(
                    "winner {} while {}",
                    outcome, game_state
                )));
            }
            _ => {}
        }

        Ok(Self {
            board,
            current_player,
            players,
            game_state,
            winner,
            departed,
        })
    }
}

fn parse_slot(raw: &str) -> Result<Slot, DocumentError> {
    Slot::from_str(raw).map_err(|_| DocumentError::UnknownSlot(raw.to_string()))
}

fn decode_board(rows: &[Vec<u8>]) -> Result<Board, DocumentError> {
    if rows.len() != ROWS {
        return Err(DocumentError::InvalidBoard(format!(
            "{} rows, expected {}",
            rows.len(),
            ROWS
        )));
    }
    let mut board = Board::new();
    for (row, codes) in rows.iter().enumerate() {
        if codes.len() != COLS {
            return Err(DocumentError::InvalidBoard(format!(
                "row {} has {} cells, expected {}",
                row,
                codes.len(),
                COLS
            )));
        }
        for (col, code) in codes.iter().enumerate() {
            let cell = Cell::from_code(*code).ok_or_else(|| {
                DocumentError::InvalidBoard(format!("code {} at {},{}", code, row, col))
            })?;
            board
                .set(row, col, cell)
                .map_err(|e| DocumentError::InvalidBoard(e.to_string()))?;
        }
    }
    Ok(board)
}
