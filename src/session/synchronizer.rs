//! Derives the local view of a session from observed document versions.
//!
//! The synchronizer is a plain state machine: feed it every [`Snapshot`] the
//! subscription yields and it returns the events for the consumer plus any
//! store writes this client is responsible for. It never touches the store
//! itself, which keeps redelivery and ordering rules testable without a
//! runtime.

use super::disconnect::DisconnectMonitor;
use super::document::{DocumentError, GameState, SessionDocument};
use crate::games::connect_four::{
    Board, DisplayAlphabet, DisplayBoard, Outcome, Slot, evaluate,
};
use crate::store::Snapshot;
use tracing::{debug, info, instrument, warn};

/// Notification for the consumer of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Emitted for every observed version, including the first.
    BoardUpdated {
        /// Board in the local display alphabet, top row first.
        board: DisplayBoard,
        /// Whether the local participant moves next.
        is_my_turn: bool,
    },
    /// The turn passed to the local participant.
    TurnStarted,
    /// The session finished. Emitted once.
    GameEnded {
        /// Recorded result.
        outcome: Outcome,
        /// Slot that left, for a forfeit.
        departed: Option<Slot>,
    },
    /// The session document was deleted.
    SessionClosed,
    /// A store operation failed. Local state is unchanged.
    StoreFailed(String),
    /// An observed version could not be decoded and was ignored.
    InvalidDocument(String),
}

/// A write the local client must perform after an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Record a terminal result unless the session is already finished.
    PublishOutcome {
        /// Result to record.
        outcome: Outcome,
        /// Departed slot, for a forfeit.
        departed: Option<Slot>,
    },
}

/// What one observed version produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    /// Events for the consumer, in order.
    pub events: Vec<SessionEvent>,
    /// Writes for the client to perform, in order.
    pub commands: Vec<SessionCommand>,
}

/// Latest authoritative state as seen by this participant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalView {
    /// Revision of the version this view was derived from.
    pub revision: Option<u64>,
    /// Board as stored.
    pub board: Board,
    /// Local slot, if the participant is still seated.
    pub slot: Option<Slot>,
    /// Whether the current turn belongs to the local slot.
    pub is_my_turn: bool,
    /// Lifecycle state; `None` before the first version or once closed.
    pub game_state: Option<GameState>,
    /// Recorded result, once finished.
    pub outcome: Option<Outcome>,
}

/// Turns session versions into a local view and events.
#[derive(Debug, Clone)]
pub struct SessionSynchronizer {
    identity: String,
    alphabet: DisplayAlphabet,
    last_revision: Option<u64>,
    seen_unfinished: bool,
    ended: bool,
    closed: bool,
    monitor: DisconnectMonitor,
    view: LocalView,
}

impl SessionSynchronizer {
    /// Creates a synchronizer for `identity`.
    pub fn new(identity: impl Into<String>, alphabet: DisplayAlphabet) -> Self {
        Self {
            identity: identity.into(),
            alphabet,
            last_revision: None,
            seen_unfinished: false,
            ended: false,
            closed: false,
            monitor: DisconnectMonitor::new(),
            view: LocalView::default(),
        }
    }

    /// Current local view.
    pub fn view(&self) -> &LocalView {
        &self.view
    }

    /// Processes one version. Versions at or below the last processed
    /// revision are ignored, so redelivery is harmless.
    #[instrument(skip(self, snapshot), fields(revision = snapshot.revision, identity = %self.identity))]
    pub fn observe(&mut self, snapshot: &Snapshot) -> Result<Observation, DocumentError> {
        if self
            .last_revision
            .is_some_and(|last| snapshot.revision <= last)
        {
            debug!("Duplicate version ignored");
            return Ok(Observation::default());
        }
        self.last_revision = Some(snapshot.revision);

        let mut observation = Observation::default();
        let Some(value) = &snapshot.value else {
            if !self.closed {
                info!("Session document removed");
                self.closed = true;
                self.view.revision = Some(snapshot.revision);
                self.view.is_my_turn = false;
                self.view.game_state = None;
                observation.events.push(SessionEvent::SessionClosed);
            }
            return Ok(observation);
        };
        let doc = SessionDocument::from_value(value)?;

        let slot = doc.slot_of(&self.identity);
        let is_my_turn = slot == Some(*doc.current_player());
        let was_my_turn = self.view.is_my_turn;
        let state = *doc.game_state();

        self.view = LocalView {
            revision: Some(snapshot.revision),
            board: *doc.board(),
            slot,
            is_my_turn,
            game_state: Some(state),
            outcome: *doc.winner(),
        };

        observation.events.push(SessionEvent::BoardUpdated {
            board: doc.board().render(&self.alphabet),
            is_my_turn,
        });
        if is_my_turn && !was_my_turn {
            observation.events.push(SessionEvent::TurnStarted);
        }

        if state == GameState::Finished {
            if self.seen_unfinished && !self.ended {
                if let Some(outcome) = *doc.winner() {
                    info!(%outcome, departed = ?doc.departed(), "Game ended");
                    self.ended = true;
                    observation.events.push(SessionEvent::GameEnded {
                        outcome,
                        departed: *doc.departed(),
                    });
                }
            }
        } else {
            self.seen_unfinished = true;
        }

        if state == GameState::Playing {
            if let Some(outcome) = Outcome::from_verdict(evaluate(doc.board())) {
                debug!(%outcome, "Board is decided");
                observation.commands.push(SessionCommand::PublishOutcome {
                    outcome,
                    departed: None,
                });
            }
        }

        if self.monitor.observe(doc.player_count(), state) {
            match slot {
                Some(me) => {
                    observation.commands.push(SessionCommand::PublishOutcome {
                        outcome: Outcome::win_for(me),
                        departed: Some(me.opponent()),
                    });
                }
                None => warn!("Player count dropped but local participant is not seated"),
            }
        }

        Ok(observation)
    }
}
