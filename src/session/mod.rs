//! Online session protocol.
//!
//! Matchmaking, the synchronizer that turns document versions into a local
//! view, transactional moves, departure detection and the answer-to-move
//! rule. Everything talks to the shared store through
//! [`SessionStore`](crate::store::SessionStore).

mod client;
mod coordinator;
mod disconnect;
mod document;
mod matchmaker;
mod synchronizer;
mod turn_gate;

pub use client::{OnlineClient, PlayResult};
pub use coordinator::{AbortReason, MoveCoordinator, MoveOutcome};
pub use disconnect::DisconnectMonitor;
pub use document::{
    DocumentError, GameState, MoveRejection, NOT_FINISHED, PlayerEntry, SessionDocument,
};
pub use matchmaker::{JoinOutcome, Matchmaker, SessionHandle};
pub use synchronizer::{
    LocalView, Observation, SessionCommand, SessionEvent, SessionSynchronizer,
};
pub use turn_gate::{
    Challenge, ChallengeError, ChallengePool, ChallengeState, GateVerdict, TurnGate,
    normalize_answer,
};
