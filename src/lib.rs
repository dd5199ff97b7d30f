//! Strictly Four library - connect four over a shared session store
//!
//! Two participants play connect four through one JSON document in a
//! multi-reader/multi-writer store. Every client evaluates the board itself;
//! the store only serializes writes.
//!
//! # Architecture
//!
//! - **Games**: pure board rules and a heuristic opponent
//! - **Store**: the [`SessionStore`] contract and an in-memory implementation
//! - **Session**: matchmaking, synchronization, transactional moves,
//!   departure detection and the answer-to-move rule
//! - **Config**: TOML client settings
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_four::{ClientConfig, MemoryStore, OnlineClient, SessionStore};
//!
//! # async fn example() -> Result<(), strictly_four::StoreError> {
//! let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
//! let config = ClientConfig::default();
//! let mut alice = OnlineClient::connect(store.clone(), &config, "alice", None).await?;
//! let _bob = OnlineClient::connect(store, &config, "bob", None).await?;
//! while let Some(event) = alice.next_event().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod games;
mod session;
mod store;

// Crate-level exports - Configuration
pub use config::{ClientConfig, ConfigError};

// Crate-level exports - Board engine
pub use games::connect_four::{
    Board, COLS, Cell, DisplayAlphabet, DisplayBoard, DropError, HeuristicOpponent, Outcome, ROWS,
    Slot, Verdict, evaluate, new_board, winning_column,
};
pub use games::connect_four::rules::{check_winner, is_full};

// Crate-level exports - Store
pub use store::{
    DEFAULT_TRANSACTION_RETRIES, MemoryStore, QueryFilter, SessionStore, Snapshot, StoreError,
    StoreErrorKind, StorePath, Subscription, TxDecision, TxFn, TxOutcome,
};

// Crate-level exports - Session protocol
pub use session::{
    AbortReason, Challenge, ChallengeError, ChallengePool, ChallengeState, DisconnectMonitor,
    DocumentError, GameState, GateVerdict, JoinOutcome, LocalView, Matchmaker, MoveCoordinator,
    MoveOutcome, MoveRejection, NOT_FINISHED, Observation, OnlineClient, PlayResult, PlayerEntry,
    SessionCommand, SessionDocument, SessionEvent, SessionHandle, SessionSynchronizer, TurnGate,
    normalize_answer,
};
