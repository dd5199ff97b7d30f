//! Transactional writes against one session document.

use super::document::{DocumentError, MoveRejection, SessionDocument};
use super::matchmaker::SessionHandle;
use crate::games::connect_four::{Outcome, Slot};
use crate::store::{SessionStore, StoreError, TxDecision, TxOutcome};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Why a move transaction aborted. None of these are errors; the caller
/// drops the move and waits for the next version.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum AbortReason {
    /// The document refused the move.
    #[display("{}", _0)]
    Rejected(MoveRejection),
    /// The session document no longer exists.
    #[display("Session document missing")]
    MissingSession,
    /// The stored document could not be decoded.
    #[display("{}", _0)]
    Malformed(DocumentError),
}

/// Result of [`MoveCoordinator::apply_move`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The piece landed.
    Committed {
        /// Landing row, 0 at the top.
        row: usize,
        /// Column played.
        column: usize,
    },
    /// Nothing was written.
    Aborted(AbortReason),
}

/// Applies one participant's writes to its session.
#[derive(Debug, Clone)]
pub struct MoveCoordinator {
    store: Arc<dyn SessionStore>,
    handle: SessionHandle,
}

impl MoveCoordinator {
    /// Creates a coordinator acting for `handle`.
    pub fn new(store: Arc<dyn SessionStore>, handle: SessionHandle) -> Self {
        Self { store, handle }
    }

    /// Seat this coordinator writes for.
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Drops the local participant's piece into `column` and passes the
    /// turn, in one transaction.
    ///
    /// The stored `currentPlayer` must name the local slot, otherwise the
    /// transaction aborts with [`MoveRejection::NotYourTurn`]. The outcome
    /// is never decided here: every subscriber evaluates the new board.
    #[instrument(skip(self), fields(session_id = %self.handle.session_id(), slot = %self.handle.slot()))]
    pub async fn apply_move(&self, column: usize) -> Result<MoveOutcome, StoreError> {
        let slot = *self.handle.slot();
        let attempt: Mutex<Option<Result<usize, AbortReason>>> = Mutex::new(None);

        let outcome = self
            .store
            .transact(self.handle.path(), &|current| {
                let result = place_in(current, column, slot);
                let decision = match &result {
                    Ok((_, value)) => TxDecision::Commit(value.clone()),
                    Err(_) => TxDecision::Abort,
                };
                *attempt.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(result.map(|(row, _)| row));
                decision
            })
            .await?;

        let last = attempt
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        match (outcome, last) {
            (TxOutcome::Committed(_), Some(Ok(row))) => {
                info!(column, row, "Move committed");
                Ok(MoveOutcome::Committed { row, column })
            }
            (TxOutcome::Aborted, Some(Err(reason))) => {
                debug!(column, %reason, "Move aborted");
                Ok(MoveOutcome::Aborted(reason))
            }
            (outcome, last) => {
                warn!(?outcome, ?last, "Transaction result disagrees with closure");
                Ok(MoveOutcome::Aborted(AbortReason::MissingSession))
            }
        }
    }

    /// Records a terminal result. The first published result stands: the
    /// transaction aborts if the session is already finished. Returns true
    /// when this call wrote the result.
    #[instrument(skip(self), fields(session_id = %self.handle.session_id()))]
    pub async fn publish_outcome(
        &self,
        outcome: Outcome,
        departed: Option<Slot>,
    ) -> Result<bool, StoreError> {
        let result = self
            .store
            .transact(self.handle.path(), &|current| {
                let Some(value) = current else {
                    return TxDecision::Abort;
                };
                let Ok(mut doc) = SessionDocument::from_value(value) else {
                    return TxDecision::Abort;
                };
                if doc.finish(outcome, departed) {
                    TxDecision::Commit(doc.to_value())
                } else {
                    TxDecision::Abort
                }
            })
            .await?;

        let published = result.is_committed();
        if published {
            info!(%outcome, ?departed, "Outcome published");
        } else {
            debug!(%outcome, "Outcome already recorded");
        }
        Ok(published)
    }

    /// Hands the turn to the opponent without placing a piece.
    ///
    /// A plain field write; it does not go through a transaction.
    #[instrument(skip(self), fields(session_id = %self.handle.session_id()))]
    pub async fn skip_turn(&self) -> Result<(), StoreError> {
        let next = self.handle.slot().opponent();
        self.store
            .set(
                &self.handle.path().child("currentPlayer"),
                Value::String(next.to_string()),
            )
            .await?;
        info!(next = %next, "Turn forfeited");
        Ok(())
    }
}

fn place_in(
    current: Option<&Value>,
    column: usize,
    slot: Slot,
) -> Result<(usize, Value), AbortReason> {
    let value = current.ok_or(AbortReason::MissingSession)?;
    let mut doc = SessionDocument::from_value(value).map_err(AbortReason::Malformed)?;
    let row = doc.place(column, slot).map_err(AbortReason::Rejected)?;
    Ok((row, doc.to_value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::connect_four::{COLS, ROWS};
    use crate::session::matchmaker::Matchmaker;
    use crate::store::{MemoryStore, StorePath};

    async fn seated() -> (MemoryStore, MoveCoordinator, MoveCoordinator) {
        let store = MemoryStore::new();
        let shared: Arc<dyn SessionStore> = Arc::new(store.clone());
        let mm = Matchmaker::new(shared.clone(), StorePath::parse("sessions").unwrap(), 10);
        let alice = mm.find_or_create("alice").await.unwrap();
        let bob = mm.find_or_create("bob").await.unwrap();
        assert_eq!(*bob.slot(), Slot::PlayerTwo);
        (
            store,
            MoveCoordinator::new(shared.clone(), alice),
            MoveCoordinator::new(shared, bob),
        )
    }

    async fn document(store: &MemoryStore, handle: &SessionHandle) -> SessionDocument {
        let value = store.get(handle.path()).await.unwrap().unwrap();
        SessionDocument::from_value(&value).unwrap()
    }

    #[tokio::test]
    async fn test_move_lands_on_lowest_empty_row() {
        let (store, alice, bob) = seated().await;
        assert_eq!(
            alice.apply_move(2).await.unwrap(),
            MoveOutcome::Committed {
                row: ROWS - 1,
                column: 2
            }
        );
        assert_eq!(
            bob.apply_move(2).await.unwrap(),
            MoveOutcome::Committed {
                row: ROWS - 2,
                column: 2
            }
        );
        let doc = document(&store, alice.handle()).await;
        assert_eq!(*doc.current_player(), Slot::PlayerOne);
    }

    #[tokio::test]
    async fn test_second_move_in_a_row_aborts() {
        let (store, alice, _bob) = seated().await;
        alice.apply_move(3).await.unwrap();
        assert_eq!(
            alice.apply_move(4).await.unwrap(),
            MoveOutcome::Aborted(AbortReason::Rejected(MoveRejection::NotYourTurn(
                Slot::PlayerOne
            )))
        );
        let doc = document(&store, alice.handle()).await;
        assert_eq!(doc.board().landing_row(4), Some(ROWS - 1));
        assert_eq!(*doc.current_player(), Slot::PlayerTwo);
    }

    #[tokio::test]
    async fn test_full_column_aborts_without_change() {
        let (store, alice, bob) = seated().await;
        for i in 0..ROWS {
            let mover = if i % 2 == 0 { &alice } else { &bob };
            mover.apply_move(0).await.unwrap();
        }
        let before = store.get(alice.handle().path()).await.unwrap();
        assert_eq!(
            alice.apply_move(0).await.unwrap(),
            MoveOutcome::Aborted(AbortReason::Rejected(MoveRejection::ColumnFull(0)))
        );
        assert_eq!(
            alice.apply_move(COLS).await.unwrap(),
            MoveOutcome::Aborted(AbortReason::Rejected(MoveRejection::InvalidColumn(COLS)))
        );
        assert_eq!(store.get(alice.handle().path()).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_first_published_outcome_stands() {
        let (store, alice, bob) = seated().await;
        assert!(alice.publish_outcome(Outcome::PlayerOneWin, None).await.unwrap());
        assert!(
            !bob.publish_outcome(Outcome::PlayerTwoWin, Some(Slot::PlayerOne))
                .await
                .unwrap()
        );
        let doc = document(&store, alice.handle()).await;
        assert_eq!(*doc.winner(), Some(Outcome::PlayerOneWin));
        assert_eq!(*doc.departed(), None);

        assert_eq!(
            bob.apply_move(1).await.unwrap(),
            MoveOutcome::Aborted(AbortReason::Rejected(MoveRejection::GameFinished))
        );
    }

    #[tokio::test]
    async fn test_skip_turn_passes_without_piece() {
        let (store, alice, _bob) = seated().await;
        alice.skip_turn().await.unwrap();
        let doc = document(&store, alice.handle()).await;
        assert_eq!(*doc.current_player(), Slot::PlayerTwo);
        assert_eq!(*doc.board(), crate::games::connect_four::Board::new());
    }

    #[tokio::test]
    async fn test_move_on_deleted_session() {
        let (store, alice, _bob) = seated().await;
        store.remove(alice.handle().path()).await.unwrap();
        assert_eq!(
            alice.apply_move(3).await.unwrap(),
            MoveOutcome::Aborted(AbortReason::MissingSession)
        );
    }
}
