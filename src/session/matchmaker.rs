//! Matchmaking: join a waiting session or open a new one.

use super::document::{GameState, SessionDocument};
use crate::games::connect_four::Slot;
use crate::store::{QueryFilter, SessionStore, StoreError, StorePath, TxDecision, TxOutcome};
use derive_getters::Getters;
use derive_new::new;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A participant's seat in one session.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct SessionHandle {
    /// Session key under the sessions collection.
    session_id: String,
    /// Full store path of the session document.
    path: StorePath,
    /// Local participant identity.
    identity: String,
    /// Slot the participant occupies.
    slot: Slot,
}

/// Result of trying to join one specific session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Slot two is ours and the session is playing.
    Joined(SessionHandle),
    /// Someone else filled the session first, or it vanished.
    RaceLost,
}

/// Finds or creates sessions in a collection.
#[derive(Debug, Clone)]
pub struct Matchmaker {
    store: Arc<dyn SessionStore>,
    sessions: StorePath,
    search_limit: usize,
}

impl Matchmaker {
    /// Creates a matchmaker over `sessions`, inspecting at most
    /// `search_limit` waiting sessions per search.
    pub fn new(store: Arc<dyn SessionStore>, sessions: StorePath, search_limit: usize) -> Self {
        Self {
            store,
            sessions,
            search_limit,
        }
    }

    /// Joins the first eligible waiting session, or creates one with the
    /// caller in slot one.
    ///
    /// A lost join race falls back to creating; store failures are returned
    /// as-is.
    #[instrument(skip(self))]
    pub async fn find_or_create(&self, identity: &str) -> Result<SessionHandle, StoreError> {
        if let Some(session_id) = self.find_candidate(identity).await? {
            match self.try_join(&session_id, identity).await? {
                JoinOutcome::Joined(handle) => return Ok(handle),
                JoinOutcome::RaceLost => {
                    info!(session_id = %session_id, "Lost join race, opening a new session");
                }
            }
        }
        self.create(identity).await
    }

    /// First waiting session opened by someone else.
    #[instrument(skip(self))]
    pub async fn find_candidate(&self, identity: &str) -> Result<Option<String>, StoreError> {
        let filter = QueryFilter::field_equals("gameState", GameState::Waiting.as_ref());
        let waiting = self
            .store
            .query(&self.sessions, &filter, self.search_limit)
            .await?;
        debug!(count = waiting.len(), "Waiting sessions found");

        let candidate = waiting
            .into_iter()
            .find_map(|(session_id, value)| match SessionDocument::from_value(&value) {
                Ok(doc) if doc.is_joinable_by(identity) => Some(session_id),
                Ok(_) => None,
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Skipping undecodable session");
                    None
                }
            });
        Ok(candidate)
    }

    /// Atomically takes slot two of `session_id`. Exactly one of several
    /// racing joiners commits; the rest see [`JoinOutcome::RaceLost`].
    #[instrument(skip(self))]
    pub async fn try_join(
        &self,
        session_id: &str,
        identity: &str,
    ) -> Result<JoinOutcome, StoreError> {
        let path = self.sessions.child(session_id);
        let outcome = self
            .store
            .transact(&path, &|current| {
                let Some(value) = current else {
                    return TxDecision::Abort;
                };
                let Ok(mut doc) = SessionDocument::from_value(value) else {
                    return TxDecision::Abort;
                };
                if doc.join(identity) {
                    TxDecision::Commit(doc.to_value())
                } else {
                    TxDecision::Abort
                }
            })
            .await?;

        match outcome {
            TxOutcome::Committed(_) => {
                info!(session_id, "Joined session as player2");
                Ok(JoinOutcome::Joined(SessionHandle::new(
                    session_id.to_string(),
                    path,
                    identity.to_string(),
                    Slot::PlayerTwo,
                )))
            }
            TxOutcome::Aborted => {
                debug!(session_id, "Session no longer joinable");
                Ok(JoinOutcome::RaceLost)
            }
        }
    }

    /// Opens a new waiting session under a fresh id.
    #[instrument(skip(self))]
    pub async fn create(&self, identity: &str) -> Result<SessionHandle, StoreError> {
        let session_id = Uuid::new_v4().to_string();
        let path = self.sessions.child(&session_id);
        self.store
            .set(&path, SessionDocument::new_waiting(identity).to_value())
            .await?;
        info!(session_id = %session_id, "Created waiting session");
        Ok(SessionHandle::new(
            session_id,
            path,
            identity.to_string(),
            Slot::PlayerOne,
        ))
    }
}
