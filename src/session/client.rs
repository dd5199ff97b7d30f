//! One participant's online session, wired end to end.

use super::coordinator::{AbortReason, MoveCoordinator, MoveOutcome};
use super::document::{GameState, SessionDocument};
use super::matchmaker::{Matchmaker, SessionHandle};
use super::synchronizer::{
    LocalView, SessionCommand, SessionEvent, SessionSynchronizer,
};
use super::turn_gate::{Challenge, GateVerdict, TurnGate};
use crate::config::ClientConfig;
use crate::games::connect_four::{Outcome, Verdict, evaluate};
use crate::store::{SessionStore, StoreError, StorePath, Subscription};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Result of [`OnlineClient::play`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayResult {
    /// The piece landed.
    Placed {
        /// Landing row, 0 at the top.
        row: usize,
        /// Column played.
        column: usize,
    },
    /// The move transaction aborted; nothing changed.
    Aborted(AbortReason),
    /// Wrong answer. No piece was placed and the turn passed.
    TurnForfeited,
    /// A challenge must be answered before this move.
    AnswerRequired(Challenge),
    /// The local view says it is the opponent's turn.
    NotYourTurn,
    /// Nobody has joined yet.
    WaitingForOpponent,
    /// The session is finished or gone.
    GameOver,
}

/// A participant seated in an online session.
///
/// Dropping the client stops its synchronizer task without touching the
/// store; call [`OnlineClient::leave`] to forfeit and free the seat.
#[derive(Debug)]
pub struct OnlineClient {
    store: Arc<dyn SessionStore>,
    coordinator: MoveCoordinator,
    gate: Option<TurnGate>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    view: watch::Receiver<LocalView>,
    view_tx: Arc<watch::Sender<LocalView>>,
    task: JoinHandle<()>,
}

impl OnlineClient {
    /// Matchmakes `identity` into a session and starts following it.
    #[instrument(skip(store, config, gate))]
    pub async fn connect(
        store: Arc<dyn SessionStore>,
        config: &ClientConfig,
        identity: &str,
        gate: Option<TurnGate>,
    ) -> Result<Self, StoreError> {
        let sessions = StorePath::parse(config.sessions_path())?;
        let matchmaker = Matchmaker::new(store.clone(), sessions, *config.search_limit());
        let handle = matchmaker.find_or_create(identity).await?;
        let subscription = store.subscribe(handle.path()).await?;
        info!(session_id = %handle.session_id(), slot = %handle.slot(), "Connected");

        let coordinator = MoveCoordinator::new(store.clone(), handle);
        let synchronizer = SessionSynchronizer::new(identity, *config.alphabet());
        let (events_tx, events) = mpsc::unbounded_channel();
        let (view_tx, view) = watch::channel(LocalView::default());
        let view_tx = Arc::new(view_tx);

        let task = tokio::spawn(follow_session(
            subscription,
            synchronizer,
            coordinator.clone(),
            events_tx,
            view_tx.clone(),
        ));

        Ok(Self {
            store,
            coordinator,
            gate,
            events,
            view,
            view_tx,
            task,
        })
    }

    /// Seat in the session.
    pub fn handle(&self) -> &SessionHandle {
        self.coordinator.handle()
    }

    /// Event stream for this participant.
    pub fn events(&mut self) -> &mut mpsc::UnboundedReceiver<SessionEvent> {
        &mut self.events
    }

    /// Waits for the next event. `None` once the session task has stopped.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Latest local view.
    pub fn view(&self) -> LocalView {
        self.view.borrow().clone()
    }

    /// Watch handle on the local view.
    pub fn watch_view(&self) -> watch::Receiver<LocalView> {
        self.view.clone()
    }

    /// Challenge the next move must answer, if the gate is on and not
    /// exhausted.
    pub fn challenge(&self) -> Option<&Challenge> {
        self.gate.as_ref().and_then(TurnGate::pending)
    }

    /// Plays `column`, answering the pending challenge with `answer`.
    ///
    /// Turn and lifecycle checks use the local view only; a board that is
    /// already decided but not yet published counts as over. A wrong answer
    /// forfeits the turn by writing the opponent into `currentPlayer`.
    #[instrument(skip(self, answer), fields(session_id = %self.handle().session_id()))]
    pub async fn play(
        &mut self,
        column: usize,
        answer: Option<&str>,
    ) -> Result<PlayResult, StoreError> {
        let view = self.view();
        match view.game_state {
            None | Some(GameState::Finished) => return Ok(PlayResult::GameOver),
            Some(GameState::Waiting) => return Ok(PlayResult::WaitingForOpponent),
            Some(GameState::Playing) => {}
        }
        if evaluate(&view.board) != Verdict::Ongoing {
            debug!("Board already decided");
            return Ok(PlayResult::GameOver);
        }
        if !view.is_my_turn {
            debug!("Not our turn");
            return Ok(PlayResult::NotYourTurn);
        }

        if let Some(gate) = self.gate.as_mut() {
            match answer {
                None => {
                    if let Some(challenge) = gate.pending() {
                        return Ok(PlayResult::AnswerRequired(challenge.clone()));
                    }
                }
                Some(answer) => {
                    if gate.check(answer) == GateVerdict::Rejected {
                        self.coordinator.skip_turn().await?;
                        self.view_tx.send_modify(|view| view.is_my_turn = false);
                        return Ok(PlayResult::TurnForfeited);
                    }
                }
            }
        }

        match self.coordinator.apply_move(column).await? {
            MoveOutcome::Committed { row, column } => {
                self.view_tx.send_modify(|view| view.is_my_turn = false);
                Ok(PlayResult::Placed { row, column })
            }
            MoveOutcome::Aborted(reason) => Ok(PlayResult::Aborted(reason)),
        }
    }

    /// Leaves the session.
    ///
    /// A waiting session is deleted. A game in progress is forfeited to the
    /// opponent before the seat is freed, unless the board is already
    /// decided, in which case that result is recorded instead. A finished session just loses the
    /// seat, and the document goes once nobody is left.
    #[instrument(skip(self), fields(session_id = %self.handle().session_id()))]
    pub async fn leave(self) -> Result<(), StoreError> {
        self.task.abort();
        let handle = self.coordinator.handle();
        let me = *handle.slot();
        let seat = handle.path().child("players").child(me.as_ref());

        let Some(value) = self.store.get(handle.path()).await? else {
            debug!("Session already gone");
            return Ok(());
        };
        let doc = match SessionDocument::from_value(&value) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Leaving undecodable session, freeing seat only");
                return self.store.remove(&seat).await;
            }
        };

        match doc.game_state() {
            GameState::Waiting => {
                info!("Deleting waiting session");
                self.store.remove(handle.path()).await
            }
            GameState::Playing => {
                match Outcome::from_verdict(evaluate(doc.board())) {
                    Some(outcome) => {
                        self.coordinator.publish_outcome(outcome, None).await?;
                        info!(%outcome, "Published decided board and left");
                    }
                    None => {
                        self.coordinator
                            .publish_outcome(Outcome::win_for(me.opponent()), Some(me))
                            .await?;
                        info!("Forfeited and left");
                    }
                }
                self.store.remove(&seat).await
            }
            GameState::Finished => {
                if doc.player_count() <= 1 {
                    info!("Last participant out, deleting session");
                    self.store.remove(handle.path()).await
                } else {
                    self.store.remove(&seat).await
                }
            }
        }
    }
}

impl Drop for OnlineClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Feeds every version of the session through the synchronizer, forwards
/// events and performs the writes it asks for.
#[instrument(skip_all)]
async fn follow_session(
    mut subscription: Subscription,
    mut synchronizer: SessionSynchronizer,
    coordinator: MoveCoordinator,
    events: mpsc::UnboundedSender<SessionEvent>,
    view: Arc<watch::Sender<LocalView>>,
) {
    while let Some(snapshot) = subscription.recv().await {
        let observation = match synchronizer.observe(&snapshot) {
            Ok(observation) => observation,
            Err(e) => {
                warn!(revision = snapshot.revision, error = %e, "Ignoring undecodable version");
                if events.send(SessionEvent::InvalidDocument(e.to_string())).is_err() {
                    break;
                }
                continue;
            }
        };
        view.send_replace(synchronizer.view().clone());

        for event in observation.events {
            if events.send(event).is_err() {
                debug!("Event consumer gone, stopping");
                return;
            }
        }

        for command in observation.commands {
            let SessionCommand::PublishOutcome { outcome, departed } = command;
            if let Err(e) = coordinator.publish_outcome(outcome, departed).await {
                warn!(error = %e, "Failed to publish outcome");
                if events.send(SessionEvent::StoreFailed(e.to_string())).is_err() {
                    return;
                }
            }
        }
    }
    debug!("Subscription closed");
}
