//! End-to-end tests for two online clients sharing a memory store.

use std::sync::Arc;
use std::time::Duration;
use strictly_four::{
    AbortReason, Board, Cell, ChallengePool, ClientConfig, GameState, LocalView, MemoryStore,
    MoveRejection, OnlineClient, Outcome, PlayResult, SessionDocument, SessionEvent,
    SessionStore, Slot, StoreErrorKind, StorePath, TurnGate,
};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn pieces(board: &Board) -> usize {
    board
        .rows()
        .iter()
        .flatten()
        .filter(|cell| **cell != Cell::Empty)
        .count()
}

async fn until_view(client: &OnlineClient, pred: impl FnMut(&LocalView) -> bool) {
    let mut view = client.watch_view();
    let _ = timeout(WAIT, view.wait_for(pred))
        .await
        .expect("Timed out waiting for view")
        .expect("View channel closed");
}

async fn until_event(
    client: &mut OnlineClient,
    mut pred: impl FnMut(&SessionEvent) -> bool,
) -> SessionEvent {
    timeout(WAIT, async {
        loop {
            let event = client.next_event().await.expect("Event stream ended");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("Timed out waiting for event")
}

async fn my_turn_with(client: &OnlineClient, count: usize) {
    until_view(client, |v| {
        v.game_state == Some(GameState::Playing) && v.is_my_turn && pieces(&v.board) == count
    })
    .await;
}

async fn seated_pair(
    store: &MemoryStore,
    gate: Option<TurnGate>,
) -> (OnlineClient, OnlineClient) {
    let shared: Arc<dyn SessionStore> = Arc::new(store.clone());
    let config = ClientConfig::default();
    let alice = OnlineClient::connect(shared.clone(), &config, "alice", gate)
        .await
        .expect("Alice failed to connect");
    let bob = OnlineClient::connect(shared, &config, "bob", None)
        .await
        .expect("Bob failed to connect");
    assert_eq!(alice.handle().session_id(), bob.handle().session_id());
    my_turn_with(&alice, 0).await;
    until_view(&bob, |v| v.game_state == Some(GameState::Playing)).await;
    (alice, bob)
}

async fn stored(store: &MemoryStore, client: &OnlineClient) -> Option<SessionDocument> {
    store
        .get(client.handle().path())
        .await
        .expect("Get failed")
        .map(|value| SessionDocument::from_value(&value).expect("Undecodable document"))
}

#[tokio::test]
async fn test_full_game_ends_for_both_clients() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = seated_pair(&store, None).await;

    let mut placed = 0;
    for bob_column in [0, 1, 2] {
        assert!(matches!(
            alice.play(3, None).await.unwrap(),
            PlayResult::Placed { column: 3, .. }
        ));
        placed += 1;
        my_turn_with(&bob, placed).await;
        assert!(matches!(
            bob.play(bob_column, None).await.unwrap(),
            PlayResult::Placed { .. }
        ));
        placed += 1;
        my_turn_with(&alice, placed).await;
    }
    assert_eq!(
        alice.play(3, None).await.unwrap(),
        PlayResult::Placed { row: 2, column: 3 }
    );

    let expected = SessionEvent::GameEnded {
        outcome: Outcome::PlayerOneWin,
        departed: None,
    };
    assert_eq!(
        until_event(&mut alice, |e| matches!(e, SessionEvent::GameEnded { .. })).await,
        expected
    );
    assert_eq!(
        until_event(&mut bob, |e| matches!(e, SessionEvent::GameEnded { .. })).await,
        expected
    );

    let doc = stored(&store, &alice).await.expect("Session missing");
    assert_eq!(*doc.game_state(), GameState::Finished);
    assert_eq!(*doc.winner(), Some(Outcome::PlayerOneWin));
    assert_eq!(bob.play(4, None).await.unwrap(), PlayResult::GameOver);
}

#[tokio::test]
async fn test_out_of_turn_and_full_column() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = seated_pair(&store, None).await;

    assert_eq!(bob.play(0, None).await.unwrap(), PlayResult::NotYourTurn);

    let mut placed = 0;
    for _ in 0..3 {
        alice.play(0, None).await.unwrap();
        placed += 1;
        my_turn_with(&bob, placed).await;
        bob.play(0, None).await.unwrap();
        placed += 1;
        my_turn_with(&alice, placed).await;
    }

    let before = store.get(alice.handle().path()).await.unwrap();
    assert_eq!(
        alice.play(0, None).await.unwrap(),
        PlayResult::Aborted(AbortReason::Rejected(MoveRejection::ColumnFull(0)))
    );
    assert_eq!(store.get(alice.handle().path()).await.unwrap(), before);
}

#[tokio::test]
async fn test_events_follow_turns() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = seated_pair(&store, None).await;

    alice.play(5, None).await.unwrap();
    assert_eq!(
        until_event(&mut bob, |e| *e == SessionEvent::TurnStarted).await,
        SessionEvent::TurnStarted
    );
    let update = until_event(&mut alice, |e| {
        matches!(
            e,
            SessionEvent::BoardUpdated {
                is_my_turn: false,
                ..
            }
        )
    })
    .await;
    let SessionEvent::BoardUpdated { board, .. } = update else {
        unreachable!()
    };
    assert_eq!(board[5][5], 'O');
    assert_eq!(board[4][5], '-');
}

#[tokio::test]
async fn test_wrong_answer_forfeits_turn() {
    let pool = ChallengePool::from_json(r#"[{"word": "Mexico", "answers": ["méxico"]}]"#)
        .expect("Valid vocabulary");
    let store = MemoryStore::new();
    let (mut alice, mut bob) = seated_pair(&store, Some(TurnGate::new(pool))).await;

    let PlayResult::AnswerRequired(challenge) = alice.play(3, None).await.unwrap() else {
        panic!("Expected a challenge");
    };
    assert_eq!(challenge.word, "Mexico");

    assert_eq!(
        alice.play(3, Some("méxico!")).await.unwrap(),
        PlayResult::TurnForfeited
    );
    assert!(!alice.view().is_my_turn);
    let doc = stored(&store, &alice).await.expect("Session missing");
    assert_eq!(*doc.current_player(), Slot::PlayerTwo);
    assert_eq!(pieces(doc.board()), 0);

    my_turn_with(&bob, 0).await;
    bob.play(6, None).await.unwrap();
    my_turn_with(&alice, 1).await;

    assert!(alice.challenge().is_some());
    assert!(matches!(
        alice.play(3, Some(" Mexico ")).await.unwrap(),
        PlayResult::Placed { column: 3, .. }
    ));
    assert!(alice.challenge().is_none());
}

#[tokio::test]
async fn test_peer_crash_is_declared_forfeit() {
    let store = MemoryStore::new();
    let (mut alice, bob) = seated_pair(&store, None).await;

    store
        .remove(&bob.handle().path().child("players/player2"))
        .await
        .unwrap();

    assert_eq!(
        until_event(&mut alice, |e| matches!(e, SessionEvent::GameEnded { .. })).await,
        SessionEvent::GameEnded {
            outcome: Outcome::PlayerOneWin,
            departed: Some(Slot::PlayerTwo),
        }
    );
    let doc = stored(&store, &alice).await.expect("Session missing");
    assert_eq!(*doc.departed(), Some(Slot::PlayerTwo));
}

#[tokio::test]
async fn test_leaving_mid_game_forfeits() {
    let store = MemoryStore::new();
    let (mut alice, bob) = seated_pair(&store, None).await;

    bob.leave().await.unwrap();

    assert_eq!(
        until_event(&mut alice, |e| matches!(e, SessionEvent::GameEnded { .. })).await,
        SessionEvent::GameEnded {
            outcome: Outcome::PlayerOneWin,
            departed: Some(Slot::PlayerTwo),
        }
    );
    let doc = stored(&store, &alice).await.expect("Session missing");
    assert_eq!(doc.player_count(), 1);
    assert_eq!(*doc.game_state(), GameState::Finished);

    alice.leave().await.unwrap();
    let sessions = StorePath::parse("sessions").unwrap();
    assert_eq!(store.get(&sessions).await.unwrap(), None);
}

#[tokio::test]
async fn test_turn_passes_after_each_placed_piece() {
    let store = MemoryStore::new();
    let (mut alice, _bob) = seated_pair(&store, None).await;

    assert!(matches!(
        alice.play(3, None).await.unwrap(),
        PlayResult::Placed { row: 5, column: 3 }
    ));
    assert!(!alice.view().is_my_turn);
    assert_eq!(alice.play(4, None).await.unwrap(), PlayResult::NotYourTurn);

    let doc = stored(&store, &alice).await.expect("Session missing");
    assert_eq!(pieces(doc.board()), 1);
    assert_eq!(*doc.current_player(), Slot::PlayerTwo);
}

#[tokio::test]
async fn test_leaving_after_winning_move_keeps_the_win() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = seated_pair(&store, None).await;

    let mut placed = 0;
    for alice_column in [1, 2, 4, 6] {
        alice.play(alice_column, None).await.unwrap();
        placed += 1;
        my_turn_with(&bob, placed).await;
        if placed < 7 {
            bob.play(0, None).await.unwrap();
            placed += 1;
            my_turn_with(&alice, placed).await;
        }
    }
    assert_eq!(
        bob.play(0, None).await.unwrap(),
        PlayResult::Placed { row: 2, column: 0 }
    );
    bob.leave().await.unwrap();

    let expected = SessionEvent::GameEnded {
        outcome: Outcome::PlayerTwoWin,
        departed: None,
    };
    assert_eq!(
        until_event(&mut alice, |e| matches!(e, SessionEvent::GameEnded { .. })).await,
        expected
    );
    let doc = stored(&store, &alice).await.expect("Session missing");
    assert_eq!(*doc.winner(), Some(Outcome::PlayerTwoWin));
    assert_eq!(*doc.departed(), None);
    assert_eq!(doc.player_count(), 1);
}

#[tokio::test]
async fn test_leaving_waiting_session_deletes_it() {
    let store = MemoryStore::new();
    let shared: Arc<dyn SessionStore> = Arc::new(store.clone());
    let mut alice = OnlineClient::connect(shared, &ClientConfig::default(), "alice", None)
        .await
        .unwrap();
    until_view(&alice, |v| v.game_state == Some(GameState::Waiting)).await;
    assert_eq!(alice.play(3, None).await.unwrap(), PlayResult::WaitingForOpponent);

    let path = alice.handle().path().clone();
    alice.leave().await.unwrap();
    assert_eq!(store.get(&path).await.unwrap(), None);
}

#[tokio::test]
async fn test_store_outage_leaves_view_untouched() {
    let store = MemoryStore::new();
    let (mut alice, _bob) = seated_pair(&store, None).await;
    let before = alice.view();

    store.set_offline(true).unwrap();
    let err = alice.play(3, None).await.unwrap_err();
    assert_eq!(err.kind, StoreErrorKind::Unavailable);
    assert_eq!(alice.view(), before);

    store.set_offline(false).unwrap();
    assert!(matches!(
        alice.play(3, None).await.unwrap(),
        PlayResult::Placed { .. }
    ));
}
