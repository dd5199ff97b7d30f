//! Strictly Four - CLI
//!
//! Runs a local connect four game or an online session demo over an
//! in-memory store.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use strictly_four::{
    ClientConfig, DisplayAlphabet, GameState, HeuristicOpponent, MemoryStore, OnlineClient,
    Outcome, PlayResult, SessionEvent, SessionStore, Slot, Verdict, evaluate, new_board,
};
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,strictly_four=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };

    match cli.command {
        Command::OnlineDemo {
            first,
            second,
            accuracy,
            seed,
        } => run_online_demo(config, first, second, accuracy, seed).await,
        Command::Cpu { seed } => run_cpu(config, seed),
    }
}

fn seeded(seed: Option<u64>, offset: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(offset)),
        None => StdRng::from_entropy(),
    }
}

/// Two participants share one in-memory store and play to the end.
#[instrument(skip(config))]
async fn run_online_demo(
    config: ClientConfig,
    first: String,
    second: String,
    accuracy: f64,
    seed: Option<u64>,
) -> Result<()> {
    if !(0.0..=1.0).contains(&accuracy) {
        anyhow::bail!("accuracy must be between 0 and 1, got {}", accuracy);
    }
    let store: Arc<dyn SessionStore> =
        Arc::new(MemoryStore::with_retries(*config.transaction_retries()));

    let mut rng_first = seeded(seed, 1);
    let mut rng_second = seeded(seed, 2);
    let gate_first = config.load_turn_gate(&mut rng_first)?;
    let gate_second = config.load_turn_gate(&mut rng_second)?;

    let client_first = OnlineClient::connect(store.clone(), &config, &first, gate_first)
        .await
        .context("First participant failed to connect")?;
    let client_second = OnlineClient::connect(store.clone(), &config, &second, gate_second)
        .await
        .context("Second participant failed to connect")?;
    info!(
        session_id = %client_first.handle().session_id(),
        "Both participants seated"
    );

    let (result_first, result_second) = tokio::join!(
        drive(client_first, rng_first, accuracy, *config.alphabet()),
        drive(client_second, rng_second, accuracy, *config.alphabet()),
    );
    let outcome = result_first?.or(result_second?);

    match outcome {
        Some(Outcome::PlayerOneWin) => println!("{} wins", first),
        Some(Outcome::PlayerTwoWin) => println!("{} wins", second),
        Some(Outcome::Draw) => println!("Draw"),
        None => println!("Session closed without a result"),
    }
    Ok(())
}

/// Plays one participant until the session ends.
#[instrument(skip_all, fields(identity = %client.handle().identity()))]
async fn drive(
    mut client: OnlineClient,
    mut rng: StdRng,
    accuracy: f64,
    alphabet: DisplayAlphabet,
) -> Result<Option<Outcome>> {
    let slot = *client.handle().slot();
    let opponent = HeuristicOpponent::new(slot);
    // Set after our move lands; cleared by the first version that hands the
    // turn away, so stale "my turn" versions queued before it are skipped.
    let mut moved = false;

    while let Some(event) = client.next_event().await {
        match event {
            SessionEvent::BoardUpdated { board, is_my_turn } => {
                debug!(is_my_turn, "Board updated");
                if !is_my_turn {
                    moved = false;
                    continue;
                }
                if moved || client.view().game_state != Some(GameState::Playing) {
                    continue;
                }
                let rows: Vec<String> = board.iter().map(|row| row.iter().collect()).collect();
                println!("{} to move:\n{}\n", slot, rows.join("\n"));
                moved = take_turn(&mut client, &opponent, &mut rng, accuracy).await?;
            }
            SessionEvent::TurnStarted => debug!("Turn started"),
            SessionEvent::GameEnded { outcome, departed } => {
                info!(%outcome, ?departed, "Game over");
                let view = client.view();
                println!("{}", view.board.display(&alphabet));
                client.leave().await?;
                return Ok(Some(outcome));
            }
            SessionEvent::SessionClosed => {
                info!("Session closed");
                return Ok(None);
            }
            SessionEvent::StoreFailed(message) => warn!(%message, "Store failure"),
            SessionEvent::InvalidDocument(message) => warn!(%message, "Invalid document"),
        }
    }
    Ok(None)
}

/// Returns true once this turn is spent (piece placed or turn forfeited).
async fn take_turn(
    client: &mut OnlineClient,
    opponent: &HeuristicOpponent,
    rng: &mut StdRng,
    accuracy: f64,
) -> Result<bool> {
    let view = client.view();
    let Some(column) = opponent.choose_column(&view.board, rng) else {
        warn!("No legal column");
        return Ok(false);
    };

    let mut result = client.play(column, None).await?;
    if let PlayResult::AnswerRequired(challenge) = &result {
        let answer = if rng.gen_bool(accuracy) {
            challenge.answers.first().cloned().unwrap_or_default()
        } else {
            "?".to_string()
        };
        println!("Translate '{}': {}", challenge.word, answer);
        result = client.play(column, Some(&answer)).await?;
    }

    match result {
        PlayResult::Placed { row, column } => {
            info!(row, column, "Placed");
            Ok(true)
        }
        PlayResult::TurnForfeited => {
            println!("Wrong answer, turn forfeited");
            Ok(true)
        }
        other => {
            debug!(?other, "Move not played");
            Ok(false)
        }
    }
}

/// Local game between two heuristic opponents.
#[instrument(skip(config))]
fn run_cpu(config: ClientConfig, seed: Option<u64>) -> Result<()> {
    let mut rng = seeded(seed, 0);
    let players = [
        HeuristicOpponent::new(Slot::PlayerOne),
        HeuristicOpponent::new(Slot::PlayerTwo),
    ];
    let mut board = new_board();

    for turn in 0.. {
        let player = &players[turn % 2];
        let Some(column) = player.choose_column(&board, &mut rng) else {
            break;
        };
        let row = board.drop_piece(column, player.slot())?;
        info!(turn, column, row, slot = %player.slot(), "Move");
        println!("{}\n", board.display(config.alphabet()));

        match evaluate(&board) {
            Verdict::Ongoing => {}
            Verdict::Win(slot) => {
                println!("{} wins", slot);
                return Ok(());
            }
            Verdict::Draw => {
                println!("Draw");
                return Ok(());
            }
        }
    }
    Ok(())
}
