//! Command-line interface for strictly_four.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strictly Four - connect four over a shared session store
#[derive(Parser, Debug)]
#[command(name = "strictly_four")]
#[command(about = "Connect four with online matchmaking over a shared store", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to client configuration (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Two simulated participants matchmake and play over an in-memory store
    OnlineDemo {
        /// Identity of the first participant
        #[arg(long, default_value = "alice")]
        first: String,

        /// Identity of the second participant
        #[arg(long, default_value = "bob")]
        second: String,

        /// Chance that a simulated participant answers a challenge correctly
        #[arg(long, default_value = "0.75")]
        accuracy: f64,

        /// Seed for move and answer choices
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Local game between two heuristic opponents
    Cpu {
        /// Seed for move choices
        #[arg(long)]
        seed: Option<u64>,
    },
}
