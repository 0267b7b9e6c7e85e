//! Crawlgate CLI Library
//!
//! Operator commands for running crawl jobs:
//!
//! - **Control**: pause, resume, switch mode or stop every instance (`crawlgate control`)
//! - **Status**: show which phases an identity has finished (`crawlgate status`)
//! - **Reset**: forget finished phases so the next run repeats them (`crawlgate reset`)

pub mod commands;
pub mod error;

pub use error::{CliError, Result};

use clap::{Parser, Subcommand, ValueEnum};
use crawlgate_core::control::ControlCommand;
use crawlgate_core::coordination::Phase;

/// Crawlgate - crawl job coordination
#[derive(Parser, Debug)]
#[command(name = "crawlgate")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Shared store connection string
    #[arg(long, env = "CRAWLGATE_STORE_URL", global = true, hide_env_values = true)]
    pub store_url: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a lifecycle command to every instance of a job
    Control {
        /// Job identity
        identity: String,

        /// Command to send
        #[arg(value_enum)]
        command: ControlArg,
    },

    /// Show init and verify markers of a job
    Status {
        /// Job identity
        identity: String,
    },

    /// Delete phase markers so the next run executes the phase again
    Reset {
        /// Job identity
        identity: String,

        /// Phase to reset
        #[arg(long, value_enum, default_value_t = PhaseArg::All)]
        phase: PhaseArg,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlArg {
    Pause,
    Continue,
    RunAsync,
    Exit,
}

impl From<ControlArg> for ControlCommand {
    fn from(arg: ControlArg) -> Self {
        match arg {
            ControlArg::Pause => ControlCommand::Pause,
            ControlArg::Continue => ControlCommand::Continue,
            ControlArg::RunAsync => ControlCommand::RunAsync,
            ControlArg::Exit => ControlCommand::Exit,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseArg {
    Init,
    Verify,
    All,
}

impl PhaseArg {
    pub fn phases(self) -> Vec<Phase> {
        match self {
            PhaseArg::Init => vec![Phase::init()],
            PhaseArg::Verify => vec![Phase::verify()],
            PhaseArg::All => vec![Phase::init(), Phase::verify()],
        }
    }
}
