// DevSim - Scripted Device Simulator
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! DevSim - Scripted Device Simulator
//!
//! Checks, instruments, runs and step-debugs device response scripts, and runs
//! configured devices against recorded input.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use devsim_engine::{HostConfig, DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_STEPS};
use eyre::Result;

mod cmd;
mod utils;

/// Command-line interface for DevSim
#[derive(Debug, Parser)]
#[command(name = "devsim")]
#[command(about = "Scripted Device Simulator - author, run and step-debug device response scripts")]
#[command(version)]
pub struct Cli {
    /// Also write logs to a daily rolling file
    #[arg(long, env = "DEVSIM_FILE_LOG")]
    pub file_log: bool,

    /// Statements one execution may run before it is aborted
    #[arg(long, env = "DEVSIM_MAX_STEPS", default_value_t = DEFAULT_MAX_STEPS)]
    pub max_steps: u64,

    /// Nested calls one execution may make before it is aborted
    #[arg(long, env = "DEVSIM_MAX_CALL_DEPTH", default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    pub max_call_depth: usize,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Host limits taken from the command line.
    pub fn host_config(&self) -> HostConfig {
        HostConfig { max_steps: self.max_steps, max_call_depth: self.max_call_depth, ..Default::default() }
    }
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compile a script and print its diagnostics
    Check {
        /// Script file
        script: PathBuf,
    },
    /// Print the instrumented form of a script
    Instrument {
        /// Script file
        script: PathBuf,
        /// Print the instrumentation plan as JSON instead
        #[arg(long)]
        plan: bool,
    },
    /// Execute a script against a message and print the response
    Run {
        /// Script file
        script: PathBuf,
        /// Inbound message text
        #[arg(long, default_value = "")]
        message: String,
        /// Inbound message bytes, as hex
        #[arg(long)]
        hex: Option<String>,
        /// Number of times to execute
        #[arg(long, default_value_t = 1)]
        repeat: usize,
    },
    /// Step-debug a script, reading commands from stdin
    Debug {
        /// Script file
        script: PathBuf,
        /// Inbound message text
        #[arg(long, default_value = "")]
        message: String,
        /// Inbound message bytes, as hex
        #[arg(long)]
        hex: Option<String>,
        /// Breakpoint line, may be repeated
        #[arg(long = "break", value_name = "LINE")]
        breakpoints: Vec<usize>,
        /// Pause on the first statement
        #[arg(long)]
        step: bool,
        /// Print debug events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Run every configured device against an input file
    Simulate {
        /// Simulator configuration (TOML)
        config: PathBuf,
        /// Input file, one message per line
        #[arg(long)]
        input: PathBuf,
        /// How long to wait for each device's response, in milliseconds
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },
}

fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    devsim_common::logging::init_logging("devsim", cli.file_log)?;

    match &cli.command {
        Commands::Check { script } => cmd::check::check(script, &cli),
        Commands::Instrument { script, plan } => cmd::instrument::instrument(script, *plan),
        Commands::Run { script, message, hex, repeat } => {
            cmd::run::run(script, message, hex.as_deref(), *repeat, &cli)
        }
        Commands::Debug { script, message, hex, breakpoints, step, json } => cmd::debug::debug(
            script,
            &cmd::debug::DebugOptions {
                message: message.clone(),
                hex: hex.clone(),
                breakpoints: breakpoints.clone(),
                step_first: *step,
                json: *json,
            },
            &cli,
        ),
        Commands::Simulate { config, input, timeout_ms } => {
            cmd::simulate::simulate(config, input, *timeout_ms)
        }
    }
}
