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

//! Debug command - step-debug a script from the terminal
//!
//! The script runs on a worker thread. This thread prints session events and,
//! while the worker is paused, applies commands read from stdin:
//!
//! - `c` continue to the next breakpoint
//! - `s` step to the next statement
//! - `b N` toggle a breakpoint on line `N`
//! - `q` stop debugging and let the script finish

use std::{
    io::{self, BufRead},
    path::Path,
    sync::{
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    thread,
    time::Duration,
};

use devsim_common::{DebugEvent, ExecutionMode, KeyValueStore};
use devsim_engine::{DebugSession, ScriptHost};
use eyre::{eyre, Result, WrapErr};
use tracing::{debug, info};

use crate::utils::{format_event, parse_hex, print_diagnostics, read_script};

/// Options of the `debug` subcommand.
#[derive(Debug, Clone)]
pub struct DebugOptions {
    /// Inbound message text
    pub message: String,
    /// Inbound message bytes, as hex
    pub hex: Option<String>,
    /// Initial breakpoints
    pub breakpoints: Vec<usize>,
    /// Pause on the first statement
    pub step_first: bool,
    /// Print events as JSON lines
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Continue,
    Step,
    Toggle(usize),
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = match words.next()? {
            "c" | "continue" => Self::Continue,
            "s" | "step" => Self::Step,
            "q" | "quit" => Self::Quit,
            "b" | "break" => Self::Toggle(words.next()?.parse().ok()?),
            _ => return None,
        };
        Some(command)
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Debugs `path` until the script finishes.
pub fn debug(path: &Path, options: &DebugOptions, cli: &crate::Cli) -> Result<()> {
    let source = read_script(path)?;
    let bytes = options.hex.as_deref().map(parse_hex).transpose()?;

    let session = Arc::new(DebugSession::new());
    let unit = ScriptHost::new(cli.host_config())
        .with_session(session.clone())
        .load(&path.display().to_string(), &source)
        .inspect_err(|failure| print_diagnostics(&failure.diagnostics))?;
    if !unit.is_instrumented() {
        return Err(eyre!("{} could not be instrumented", path.display()));
    }

    for line in &options.breakpoints {
        session.add_breakpoint(*line);
    }
    let mut events = session.subscribe();
    session.start_debugging(options.step_first);

    let message = options.message.clone();
    let worker = thread::Builder::new()
        .name("devsim-debug".to_string())
        .spawn(move || unit.execute(&message, bytes.as_deref(), &KeyValueStore::new()))
        .wrap_err("Failed to spawn script worker")?;
    let commands = spawn_stdin_reader()?;

    loop {
        let mut idle = true;
        while let Ok(event) = events.try_recv() {
            idle = false;
            println!("{}", format_event(&event, options.json)?);
            if matches!(event, DebugEvent::ModeChanged { mode: ExecutionMode::Paused }) && !options.json {
                println!("(c)ontinue, (s)tep, (b)reak N, (q)uit");
            }
        }

        if session.is_paused() {
            match commands.try_recv() {
                Ok(line) => {
                    idle = false;
                    apply(&session, &line);
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    info!("stdin closed, stopping debugger");
                    session.stop();
                }
            }
        }

        if idle {
            if worker.is_finished() {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    let response = worker.join().map_err(|_| eyre!("Script worker panicked"))?;
    while let Ok(event) = events.try_recv() {
        println!("{}", format_event(&event, options.json)?);
    }
    session.stop();
    println!("response: {response}");
    Ok(())
}

fn apply(session: &DebugSession, line: &str) {
    match Command::parse(line) {
        Some(Command::Continue) => session.continue_execution(),
        Some(Command::Step) => session.step(),
        Some(Command::Toggle(line)) => {
            let set = session.toggle_breakpoint(line);
            println!("breakpoint on line {line} {}", if set { "set" } else { "cleared" });
        }
        Some(Command::Quit) => session.stop(),
        None => println!("unknown command `{}`", line.trim()),
    }
}

/// Forwards stdin lines over a channel so the main loop can poll them.
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("devsim-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                if tx.send(line).is_err() {
                    break;
                }
            }
            debug!("stdin reader finished");
        })
        .wrap_err("Failed to spawn stdin reader")?;
    Ok(rx)
}
