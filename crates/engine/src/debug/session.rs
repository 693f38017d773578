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

use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicBool, Ordering},
};

use devsim_common::{DebugEvent, ExecutionMode, VariableSnapshot};
use parking_lot::{Condvar, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

/// The most recent line reported to a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Original script line
    pub line: usize,
    /// Variables visible at that line
    pub variables: Vec<VariableSnapshot>,
}

#[derive(Debug, Default)]
struct SessionState {
    enabled: bool,
    mode: ExecutionMode,
    breakpoints: BTreeSet<usize>,
    gate_open: bool,
    /// Bumped on every release of the gate. A paused thread waits for this to
    /// change, so a later pause cannot swallow an earlier release.
    releases: u64,
    last: Option<Location>,
}

/// A debugging session shared by the controller and every unit reporting to it.
///
/// Instrumented scripts call [`DebugSession::notify`] on their worker thread.
/// The session decides whether that thread pauses, and the controller releases
/// it with [`continue_execution`](Self::continue_execution),
/// [`step`](Self::step) or [`stop`](Self::stop) from another thread.
/// Mode, breakpoints and the gate live under one lock with one condition
/// variable.
#[derive(Debug)]
pub struct DebugSession {
    /// Lock-free copy of `SessionState::enabled` for the disabled fast path
    enabled: AtomicBool,
    state: Mutex<SessionState>,
    gate: Condvar,
    subscribers: Mutex<Vec<UnboundedSender<DebugEvent>>>,
}

impl Default for DebugSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugSession {
    /// Creates a disabled session in `Running` mode.
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            state: Mutex::new(SessionState { gate_open: true, ..Default::default() }),
            gate: Condvar::new(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Enables debugging. With `step_first`, the next notification pauses.
    pub fn start_debugging(&self, step_first: bool) {
        let mut state = self.state.lock();
        state.enabled = true;
        self.enabled.store(true, Ordering::SeqCst);
        if step_first {
            state.mode = ExecutionMode::Stepping;
            state.gate_open = false;
        } else {
            state.mode = ExecutionMode::Running;
            state.gate_open = true;
            state.releases += 1;
        }
        debug!(step_first, "debugging started");
        self.publish(DebugEvent::ModeChanged { mode: state.mode });
        self.gate.notify_all();
    }

    /// Resumes free execution until the next breakpoint. No-op when disabled.
    pub fn continue_execution(&self) {
        self.release(ExecutionMode::Running);
    }

    /// Resumes execution until the next notification. No-op when disabled.
    pub fn step(&self) {
        self.release(ExecutionMode::Stepping);
    }

    fn release(&self, mode: ExecutionMode) {
        let mut state = self.state.lock();
        if !state.enabled {
            return;
        }
        state.mode = mode;
        state.gate_open = true;
        state.releases += 1;
        trace!(%mode, "gate released");
        self.publish(DebugEvent::ModeChanged { mode });
        self.gate.notify_all();
    }

    /// Disables debugging and releases every paused thread.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.enabled = false;
        self.enabled.store(false, Ordering::SeqCst);
        state.mode = ExecutionMode::Running;
        state.gate_open = true;
        state.releases += 1;
        debug!("debugging stopped");
        self.publish(DebugEvent::ModeChanged { mode: ExecutionMode::Running });
        self.gate.notify_all();
    }

    /// Reports that a script reached `line`. Called on the executing thread,
    /// which blocks here while the session is paused.
    pub fn notify(&self, line: usize, variables: Vec<VariableSnapshot>) {
        if !self.is_enabled() {
            return;
        }

        let mut state = self.state.lock();
        if !state.enabled {
            return;
        }

        state.last = Some(Location { line, variables: variables.clone() });
        self.publish(DebugEvent::LineReached { line, variables });

        let hit = match state.mode {
            ExecutionMode::Stepping => true,
            _ => state.breakpoints.contains(&line),
        };
        if hit {
            state.mode = ExecutionMode::Paused;
            state.gate_open = false;
            debug!(line, "execution paused");
            self.publish(DebugEvent::ModeChanged { mode: ExecutionMode::Paused });
        }

        if state.mode == ExecutionMode::Paused {
            let ticket = state.releases;
            while state.enabled && state.releases == ticket {
                self.gate.wait(&mut state);
            }
        }
    }

    /// Adds a breakpoint. Returns false if it already existed.
    pub fn add_breakpoint(&self, line: usize) -> bool {
        self.state.lock().breakpoints.insert(line)
    }

    /// Removes a breakpoint. Returns false if there was none.
    pub fn remove_breakpoint(&self, line: usize) -> bool {
        self.state.lock().breakpoints.remove(&line)
    }

    /// Toggles a breakpoint. Returns true if the line now has one.
    pub fn toggle_breakpoint(&self, line: usize) -> bool {
        let mut state = self.state.lock();
        if state.breakpoints.remove(&line) {
            false
        } else {
            state.breakpoints.insert(line)
        }
    }

    /// Removes every breakpoint.
    pub fn clear_breakpoints(&self) {
        self.state.lock().breakpoints.clear();
    }

    /// Returns the breakpoints, ascending.
    pub fn breakpoints(&self) -> Vec<usize> {
        self.state.lock().breakpoints.iter().copied().collect()
    }

    /// Returns true if `line` has a breakpoint.
    pub fn has_breakpoint(&self, line: usize) -> bool {
        self.state.lock().breakpoints.contains(&line)
    }

    /// Returns true while debugging is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Returns the current mode.
    pub fn mode(&self) -> ExecutionMode {
        self.state.lock().mode
    }

    /// Returns true while the gate holds threads back.
    pub fn is_paused(&self) -> bool {
        let state = self.state.lock();
        state.mode == ExecutionMode::Paused && !state.gate_open
    }

    /// Returns the most recent line reached, for observers that subscribed late.
    pub fn last_location(&self) -> Option<Location> {
        self.state.lock().last.clone()
    }

    /// Subscribes to session events.
    pub fn subscribe(&self) -> UnboundedReceiver<DebugEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    fn publish(&self, event: DebugEvent) {
        self.subscribers.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devsim_common::Value;
    use std::{sync::Arc, thread, time::Duration};

    fn wait_until_paused(session: &DebugSession) {
        for _ in 0..500 {
            if session.is_paused() {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("session never paused");
    }

    #[test]
    fn test_disabled_notify_does_not_block() {
        let session = DebugSession::new();
        session.add_breakpoint(1);
        let mut events = session.subscribe();

        session.notify(1, vec![]);

        assert!(events.try_recv().is_err());
        assert_eq!(session.last_location(), None);
    }

    #[test]
    fn test_misuse_is_noop() {
        let session = DebugSession::new();
        let mut events = session.subscribe();

        session.continue_execution();
        session.step();

        assert_eq!(session.mode(), ExecutionMode::Running);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_breakpoint_management() {
        let session = DebugSession::new();
        assert!(session.add_breakpoint(5));
        assert!(!session.add_breakpoint(5));
        assert!(session.toggle_breakpoint(2));
        assert_eq!(session.breakpoints(), vec![2, 5]);
        assert!(!session.toggle_breakpoint(2));
        assert!(session.remove_breakpoint(5));
        assert!(!session.has_breakpoint(5));

        session.add_breakpoint(9);
        session.clear_breakpoints();
        assert!(session.breakpoints().is_empty());
    }

    #[test]
    fn test_breakpoint_pauses_until_continue() {
        let session = Arc::new(DebugSession::new());
        session.add_breakpoint(3);
        session.start_debugging(false);
        let mut events = session.subscribe();

        let worker = {
            let session = session.clone();
            thread::spawn(move || {
                session.notify(2, vec![]);
                session.notify(3, vec![VariableSnapshot::capture("x", &Value::Int(7))]);
                session.notify(4, vec![]);
            })
        };

        wait_until_paused(&session);
        let location = session.last_location().unwrap();
        assert_eq!(location.line, 3);
        assert_eq!(location.variables[0].value, Value::Int(7));

        session.continue_execution();
        worker.join().unwrap();

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                DebugEvent::LineReached { line: 2, variables: vec![] },
                DebugEvent::LineReached {
                    line: 3,
                    variables: vec![VariableSnapshot::capture("x", &Value::Int(7))]
                },
                DebugEvent::ModeChanged { mode: ExecutionMode::Paused },
                DebugEvent::ModeChanged { mode: ExecutionMode::Running },
                DebugEvent::LineReached { line: 4, variables: vec![] },
            ]
        );
    }

    #[test]
    fn test_stop_releases_paused_thread() {
        let session = Arc::new(DebugSession::new());
        session.start_debugging(true);

        let worker = {
            let session = session.clone();
            thread::spawn(move || session.notify(1, vec![]))
        };

        wait_until_paused(&session);
        session.stop();
        worker.join().unwrap();

        assert!(!session.is_enabled());
        assert_eq!(session.mode(), ExecutionMode::Running);
    }

    #[test]
    fn test_restart_in_running_mode_releases_paused_thread() {
        let session = Arc::new(DebugSession::new());
        session.start_debugging(true);

        let worker = {
            let session = session.clone();
            thread::spawn(move || session.notify(1, vec![]))
        };

        wait_until_paused(&session);
        session.start_debugging(false);
        worker.join().unwrap();

        assert!(session.is_enabled());
        assert_eq!(session.mode(), ExecutionMode::Running);
        assert!(!session.is_paused());
    }

    #[test]
    fn test_closed_subscribers_are_pruned() {
        let session = DebugSession::new();
        let kept = session.subscribe();
        drop(session.subscribe());

        session.start_debugging(false);
        assert_eq!(session.subscriber_count(), 1);
        drop(kept);
        assert_eq!(session.subscriber_count(), 0);
    }
}
