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

//! Execution of compiled scripts.
//!
//! A [`CompiledUnit`] is the callable result of compilation. Each call to
//! [`CompiledUnit::execute`] runs the `respond` entry point once with a fresh
//! set of locals; the unit's [`KeyValueStore`] and first-call flag persist
//! between calls.

mod builtins;
mod error;
mod interpreter;
mod ops;

pub use error::*;

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use devsim_common::{Diagnostic, KeyValueStore, Response, Value};
use tracing::{debug, warn};

use crate::{compiler::ir::Program, DebugSession, HostConfig, ENTRY_POINT};
use interpreter::{HostContext, Interpreter};

/// An executable script together with its persistent state.
#[derive(Debug)]
pub struct CompiledUnit {
    name: String,
    program: Program,
    warnings: Vec<Diagnostic>,
    instrumented: bool,
    config: HostConfig,
    session: Option<Arc<DebugSession>>,
    store: KeyValueStore,
    called: AtomicBool,
    executions: AtomicU64,
}

impl CompiledUnit {
    pub(crate) fn new(
        name: &str,
        program: Program,
        warnings: Vec<Diagnostic>,
        instrumented: bool,
        config: HostConfig,
        session: Option<Arc<DebugSession>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            program,
            warnings,
            instrumented,
            config,
            session,
            store: KeyValueStore::new(),
            called: AtomicBool::new(false),
            executions: AtomicU64::new(0),
        }
    }

    /// Runs the script for one inbound message.
    ///
    /// `data` is bound to `bytes`, or to empty bytes when the message has no
    /// binary form. Runtime failures are logged and produce [`Response::None`].
    pub fn execute(&self, message: &str, bytes: Option<&[u8]>, shared: &KeyValueStore) -> Response {
        match self.try_execute(message, bytes, shared) {
            Ok(response) => response,
            Err(err) => {
                warn!(unit = %self.name, line = err.line, error = %err.kind, "script execution failed");
                Response::None
            }
        }
    }

    /// Like [`execute`](Self::execute), but hands the failure to the caller.
    pub fn try_execute(
        &self,
        message: &str,
        bytes: Option<&[u8]>,
        shared: &KeyValueStore,
    ) -> Result<Response, RuntimeError> {
        let first_call = !self.called.swap(true, Ordering::SeqCst);
        let execution = self.executions.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(unit = %self.name, execution, first_call, "executing script");

        let host = HostContext {
            unit: &self.name,
            store: &self.store,
            shared,
            first_call,
            session: self.session.as_deref(),
        };
        let args = vec![Value::from(message), Value::Bytes(bytes.map(<[u8]>::to_vec).unwrap_or_default())];

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            Interpreter::new(&self.program, &host, &self.config).call(ENTRY_POINT, args)
        }));
        match outcome {
            Ok(result) => result.map(Response::from_value),
            Err(payload) => Err(RuntimeErrorKind::Panic(panic_message(payload.as_ref())).at(0)),
        }
    }

    /// Name the unit was compiled under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unit's persistent store.
    pub fn store(&self) -> &KeyValueStore {
        &self.store
    }

    /// The debug session instrumented statements report to, if any.
    pub fn session(&self) -> Option<&Arc<DebugSession>> {
        self.session.as_ref()
    }

    /// Whether the compiled text contained notification calls.
    pub fn is_instrumented(&self) -> bool {
        self.instrumented
    }

    /// Non-fatal diagnostics produced while compiling.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Number of executions started so far.
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
