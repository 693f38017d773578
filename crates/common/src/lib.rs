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

//! DevSim Common - Shared functionality for DevSim components
//!
//! This crate provides the types shared by the script engine, the device runner
//! and the command-line front end: dynamic script values, key/value stores,
//! debug events, and logging setup.

/// Common types used throughout DevSim including values, responses, diagnostics and debug events
pub mod types;

/// Concurrency-safe key/value stores used for persistent script state
pub mod store;

/// Logging setup and utilities for consistent logging across DevSim components
pub mod logging;

pub use logging::*;
pub use store::*;
pub use types::*;
