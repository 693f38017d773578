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

//! DevSim Engine - script instrumentation, compilation and execution
//!
//! The engine turns device scripts into callable units, instruments them for
//! step debugging, coordinates debug sessions across device threads and runs
//! devices against their transports.

pub mod template;
pub use template::*;

pub mod syntax;

pub mod instrumentation;
pub use instrumentation::*;

pub mod compiler;
pub use compiler::*;

pub mod runtime;
pub use runtime::*;

pub mod debug;
pub use debug::*;

pub mod device;
pub use device::*;

pub mod config;
pub use config::*;
