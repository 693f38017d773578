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
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use eyre::{Result, WrapErr};
use tracing::{debug, error, info, warn};

use super::{Device, Transport};

/// How long a runner waits on its transport before checking the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs a device's read, execute, send loop on a dedicated thread.
#[derive(Debug)]
pub struct DeviceRunner {
    device: Arc<Device>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceRunner {
    /// Starts the worker thread for `device`.
    pub fn spawn<T>(device: Arc<Device>, transport: T) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = thread::Builder::new()
            .name(format!("devsim-{}", device.name()))
            .spawn({
                let device = device.clone();
                let stop = stop.clone();
                move || serve(&device, transport, &stop)
            })
            .wrap_err_with(|| format!("failed to spawn runner for device `{}`", device.name()))?;
        Ok(Self { device, stop, handle: Some(handle) })
    }

    /// The device being served.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Returns true once the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stops the loop, releases a worker paused in the debugger and joins it.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // A worker blocked at a breakpoint never sees the stop flag otherwise.
        if let Some(session) = self.device.session() {
            session.stop();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(device = self.device.name(), "device runner panicked");
            }
        }
    }
}

impl Drop for DeviceRunner {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn serve<T: Transport>(device: &Device, mut transport: T, stop: &AtomicBool) {
    info!(device = device.name(), "device runner started");
    while !stop.load(Ordering::SeqCst) {
        let message = match transport.receive(POLL_INTERVAL) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(err) => {
                warn!(device = device.name(), error = %err, "transport receive failed, stopping runner");
                break;
            }
        };

        let response = device.handle(&message);
        if response.is_none() {
            debug!(device = device.name(), "no response");
            continue;
        }
        if let Err(err) = transport.send(response) {
            warn!(device = device.name(), error = %err, "transport send failed, stopping runner");
            break;
        }
    }
    info!(device = device.name(), "device runner stopped");
}
