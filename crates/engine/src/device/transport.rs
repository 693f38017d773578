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
        atomic::{AtomicU64, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    time::{Duration, Instant},
};

use devsim_common::Response;
use eyre::{eyre, Result};
use tracing::debug;

/// One message read from a transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InboundMessage {
    /// Message decoded as text
    pub text: String,
    /// Raw bytes, when the transport framed the message as binary
    pub bytes: Option<Vec<u8>>,
}

impl InboundMessage {
    /// A text-only message.
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), bytes: None }
    }

    /// A binary message. The text form is the lossy UTF-8 decoding of the bytes.
    pub fn binary(bytes: Vec<u8>) -> Self {
        Self { text: String::from_utf8_lossy(&bytes).into_owned(), bytes: Some(bytes) }
    }
}

/// The I/O side of a simulated device.
///
/// `receive` returns `Ok(None)` when no message arrived within `timeout`, which
/// lets the runner check its stop flag. Any error ends the runner's loop.
pub trait Transport: Send {
    /// Waits up to `timeout` for the next inbound message.
    fn receive(&mut self, timeout: Duration) -> Result<Option<InboundMessage>>;

    /// Sends a response back to the peer. Never called with [`Response::None`].
    fn send(&mut self, response: Response) -> Result<()>;
}

/// In-memory transport. The paired [`TransportHandle`] plays the peer.
///
/// Messages are numbered from 1 in the order they are received. Every response
/// carries the number of the last message received, so the handle can tell a
/// reply from a late answer to an earlier message.
#[derive(Debug)]
pub struct ChannelTransport {
    inbound: Receiver<InboundMessage>,
    outbound: Sender<(u64, Response)>,
    received: u64,
}

/// Peer end of a [`ChannelTransport`].
#[derive(Debug)]
pub struct TransportHandle {
    inbound: Sender<InboundMessage>,
    outbound: Receiver<(u64, Response)>,
    sent: AtomicU64,
}

impl ChannelTransport {
    /// Creates a connected transport and handle.
    pub fn pair() -> (Self, TransportHandle) {
        let (inbound_tx, inbound_rx) = mpsc::channel();
        let (outbound_tx, outbound_rx) = mpsc::channel();
        (
            Self { inbound: inbound_rx, outbound: outbound_tx, received: 0 },
            TransportHandle { inbound: inbound_tx, outbound: outbound_rx, sent: AtomicU64::new(0) },
        )
    }
}

impl Transport for ChannelTransport {
    fn receive(&mut self, timeout: Duration) -> Result<Option<InboundMessage>> {
        match self.inbound.recv_timeout(timeout) {
            Ok(message) => {
                self.received += 1;
                Ok(Some(message))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(eyre!("transport peer disconnected")),
        }
    }

    fn send(&mut self, response: Response) -> Result<()> {
        self.outbound.send((self.received, response)).map_err(|_| eyre!("transport peer disconnected"))
    }
}

impl TransportHandle {
    /// Delivers a message to the device and returns its sequence number.
    pub fn send(&self, message: InboundMessage) -> Result<u64> {
        self.inbound.send(message).map_err(|_| eyre!("device transport closed"))?;
        Ok(self.sent.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Delivers a text message to the device and returns its sequence number.
    pub fn send_text(&self, text: impl Into<String>) -> Result<u64> {
        self.send(InboundMessage::text(text))
    }

    /// Waits up to `timeout` for the device's next response.
    pub fn recv_response(&self, timeout: Duration) -> Option<Response> {
        self.outbound.recv_timeout(timeout).ok().map(|(_, response)| response)
    }

    /// Waits up to `timeout` for the response to message `seq`. Late responses
    /// to earlier messages are discarded.
    pub fn recv_reply(&self, seq: u64, timeout: Duration) -> Option<Response> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (tag, response) = self.outbound.recv_timeout(remaining).ok()?;
            if tag >= seq {
                return Some(response);
            }
            debug!(tag, seq, "discarding late response");
        }
    }
}
