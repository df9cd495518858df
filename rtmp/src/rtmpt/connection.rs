use super::config::RtmptConfig;
use crate::connection::RtmpConnection;
use crate::messages::RtmpMessage;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RtmptConnectionState {
    Open,

    /// `close()` was called but queued bytes still have to reach the client
    Closing,

    Closed,
}

/// One tunnelled RTMP session.
///
/// The client can only receive data in the body of its own polls, so every outbound byte waits
/// in a queue until the next `send` or `idle` request.  Bytes written before the RTMP
/// connection exists (the handshake) go through `queue_raw_bytes()`, everything afterwards is
/// sent through `connection_mut()`.
pub struct RtmptConnection {
    session_id: String,
    config: RtmptConfig,
    connection: RtmpConnection,
    raw_pending: VecDeque<Vec<u8>>,
    state: RtmptConnectionState,
    polling_delay: u8,
    empty_polls: u32,
    last_sequence: u64,
}

impl RtmptConnection {
    pub fn new(session_id: String, config: RtmptConfig) -> RtmptConnection {
        let connection = RtmpConnection::new(config.connection.clone());
        RtmptConnection {
            session_id,
            config,
            connection,
            raw_pending: VecDeque::new(),
            state: RtmptConnectionState::Open,
            polling_delay: 1,
            empty_polls: 0,
            last_sequence: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> RtmptConnectionState {
        self.state
    }

    pub fn polling_delay(&self) -> u8 {
        self.polling_delay
    }

    pub fn connection(&self) -> &RtmpConnection {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut RtmpConnection {
        &mut self.connection
    }

    /// Queues bytes that bypass the RTMP connection, such as handshake packets
    pub fn queue_raw_bytes(&mut self, bytes: Vec<u8>) {
        if !bytes.is_empty() {
            self.raw_pending.push_back(bytes);
        }
    }

    pub fn has_pending_messages(&self) -> bool {
        !self.raw_pending.is_empty() || self.connection.has_pending_messages()
    }

    /// Records the sequence number of a request.  Requests arriving out of order are still
    /// processed.
    pub fn track_sequence(&mut self, sequence: u64) {
        if sequence != self.last_sequence + 1 {
            warn!(
                session_id = %self.session_id,
                expected = self.last_sequence + 1,
                received = sequence,
                "RTMPT request arrived out of order"
            );
        }

        self.last_sequence = sequence;
    }

    /// Starts closing the session.  The connection stays usable until the client has polled
    /// every queued byte.
    pub fn close(&mut self) {
        if self.state == RtmptConnectionState::Open {
            debug!(session_id = %self.session_id, "RTMPT session closing");
            self.state = RtmptConnectionState::Closing;
        }
    }

    /// Builds the body of a poll response: the polling delay byte followed by as many queued
    /// bytes as fit in `target_size`.  `on_sent` is called for every RTMP message included.
    ///
    /// Returns `None` once the session is closed.  A closing session whose queue became empty
    /// closes for real during this call, after returning its remaining bytes.
    pub fn get_pending_messages<F>(&mut self, target_size: usize, on_sent: F) -> Option<Vec<u8>>
    where
        F: FnMut(&RtmpMessage),
    {
        if self.state == RtmptConnectionState::Closed {
            return None;
        }

        let mut data = Vec::new();
        while let Some(bytes) = self.raw_pending.pop_front() {
            data.extend_from_slice(&bytes);
            if data.len() >= target_size {
                break;
            }
        }

        if data.len() < target_size && self.raw_pending.is_empty() {
            let remaining = target_size - data.len();
            let folded = self.connection.fold_pending_messages(remaining, on_sent);
            data.extend_from_slice(&folded);
        }

        self.update_polling_delay(!data.is_empty());

        let mut body = Vec::with_capacity(data.len() + 1);
        body.push(self.polling_delay);
        body.extend_from_slice(&data);

        if self.state == RtmptConnectionState::Closing && !self.has_pending_messages() {
            self.real_close();
        }

        Some(body)
    }

    /// Same as `get_pending_messages` with the configured fold size
    pub fn poll(&mut self) -> Option<Vec<u8>> {
        let target = self.config.max_fold_size;
        self.get_pending_messages(target, |_| ())
    }

    fn update_polling_delay(&mut self, had_data: bool) {
        if had_data {
            self.polling_delay = 1;
            self.empty_polls = 0;
            return;
        }

        self.empty_polls += 1;
        if self.empty_polls >= self.config.increase_polling_delay_after {
            self.empty_polls = 0;
            if self.polling_delay < self.config.max_polling_delay {
                self.polling_delay += 1;
            }
        }
    }

    fn real_close(&mut self) {
        info!(session_id = %self.session_id, "RTMPT session closed");
        self.state = RtmptConnectionState::Closed;
    }
}
