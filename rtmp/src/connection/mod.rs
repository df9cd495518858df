//! A post-handshake RTMP connection.
//!
//! `RtmpConnection` sits between the transport and the application.  Inbound bytes go through
//! `handle_input()`, which reassembles chunks, applies protocol control messages (chunk size,
//! abort, acknowledgement windows, pings) and raises every decoded message.  Outbound messages
//! are chunked by `send_message()` into a FIFO queue the transport drains with
//! `fold_pending_messages()` or `take_pending_bytes()`.
//!
//! The connection is a plain value owned by whoever drives it.  Nothing is shared or stored
//! globally, so a server keeps one per peer.
//!
//! # Examples
//!
//! ```
//! use rml_rtmp::connection::{ConnectionConfig, ConnectionResult, RtmpConnection};
//! use rml_rtmp::messages::RtmpMessage;
//! use rml_rtmp::time::RtmpTimestamp;
//!
//! let mut client = RtmpConnection::new(ConnectionConfig::new());
//! let mut server = RtmpConnection::new(ConnectionConfig::new());
//!
//! let message = RtmpMessage::WindowAcknowledgement { size: 5000 };
//! client.send_message(message.clone(), RtmpTimestamp::new(0), 0, false).unwrap();
//!
//! let bytes = client.take_pending_bytes();
//! let results = server.handle_input(&bytes).unwrap();
//! assert_eq!(results, vec![ConnectionResult::MessageReceived {
//!     message,
//!     timestamp: RtmpTimestamp::new(0),
//!     message_stream_id: 0,
//! }]);
//! ```

mod config;
mod errors;
mod result;

pub use self::config::ConnectionConfig;
pub use self::errors::ConnectionError;
pub use self::result::ConnectionResult;

use crate::chunk_io::{ChunkDeserializer, ChunkSerializer, Packet};
use crate::handshake::RtmpeCiphers;
use crate::messages::{
    MessagePayload, PeerBandwidthLimitType, RtmpMessage, UserControlEventType, AGGREGATE_TYPE_ID,
};
use crate::time::RtmpTimestamp;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// An outbound message waiting to be handed to the transport
#[derive(Debug)]
pub struct PendingMessage {
    /// The chunked (but not yet encrypted) bytes of the message
    pub bytes: Vec<u8>,
    pub message: RtmpMessage,
    pub can_be_dropped: bool,
}

pub struct RtmpConnection {
    config: ConnectionConfig,
    serializer: ChunkSerializer,
    deserializer: ChunkDeserializer,
    pending: VecDeque<PendingMessage>,
    ciphers: Option<RtmpeCiphers>,
    bytes_read: u64,
    bytes_written: u64,
    peer_window_ack_size: Option<u32>,
    bytes_read_at_last_ack: u64,
    window_ack_size_sent: Option<u32>,
    peer_acknowledged_bytes: u32,
    peer_bandwidth: Option<(u32, PeerBandwidthLimitType)>,
}

impl RtmpConnection {
    pub fn new(config: ConnectionConfig) -> RtmpConnection {
        RtmpConnection {
            config,
            serializer: ChunkSerializer::new(),
            deserializer: ChunkDeserializer::new(),
            pending: VecDeque::new(),
            ciphers: None,
            bytes_read: 0,
            bytes_written: 0,
            peer_window_ack_size: None,
            bytes_read_at_last_ack: 0,
            window_ack_size_sent: None,
            peer_acknowledged_bytes: 0,
            peer_bandwidth: None,
        }
    }

    /// Creates a connection whose traffic is protected by the ciphers of an RTMPE handshake
    pub fn with_ciphers(config: ConnectionConfig, ciphers: RtmpeCiphers) -> RtmpConnection {
        let mut connection = RtmpConnection::new(config);
        connection.ciphers = Some(ciphers);
        connection
    }

    /// Enables RTMPE for every byte handled from now on.  Used when the connection had to exist
    /// before the handshake finished, as with tunnelled sessions.
    pub fn set_ciphers(&mut self, ciphers: RtmpeCiphers) {
        self.ciphers = Some(ciphers);
    }

    pub fn is_encrypted(&self) -> bool {
        self.ciphers.is_some()
    }

    /// Queues the control messages a server announces right after the handshake: the
    /// acknowledgement window, the peer bandwidth and the chunk size from the config.
    pub fn queue_initial_control_messages(&mut self) -> Result<(), ConnectionError> {
        let time = RtmpTimestamp::new(0);
        let window = self.config.window_ack_size;
        self.send_message(RtmpMessage::WindowAcknowledgement { size: window }, time, 0, false)?;
        self.window_ack_size_sent = Some(window);

        let bandwidth = RtmpMessage::SetPeerBandwidth {
            size: self.config.peer_bandwidth,
            limit_type: PeerBandwidthLimitType::Dynamic,
        };

        self.send_message(bandwidth, time, 0, false)?;
        self.set_max_chunk_size(self.config.chunk_size)
    }

    /// Processes bytes received from the peer.
    ///
    /// Decrypts them when RTMPE is in use, reads every complete message and applies protocol
    /// control messages.  Responses the connection owes the peer (acknowledgements and ping
    /// responses) are queued as pending messages.
    pub fn handle_input(&mut self, bytes: &[u8]) -> Result<Vec<ConnectionResult>, ConnectionError> {
        let mut data = bytes.to_vec();
        if let Some(ref mut ciphers) = self.ciphers {
            ciphers.decrypt(&mut data);
        }

        self.bytes_read += data.len() as u64;

        let mut results = Vec::new();
        let mut input = &data[..];
        while let Some(payload) = self.deserializer.get_next_message(input)? {
            input = &[];
            self.handle_payload(payload, &mut results)?;
        }

        self.acknowledge_if_needed()?;
        Ok(results)
    }

    /// Serializes a message into chunks and queues it
    pub fn send_message(
        &mut self,
        message: RtmpMessage,
        timestamp: RtmpTimestamp,
        message_stream_id: u32,
        can_be_dropped: bool,
    ) -> Result<(), ConnectionError> {
        let payload = MessagePayload::from_rtmp_message(message.clone(), timestamp, message_stream_id)?;
        let packet = self.serializer.serialize(&payload, false, can_be_dropped)?;
        self.enqueue(packet, message);
        Ok(())
    }

    /// Changes the outbound chunk size, queueing the `SetChunkSize` message that announces it
    pub fn set_max_chunk_size(&mut self, size: u32) -> Result<(), ConnectionError> {
        let packet = self.serializer.set_max_chunk_size(size, RtmpTimestamp::new(0))?;
        self.enqueue(packet, RtmpMessage::SetChunkSize { size });
        debug!(size, "Outbound chunk size changed");
        Ok(())
    }

    pub fn has_pending_messages(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_message_count(&self) -> usize {
        self.pending.len()
    }

    /// Drains pending messages into one contiguous buffer.
    ///
    /// Messages are taken in order while the buffer is smaller than `target_size`, so the
    /// buffer may overshoot the target by up to one message and always contains at least one
    /// message when any are pending.  `on_sent` is then called for each included message in
    /// the order they were queued.
    pub fn fold_pending_messages<F>(&mut self, target_size: usize, mut on_sent: F) -> Vec<u8>
    where
        F: FnMut(&RtmpMessage),
    {
        let mut buffer = Vec::new();
        let mut sent = Vec::new();
        while buffer.is_empty() || buffer.len() < target_size {
            match self.pending.pop_front() {
                Some(pending) => {
                    buffer.extend_from_slice(&pending.bytes);
                    sent.push(pending.message);
                }

                None => break,
            }
        }

        if let Some(ref mut ciphers) = self.ciphers {
            ciphers.encrypt(&mut buffer);
        }

        self.bytes_written += buffer.len() as u64;
        trace!(messages = sent.len(), bytes = buffer.len(), "Folded pending messages");

        for message in &sent {
            on_sent(message);
        }

        buffer
    }

    /// Drains every pending message
    pub fn take_pending_bytes(&mut self) -> Vec<u8> {
        self.fold_pending_messages(usize::max_value(), |_| ())
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Sequence number of the last acknowledgement received from the peer
    pub fn peer_acknowledged_bytes(&self) -> u32 {
        self.peer_acknowledged_bytes
    }

    /// The bandwidth limit last requested by the peer
    pub fn peer_bandwidth(&self) -> Option<(u32, PeerBandwidthLimitType)> {
        self.peer_bandwidth
    }

    fn enqueue(&mut self, packet: Packet, message: RtmpMessage) {
        self.pending.push_back(PendingMessage {
            bytes: packet.bytes,
            message,
            can_be_dropped: packet.can_be_dropped,
        });
    }

    fn handle_payload(
        &mut self,
        payload: MessagePayload,
        results: &mut Vec<ConnectionResult>,
    ) -> Result<(), ConnectionError> {
        if payload.type_id == AGGREGATE_TYPE_ID {
            match payload.split_aggregate() {
                Ok(parts) => {
                    for part in parts {
                        self.handle_payload(part, results)?;
                    }
                }

                Err(error) => {
                    warn!(%error, "Received an invalid aggregate message");
                    results.push(ConnectionResult::UnhandleableMessageReceived(payload));
                }
            }

            return Ok(());
        }

        let message = match payload.to_rtmp_message() {
            Ok(message) => message,
            Err(error) => {
                warn!(type_id = payload.type_id, %error, "Failed to decode message payload");
                results.push(ConnectionResult::UnhandleableMessageReceived(payload));
                return Ok(());
            }
        };

        trace!(type_id = payload.type_id, stream_id = payload.message_stream_id, "Message received");
        self.apply_protocol_control(&message)?;

        results.push(ConnectionResult::MessageReceived {
            message,
            timestamp: payload.timestamp,
            message_stream_id: payload.message_stream_id,
        });

        Ok(())
    }

    fn apply_protocol_control(&mut self, message: &RtmpMessage) -> Result<(), ConnectionError> {
        match *message {
            RtmpMessage::SetChunkSize { size } => {
                self.deserializer.set_max_chunk_size(size as usize)?;
                debug!(size, "Peer changed its chunk size");
            }

            RtmpMessage::Abort { stream_id } => {
                self.deserializer.abort_message(stream_id);
            }

            RtmpMessage::Acknowledgement { sequence_number } => {
                self.peer_acknowledged_bytes = sequence_number;
            }

            RtmpMessage::WindowAcknowledgement { size } => {
                debug!(size, "Peer set the acknowledgement window");
                self.peer_window_ack_size = Some(size);
            }

            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                self.peer_bandwidth = Some((size, limit_type));
                if self.window_ack_size_sent != Some(size) {
                    let time = RtmpTimestamp::new(0);
                    self.send_message(RtmpMessage::WindowAcknowledgement { size }, time, 0, false)?;
                    self.window_ack_size_sent = Some(size);
                }
            }

            RtmpMessage::UserControl {
                event_type: UserControlEventType::PingRequest,
                timestamp,
                ..
            } => {
                let response = RtmpMessage::UserControl {
                    event_type: UserControlEventType::PingResponse,
                    stream_id: None,
                    buffer_length: None,
                    timestamp,
                };

                self.send_message(response, RtmpTimestamp::new(0), 0, false)?;
            }

            _ => (),
        }

        Ok(())
    }

    fn acknowledge_if_needed(&mut self) -> Result<(), ConnectionError> {
        let window = match self.peer_window_ack_size {
            Some(window) if window > 0 => window as u64,
            _ => return Ok(()),
        };

        if self.bytes_read - self.bytes_read_at_last_ack >= window {
            self.bytes_read_at_last_ack = self.bytes_read;
            let sequence_number = self.bytes_read as u32;
            let ack = RtmpMessage::Acknowledgement { sequence_number };
            self.send_message(ack, RtmpTimestamp::new(0), 0, false)?;
            trace!(sequence_number, "Acknowledgement queued");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::{Handshake, HandshakeConfig, HandshakeProcessResult, PeerType};
    use bytes::Bytes;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rml_amf::Amf0Value;

    fn decode_all(bytes: &[u8]) -> Vec<RtmpMessage> {
        let mut deserializer = ChunkDeserializer::new();
        let mut messages = Vec::new();
        let mut input = bytes;
        while let Some(payload) = deserializer.get_next_message(input).unwrap() {
            input = &[];
            let message = payload.to_rtmp_message().unwrap();
            if let RtmpMessage::SetChunkSize { size } = message {
                deserializer.set_max_chunk_size(size as usize).unwrap();
            }

            messages.push(message);
        }

        messages
    }

    fn video(length: usize) -> RtmpMessage {
        RtmpMessage::VideoData {
            data: Bytes::from(vec![0x27; length]),
        }
    }

    #[test]
    fn peer_chunk_size_change_is_applied() {
        let mut peer = RtmpConnection::new(ConnectionConfig::new());
        peer.set_max_chunk_size(4096).unwrap();
        peer.send_message(video(3000), RtmpTimestamp::new(40), 1, false).unwrap();

        let mut connection = RtmpConnection::new(ConnectionConfig::new());
        let results = connection.handle_input(&peer.take_pending_bytes()).unwrap();

        assert_vec_match!(results,
            ConnectionResult::MessageReceived { message: RtmpMessage::SetChunkSize { size: 4096 }, .. },
            ConnectionResult::MessageReceived { message: RtmpMessage::VideoData { ref data }, message_stream_id: 1, .. }
                if data.len() == 3000);

        assert_eq!(connection.deserializer.get_max_chunk_size(), 4096);
    }

    #[test]
    fn ping_request_queues_ping_response() {
        let mut peer = RtmpConnection::new(ConnectionConfig::new());
        let ping = RtmpMessage::UserControl {
            event_type: UserControlEventType::PingRequest,
            stream_id: None,
            buffer_length: None,
            timestamp: Some(RtmpTimestamp::new(7777)),
        };

        peer.send_message(ping, RtmpTimestamp::new(0), 0, false).unwrap();

        let mut connection = RtmpConnection::new(ConnectionConfig::new());
        let results = connection.handle_input(&peer.take_pending_bytes()).unwrap();
        assert_eq!(results.len(), 1);
        assert!(connection.has_pending_messages());

        let responses = decode_all(&connection.take_pending_bytes());
        assert_vec_match!(responses,
            RtmpMessage::UserControl {
                event_type: UserControlEventType::PingResponse,
                timestamp: Some(time),
                ..
            } if time == RtmpTimestamp::new(7777));
    }

    #[test]
    fn acknowledgement_sent_when_window_is_crossed() {
        let mut peer = RtmpConnection::new(ConnectionConfig::new());
        peer.send_message(RtmpMessage::WindowAcknowledgement { size: 200 }, RtmpTimestamp::new(0), 0, false)
            .unwrap();

        let mut connection = RtmpConnection::new(ConnectionConfig::new());
        connection.handle_input(&peer.take_pending_bytes()).unwrap();
        assert!(!connection.has_pending_messages());

        peer.send_message(video(100), RtmpTimestamp::new(0), 1, false).unwrap();
        connection.handle_input(&peer.take_pending_bytes()).unwrap();
        assert!(!connection.has_pending_messages(), "Window not crossed yet");

        peer.send_message(video(100), RtmpTimestamp::new(33), 1, false).unwrap();
        connection.handle_input(&peer.take_pending_bytes()).unwrap();

        let expected = connection.bytes_read() as u32;
        let responses = decode_all(&connection.take_pending_bytes());
        assert_vec_match!(responses,
            RtmpMessage::Acknowledgement { sequence_number } if sequence_number == expected);
    }

    #[test]
    fn set_peer_bandwidth_answered_with_window_size() {
        let mut server = RtmpConnection::new(ConnectionConfig::new());
        server.queue_initial_control_messages().unwrap();

        let mut client = RtmpConnection::new(ConnectionConfig::new());
        let results = client.handle_input(&server.take_pending_bytes()).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(client.peer_bandwidth(), Some((2_500_000, PeerBandwidthLimitType::Dynamic)));

        let responses = decode_all(&client.take_pending_bytes());
        assert_vec_match!(responses,
            RtmpMessage::WindowAcknowledgement { size: 2_500_000 });
    }

    #[test]
    fn fold_stops_once_target_reached_and_reports_sent_messages() {
        let mut connection = RtmpConnection::new(ConnectionConfig::new());
        connection.send_message(video(50), RtmpTimestamp::new(0), 1, false).unwrap();
        connection.send_message(video(60), RtmpTimestamp::new(10), 1, false).unwrap();
        connection.send_message(video(70), RtmpTimestamp::new(20), 1, false).unwrap();

        let mut sent = Vec::new();
        let buffer = connection.fold_pending_messages(100, |message| sent.push(message.clone()));

        // 62 bytes for the first message (type 0 header) and 68 for the second (type 1 header)
        assert_eq!(buffer.len(), 62 + 68);
        assert_eq!(sent, vec![video(50), video(60)]);
        assert_eq!(connection.pending_message_count(), 1);
        assert_eq!(connection.bytes_written(), 130);
    }

    #[test]
    fn fold_always_includes_one_message() {
        let mut connection = RtmpConnection::new(ConnectionConfig::new());
        connection.send_message(video(10), RtmpTimestamp::new(0), 1, false).unwrap();
        connection.send_message(video(10), RtmpTimestamp::new(0), 1, false).unwrap();

        let mut count = 0;
        let buffer = connection.fold_pending_messages(0, |_| count += 1);
        assert_eq!(count, 1);
        assert_eq!(buffer.len(), 22);

        let buffer = connection.fold_pending_messages(0, |_| count += 1);
        assert_eq!(count, 2);
        assert_eq!(buffer.len(), 11, "Second message should use a type 3 header");

        let buffer = connection.fold_pending_messages(0, |_| count += 1);
        assert!(buffer.is_empty());
        assert_eq!(count, 2);
    }

    #[test]
    fn aggregate_sub_messages_are_raised_individually() {
        let mut body = vec![9, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0x17, 0x01, 0, 0, 0, 13];
        body.extend_from_slice(&[8, 0, 0, 1, 0, 0, 0x14, 0, 0, 0, 0, 0xaf, 0, 0, 0, 12]);

        let mut peer = RtmpConnection::new(ConnectionConfig::new());
        peer.send_message(RtmpMessage::Aggregate { data: Bytes::from(body) }, RtmpTimestamp::new(1000), 1, false)
            .unwrap();

        let mut connection = RtmpConnection::new(ConnectionConfig::new());
        let results = connection.handle_input(&peer.take_pending_bytes()).unwrap();

        assert_vec_match!(results,
            ConnectionResult::MessageReceived { message: RtmpMessage::VideoData { .. }, timestamp, message_stream_id: 1 }
                if timestamp == RtmpTimestamp::new(1000),
            ConnectionResult::MessageReceived { message: RtmpMessage::AudioData { .. }, timestamp, message_stream_id: 1 }
                if timestamp == RtmpTimestamp::new(1020));
    }

    #[test]
    fn undecodable_payload_is_reported() {
        let mut peer = RtmpConnection::new(ConnectionConfig::new());
        let bogus = RtmpMessage::Unknown {
            type_id: 20,
            data: Bytes::from(vec![0x02, 0x00, 0x10, b'c', b'o']),
        };

        peer.send_message(bogus, RtmpTimestamp::new(0), 0, false).unwrap();

        let mut connection = RtmpConnection::new(ConnectionConfig::new());
        let results = connection.handle_input(&peer.take_pending_bytes()).unwrap();
        assert_vec_match!(results,
            ConnectionResult::UnhandleableMessageReceived(MessagePayload { type_id: 20, .. }));
    }

    #[test]
    fn encrypted_connections_exchange_messages() {
        let config = HandshakeConfig {
            encrypted: true,
            ..HandshakeConfig::default()
        };

        let mut client = Handshake::with_rng(PeerType::Client, config.clone(), StdRng::seed_from_u64(1));
        let mut server = Handshake::with_rng(PeerType::Server, config, StdRng::seed_from_u64(2));

        let c0_c1 = client.generate_outbound_p0_and_p1().unwrap();
        let s0_s1_s2 = match server.process_bytes(&c0_c1).unwrap() {
            HandshakeProcessResult::InProgress { response_bytes } => response_bytes,
            x => panic!("Unexpected result: {:?}", x),
        };

        let c2 = match client.process_bytes(&s0_s1_s2).unwrap() {
            HandshakeProcessResult::Completed { response_bytes, .. } => response_bytes,
            x => panic!("Unexpected result: {:?}", x),
        };

        server.process_bytes(&c2).unwrap();

        let config = ConnectionConfig::new();
        let mut client = RtmpConnection::with_ciphers(config.clone(), client.take_ciphers().unwrap());
        let mut server = RtmpConnection::with_ciphers(config, server.take_ciphers().unwrap());

        let connect = RtmpMessage::Amf0Command {
            command_name: "connect".to_string(),
            transaction_id: 1.0,
            command_object: Amf0Value::Null,
            additional_arguments: Vec::new(),
        };

        client.send_message(connect.clone(), RtmpTimestamp::new(0), 0, false).unwrap();
        let bytes = client.take_pending_bytes();
        assert!(decode_first_type_id(&bytes) != Some(20), "Bytes were not encrypted");

        let results = server.handle_input(&bytes).unwrap();
        assert_vec_match!(results,
            ConnectionResult::MessageReceived { ref message, .. } if *message == connect);
    }

    fn decode_first_type_id(bytes: &[u8]) -> Option<u8> {
        let mut deserializer = ChunkDeserializer::new();
        match deserializer.get_next_message(bytes) {
            Ok(Some(payload)) => Some(payload.type_id),
            _ => None,
        }
    }
}
