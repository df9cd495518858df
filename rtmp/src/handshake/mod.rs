//! This module handles the RTMP handshake, in both its plain and RTMPE (encrypted) forms.
//!
//! Flash clients and media servers exchange digest-signed packets, and most modern servers
//! refuse h.264 video from peers that only perform the original echo handshake.  A `Handshake`
//! produces signed packets and validates the peer's, falling back to the echo handshake when the
//! peer advertises no version.  When RTMPE is negotiated, the Diffie-Hellman keys embedded in
//! packet 1 produce a pair of RC4 ciphers retrievable with `take_ciphers()` once the handshake
//! completes.
//!
//! Once the handshake has completed, any bytes left over in the buffer are returned in
//! `remaining_bytes`.  Those are the first RTMP chunk bytes (already encrypted when RTMPE is in
//! use) and should be handed to the connection.
//!
//! # Examples
//! ```
//! use rml_rtmp::handshake::{Handshake, HandshakeProcessResult, PeerType};
//!
//! let mut client = Handshake::new(PeerType::Client);
//! let mut server = Handshake::new(PeerType::Server);
//!
//! let c0_and_c1 = client.generate_outbound_p0_and_p1().unwrap();
//! let s0_s1_and_s2 = match server.process_bytes(&c0_and_c1).unwrap() {
//!     HandshakeProcessResult::InProgress { response_bytes } => response_bytes,
//!     x => panic!("Unexpected result: {:?}", x),
//! };
//!
//! let c2 = match client.process_bytes(&s0_s1_and_s2).unwrap() {
//!     HandshakeProcessResult::Completed { response_bytes, .. } => response_bytes,
//!     x => panic!("Unexpected result: {:?}", x),
//! };
//!
//! match server.process_bytes(&c2).unwrap() {
//!     HandshakeProcessResult::Completed { .. } => (),
//!     x => panic!("Unexpected result: {:?}", x),
//! }
//! ```

mod digest;
mod errors;
mod rtmpe;

pub use self::errors::HandshakeError;
pub use self::rtmpe::RtmpeCiphers;

use self::digest::{KeyOwner, Scheme, DIGEST_SIZE, PACKET_SIZE};
use self::rtmpe::{DhKeyPair, PUBLIC_KEY_SIZE};
use byteorder::{BigEndian, WriteBytesExt};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, warn};

const PLAIN_VERSION: u8 = 3;
const ENCRYPTED_VERSION: u8 = 6;

/// Contains the results of processing incoming handshake bytes
#[derive(Debug, PartialEq)]
pub enum HandshakeProcessResult {
    /// The handshake is not complete yet.  Any response bytes should be sent to the peer.
    InProgress { response_bytes: Vec<u8> },

    /// The handshake is complete.  `response_bytes` should still be sent to the peer, while
    /// `remaining_bytes` belong to the RTMP chunk stream.
    Completed {
        response_bytes: Vec<u8>,
        remaining_bytes: Vec<u8>,
    },
}

/// The type of peer being represented by the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerType {
    Server,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Initial,

    /// The client has sent C0 and C1
    C1Sent,

    /// The client has validated S1 and sent C2, and is waiting on S2
    S1Received,

    /// The server has sent S0, S1 and S2 and is waiting on C2
    S1Sent,
    Complete,
    Failed,
}

#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Request RTMPE.  Only used by clients, servers follow whatever the client asks for.
    pub encrypted: bool,

    /// Fail the handshake when the server's packet 2 signature does not match instead of
    /// logging the mismatch
    pub strict_s2_validation: bool,

    /// Version bytes a client places in C1
    pub client_version: [u8; 4],

    /// Version bytes a server places in S1
    pub server_version: [u8; 4],

    /// Value of the time field of packet 1
    pub epoch: u32,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        HandshakeConfig {
            encrypted: false,
            strict_s2_validation: false,
            client_version: [128, 0, 7, 2],
            server_version: [4, 5, 0, 1],
            epoch: 0,
        }
    }
}

/// How the peer's packets are signed
#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Digest,

    /// The original handshake, where packet 2 echoes the peer's packet 1
    Simple,
}

/// Performs one side of an RTMP handshake
pub struct Handshake {
    peer_type: PeerType,
    config: HandshakeConfig,
    state: HandshakeState,
    rng: StdRng,
    encrypted: bool,
    mode: Mode,
    buffer: Vec<u8>,
    own_packet: Vec<u8>,
    own_digest: [u8; DIGEST_SIZE],
    key_pair: Option<DhKeyPair>,
    ciphers: Option<RtmpeCiphers>,
    peer_digest_verified: Option<bool>,
}

impl Handshake {
    pub fn new(peer_type: PeerType) -> Handshake {
        Handshake::with_config(peer_type, HandshakeConfig::default())
    }

    pub fn with_config(peer_type: PeerType, config: HandshakeConfig) -> Handshake {
        Handshake::with_rng(peer_type, config, StdRng::from_entropy())
    }

    /// Creates a handshake drawing its random bytes and keys from the provided generator
    pub fn with_rng(peer_type: PeerType, config: HandshakeConfig, rng: StdRng) -> Handshake {
        Handshake {
            peer_type,
            encrypted: config.encrypted && peer_type == PeerType::Client,
            config,
            state: HandshakeState::Initial,
            rng,
            mode: Mode::Digest,
            buffer: Vec::new(),
            own_packet: Vec::new(),
            own_digest: [0; DIGEST_SIZE],
            key_pair: None,
            ciphers: None,
            peer_digest_verified: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Whether RTMPE was negotiated
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Result of validating the peer's packet 2 signature.  `None` until the packet has been
    /// processed, and for peers using the original echo handshake.
    pub fn peer_digest_verified(&self) -> Option<bool> {
        self.peer_digest_verified
    }

    /// Hands over the RTMPE ciphers once an encrypted handshake has completed
    pub fn take_ciphers(&mut self) -> Option<RtmpeCiphers> {
        match self.state {
            HandshakeState::Complete => self.ciphers.take(),
            _ => None,
        }
    }

    /// Creates the first packets to send.  Only clients initiate, a server answers from
    /// `process_bytes()` once it has received C0 and C1.
    pub fn generate_outbound_p0_and_p1(&mut self) -> Result<Vec<u8>, HandshakeError> {
        match self.peer_type {
            PeerType::Client => self.generate_client_request1(),
            PeerType::Server => Err(HandshakeError::OutOfOrder { state: self.state }),
        }
    }

    /// Creates C0 and C1
    pub fn generate_client_request1(&mut self) -> Result<Vec<u8>, HandshakeError> {
        if self.peer_type != PeerType::Client || self.state != HandshakeState::Initial {
            return Err(HandshakeError::OutOfOrder { state: self.state });
        }

        let version = self.config.client_version;
        let (packet, digest) = self.create_packet1(version, KeyOwner::Client)?;

        let mut bytes = Vec::with_capacity(PACKET_SIZE + 1);
        bytes.push(self.version_byte());
        bytes.extend_from_slice(&packet);

        self.own_packet = packet;
        self.own_digest = digest;
        self.state = HandshakeState::C1Sent;
        Ok(bytes)
    }

    /// Validates S0 and S1 and produces C2.  Any error is fatal.
    pub fn decode_server_response1(&mut self, s0_and_s1: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        self.check_state(HandshakeState::C1Sent)?;
        let result = self.read_server_response1(s0_and_s1);
        self.fail_on_error(result)
    }

    /// Checks S2.  A mismatch only fails the handshake when strict validation is configured,
    /// otherwise it is logged and reported through `peer_digest_verified()`.
    pub fn decode_server_response2(&mut self, s2: &[u8]) -> Result<bool, HandshakeError> {
        self.check_state(HandshakeState::S1Received)?;
        let result = self.read_server_response2(s2);
        self.fail_on_error(result)
    }

    fn read_server_response1(&mut self, s0_and_s1: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        if s0_and_s1.len() < PACKET_SIZE + 1 {
            return Err(HandshakeError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }

        let version = s0_and_s1[0];
        if version != self.version_byte() {
            return Err(HandshakeError::BadVersionId { version });
        }

        let s1 = s0_and_s1[1..PACKET_SIZE + 1].to_vec();
        let c2 = if !self.encrypted && s1[4..8] == [0, 0, 0, 0] {
            debug!("Server uses the original handshake, echoing S1");
            self.mode = Mode::Simple;
            s1.clone()
        } else {
            let (scheme, s1_digest) = match digest::find_digest(&s1, self.scheme(), KeyOwner::Server)? {
                Some(found) => found,
                None => return Err(HandshakeError::InvalidS1Digest),
            };

            if self.encrypted {
                self.ciphers = Some(self.derive_ciphers(&s1, scheme)?);
            }

            self.create_packet2(&s1_digest, KeyOwner::Client)?
        };

        self.state = HandshakeState::S1Received;
        Ok(c2)
    }

    fn read_server_response2(&mut self, s2: &[u8]) -> Result<bool, HandshakeError> {
        if s2.len() < PACKET_SIZE {
            return Err(HandshakeError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }

        let s2 = &s2[..PACKET_SIZE];
        let is_valid = match self.mode {
            Mode::Simple => s2[8..] == self.own_packet[8..],
            Mode::Digest => {
                let valid = digest::verify_response(s2, &self.own_digest, KeyOwner::Server)?;
                self.peer_digest_verified = Some(valid);
                valid
            }
        };

        if !is_valid {
            if self.config.strict_s2_validation {
                return Err(HandshakeError::InvalidS2Digest);
            }

            warn!("Server's packet 2 failed validation, continuing anyway");
        }

        self.complete();
        Ok(is_valid)
    }

    /// Feeds bytes received from the peer into the handshake.  Any error other than calling it
    /// out of order moves the handshake to `Failed`.
    pub fn process_bytes(&mut self, data: &[u8]) -> Result<HandshakeProcessResult, HandshakeError> {
        match (self.peer_type, self.state) {
            (_, HandshakeState::Failed) => return Err(HandshakeError::HandshakeFailed),
            (_, HandshakeState::Complete) => return Err(HandshakeError::HandshakeAlreadyCompleted),
            (PeerType::Client, HandshakeState::Initial) => {
                return Err(HandshakeError::OutOfOrder { state: self.state });
            }

            _ => (),
        }

        self.buffer.extend_from_slice(data);
        let result = self.advance();
        self.fail_on_error(result)
    }

    fn advance(&mut self) -> Result<HandshakeProcessResult, HandshakeError> {
        let mut response_bytes = Vec::new();
        loop {
            let progressed = match (self.peer_type, self.state) {
                (PeerType::Client, HandshakeState::C1Sent) => {
                    if self.buffer.len() < PACKET_SIZE + 1 {
                        false
                    } else {
                        let s0_and_s1: Vec<u8> = self.buffer.drain(..PACKET_SIZE + 1).collect();
                        let c2 = self.decode_server_response1(&s0_and_s1)?;
                        response_bytes.extend(c2);
                        true
                    }
                }

                (PeerType::Client, HandshakeState::S1Received) => {
                    if self.buffer.len() < PACKET_SIZE {
                        false
                    } else {
                        let s2: Vec<u8> = self.buffer.drain(..PACKET_SIZE).collect();
                        self.decode_server_response2(&s2)?;
                        true
                    }
                }

                (PeerType::Server, HandshakeState::Initial) => {
                    if self.buffer.len() < PACKET_SIZE + 1 {
                        false
                    } else {
                        let c0_and_c1: Vec<u8> = self.buffer.drain(..PACKET_SIZE + 1).collect();
                        response_bytes.extend(self.answer_client_request(&c0_and_c1)?);
                        true
                    }
                }

                (PeerType::Server, HandshakeState::S1Sent) => {
                    if self.buffer.len() < PACKET_SIZE {
                        false
                    } else {
                        let c2: Vec<u8> = self.buffer.drain(..PACKET_SIZE).collect();
                        self.validate_client_response(&c2)?;
                        true
                    }
                }

                (_, HandshakeState::Complete) => {
                    let remaining_bytes = self.buffer.drain(..).collect();
                    return Ok(HandshakeProcessResult::Completed {
                        response_bytes,
                        remaining_bytes,
                    });
                }

                _ => false,
            };

            if !progressed {
                return Ok(HandshakeProcessResult::InProgress { response_bytes });
            }
        }
    }

    fn answer_client_request(&mut self, c0_and_c1: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        let version = c0_and_c1[0];
        self.encrypted = match version {
            PLAIN_VERSION => false,
            ENCRYPTED_VERSION => true,
            _ => return Err(HandshakeError::BadVersionId { version }),
        };

        let c1 = c0_and_c1[1..].to_vec();
        let client_digest = if !self.encrypted && c1[4..8] == [0, 0, 0, 0] {
            None
        } else {
            digest::find_digest(&c1, self.scheme(), KeyOwner::Client)?
        };

        let mut response = Vec::with_capacity(PACKET_SIZE * 2 + 1);
        response.push(version);

        match client_digest {
            Some((scheme, c1_digest)) => {
                let server_version = self.config.server_version;
                let (s1, s1_digest) = self.create_packet1(server_version, KeyOwner::Server)?;
                self.own_packet = s1;
                self.own_digest = s1_digest;

                if self.encrypted {
                    self.ciphers = Some(self.derive_ciphers(&c1, scheme)?);
                }

                let s2 = self.create_packet2(&c1_digest, KeyOwner::Server)?;
                response.extend_from_slice(&self.own_packet);
                response.extend(s2);
            }

            None if self.encrypted => return Err(HandshakeError::InvalidC1Digest),

            None => {
                debug!("Client did not sign C1, falling back to the original handshake");
                self.mode = Mode::Simple;

                let mut s1 = Vec::with_capacity(PACKET_SIZE);
                s1.write_u32::<BigEndian>(self.config.epoch)?;
                s1.write_u32::<BigEndian>(0)?;
                s1.resize(PACKET_SIZE, 0);
                self.rng.fill_bytes(&mut s1[8..]);

                response.extend_from_slice(&s1);
                response.extend_from_slice(&c1);
                self.own_packet = s1;
            }
        }

        self.state = HandshakeState::S1Sent;
        Ok(response)
    }

    fn validate_client_response(&mut self, c2: &[u8]) -> Result<(), HandshakeError> {
        match self.mode {
            Mode::Simple => {
                if c2[8..] != self.own_packet[8..] {
                    warn!("Client's packet 2 does not echo S1");
                }
            }

            Mode::Digest => {
                let valid = digest::verify_response(c2, &self.own_digest, KeyOwner::Client)?;
                if !valid {
                    warn!("Client's packet 2 failed validation, continuing anyway");
                }

                self.peer_digest_verified = Some(valid);
            }
        }

        self.complete();
        Ok(())
    }

    fn create_packet1(
        &mut self,
        version: [u8; 4],
        owner: KeyOwner,
    ) -> Result<(Vec<u8>, [u8; DIGEST_SIZE]), HandshakeError> {
        let mut packet = Vec::with_capacity(PACKET_SIZE);
        packet.write_u32::<BigEndian>(self.config.epoch)?;
        packet.extend_from_slice(&version);
        packet.resize(PACKET_SIZE, 0);
        self.rng.fill_bytes(&mut packet[8..]);

        let scheme = self.scheme();
        if self.encrypted {
            let key_pair = DhKeyPair::generate(&mut self.rng);
            let offset = digest::public_key_offset(&packet, scheme);
            packet[offset..offset + PUBLIC_KEY_SIZE].copy_from_slice(key_pair.public_key());
            self.key_pair = Some(key_pair);
        }

        let digest = digest::sign_packet(&mut packet, scheme, owner)?;
        Ok((packet, digest))
    }

    fn create_packet2(
        &mut self,
        peer_digest: &[u8],
        owner: KeyOwner,
    ) -> Result<Vec<u8>, HandshakeError> {
        let mut packet = vec![0_u8; PACKET_SIZE];
        self.rng.fill_bytes(&mut packet);
        digest::sign_response(&mut packet, peer_digest, owner)?;
        Ok(packet)
    }

    fn derive_ciphers(
        &self,
        peer_packet: &[u8],
        peer_scheme: Scheme,
    ) -> Result<RtmpeCiphers, HandshakeError> {
        let key_pair = match self.key_pair {
            Some(ref key_pair) => key_pair,
            None => return Err(HandshakeError::OutOfOrder { state: self.state }),
        };

        let offset = digest::public_key_offset(peer_packet, peer_scheme);
        let peer_public_key = &peer_packet[offset..offset + PUBLIC_KEY_SIZE];
        let secret = key_pair.shared_secret(peer_public_key)?;

        RtmpeCiphers::derive(&secret, key_pair.public_key(), peer_public_key)
    }

    fn fail_on_error<T>(&mut self, result: Result<T, HandshakeError>) -> Result<T, HandshakeError> {
        if result.is_err() {
            self.state = HandshakeState::Failed;
        }

        result
    }

    fn complete(&mut self) {
        debug!(
            encrypted = self.encrypted,
            peer_digest_verified = ?self.peer_digest_verified,
            "Handshake completed"
        );

        self.state = HandshakeState::Complete;
        self.own_packet = Vec::new();
        self.key_pair = None;
    }

    fn check_state(&self, expected: HandshakeState) -> Result<(), HandshakeError> {
        match self.state {
            HandshakeState::Failed => Err(HandshakeError::HandshakeFailed),
            HandshakeState::Complete => Err(HandshakeError::HandshakeAlreadyCompleted),
            state if state == expected => Ok(()),
            state => Err(HandshakeError::OutOfOrder { state }),
        }
    }

    fn scheme(&self) -> Scheme {
        if self.encrypted {
            Scheme::Two
        } else {
            Scheme::One
        }
    }

    fn version_byte(&self) -> u8 {
        if self.encrypted {
            ENCRYPTED_VERSION
        } else {
            PLAIN_VERSION
        }
    }
}
