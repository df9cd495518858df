use super::config::RtmptConfig;
use super::connection::{RtmptConnection, RtmptConnectionState};
use super::http::{RtmptCommand, RtmptRequest, RtmptResponse};
use crate::messages::RtmpMessage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::{debug, info};

/// Results of handling one tunnel request
#[derive(Debug, PartialEq)]
pub enum RtmptServerResult {
    /// The HTTP response that has to be written back for the request
    Response(RtmptResponse),

    /// The client created a session
    SessionOpened { session_id: String },

    /// Bytes the client sent through the tunnel.  They belong to the handshake or to the
    /// session's RTMP connection, depending on how far the session got.
    BytesReceived { session_id: String, bytes: Vec<u8> },

    /// RTMP messages that were placed in the response body
    MessagesSent {
        session_id: String,
        messages: Vec<RtmpMessage>,
    },

    /// The session finished closing and was removed
    SessionClosed { session_id: String },
}

type BytesHandler<'a> = dyn FnMut(&str, Vec<u8>, &mut RtmptConnection) + 'a;

/// Routes RTMPT requests to their sessions.
///
/// The server owns every tunnelled session.  Applications react to `BytesReceived` by feeding the
/// bytes to the handshake or to `session_mut(id).connection_mut()`, and queue their replies on the
/// same session.  Since the response to a `/send` is built before `handle_request()` returns,
/// those replies reach the client with its next poll.  `handle_request_with()` hands the bytes
/// over before the response is built instead, so replies travel back in the same response.
pub struct RtmptServer {
    config: RtmptConfig,
    sessions: HashMap<String, RtmptConnection>,
    rng: StdRng,
}

impl RtmptServer {
    pub fn new(config: RtmptConfig) -> RtmptServer {
        RtmptServer::with_rng(config, StdRng::from_entropy())
    }

    /// Creates a server whose session ids come from the given generator
    pub fn with_rng(config: RtmptConfig, rng: StdRng) -> RtmptServer {
        RtmptServer {
            config,
            sessions: HashMap::new(),
            rng,
        }
    }

    pub fn session(&self, session_id: &str) -> Option<&RtmptConnection> {
        self.sessions.get(session_id)
    }

    pub fn session_mut(&mut self, session_id: &str) -> Option<&mut RtmptConnection> {
        self.sessions.get_mut(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Starts closing a session from the server side.  Returns false for unknown sessions.
    pub fn close_session(&mut self, session_id: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(session) => {
                session.close();
                true
            }

            None => false,
        }
    }

    pub fn handle_request(&mut self, request: RtmptRequest) -> Vec<RtmptServerResult> {
        self.route(request, None)
    }

    /// Handles a request, passing the bytes of a `/send` to `on_bytes` along with their session
    /// before the response body is folded.  No `BytesReceived` result is raised for them.
    pub fn handle_request_with<F>(&mut self, request: RtmptRequest, mut on_bytes: F) -> Vec<RtmptServerResult>
    where
        F: FnMut(&str, Vec<u8>, &mut RtmptConnection),
    {
        self.route(request, Some(&mut on_bytes))
    }

    fn route(&mut self, request: RtmptRequest, on_bytes: Option<&mut BytesHandler>) -> Vec<RtmptServerResult> {
        if !request.method.eq_ignore_ascii_case("POST") {
            debug!(method = %request.method, path = %request.path, "Non-POST RTMPT request");
            return vec![RtmptServerResult::Response(RtmptResponse::new(405, Vec::new()))];
        }

        let command = match RtmptCommand::parse(&request.path) {
            Ok(command) => command,
            Err(error) => {
                debug!(%error, "Unroutable RTMPT request");
                return not_found();
            }
        };

        match command {
            RtmptCommand::Ident => not_found(),
            RtmptCommand::Open => self.open_session(),
            RtmptCommand::Send { session_id, sequence } => {
                self.poll_session(session_id, sequence, Some(request.body), on_bytes, false)
            }

            RtmptCommand::Idle { session_id, sequence } => {
                self.poll_session(session_id, sequence, None, None, false)
            }

            RtmptCommand::Close { session_id, sequence } => {
                self.poll_session(session_id, sequence, None, None, true)
            }
        }
    }

    fn open_session(&mut self) -> Vec<RtmptServerResult> {
        let session_id = loop {
            let candidate = self.rng.gen_range(1..=u32::max_value()).to_string();
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let connection = RtmptConnection::new(session_id.clone(), self.config.clone());
        self.sessions.insert(session_id.clone(), connection);
        info!(session_id = %session_id, "RTMPT session opened");

        let body = format!("{}\n", session_id).into_bytes();
        vec![
            RtmptServerResult::SessionOpened { session_id },
            RtmptServerResult::Response(RtmptResponse::new(200, body)),
        ]
    }

    fn poll_session(
        &mut self,
        session_id: String,
        sequence: u64,
        body: Option<Vec<u8>>,
        on_bytes: Option<&mut BytesHandler>,
        close: bool,
    ) -> Vec<RtmptServerResult> {
        let target_size = self.config.max_fold_size;
        let session = match self.sessions.get_mut(&session_id) {
            Some(session) => session,
            None => {
                debug!(session_id = %session_id, "RTMPT request for unknown session");
                return not_found();
            }
        };

        let mut results = Vec::new();
        session.track_sequence(sequence);

        if let Some(bytes) = body {
            if !bytes.is_empty() {
                match on_bytes {
                    Some(handler) => handler(&session_id, bytes, &mut *session),
                    None => results.push(RtmptServerResult::BytesReceived {
                        session_id: session_id.clone(),
                        bytes,
                    }),
                }
            }
        }

        if close {
            session.close();
        }

        let mut messages = Vec::new();
        let response_body = session.get_pending_messages(target_size, |message| messages.push(message.clone()));
        let closed = session.state() == RtmptConnectionState::Closed;

        let response_body = match response_body {
            Some(body) => body,
            None => {
                self.sessions.remove(&session_id);
                return not_found();
            }
        };

        if !messages.is_empty() {
            results.push(RtmptServerResult::MessagesSent {
                session_id: session_id.clone(),
                messages,
            });
        }

        results.push(RtmptServerResult::Response(RtmptResponse::new(200, response_body)));

        if closed {
            self.sessions.remove(&session_id);
            results.push(RtmptServerResult::SessionClosed { session_id });
        }

        results
    }
}

fn not_found() -> Vec<RtmptServerResult> {
    vec![RtmptServerResult::Response(RtmptResponse::new(404, Vec::new()))]
}
