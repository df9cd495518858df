use super::errors::RtmptError;
use super::http::{RtmptCommand, RtmptRequest, RtmptResponse};
use std::time::Duration;

/// How long a client waits before polling again after a response without data
pub const IDLE_POLL_DELAY: Duration = Duration::from_millis(250);

/// Builds the requests of the client side of a tunnel and unwraps the server's responses.
///
/// The server's polling delay hint is kept for inspection but does not drive timing.  Clients
/// poll again right away when the last response carried data and after `IDLE_POLL_DELAY`
/// otherwise.
#[derive(Debug, Default)]
pub struct RtmptClient {
    session_id: Option<String>,
    sequence: u64,
    last_response_had_data: bool,
    last_delay_hint: Option<u8>,
}

impl RtmptClient {
    pub fn new() -> RtmptClient {
        RtmptClient::default()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn open_request(&self) -> RtmptRequest {
        RtmptRequest::post(RtmptCommand::Open.to_path(), vec![0])
    }

    /// Reads the session id out of the response to `open_request()`
    pub fn handle_open_response(&mut self, response: &RtmptResponse) -> Result<String, RtmptError> {
        check_status(response)?;

        let session_id = std::str::from_utf8(&response.body)
            .map_err(|_| RtmptError::InvalidSessionId)?
            .trim()
            .to_string();

        if session_id.is_empty() || session_id.contains('/') {
            return Err(RtmptError::InvalidSessionId);
        }

        self.session_id = Some(session_id.clone());
        self.sequence = 0;
        Ok(session_id)
    }

    /// Builds a request carrying `bytes`, or an idle request when there is nothing to send
    pub fn send_request(&mut self, bytes: Vec<u8>) -> Result<RtmptRequest, RtmptError> {
        if bytes.is_empty() {
            return self.idle_request();
        }

        let session_id = self.current_session()?;
        let sequence = self.next_sequence();
        let path = RtmptCommand::Send { session_id, sequence }.to_path();
        Ok(RtmptRequest::post(path, bytes))
    }

    pub fn idle_request(&mut self) -> Result<RtmptRequest, RtmptError> {
        let session_id = self.current_session()?;
        let sequence = self.next_sequence();
        let path = RtmptCommand::Idle { session_id, sequence }.to_path();
        Ok(RtmptRequest::post(path, vec![0]))
    }

    pub fn close_request(&mut self) -> Result<RtmptRequest, RtmptError> {
        let session_id = self.current_session()?;
        let sequence = self.next_sequence();
        let path = RtmptCommand::Close { session_id, sequence }.to_path();
        Ok(RtmptRequest::post(path, vec![0]))
    }

    /// Strips the polling delay byte from a send, idle or close response and returns the RTMP
    /// bytes that followed it
    pub fn handle_response(&mut self, response: &RtmptResponse) -> Result<Vec<u8>, RtmptError> {
        check_status(response)?;

        let (delay, data) = match response.body.split_first() {
            Some((delay, data)) => (*delay, data),
            None => return Err(RtmptError::MissingDelayByte),
        };

        self.last_delay_hint = Some(delay);
        self.last_response_had_data = !data.is_empty();
        Ok(data.to_vec())
    }

    pub fn poll_delay(&self) -> Duration {
        if self.last_response_had_data {
            Duration::from_millis(0)
        } else {
            IDLE_POLL_DELAY
        }
    }

    /// The polling delay byte of the last response
    pub fn server_delay_hint(&self) -> Option<u8> {
        self.last_delay_hint
    }

    fn current_session(&self) -> Result<String, RtmptError> {
        self.session_id.clone().ok_or(RtmptError::SessionNotOpen)
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

fn check_status(response: &RtmptResponse) -> Result<(), RtmptError> {
    if response.status != 200 {
        return Err(RtmptError::UnexpectedStatus {
            status: response.status,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtmpt::{RtmptConfig, RtmptServer, RtmptServerResult};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn requests_before_open_fail() {
        let mut client = RtmptClient::new();
        match client.idle_request() {
            Err(RtmptError::SessionNotOpen) => (),
            x => panic!("Expected SessionNotOpen, received {:?}", x),
        }
    }

    #[test]
    fn sequence_numbers_increase_per_request() {
        let mut client = RtmptClient::new();
        client
            .handle_open_response(&RtmptResponse::new(200, b"55\n".to_vec()))
            .unwrap();

        assert_eq!(client.send_request(vec![1]).unwrap().path, "/send/55/1");
        assert_eq!(client.idle_request().unwrap().path, "/idle/55/2");
        assert_eq!(client.send_request(Vec::new()).unwrap().path, "/idle/55/3");
        assert_eq!(client.close_request().unwrap().path, "/close/55/4");
    }

    #[test]
    fn idle_request_has_single_zero_byte() {
        let mut client = RtmptClient::new();
        client
            .handle_open_response(&RtmptResponse::new(200, b"1\n".to_vec()))
            .unwrap();

        let request = client.idle_request().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.body, vec![0]);
    }

    #[test]
    fn poll_delay_depends_on_last_response() {
        let mut client = RtmptClient::new();

        let data = client.handle_response(&RtmptResponse::new(200, vec![3, 10, 11])).unwrap();
        assert_eq!(data, vec![10, 11]);
        assert_eq!(client.poll_delay(), Duration::from_millis(0));
        assert_eq!(client.server_delay_hint(), Some(3));

        let data = client.handle_response(&RtmptResponse::new(200, vec![4])).unwrap();
        assert!(data.is_empty());
        assert_eq!(client.poll_delay(), Duration::from_millis(250));
    }

    #[test]
    fn bad_responses_are_errors() {
        let mut client = RtmptClient::new();
        match client.handle_response(&RtmptResponse::new(404, Vec::new())) {
            Err(RtmptError::UnexpectedStatus { status: 404 }) => (),
            x => panic!("Expected UnexpectedStatus, received {:?}", x),
        }

        match client.handle_response(&RtmptResponse::new(200, Vec::new())) {
            Err(RtmptError::MissingDelayByte) => (),
            x => panic!("Expected MissingDelayByte, received {:?}", x),
        }
    }

    #[test]
    fn client_and_server_exchange_bytes() {
        let mut server = RtmptServer::with_rng(RtmptConfig::new(), StdRng::seed_from_u64(9));
        let mut client = RtmptClient::new();

        let results = server.handle_request(client.open_request());
        let session_id = match &results[1] {
            RtmptServerResult::Response(response) => client.handle_open_response(response).unwrap(),
            x => panic!("Unexpected result: {:?}", x),
        };

        let results = server.handle_request(client.send_request(vec![3; 10]).unwrap());
        assert_vec_match!(results,
            RtmptServerResult::BytesReceived { ref bytes, .. } if *bytes == vec![3; 10],
            RtmptServerResult::Response(_));

        server.session_mut(&session_id).unwrap().queue_raw_bytes(vec![6; 4]);

        let results = server.handle_request(client.idle_request().unwrap());
        let data = match &results[0] {
            RtmptServerResult::Response(response) => client.handle_response(response).unwrap(),
            x => panic!("Unexpected result: {:?}", x),
        };

        assert_eq!(data, vec![6; 4]);
    }
}
