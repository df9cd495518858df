use super::errors::RtmptError;

pub const CONTENT_TYPE: &str = "application/x-fcs";

/// The parts of an HTTP request the tunnel cares about
#[derive(Clone, Debug, PartialEq)]
pub struct RtmptRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

impl RtmptRequest {
    pub fn post(path: String, body: Vec<u8>) -> RtmptRequest {
        RtmptRequest {
            method: "POST".to_string(),
            path,
            body,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RtmptResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RtmptResponse {
    pub fn new(status: u16, body: Vec<u8>) -> RtmptResponse {
        let headers = vec![
            ("Content-Type".to_string(), CONTENT_TYPE.to_string()),
            ("Content-Length".to_string(), body.len().to_string()),
            ("Connection".to_string(), "Keep-Alive".to_string()),
            ("Cache-Control".to_string(), "no-cache".to_string()),
        ];

        RtmptResponse {
            status,
            headers,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What a tunnel request asks for
#[derive(Debug, PartialEq)]
pub enum RtmptCommand {
    Open,
    Send { session_id: String, sequence: u64 },
    Idle { session_id: String, sequence: u64 },
    Close { session_id: String, sequence: u64 },
    Ident,
}

impl RtmptCommand {
    pub fn parse(path: &str) -> Result<RtmptCommand, RtmptError> {
        let invalid = || RtmptError::InvalidPath {
            path: path.to_string(),
        };

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let command = match segments.as_slice() {
            ["open", _] => RtmptCommand::Open,
            ["fcs", "ident2"] | ["fcs", "ident"] => RtmptCommand::Ident,
            [name, session_id, sequence] => {
                let session_id = session_id.to_string();
                let sequence = sequence.parse::<u64>().map_err(|_| invalid())?;
                match *name {
                    "send" => RtmptCommand::Send { session_id, sequence },
                    "idle" => RtmptCommand::Idle { session_id, sequence },
                    "close" => RtmptCommand::Close { session_id, sequence },
                    _ => return Err(invalid()),
                }
            }

            _ => return Err(invalid()),
        };

        Ok(command)
    }

    pub fn to_path(&self) -> String {
        match self {
            RtmptCommand::Open => "/open/1".to_string(),
            RtmptCommand::Send { session_id, sequence } => format!("/send/{}/{}", session_id, sequence),
            RtmptCommand::Idle { session_id, sequence } => format!("/idle/{}/{}", session_id, sequence),
            RtmptCommand::Close { session_id, sequence } => format!("/close/{}/{}", session_id, sequence),
            RtmptCommand::Ident => "/fcs/ident2".to_string(),
        }
    }
}
