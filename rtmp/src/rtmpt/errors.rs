use thiserror::Error;

#[derive(Debug, Error)]
pub enum RtmptError {
    /// A request that needs a session was built before `/open` succeeded
    #[error("No RTMPT session has been opened")]
    SessionNotOpen,

    #[error("Request path '{path}' is not a valid RTMPT path")]
    InvalidPath { path: String },

    #[error("The RTMPT peer answered with HTTP status {status}")]
    UnexpectedStatus { status: u16 },

    /// Send and idle responses always start with the polling delay byte
    #[error("RTMPT response body was missing its polling delay byte")]
    MissingDelayByte,

    #[error("The session id returned by the RTMPT server was not valid text")]
    InvalidSessionId,
}
