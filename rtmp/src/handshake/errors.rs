use super::HandshakeState;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The first byte of the peer's handshake was not 3 (plain) or 6 (encrypted), or did not
    /// match the variant that was requested
    #[error("Peer sent an unexpected handshake version byte of {version}")]
    BadVersionId { version: u8 },

    #[error("Server's packet 1 does not contain a valid digest")]
    InvalidS1Digest,

    #[error("Client's packet 1 does not contain a valid digest")]
    InvalidC1Digest,

    #[error("Server's packet 2 does not contain a valid digest")]
    InvalidS2Digest,

    #[error("Peer's Diffie-Hellman public key is outside of the valid range")]
    InvalidPublicKey,

    #[error("The digest key was rejected by the HMAC implementation")]
    DigestKeyRejected,

    #[error("The handshake has already completed")]
    HandshakeAlreadyCompleted,

    /// Returned for any input received after a fatal handshake error
    #[error("The handshake previously failed and cannot continue")]
    HandshakeFailed,

    #[error("The requested operation is not valid while the handshake is in the {state:?} state")]
    OutOfOrder { state: HandshakeState },

    #[error("{0}")]
    Io(#[from] io::Error),
}
