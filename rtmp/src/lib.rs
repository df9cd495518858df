//! Sans-IO building blocks for the RTMP protocol family.
//!
//! Nothing in this crate touches a socket.  Every type consumes the bytes the caller read off
//! the wire and hands back the bytes (and decoded events) the caller should act upon:
//!
//! * `handshake` - the plain and digest based handshakes plus the RTMPE (Diffie-Hellman/RC4)
//!   variant
//! * `chunk_io` - splitting RTMP messages into chunks and reassembling them
//! * `messages` - the `RtmpMessage` event enum and its payload encodings
//! * `connection` - a post handshake connection that applies protocol control messages and
//!   queues outbound bytes
//! * `rtmpt` - the HTTP tunnelling adapter (server sessions and a client request builder)
//! * `invoke` - a `(service, method)` registry for dispatching remote calls
//! * `time` - wrapping RTMP timestamps

#[cfg(test)]
#[macro_use]
mod test_utils;

pub mod chunk_io;
pub mod connection;
pub mod handshake;
pub mod invoke;
pub mod messages;
pub mod rtmpt;
pub mod time;
