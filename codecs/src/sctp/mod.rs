//! SCTP packets carrying the four-way association handshake chunks (INIT, INIT ACK,
//! COOKIE ECHO, COOKIE ACK), as used underneath WebRTC data channels.
//!
//! Every chunk is padded to a multiple of 4 bytes.  The common header checksum is CRC32c computed
//! over the whole packet with the checksum field zeroed.

mod chunk;
mod errors;
mod packet;
mod param;

pub use self::chunk::{Chunk, InitChunk};
pub use self::errors::SctpError;
pub use self::packet::{CommonHeader, Packet};
pub use self::param::InitParameter;

mod chunk_types {
    pub const INIT: u8 = 1;
    pub const INIT_ACK: u8 = 2;
    pub const COOKIE_ECHO: u8 = 10;
    pub const COOKIE_ACK: u8 = 11;
}

fn padding_for(length: usize) -> usize {
    (4 - length % 4) % 4
}
