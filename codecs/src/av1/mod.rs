//! RTP payload format for AV1 (aggregation header + OBU elements).
//!
//! Temporal units are handed to the packetizer in the low overhead bitstream format (every OBU
//! carries its size field).  Inside RTP payloads the size fields are removed and each OBU element
//! is prefixed by a LEB128 length instead.  The depacketizer restores the size fields.

mod depacketizer;
mod errors;
mod obu;
mod packetizer;

pub use self::depacketizer::Av1Depacketizer;
pub use self::errors::Av1Error;
pub use self::obu::{parse_obus, Obu, ObuType};
pub use self::packetizer::Av1Packetizer;

/// First OBU element continues an OBU fragment from the previous packet
const AGGREGATION_Z: u8 = 0b1000_0000;

/// Last OBU element will be continued in the next packet
const AGGREGATION_Y: u8 = 0b0100_0000;

const AGGREGATION_W_MASK: u8 = 0b0011_0000;

/// First packet of a coded video sequence
const AGGREGATION_N: u8 = 0b0000_1000;
