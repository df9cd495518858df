//! Binary helpers shared by the media crates in this workspace.
//!
//! * `vint` - Matroska/EBML style variable length integers
//! * `leb128` - unsigned little endian base 128 integers (AV1 OBU sizes)
//! * `descriptor` - MPEG-4 elementary stream descriptor size fields
//! * `av1` - RTP payload packetization of AV1 temporal units
//! * `sctp` - SCTP common header and the association handshake chunks
//!
//! # Examples
//!
//! ```
//! use rml_codecs::{leb128, vint};
//!
//! let encoded = vint::encode(500).unwrap();
//! assert_eq!(vint::decode(&encoded).unwrap(), (500, 2));
//!
//! let encoded = leb128::encode(300);
//! assert_eq!(encoded, vec![0xac, 0x02]);
//! assert_eq!(leb128::decode(&encoded).unwrap(), (300, 2));
//! ```

pub mod av1;
pub mod descriptor;
mod errors;
pub mod leb128;
pub mod sctp;
pub mod vint;

pub use crate::errors::VarintError;
