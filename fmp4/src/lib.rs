//! Fragmented MP4 (CMAF) muxing for live RTMP style streams.
//!
//! Audio and video packets (`MediaPacket`) go into a per stream `FragmentBuilder`, which emits a
//! single init segment (`ftyp`+`moov`) once the decoder configuration of every active track is
//! known, then one `moof`+`mdat` fragment per flushed run of samples.  The output can be handed
//! to any `FragmentSink`.  `FragmentRegistry` is the provided sink, fanning fragments out to
//! subscribers through bounded queues.
//!
//! Supported codecs are H.264 (legacy FLV and enhanced RTMP `avc1` headers) and AAC.
//!
//! # Examples
//!
//! ```
//! use bytes::Bytes;
//! use rml_fmp4::{BuilderOutput, Fmp4Config, FragmentBuilder, MediaPacket};
//!
//! let mut builder = FragmentBuilder::new("live/stream", Fmp4Config::new());
//!
//! // AAC sequence header, then two raw AAC frames
//! let header = MediaPacket::from_flv_audio(0, &Bytes::from_static(&[0xaf, 0x00, 0x12, 0x10])).unwrap();
//! assert!(builder.push(header).unwrap().is_empty());
//!
//! let frame = MediaPacket::from_flv_audio(0, &Bytes::from_static(&[0xaf, 0x01, 0x21])).unwrap();
//! match builder.push(frame).unwrap().remove(0) {
//!     BuilderOutput::InitSegment(bytes) => assert_eq!(&bytes[4..8], b"ftyp"),
//!     x => panic!("Unexpected output: {:?}", x),
//! }
//!
//! let frame = MediaPacket::from_flv_audio(23, &Bytes::from_static(&[0xaf, 0x01, 0x21])).unwrap();
//! builder.push(frame).unwrap();
//!
//! match builder.finish().unwrap().remove(0) {
//!     BuilderOutput::Fragment(fragment) => {
//!         assert_eq!(fragment.sequence_number, 1);
//!         assert_eq!(fragment.samples.len(), 2);
//!     }
//!
//!     x => panic!("Unexpected output: {:?}", x),
//! }
//! ```

pub mod aac;
mod bits;
pub mod boxes;
pub mod builder;
pub mod config;
pub mod errors;
pub mod fanout;
pub mod media;
pub mod sps;

pub use crate::builder::{BuilderOutput, BuilderState, Fragment, FragmentBuilder};
pub use crate::config::Fmp4Config;
pub use crate::errors::{AacError, FanoutError, Fmp4Error, SpsError};
pub use crate::fanout::{BackpressurePolicy, FragmentRegistry, FragmentSink, QueueConfig, Subscription};
pub use crate::media::{MediaPacket, PacketType, TrackType};
