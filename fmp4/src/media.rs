//! Media packets as they arrive from an RTMP (FLV tag body) source

use crate::errors::Fmp4Error;
use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use std::io::Cursor;

const FLV_CODEC_AVC: u8 = 7;
const FLV_SOUND_FORMAT_AAC: u8 = 10;
const FLV_KEYFRAME: u8 = 1;
const EX_HEADER_FLAG: u8 = 0x80;
const AVC_FOURCC: &[u8; 4] = b"avc1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Decoder configuration: an AVCDecoderConfigurationRecord or an AudioSpecificConfig
    SequenceStart,

    /// Coded frames.  Video frames may carry a composition time offset.
    CodedFrames,

    /// Coded frames whose composition time offset is implicitly zero
    CodedFramesX,

    SequenceEnd,
}

/// One audio or video packet handed to the fragment builder
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPacket {
    pub track: TrackType,

    /// Decode timestamp in milliseconds
    pub timestamp_ms: u32,

    /// Codec data with the FLV tag header removed.  Video frames are AVCC (length prefixed NAL
    /// units), audio frames are raw AAC.
    pub payload: Bytes,
    pub is_keyframe: bool,
    pub packet_type: PacketType,

    /// Presentation minus decode time, in milliseconds
    pub composition_offset_ms: i32,
}

impl MediaPacket {
    /// Parses the body of an FLV/RTMP video message.  Both the legacy AVC header and the
    /// enhanced RTMP header with an `avc1` FourCC are understood.
    pub fn from_flv_video(timestamp_ms: u32, data: &Bytes) -> Result<MediaPacket, Fmp4Error> {
        let first = *data.first().ok_or(Fmp4Error::TruncatedPacket {
            expected: 1,
            actual: 0,
        })?;

        if first & EX_HEADER_FLAG != 0 {
            return from_enhanced_video(timestamp_ms, first, data);
        }

        let codec_id = first & 0x0f;
        if codec_id != FLV_CODEC_AVC {
            return Err(Fmp4Error::UnsupportedCodec {
                codec: format!("flv video codec {}", codec_id),
            });
        }

        require_length(data, 5)?;
        let packet_type = match data[1] {
            0 => PacketType::SequenceStart,
            1 => PacketType::CodedFrames,
            2 => PacketType::SequenceEnd,
            other => return Err(Fmp4Error::UnsupportedPacketType { packet_type: other }),
        };

        let composition_offset_ms = read_i24(&data[2..5])?;
        Ok(MediaPacket {
            track: TrackType::Video,
            timestamp_ms,
            payload: data.slice(5..),
            is_keyframe: first >> 4 == FLV_KEYFRAME,
            packet_type,
            composition_offset_ms,
        })
    }

    /// Parses the body of an FLV/RTMP AAC audio message
    pub fn from_flv_audio(timestamp_ms: u32, data: &Bytes) -> Result<MediaPacket, Fmp4Error> {
        require_length(data, 2)?;

        let sound_format = data[0] >> 4;
        if sound_format != FLV_SOUND_FORMAT_AAC {
            return Err(Fmp4Error::UnsupportedCodec {
                codec: format!("flv sound format {}", sound_format),
            });
        }

        let packet_type = match data[1] {
            0 => PacketType::SequenceStart,
            1 => PacketType::CodedFrames,
            other => return Err(Fmp4Error::UnsupportedPacketType { packet_type: other }),
        };

        Ok(MediaPacket {
            track: TrackType::Audio,
            timestamp_ms,
            payload: data.slice(2..),
            is_keyframe: true,
            packet_type,
            composition_offset_ms: 0,
        })
    }
}

fn from_enhanced_video(timestamp_ms: u32, first: u8, data: &Bytes) -> Result<MediaPacket, Fmp4Error> {
    require_length(data, 5)?;

    let fourcc = &data[1..5];
    if fourcc != AVC_FOURCC {
        return Err(Fmp4Error::UnsupportedCodec {
            codec: String::from_utf8_lossy(fourcc).into_owned(),
        });
    }

    let (packet_type, payload_start) = match first & 0x0f {
        0 => (PacketType::SequenceStart, 5),
        1 => (PacketType::CodedFrames, 8),
        2 => (PacketType::SequenceEnd, 5),
        3 => (PacketType::CodedFramesX, 5),
        other => return Err(Fmp4Error::UnsupportedPacketType { packet_type: other }),
    };

    require_length(data, payload_start)?;
    let composition_offset_ms = match packet_type {
        PacketType::CodedFrames => read_i24(&data[5..8])?,
        _ => 0,
    };

    Ok(MediaPacket {
        track: TrackType::Video,
        timestamp_ms,
        payload: data.slice(payload_start..),
        is_keyframe: (first >> 4) & 0x07 == FLV_KEYFRAME,
        packet_type,
        composition_offset_ms,
    })
}

fn require_length(data: &Bytes, expected: usize) -> Result<(), Fmp4Error> {
    if data.len() < expected {
        return Err(Fmp4Error::TruncatedPacket {
            expected,
            actual: data.len(),
        });
    }

    Ok(())
}

fn read_i24(bytes: &[u8]) -> Result<i32, Fmp4Error> {
    let mut cursor = Cursor::new(bytes);
    Ok(cursor.read_i24::<BigEndian>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_avc_keyframe() {
        let data = Bytes::from(vec![0x17, 0x01, 0x00, 0x00, 0x50, 0xaa, 0xbb]);
        let packet = MediaPacket::from_flv_video(1000, &data).unwrap();

        assert_eq!(packet.track, TrackType::Video);
        assert_eq!(packet.packet_type, PacketType::CodedFrames);
        assert!(packet.is_keyframe);
        assert_eq!(packet.composition_offset_ms, 80);
        assert_eq!(&packet.payload[..], &[0xaa, 0xbb]);
    }

    #[test]
    fn parses_negative_composition_offset() {
        let data = Bytes::from(vec![0x27, 0x01, 0xff, 0xff, 0xd8, 0x01]);
        let packet = MediaPacket::from_flv_video(0, &data).unwrap();

        assert!(!packet.is_keyframe);
        assert_eq!(packet.composition_offset_ms, -40);
    }

    #[test]
    fn parses_legacy_sequence_header() {
        let data = Bytes::from(vec![0x17, 0x00, 0x00, 0x00, 0x00, 0x01, 0x64]);
        let packet = MediaPacket::from_flv_video(0, &data).unwrap();
        assert_eq!(packet.packet_type, PacketType::SequenceStart);
        assert_eq!(&packet.payload[..], &[0x01, 0x64]);
    }

    #[test]
    fn parses_enhanced_coded_frames() {
        let mut data = vec![0x90 | 0x01];
        data.extend_from_slice(b"avc1");
        data.extend_from_slice(&[0x00, 0x00, 0x21, 0xcc]);

        let packet = MediaPacket::from_flv_video(5, &Bytes::from(data)).unwrap();
        assert_eq!(packet.packet_type, PacketType::CodedFrames);
        assert!(packet.is_keyframe);
        assert_eq!(packet.composition_offset_ms, 33);
        assert_eq!(&packet.payload[..], &[0xcc]);
    }

    #[test]
    fn enhanced_coded_frames_x_have_no_offset() {
        let mut data = vec![0xa0 | 0x03];
        data.extend_from_slice(b"avc1");
        data.extend_from_slice(&[0x00, 0x00, 0x21, 0xcc]);

        let packet = MediaPacket::from_flv_video(5, &Bytes::from(data)).unwrap();
        assert_eq!(packet.packet_type, PacketType::CodedFramesX);
        assert!(!packet.is_keyframe);
        assert_eq!(packet.composition_offset_ms, 0);
        assert_eq!(&packet.payload[..], &[0x00, 0x00, 0x21, 0xcc]);
    }

    #[test]
    fn enhanced_non_avc_is_unsupported() {
        let mut data = vec![0x91];
        data.extend_from_slice(b"hvc1");
        data.extend_from_slice(&[0, 0, 0]);

        match MediaPacket::from_flv_video(0, &Bytes::from(data)) {
            Err(Fmp4Error::UnsupportedCodec { codec }) => assert_eq!(codec, "hvc1"),
            x => panic!("Expected UnsupportedCodec, received {:?}", x),
        }
    }

    #[test]
    fn parses_aac_packets() {
        let header = MediaPacket::from_flv_audio(0, &Bytes::from(vec![0xaf, 0x00, 0x12, 0x10])).unwrap();
        assert_eq!(header.track, TrackType::Audio);
        assert_eq!(header.packet_type, PacketType::SequenceStart);
        assert_eq!(&header.payload[..], &[0x12, 0x10]);

        let frame = MediaPacket::from_flv_audio(23, &Bytes::from(vec![0xaf, 0x01, 0x21])).unwrap();
        assert_eq!(frame.packet_type, PacketType::CodedFrames);
        assert!(frame.is_keyframe);
    }

    #[test]
    fn non_aac_audio_is_unsupported() {
        match MediaPacket::from_flv_audio(0, &Bytes::from(vec![0x2f, 0x00])) {
            Err(Fmp4Error::UnsupportedCodec { .. }) => (),
            x => panic!("Expected UnsupportedCodec, received {:?}", x),
        }
    }

    #[test]
    fn truncated_video_is_rejected() {
        match MediaPacket::from_flv_video(0, &Bytes::from(vec![0x17, 0x01])) {
            Err(Fmp4Error::TruncatedPacket { expected: 5, actual: 2 }) => (),
            x => panic!("Expected TruncatedPacket, received {:?}", x),
        }
    }
}
