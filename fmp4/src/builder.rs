//! Turns a stream of media packets into one init segment followed by `moof`/`mdat` fragments.
//!
//! Each track buffers samples until a flush trigger fires.  Video is cut at every keyframe (one
//! fragment per GOP) or once a second of media is buffered, audio once the configured number of
//! seconds is buffered.  A sample's duration is only known when the next sample of the same track
//! arrives, so the most recent sample is always held back until its successor shows up or
//! `finish()` is called.

use crate::aac::AudioSpecificConfig;
use crate::boxes::{write_fragment, write_init_segment, SampleEntry, SampleInfo, TrackDescription};
use crate::config::Fmp4Config;
use crate::errors::Fmp4Error;
use crate::fanout::FragmentSink;
use crate::media::{MediaPacket, PacketType, TrackType};
use crate::sps::parse_sps;
use byteorder::{BigEndian, ByteOrder};
use bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};

pub const VIDEO_TRACK_ID: u32 = 1;
pub const AUDIO_TRACK_ID: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// No init segment has been produced yet
    AwaitingConfig,

    /// The init segment was produced but no fragment has followed it yet
    InitSegmentReady,

    Streaming,
}

/// A single `moof`+`mdat` pair along with the values written into it
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub track: TrackType,
    pub track_id: u32,
    pub group_id: u32,
    pub sequence_number: u32,
    pub base_decode_time: u64,
    pub samples: Vec<SampleInfo>,
    pub data: Bytes,
}

impl Fragment {
    pub fn duration(&self) -> u64 {
        self.samples.iter().map(|sample| sample.duration as u64).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuilderOutput {
    InitSegment(Bytes),
    Fragment(Fragment),
}

struct HeldSample {
    decode_time: u64,
    data: Bytes,
    is_sync: bool,
    composition_offset: i32,
}

struct Track {
    track: TrackType,
    track_id: u32,
    timescale: u32,
    default_duration: u32,
    sample_entry: Option<SampleEntry>,
    seen_coded_frame: bool,
    in_init_segment: bool,
    held_sample: Option<HeldSample>,
    media: BytesMut,
    samples: Vec<SampleInfo>,
    buffered_duration: u64,

    /// Decode time of the first sample in the buffer, `None` until the first sample arrives
    decode_time: Option<u64>,
    next_sequence_number: u32,
}

impl Track {
    fn new(track: TrackType, track_id: u32, timescale: u32, default_duration: u32) -> Track {
        Track {
            track,
            track_id,
            timescale,
            default_duration,
            sample_entry: None,
            seen_coded_frame: false,
            in_init_segment: false,
            held_sample: None,
            media: BytesMut::new(),
            samples: Vec::new(),
            buffered_duration: 0,
            decode_time: None,
            next_sequence_number: 1,
        }
    }

    fn to_track_units(&self, milliseconds: i64) -> i64 {
        milliseconds * self.timescale as i64 / 1000
    }

    /// Gives the held back sample its duration and moves it into the fragment buffer
    fn commit_held_sample(&mut self, next_decode_time: Option<u64>) {
        let held = match self.held_sample.take() {
            Some(held) => held,
            None => return,
        };

        let duration = match next_decode_time {
            Some(next) => {
                let delta = next.saturating_sub(held.decode_time);
                delta.max(self.default_duration as u64).min(u32::max_value() as u64) as u32
            }

            None => self.default_duration,
        };

        if self.decode_time.is_none() {
            self.decode_time = Some(held.decode_time);
        }

        self.media.extend_from_slice(&held.data);
        self.samples.push(SampleInfo {
            duration,
            size: held.data.len() as u32,
            is_sync: held.is_sync,
            composition_offset: held.composition_offset,
        });

        self.buffered_duration += duration as u64;
    }

    fn flush(&mut self) -> Result<Option<Fragment>, Fmp4Error> {
        if self.samples.is_empty() {
            return Ok(None);
        }

        let base_decode_time = self.decode_time.unwrap_or(0);
        let samples = std::mem::replace(&mut self.samples, Vec::new());
        let media = self.media.split().freeze();
        let data = write_fragment(
            self.next_sequence_number,
            self.track_id,
            base_decode_time,
            &samples,
            &media,
            self.track == TrackType::Video,
        )?;

        let fragment = Fragment {
            track: self.track,
            track_id: self.track_id,
            group_id: self.track_id,
            sequence_number: self.next_sequence_number,
            base_decode_time,
            samples,
            data: Bytes::from(data),
        };

        self.next_sequence_number += 1;
        self.decode_time = Some(base_decode_time + self.buffered_duration);
        self.buffered_duration = 0;

        Ok(Some(fragment))
    }
}

/// Per stream muxer.  A builder is owned by the single task ingesting that stream.
pub struct FragmentBuilder {
    stream_key: String,
    config: Fmp4Config,
    video: Track,
    audio: Track,
    state: BuilderState,
}

impl FragmentBuilder {
    pub fn new(stream_key: impl Into<String>, config: Fmp4Config) -> FragmentBuilder {
        let video = Track::new(
            TrackType::Video,
            VIDEO_TRACK_ID,
            config.video_timescale,
            config.video_default_duration,
        );

        // The audio timescale is not known until the AudioSpecificConfig arrives
        let audio = Track::new(TrackType::Audio, AUDIO_TRACK_ID, 0, config.audio_default_duration);

        FragmentBuilder {
            stream_key: stream_key.into(),
            config,
            video,
            audio,
            state: BuilderState::AwaitingConfig,
        }
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn push(&mut self, packet: MediaPacket) -> Result<Vec<BuilderOutput>, Fmp4Error> {
        match packet.packet_type {
            PacketType::SequenceStart => {
                self.apply_decoder_config(&packet)?;
                Ok(Vec::new())
            }

            PacketType::CodedFrames | PacketType::CodedFramesX => self.push_coded_frame(packet),

            PacketType::SequenceEnd => {
                let track = self.track_mut(packet.track);
                track.commit_held_sample(None);
                let fragment = track.flush()?;
                Ok(self.collect(None, fragment))
            }
        }
    }

    /// Pushes a packet and hands everything it produced to `sink`
    pub fn push_into<S>(&mut self, packet: MediaPacket, sink: &S) -> Result<(), Fmp4Error>
    where
        S: FragmentSink + ?Sized,
    {
        let outputs = self.push(packet)?;
        self.deliver(outputs, sink);
        Ok(())
    }

    /// Flushes every track, giving the last held back sample the default duration
    pub fn finish(&mut self) -> Result<Vec<BuilderOutput>, Fmp4Error> {
        let mut outputs = Vec::new();
        for track_type in [TrackType::Video, TrackType::Audio].iter() {
            let track = self.track_mut(*track_type);
            track.commit_held_sample(None);
            if let Some(fragment) = track.flush()? {
                outputs.push(BuilderOutput::Fragment(fragment));
            }
        }

        if !outputs.is_empty() {
            self.state = BuilderState::Streaming;
        }

        Ok(outputs)
    }

    pub fn deliver<S>(&self, outputs: Vec<BuilderOutput>, sink: &S)
    where
        S: FragmentSink + ?Sized,
    {
        for output in outputs {
            match output {
                BuilderOutput::InitSegment(bytes) => sink.on_init_segment(&self.stream_key, bytes),
                BuilderOutput::Fragment(fragment) => sink.on_fragment(&self.stream_key, fragment.data),
            }
        }
    }

    fn track_mut(&mut self, track: TrackType) -> &mut Track {
        match track {
            TrackType::Video => &mut self.video,
            TrackType::Audio => &mut self.audio,
        }
    }

    fn apply_decoder_config(&mut self, packet: &MediaPacket) -> Result<(), Fmp4Error> {
        let sample_entry = match packet.track {
            TrackType::Video => avc_sample_entry(&packet.payload)?,
            TrackType::Audio => SampleEntry::Aac {
                config: AudioSpecificConfig::parse(&packet.payload)?,
            },
        };

        let stream_key = self.stream_key.clone();
        let track = self.track_mut(packet.track);
        if track.in_init_segment {
            if track.sample_entry.as_ref() != Some(&sample_entry) {
                warn!(
                    stream_key = %stream_key,
                    track_id = track.track_id,
                    "Decoder configuration changed after the init segment was sent, ignoring it"
                );
            }

            return Ok(());
        }

        if let SampleEntry::Aac { ref config } = sample_entry {
            track.timescale = config.sample_rate;
        }

        debug!(stream_key = %stream_key, track_id = track.track_id, "Decoder configuration received");
        track.sample_entry = Some(sample_entry);
        Ok(())
    }

    fn push_coded_frame(&mut self, packet: MediaPacket) -> Result<Vec<BuilderOutput>, Fmp4Error> {
        self.track_mut(packet.track).seen_coded_frame = true;

        let mut init_segment = None;
        if self.state == BuilderState::AwaitingConfig {
            if !self.all_seen_tracks_configured() {
                debug!(
                    stream_key = %self.stream_key,
                    track = ?packet.track,
                    "Dropping frame received before the decoder configuration"
                );

                return Ok(Vec::new());
            }

            init_segment = Some(self.build_init_segment()?);
        }

        let audio_flush_duration = self.audio.timescale as u64 * self.config.audio_fragment_duration_secs as u64;
        let video_flush_duration = self.config.video_fragment_duration;
        let stream_key = &self.stream_key;
        let track = match packet.track {
            TrackType::Video => &mut self.video,
            TrackType::Audio => &mut self.audio,
        };

        if !track.in_init_segment {
            debug!(
                stream_key = %stream_key,
                track_id = track.track_id,
                "Dropping frame for a track missing from the init segment"
            );

            return Ok(self.collect(init_segment, None));
        }

        let is_sync = packet.track == TrackType::Audio || packet.is_keyframe;
        if track.track == TrackType::Video && track.held_sample.is_none() && track.decode_time.is_none() && !is_sync {
            debug!(stream_key = %stream_key, "Dropping video frame preceding the first keyframe");
            return Ok(self.collect(init_segment, None));
        }

        let decode_time = track.to_track_units(packet.timestamp_ms as i64).max(0) as u64;
        let composition_offset = match packet.packet_type {
            PacketType::CodedFrames => track.to_track_units(packet.composition_offset_ms as i64) as i32,
            _ => 0,
        };

        track.commit_held_sample(Some(decode_time));

        let flush_target = match track.track {
            TrackType::Video => video_flush_duration,
            TrackType::Audio => audio_flush_duration,
        };

        let starts_gop = track.track == TrackType::Video && is_sync;
        let fragment = if (starts_gop && !track.samples.is_empty()) || track.buffered_duration >= flush_target {
            track.flush()?
        } else {
            None
        };

        track.held_sample = Some(HeldSample {
            decode_time,
            data: packet.payload,
            is_sync,
            composition_offset,
        });

        Ok(self.collect(init_segment, fragment))
    }

    fn collect(&mut self, init_segment: Option<Bytes>, fragment: Option<Fragment>) -> Vec<BuilderOutput> {
        let mut outputs = Vec::new();
        if let Some(bytes) = init_segment {
            outputs.push(BuilderOutput::InitSegment(bytes));
        }

        if let Some(fragment) = fragment {
            self.state = BuilderState::Streaming;
            outputs.push(BuilderOutput::Fragment(fragment));
        }

        outputs
    }

    fn all_seen_tracks_configured(&self) -> bool {
        [&self.video, &self.audio]
            .iter()
            .all(|track| !track.seen_coded_frame || track.sample_entry.is_some())
    }

    fn build_init_segment(&mut self) -> Result<Bytes, Fmp4Error> {
        let mut descriptions = Vec::new();
        for track in [&mut self.video, &mut self.audio].iter_mut() {
            if let Some(ref sample_entry) = track.sample_entry {
                descriptions.push(TrackDescription {
                    track_id: track.track_id,
                    timescale: track.timescale,
                    sample_entry: sample_entry.clone(),
                });

                track.in_init_segment = true;
            }
        }

        let bytes = write_init_segment(&descriptions)?;
        info!(
            stream_key = %self.stream_key,
            tracks = descriptions.len(),
            size = bytes.len(),
            "Init segment created"
        );

        self.state = BuilderState::InitSegmentReady;
        Ok(Bytes::from(bytes))
    }
}

/// Builds the `avc1` sample entry from an AVCDecoderConfigurationRecord, taking the dimensions
/// from its first SPS
fn avc_sample_entry(record: &Bytes) -> Result<SampleEntry, Fmp4Error> {
    if record.len() < 8 || record[0] != 1 || record[5] & 0x1f == 0 {
        return Err(Fmp4Error::InvalidDecoderConfig);
    }

    let sps_length = BigEndian::read_u16(&record[6..8]) as usize;
    let sps = record.get(8..8 + sps_length).ok_or(Fmp4Error::InvalidDecoderConfig)?;
    let info = parse_sps(sps)?;

    Ok(SampleEntry::Avc {
        width: info.width,
        height: info.height,
        decoder_config: record.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::find_box;

    const SPS_720P: [u8; 26] = [
        0x67, 0x64, 0x00, 0x1f, 0xac, 0xd9, 0x40, 0x50, 0x05, 0xbb, 0x01, 0x10, 0x00, 0x00, 0x03,
        0x00, 0x10, 0x00, 0x00, 0x03, 0x03, 0x20, 0xf1, 0x83, 0x19, 0x60,
    ];

    fn avc_record() -> Bytes {
        let mut record = vec![0x01, 0x64, 0x00, 0x1f, 0xff, 0xe1, 0x00, SPS_720P.len() as u8];
        record.extend_from_slice(&SPS_720P);
        record.extend_from_slice(&[0x01, 0x00, 0x04, 0x68, 0xeb, 0xe3, 0xcb]);
        Bytes::from(record)
    }

    fn video_config() -> MediaPacket {
        MediaPacket {
            track: TrackType::Video,
            timestamp_ms: 0,
            payload: avc_record(),
            is_keyframe: true,
            packet_type: PacketType::SequenceStart,
            composition_offset_ms: 0,
        }
    }

    fn audio_config() -> MediaPacket {
        MediaPacket {
            track: TrackType::Audio,
            timestamp_ms: 0,
            payload: Bytes::from_static(&[0x12, 0x10]),
            is_keyframe: true,
            packet_type: PacketType::SequenceStart,
            composition_offset_ms: 0,
        }
    }

    fn video_frame(timestamp_ms: u32, is_keyframe: bool) -> MediaPacket {
        MediaPacket {
            track: TrackType::Video,
            timestamp_ms,
            payload: Bytes::from(vec![0, 0, 0, 1, timestamp_ms as u8]),
            is_keyframe,
            packet_type: PacketType::CodedFrames,
            composition_offset_ms: 0,
        }
    }

    fn audio_frame(timestamp_ms: u32) -> MediaPacket {
        MediaPacket {
            track: TrackType::Audio,
            timestamp_ms,
            payload: Bytes::from(vec![0x21, 0x00]),
            is_keyframe: true,
            packet_type: PacketType::CodedFrames,
            composition_offset_ms: 0,
        }
    }

    fn fragments(outputs: Vec<BuilderOutput>) -> Vec<Fragment> {
        outputs
            .into_iter()
            .filter_map(|output| match output {
                BuilderOutput::Fragment(fragment) => Some(fragment),
                BuilderOutput::InitSegment(_) => None,
            })
            .collect()
    }

    #[test]
    fn frames_before_config_are_dropped() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        let outputs = builder.push(video_frame(0, true)).unwrap();

        assert_eq!(outputs.len(), 0);
        assert_eq!(builder.state(), BuilderState::AwaitingConfig);
    }

    #[test]
    fn init_segment_emitted_once_on_first_frame() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        assert_eq!(builder.push(video_config()).unwrap().len(), 0);

        let outputs = builder.push(video_frame(0, true)).unwrap();
        assert_eq!(outputs.len(), 1);
        match outputs[0] {
            BuilderOutput::InitSegment(ref bytes) => {
                let tkhd = find_box(bytes, &[b"moov", b"trak", b"tkhd"]).unwrap();
                assert_eq!(BigEndian::read_u32(&tkhd[tkhd.len() - 8..tkhd.len() - 4]), 1280 << 16);
            }

            ref x => panic!("Expected init segment, received {:?}", x),
        }

        assert_eq!(builder.state(), BuilderState::InitSegmentReady);

        let outputs = builder.push(video_frame(33, false)).unwrap();
        assert_eq!(outputs.len(), 0);
    }

    #[test]
    fn init_waits_for_config_of_every_track_with_frames() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        builder.push(video_config()).unwrap();

        // audio has produced a frame but not its config yet
        assert_eq!(builder.push(audio_frame(0)).unwrap().len(), 0);
        assert_eq!(builder.push(video_frame(0, true)).unwrap().len(), 0);
        assert_eq!(builder.state(), BuilderState::AwaitingConfig);

        builder.push(audio_config()).unwrap();
        let outputs = builder.push(video_frame(33, true)).unwrap();
        match outputs[0] {
            BuilderOutput::InitSegment(ref bytes) => {
                let mvex = find_box(bytes, &[b"moov", b"mvex"]).unwrap();
                assert_eq!(mvex.len(), 8 + 2 * 32);
            }

            ref x => panic!("Expected init segment, received {:?}", x),
        }
    }

    #[test]
    fn track_missing_from_init_segment_is_dropped() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        builder.push(video_config()).unwrap();
        builder.push(video_frame(0, true)).unwrap();

        builder.push(audio_config()).unwrap();
        for x in 0..100 {
            assert_eq!(builder.push(audio_frame(x * 23)).unwrap().len(), 0);
        }

        let outputs = builder.finish().unwrap();
        let fragments = fragments(outputs);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].track_id, VIDEO_TRACK_ID);
    }

    #[test]
    fn video_is_cut_at_each_keyframe() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        builder.push(video_config()).unwrap();

        let mut produced = Vec::new();
        for x in 0..6 {
            let outputs = builder.push(video_frame(x * 100, x % 3 == 0)).unwrap();
            produced.extend(fragments(outputs));
        }

        assert_eq!(produced.len(), 1, "Unexpected fragment count");
        assert_eq!(produced[0].samples.len(), 3);
        assert!(produced[0].samples[0].is_sync);
        assert!(!produced[0].samples[1].is_sync);
        assert_eq!(produced[0].samples[0].duration, 9000);
        assert_eq!(produced[0].base_decode_time, 0);
        assert_eq!(builder.state(), BuilderState::Streaming);
    }

    #[test]
    fn video_is_cut_when_a_second_is_buffered() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        builder.push(video_config()).unwrap();

        let mut produced = Vec::new();
        for x in 0..40 {
            produced.extend(fragments(builder.push(video_frame(x * 40, x == 0)).unwrap()));
        }

        assert_eq!(produced.len(), 1);
        assert_eq!(produced[0].duration(), 90_000);
        assert_eq!(produced[0].samples.len(), 25);
    }

    #[test]
    fn leading_non_keyframes_are_dropped() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        builder.push(video_config()).unwrap();
        builder.push(video_frame(0, false)).unwrap();
        builder.push(video_frame(33, false)).unwrap();
        builder.push(video_frame(66, true)).unwrap();

        let produced = fragments(builder.finish().unwrap());
        assert_eq!(produced.len(), 1);
        assert_eq!(produced[0].samples.len(), 1);
        assert_eq!(produced[0].base_decode_time, 66 * 90);
    }

    #[test]
    fn repeated_timestamps_use_the_default_duration() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        builder.push(video_config()).unwrap();
        builder.push(video_frame(100, true)).unwrap();
        builder.push(video_frame(100, false)).unwrap();
        builder.push(video_frame(90, false)).unwrap();

        let produced = fragments(builder.finish().unwrap());
        let durations: Vec<u32> = produced[0].samples.iter().map(|sample| sample.duration).collect();
        assert_eq!(durations, vec![3000, 3000, 3000]);
    }

    #[test]
    fn composition_offsets_are_scaled_to_the_track() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        builder.push(video_config()).unwrap();

        let mut frame = video_frame(0, true);
        frame.composition_offset_ms = 80;
        builder.push(frame).unwrap();

        let mut frame = video_frame(40, false);
        frame.packet_type = PacketType::CodedFramesX;
        frame.composition_offset_ms = 80;
        builder.push(frame).unwrap();

        let produced = fragments(builder.finish().unwrap());
        assert_eq!(produced[0].samples[0].composition_offset, 7200);
        assert_eq!(produced[0].samples[1].composition_offset, 0);
    }

    #[test]
    fn audio_uses_sample_rate_timescale() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        builder.push(audio_config()).unwrap();

        let mut produced = Vec::new();
        for x in 0..50 {
            produced.extend(fragments(builder.push(audio_frame(x * 32)).unwrap()));
        }

        // 32ms at 44100 Hz is 1411 units, so 32 samples reach one second
        assert_eq!(produced.len(), 1);
        assert_eq!(produced[0].track_id, AUDIO_TRACK_ID);
        assert_eq!(produced[0].samples.len(), 32);
        assert!(produced[0].duration() >= 44_100);
        assert!(produced[0].samples.iter().all(|sample| sample.is_sync));
    }

    #[test]
    fn sample_durations_add_up_to_the_timestamp_range() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        builder.push(video_config()).unwrap();

        let timestamps: Vec<u32> = (0..200).map(|x| x * 40 + (x % 3)).collect();
        let mut produced = Vec::new();
        for (index, timestamp) in timestamps.iter().enumerate() {
            produced.extend(fragments(builder.push(video_frame(*timestamp, index % 30 == 0)).unwrap()));
        }

        produced.extend(fragments(builder.finish().unwrap()));

        let total: u64 = produced.iter().map(|fragment| fragment.duration()).sum();
        let expected = (*timestamps.last().unwrap() as u64 - timestamps[0] as u64) * 90;
        assert!(total >= expected, "total {} expected {}", total, expected);
        assert!(total - expected <= 3000, "total {} expected {}", total, expected);
    }

    #[test]
    fn fragments_are_sequenced_and_contiguous() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        builder.push(video_config()).unwrap();

        let mut produced = Vec::new();
        for x in 0..120 {
            produced.extend(fragments(builder.push(video_frame(1000 + x * 40, x % 25 == 0)).unwrap()));
        }

        produced.extend(fragments(builder.finish().unwrap()));
        assert_eq!(produced.len(), 5);

        for (index, fragment) in produced.iter().enumerate() {
            assert_eq!(fragment.sequence_number, index as u32 + 1);
            assert_eq!(fragment.group_id, fragment.track_id);
            if index > 0 {
                let previous = &produced[index - 1];
                assert_eq!(fragment.base_decode_time, previous.base_decode_time + previous.duration());
            }
        }

        assert_eq!(produced[0].base_decode_time, 90_000);
    }

    #[test]
    fn fragment_bytes_carry_sequence_and_decode_time() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        builder.push(video_config()).unwrap();
        builder.push(video_frame(0, true)).unwrap();
        builder.push(video_frame(40, false)).unwrap();

        let fragment = fragments(builder.finish().unwrap()).remove(0);
        let mfhd = find_box(&fragment.data, &[b"moof", b"mfhd"]).unwrap();
        assert_eq!(BigEndian::read_u32(&mfhd[12..16]), 1);

        let mdat = find_box(&fragment.data, &[b"mdat"]).unwrap();
        assert_eq!(&mdat[8..], &[0, 0, 0, 1, 0, 0, 0, 0, 1, 40]);
    }

    #[test]
    fn sequence_end_flushes_the_track() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        builder.push(video_config()).unwrap();
        builder.push(video_frame(0, true)).unwrap();

        let end = MediaPacket {
            packet_type: PacketType::SequenceEnd,
            payload: Bytes::new(),
            ..video_frame(40, false)
        };

        let produced = fragments(builder.push(end).unwrap());
        assert_eq!(produced.len(), 1);
        assert_eq!(produced[0].samples.len(), 1);
        assert_eq!(builder.finish().unwrap().len(), 0);
    }

    #[test]
    fn invalid_avc_record_is_rejected() {
        let mut builder = FragmentBuilder::new("live/test", Fmp4Config::new());
        let packet = MediaPacket {
            payload: Bytes::from_static(&[0x01, 0x64, 0x00]),
            ..video_config()
        };

        match builder.push(packet) {
            Err(Fmp4Error::InvalidDecoderConfig) => (),
            x => panic!("Expected InvalidDecoderConfig, received {:?}", x),
        }
    }
}
