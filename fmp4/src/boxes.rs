//! ISO-BMFF box writers for CMAF init segments and fragments.
//!
//! Every box is written in place: the size field is reserved first and patched once the body is
//! known, so nested boxes never need intermediate buffers.

use crate::aac::AudioSpecificConfig;
use crate::errors::Fmp4Error;
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use rml_codecs::descriptor::encode_descriptor_size_padded;

const MOVIE_TIMESCALE: u32 = 1000;
const UNDETERMINED_LANGUAGE: u16 = 0x55c4;

const TKHD_ENABLED_IN_MOVIE: u32 = 0x0000_0003;
const TFHD_DEFAULT_BASE_IS_MOOF: u32 = 0x0002_0000;
const TRUN_DATA_OFFSET: u32 = 0x0000_0001;
const TRUN_SAMPLE_DURATION: u32 = 0x0000_0100;
const TRUN_SAMPLE_SIZE: u32 = 0x0000_0200;
const TRUN_SAMPLE_FLAGS: u32 = 0x0000_0400;
const TRUN_COMPOSITION_OFFSET: u32 = 0x0000_0800;

/// Depends on no other sample
pub const SYNC_SAMPLE_FLAGS: u32 = 0x0200_0000;

/// Depends on other samples and is not a sync sample
pub const NON_SYNC_SAMPLE_FLAGS: u32 = 0x0101_0000;

/// Descriptor sizes are always written with 4 bytes, as most muxers do
const DESCRIPTOR_SIZE_WIDTH: usize = 4;
const ES_DESCRIPTOR_TAG: u8 = 0x03;
const DECODER_CONFIG_DESCRIPTOR_TAG: u8 = 0x04;
const DECODER_SPECIFIC_INFO_TAG: u8 = 0x05;
const SL_CONFIG_DESCRIPTOR_TAG: u8 = 0x06;
const MPEG4_AUDIO_OBJECT_TYPE: u8 = 0x40;
const AUDIO_STREAM_TYPE: u8 = (0x05 << 2) | 0x01;

#[derive(Debug, Clone, PartialEq)]
pub enum SampleEntry {
    Avc {
        width: u32,
        height: u32,
        /// The AVCDecoderConfigurationRecord, used as the `avcC` body
        decoder_config: Vec<u8>,
    },

    Aac { config: AudioSpecificConfig },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackDescription {
    pub track_id: u32,
    pub timescale: u32,
    pub sample_entry: SampleEntry,
}

impl TrackDescription {
    fn is_video(&self) -> bool {
        match self.sample_entry {
            SampleEntry::Avc { .. } => true,
            SampleEntry::Aac { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    pub duration: u32,
    pub size: u32,
    pub is_sync: bool,
    pub composition_offset: i32,
}

/// Location of a box inside a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    pub box_type: [u8; 4],
    pub offset: usize,
    pub size: usize,
}

impl BoxHeader {
    pub fn body_range(&self) -> std::ops::Range<usize> {
        self.offset + 8..self.offset + self.size
    }
}

/// Lists the top level boxes of `data`, stopping at the first malformed header
pub fn read_box_headers(data: &[u8]) -> Vec<BoxHeader> {
    let mut headers = Vec::new();
    let mut offset = 0;
    while data.len() - offset >= 8 {
        let size = BigEndian::read_u32(&data[offset..offset + 4]) as usize;
        if size < 8 || offset + size > data.len() {
            break;
        }

        let mut box_type = [0_u8; 4];
        box_type.copy_from_slice(&data[offset + 4..offset + 8]);
        headers.push(BoxHeader {
            box_type,
            offset,
            size,
        });

        offset += size;
    }

    headers
}

/// Finds a box by its path of container types, e.g. `[b"moov", b"trak", b"tkhd"]`.  Only works
/// through plain containers whose bodies are boxes.
pub fn find_box<'a>(data: &'a [u8], path: &[&[u8; 4]]) -> Option<&'a [u8]> {
    let (first, rest) = path.split_first()?;
    let header = read_box_headers(data)
        .into_iter()
        .find(|header| &header.box_type == *first)?;

    let contents = &data[header.offset..header.offset + header.size];
    if rest.is_empty() {
        return Some(contents);
    }

    find_box(&contents[8..], rest)
}

pub fn write_init_segment(tracks: &[TrackDescription]) -> Result<Vec<u8>, Fmp4Error> {
    let mut buffer = Vec::new();
    write_ftyp(&mut buffer)?;
    write_box(&mut buffer, b"moov", |buffer| {
        let next_track_id = tracks.iter().map(|track| track.track_id).max().unwrap_or(0) + 1;
        write_mvhd(buffer, next_track_id)?;
        for track in tracks {
            write_trak(buffer, track)?;
        }

        write_box(buffer, b"mvex", |buffer| {
            for track in tracks {
                write_trex(buffer, track.track_id)?;
            }

            Ok(())
        })
    })?;

    Ok(buffer)
}

/// Writes a `moof` + `mdat` pair.  `media` holds the sample data in sample order.
pub fn write_fragment(
    sequence_number: u32,
    track_id: u32,
    base_decode_time: u64,
    samples: &[SampleInfo],
    media: &[u8],
    with_composition_offsets: bool,
) -> Result<Vec<u8>, Fmp4Error> {
    let mut buffer = Vec::with_capacity(media.len() + 64 + samples.len() * 16);
    let mut data_offset_position = 0;

    write_box(&mut buffer, b"moof", |buffer| {
        write_full_box(buffer, b"mfhd", 0, 0, |buffer| {
            buffer.write_u32::<BigEndian>(sequence_number)?;
            Ok(())
        })?;

        write_box(buffer, b"traf", |buffer| {
            write_full_box(buffer, b"tfhd", 0, TFHD_DEFAULT_BASE_IS_MOOF, |buffer| {
                buffer.write_u32::<BigEndian>(track_id)?;
                Ok(())
            })?;

            write_full_box(buffer, b"tfdt", 1, 0, |buffer| {
                buffer.write_u64::<BigEndian>(base_decode_time)?;
                Ok(())
            })?;

            let mut flags = TRUN_DATA_OFFSET | TRUN_SAMPLE_DURATION | TRUN_SAMPLE_SIZE | TRUN_SAMPLE_FLAGS;
            let version = if with_composition_offsets {
                flags |= TRUN_COMPOSITION_OFFSET;
                1
            } else {
                0
            };

            write_full_box(buffer, b"trun", version, flags, |buffer| {
                buffer.write_u32::<BigEndian>(samples.len() as u32)?;
                data_offset_position = buffer.len();
                buffer.write_u32::<BigEndian>(0)?;

                for sample in samples {
                    buffer.write_u32::<BigEndian>(sample.duration)?;
                    buffer.write_u32::<BigEndian>(sample.size)?;
                    let sample_flags = if sample.is_sync {
                        SYNC_SAMPLE_FLAGS
                    } else {
                        NON_SYNC_SAMPLE_FLAGS
                    };

                    buffer.write_u32::<BigEndian>(sample_flags)?;
                    if with_composition_offsets {
                        buffer.write_i32::<BigEndian>(sample.composition_offset)?;
                    }
                }

                Ok(())
            })
        })
    })?;

    // The moof starts at offset 0 and the samples right after the mdat header
    let data_offset = buffer.len() as u32 + 8;
    BigEndian::write_u32(&mut buffer[data_offset_position..data_offset_position + 4], data_offset);

    write_box(&mut buffer, b"mdat", |buffer| {
        buffer.extend_from_slice(media);
        Ok(())
    })?;

    Ok(buffer)
}

fn write_box<F>(buffer: &mut Vec<u8>, box_type: &[u8; 4], body: F) -> Result<(), Fmp4Error>
where
    F: FnOnce(&mut Vec<u8>) -> Result<(), Fmp4Error>,
{
    let start = buffer.len();
    buffer.write_u32::<BigEndian>(0)?;
    buffer.extend_from_slice(box_type);
    body(buffer)?;

    let size = (buffer.len() - start) as u32;
    BigEndian::write_u32(&mut buffer[start..start + 4], size);
    Ok(())
}

fn write_full_box<F>(buffer: &mut Vec<u8>, box_type: &[u8; 4], version: u8, flags: u32, body: F) -> Result<(), Fmp4Error>
where
    F: FnOnce(&mut Vec<u8>) -> Result<(), Fmp4Error>,
{
    write_box(buffer, box_type, |buffer| {
        buffer.write_u8(version)?;
        buffer.write_u24::<BigEndian>(flags)?;
        body(buffer)
    })
}

fn write_ftyp(buffer: &mut Vec<u8>) -> Result<(), Fmp4Error> {
    write_box(buffer, b"ftyp", |buffer| {
        buffer.extend_from_slice(b"iso5");
        buffer.write_u32::<BigEndian>(0x200)?;
        for brand in [b"iso5", b"iso6", b"mp41", b"cmfc"].iter() {
            buffer.extend_from_slice(*brand);
        }

        Ok(())
    })
}

fn write_matrix(buffer: &mut Vec<u8>) -> Result<(), Fmp4Error> {
    for value in [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000].iter() {
        buffer.write_u32::<BigEndian>(*value)?;
    }

    Ok(())
}

fn write_mvhd(buffer: &mut Vec<u8>, next_track_id: u32) -> Result<(), Fmp4Error> {
    write_full_box(buffer, b"mvhd", 0, 0, |buffer| {
        buffer.write_u32::<BigEndian>(0)?; // creation time
        buffer.write_u32::<BigEndian>(0)?; // modification time
        buffer.write_u32::<BigEndian>(MOVIE_TIMESCALE)?;
        buffer.write_u32::<BigEndian>(0)?; // duration
        buffer.write_u32::<BigEndian>(0x0001_0000)?; // rate
        buffer.write_u16::<BigEndian>(0x0100)?; // volume
        buffer.extend_from_slice(&[0; 10]);
        write_matrix(buffer)?;
        buffer.extend_from_slice(&[0; 24]);
        buffer.write_u32::<BigEndian>(next_track_id)?;
        Ok(())
    })
}

fn write_trak(buffer: &mut Vec<u8>, track: &TrackDescription) -> Result<(), Fmp4Error> {
    write_box(buffer, b"trak", |buffer| {
        write_tkhd(buffer, track)?;
        write_box(buffer, b"mdia", |buffer| {
            write_full_box(buffer, b"mdhd", 0, 0, |buffer| {
                buffer.write_u32::<BigEndian>(0)?;
                buffer.write_u32::<BigEndian>(0)?;
                buffer.write_u32::<BigEndian>(track.timescale)?;
                buffer.write_u32::<BigEndian>(0)?;
                buffer.write_u16::<BigEndian>(UNDETERMINED_LANGUAGE)?;
                buffer.write_u16::<BigEndian>(0)?;
                Ok(())
            })?;

            let (handler, name): (&[u8; 4], &[u8]) = if track.is_video() {
                (b"vide", b"VideoHandler\0")
            } else {
                (b"soun", b"SoundHandler\0")
            };

            write_full_box(buffer, b"hdlr", 0, 0, |buffer| {
                buffer.write_u32::<BigEndian>(0)?;
                buffer.extend_from_slice(handler);
                buffer.extend_from_slice(&[0; 12]);
                buffer.extend_from_slice(name);
                Ok(())
            })?;

            write_minf(buffer, track)
        })
    })
}

fn write_tkhd(buffer: &mut Vec<u8>, track: &TrackDescription) -> Result<(), Fmp4Error> {
    let (width, height, volume) = match track.sample_entry {
        SampleEntry::Avc { width, height, .. } => (width, height, 0),
        SampleEntry::Aac { .. } => (0, 0, 0x0100),
    };

    write_full_box(buffer, b"tkhd", 0, TKHD_ENABLED_IN_MOVIE, |buffer| {
        buffer.write_u32::<BigEndian>(0)?;
        buffer.write_u32::<BigEndian>(0)?;
        buffer.write_u32::<BigEndian>(track.track_id)?;
        buffer.write_u32::<BigEndian>(0)?; // reserved
        buffer.write_u32::<BigEndian>(0)?; // duration
        buffer.extend_from_slice(&[0; 8]);
        buffer.write_u16::<BigEndian>(0)?; // layer
        buffer.write_u16::<BigEndian>(0)?; // alternate group
        buffer.write_u16::<BigEndian>(volume)?;
        buffer.write_u16::<BigEndian>(0)?;
        write_matrix(buffer)?;
        buffer.write_u32::<BigEndian>(width << 16)?;
        buffer.write_u32::<BigEndian>(height << 16)?;
        Ok(())
    })
}

fn write_minf(buffer: &mut Vec<u8>, track: &TrackDescription) -> Result<(), Fmp4Error> {
    write_box(buffer, b"minf", |buffer| {
        if track.is_video() {
            write_full_box(buffer, b"vmhd", 0, 1, |buffer| {
                buffer.extend_from_slice(&[0; 8]);
                Ok(())
            })?;
        } else {
            write_full_box(buffer, b"smhd", 0, 0, |buffer| {
                buffer.extend_from_slice(&[0; 4]);
                Ok(())
            })?;
        }

        write_box(buffer, b"dinf", |buffer| {
            write_full_box(buffer, b"dref", 0, 0, |buffer| {
                buffer.write_u32::<BigEndian>(1)?;
                write_full_box(buffer, b"url ", 0, 1, |_| Ok(()))
            })
        })?;

        write_box(buffer, b"stbl", |buffer| {
            write_full_box(buffer, b"stsd", 0, 0, |buffer| {
                buffer.write_u32::<BigEndian>(1)?;
                match track.sample_entry {
                    SampleEntry::Avc {
                        width,
                        height,
                        ref decoder_config,
                    } => write_avc1(buffer, width, height, decoder_config),

                    SampleEntry::Aac { ref config } => write_mp4a(buffer, config),
                }
            })?;

            // Fragmented files keep their sample tables empty
            for box_type in [b"stts", b"stsc", b"stco"].iter() {
                write_full_box(buffer, box_type, 0, 0, |buffer| {
                    buffer.write_u32::<BigEndian>(0)?;
                    Ok(())
                })?;
            }

            write_full_box(buffer, b"stsz", 0, 0, |buffer| {
                buffer.write_u32::<BigEndian>(0)?;
                buffer.write_u32::<BigEndian>(0)?;
                Ok(())
            })
        })
    })
}

fn write_avc1(buffer: &mut Vec<u8>, width: u32, height: u32, decoder_config: &[u8]) -> Result<(), Fmp4Error> {
    write_box(buffer, b"avc1", |buffer| {
        buffer.extend_from_slice(&[0; 6]);
        buffer.write_u16::<BigEndian>(1)?; // data reference index
        buffer.extend_from_slice(&[0; 16]);
        buffer.write_u16::<BigEndian>(width as u16)?;
        buffer.write_u16::<BigEndian>(height as u16)?;
        buffer.write_u32::<BigEndian>(0x0048_0000)?; // 72 dpi
        buffer.write_u32::<BigEndian>(0x0048_0000)?;
        buffer.write_u32::<BigEndian>(0)?;
        buffer.write_u16::<BigEndian>(1)?; // frame count
        buffer.extend_from_slice(&[0; 32]); // compressor name
        buffer.write_u16::<BigEndian>(0x0018)?; // depth
        buffer.write_i16::<BigEndian>(-1)?;

        write_box(buffer, b"avcC", |buffer| {
            buffer.extend_from_slice(decoder_config);
            Ok(())
        })
    })
}

fn write_mp4a(buffer: &mut Vec<u8>, config: &AudioSpecificConfig) -> Result<(), Fmp4Error> {
    write_box(buffer, b"mp4a", |buffer| {
        buffer.extend_from_slice(&[0; 6]);
        buffer.write_u16::<BigEndian>(1)?;
        buffer.extend_from_slice(&[0; 8]);
        buffer.write_u16::<BigEndian>(config.channel_count())?;
        buffer.write_u16::<BigEndian>(16)?; // sample size
        buffer.write_u32::<BigEndian>(0)?;

        // 16.16 fixed point, which cannot hold rates above 65535
        let rate = if config.sample_rate > 0xffff { 0 } else { config.sample_rate << 16 };
        buffer.write_u32::<BigEndian>(rate)?;

        write_full_box(buffer, b"esds", 0, 0, |buffer| {
            buffer.extend_from_slice(&build_es_descriptor(config)?);
            Ok(())
        })
    })
}

fn build_es_descriptor(config: &AudioSpecificConfig) -> Result<Vec<u8>, Fmp4Error> {
    let specific_info = descriptor(DECODER_SPECIFIC_INFO_TAG, &config.raw)?;

    let mut decoder_config = vec![MPEG4_AUDIO_OBJECT_TYPE, AUDIO_STREAM_TYPE];
    decoder_config.write_u24::<BigEndian>(0)?; // buffer size
    decoder_config.write_u32::<BigEndian>(0)?; // max bitrate
    decoder_config.write_u32::<BigEndian>(0)?; // average bitrate
    decoder_config.extend_from_slice(&specific_info);
    let decoder_config = descriptor(DECODER_CONFIG_DESCRIPTOR_TAG, &decoder_config)?;

    let mut es = Vec::new();
    es.write_u16::<BigEndian>(0)?; // ES_ID
    es.write_u8(0)?; // no dependency, URL or OCR stream
    es.extend_from_slice(&decoder_config);
    es.extend_from_slice(&descriptor(SL_CONFIG_DESCRIPTOR_TAG, &[0x02])?);

    descriptor(ES_DESCRIPTOR_TAG, &es)
}

fn descriptor(tag: u8, body: &[u8]) -> Result<Vec<u8>, Fmp4Error> {
    let size = encode_descriptor_size_padded(body.len() as u32, DESCRIPTOR_SIZE_WIDTH)?;
    let mut bytes = Vec::with_capacity(1 + size.len() + body.len());
    bytes.push(tag);
    bytes.extend_from_slice(&size);
    bytes.extend_from_slice(body);
    Ok(bytes)
}

fn write_trex(buffer: &mut Vec<u8>, track_id: u32) -> Result<(), Fmp4Error> {
    write_full_box(buffer, b"trex", 0, 0, |buffer| {
        buffer.write_u32::<BigEndian>(track_id)?;
        buffer.write_u32::<BigEndian>(1)?; // sample description index
        buffer.write_u32::<BigEndian>(0)?;
        buffer.write_u32::<BigEndian>(0)?;
        buffer.write_u32::<BigEndian>(0)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_track() -> TrackDescription {
        TrackDescription {
            track_id: 1,
            timescale: 90_000,
            sample_entry: SampleEntry::Avc {
                width: 1280,
                height: 720,
                decoder_config: vec![0x01, 0x64, 0x00, 0x1f, 0xff, 0xe0, 0x00, 0x01],
            },
        }
    }

    fn audio_track() -> TrackDescription {
        TrackDescription {
            track_id: 2,
            timescale: 44_100,
            sample_entry: SampleEntry::Aac {
                config: AudioSpecificConfig::parse(&[0x12, 0x10]).unwrap(),
            },
        }
    }

    #[test]
    fn init_segment_starts_with_cmaf_ftyp() {
        let init = write_init_segment(&[video_track()]).unwrap();
        let headers = read_box_headers(&init);
        assert_eq!(headers.len(), 2);
        assert_eq!(&headers[0].box_type, b"ftyp");
        assert_eq!(&headers[1].box_type, b"moov");
        assert_eq!(headers[1].offset + headers[1].size, init.len());

        let ftyp = &init[headers[0].body_range()];
        assert_eq!(&ftyp[0..4], b"iso5");
        assert_eq!(&ftyp[8..], b"iso5iso6mp41cmfc");
    }

    #[test]
    fn init_segment_describes_each_track() {
        let init = write_init_segment(&[video_track(), audio_track()]).unwrap();
        let moov = find_box(&init, &[b"moov"]).unwrap();

        let traks: Vec<_> = read_box_headers(&moov[8..])
            .into_iter()
            .filter(|header| &header.box_type == b"trak")
            .collect();

        assert_eq!(traks.len(), 2);

        let tkhd = find_box(&init, &[b"moov", b"trak", b"tkhd"]).unwrap();
        assert_eq!(BigEndian::read_u32(&tkhd[20..24]), 1);
        assert_eq!(BigEndian::read_u32(&tkhd[tkhd.len() - 8..tkhd.len() - 4]), 1280 << 16);
        assert_eq!(BigEndian::read_u32(&tkhd[tkhd.len() - 4..]), 720 << 16);

        let mdhd = find_box(&init, &[b"moov", b"trak", b"mdia", b"mdhd"]).unwrap();
        assert_eq!(BigEndian::read_u32(&mdhd[20..24]), 90_000);

        let mvex = find_box(&init, &[b"moov", b"mvex"]).unwrap();
        let trex_count = read_box_headers(&mvex[8..]).len();
        assert_eq!(trex_count, 2);
    }

    #[test]
    fn es_descriptor_nests_audio_specific_config() {
        let config = AudioSpecificConfig::parse(&[0x12, 0x10]).unwrap();
        let descriptor = build_es_descriptor(&config).unwrap();

        assert_eq!(
            descriptor,
            vec![
                0x03, 0x80, 0x80, 0x80, 0x22, 0x00, 0x00, 0x00, // ES descriptor
                0x04, 0x80, 0x80, 0x80, 0x14, 0x40, 0x15, // decoder config
                0x00, 0x00, 0x00, // buffer size
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // max and average bitrate
                0x05, 0x80, 0x80, 0x80, 0x02, 0x12, 0x10, // decoder specific info
                0x06, 0x80, 0x80, 0x80, 0x01, 0x02, // SL config
            ]
        );
    }

    #[test]
    fn fragment_layout_and_data_offset() {
        let samples = [
            SampleInfo {
                duration: 3000,
                size: 3,
                is_sync: true,
                composition_offset: 0,
            },
            SampleInfo {
                duration: 3000,
                size: 2,
                is_sync: false,
                composition_offset: -3000,
            },
        ];

        let fragment = write_fragment(7, 1, 180_000, &samples, &[1, 2, 3, 4, 5], true).unwrap();
        let headers = read_box_headers(&fragment);
        assert_eq!(&headers[0].box_type, b"moof");
        assert_eq!(&headers[1].box_type, b"mdat");
        assert_eq!(&fragment[headers[1].body_range()], &[1, 2, 3, 4, 5]);

        let mfhd = find_box(&fragment, &[b"moof", b"mfhd"]).unwrap();
        assert_eq!(BigEndian::read_u32(&mfhd[12..16]), 7);

        let tfhd = find_box(&fragment, &[b"moof", b"traf", b"tfhd"]).unwrap();
        assert_eq!(BigEndian::read_u32(&tfhd[8..12]), TFHD_DEFAULT_BASE_IS_MOOF);

        let tfdt = find_box(&fragment, &[b"moof", b"traf", b"tfdt"]).unwrap();
        assert_eq!(tfdt[8], 1);
        assert_eq!(BigEndian::read_u64(&tfdt[12..20]), 180_000);

        let trun = find_box(&fragment, &[b"moof", b"traf", b"trun"]).unwrap();
        assert_eq!(trun[8], 1);
        assert_eq!(BigEndian::read_u32(&trun[8..12]) & 0x00ff_ffff, 0x0f01);
        assert_eq!(BigEndian::read_u32(&trun[12..16]), 2);

        let data_offset = BigEndian::read_u32(&trun[16..20]) as usize;
        assert_eq!(data_offset, headers[1].offset + 8);

        assert_eq!(BigEndian::read_u32(&trun[28..32]), SYNC_SAMPLE_FLAGS);
        assert_eq!(BigEndian::read_u32(&trun[44..48]), NON_SYNC_SAMPLE_FLAGS);
        assert_eq!(BigEndian::read_i32(&trun[48..52]), -3000);
    }

    #[test]
    fn audio_fragment_omits_composition_offsets() {
        let samples = [SampleInfo {
            duration: 1024,
            size: 1,
            is_sync: true,
            composition_offset: 0,
        }];

        let fragment = write_fragment(1, 2, 0, &samples, &[9], false).unwrap();
        let trun = find_box(&fragment, &[b"moof", b"traf", b"trun"]).unwrap();
        assert_eq!(trun[8], 0);
        assert_eq!(trun.len(), 8 + 4 + 4 + 4 + 12);
    }
}
