use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use clap::Parser;
use rml_fmp4::boxes::read_box_headers;
use rml_fmp4::{BuilderOutput, Fmp4Config, FragmentBuilder, MediaPacket};
use std::error::Error;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const FLV_HEADER_SIGNATURE: &[u8; 3] = b"FLV";
const AUDIO_TAG: u8 = 8;
const VIDEO_TAG: u8 = 9;

/// Converts the H.264/AAC content of an FLV file into a CMAF init segment and fragments
#[derive(Parser)]
#[command(name = "fmp4-dump")]
struct Args {
    /// FLV file to read
    input: PathBuf,

    /// Directory receiving `init.mp4` and one `<track>-<sequence>.m4s` file per fragment
    #[arg(long, default_value = "fmp4-output")]
    output_dir: PathBuf,

    /// Also write everything into a single playable `stream.mp4`
    #[arg(long)]
    concatenate: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();
    let contents = fs::read(&args.input)?;
    fs::create_dir_all(&args.output_dir)?;

    let stream_key = args.input.to_string_lossy().into_owned();
    let mut builder = FragmentBuilder::new(stream_key, Fmp4Config::new());
    let mut combined = Vec::new();

    for tag in read_flv_tags(&contents)? {
        let packet = match tag.tag_type {
            VIDEO_TAG => MediaPacket::from_flv_video(tag.timestamp, &tag.data),
            AUDIO_TAG => MediaPacket::from_flv_audio(tag.timestamp, &tag.data),
            _ => continue,
        };

        let packet = match packet {
            Ok(packet) => packet,
            Err(error) => {
                warn!(timestamp = tag.timestamp, "Skipping tag: {}", error);
                continue;
            }
        };

        let outputs = builder.push(packet)?;
        write_outputs(&args.output_dir, outputs, &mut combined)?;
    }

    let outputs = builder.finish()?;
    write_outputs(&args.output_dir, outputs, &mut combined)?;

    if args.concatenate {
        let path = args.output_dir.join("stream.mp4");
        fs::write(&path, &combined)?;
        info!(path = %path.display(), size = combined.len(), "Wrote concatenated stream");
    }

    Ok(())
}

fn write_outputs(directory: &Path, outputs: Vec<BuilderOutput>, combined: &mut Vec<u8>) -> Result<(), Box<dyn Error>> {
    for output in outputs {
        let (name, data) = match output {
            BuilderOutput::InitSegment(data) => ("init.mp4".to_string(), data),
            BuilderOutput::Fragment(fragment) => {
                info!(
                    track_id = fragment.track_id,
                    sequence_number = fragment.sequence_number,
                    base_decode_time = fragment.base_decode_time,
                    samples = fragment.samples.len(),
                    "Fragment"
                );

                (format!("{}-{}.m4s", fragment.track_id, fragment.sequence_number), fragment.data)
            }
        };

        let boxes: Vec<String> = read_box_headers(&data)
            .iter()
            .map(|header| format!("{}({})", String::from_utf8_lossy(&header.box_type), header.size))
            .collect();

        info!(file = %name, boxes = %boxes.join(" "), "Writing");
        fs::write(directory.join(&name), &data)?;
        combined.extend_from_slice(&data);
    }

    Ok(())
}

struct FlvTag {
    tag_type: u8,
    timestamp: u32,
    data: Bytes,
}

fn read_flv_tags(contents: &[u8]) -> Result<Vec<FlvTag>, Box<dyn Error>> {
    if contents.len() < 9 || &contents[0..3] != FLV_HEADER_SIGNATURE {
        return Err("Input is not an FLV file".into());
    }

    let mut cursor = Cursor::new(contents);
    cursor.set_position(5);
    let header_size = cursor.read_u32::<BigEndian>()? as u64;

    // The header is followed by a 4 byte previous tag size of zero
    cursor.set_position(header_size + 4);

    let mut tags = Vec::new();
    while (contents.len() as u64) - cursor.position() >= 11 {
        let tag_type = cursor.read_u8()? & 0x1f;
        let size = cursor.read_u24::<BigEndian>()? as usize;
        let lower_time = cursor.read_u24::<BigEndian>()?;
        let upper_time = cursor.read_u8()? as u32;
        let _stream_id = cursor.read_u24::<BigEndian>()?;

        let mut data = vec![0; size];
        if cursor.read_exact(&mut data).is_err() {
            warn!("File ends in the middle of a tag");
            break;
        }

        tags.push(FlvTag {
            tag_type,
            timestamp: (upper_time << 24) | lower_time,
            data: Bytes::from(data),
        });

        if cursor.read_u32::<BigEndian>().is_err() {
            break;
        }
    }

    Ok(tags)
}
