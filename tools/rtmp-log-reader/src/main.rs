use clap::Parser;
use rml_rtmp::chunk_io::ChunkDeserializer;
use rml_rtmp::messages::{MessagePayload, RtmpMessage};
use std::error::Error;
use std::fs;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Reads raw bytes logged from a single direction of an RTMP chunk stream (after the handshake)
/// and prints every message found in it
#[derive(Parser)]
#[command(name = "rtmp-log-reader")]
struct Args {
    /// Path of the binary log
    file: String,

    /// Wait for enter to be pressed after every message
    #[arg(long)]
    interactive: bool,

    /// Number of payload bytes shown for audio, video and unknown messages
    #[arg(long, default_value_t = 100)]
    preview_bytes: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args = Args::parse();
    println!("Reading file: {}", args.file);
    println!();

    let contents = fs::read(&args.file)?;
    let mut deserializer = ChunkDeserializer::new();
    let mut message_number = 1;
    let mut last_message_end_index = 0;

    // Bytes are fed one at a time so every message can be tied to the offset it ended at
    for (index, byte) in contents.iter().enumerate() {
        let mut input: &[u8] = std::slice::from_ref(byte);
        while let Some(payload) = deserializer.get_next_message(input)? {
            input = &[];

            println!(
                "Message: {}   Timestamp: {}   Type: {}    Stream_Id: {}   index: {} ({:x})",
                message_number,
                payload.timestamp.value,
                payload.type_id,
                payload.message_stream_id,
                last_message_end_index,
                last_message_end_index
            );

            print_payload(&payload, &mut deserializer, args.preview_bytes)?;
            println!();

            if args.interactive {
                println!("Press enter to read next message");
                let mut line = String::new();
                std::io::stdin().read_line(&mut line)?;
            }

            message_number += 1;
            last_message_end_index = index + 1;
        }
    }

    println!("Finished reading log file!");
    Ok(())
}

fn print_payload(
    payload: &MessagePayload,
    deserializer: &mut ChunkDeserializer,
    preview_bytes: usize,
) -> Result<(), Box<dyn Error>> {
    let message = match payload.to_rtmp_message() {
        Ok(message) => message,
        Err(error) => {
            warn!("Payload could not be decoded: {}", error);
            println!("Undecodable {{ data: {} }}", preview(&payload.data, preview_bytes));
            return Ok(());
        }
    };

    match message {
        RtmpMessage::Unknown { type_id, data } => {
            println!("Unknown {{ type_id: {}, data: {} }}", type_id, preview(&data, preview_bytes))
        }

        RtmpMessage::AudioData { data } => println!("AudioData {{ data: {} }}", preview(&data, preview_bytes)),
        RtmpMessage::VideoData { data } => println!("VideoData {{ data: {} }}", preview(&data, preview_bytes)),

        RtmpMessage::SetChunkSize { size } => {
            deserializer.set_max_chunk_size(size as usize)?;
            println!("SetChunkSize {{ size: {} }}", size);
        }

        RtmpMessage::Aggregate { .. } => {
            let parts = payload.split_aggregate()?;
            println!("Aggregate {{ messages: {} }}", parts.len());
            for part in parts {
                print!("    ts {} type {}: ", part.timestamp.value, part.type_id);
                print_payload(&part, deserializer, preview_bytes)?;
            }
        }

        other => println!("{:?}", other),
    }

    Ok(())
}

fn preview(data: &[u8], preview_bytes: usize) -> String {
    let mut text: String = data.iter().take(preview_bytes).map(|byte| format!("{:02x}", byte)).collect();
    if data.len() > preview_bytes {
        text.push_str(&format!(".. ({})", data.len()));
    }

    text
}
