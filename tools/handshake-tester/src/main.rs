use clap::{Parser, Subcommand};
use rml_rtmp::handshake::{Handshake, HandshakeConfig, HandshakeProcessResult, PeerType};
use std::error::Error;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "handshake-tester", about = "Performs RTMP handshakes against a peer")]
struct Args {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Accept connections and act as the server side of the handshake
    Server {
        #[arg(long, default_value = "127.0.0.1:1935")]
        bind: String,
    },

    /// Connect to a server and act as the client side of the handshake
    Client {
        /// Server address (host:port)
        host: String,

        /// Request an RTMPE handshake
        #[arg(long)]
        encrypted: bool,

        /// Fail when the server's S2 signature does not match
        #[arg(long)]
        strict_s2: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    match Args::parse().mode {
        Mode::Server { bind } => act_as_server(&bind),
        Mode::Client {
            host,
            encrypted,
            strict_s2,
        } => {
            let config = HandshakeConfig {
                encrypted,
                strict_s2_validation: strict_s2,
                ..HandshakeConfig::default()
            };

            act_as_client(&host, config)
        }
    }
}

fn act_as_client(host_address: &str, config: HandshakeConfig) -> Result<(), Box<dyn Error>> {
    let mut stream = TcpStream::connect(host_address)?;
    let mut handshake = Handshake::with_config(PeerType::Client, config);
    let c0_and_c1 = handshake.generate_outbound_p0_and_p1()?;
    stream.write_all(&c0_and_c1)?;

    run_handshake(&mut stream, &mut handshake)
}

fn act_as_server(bind: &str) -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind(bind)?;
    info!("Listening on {}", bind);

    for stream in listener.incoming() {
        let mut stream = stream?;
        info!(peer = ?stream.peer_addr().ok(), "Incoming connection");

        let mut handshake = Handshake::new(PeerType::Server);
        if let Err(error) = run_handshake(&mut stream, &mut handshake) {
            warn!("Handshake failed: {}", error);
        }
    }

    Ok(())
}

fn run_handshake(stream: &mut TcpStream, handshake: &mut Handshake) -> Result<(), Box<dyn Error>> {
    let mut read_buffer = [0_u8; 4096];

    loop {
        let bytes_read = stream.read(&mut read_buffer)?;
        if bytes_read == 0 {
            return Err("Peer closed the connection mid handshake".into());
        }

        let (is_finished, response_bytes) = match handshake.process_bytes(&read_buffer[..bytes_read])? {
            HandshakeProcessResult::InProgress { response_bytes } => (false, response_bytes),
            HandshakeProcessResult::Completed { response_bytes, .. } => (true, response_bytes),
        };

        if !response_bytes.is_empty() {
            stream.write_all(&response_bytes)?;
        }

        if is_finished {
            info!(
                encrypted = handshake.is_encrypted(),
                peer_digest_verified = ?handshake.peer_digest_verified(),
                "Handshaking completed"
            );

            return Ok(());
        }

        info!("Handshake still in progress");
    }
}
