/// The configuration options that govern how a RTMP connection should operate
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Chunk size announced by `queue_initial_control_messages()`
    pub chunk_size: u32,

    /// Number of bytes the peer may send before it has to acknowledge
    pub window_ack_size: u32,

    /// Output bandwidth limit requested from the peer
    pub peer_bandwidth: u32,
}

impl ConnectionConfig {
    /// Creates a new connection config with overridable defaults
    pub fn new() -> ConnectionConfig {
        ConnectionConfig {
            chunk_size: 4096,
            window_ack_size: 2_500_000,
            peer_bandwidth: 2_500_000,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig::new()
    }
}
