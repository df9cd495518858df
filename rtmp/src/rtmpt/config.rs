use crate::connection::ConnectionConfig;

/// Tuning of tunnelled sessions
#[derive(Clone, Debug)]
pub struct RtmptConfig {
    /// Response bodies stop taking pending messages once they reach this size
    pub max_fold_size: usize,

    /// Consecutive empty polls after which the polling delay hint grows by one
    pub increase_polling_delay_after: u32,

    /// Upper bound of the polling delay hint
    pub max_polling_delay: u8,

    /// Configuration of the RTMP connection each session carries
    pub connection: ConnectionConfig,
}

impl RtmptConfig {
    pub fn new() -> RtmptConfig {
        RtmptConfig {
            max_fold_size: 16 * 1024,
            increase_polling_delay_after: 10,
            max_polling_delay: 32,
            connection: ConnectionConfig::new(),
        }
    }
}

impl Default for RtmptConfig {
    fn default() -> Self {
        RtmptConfig::new()
    }
}
