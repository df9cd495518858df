/// Timing parameters of the fragment builder
#[derive(Clone, Debug)]
pub struct Fmp4Config {
    pub video_timescale: u32,

    /// Duration given to video samples whose successor is too close (or missing)
    pub video_default_duration: u32,

    /// A video fragment is cut once it holds this much media, in video timescale units, even
    /// without a keyframe
    pub video_fragment_duration: u64,

    /// Audio fragments are cut after this many seconds of samples
    pub audio_fragment_duration_secs: u32,

    /// Duration of one AAC frame, in samples
    pub audio_default_duration: u32,
}

impl Fmp4Config {
    pub fn new() -> Fmp4Config {
        Fmp4Config {
            video_timescale: 90_000,
            video_default_duration: 3000,
            video_fragment_duration: 90_000,
            audio_fragment_duration_secs: 1,
            audio_default_duration: 1024,
        }
    }
}

impl Default for Fmp4Config {
    fn default() -> Self {
        Fmp4Config::new()
    }
}
