use crate::bits::BitReader;
use crate::errors::AacError;

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

const EXPLICIT_RATE_INDEX: u32 = 15;
const SBR_OBJECT_TYPE: u8 = 5;
const PS_OBJECT_TYPE: u8 = 29;

/// The MPEG-4 AudioSpecificConfig carried by AAC sequence headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    /// Audio object type of the core codec (2 for AAC-LC)
    pub object_type: u8,

    /// Sampling rate of the core codec, which is also the rate of the 1024 sample frames
    pub sample_rate: u32,
    pub channel_configuration: u8,

    /// Output rate of the SBR extension, when signalled explicitly (HE-AAC)
    pub extension_sample_rate: Option<u32>,

    /// The raw bytes, written unchanged into the `esds` box
    pub raw: Vec<u8>,
}

impl AudioSpecificConfig {
    pub fn parse(data: &[u8]) -> Result<AudioSpecificConfig, AacError> {
        let mut reader = BitReader::new(data);
        let mut object_type = read_object_type(&mut reader)?;
        let sample_rate = read_sample_rate(&mut reader)?;
        let channel_configuration = reader.read_bits(4).ok_or(AacError::Truncated)? as u8;

        let mut extension_sample_rate = None;
        if object_type == SBR_OBJECT_TYPE || object_type == PS_OBJECT_TYPE {
            extension_sample_rate = Some(read_sample_rate(&mut reader)?);
            object_type = read_object_type(&mut reader)?;
        }

        Ok(AudioSpecificConfig {
            object_type,
            sample_rate,
            channel_configuration,
            extension_sample_rate,
            raw: data.to_vec(),
        })
    }

    /// Channel count to advertise in the sample entry
    pub fn channel_count(&self) -> u16 {
        match self.channel_configuration {
            0 => 2,
            7 => 8,
            count => count as u16,
        }
    }
}

fn read_object_type(reader: &mut BitReader) -> Result<u8, AacError> {
    let object_type = reader.read_bits(5).ok_or(AacError::Truncated)?;
    if object_type == 31 {
        let extended = reader.read_bits(6).ok_or(AacError::Truncated)?;
        return Ok((32 + extended) as u8);
    }

    Ok(object_type as u8)
}

fn read_sample_rate(reader: &mut BitReader) -> Result<u32, AacError> {
    let index = reader.read_bits(4).ok_or(AacError::Truncated)?;
    if index == EXPLICIT_RATE_INDEX {
        return match reader.read_bits(24).ok_or(AacError::Truncated)? {
            0 => Err(AacError::ZeroSampleRate),
            rate => Ok(rate),
        };
    }

    SAMPLE_RATES
        .get(index as usize)
        .copied()
        .ok_or(AacError::InvalidSampleRateIndex { index: index as u8 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aac_lc() {
        let config = AudioSpecificConfig::parse(&[0x12, 0x10]).unwrap();
        assert_eq!(config.object_type, 2);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.channel_configuration, 2);
        assert_eq!(config.extension_sample_rate, None);
        assert_eq!(config.raw, vec![0x12, 0x10]);
    }

    #[test]
    fn parses_explicit_sbr_signalling() {
        let config = AudioSpecificConfig::parse(&[0x2b, 0x92, 0x08, 0x00]).unwrap();
        assert_eq!(config.object_type, 2);
        assert_eq!(config.sample_rate, 22050);
        assert_eq!(config.extension_sample_rate, Some(44100));
        assert_eq!(config.channel_count(), 2);
    }

    #[test]
    fn parses_explicit_sample_rate() {
        let config = AudioSpecificConfig::parse(&[0x17, 0x80, 0x5d, 0xc0, 0x10]).unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.channel_configuration, 2);
    }

    #[test]
    fn reserved_rate_index_is_rejected() {
        // object type 2, index 13
        match AudioSpecificConfig::parse(&[0x16, 0x90]) {
            Err(AacError::InvalidSampleRateIndex { index: 13 }) => (),
            x => panic!("Expected InvalidSampleRateIndex, received {:?}", x),
        }
    }

    #[test]
    fn explicit_zero_sample_rate_is_rejected() {
        match AudioSpecificConfig::parse(&[0x17, 0x80, 0x00, 0x00, 0x10]) {
            Err(AacError::ZeroSampleRate) => (),
            x => panic!("Expected ZeroSampleRate, received {:?}", x),
        }
    }

    #[test]
    fn truncated_config_is_rejected() {
        match AudioSpecificConfig::parse(&[0x12]) {
            Err(AacError::Truncated) => (),
            x => panic!("Expected Truncated, received {:?}", x),
        }
    }
}
