//! H.264 sequence parameter set parsing, limited to what an MP4 sample entry needs

use crate::bits::BitReader;
use crate::errors::SpsError;

const SPS_NAL_TYPE: u8 = 7;

/// Profiles whose SPS carries chroma format, bit depth and scaling matrix fields
const HIGH_PROFILES: [u8; 13] = [100, 110, 122, 244, 44, 83, 86, 118, 128, 138, 139, 134, 135];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpsInfo {
    pub profile_idc: u8,
    pub constraint_flags: u8,
    pub level_idc: u8,
    pub chroma_format_idc: u32,
    pub width: u32,
    pub height: u32,
}

/// Removes the `03` of every `00 00 03` sequence
pub fn strip_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len());
    let mut zeros = 0;
    for &byte in data {
        if zeros >= 2 && byte == 3 {
            zeros = 0;
            continue;
        }

        output.push(byte);
        zeros = if byte == 0 { zeros + 1 } else { 0 };
    }

    output
}

/// Parses an SPS NAL unit, starting at its one byte NAL header.
///
/// # Examples
///
/// ```
/// let sps = [
///     0x67, 0x64, 0x00, 0x1f, 0xac, 0xd9, 0x40, 0x50, 0x05, 0xbb, 0x01, 0x10, 0x00, 0x00,
///     0x03, 0x00, 0x10, 0x00, 0x00, 0x03, 0x03, 0x20, 0xf1, 0x83, 0x19, 0x60,
/// ];
///
/// let info = rml_fmp4::sps::parse_sps(&sps).unwrap();
/// assert_eq!((info.width, info.height), (1280, 720));
/// ```
pub fn parse_sps(nal_unit: &[u8]) -> Result<SpsInfo, SpsError> {
    let data = strip_emulation_prevention(nal_unit);
    let first = *data.first().ok_or(SpsError::Truncated)?;

    let nal_type = first & 0x1f;
    if nal_type != SPS_NAL_TYPE {
        return Err(SpsError::NotAnSps { nal_type });
    }

    read_sps(&mut BitReader::new(&data[1..])).ok_or(SpsError::Truncated)?
}

fn read_sps(reader: &mut BitReader) -> Option<Result<SpsInfo, SpsError>> {
    let profile_idc = reader.read_bits(8)? as u8;
    let constraint_flags = reader.read_bits(8)? as u8;
    let level_idc = reader.read_bits(8)? as u8;
    let _seq_parameter_set_id = reader.read_ue()?;

    let mut chroma_format_idc = 1;
    let mut separate_colour_plane = false;
    if HIGH_PROFILES.contains(&profile_idc) {
        chroma_format_idc = reader.read_ue()?;
        if chroma_format_idc > 3 {
            return Some(Err(SpsError::InvalidValue {
                field: "chroma_format_idc",
            }));
        }

        if chroma_format_idc == 3 {
            separate_colour_plane = reader.read_bit()?;
        }

        let _bit_depth_luma = reader.read_ue()?;
        let _bit_depth_chroma = reader.read_ue()?;
        let _qpprime_y_zero_transform_bypass = reader.read_bit()?;
        if reader.read_bit()? {
            let list_count = if chroma_format_idc == 3 { 12 } else { 8 };
            for index in 0..list_count {
                if reader.read_bit()? {
                    skip_scaling_list(reader, if index < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    let _log2_max_frame_num = reader.read_ue()?;
    match reader.read_ue()? {
        0 => {
            let _log2_max_pic_order_cnt_lsb = reader.read_ue()?;
        }

        1 => {
            let _delta_pic_order_always_zero = reader.read_bit()?;
            let _offset_for_non_ref_pic = reader.read_se()?;
            let _offset_for_top_to_bottom_field = reader.read_se()?;
            let cycle_length = reader.read_ue()?;
            for _ in 0..cycle_length {
                reader.read_se()?;
            }
        }

        _ => (),
    }

    let _max_num_ref_frames = reader.read_ue()?;
    let _gaps_in_frame_num_allowed = reader.read_bit()?;
    let width_in_mbs = reader.read_ue()? as u64 + 1;
    let height_in_map_units = reader.read_ue()? as u64 + 1;
    let frame_mbs_only = reader.read_bit()?;
    if !frame_mbs_only {
        let _mb_adaptive_frame_field = reader.read_bit()?;
    }

    let _direct_8x8_inference = reader.read_bit()?;
    let (mut crop_left, mut crop_right, mut crop_top, mut crop_bottom) = (0, 0, 0, 0);
    if reader.read_bit()? {
        crop_left = reader.read_ue()? as u64;
        crop_right = reader.read_ue()? as u64;
        crop_top = reader.read_ue()? as u64;
        crop_bottom = reader.read_ue()? as u64;
    }

    let field_factor = if frame_mbs_only { 1 } else { 2 };
    let (crop_unit_x, crop_unit_y) = if chroma_format_idc == 0 || separate_colour_plane {
        (1, field_factor)
    } else {
        let sub_width = if chroma_format_idc == 3 { 1 } else { 2 };
        let sub_height = if chroma_format_idc == 1 { 2 } else { 1 };
        (sub_width, sub_height * field_factor)
    };

    let width = (width_in_mbs * 16).checked_sub((crop_left + crop_right) * crop_unit_x);
    let height = (height_in_map_units * 16 * field_factor).checked_sub((crop_top + crop_bottom) * crop_unit_y);
    let (width, height) = match (width, height) {
        (Some(width), Some(height)) => (width as u32, height as u32),
        _ => {
            return Some(Err(SpsError::InvalidValue {
                field: "frame_cropping",
            }))
        }
    };

    Some(Ok(SpsInfo {
        profile_idc,
        constraint_flags,
        level_idc,
        chroma_format_idc,
        width,
        height,
    }))
}

fn skip_scaling_list(reader: &mut BitReader, size: usize) -> Option<()> {
    let mut last_scale = 8_i32;
    let mut next_scale = 8_i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta = reader.read_se()?;
            next_scale = (last_scale + delta + 256) % 256;
        }

        if next_scale != 0 {
            last_scale = next_scale;
        }
    }

    Some(())
}
