use super::errors::Av1Error;
use super::obu::{Obu, ObuType};
use super::{AGGREGATION_W_MASK, AGGREGATION_Y, AGGREGATION_Z};
use crate::leb128;
use bytes::Bytes;

/// Reassembles AV1 temporal units from RTP payloads.
///
/// Payloads must be supplied in sequence number order.  Loss recovery is the caller's concern:
/// after a gap, call `reset()` so a dangling fragment is not glued onto unrelated data.
pub struct Av1Depacketizer {
    fragment: Vec<u8>,
    obus: Vec<Obu>,
}

impl Av1Depacketizer {
    pub fn new() -> Av1Depacketizer {
        Av1Depacketizer {
            fragment: Vec::new(),
            obus: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.fragment.clear();
        self.obus.clear();
    }

    /// Processes one RTP payload.  When `marker` is set (last packet of the temporal unit) the
    /// completed temporal unit is returned in low overhead bitstream format.
    pub fn push(&mut self, payload: &[u8], marker: bool) -> Result<Option<Bytes>, Av1Error> {
        if payload.len() < 2 {
            self.reset();
            return Err(Av1Error::PayloadTooShort { size: payload.len() });
        }

        let header = payload[0];
        let continues_previous = header & AGGREGATION_Z != 0;
        let continues_next = header & AGGREGATION_Y != 0;
        let declared_count = (header & AGGREGATION_W_MASK) >> 4;

        let elements = match split_elements(&payload[1..], declared_count) {
            Ok(elements) => elements,
            Err(error) => {
                self.reset();
                return Err(error);
            }
        };

        if continues_previous && self.fragment.is_empty() {
            self.reset();
            return Err(Av1Error::UnexpectedContinuation);
        }

        if !continues_previous && !self.fragment.is_empty() {
            tracing::debug!("Discarding incomplete OBU fragment of {} bytes", self.fragment.len());
            self.fragment.clear();
        }

        let element_count = elements.len();
        for (index, element) in elements.into_iter().enumerate() {
            let is_first = index == 0;
            let is_last = index == element_count - 1;

            if is_first && continues_previous {
                self.fragment.extend_from_slice(element);
            } else {
                self.fragment = element.to_vec();
            }

            if is_last && continues_next {
                break;
            }

            let data = std::mem::replace(&mut self.fragment, Vec::new());
            if !data.is_empty() {
                self.obus.push(Obu {
                    obu_type: ObuType::from_header(data[0]),
                    data: Bytes::from(data),
                });
            }
        }

        if !marker {
            return Ok(None);
        }

        let mut temporal_unit = Vec::new();
        for obu in self.obus.drain(..) {
            obu.write_with_size_field(&mut temporal_unit);
        }

        self.fragment.clear();
        Ok(Some(Bytes::from(temporal_unit)))
    }
}

impl Default for Av1Depacketizer {
    fn default() -> Self {
        Self::new()
    }
}

fn split_elements(mut data: &[u8], declared_count: u8) -> Result<Vec<&[u8]>, Av1Error> {
    let mut elements = Vec::new();
    while !data.is_empty() {
        let is_final_unsized = declared_count != 0 && elements.len() + 1 == declared_count as usize;
        if is_final_unsized {
            elements.push(data);
            break;
        }

        let (length, length_size) = leb128::decode(data)?;
        let length = length as usize;
        let available = data.len() - length_size;
        if length > available {
            return Err(Av1Error::ObuSizeExceedsData {
                declared: length,
                available,
            });
        }

        elements.push(&data[length_size..length_size + length]);
        data = &data[length_size + length..];
    }

    if declared_count != 0 && elements.len() != declared_count as usize {
        return Err(Av1Error::InvalidElementCount {
            declared: declared_count,
            found: elements.len(),
        });
    }

    Ok(elements)
}
