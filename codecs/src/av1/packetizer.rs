use super::errors::Av1Error;
use super::obu::{parse_obus, Obu, ObuType};
use super::{AGGREGATION_N, AGGREGATION_Y, AGGREGATION_Z};
use crate::leb128;
use bytes::Bytes;
use std::cmp::min;

/// Aggregation header, one length byte and one payload byte
const MIN_MTU: usize = 3;

/// Splits AV1 temporal units into RTP payloads no larger than the configured MTU.
///
/// Every OBU element is written with a LEB128 length prefix (W = 0).  OBUs that do not fit in
/// the remaining room of a packet are fragmented across packets using the Z and Y flags.
pub struct Av1Packetizer {
    mtu: usize,
}

struct PacketBuilder {
    payloads: Vec<Bytes>,
    current: Vec<u8>,
    continues_fragment: bool,
    mtu: usize,
}

impl Av1Packetizer {
    pub fn new(mtu: usize) -> Result<Av1Packetizer, Av1Error> {
        if mtu < MIN_MTU {
            return Err(Av1Error::MtuTooSmall { mtu });
        }

        Ok(Av1Packetizer { mtu })
    }

    /// Packetizes one temporal unit.  The last payload returned should be sent with the RTP
    /// marker bit set.
    pub fn packetize(&self, temporal_unit: &[u8]) -> Result<Vec<Bytes>, Av1Error> {
        let obus: Vec<Obu> = parse_obus(temporal_unit)?
            .into_iter()
            .filter(|obu| match obu.obu_type {
                ObuType::TemporalDelimiter | ObuType::TileList | ObuType::Padding => false,
                _ => true,
            })
            .collect();

        let starts_sequence = obus
            .iter()
            .any(|obu| obu.obu_type == ObuType::SequenceHeader);

        let mut builder = PacketBuilder::new(self.mtu);
        for obu in &obus {
            builder.add_obu(&obu.data);
        }

        let mut payloads = builder.finish();
        if starts_sequence {
            if let Some(first) = payloads.first_mut() {
                let mut bytes = first.to_vec();
                bytes[0] |= AGGREGATION_N;
                *first = Bytes::from(bytes);
            }
        }

        tracing::trace!(
            "Packetized temporal unit of {} bytes ({} OBUs) into {} payloads",
            temporal_unit.len(),
            obus.len(),
            payloads.len()
        );

        Ok(payloads)
    }
}

impl PacketBuilder {
    fn new(mtu: usize) -> PacketBuilder {
        PacketBuilder {
            payloads: Vec::new(),
            current: vec![0],
            continues_fragment: false,
            mtu,
        }
    }

    fn add_obu(&mut self, data: &[u8]) {
        let mut remaining = data;
        loop {
            let room = self.mtu - self.current.len();
            let max_element = room.saturating_sub(leb128::encoded_length(room as u64));
            if max_element == 0 {
                self.close_packet(false);
                continue;
            }

            let element_length = min(remaining.len(), max_element);
            leb128::write(&mut self.current, element_length as u64);
            self.current.extend_from_slice(&remaining[..element_length]);
            remaining = &remaining[element_length..];

            if remaining.is_empty() {
                break;
            }

            self.close_packet(true);
        }
    }

    fn close_packet(&mut self, fragment_continues: bool) {
        let mut header = 0;
        if self.continues_fragment {
            header |= AGGREGATION_Z;
        }

        if fragment_continues {
            header |= AGGREGATION_Y;
        }

        self.current[0] = header;
        let packet = std::mem::replace(&mut self.current, vec![0]);
        if packet.len() > 1 {
            self.payloads.push(Bytes::from(packet));
        }

        self.continues_fragment = fragment_continues;
    }

    fn finish(mut self) -> Vec<Bytes> {
        if self.current.len() > 1 {
            self.close_packet(false);
        }

        self.payloads
    }
}
