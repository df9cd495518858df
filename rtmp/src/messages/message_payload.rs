use super::commands::{self, CommandParts};
use super::{control, user_control};
use super::{MessageDeserializationError, MessageSerializationError, RtmpMessage};
use super::{
    ABORT_TYPE_ID, ACKNOWLEDGEMENT_TYPE_ID, AGGREGATE_TYPE_ID, AMF0_COMMAND_TYPE_ID,
    AMF0_DATA_TYPE_ID, AMF3_COMMAND_TYPE_ID, AMF3_DATA_TYPE_ID, AUDIO_TYPE_ID,
    SET_CHUNK_SIZE_TYPE_ID, SET_PEER_BANDWIDTH_TYPE_ID, USER_CONTROL_TYPE_ID, VIDEO_TYPE_ID,
    WINDOW_ACKNOWLEDGEMENT_TYPE_ID,
};
use crate::time::RtmpTimestamp;
use bytes::Bytes;

/// Represents a raw RTMP message
#[derive(PartialEq, Debug, Clone)]
pub struct MessagePayload {
    pub timestamp: RtmpTimestamp,
    pub type_id: u8,
    pub message_stream_id: u32,
    pub data: Bytes,
}

impl MessagePayload {
    pub fn new() -> MessagePayload {
        MessagePayload {
            timestamp: RtmpTimestamp::new(0),
            message_stream_id: 0,
            type_id: 0,
            data: Bytes::new(),
        }
    }

    pub fn to_rtmp_message(&self) -> Result<RtmpMessage, MessageDeserializationError> {
        let data = &self.data[..];
        let message = match self.type_id {
            SET_CHUNK_SIZE_TYPE_ID => control::deserialize_set_chunk_size(data)?,
            ABORT_TYPE_ID => RtmpMessage::Abort {
                stream_id: control::read_u32(data)?,
            },

            ACKNOWLEDGEMENT_TYPE_ID => RtmpMessage::Acknowledgement {
                sequence_number: control::read_u32(data)?,
            },

            USER_CONTROL_TYPE_ID => user_control::deserialize(data)?,
            WINDOW_ACKNOWLEDGEMENT_TYPE_ID => RtmpMessage::WindowAcknowledgement {
                size: control::read_u32(data)?,
            },

            SET_PEER_BANDWIDTH_TYPE_ID => control::deserialize_set_peer_bandwidth(data)?,
            AUDIO_TYPE_ID => RtmpMessage::AudioData {
                data: self.data.clone(),
            },

            VIDEO_TYPE_ID => RtmpMessage::VideoData {
                data: self.data.clone(),
            },

            AGGREGATE_TYPE_ID => RtmpMessage::Aggregate {
                data: self.data.clone(),
            },

            AMF0_DATA_TYPE_ID => RtmpMessage::Amf0Data {
                values: commands::deserialize_data(data, false)?,
            },

            AMF3_DATA_TYPE_ID => RtmpMessage::Amf3Data {
                values: commands::deserialize_data(data, true)?,
            },

            AMF0_COMMAND_TYPE_ID => {
                let parts = commands::deserialize_command(data, false)?;
                RtmpMessage::Amf0Command {
                    command_name: parts.command_name,
                    transaction_id: parts.transaction_id,
                    command_object: parts.command_object,
                    additional_arguments: parts.additional_arguments,
                }
            }

            AMF3_COMMAND_TYPE_ID => {
                let parts = commands::deserialize_command(data, true)?;
                RtmpMessage::Amf3Command {
                    command_name: parts.command_name,
                    transaction_id: parts.transaction_id,
                    command_object: parts.command_object,
                    additional_arguments: parts.additional_arguments,
                }
            }

            type_id => RtmpMessage::Unknown {
                type_id,
                data: self.data.clone(),
            },
        };

        Ok(message)
    }

    pub fn from_rtmp_message(
        message: RtmpMessage,
        timestamp: RtmpTimestamp,
        message_stream_id: u32,
    ) -> Result<MessagePayload, MessageSerializationError> {
        let type_id = message.get_message_type_id();
        let data = match message {
            RtmpMessage::Unknown { data, .. } => data,
            RtmpMessage::AudioData { data } => data,
            RtmpMessage::VideoData { data } => data,
            RtmpMessage::Aggregate { data } => data,
            RtmpMessage::Abort { stream_id } => control::serialize_u32(stream_id)?,
            RtmpMessage::Acknowledgement { sequence_number } => {
                control::serialize_u32(sequence_number)?
            }

            RtmpMessage::WindowAcknowledgement { size } => control::serialize_u32(size)?,
            RtmpMessage::SetChunkSize { size } => control::serialize_set_chunk_size(size)?,
            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                control::serialize_set_peer_bandwidth(size, limit_type)?
            }

            RtmpMessage::UserControl {
                event_type,
                stream_id,
                buffer_length,
                timestamp,
            } => user_control::serialize(event_type, stream_id, buffer_length, timestamp)?,

            RtmpMessage::Amf0Data { values } => commands::serialize_data(&values, false)?,
            RtmpMessage::Amf3Data { values } => commands::serialize_data(&values, true)?,
            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            } => commands::serialize_command(
                CommandParts {
                    command_name,
                    transaction_id,
                    command_object,
                    additional_arguments,
                },
                false,
            )?,

            RtmpMessage::Amf3Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            } => commands::serialize_command(
                CommandParts {
                    command_name,
                    transaction_id,
                    command_object,
                    additional_arguments,
                },
                true,
            )?,
        };

        Ok(MessagePayload {
            timestamp,
            type_id,
            message_stream_id,
            data,
        })
    }
}

impl Default for MessagePayload {
    fn default() -> Self {
        MessagePayload::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{PeerBandwidthLimitType, UserControlEventType};
    use rml_amf::Amf0Value;

    fn round_trip(message: RtmpMessage, expected_type_id: u8) {
        let payload = message
            .clone()
            .into_message_payload(RtmpTimestamp::new(55), 52)
            .unwrap();

        assert_eq!(payload.type_id, expected_type_id, "Incorrect type id for {:?}", message);
        assert_eq!(payload.message_stream_id, 52);
        assert_eq!(payload.timestamp, RtmpTimestamp::new(55));
        assert_eq!(payload.to_rtmp_message().unwrap(), message);
    }

    #[test]
    fn protocol_control_messages_keep_their_values() {
        round_trip(RtmpMessage::SetChunkSize { size: 4096 }, 1);
        round_trip(RtmpMessage::Abort { stream_id: 5 }, 2);
        round_trip(RtmpMessage::Acknowledgement { sequence_number: 2_500_000 }, 3);
        round_trip(RtmpMessage::WindowAcknowledgement { size: 5_000_000 }, 5);
        round_trip(
            RtmpMessage::SetPeerBandwidth {
                size: 5_000_000,
                limit_type: PeerBandwidthLimitType::Soft,
            },
            6,
        );
        round_trip(
            RtmpMessage::UserControl {
                event_type: UserControlEventType::StreamBegin,
                stream_id: Some(1),
                buffer_length: None,
                timestamp: None,
            },
            4,
        );
    }

    #[test]
    fn command_and_data_messages_keep_their_values() {
        round_trip(
            RtmpMessage::Amf0Command {
                command_name: "createStream".to_string(),
                transaction_id: 4.0,
                command_object: Amf0Value::Null,
                additional_arguments: vec![Amf0Value::Number(1.0)],
            },
            20,
        );

        round_trip(
            RtmpMessage::Amf3Command {
                command_name: "echo".to_string(),
                transaction_id: 2.0,
                command_object: Amf0Value::Null,
                additional_arguments: vec![Amf0Value::Utf8String("hi".to_string())],
            },
            17,
        );

        round_trip(
            RtmpMessage::Amf0Data {
                values: vec![Amf0Value::Utf8String("onMetaData".to_string())],
            },
            18,
        );

        round_trip(
            RtmpMessage::Amf3Data {
                values: vec![Amf0Value::Boolean(false)],
            },
            15,
        );
    }

    #[test]
    fn media_payloads_are_passed_through() {
        round_trip(RtmpMessage::AudioData { data: Bytes::from(vec![0xaf, 1]) }, 8);
        round_trip(RtmpMessage::VideoData { data: Bytes::from(vec![0x17, 0]) }, 9);
        round_trip(RtmpMessage::Aggregate { data: Bytes::from(vec![9, 0, 0]) }, 22);
        round_trip(
            RtmpMessage::Unknown {
                type_id: 33,
                data: Bytes::from(vec![1, 2]),
            },
            33,
        );
    }

    #[test]
    fn protocol_control_classification() {
        assert!(RtmpMessage::SetChunkSize { size: 1 }.is_protocol_control());
        assert!(RtmpMessage::WindowAcknowledgement { size: 1 }.is_protocol_control());
        assert!(!RtmpMessage::VideoData { data: Bytes::new() }.is_protocol_control());
    }
}
