use crate::messages::{MessagePayload, RtmpMessage};
use crate::time::RtmpTimestamp;

/// A single result that is returned when a connection processes some bytes
#[derive(PartialEq, Debug)]
pub enum ConnectionResult {
    /// A message was decoded.  Protocol control messages are raised too, after the connection
    /// applied them.  Aggregates are raised as their individual sub-messages.
    MessageReceived {
        message: RtmpMessage,
        timestamp: RtmpTimestamp,
        message_stream_id: u32,
    },

    /// The connection received a message whose payload could not be decoded.  This result
    /// allows the consumer application to do something with it if it wants to (special logging)
    UnhandleableMessageReceived(MessagePayload),
}
