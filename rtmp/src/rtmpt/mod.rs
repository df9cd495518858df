//! RTMP tunnelled over HTTP (RTMPT).
//!
//! Clients that cannot open a raw TCP connection POST their chunk bytes to the server and receive
//! the server's queued bytes in the response body, which starts with a one byte polling delay hint.
//! Sessions are created with `/open/1` and each later request names the session and a sequence
//! number: `/send/{id}/{seq}`, `/idle/{id}/{seq}` and `/close/{id}/{seq}`.
//!
//! Like the rest of the crate this module does no I/O.  `RtmptServer::handle_request()` takes a
//! parsed HTTP request and returns the response to write along with what happened to the session,
//! while `RtmptClient` builds requests and unwraps responses for the other side.

mod client;
mod config;
mod connection;
mod errors;
mod http;
mod server;

pub use self::client::{RtmptClient, IDLE_POLL_DELAY};
pub use self::config::RtmptConfig;
pub use self::connection::{RtmptConnection, RtmptConnectionState};
pub use self::errors::RtmptError;
pub use self::http::{RtmptCommand, RtmptRequest, RtmptResponse, CONTENT_TYPE};
pub use self::server::{RtmptServer, RtmptServerResult};
