//! Routing of remote calls to handlers registered up front.
//!
//! A command named `"service.method"` is looked up as the pair `(service, method)`.  Names without
//! a dot belong to the default service `""`, which is where calls such as `connect` or
//! `createStream` end up.  Each call receives the caller's `InvocationContext` explicitly, so
//! handlers never need to find out which connection they are serving.
//!
//! # Examples
//!
//! ```
//! use rml_amf::Amf0Value;
//! use rml_rtmp::invoke::{InvocationContext, ServiceRegistry};
//! use rml_rtmp::messages::RtmpMessage;
//!
//! let mut registry = ServiceRegistry::new();
//! registry.register("math", "double", |_context, arguments| match arguments.first() {
//!     Some(Amf0Value::Number(x)) => Ok(Amf0Value::Number(x * 2.0)),
//!     _ => Ok(Amf0Value::Null),
//! });
//!
//! let call = RtmpMessage::Amf0Command {
//!     command_name: "math.double".to_string(),
//!     transaction_id: 4.0,
//!     command_object: Amf0Value::Null,
//!     additional_arguments: vec![Amf0Value::Number(21.0)],
//! };
//!
//! let mut context = InvocationContext::new();
//! let reply = registry.dispatch(&mut context, &call).unwrap().unwrap();
//! match reply {
//!     RtmpMessage::Amf0Command { command_name, transaction_id, additional_arguments, .. } => {
//!         assert_eq!(command_name, "_result");
//!         assert_eq!(transaction_id, 4.0);
//!         assert_eq!(additional_arguments, vec![Amf0Value::Number(42.0)]);
//!     }
//!     _ => panic!("Unexpected reply"),
//! }
//! ```

use crate::messages::RtmpMessage;
use rml_amf::Amf0Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_SERVICE: &str = "";
pub const CALL_FAILED_CODE: &str = "NetConnection.Call.Failed";

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("No handler registered for method '{method}' of service '{service}'")]
    UnknownTarget { service: String, method: String },

    /// Raised by handlers.  `code` is reported to the caller, e.g. `NetConnection.Call.Failed`.
    #[error("{code}: {description}")]
    Failed { code: String, description: String },

    #[error("Message {type_id} is not a command and cannot be dispatched")]
    NotACommand { type_id: u8 },
}

impl InvocationError {
    fn code(&self) -> &str {
        match self {
            InvocationError::Failed { code, .. } => code.as_str(),
            _ => CALL_FAILED_CODE,
        }
    }
}

/// State a handler can read and change while serving one connection.
///
/// `attributes` lives as long as the context, the other fields describe the call being
/// dispatched and are refreshed by `ServiceRegistry::dispatch()`.
#[derive(Clone, Debug)]
pub struct InvocationContext {
    pub attributes: HashMap<String, Amf0Value>,
    pub message_stream_id: u32,
    pub transaction_id: f64,
    pub command_object: Amf0Value,
}

impl InvocationContext {
    pub fn new() -> InvocationContext {
        InvocationContext {
            attributes: HashMap::new(),
            message_stream_id: 0,
            transaction_id: 0.0,
            command_object: Amf0Value::Null,
        }
    }
}

impl Default for InvocationContext {
    fn default() -> Self {
        InvocationContext::new()
    }
}

type Handler = Box<dyn Fn(&mut InvocationContext, &[Amf0Value]) -> Result<Amf0Value, InvocationError> + Send + Sync>;

#[derive(Default)]
pub struct ServiceRegistry {
    handlers: HashMap<(String, String), Handler>,
}

impl ServiceRegistry {
    pub fn new() -> ServiceRegistry {
        ServiceRegistry {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler, replacing any previous one for the same pair
    pub fn register<F>(&mut self, service: &str, method: &str, handler: F)
    where
        F: Fn(&mut InvocationContext, &[Amf0Value]) -> Result<Amf0Value, InvocationError> + Send + Sync + 'static,
    {
        let key = (service.to_string(), method.to_string());
        self.handlers.insert(key, Box::new(handler));
    }

    pub fn is_registered(&self, service: &str, method: &str) -> bool {
        self.handlers.contains_key(&(service.to_string(), method.to_string()))
    }

    /// Calls a handler directly
    pub fn invoke(
        &self,
        context: &mut InvocationContext,
        service: &str,
        method: &str,
        arguments: &[Amf0Value],
    ) -> Result<Amf0Value, InvocationError> {
        let key = (service.to_string(), method.to_string());
        match self.handlers.get(&key) {
            Some(handler) => handler(context, arguments),
            None => Err(InvocationError::UnknownTarget {
                service: service.to_string(),
                method: method.to_string(),
            }),
        }
    }

    /// Dispatches an AMF0 or AMF3 command and builds the reply.
    ///
    /// The reply is a `_result` command carrying the handler's return value, or an `_error`
    /// command carrying a status object when the handler failed or does not exist.  It uses the
    /// same encoding and transaction id as the call.  Calls with a transaction id of 0 expect no
    /// reply, so `None` is returned for them.
    pub fn dispatch(
        &self,
        context: &mut InvocationContext,
        message: &RtmpMessage,
    ) -> Result<Option<RtmpMessage>, InvocationError> {
        let (command_name, transaction_id, command_object, arguments, amf3) = match message {
            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            } => (command_name, *transaction_id, command_object, additional_arguments, false),

            RtmpMessage::Amf3Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            } => (command_name, *transaction_id, command_object, additional_arguments, true),

            other => {
                return Err(InvocationError::NotACommand {
                    type_id: other.get_message_type_id(),
                })
            }
        };

        let (service, method) = split_target(command_name);
        context.transaction_id = transaction_id;
        context.command_object = command_object.clone();

        let (reply_name, reply_value) = match self.invoke(context, service, method, arguments) {
            Ok(value) => ("_result", value),
            Err(error) => {
                warn!(service, method, %error, "Remote call failed");
                ("_error", error_status(&error))
            }
        };

        debug!(service, method, transaction_id, reply = reply_name, "Remote call dispatched");
        if transaction_id == 0.0 {
            return Ok(None);
        }

        let reply_name = reply_name.to_string();
        let arguments = vec![reply_value];
        let reply = if amf3 {
            RtmpMessage::Amf3Command {
                command_name: reply_name,
                transaction_id,
                command_object: Amf0Value::Null,
                additional_arguments: arguments,
            }
        } else {
            RtmpMessage::Amf0Command {
                command_name: reply_name,
                transaction_id,
                command_object: Amf0Value::Null,
                additional_arguments: arguments,
            }
        };

        Ok(Some(reply))
    }
}

/// Splits `"a.b.c"` into `("a.b", "c")`
fn split_target(command_name: &str) -> (&str, &str) {
    match command_name.rfind('.') {
        Some(index) => (&command_name[..index], &command_name[index + 1..]),
        None => (DEFAULT_SERVICE, command_name),
    }
}

fn error_status(error: &InvocationError) -> Amf0Value {
    let description = match error {
        InvocationError::Failed { description, .. } => description.clone(),
        other => other.to_string(),
    };

    let mut properties = HashMap::new();
    properties.insert("level".to_string(), Amf0Value::Utf8String("error".to_string()));
    properties.insert("code".to_string(), Amf0Value::Utf8String(error.code().to_string()));
    properties.insert("description".to_string(), Amf0Value::Utf8String(description));
    Amf0Value::Object(properties)
}
