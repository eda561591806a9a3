//! Response wrappers.
//!
//! A route may name a [`ResponseFactory`]; the dispatcher then hands the
//! decoded body to it together with a [`ClientHandle`] instead of returning
//! the bare value.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Identity of the client that produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub client_type: String,
    pub base_url: String,
}

/// Shared back-reference from a wrapped response to its client.
pub type ClientHandle = Arc<ClientInfo>;

/// A typed view over a decoded response body.
pub trait ResponseObject: fmt::Debug + Send {
    /// Name of the wrapper, for display.
    fn type_name(&self) -> &str;

    /// The decoded body the wrapper was built from.
    fn data(&self) -> &Value;

    /// The client the body came from.
    fn client(&self) -> &ClientHandle;
}

/// Constructor registered on a route as its response type.
pub type ResponseFactory = fn(Value, ClientHandle) -> Box<dyn ResponseObject>;

/// Wrapper that only holds the decoded body and the client reference.
#[derive(Debug, Clone)]
pub struct GenericObject {
    data: Value,
    client: ClientHandle,
}

impl GenericObject {
    pub fn new(data: Value, client: ClientHandle) -> Self {
        Self { data, client }
    }

    /// [`ResponseFactory`] for routes that want the generic wrapper.
    pub fn wrap(data: Value, client: ClientHandle) -> Box<dyn ResponseObject> {
        Box::new(Self::new(data, client))
    }
}

impl ResponseObject for GenericObject {
    fn type_name(&self) -> &str {
        "object"
    }

    fn data(&self) -> &Value {
        &self.data
    }

    fn client(&self) -> &ClientHandle {
        &self.client
    }
}

/// Successful result of an invocation.
#[derive(Debug)]
pub enum Reply {
    /// Decoded JSON, or the raw text of a non-JSON body.
    Value(Value),
    /// Body wrapped by the route's response type.
    Object(Box<dyn ResponseObject>),
}

impl Reply {
    pub fn value(&self) -> &Value {
        match self {
            Self::Value(v) => v,
            Self::Object(o) => o.data(),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Value(v) => v,
            Self::Object(o) => o.data().clone(),
        }
    }
}
