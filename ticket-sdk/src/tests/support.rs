//! Scripted transport double
//!
//! Answers every call through a responder closure and records what was
//! sent, so tests can assert on strategy order and payload shapes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::core::Transport;
use crate::error::{Result, ServiceError};
use crate::services::servicedesk::{TicketActions, TicketDefaults};

/// Which transport operation was used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    PostJson,
    PostForm,
    PostMultipart,
}

/// One recorded call
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub endpoint: String,
    pub fields: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Call {
    /// Decoded `input_data` field, if the call carried one
    pub fn input_data(&self) -> Option<Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == "input_data")
            .and_then(|(_, value)| serde_json::from_str(value).ok())
    }

    pub fn is(&self, method: Method, endpoint: &str) -> bool {
        self.method == method && self.endpoint == endpoint
    }
}

type Responder = Box<dyn Fn(&Call) -> Result<Value> + Send + Sync>;

pub struct ScriptedTransport {
    responder: Responder,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&Call) -> Result<Value> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Everything sent so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<Value> {
        let outcome = (self.responder)(&call);
        self.calls.lock().unwrap().push(call);
        outcome
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, endpoint: &str, query: &[(String, String)]) -> Result<Value> {
        self.record(Call {
            method: Method::Get,
            endpoint: endpoint.to_string(),
            fields: query.to_vec(),
            body: None,
        })
    }

    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.record(Call {
            method: Method::PostJson,
            endpoint: endpoint.to_string(),
            fields: Vec::new(),
            body: Some(body.clone()),
        })
    }

    async fn post_form(&self, endpoint: &str, fields: &[(String, String)]) -> Result<Value> {
        self.record(Call {
            method: Method::PostForm,
            endpoint: endpoint.to_string(),
            fields: fields.to_vec(),
            body: None,
        })
    }

    async fn post_multipart(&self, endpoint: &str, fields: &[(String, String)]) -> Result<Value> {
        self.record(Call {
            method: Method::PostMultipart,
            endpoint: endpoint.to_string(),
            fields: fields.to_vec(),
            body: None,
        })
    }
}

/// Facade over `transport` with no site or template configured
pub fn actions(transport: &Arc<ScriptedTransport>) -> TicketActions {
    actions_with(transport, TicketDefaults::default())
}

pub fn actions_with(transport: &Arc<ScriptedTransport>, defaults: TicketDefaults) -> TicketActions {
    TicketActions::new(transport.clone(), defaults)
}

/// Upstream rejection with a plain body
pub fn rejected(status: u16, body: &str) -> ServiceError {
    ServiceError::upstream(status, body)
}
