use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub const SCHEMA_VERSION: &str = "doctalk.v1";

/// Payload of an envelope, serialized under a `plan` or `result` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Body {
    Plan(Value),
    Result(Value),
}

/// One machine-readable line on stdout per command run.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub schema_version: &'static str,
    pub time: DateTime<Utc>,
    pub request_id: Uuid,
    pub op: &'static str,
    /// False for dry runs that only describe what would happen.
    pub apply: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(flatten)]
    pub body: Body,
}

impl Envelope {
    fn new(op: &'static str, body: Body, elapsed: Option<Duration>) -> Self {
        Envelope {
            schema_version: SCHEMA_VERSION,
            time: Utc::now(),
            request_id: Uuid::new_v4(),
            op,
            apply: matches!(body, Body::Result(_)),
            elapsed_ms: elapsed.map(|d| d.as_millis() as u64),
            body,
        }
    }

    pub fn plan<T: Serialize>(op: &'static str, plan: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(op, Body::Plan(serde_json::to_value(plan)?), None))
    }

    pub fn result<T: Serialize>(op: &'static str, result: &T, elapsed: Option<Duration>) -> Result<Self, serde_json::Error> {
        Ok(Self::new(op, Body::Result(serde_json::to_value(result)?), elapsed))
    }

    pub fn label(&self) -> &'static str {
        match self.body {
            Body::Plan(_) => "Plan",
            Body::Result(_) => "Result",
        }
    }

    pub fn payload(&self) -> &Value {
        match &self.body {
            Body::Plan(v) | Body::Result(v) => v,
        }
    }
}
