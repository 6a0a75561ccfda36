//! Envelope shapes the protocol reuses across methods.
//!
//! Endpoint-specific schemas are the caller's business; the types here are
//! only the handful of containers that appear in many responses.

use serde::{Deserialize, Serialize};

/// `{"PxgRetVal": <int>}` — the common scalar success envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PxgValInt {
    #[serde(rename = "PxgRetVal", default)]
    pub value: i64,
}

/// `{"PxgRetVal": <string>}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PxgValStr {
    #[serde(rename = "PxgRetVal", default)]
    pub value: String,
}

/// `{"wstrIteratorId": "…"}` — a server-issued result-set handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WstrIteratorId {
    #[serde(rename = "wstrIteratorId", default)]
    pub value: String,
}

/// The `{"type": "params", "value": …}` container nested throughout
/// responses. The `type` discriminator carries no information for decoding
/// and is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ParamsEnvelope<T> {
    #[serde(rename = "value")]
    pub value: T,
}

/// `{"type": "datetime", "value": "2019-05-19T21:12:00Z"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DateTimeParam {
    #[serde(rename = "value", default)]
    pub value: String,
}

/// Sort key for result-set queries: `{"Name": "…", "Asc": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldsToOrder {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Asc")]
    pub asc: bool,
}

impl FieldsToOrder {
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asc: true,
        }
    }

    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asc: false,
        }
    }
}

/// Remote API failure payload, e.g.
/// `{"PxgError": {"code": 1184, "module": "KLSTD", "message": "…"}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PxgError {
    #[serde(rename = "code", default)]
    pub code: i64,
    #[serde(rename = "subcode", default)]
    pub subcode: i64,
    #[serde(rename = "module", default)]
    pub module: String,
    #[serde(rename = "message", default)]
    pub message: String,
}

/// Wrapper the server puts around [`PxgError`]. The transport never
/// interprets these; callers classify raw bodies themselves.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PxgErrorEnvelope {
    #[serde(rename = "PxgError")]
    pub error: Option<PxgError>,
}

impl PxgErrorEnvelope {
    /// Extracts a remote failure from a raw response body, if one is there.
    /// Bodies that are not JSON objects or carry no `PxgError` yield `None`.
    pub fn classify(raw: &[u8]) -> Option<PxgError> {
        serde_json::from_slice::<PxgErrorEnvelope>(raw)
            .ok()
            .and_then(|envelope| envelope.error)
    }
}
