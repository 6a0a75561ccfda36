use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

/// Unified error type for everything the client can fail with.
///
/// Remote-protocol failures (expired handles, authorization failures,
/// malformed filters) are NOT represented here: the server reports them
/// inside ordinary response bodies, and classifying those is the caller's
/// concern — see [`crate::model::PxgErrorEnvelope`].
#[derive(Error, Debug)]
pub enum KscError {
    /// The server address or method name did not form a valid URL.
    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),
    /// The request parameters did not serialize to JSON.
    #[error("request encode error: {0}")]
    Encode(#[source] serde_json::Error),
    /// Network-level failure. Calls are single-attempt; retrying is up to
    /// the caller.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The call's cancellation token fired before the response arrived.
    #[error("call cancelled")]
    Cancelled,
    /// The response declared gzip content encoding but did not inflate.
    #[error("gzip decode error: {0}")]
    Gzip(#[source] std::io::Error),
    /// The response body did not decode into the requested envelope. The
    /// already-read bytes are kept so the caller can inspect them.
    #[error("response decode error: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        raw: Bytes,
    },
    /// Count/range access on a result set that was already released.
    #[error("result-set iterator already released")]
    IteratorReleased,
    /// Count/range access on a result set whose lifetime elapsed since the
    /// last access. The server has destroyed the backing collection; open a
    /// fresh iterator.
    #[error("result-set iterator expired ({lifetime:?} since last access)")]
    IteratorExpired { lifetime: Duration },
}

impl KscError {
    /// Raw response bytes attached to a decode failure, if any.
    pub fn raw(&self) -> Option<&Bytes> {
        match self {
            KscError::Decode { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
