//! The generic RPC executor: one HTTP POST per call, cooperative
//! cancellation, transparent gzip inflation, envelope decoding.

use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;
use reqwest::header::{ACCEPT_ENCODING, AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE, HeaderValue};
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;

use crate::{
    client::{Client, VSERVER_HEADER},
    error::KscError,
};

/// A decoded response: the typed envelope plus the raw bytes it was decoded
/// from, so callers can always fall back to manual inspection.
#[derive(Debug, Clone)]
pub struct Typed<T> {
    pub value: T,
    pub raw: Bytes,
}

impl Client {
    /// Invokes a named remote procedure and decodes the response envelope.
    ///
    /// `method` is the `Class.Method` path segment, `params` the JSON request
    /// body (or `None` for an empty body). An empty success body is not an
    /// error and yields `T::default()`; a malformed body yields
    /// [`KscError::Decode`] carrying the raw bytes. Unknown response fields
    /// are ignored.
    pub async fn call<P, T>(
        &self,
        ct: CancellationToken,
        method: &str,
        params: Option<&P>,
    ) -> Result<Typed<T>, KscError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        let raw = self.call_raw(ct, method, params).await?;
        let value = decode_envelope(&raw)?;
        Ok(Typed { value, raw })
    }

    /// Invokes a named remote procedure, discarding the response shape.
    ///
    /// No decode is attempted, so no decode error can arise; the raw body is
    /// returned as-is.
    pub async fn call_raw<P>(
        &self,
        ct: CancellationToken,
        method: &str,
        params: Option<&P>,
    ) -> Result<Bytes, KscError>
    where
        P: Serialize + ?Sized,
    {
        let mut request = self.http.post(self.method_url(method)?);
        if let Some(params) = params {
            // serialize by hand; `send` owns the content-type header, and
            // RequestBuilder::json would append a second copy
            request = request.body(serde_json::to_vec(params).map_err(KscError::Encode)?);
        }
        tracing::debug!(method, "issuing call");
        self.send(ct, request).await
    }

    /// Single-attempt request execution. No retries, no backoff.
    pub(crate) async fn send(
        &self,
        ct: CancellationToken,
        request: reqwest::RequestBuilder,
    ) -> Result<Bytes, KscError> {
        let mut request = request
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT_ENCODING, "gzip");
        let auth = self.auth_header.read().await.as_deref().map(str::to_owned);
        if let Some(auth) = auth {
            request = request
                .header(AUTHORIZATION, auth)
                .header(VSERVER_HEADER, &self.vserver);
        }

        let response = tokio::select! {
            _ = ct.cancelled() => return Err(KscError::Cancelled),
            response = request.send() => match response {
                Ok(response) => response,
                // a failure observed with the token already fired reports as
                // cancellation, not as a generic transport error
                Err(_) if ct.is_cancelled() => return Err(KscError::Cancelled),
                Err(error) => return Err(KscError::Transport(error)),
            },
        };

        let status = response.status();
        let encoding = response.headers().get(CONTENT_ENCODING).cloned();
        let body = tokio::select! {
            _ = ct.cancelled() => return Err(KscError::Cancelled),
            body = response.bytes() => match body {
                Ok(body) => body,
                Err(_) if ct.is_cancelled() => return Err(KscError::Cancelled),
                Err(error) => return Err(KscError::Transport(error)),
            },
        };
        tracing::debug!(%status, len = body.len(), "response received");
        inflate(encoding.as_ref(), body)
    }
}

/// Selects a pass-through or gzip-inflating path based on the response's
/// declared content encoding; an absent header means pass-through. Inflate
/// failures surface as errors, never as partial data.
fn inflate(encoding: Option<&HeaderValue>, body: Bytes) -> Result<Bytes, KscError> {
    match encoding.and_then(|value| value.to_str().ok()) {
        Some("gzip") => {
            let mut decoder = GzDecoder::new(body.as_ref());
            let mut inflated = Vec::new();
            decoder.read_to_end(&mut inflated).map_err(KscError::Gzip)?;
            Ok(inflated.into())
        }
        _ => Ok(body),
    }
}

pub(crate) fn decode_envelope<T>(raw: &Bytes) -> Result<T, KscError>
where
    T: DeserializeOwned + Default,
{
    // the protocol allows empty success bodies
    if raw.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(raw).map_err(|source| KscError::Decode {
        source,
        raw: raw.clone(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::model::PxgValInt;

    #[test]
    fn test_decode_empty_body_yields_default() {
        let raw = Bytes::new();
        let value: PxgValInt = decode_envelope(&raw).unwrap();
        assert_eq!(value, PxgValInt::default());
    }

    #[test]
    fn test_decode_malformed_body_keeps_bytes() {
        let raw = Bytes::from_static(b"{\"PxgRetVal\":");
        let error = decode_envelope::<PxgValInt>(&raw).unwrap_err();
        assert_eq!(error.raw(), Some(&raw));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let raw = Bytes::from_static(b"{\"PxgRetVal\": 7, \"whatever\": [1, 2]}");
        let value: PxgValInt = decode_envelope(&raw).unwrap();
        assert_eq!(value.value, 7);
    }

    #[test]
    fn test_inflate_passthrough_without_header() {
        let body = Bytes::from_static(b"{\"PxgRetVal\": 1}");
        assert_eq!(inflate(None, body.clone()).unwrap(), body);
    }

    #[test]
    fn test_inflate_gzip_round_trip() {
        let payload = b"{\"PxgRetVal\": 42}";
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(payload).unwrap();
        let compressed = Bytes::from(encoder.finish().unwrap());

        let header = HeaderValue::from_static("gzip");
        let inflated = inflate(Some(&header), compressed).unwrap();
        assert_eq!(inflated.as_ref(), payload);
    }

    #[test]
    fn test_inflate_corrupt_gzip_is_an_error() {
        let header = HeaderValue::from_static("gzip");
        let result = inflate(Some(&header), Bytes::from_static(b"definitely not gzip"));
        assert!(matches!(result, Err(KscError::Gzip(_))));
    }
}
