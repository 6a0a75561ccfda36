//! The `SrvView` result-set protocol: plain data queries answered through a
//! server-side, handle-addressed, time-limited buffered collection.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    client::Client,
    error::KscError,
    model::{FieldsToOrder, PxgValInt, WstrIteratorId},
};

const RESET_ITERATOR: &str = "SrvView.ResetIterator";
const GET_RECORD_COUNT: &str = "SrvView.GetRecordCount";
const GET_RECORD_RANGE: &str = "SrvView.GetRecordRange";
const RELEASE_ITERATOR: &str = "SrvView.ReleaseIterator";

/// Query parameters for opening a server-side result set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SrvViewParams {
    /// Name of the srvview to query.
    #[serde(rename = "wstrViewName")]
    pub view_name: String,
    /// Condition over srvview attributes, e.g. `(&(MotherBoard="*"))`.
    #[serde(rename = "wstrFilter")]
    pub filter: String,
    /// Attribute names to return for each record.
    #[serde(rename = "vecFieldsToReturn")]
    pub fields_to_return: Vec<String>,
    #[serde(rename = "vecFieldsToOrder", skip_serializing_if = "Vec::is_empty")]
    pub fields_to_order: Vec<FieldsToOrder>,
    /// Extra view-specific options, e.g. `{"TOP_N": 100}`.
    #[serde(rename = "pParams", skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Max result-set lifetime in seconds, counted from the last access.
    #[serde(rename = "lifetimeSec")]
    pub lifetime_sec: u64,
}

impl SrvViewParams {
    pub fn new(view_name: impl Into<String>, lifetime_sec: u64) -> Self {
        Self {
            view_name: view_name.into(),
            lifetime_sec,
            ..Default::default()
        }
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn fields_to_return<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields_to_return = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn order_by(mut self, field: FieldsToOrder) -> Self {
        self.fields_to_order.push(field);
        self
    }

    /// Restrict the result set to the first `n` matching records.
    pub fn top_n(mut self, n: i64) -> Self {
        self.params = Some(serde_json::json!({ "TOP_N": n }));
        self
    }
}

/// Interface to plain queries against the administration server.
pub struct SrvView<'a> {
    client: &'a Client,
}

impl Client {
    pub fn srv_view(&self) -> SrvView<'_> {
        SrvView { client: self }
    }
}

impl<'a> SrvView<'a> {
    /// Runs the query and opens a server-side collection of the matching
    /// records, returning a cursor over it.
    ///
    /// The caller owns the cursor and must [`ResultSet::release`] it; an
    /// unreleased set holds server memory until `lifetime_sec` passes.
    pub async fn reset_iterator(
        &self,
        ct: CancellationToken,
        params: &SrvViewParams,
    ) -> Result<ResultSet<'a>, KscError> {
        let response = self
            .client
            .call::<_, WstrIteratorId>(ct, RESET_ITERATOR, Some(params))
            .await?;
        tracing::debug!(id = %response.value.value, view = %params.view_name, "result set opened");
        Ok(ResultSet {
            client: self.client,
            id: response.value.value,
            lifetime: Duration::from_secs(params.lifetime_sec),
            last_access: Instant::now(),
            state: IterState::Open,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterState {
    Open,
    Released,
    Expired,
}

/// A cursor over one query's server-buffered records.
///
/// The server destroys the backing collection once the lifetime passes
/// without a count/range access, when the owning session closes, or on
/// release. Expiry is tracked client-side as well so that it surfaces as the
/// distinct [`KscError::IteratorExpired`] instead of an opaque remote
/// failure; the remote side may still reject a handle this cursor believes
/// open (e.g. after a session drop), which arrives as an ordinary remote
/// failure for the caller to classify. Nothing is retried transparently.
pub struct ResultSet<'a> {
    client: &'a Client,
    id: String,
    lifetime: Duration,
    last_access: Instant,
    state: IterState,
}

#[derive(Serialize)]
struct IteratorRef<'a> {
    #[serde(rename = "wstrIteratorId")]
    id: &'a str,
}

#[derive(Serialize)]
struct RangeParams<'a> {
    #[serde(rename = "wstrIteratorId")]
    id: &'a str,
    #[serde(rename = "nStart")]
    start: i64,
    #[serde(rename = "nEnd")]
    end: i64,
}

#[derive(Debug, Default, Deserialize)]
struct RangeResponse {
    #[serde(rename = "pRecords", default)]
    records: IteratorArray,
}

#[derive(Debug, Default, Deserialize)]
struct IteratorArray {
    #[serde(rename = "KLCSP_ITERATOR_ARRAY", default)]
    items: Vec<Value>,
}

impl ResultSet<'_> {
    /// The opaque server-issued result-set handle.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of records currently in the set.
    ///
    /// Never cached: the remote count can drift, so re-fetch before
    /// array-style indexing.
    pub async fn record_count(&mut self, ct: CancellationToken) -> Result<i64, KscError> {
        self.check_open()?;
        let response = self
            .client
            .call::<_, PxgValInt>(ct, GET_RECORD_COUNT, Some(&IteratorRef { id: &self.id }))
            .await?;
        self.touch();
        Ok(response.value.value)
    }

    /// Records in positions `[start, end)`, zero-based.
    ///
    /// `start` and `end` are passed to the server verbatim; only the
    /// [`records`](Self::records) pagination loop assumes the upper bound is
    /// exclusive.
    pub async fn record_range(
        &mut self,
        ct: CancellationToken,
        start: i64,
        end: i64,
    ) -> Result<Vec<Value>, KscError> {
        self.check_open()?;
        let response = self
            .client
            .call::<_, RangeResponse>(
                ct,
                GET_RECORD_RANGE,
                Some(&RangeParams {
                    id: &self.id,
                    start,
                    end,
                }),
            )
            .await?;
        self.touch();
        Ok(response.value.records.items)
    }

    /// Fetches the whole set in `chunk`-sized ranges.
    ///
    /// The count is taken once per run; a remote mutation mid-run shows up
    /// as a short or failing final chunk, surfaced to the caller.
    pub async fn records(
        &mut self,
        ct: CancellationToken,
        chunk: i64,
    ) -> Result<Vec<Value>, KscError> {
        let chunk = chunk.max(1);
        let count = self.record_count(ct.clone()).await?;
        let mut all = Vec::with_capacity(count.max(0) as usize);
        let mut start = 0;
        while start < count {
            let end = (start + chunk).min(count);
            all.extend(self.record_range(ct.clone(), start, end).await?);
            start = end;
        }
        Ok(all)
    }

    /// Releases the server-side collection and frees the associated memory.
    ///
    /// Releasing twice is a local no-op. A release attempt on an expired
    /// handle is still sent; the server may reject it with an ordinary
    /// remote failure payload, which is recoverable.
    pub async fn release(&mut self, ct: CancellationToken) -> Result<(), KscError> {
        if self.state == IterState::Released {
            return Ok(());
        }
        self.client
            .call_raw(ct, RELEASE_ITERATOR, Some(&IteratorRef { id: &self.id }))
            .await?;
        self.state = IterState::Released;
        tracing::debug!(id = %self.id, "result set released");
        Ok(())
    }

    fn check_open(&mut self) -> Result<(), KscError> {
        match self.state {
            IterState::Released => Err(KscError::IteratorReleased),
            IterState::Expired => Err(KscError::IteratorExpired {
                lifetime: self.lifetime,
            }),
            IterState::Open if self.last_access.elapsed() > self.lifetime => {
                self.state = IterState::Expired;
                Err(KscError::IteratorExpired {
                    lifetime: self.lifetime,
                })
            }
            IterState::Open => Ok(()),
        }
    }

    fn touch(&mut self) {
        self.last_access = Instant::now();
    }
}
