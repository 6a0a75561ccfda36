//! Typed wrappers over a few `HostGroup` procedures.
//!
//! Everything here is plain glue over [`Client::call`]; any other procedure
//! of the class can be invoked the same way with caller-defined shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    client::Client,
    error::KscError,
    model::{DateTimeParam, ParamsEnvelope},
};

const GET_DOMAINS: &str = "HostGroup.GetDomains";
const GET_HOST_PRODUCTS: &str = "HostGroup.GetHostProducts";

/// Hosts and administration-group queries.
pub struct HostGroup<'a> {
    client: &'a Client,
}

impl Client {
    pub fn host_group(&self) -> HostGroup<'_> {
        HostGroup { client: self }
    }
}

/// Windows domain kind reported by `HostGroup.GetDomains`.
///
/// Values the server may grow beyond the two documented ones are kept as
/// [`WinDomainType::Unknown`] so one new record cannot sink a whole listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "i64")]
pub enum WinDomainType {
    WindowsNtDomain,
    WindowsWorkGroup,
    Unknown(i64),
}

impl From<i64> for WinDomainType {
    fn from(value: i64) -> Self {
        match value {
            0 => WinDomainType::WindowsNtDomain,
            1 => WinDomainType::WindowsWorkGroup,
            other => WinDomainType::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Domain {
    #[serde(rename = "KLHST_WKS_WINDOMAIN")]
    pub name: String,
    #[serde(rename = "KLHST_WKS_WINDOMAIN_TYPE")]
    pub domain_type: WinDomainType,
}

#[derive(Debug, Default, Deserialize)]
struct DomainsResponse {
    #[serde(rename = "PxgRetVal", default)]
    domains: Vec<ParamsEnvelope<Domain>>,
}

/// One installed product build on a host.
///
/// `name` and `version` are injected from the response map keys, not from
/// the payload body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HostProductInfo {
    #[serde(skip)]
    pub name: String,
    #[serde(skip)]
    pub version: String,
    #[serde(rename = "BaseDate", default)]
    pub base_date: DateTimeParam,
    #[serde(rename = "BaseRecords", default)]
    pub base_records: i64,
    #[serde(rename = "CustomName", default)]
    pub custom_name: String,
    #[serde(rename = "DataFolder", default)]
    pub data_folder: String,
    #[serde(rename = "DisplayName", default)]
    pub display_name: String,
    #[serde(rename = "FileName", default)]
    pub file_name: String,
    #[serde(rename = "FilePath", default)]
    pub file_path: String,
    #[serde(rename = "InstallTime", default)]
    pub install_time: DateTimeParam,
    #[serde(rename = "ModuleType", default)]
    pub module_type: i64,
    #[serde(rename = "ProdVersion", default)]
    pub prod_version: String,
}

// product name -> { version string -> product attributes }
type ProductMap = BTreeMap<String, ParamsEnvelope<BTreeMap<String, ParamsEnvelope<HostProductInfo>>>>;

#[derive(Debug, Default, Deserialize)]
struct HostProductsResponse {
    #[serde(rename = "PxgRetVal", default)]
    products: ProductMap,
}

#[derive(Serialize)]
struct HostnameParams<'a> {
    #[serde(rename = "strHostName")]
    hostname: &'a str,
}

impl HostGroup<'_> {
    /// Lists Windows domains and workgroups visible in the network.
    pub async fn get_domains(&self, ct: CancellationToken) -> Result<Vec<Domain>, KscError> {
        let response = self
            .client
            .call::<(), DomainsResponse>(ct, GET_DOMAINS, None)
            .await?;
        Ok(response
            .value
            .domains
            .into_iter()
            .map(|envelope| envelope.value)
            .collect())
    }

    /// Lists products installed on a host, one record per (product, version)
    /// pair, flattened from the nested name→version response map.
    pub async fn get_host_products(
        &self,
        ct: CancellationToken,
        hostname: &str,
    ) -> Result<Vec<HostProductInfo>, KscError> {
        let response = self
            .client
            .call::<_, HostProductsResponse>(ct, GET_HOST_PRODUCTS, Some(&HostnameParams { hostname }))
            .await?;
        let mut products = Vec::new();
        for (name, versions) in response.value.products {
            for (version, info) in versions.value {
                let mut info = info.value;
                info.name = name.clone();
                info.version = version;
                products.push(info);
            }
        }
        Ok(products)
    }
}
