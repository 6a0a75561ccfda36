use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::header::AUTHORIZATION;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::KscError;

pub(crate) const API_PREFIX: &str = "api/v1.0";
pub(crate) const VSERVER_HEADER: &str = "X-KSC-VServer";
const LOGIN_METHOD: &str = "login";

/// Raw credential pair.
///
/// Kept immutable; the `KSCBasic` authorization header is derived from it on
/// demand, so repeated authentication can never double-encode.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `KSCBasic user="…", pass="…"` with both halves base64-encoded.
    fn ksc_basic(&self) -> String {
        format!(
            "KSCBasic user=\"{}\", pass=\"{}\"",
            BASE64.encode(&self.username),
            BASE64.encode(&self.password),
        )
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Construction-time configuration: server address and credential pair.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub credentials: Credentials,
    /// Virtual-server selector sent alongside the authorization header;
    /// `"x"` targets the main server.
    pub vserver: String,
    /// Administration servers commonly run with self-signed certificates.
    pub accept_invalid_certs: bool,
}

impl ClientConfig {
    pub fn new(server: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            server: server.into(),
            credentials,
            vserver: "x".into(),
            accept_invalid_certs: false,
        }
    }

    pub fn vserver(mut self, vserver: impl Into<String>) -> Self {
        self.vserver = vserver.into();
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

/// One authenticated connection to an administration server.
///
/// Cheap to share: all methods take `&self` and may run concurrently. The
/// only state written after construction is the recorded authorization
/// header, set by [`Client::auth`]; everything else is read-only.
pub struct Client {
    pub(crate) http: reqwest::Client,
    /// Normalized base address, no trailing slash.
    pub(crate) server: String,
    credentials: Credentials,
    pub(crate) vserver: String,
    /// Set once `auth` succeeds; attached read-only to every later call.
    pub(crate) auth_header: RwLock<Option<String>>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, KscError> {
        let server = config.server.trim_end_matches('/').to_owned();
        // validate once so later per-call URL builds only fail on bad method names
        Url::parse(&server)?;
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            http,
            server,
            credentials: config.credentials,
            vserver: config.vserver,
            auth_header: RwLock::new(None),
        })
    }

    /// Performs the login handshake and records the session authorization
    /// header for all subsequent calls on this client.
    ///
    /// The header value is derived fresh from the stored raw credentials, so
    /// calling `auth` again (e.g. after the server dropped the session, which
    /// surfaces as a remote failure on a later call) is safe. Concurrent
    /// re-authentication while other calls are in flight is the caller's
    /// synchronization problem.
    pub async fn auth(&self, ct: CancellationToken) -> Result<(), KscError> {
        let basic = self.credentials.ksc_basic();
        let request = self
            .http
            .post(self.method_url(LOGIN_METHOD)?)
            .header(AUTHORIZATION, &basic)
            .header(VSERVER_HEADER, &self.vserver)
            // the login endpoint insists on a two-byte body; the matching
            // content-length comes from the body itself so the field is
            // never duplicated
            .body("{}");
        self.send(ct, request).await?;
        *self.auth_header.write().await = Some(basic);
        tracing::info!(server = %self.server, "authenticated");
        Ok(())
    }

    pub(crate) fn method_url(&self, method: &str) -> Result<Url, KscError> {
        Ok(Url::parse(&format!(
            "{}/{API_PREFIX}/{method}",
            self.server
        ))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ksc_basic_is_derived_not_stored() {
        let credentials = Credentials::new("admin", "secret");
        let first = credentials.ksc_basic();
        let second = credentials.ksc_basic();
        assert_eq!(first, second);
        assert_eq!(first, r#"KSCBasic user="YWRtaW4=", pass="c2VjcmV0""#);
    }

    #[test]
    fn test_debug_does_not_leak_password() {
        let credentials = Credentials::new("admin", "secret");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_method_url_normalizes_trailing_slash() {
        let client = Client::new(ClientConfig::new(
            "https://ksc.example.com:13299/",
            Credentials::new("a", "b"),
        ))
        .unwrap();
        let url = client.method_url("HostGroup.GetDomains").unwrap();
        assert_eq!(
            url.as_str(),
            "https://ksc.example.com:13299/api/v1.0/HostGroup.GetDomains"
        );
    }

    #[test]
    fn test_bad_server_url_is_a_construction_error() {
        let result = Client::new(ClientConfig::new("not a url", Credentials::new("a", "b")));
        assert!(matches!(result, Err(KscError::Url(_))));
    }
}
