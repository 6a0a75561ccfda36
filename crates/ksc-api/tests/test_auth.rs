mod common;

use std::sync::{Arc, Mutex};

use axum::{Router, http::HeaderMap, routing::post};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use ksc_api::CancellationToken;

fn expected_authorization() -> String {
    format!(
        r#"KSCBasic user="{}", pass="{}""#,
        BASE64.encode("user"),
        BASE64.encode("pass"),
    )
}

fn capture_route(captured: Arc<Mutex<Vec<HeaderMap>>>) -> axum::routing::MethodRouter {
    post(move |headers: HeaderMap| {
        let captured = captured.clone();
        async move {
            captured.lock().unwrap().push(headers);
            ""
        }
    })
}

#[tokio::test]
async fn test_login_handshake_wire_shape() -> anyhow::Result<()> {
    let logins: Arc<Mutex<Vec<HeaderMap>>> = Arc::default();
    let router = Router::new().route("/api/v1.0/login", capture_route(logins.clone()));
    let server = common::serve(router).await?;
    let client = common::client(&server);

    client.auth(CancellationToken::new()).await?;

    let logins = logins.lock().unwrap();
    assert_eq!(logins.len(), 1);
    let headers = &logins[0];
    assert_eq!(
        headers.get("authorization").unwrap().to_str()?,
        expected_authorization()
    );
    assert_eq!(headers.get("x-ksc-vserver").unwrap().to_str()?, "x");
    assert_eq!(headers.get("content-length").unwrap().to_str()?, "2");
    assert_eq!(headers.get_all("content-length").iter().count(), 1);
    assert_eq!(headers.get_all("content-type").iter().count(), 1);

    // the username is encoded exactly once
    let authorization = headers.get("authorization").unwrap().to_str()?.to_owned();
    let encoded_user = authorization
        .split('"')
        .nth(1)
        .expect("quoted user field");
    assert_eq!(BASE64.decode(encoded_user)?, b"user");
    Ok(())
}

#[tokio::test]
async fn test_repeated_auth_never_double_encodes() -> anyhow::Result<()> {
    let logins: Arc<Mutex<Vec<HeaderMap>>> = Arc::default();
    let router = Router::new().route("/api/v1.0/login", capture_route(logins.clone()));
    let server = common::serve(router).await?;
    let client = common::client(&server);

    client.auth(CancellationToken::new()).await?;
    client.auth(CancellationToken::new()).await?;

    let logins = logins.lock().unwrap();
    assert_eq!(logins.len(), 2);
    let expected = expected_authorization();
    for headers in logins.iter() {
        assert_eq!(headers.get("authorization").unwrap().to_str()?, expected);
    }
    Ok(())
}

#[tokio::test]
async fn test_calls_carry_auth_headers_after_login() -> anyhow::Result<()> {
    let calls: Arc<Mutex<Vec<HeaderMap>>> = Arc::default();
    let router = Router::new()
        .route("/api/v1.0/login", post(|| async { "" }))
        .route("/api/v1.0/Test.Echo", capture_route(calls.clone()));
    let server = common::serve(router).await?;
    let client = common::client(&server);

    client
        .call_raw::<()>(CancellationToken::new(), "Test.Echo", None)
        .await?;
    client.auth(CancellationToken::new()).await?;
    client
        .call_raw::<()>(CancellationToken::new(), "Test.Echo", None)
        .await?;

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].get("authorization").is_none());
    assert_eq!(
        calls[1].get("authorization").unwrap().to_str()?,
        expected_authorization()
    );
    assert_eq!(calls[1].get("x-ksc-vserver").unwrap().to_str()?, "x");
    Ok(())
}
