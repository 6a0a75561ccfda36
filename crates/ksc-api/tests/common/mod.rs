use axum::Router;
use ksc_api::{Client, ClientConfig, Credentials};
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral local port, returning the base URL.
pub async fn serve(router: Router) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server failed");
    });
    Ok(format!("http://{addr}"))
}

pub fn client(server: &str) -> Client {
    Client::new(ClientConfig::new(server, Credentials::new("user", "pass")))
        .expect("client construction")
}
