#![cfg(feature = "remote-allowlist")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{default_runtime, handshake_response, msg, FakeWindow};
use frame_bridge::origin::{AllowListCache, AllowListSource, HttpAllowListSource};
use frame_bridge::transport::HostEnvironment;
use frame_bridge::{Bridge, BridgeConfig, BridgeError, BridgeState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const PARTNER_ORIGIN: &str = "https://partner.example.org";
const REMOTE_DOC: &str = r#"{"validOrigins":["partner.example.org","*.partner.example.org"]}"#;

/// Serve a single HTTP exchange with a fixed status line and JSON body.
/// Returns the URL to fetch.
async fn serve_once(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut seen = Vec::new();
        let mut buf = [0u8; 1024];
        while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = sock.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            seen.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(response.as_bytes()).await.unwrap();
        let _ = sock.shutdown().await;
    });
    format!("http://{addr}/validDomains.json")
}

/// Keeps an ambient HTTP(S)_PROXY from intercepting loopback requests.
fn direct_source(url: &str) -> HttpAllowListSource {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    HttpAllowListSource::with_client(client, url).unwrap()
}

fn remote_config(url: &str) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.remote_allow_list.enabled = true;
    config.remote_allow_list.url = url.to_string();
    config.remote_allow_list.timeout_ms = 5_000;
    config
}

#[tokio::test]
async fn fetch_decodes_valid_origins() {
    common::init_tracing();
    let url = serve_once("200 OK", REMOTE_DOC).await;
    let doc = direct_source(&url).fetch().await.unwrap();
    assert_eq!(doc.valid_origins, vec!["partner.example.org", "*.partner.example.org"]);
}

#[tokio::test]
async fn error_status_is_a_fetch_error() {
    common::init_tracing();
    let url = serve_once("404 Not Found", "{}").await;
    let err = direct_source(&url).fetch().await.unwrap_err();
    assert!(matches!(err, BridgeError::Fetch(_)), "{err:?}");
}

#[tokio::test]
async fn error_status_keeps_bundled_list() {
    common::init_tracing();
    let url = serve_once("500 Internal Server Error", REMOTE_DOC).await;
    let cache = AllowListCache::bundled();
    assert!(!cache.prefetch(&direct_source(&url), Duration::from_secs(5)).await);
    assert!(cache.prefetch_attempted());
    assert!(!cache.is_remote());
    assert!(cache.origins().iter().any(|o| o == "teams.microsoft.com"));
}

#[tokio::test]
async fn bridge_accepts_remote_only_origin_after_prefetch() {
    common::init_tracing();
    let url = serve_once("200 OK", REMOTE_DOC).await;

    let me = FakeWindow::new(1);
    let parent = FakeWindow::new(2);
    let env = HostEnvironment::new(me.handle()).with_parent(parent.handle());
    let mut bridge =
        Bridge::with_allow_list(env, remote_config(&url), Arc::new(AllowListCache::bundled())).unwrap();

    assert!(!bridge.validator().is_allowed_str(PARTNER_ORIGIN));
    assert!(bridge.prefetch_allow_list(&direct_source(&url)).await);
    assert!(bridge.validator().allow_list().is_remote());
    assert!(bridge.validator().is_allowed_str(PARTNER_ORIGIN));
    assert!(bridge.validator().is_allowed_str("https://eu.partner.example.org"));

    bridge.initialize().unwrap();
    bridge.handle_message(msg(&parent, PARTNER_ORIGIN, handshake_response(0, default_runtime())));
    assert_eq!(bridge.state(), BridgeState::Ready);
}

#[tokio::test]
async fn bridge_remote_prefetch_failure_leaves_bundled_list() {
    common::init_tracing();
    let url = serve_once("500 Internal Server Error", REMOTE_DOC).await;

    let me = FakeWindow::new(1);
    let parent = FakeWindow::new(2);
    let env = HostEnvironment::new(me.handle()).with_parent(parent.handle());
    let bridge =
        Bridge::with_allow_list(env, remote_config(&url), Arc::new(AllowListCache::bundled())).unwrap();

    assert!(!bridge.prefetch_remote_allow_list().await);
    assert!(bridge.validator().allow_list().prefetch_attempted());
    assert!(!bridge.validator().is_allowed_str(PARTNER_ORIGIN));
    assert!(bridge.validator().is_allowed_str(common::HOST_ORIGIN));
}
