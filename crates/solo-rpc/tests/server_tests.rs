//! Integration tests for the solo-rpc server.
//!
//! Each test starts the server in-process on an auto-assigned port, then
//! drives the HTTP surface with reqwest and the channel with tokio-tungstenite.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use solo_core::{ErrorKind, IdPolicy, JsonRpc, PendingCalls, ServerConfig};
use solo_rpc::{demo, start_server, Credentials, ServerHandle, ServerOptions, TlsFiles};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

type Channel = WebSocketStream<MaybeTlsStream<TcpStream>>;

const GRANTED: &str = "Resource granted";
const BUSY: &str = "Sorry resource is busy, try again in a while...";

async fn start(config: ServerConfig) -> ServerHandle {
    let credentials = Credentials::from_json(r#"{"operator":"s3cret"}"#).unwrap();
    let options = ServerOptions::new("127.0.0.1", 0, demo::instrument())
        .with_config(config)
        .with_credentials(credentials);
    start_server(options).await.expect("server should start")
}

/// Short leases so expiry tests finish quickly.
fn short_lease() -> ServerConfig {
    ServerConfig::default()
        .with_lease_duration(Duration::from_millis(300))
        .with_watchdog_interval(Duration::from_millis(50))
}

/// An HTTP client keeping its own session cookie.
struct Browser {
    client: reqwest::Client,
    server: String,
    channel_path: &'static str,
    cookie: Option<String>,
    /// Set when talking to a TLS server
    tls: Option<Arc<rustls::ClientConfig>>,
}

impl Browser {
    fn new(handle: &ServerHandle) -> Self {
        Self {
            client: reqwest::Client::new(),
            server: handle.addr.to_string(),
            channel_path: handle.channel_path,
            cookie: None,
            tls: None,
        }
    }

    /// A browser for a TLS server presenting the self-signed `cert`.
    fn trusting(handle: &ServerHandle, cert: &rcgen::Certificate) -> Self {
        let mut roots = rustls::RootCertStore::empty();
        roots.add(cert.der().clone()).unwrap();
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .unwrap();
        Self {
            client,
            tls: Some(Arc::new(config)),
            ..Self::new(handle)
        }
    }

    fn url(&self, scheme: &str, path: &str) -> String {
        let scheme = if self.tls.is_some() {
            format!("{scheme}s")
        } else {
            scheme.to_string()
        };
        format!("{}://{}{}", scheme, self.server, path)
    }

    /// Session id from the cookie the server handed out.
    fn session_id(&self) -> Option<Uuid> {
        let cookie = self.cookie.as_deref()?;
        let (_, value) = cookie.split_once('=')?;
        Uuid::parse_str(value).ok()
    }

    async fn send(&mut self, request: reqwest::RequestBuilder) -> String {
        let request = match &self.cookie {
            Some(cookie) => request.header(reqwest::header::COOKIE, cookie.as_str()),
            None => request,
        };
        let response = request
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .expect("request failed");
        if let Some(set_cookie) = response.headers().get(reqwest::header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }
        response.text().await.unwrap()
    }

    async fn get(&mut self, path: &str) -> String {
        let request = self.client.get(self.url("http", path));
        self.send(request).await
    }

    async fn login(&mut self, login: &str, password: &str) -> String {
        let request = self
            .client
            .get(self.url("http", "/login"))
            .basic_auth(login, Some(password));
        self.send(request).await
    }

    async fn connect(&self) -> Channel {
        let mut request = self.url("ws", self.channel_path).into_client_request().unwrap();
        if let Some(cookie) = &self.cookie {
            request.headers_mut().insert(COOKIE, cookie.parse().unwrap());
        }
        let connector = self.tls.clone().map(Connector::Rustls);
        let (channel, _) =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector)
                .await
                .expect("upgrade failed");
        channel
    }
}

async fn next_frame(channel: &mut Channel) -> Message {
    tokio::time::timeout(Duration::from_secs(5), channel.next())
        .await
        .expect("no frame within 5s")
        .expect("channel ended")
        .expect("channel error")
}

async fn call(channel: &mut Channel, text: &str) -> String {
    channel.send(Message::Text(text.to_string())).await.unwrap();
    match next_frame(channel).await {
        Message::Text(reply) => reply,
        other => panic!("expected a text reply, got {other:?}"),
    }
}

/// Read frames until the server closes the channel; return the close code.
async fn close_code(channel: &mut Channel) -> u16 {
    match next_frame(channel).await {
        Message::Close(Some(frame)) => u16::from(frame.code),
        other => panic!("expected a close frame, got {other:?}"),
    }
}

async fn wait_for_grant(browser: &mut Browser) -> bool {
    grant_within(browser, Duration::from_secs(2)).await
}

/// Poll `/get_access` until granted or `limit` runs out.
async fn grant_within(browser: &mut Browser, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if browser.get("/get_access").await == GRANTED {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_and_greeting() {
    let server = start(ServerConfig::default()).await;
    let mut browser = Browser::new(&server);

    let health: Value = serde_json::from_str(&browser.get("/health").await).unwrap();
    assert_eq!(health, json!({"status": "ok"}));

    assert_eq!(
        browser.get("/").await,
        "Welcome, I don't think you've visited here before."
    );
    assert!(browser.get("/").await.starts_with("Welcome back, last visited: "));

    // A new browser has no session yet
    let mut stranger = Browser::new(&server);
    assert_eq!(
        stranger.get("/").await,
        "Welcome, I don't think you've visited here before."
    );
}

#[tokio::test]
async fn test_grant_then_busy() {
    let server = start(ServerConfig::default()).await;
    let mut first = Browser::new(&server);
    let mut second = Browser::new(&server);

    assert_eq!(first.get("/get_access").await, GRANTED);
    assert_eq!(second.get("/get_access").await, BUSY);
    assert_eq!(first.get("/get_access").await, BUSY);
    assert!(server.arbiter.snapshot().await.unwrap().held);
}

#[tokio::test]
async fn test_calls_over_channel() {
    let server = start(ServerConfig::default()).await;
    let mut browser = Browser::new(&server);
    assert_eq!(browser.get("/get_access").await, GRANTED);
    let mut channel = browser.connect().await;

    let reply = call(
        &mut channel,
        r#"{"jsonrpc":"2.0","method":"add","id":9,"params":[2,2]}"#,
    )
    .await;
    assert_eq!(reply, r#"{"jsonrpc":"2.0","result":4,"id":9}"#);

    let reply: Value = serde_json::from_str(&call(&mut channel, r#"{"malformed":"json""#).await).unwrap();
    assert_eq!(reply["error"]["code"], json!(-32700));
    assert_eq!(reply["id"], Value::Null);

    let reply: Value = serde_json::from_str(
        &call(
            &mut channel,
            r#"{"jsonrpc":"2.0","method":"add","id":0,"params":[2,2,2]}"#,
        )
        .await,
    )
    .unwrap();
    assert_eq!(reply["error"]["code"], json!(-32602));
    assert_eq!(reply["id"], json!(0));
}

#[tokio::test]
async fn test_client_engine_correlates_replies() {
    let server = start(ServerConfig::default()).await;
    let mut browser = Browser::new(&server);
    assert_eq!(browser.get("/get_access").await, GRANTED);
    let mut channel = browser.connect().await;

    let engine = JsonRpc::new();
    let calls = PendingCalls::new();

    let (request, id) = engine.request("add", IdPolicy::Auto, Some(vec![json!(20), json!(22)]), None);
    let outcome = calls.expect(id.unwrap()).await;
    let reply = call(&mut channel, &request).await;
    assert!(engine.process_incoming(&reply, &calls).await.response.is_none());
    assert_eq!(outcome.await.unwrap(), Ok(json!(42)));

    let (request, id) = engine.request("divide", IdPolicy::Auto, Some(vec![json!(1), json!(0)]), None);
    let outcome = calls.expect(id.unwrap()).await;
    let reply = call(&mut channel, &request).await;
    engine.process_incoming(&reply, &calls).await;
    let error = outcome.await.unwrap().unwrap_err();
    assert_eq!(error.kind, ErrorKind::Internal);
    assert_eq!(error.details, "division by zero");

    let (request, id) = engine.request("non_existant_func", IdPolicy::Auto, None, None);
    let outcome = calls.expect(id.unwrap()).await;
    let reply = call(&mut channel, &request).await;
    engine.process_incoming(&reply, &calls).await;
    assert_eq!(outcome.await.unwrap().unwrap_err().kind, ErrorKind::NotFound);
    assert_eq!(calls.outstanding().await, 0);
}

#[tokio::test]
async fn test_notification_gets_no_reply() {
    let server = start(ServerConfig::default()).await;
    let mut browser = Browser::new(&server);
    assert_eq!(browser.get("/get_access").await, GRANTED);
    let mut channel = browser.connect().await;

    channel
        .send(Message::Text(r#"{"jsonrpc":"2.0","method":"raise_exception"}"#.to_string()))
        .await
        .unwrap();
    // The next reply belongs to the next request, not to the notification
    let reply = call(&mut channel, r#"{"jsonrpc":"2.0","method":"echo","id":1,"params":["x"]}"#).await;
    assert_eq!(reply, r#"{"jsonrpc":"2.0","result":"x","id":1}"#);
}

#[tokio::test]
async fn test_ungranted_channel_is_refused() {
    let server = start(ServerConfig::default()).await;
    let mut holder = Browser::new(&server);
    assert_eq!(holder.get("/get_access").await, GRANTED);

    let mut other = Browser::new(&server);
    assert_eq!(other.get("/get_access").await, BUSY);
    let mut channel = other.connect().await;
    assert_eq!(close_code(&mut channel).await, 4003);

    // No session cookie at all
    let mut channel = Browser::new(&server).connect().await;
    assert_eq!(close_code(&mut channel).await, 4003);
}

#[tokio::test]
async fn test_graceful_close_releases_resource() {
    let server = start(ServerConfig::default().with_lease_duration(Duration::from_secs(60))).await;
    let mut holder = Browser::new(&server);
    assert_eq!(holder.get("/get_access").await, GRANTED);
    let mut channel = holder.connect().await;
    call(&mut channel, r#"{"jsonrpc":"2.0","method":"identify","id":1}"#).await;

    channel.close(None).await.unwrap();

    let mut next = Browser::new(&server);
    assert!(wait_for_grant(&mut next).await, "resource was not released");
}

#[tokio::test]
async fn test_idle_lease_is_reclaimed() {
    let server = start(short_lease()).await;
    let mut holder = Browser::new(&server);
    assert_eq!(holder.get("/get_access").await, GRANTED);

    let mut next = Browser::new(&server);
    assert!(wait_for_grant(&mut next).await, "lease never expired");

    // The stale grant no longer opens a channel
    let mut channel = holder.connect().await;
    assert_eq!(close_code(&mut channel).await, 4003);
}

#[tokio::test]
async fn test_superseded_holder_is_closed() {
    let server = start(short_lease()).await;
    let mut first = Browser::new(&server);
    assert_eq!(first.get("/get_access").await, GRANTED);
    let mut channel = first.connect().await;

    let mut second = Browser::new(&server);
    assert!(wait_for_grant(&mut second).await, "lease never expired");

    channel
        .send(Message::Text(r#"{"jsonrpc":"2.0","method":"add","id":1,"params":[1,1]}"#.to_string()))
        .await
        .unwrap();
    assert_eq!(close_code(&mut channel).await, 4000);
}

#[tokio::test]
async fn test_lapsed_holder_reacquires() {
    let server = start(short_lease()).await;
    let mut holder = Browser::new(&server);
    assert_eq!(holder.get("/get_access").await, GRANTED);
    let mut channel = holder.connect().await;

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(!server.arbiter.snapshot().await.unwrap().held);

    let reply = call(
        &mut channel,
        r#"{"jsonrpc":"2.0","method":"add","id":2,"params":[2,3]}"#,
    )
    .await;
    assert_eq!(reply, r#"{"jsonrpc":"2.0","result":5,"id":2}"#);
    assert!(server.arbiter.snapshot().await.unwrap().held);
}

#[tokio::test]
async fn test_reacquire_limit_closes_channel() {
    let server = start(short_lease().with_reacquire_limit(Some(0))).await;
    let mut holder = Browser::new(&server);
    assert_eq!(holder.get("/get_access").await, GRANTED);
    let mut channel = holder.connect().await;

    tokio::time::sleep(Duration::from_millis(700)).await;

    channel
        .send(Message::Text(r#"{"jsonrpc":"2.0","method":"add","id":1,"params":[1,1]}"#.to_string()))
        .await
        .unwrap();
    assert_eq!(close_code(&mut channel).await, 4001);
}

#[tokio::test]
async fn test_long_call_does_not_expire_lease() {
    let server = start(short_lease()).await;
    let mut holder = Browser::new(&server);
    assert_eq!(holder.get("/get_access").await, GRANTED);
    let mut channel = holder.connect().await;

    // Sleeps for longer than the lease while the call is outstanding
    let reply = call(
        &mut channel,
        r#"{"jsonrpc":"2.0","method":"sleep","id":4,"params":[0.8]}"#,
    )
    .await;
    assert_eq!(reply, r#"{"jsonrpc":"2.0","result":0.8,"id":4}"#);

    let mut other = Browser::new(&server);
    assert_eq!(other.get("/get_access").await, BUSY);
}

#[tokio::test]
async fn test_holder_that_stops_reading_loses_lease() {
    let server = start(short_lease()).await;
    let mut holder = Browser::new(&server);
    assert_eq!(holder.get("/get_access").await, GRANTED);
    let mut channel = holder.connect().await;

    // Keep asking for large replies without ever reading one, until the
    // socket buffers fill and the server can no longer deliver.
    let payload = "x".repeat(256 * 1024);
    let flood = tokio::spawn(async move {
        for id in 0..400 {
            let request = json!({"jsonrpc": "2.0", "method": "echo", "id": id, "params": [payload]});
            if channel.send(Message::Text(request.to_string())).await.is_err() {
                break;
            }
        }
        channel
    });

    let mut next = Browser::new(&server);
    let reclaimed = grant_within(&mut next, Duration::from_secs(10)).await;
    flood.abort();
    assert!(reclaimed, "a holder that stopped reading kept the resource");
}

#[tokio::test]
async fn test_calls_over_tls() {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let params = rcgen::CertificateParams::new(vec!["127.0.0.1".to_string()]).unwrap();
    let cert = params.self_signed(&key_pair).unwrap();

    let mut cert_file = tempfile::NamedTempFile::new().unwrap();
    cert_file.write_all(cert.pem().as_bytes()).unwrap();
    let mut key_file = tempfile::NamedTempFile::new().unwrap();
    key_file.write_all(key_pair.serialize_pem().as_bytes()).unwrap();

    let options = ServerOptions::new("127.0.0.1", 0, demo::instrument()).with_tls(TlsFiles {
        cert: cert_file.path().to_path_buf(),
        key: key_file.path().to_path_buf(),
    });
    let server = start_server(options).await.expect("TLS server should start");
    assert!(server.is_secure());
    assert_eq!(server.channel_path, "/wss");

    let mut browser = Browser::trusting(&server, &cert);
    assert_eq!(browser.get("/get_access").await, GRANTED);
    let mut channel = browser.connect().await;
    let reply = call(
        &mut channel,
        r#"{"jsonrpc":"2.0","method":"add","id":1,"params":[40,2]}"#,
    )
    .await;
    assert_eq!(reply, r#"{"jsonrpc":"2.0","result":42,"id":1}"#);
}

#[tokio::test]
async fn test_login() {
    let server = start(ServerConfig::default()).await;
    let mut browser = Browser::new(&server);

    assert_eq!(browser.get("/login").await, "login error");
    assert_eq!(browser.login("operator", "wrong").await, "login error");
    assert_eq!(browser.login("nobody", "").await, "login error");

    let id = browser.session_id().expect("session cookie issued");
    assert_eq!(server.state().sessions.authenticated(id).await, None);

    assert_eq!(browser.login("operator", "s3cret").await, "logged in");
    assert_eq!(
        server.state().sessions.authenticated(id).await.as_deref(),
        Some("operator")
    );
}
