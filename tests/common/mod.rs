//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use upload_proxy::http::{AppState, HttpServer};
use upload_proxy::resolver::{
    BackendResolver, FixedUrlResolver, MemoryTargetStore, TargetKey, TargetRecord,
};
use upload_proxy::tls::{ClientCreator, TlsClientManager, TlsError};
use upload_proxy::token::{
    Claim, GroupVersionResource, JwtTokenValidator, Operation, TokenIssuer, DEFAULT_TOKEN_TTL,
};

pub const SIGNING_KEY: &[u8] = include_bytes!("../fixtures/token_signing_key.pem");
pub const VERIFY_KEY: &[u8] = include_bytes!("../fixtures/token_verify_key.pem");

pub const NAMESPACE: &str = "default";
pub const NAME: &str = "testpvc";

/// A request as the mock backend received it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Raw TCP HTTP/1.1 backend answering every request with a fixed status
/// and body, recording what it received.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockBackend {
    pub async fn start(status: u16, body: &'static str) -> Self {
        Self::start_with_headers(status, &[], body).await
    }

    /// Like [`MockBackend::start`], adding `headers` to every response.
    pub async fn start_with_headers(status: u16, headers: &[(&str, &str)], body: &'static str) -> Self {
        let extra: String = headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}\r\n"))
            .collect();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((mut socket, _)) => {
                        let recorded = recorded.clone();
                        let extra = extra.clone();
                        tokio::spawn(async move {
                            let Some(request) = read_request(&mut socket).await else {
                                return;
                            };
                            let is_head = request.method == "HEAD";
                            recorded.lock().unwrap().push(request);

                            let payload = if is_head { "" } else { body };
                            let response = format!(
                                "HTTP/1.1 {} Mock\r\nContent-Length: {}\r\nX-Backend: mock\r\n{}Connection: close\r\n\r\n{}",
                                status,
                                if is_head { body.len() } else { payload.len() },
                                extra,
                                payload
                            );
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.shutdown().await;
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        });
                    }
                    Err(_) => break,
                }
            }
        });

        Self { addr, requests }
    }

    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }

    pub fn received(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let mut body = buf[header_end..].to_vec();
    if let Some(len) = headers.get("content-length").and_then(|v| v.parse::<usize>().ok()) {
        while body.len() < len {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body.truncate(len);
    } else if headers
        .get("transfer-encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
    {
        while !body.ends_with(b"0\r\n\r\n") {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body = decode_chunked(&body);
    }

    Some(Recorded {
        method,
        path,
        headers,
        body,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn decode_chunked(mut raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(line_end) = find(raw, b"\r\n") {
        let size_str = String::from_utf8_lossy(&raw[..line_end]);
        let size = usize::from_str_radix(size_str.split(';').next().unwrap_or("0").trim(), 16)
            .unwrap_or(0);
        if size == 0 {
            break;
        }
        let start = line_end + 2;
        out.extend_from_slice(&raw[start..start + size]);
        raw = &raw[start + size + 2..];
    }
    out
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Backend that accepts one connection, reads it without ever answering,
/// and reports the bytes seen once the connection ends.
pub struct StalledBackend {
    pub addr: SocketAddr,
    /// Fires when `marker` has arrived.
    pub marker_seen: tokio::sync::oneshot::Receiver<()>,
    /// Fires with everything read when the peer closes or resets.
    pub closed: tokio::sync::oneshot::Receiver<Vec<u8>>,
}

impl StalledBackend {
    pub async fn start(marker: &'static [u8]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, marker_seen) = tokio::sync::oneshot::channel();
        let (closed_tx, closed) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut seen_tx = Some(seen_tx);
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        buf.extend_from_slice(&chunk[..n]);
                        if find(&buf, marker).is_some() {
                            if let Some(tx) = seen_tx.take() {
                                let _ = tx.send(());
                            }
                        }
                    }
                }
            }
            let _ = closed_tx.send(buf);
        });

        Self {
            addr,
            marker_seen,
            closed,
        }
    }

    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }
}

/// Plain HTTP client, for backends that do not speak TLS.
pub struct PlainClient;

impl ClientCreator for PlainClient {
    fn create_client(&self) -> Result<reqwest::Client, TlsError> {
        Ok(reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?)
    }
}

pub fn issuer() -> TokenIssuer {
    TokenIssuer::from_private_key_pem(SIGNING_KEY, DEFAULT_TOKEN_TTL).unwrap()
}

pub fn token(operation: Operation) -> String {
    issuer()
        .issue(&Claim::upload(operation, NAMESPACE, NAME))
        .unwrap()
}

pub fn token_for(claim: &Claim) -> String {
    issuer().issue(claim).unwrap()
}

pub fn target() -> TargetKey {
    TargetKey::new(NAMESPACE, NAME, GroupVersionResource::persistent_volume_claims())
}

/// Proxy wired to an in-memory state store and a fixed backend.
pub struct Harness {
    pub store: Arc<MemoryTargetStore>,
    pub clients: Arc<TlsClientManager>,
    pub state: AppState,
    pub router: Router,
}

impl Harness {
    pub fn new(backend: Url) -> Self {
        Self::with_creator(backend, Arc::new(PlainClient))
    }

    pub fn with_creator(backend: Url, creator: Arc<dyn ClientCreator>) -> Self {
        let store = Arc::new(MemoryTargetStore::new());
        let clients = Arc::new(TlsClientManager::new(creator).unwrap());
        let resolver = BackendResolver::new(store.clone(), Arc::new(FixedUrlResolver::new(backend)));
        let validator = JwtTokenValidator::from_public_key_pem(VERIFY_KEY, 0).unwrap();
        let state = AppState::new(Arc::new(validator), resolver, clients.clone(), "Bearer");

        Self {
            store,
            clients,
            router: HttpServer::build_router(state.clone()),
            state,
        }
    }

    /// Harness whose single target is ready.
    pub fn ready(backend: Url) -> Self {
        let harness = Self::new(backend);
        harness.store.insert(target(), TargetRecord::ready());
        harness
    }
}
