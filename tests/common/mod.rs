//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cloudfauxnt::config::{KeyConfig, OriginConfig, ProxyConfig};
use cloudfauxnt::http::HttpServer;
use cloudfauxnt::lifecycle::Shutdown;
use cloudfauxnt::security::UrlSigner;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const PUBLIC_PEM: &str = include_str!("../fixtures/public.pem");
pub const PRIVATE_PEM: &str = include_str!("../fixtures/private.pem");
pub const OTHER_PRIVATE_PEM: &str = include_str!("../fixtures/other_private.pem");
pub const KEY_PAIR_ID: &str = "APKATESTKEY";

/// Request heads received by a mock origin, in arrival order.
#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<String>>>);

impl Recorded {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<String> {
        self.0.lock().unwrap().last().cloned()
    }

    /// Value of `name` in the most recent request head, case-insensitive.
    pub fn last_header(&self, name: &str) -> Option<String> {
        let head = self.last()?;
        head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim().to_string())
        })
    }

    /// Request line of the most recent request, e.g. `GET /a.txt HTTP/1.1`.
    pub fn last_request_line(&self) -> Option<String> {
        self.last()?.lines().next().map(str::to_string)
    }

    fn push(&self, head: String) {
        self.0.lock().unwrap().push(head);
    }
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Start a mock origin answering every request with `extra_headers` and `body`.
pub async fn start_mock_backend(body: &'static str, extra_headers: &'static str) -> (SocketAddr, Recorded) {
    start_programmable_backend(move || async move { (200, body.to_string(), extra_headers) }).await
}

/// Start a programmable mock origin on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, Recorded)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = (u16, String, &'static str)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Recorded::default();
    let f = Arc::new(f);

    let log = recorded.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let log = log.clone();
                    tokio::spawn(async move {
                        log.push(read_head(&mut socket).await);
                        let (status, body, extra_headers) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            206 => "206 Partial Content",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            extra_headers,
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, recorded)
}

/// Origin that accepts connections and reads requests but answers only after `delay`.
pub async fn start_slow_backend(delay: Duration) -> (SocketAddr, Recorded) {
    start_programmable_backend(move || async move {
        tokio::time::sleep(delay).await;
        (200, "late".to_string(), "")
    })
    .await
}

/// Origin that records each request but never answers. The counter goes up
/// once the edge closes its side of a connection.
pub async fn start_hanging_backend() -> (SocketAddr, Recorded, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Recorded::default();
    let closed = Arc::new(AtomicUsize::new(0));

    let log = recorded.clone();
    let hung_up = closed.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let log = log.clone();
            let hung_up = hung_up.clone();
            tokio::spawn(async move {
                log.push(read_head(&mut socket).await);
                let mut chunk = [0u8; 256];
                while let Ok(n) = socket.read(&mut chunk).await {
                    if n == 0 {
                        break;
                    }
                }
                hung_up.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    (addr, recorded, closed)
}

/// Address with nothing listening on it.
pub fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub fn origin(name: &str, addr: SocketAddr, patterns: &[&str], require_signature: bool) -> OriginConfig {
    OriginConfig {
        name: name.into(),
        url: format!("http://{}", addr),
        path_patterns: patterns.iter().map(|p| p.to_string()).collect(),
        require_signature: Some(require_signature),
        strip_prefix: None,
        target_prefix: None,
        default_root_object: None,
        strip_signature_params: false,
    }
}

/// Register the fixture key pair under [`KEY_PAIR_ID`].
pub fn with_test_key(config: &mut ProxyConfig) {
    config.signing.keys.push(KeyConfig {
        key_pair_id: KEY_PAIR_ID.into(),
        public_key_path: None,
        public_key_pem: Some(PUBLIC_PEM.into()),
    });
}

pub fn signer() -> UrlSigner {
    UrlSigner::from_pem(PRIVATE_PEM, KEY_PAIR_ID).unwrap()
}

/// A running edge under test.
pub struct Edge {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl Edge {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for Edge {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Bind an ephemeral port, let `configure` finish the config, and serve it.
pub async fn start_edge(configure: impl FnOnce(&mut ProxyConfig, SocketAddr)) -> Edge {
    start_edge_with(configure, HttpServer::new).await
}

/// Like [`start_edge`], with control over how the server is built.
pub async fn start_edge_with<B, E>(configure: impl FnOnce(&mut ProxyConfig, SocketAddr), build: B) -> Edge
where
    B: FnOnce(ProxyConfig) -> Result<HttpServer, E>,
    E: std::fmt::Debug,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = ProxyConfig::default();
    config.server.bind_address = addr.to_string();
    configure(&mut config, addr);

    let server = build(config).unwrap();
    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    Edge {
        addr,
        shutdown,
        config_tx,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
