#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use parking_lot::Mutex;
use quality_core::{
    load_layers, ColorScale, LayerManager, LayerSpec, PropertyKeys, ReportClient, ReportSource,
    TopicCatalogue, ViewerSession, DEFAULT_REPORT_TIMEOUT,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn fixture_path(relative: &str) -> PathBuf {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative);
    debug_assert!(path.exists(), "missing fixture at {}", path.display());
    path
}

pub fn fixture_layers() -> Vec<LayerSpec> {
    vec![
        LayerSpec::new(
            "regions",
            fixture_path("layers/regions.geojson").display().to_string(),
        ),
        LayerSpec::new(
            "districts",
            fixture_path("layers/districts.geojson").display().to_string(),
        ),
    ]
}

pub fn heidelberg_box() -> geojson::Geometry {
    quality_core::default_fallback_polygon()
}

pub async fn fixture_session() -> anyhow::Result<ViewerSession> {
    let http = reqwest::Client::new();
    let loaded = load_layers(&http, &fixture_layers()).await?;
    let layers = LayerManager::build(loaded, &ColorScale::default(), PropertyKeys::default());
    Ok(ViewerSession::new(
        layers,
        TopicCatalogue::default(),
        heidelberg_box(),
    ))
}

pub fn fixture_client(report: &str) -> ReportClient {
    ReportClient::new(
        reqwest::Client::new(),
        ReportSource::Fixture(fixture_path(report)),
        DEFAULT_REPORT_TIMEOUT,
    )
}

pub fn endpoint_client(base_url: &str, timeout: Duration) -> ReportClient {
    ReportClient::new(
        reqwest::Client::new(),
        ReportSource::Endpoint {
            base_url: base_url.to_string(),
            report_name: "minimal".to_string(),
        },
        timeout,
    )
}

#[derive(Debug, Clone)]
pub enum StubReply {
    Body(String),
    Status(u16),
    Delayed(Duration, String),
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub body: String,
}

/// Minimal HTTP/1.1 server: one request per connection, replies chosen by
/// path prefix, 404 otherwise.
pub struct StubServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(routes: Vec<(&str, StubReply)>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let routes: Arc<Vec<(String, StubReply)>> = Arc::new(
            routes
                .into_iter()
                .map(|(prefix, reply)| (prefix.to_string(), reply))
                .collect(),
        );

        let accept_hits = Arc::clone(&hits);
        let accept_requests = Arc::clone(&requests);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_hits.fetch_add(1, Ordering::SeqCst);
                let routes = Arc::clone(&routes);
                let requests = Arc::clone(&accept_requests);
                tokio::spawn(async move {
                    let _ = serve_connection(stream, &routes, &requests).await;
                });
            }
        });

        Ok(Self {
            base_url,
            hits,
            requests,
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    routes: &[(String, StubReply)],
    requests: &Mutex<Vec<RecordedRequest>>,
) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(position) = find_header_end(&buffer) {
            break position;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let body_start = header_end + 4;
    while buffer.len() < body_start + content_length {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
    let body_end = buffer.len().min(body_start + content_length);
    let body = String::from_utf8_lossy(&buffer[body_start.min(body_end)..body_end]).to_string();

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    requests.lock().push(RecordedRequest {
        method,
        target: target.clone(),
        body,
    });

    let reply = routes
        .iter()
        .find(|(prefix, _)| target.starts_with(prefix.as_str()))
        .map(|(_, reply)| reply.clone())
        .unwrap_or(StubReply::Status(404));
    let (status, payload) = match reply {
        StubReply::Body(payload) => (200, payload),
        StubReply::Status(status) => (status, String::new()),
        StubReply::Delayed(delay, payload) => {
            tokio::time::sleep(delay).await;
            (200, payload)
        }
    };
    let response = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        reason(status),
        payload.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

pub fn read_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative)).unwrap_or_default()
}
