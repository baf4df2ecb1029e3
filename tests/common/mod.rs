//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use weather_gateway::store::{Clock, ManualClock, MemoryStore, Store};
use weather_gateway::{GatewayConfig, HttpServer, Shutdown};

/// Handle to a running mock weather provider.
pub struct MockProvider {
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Start a provider that answers every forecast request through `f`.
///
/// `f` receives the `city` query parameter and returns a status code and body.
/// Each response is delayed by `delay`.
pub async fn start_mock_provider<F>(delay: Duration, f: F) -> MockProvider
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let f = Arc::new(f);

    let counter = calls.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        handle_connection(socket, delay, counter, f).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockProvider { addr, calls }
}

async fn handle_connection<F>(
    mut socket: TcpStream,
    delay: Duration,
    counter: Arc<AtomicUsize>,
    f: Arc<F>,
) where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }

    let head = String::from_utf8_lossy(&buf);
    let target = head.split_whitespace().nth(1).unwrap_or("/");
    let city = query_param(target, "city").unwrap_or_default();

    counter.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(delay).await;
    let (status, body) = f(&city);

    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn query_param(target: &str, name: &str) -> Option<String> {
    let query = target.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.replace("%20", " ").replace('+', " "))
    })
}

/// A full day of provider data for `name`.
pub fn forecast_json(name: &str, country: &str) -> String {
    let hourly: Vec<Value> = (0..24)
        .map(|h| {
            json!({
                "hour": h,
                "time": format!("2024-05-01T{h:02}:00:00Z"),
                "temp": format!("{:.1}°C", 12.0 + f64::from(h) * 0.25),
                "feels_like": format!("{:.1}°C", 11.0 + f64::from(h) * 0.25),
                "condition": if (6..9).contains(&h) { "Fog" } else { "Partly cloudy" },
                "humidity": 70,
                "wind_kph": 9.0,
                "wind_degree": 90,
                "pressure_mb": 1012.0,
                "chance_of_rain": 10,
                "uv": 2.0
            })
        })
        .collect();

    json!({
        "location": {
            "name": name,
            "country": country,
            "lat": 35.6762,
            "lon": 139.6503,
            "tz_offset_seconds": 32400
        },
        "astro": {
            "sunrise": "2024-05-01T04:45:00Z",
            "sunset": "2024-05-01T18:25:00Z"
        },
        "hourly": hourly
    })
    .to_string()
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap()
}

/// Gateway config pointing at `provider` with fast retries.
pub fn config_for(provider: &MockProvider) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.base_url = provider.base_url();
    config.upstream.api_key = "test-key".into();
    config.retries.max_attempts = 2;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 20;
    config.observability.metrics_enabled = false;
    config
}

/// A gateway served on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub clock: Arc<ManualClock>,
    pub store: Arc<dyn Store>,
    pub state: weather_gateway::http::AppState,
    pub config_updates: mpsc::UnboundedSender<GatewayConfig>,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> (u16, Value) {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .unwrap();
        let res = client.get(self.url(path)).send().await.expect("gateway unreachable");
        let status = res.status().as_u16();
        (status, res.json().await.unwrap())
    }
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let clock = Arc::new(ManualClock::new(start_time()));
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new(clock.clone()));
    let dyn_clock: Arc<dyn Clock> = clock.clone();

    let server = HttpServer::new(config, store.clone(), dyn_clock).unwrap();
    let state = server.state();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, rx) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx, server_shutdown).await;
    });

    TestGateway {
        addr,
        clock,
        store,
        state,
        config_updates,
        shutdown,
    }
}
