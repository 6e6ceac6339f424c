//! Harness for end-to-end tests: boots a real gateway on an ephemeral port
//! against the fixture snapshot.

use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use arena_gateway::config::GatewayConfig;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const LOCAL_SECRET: &str = "smoke-secret";

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

pub fn fixture_snapshot() -> PathBuf {
    workspace_root().join("fixtures").join("arena_snapshot.json")
}

/// Local-auth config with the shared secret enabled; `extra` overrides.
pub fn local_config(extra: &[(&str, &str)]) -> GatewayConfig {
    let mut kv = HashMap::from([
        ("ARENA_BIND_ADDR".to_string(), "127.0.0.1:0".to_string()),
        (
            "ARENA_SNAPSHOT_PATH".to_string(),
            fixture_snapshot().to_string_lossy().to_string(),
        ),
        (
            "ARENA_PUBLIC_BASE_URL".to_string(),
            "http://arena.test".to_string(),
        ),
        (
            "ARENA_LOCAL_AUTH_SHARED_SECRET".to_string(),
            LOCAL_SECRET.to_string(),
        ),
    ]);
    for (key, value) in extra {
        kv.insert(key.to_string(), value.to_string());
    }
    GatewayConfig::from_kv(&kv).expect("gateway config should be valid")
}

/// A running gateway. Dropping it without calling [`Gateway::stop`] leaves
/// the task to die with the test runtime.
pub struct Gateway {
    pub addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl Gateway {
    pub async fn start(config: GatewayConfig) -> Self {
        let app = arena_gateway::http::router(config)
            .await
            .expect("gateway router should init");
        let (addr, shutdown, task) = spawn_server(app).await;
        let gateway = Self {
            addr,
            shutdown,
            task,
        };
        wait_for_healthz(&reqwest::Client::new(), gateway.addr).await;
        gateway
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

pub async fn spawn_server(
    app: Router,
) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local_addr should succeed");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    (addr, shutdown_tx, handle)
}

pub async fn wait_for_healthz(client: &reqwest::Client, addr: SocketAddr) {
    let url = format!("http://{}/healthz", addr);

    for _ in 0..50 {
        if let Ok(response) = client.get(&url).send().await
            && response.status().is_success()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    panic!("server did not become ready at {}", url);
}

/// Request builder preloaded with local-auth headers for `person_id`.
pub fn as_person(
    client: &reqwest::Client,
    method: reqwest::Method,
    url: String,
    person_id: i32,
) -> reqwest::RequestBuilder {
    client
        .request(method, url)
        .header("x-arena-local-auth-secret", LOCAL_SECRET)
        .header("x-arena-person-id", person_id.to_string())
}

struct TestWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut lock = self
            .buf
            .lock()
            .map_err(|_| std::io::Error::other("log mutex poisoned"))?;
        lock.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Installs a process-wide subscriber once and returns its capture buffer.
pub fn init_test_tracing() -> Arc<Mutex<Vec<u8>>> {
    static LOG_BUF: OnceLock<Arc<Mutex<Vec<u8>>>> = OnceLock::new();

    LOG_BUF
        .get_or_init(|| {
            let buf = Arc::new(Mutex::new(Vec::new()));
            let make_writer = {
                let buf = buf.clone();
                move || TestWriter { buf: buf.clone() }
            };

            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .with_ansi(false)
                .with_writer(make_writer)
                .finish();

            tracing::subscriber::set_global_default(subscriber)
                .expect("global tracing subscriber should be set once");

            buf
        })
        .clone()
}

pub fn captured_logs(buf: &Arc<Mutex<Vec<u8>>>) -> String {
    let lock = buf.lock().expect("log lock should be available");
    String::from_utf8_lossy(&lock).to_string()
}
