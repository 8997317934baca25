use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use deferred_server::config::{Config, EnvMsDuration};
use deferred_server::server::serve;

pub fn config_for(upstream_url: String) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        upstream_url,
        retry_after: EnvMsDuration(Duration::from_millis(50)),
        timeout_after: EnvMsDuration(Duration::from_secs(5)),
        request_timeout: EnvMsDuration(Duration::from_secs(1)),
        give_up_after: None,
        export_prometheus: false,
    }
}

/// Nothing listens there, so fetching from it always fails.
pub fn unreachable_upstream() -> String {
    "http://127.0.0.1:1/".to_string()
}

pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    pub async fn for_config(config: Config) -> ServerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        tokio::spawn(async move {
            serve(config, listener, async move { notify.notified().await }).await
        });
        ServerHandle { addr, shutdown }
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("http://{:?}{}", self.addr, path))
            .send()
            .await
            .expect("failed to send request")
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}

/// An upstream answering 500 to its first `failures` requests, then serving
/// `body` as plain text.
pub struct Upstream {
    pub addr: SocketAddr,
    pub requests: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct UpstreamState {
    requests: Arc<AtomicUsize>,
    failures: usize,
    body: &'static str,
}

async fn document(State(state): State<UpstreamState>) -> impl IntoResponse {
    let seen = state.requests.fetch_add(1, Ordering::SeqCst);
    if seen < state.failures {
        return (StatusCode::INTERNAL_SERVER_ERROR, "warming up").into_response();
    }
    ([(header::CONTENT_TYPE, "text/plain")], state.body).into_response()
}

impl Upstream {
    pub async fn serving(body: &'static str, failures: usize) -> Upstream {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));

        let app = Router::new()
            .route("/", get(document))
            .with_state(UpstreamState {
                requests: requests.clone(),
                failures,
                body,
            });
        tokio::spawn(async move { axum::serve(listener, app).await });

        Upstream { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{:?}/", self.addr)
    }
}
