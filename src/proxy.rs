/* src/proxy.rs */

// Live-reload proxy in front of the backend dev server. Forwards everything
// to localhost:P from P+1, pinning the forwarded Host header to the proxy's
// own origin so backend host detection matches the port clients actually use.

use std::path::Path;

use anyhow::{Context, Result};
use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use notify::RecursiveMode;
use notify::Watcher as _;
use tokio::sync::broadcast;
use tower_livereload::LiveReloadLayer;

use crate::config::PaveConfig;
use crate::ui::{self, YELLOW};
use crate::watch;

#[derive(Clone)]
pub(crate) struct ProxyState {
  target_origin: String,
  forwarded_host: String,
  client: reqwest::Client,
}

impl ProxyState {
  pub(crate) fn new(target_origin: String, forwarded_host: String) -> Self {
    Self { target_origin, forwarded_host, client: reqwest::Client::new() }
  }
}

pub(crate) fn forwarded_host(port: u16) -> String {
  format!("localhost:{}", port + 1)
}

/// Forward the request to the backend, streaming the body in both
/// directions (important for SSE and uploads).
async fn proxy_handler(
  State(state): State<ProxyState>,
  req: Request,
) -> Result<Response, StatusCode> {
  let path_and_query = req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or(req.uri().path());
  let url = format!("{}{}", state.target_origin, path_and_query);

  let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
    .map_err(|_| StatusCode::BAD_REQUEST)?;

  let mut builder = state.client.request(method, &url);
  for (key, value) in req.headers() {
    // host is rewritten below; transfer-encoding is re-framed by the client
    if key != "host" && key != "transfer-encoding" {
      builder = builder.header(key.as_str(), value.as_bytes());
    }
  }
  builder = builder.header("host", &state.forwarded_host);

  let upstream = builder
    .body(reqwest::Body::wrap_stream(req.into_body().into_data_stream()))
    .send()
    .await
    .map_err(|_| StatusCode::BAD_GATEWAY)?;

  let status =
    StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
  let mut response = Response::builder().status(status);
  for (key, value) in upstream.headers() {
    response = response.header(key.as_str(), value.as_bytes());
  }

  let body = Body::from_stream(upstream.bytes_stream());
  response.body(body).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub(crate) fn router(state: ProxyState) -> Router {
  Router::new().fallback(proxy_handler).with_state(state)
}

/// Serve the proxy on P+1 with two independent reload triggers: changes
/// observed under the public directory, and explicit signals on the reload
/// bus from the script watcher.
pub async fn serve(base_dir: &Path, config: &PaveConfig, reload: broadcast::Sender<()>) -> Result<()> {
  let port = config.dev.port;
  let dev_port = port + 1;

  let livereload = LiveReloadLayer::new();
  let reloader = livereload.reloader();

  let public_dir = base_dir.join(&config.paths.public_dir);
  let (mut watcher, mut fs_rx) = watch::channel_watcher()?;
  watcher
    .watch(&public_dir, RecursiveMode::Recursive)
    .with_context(|| format!("failed to watch {}", public_dir.display()))?;
  let fs_reloader = reloader.clone();
  tokio::spawn(async move {
    while fs_rx.recv().await.is_some() {
      fs_reloader.reload();
    }
  });

  let mut bus = reload.subscribe();
  tokio::spawn(async move {
    loop {
      match bus.recv().await {
        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => reloader.reload(),
        Err(broadcast::error::RecvError::Closed) => break,
      }
    }
  });

  let state = ProxyState::new(format!("http://localhost:{port}"), forwarded_host(port));
  let app = router(state).layer(livereload);

  ui::tag("proxy", YELLOW, &format!(":{dev_port} \u{2192} :{port}"));
  let listener = tokio::net::TcpListener::bind(("0.0.0.0", dev_port))
    .await
    .with_context(|| format!("failed to bind port {dev_port}"))?;
  axum::serve(listener, app).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderMap;
  use axum::routing::{get, post};
  use tower::ServiceExt;

  async fn echo_host(headers: HeaderMap) -> String {
    headers.get("host").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string()
  }

  async fn spawn_backend() -> u16 {
    let app = Router::new().route("/", get(echo_host));
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    port
  }

  #[test]
  fn forwarded_host_is_target_plus_one() {
    assert_eq!(forwarded_host(3000), "localhost:3001");
    assert_eq!(forwarded_host(8080), "localhost:8081");
  }

  #[tokio::test]
  async fn host_header_rewritten_regardless_of_client_host() {
    let backend = spawn_backend().await;
    let state =
      ProxyState::new(format!("http://127.0.0.1:{backend}"), "localhost:3001".to_string());
    let app = router(state);

    let req = Request::builder()
      .uri("/")
      .header("host", "example.com")
      .body(Body::empty())
      .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"localhost:3001");
  }

  #[tokio::test]
  async fn proxy_forwards_other_headers() {
    async fn echo_header(headers: HeaderMap) -> String {
      headers.get("x-trace").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string()
    }
    let app = Router::new().route("/", get(echo_header));
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let backend_port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });

    let state =
      ProxyState::new(format!("http://127.0.0.1:{backend_port}"), "localhost:3001".to_string());
    let req = Request::builder()
      .uri("/")
      .header("x-trace", "carried")
      .body(Body::empty())
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"carried");
  }

  #[tokio::test]
  async fn proxy_streams_the_request_body_to_the_backend() {
    async fn echo_body(body: String) -> String {
      body
    }
    let app = Router::new().route("/", post(echo_body));
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let backend_port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });

    let state =
      ProxyState::new(format!("http://127.0.0.1:{backend_port}"), "localhost:3001".to_string());
    let req = Request::builder()
      .method("POST")
      .uri("/")
      .body(Body::from("upload payload"))
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"upload payload");
  }
}
