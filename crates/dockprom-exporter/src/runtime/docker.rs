//! Docker Engine client over HTTP/1.1 (Unix socket or TCP).
//!
//! Every request opens its own connection; a stats stream keeps its
//! connection for as long as the stream is polled and closes it on drop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, StreamExt};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use dockprom_core::error::{DockpromError, ErrorKind, Result};
use dockprom_core::stats::{RawStats, Target};

use super::api::{ContainerInspect, ContainerSummary, EngineError};
use super::{ContainerRuntime, StatsStream};
use crate::config::{ExporterConfig, StatsMode};

/// Where the engine listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    /// Parse a `DOCKER_HOST` value (`unix:///path` or `tcp://host:port`).
    pub fn parse(host: &str) -> Result<Self> {
        if let Some(path) = host.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(DockpromError::Config("docker_host has an empty socket path".into()));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = host.strip_prefix("tcp://") {
            let addr = addr.trim_end_matches('/');
            if addr.is_empty() {
                return Err(DockpromError::Config("docker_host has an empty address".into()));
            }
            return Ok(Endpoint::Tcp(addr.to_string()));
        }
        Err(DockpromError::Config(format!("unsupported docker_host {host:?}")))
    }
}

#[derive(Clone)]
pub struct DockerRuntime {
    endpoint: Arc<Endpoint>,
    mode: StatsMode,
    poll_interval: Duration,
}

impl DockerRuntime {
    pub fn new(endpoint: Endpoint, mode: StatsMode, poll_interval: Duration) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
            mode,
            poll_interval,
        }
    }

    pub fn from_config(cfg: &ExporterConfig) -> Result<Self> {
        let endpoint = Endpoint::parse(&cfg.docker_host)?;
        Ok(Self::new(endpoint, cfg.stats_mode, cfg.refresh_interval()))
    }

    async fn get(&self, path: &str) -> Result<Response<Incoming>> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(header::HOST, "docker")
            .header(header::ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|e| DockpromError::Internal(format!("build request {path}: {e}")))?;

        match self.endpoint.as_ref() {
            #[cfg(unix)]
            Endpoint::Unix(socket) => {
                let io = tokio::net::UnixStream::connect(socket)
                    .await
                    .map_err(|e| DockpromError::Runtime(format!("connect {}: {e}", socket.display())))?;
                request_over(io, req).await
            }
            #[cfg(not(unix))]
            Endpoint::Unix(socket) => Err(DockpromError::Runtime(format!(
                "unix sockets are not supported on this platform ({})",
                socket.display()
            ))),
            Endpoint::Tcp(addr) => {
                let io = TcpStream::connect(addr.as_str())
                    .await
                    .map_err(|e| DockpromError::Runtime(format!("connect {addr}: {e}")))?;
                request_over(io, req).await
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.get(path).await?;
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| DockpromError::Runtime(format!("read {path}: {e}")))?
            .to_bytes();
        check_status(status, path, &body)?;
        serde_json::from_slice(&body).map_err(|e| DockpromError::Decode(format!("{path}: {e}")))
    }

    /// Open a streaming response and hand back its body.
    async fn open_stream(&self, path: &str) -> Result<Incoming> {
        let resp = self.get(path).await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.into_body());
        }
        let body = resp
            .into_body()
            .collect()
            .await
            .map(|b| b.to_bytes())
            .unwrap_or_default();
        check_status(status, path, &body)?;
        Err(DockpromError::Runtime(format!("{path}: unexpected status {status}")))
    }

    fn stream_stats(&self, id: &str) -> StatsStream {
        let init = StreamState::Connect {
            rt: self.clone(),
            path: format!("/containers/{}/stats?stream=true", urlencoding::encode(id)),
        };

        stream::unfold(init, |state| async move {
            match state {
                StreamState::Done => None,
                StreamState::Connect { rt, path } => match rt.open_stream(&path).await {
                    Ok(body) => next_snapshot(body, BytesMut::new()).await,
                    Err(e) => Some((Err(e), StreamState::Done)),
                },
                StreamState::Reading { body, buf } => next_snapshot(body, buf).await,
            }
        })
        .boxed()
    }

    fn poll_stats(&self, id: &str) -> StatsStream {
        let rt = self.clone();
        let path = format!("/containers/{}/stats?stream=false", urlencoding::encode(id));

        // state: Some(first_request) while the target exists
        stream::unfold(Some(true), move |state| {
            let rt = rt.clone();
            let path = path.clone();
            async move {
                let first = state?;
                if !first {
                    tokio::time::sleep(rt.poll_interval).await;
                }
                match rt.get_json::<RawStats>(&path).await {
                    Ok(s) => Some((Ok(s), Some(false))),
                    Err(e) if e.kind() == ErrorKind::NotFound => Some((Err(e), None)),
                    Err(e) => Some((Err(e), Some(false))),
                }
            }
        })
        .boxed()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_targets(&self, marker: &str) -> Result<Vec<Target>> {
        let filters = serde_json::json!({ "label": [marker] }).to_string();
        let path = format!("/containers/json?filters={}", urlencoding::encode(&filters));
        let containers: Vec<ContainerSummary> = self.get_json(&path).await?;
        Ok(containers.into_iter().map(Target::from).collect())
    }

    async fn get_target(&self, id: &str) -> Result<Target> {
        let path = format!("/containers/{}/json", urlencoding::encode(id));
        let inspect: ContainerInspect = self.get_json(&path).await?;
        if !inspect.is_running() {
            return Err(DockpromError::NotFound(format!("container {id} is not running")));
        }
        Ok(inspect.into_target())
    }

    fn stats(&self, id: &str) -> StatsStream {
        match self.mode {
            StatsMode::Stream => self.stream_stats(id),
            StatsMode::Poll => self.poll_stats(id),
        }
    }
}

enum StreamState {
    Connect { rt: DockerRuntime, path: String },
    Reading { body: Incoming, buf: BytesMut },
    Done,
}

/// Read frames until one newline-terminated JSON document is buffered.
async fn next_snapshot(mut body: Incoming, mut buf: BytesMut) -> Option<(Result<RawStats>, StreamState)> {
    loop {
        if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
            let line = buf.split_to(pos + 1);
            let doc = trim_line(&line);
            if doc.is_empty() {
                continue;
            }
            let item = RawStats::from_slice(doc);
            return Some((item, StreamState::Reading { body, buf }));
        }

        match body.frame().await {
            Some(Ok(frame)) => {
                if let Ok(data) = frame.into_data() {
                    buf.extend_from_slice(&data);
                }
            }
            Some(Err(e)) => {
                return Some((
                    Err(DockpromError::Runtime(format!("stats stream: {e}"))),
                    StreamState::Done,
                ));
            }
            None => {
                let doc = trim_line(&buf);
                if doc.is_empty() {
                    return None;
                }
                return Some((RawStats::from_slice(doc), StreamState::Done));
            }
        }
    }
}

fn trim_line(b: &[u8]) -> &[u8] {
    let start = b.iter().position(|c| !c.is_ascii_whitespace()).unwrap_or(b.len());
    let end = b.iter().rposition(|c| !c.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &b[start..end]
}

fn check_status(status: StatusCode, path: &str, body: &[u8]) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    let message = serde_json::from_slice::<EngineError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned());
    if status == StatusCode::NOT_FOUND {
        return Err(DockpromError::NotFound(format!("{path}: {message}")));
    }
    Err(DockpromError::Runtime(format!("{path}: {status} {message}")))
}

async fn request_over<S>(io: S, req: Request<Empty<Bytes>>) -> Result<Response<Incoming>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = http1::handshake(TokioIo::new(io))
        .await
        .map_err(|e| DockpromError::Runtime(format!("engine handshake: {e}")))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "engine connection closed with error");
        }
    });

    sender
        .send_request(req)
        .await
        .map_err(|e| DockpromError::Runtime(format!("engine request: {e}")))
}
