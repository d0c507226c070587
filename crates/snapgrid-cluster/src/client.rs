//! Minimal JSON-over-HTTP/1 client.
//!
//! One connection per request, bounded by a timeout covering connect,
//! handshake, and the full response body.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use snapgrid_state::MessageResponse;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("http: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Status and `message` of a peer's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonReply {
    pub status: http::StatusCode,
    pub message: String,
}

impl JsonReply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// POST `body` as JSON to `http://{addr}{path}`.
///
/// Non-2xx replies are returned, not treated as errors; callers decide.
pub async fn post_json<T: Serialize>(
    addr: &str,
    path: &str,
    body: &T,
    timeout: Duration,
) -> ClientResult<JsonReply> {
    let payload = Bytes::from(serde_json::to_vec(body)?);

    match tokio::time::timeout(timeout, send(addr, path, payload)).await {
        Ok(result) => result,
        Err(_) => {
            debug!(%addr, path, "request timed out");
            Err(ClientError::Timeout(format!("{addr}{path}")))
        }
    }
}

async fn send(addr: &str, path: &str, payload: Bytes) -> ClientResult<JsonReply> {
    let stream = tokio::net::TcpStream::connect(addr)
        .await
        .map_err(|source| ClientError::Connect {
            addr: addr.to_string(),
            source,
        })?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method(http::Method::POST)
        .uri(path)
        .header(http::header::HOST, addr)
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::USER_AGENT, "snapgrid/0.1")
        .body(Full::new(payload))?;

    let resp = sender.send_request(req).await?;
    let status = resp.status();
    let body = resp.into_body().collect().await?.to_bytes();

    // Peers that answer with plain text still get their text surfaced.
    let message = match serde_json::from_slice::<MessageResponse>(&body) {
        Ok(reply) => reply.message,
        Err(_) => String::from_utf8_lossy(&body).into_owned(),
    };

    debug!(%addr, path, %status, %message, "peer replied");
    Ok(JsonReply { status, message })
}
