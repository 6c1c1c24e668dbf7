//! A minimal `/metrics` endpoint. Hand-rolled over a bare `TcpListener`
//! rather than pulling in a web framework — this crate exists to expose one
//! text response, not to host a product surface.

use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn render_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buf = Vec::with_capacity(4096);
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::error!(target = "telemetry", error = %e, "failed to encode metrics");
    }
    buf
}

fn respond(status_line: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

/// Serves `GET /metrics`, `GET /healthz`, and `GET /readyz` until the
/// listener is dropped or the process is asked to stop. Intended to be
/// spawned as its own task at node startup; errors binding the listener are
/// logged and the task simply returns.
pub async fn run_server(addr: SocketAddr) {
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(target = "telemetry", error = %e, "failed to bind metrics listener");
            return;
        }
    };
    tracing::info!(target = "telemetry", %addr, "metrics endpoint listening");

    loop {
        let (mut stream, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(target = "telemetry", error = %e, "failed to accept metrics connection");
                continue;
            }
        };

        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let n = match stream.read(&mut buf).await {
                Ok(n) => n,
                Err(_) => return,
            };
            let request = String::from_utf8_lossy(&buf[..n]);
            let first_line = request.lines().next().unwrap_or("");

            let response = if first_line.starts_with("GET /metrics") {
                respond("HTTP/1.1 200 OK", "text/plain; version=0.0.4", &render_metrics())
            } else if first_line.starts_with("GET /healthz") || first_line.starts_with("GET /readyz") {
                respond("HTTP/1.1 200 OK", "text/plain", b"OK")
            } else {
                respond("HTTP/1.1 404 Not Found", "text/plain", b"not found")
            };

            let _ = stream.write_all(&response).await;
        });
    }
}
