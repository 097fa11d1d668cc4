// External crates
use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    body::Incoming,
    header::{CONTENT_TYPE, HeaderValue},
    http::{Method, Request, Response, StatusCode},
    service::service_fn,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder as HyperServerBuilder,
};
use prometheus::{Encoder, TextEncoder};
use std::{convert::Infallible, io, net::SocketAddr};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::instrument;

/// Running `/metrics` listener. The accept loop lives on the runtime that
/// started it and stops when that runtime shuts down or on [`MetricsServer::stop`].
#[derive(Debug)]
pub struct MetricsServer {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MetricsServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

/// Bind the metrics listener and serve it in the background.
///
/// Binding happens before this returns, so a taken port surfaces here as an
/// error and the endpoint is reachable as soon as the call completes.
#[instrument(name = "metrics_server::start", skip_all, level = "debug")]
pub async fn start_metrics_server(addr: SocketAddr) -> io::Result<MetricsServer> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::debug!(
        metrics_endpoint = %local_addr,
        "Prometheus monitoring endpoint available at http://{local_addr}/metrics"
    );

    let task = tokio::spawn(accept_loop(listener));
    Ok(MetricsServer { local_addr, task })
}

async fn accept_loop(listener: TcpListener) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(connection) => connection,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to accept metrics connection");
                continue;
            }
        };

        let io = TokioIo::new(stream);
        tracing::trace!(peer = %peer, "Serving metrics connection");
        tokio::spawn(async move {
            if let Err(err) = HyperServerBuilder::new(TokioExecutor::new())
                .serve_connection(io, service_fn(route))
                .await
            {
                tracing::debug!(error = %err, "Metrics connection closed with error");
            }
        });
    }
}

async fn route(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => Ok(metrics_response()),
        _ => Ok(response(
            StatusCode::NOT_FOUND,
            "text/plain; charset=utf-8",
            b"Not Found".to_vec(),
        )),
    }
}

fn metrics_response() -> Response<Full<Bytes>> {
    let metric_families = prometheus::gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => response(StatusCode::OK, encoder.format_type(), buffer),
        Err(err) => {
            tracing::error!(error = %err, "Failed to encode prometheus metrics");
            response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain; charset=utf-8",
                err.to_string().into_bytes(),
            )
        }
    }
}

fn response(status: StatusCode, content_type: &str, body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(content_type) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::metrics::{INVOCATIONS_TOTAL, register_all};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        String::from_utf8_lossy(&raw).into_owned()
    }

    #[tokio::test]
    async fn serves_prometheus_text_on_metrics_path() {
        register_all();
        INVOCATIONS_TOTAL.inc();
        let server = start_metrics_server("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        let body = get(server.local_addr(), "/metrics").await;

        assert!(body.starts_with("HTTP/1.1 200 OK"));
        assert!(body.contains("datahub_actions_invocations_total"));
        server.stop();
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let server = start_metrics_server("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        let body = get(server.local_addr(), "/healthz").await;

        assert!(body.starts_with("HTTP/1.1 404 Not Found"));
        server.stop();
    }

    #[tokio::test]
    async fn taken_ports_fail_to_start() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();

        assert!(start_metrics_server(addr).await.is_err());
    }
}
