use crate::config::LOGGER;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use prometheus::{Encoder, TextEncoder};
use slog::info;
use std::convert::Infallible;
use std::net::SocketAddr;

/// HTTP exporter for the prometheus registry.
///
/// Serves the text encoding of every registered metric on any path.
pub struct PrometheusServer {
    listen_addr: String,
}

impl PrometheusServer {
    pub fn new(listen_addr: String) -> PrometheusServer {
        PrometheusServer { listen_addr }
    }

    pub async fn run(&self) -> crate::Result<()> {
        info!(LOGGER, "prometheus exporter listen on: {}", &self.listen_addr);

        let addr: SocketAddr = self.listen_addr.parse()?;
        let make_svc = make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(metric)) });

        Server::try_bind(&addr)?.serve(make_svc).await?;
        Ok(())
    }
}

async fn metric(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).unwrap();
    Ok(Response::new(Body::from(buffer)))
}
