//! Minimal Prometheus text-exposition endpoint, spawned alongside the
//! CLI so an operator can scrape `csdp_*` counters/histograms during a
//! run.

use prometheus::{Encoder, TextEncoder};
use structopt::StructOpt;
use tracing::info;

#[derive(Debug, Clone, StructOpt)]
pub struct Options {
    /// Address to serve /metrics on. Set to an empty string to disable.
    #[structopt(long, env = "METRICS_ADDR", default_value = "0.0.0.0:9898")]
    pub metrics_addr: String,
}

pub async fn serve(options: Options) -> anyhow::Result<()> {
    if options.metrics_addr.is_empty() {
        return Ok(());
    }
    let addr: std::net::SocketAddr = options.metrics_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "serving prometheus metrics");
    loop {
        let (mut socket, _) = listener.accept().await?;
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let metric_families = prometheus::gather();
            let mut buffer = Vec::new();
            let encoder = TextEncoder::new();
            if encoder.encode(&metric_families, &mut buffer).is_ok() {
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
                    buffer.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.write_all(&buffer).await;
            }
        });
    }
}
