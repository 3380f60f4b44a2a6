use common::configuration::Configuration;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use relay::app::AppContext;
use relay::handlers::route;
use relay::utils::tracing::init_logging;
use std::env;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

const DEFAULT_CONFIG_PATH: &str = "./relay_config.yaml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging();

    let config_path =
        env::var("RELAY_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Configuration::load(Path::new(&config_path))?;
    info!(path = %config_path, "loaded relay configuration");

    let bind_address = env::var("BIND_ADDRESS").unwrap_or_else(|_| config.listen_address());
    let ctx = Arc::new(AppContext::from_config(&config).await?);

    let listener = TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "relay listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let peer_addr = stream.peer_addr()?;
        let io = TokioIo::new(stream);

        let ctx = Arc::clone(&ctx);
        let service = service_fn(move |req| {
            let ctx = Arc::clone(&ctx);
            async move { route(req, ctx).await }
        });

        tokio::task::spawn(async move {
            debug!(peer = ?peer_addr, "accepted connection");
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(error = ?err, "error serving connection");
            }
        });
    }
}
