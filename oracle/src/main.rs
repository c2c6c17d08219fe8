#![deny(unused_crate_dependencies)]
mod api;
mod config;
mod errors;
mod setup;

use api::launch_api_server;
use config::Internal;
use errors::Result;
use metrics::prometheus::Registry;
use setup::{create_eth_adapter, create_fee_history_resolver, setup_logger};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    setup_logger();

    let config = config::parse()?;
    config.validate()?;

    let internal_config = Internal::default();
    let shutdown = CancellationToken::new();

    let metrics_registry = Registry::default();

    let (eth_adapter, eth_health_check) =
        create_eth_adapter(&config, &internal_config, &metrics_registry);

    let resolver = create_fee_history_resolver(&config, eth_adapter, &metrics_registry);

    let result = launch_api_server(
        &config,
        resolver,
        metrics_registry,
        eth_health_check,
        shutdown.clone(),
    )
    .await;

    info!("api server stopped, cancelling in-flight queries");
    shutdown.cancel();

    result
}

