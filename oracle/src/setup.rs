use eth::HttpClient;
use metrics::{HealthChecker, RegistersMetrics, prometheus::Registry};
use services::{FeeHistoryResolver, fee_history::cache::BlockStatsCache};

use crate::config::{Config, Internal};

pub fn create_eth_adapter(
    config: &Config,
    internal_config: &Internal,
    registry: &Registry,
) -> (HttpClient, HealthChecker) {
    let eth_adapter = HttpClient::new(
        config.eth.rpc.clone(),
        internal_config.eth_errors_before_unhealthy,
    );
    eth_adapter.register_metrics(registry);

    let eth_connection_health = eth_adapter.connection_health_checker();

    (eth_adapter, eth_connection_health)
}

pub fn create_fee_history_resolver(
    config: &Config,
    eth_adapter: HttpClient,
    registry: &Registry,
) -> FeeHistoryResolver<HttpClient> {
    let cache = BlockStatsCache::new(config.fee_history.cache_size);
    let resolver = FeeHistoryResolver::new(eth_adapter, config.fee_history.limits, cache);
    resolver.register_metrics(registry);

    resolver
}

pub fn setup_logger() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_line_number(true)
        .json()
        .init();
}
