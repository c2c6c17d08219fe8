use metrics::{
    RegistersMetrics, int_counter, int_gauge,
    prometheus::{IntCounter, IntGauge, core::Collector},
};

#[derive(Debug, Clone)]
pub struct Metrics {
    pub eth_network_errors: IntCounter,
    pub eth_height: IntGauge,
}

impl RegistersMetrics for Metrics {
    fn metrics(&self) -> Vec<Box<dyn Collector>> {
        vec![
            Box::new(self.eth_network_errors.clone()),
            Box::new(self.eth_height.clone()),
        ]
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            eth_network_errors: int_counter(
                "eth_network_errors",
                "Number of network errors encountered while querying the Ethereum node.",
            ),
            eth_height: int_gauge("eth_height", "Latest block height seen on Ethereum"),
        }
    }
}
