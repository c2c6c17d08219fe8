use metrics::HealthChecker;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    eth_connection_up: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.eth_connection_up
    }
}

pub struct HealthReporter {
    eth_connection: HealthChecker,
}

impl HealthReporter {
    #[must_use]
    pub fn new(eth_health_check: HealthChecker) -> Self {
        Self {
            eth_connection: eth_health_check,
        }
    }

    #[must_use]
    pub fn generate_report(&self) -> HealthReport {
        HealthReport {
            eth_connection_up: self.eth_connection.healthy(),
        }
    }
}
