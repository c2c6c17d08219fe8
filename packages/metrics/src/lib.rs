mod connection_health_tracker;
pub use connection_health_tracker::*;
pub use prometheus;

use prometheus::{IntCounter, IntGauge, Opts};
pub use prometheus::{core::Collector, Registry};

pub type HealthChecker = Box<dyn HealthCheck>;
pub trait HealthCheck: Send + Sync {
    fn healthy(&self) -> bool;
}

/// Implemented by every component that exposes prometheus collectors, so the
/// binary can register them all against one registry.
pub trait RegistersMetrics {
    fn register_metrics(&self, registry: &Registry) {
        self.metrics().into_iter().for_each(|metric| {
            registry
                .register(metric)
                .expect("app to have correctly named metrics");
        });
    }

    fn metrics(&self) -> Vec<Box<dyn Collector>>;
}

pub fn int_counter(name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(name, help))
        .unwrap_or_else(|e| panic!("{name} metric to be correctly configured: {e}"))
}

pub fn int_gauge(name: &str, help: &str) -> IntGauge {
    IntGauge::with_opts(Opts::new(name, help))
        .unwrap_or_else(|e| panic!("{name} metric to be correctly configured: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoCounters {
        first: IntCounter,
        second: IntGauge,
    }

    impl RegistersMetrics for TwoCounters {
        fn metrics(&self) -> Vec<Box<dyn Collector>> {
            vec![Box::new(self.first.clone()), Box::new(self.second.clone())]
        }
    }

    #[test]
    fn registers_every_collector() {
        // given
        let registry = Registry::new();
        let component = TwoCounters {
            first: int_counter("first_total", "first"),
            second: int_gauge("second", "second"),
        };

        // when
        component.register_metrics(&registry);
        component.first.inc();
        component.second.set(7);

        // then
        let names = registry
            .gather()
            .into_iter()
            .map(|family| family.get_name().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["first_total", "second"]);
    }
}
