pub mod block_stats;
pub mod cache;
pub mod fetcher;
pub mod percentiles;
pub mod port;
pub mod rewards;
pub mod service;
#[cfg(feature = "test-helpers")]
pub mod testing;

use serde::Deserialize;

/// History limits applied to every fee history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FeeHistoryConfig {
    /// How many blocks may be served when only headers are needed (no reward
    /// percentiles requested).
    #[serde(default = "default_history")]
    pub max_header_history: u64,
    /// How many blocks may be served when full blocks are needed to compute
    /// reward percentiles.
    #[serde(default = "default_history")]
    pub max_block_history: u64,
}

const fn default_history() -> u64 {
    1024
}

impl Default for FeeHistoryConfig {
    fn default() -> Self {
        Self {
            max_header_history: default_history(),
            max_block_history: default_history(),
        }
    }
}

impl FeeHistoryConfig {
    pub const fn history_limit(&self, percentiles_requested: bool) -> u64 {
        if percentiles_requested {
            self.max_block_history
        } else {
            self.max_header_history
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_limits_fall_back_to_defaults() {
        // given
        let json = r#"{ "max_block_history": 2 }"#;

        // when
        let config: FeeHistoryConfig = serde_json::from_str(json).unwrap();

        // then
        assert_eq!(
            config,
            FeeHistoryConfig {
                max_header_history: 1024,
                max_block_history: 2,
            }
        );
    }

    #[test]
    fn picks_limit_by_request_cost() {
        // given
        let config = FeeHistoryConfig {
            max_header_history: 20,
            max_block_history: 2,
        };

        // when
        let with_percentiles = config.history_limit(true);
        let without_percentiles = config.history_limit(false);

        // then
        assert_eq!(with_percentiles, 2);
        assert_eq!(without_percentiles, 20);
    }
}
