pub mod fee_history;
pub mod health_reporter;

pub use fee_history::{
    FeeHistoryConfig,
    port::{Block, BlockHash, BlockNumberOrTag, BlockTag, ChainBackend, FeeHistory, Transaction},
    service::FeeHistoryResolver,
};
pub use health_reporter::{HealthReport, HealthReporter};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid reward percentile: {0}")]
    InvalidPercentile(String),
    #[error("request beyond head block: requested {requested}, head {head}")]
    RequestBeyondHead { requested: u64, head: u64 },
    #[error("Retrieval error: {0}")]
    Retrieval(String),
    #[error("fee history request cancelled")]
    Cancelled,
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Self::Retrieval(error)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
