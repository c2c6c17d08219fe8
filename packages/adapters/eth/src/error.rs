use alloy::transports::{RpcError, TransportErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("network error: {msg}, recoverable: {recoverable}")]
    Network { msg: String, recoverable: bool },
    /// The node answered, but with a JSON-RPC error.
    #[error("rpc error {code}: {msg}")]
    Rpc { code: i64, msg: String },
}

impl Error {
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

impl From<RpcError<TransportErrorKind>> for Error {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err {
            RpcError::ErrorResp(payload) => Self::Rpc {
                code: payload.code,
                msg: payload.message.to_string(),
            },
            RpcError::Transport(
                TransportErrorKind::BackendGone | TransportErrorKind::PubsubUnavailable,
            ) => Self::Network {
                msg: err.to_string(),
                recoverable: false,
            },
            _ => Self::Network {
                msg: err.to_string(),
                recoverable: true,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for services::Error {
    fn from(err: Error) -> Self {
        Self::Retrieval(err.to_string())
    }
}
