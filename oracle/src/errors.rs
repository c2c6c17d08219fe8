use actix_web::{HttpResponse, ResponseError, http::StatusCode};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Other(String),
    #[error(transparent)]
    FeeHistory(#[from] services::Error),
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Other(error.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Self::Other(error.to_string())
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::FeeHistory(
                services::Error::InvalidPercentile(_) | services::Error::RequestBeyondHead { .. },
            ) => StatusCode::BAD_REQUEST,
            Self::FeeHistory(services::Error::Cancelled) => StatusCode::GATEWAY_TIMEOUT,
            Self::FeeHistory(services::Error::Retrieval(_)) => StatusCode::BAD_GATEWAY,
            Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": self.to_string() }))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
