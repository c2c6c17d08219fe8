mod error;
mod http;
mod metrics;

pub use error::{Error, Result};
pub use http::HttpClient;
