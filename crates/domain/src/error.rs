/// Shared error type used across the research-agent crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("model transport: {0}")]
    Model(String),

    #[error("search provider {provider}: {message}")]
    Search { provider: String, message: String },

    #[error("fetch blocked: {0}")]
    FetchBlocked(String),

    #[error("store: {0}")]
    Store(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
