use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("memory store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("memory store error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}
