//! Error handling and custom error types
//!
//! Provides unified error handling across the application using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Guide parse error: {0}")]
    Parse(String),

    #[error("Image generation error: {0}")]
    ImageGeneration(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for network failures and provider rejections, as opposed to
    /// responses that arrived but could not be used.
    pub fn is_request_failure(&self) -> bool {
        matches!(self, Error::Request(_) | Error::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
