//! Error types for the ripvgm library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while discovering or downloading albums.
#[derive(Error, Debug)]
pub enum Error {
    /// A page or asset could not be fetched (connection, timeout or HTTP status).
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        /// URL of the failed request.
        url: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// HTML could not be turned into a usable document.
    #[error("HTML parsing failed: {0}")]
    Parse(String),

    /// An expected field or asset format is missing or unparseable.
    #[error("Unexpected page format at {url}: {reason}")]
    Format {
        /// Page the field was expected on.
        url: String,
        /// What was missing.
        reason: String,
    },

    /// An album input could not be turned into a URL.
    #[error("Invalid album URL {input:?}: {source}")]
    InvalidUrl {
        /// The offending input token.
        input: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// I/O error during file operations.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path the operation was performed on.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client construction error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Builds a [`Error::Fetch`] for `url`.
    pub fn fetch(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Fetch {
            url: url.into(),
            source,
        }
    }

    /// Builds a [`Error::Format`] for `url`.
    pub fn format(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Builds a [`Error::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A specialized `Result` type for ripvgm operations.
pub type Result<T> = std::result::Result<T, Error>;
