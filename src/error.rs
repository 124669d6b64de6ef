//! Error types for maafetch

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for maafetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure that aborts a fetch-and-deploy run.
///
/// Nothing is retried and nothing is rolled back: a failure while unpacking
/// leaves the destination trees partially populated.
#[derive(Debug, Error)]
pub enum Error {
    /// The release API or an asset download answered with a non-2xx status.
    #[error("request to {url} failed: {status}")]
    Http { url: String, status: StatusCode },

    /// Transport-level failure (DNS, TLS, timeout, broken stream).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The release API returned a body that is not a release document.
    #[error("invalid release JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem failure on a specific path.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The release carries no archive matching any ABI keyword.
    #[error("no {suffix} archives matching any of [{}] found in the release", .keywords.join(", "))]
    NoMatchingArchives {
        suffix: String,
        keywords: Vec<String>,
    },

    /// A requested ABI has no archive in the release.
    #[error("release has no archive for ABI {abi}")]
    MissingAbi { abi: String },

    /// Two archives match the same ABI keyword.
    #[error("archives {first} and {second} both match ABI {abi}")]
    AmbiguousArchive {
        abi: String,
        first: String,
        second: String,
    },

    /// `--skip-download` was requested but the cache holds nothing to deploy.
    #[error("no archives found in cache {}; run without --skip-download first", .dir.display())]
    EmptyCache { dir: PathBuf },

    /// An ABI label that the configuration does not know.
    #[error("unknown ABI: {0}")]
    UnknownAbi(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
