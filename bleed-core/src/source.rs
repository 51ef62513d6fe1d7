//! Where story, knowledge and character documents come from.
//!
//! A `Source` is either a local path or an HTTP(S) URL. Both are read
//! whole into a string; parsing is left to the caller.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;

/// Errors from fetching a document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// A fetchable document location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Url(String),
}

impl Source {
    /// Parse a location; `http://` and `https://` prefixes select a URL.
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Source::Url(location.to_string())
        } else {
            Source::Path(PathBuf::from(location))
        }
    }

    /// Append a relative segment.
    pub fn join(&self, relative: &str) -> Self {
        match self {
            Source::Path(base) => Source::Path(base.join(relative)),
            Source::Url(base) => Source::Url(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                relative.trim_start_matches('/')
            )),
        }
    }

    /// Read the whole document.
    pub async fn read_to_string(&self) -> Result<String, FetchError> {
        match self {
            Source::Path(path) => fs::read_to_string(path).await.map_err(|source| FetchError::Io {
                path: path.clone(),
                source,
            }),
            Source::Url(url) => {
                let response = reqwest::get(url).await.map_err(|e| FetchError::Http {
                    url: url.clone(),
                    message: e.to_string(),
                })?;

                if !response.status().is_success() {
                    return Err(FetchError::Status {
                        url: url.clone(),
                        status: response.status().as_u16(),
                    });
                }

                response.text().await.map_err(|e| FetchError::Http {
                    url: url.clone(),
                    message: e.to_string(),
                })
            }
        }
    }
}

impl From<&str> for Source {
    fn from(location: &str) -> Self {
        Source::parse(location)
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => write!(f, "{}", path.display()),
            Source::Url(url) => f.write_str(url),
        }
    }
}
