use std::{io, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("Unable to parse document: {0}")]
    Parse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("Request failed with status code {status}")]
    Status { url: String, status: u16 },
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

/// Failure of a single download unit. Never escapes the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("no file name in URL {0}")]
    NoFileName(String),
    #[error("{0}")]
    Fetch(#[from] FetchError),
    #[error("unable to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Unable to create output directory {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },
}

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("{0}")]
    Usage(String),
    #[error("Error fetching data: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported content type {0:?}. Only HTML and JSON are supported.")]
    UnsupportedContentType(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
