use thiserror::Error;

/// A page source could not produce a page. Any of these aborts the snapshot
/// for the query being crawled.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("JSON parse error: {0}")]
    JsonParse(String),
    #[error("unexpected data shape: {0}")]
    UnexpectedShape(String),
    #[error("invalid query url: {0}")]
    InvalidUrl(String),
}
