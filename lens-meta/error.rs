#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("document is empty")]
    EmptyDocument,
    #[error("invalid page pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Failure to obtain a record; never cached
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("metadata source answered with status {0}")]
    Status(u16),
    #[error("metadata request failed: {0}")]
    Transport(#[source] ureq::Error),
    #[error("metadata page is unparseable: {0}")]
    Unparseable(#[from] ParseError),
}

impl From<ureq::Error> for FetchError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => FetchError::Status(code),
            other => FetchError::Transport(other),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
pub type FetchResult<T> = Result<T, FetchError>;
