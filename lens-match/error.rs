use lens_fast::FastError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("feature detection failed: {0}")]
    Fast(#[from] FastError),
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("cannot open sprite directory {}", path.display())]
    OpenDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ExtractResult<T> = Result<T, ExtractError>;
pub type LibraryResult<T> = Result<T, LibraryError>;
