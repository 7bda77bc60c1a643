use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{location}: {source}")]
    Io {
        location: String,
        source: std::io::Error,
    },
    #[error("{location}: HTTP {status}")]
    Status { location: String, status: u16 },
    #[error("{location}: {message}")]
    Http { location: String, message: String },
}

impl FetchError {
    pub fn location(&self) -> &str {
        match self {
            FetchError::Io { location, .. }
            | FetchError::Status { location, .. }
            | FetchError::Http { location, .. } => location,
        }
    }
}

/// Retrieves a static asset (manifest or weight shard) by location.
pub trait AssetFetcher: Send + Sync {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError>;
}
