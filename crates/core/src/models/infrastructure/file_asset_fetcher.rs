use std::fs;

use crate::models::domain::asset_fetcher::{AssetFetcher, FetchError};

/// Reads assets from the local filesystem; locations are paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileAssetFetcher;

impl AssetFetcher for FileAssetFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        fs::read(location).map_err(|source| FetchError::Io {
            location: location.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reads_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("manifest.json");
        fs::write(&path, b"[]").unwrap();
        let bytes = FileAssetFetcher.fetch(&path.to_string_lossy()).unwrap();
        assert_eq!(bytes, b"[]");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.json");
        let err = FileAssetFetcher.fetch(&path.to_string_lossy()).unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
        assert!(err.location().ends_with("missing.json"));
    }
}
