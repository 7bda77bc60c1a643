use crate::models::domain::asset_fetcher::{AssetFetcher, FetchError};

use super::file_asset_fetcher::FileAssetFetcher;
use super::http_asset_fetcher::HttpAssetFetcher;

/// Routes `http(s)://` locations to HTTP and everything else to the
/// filesystem, so one fetcher serves either kind of asset origin.
pub struct OriginAssetFetcher {
    http: HttpAssetFetcher,
    file: FileAssetFetcher,
}

impl OriginAssetFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            http: HttpAssetFetcher::new()?,
            file: FileAssetFetcher,
        })
    }
}

pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

impl AssetFetcher for OriginAssetFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        if is_remote(location) {
            self.http.fetch(location)
        } else {
            self.file.fetch(location)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("http://localhost:3000/models/a.json", true)]
    #[case("https://cdn.example.com/a.json", true)]
    #[case("./public/models/a.json", false)]
    #[case("/srv/public/models/a.json", false)]
    fn test_is_remote(#[case] location: &str, #[case] expected: bool) {
        assert_eq!(is_remote(location), expected);
    }

    #[test]
    fn test_local_location_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("m.json");
        std::fs::write(&path, b"[]").unwrap();
        let fetcher = OriginAssetFetcher::new().unwrap();
        assert_eq!(fetcher.fetch(&path.to_string_lossy()).unwrap(), b"[]");
    }
}
