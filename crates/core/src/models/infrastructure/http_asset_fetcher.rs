use std::time::Duration;

use crate::models::domain::asset_fetcher::{AssetFetcher, FetchError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Fetches assets over HTTP(S). Redirects are followed; any non-2xx final
/// status is a failure.
pub struct HttpAssetFetcher {
    client: reqwest::blocking::Client,
}

impl HttpAssetFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Http {
                location: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl AssetFetcher for HttpAssetFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(location)
            .send()
            .map_err(|e| FetchError::Http {
                location: location.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                location: location.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|e| FetchError::Http {
            location: location.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_host_is_http_error() {
        let fetcher = HttpAssetFetcher::new().unwrap();
        let result = fetcher.fetch("http://invalid.nonexistent.example.com/models/manifest.json");
        match result {
            Err(FetchError::Http { location, .. }) => assert!(location.contains("nonexistent")),
            other => panic!("expected http error, got {other:?}"),
        }
    }
}
