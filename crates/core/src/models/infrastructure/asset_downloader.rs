use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::domain::model_bundle::join_location;
use crate::models::domain::retry_policy::{RetryError, RetryPolicy};
use crate::shared::cancellation::CancellationToken;
use crate::shared::constants::{
    FACE_LANDMARK_68_MANIFEST, MODEL_CDN_BASE, TINY_FACE_DETECTOR_MANIFEST,
};

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("failed to create model directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("size mismatch for {name}: expected {expected} bytes, got {actual} bytes")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },
    #[error("invalid catalog {path}: {message}")]
    Catalog { path: PathBuf, message: String },
}

/// One downloadable model asset with its expected byte size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl CatalogEntry {
    fn cdn(name: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            url: join_location(MODEL_CDN_BASE, name),
            size: Some(size),
        }
    }
}

/// Manifests and shards of both bundles as published on the CDN.
pub fn default_catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::cdn(TINY_FACE_DETECTOR_MANIFEST, 149),
        CatalogEntry::cdn("tiny_face_detector_model-shard1", 1_904_193),
        CatalogEntry::cdn(FACE_LANDMARK_68_MANIFEST, 159),
        CatalogEntry::cdn("face_landmark_68_model-shard1", 3_846_739),
    ]
}

/// Reads a JSON array of [`CatalogEntry`] from `path`.
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>, DownloadError> {
    let data = fs::read_to_string(path).map_err(|e| DownloadError::Catalog {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&data).map_err(|e| DownloadError::Catalog {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// How one catalog entry ended up.
#[derive(Debug)]
pub enum AssetStatus {
    AlreadyValid,
    Downloaded { attempts: u32 },
    Failed(String),
}

impl AssetStatus {
    pub fn is_ok(&self) -> bool {
        !matches!(self, AssetStatus::Failed(_))
    }
}

#[derive(Debug)]
pub struct AssetReport {
    pub entry: CatalogEntry,
    pub path: PathBuf,
    pub status: AssetStatus,
}

/// Progress callback: `(name, bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(&str, u64, u64) + Send>;

/// Populates a local model directory from a catalog.
///
/// Files already present with the expected size are skipped; everything else
/// is downloaded through a `.part` file, verified and retried.
pub struct AssetDownloader {
    dir: PathBuf,
    retry: RetryPolicy,
    progress: Option<ProgressFn>,
}

impl AssetDownloader {
    pub fn new(dir: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            dir: dir.into(),
            retry,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Processes every entry; one failure doesn't stop the others.
    pub fn ensure_all(
        &self,
        catalog: &[CatalogEntry],
        cancel: &CancellationToken,
    ) -> Result<Vec<AssetReport>, DownloadError> {
        fs::create_dir_all(&self.dir).map_err(|source| DownloadError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;
        Ok(catalog
            .iter()
            .map(|entry| self.ensure(entry, cancel))
            .collect())
    }

    pub fn ensure(&self, entry: &CatalogEntry, cancel: &CancellationToken) -> AssetReport {
        let path = self.dir.join(&entry.name);
        let status = if verify_file(&path, entry.size).is_ok() {
            log::info!("{} is already downloaded and valid", entry.name);
            AssetStatus::AlreadyValid
        } else {
            log::info!("{} is missing or corrupted, downloading from {}", entry.name, entry.url);
            let mut attempts = 0;
            match self.retry.run(cancel, |attempt| {
                attempts = attempt;
                self.download(entry, &path)?;
                verify_file(&path, entry.size)
            }) {
                Ok(()) => AssetStatus::Downloaded { attempts },
                Err(RetryError::Exhausted { last, .. }) => AssetStatus::Failed(last.to_string()),
                Err(RetryError::Cancelled) => AssetStatus::Failed("cancelled".to_string()),
            }
        };
        AssetReport {
            entry: entry.clone(),
            path,
            status,
        }
    }

    fn download(&self, entry: &CatalogEntry, dest: &Path) -> Result<(), DownloadError> {
        let temp_path = part_path(dest);
        let result = self.download_inner(entry, dest, &temp_path);
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    fn download_inner(
        &self,
        entry: &CatalogEntry,
        dest: &Path,
        temp_path: &Path,
    ) -> Result<(), DownloadError> {
        let url = entry.url.as_str();
        let mut response = reqwest::blocking::get(url)
            .and_then(|r| r.error_for_status())
            .map_err(|e| DownloadError::Download {
                url: url.to_string(),
                source: e,
            })?;

        let total = response.content_length().unwrap_or(0);
        let mut downloaded: u64 = 0;

        let mut file = fs::File::create(temp_path).map_err(|e| DownloadError::Write {
            path: temp_path.to_path_buf(),
            source: e,
        })?;

        let mut buf = vec![0u8; 256 * 1024];
        loop {
            let n = response.read(&mut buf).map_err(|e| DownloadError::Write {
                path: temp_path.to_path_buf(),
                source: e,
            })?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).map_err(|e| DownloadError::Write {
                path: temp_path.to_path_buf(),
                source: e,
            })?;
            downloaded += n as u64;
            if let Some(ref cb) = self.progress {
                cb(&entry.name, downloaded, total);
            }
        }

        file.flush().map_err(|e| DownloadError::Write {
            path: temp_path.to_path_buf(),
            source: e,
        })?;
        drop(file);

        fs::rename(temp_path, dest).map_err(|e| DownloadError::Write {
            path: dest.to_path_buf(),
            source: e,
        })
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Checks that `path` exists and, when a size is given, has exactly that size.
pub fn verify_file(path: &Path, expected: Option<u64>) -> Result<(), DownloadError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let actual = fs::metadata(path)
        .map_err(|e| DownloadError::Write {
            path: path.to_path_buf(),
            source: e,
        })?
        .len();
    match expected {
        Some(expected) if expected != actual => Err(DownloadError::SizeMismatch {
            name,
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::model_bundle::ModelBundle;
    use std::time::Duration;
    use tempfile::TempDir;

    fn entry(name: &str, size: Option<u64>) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            url: "http://invalid.nonexistent.example.com/model".to_string(),
            size,
        }
    }

    fn downloader(dir: &Path, attempts: u32) -> AssetDownloader {
        AssetDownloader::new(dir, RetryPolicy::new(attempts, Duration::from_millis(1)))
    }

    #[test]
    fn test_default_catalog_sizes() {
        let catalog = default_catalog();
        let sizes: Vec<u64> = catalog.iter().filter_map(|e| e.size).collect();
        assert_eq!(sizes, vec![149, 1_904_193, 159, 3_846_739]);
        assert!(catalog
            .iter()
            .all(|e| e.url.starts_with(MODEL_CDN_BASE) && e.url.ends_with(&e.name)));
    }

    #[test]
    fn test_default_catalog_has_manifest_and_shard_per_bundle() {
        let names: Vec<String> = default_catalog().into_iter().map(|e| e.name).collect();
        for bundle in ModelBundle::ALL {
            let manifest = bundle.manifest_file();
            let shard = manifest.replace("-weights_manifest.json", "-shard1");
            assert!(names.iter().any(|n| n == manifest), "{manifest}");
            assert!(names.contains(&shard), "{shard}");
        }
    }

    #[test]
    fn test_verify_file_checks_size() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("manifest.json");
        fs::write(&path, vec![b'x'; 149]).unwrap();
        assert!(verify_file(&path, Some(149)).is_ok());
        assert!(verify_file(&path, None).is_ok());
        assert!(matches!(
            verify_file(&path, Some(150)),
            Err(DownloadError::SizeMismatch {
                expected: 150,
                actual: 149,
                ..
            })
        ));
    }

    #[test]
    fn test_verify_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(verify_file(&tmp.path().join("nope"), None).is_err());
    }

    #[test]
    fn test_valid_file_is_skipped_without_network() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.json"), vec![0u8; 10]).unwrap();
        let report = downloader(tmp.path(), 2).ensure(&entry("a.json", Some(10)), &CancellationToken::new());
        assert!(matches!(report.status, AssetStatus::AlreadyValid));
    }

    #[test]
    fn test_wrong_size_triggers_download_and_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.json"), vec![0u8; 3]).unwrap();
        let reports = downloader(tmp.path(), 2)
            .ensure_all(&[entry("a.json", Some(10))], &CancellationToken::new())
            .unwrap();
        assert!(!reports[0].status.is_ok());
        assert!(!part_path(&tmp.path().join("a.json")).exists());
    }

    #[test]
    fn test_one_failure_does_not_stop_others() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("ok.bin"), vec![0u8; 4]).unwrap();
        let reports = downloader(tmp.path(), 1)
            .ensure_all(
                &[entry("missing.bin", Some(4)), entry("ok.bin", Some(4))],
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(reports.len(), 2);
        assert!(!reports[0].status.is_ok());
        assert!(reports[1].status.is_ok());
    }

    #[test]
    fn test_ensure_all_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("public").join("models");
        downloader(&dir, 1)
            .ensure_all(&[], &CancellationToken::new())
            .unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_load_catalog_parses_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("catalog.json");
        fs::write(
            &path,
            r#"[{"name":"m.onnx","url":"https://host/m.onnx","size":42},{"name":"n","url":"https://host/n"}]"#,
        )
        .unwrap();
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].size, Some(42));
        assert_eq!(catalog[1].size, None);
    }

    #[test]
    fn test_load_catalog_rejects_bad_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("catalog.json");
        fs::write(&path, "{").unwrap();
        assert!(matches!(
            load_catalog(&path),
            Err(DownloadError::Catalog { .. })
        ));
    }

    #[test]
    fn test_part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/m/tiny_face_detector_model-shard1")),
            PathBuf::from("/m/tiny_face_detector_model-shard1.part")
        );
    }
}
