use std::fs;
use std::path::{Path, PathBuf};

use crate::recording::domain::file_delivery::FileDelivery;

/// Writes recordings into a folder, by default the user's downloads.
pub struct DownloadDirDelivery {
    dir: PathBuf,
}

impl DownloadDirDelivery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Downloads folder, falling back to the home directory and then the
    /// working directory.
    pub fn default_dir() -> PathBuf {
        dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for DownloadDirDelivery {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

/// Windows does not allow `:` in file names.
pub fn file_system_name(filename: &str) -> String {
    if cfg!(windows) {
        filename.replace(':', "-")
    } else {
        filename.to_string()
    }
}

impl FileDelivery for DownloadDirDelivery {
    fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, Box<dyn std::error::Error>> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_system_name(filename));
        let tmp = path.with_extension("webm.part");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_deliver_writes_file() {
        let dir = TempDir::new().unwrap();
        let delivery = DownloadDirDelivery::new(dir.path().join("out"));
        let path = delivery
            .deliver("face-tracking-2024-05-01T12:30:00.123Z.webm", b"webm")
            .unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"webm");
        assert!(path.starts_with(dir.path().join("out")));
        assert_eq!(fs::read_dir(dir.path().join("out")).unwrap().count(), 1);
    }

    #[test]
    fn test_file_system_name() {
        let name = file_system_name("a:b.webm");
        if cfg!(windows) {
            assert_eq!(name, "a-b.webm");
        } else {
            assert_eq!(name, "a:b.webm");
        }
    }
}
