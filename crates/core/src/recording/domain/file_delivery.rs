use std::path::PathBuf;

/// Hands a finished recording to the user.
pub trait FileDelivery: Send {
    /// Returns where the file ended up.
    fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, Box<dyn std::error::Error>>;
}
