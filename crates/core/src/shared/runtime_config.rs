use std::fmt;
use std::path::{Path, PathBuf};

pub const ENV_MODE: &str = "FACETRACK_ENV";
pub const ENV_BASE_PATH: &str = "FACETRACK_BASE_PATH";
pub const ENV_ASSET_ORIGIN: &str = "FACETRACK_ASSET_ORIGIN";

/// Default asset origin: the `public` directory relative to the working dir.
pub const DEFAULT_ASSET_ORIGIN: &str = "public";

const MODELS_DIR: &str = "models";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeMode {
    Development,
    Production,
}

impl RuntimeMode {
    /// Parses `development`/`dev` and `production`/`prod` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(RuntimeMode::Development),
            "production" | "prod" => Some(RuntimeMode::Production),
            _ => None,
        }
    }

    /// Debug builds run in development mode unless told otherwise.
    pub fn build_default() -> Self {
        if cfg!(debug_assertions) {
            RuntimeMode::Development
        } else {
            RuntimeMode::Production
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeMode::Development => write!(f, "development"),
            RuntimeMode::Production => write!(f, "production"),
        }
    }
}

/// Base path of the model assets, relative to the asset origin.
///
/// Development always serves from the origin root; production uses the
/// externally supplied base path when there is one.
pub fn model_base_path(mode: RuntimeMode, base_path: Option<&str>) -> String {
    match mode {
        RuntimeMode::Development => format!("/{MODELS_DIR}"),
        RuntimeMode::Production => match base_path.map(str::trim).filter(|b| !b.is_empty()) {
            Some(base) => format!("{}/{MODELS_DIR}", base.trim_end_matches('/')),
            None => format!("./{MODELS_DIR}"),
        },
    }
}

/// Where base paths are resolved: a web server or a local directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetOrigin {
    Url(String),
    Directory(PathBuf),
}

impl AssetOrigin {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.starts_with("http://") || value.starts_with("https://") {
            AssetOrigin::Url(value.trim_end_matches('/').to_string())
        } else {
            AssetOrigin::Directory(PathBuf::from(value))
        }
    }

    /// Resolves a base path to a fetchable location.
    ///
    /// Absolute paths (`/models`) resolve against the origin root, relative
    /// ones (`./models`) against the origin itself. A directory origin is its
    /// own root.
    pub fn resolve(&self, base_path: &str) -> String {
        match self {
            AssetOrigin::Url(url) => {
                if let Some(absolute) = base_path.strip_prefix('/') {
                    format!("{}/{absolute}", url_root(url))
                } else {
                    let relative = base_path.trim_start_matches("./");
                    format!("{url}/{relative}")
                }
            }
            AssetOrigin::Directory(dir) => {
                let relative = base_path.trim_start_matches("./").trim_start_matches('/');
                dir.join(relative).to_string_lossy().into_owned()
            }
        }
    }
}

impl fmt::Display for AssetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetOrigin::Url(url) => write!(f, "{url}"),
            AssetOrigin::Directory(dir) => write!(f, "{}", dir.display()),
        }
    }
}

/// `scheme://host[:port]` part of a URL.
fn url_root(url: &str) -> &str {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[after_scheme..].find('/') {
        Some(i) => &url[..after_scheme + i],
        None => url,
    }
}

/// Environment-driven runtime configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeConfig {
    pub mode: RuntimeMode,
    pub base_path: Option<String>,
    pub asset_origin: AssetOrigin,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mode = match lookup(ENV_MODE) {
            Some(value) => RuntimeMode::parse(&value).unwrap_or_else(|| {
                log::warn!("Unknown {ENV_MODE} value '{value}', using build default");
                RuntimeMode::build_default()
            }),
            None => RuntimeMode::build_default(),
        };
        let asset_origin = lookup(ENV_ASSET_ORIGIN)
            .map(|v| AssetOrigin::parse(&v))
            .unwrap_or_else(|| AssetOrigin::Directory(PathBuf::from(DEFAULT_ASSET_ORIGIN)));
        Self {
            mode,
            base_path: lookup(ENV_BASE_PATH),
            asset_origin,
        }
    }

    pub fn with_asset_origin(mut self, origin: AssetOrigin) -> Self {
        self.asset_origin = origin;
        self
    }

    pub fn model_base_path(&self) -> String {
        model_base_path(self.mode, self.base_path.as_deref())
    }

    /// Fully resolved location of the model directory.
    pub fn model_location(&self) -> String {
        self.asset_origin.resolve(&self.model_base_path())
    }

    /// Local directory the models live in, when the origin is a directory.
    pub fn local_model_dir(&self) -> Option<PathBuf> {
        match self.asset_origin {
            AssetOrigin::Directory(_) => Some(Path::new(&self.model_location()).to_path_buf()),
            AssetOrigin::Url(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    #[rstest]
    #[case::dev_ignores_base(RuntimeMode::Development, Some("/app"), "/models")]
    #[case::dev(RuntimeMode::Development, None, "/models")]
    #[case::prod_relative(RuntimeMode::Production, None, "./models")]
    #[case::prod_empty_base(RuntimeMode::Production, Some(""), "./models")]
    #[case::prod_base(RuntimeMode::Production, Some("/app"), "/app/models")]
    #[case::prod_base_trailing_slash(RuntimeMode::Production, Some("/app/"), "/app/models")]
    fn test_model_base_path(
        #[case] mode: RuntimeMode,
        #[case] base: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(model_base_path(mode, base), expected);
    }

    #[test]
    fn test_model_base_path_never_both() {
        let dev = model_base_path(RuntimeMode::Development, None);
        let prod = model_base_path(RuntimeMode::Production, None);
        assert_ne!(dev, prod);
        assert!(dev.starts_with('/'));
        assert!(!prod.starts_with('/'));
    }

    #[rstest]
    #[case("dev", Some(RuntimeMode::Development))]
    #[case("Development", Some(RuntimeMode::Development))]
    #[case("PROD", Some(RuntimeMode::Production))]
    #[case("staging", None)]
    fn test_mode_parse(#[case] value: &str, #[case] expected: Option<RuntimeMode>) {
        assert_eq!(RuntimeMode::parse(value), expected);
    }

    #[test]
    fn test_url_origin_absolute_path_resolves_from_root() {
        let origin = AssetOrigin::parse("http://localhost:3000/app/");
        assert_eq!(origin.resolve("/models"), "http://localhost:3000/models");
    }

    #[test]
    fn test_url_origin_relative_path_resolves_from_origin() {
        let origin = AssetOrigin::parse("https://example.com/app");
        assert_eq!(origin.resolve("./models"), "https://example.com/app/models");
    }

    #[test]
    fn test_url_without_path_is_its_own_root() {
        let origin = AssetOrigin::parse("http://localhost:3000");
        assert_eq!(origin.resolve("/models"), "http://localhost:3000/models");
    }

    #[test]
    fn test_directory_origin_joins_both_forms() {
        let origin = AssetOrigin::parse("/srv/public");
        let expected = Path::new("/srv/public").join("models");
        assert_eq!(origin.resolve("/models"), expected.to_string_lossy());
        assert_eq!(origin.resolve("./models"), expected.to_string_lossy());
    }

    #[test]
    fn test_from_lookup_reads_all_variables() {
        let vars = HashMap::from([
            (ENV_MODE, "production"),
            (ENV_BASE_PATH, "/tracker"),
            (ENV_ASSET_ORIGIN, "https://cdn.example.com"),
        ]);
        let config = RuntimeConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.mode, RuntimeMode::Production);
        assert_eq!(config.model_base_path(), "/tracker/models");
        assert_eq!(
            config.model_location(),
            "https://cdn.example.com/tracker/models"
        );
        assert!(config.local_model_dir().is_none());
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = RuntimeConfig::from_lookup(|_| None);
        assert_eq!(config.mode, RuntimeMode::build_default());
        assert_eq!(
            config.asset_origin,
            AssetOrigin::Directory(PathBuf::from(DEFAULT_ASSET_ORIGIN))
        );
        assert!(config.local_model_dir().is_some());
    }

    #[test]
    fn test_from_lookup_unknown_mode_falls_back() {
        let config = RuntimeConfig::from_lookup(|k| (k == ENV_MODE).then(|| "qa".to_string()));
        assert_eq!(config.mode, RuntimeMode::build_default());
    }
}
