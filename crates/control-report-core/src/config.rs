use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable that overrides the asset root.
pub const ASSET_ROOT_ENV: &str = "CONTROL_REPORT_ASSET_ROOT";

/// Default file name of the institutional logo inside the asset root.
pub const DEFAULT_LOGO_FILE: &str = "escudo.png";

/// Where static assets (the institutional logo) live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Asset root directory. `None` means no logo is configured.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Logo file name, relative to `root`
    #[serde(default = "default_logo_file")]
    pub logo_file: String,
}

fn default_logo_file() -> String {
    DEFAULT_LOGO_FILE.to_string()
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: None,
            logo_file: default_logo_file(),
        }
    }
}

/// Attachment merge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Attachments larger than this are skipped (no limit when unset)
    #[serde(default)]
    pub max_attachment_bytes: Option<u64>,

    /// Parent directory for per-call scratch directories (system temp dir when unset)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

/// Report generator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Asset lookup
    #[serde(default)]
    pub assets: AssetConfig,

    /// Attachment merging
    #[serde(default)]
    pub merge: MergeConfig,
}

impl ReportConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::error::Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::error::Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, crate::error::Error> {
        toml::from_str(content).map_err(|e| {
            crate::error::Error::ConfigLoad(format!("Failed to parse config: {e}"))
        })
    }

    /// Load from default locations (~/.config/control-report/config.toml, then
    /// ./config.toml), falling back to defaults, with environment overrides
    /// applied on top.
    pub fn load() -> Self {
        let mut candidates = Vec::with_capacity(2);
        if let Some(dir) = crate::util::config_dir() {
            candidates.push(dir.join("control-report").join("config.toml"));
        }
        candidates.push(PathBuf::from("config.toml"));

        Self::load_first(&candidates).with_env_overrides()
    }

    /// The first candidate that exists and parses. Broken files are logged
    /// and passed over.
    fn load_first(candidates: &[PathBuf]) -> Self {
        candidates
            .iter()
            .filter(|path| path.exists())
            .find_map(|path| match Self::from_file(path) {
                Ok(config) => {
                    tracing::debug!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {e}", path.display());
                    None
                }
            })
            .unwrap_or_else(|| {
                tracing::debug!("No usable config file, using defaults");
                Self::default()
            })
    }

    /// Apply overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var_os(name))
    }

    /// Apply overrides read through `lookup`, keyed by variable name.
    #[must_use]
    pub fn with_overrides(self, lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        self.with_asset_root_override(lookup(ASSET_ROOT_ENV).map(PathBuf::from))
    }

    /// Replace the asset root when an override is present.
    #[must_use]
    pub fn with_asset_root_override(mut self, root: Option<PathBuf>) -> Self {
        if let Some(root) = root.filter(|r| !r.as_os_str().is_empty()) {
            self.assets.root = Some(root);
        }
        self
    }
}
