//! Filesystem layout shared by all components.
//!
//! Relative file names found in job tables are resolved against the config
//! directory. Defaults can be overridden from the environment (a `.env` file
//! is honoured by the binary) and then from CLI flags.

use std::path::{Path, PathBuf};

/// Default directory holding job tables, relation files and upload files.
const DEFAULT_CONFIG_DIR: &str = "config";

/// Default directory for undefined-value reports.
const DEFAULT_ERROR_DIR: &str = "ERROR_REPORTS";

/// Default directory listing creative assets for match tables.
const DEFAULT_CREATIVE_DIR: &str = "creative";

pub const ENV_CONFIG_DIR: &str = "CREATOR_CONFIG_DIR";
pub const ENV_ERROR_DIR: &str = "CREATOR_ERROR_DIR";
pub const ENV_CREATIVE_DIR: &str = "CREATOR_CREATIVE_DIR";

/// Where the creator reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub error_dir: PathBuf,
    pub creative_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            error_dir: PathBuf::from(DEFAULT_ERROR_DIR),
            creative_dir: PathBuf::from(DEFAULT_CREATIVE_DIR),
        }
    }
}

impl Paths {
    /// All three directories under one root, mostly for tests.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_dir: root.join(DEFAULT_CONFIG_DIR),
            error_dir: root.join(DEFAULT_ERROR_DIR),
            creative_dir: root.join(DEFAULT_CREATIVE_DIR),
        }
    }

    /// Defaults overridden by `CREATOR_*` environment variables.
    pub fn from_env() -> Self {
        let mut paths = Self::default();
        if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
            paths.config_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var(ENV_ERROR_DIR) {
            paths.error_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var(ENV_CREATIVE_DIR) {
            paths.creative_dir = PathBuf::from(dir);
        }
        paths
    }

    /// Resolve a file name from a job table against the config directory.
    pub fn resolve(&self, name: impl AsRef<Path>) -> PathBuf {
        let name = name.as_ref();
        if name.is_absolute() {
            name.to_path_buf()
        } else {
            self.config_dir.join(name)
        }
    }

    /// Report file for undefined values of `column` in `destination`.
    ///
    /// `config/create/ad_upload.csv` + `title` gives
    /// `ERROR_REPORTS/create/ad_upload_title.csv`.
    pub fn error_report_path(&self, destination: &Path, column: &str) -> PathBuf {
        let relative = destination
            .strip_prefix(&self.config_dir)
            .ok()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| destination.file_name().map(PathBuf::from).unwrap_or_default());

        let stem = relative
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = format!("{}_{}.csv", stem, column);

        match relative.parent() {
            Some(parent) => self.error_dir.join(parent).join(file_name),
            None => self.error_dir.join(file_name),
        }
    }
}
