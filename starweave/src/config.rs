//! Workflow configuration.
//!
//! Defaults live under `~/.starweave/`; tests point everything at temp
//! directories. The config round-trips through JSON so a run's settings can
//! be kept next to its cache.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::figure::DEFAULT_UNCERTAINTY_THRESHOLD;

/// Default cone-search radius for matching time-series observations, degrees.
pub const DEFAULT_SEARCH_RADIUS_DEG: f64 = 0.02;

/// Default cap on population-catalog stars drawn in the background.
pub const DEFAULT_CATALOG_SUBSAMPLE: usize = 2000;

/// Settings for one characterization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Directory product files are cached in
    pub cache_dir: PathBuf,
    /// Directory rendered artifacts are written to
    pub output_dir: PathBuf,
    /// Cone-search radius for time-series matching, degrees
    pub search_radius_deg: f64,
    /// Relative-uncertainty threshold for spectrum pixel masking
    pub uncertainty_threshold: f64,
    /// Optional population catalog FITS file
    pub catalog_path: Option<PathBuf>,
    /// Cap on catalog stars in the population panel
    pub catalog_subsample: usize,
}

impl WorkflowConfig {
    /// Configuration rooted at the default directory (`~/.starweave`).
    pub fn new() -> std::io::Result<Self> {
        let home = std::env::var("HOME")
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
        Ok(Self::with_root(&PathBuf::from(home).join(".starweave")))
    }

    /// Configuration rooted at a custom directory.
    pub fn with_root(root: &Path) -> Self {
        Self {
            cache_dir: root.join("cache"),
            output_dir: root.join("figures"),
            search_radius_deg: DEFAULT_SEARCH_RADIUS_DEG,
            uncertainty_threshold: DEFAULT_UNCERTAINTY_THRESHOLD,
            catalog_path: None,
            catalog_subsample: DEFAULT_CATALOG_SUBSAMPLE,
        }
    }

    /// Load a configuration from a JSON file.
    pub fn load_from_file(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save this configuration as JSON, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, contents)
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::with_root(Path::new(".starweave")))
    }
}
