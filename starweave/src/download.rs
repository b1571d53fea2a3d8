//! Batch product downloads into a local cache directory.
//!
//! Cache entries are keyed by product filename, so re-running a workflow over
//! a warm cache re-issues no network fetches and yields the same manifest.
//! Individual failures never abort a batch; the caller inspects the manifest
//! and decides whether partial results are acceptable.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use thiserror::Error;

use crate::archive::{ArchiveClient, ArchiveError, ProductRecord};

/// Errors raised by the download manager itself (not per-file failures).
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The cache directory could not be created.
    #[error("Failed to prepare cache directory '{path}': {source}")]
    CacheDir {
        path: String,
        source: std::io::Error,
    },

    /// One or more files in a required batch failed to download.
    #[error("{failed} of {total} product downloads failed")]
    Partial { failed: usize, total: usize },
}

/// Outcome of one product fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    /// The file is present in the cache.
    Complete,
    /// The fetch failed; the reason is kept for reporting.
    Failed(String),
}

/// Maps one [`ProductRecord`] to its local path and fetch outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalManifestEntry {
    /// The product this entry describes
    pub product: ProductRecord,
    /// Destination path in the cache (present only when status is Complete)
    pub local_path: PathBuf,
    /// Fetch outcome
    pub status: DownloadStatus,
}

impl LocalManifestEntry {
    /// Whether the file is available locally.
    pub fn is_complete(&self) -> bool {
        self.status == DownloadStatus::Complete
    }
}

/// Aggregate result of one batch download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadManifest {
    entries: Vec<LocalManifestEntry>,
}

impl DownloadManifest {
    /// All entries, in product input order.
    pub fn entries(&self) -> &[LocalManifestEntry] {
        &self.entries
    }

    /// Number of failed entries.
    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_complete()).count()
    }

    /// Local path of the entry for `filename`, if it completed.
    pub fn path_for(&self, filename: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|e| e.is_complete() && e.product.filename() == filename)
            .map(|e| e.local_path.as_path())
    }

    /// Convert any per-file failure into a hard error.
    ///
    /// Callers that cannot proceed with a partial batch use this to surface a
    /// single aggregate failure instead of inspecting entries themselves.
    pub fn require_complete(&self) -> Result<&Self, DownloadError> {
        let failed = self.failed_count();
        if failed > 0 {
            for entry in self.entries.iter().filter(|e| !e.is_complete()) {
                if let DownloadStatus::Failed(reason) = &entry.status {
                    warn!("Download failed for {}: {}", entry.product.filename(), reason);
                }
            }
            return Err(DownloadError::Partial {
                failed,
                total: self.entries.len(),
            });
        }
        Ok(self)
    }
}

/// Fetches products through an [`ArchiveClient`] into a cache directory.
pub struct DownloadManager<'a, C: ArchiveClient> {
    client: &'a C,
    cache_dir: PathBuf,
    show_progress: bool,
}

impl<'a, C: ArchiveClient> DownloadManager<'a, C> {
    /// Manager writing into `cache_dir` (created on first use).
    pub fn new(client: &'a C, cache_dir: &Path) -> Self {
        Self {
            client,
            cache_dir: cache_dir.to_path_buf(),
            show_progress: false,
        }
    }

    /// Enable a terminal progress bar for batch fetches.
    pub fn with_progress(mut self) -> Self {
        self.show_progress = true;
        self
    }

    /// The cache directory this manager writes into.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Fetch every product, returning one manifest entry per record.
    ///
    /// Products already present in the cache (non-empty file under the same
    /// filename) are skipped without touching the network, which makes
    /// re-runs idempotent. Failures are recorded per entry; the batch always
    /// runs to completion.
    pub fn fetch_all(&self, products: &[ProductRecord]) -> Result<DownloadManifest, DownloadError> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|source| DownloadError::CacheDir {
            path: self.cache_dir.display().to_string(),
            source,
        })?;

        let progress = if self.show_progress && products.len() > 1 {
            let bar = ProgressBar::new(products.len() as u64);
            bar.set_style(
                ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
                    .expect("static progress template"),
            );
            bar.set_message("Downloading products");
            Some(bar)
        } else {
            None
        };

        let mut entries = Vec::with_capacity(products.len());
        for product in products {
            entries.push(self.fetch_one(product));
            if let Some(bar) = &progress {
                bar.inc(1);
            }
        }
        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        let manifest = DownloadManifest { entries };
        info!(
            "Downloaded {} products ({} failed)",
            manifest.entries.len(),
            manifest.failed_count()
        );
        Ok(manifest)
    }

    fn fetch_one(&self, product: &ProductRecord) -> LocalManifestEntry {
        let dest = self.cache_dir.join(product.filename());

        let cached = match std::fs::metadata(&dest) {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        };
        if cached {
            debug!("Cache hit for {}", product.filename());
            return LocalManifestEntry {
                product: product.clone(),
                local_path: dest,
                status: DownloadStatus::Complete,
            };
        }

        match self.client.fetch_product(product, &dest) {
            Ok(()) => LocalManifestEntry {
                product: product.clone(),
                local_path: dest,
                status: DownloadStatus::Complete,
            },
            Err(e) => LocalManifestEntry {
                product: product.clone(),
                local_path: dest,
                status: DownloadStatus::Failed(e.to_string()),
            },
        }
    }
}
