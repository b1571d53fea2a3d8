//! Product and observation resolution.
//!
//! Raw archive listings contain many more files than a characterization run
//! needs (per-visit spectra, auxiliary calibration output, full-frame
//! images). This module narrows listings to the minimal canonical set: one
//! combined spectrum per target, one best-matching time-series observation
//! per reference coordinate.

use log::debug;
use thiserror::Error;

use crate::archive::{ObservationRecord, ProductRecord};
use crate::coords::SkyCoord;

/// Errors raised while resolving products and observations.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No product in the listing satisfied the selection policy.
    #[error("No product matched policy '{policy}' for observation '{obs_id}'")]
    NoProductMatch { obs_id: String, policy: String },

    /// The observation list to choose from was empty.
    #[error("No observations available to select a closest match from")]
    NoObservations,
}

/// Selection policy for narrowing a product listing.
///
/// All criteria are conjunctive; unset criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Required subgroup/category label (case-insensitive exact match)
    pub subgroup: Option<String>,
    /// Required filename extension (lowercase, without the dot)
    pub extension: Option<String>,
    /// Lowest acceptable calibration level
    pub min_calib_level: Option<u32>,
    /// Keep only archive-curated minimum recommended products
    pub minimum_recommended_only: bool,
}

impl ProductFilter {
    /// Filter requiring a subgroup label.
    pub fn subgroup(label: &str) -> Self {
        Self {
            subgroup: Some(label.to_string()),
            ..Self::default()
        }
    }

    /// Require a filename extension.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = Some(extension.to_ascii_lowercase());
        self
    }

    /// Require a calibration level of at least `level`.
    pub fn with_min_calib_level(mut self, level: u32) -> Self {
        self.min_calib_level = Some(level);
        self
    }

    /// Keep only minimum recommended products.
    pub fn minimum_recommended(mut self) -> Self {
        self.minimum_recommended_only = true;
        self
    }

    fn matches(&self, product: &ProductRecord) -> bool {
        if let Some(subgroup) = &self.subgroup {
            if !product.subgroup.eq_ignore_ascii_case(subgroup) {
                return false;
            }
        }
        if let Some(extension) = &self.extension {
            match product.extension() {
                Some(ext) if ext.eq_ignore_ascii_case(extension) => {}
                _ => return false,
            }
        }
        if let Some(level) = self.min_calib_level {
            if product.calib_level < level {
                return false;
            }
        }
        if self.minimum_recommended_only && !product.minimum_recommended {
            return false;
        }
        true
    }

    /// Human-readable policy description used in error messages.
    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(subgroup) = &self.subgroup {
            parts.push(format!("subgroup={subgroup}"));
        }
        if let Some(extension) = &self.extension {
            parts.push(format!("extension={extension}"));
        }
        if let Some(level) = self.min_calib_level {
            parts.push(format!("calib_level>={level}"));
        }
        if self.minimum_recommended_only {
            parts.push("minimum-recommended".to_string());
        }
        if parts.is_empty() {
            parts.push("any".to_string());
        }
        parts.join(", ")
    }
}

/// Select the subset of `products` matching `filter`, preserving input order.
///
/// # Errors
///
/// Returns [`ResolveError::NoProductMatch`] when nothing matches; an empty
/// selection is never silently returned.
pub fn select_products(
    products: &[ProductRecord],
    filter: &ProductFilter,
) -> Result<Vec<ProductRecord>, ResolveError> {
    let selected: Vec<ProductRecord> = products
        .iter()
        .filter(|p| filter.matches(p))
        .cloned()
        .collect();

    if selected.is_empty() {
        let obs_id = products
            .first()
            .map(|p| p.obs_id.clone())
            .unwrap_or_else(|| "<empty listing>".to_string());
        return Err(ResolveError::NoProductMatch {
            obs_id,
            policy: filter.describe(),
        });
    }

    debug!(
        "Selected {} of {} products for policy [{}]",
        selected.len(),
        products.len(),
        filter.describe()
    );
    Ok(selected)
}

/// Select the single canonical product matching `filter`.
///
/// When several products match (e.g. re-releases of the same combined
/// spectrum), the first in listing order is taken.
pub fn canonical_product(
    products: &[ProductRecord],
    filter: &ProductFilter,
) -> Result<ProductRecord, ResolveError> {
    let mut selected = select_products(products, filter)?;
    if selected.len() > 1 {
        debug!(
            "{} products matched policy [{}]; keeping the first ({})",
            selected.len(),
            filter.describe(),
            selected[0].filename()
        );
    }
    Ok(selected.swap_remove(0))
}

/// Select the observation with minimum angular separation from `reference`.
///
/// Ties, including several observations at exactly zero separation, resolve
/// to the first record in input order: the comparison is strict, so a later
/// record never displaces an equally distant earlier one.
pub fn closest_observation<'a>(
    observations: &'a [ObservationRecord],
    reference: SkyCoord,
) -> Result<&'a ObservationRecord, ResolveError> {
    let mut best: Option<(&ObservationRecord, f64)> = None;

    for obs in observations {
        let separation = reference.separation_deg(&obs.position());
        match best {
            Some((_, best_sep)) if separation >= best_sep => {}
            _ => best = Some((obs, separation)),
        }
    }

    match best {
        Some((obs, separation)) => {
            debug!(
                "Closest observation to {} is '{}' at {:.6} deg",
                reference, obs.obs_id, separation
            );
            Ok(obs)
        }
        None => Err(ResolveError::NoObservations),
    }
}
