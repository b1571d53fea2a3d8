//! Population-level stellar parameter catalog.
//!
//! A subset of the survey's combined parameter catalog, used as background
//! context in the population panel. Rows with sentinel or non-finite values
//! are dropped at load time so panel assembly never re-validates.

use std::path::Path;

use fitsio::FitsFile;
use log::debug;

use super::{parameter_is_valid, DatasetError};

/// Parallel parameter columns for a set of catalog stars.
#[derive(Debug, Clone, Default)]
pub struct PopulationCatalog {
    /// Effective temperatures in Kelvin
    pub teff_k: Vec<f64>,
    /// Log surface gravities (cgs)
    pub logg: Vec<f64>,
    /// Metallicities [M/H] in dex
    pub m_h: Vec<f64>,
    /// Catalog identifiers
    pub ids: Vec<String>,
}

impl PopulationCatalog {
    /// Load a catalog FITS file (`CATALOG` HDU).
    ///
    /// Rows where any parameter is invalid are skipped; the remaining columns
    /// stay parallel.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let path_str = path.display().to_string();
        let fits = |source| DatasetError::Fits {
            path: path_str.clone(),
            source,
        };

        let mut file = FitsFile::open(path).map_err(fits)?;
        let hdu = file.hdu("CATALOG").map_err(fits)?;

        let teff: Vec<f64> = hdu.read_col(&mut file, "TEFF").map_err(fits)?;
        let logg: Vec<f64> = hdu.read_col(&mut file, "LOGG").map_err(fits)?;
        let m_h: Vec<f64> = hdu.read_col(&mut file, "M_H").map_err(fits)?;
        let ids: Vec<String> = hdu.read_col(&mut file, "APOGEE_ID").map_err(fits)?;

        let total = teff.len();
        let mut catalog = PopulationCatalog::default();
        for i in 0..total {
            let (t, g, m) = (teff[i], logg[i], m_h[i]);
            if parameter_is_valid(t) && parameter_is_valid(g) && parameter_is_valid(m) {
                catalog.teff_k.push(t);
                catalog.logg.push(g);
                catalog.m_h.push(m);
                catalog.ids.push(ids.get(i).cloned().unwrap_or_default());
            }
        }

        debug!(
            "Loaded {} of {} catalog rows from {}",
            catalog.len(),
            total,
            path_str
        );
        Ok(catalog)
    }

    /// Number of stars in the catalog.
    pub fn len(&self) -> usize {
        self.teff_k.len()
    }

    /// Whether the catalog holds no stars.
    pub fn is_empty(&self) -> bool {
        self.teff_k.is_empty()
    }

    /// Evenly subsample down to at most `max_stars` entries.
    ///
    /// Keeps every k-th row so the subsample spans the full parameter range.
    /// Deterministic for a given input.
    pub fn subsample(&self, max_stars: usize) -> PopulationCatalog {
        if max_stars == 0 || self.len() <= max_stars {
            return self.clone();
        }
        let stride = self.len().div_ceil(max_stars);
        let pick = |v: &[f64]| v.iter().step_by(stride).copied().collect();
        PopulationCatalog {
            teff_k: pick(&self.teff_k),
            logg: pick(&self.logg),
            m_h: pick(&self.m_h),
            ids: self.ids.iter().step_by(stride).cloned().collect(),
        }
    }
}
