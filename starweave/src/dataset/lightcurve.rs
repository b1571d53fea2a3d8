//! Time-series (light curve) dataset loader.
//!
//! Light curve files carry a `LIGHTCURVE` binary table with `TIME` (days
//! since the survey reference epoch, BTJD for TESS products) and `FLUX`
//! columns. Samples the pipeline flagged as unusable arrive as NaN and must
//! not disturb axis-range computation.

use std::path::Path;

use fitsio::FitsFile;

use super::DatasetError;

/// A photometric time series for one target.
#[derive(Debug, Clone)]
pub struct LightCurveDataset {
    /// Target name from the file header
    pub target_name: String,
    /// Sample times in days since the survey reference epoch
    pub time_days: Vec<f64>,
    /// Flux per sample; NaN marks unusable cadences
    pub flux: Vec<f64>,
}

impl LightCurveDataset {
    /// Load a light-curve FITS file.
    ///
    /// # Errors
    ///
    /// Fails when the `LIGHTCURVE` HDU or its columns are missing, when the
    /// time and flux columns disagree in length, or when the table is empty.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let path_str = path.display().to_string();
        let fits = |source| DatasetError::Fits {
            path: path_str.clone(),
            source,
        };

        let mut file = FitsFile::open(path).map_err(fits)?;
        let hdu = file.hdu("LIGHTCURVE").map_err(fits)?;

        let target_name: String = hdu.read_key(&mut file, "OBJECT").map_err(fits)?;
        let time_days: Vec<f64> = hdu.read_col(&mut file, "TIME").map_err(fits)?;
        let flux: Vec<f64> = hdu.read_col(&mut file, "FLUX").map_err(fits)?;

        if time_days.len() != flux.len() {
            return Err(DatasetError::LengthMismatch {
                path: path_str,
                column: "FLUX".to_string(),
                expected: time_days.len(),
                actual: flux.len(),
            });
        }
        if time_days.is_empty() {
            return Err(DatasetError::EmptyTable {
                path: path_str,
                table: "LIGHTCURVE".to_string(),
            });
        }

        Ok(Self {
            target_name,
            time_days,
            flux,
        })
    }

    /// Samples where both time and flux are finite, in time order as stored.
    pub fn finite_samples(&self) -> Vec<(f64, f64)> {
        self.time_days
            .iter()
            .zip(self.flux.iter())
            .filter(|(t, f)| t.is_finite() && f.is_finite())
            .map(|(&t, &f)| (t, f))
            .collect()
    }

    /// Time bounds over finite samples, or None if nothing is finite.
    pub fn time_bounds(&self) -> Option<(f64, f64)> {
        bounds(self.finite_samples().iter().map(|(t, _)| *t))
    }

    /// Flux bounds over finite samples, or None if nothing is finite.
    pub fn flux_bounds(&self) -> Option<(f64, f64)> {
        bounds(self.finite_samples().iter().map(|(_, f)| *f))
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut result: Option<(f64, f64)> = None;
    for v in values {
        result = Some(match result {
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
            None => (v, v),
        });
    }
    result
}
