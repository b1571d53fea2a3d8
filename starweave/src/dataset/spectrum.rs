//! Combined-spectrum dataset loader.
//!
//! The combined spectrum file carries a `SPECTRUM` binary table (observed
//! flux, best-fit model flux, per-pixel uncertainty) whose wavelength grid is
//! not stored as a column: it is derived from three header scalars, a log10
//! reference wavelength (`CRVAL1`), a log10 step (`CDELT1`) and a pixel count
//! (`NWAVE`). Stellar parameters live in a one-row `PARAMS` table with both
//! calibrated and raw pipeline-fit values.

use std::path::Path;

use fitsio::FitsFile;

use super::{parameter_is_valid, DatasetError, ParameterSource, StellarParameters};

/// Log-spaced wavelength grid derived from three header scalars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavelengthSolution {
    /// log10 of the first pixel's wavelength
    pub crval_log: f64,
    /// log10 step between adjacent pixels
    pub cdelt_log: f64,
    /// Number of pixels
    pub n_pixels: usize,
}

impl WavelengthSolution {
    /// Validate and construct a solution.
    ///
    /// The step must be strictly positive so the derived grid is
    /// monotonically increasing.
    pub fn new(crval_log: f64, cdelt_log: f64, n_pixels: usize) -> Result<Self, String> {
        if !crval_log.is_finite() || !cdelt_log.is_finite() {
            return Err(format!(
                "non-finite header scalars: CRVAL1={crval_log}, CDELT1={cdelt_log}"
            ));
        }
        if cdelt_log <= 0.0 {
            return Err(format!("log step must be positive, got {cdelt_log}"));
        }
        if n_pixels == 0 {
            return Err("pixel count is zero".to_string());
        }
        Ok(Self {
            crval_log,
            cdelt_log,
            n_pixels,
        })
    }

    /// Materialize the wavelength array.
    ///
    /// Exactly `n_pixels` elements, monotonically increasing:
    /// `10^(crval_log + i * cdelt_log)` for pixel `i`.
    pub fn wavelengths(&self) -> Vec<f64> {
        (0..self.n_pixels)
            .map(|i| 10f64.powf(self.crval_log + i as f64 * self.cdelt_log))
            .collect()
    }
}

/// A combined spectrum with model fit and stellar parameters.
#[derive(Debug, Clone)]
pub struct SpectrumDataset {
    /// Target identifier the spectrum belongs to
    pub target_id: String,
    /// Wavelength grid parameters
    pub solution: WavelengthSolution,
    /// Observed flux per pixel
    pub flux: Vec<f64>,
    /// Best-fit model flux per pixel
    pub model: Vec<f64>,
    /// Per-pixel flux uncertainty
    pub uncertainty: Vec<f64>,
    /// Survey-calibrated parameters, when valid
    calibrated: Option<StellarParameters>,
    /// Raw pipeline-fit parameters (always present)
    pipeline_fit: StellarParameters,
}

impl SpectrumDataset {
    /// Load a combined-spectrum FITS file.
    ///
    /// # Errors
    ///
    /// Fails when HDUs/columns/keys are missing, when a flux-like column
    /// disagrees with the declared pixel count, or when the wavelength
    /// triplet cannot form a monotonic grid.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let path_str = path.display().to_string();
        let fits = |source| DatasetError::Fits {
            path: path_str.clone(),
            source,
        };

        let mut file = FitsFile::open(path).map_err(fits)?;

        let hdu = file.hdu("SPECTRUM").map_err(fits)?;
        let crval: f64 = hdu.read_key(&mut file, "CRVAL1").map_err(fits)?;
        let cdelt: f64 = hdu.read_key(&mut file, "CDELT1").map_err(fits)?;
        let n_pixels: i64 = hdu.read_key(&mut file, "NWAVE").map_err(fits)?;

        let solution = WavelengthSolution::new(crval, cdelt, n_pixels.max(0) as usize).map_err(
            |reason| DatasetError::InvalidWavelengthSolution {
                path: path_str.clone(),
                reason,
            },
        )?;

        let flux: Vec<f64> = hdu.read_col(&mut file, "FLUX").map_err(fits)?;
        let model: Vec<f64> = hdu.read_col(&mut file, "MODEL").map_err(fits)?;
        let uncertainty: Vec<f64> = hdu.read_col(&mut file, "UNCERT").map_err(fits)?;

        for (column, values) in [("FLUX", &flux), ("MODEL", &model), ("UNCERT", &uncertainty)] {
            if values.len() != solution.n_pixels {
                return Err(DatasetError::LengthMismatch {
                    path: path_str.clone(),
                    column: column.to_string(),
                    expected: solution.n_pixels,
                    actual: values.len(),
                });
            }
        }

        let params = file.hdu("PARAMS").map_err(fits)?;
        let target_ids: Vec<String> = params.read_col(&mut file, "APOGEE_ID").map_err(fits)?;
        let target_id = target_ids
            .into_iter()
            .next()
            .ok_or_else(|| DatasetError::EmptyTable {
                path: path_str.clone(),
                table: "PARAMS".to_string(),
            })?;

        let read_param = |file: &mut FitsFile, name: &str| -> Result<f64, DatasetError> {
            let values: Vec<f64> = params.read_col(file, name).map_err(|source| {
                DatasetError::Fits {
                    path: path_str.clone(),
                    source,
                }
            })?;
            values.first().copied().ok_or_else(|| DatasetError::EmptyTable {
                path: path_str.clone(),
                table: "PARAMS".to_string(),
            })
        };

        let teff = read_param(&mut file, "TEFF")?;
        let logg = read_param(&mut file, "LOGG")?;
        let m_h = read_param(&mut file, "M_H")?;
        let teff_fit = read_param(&mut file, "TEFF_FIT")?;
        let logg_fit = read_param(&mut file, "LOGG_FIT")?;
        let m_h_fit = read_param(&mut file, "M_H_FIT")?;

        let calibrated = if [teff, logg, m_h].iter().all(|&v| parameter_is_valid(v)) {
            Some(StellarParameters {
                teff_k: teff,
                logg,
                m_h,
                source: ParameterSource::Calibrated,
            })
        } else {
            None
        };
        let pipeline_fit = StellarParameters {
            teff_k: teff_fit,
            logg: logg_fit,
            m_h: m_h_fit,
            source: ParameterSource::PipelineFit,
        };

        Ok(Self {
            target_id,
            solution,
            flux,
            model,
            uncertainty,
            calibrated,
            pipeline_fit,
        })
    }

    /// Construct a dataset from already-extracted parts.
    ///
    /// For tests and programmatic ingestion; [`SpectrumDataset::load`] is the
    /// usual path. Panics if a flux-like array disagrees with the solution's
    /// pixel count, since that is a programming error here rather than a
    /// file-format problem.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        target_id: &str,
        solution: WavelengthSolution,
        flux: Vec<f64>,
        model: Vec<f64>,
        uncertainty: Vec<f64>,
        calibrated: Option<StellarParameters>,
        pipeline_fit: StellarParameters,
    ) -> Self {
        for (name, values) in [("flux", &flux), ("model", &model), ("uncertainty", &uncertainty)] {
            assert_eq!(
                values.len(),
                solution.n_pixels,
                "{name} length must equal the solution pixel count"
            );
        }
        Self {
            target_id: target_id.to_string(),
            solution,
            flux,
            model,
            uncertainty,
            calibrated,
            pipeline_fit,
        }
    }

    /// Calibrated parameters, if the survey flagged them valid.
    pub fn calibrated_parameters(&self) -> Option<StellarParameters> {
        self.calibrated
    }

    /// Raw pipeline-fit parameters.
    pub fn pipeline_fit_parameters(&self) -> StellarParameters {
        self.pipeline_fit
    }

    /// Best available parameters: calibrated when valid, pipeline fit
    /// otherwise. The boolean reports whether the fallback was taken.
    pub fn preferred_parameters(&self) -> (StellarParameters, bool) {
        match self.calibrated {
            Some(params) => (params, false),
            None => (self.pipeline_fit, true),
        }
    }

    /// Indices of pixels whose relative uncertainty is strictly below
    /// `relative_threshold`.
    ///
    /// Pixels with non-finite flux or uncertainty are always excluded, as is
    /// anything at or above the threshold. Excluded pixels are simply
    /// omitted from plotted series, leaving visible gaps.
    pub fn reliable_indices(&self, relative_threshold: f64) -> Vec<usize> {
        (0..self.solution.n_pixels)
            .filter(|&i| {
                let flux = self.flux[i];
                let uncert = self.uncertainty[i];
                flux.is_finite()
                    && uncert.is_finite()
                    && uncert < relative_threshold * flux.abs()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::PARAMETER_SENTINEL;
    use approx::assert_relative_eq;
    use fitsio::tables::{ColumnDataType, ColumnDescription};

    struct SpectrumFixture {
        crval: f64,
        cdelt: f64,
        flux: Vec<f64>,
        model: Vec<f64>,
        uncertainty: Vec<f64>,
        calibrated: [f64; 3],
        pipeline_fit: [f64; 3],
        declared_pixels: Option<usize>,
    }

    impl SpectrumFixture {
        fn new(n: usize) -> Self {
            Self {
                crval: 4.179,
                cdelt: 6e-6,
                flux: vec![1.0; n],
                model: vec![0.98; n],
                uncertainty: vec![0.01; n],
                calibrated: [4750.0, 2.3, -0.15],
                pipeline_fit: [4810.0, 2.4, -0.12],
                declared_pixels: None,
            }
        }

        fn write(&self, path: &Path) {
            let mut file = FitsFile::create(path).open().unwrap();

            let spectrum_cols = vec![
                ColumnDescription::new("FLUX")
                    .with_type(ColumnDataType::Double)
                    .create()
                    .unwrap(),
                ColumnDescription::new("MODEL")
                    .with_type(ColumnDataType::Double)
                    .create()
                    .unwrap(),
                ColumnDescription::new("UNCERT")
                    .with_type(ColumnDataType::Double)
                    .create()
                    .unwrap(),
            ];
            let hdu = file.create_table("SPECTRUM", &spectrum_cols).unwrap();
            hdu.write_col(&mut file, "FLUX", &self.flux).unwrap();
            hdu.write_col(&mut file, "MODEL", &self.model).unwrap();
            hdu.write_col(&mut file, "UNCERT", &self.uncertainty).unwrap();
            hdu.write_key(&mut file, "CRVAL1", self.crval).unwrap();
            hdu.write_key(&mut file, "CDELT1", self.cdelt).unwrap();
            let declared = self.declared_pixels.unwrap_or(self.flux.len());
            hdu.write_key(&mut file, "NWAVE", declared as i64).unwrap();

            let param_cols = vec![
                ColumnDescription::new("APOGEE_ID")
                    .with_type(ColumnDataType::String)
                    .that_repeats(24)
                    .create()
                    .unwrap(),
                ColumnDescription::new("TEFF")
                    .with_type(ColumnDataType::Double)
                    .create()
                    .unwrap(),
                ColumnDescription::new("LOGG")
                    .with_type(ColumnDataType::Double)
                    .create()
                    .unwrap(),
                ColumnDescription::new("M_H")
                    .with_type(ColumnDataType::Double)
                    .create()
                    .unwrap(),
                ColumnDescription::new("TEFF_FIT")
                    .with_type(ColumnDataType::Double)
                    .create()
                    .unwrap(),
                ColumnDescription::new("LOGG_FIT")
                    .with_type(ColumnDataType::Double)
                    .create()
                    .unwrap(),
                ColumnDescription::new("M_H_FIT")
                    .with_type(ColumnDataType::Double)
                    .create()
                    .unwrap(),
            ];
            let params = file.create_table("PARAMS", &param_cols).unwrap();
            params
                .write_col(&mut file, "APOGEE_ID", &["V1154_Cyg".to_string()])
                .unwrap();
            params
                .write_col(&mut file, "TEFF", &[self.calibrated[0]])
                .unwrap();
            params
                .write_col(&mut file, "LOGG", &[self.calibrated[1]])
                .unwrap();
            params
                .write_col(&mut file, "M_H", &[self.calibrated[2]])
                .unwrap();
            params
                .write_col(&mut file, "TEFF_FIT", &[self.pipeline_fit[0]])
                .unwrap();
            params
                .write_col(&mut file, "LOGG_FIT", &[self.pipeline_fit[1]])
                .unwrap();
            params
                .write_col(&mut file, "M_H_FIT", &[self.pipeline_fit[2]])
                .unwrap();
        }
    }

    #[test]
    fn test_wavelength_solution_count_and_monotonicity() {
        let solution = WavelengthSolution::new(4.179, 6e-6, 8575).unwrap();
        let wavelengths = solution.wavelengths();

        assert_eq!(wavelengths.len(), 8575);
        for pair in wavelengths.windows(2) {
            assert!(pair[0] < pair[1], "grid must increase: {pair:?}");
        }
        // First pixel is 10^crval
        assert_relative_eq!(wavelengths[0], 10f64.powf(4.179), max_relative = 1e-12);
    }

    #[test]
    fn test_wavelength_solution_rejects_bad_triplets() {
        assert!(WavelengthSolution::new(4.179, 0.0, 100).is_err());
        assert!(WavelengthSolution::new(4.179, -1e-6, 100).is_err());
        assert!(WavelengthSolution::new(f64::NAN, 1e-6, 100).is_err());
        assert!(WavelengthSolution::new(4.179, 1e-6, 0).is_err());
    }

    #[test]
    fn test_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spectrum.fits");
        let fixture = SpectrumFixture::new(64);
        fixture.write(&path);

        let dataset = SpectrumDataset::load(&path).unwrap();
        assert_eq!(dataset.target_id, "V1154_Cyg");
        assert_eq!(dataset.flux.len(), 64);
        assert_eq!(dataset.solution.n_pixels, 64);

        let calibrated = dataset.calibrated_parameters().expect("valid calibration");
        assert_relative_eq!(calibrated.teff_k, 4750.0);
        assert_eq!(calibrated.source, ParameterSource::Calibrated);

        let (preferred, fell_back) = dataset.preferred_parameters();
        assert!(!fell_back);
        assert_relative_eq!(preferred.m_h, -0.15);
    }

    #[test]
    fn test_length_mismatch_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.fits");
        let mut fixture = SpectrumFixture::new(64);
        fixture.declared_pixels = Some(100);
        fixture.write(&path);

        let err = SpectrumDataset::load(&path).unwrap_err();
        match err {
            DatasetError::LengthMismatch {
                expected, actual, ..
            } => {
                assert_eq!((expected, actual), (100, 64));
            }
            other => panic!("Expected LengthMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_sentinel_calibration_falls_back_to_pipeline_fit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uncalibrated.fits");
        let mut fixture = SpectrumFixture::new(16);
        fixture.calibrated = [PARAMETER_SENTINEL, PARAMETER_SENTINEL, PARAMETER_SENTINEL];
        fixture.write(&path);

        let dataset = SpectrumDataset::load(&path).unwrap();
        assert!(dataset.calibrated_parameters().is_none());

        let (preferred, fell_back) = dataset.preferred_parameters();
        assert!(fell_back);
        assert_eq!(preferred.source, ParameterSource::PipelineFit);
        assert_relative_eq!(preferred.teff_k, 4810.0);
    }

    #[test]
    fn test_reliable_indices_strict_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("masked.fits");
        let mut fixture = SpectrumFixture::new(5);
        fixture.flux = vec![1.0, 1.0, 1.0, 1.0, 1.0];
        // 1%, exactly 10%, 9.99%, NaN, 50%
        fixture.uncertainty = vec![0.01, 0.10, 0.0999, f64::NAN, 0.5];
        fixture.write(&path);

        let dataset = SpectrumDataset::load(&path).unwrap();
        let kept = dataset.reliable_indices(0.10);

        // Exactly-at-threshold and NaN pixels are excluded
        assert_eq!(kept, vec![0, 2]);

        let below: usize = dataset
            .uncertainty
            .iter()
            .filter(|u| u.is_finite() && **u < 0.10)
            .count();
        assert_eq!(kept.len(), below);
    }
}
