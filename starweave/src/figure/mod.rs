//! Composite figure assembly.
//!
//! The builder turns loaded datasets into a [`CompositeFigure`]: plain series
//! data plus metadata, with masking, fallbacks and axis bounds already
//! resolved. Rendering is a separate step (see [`render`]) so everything up
//! to the drawing call is deterministic and unit-testable.

pub mod color;
pub mod render;

use log::warn;
use thiserror::Error;

use crate::dataset::{
    LightCurveDataset, PopulationCatalog, SpectrumDataset, StellarParameters,
};

/// Default relative-uncertainty threshold for spectrum pixel masking.
pub const DEFAULT_UNCERTAINTY_THRESHOLD: f64 = 0.10;

/// Cap on reference gridlines in the light-curve panel.
const MAX_GRIDLINES: usize = 100;

/// Errors raised during figure assembly.
#[derive(Debug, Error)]
pub enum FigureError {
    /// The builder was finalized without a required dataset.
    #[error("Cannot build figure for '{identifier}': missing {dataset} dataset")]
    MissingDataset {
        identifier: String,
        dataset: &'static str,
    },

    /// A panel ended up with nothing to draw.
    #[error("No plottable data for '{identifier}' in the {panel} panel: {reason}")]
    NoPlottableData {
        identifier: String,
        panel: &'static str,
        reason: String,
    },
}

/// One contiguous run of reliable spectrum pixels.
///
/// Runs are separated by masked pixels; rendering draws each run as its own
/// line segment so the gaps stay visible.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumRun {
    /// Wavelengths of the run's pixels
    pub wavelengths: Vec<f64>,
    /// Observed flux
    pub observed: Vec<f64>,
    /// Best-fit model flux
    pub model: Vec<f64>,
}

/// Spectrum panel data: masked observed/model series on a log-spaced grid.
#[derive(Debug, Clone)]
pub struct SpectrumPanel {
    /// Contiguous reliable-pixel runs, in wavelength order
    pub runs: Vec<SpectrumRun>,
    /// Wavelength bounds over kept pixels
    pub wavelength_bounds: (f64, f64),
    /// Flux bounds over kept observed and model values
    pub flux_bounds: (f64, f64),
}

impl SpectrumPanel {
    /// Total number of kept pixels across all runs.
    pub fn kept_pixels(&self) -> usize {
        self.runs.iter().map(|r| r.wavelengths.len()).sum()
    }
}

/// Light-curve panel data: finite samples plus unit-interval gridlines.
#[derive(Debug, Clone)]
pub struct LightCurvePanel {
    /// Finite (time, flux) samples
    pub samples: Vec<(f64, f64)>,
    /// Time bounds over finite samples
    pub time_bounds: (f64, f64),
    /// Flux bounds over finite samples
    pub flux_bounds: (f64, f64),
    /// Reference gridline positions at unit (or strided) day intervals
    pub gridlines: Vec<f64>,
}

/// Population panel data: catalog scatter plus the target's position.
#[derive(Debug, Clone)]
pub struct PopulationPanel {
    /// Background catalog stars (parallel columns)
    pub catalog: PopulationCatalog,
    /// The target star's parameters (calibrated or pipeline-fit)
    pub target: StellarParameters,
}

/// Assembled figure data for one star, ready to render.
#[derive(Debug, Clone)]
pub struct CompositeFigure {
    /// Stellar identifier joining all panels
    pub identifier: String,
    /// Population panel; absent when no catalog was supplied
    pub population: Option<PopulationPanel>,
    /// Spectrum panel
    pub spectrum: SpectrumPanel,
    /// Light-curve panel
    pub light_curve: LightCurvePanel,
    /// Non-fatal quality warnings accumulated during assembly
    pub warnings: Vec<String>,
}

impl CompositeFigure {
    /// Start building a figure for `identifier`.
    pub fn builder(identifier: &str) -> CompositeFigureBuilder {
        CompositeFigureBuilder {
            identifier: identifier.to_string(),
            spectrum: None,
            light_curve: None,
            catalog: None,
            uncertainty_threshold: DEFAULT_UNCERTAINTY_THRESHOLD,
        }
    }

    /// Deterministic artifact filename for this figure.
    pub fn artifact_filename(&self) -> String {
        format!("{}_APOGEE_spec_TESS_lightcurve.png", self.identifier)
    }
}

/// Builder collecting datasets for a [`CompositeFigure`].
pub struct CompositeFigureBuilder {
    identifier: String,
    spectrum: Option<SpectrumDataset>,
    light_curve: Option<LightCurveDataset>,
    catalog: Option<PopulationCatalog>,
    uncertainty_threshold: f64,
}

impl CompositeFigureBuilder {
    /// Attach the combined spectrum.
    pub fn spectrum(mut self, dataset: SpectrumDataset) -> Self {
        self.spectrum = Some(dataset);
        self
    }

    /// Attach the light curve.
    pub fn light_curve(mut self, dataset: LightCurveDataset) -> Self {
        self.light_curve = Some(dataset);
        self
    }

    /// Attach an optional population catalog.
    pub fn population(mut self, catalog: PopulationCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Override the relative-uncertainty masking threshold.
    pub fn uncertainty_threshold(mut self, threshold: f64) -> Self {
        self.uncertainty_threshold = threshold;
        self
    }

    /// Assemble the figure.
    ///
    /// # Errors
    ///
    /// Fails when a required dataset is missing or a panel has nothing left
    /// to draw after masking/filtering. No partial figure is produced.
    pub fn build(self) -> Result<CompositeFigure, FigureError> {
        let identifier = self.identifier;
        let mut warnings = Vec::new();

        let spectrum_ds = self.spectrum.ok_or_else(|| FigureError::MissingDataset {
            identifier: identifier.clone(),
            dataset: "spectrum",
        })?;
        let light_curve_ds = self.light_curve.ok_or_else(|| FigureError::MissingDataset {
            identifier: identifier.clone(),
            dataset: "light curve",
        })?;

        let spectrum = build_spectrum_panel(&identifier, &spectrum_ds, self.uncertainty_threshold)?;
        let light_curve = build_light_curve_panel(&identifier, &light_curve_ds)?;

        let population = self.catalog.map(|catalog| {
            let (target, fell_back) = spectrum_ds.preferred_parameters();
            if fell_back {
                let message = format!(
                    "Calibrated stellar parameters for '{identifier}' are flagged invalid; \
                     using uncalibrated pipeline-fit values"
                );
                warn!("{message}");
                warnings.push(message);
            }
            PopulationPanel { catalog, target }
        });

        Ok(CompositeFigure {
            identifier,
            population,
            spectrum,
            light_curve,
            warnings,
        })
    }
}

fn build_spectrum_panel(
    identifier: &str,
    dataset: &SpectrumDataset,
    threshold: f64,
) -> Result<SpectrumPanel, FigureError> {
    let kept = dataset.reliable_indices(threshold);
    if kept.is_empty() {
        return Err(FigureError::NoPlottableData {
            identifier: identifier.to_string(),
            panel: "spectrum",
            reason: format!(
                "all {} pixels exceed the {:.0}% relative uncertainty threshold",
                dataset.solution.n_pixels,
                threshold * 100.0
            ),
        });
    }

    let wavelengths = dataset.solution.wavelengths();

    // Split kept indices into contiguous runs so masked pixels stay as gaps.
    let mut runs: Vec<SpectrumRun> = Vec::new();
    let mut current: Option<(usize, SpectrumRun)> = None;
    for &i in &kept {
        let extend = matches!(current, Some((last, _)) if i == last + 1);
        if !extend {
            if let Some((_, run)) = current.take() {
                runs.push(run);
            }
            current = Some((
                i,
                SpectrumRun {
                    wavelengths: Vec::new(),
                    observed: Vec::new(),
                    model: Vec::new(),
                },
            ));
        }
        let (last, run) = current.as_mut().expect("run started above");
        *last = i;
        run.wavelengths.push(wavelengths[i]);
        run.observed.push(dataset.flux[i]);
        run.model.push(dataset.model[i]);
    }
    if let Some((_, run)) = current {
        runs.push(run);
    }

    let wavelength_bounds = (
        wavelengths[kept[0]],
        wavelengths[*kept.last().expect("non-empty")],
    );
    let flux_values = runs
        .iter()
        .flat_map(|r| r.observed.iter().chain(r.model.iter()))
        .copied();
    let flux_bounds = min_max(flux_values).expect("kept pixels are finite");

    Ok(SpectrumPanel {
        runs,
        wavelength_bounds,
        flux_bounds,
    })
}

fn build_light_curve_panel(
    identifier: &str,
    dataset: &LightCurveDataset,
) -> Result<LightCurvePanel, FigureError> {
    let samples = dataset.finite_samples();
    if samples.is_empty() {
        return Err(FigureError::NoPlottableData {
            identifier: identifier.to_string(),
            panel: "light curve",
            reason: format!("all {} samples are undefined", dataset.time_days.len()),
        });
    }

    let time_bounds = min_max(samples.iter().map(|(t, _)| *t)).expect("non-empty");
    let flux_bounds = min_max(samples.iter().map(|(_, f)| *f)).expect("non-empty");

    Ok(LightCurvePanel {
        samples,
        time_bounds,
        flux_bounds,
        gridlines: unit_gridlines(time_bounds),
    })
}

/// Gridline positions at whole-day marks across `(lo, hi)`.
///
/// For very long baselines the spacing widens to keep the line count below
/// `MAX_GRIDLINES`, staying on integer-day positions.
fn unit_gridlines((lo, hi): (f64, f64)) -> Vec<f64> {
    let first = lo.ceil() as i64;
    let last = hi.floor() as i64;
    if last < first {
        return Vec::new();
    }
    let count = (last - first + 1) as usize;
    let stride = count.div_ceil(MAX_GRIDLINES).max(1) as i64;
    (first..=last)
        .step_by(stride as usize)
        .map(|d| d as f64)
        .collect()
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        None => Some((v, v)),
    })
}
