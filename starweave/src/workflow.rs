//! End-to-end characterization workflow.
//!
//! Strings the stages together for one star: query the spectroscopic
//! observation, resolve and download the canonical combined spectrum, find
//! the closest time-series observation by cone search, resolve and download
//! its light curve, then assemble and render the composite figure. Each
//! stage blocks before the next begins; absence of data fails fast and is
//! never retried.

use std::path::PathBuf;

use log::info;
use thiserror::Error;

use crate::archive::{ArchiveClient, ArchiveError, IntentType, QueryCriteria};
use crate::config::WorkflowConfig;
use crate::dataset::{DatasetError, LightCurveDataset, PopulationCatalog, SpectrumDataset};
use crate::download::{DownloadError, DownloadManager};
use crate::figure::render::{self, RenderError};
use crate::figure::{CompositeFigure, FigureError};
use crate::resolve::{self, ProductFilter, ResolveError};

/// Provenance name of the spectroscopic survey.
pub const SPECTRUM_PROVENANCE: &str = "APOGEE";

/// Collection name of the time-series survey.
pub const TIMESERIES_COLLECTION: &str = "TESS";

/// Product subgroup label of the combined spectrum.
pub const COMBINED_SPECTRUM_SUBGROUP: &str = "combined spectrum";

/// Product subgroup label of the light curve.
pub const LIGHTCURVE_SUBGROUP: &str = "lightcurve";

/// Errors from a characterization run.
///
/// Every variant names the identifier and the failing stage so a caller (or
/// the CLI user) can tell where the pipeline stopped.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The spectroscopic query returned zero observations.
    #[error("No spectroscopic observations found for target '{identifier}' (query stage)")]
    NoObservationFound { identifier: String },

    /// The time-series cone search returned zero observations.
    #[error(
        "No time-series observations within {radius_deg} deg of '{identifier}' (query stage)"
    )]
    NoTimeSeriesFound {
        identifier: String,
        radius_deg: f64,
    },

    /// Archive access failed.
    #[error("Archive access failed for '{identifier}' (query stage): {source}")]
    Archive {
        identifier: String,
        source: ArchiveError,
    },

    /// Product or observation resolution failed.
    #[error("Resolution failed for '{identifier}' (resolve stage): {source}")]
    Resolve {
        identifier: String,
        source: ResolveError,
    },

    /// One or more required downloads failed.
    #[error("Download failed for '{identifier}' (download stage): {source}")]
    Download {
        identifier: String,
        source: DownloadError,
    },

    /// A downloaded file could not be loaded or validated.
    #[error("Dataset loading failed for '{identifier}' (parse stage): {source}")]
    Dataset {
        identifier: String,
        source: DatasetError,
    },

    /// Figure assembly failed.
    #[error("Figure assembly failed for '{identifier}' (plot stage): {source}")]
    Figure {
        identifier: String,
        source: FigureError,
    },

    /// The artifact could not be rendered.
    #[error("Rendering failed for '{identifier}' (plot stage): {source}")]
    Render {
        identifier: String,
        source: RenderError,
    },
}

/// The result of a successful characterization run.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Stellar identifier the artifact belongs to
    pub identifier: String,
    /// Path of the rendered composite figure
    pub figure_path: PathBuf,
    /// Non-fatal quality warnings accumulated along the way
    pub warnings: Vec<String>,
}

/// The four-stage characterization pipeline over an archive client.
pub struct VariableStarWorkflow<'a, C: ArchiveClient> {
    client: &'a C,
    config: WorkflowConfig,
}

impl<'a, C: ArchiveClient> VariableStarWorkflow<'a, C> {
    /// Build a workflow over `client` with the given configuration.
    pub fn new(client: &'a C, config: WorkflowConfig) -> Self {
        Self { client, config }
    }

    /// The configuration this workflow runs with.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Characterize one star, producing the composite figure artifact.
    pub fn characterize_star(&self, identifier: &str) -> Result<Artifact, WorkflowError> {
        let archive_err = |source| WorkflowError::Archive {
            identifier: identifier.to_string(),
            source,
        };
        let resolve_err = |source| WorkflowError::Resolve {
            identifier: identifier.to_string(),
            source,
        };
        let download_err = |source| WorkflowError::Download {
            identifier: identifier.to_string(),
            source,
        };
        let dataset_err = |source| WorkflowError::Dataset {
            identifier: identifier.to_string(),
            source,
        };

        // Stage 1: spectroscopic observation for the named target
        info!("Querying {SPECTRUM_PROVENANCE} observations for '{identifier}'");
        let criteria = QueryCriteria::for_target(identifier)
            .with_provenance(SPECTRUM_PROVENANCE)
            .with_dataproduct_type("spectrum")
            .with_intent(IntentType::Science);
        let observations = self
            .client
            .query_observations(&criteria)
            .map_err(archive_err)?;
        let spectrum_obs = observations
            .first()
            .ok_or_else(|| WorkflowError::NoObservationFound {
                identifier: identifier.to_string(),
            })?;

        // Stage 2: canonical combined-spectrum product
        let products = self
            .client
            .list_products(spectrum_obs)
            .map_err(archive_err)?;
        // Combined spectra are higher-level (level 3) products
        let spectrum_filter = ProductFilter::subgroup(COMBINED_SPECTRUM_SUBGROUP)
            .with_extension("fits")
            .with_min_calib_level(3)
            .minimum_recommended();
        let spectrum_product =
            resolve::canonical_product(&products, &spectrum_filter).map_err(resolve_err)?;

        let manager = DownloadManager::new(self.client, &self.config.cache_dir);
        let manifest = manager
            .fetch_all(std::slice::from_ref(&spectrum_product))
            .map_err(download_err)?;
        manifest.require_complete().map_err(download_err)?;
        let spectrum_path = manifest
            .path_for(spectrum_product.filename())
            .expect("complete manifest carries the requested product")
            .to_path_buf();

        // Stage 3: closest time-series observation around the resolved position
        let reference = spectrum_obs.position();
        info!(
            "Searching {TIMESERIES_COLLECTION} time series within {:.3} deg of {}",
            self.config.search_radius_deg, reference
        );
        let ts_criteria = QueryCriteria::cone(reference, self.config.search_radius_deg)
            .with_collection(TIMESERIES_COLLECTION)
            .with_dataproduct_type("timeseries")
            .with_intent(IntentType::Science);
        let ts_observations = self
            .client
            .query_observations(&ts_criteria)
            .map_err(archive_err)?;
        if ts_observations.is_empty() {
            return Err(WorkflowError::NoTimeSeriesFound {
                identifier: identifier.to_string(),
                radius_deg: self.config.search_radius_deg,
            });
        }
        let closest =
            resolve::closest_observation(&ts_observations, reference).map_err(resolve_err)?;

        // Stage 4: light-curve product
        let ts_products = self.client.list_products(closest).map_err(archive_err)?;
        let lc_filter = ProductFilter::subgroup(LIGHTCURVE_SUBGROUP).with_extension("fits");
        let lc_product =
            resolve::canonical_product(&ts_products, &lc_filter).map_err(resolve_err)?;
        let lc_manifest = manager
            .fetch_all(std::slice::from_ref(&lc_product))
            .map_err(download_err)?;
        lc_manifest.require_complete().map_err(download_err)?;
        let lc_path = lc_manifest
            .path_for(lc_product.filename())
            .expect("complete manifest carries the requested product")
            .to_path_buf();

        // Stage 5: parse, correlate, render
        info!("Loading datasets for '{identifier}'");
        let spectrum = SpectrumDataset::load(&spectrum_path).map_err(dataset_err)?;
        let light_curve = LightCurveDataset::load(&lc_path).map_err(dataset_err)?;

        let mut builder = CompositeFigure::builder(identifier)
            .spectrum(spectrum)
            .light_curve(light_curve)
            .uncertainty_threshold(self.config.uncertainty_threshold);
        if let Some(catalog_path) = &self.config.catalog_path {
            let catalog = PopulationCatalog::load(catalog_path)
                .map_err(dataset_err)?
                .subsample(self.config.catalog_subsample);
            builder = builder.population(catalog);
        }

        let figure = builder.build().map_err(|source| WorkflowError::Figure {
            identifier: identifier.to_string(),
            source,
        })?;
        let figure_path =
            render::save_png(&figure, &self.config.output_dir).map_err(|source| {
                WorkflowError::Render {
                    identifier: identifier.to_string(),
                    source,
                }
            })?;

        info!("Characterization of '{identifier}' complete");
        Ok(Artifact {
            identifier: identifier.to_string(),
            figure_path,
            warnings: figure.warnings,
        })
    }
}
