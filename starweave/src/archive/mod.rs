//! Archive access layer: observation metadata, product listings and downloads.
//!
//! The [`ArchiveClient`] trait is the seam between the workflow and the remote
//! archive. The production implementation ([`MastClient`]) speaks a MAST-style
//! HTTP API; tests substitute in-memory clients. Everything above this module
//! works with typed [`ObservationRecord`] and [`ProductRecord`] values rather
//! than raw archive rows.

mod mast;
mod session;

pub use mast::{MastClient, DEFAULT_BASE_URL};
pub use session::{ArchiveSession, SessionInfo};

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coords::SkyCoord;

/// Errors raised by archive clients.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive endpoint could not be reached or returned a transport error.
    #[error("Archive request failed: {0}")]
    Request(String),

    /// The archive answered, but the payload did not parse as expected.
    #[error("Malformed archive response: {0}")]
    MalformedResponse(String),

    /// A product URI could not be fetched to local storage.
    #[error("Failed to fetch '{uri}': {reason}")]
    Fetch { uri: String, reason: String },

    /// Local filesystem error while storing fetched bytes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One row from an archive observation query.
///
/// Immutable once fetched. Produced by [`ArchiveClient::query_observations`],
/// consumed by the product resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Archive observation identifier
    pub obs_id: String,
    /// Target designation as catalogued by the archive
    pub target_name: String,
    /// Right ascension in degrees
    pub ra_deg: f64,
    /// Declination in degrees
    pub dec_deg: f64,
    /// Instrument that produced the observation
    pub instrument: String,
    /// Survey/collection name (e.g. "SDSS", "TESS")
    pub collection: String,
    /// Observation start, MJD
    pub t_min_mjd: f64,
    /// Observation end, MJD
    pub t_max_mjd: f64,
    /// Lower wavelength bound in nanometers
    pub wave_min_nm: f64,
    /// Upper wavelength bound in nanometers
    pub wave_max_nm: f64,
    /// Data product type ("spectrum", "timeseries", ...)
    pub dataproduct_type: String,
}

impl ObservationRecord {
    /// Sky position of the observation target.
    pub fn position(&self) -> SkyCoord {
        SkyCoord::new(self.ra_deg, self.dec_deg)
    }
}

/// One downloadable file descriptor belonging to an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Identifier of the parent observation
    pub obs_id: String,
    /// Product subgroup/category label (e.g. "combined spectrum")
    pub subgroup: String,
    /// Download URI as reported by the archive
    pub uri: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Processing stage (1 raw, 2 calibrated exposure, 3 combined/higher)
    pub calib_level: u32,
    /// Archive-curated "minimum recommended products" membership
    pub minimum_recommended: bool,
}

impl ProductRecord {
    /// Filename component of the product URI.
    ///
    /// Download cache entries are keyed by this name.
    pub fn filename(&self) -> &str {
        self.uri.rsplit('/').next().unwrap_or(&self.uri)
    }

    /// File extension of the product (lowercase, without the dot), if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.filename();
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Some(ext),
            _ => None,
        }
    }
}

/// Observation intent as classified by the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentType {
    /// Science exposures
    Science,
    /// Calibration exposures
    Calibration,
}

/// Criteria for an archive observation query.
///
/// All fields are optional; unset fields are not sent to the archive. A
/// query is either a target-name lookup, a cone search, or both combined
/// with the metadata filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryCriteria {
    /// Target designation to resolve (e.g. "V1154_Cyg")
    pub target_name: Option<String>,
    /// Provenance/survey name filter (e.g. "APOGEE")
    pub provenance: Option<String>,
    /// Proposal/program identifier filter
    pub proposal_id: Option<String>,
    /// Cone search center
    pub cone_center: Option<SkyCoord>,
    /// Cone search radius in degrees
    pub cone_radius_deg: Option<f64>,
    /// Data product type filter ("spectrum", "timeseries", ...)
    pub dataproduct_type: Option<String>,
    /// Collection filter (e.g. "TESS")
    pub collection: Option<String>,
    /// Observation intent filter
    pub intent: Option<IntentType>,
}

impl QueryCriteria {
    /// Criteria matching spectroscopic observations of a named target.
    pub fn for_target(name: &str) -> Self {
        Self {
            target_name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Criteria for a cone search around `center` with `radius_deg`.
    pub fn cone(center: SkyCoord, radius_deg: f64) -> Self {
        Self {
            cone_center: Some(center),
            cone_radius_deg: Some(radius_deg),
            ..Self::default()
        }
    }

    /// Restrict to a provenance/survey name.
    pub fn with_provenance(mut self, provenance: &str) -> Self {
        self.provenance = Some(provenance.to_string());
        self
    }

    /// Restrict to a proposal/program identifier.
    pub fn with_proposal_id(mut self, proposal_id: &str) -> Self {
        self.proposal_id = Some(proposal_id.to_string());
        self
    }

    /// Restrict to a collection.
    pub fn with_collection(mut self, collection: &str) -> Self {
        self.collection = Some(collection.to_string());
        self
    }

    /// Restrict to a data product type.
    pub fn with_dataproduct_type(mut self, kind: &str) -> Self {
        self.dataproduct_type = Some(kind.to_string());
        self
    }

    /// Restrict to an observation intent.
    pub fn with_intent(mut self, intent: IntentType) -> Self {
        self.intent = Some(intent);
        self
    }
}

/// Blocking archive client.
///
/// Implementations perform the actual network I/O. The workflow issues one
/// call at a time and never retries on its own; absence of data is an
/// expected condition that is surfaced to the caller.
pub trait ArchiveClient {
    /// Query observations matching `criteria`.
    ///
    /// An empty result is not an error at this level; the workflow decides
    /// whether zero rows is fatal for the stage it is in.
    fn query_observations(
        &self,
        criteria: &QueryCriteria,
    ) -> Result<Vec<ObservationRecord>, ArchiveError>;

    /// List downloadable products for one observation.
    fn list_products(
        &self,
        observation: &ObservationRecord,
    ) -> Result<Vec<ProductRecord>, ArchiveError>;

    /// Fetch a single product to `dest`.
    ///
    /// `dest` is the full destination path including filename. Implementations
    /// must either write the complete file or return an error; a failed fetch
    /// must not leave a partial file behind.
    fn fetch_product(&self, product: &ProductRecord, dest: &Path) -> Result<(), ArchiveError>;
}
