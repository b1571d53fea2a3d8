//! HTTP archive client speaking a MAST-style `invoke` API.
//!
//! Observation queries and product listings go through a single JSON-RPC
//! style endpoint (`/api/v0/invoke`); file downloads go through the file
//! server (`/api/v0.1/Download/file`). Network-level timeouts are left to
//! the HTTP agent defaults.

use std::io;
use std::path::Path;

use log::debug;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::session::ArchiveSession;
use super::{ArchiveClient, ArchiveError, ObservationRecord, ProductRecord, QueryCriteria};

/// Default MAST portal base URL.
pub const DEFAULT_BASE_URL: &str = "https://mast.stsci.edu";

/// MAST portal client.
///
/// Cheap to construct; holds no connection state beyond the session value.
pub struct MastClient {
    base_url: Url,
    session: ArchiveSession,
}

impl MastClient {
    /// Client for the public MAST portal with an anonymous session.
    pub fn new() -> Result<Self, ArchiveError> {
        Self::with_session(DEFAULT_BASE_URL, ArchiveSession::anonymous())
    }

    /// Client for `base_url` using the given session.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Portal root, e.g. `https://mast.stsci.edu`
    /// * `session` - Anonymous or token-bearing session
    pub fn with_session(base_url: &str, session: ArchiveSession) -> Result<Self, ArchiveError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ArchiveError::Request(format!("invalid base URL '{base_url}': {e}")))?;
        Ok(Self { base_url, session })
    }

    /// The session this client was constructed with.
    pub fn session(&self) -> &ArchiveSession {
        &self.session
    }

    fn invoke_url(&self) -> Result<Url, ArchiveError> {
        self.base_url
            .join("/api/v0/invoke")
            .map_err(|e| ArchiveError::Request(format!("invalid invoke URL: {e}")))
    }

    fn download_url(&self, uri: &str) -> Result<Url, ArchiveError> {
        let path = format!(
            "/api/v0.1/Download/file?uri={}",
            urlencoding::encode(uri)
        );
        self.base_url
            .join(&path)
            .map_err(|e| ArchiveError::Request(format!("invalid download URL: {e}")))
    }

    /// POST a service request to the invoke endpoint and return the raw body.
    fn invoke(&self, request: &serde_json::Value) -> Result<String, ArchiveError> {
        let url = self.invoke_url()?;
        let payload = request.to_string();
        debug!("MAST invoke: {payload}");

        let mut builder = ureq::post(url.as_str());
        if let Some(token) = self.session.token() {
            builder = builder.header("Authorization", format!("token {token}"));
        }

        let response = builder
            .send_form([("request", payload.as_str())])
            .map_err(|e| ArchiveError::Request(format!("{url}: {e}")))?;

        response
            .into_body()
            .read_to_string()
            .map_err(|e| ArchiveError::Request(format!("reading response body: {e}")))
    }

    fn criteria_to_params(criteria: &QueryCriteria) -> serde_json::Value {
        let mut filters = Vec::new();
        if let Some(name) = &criteria.target_name {
            filters.push(json!({"paramName": "target_name", "values": [name]}));
        }
        if let Some(provenance) = &criteria.provenance {
            filters.push(json!({"paramName": "provenance_name", "values": [provenance]}));
        }
        if let Some(proposal) = &criteria.proposal_id {
            filters.push(json!({"paramName": "proposal_id", "values": [proposal]}));
        }
        if let Some(kind) = &criteria.dataproduct_type {
            filters.push(json!({"paramName": "dataproduct_type", "values": [kind]}));
        }
        if let Some(collection) = &criteria.collection {
            filters.push(json!({"paramName": "obs_collection", "values": [collection]}));
        }
        if let Some(intent) = &criteria.intent {
            let value = match intent {
                super::IntentType::Science => "science",
                super::IntentType::Calibration => "calibration",
            };
            filters.push(json!({"paramName": "intent_type", "values": [value]}));
        }

        let mut params = json!({ "filters": filters });
        if let (Some(center), Some(radius)) = (&criteria.cone_center, criteria.cone_radius_deg) {
            params["position"] = json!({
                "ra": center.ra_deg,
                "dec": center.dec_deg,
                "radius": radius,
            });
        }
        params
    }
}

/// Wire format of one observation row.
#[derive(Debug, Deserialize)]
struct MastObservationRow {
    obs_id: String,
    target_name: String,
    s_ra: f64,
    s_dec: f64,
    instrument_name: String,
    obs_collection: String,
    t_min: f64,
    t_max: f64,
    em_min: f64,
    em_max: f64,
    dataproduct_type: String,
}

impl From<MastObservationRow> for ObservationRecord {
    fn from(row: MastObservationRow) -> Self {
        ObservationRecord {
            obs_id: row.obs_id,
            target_name: row.target_name,
            ra_deg: row.s_ra,
            dec_deg: row.s_dec,
            instrument: row.instrument_name,
            collection: row.obs_collection,
            t_min_mjd: row.t_min,
            t_max_mjd: row.t_max,
            wave_min_nm: row.em_min,
            wave_max_nm: row.em_max,
            dataproduct_type: row.dataproduct_type,
        }
    }
}

/// Wire format of one product row.
#[derive(Debug, Deserialize)]
struct MastProductRow {
    #[serde(rename = "obsID")]
    obs_id: String,
    #[serde(rename = "productSubGroupDescription")]
    subgroup: String,
    #[serde(rename = "dataURI")]
    uri: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    calib_level: u32,
    #[serde(rename = "mrp", default)]
    minimum_recommended: bool,
}

impl From<MastProductRow> for ProductRecord {
    fn from(row: MastProductRow) -> Self {
        ProductRecord {
            obs_id: row.obs_id,
            subgroup: row.subgroup,
            uri: row.uri,
            size_bytes: row.size,
            calib_level: row.calib_level,
            minimum_recommended: row.minimum_recommended,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MastEnvelope<T> {
    status: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

fn parse_envelope<T: for<'de> Deserialize<'de>>(body: &str) -> Result<Vec<T>, ArchiveError> {
    let envelope: MastEnvelope<T> = serde_json::from_str(body)
        .map_err(|e| ArchiveError::MalformedResponse(format!("{e}")))?;
    if envelope.status != "COMPLETE" {
        return Err(ArchiveError::Request(format!(
            "archive reported status '{}'",
            envelope.status
        )));
    }
    Ok(envelope.data)
}

impl ArchiveClient for MastClient {
    fn query_observations(
        &self,
        criteria: &QueryCriteria,
    ) -> Result<Vec<ObservationRecord>, ArchiveError> {
        let request = json!({
            "service": "Mast.Caom.Filtered",
            "format": "json",
            "params": Self::criteria_to_params(criteria),
        });
        let body = self.invoke(&request)?;
        let rows: Vec<MastObservationRow> = parse_envelope(&body)?;
        Ok(rows.into_iter().map(ObservationRecord::from).collect())
    }

    fn list_products(
        &self,
        observation: &ObservationRecord,
    ) -> Result<Vec<ProductRecord>, ArchiveError> {
        let request = json!({
            "service": "Mast.Caom.Products",
            "format": "json",
            "params": { "obsid": observation.obs_id },
        });
        let body = self.invoke(&request)?;
        let rows: Vec<MastProductRow> = parse_envelope(&body)?;
        Ok(rows.into_iter().map(ProductRecord::from).collect())
    }

    fn fetch_product(&self, product: &ProductRecord, dest: &Path) -> Result<(), ArchiveError> {
        let url = self.download_url(&product.uri)?;
        debug!("Fetching {} -> {}", product.uri, dest.display());

        let mut builder = ureq::get(url.as_str());
        if let Some(token) = self.session.token() {
            builder = builder.header("Authorization", format!("token {token}"));
        }

        let response = builder.call().map_err(|e| ArchiveError::Fetch {
            uri: product.uri.clone(),
            reason: e.to_string(),
        })?;

        // Write via a temp path so a broken transfer never leaves a partial
        // file under the final cache key.
        let tmp = dest.with_extension("part");
        let result = (|| -> io::Result<()> {
            let mut reader = response.into_body().into_reader();
            let mut file = std::fs::File::create(&tmp)?;
            io::copy(&mut reader, &mut file)?;
            file.sync_all()?;
            std::fs::rename(&tmp, dest)
        })();

        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        result.map_err(|e| ArchiveError::Fetch {
            uri: product.uri.clone(),
            reason: e.to_string(),
        })
    }
}
