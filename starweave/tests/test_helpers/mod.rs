//! Shared helpers for the integration suite: a programmable in-memory
//! archive and synthetic FITS fixtures.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fitsio::tables::{ColumnDataType, ColumnDescription};
use fitsio::FitsFile;

use starweave::archive::{
    ArchiveClient, ArchiveError, ObservationRecord, ProductRecord, QueryCriteria,
};

/// In-memory archive serving canned observations, products and files.
///
/// Every fetched URI is recorded so tests can assert which products were
/// actually downloaded (and how often).
#[derive(Default)]
pub struct MockArchive {
    observations: Vec<ObservationRecord>,
    products: HashMap<String, Vec<ProductRecord>>,
    files: HashMap<String, PathBuf>,
    fetched: RefCell<Vec<String>>,
}

impl MockArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observation.
    pub fn add_observation(&mut self, observation: ObservationRecord) {
        self.observations.push(observation);
    }

    /// Register a product under its parent observation, backed by `source`.
    pub fn add_product(&mut self, product: ProductRecord, source: &Path) {
        self.files
            .insert(product.uri.clone(), source.to_path_buf());
        self.products
            .entry(product.obs_id.clone())
            .or_default()
            .push(product);
    }

    /// URIs fetched so far, in order.
    pub fn fetched_uris(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }

    /// Total number of fetches issued.
    pub fn fetch_count(&self) -> usize {
        self.fetched.borrow().len()
    }

    fn matches(observation: &ObservationRecord, criteria: &QueryCriteria) -> bool {
        if let Some(name) = &criteria.target_name {
            if &observation.target_name != name {
                return false;
            }
        }
        if let Some(collection) = &criteria.collection {
            if &observation.collection != collection {
                return false;
            }
        }
        if let Some(kind) = &criteria.dataproduct_type {
            if &observation.dataproduct_type != kind {
                return false;
            }
        }
        if let (Some(center), Some(radius)) = (&criteria.cone_center, criteria.cone_radius_deg) {
            if !center.contains(&observation.position(), radius) {
                return false;
            }
        }
        true
    }
}

impl ArchiveClient for MockArchive {
    fn query_observations(
        &self,
        criteria: &QueryCriteria,
    ) -> Result<Vec<ObservationRecord>, ArchiveError> {
        Ok(self
            .observations
            .iter()
            .filter(|o| Self::matches(o, criteria))
            .cloned()
            .collect())
    }

    fn list_products(
        &self,
        observation: &ObservationRecord,
    ) -> Result<Vec<ProductRecord>, ArchiveError> {
        Ok(self
            .products
            .get(&observation.obs_id)
            .cloned()
            .unwrap_or_default())
    }

    fn fetch_product(&self, product: &ProductRecord, dest: &Path) -> Result<(), ArchiveError> {
        self.fetched.borrow_mut().push(product.uri.clone());
        let source = self.files.get(&product.uri).ok_or_else(|| ArchiveError::Fetch {
            uri: product.uri.clone(),
            reason: "no such file registered".to_string(),
        })?;
        std::fs::copy(source, dest)?;
        Ok(())
    }
}

/// Convenience observation constructor.
pub fn observation(
    obs_id: &str,
    target: &str,
    ra: f64,
    dec: f64,
    collection: &str,
    kind: &str,
) -> ObservationRecord {
    ObservationRecord {
        obs_id: obs_id.to_string(),
        target_name: target.to_string(),
        ra_deg: ra,
        dec_deg: dec,
        instrument: (if collection == "TESS" { "Photometer" } else { "APOGEE" }).to_string(),
        collection: collection.to_string(),
        t_min_mjd: 56800.0,
        t_max_mjd: 57200.0,
        wave_min_nm: 600.0,
        wave_max_nm: 1700.0,
        dataproduct_type: kind.to_string(),
    }
}

/// Convenience product constructor.
pub fn product(obs_id: &str, subgroup: &str, uri: &str, mrp: bool) -> ProductRecord {
    ProductRecord {
        obs_id: obs_id.to_string(),
        subgroup: subgroup.to_string(),
        uri: uri.to_string(),
        size_bytes: 4096,
        calib_level: if mrp { 3 } else { 2 },
        minimum_recommended: mrp,
    }
}

fn double_column(name: &str) -> fitsio::tables::ConcreteColumnDescription {
    ColumnDescription::new(name)
        .with_type(ColumnDataType::Double)
        .create()
        .expect("valid column description")
}

/// Write a synthetic combined-spectrum FITS file.
///
/// `calibrated_valid` controls whether the calibrated parameter columns
/// carry usable values or the survey sentinel.
pub fn write_spectrum_fits(path: &Path, target_id: &str, n_pixels: usize, calibrated_valid: bool) {
    let mut file = FitsFile::create(path).open().expect("create spectrum fits");

    // Mostly-clean spectrum with a short noisy stretch for masking tests
    let flux: Vec<f64> = (0..n_pixels)
        .map(|i| 1.0 + 0.05 * ((i % 7) as f64 / 7.0))
        .collect();
    let model: Vec<f64> = flux.iter().map(|f| f * 0.99).collect();
    let uncertainty: Vec<f64> = (0..n_pixels)
        .map(|i| if (10..14).contains(&(i % 64)) { 0.5 } else { 0.01 })
        .collect();

    let cols = vec![
        double_column("FLUX"),
        double_column("MODEL"),
        double_column("UNCERT"),
    ];
    let hdu = file.create_table("SPECTRUM", &cols).expect("spectrum table");
    hdu.write_col(&mut file, "FLUX", &flux).unwrap();
    hdu.write_col(&mut file, "MODEL", &model).unwrap();
    hdu.write_col(&mut file, "UNCERT", &uncertainty).unwrap();
    hdu.write_key(&mut file, "CRVAL1", 4.179).unwrap();
    hdu.write_key(&mut file, "CDELT1", 6e-6).unwrap();
    hdu.write_key(&mut file, "NWAVE", n_pixels as i64).unwrap();

    let sentinel = -9999.0;
    let (teff, logg, m_h) = if calibrated_valid {
        (6100.0, 2.2, -0.1)
    } else {
        (sentinel, sentinel, sentinel)
    };

    let param_cols = vec![
        ColumnDescription::new("APOGEE_ID")
            .with_type(ColumnDataType::String)
            .that_repeats(24)
            .create()
            .unwrap(),
        double_column("TEFF"),
        double_column("LOGG"),
        double_column("M_H"),
        double_column("TEFF_FIT"),
        double_column("LOGG_FIT"),
        double_column("M_H_FIT"),
    ];
    let params = file.create_table("PARAMS", &param_cols).expect("params table");
    params
        .write_col(&mut file, "APOGEE_ID", &[target_id.to_string()])
        .unwrap();
    params.write_col(&mut file, "TEFF", &[teff]).unwrap();
    params.write_col(&mut file, "LOGG", &[logg]).unwrap();
    params.write_col(&mut file, "M_H", &[m_h]).unwrap();
    params.write_col(&mut file, "TEFF_FIT", &[6150.0]).unwrap();
    params.write_col(&mut file, "LOGG_FIT", &[2.3]).unwrap();
    params.write_col(&mut file, "M_H_FIT", &[-0.05]).unwrap();
}

/// Write a synthetic light-curve FITS file with a few NaN cadences.
pub fn write_lightcurve_fits(path: &Path, target: &str) {
    let mut file = FitsFile::create(path).open().expect("create lightcurve fits");

    let n = 200;
    let time: Vec<f64> = (0..n).map(|i| 1816.0 + i as f64 * 0.02).collect();
    let flux: Vec<f64> = (0..n)
        .map(|i| {
            if i % 37 == 0 {
                f64::NAN
            } else {
                7000.0 + 25.0 * ((i % 50) as f64 / 50.0 - 0.5)
            }
        })
        .collect();

    let cols = vec![double_column("TIME"), double_column("FLUX")];
    let hdu = file.create_table("LIGHTCURVE", &cols).expect("lightcurve table");
    hdu.write_col(&mut file, "TIME", &time).unwrap();
    hdu.write_col(&mut file, "FLUX", &flux).unwrap();
    hdu.write_key(&mut file, "OBJECT", target.to_string()).unwrap();
}

/// Write a synthetic population catalog FITS file with `n_stars` rows.
pub fn write_catalog_fits(path: &Path, n_stars: usize) {
    let mut file = FitsFile::create(path).open().expect("create catalog fits");

    let teff: Vec<f64> = (0..n_stars).map(|i| 4000.0 + (i % 40) as f64 * 60.0).collect();
    let logg: Vec<f64> = (0..n_stars).map(|i| 1.0 + (i % 25) as f64 * 0.15).collect();
    let m_h: Vec<f64> = (0..n_stars).map(|i| -1.0 + (i % 30) as f64 * 0.05).collect();
    let ids: Vec<String> = (0..n_stars).map(|i| format!("2M{i:08}")).collect();

    let cols = vec![
        ColumnDescription::new("APOGEE_ID")
            .with_type(ColumnDataType::String)
            .that_repeats(24)
            .create()
            .unwrap(),
        double_column("TEFF"),
        double_column("LOGG"),
        double_column("M_H"),
    ];
    let hdu = file.create_table("CATALOG", &cols).expect("catalog table");
    hdu.write_col(&mut file, "APOGEE_ID", &ids).unwrap();
    hdu.write_col(&mut file, "TEFF", &teff).unwrap();
    hdu.write_col(&mut file, "LOGG", &logg).unwrap();
    hdu.write_col(&mut file, "M_H", &m_h).unwrap();
}
