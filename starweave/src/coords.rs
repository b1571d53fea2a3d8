//! Sky coordinate handling for archive cone searches and match resolution.
//!
//! Coordinates are equatorial (right ascension / declination) in degrees,
//! matching the columns returned by the archive. Angular separations use the
//! Vincenty formula, which stays numerically stable for both very small and
//! near-antipodal separations.

use serde::{Deserialize, Serialize};

/// A position on the celestial sphere in equatorial coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyCoord {
    /// Right ascension in degrees [0, 360)
    pub ra_deg: f64,
    /// Declination in degrees [-90, 90]
    pub dec_deg: f64,
}

impl SkyCoord {
    /// Create a new coordinate from right ascension and declination in degrees.
    ///
    /// # Arguments
    ///
    /// * `ra_deg` - Right ascension in degrees
    /// * `dec_deg` - Declination in degrees
    pub fn new(ra_deg: f64, dec_deg: f64) -> Self {
        Self { ra_deg, dec_deg }
    }

    /// Great-circle angular separation to another coordinate, in degrees.
    ///
    /// Uses the Vincenty formula on the unit sphere. Commutative, and exactly
    /// zero for identical inputs.
    pub fn separation_deg(&self, other: &SkyCoord) -> f64 {
        let ra1 = self.ra_deg.to_radians();
        let dec1 = self.dec_deg.to_radians();
        let ra2 = other.ra_deg.to_radians();
        let dec2 = other.dec_deg.to_radians();

        let delta_ra = ra2 - ra1;
        let (sin_dra, cos_dra) = delta_ra.sin_cos();
        let (sin_d1, cos_d1) = dec1.sin_cos();
        let (sin_d2, cos_d2) = dec2.sin_cos();

        let num1 = cos_d2 * sin_dra;
        let num2 = cos_d1 * sin_d2 - sin_d1 * cos_d2 * cos_dra;
        let denom = sin_d1 * sin_d2 + cos_d1 * cos_d2 * cos_dra;

        (num1.hypot(num2)).atan2(denom).to_degrees()
    }

    /// Whether another coordinate lies within `radius_deg` of this one.
    pub fn contains(&self, other: &SkyCoord, radius_deg: f64) -> bool {
        self.separation_deg(other) <= radius_deg
    }
}

impl std::fmt::Display for SkyCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:+.6})", self.ra_deg, self.dec_deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_separation_for_identical_coords() {
        let c = SkyCoord::new(299.67, 46.74);
        assert_eq!(c.separation_deg(&c), 0.0);
    }

    #[test]
    fn test_separation_along_equator() {
        // On the equator the separation equals the RA difference
        let a = SkyCoord::new(10.0, 0.0);
        let b = SkyCoord::new(11.5, 0.0);
        assert_relative_eq!(a.separation_deg(&b), 1.5, epsilon = 1e-10);
    }

    #[test]
    fn test_separation_is_commutative() {
        let a = SkyCoord::new(120.3, -45.2);
        let b = SkyCoord::new(121.0, -44.8);
        assert_relative_eq!(
            a.separation_deg(&b),
            b.separation_deg(&a),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_separation_across_ra_wraparound() {
        // 359.5 and 0.5 degrees RA are one degree apart on the equator
        let a = SkyCoord::new(359.5, 0.0);
        let b = SkyCoord::new(0.5, 0.0);
        assert_relative_eq!(a.separation_deg(&b), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_separation_to_pole() {
        let pole = SkyCoord::new(0.0, 90.0);
        // RA is degenerate at the pole, so any RA gives the same separation
        let a = SkyCoord::new(0.0, 60.0);
        let b = SkyCoord::new(123.0, 60.0);
        assert_relative_eq!(pole.separation_deg(&a), 30.0, epsilon = 1e-10);
        assert_relative_eq!(pole.separation_deg(&b), 30.0, epsilon = 1e-10);
    }

    #[test]
    fn test_tiny_separation_precision() {
        // Vincenty must not round sub-arcsecond separations to zero
        let a = SkyCoord::new(200.0, 30.0);
        let b = SkyCoord::new(200.0, 30.0 + 1e-7);
        let sep = a.separation_deg(&b);
        assert_relative_eq!(sep, 1e-7, max_relative = 1e-6);
    }

    #[test]
    fn test_contains_radius() {
        let center = SkyCoord::new(150.0, 20.0);
        let near = SkyCoord::new(150.0, 20.01);
        let far = SkyCoord::new(150.0, 21.0);
        assert!(center.contains(&near, 0.02));
        assert!(!center.contains(&far, 0.02));
    }
}
