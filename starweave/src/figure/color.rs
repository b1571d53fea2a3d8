//! Fixed-scale metallicity color mapping for the population panel.
//!
//! Metallicity maps onto a diverging blue-to-red ramp over the fixed
//! [-1.0, 0.5] dex range, so figures for different stars stay directly
//! comparable. Values outside the range clamp to the endpoints.

/// Lower end of the metallicity color scale in dex.
pub const METALLICITY_MIN: f64 = -1.0;

/// Upper end of the metallicity color scale in dex.
pub const METALLICITY_MAX: f64 = 0.5;

/// Ramp endpoints and midpoint (metal-poor blue, neutral grey, metal-rich red).
const LOW_RGB: (u8, u8, u8) = (59, 76, 192);
const MID_RGB: (u8, u8, u8) = (221, 221, 221);
const HIGH_RGB: (u8, u8, u8) = (180, 4, 38);

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8
}

fn lerp_rgb(a: (u8, u8, u8), b: (u8, u8, u8), t: f64) -> (u8, u8, u8) {
    (lerp(a.0, b.0, t), lerp(a.1, b.1, t), lerp(a.2, b.2, t))
}

/// Map a metallicity to an RGB triplet on the fixed scale.
///
/// Non-finite input renders as the neutral midpoint.
pub fn metallicity_rgb(m_h: f64) -> (u8, u8, u8) {
    if !m_h.is_finite() {
        return MID_RGB;
    }
    let t = ((m_h - METALLICITY_MIN) / (METALLICITY_MAX - METALLICITY_MIN)).clamp(0.0, 1.0);
    if t < 0.5 {
        lerp_rgb(LOW_RGB, MID_RGB, t * 2.0)
    } else {
        lerp_rgb(MID_RGB, HIGH_RGB, (t - 0.5) * 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_and_clamping() {
        assert_eq!(metallicity_rgb(METALLICITY_MIN), LOW_RGB);
        assert_eq!(metallicity_rgb(METALLICITY_MAX), HIGH_RGB);
        // Out-of-range values clamp rather than extrapolate
        assert_eq!(metallicity_rgb(-5.0), LOW_RGB);
        assert_eq!(metallicity_rgb(2.0), HIGH_RGB);
    }

    #[test]
    fn test_midpoint_is_neutral() {
        let mid = (METALLICITY_MIN + METALLICITY_MAX) / 2.0;
        assert_eq!(metallicity_rgb(mid), MID_RGB);
    }

    #[test]
    fn test_non_finite_is_neutral() {
        assert_eq!(metallicity_rgb(f64::NAN), MID_RGB);
    }

    #[test]
    fn test_ramp_is_ordered_in_red() {
        // Red channel must not decrease as metallicity rises
        let mut last = 0;
        for i in 0..=30 {
            let m_h = METALLICITY_MIN + i as f64 * 0.05;
            let (r, _, _) = metallicity_rgb(m_h);
            assert!(r >= last, "red channel dipped at [M/H]={m_h}");
            last = r;
        }
    }
}
