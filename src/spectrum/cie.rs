//! CIE 1931 observer curves and the reference illuminant.
//!
//! The color matching functions use the multi-lobe piecewise-Gaussian
//! fits of Wyman, Sloan, and Shirley, which stay within about a percent
//! of the tabulated observer over the visible range. The reference
//! illuminant is a normalized 6504 K Planckian radiator standing in for
//! D65; its normalization is chosen so a unit-RGB illuminant decodes to
//! unit luminance.

use std::sync::OnceLock;

use crate::spectrum::sampled::{VISIBLE_WAVELENGTH_MAX, VISIBLE_WAVELENGTH_MIN};

#[inline]
fn lobe(lambda: f32, alpha: f32, mu: f32, sigma_lo: f32, sigma_hi: f32) -> f32 {
    let sigma = if lambda < mu { sigma_lo } else { sigma_hi };
    let t = (lambda - mu) / sigma;
    alpha * (-0.5 * t * t).exp()
}

/// CIE x-bar at `lambda` nanometers.
#[must_use]
pub fn cie_x(lambda: f32) -> f32 {
    lobe(lambda, 1.056, 599.8, 37.9, 31.0) + lobe(lambda, 0.362, 442.0, 16.0, 26.7)
        - lobe(lambda, 0.065, 501.1, 20.4, 26.2)
}

/// CIE y-bar at `lambda` nanometers.
#[must_use]
pub fn cie_y(lambda: f32) -> f32 {
    lobe(lambda, 0.821, 568.8, 46.9, 40.5) + lobe(lambda, 0.286, 530.9, 16.3, 31.1)
}

/// CIE z-bar at `lambda` nanometers.
#[must_use]
pub fn cie_z(lambda: f32) -> f32 {
    lobe(lambda, 1.217, 437.0, 11.8, 36.0) + lobe(lambda, 0.681, 459.0, 26.0, 13.8)
}

/// The integral of y-bar over the visible range, used to normalize
/// luminance projections of sampled spectra.
#[must_use]
pub fn cie_y_integral() -> f32 {
    static VALUE: OnceLock<f32> = OnceLock::new();
    *VALUE.get_or_init(|| integrate_visible(cie_y))
}

fn integrate_visible(f: impl Fn(f32) -> f32) -> f32 {
    // Trapezoidal rule at 1 nm; the curves are smooth.
    let n = (VISIBLE_WAVELENGTH_MAX - VISIBLE_WAVELENGTH_MIN) as usize;
    let mut sum = 0.5 * (f(VISIBLE_WAVELENGTH_MIN) + f(VISIBLE_WAVELENGTH_MAX));
    for i in 1..n {
        sum += f(VISIBLE_WAVELENGTH_MIN + i as f32);
    }
    sum
}

const ILLUMINANT_TEMPERATURE: f32 = 6504.0;

fn planck(lambda_nm: f32, temperature: f32) -> f32 {
    // Spectral radiance shape only; absolute scale is normalized away.
    const C2: f32 = 1.438_777e7; // nm * K
    let l5 = (lambda_nm * 1e-3).powi(5);
    1.0 / (l5 * ((C2 / (lambda_nm * temperature)).exp_m1()))
}

/// Reference illuminant at `lambda`, normalized so its luminance-weighted
/// average over the visible range is one.
#[must_use]
pub fn illuminant_d65(lambda: f32) -> f32 {
    static NORM: OnceLock<f32> = OnceLock::new();
    let norm = *NORM.get_or_init(|| {
        let weighted = integrate_visible(|l| planck(l, ILLUMINANT_TEMPERATURE) * cie_y(l));
        cie_y_integral() / weighted
    });
    planck(lambda, ILLUMINANT_TEMPERATURE) * norm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observer_peaks_are_placed() {
        // y-bar peaks near 555 nm with unit-ish height.
        assert!(cie_y(555.0) > 0.95);
        assert!(cie_y(400.0) < 0.05);
        assert!(cie_x(600.0) > 0.9);
        assert!(cie_z(445.0) > 1.5);
    }

    #[test]
    fn y_integral_matches_the_standard_value() {
        let integral = cie_y_integral();
        assert!((100.0..115.0).contains(&integral), "got {integral}");
    }

    #[test]
    fn illuminant_is_luminance_normalized() {
        let n = 470;
        let mut weighted = 0.0;
        for i in 0..=n {
            let l = VISIBLE_WAVELENGTH_MIN + i as f32;
            weighted += illuminant_d65(l) * cie_y(l);
        }
        let avg = weighted / cie_y_integral();
        assert!((avg - 1.0).abs() < 0.02, "got {avg}");
    }
}
