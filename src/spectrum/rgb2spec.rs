//! RGB to spectrum conversion.
//!
//! Reflectances are represented as a sigmoid of a quadratic polynomial in
//! wavelength, `sigma(c0 * lambda^2 + c1 * lambda + c2)`, which is smooth,
//! bounded to `[0, 1]`, and closed under the spectral arithmetic the
//! integrator needs. A 64x64x64 coefficient table per component-major
//! channel maps RGB to polynomial coefficients; queries interpolate the
//! eight surrounding cells.
//!
//! The table is computed on the host at first use with a Gauss-Newton fit
//! per cell (warm-started from neighboring cells and parallelized over
//! table slices), then memoized for the life of the process.

use std::sync::OnceLock;
use std::time::Instant;

use glam::Vec3;

use crate::spectrum::cie;
use crate::util::colorspace::XYZ_TO_SRGB;

/// Edge resolution of the coefficient table.
pub const RGB2SPEC_RESOLUTION: usize = 64;

const FINE_SAMPLES: usize = 71;
const MAX_ITERATIONS: usize = 16;
const COEFF_CLAMP: f64 = 200.0;

/// A reflectance spectrum `sigma(c0 * lambda^2 + c1 * lambda + c2)` with
/// `lambda` in nanometers.
#[derive(Debug, Clone, Copy)]
pub struct RgbSigmoidPolynomial {
    pub c0: f32,
    pub c1: f32,
    pub c2: f32,
}

impl RgbSigmoidPolynomial {
    #[must_use]
    pub fn new(c0: f32, c1: f32, c2: f32) -> Self {
        Self { c0, c1, c2 }
    }

    #[inline]
    fn s(x: f32) -> f32 {
        if x.is_infinite() {
            if x > 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            0.5 + 0.5 * x / (1.0 + x * x).sqrt()
        }
    }

    /// Reflectance at `lambda` nanometers, in `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn eval(&self, lambda: f32) -> f32 {
        Self::s((self.c0 * lambda + self.c1) * lambda + self.c2)
    }

    /// Upper bound of the reflectance over the visible range.
    #[must_use]
    pub fn maximum(&self) -> f32 {
        let lo = self.eval(crate::spectrum::VISIBLE_WAVELENGTH_MIN);
        let hi = self.eval(crate::spectrum::VISIBLE_WAVELENGTH_MAX);
        let mut result = lo.max(hi);
        if self.c0 != 0.0 {
            let vertex = (-self.c1 / (2.0 * self.c0)).clamp(
                crate::spectrum::VISIBLE_WAVELENGTH_MIN,
                crate::spectrum::VISIBLE_WAVELENGTH_MAX,
            );
            result = result.max(self.eval(vertex));
        }
        result
    }
}

/// The precomputed RGB → sigmoid-polynomial coefficient table.
pub struct RgbToSpectrumTable {
    z_nodes: [f32; RGB2SPEC_RESOLUTION],
    /// Layout: `[channel][z][y][x][3]`.
    coefficients: Vec<f32>,
}

impl RgbToSpectrumTable {
    /// The process-wide table for the sRGB color space.
    #[must_use]
    pub fn srgb() -> &'static RgbToSpectrumTable {
        static TABLE: OnceLock<RgbToSpectrumTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            let start = Instant::now();
            let table = fit_table();
            log::info!(
                "Computed {res}^3 RGB-to-spectrum table in {ms} ms.",
                res = RGB2SPEC_RESOLUTION,
                ms = start.elapsed().as_millis()
            );
            table
        })
    }

    #[must_use]
    pub fn z_nodes(&self) -> &[f32; RGB2SPEC_RESOLUTION] {
        &self.z_nodes
    }

    /// Raw coefficients at one table cell.
    #[must_use]
    pub fn coefficient_cell(&self, channel: usize, x: u32, y: u32, z: u32) -> Vec3 {
        let r = RGB2SPEC_RESOLUTION;
        let base = 3 * (((channel * r + z as usize) * r + y as usize) * r + x as usize);
        Vec3::new(
            self.coefficients[base],
            self.coefficients[base + 1],
            self.coefficients[base + 2],
        )
    }

    /// Decodes a reflectance RGB in `[0, 1]^3`.
    #[must_use]
    pub fn decode_albedo(&self, rgb: Vec3) -> RgbSigmoidPolynomial {
        self.decode_albedo_with(rgb, &|channel, x, y, z| {
            self.coefficient_cell(channel, x, y, z)
        })
    }

    /// Decodes through an external cell fetcher (e.g. a bindless volume).
    #[must_use]
    pub fn decode_albedo_with(
        &self,
        rgb: Vec3,
        fetch: &dyn Fn(usize, u32, u32, u32) -> Vec3,
    ) -> RgbSigmoidPolynomial {
        let rgb = rgb.clamp(Vec3::ZERO, Vec3::ONE);
        // Constant spectra invert the sigmoid directly.
        if rgb.x == rgb.y && rgb.y == rgb.z {
            let v = rgb.x;
            return RgbSigmoidPolynomial::new(0.0, 0.0, (v - 0.5) / (v * (1.0 - v)).sqrt());
        }

        let channel = if rgb.x >= rgb.y && rgb.x >= rgb.z {
            0
        } else if rgb.y >= rgb.z {
            1
        } else {
            2
        };
        let res = RGB2SPEC_RESOLUTION;
        let z = rgb[channel];
        let x = rgb[(channel + 1) % 3] * (res - 1) as f32 / z;
        let y = rgb[(channel + 2) % 3] * (res - 1) as f32 / z;

        let xi = (x as usize).min(res - 2);
        let yi = (y as usize).min(res - 2);
        let zi = self
            .z_nodes
            .partition_point(|&n| n < z)
            .saturating_sub(1)
            .min(res - 2);
        let dx = x - xi as f32;
        let dy = y - yi as f32;
        let dz = (z - self.z_nodes[zi]) / (self.z_nodes[zi + 1] - self.z_nodes[zi]);

        let mut c = Vec3::ZERO;
        for corner in 0..8 {
            let ox = corner & 1;
            let oy = (corner >> 1) & 1;
            let oz = (corner >> 2) & 1;
            let wx = if ox == 0 { 1.0 - dx } else { dx };
            let wy = if oy == 0 { 1.0 - dy } else { dy };
            let wz = if oz == 0 { 1.0 - dz } else { dz };
            let cell = fetch(
                channel,
                (xi + ox) as u32,
                (yi + oy) as u32,
                (zi + oz) as u32,
            );
            c += cell * (wx * wy * wz);
        }
        RgbSigmoidPolynomial::new(c.x, c.y, c.z)
    }

    /// Decodes an unbounded (illuminant) RGB into a polynomial plus a
    /// positive scale.
    #[must_use]
    pub fn decode_unbound(&self, rgb: Vec3) -> (RgbSigmoidPolynomial, f32) {
        let rgb = rgb.max(Vec3::ZERO);
        let m = rgb.max_element();
        if m == 0.0 {
            return (RgbSigmoidPolynomial::new(0.0, 0.0, f32::NEG_INFINITY), 0.0);
        }
        let scale = 2.0 * m;
        (self.decode_albedo(rgb / scale), scale)
    }
}

// ----------------------------------------------------------------------
// Table construction
// ----------------------------------------------------------------------

struct FitTables {
    /// Per-channel response of each fine wavelength sample, premultiplied
    /// by the illuminant and the quadrature weight.
    rgb_tbl: [[f64; FINE_SAMPLES]; 3],
    /// Fine sample positions normalized to `[0, 1]`.
    lambda_norm: [f64; FINE_SAMPLES],
}

impl FitTables {
    fn new() -> Self {
        let lambda_min = f64::from(crate::spectrum::VISIBLE_WAVELENGTH_MIN);
        let lambda_max = f64::from(crate::spectrum::VISIBLE_WAVELENGTH_MAX);
        let h = (lambda_max - lambda_min) / (FINE_SAMPLES - 1) as f64;

        let mut lambda_norm = [0.0; FINE_SAMPLES];
        let mut weights = [0.0; FINE_SAMPLES];
        for i in 0..FINE_SAMPLES {
            lambda_norm[i] = i as f64 / (FINE_SAMPLES - 1) as f64;
            // Composite Simpson 3/8 quadrature weights.
            let factor = if i == 0 || i == FINE_SAMPLES - 1 {
                1.0
            } else if i % 3 == 0 {
                2.0
            } else {
                3.0
            };
            weights[i] = 3.0 / 8.0 * h * factor;
        }

        let mut k = 0.0;
        let mut xyz = [[0.0f64; FINE_SAMPLES]; 3];
        let mut illum = [0.0f64; FINE_SAMPLES];
        for i in 0..FINE_SAMPLES {
            let lambda = (lambda_min + lambda_norm[i] * (lambda_max - lambda_min)) as f32;
            xyz[0][i] = f64::from(cie::cie_x(lambda));
            xyz[1][i] = f64::from(cie::cie_y(lambda));
            xyz[2][i] = f64::from(cie::cie_z(lambda));
            illum[i] = f64::from(cie::illuminant_d65(lambda));
            k += xyz[1][i] * illum[i] * weights[i];
        }

        let mut rgb_tbl = [[0.0; FINE_SAMPLES]; 3];
        for (row, table) in rgb_tbl.iter_mut().enumerate() {
            let m = XYZ_TO_SRGB.row(row);
            for i in 0..FINE_SAMPLES {
                let response = f64::from(m.x) * xyz[0][i]
                    + f64::from(m.y) * xyz[1][i]
                    + f64::from(m.z) * xyz[2][i];
                table[i] = response * illum[i] * weights[i] / k;
            }
        }
        Self {
            rgb_tbl,
            lambda_norm,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    0.5 * x / (1.0 + x * x).sqrt() + 0.5
}

fn sigmoid_derivative(x: f64) -> f64 {
    0.5 / (1.0 + x * x).powf(1.5)
}

/// Solves a 3x3 system with partial pivoting; `None` if singular.
fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() < 1e-15 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..3 {
            let f = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= f * a[col][k];
            }
            b[row] -= f * b[col];
        }
    }
    let mut x = [0.0; 3];
    for row in (0..3).rev() {
        let mut sum = b[row];
        for k in row + 1..3 {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    Some(x)
}

/// Fits sigmoid-polynomial coefficients (in normalized wavelength) so the
/// spectrum reproduces `rgb` under the reference illuminant.
fn gauss_newton(tables: &FitTables, rgb: [f64; 3], coeffs: &mut [f64; 3]) {
    for _ in 0..MAX_ITERATIONS {
        let mut out = [0.0f64; 3];
        let mut jac = [[0.0f64; 3]; 3];
        for i in 0..FINE_SAMPLES {
            let x = tables.lambda_norm[i];
            let poly = (coeffs[0] * x + coeffs[1]) * x + coeffs[2];
            let s = sigmoid(poly);
            let ds = sigmoid_derivative(poly);
            let basis = [x * x, x, 1.0];
            for k in 0..3 {
                out[k] += tables.rgb_tbl[k][i] * s;
                for j in 0..3 {
                    jac[k][j] += tables.rgb_tbl[k][i] * ds * basis[j];
                }
            }
        }
        let residual = [rgb[0] - out[0], rgb[1] - out[1], rgb[2] - out[2]];
        let max_residual = residual.iter().fold(0.0f64, |m, r| m.max(r.abs()));
        if max_residual < 1e-6 {
            break;
        }
        let Some(delta) = solve3(jac, residual) else {
            break;
        };
        for j in 0..3 {
            coeffs[j] += delta[j];
        }
        let magnitude = coeffs.iter().fold(0.0f64, |m, c| m.max(c.abs()));
        if magnitude > COEFF_CLAMP {
            for c in coeffs.iter_mut() {
                *c *= COEFF_CLAMP / magnitude;
            }
        }
    }
}

fn smoothstep(x: f64) -> f64 {
    x * x * (3.0 - 2.0 * x)
}

fn fit_table() -> RgbToSpectrumTable {
    use rayon::prelude::*;

    let res = RGB2SPEC_RESOLUTION;
    let tables = FitTables::new();

    let mut z_nodes = [0.0f32; RGB2SPEC_RESOLUTION];
    for (k, node) in z_nodes.iter_mut().enumerate() {
        *node = smoothstep(smoothstep(k as f64 / (res - 1) as f64)) as f32;
    }

    let lambda_min = f64::from(crate::spectrum::VISIBLE_WAVELENGTH_MIN);
    let lambda_span = f64::from(
        crate::spectrum::VISIBLE_WAVELENGTH_MAX - crate::spectrum::VISIBLE_WAVELENGTH_MIN,
    );

    // One independent fit per (channel, z) slice, warm-started cell to
    // cell within the slice.
    let slices: Vec<Vec<f32>> = (0..3 * res)
        .into_par_iter()
        .map(|slice| {
            let channel = slice / res;
            let zi = slice % res;
            let z = f64::from(z_nodes[zi]);
            let mut out = vec![0.0f32; res * res * 3];
            let mut row_start = [0.0f64; 3];
            let mut coeffs = [0.0f64; 3];
            for yi in 0..res {
                coeffs = if yi == 0 { coeffs } else { row_start };
                for xi in 0..res {
                    let x = xi as f64 / (res - 1) as f64;
                    let y = yi as f64 / (res - 1) as f64;
                    let mut rgb = [0.0f64; 3];
                    rgb[channel] = z;
                    rgb[(channel + 1) % 3] = x * z;
                    rgb[(channel + 2) % 3] = y * z;
                    gauss_newton(&tables, rgb, &mut coeffs);
                    if xi == 0 {
                        row_start = coeffs;
                    }
                    // Rescale from normalized wavelength to nanometers.
                    let s = 1.0 / lambda_span;
                    let (a, b, c) = (coeffs[0], coeffs[1], coeffs[2]);
                    let base = 3 * (yi * res + xi);
                    out[base] = (a * s * s) as f32;
                    out[base + 1] = (b * s - 2.0 * a * lambda_min * s * s) as f32;
                    out[base + 2] =
                        (c - b * lambda_min * s + a * lambda_min * lambda_min * s * s) as f32;
                }
            }
            out
        })
        .collect();

    let mut coefficients = vec![0.0f32; 3 * res * res * res * 3];
    for (slice, data) in slices.into_iter().enumerate() {
        let base = slice * res * res * 3;
        coefficients[base..base + data.len()].copy_from_slice(&data);
    }

    RgbToSpectrumTable {
        z_nodes,
        coefficients,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_rgb_inverts_the_sigmoid() {
        let table = RgbToSpectrumTable::srgb();
        let poly = table.decode_albedo(Vec3::splat(0.25));
        for lambda in [400.0f32, 550.0, 700.0] {
            assert!((poly.eval(lambda) - 0.25).abs() < 1e-3);
        }
    }

    #[test]
    fn decode_stays_in_unit_range() {
        let table = RgbToSpectrumTable::srgb();
        let poly = table.decode_albedo(Vec3::new(0.9, 0.2, 0.6));
        for i in 0..100 {
            let lambda = 360.0 + i as f32 * 4.7;
            let v = poly.eval(lambda);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn unbound_decode_reports_scale() {
        let table = RgbToSpectrumTable::srgb();
        let (_, scale) = table.decode_unbound(Vec3::new(4.0, 2.0, 1.0));
        assert!((scale - 8.0).abs() < 1e-6);
        let (_, zero_scale) = table.decode_unbound(Vec3::ZERO);
        assert_eq!(zero_scale, 0.0);
    }
}
