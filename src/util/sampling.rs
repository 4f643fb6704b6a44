//! Low-level sampling routines shared by lights, surfaces, and samplers:
//! warps from the unit square, Walker alias tables, and the multiple
//! importance sampling heuristics.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// One bin of a Walker alias table: keep the bin with probability `prob`,
/// otherwise redirect to `alias`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct AliasEntry {
    pub prob: f32,
    pub alias: u32,
}

/// Builds an alias table plus the normalized PDF over the input weights.
///
/// Weights are taken by absolute value; an all-zero input degrades to the
/// uniform distribution. The construction transfers probability mass
/// between overfull and underfull bins until every bin has unit expected
/// mass, giving O(1) sampling.
#[must_use]
pub fn create_alias_table(weights: &[f32]) -> (Vec<AliasEntry>, Vec<f32>) {
    let n = weights.len();
    assert!(n > 0, "alias table over an empty distribution");
    let sum: f64 = weights.iter().map(|w| f64::from(w.abs())).sum();

    let pdf: Vec<f32> = if sum == 0.0 {
        vec![1.0 / n as f32; n]
    } else {
        weights
            .iter()
            .map(|w| (f64::from(w.abs()) / sum) as f32)
            .collect()
    };

    let ratio = if sum == 0.0 { 0.0 } else { n as f64 / sum };
    let mut table: Vec<AliasEntry> = Vec::with_capacity(n);
    let mut over: Vec<u32> = Vec::new();
    let mut under: Vec<u32> = Vec::new();
    for (i, w) in weights.iter().enumerate() {
        let p = if sum == 0.0 {
            1.0
        } else {
            (f64::from(w.abs()) * ratio) as f32
        };
        table.push(AliasEntry {
            prob: p,
            alias: i as u32,
        });
        if p > 1.0 {
            over.push(i as u32);
        } else {
            under.push(i as u32);
        }
    }

    while let (Some(&o), Some(&u)) = (over.last(), under.last()) {
        over.pop();
        under.pop();
        table[o as usize].prob -= 1.0 - table[u as usize].prob;
        table[u as usize].alias = o;
        if table[o as usize].prob > 1.0 {
            over.push(o);
        } else if table[o as usize].prob < 1.0 {
            under.push(o);
        }
    }
    // Leftovers are numerical residue; they keep their own bin.
    for i in over.into_iter().chain(under) {
        table[i as usize].prob = 1.0;
        table[i as usize].alias = i;
    }

    (table, pdf)
}

/// Draws a bin from an alias table, returning the bin index and the
/// unit sample remapped for reuse.
#[must_use]
pub fn sample_alias_table(table: &[AliasEntry], u: f32) -> (usize, f32) {
    let n = table.len();
    let scaled = u * n as f32;
    let i = (scaled as usize).min(n - 1);
    let frac = scaled - i as f32;
    let entry = table[i];
    if frac < entry.prob {
        (i, (frac / entry.prob).min(1.0 - f32::EPSILON))
    } else {
        let remapped = ((frac - entry.prob) / (1.0 - entry.prob)).min(1.0 - f32::EPSILON);
        (entry.alias as usize, remapped)
    }
}

/// Concentric mapping from the unit square to the unit disk.
#[must_use]
pub fn sample_uniform_disk_concentric(u: Vec2) -> Vec2 {
    let u = u * 2.0 - Vec2::ONE;
    if u == Vec2::ZERO {
        return Vec2::ZERO;
    }
    let (r, theta) = if u.x.abs() > u.y.abs() {
        (u.x, FRAC_PI_4 * (u.y / u.x))
    } else {
        (u.y, FRAC_PI_2 - FRAC_PI_4 * (u.x / u.y))
    };
    r * Vec2::new(theta.cos(), theta.sin())
}

/// Cosine-weighted hemisphere sample around local `+Z`.
#[must_use]
pub fn sample_cosine_hemisphere(u: Vec2) -> Vec3 {
    let d = sample_uniform_disk_concentric(u);
    let z = (1.0 - d.x * d.x - d.y * d.y).max(0.0).sqrt();
    Vec3::new(d.x, d.y, z)
}

/// PDF of [`sample_cosine_hemisphere`] for a direction with the given
/// cosine against the hemisphere axis.
#[inline]
#[must_use]
pub fn cosine_hemisphere_pdf(cos_theta: f32) -> f32 {
    cos_theta / PI
}

/// Uniform barycentrics over a triangle (low-distortion square fold).
#[must_use]
pub fn sample_uniform_triangle(u: Vec2) -> Vec3 {
    let uv = if u.x < u.y {
        Vec2::new(0.5 * u.x, u.y - 0.5 * u.x)
    } else {
        Vec2::new(u.x - 0.5 * u.y, 0.5 * u.y)
    };
    Vec3::new(uv.x, uv.y, 1.0 - uv.x - uv.y)
}

/// Uniform direction on the unit sphere.
#[must_use]
pub fn sample_uniform_sphere(u: Vec2) -> Vec3 {
    let z = 1.0 - 2.0 * u.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * u.y;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// PDF of [`sample_uniform_sphere`].
#[inline]
#[must_use]
pub fn uniform_sphere_pdf() -> f32 {
    1.0 / (4.0 * PI)
}

/// Balance heuristic `pdf_a / (pdf_a + pdf_b)`.
///
/// An infinite `pdf_a` (a delta distribution, or the disabled-MIS marker
/// on the first bounce) collapses the weight to one; an infinite `pdf_b`
/// collapses it to zero.
#[must_use]
pub fn balance_heuristic(pdf_a: f32, pdf_b: f32) -> f32 {
    if !(pdf_a > 0.0) {
        return 0.0;
    }
    if pdf_a.is_infinite() {
        return 1.0;
    }
    if pdf_b.is_infinite() {
        return 0.0;
    }
    pdf_a / (pdf_a + pdf_b)
}

/// Power heuristic with exponent 2.
#[must_use]
pub fn power_heuristic(pdf_a: f32, pdf_b: f32) -> f32 {
    if !(pdf_a > 0.0) {
        return 0.0;
    }
    if pdf_a.is_infinite() {
        return 1.0;
    }
    if pdf_b.is_infinite() {
        return 0.0;
    }
    let fa = pdf_a * pdf_a;
    let fb = pdf_b * pdf_b;
    fa / (fa + fb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_table_normalizes_pdf() {
        let (_, pdf) = create_alias_table(&[1.0, 2.0, 3.0, 4.0]);
        let sum: f32 = pdf.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((pdf[3] - 0.4).abs() < 1e-5);
    }

    #[test]
    fn alias_table_zero_weights_degrade_to_uniform() {
        let (table, pdf) = create_alias_table(&[0.0, 0.0]);
        assert_eq!(table.len(), 2);
        assert!((pdf[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn balance_heuristic_handles_infinity() {
        assert_eq!(balance_heuristic(f32::INFINITY, 1.0), 1.0);
        assert_eq!(balance_heuristic(1.0, f32::INFINITY), 0.0);
        assert_eq!(balance_heuristic(0.0, 1.0), 0.0);
        assert!((balance_heuristic(1.0, 3.0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn triangle_barycentrics_sum_to_one() {
        for u in [
            Vec2::new(0.1, 0.9),
            Vec2::new(0.7, 0.2),
            Vec2::new(0.5, 0.5),
        ] {
            let b = sample_uniform_triangle(u);
            assert!((b.x + b.y + b.z - 1.0).abs() < 1e-6);
            assert!(b.min_element() >= 0.0);
        }
    }
}
