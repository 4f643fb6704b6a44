use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, MulAssign, Sub};

use smallvec::SmallVec;

/// Visible-range lower bound in nanometers.
pub const VISIBLE_WAVELENGTH_MIN: f32 = 360.0;
/// Visible-range upper bound in nanometers.
pub const VISIBLE_WAVELENGTH_MAX: f32 = 830.0;

type Lanes = SmallVec<[f32; 4]>;

/// Wavelengths sampled once per camera ray, with their sampling PDFs.
///
/// A PDF of zero marks a terminated sample. Dispersive closures collapse
/// the bundle to the primary wavelength through
/// [`terminate_secondary`](Self::terminate_secondary), after which only
/// sample 0 is live with its PDF rescaled by `1/N`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledWavelengths {
    lambda: Lanes,
    pdf: Lanes,
}

impl SampledWavelengths {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            lambda: smallvec::smallvec![0.0; dimension],
            pdf: smallvec::smallvec![0.0; dimension],
        }
    }

    #[must_use]
    pub fn from_parts(lambda: Vec<f32>, pdf: Vec<f32>) -> Self {
        assert_eq!(lambda.len(), pdf.len());
        Self {
            lambda: Lanes::from_vec(lambda),
            pdf: Lanes::from_vec(pdf),
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.lambda.len()
    }

    #[inline]
    #[must_use]
    pub fn lambda(&self, i: usize) -> f32 {
        self.lambda[i]
    }

    #[inline]
    #[must_use]
    pub fn pdf(&self, i: usize) -> f32 {
        self.pdf[i]
    }

    pub fn set_lambda(&mut self, i: usize, value: f32) {
        self.lambda[i] = value;
    }

    pub fn set_pdf(&mut self, i: usize, value: f32) {
        self.pdf[i] = value;
    }

    /// True once every sample but the primary has been terminated.
    #[must_use]
    pub fn secondary_terminated(&self) -> bool {
        self.pdf.iter().skip(1).all(|&p| p == 0.0)
    }

    /// Collapses the bundle to the primary wavelength, rescaling its PDF
    /// by `1/N`. Idempotent.
    pub fn terminate_secondary(&mut self) {
        if self.secondary_terminated() {
            return;
        }
        let n = self.dimension() as f32;
        self.pdf[0] /= n;
        for p in self.pdf.iter_mut().skip(1) {
            *p = 0.0;
        }
    }
}

/// A vector of per-wavelength scalar samples parallel to a
/// [`SampledWavelengths`] bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledSpectrum {
    values: Lanes,
}

impl SampledSpectrum {
    /// All-zero spectrum of the given dimension.
    #[must_use]
    pub fn zero(dimension: usize) -> Self {
        Self::splat(dimension, 0.0)
    }

    /// Constant spectrum of the given dimension.
    #[must_use]
    pub fn splat(dimension: usize, value: f32) -> Self {
        Self {
            values: smallvec::smallvec![value; dimension],
        }
    }

    /// Builds a spectrum from a per-lane function.
    #[must_use]
    pub fn from_fn(dimension: usize, f: impl FnMut(usize) -> f32) -> Self {
        Self {
            values: (0..dimension).map(f).collect(),
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[must_use]
    pub fn sum(&self) -> f32 {
        self.values.iter().sum()
    }

    #[must_use]
    pub fn average(&self) -> f32 {
        self.sum() / self.values.len() as f32
    }

    #[must_use]
    pub fn max_value(&self) -> f32 {
        self.values.iter().copied().fold(f32::MIN, f32::max)
    }

    /// True if every sample is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// True if any sample is NaN.
    #[must_use]
    pub fn has_nan(&self) -> bool {
        self.values.iter().any(|v| v.is_nan())
    }

    #[must_use]
    pub fn map(&self, f: impl FnMut(f32) -> f32) -> Self {
        Self {
            values: self.values.iter().copied().map(f).collect(),
        }
    }

    #[must_use]
    pub fn clamp(&self, min: f32, max: f32) -> Self {
        self.map(|v| v.clamp(min, max))
    }

    /// Element-wise division treating zero denominators as zero.
    #[must_use]
    pub fn safe_div(&self, rhs: &Self) -> Self {
        assert_eq!(self.dimension(), rhs.dimension());
        Self::from_fn(self.dimension(), |i| {
            if rhs.values[i] == 0.0 {
                0.0
            } else {
                self.values[i] / rhs.values[i]
            }
        })
    }
}

impl Index<usize> for SampledSpectrum {
    type Output = f32;

    fn index(&self, index: usize) -> &f32 {
        &self.values[index]
    }
}

impl IndexMut<usize> for SampledSpectrum {
    fn index_mut(&mut self, index: usize) -> &mut f32 {
        &mut self.values[index]
    }
}

macro_rules! spectrum_binop {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&SampledSpectrum> for &SampledSpectrum {
            type Output = SampledSpectrum;

            fn $method(self, rhs: &SampledSpectrum) -> SampledSpectrum {
                assert_eq!(self.dimension(), rhs.dimension());
                SampledSpectrum::from_fn(self.dimension(), |i| self.values[i] $op rhs.values[i])
            }
        }

        impl $trait<f32> for &SampledSpectrum {
            type Output = SampledSpectrum;

            fn $method(self, rhs: f32) -> SampledSpectrum {
                SampledSpectrum::from_fn(self.dimension(), |i| self.values[i] $op rhs)
            }
        }
    };
}

spectrum_binop!(Add, add, +);
spectrum_binop!(Sub, sub, -);
spectrum_binop!(Mul, mul, *);
spectrum_binop!(Div, div, /);

impl AddAssign<&SampledSpectrum> for SampledSpectrum {
    fn add_assign(&mut self, rhs: &SampledSpectrum) {
        assert_eq!(self.dimension(), rhs.dimension());
        for (v, r) in self.values.iter_mut().zip(rhs.values.iter()) {
            *v += r;
        }
    }
}

impl MulAssign<&SampledSpectrum> for SampledSpectrum {
    fn mul_assign(&mut self, rhs: &SampledSpectrum) {
        assert_eq!(self.dimension(), rhs.dimension());
        for (v, r) in self.values.iter_mut().zip(rhs.values.iter()) {
            *v *= r;
        }
    }
}

impl MulAssign<f32> for SampledSpectrum {
    fn mul_assign(&mut self, rhs: f32) {
        for v in &mut self.values {
            *v *= rhs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminate_secondary_rescales_primary_pdf() {
        let mut swl =
            SampledWavelengths::from_parts(vec![500.0, 550.0, 600.0, 650.0], vec![0.8; 4]);
        assert!(!swl.secondary_terminated());
        swl.terminate_secondary();
        assert!(swl.secondary_terminated());
        assert!((swl.pdf(0) - 0.2).abs() < 1e-6);
        assert_eq!(swl.pdf(1), 0.0);
        // A second call must not rescale again.
        swl.terminate_secondary();
        assert!((swl.pdf(0) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn arithmetic_and_reductions() {
        let a = SampledSpectrum::from_fn(4, |i| i as f32);
        let b = SampledSpectrum::splat(4, 2.0);
        let c = &a * &b;
        assert_eq!(c.values(), &[0.0, 2.0, 4.0, 6.0]);
        assert!((c.sum() - 12.0).abs() < 1e-6);
        assert!((c.average() - 3.0).abs() < 1e-6);
        assert!((c.max_value() - 6.0).abs() < 1e-6);
    }

    #[test]
    fn safe_div_ignores_zero_denominators() {
        let a = SampledSpectrum::splat(2, 1.0);
        let b = SampledSpectrum::from_fn(2, |i| i as f32);
        let c = a.safe_div(&b);
        assert_eq!(c.values(), &[0.0, 1.0]);
    }
}
