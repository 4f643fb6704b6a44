//! sRGB / CIE XYZ conversions and gamma encoding.

use glam::{Mat3, Vec3};

/// Column-major CIE XYZ → linear sRGB (D65 white point).
pub const XYZ_TO_SRGB: Mat3 = Mat3::from_cols(
    Vec3::new(3.240479, -0.969256, 0.055648),
    Vec3::new(-1.537150, 1.875991, -0.204043),
    Vec3::new(-0.498535, 0.041556, 1.057311),
);

/// Column-major linear sRGB → CIE XYZ (D65 white point).
pub const SRGB_TO_XYZ: Mat3 = Mat3::from_cols(
    Vec3::new(0.412453, 0.212671, 0.019334),
    Vec3::new(0.357580, 0.715160, 0.119193),
    Vec3::new(0.180423, 0.072169, 0.950227),
);

/// CIE Y (luminance) of a linear sRGB color.
#[inline]
#[must_use]
pub fn srgb_to_cie_y(rgb: Vec3) -> f32 {
    rgb.dot(Vec3::new(0.212671, 0.715160, 0.072169))
}

/// Linear sRGB → CIE XYZ.
#[inline]
#[must_use]
pub fn srgb_to_cie_xyz(rgb: Vec3) -> Vec3 {
    SRGB_TO_XYZ * rgb
}

/// CIE XYZ → linear sRGB.
#[inline]
#[must_use]
pub fn cie_xyz_to_srgb(xyz: Vec3) -> Vec3 {
    XYZ_TO_SRGB * xyz
}

/// Encodes one linear channel with the piecewise sRGB transfer function.
#[inline]
#[must_use]
pub fn linear_to_srgb(x: f32) -> f32 {
    if x <= 0.003_130_8 {
        12.92 * x
    } else {
        1.055 * x.powf(1.0 / 2.4) - 0.055
    }
}

/// Decodes one sRGB-encoded channel back to linear.
#[inline]
#[must_use]
pub fn srgb_to_linear(x: f32) -> f32 {
    if x <= 0.040_45 {
        x / 12.92
    } else {
        ((x + 0.055) / 1.055).powf(2.4)
    }
}

/// The ACES filmic curve (Narkowicz fit), applied per channel.
#[inline]
#[must_use]
pub fn aces_tone_map(x: f32) -> f32 {
    const A: f32 = 2.51;
    const B: f32 = 0.03;
    const C: f32 = 2.43;
    const D: f32 = 0.59;
    const E: f32 = 0.14;
    ((x * (A * x + B)) / (x * (C * x + D) + E)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn xyz_matrices_are_inverses() {
        let m = XYZ_TO_SRGB * SRGB_TO_XYZ;
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(m.col(i)[j], expected, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn srgb_transfer_round_trip() {
        for x in [0.0f32, 0.001, 0.02, 0.18, 0.5, 1.0] {
            assert_relative_eq!(srgb_to_linear(linear_to_srgb(x)), x, epsilon = 1e-5);
        }
    }

    #[test]
    fn white_maps_to_unit_luminance() {
        assert_relative_eq!(srgb_to_cie_y(Vec3::ONE), 1.0, epsilon = 1e-4);
    }
}
