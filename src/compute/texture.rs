use glam::{UVec3, Vec2, Vec4};

/// An RGBA-f32 2D texture with repeat addressing.
#[derive(Debug, Clone)]
pub struct Tex2d {
    width: u32,
    height: u32,
    data: Vec<Vec4>,
}

impl Tex2d {
    #[must_use]
    pub fn new(width: u32, height: u32, data: Vec<Vec4>) -> Self {
        assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Point fetch with repeat wrapping.
    #[must_use]
    pub fn read(&self, x: i64, y: i64) -> Vec4 {
        let x = x.rem_euclid(i64::from(self.width)) as u32;
        let y = y.rem_euclid(i64::from(self.height)) as u32;
        self.data[(y * self.width + x) as usize]
    }

    /// Bilinear sample at normalized coordinates with repeat wrapping.
    #[must_use]
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let x = uv.x * self.width as f32 - 0.5;
        let y = uv.y * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let x0 = x0 as i64;
        let y0 = y0 as i64;
        let c00 = self.read(x0, y0);
        let c10 = self.read(x0 + 1, y0);
        let c01 = self.read(x0, y0 + 1);
        let c11 = self.read(x0 + 1, y0 + 1);
        let top = c00 * (1.0 - fx) + c10 * fx;
        let bottom = c01 * (1.0 - fx) + c11 * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

/// An RGBA-f32 3D texture with clamp addressing.
#[derive(Debug, Clone)]
pub struct Tex3d {
    size: UVec3,
    data: Vec<Vec4>,
}

impl Tex3d {
    #[must_use]
    pub fn new(size: UVec3, data: Vec<Vec4>) -> Self {
        assert_eq!(data.len(), (size.x * size.y * size.z) as usize);
        Self { size, data }
    }

    #[must_use]
    pub fn size(&self) -> UVec3 {
        self.size
    }

    /// Point fetch with clamp addressing.
    #[must_use]
    pub fn read(&self, x: u32, y: u32, z: u32) -> Vec4 {
        let x = x.min(self.size.x - 1);
        let y = y.min(self.size.y - 1);
        let z = z.min(self.size.z - 1);
        self.data[((z * self.size.y + y) * self.size.x + x) as usize]
    }
}
