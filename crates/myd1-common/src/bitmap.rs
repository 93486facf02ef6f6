// bitmap.rs — decoded 8-bit paletted textures
//
// Only what collision needs: texel lookup at a UV so a weapon can tell a
// lattice hole from solid metal. Asset pack decoding happens elsewhere.

use crate::d_shared::Vec2;

/// Palette index drawn as see-through.
pub const TRANSPARENT: u8 = 255;
/// Palette index that cuts a hole through the base texture of an overlay.
pub const SUPER_TRANSPARENT: u8 = 254;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    /// Row-major palette indices, `width * height` long.
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// `None` if the pixel count doesn't match or a dimension is zero.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || pixels.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn solid(width: usize, height: usize, color: u8) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            pixels: vec![color; width.max(1) * height.max(1)],
        }
    }

    pub fn texel(&self, x: usize, y: usize) -> u8 {
        self.pixels[(y % self.height) * self.width + (x % self.width)]
    }

    /// Texel at a texture coordinate; 1.0 spans the bitmap once and the
    /// texture repeats in both directions.
    pub fn texel_at_uv(&self, uv: Vec2) -> u8 {
        let fu = uv.x - uv.x.floor();
        let fv = uv.y - uv.y.floor();
        let x = ((fu * self.width as f32) as usize).min(self.width - 1);
        let y = ((fv * self.height as f32) as usize).min(self.height - 1);
        self.texel(x, y)
    }

    pub fn is_transparent_at(&self, uv: Vec2) -> bool {
        let c = self.texel_at_uv(uv);
        c == TRANSPARENT || c == SUPER_TRANSPARENT
    }

    pub fn has_transparency(&self) -> bool {
        self.pixels
            .iter()
            .any(|&c| c == TRANSPARENT || c == SUPER_TRANSPARENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Bitmap {
        // left half solid, right half transparent
        let mut px = vec![0u8; 16];
        for y in 0..4 {
            px[y * 4 + 2] = TRANSPARENT;
            px[y * 4 + 3] = SUPER_TRANSPARENT;
        }
        Bitmap::from_pixels(4, 4, px).unwrap()
    }

    #[test]
    fn test_from_pixels_validates() {
        assert!(Bitmap::from_pixels(2, 2, vec![0; 3]).is_none());
        assert!(Bitmap::from_pixels(0, 2, vec![]).is_none());
    }

    #[test]
    fn test_texel_lookup_wraps() {
        let b = checker();
        assert_eq!(b.texel_at_uv(Vec2::new(0.1, 0.1)), 0);
        assert_eq!(b.texel_at_uv(Vec2::new(0.6, 0.1)), TRANSPARENT);
        assert_eq!(b.texel_at_uv(Vec2::new(1.6, -0.9)), TRANSPARENT);
        assert_eq!(b.texel_at_uv(Vec2::new(-0.1, 0.0)), SUPER_TRANSPARENT);
        assert_eq!(b.texel_at_uv(Vec2::new(1.0, 1.0)), 0);
    }

    #[test]
    fn test_transparency() {
        let b = checker();
        assert!(!b.is_transparent_at(Vec2::new(0.2, 0.5)));
        assert!(b.is_transparent_at(Vec2::new(0.8, 0.5)));
        assert!(b.has_transparency());
        assert!(!Bitmap::solid(8, 8, 3).has_transparency());
    }
}
