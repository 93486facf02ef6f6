// d_shared.rs — foundational math types shared by all modules

use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// ============================================================
// Fixed-point conversion (level files store 16.16 fixed)
// ============================================================

pub const F1_0: i32 = 0x10000;

#[inline]
pub fn fix_to_f32(f: i32) -> f32 {
    f as f32 / F1_0 as f32
}

#[inline]
pub fn f32_to_fix(f: f32) -> i32 {
    (f * F1_0 as f32).round() as i32
}

/// A fixang is a 16-bit fraction of a full turn.
#[inline]
pub fn fixang_to_radians(a: i16) -> f32 {
    a as f32 * std::f32::consts::TAU / 65536.0
}

#[inline]
pub fn radians_to_fixang(r: f32) -> i16 {
    ((r / std::f32::consts::TAU) * 65536.0).round() as i32 as i16
}

// ============================================================
// Vec2
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s)
    }

    pub fn dot(self, o: Self) -> f32 {
        self.x * o.x + self.y * o.y
    }

    pub fn lerp(self, o: Self, t: f32) -> Self {
        self + (o - self).scale(t)
    }

    /// Rotate by a quarter turn `quarters` times (overlay texture orientation).
    pub fn rotate_quarters(self, quarters: u8) -> Self {
        match quarters & 3 {
            0 => self,
            1 => Self::new(self.y, 1.0 - self.x),
            2 => Self::new(1.0 - self.x, 1.0 - self.y),
            _ => Self::new(1.0 - self.y, self.x),
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, o: Vec2) -> Vec2 {
        Vec2::new(self.x + o.x, self.y + o.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, o: Vec2) -> Vec2 {
        Vec2::new(self.x - o.x, self.y - o.y)
    }
}

// ============================================================
// Vec3
// ============================================================

/// Right-handed 3-space point or direction. Components are never NaN.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

pub const VEC3_ORIGIN: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

impl Vec3 {
    pub const ZERO: Vec3 = VEC3_ORIGIN;
    pub const UNIT_X: Vec3 = Vec3 { x: 1.0, y: 0.0, z: 0.0 };
    pub const UNIT_Y: Vec3 = Vec3 { x: 0.0, y: 1.0, z: 0.0 };
    pub const UNIT_Z: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 1.0 };

    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        debug_assert!(!x.is_nan() && !y.is_nan() && !z.is_nan(), "Vec3 component is NaN");
        Self { x, y, z }
    }

    /// Checked constructor for untrusted input. Rejects NaN and infinities.
    pub fn try_new(x: f32, y: f32, z: f32) -> Option<Self> {
        if x.is_finite() && y.is_finite() && z.is_finite() {
            Some(Self { x, y, z })
        } else {
            None
        }
    }

    pub fn from_array(a: [f32; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    #[inline]
    pub fn dot(self, o: Self) -> f32 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    #[inline]
    pub fn cross(self, o: Self) -> Self {
        Self::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }

    #[inline]
    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    /// `self + dir * s`
    #[inline]
    pub fn add_scaled(self, dir: Self, s: f32) -> Self {
        Self::new(self.x + dir.x * s, self.y + dir.y * s, self.z + dir.z * s)
    }

    #[inline]
    pub fn len2(self) -> f32 {
        self.dot(self)
    }

    #[inline]
    pub fn len(self) -> f32 {
        self.len2().sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero-length input.
    pub fn normalize(self) -> Self {
        let l = self.len();
        if l <= f32::EPSILON {
            return Self::ZERO;
        }
        self.scale(1.0 / l)
    }

    pub fn distance_to(self, o: Self) -> f32 {
        (self - o).len()
    }

    pub fn distance2(self, o: Self) -> f32 {
        (self - o).len2()
    }

    pub fn lerp(self, o: Self, t: f32) -> Self {
        self + (o - self).scale(t)
    }

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Component along `normal` removed (`normal` must be unit length).
    pub fn project_out(self, normal: Self) -> Self {
        self - normal.scale(self.dot(normal))
    }

    /// Mirror about the plane with unit `normal`.
    pub fn reflect(self, normal: Self) -> Self {
        self - normal.scale(2.0 * self.dot(normal))
    }

    /// Average of a set of points. Zero for an empty slice.
    pub fn average(points: &[Vec3]) -> Self {
        if points.is_empty() {
            return Self::ZERO;
        }
        let sum = points.iter().fold(Self::ZERO, |acc, p| acc + *p);
        sum.scale(1.0 / points.len() as f32)
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    #[inline]
    fn add(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, o: Vec3) {
        *self = *self + o;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    #[inline]
    fn sub(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, o: Vec3) {
        *self = *self - o;
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn mul(self, s: f32) -> Vec3 {
        self.scale(s)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(a: [f32; 3]) -> Self {
        Vec3::from_array(a)
    }
}

// ============================================================
// Mat3 — orientation frame, rows are right/up/forward
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub rvec: Vec3,
    pub uvec: Vec3,
    pub fvec: Vec3,
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat3 {
    pub const IDENTITY: Mat3 = Mat3 {
        rvec: Vec3::UNIT_X,
        uvec: Vec3::UNIT_Y,
        fvec: Vec3::UNIT_Z,
    };

    pub fn new(rvec: Vec3, uvec: Vec3, fvec: Vec3) -> Self {
        Self { rvec, uvec, fvec }
    }

    /// Build an orientation from pitch (about x), bank (about z) and
    /// heading (about y), all in radians.
    pub fn from_angles(pitch: f32, bank: f32, heading: f32) -> Self {
        let (sinp, cosp) = pitch.sin_cos();
        let (sinb, cosb) = bank.sin_cos();
        let (sinh, cosh) = heading.sin_cos();

        let sbsh = sinb * sinh;
        let cbch = cosb * cosh;
        let cbsh = cosb * sinh;
        let sbch = sinb * cosh;

        Self {
            rvec: Vec3::new(cbch + sinp * sbsh, sinb * cosp, sinp * sbch - cbsh),
            uvec: Vec3::new(sinp * cbsh - sbch, cosb * cosp, sbsh + sinp * cbch),
            fvec: Vec3::new(sinh * cosp, -sinp, cosh * cosp),
        }
    }

    /// Angles packed as (pitch, bank, heading) in a Vec3 (x, z, y order of axes).
    pub fn from_angle_vec(a: Vec3) -> Self {
        Self::from_angles(a.x, a.z, a.y)
    }

    pub fn transpose(&self) -> Self {
        Self {
            rvec: Vec3::new(self.rvec.x, self.uvec.x, self.fvec.x),
            uvec: Vec3::new(self.rvec.y, self.uvec.y, self.fvec.y),
            fvec: Vec3::new(self.rvec.z, self.uvec.z, self.fvec.z),
        }
    }

    /// Row-major product `self * o`.
    pub fn multiply(&self, o: &Mat3) -> Self {
        let t = o.transpose();
        let row = |r: Vec3| Vec3::new(r.dot(t.rvec), r.dot(t.uvec), r.dot(t.fvec));
        Self {
            rvec: row(self.rvec),
            uvec: row(self.uvec),
            fvec: row(self.fvec),
        }
    }

    /// World-space vector into this frame's local coordinates.
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.rvec), v.dot(self.uvec), v.dot(self.fvec))
    }

    /// Local vector back into world space.
    pub fn unrotate(&self, v: Vec3) -> Vec3 {
        self.rvec * v.x + self.uvec * v.y + self.fvec * v.z
    }

    /// Re-derive an orthonormal frame from the forward and up vectors.
    pub fn orthonormalize(&self) -> Self {
        let f = self.fvec.normalize();
        if f.is_zero() {
            return Self::IDENTITY;
        }
        let mut r = self.uvec.cross(f).normalize();
        if r.is_zero() {
            r = self.rvec.normalize();
        }
        let u = f.cross(r).normalize();
        Self { rvec: r, uvec: u, fvec: f }
    }
}

// ============================================================
// Mat4 — column-major affine transform
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4 {
    pub m: [f32; 16],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.m[col * 4 + row]
    }

    pub fn translation(t: Vec3) -> Self {
        let mut r = Self::IDENTITY;
        r.m[12] = t.x;
        r.m[13] = t.y;
        r.m[14] = t.z;
        r
    }

    /// Model matrix for an object at `pos` with orientation rows `orient`.
    pub fn from_orientation(pos: Vec3, orient: &Mat3) -> Self {
        let (r, u, f) = (orient.rvec, orient.uvec, orient.fvec);
        Self {
            m: [
                r.x, r.y, r.z, 0.0, //
                u.x, u.y, u.z, 0.0, //
                f.x, f.y, f.z, 0.0, //
                pos.x, pos.y, pos.z, 1.0,
            ],
        }
    }

    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let f = 1.0 / (fov_y * 0.5).tan();
        let nf = 1.0 / (near - far);
        let mut m = [0.0; 16];
        m[0] = f / aspect;
        m[5] = f;
        m[10] = (far + near) * nf;
        m[11] = -1.0;
        m[14] = 2.0 * far * near * nf;
        Self { m }
    }

    pub fn multiply(&self, o: &Mat4) -> Self {
        let mut m = [0.0; 16];
        for col in 0..4 {
            for row in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += self.at(row, k) * o.at(k, col);
                }
                m[col * 4 + row] = sum;
            }
        }
        Self { m }
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let x = self.at(0, 0) * p.x + self.at(0, 1) * p.y + self.at(0, 2) * p.z + self.at(0, 3);
        let y = self.at(1, 0) * p.x + self.at(1, 1) * p.y + self.at(1, 2) * p.z + self.at(1, 3);
        let z = self.at(2, 0) * p.x + self.at(2, 1) * p.y + self.at(2, 2) * p.z + self.at(2, 3);
        let w = self.at(3, 0) * p.x + self.at(3, 1) * p.y + self.at(3, 2) * p.z + self.at(3, 3);
        if w != 0.0 && w != 1.0 {
            Vec3::new(x / w, y / w, z / w)
        } else {
            Vec3::new(x, y, z)
        }
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).len() < 1e-4
    }

    #[test]
    fn test_fix_conversion() {
        assert_eq!(fix_to_f32(F1_0), 1.0);
        assert_eq!(fix_to_f32(-F1_0 / 2), -0.5);
        assert_eq!(f32_to_fix(2.25), 0x24000);
        assert!((fixang_to_radians(16384) - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_try_new_rejects_nan() {
        assert!(Vec3::try_new(f32::NAN, 0.0, 0.0).is_none());
        assert!(Vec3::try_new(0.0, f32::INFINITY, 0.0).is_none());
        assert_eq!(Vec3::try_new(1.0, 2.0, 3.0), Some(Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_cross_and_dot() {
        assert_eq!(Vec3::UNIT_X.cross(Vec3::UNIT_Y), Vec3::UNIT_Z);
        assert_eq!(Vec3::new(1.0, 2.0, 3.0).dot(Vec3::new(4.0, 5.0, 6.0)), 32.0);
    }

    #[test]
    fn test_normalize_zero_is_zero() {
        assert_eq!(Vec3::ZERO.normalize(), Vec3::ZERO);
        let n = Vec3::new(3.0, 0.0, 4.0).normalize();
        assert!(approx(n, Vec3::new(0.6, 0.0, 0.8)));
    }

    #[test]
    fn test_reflect_negates_normal_component() {
        let v = Vec3::new(1.0, -2.0, 0.5);
        let r = v.reflect(Vec3::UNIT_Y);
        assert!(approx(r, Vec3::new(1.0, 2.0, 0.5)));
        let s = v.project_out(Vec3::UNIT_Y);
        assert!(approx(s, Vec3::new(1.0, 0.0, 0.5)));
    }

    #[test]
    fn test_from_angles_identity_and_heading() {
        let m = Mat3::from_angles(0.0, 0.0, 0.0);
        assert!(approx(m.rvec, Vec3::UNIT_X));
        assert!(approx(m.uvec, Vec3::UNIT_Y));
        assert!(approx(m.fvec, Vec3::UNIT_Z));

        // quarter heading turns forward toward +x
        let m = Mat3::from_angles(0.0, 0.0, std::f32::consts::FRAC_PI_2);
        assert!(approx(m.fvec, Vec3::UNIT_X));
        assert!(approx(m.uvec, Vec3::UNIT_Y));
    }

    #[test]
    fn test_mat3_orthonormal_after_multiply() {
        let a = Mat3::from_angles(0.3, -0.2, 1.1);
        let b = Mat3::from_angles(-0.7, 0.4, 0.05);
        let c = a.multiply(&b).orthonormalize();
        assert!((c.rvec.len() - 1.0).abs() < 1e-4);
        assert!(c.rvec.dot(c.uvec).abs() < 1e-4);
        assert!(c.uvec.dot(c.fvec).abs() < 1e-4);
    }

    #[test]
    fn test_rotate_unrotate_roundtrip() {
        let m = Mat3::from_angles(0.4, 0.1, -0.9);
        let v = Vec3::new(3.0, -1.0, 2.0);
        assert!(approx(m.unrotate(m.rotate(v)), v));
    }

    #[test]
    fn test_mat4_translation_and_orientation() {
        let t = Mat4::translation(Vec3::new(1.0, 2.0, 3.0));
        assert!(approx(t.transform_point(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0)));

        let o = Mat3::from_angles(0.0, 0.0, std::f32::consts::FRAC_PI_2);
        let model = Mat4::from_orientation(Vec3::new(10.0, 0.0, 0.0), &o);
        // local forward (0,0,1) maps onto the frame's fvec
        assert!(approx(model.transform_point(Vec3::UNIT_Z), Vec3::new(11.0, 0.0, 0.0)));

        let both = Mat4::translation(Vec3::UNIT_Y).multiply(&model);
        assert!(approx(both.transform_point(Vec3::ZERO), Vec3::new(10.0, 1.0, 0.0)));
    }

    #[test]
    fn test_overlay_rotation_cycles() {
        let uv = Vec2::new(0.25, 0.75);
        let mut r = uv;
        for _ in 0..4 {
            r = r.rotate_quarters(1);
        }
        assert!((r - uv).dot(r - uv) < 1e-6);
    }
}
