// geometry.rs — planes, triangles, segments and swept-sphere bounces
//
// Sidedness: a triangle's normal is (v1 - v0) x (v2 - v0). Cube sides are
// wound so that normals point OUT of the owning cube; `distance_to <= 0`
// means "inside".

use crate::d_shared::{Vec2, Vec3};

/// Smallest normal length accepted when building a plane from points.
pub const PLANE_EPSILON: f32 = 1e-6;

// ============================================================
// Plane3
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane3 {
    pub anchor: Vec3,
    pub normal: Vec3,
}

impl Plane3 {
    /// `normal` is normalized here.
    pub fn new(anchor: Vec3, normal: Vec3) -> Self {
        Self {
            anchor,
            normal: normal.normalize(),
        }
    }

    /// Plane through three points, normal = (b - a) x (c - a).
    /// Returns `None` for collinear points.
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Option<Self> {
        let n = (b - a).cross(c - a);
        let len = n.len();
        if len < PLANE_EPSILON {
            return None;
        }
        Some(Self {
            anchor: a,
            normal: n.scale(1.0 / len),
        })
    }

    /// Signed distance; positive is in front.
    #[inline]
    pub fn distance_to(&self, p: Vec3) -> f32 {
        self.normal.dot(p - self.anchor)
    }

    pub fn reversed(&self) -> Self {
        Self {
            anchor: self.anchor,
            normal: -self.normal,
        }
    }

    pub fn project(&self, p: Vec3) -> Vec3 {
        p - self.normal.scale(self.distance_to(p))
    }
}

// ============================================================
// LineSegment
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub start: Vec3,
    pub end: Vec3,
    /// Unit direction, zero for a degenerate segment.
    pub direction: Vec3,
    pub length: f32,
}

impl LineSegment {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        let delta = end - start;
        let length = delta.len();
        Self {
            start,
            end,
            direction: delta.normalize(),
            length,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.direction.is_zero()
    }

    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.start.add_scaled(self.direction, distance)
    }

    /// Distance along the segment at which a point moving along it first
    /// touches the sphere. `None` when there is no forward intersection
    /// (missed, already overlapping, or behind the start).
    pub fn distance_to_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let l = self.direction;
        let c = center - self.start;
        let a = l.dot(c);
        let b = l.dot(l);
        if b == 0.0 {
            return None;
        }
        let q = a * a - b * (c.dot(c) - radius * radius);
        if q <= 0.0 {
            return None;
        }
        let d = (a - q.sqrt()) / b;
        if d.is_nan() || d <= 0.0 {
            return None;
        }
        Some(d)
    }
}

// ============================================================
// Triangle
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    pub u: Vec3,
    pub v: Vec3,
    pub uu: f32,
    pub uv: f32,
    pub vv: f32,
    /// uv^2 - uu*vv. Zero for a degenerate triangle.
    pub d: f32,
    pub plane: Plane3,
}

impl Triangle {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        let u = v1 - v0;
        let v = v2 - v0;
        let uu = u.dot(u);
        let uv = u.dot(v);
        let vv = v.dot(v);
        Self {
            v0,
            v1,
            v2,
            u,
            v,
            uu,
            uv,
            vv,
            d: uv * uv - uu * vv,
            // a degenerate triangle keeps a zero normal; nothing is in front of it
            plane: Plane3 {
                anchor: v0,
                normal: u.cross(v).normalize(),
            },
        }
    }

    #[inline]
    pub fn normal(&self) -> Vec3 {
        self.plane.normal
    }

    #[inline]
    pub fn distance_to(&self, p: Vec3) -> f32 {
        self.plane.distance_to(p)
    }

    pub fn is_degenerate(&self) -> bool {
        self.d == 0.0 || self.plane.normal.is_zero()
    }

    /// Barycentric (s, t) of `p` along the u and v edges. `None` if the
    /// result is not finite (degenerate triangle).
    pub fn barycentric(&self, p: Vec3) -> Option<(f32, f32)> {
        let w = p - self.v0;
        let wu = w.dot(self.u);
        let wv = w.dot(self.v);
        let s = (self.uv * wv - self.vv * wu) / self.d;
        let t = (self.uv * wu - self.uu * wv) / self.d;
        if s.is_finite() && t.is_finite() {
            Some((s, t))
        } else {
            None
        }
    }

    /// Whether `p`, assumed on the plane, lies inside the triangle.
    /// Written so that NaN coordinates fail every test.
    pub fn contains_point(&self, p: Vec3) -> bool {
        let w = p - self.v0;
        let wu = w.dot(self.u);
        let wv = w.dot(self.v);
        let s = (self.uv * wv - self.vv * wu) / self.d;
        if !(s >= 0.0 && s <= 1.0) {
            return false;
        }
        let t = (self.uv * wu - self.uu * wv) / self.d;
        t >= 0.0 && s + t <= 1.0
    }

    /// Swept-sphere test of a sphere of radius `size` moving along `line`.
    ///
    /// Contact happens when the center is `size` units in front of the
    /// plane (on the side it comes from). The returned bounce has no cube or
    /// side yet; callers fill those in.
    pub fn bounce(&self, line: &LineSegment, size: f32) -> Option<Bounce> {
        let n = self.plane.normal;
        let dot = line.direction.dot(n);
        if !(dot > 0.0) {
            return None;
        }

        // start is behind the plane by `plane_distance`
        let plane_distance = -self.plane.distance_to(line.start);
        let distance = (plane_distance - size) / dot;
        if !(distance >= -BOUNCE_EPSILON) || distance > line.length {
            return None;
        }
        let distance = distance.max(0.0);

        let point = line.point_at(distance);
        let contact = point.add_scaled(n, size);
        let (s, t) = self.barycentric(contact)?;
        if !(s >= 0.0 && s <= 1.0 && t >= 0.0 && s + t <= 1.0) {
            return None;
        }

        Some(Bounce {
            point,
            contact,
            normal: n,
            cube: 0,
            side: 0,
            triangle: 0,
            plane_distance,
            distance,
            bary: Vec2::new(s, t),
        })
    }
}

/// Slack allowed for a sphere resting exactly `size` from a wall.
pub const BOUNCE_EPSILON: f32 = 1e-4;

// ============================================================
// Bounce
// ============================================================

/// Result of a swept-sphere collision: the plane that was hit, where, and how
/// far along the segment. Transient, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounce {
    /// Sphere center at the moment of contact.
    pub point: Vec3,
    /// Touching point on the triangle's plane.
    pub contact: Vec3,
    /// Outward normal of the hit triangle.
    pub normal: Vec3,
    pub cube: usize,
    pub side: usize,
    /// 0 or 1 within the side.
    pub triangle: usize,
    /// Perpendicular distance from the segment start to the plane.
    pub plane_distance: f32,
    /// Distance travelled along the segment before contact.
    pub distance: f32,
    /// Barycentric coordinates of `contact` in the hit triangle.
    pub bary: Vec2,
}

impl Bounce {
    pub fn plane(&self) -> Plane3 {
        Plane3 {
            anchor: self.contact,
            normal: self.normal,
        }
    }

    /// Elastic reflection of a velocity about the hit plane.
    pub fn reflect(&self, v: Vec3) -> Vec3 {
        v.reflect(self.normal)
    }

    /// Velocity with the into-the-wall component removed.
    pub fn slide(&self, v: Vec3) -> Vec3 {
        let into = v.dot(self.normal);
        if into > 0.0 {
            v - self.normal.scale(into)
        } else {
            v
        }
    }

    /// Texture coordinates at the contact, blending the three corner UVs of
    /// the hit triangle along its two edges. `tri_corners` maps triangle
    /// vertices onto indices into `uvs`.
    pub fn texture_coords(&self, uvs: &[Vec2; 4], tri_corners: &[usize; 3]) -> Vec2 {
        let a = uvs[tri_corners[0]];
        let b = uvs[tri_corners[1]];
        let c = uvs[tri_corners[2]];
        a + (b - a).scale(self.bary.x) + (c - a).scale(self.bary.y)
    }
}

// ============================================================
// Tests
// ============================================================
