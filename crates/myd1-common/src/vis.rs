// vis.rs — portal-clipping visibility
//
// From a root cube, walk the portal graph depth first. Every root portal
// carries two sets of four planes, each plane hinged on one of the portal's
// edges:
//
//   clip  through the edge and the root corner that gives the widest view
//         past it; fixed for the whole branch
//   min   through the edge and a corner of a later portal in the chain;
//         starts as the root portal's own plane and only ever tightens
//
// A side whose four corners are all behind any active plane can't be seen
// through the portal chain. The path set is cleared on the way back out, so
// a cube reached again along another chain is walked again with that
// chain's planes.
//
// Results are pure functions of static geometry, so a cube's visibility is
// computed once and cached for the life of the level.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::cworld::{CubeVisibility, Side, SideRef, World};
use crate::d_shared::Vec3;
use crate::geometry::Plane3;

/// Tolerance for "behind a plane".
pub const VIS_EPSILON: f32 = 1e-4;
/// Longest portal chain followed from the root.
pub const VIS_MAX_DEPTH: usize = 25;

/// Plane through edge (a, b) and one of `points`, with every point in front
/// of or on it and `away` behind. Also returns the point it passes through.
fn hinge_plane(a: Vec3, b: Vec3, away: Vec3, points: &[Vec3]) -> Option<(Vec3, Plane3)> {
    points.iter().find_map(|&v| {
        let p = Plane3::from_points(a, v, b)?;
        let d = p.distance_to(away);
        if d.abs() <= VIS_EPSILON {
            return None;
        }
        let p = if d > 0.0 { p.reversed() } else { p };
        points
            .iter()
            .all(|&c| p.distance_to(c) >= -VIS_EPSILON)
            .then_some((v, p))
    })
}

/// The view out of the root cube through one of its portals, as narrowed
/// by the portals walked since.
#[derive(Debug, Clone, Copy)]
struct PortalFrustum {
    corners: [Vec3; 4],
    /// The root portal's plane, facing away from the root.
    surface: Plane3,
    clip: [Option<Plane3>; 4],
    min: [Plane3; 4],
}

impl PortalFrustum {
    fn new(portal: &Side, root_verts: &[Vec3]) -> Self {
        let corners = portal.vertices;
        let surface = Plane3::new(portal.center, portal.normal);
        let viewers: Vec<Vec3> = root_verts
            .iter()
            .copied()
            .filter(|&v| surface.distance_to(v) < -VIS_EPSILON)
            .collect();

        let mut clip = [None; 4];
        for (k, slot) in clip.iter_mut().enumerate() {
            let (a, b) = Self::edge(&corners, k);
            *slot = hinge_plane(a, b, Self::far_side(&corners, k), &viewers).map(|(_, p)| p.reversed());
        }
        Self {
            corners,
            surface,
            clip,
            min: [surface; 4],
        }
    }

    fn edge(q: &[Vec3; 4], k: usize) -> (Vec3, Vec3) {
        (q[k], q[(k + 1) % 4])
    }

    /// Midpoint of the edge across from edge `k`.
    fn far_side(q: &[Vec3; 4], k: usize) -> Vec3 {
        (q[(k + 2) % 4] + q[(k + 3) % 4]).scale(0.5)
    }

    /// All four corners behind one of the active planes.
    fn is_outside(&self, side: &Side) -> bool {
        let behind = |p: &Plane3| side.vertices.iter().all(|&v| p.distance_to(v) < -VIS_EPSILON);
        self.clip.iter().flatten().any(behind) || self.min.iter().any(behind)
    }

    /// The frustum past `portal`. Each min plane turns about its root edge
    /// until it touches the portal, if that is tighter than where it was.
    fn tightened(&self, portal: &Side) -> Self {
        let mut next = *self;
        if portal
            .vertices
            .iter()
            .any(|&v| self.surface.distance_to(v) < -VIS_EPSILON)
        {
            return next;
        }
        for k in 0..4 {
            let (a, b) = Self::edge(&self.corners, k);
            let away = Self::far_side(&self.corners, k);
            let Some((v, plane)) = hinge_plane(a, b, away, &portal.vertices) else { continue };
            if next.min[k].distance_to(v) > VIS_EPSILON {
                next.min[k] = plane;
            }
        }
        next
    }
}

struct VisState<'a> {
    world: &'a World,
    max_depth: usize,
    /// Cubes on the current path, by unique token.
    visited: HashSet<u32>,
    map_visible: HashSet<usize>,
    visible: Vec<usize>,
    seen_sides: HashSet<SideRef>,
    solid: Vec<SideRef>,
    blended: Vec<SideRef>,
}

impl<'a> VisState<'a> {
    fn mark_visible(&mut self, cube: usize) {
        if self.map_visible.insert(cube) {
            self.visible.push(cube);
        }
    }

    /// Solid sides are drawn opaque, walled portals blended, open portals
    /// not at all.
    fn record_side(&mut self, side: &Side) {
        let r = SideRef::new(side.cube, side.index);
        if !self.seen_sides.insert(r) {
            return;
        }
        match (side.neighbor, side.wall) {
            (None, _) => self.solid.push(r),
            (Some(_), Some(_)) => self.blended.push(r),
            (Some(_), None) => {}
        }
    }

    fn enter(&mut self, portal: SideRef, frustum: &PortalFrustum, depth: usize) {
        if depth > self.max_depth {
            return;
        }
        let world = self.world;
        let Some(next) = world.side(portal).neighbor else { return };
        let cube = &world.cubes[next];
        if !self.visited.insert(cube.unique) {
            return;
        }
        self.mark_visible(next);

        for side in &cube.sides {
            if let Some(n) = side.neighbor {
                if self.visited.contains(&world.cubes[n].unique) {
                    continue;
                }
            }
            if frustum.is_outside(side) {
                continue;
            }
            self.record_side(side);
            if side.neighbor.is_some() {
                let narrowed = frustum.tightened(side);
                self.enter(SideRef::new(next, side.index), &narrowed, depth + 1);
            }
        }

        self.visited.remove(&cube.unique);
    }
}

/// Visibility from `root`. Lighting neighbours are the visible cubes whose
/// centers lie within `distance_threshold` of the root's center.
pub fn compute_visibility(
    world: &World,
    root: usize,
    distance_threshold: f32,
    max_depth: usize,
) -> CubeVisibility {
    let root_cube = &world.cubes[root];
    let root_verts = root_cube.vertex_ids.map(|v| world.vertices[v]);
    let mut st = VisState {
        world,
        max_depth,
        visited: HashSet::new(),
        map_visible: HashSet::new(),
        visible: Vec::new(),
        seen_sides: HashSet::new(),
        solid: Vec::new(),
        blended: Vec::new(),
    };

    st.visited.insert(root_cube.unique);
    st.mark_visible(root);
    for side in &root_cube.sides {
        st.record_side(side);
    }
    for side in &root_cube.sides {
        if side.neighbor.is_none() {
            continue;
        }
        let frustum = PortalFrustum::new(side, &root_verts);
        st.enter(SideRef::new(root, side.index), &frustum, 1);
    }

    let center = root_cube.center;
    let dist2 = |r: &SideRef| world.side(*r).center.distance2(center);

    let mut solid = st.solid;
    solid.sort_by(|a, b| dist2(b).total_cmp(&dist2(a)));
    let mut blended = st.blended;
    blended.sort_by(|a, b| dist2(a).total_cmp(&dist2(b)));

    let limit2 = distance_threshold * distance_threshold;
    let lighting = st
        .visible
        .iter()
        .copied()
        .filter(|&c| world.cubes[c].center.distance2(center) <= limit2)
        .collect();

    CubeVisibility {
        visible_neighbors: st.visible,
        lighting_neighbors: lighting,
        visible_sides: solid,
        visible_sides_blended: blended,
    }
}

/// Visibility for every cube, in parallel. Index i holds cube i's result.
pub fn compute_all_visibility(world: &World, distance_threshold: f32, max_depth: usize) -> Vec<CubeVisibility> {
    (0..world.cubes.len())
        .into_par_iter()
        .map(|c| compute_visibility(world, c, distance_threshold, max_depth))
        .collect()
}

/// Compute and cache every cube's visibility. Returns how many were stored.
pub fn precompute_world(world: &mut World, distance_threshold: f32, max_depth: usize) -> usize {
    let all = compute_all_visibility(world, distance_threshold, max_depth);
    let mut stored = 0;
    for (c, vis) in all.into_iter().enumerate() {
        if world.set_visibility(c, vis) {
            stored += 1;
        }
    }
    stored
}

// ============================================================
// Tests
// ============================================================
