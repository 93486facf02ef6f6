// cworld.rs — the cube/side world graph
//
// A level is a set of hexahedral cubes. Each cube owns six quad sides; a side
// either leads into a neighbour cube (a portal) or is solid. Portals are
// always bidirectional. Items are referenced from their cube's object bag by
// index; the game keeps each item's bag slot in sync.
//
// Side normals point out of the owning cube. A point is inside a cube when it
// is on or behind every side.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::bitmap::Bitmap;
use crate::common::com_warnf;
use crate::crc::ChecksumWriter;
use crate::d_shared::{Vec2, Vec3};
use crate::dfiles::{
    DLevel, MAX_SIDES_PER_CUBE, MAX_VERTICES_PER_CUBE, TEX2_INDEX_MASK, TEX2_ORIENT_SHIFT,
};
use crate::error::{LoadError, LoadResult};
use crate::geometry::{Bounce, LineSegment, Triangle};
use crate::walls::{Trigger, Wall, WallType};

/// Cube corner indices of each side, in texture order.
pub const SIDE_TO_VERTS: [[usize; 4]; MAX_SIDES_PER_CUBE] = [
    [7, 6, 2, 3], // left
    [0, 4, 7, 3], // top
    [0, 1, 5, 4], // right
    [2, 6, 5, 1], // bottom
    [4, 5, 6, 7], // back
    [3, 2, 1, 0], // front
];

pub const SIDE_LEFT: usize = 0;
pub const SIDE_TOP: usize = 1;
pub const SIDE_RIGHT: usize = 2;
pub const SIDE_BOTTOM: usize = 3;
pub const SIDE_BACK: usize = 4;
pub const SIDE_FRONT: usize = 5;

/// Opposite side of a box-shaped cube.
pub const SIDE_OPPOSITE: [usize; MAX_SIDES_PER_CUBE] = [2, 3, 0, 1, 5, 4];

/// Quad corners of each side triangle, wound so the normal faces outward.
pub const TRI_CORNERS: [[usize; 3]; 2] = [[0, 2, 1], [0, 3, 2]];

static NEXT_UNIQUE: AtomicU32 = AtomicU32::new(1);

fn next_unique() -> u32 {
    NEXT_UNIQUE.fetch_add(1, Ordering::Relaxed)
}

// ============================================================
// Visibility cache types
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SideRef {
    pub cube: usize,
    pub side: usize,
}

impl SideRef {
    pub fn new(cube: usize, side: usize) -> Self {
        Self { cube, side }
    }
}

/// Visibility from one root cube. Computed once per cube, never invalidated
/// while the level is loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CubeVisibility {
    /// Every cube reachable through unoccluded portals, root first.
    pub visible_neighbors: Vec<usize>,
    /// Visible cubes whose centers are within the lighting threshold.
    pub lighting_neighbors: Vec<usize>,
    /// Solid sides, far to near.
    pub visible_sides: Vec<SideRef>,
    /// Portal sides with a wall, near to far.
    pub visible_sides_blended: Vec<SideRef>,
}

// ============================================================
// Side
// ============================================================

#[derive(Debug, Clone)]
pub struct Side {
    pub index: usize,
    pub cube: usize,
    pub vertices: [Vec3; 4],
    pub vertex_ids: [usize; 4],
    pub triangles: [Triangle; 2],
    pub neighbor: Option<usize>,
    pub wall: Option<usize>,
    pub tex1: u16,
    /// Raw overlay word: index in the low bits, rotation in the top two.
    pub tex2: u16,
    pub uvs: [Vec2; 4],
    /// Static light per corner, from the level.
    pub light: [f32; 4],
    /// Dynamic light accumulated this frame.
    pub light_accum: [f32; 4],
    pub center: Vec3,
    pub normal: Vec3,
}

impl Side {
    pub fn new(cube: usize, index: usize, vertex_ids: [usize; 4], vertices: [Vec3; 4]) -> Self {
        let triangles = TRI_CORNERS.map(|[a, b, c]| Triangle::new(vertices[a], vertices[b], vertices[c]));
        let normal = (triangles[0].normal() + triangles[1].normal()).normalize();
        Self {
            index,
            cube,
            vertices,
            vertex_ids,
            triangles,
            neighbor: None,
            wall: None,
            tex1: 0,
            tex2: 0,
            uvs: [Vec2::ZERO; 4],
            light: [1.0; 4],
            light_accum: [0.0; 4],
            center: Vec3::average(&vertices),
            normal,
        }
    }

    /// On or behind at least one of the two triangle planes.
    pub fn is_point_inside(&self, p: Vec3) -> bool {
        self.triangles.iter().any(|t| t.distance_to(p) <= 0.0)
    }

    /// Nearest hit over both triangles.
    pub fn bounce(&self, line: &LineSegment, size: f32) -> Option<Bounce> {
        let mut best: Option<Bounce> = None;
        for (i, tri) in self.triangles.iter().enumerate() {
            if let Some(mut b) = tri.bounce(line, size) {
                if best.map_or(true, |cur| b.distance < cur.distance) {
                    b.cube = self.cube;
                    b.side = self.index;
                    b.triangle = i;
                    best = Some(b);
                }
            }
        }
        best
    }

    /// Base texture coordinates at a bounce on this side.
    pub fn uv_at(&self, bounce: &Bounce) -> Vec2 {
        bounce.texture_coords(&self.uvs, &TRI_CORNERS[bounce.triangle])
    }

    pub fn has_overlay(&self) -> bool {
        self.tex2 != 0
    }

    pub fn tex2_index(&self) -> u16 {
        self.tex2 & TEX2_INDEX_MASK
    }

    /// Overlay rotation in quarter turns.
    pub fn tex2_orient(&self) -> u8 {
        (self.tex2 >> TEX2_ORIENT_SHIFT) as u8 & 3
    }

    pub fn get_pixel(&self, bounce: &Bounce, bitmap: &Bitmap) -> u8 {
        bitmap.texel_at_uv(self.uv_at(bounce))
    }

    /// Overlay texel; the overlay is rotated relative to the base texture.
    pub fn get_pixel2(&self, bounce: &Bounce, bitmap: &Bitmap) -> u8 {
        let uv = self.uv_at(bounce);
        let uv = Vec2::new(uv.x - uv.x.floor(), uv.y - uv.y.floor());
        bitmap.texel_at_uv(uv.rotate_quarters(self.tex2_orient()))
    }

    /// Falloff light from a point source into the corner accumulators.
    pub fn add_light(&mut self, source: Vec3, intensity: f32) {
        for (acc, v) in self.light_accum.iter_mut().zip(self.vertices.iter()) {
            *acc += intensity / v.distance_to(source).max(1.0);
        }
    }

    pub fn clear_light(&mut self) {
        self.light_accum = [0.0; 4];
    }
}

// ============================================================
// Cube
// ============================================================

#[derive(Debug, Clone)]
pub struct Cube {
    pub index: usize,
    /// Identity token, distinct across every cube ever built.
    pub unique: u32,
    pub center: Vec3,
    pub vertex_ids: [usize; MAX_VERTICES_PER_CUBE],
    pub sides: [Side; MAX_SIDES_PER_CUBE],
    /// Items currently inside, addressed by bag slot.
    pub objects: Vec<usize>,
    pub visibility: Option<CubeVisibility>,
}

impl Cube {
    pub fn new(index: usize, vertex_ids: [usize; MAX_VERTICES_PER_CUBE], vertices: &[Vec3]) -> Self {
        let corners = vertex_ids.map(|v| vertices[v]);
        let sides = std::array::from_fn(|s| {
            let ids = SIDE_TO_VERTS[s].map(|k| vertex_ids[k]);
            let verts = SIDE_TO_VERTS[s].map(|k| corners[k]);
            Side::new(index, s, ids, verts)
        });
        Self {
            index,
            unique: next_unique(),
            center: Vec3::average(&corners),
            vertex_ids,
            sides,
            objects: Vec::new(),
            visibility: None,
        }
    }

    pub fn is_point_inside(&self, p: Vec3) -> bool {
        self.sides.iter().all(|s| s.is_point_inside(p))
    }

    /// Nearest bounce over all six sides. `side_size` picks the sphere
    /// radius per side (portals are usually tested with 0).
    pub fn bounce<F>(&self, line: &LineSegment, side_size: F) -> Option<Bounce>
    where
        F: Fn(&Side) -> f32,
    {
        let mut best: Option<Bounce> = None;
        for side in &self.sides {
            if let Some(b) = side.bounce(line, side_size(side)) {
                if best.map_or(true, |cur| b.distance < cur.distance) {
                    best = Some(b);
                }
            }
        }
        best
    }

    /// Push an item into the bag; returns its slot.
    pub fn link(&mut self, item: usize) -> usize {
        self.objects.push(item);
        self.objects.len() - 1
    }

    /// Swap-remove the item at `slot`. Returns the item that now occupies
    /// `slot`, whose recorded slot the caller must update.
    pub fn unlink(&mut self, slot: usize) -> Option<usize> {
        debug_assert!(slot < self.objects.len(), "unlink of empty slot {}", slot);
        if slot >= self.objects.len() {
            return None;
        }
        self.objects.swap_remove(slot);
        self.objects.get(slot).copied()
    }

    pub fn neighbors(&self) -> impl Iterator<Item = usize> + '_ {
        self.sides.iter().filter_map(|s| s.neighbor)
    }
}

// ============================================================
// Geometry snapshot (crosses the visibility worker boundary)
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotCube {
    pub verts: [u32; MAX_VERTICES_PER_CUBE],
    pub children: [Option<u32>; MAX_SIDES_PER_CUBE],
    /// Wall type tag per side.
    pub walls: [Option<u8>; MAX_SIDES_PER_CUBE],
}

/// Static geometry only: plain data, no cached or per-frame state.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometrySnapshot {
    pub checksum: u32,
    pub vertices: Vec<[f32; 3]>,
    pub cubes: Vec<SnapshotCube>,
}

// ============================================================
// World
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct World {
    pub vertices: Vec<Vec3>,
    pub cubes: Vec<Cube>,
    pub walls: Vec<Wall>,
    pub triggers: Vec<Trigger>,
    /// Keys visibility results to this geometry.
    pub checksum: u32,
}

impl World {
    /// Build the graph from a decoded level. Portal links must be mutual.
    pub fn from_level(level: &DLevel) -> LoadResult<World> {
        for v in &level.vertices {
            if Vec3::try_new(v.x, v.y, v.z).is_none() {
                return Err(LoadError::NonFinite("vertex"));
            }
        }

        let mut cubes = Vec::with_capacity(level.cubes.len());
        for (index, dc) in level.cubes.iter().enumerate() {
            if let Some(&v) = dc.verts.iter().find(|&&v| v >= level.vertices.len()) {
                return Err(LoadError::BadVertexIndex {
                    index: v,
                    count: level.vertices.len(),
                });
            }
            let mut cube = Cube::new(index, dc.verts, &level.vertices);
            for (s, side) in cube.sides.iter_mut().enumerate() {
                side.neighbor = dc.children[s];
                side.wall = dc.walls[s];
                let ds = &dc.sides[s];
                side.tex1 = ds.tex1;
                side.tex2 = ds.tex2;
                side.uvs = ds.uvls.map(|uvl| Vec2::new(uvl.u, uvl.v));
                if dc.is_rendered(s) {
                    side.light = ds.uvls.map(|uvl| uvl.l);
                }
            }
            cubes.push(cube);
        }

        let mut world = World {
            vertices: level.vertices.clone(),
            cubes,
            walls: level.walls.clone(),
            triggers: level.triggers.clone(),
            checksum: 0,
        };
        world.validate_portals()?;
        world.checksum = world.compute_checksum();
        Ok(world)
    }

    /// Rebuild a geometry-only world from a snapshot. Sides get their walls
    /// back as bare records; textures and items are not carried.
    pub fn from_snapshot(snap: &GeometrySnapshot) -> LoadResult<World> {
        let mut vertices = Vec::with_capacity(snap.vertices.len());
        for v in &snap.vertices {
            vertices.push(Vec3::try_new(v[0], v[1], v[2]).ok_or(LoadError::NonFinite("vertex"))?);
        }

        let mut cubes = Vec::with_capacity(snap.cubes.len());
        let mut walls = Vec::new();
        for (index, sc) in snap.cubes.iter().enumerate() {
            let verts = sc.verts.map(|v| v as usize);
            for &v in &verts {
                if v >= vertices.len() {
                    return Err(LoadError::BadVertexIndex {
                        index: v,
                        count: vertices.len(),
                    });
                }
            }
            let mut cube = Cube::new(index, verts, &vertices);
            for s in 0..MAX_SIDES_PER_CUBE {
                if let Some(child) = sc.children[s] {
                    let child = child as usize;
                    if child >= snap.cubes.len() {
                        return Err(LoadError::BadCubeIndex {
                            index: child,
                            count: snap.cubes.len(),
                        });
                    }
                    cube.sides[s].neighbor = Some(child);
                }
                if let Some(tag) = sc.walls[s] {
                    let wall_type = WallType::from_tag(tag).ok_or(LoadError::UnknownWallType(tag))?;
                    cube.sides[s].wall = Some(walls.len());
                    walls.push(Wall::new(index, s, wall_type));
                }
            }
            cubes.push(cube);
        }

        let mut world = World {
            vertices,
            cubes,
            walls,
            triggers: Vec::new(),
            checksum: 0,
        };
        world.validate_portals()?;
        world.checksum = world.compute_checksum();
        if world.checksum != snap.checksum {
            com_warnf(&format!(
                "snapshot checksum {:08x} differs from rebuilt {:08x}\n",
                snap.checksum, world.checksum
            ));
        }
        Ok(world)
    }

    pub fn snapshot(&self) -> GeometrySnapshot {
        GeometrySnapshot {
            checksum: self.checksum,
            vertices: self.vertices.iter().map(|v| v.to_array()).collect(),
            cubes: self
                .cubes
                .iter()
                .map(|c| SnapshotCube {
                    verts: c.vertex_ids.map(|v| v as u32),
                    children: c.sides.each_ref().map(|s| s.neighbor.map(|n| n as u32)),
                    walls: c
                        .sides
                        .each_ref()
                        .map(|s| s.wall.map(|w| self.walls[w].wall_type.tag())),
                })
                .collect(),
        }
    }

    fn validate_portals(&self) -> LoadResult<()> {
        let count = self.cubes.len();
        for cube in &self.cubes {
            for side in &cube.sides {
                if let Some(w) = side.wall {
                    if w >= self.walls.len() {
                        return Err(LoadError::BadWallIndex {
                            index: w,
                            count: self.walls.len(),
                        });
                    }
                }
                let Some(n) = side.neighbor else { continue };
                if n >= count {
                    return Err(LoadError::BadCubeIndex { index: n, count });
                }
                if self.matching_side(cube.index, side.index).is_none() {
                    return Err(LoadError::AsymmetricPortal {
                        cube: cube.index,
                        side: side.index,
                        neighbor: n,
                    });
                }
            }
        }
        Ok(())
    }

    /// The neighbour's side that leads back through portal (cube, side).
    pub fn matching_side(&self, cube: usize, side: usize) -> Option<usize> {
        let s = &self.cubes[cube].sides[side];
        let n = s.neighbor?;
        let mut ids = s.vertex_ids;
        ids.sort_unstable();
        self.cubes[n].sides.iter().position(|ns| {
            let mut nids = ns.vertex_ids;
            nids.sort_unstable();
            ns.neighbor == Some(cube) && nids == ids
        })
    }

    fn compute_checksum(&self) -> u32 {
        let mut w = ChecksumWriter::new();
        for v in &self.vertices {
            w.update_f32(v.x);
            w.update_f32(v.y);
            w.update_f32(v.z);
        }
        for cube in &self.cubes {
            for &v in &cube.vertex_ids {
                w.update_u32(v as u32);
            }
            for side in &cube.sides {
                w.update_u32(side.neighbor.map_or(u32::MAX, |n| n as u32));
                w.update(&[side.wall.map_or(0xff, |i| self.walls[i].wall_type.tag())]);
            }
        }
        w.finalize()
    }

    pub fn cube(&self, index: usize) -> &Cube {
        &self.cubes[index]
    }

    pub fn side(&self, r: SideRef) -> &Side {
        &self.cubes[r.cube].sides[r.side]
    }

    /// Whether an item can move through (cube, side) right now.
    pub fn is_passable(&self, cube: usize, side: usize) -> bool {
        let s = &self.cubes[cube].sides[side];
        s.neighbor.is_some() && s.wall.map_or(true, |w| self.walls[w].is_passable())
    }

    /// Nearest bounce in `cube` for a sphere of radius `size`. Passable
    /// portals are tested with the center point so crossing happens when the
    /// center goes through.
    pub fn cube_bounce(&self, cube: usize, line: &LineSegment, size: f32) -> Option<Bounce> {
        self.cubes[cube].bounce(line, |s| if self.is_passable(cube, s.index) { 0.0 } else { size })
    }

    /// Cube containing `point`, trying `hint` and its neighbours first.
    pub fn find_cube(&self, point: Vec3, hint: Option<usize>) -> Option<usize> {
        if let Some(h) = hint.filter(|&h| h < self.cubes.len()) {
            if self.cubes[h].is_point_inside(point) {
                return Some(h);
            }
            for n in self.cubes[h].neighbors() {
                if self.cubes[n].is_point_inside(point) {
                    return Some(n);
                }
            }
        }
        self.cubes.iter().position(|c| c.is_point_inside(point))
    }

    /// Cached visible cubes, or every cube until the result arrives.
    pub fn visible_cubes(&self, root: usize) -> Vec<usize> {
        match &self.cubes[root].visibility {
            Some(vis) => vis.visible_neighbors.clone(),
            None => (0..self.cubes.len()).collect(),
        }
    }

    pub fn has_visibility(&self, cube: usize) -> bool {
        self.cubes[cube].visibility.is_some()
    }

    /// Store a result. The first one wins; returns false if one was already
    /// cached.
    pub fn set_visibility(&mut self, cube: usize, vis: CubeVisibility) -> bool {
        let slot = &mut self.cubes[cube].visibility;
        if slot.is_some() {
            return false;
        }
        *slot = Some(vis);
        true
    }

    /// Light every side of the cubes lit from `root` (the lighting
    /// neighbours once known, the root alone before that).
    pub fn add_light(&mut self, root: usize, source: Vec3, intensity: f32) {
        let targets = match &self.cubes[root].visibility {
            Some(vis) => vis.lighting_neighbors.clone(),
            None => vec![root],
        };
        for c in targets {
            for side in self.cubes[c].sides.iter_mut() {
                side.add_light(source, intensity);
            }
        }
    }

    pub fn clear_light(&mut self) {
        for cube in &mut self.cubes {
            for side in cube.sides.iter_mut() {
                side.clear_light();
            }
        }
    }
}

// ============================================================
// Tests
// ============================================================
