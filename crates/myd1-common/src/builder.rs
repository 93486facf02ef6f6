// builder.rs — programmatic level construction
//
// Used by tools and test fixtures. Cubes that share a face (same four
// vertices) are joined into a portal when the level is built.

use std::collections::HashMap;

use crate::cworld::SIDE_TO_VERTS;
use crate::d_shared::{Vec2, Vec3};
use crate::dfiles::{DCube, DLevel, DObject, DSide, DUvl, MAX_SIDES_PER_CUBE};
use crate::walls::{Trigger, Wall, WallType};

/// Vertices closer than this are merged.
const WELD_SCALE: f32 = 1024.0;

const DEFAULT_UVS: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(1.0, 0.0),
];

#[derive(Default)]
pub struct LevelBuilder {
    level: DLevel,
    vertex_lookup: HashMap<[i64; 3], usize>,
}

fn weld_key(p: Vec3) -> [i64; 3] {
    [
        (p.x * WELD_SCALE).round() as i64,
        (p.y * WELD_SCALE).round() as i64,
        (p.z * WELD_SCALE).round() as i64,
    ]
}

fn sorted_face(verts: &[usize; 8], side: usize) -> [usize; 4] {
    let mut ids = SIDE_TO_VERTS[side].map(|k| verts[k]);
    ids.sort_unstable();
    ids
}

impl LevelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A straight run of `count` cubes of edge `size` along +z, the first
    /// centered on the origin.
    pub fn corridor(count: usize, size: f32) -> Self {
        let mut b = Self::new();
        let h = size * 0.5;
        for i in 0..count {
            let z = i as f32 * size;
            b.add_box(Vec3::new(-h, -h, z - h), Vec3::new(h, h, z + h));
        }
        b
    }

    pub fn add_vertex(&mut self, p: Vec3) -> usize {
        let key = weld_key(p);
        if let Some(&i) = self.vertex_lookup.get(&key) {
            return i;
        }
        let i = self.level.vertices.len();
        self.level.vertices.push(p);
        self.vertex_lookup.insert(key, i);
        i
    }

    /// Add a hexahedron from its eight corners in cube vertex order.
    pub fn add_cube(&mut self, corners: [Vec3; 8]) -> usize {
        let verts = corners.map(|p| self.add_vertex(p));
        let side = DSide {
            tex1: 0,
            tex2: 0,
            uvls: DEFAULT_UVS.map(|uv| DUvl {
                u: uv.x,
                v: uv.y,
                l: 1.0,
            }),
        };
        self.level.cubes.push(DCube {
            children: [None; MAX_SIDES_PER_CUBE],
            verts,
            walls: [None; MAX_SIDES_PER_CUBE],
            sides: [side; MAX_SIDES_PER_CUBE],
        });
        self.level.cubes.len() - 1
    }

    /// Axis-aligned box. Left is -x, bottom -y, front -z.
    pub fn add_box(&mut self, min: Vec3, max: Vec3) -> usize {
        self.add_cube([
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
        ])
    }

    pub fn set_texture(&mut self, cube: usize, side: usize, tex1: u16, tex2: u16) {
        let s = &mut self.level.cubes[cube].sides[side];
        s.tex1 = tex1;
        s.tex2 = tex2;
    }

    pub fn add_wall(&mut self, cube: usize, side: usize, wall_type: WallType) -> usize {
        let index = self.level.walls.len();
        self.level.walls.push(Wall::new(cube, side, wall_type));
        self.level.cubes[cube].walls[side] = Some(index);
        index
    }

    /// Walls on both faces of a shared face, linked to each other. `None`
    /// if no other cube shares that face.
    pub fn add_wall_pair(&mut self, cube: usize, side: usize, wall_type: WallType) -> Option<(usize, usize)> {
        let (other, other_side) = self.coincident_face(cube, side)?;
        let a = self.add_wall(cube, side, wall_type);
        let b = self.add_wall(other, other_side, wall_type);
        self.level.walls[a].linked_wall = Some(b);
        self.level.walls[b].linked_wall = Some(a);
        Some((a, b))
    }

    pub fn wall_mut(&mut self, wall: usize) -> &mut Wall {
        &mut self.level.walls[wall]
    }

    pub fn add_trigger(&mut self, trigger: Trigger) -> usize {
        self.level.triggers.push(trigger);
        self.level.triggers.len() - 1
    }

    pub fn add_object(&mut self, obj: DObject) -> usize {
        self.level.objects.push(obj);
        self.level.objects.len() - 1
    }

    fn coincident_face(&self, cube: usize, side: usize) -> Option<(usize, usize)> {
        let face = sorted_face(&self.level.cubes[cube].verts, side);
        for (c, dc) in self.level.cubes.iter().enumerate() {
            if c == cube {
                continue;
            }
            for s in 0..MAX_SIDES_PER_CUBE {
                if sorted_face(&dc.verts, s) == face {
                    return Some((c, s));
                }
            }
        }
        None
    }

    /// Join shared faces into portals and return the level.
    pub fn build(mut self) -> DLevel {
        let mut faces: HashMap<[usize; 4], Vec<(usize, usize)>> = HashMap::new();
        for (c, dc) in self.level.cubes.iter().enumerate() {
            for s in 0..MAX_SIDES_PER_CUBE {
                faces.entry(sorted_face(&dc.verts, s)).or_default().push((c, s));
            }
        }
        for pair in faces.values() {
            if let [(a, sa), (b, sb)] = pair[..] {
                self.level.cubes[a].children[sa] = Some(b);
                self.level.cubes[b].children[sb] = Some(a);
            }
        }
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cworld::{World, SIDE_BACK, SIDE_FRONT};

    #[test]
    fn test_boxes_share_vertices_and_join() {
        let level = LevelBuilder::corridor(3, 20.0).build();
        assert_eq!(level.cubes.len(), 3);
        // 4 new corners per extra cube
        assert_eq!(level.vertices.len(), 16);
        assert_eq!(level.cubes[0].children[SIDE_BACK], Some(1));
        assert_eq!(level.cubes[1].children[SIDE_FRONT], Some(0));
        assert_eq!(level.cubes[1].children[SIDE_BACK], Some(2));
        assert_eq!(level.cubes[2].children[SIDE_BACK], None);
        assert!(World::from_level(&level).is_ok());
    }

    #[test]
    fn test_wall_pair_links() {
        let mut b = LevelBuilder::corridor(2, 20.0);
        let (w0, w1) = b.add_wall_pair(0, SIDE_BACK, WallType::Door).unwrap();
        let level = b.build();
        assert_eq!(level.walls[w0].linked_wall, Some(w1));
        assert_eq!(level.walls[w1].cube, 1);
        assert_eq!(level.walls[w1].side, SIDE_FRONT);
        assert_eq!(level.cubes[1].walls[SIDE_FRONT], Some(w1));
    }

    #[test]
    fn test_no_pair_for_outer_face() {
        let mut b = LevelBuilder::corridor(1, 20.0);
        assert!(b.add_wall_pair(0, SIDE_BACK, WallType::Door).is_none());
    }
}
