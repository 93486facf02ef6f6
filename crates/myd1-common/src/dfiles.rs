// dfiles.rs — binary level format
//
// Little-endian stream:
//
//   magic "DLVL", u32 version
//   u32 vertex count,  vertices as 3 x 16.16 fixed
//   u32 cube count,    cube records
//   u32 object count,  object records
//   u32 wall count,    wall records
//   u32 trigger count, trigger records
//
// Decoding validates type tags and table indices; anything unknown fails the
// whole load.

use crate::d_shared::{fix_to_f32, f32_to_fix, Mat3, Vec3};
use crate::error::{LoadError, LoadResult};
use crate::walls::{
    Trigger, TriggerFlags, TriggerType, Wall, WallFlags, WallKeys, WallState, WallType,
};

pub const LEVEL_MAGIC: [u8; 4] = *b"DLVL";
pub const LEVEL_VERSION: u32 = 1;

pub const MAX_SIDES_PER_CUBE: usize = 6;
pub const MAX_VERTICES_PER_CUBE: usize = 8;

/// Set on tex1 when a tex2 word follows.
pub const TEX1_HAS_TEX2: u16 = 0x8000;
/// Overlay texture index bits of tex2; the top two bits are its rotation.
pub const TEX2_INDEX_MASK: u16 = 0x3fff;
pub const TEX2_ORIENT_SHIFT: u16 = 14;

/// UV words are 1/2048 units, light words 1/32768.
const UV_SCALE: f32 = 2048.0;
const LIGHT_SCALE: f32 = 32768.0;

// ============================================================
// Object type tags
// ============================================================

pub const OBJ_WALL: u8 = 0;
pub const OBJ_FIREBALL: u8 = 1;
pub const OBJ_ROBOT: u8 = 2;
pub const OBJ_HOSTAGE: u8 = 3;
pub const OBJ_PLAYER: u8 = 4;
pub const OBJ_WEAPON: u8 = 5;
pub const OBJ_POWERUP: u8 = 7;
pub const OBJ_DEBRIS: u8 = 8;
pub const OBJ_CNTRLCEN: u8 = 9;
pub const OBJ_FLARE: u8 = 10;
pub const OBJ_CLUTTER: u8 = 11;
pub const OBJ_GHOST: u8 = 12;
pub const OBJ_LIGHT: u8 = 13;
pub const OBJ_MARKER: u8 = 15;

pub const CT_NONE: u8 = 0;
pub const CT_AI: u8 = 1;
pub const CT_EXPLOSION: u8 = 2;
pub const CT_FLYING: u8 = 4;
pub const CT_SLEW: u8 = 5;
pub const CT_FLARE: u8 = 6;
pub const CT_WEAPON: u8 = 9;
pub const CT_REPAIRCEN: u8 = 10;
pub const CT_MORPH: u8 = 11;
pub const CT_DEBRIS: u8 = 12;
pub const CT_POWERUP: u8 = 13;
pub const CT_LIGHT: u8 = 14;
pub const CT_REMOTE: u8 = 15;
pub const CT_CNTRLCEN: u8 = 16;

pub const MT_NONE: u8 = 0;
pub const MT_PHYSICS: u8 = 1;
pub const MT_SPINNING: u8 = 3;

pub const RT_NONE: u8 = 0;
pub const RT_POLYOBJ: u8 = 1;
pub const RT_FIREBALL: u8 = 2;
pub const RT_LASER: u8 = 3;
pub const RT_HOSTAGE: u8 = 4;
pub const RT_POWERUP: u8 = 5;
pub const RT_MORPH: u8 = 6;
pub const RT_WEAPON_VCLIP: u8 = 7;

pub fn is_known_object_type(t: u8) -> bool {
    matches!(t, 0..=5 | 7..=13 | 15)
}

pub fn is_known_control_type(t: u8) -> bool {
    matches!(t, 0..=2 | 4..=6 | 9..=16)
}

// ============================================================
// Decoded records
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DUvl {
    pub u: f32,
    pub v: f32,
    pub l: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DSide {
    pub tex1: u16,
    /// Raw overlay word; 0 means no overlay.
    pub tex2: u16,
    pub uvls: [DUvl; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct DCube {
    pub children: [Option<usize>; MAX_SIDES_PER_CUBE],
    pub verts: [usize; MAX_VERTICES_PER_CUBE],
    pub walls: [Option<usize>; MAX_SIDES_PER_CUBE],
    pub sides: [DSide; MAX_SIDES_PER_CUBE],
}

impl DCube {
    /// Sides carrying texture data: solid faces and faces with a wall.
    pub fn is_rendered(&self, side: usize) -> bool {
        self.children[side].is_none() || self.walls[side].is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DMovement {
    None,
    Physics {
        velocity: Vec3,
        thrust: Vec3,
        mass: f32,
        drag: f32,
        rotvel: Vec3,
        rotthrust: Vec3,
        turnroll: f32,
        flags: u16,
    },
    Spinning {
        spin_rate: Vec3,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DControl {
    None,
    Ai { behavior: u8 },
    Explosion { spawn_time: f32, delete_time: f32, delete_obj: Option<usize> },
    Weapon { parent: Option<usize> },
    Powerup { count: i32 },
    Light { intensity: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DRender {
    None,
    Polyobj { model: u32, subobj_flags: u32, tmap_override: Option<u32> },
    Vclip { vclip: u32, frametime: f32, framenum: u8 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DObject {
    pub obj_type: u8,
    pub id: u8,
    pub control_type: u8,
    pub movement_type: u8,
    pub render_type: u8,
    pub flags: u8,
    pub cube: usize,
    pub pos: Vec3,
    pub orient: Mat3,
    pub size: f32,
    pub shields: f32,
    pub movement: DMovement,
    pub control: DControl,
    pub render: DRender,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DLevel {
    pub vertices: Vec<Vec3>,
    pub cubes: Vec<DCube>,
    pub objects: Vec<DObject>,
    pub walls: Vec<Wall>,
    pub triggers: Vec<Trigger>,
}

// ============================================================
// Reader
// ============================================================

struct LevelReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> LevelReader<'a> {
    fn take(&mut self, n: usize) -> LoadResult<&'a [u8]> {
        if self.data.len() - self.pos < n {
            return Err(LoadError::Truncated {
                offset: self.pos,
                wanted: n,
            });
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u8(&mut self) -> LoadResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> LoadResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn i16(&mut self) -> LoadResult<i16> {
        Ok(self.u16()? as i16)
    }

    fn u32(&mut self) -> LoadResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> LoadResult<i32> {
        Ok(self.u32()? as i32)
    }

    fn fix(&mut self) -> LoadResult<f32> {
        Ok(fix_to_f32(self.i32()?))
    }

    fn vec(&mut self) -> LoadResult<Vec3> {
        Ok(Vec3::new(self.fix()?, self.fix()?, self.fix()?))
    }

    fn mat(&mut self) -> LoadResult<Mat3> {
        Ok(Mat3::new(self.vec()?, self.vec()?, self.vec()?))
    }

    /// Index stored as i16 with -1 meaning none.
    fn opt_index(&mut self) -> LoadResult<Option<usize>> {
        let v = self.i16()?;
        Ok(if v < 0 { None } else { Some(v as usize) })
    }

    /// Element count, checked against the bytes left so a corrupt count
    /// can't trigger a huge allocation.
    fn count(&mut self, min_record: usize) -> LoadResult<usize> {
        let n = self.u32()? as usize;
        let left = self.data.len() - self.pos;
        if n.saturating_mul(min_record) > left {
            return Err(LoadError::Truncated {
                offset: self.pos,
                wanted: n.saturating_mul(min_record),
            });
        }
        Ok(n)
    }
}

fn check_index(index: usize, count: usize, make: fn(usize, usize) -> LoadError) -> LoadResult<usize> {
    if index < count {
        Ok(index)
    } else {
        Err(make(index, count))
    }
}

fn bad_cube(index: usize, count: usize) -> LoadError {
    LoadError::BadCubeIndex { index, count }
}

fn bad_vertex(index: usize, count: usize) -> LoadError {
    LoadError::BadVertexIndex { index, count }
}

fn bad_wall(index: usize, count: usize) -> LoadError {
    LoadError::BadWallIndex { index, count }
}

fn bad_trigger(index: usize, count: usize) -> LoadError {
    LoadError::BadTriggerIndex { index, count }
}

fn read_cube(r: &mut LevelReader) -> LoadResult<DCube> {
    let mut cube = DCube {
        children: [None; MAX_SIDES_PER_CUBE],
        verts: [0; MAX_VERTICES_PER_CUBE],
        walls: [None; MAX_SIDES_PER_CUBE],
        sides: [DSide::default(); MAX_SIDES_PER_CUBE],
    };

    let child_mask = r.u8()?;
    for side in 0..MAX_SIDES_PER_CUBE {
        if child_mask & (1 << side) != 0 {
            cube.children[side] = Some(r.u16()? as usize);
        }
    }
    for v in cube.verts.iter_mut() {
        *v = r.u16()? as usize;
    }
    let wall_mask = r.u8()?;
    for side in 0..MAX_SIDES_PER_CUBE {
        if wall_mask & (1 << side) != 0 {
            cube.walls[side] = Some(r.u16()? as usize);
        }
    }

    for side in 0..MAX_SIDES_PER_CUBE {
        if !cube.is_rendered(side) {
            continue;
        }
        let s = &mut cube.sides[side];
        let tex1 = r.u16()?;
        s.tex1 = tex1 & !TEX1_HAS_TEX2;
        if tex1 & TEX1_HAS_TEX2 != 0 {
            s.tex2 = r.u16()?;
        }
        for uvl in s.uvls.iter_mut() {
            uvl.u = r.i16()? as f32 / UV_SCALE;
            uvl.v = r.i16()? as f32 / UV_SCALE;
            uvl.l = r.u16()? as f32 / LIGHT_SCALE;
        }
    }
    Ok(cube)
}

fn read_movement(r: &mut LevelReader, movement_type: u8) -> LoadResult<DMovement> {
    Ok(match movement_type {
        MT_NONE => DMovement::None,
        MT_PHYSICS => DMovement::Physics {
            velocity: r.vec()?,
            thrust: r.vec()?,
            mass: r.fix()?,
            drag: r.fix()?,
            rotvel: r.vec()?,
            rotthrust: r.vec()?,
            turnroll: crate::d_shared::fixang_to_radians(r.i16()?),
            flags: r.u16()?,
        },
        MT_SPINNING => DMovement::Spinning { spin_rate: r.vec()? },
        t => return Err(LoadError::UnknownMovementType(t)),
    })
}

fn read_control(r: &mut LevelReader, control_type: u8) -> LoadResult<DControl> {
    if !is_known_control_type(control_type) {
        return Err(LoadError::UnknownControlType(control_type));
    }
    Ok(match control_type {
        CT_AI => DControl::Ai { behavior: r.u8()? },
        CT_EXPLOSION => DControl::Explosion {
            spawn_time: r.fix()?,
            delete_time: r.fix()?,
            delete_obj: r.opt_index()?,
        },
        CT_WEAPON => DControl::Weapon {
            parent: r.opt_index()?,
        },
        CT_POWERUP => DControl::Powerup { count: r.i32()? },
        CT_LIGHT => DControl::Light {
            intensity: r.fix()?,
        },
        _ => DControl::None,
    })
}

fn read_render(r: &mut LevelReader, render_type: u8) -> LoadResult<DRender> {
    Ok(match render_type {
        RT_NONE | RT_LASER | RT_MORPH => DRender::None,
        RT_POLYOBJ => {
            let model = r.u32()?;
            let subobj_flags = r.u32()?;
            let tmap = r.i32()?;
            DRender::Polyobj {
                model,
                subobj_flags,
                tmap_override: if tmap < 0 { None } else { Some(tmap as u32) },
            }
        }
        RT_FIREBALL | RT_HOSTAGE | RT_POWERUP | RT_WEAPON_VCLIP => DRender::Vclip {
            vclip: r.u32()?,
            frametime: r.fix()?,
            framenum: r.u8()?,
        },
        t => return Err(LoadError::UnknownRenderType(t)),
    })
}

fn read_object(r: &mut LevelReader) -> LoadResult<DObject> {
    let obj_type = r.u8()?;
    if !is_known_object_type(obj_type) {
        return Err(LoadError::UnknownItemType(obj_type));
    }
    let id = r.u8()?;
    let control_type = r.u8()?;
    let movement_type = r.u8()?;
    let render_type = r.u8()?;
    let flags = r.u8()?;
    let cube = r.u16()? as usize;
    let pos = r.vec()?;
    let orient = r.mat()?;
    let size = r.fix()?;
    let shields = r.fix()?;
    let movement = read_movement(r, movement_type)?;
    let control = read_control(r, control_type)?;
    let render = read_render(r, render_type)?;
    Ok(DObject {
        obj_type,
        id,
        control_type,
        movement_type,
        render_type,
        flags,
        cube,
        pos,
        orient,
        size,
        shields,
        movement,
        control,
        render,
    })
}

fn read_wall(r: &mut LevelReader) -> LoadResult<Wall> {
    let cube = r.u16()? as usize;
    let side = r.u8()? as usize;
    if side >= MAX_SIDES_PER_CUBE {
        return Err(LoadError::BadSideIndex(side));
    }
    let tag = r.u8()?;
    let wall_type = WallType::from_tag(tag).ok_or(LoadError::UnknownWallType(tag))?;
    let mut wall = Wall::new(cube, side, wall_type);
    wall.flags = WallFlags::from_bits_truncate(r.u8()?);
    wall.state = WallState::from_tag(r.u8()?);
    wall.keys = WallKeys::from_bits_truncate(r.u8()?);
    wall.hps = r.fix()?;
    wall.trigger = r.opt_index()?;
    wall.linked_wall = r.opt_index()?;
    Ok(wall)
}

fn read_trigger(r: &mut LevelReader) -> LoadResult<Trigger> {
    let tag = r.u8()?;
    let trigger_type = TriggerType::from_tag(tag).ok_or(LoadError::UnknownTriggerType(tag))?;
    let mut trigger = Trigger::new(trigger_type);
    trigger.flags = TriggerFlags::from_bits_truncate(r.u16()?);
    trigger.value = r.fix()?;
    trigger.time = r.fix()?;
    let n = r.u8()? as usize;
    for _ in 0..n {
        let cube = r.u16()? as usize;
        let side = r.u8()? as usize;
        if side >= MAX_SIDES_PER_CUBE {
            return Err(LoadError::BadSideIndex(side));
        }
        trigger.links.push((cube, side));
    }
    Ok(trigger)
}

/// Decode and validate a level. Any unknown tag or out-of-range index fails
/// the whole load.
pub fn read_level(data: &[u8]) -> LoadResult<DLevel> {
    let mut r = LevelReader { data, pos: 0 };

    let magic = r.take(4)?;
    if magic != LEVEL_MAGIC {
        return Err(LoadError::BadMagic([magic[0], magic[1], magic[2], magic[3]]));
    }
    let version = r.u32()?;
    if version != LEVEL_VERSION {
        return Err(LoadError::UnsupportedVersion(version));
    }

    let mut level = DLevel::default();

    let n = r.count(12)?;
    level.vertices.reserve(n);
    for _ in 0..n {
        level.vertices.push(r.vec()?);
    }

    let n = r.count(18)?;
    level.cubes.reserve(n);
    for _ in 0..n {
        level.cubes.push(read_cube(&mut r)?);
    }

    let n = r.count(64)?;
    level.objects.reserve(n);
    for _ in 0..n {
        level.objects.push(read_object(&mut r)?);
    }

    let n = r.count(13)?;
    for _ in 0..n {
        level.walls.push(read_wall(&mut r)?);
    }

    let n = r.count(12)?;
    for _ in 0..n {
        level.triggers.push(read_trigger(&mut r)?);
    }

    validate_indices(&level)?;
    Ok(level)
}

fn validate_indices(level: &DLevel) -> LoadResult<()> {
    let nverts = level.vertices.len();
    let ncubes = level.cubes.len();
    let nwalls = level.walls.len();

    for cube in &level.cubes {
        for &v in &cube.verts {
            check_index(v, nverts, bad_vertex)?;
        }
        for child in cube.children.iter().flatten() {
            check_index(*child, ncubes, bad_cube)?;
        }
        for wall in cube.walls.iter().flatten() {
            check_index(*wall, nwalls, bad_wall)?;
        }
    }
    for obj in &level.objects {
        check_index(obj.cube, ncubes, bad_cube)?;
    }
    for wall in &level.walls {
        check_index(wall.cube, ncubes, bad_cube)?;
        if let Some(l) = wall.linked_wall {
            check_index(l, nwalls, bad_wall)?;
        }
        if let Some(t) = wall.trigger {
            check_index(t, level.triggers.len(), bad_trigger)?;
        }
    }
    for trigger in &level.triggers {
        for &(cube, _) in &trigger.links {
            check_index(cube, ncubes, bad_cube)?;
        }
    }
    Ok(())
}

// ============================================================
// Writer
// ============================================================

#[derive(Default)]
struct LevelWriter {
    buf: Vec<u8>,
}

impl LevelWriter {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn fix(&mut self, v: f32) {
        self.i32(f32_to_fix(v));
    }

    fn vec(&mut self, v: Vec3) {
        self.fix(v.x);
        self.fix(v.y);
        self.fix(v.z);
    }

    fn opt_index(&mut self, v: Option<usize>) {
        self.i16(v.map_or(-1, |i| i as i16));
    }
}

fn write_cube(w: &mut LevelWriter, cube: &DCube) {
    let mut mask = 0u8;
    for (side, child) in cube.children.iter().enumerate() {
        if child.is_some() {
            mask |= 1 << side;
        }
    }
    w.u8(mask);
    for child in cube.children.iter().flatten() {
        w.u16(*child as u16);
    }
    for &v in &cube.verts {
        w.u16(v as u16);
    }
    let mut mask = 0u8;
    for (side, wall) in cube.walls.iter().enumerate() {
        if wall.is_some() {
            mask |= 1 << side;
        }
    }
    w.u8(mask);
    for wall in cube.walls.iter().flatten() {
        w.u16(*wall as u16);
    }
    for side in 0..MAX_SIDES_PER_CUBE {
        if !cube.is_rendered(side) {
            continue;
        }
        let s = &cube.sides[side];
        if s.tex2 != 0 {
            w.u16(s.tex1 | TEX1_HAS_TEX2);
            w.u16(s.tex2);
        } else {
            w.u16(s.tex1 & !TEX1_HAS_TEX2);
        }
        for uvl in &s.uvls {
            w.i16((uvl.u * UV_SCALE).round() as i16);
            w.i16((uvl.v * UV_SCALE).round() as i16);
            w.u16((uvl.l * LIGHT_SCALE).round().clamp(0.0, 65535.0) as u16);
        }
    }
}

fn write_object(w: &mut LevelWriter, obj: &DObject) {
    w.u8(obj.obj_type);
    w.u8(obj.id);
    w.u8(obj.control_type);
    w.u8(obj.movement_type);
    w.u8(obj.render_type);
    w.u8(obj.flags);
    w.u16(obj.cube as u16);
    w.vec(obj.pos);
    w.vec(obj.orient.rvec);
    w.vec(obj.orient.uvec);
    w.vec(obj.orient.fvec);
    w.fix(obj.size);
    w.fix(obj.shields);

    match &obj.movement {
        DMovement::None => {}
        DMovement::Physics {
            velocity,
            thrust,
            mass,
            drag,
            rotvel,
            rotthrust,
            turnroll,
            flags,
        } => {
            w.vec(*velocity);
            w.vec(*thrust);
            w.fix(*mass);
            w.fix(*drag);
            w.vec(*rotvel);
            w.vec(*rotthrust);
            w.i16(crate::d_shared::radians_to_fixang(*turnroll));
            w.u16(*flags);
        }
        DMovement::Spinning { spin_rate } => w.vec(*spin_rate),
    }

    match &obj.control {
        DControl::None => {}
        DControl::Ai { behavior } => w.u8(*behavior),
        DControl::Explosion {
            spawn_time,
            delete_time,
            delete_obj,
        } => {
            w.fix(*spawn_time);
            w.fix(*delete_time);
            w.opt_index(*delete_obj);
        }
        DControl::Weapon { parent } => w.opt_index(*parent),
        DControl::Powerup { count } => w.i32(*count),
        DControl::Light { intensity } => w.fix(*intensity),
    }

    match &obj.render {
        DRender::None => {}
        DRender::Polyobj {
            model,
            subobj_flags,
            tmap_override,
        } => {
            w.u32(*model);
            w.u32(*subobj_flags);
            w.i32(tmap_override.map_or(-1, |t| t as i32));
        }
        DRender::Vclip {
            vclip,
            frametime,
            framenum,
        } => {
            w.u32(*vclip);
            w.fix(*frametime);
            w.u8(*framenum);
        }
    }
}

/// Encode a level. The payload variants must agree with the record's
/// movement/control/render tags or the output won't read back.
pub fn write_level(level: &DLevel) -> Vec<u8> {
    let mut w = LevelWriter::default();
    w.buf.extend_from_slice(&LEVEL_MAGIC);
    w.u32(LEVEL_VERSION);

    w.u32(level.vertices.len() as u32);
    for v in &level.vertices {
        w.vec(*v);
    }

    w.u32(level.cubes.len() as u32);
    for cube in &level.cubes {
        write_cube(&mut w, cube);
    }

    w.u32(level.objects.len() as u32);
    for obj in &level.objects {
        write_object(&mut w, obj);
    }

    w.u32(level.walls.len() as u32);
    for wall in &level.walls {
        w.u16(wall.cube as u16);
        w.u8(wall.side as u8);
        w.u8(wall.wall_type.tag());
        w.u8(wall.flags.bits());
        w.u8(wall.state.tag());
        w.u8(wall.keys.bits());
        w.fix(wall.hps);
        w.opt_index(wall.trigger);
        w.opt_index(wall.linked_wall);
    }

    w.u32(level.triggers.len() as u32);
    for t in &level.triggers {
        w.u8(t.trigger_type.tag());
        w.u16(t.flags.bits());
        w.fix(t.value);
        w.fix(t.time);
        w.u8(t.links.len() as u8);
        for &(cube, side) in &t.links {
            w.u16(cube as u16);
            w.u8(side as u8);
        }
    }

    w.buf
}

// ============================================================
// Tests
// ============================================================
