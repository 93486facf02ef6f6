// g_local.rs — item model shared by the game modules

pub use myd1_common::d_shared::*;

use myd1_common::dfiles::{
    OBJ_CLUTTER, OBJ_CNTRLCEN, OBJ_DEBRIS, OBJ_FIREBALL, OBJ_FLARE, OBJ_GHOST, OBJ_HOSTAGE, OBJ_LIGHT,
    OBJ_MARKER, OBJ_PLAYER, OBJ_POWERUP, OBJ_ROBOT, OBJ_WALL, OBJ_WEAPON,
};

/// Index into `Game::items`. Slots are reused after an item is removed.
pub type ItemId = usize;

// ============================================================
// Item types
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Wall,
    Fireball,
    Robot,
    Hostage,
    Player,
    Weapon,
    Powerup,
    Debris,
    ControlCenter,
    Flare,
    Clutter,
    Ghost,
    Light,
    Marker,
}

impl ItemType {
    pub const COUNT: usize = 14;

    pub const ALL: [ItemType; ItemType::COUNT] = [
        ItemType::Wall,
        ItemType::Fireball,
        ItemType::Robot,
        ItemType::Hostage,
        ItemType::Player,
        ItemType::Weapon,
        ItemType::Powerup,
        ItemType::Debris,
        ItemType::ControlCenter,
        ItemType::Flare,
        ItemType::Clutter,
        ItemType::Ghost,
        ItemType::Light,
        ItemType::Marker,
    ];

    /// Dense index for per-type tables.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            OBJ_WALL => ItemType::Wall,
            OBJ_FIREBALL => ItemType::Fireball,
            OBJ_ROBOT => ItemType::Robot,
            OBJ_HOSTAGE => ItemType::Hostage,
            OBJ_PLAYER => ItemType::Player,
            OBJ_WEAPON => ItemType::Weapon,
            OBJ_POWERUP => ItemType::Powerup,
            OBJ_DEBRIS => ItemType::Debris,
            OBJ_CNTRLCEN => ItemType::ControlCenter,
            OBJ_FLARE => ItemType::Flare,
            OBJ_CLUTTER => ItemType::Clutter,
            OBJ_GHOST => ItemType::Ghost,
            OBJ_LIGHT => ItemType::Light,
            OBJ_MARKER => ItemType::Marker,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        match self {
            ItemType::Wall => OBJ_WALL,
            ItemType::Fireball => OBJ_FIREBALL,
            ItemType::Robot => OBJ_ROBOT,
            ItemType::Hostage => OBJ_HOSTAGE,
            ItemType::Player => OBJ_PLAYER,
            ItemType::Weapon => OBJ_WEAPON,
            ItemType::Powerup => OBJ_POWERUP,
            ItemType::Debris => OBJ_DEBRIS,
            ItemType::ControlCenter => OBJ_CNTRLCEN,
            ItemType::Flare => OBJ_FLARE,
            ItemType::Clutter => OBJ_CLUTTER,
            ItemType::Ghost => OBJ_GHOST,
            ItemType::Light => OBJ_LIGHT,
            ItemType::Marker => OBJ_MARKER,
        }
    }
}

// ============================================================
// Flags
// ============================================================

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ItemFlags: u8 {
        const EXPLODING      = 0x01;
        const SHOULD_BE_DEAD = 0x02;
        const DESTROYED      = 0x04;
        const SILENT         = 0x08;
        const ATTACHED       = 0x10;
        const HARMLESS       = 0x20;
        const PLAYER_DROPPED = 0x40;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PhysicsFlags: u16 {
        const TURNROLL      = 0x0001; // roll when turning
        const LEVELLING     = 0x0002;
        const BOUNCE        = 0x0004;
        const WIGGLE        = 0x0008;
        const STICK         = 0x0010;
        const PERSISTENT    = 0x0020; // survives hitting items
        const USES_THRUST   = 0x0040;
        const BOUNCED_ONCE  = 0x0080;
        const FREE_SPINNING = 0x0100;
        const BOUNCES_TWICE = 0x0200;
    }
}

// ============================================================
// Movers
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhysicsInfo {
    pub velocity: Vec3,
    pub thrust: Vec3,
    pub mass: f32,
    pub drag: f32,
    /// Radians per second about the local (pitch, heading, bank) axes.
    pub rotvel: Vec3,
    pub rotthrust: Vec3,
    /// Current bank from turning, radians.
    pub turnroll: f32,
    pub flags: PhysicsFlags,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpinInfo {
    pub spin_rate: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mover {
    None,
    Physics(PhysicsInfo),
    Spinning(SpinInfo),
}

// ============================================================
// Control and render state
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlInfo {
    None,
    Ai { behavior: u8 },
    Explosion { spawn_time: f32, delete_time: f32, delete_item: Option<ItemId> },
    Flying,
    Slew,
    Flare,
    Weapon { parent: Option<ItemId> },
    RepairCenter,
    Morph,
    Debris,
    Powerup { count: i32 },
    Light { intensity: f32 },
    Remote,
    ControlCenter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VClipInfo {
    pub vclip: u32,
    pub frametime: f32,
    pub framenum: u8,
    /// Time into the current frame.
    pub frame_elapsed: f32,
}

impl VClipInfo {
    pub fn new(vclip: u32, frametime: f32) -> Self {
        Self {
            vclip,
            frametime,
            framenum: 0,
            frame_elapsed: 0.0,
        }
    }

    /// Step the animation; `frames` is the clip length.
    pub fn advance(&mut self, frame_time: f32, frames: u8) {
        if self.frametime <= 0.0 || frames == 0 {
            return;
        }
        self.frame_elapsed += frame_time;
        while self.frame_elapsed >= self.frametime {
            self.frame_elapsed -= self.frametime;
            self.framenum = (self.framenum + 1) % frames;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderInfo {
    None,
    Polyobj { model: u32, subobj_flags: u32, tmap_override: Option<u32> },
    Fireball(VClipInfo),
    Laser,
    Hostage(VClipInfo),
    Powerup(VClipInfo),
    Morph,
    WeaponVclip(VClipInfo),
}

impl RenderInfo {
    pub fn vclip_mut(&mut self) -> Option<&mut VClipInfo> {
        match self {
            RenderInfo::Fireball(v) | RenderInfo::Hostage(v) | RenderInfo::Powerup(v) | RenderInfo::WeaponVclip(v) => {
                Some(v)
            }
            _ => None,
        }
    }
}

// ============================================================
// Item
// ============================================================

#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub item_type: ItemType,
    /// Index into the per-type info table.
    pub sub_id: u8,
    pub pos: Vec3,
    pub orient: Mat3,
    pub size: f32,
    pub shields: f32,
    pub mover: Mover,
    pub control: ControlInfo,
    pub render: RenderInfo,
    pub cube: usize,
    /// Slot in the cube's object bag.
    pub cube_index: usize,
    pub flags: ItemFlags,
    pub parent: Option<ItemId>,
    /// Seconds left to live; infinite for permanent items.
    pub lifeleft: f32,
    pub in_use: bool,
}

impl Item {
    pub fn new(item_type: ItemType, sub_id: u8, cube: usize, pos: Vec3, size: f32) -> Self {
        Self {
            id: 0,
            item_type,
            sub_id,
            pos,
            orient: Mat3::IDENTITY,
            size,
            shields: 0.0,
            mover: Mover::None,
            control: ControlInfo::None,
            render: RenderInfo::None,
            cube,
            cube_index: 0,
            flags: ItemFlags::empty(),
            parent: None,
            lifeleft: f32::INFINITY,
            in_use: true,
        }
    }

    pub fn with_physics(mut self, phys: PhysicsInfo) -> Self {
        self.mover = Mover::Physics(phys);
        self
    }

    pub fn is_alive(&self) -> bool {
        self.in_use && !self.flags.contains(ItemFlags::SHOULD_BE_DEAD)
    }

    /// Mark for removal at the end of the frame.
    pub fn kill(&mut self) {
        self.flags.insert(ItemFlags::SHOULD_BE_DEAD);
    }

    pub fn physics(&self) -> Option<&PhysicsInfo> {
        match &self.mover {
            Mover::Physics(p) => Some(p),
            _ => None,
        }
    }

    pub fn physics_mut(&mut self) -> Option<&mut PhysicsInfo> {
        match &mut self.mover {
            Mover::Physics(p) => Some(p),
            _ => None,
        }
    }

    pub fn velocity(&self) -> Vec3 {
        self.physics().map_or(Vec3::ZERO, |p| p.velocity)
    }
}

// ============================================================
// Frame input and output
// ============================================================

/// Player input for one frame, all axes in [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerControls {
    pub forward: f32,
    pub sideways: f32,
    pub vertical: f32,
    pub pitch: f32,
    pub heading: f32,
    pub bank: f32,
    pub fire_primary: bool,
}

/// Things the audio and render collaborators react to. Drained each frame.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Sound { sound: u32, pos: Vec3 },
    Explosion { item: ItemId, pos: Vec3, size: f32 },
    TextureChanged { cube: usize, side: usize, tex1: u16, tex2: u16 },
    WallOpened { wall: usize },
    Trigger { trigger: usize, item: ItemId },
    ItemRemoved { item: ItemId, item_type: ItemType },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelExit {
    Normal,
    Secret,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub energy: f32,
    pub keys: myd1_common::walls::WallKeys,
    pub lives: u32,
    pub primary_weapon: u8,
    pub next_fire_time: f32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            energy: 100.0,
            keys: Default::default(),
            lives: 3,
            primary_weapon: 0,
            next_fire_time: 0.0,
        }
    }
}

/// Level progress the frame loop and handlers update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelState {
    pub hostages_rescued: u32,
    pub reactor_destroyed: bool,
    pub exit: Option<LevelExit>,
    pub score: u32,
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_type_tags_round_trip() {
        for t in ItemType::ALL {
            assert_eq!(ItemType::from_tag(t.tag()), Some(t));
        }
        assert_eq!(ItemType::from_tag(6), None);
        assert_eq!(ItemType::from_tag(200), None);
    }

    #[test]
    fn test_indices_are_dense() {
        for (i, t) in ItemType::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
    }

    #[test]
    fn test_kill_marks_dead() {
        let mut item = Item::new(ItemType::Robot, 0, 0, Vec3::ZERO, 1.0);
        assert!(item.is_alive());
        item.kill();
        assert!(!item.is_alive());
    }

    #[test]
    fn test_vclip_wraps() {
        let mut v = VClipInfo::new(3, 0.1);
        v.advance(0.25, 2);
        assert_eq!(v.framenum, 0);
        assert!((v.frame_elapsed - 0.05).abs() < 1e-5);
        v.advance(0.1, 2);
        assert_eq!(v.framenum, 1);
    }
}
