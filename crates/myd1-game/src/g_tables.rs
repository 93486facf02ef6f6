// g_tables.rs — weapon, robot and powerup info tables
//
// Items carry only a sub_id; everything constant about a kind of item lives
// here. `GameData::builtin()` is the stock set used when a game does not
// load its own.

use std::collections::HashMap;

use myd1_common::bitmap::{Bitmap, TRANSPARENT};
use myd1_common::walls::WallKeys;

use crate::g_local::ItemType;

// ============================================================
// Sounds
// ============================================================

pub const SOUND_WEAPON_HIT_WALL: u32 = 27;
pub const SOUND_WEAPON_HIT_DOOR: u32 = 28;
pub const SOUND_ROBOT_HIT: u32 = 31;
pub const SOUND_ROBOT_DESTROYED: u32 = 32;
pub const SOUND_PLAYER_HIT: u32 = 35;
pub const SOUND_HOSTAGE_RESCUED: u32 = 91;
pub const SOUND_DOOR_LOCKED: u32 = 118;
pub const SOUND_WALL_REMOVED: u32 = 156;
pub const SOUND_CONTROL_CENTER_HIT: u32 = 20;
pub const SOUND_CONTROL_CENTER_DESTROYED: u32 = 21;
pub const SOUND_PLAYER_BUMP: u32 = 250;

// ============================================================
// Info records
// ============================================================

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WeaponFlags: u8 {
        const BOUNCE        = 0x01;
        const BOUNCES_TWICE = 0x02;
        /// Passes through see-through overlay texels.
        const PENETRATES    = 0x04;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeaponInfo {
    pub name: &'static str,
    pub damage: f32,
    pub speed: f32,
    pub mass: f32,
    pub drag: f32,
    pub size: f32,
    /// Seconds before the shot expires on its own.
    pub lifetime: f32,
    pub fire_wait: f32,
    pub flags: WeaponFlags,
    pub impact_size: f32,
    pub fire_sound: u32,
    pub impact_sound: u32,
    pub vclip: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RobotInfo {
    pub name: &'static str,
    pub shields: f32,
    pub size: f32,
    pub mass: f32,
    pub drag: f32,
    /// Damage dealt to a player on contact.
    pub contact_damage: f32,
    pub explosion_size: f32,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerupEffect {
    Shields(f32),
    Energy(f32),
    Key(WallKeys),
    ExtraLife,
    Weapon(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PowerupInfo {
    pub name: &'static str,
    pub size: f32,
    pub effect: PowerupEffect,
    pub pickup_sound: u32,
    pub vclip: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShipInfo {
    pub mass: f32,
    pub drag: f32,
    pub max_thrust: f32,
    pub max_rotthrust: f32,
    pub size: f32,
    pub max_shields: f32,
    pub max_energy: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameData {
    pub weapons: Vec<WeaponInfo>,
    pub robots: Vec<RobotInfo>,
    pub powerups: Vec<PowerupInfo>,
    pub ship: ShipInfo,
    /// Texture shown after a destroyable texture is shot out.
    pub destroyed_textures: HashMap<u16, u16>,
    /// Texture index -> bitmap. Missing entries count as fully opaque.
    pub bitmaps: HashMap<u16, Bitmap>,
    pub explosion_vclip: u32,
    /// Seconds an explosion stays in the world.
    pub explosion_time: f32,
    pub reactor_shields: f32,
    pub clutter_shields: f32,
}

pub const WEAPON_LASER: u8 = 0;
pub const WEAPON_SPREADFIRE: u8 = 1;
pub const WEAPON_FLASH_MISSILE: u8 = 2;
pub const WEAPON_SMART_MINE: u8 = 3;

pub const POWERUP_EXTRA_LIFE: u8 = 0;
pub const POWERUP_ENERGY: u8 = 1;
pub const POWERUP_SHIELD_BOOST: u8 = 2;
pub const POWERUP_KEY_BLUE: u8 = 3;
pub const POWERUP_KEY_RED: u8 = 4;
pub const POWERUP_KEY_GOLD: u8 = 5;

/// Texture used by the stock grate: a checker of see-through texels.
pub const TEXTURE_GRATE: u16 = 301;
pub const TEXTURE_MONITOR: u16 = 302;
pub const TEXTURE_MONITOR_BROKEN: u16 = 303;

fn grate_bitmap() -> Bitmap {
    let (w, h) = (8, 8);
    let pixels = (0..w * h)
        .map(|i| if (i / w + i % w) % 2 == 0 { TRANSPARENT } else { 12 })
        .collect();
    Bitmap { width: w, height: h, pixels }
}

impl GameData {
    pub fn builtin() -> Self {
        let weapons = vec![
            WeaponInfo {
                name: "laser",
                damage: 10.0,
                speed: 120.0,
                mass: 0.1,
                drag: 0.0,
                size: 0.5,
                lifetime: 4.0,
                fire_wait: 0.25,
                flags: WeaponFlags::PENETRATES,
                impact_size: 2.0,
                fire_sound: 15,
                impact_sound: SOUND_WEAPON_HIT_WALL,
                vclip: 12,
            },
            WeaponInfo {
                name: "spreadfire",
                damage: 8.0,
                speed: 100.0,
                mass: 0.1,
                drag: 0.0,
                size: 0.5,
                lifetime: 4.0,
                fire_wait: 0.2,
                flags: WeaponFlags::PENETRATES,
                impact_size: 2.0,
                fire_sound: 16,
                impact_sound: SOUND_WEAPON_HIT_WALL,
                vclip: 13,
            },
            WeaponInfo {
                name: "flash missile",
                damage: 20.0,
                speed: 80.0,
                mass: 0.2,
                drag: 0.0,
                size: 0.6,
                lifetime: 6.0,
                fire_wait: 0.5,
                flags: WeaponFlags::BOUNCE | WeaponFlags::BOUNCES_TWICE,
                impact_size: 4.0,
                fire_sound: 17,
                impact_sound: SOUND_WEAPON_HIT_WALL,
                vclip: 14,
            },
            WeaponInfo {
                name: "smart mine",
                damage: 30.0,
                speed: 40.0,
                mass: 0.5,
                drag: 0.0,
                size: 1.0,
                lifetime: 20.0,
                fire_wait: 1.0,
                flags: WeaponFlags::BOUNCE,
                impact_size: 6.0,
                fire_sound: 18,
                impact_sound: SOUND_WEAPON_HIT_WALL,
                vclip: 15,
            },
        ];
        let robots = vec![
            RobotInfo {
                name: "medium hulk",
                shields: 40.0,
                size: 4.0,
                mass: 4.0,
                drag: 0.1,
                contact_damage: 2.0,
                explosion_size: 8.0,
                score: 300,
            },
            RobotInfo {
                name: "class 1 drone",
                shields: 20.0,
                size: 2.5,
                mass: 2.0,
                drag: 0.1,
                contact_damage: 1.0,
                explosion_size: 5.0,
                score: 150,
            },
        ];
        let powerup = |name, size, effect, pickup_sound, vclip| PowerupInfo {
            name,
            size,
            effect,
            pickup_sound,
            vclip,
        };
        let powerups = vec![
            powerup("extra life", 1.5, PowerupEffect::ExtraLife, 81, 36),
            powerup("energy", 1.5, PowerupEffect::Energy(25.0), 82, 37),
            powerup("shield boost", 1.5, PowerupEffect::Shields(25.0), 83, 38),
            powerup("blue key", 1.5, PowerupEffect::Key(WallKeys::BLUE), 84, 39),
            powerup("red key", 1.5, PowerupEffect::Key(WallKeys::RED), 84, 40),
            powerup("gold key", 1.5, PowerupEffect::Key(WallKeys::GOLD), 84, 41),
        ];

        let mut destroyed_textures = HashMap::new();
        destroyed_textures.insert(TEXTURE_MONITOR, TEXTURE_MONITOR_BROKEN);
        let mut bitmaps = HashMap::new();
        bitmaps.insert(TEXTURE_GRATE, grate_bitmap());

        Self {
            weapons,
            robots,
            powerups,
            ship: ShipInfo {
                mass: 4.0,
                drag: 0.1,
                max_thrust: 60.0,
                max_rotthrust: 4.0,
                size: 2.5,
                max_shields: 200.0,
                max_energy: 200.0,
            },
            destroyed_textures,
            bitmaps,
            explosion_vclip: 3,
            explosion_time: 0.5,
            reactor_shields: 200.0,
            clutter_shields: 10.0,
        }
    }

    /// Whether `id` names an entry in the table for `item_type`. Types
    /// without a table accept any id.
    pub fn has_info(&self, item_type: ItemType, id: u8) -> bool {
        let id = id as usize;
        match item_type {
            ItemType::Robot => id < self.robots.len(),
            ItemType::Weapon => id < self.weapons.len(),
            ItemType::Powerup => id < self.powerups.len(),
            _ => true,
        }
    }

    pub fn weapon(&self, id: u8) -> Option<&WeaponInfo> {
        self.weapons.get(id as usize)
    }

    pub fn robot(&self, id: u8) -> Option<&RobotInfo> {
        self.robots.get(id as usize)
    }

    pub fn powerup(&self, id: u8) -> Option<&PowerupInfo> {
        self.powerups.get(id as usize)
    }

    pub fn bitmap(&self, texture: u16) -> Option<&Bitmap> {
        self.bitmaps.get(&texture)
    }
}

impl Default for GameData {
    fn default() -> Self {
        Self::builtin()
    }
}
