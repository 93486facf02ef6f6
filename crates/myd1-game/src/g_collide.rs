// g_collide.rs — item-versus-item collision dispatch
//
// One dense table indexed by (mover type, struck type). Registering a pair
// fills both orders; the mirrored slot calls the same handler with the two
// items swapped, so either item can be the mover.

use myd1_common::common::com_dprintf;

use crate::g_local::*;
use crate::g_main::Game;
use crate::g_tables::{
    PowerupEffect, SOUND_CONTROL_CENTER_HIT, SOUND_HOSTAGE_RESCUED, SOUND_PLAYER_BUMP, SOUND_PLAYER_HIT,
    SOUND_ROBOT_HIT,
};
use crate::g_weapon::{apply_damage, spawn_explosion};

/// Handler for `this` touching `other` at `point`. Returns the item to
/// remove, if any: `this`, `other`, or neither.
pub type CollisionFn = fn(game: &mut Game, time: f32, point: Vec3, this: ItemId, other: ItemId) -> Option<ItemId>;

#[derive(Clone, Copy)]
pub struct CollisionEntry {
    pub handler: CollisionFn,
    /// Call with the arguments in the order they were registered.
    pub swapped: bool,
}

impl CollisionEntry {
    pub fn invoke(self, game: &mut Game, time: f32, point: Vec3, this: ItemId, other: ItemId) -> Option<ItemId> {
        if self.swapped {
            (self.handler)(game, time, point, other, this)
        } else {
            (self.handler)(game, time, point, this, other)
        }
    }
}

impl std::fmt::Debug for CollisionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionEntry")
            .field("handler", &(self.handler as usize))
            .field("swapped", &self.swapped)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct CollisionTable {
    entries: [[Option<CollisionEntry>; ItemType::COUNT]; ItemType::COUNT],
}

impl Default for CollisionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionTable {
    pub fn new() -> Self {
        Self {
            entries: [[None; ItemType::COUNT]; ItemType::COUNT],
        }
    }

    /// Register `handler` for `a` touching `b`, and its mirror.
    pub fn register(&mut self, a: ItemType, b: ItemType, handler: CollisionFn) {
        if self.entries[a.index()][b.index()].is_some() {
            com_dprintf(&format!("collision handler for {:?} x {:?} replaced\n", a, b));
        }
        self.entries[a.index()][b.index()] = Some(CollisionEntry { handler, swapped: false });
        if a != b {
            self.entries[b.index()][a.index()] = Some(CollisionEntry { handler, swapped: true });
        }
    }

    pub fn lookup(&self, mover: ItemType, other: ItemType) -> Option<CollisionEntry> {
        self.entries[mover.index()][other.index()]
    }

    pub fn has_entry(&self, a: ItemType, b: ItemType) -> bool {
        self.lookup(a, b).is_some()
    }

    /// Every filled slot has a mirror with the same handler and the
    /// opposite argument order.
    pub fn is_symmetric(&self) -> bool {
        for a in ItemType::ALL {
            for b in ItemType::ALL {
                let (Some(ab), Some(ba)) = (self.lookup(a, b), self.lookup(b, a)) else {
                    if self.has_entry(a, b) != self.has_entry(b, a) {
                        return false;
                    }
                    continue;
                };
                if ab.handler as usize != ba.handler as usize || (a != b && ab.swapped == ba.swapped) {
                    return false;
                }
            }
        }
        true
    }

    /// The stock table.
    pub fn standard() -> Self {
        let mut t = Self::new();
        t.register(ItemType::Player, ItemType::Powerup, collide_player_powerup);
        t.register(ItemType::Player, ItemType::Hostage, collide_player_hostage);
        t.register(ItemType::Player, ItemType::Robot, collide_player_robot);
        t.register(ItemType::Player, ItemType::Weapon, collide_player_weapon);
        t.register(ItemType::Robot, ItemType::Weapon, collide_robot_weapon);
        t.register(ItemType::Weapon, ItemType::ControlCenter, collide_weapon_controlcenter);
        t.register(ItemType::Player, ItemType::ControlCenter, collide_player_controlcenter);
        t.register(ItemType::Weapon, ItemType::Clutter, collide_weapon_clutter);
        t
    }
}

// ============================================================
// Helpers
// ============================================================

/// Remove the part of `item`'s velocity heading into `from`.
fn bump_away(game: &mut Game, item: ItemId, from: Vec3) {
    let pos = game.items[item].pos;
    let n = (pos - from).normalize();
    if n.is_zero() {
        return;
    }
    if let Some(phys) = game.items[item].physics_mut() {
        let into = phys.velocity.dot(n);
        if into < 0.0 {
            phys.velocity = phys.velocity - n.scale(2.0 * into);
        }
    }
}

fn shot_by(game: &Game, weapon: ItemId, target: ItemId) -> bool {
    game.items[weapon].parent == Some(target)
}

fn weapon_damage(game: &Game, weapon: ItemId) -> (f32, f32) {
    game.data
        .weapon(game.items[weapon].sub_id)
        .map_or((0.0, 1.0), |w| (w.damage, w.impact_size))
}

/// Weapons with PERSISTENT keep flying after hitting something.
fn spent_weapon(game: &Game, weapon: ItemId) -> Option<ItemId> {
    let persistent = game.items[weapon]
        .physics()
        .is_some_and(|p| p.flags.contains(PhysicsFlags::PERSISTENT));
    if persistent {
        None
    } else {
        Some(weapon)
    }
}

// ============================================================
// Handlers
// ============================================================

pub fn collide_player_powerup(game: &mut Game, _time: f32, point: Vec3, player: ItemId, powerup: ItemId) -> Option<ItemId> {
    let info = game.data.powerup(game.items[powerup].sub_id)?.clone();
    let max_shields = game.data.ship.max_shields;
    let max_energy = game.data.ship.max_energy;
    let used = match info.effect {
        PowerupEffect::Shields(amount) => {
            let p = &mut game.items[player];
            if p.shields >= max_shields {
                false
            } else {
                p.shields = (p.shields + amount).min(max_shields);
                true
            }
        }
        PowerupEffect::Energy(amount) => {
            let s = &mut game.player_state;
            if s.energy >= max_energy {
                false
            } else {
                s.energy = (s.energy + amount).min(max_energy);
                true
            }
        }
        PowerupEffect::Key(key) => {
            game.player_state.keys.insert(key);
            true
        }
        PowerupEffect::ExtraLife => {
            game.player_state.lives += 1;
            true
        }
        PowerupEffect::Weapon(w) => {
            game.player_state.primary_weapon = w;
            true
        }
    };
    if !used {
        return None;
    }
    game.sound(info.pickup_sound, point);
    Some(powerup)
}

pub fn collide_player_hostage(game: &mut Game, _time: f32, point: Vec3, _player: ItemId, hostage: ItemId) -> Option<ItemId> {
    game.level_state.hostages_rescued += 1;
    game.sound(SOUND_HOSTAGE_RESCUED, point);
    Some(hostage)
}

pub fn collide_player_robot(game: &mut Game, _time: f32, point: Vec3, player: ItemId, robot: ItemId) -> Option<ItemId> {
    let damage = game.data.robot(game.items[robot].sub_id).map_or(0.0, |r| r.contact_damage);
    let (player_pos, robot_pos) = (game.items[player].pos, game.items[robot].pos);
    bump_away(game, player, robot_pos);
    bump_away(game, robot, player_pos);
    game.sound(SOUND_PLAYER_BUMP, point);
    if damage > 0.0 {
        apply_damage(game, player, damage, Some(robot));
    }
    None
}

pub fn collide_player_weapon(game: &mut Game, _time: f32, point: Vec3, player: ItemId, weapon: ItemId) -> Option<ItemId> {
    if shot_by(game, weapon, player) {
        return None;
    }
    let (damage, impact) = weapon_damage(game, weapon);
    let cube = game.items[player].cube;
    spawn_explosion(game, cube, point, impact, None);
    game.sound(SOUND_PLAYER_HIT, point);
    apply_damage(game, player, damage, Some(weapon));
    spent_weapon(game, weapon)
}

pub fn collide_robot_weapon(game: &mut Game, _time: f32, point: Vec3, robot: ItemId, weapon: ItemId) -> Option<ItemId> {
    if shot_by(game, weapon, robot) {
        return None;
    }
    let (damage, impact) = weapon_damage(game, weapon);
    let (cube, killer) = (game.items[robot].cube, game.items[weapon].parent);
    spawn_explosion(game, cube, point, impact, None);
    game.sound(SOUND_ROBOT_HIT, point);
    apply_damage(game, robot, damage, killer);
    spent_weapon(game, weapon)
}

pub fn collide_weapon_controlcenter(game: &mut Game, _time: f32, point: Vec3, weapon: ItemId, reactor: ItemId) -> Option<ItemId> {
    let (damage, impact) = weapon_damage(game, weapon);
    let (cube, killer) = (game.items[reactor].cube, game.items[weapon].parent);
    spawn_explosion(game, cube, point, impact, None);
    game.sound(SOUND_CONTROL_CENTER_HIT, point);
    apply_damage(game, reactor, damage, killer);
    Some(weapon)
}

pub fn collide_player_controlcenter(game: &mut Game, _time: f32, point: Vec3, player: ItemId, reactor: ItemId) -> Option<ItemId> {
    let reactor_pos = game.items[reactor].pos;
    bump_away(game, player, reactor_pos);
    game.sound(SOUND_PLAYER_BUMP, point);
    None
}

pub fn collide_weapon_clutter(game: &mut Game, _time: f32, point: Vec3, weapon: ItemId, clutter: ItemId) -> Option<ItemId> {
    let (damage, impact) = weapon_damage(game, weapon);
    let (cube, killer) = (game.items[clutter].cube, game.items[weapon].parent);
    spawn_explosion(game, cube, point, impact, None);
    apply_damage(game, clutter, damage, killer);
    Some(weapon)
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_spawn::spawn_item;
    use crate::g_tables::{POWERUP_KEY_RED, POWERUP_SHIELD_BOOST};
    use myd1_common::builder::LevelBuilder;
    use myd1_common::walls::WallKeys;

    fn game() -> Game {
        Game::from_level(&LevelBuilder::corridor(1, 20.0).build(), Default::default()).unwrap()
    }

    fn tag_other(_game: &mut Game, _time: f32, _point: Vec3, _this: ItemId, other: ItemId) -> Option<ItemId> {
        Some(other)
    }

    #[test]
    fn test_register_mirrors() {
        let mut t = CollisionTable::new();
        t.register(ItemType::Player, ItemType::Powerup, tag_other);
        let ab = t.lookup(ItemType::Player, ItemType::Powerup).unwrap();
        let ba = t.lookup(ItemType::Powerup, ItemType::Player).unwrap();
        assert!(!ab.swapped);
        assert!(ba.swapped);
        assert!(t.is_symmetric());
        assert!(t.lookup(ItemType::Robot, ItemType::Powerup).is_none());
    }

    #[test]
    fn test_standard_table_is_symmetric() {
        let t = CollisionTable::standard();
        assert!(t.is_symmetric());
        assert!(t.has_entry(ItemType::Weapon, ItemType::Robot));
        assert!(t.has_entry(ItemType::Clutter, ItemType::Weapon));
        assert!(!t.has_entry(ItemType::Robot, ItemType::Robot));
        assert!(!t.has_entry(ItemType::Fireball, ItemType::Player));
    }

    #[test]
    fn test_mirrored_call_swaps_arguments() {
        let mut g = game();
        let mut t = CollisionTable::new();
        t.register(ItemType::Player, ItemType::Powerup, tag_other);
        // registered as (player, powerup) -> powerup; called as (powerup, player)
        let e = t.lookup(ItemType::Powerup, ItemType::Player).unwrap();
        assert_eq!(e.invoke(&mut g, 0.0, Vec3::ZERO, 5, 9), Some(5));
        let e = t.lookup(ItemType::Player, ItemType::Powerup).unwrap();
        assert_eq!(e.invoke(&mut g, 0.0, Vec3::ZERO, 9, 5), Some(5));
    }

    #[test]
    fn test_shield_powerup_not_taken_when_full() {
        let mut g = game();
        let player = spawn_item(&mut g, Item::new(ItemType::Player, 0, 0, Vec3::ZERO, 2.5));
        let boost = spawn_item(&mut g, Item::new(ItemType::Powerup, POWERUP_SHIELD_BOOST, 0, Vec3::UNIT_X, 1.5));
        g.items[player].shields = g.data.ship.max_shields;
        assert_eq!(collide_player_powerup(&mut g, 0.0, Vec3::ZERO, player, boost), None);
        g.items[player].shields = 10.0;
        assert_eq!(collide_player_powerup(&mut g, 0.0, Vec3::ZERO, player, boost), Some(boost));
        assert_eq!(g.items[player].shields, 35.0);
    }

    #[test]
    fn test_key_pickup() {
        let mut g = game();
        let player = spawn_item(&mut g, Item::new(ItemType::Player, 0, 0, Vec3::ZERO, 2.5));
        let key = spawn_item(&mut g, Item::new(ItemType::Powerup, POWERUP_KEY_RED, 0, Vec3::UNIT_X, 1.5));
        assert_eq!(collide_player_powerup(&mut g, 0.0, Vec3::ZERO, player, key), Some(key));
        assert!(g.player_state.keys.contains(WallKeys::RED));
    }

    #[test]
    fn test_own_shot_ignored() {
        let mut g = game();
        let player = spawn_item(&mut g, Item::new(ItemType::Player, 0, 0, Vec3::ZERO, 2.5));
        let mut shot = Item::new(ItemType::Weapon, 0, 0, Vec3::UNIT_Z, 0.5);
        shot.parent = Some(player);
        let shot = spawn_item(&mut g, shot);
        assert_eq!(collide_player_weapon(&mut g, 0.0, Vec3::ZERO, player, shot), None);
    }

    #[test]
    fn test_weapon_kills_robot() {
        let mut g = game();
        let robot = spawn_item(&mut g, Item::new(ItemType::Robot, 1, 0, Vec3::ZERO, 2.5));
        g.items[robot].shields = 5.0;
        let shot = spawn_item(&mut g, Item::new(ItemType::Weapon, 0, 0, Vec3::UNIT_Z, 0.5));
        let removed = collide_robot_weapon(&mut g, 0.0, Vec3::ZERO, robot, shot);
        assert_eq!(removed, Some(shot));
        assert!(!g.items[robot].is_alive());
        assert_eq!(g.level_state.score, g.data.robots[1].score);
    }
}
