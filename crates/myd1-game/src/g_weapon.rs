// g_weapon.rs — firing, wall impacts, damage and explosions

use rand::Rng;

use myd1_common::bitmap::{SUPER_TRANSPARENT, TRANSPARENT};
use myd1_common::cworld::Side;
use myd1_common::geometry::Bounce;
use myd1_common::walls::WallType;

use crate::g_local::*;
use crate::g_main::Game;
use crate::g_spawn::spawn_item;
use crate::g_tables::{
    WeaponFlags, SOUND_CONTROL_CENTER_DESTROYED, SOUND_ROBOT_DESTROYED, SOUND_WEAPON_HIT_DOOR,
};
use crate::g_wall::{damage_wall, swap_destroyed_texture};

/// Frames in an explosion clip.
const EXPLOSION_FRAMES: f32 = 8.0;

// ============================================================
// Spawning
// ============================================================

/// Launch weapon `weapon_id` from `parent` along its forward vector.
pub fn fire_weapon(game: &mut Game, parent: ItemId, weapon_id: u8) -> Option<ItemId> {
    let info = game.data.weapon(weapon_id)?.clone();
    let p = &game.items[parent];
    if !p.is_alive() {
        return None;
    }
    let (cube, pos, orient) = (p.cube, p.pos, p.orient);

    let mut flags = PhysicsFlags::empty();
    if info.flags.contains(WeaponFlags::BOUNCE) {
        flags |= PhysicsFlags::BOUNCE;
    }
    if info.flags.contains(WeaponFlags::BOUNCES_TWICE) {
        flags |= PhysicsFlags::BOUNCES_TWICE;
    }

    let mut shot = Item::new(ItemType::Weapon, weapon_id, cube, pos, info.size);
    shot.orient = orient;
    shot.parent = Some(parent);
    shot.lifeleft = info.lifetime;
    shot.control = ControlInfo::Weapon { parent: Some(parent) };
    shot.render = RenderInfo::WeaponVclip(VClipInfo::new(info.vclip, 0.05));
    shot.mover = Mover::Physics(PhysicsInfo {
        velocity: orient.fvec.scale(info.speed),
        mass: info.mass,
        drag: info.drag,
        flags,
        ..Default::default()
    });
    let id = spawn_item(game, shot);
    game.sound(info.fire_sound, pos);
    Some(id)
}

/// Put a fireball at `pos`. `delete_item` is removed when the explosion
/// goes off.
pub fn spawn_explosion(game: &mut Game, cube: usize, pos: Vec3, size: f32, delete_item: Option<ItemId>) -> ItemId {
    let size = size * game.rng.gen_range(0.9..=1.1);
    let lifetime = game.data.explosion_time;
    let mut fireball = Item::new(ItemType::Fireball, 0, cube, pos, size);
    fireball.control = ControlInfo::Explosion {
        spawn_time: game.time,
        delete_time: game.time + lifetime,
        delete_item,
    };
    fireball.render = RenderInfo::Fireball(VClipInfo::new(game.data.explosion_vclip, lifetime / EXPLOSION_FRAMES));
    let id = spawn_item(game, fireball);
    game.events.push(GameEvent::Explosion { item: id, pos, size });
    id
}

// ============================================================
// Damage
// ============================================================

/// Take `damage` off `target`'s shields. Returns true if that destroyed it.
pub fn apply_damage(game: &mut Game, target: ItemId, damage: f32, killer: Option<ItemId>) -> bool {
    let item = &mut game.items[target];
    if !item.is_alive() || item.flags.contains(ItemFlags::EXPLODING) {
        return false;
    }
    item.shields -= damage;
    if item.shields >= 0.0 {
        return false;
    }
    destroy_item(game, target, killer);
    true
}

/// Blow an item up: explosion, score, then removal at end of frame.
pub fn destroy_item(game: &mut Game, id: ItemId, killer: Option<ItemId>) {
    let (item_type, sub_id, cube, pos, size) = {
        let item = &mut game.items[id];
        item.flags.insert(ItemFlags::EXPLODING);
        (item.item_type, item.sub_id, item.cube, item.pos, item.size)
    };
    let mut blast = size * 2.0;
    match item_type {
        ItemType::Robot => {
            if let Some(info) = game.data.robot(sub_id) {
                blast = info.explosion_size;
                if killer.is_some() {
                    game.level_state.score += info.score;
                }
            }
            game.sound(SOUND_ROBOT_DESTROYED, pos);
        }
        ItemType::ControlCenter => {
            game.level_state.reactor_destroyed = true;
            game.sound(SOUND_CONTROL_CENTER_DESTROYED, pos);
        }
        _ => {}
    }
    spawn_explosion(game, cube, pos, blast, None);
    game.items[id].kill();
}

// ============================================================
// Wall impacts
// ============================================================

/// What a weapon does on reaching a wall it cannot pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WallHit {
    /// Through a see-through texel into `cube`, centre at `point`.
    Penetrate { cube: usize, point: Vec3 },
    Bounce,
    Explode,
}

/// See-through texel under the contact. A super-transparent overlay texel
/// is a hole; a transparent one shows the base texture.
fn is_see_through(game: &Game, bounce: &Bounce) -> bool {
    let side = &game.world.cubes[bounce.cube].sides[bounce.side];
    if side.has_overlay() {
        if let Some(bm) = game.data.bitmap(side.tex2_index()) {
            match side.get_pixel2(bounce, bm) {
                SUPER_TRANSPARENT => return true,
                TRANSPARENT => {}
                _ => return false,
            }
        }
    }
    game.data
        .bitmap(side.tex1)
        .is_some_and(|bm| side.get_pixel(bounce, bm) == TRANSPARENT)
}

/// Whether `weapon` should be swept against `side` with its centre point,
/// because the side might let it through.
pub fn may_penetrate(game: &Game, weapon: &Item, side: &Side) -> bool {
    if weapon.item_type != ItemType::Weapon || side.neighbor.is_none() {
        return false;
    }
    let penetrates = game
        .data
        .weapon(weapon.sub_id)
        .is_some_and(|w| w.flags.contains(WeaponFlags::PENETRATES));
    let holes = |tex: u16| game.data.bitmap(tex).is_some_and(|bm| bm.has_transparency());
    penetrates && ((side.has_overlay() && holes(side.tex2_index())) || holes(side.tex1))
}

/// Decide and apply the outcome of `weapon` reaching `bounce`. The weapon
/// is dead after `Explode`.
pub fn weapon_hit_wall(game: &mut Game, weapon: ItemId, bounce: &Bounce) -> WallHit {
    let side = &game.world.cubes[bounce.cube].sides[bounce.side];
    if let Some(neighbor) = side.neighbor {
        if may_penetrate(game, &game.items[weapon], side) && is_see_through(game, bounce) {
            return WallHit::Penetrate {
                cube: neighbor,
                point: bounce.point,
            };
        }
    }

    if let Some(phys) = game.items[weapon].physics_mut() {
        if phys.flags.contains(PhysicsFlags::BOUNCE) {
            if phys.flags.contains(PhysicsFlags::BOUNCES_TWICE) {
                if phys.flags.contains(PhysicsFlags::BOUNCED_ONCE) {
                    phys.flags
                        .remove(PhysicsFlags::BOUNCE | PhysicsFlags::BOUNCED_ONCE | PhysicsFlags::BOUNCES_TWICE);
                } else {
                    phys.flags.insert(PhysicsFlags::BOUNCED_ONCE);
                }
            }
            return WallHit::Bounce;
        }
    }

    explode_on_wall(game, weapon, bounce);
    WallHit::Explode
}

fn explode_on_wall(game: &mut Game, weapon: ItemId, bounce: &Bounce) {
    let (damage, impact, mut sound) = game
        .data
        .weapon(game.items[weapon].sub_id)
        .map_or((0.0, 1.0, 0), |w| (w.damage, w.impact_size, w.impact_sound));
    let wall_type = game.world.cubes[bounce.cube].sides[bounce.side]
        .wall
        .map(|w| game.world.walls[w].wall_type);
    if wall_type == Some(WallType::Door) {
        sound = SOUND_WEAPON_HIT_DOOR;
    }

    spawn_explosion(game, bounce.cube, bounce.point, impact, None);
    game.sound(sound, bounce.point);
    damage_wall(game, bounce.cube, bounce.side, damage);
    swap_destroyed_texture(game, bounce.cube, bounce.side);
    game.items[weapon].kill();
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_spawn::make_player;
    use crate::g_tables::{GameData, WEAPON_FLASH_MISSILE};
    use myd1_common::builder::LevelBuilder;

    fn game() -> Game {
        Game::from_level(&LevelBuilder::corridor(2, 20.0).build(), GameData::builtin()).unwrap()
    }

    #[test]
    fn test_fire_weapon_sets_flags_and_parent() {
        let mut g = game();
        let data = g.data.clone();
        let player = spawn_item(&mut g, make_player(&data, 0, Vec3::ZERO));
        let shot = fire_weapon(&mut g, player, WEAPON_FLASH_MISSILE).unwrap();
        let item = &g.items[shot];
        assert_eq!(item.parent, Some(player));
        assert_eq!(item.cube, 0);
        let phys = item.physics().unwrap();
        assert!(phys.flags.contains(PhysicsFlags::BOUNCE | PhysicsFlags::BOUNCES_TWICE));
        assert_eq!(phys.velocity, Vec3::new(0.0, 0.0, 80.0));
        assert!(g.events.iter().any(|e| matches!(e, GameEvent::Sound { .. })));
    }

    #[test]
    fn test_fire_unknown_weapon() {
        let mut g = game();
        let data = g.data.clone();
        let player = spawn_item(&mut g, make_player(&data, 0, Vec3::ZERO));
        assert!(fire_weapon(&mut g, player, 77).is_none());
    }

    #[test]
    fn test_explosion_is_timed() {
        let mut g = game();
        g.time = 3.0;
        let id = spawn_explosion(&mut g, 1, Vec3::new(0.0, 0.0, 20.0), 4.0, None);
        let item = &g.items[id];
        assert_eq!(item.item_type, ItemType::Fireball);
        assert!(item.size >= 3.6 - 1e-4 && item.size <= 4.4 + 1e-4);
        assert!(matches!(item.control, ControlInfo::Explosion { delete_time, .. } if delete_time == 3.5));
        assert_eq!(g.world.cubes[1].objects, vec![id]);
    }

    #[test]
    fn test_damage_destroys_once() {
        let mut g = game();
        let mut robot = Item::new(ItemType::Robot, 0, 0, Vec3::ZERO, 4.0);
        robot.shields = 15.0;
        let robot = spawn_item(&mut g, robot);
        assert!(!apply_damage(&mut g, robot, 10.0, None));
        assert!(apply_damage(&mut g, robot, 10.0, Some(0)));
        assert!(!apply_damage(&mut g, robot, 10.0, Some(0)));
        let explosions = g.events.iter().filter(|e| matches!(e, GameEvent::Explosion { .. })).count();
        assert_eq!(explosions, 1);
        assert_eq!(g.level_state.score, g.data.robots[0].score);
    }
}
