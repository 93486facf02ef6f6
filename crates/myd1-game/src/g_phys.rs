// g_phys.rs — item movement: drag, rotation and the swept collision loop
//
// Each physics item is swept as a sphere from where it is to where its
// velocity takes it this frame. Walls and other items along the way are
// resolved nearest first, for at most `phys_max_bounces` impacts. Portal
// crossings do not count as impacts.

use std::f32::consts::FRAC_PI_4;

use myd1_common::common::com_dprintf;
use myd1_common::cworld::World;
use myd1_common::geometry::{Bounce, LineSegment};

use crate::g_local::*;
use crate::g_main::Game;
use crate::g_spawn::relink_item;
use crate::g_wall::{bump_wall, check_trigger};
use crate::g_weapon::{may_penetrate, weapon_hit_wall, WallHit};

/// Drag time constant is mass * drag * this.
pub const DRAG_TAU_SCALE: f32 = 2.5;
/// Bank angle per radian/second of heading rate.
pub const TURNROLL_SCALE: f32 = 0.154;
/// Fastest the bank can change, radians/second.
pub const ROLL_RATE: f32 = FRAC_PI_4;
pub const PHYS_MAX_BOUNCES: usize = 3;
/// Portals one item may cross in a frame.
const MAX_PORTAL_CROSSINGS: usize = 32;

// ============================================================
// Integration
// ============================================================

/// Exponential drag on `v`. With thrust, `v` eases toward the terminal
/// velocity `thrust * tau / mass` instead of toward zero. No drag means
/// thrust just accelerates.
pub fn apply_drag(v: Vec3, thrust: Vec3, mass: f32, drag: f32, uses_thrust: bool, dt: f32) -> Vec3 {
    let thrusting = uses_thrust && mass > 0.0;
    let tau = mass * DRAG_TAU_SCALE * drag;
    if !(tau > 0.0) || !tau.is_finite() {
        return if thrusting { v + thrust.scale(dt / mass) } else { v };
    }
    let k = (-dt / tau).exp();
    let decayed = v.scale(k);
    if thrusting {
        decayed + thrust.scale(tau * (1.0 - k) / mass)
    } else {
        decayed
    }
}

/// Ease the bank toward the angle the current turn rate calls for.
pub fn update_turnroll(phys: &mut PhysicsInfo, dt: f32) {
    let desired = -phys.rotvel.y * TURNROLL_SCALE;
    let max_step = ROLL_RATE * dt;
    phys.turnroll += (desired - phys.turnroll).clamp(-max_step, max_step);
}

/// Apply one frame of rotation to `orient`. The bank from turning is taken
/// out before the turn and put back after it.
pub fn integrate_rotation(orient: Mat3, phys: &mut PhysicsInfo, dt: f32) -> Mat3 {
    let turnroll = phys.flags.contains(PhysicsFlags::TURNROLL);
    let mut m = orient;
    if turnroll && phys.turnroll != 0.0 {
        m = Mat3::from_angles(0.0, -phys.turnroll, 0.0).multiply(&m);
    }
    if !phys.rotvel.is_zero() {
        m = Mat3::from_angle_vec(phys.rotvel.scale(dt)).multiply(&m);
    }
    if turnroll {
        update_turnroll(phys, dt);
        if phys.turnroll != 0.0 {
            m = Mat3::from_angles(0.0, phys.turnroll, 0.0).multiply(&m);
        }
    }
    m.orthonormalize()
}

pub fn spin_item(game: &mut Game, id: ItemId, frame_time: f32) {
    let item = &mut game.items[id];
    let Mover::Spinning(spin) = item.mover else {
        return;
    };
    if spin.spin_rate.is_zero() {
        return;
    }
    item.orient = Mat3::from_angle_vec(spin.spin_rate.scale(frame_time.max(0.0)))
        .multiply(&item.orient)
        .orthonormalize();
}

// ============================================================
// Sweep queries
// ============================================================

/// Unordered pair key; each pair collides at most once per frame.
pub fn pair_key(a: ItemId, b: ItemId) -> (ItemId, ItemId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Nearest item in `cube` the mover's sphere touches along `line`.
fn nearest_item_hit(game: &Game, mover: ItemId, cube: usize, line: &LineSegment) -> Option<(ItemId, f32)> {
    let m = &game.items[mover];
    let mut best: Option<(ItemId, f32)> = None;
    for &other in &game.world.cubes[cube].objects {
        if other == mover {
            continue;
        }
        let o = &game.items[other];
        if !o.is_alive()
            || !game.collisions.has_entry(m.item_type, o.item_type)
            || game.frame_pairs.contains(&pair_key(mover, other))
        {
            continue;
        }
        let Some(d) = line.distance_to_sphere(o.pos, m.size + o.size) else {
            continue;
        };
        if d <= line.length && best.map_or(true, |(_, bd)| d < bd) {
            best = Some((other, d));
        }
    }
    best
}

/// Nearest wall or portal along `line`. Portals, and walls a weapon might
/// shoot through, are tested with the centre point.
fn nearest_wall_hit(game: &Game, mover: ItemId, cube: usize, line: &LineSegment) -> Option<Bounce> {
    let item = &game.items[mover];
    game.world.cubes[cube].bounce(line, |side| {
        if game.world.is_passable(cube, side.index) || may_penetrate(game, item, side) {
            0.0
        } else {
            item.size
        }
    })
}

/// Pull a position that ended up outside `cube` back in along the line
/// from the cube centre. `None` if no inside point is found.
pub fn correct_position(world: &World, cube: usize, pos: Vec3, size: f32) -> Option<Vec3> {
    let c = &world.cubes[cube];
    let line = LineSegment::new(c.center, pos);
    if line.is_degenerate() {
        return None;
    }
    for s in [size, 0.0] {
        if let Some(b) = c.bounce(&line, |_| s) {
            if c.is_point_inside(b.point) {
                return Some(b.point);
            }
        }
    }
    None
}

// ============================================================
// Movement
// ============================================================

fn set_velocity(game: &mut Game, id: ItemId, v: Vec3) {
    if let Some(phys) = game.items[id].physics_mut() {
        phys.velocity = v;
    }
}

/// Move one physics item through a frame. Returns false if the item died
/// on the way.
pub fn move_item(game: &mut Game, id: ItemId, frame_time: f32) -> bool {
    let dt = frame_time.max(0.0);
    let Mover::Physics(mut phys) = game.items[id].mover else {
        return game.items[id].is_alive();
    };

    let uses_thrust = phys.flags.contains(PhysicsFlags::USES_THRUST);
    phys.rotvel = apply_drag(phys.rotvel, phys.rotthrust, phys.mass, phys.drag, uses_thrust, dt);
    let orient = integrate_rotation(game.items[id].orient, &mut phys, dt);
    phys.velocity = apply_drag(phys.velocity, phys.thrust, phys.mass, phys.drag, uses_thrust, dt);

    let item = &mut game.items[id];
    item.orient = orient;
    item.mover = Mover::Physics(phys);
    let (start_pos, start_cube, item_type) = (item.pos, item.cube, item.item_type);

    let time = game.time;
    let max_bounces = game.max_bounces();
    let mut velocity = phys.velocity;
    let mut pos = start_pos;
    let mut cube = start_cube;
    let mut end = start_pos + velocity.scale(dt);
    let mut alive = true;
    let mut bounces = 0;
    let mut crossings = 0;

    while bounces < max_bounces && crossings < MAX_PORTAL_CROSSINGS {
        let line = LineSegment::new(pos, end);
        if line.is_degenerate() {
            break;
        }
        let wall = nearest_wall_hit(game, id, cube, &line);

        if let Some((other, d)) = nearest_item_hit(game, id, cube, &line) {
            if wall.map_or(true, |b| d < b.distance) {
                let point = line.point_at(d);
                game.frame_pairs.insert(pair_key(id, other));
                let other_type = game.items[other].item_type;
                let mut resolved = false;
                if let Some(entry) = game.collisions.lookup(item_type, other_type) {
                    if let Some(dead) = entry.invoke(game, time, point, id, other) {
                        game.items[dead].kill();
                        resolved = true;
                    }
                }
                if !game.items[id].is_alive() {
                    alive = false;
                    pos = point;
                    break;
                }
                // a bump changes course from the contact point on
                let after = game.items[id].velocity();
                if after != velocity {
                    let speed = velocity.len();
                    let time_left = if speed > 0.0 { (line.length - d) / speed } else { 0.0 };
                    velocity = after;
                    pos = point;
                    end = point + velocity.scale(time_left);
                    resolved = true;
                }
                // pass-through contacts are bounded by frame_pairs, not the budget
                if resolved {
                    bounces += 1;
                }
                continue;
            }
        }

        let Some(b) = wall else {
            pos = end;
            break;
        };

        if game.world.is_passable(b.cube, b.side) {
            let Some(next) = game.world.cubes[b.cube].sides[b.side].neighbor else {
                pos = b.point;
                break;
            };
            crossings += 1;
            pos = b.point;
            cube = next;
            check_trigger(game, b.cube, b.side, id);
            continue;
        }

        bounces += 1;
        if item_type == ItemType::Weapon {
            match weapon_hit_wall(game, id, &b) {
                WallHit::Penetrate { cube: next, point } => {
                    crossings += 1;
                    pos = point;
                    cube = next;
                }
                WallHit::Bounce => {
                    velocity = b.reflect(velocity);
                    set_velocity(game, id, velocity);
                    end = b.point + (end - b.point).reflect(b.normal);
                    pos = b.point;
                }
                WallHit::Explode => {
                    alive = false;
                    pos = b.point;
                    break;
                }
            }
        } else {
            bump_wall(game, id, b.cube, b.side);
            velocity = b.slide(velocity);
            set_velocity(game, id, velocity);
            end = b.point + (end - b.point).project_out(b.normal);
            pos = b.point;
        }
    }

    if alive && !game.world.cubes[cube].is_point_inside(pos) {
        let size = game.items[id].size;
        match correct_position(&game.world, cube, pos, size) {
            Some(p) => pos = p,
            None => {
                com_dprintf(&format!(
                    "move_item: item {} lost at {:?} in cube {}, move dropped\n",
                    id, pos, cube
                ));
                pos = start_pos;
                cube = start_cube;
            }
        }
    }

    game.items[id].pos = pos;
    relink_item(game, id, cube);
    alive && game.items[id].is_alive()
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_spawn::spawn_item;
    use crate::g_tables::{GameData, POWERUP_SHIELD_BOOST};
    use myd1_common::builder::LevelBuilder;

    fn game(cubes: usize) -> Game {
        Game::from_level(&LevelBuilder::corridor(cubes, 20.0).build(), GameData::builtin()).unwrap()
    }

    fn mover(pos: Vec3, velocity: Vec3, size: f32) -> Item {
        Item::new(ItemType::Debris, 0, 0, pos, size).with_physics(PhysicsInfo {
            velocity,
            mass: 1.0,
            ..Default::default()
        })
    }

    #[test]
    fn test_drag_decays() {
        let v = apply_drag(Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO, 1.0, 0.4, false, 1.0);
        assert!((v.x - 10.0 * (-1.0f32).exp()).abs() < 1e-4);
    }

    #[test]
    fn test_no_drag_keeps_velocity() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(apply_drag(v, Vec3::ZERO, 1.0, 0.0, false, 0.5), v);
        let t = apply_drag(v, Vec3::new(0.0, 0.0, 4.0), 2.0, 0.0, true, 0.5);
        assert!((t.z - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_thrust_reaches_terminal_velocity() {
        let mut v = Vec3::ZERO;
        for _ in 0..200 {
            v = apply_drag(v, Vec3::new(0.0, 0.0, 8.0), 2.0, 0.5, true, 0.1);
        }
        // thrust * tau / mass = 8 * 2.5 / 2
        assert!((v.z - 10.0).abs() < 1e-2);
    }

    #[test]
    fn test_turnroll_is_rate_limited() {
        let mut phys = PhysicsInfo {
            rotvel: Vec3::new(0.0, -10.0, 0.0),
            flags: PhysicsFlags::TURNROLL,
            ..Default::default()
        };
        update_turnroll(&mut phys, 0.1);
        assert!((phys.turnroll - ROLL_RATE * 0.1).abs() < 1e-6);
        for _ in 0..100 {
            update_turnroll(&mut phys, 0.1);
        }
        assert!((phys.turnroll - 1.54).abs() < 1e-4);
    }

    #[test]
    fn test_rotation_stays_orthonormal() {
        let mut phys = PhysicsInfo {
            rotvel: Vec3::new(0.3, 1.2, -0.4),
            flags: PhysicsFlags::TURNROLL,
            ..Default::default()
        };
        let mut m = Mat3::IDENTITY;
        for _ in 0..50 {
            m = integrate_rotation(m, &mut phys, 0.05);
        }
        assert!((m.fvec.len() - 1.0).abs() < 1e-4);
        assert!(m.fvec.dot(m.uvec).abs() < 1e-4);
        assert!(m.rvec.dot(m.fvec).abs() < 1e-4);
    }

    #[test]
    fn test_slide_along_wall() {
        let mut g = game(1);
        let id = spawn_item(&mut g, mover(Vec3::ZERO, Vec3::new(20.0, 0.0, 5.0), 1.0));
        assert!(move_item(&mut g, id, 1.0));
        let item = &g.items[id];
        assert!(g.world.cubes[0].is_point_inside(item.pos));
        assert!((item.pos.x - 9.0).abs() < 1e-3);
        assert!((item.pos.z - 5.0).abs() < 1e-3);
        assert_eq!(item.velocity(), Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_stationary_item_stays_put() {
        let mut g = game(1);
        let id = spawn_item(&mut g, mover(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO, 1.0));
        assert!(move_item(&mut g, id, 1.0));
        assert_eq!(g.items[id].pos, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_correct_position_pulls_back_inside() {
        let g = game(1);
        let p = correct_position(&g.world, 0, Vec3::new(0.0, 0.0, 10.5), 1.0).unwrap();
        assert!(g.world.cubes[0].is_point_inside(p));
        assert!((p.z - 9.0).abs() < 1e-3);
    }

    #[test]
    fn test_pair_collides_once_per_frame() {
        let mut g = game(1);
        let data = g.data.clone();
        let player = spawn_item(&mut g, crate::g_spawn::make_player(&data, 0, Vec3::ZERO));
        g.items[player].physics_mut().unwrap().velocity = Vec3::new(0.0, 0.0, 20.0);
        let mut robot = Item::new(ItemType::Robot, 0, 0, Vec3::new(0.0, 0.0, 8.0), 2.5);
        robot.shields = 100.0;
        spawn_item(&mut g, robot);
        let shields = g.items[player].shields;

        assert!(move_item(&mut g, player, 1.0));
        let hit_once = g.items[player].shields;
        assert!(hit_once < shields);
        assert!(g.items[player].velocity().z < 0.0, "bumped back");
        assert_eq!(g.frame_pairs.len(), 1);
    }

    #[test]
    fn test_ignored_contacts_do_not_stop_the_move() {
        let mut g = game(1);
        let data = g.data.clone();
        let player = spawn_item(&mut g, crate::g_spawn::make_player(&data, 0, Vec3::new(0.0, 0.0, -6.0)));
        g.items[player].shields = data.ship.max_shields;
        g.items[player].physics_mut().unwrap().velocity = Vec3::new(0.0, 0.0, 24.0);
        let boosts: Vec<ItemId> = [-2.0, 0.0, 2.0]
            .iter()
            .map(|&z| spawn_item(&mut g, Item::new(ItemType::Powerup, POWERUP_SHIELD_BOOST, 0, Vec3::new(0.0, 0.0, z), 1.5)))
            .collect();
        assert!(boosts.len() >= g.max_bounces());

        let mut last = g.items[player].pos.z;
        for frame in 0..2 {
            g.frame_pairs.clear();
            assert!(move_item(&mut g, player, 0.5));
            let z = g.items[player].pos.z;
            assert!(z > last, "frame {}: player held at z = {}", frame, z);
            last = z;
        }
        // exp(-0.5) of 24 u/s for half a second from z = -6
        assert!(last > 5.0);
        assert!(boosts.iter().all(|&b| g.items[b].is_alive()), "full shields leave boosts behind");
        assert_eq!(g.items[player].shields, data.ship.max_shields);
    }
}
