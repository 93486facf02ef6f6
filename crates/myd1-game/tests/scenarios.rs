// scenarios.rs — whole-level movement, collision and visibility scenarios

use std::time::Duration;

use myd1_common::builder::LevelBuilder;
use myd1_common::cworld::{SIDE_BACK, SIDE_FRONT};
use myd1_common::geometry::LineSegment;
use myd1_common::vis::{compute_visibility, VIS_MAX_DEPTH};
use myd1_common::walls::{Trigger, TriggerType, WallState, WallType};
use myd1_game::g_collide::CollisionTable;
use myd1_game::g_local::*;
use myd1_game::g_main::Game;
use myd1_game::g_phys::move_item;
use myd1_game::g_spawn::{make_player, spawn_item};
use myd1_game::g_tables::{GameData, WEAPON_FLASH_MISSILE, WEAPON_LASER};

fn load(b: LevelBuilder) -> Game {
    Game::from_level(&b.build(), GameData::builtin()).unwrap()
}

fn debris(cube: usize, pos: Vec3, velocity: Vec3, size: f32) -> Item {
    Item::new(ItemType::Debris, 0, cube, pos, size).with_physics(PhysicsInfo {
        velocity,
        mass: 1.0,
        ..Default::default()
    })
}

/// Corridor with a side room off the left of its last cube.
fn bent_level() -> LevelBuilder {
    let mut b = LevelBuilder::corridor(3, 20.0);
    b.add_box(Vec3::new(-30.0, -10.0, 30.0), Vec3::new(-10.0, 10.0, 50.0));
    b
}

#[test]
fn item_crosses_portal_into_next_cube() {
    let mut g = load(LevelBuilder::corridor(2, 20.0));
    let id = spawn_item(&mut g, debris(0, Vec3::ZERO, Vec3::new(0.0, 0.0, 20.0), 1.0));

    assert!(move_item(&mut g, id, 1.0));
    let item = &g.items[id];
    assert_eq!(item.cube, 1);
    assert!((item.pos.z - 20.0).abs() < 1e-4);
    assert!(g.world.cubes[0].objects.is_empty());
    assert_eq!(g.world.cubes[1].objects, vec![id]);
    assert_eq!(item.cube_index, 0);
}

#[test]
fn flash_missile_bounces_twice_then_explodes() {
    let mut g = load(LevelBuilder::corridor(1, 20.0));
    let mut missile = Item::new(ItemType::Weapon, WEAPON_FLASH_MISSILE, 0, Vec3::new(0.0, 0.0, 5.0), 0.6);
    missile.mover = Mover::Physics(PhysicsInfo {
        velocity: Vec3::new(0.0, 0.0, 20.0),
        mass: 1.0,
        flags: PhysicsFlags::BOUNCE | PhysicsFlags::BOUNCES_TWICE,
        ..Default::default()
    });
    let id = spawn_item(&mut g, missile);

    assert!(move_item(&mut g, id, 0.5));
    let v = g.items[id].velocity();
    assert!((v.z + 20.0).abs() < 1e-4, "normal component flips: {:?}", v);
    assert!((g.items[id].pos.z - 3.8).abs() < 1e-3);
    assert!(g.items[id].physics().unwrap().flags.contains(PhysicsFlags::BOUNCED_ONCE));

    assert!(move_item(&mut g, id, 1.0));
    assert!((g.items[id].velocity().z - 20.0).abs() < 1e-4);
    assert!(!g.items[id].physics().unwrap().flags.contains(PhysicsFlags::BOUNCE));

    assert!(!move_item(&mut g, id, 1.0));
    assert!(g.events.iter().any(|e| matches!(e, GameEvent::Explosion { .. })));
}

#[test]
fn collision_table_is_symmetric() {
    let table = CollisionTable::standard();
    assert!(table.is_symmetric());
    for &a in ItemType::ALL.iter() {
        for &b in ItemType::ALL.iter() {
            assert_eq!(table.has_entry(a, b), table.has_entry(b, a), "{:?} x {:?}", a, b);
            if a != b {
                if let (Some(ab), Some(ba)) = (table.lookup(a, b), table.lookup(b, a)) {
                    assert_ne!(ab.swapped, ba.swapped);
                }
            }
        }
    }
}

#[test]
fn robot_weapon_hit_is_the_same_from_either_side() {
    let laser_damage = GameData::builtin().weapon(WEAPON_LASER).unwrap().damage;
    for weapon_moves in [true, false] {
        let mut g = load(LevelBuilder::corridor(1, 20.0));
        let (robot_v, weapon_v) = if weapon_moves {
            (Vec3::ZERO, Vec3::new(0.0, 0.0, -20.0))
        } else {
            (Vec3::new(0.0, 0.0, 20.0), Vec3::ZERO)
        };
        let mut robot = Item::new(ItemType::Robot, 0, 0, Vec3::new(0.0, 0.0, -5.0), 2.0).with_physics(PhysicsInfo {
            velocity: robot_v,
            mass: 4.0,
            ..Default::default()
        });
        robot.shields = 100.0;
        let robot = spawn_item(&mut g, robot);
        let mut laser = Item::new(ItemType::Weapon, WEAPON_LASER, 0, Vec3::new(0.0, 0.0, 5.0), 0.5);
        laser.mover = Mover::Physics(PhysicsInfo {
            velocity: weapon_v,
            mass: 1.0,
            ..Default::default()
        });
        let laser = spawn_item(&mut g, laser);

        let mover = if weapon_moves { laser } else { robot };
        move_item(&mut g, mover, 1.0);
        assert!((g.items[robot].shields - (100.0 - laser_damage)).abs() < 1e-4);
        assert!(!g.items[laser].is_alive());
    }
}

#[test]
fn neighbors_see_each_other_through_worker() {
    let mut g = load(bent_level());
    g.enable_vis_worker().unwrap();
    let count = g.world.cubes.len();
    let vis = g.vis.as_mut().unwrap();
    for c in 0..count {
        assert!(vis.request(c));
    }
    for _ in 0..count {
        if (0..count).all(|c| g.world.has_visibility(c)) {
            break;
        }
        vis.poll_blocking(&mut g.world, Duration::from_secs(10));
    }
    for a in 0..count {
        assert!(g.world.has_visibility(a));
        let neighbors: Vec<usize> = g.world.cubes[a].neighbors().collect();
        for b in neighbors {
            assert!(g.world.visible_cubes(a).contains(&b), "{} should see {}", a, b);
            assert!(g.world.visible_cubes(b).contains(&a), "{} should see {}", b, a);
        }
    }
    assert_eq!(g.world.cubes[0].visibility, Some(compute_visibility(&g.world, 0, 80.0, VIS_MAX_DEPTH)));
}

#[test]
fn larger_sphere_hits_no_later() {
    let g = load(LevelBuilder::corridor(1, 20.0));
    let back = &g.world.cubes[0].sides[SIDE_BACK];
    for (x, y) in [(0.0, 0.0), (3.0, -2.0), (-7.5, 6.0)] {
        let line = LineSegment::new(Vec3::new(x, y, -5.0), Vec3::new(x * 0.5, y, 40.0));
        let mut last = f32::INFINITY;
        for size in [0.0, 0.5, 1.0, 2.0, 4.0] {
            let b = back.bounce(&line, size).unwrap();
            assert!(b.distance <= last, "size {} hit at {} after {}", size, b.distance, last);
            last = b.distance;
        }
    }
}

#[test]
fn move_through_thin_geometry_is_abandoned() {
    // second cube is turned inside out: its far face is nearer than the
    // shared one, so nothing that enters it can be placed inside
    let mut b = LevelBuilder::new();
    b.add_box(Vec3::new(-10.0, -10.0, -10.0), Vec3::new(10.0, 10.0, 10.0));
    let h = 10.0;
    b.add_cube([
        Vec3::new(h, h, 10.0),
        Vec3::new(h, -h, 10.0),
        Vec3::new(-h, -h, 10.0),
        Vec3::new(-h, h, 10.0),
        Vec3::new(h, h, 5.0),
        Vec3::new(h, -h, 5.0),
        Vec3::new(-h, -h, 5.0),
        Vec3::new(-h, h, 5.0),
    ]);
    let mut g = load(b);
    assert_eq!(g.world.cubes[0].sides[SIDE_BACK].neighbor, Some(1));
    assert_eq!(g.world.cubes[1].sides[SIDE_FRONT].neighbor, Some(0));

    let id = spawn_item(&mut g, debris(0, Vec3::ZERO, Vec3::new(0.0, 0.0, 30.0), 1.0));
    assert!(move_item(&mut g, id, 1.0));
    assert_eq!(g.items[id].cube, 0);
    assert_eq!(g.items[id].pos, Vec3::ZERO);
    assert_eq!(g.world.cubes[0].objects, vec![id]);
}

#[test]
fn player_opens_door_and_walks_through() {
    let mut b = LevelBuilder::corridor(2, 20.0);
    let (d0, _) = b.add_wall_pair(0, SIDE_BACK, WallType::Door).unwrap();
    let mut g = load(b);
    let data = g.data.clone();
    let player = spawn_item(&mut g, make_player(&data, 0, Vec3::ZERO));
    g.player = Some(player);
    let controls = PlayerControls {
        forward: 1.0,
        ..Default::default()
    };

    let mut opened = false;
    for _ in 0..80 {
        g.run_frame(0.1, &controls);
        opened |= g.drain_events().contains(&GameEvent::WallOpened { wall: d0 });
        if g.items[player].cube == 1 {
            break;
        }
    }
    assert!(opened);
    assert_eq!(g.world.walls[d0].state, WallState::Open);
    assert_eq!(g.items[player].cube, 1);
    assert!(g.world.cubes[1].is_point_inside(g.items[player].pos));
}

#[test]
fn crossing_exit_trigger_ends_level() {
    let mut b = LevelBuilder::corridor(3, 20.0);
    let w = b.add_wall(1, SIDE_BACK, WallType::Open);
    let t = b.add_trigger(Trigger::new(TriggerType::Exit));
    b.wall_mut(w).trigger = Some(t);
    let mut g = load(b);
    let data = g.data.clone();
    let player = spawn_item(&mut g, make_player(&data, 1, Vec3::new(0.0, 0.0, 28.0)));
    g.player = Some(player);
    g.items[player].physics_mut().unwrap().velocity = Vec3::new(0.0, 0.0, 30.0);

    g.run_frame(0.25, &PlayerControls::default());
    assert_eq!(g.items[player].cube, 2);
    assert_eq!(g.level_state.exit, Some(LevelExit::Normal));
    assert!(g.events.contains(&GameEvent::Trigger { trigger: t, item: player }));
}
