//! Property tests over random movement and spawn/free sequences.
//!
//! 1. A moved item's center always ends inside the cube it is linked to
//! 2. Cube bags and item back-references always agree
//! 3. Visibility side lists keep their draw order

use myd1_common::builder::LevelBuilder;
use myd1_common::cworld::SIDE_BACK;
use myd1_common::vis::{compute_visibility, VIS_MAX_DEPTH};
use myd1_common::walls::WallType;
use myd1_game::g_local::*;
use myd1_game::g_main::Game;
use myd1_game::g_phys::move_item;
use myd1_game::g_spawn::{free_item, spawn_item};
use myd1_game::g_tables::GameData;
use proptest::prelude::*;

// ── Fixtures ────────────────────────────────────────────────────────────

/// Corridor of three with a side room off the last cube and a box above
/// the first.
fn fixture() -> Game {
    let mut b = LevelBuilder::corridor(3, 20.0);
    b.add_box(Vec3::new(-30.0, -10.0, 30.0), Vec3::new(-10.0, 10.0, 50.0));
    b.add_box(Vec3::new(-10.0, 10.0, -10.0), Vec3::new(10.0, 30.0, 10.0));
    Game::from_level(&b.build(), GameData::builtin()).unwrap()
}

fn debris(cube: usize, pos: Vec3, velocity: Vec3) -> Item {
    Item::new(ItemType::Debris, 0, cube, pos, 1.0).with_physics(PhysicsInfo {
        velocity,
        mass: 1.0,
        drag: 0.05,
        ..Default::default()
    })
}

fn check_bags(g: &Game) -> Result<(), TestCaseError> {
    let mut seen = 0;
    for (c, cube) in g.world.cubes.iter().enumerate() {
        for (slot, &id) in cube.objects.iter().enumerate() {
            let item = &g.items[id];
            prop_assert!(item.in_use, "freed item {} still in cube {}", id, c);
            prop_assert_eq!(item.cube, c);
            prop_assert_eq!(item.cube_index, slot);
            seen += 1;
        }
    }
    prop_assert_eq!(seen, g.items.iter().filter(|i| i.in_use).count());
    Ok(())
}

// ── Strategies ──────────────────────────────────────────────────────────

fn offset() -> impl Strategy<Value = Vec3> {
    (-8.0f32..8.0, -8.0f32..8.0, -8.0f32..8.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn velocity() -> impl Strategy<Value = Vec3> {
    (-300.0f32..300.0, -300.0f32..300.0, -300.0f32..300.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

#[derive(Debug, Clone)]
enum Op {
    Spawn(usize, Vec3, Vec3),
    Move(usize, f32),
    Free(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3, offset(), velocity()).prop_map(|(c, o, v)| Op::Spawn(c, o, v)),
        (0usize..32, 0.0f32..0.25).prop_map(|(i, dt)| Op::Move(i, dt)),
        (0usize..32).prop_map(Op::Free),
    ]
}

// ── Properties ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn moved_items_stay_inside_their_cube(
        start in 0usize..3,
        pos in offset(),
        steps in prop::collection::vec((velocity(), 0.0f32..0.25), 1..12),
    ) {
        let mut g = fixture();
        let center = Vec3::new(0.0, 0.0, start as f32 * 20.0);
        let id = spawn_item(&mut g, debris(start, center + pos, Vec3::ZERO));
        for (v, dt) in steps {
            g.items[id].physics_mut().unwrap().velocity = v;
            prop_assert!(move_item(&mut g, id, dt));
            let item = &g.items[id];
            prop_assert!(
                g.world.cubes[item.cube].is_point_inside(item.pos),
                "item at {:?} outside cube {}", item.pos, item.cube
            );
        }
    }

    #[test]
    fn bags_match_items(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut g = fixture();
        for op in ops {
            match op {
                Op::Spawn(cube, o, v) => {
                    let center = Vec3::new(0.0, 0.0, cube as f32 * 20.0);
                    spawn_item(&mut g, debris(cube, center + o, v));
                }
                Op::Move(i, dt) => {
                    if g.items.get(i).is_some_and(|it| it.in_use) {
                        move_item(&mut g, i, dt);
                    }
                }
                Op::Free(i) => {
                    if i < g.items.len() {
                        free_item(&mut g, i);
                    }
                }
            }
            check_bags(&g)?;
        }
    }

    #[test]
    fn visible_sides_keep_draw_order(
        len in 2usize..7,
        doors in prop::collection::vec(any::<bool>(), 6),
        root in 0usize..7,
    ) {
        let mut b = LevelBuilder::corridor(len, 20.0);
        for (cube, &door) in doors.iter().enumerate().take(len - 1) {
            if door {
                b.add_wall_pair(cube, SIDE_BACK, WallType::Door);
            }
        }
        let g = Game::from_level(&b.build(), GameData::builtin()).unwrap();
        let root = root % len;
        let vis = compute_visibility(&g.world, root, 80.0, VIS_MAX_DEPTH);
        let eye = g.world.cubes[root].center;
        let dist = |refs: &[myd1_common::cworld::SideRef]| -> Vec<f32> {
            refs.iter().map(|r| g.world.side(*r).center.distance2(eye)).collect()
        };
        let solid = dist(&vis.visible_sides);
        let blended = dist(&vis.visible_sides_blended);
        prop_assert!(solid.windows(2).all(|w| w[0] >= w[1]), "solid not far to near: {:?}", solid);
        prop_assert!(blended.windows(2).all(|w| w[0] <= w[1]), "blended not near to far: {:?}", blended);
        prop_assert_eq!(vis.visible_neighbors.first(), Some(&root));
    }
}
