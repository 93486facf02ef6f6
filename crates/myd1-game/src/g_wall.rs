// g_wall.rs — doors, blastable walls, triggers and texture swaps

use myd1_common::common::com_dprintf;
use myd1_common::dfiles::TEX2_INDEX_MASK;
use myd1_common::walls::{
    TriggerFlags, TriggerType, WallFlags, WallState, WallType, DOOR_MOVE_TIME, DOOR_WAIT_TIME,
};

use crate::g_local::*;
use crate::g_main::Game;
use crate::g_tables::{SOUND_DOOR_LOCKED, SOUND_WALL_REMOVED};

// ============================================================
// Doors
// ============================================================

/// The wall and its partner on the other face, if linked.
fn wall_and_link(game: &Game, wall: usize) -> Vec<usize> {
    let mut walls = vec![wall];
    if let Some(l) = game.world.walls[wall].linked_wall {
        if l != wall && l < game.world.walls.len() {
            walls.push(l);
        }
    }
    walls
}

fn wall_at(game: &Game, cube: usize, side: usize) -> Option<usize> {
    game.world.cubes.get(cube)?.sides.get(side)?.wall
}

pub fn open_door(game: &mut Game, wall: usize) {
    for w in wall_and_link(game, wall) {
        let door = &mut game.world.walls[w];
        if door.wall_type != WallType::Door {
            continue;
        }
        match door.state {
            WallState::Closed => {
                door.state = WallState::Opening;
                door.open_time = 0.0;
            }
            // reverse from wherever it got to
            WallState::Closing => {
                door.state = WallState::Opening;
                door.open_time = (DOOR_MOVE_TIME - door.open_time).max(0.0);
            }
            WallState::Opening | WallState::Open => {}
        }
    }
}

pub fn close_door(game: &mut Game, wall: usize) {
    for w in wall_and_link(game, wall) {
        let door = &mut game.world.walls[w];
        if door.wall_type == WallType::Door && door.state == WallState::Open {
            door.state = WallState::Closing;
            door.open_time = 0.0;
        }
    }
}

/// Something is sitting in the doorway.
fn door_is_obstructed(game: &Game, wall: usize) -> bool {
    let door = &game.world.walls[wall];
    let side = &game.world.cubes[door.cube].sides[door.side];
    let mut cubes = vec![door.cube];
    cubes.extend(side.neighbor);
    cubes.iter().any(|&c| {
        game.world.cubes[c].objects.iter().any(|&id| {
            let item = &game.items[id];
            item.is_alive()
                && item.item_type != ItemType::Fireball
                && side.triangles.iter().any(|t| t.distance_to(item.pos).abs() < item.size)
        })
    })
}

/// Advance every door's timer.
pub fn update_walls(game: &mut Game, frame_time: f32) {
    for w in 0..game.world.walls.len() {
        if game.world.walls[w].wall_type != WallType::Door {
            continue;
        }
        let state = game.world.walls[w].state;
        match state {
            WallState::Opening => {
                let door = &mut game.world.walls[w];
                door.open_time += frame_time;
                if door.open_time >= DOOR_MOVE_TIME {
                    door.state = WallState::Open;
                    door.open_time = 0.0;
                    door.flags.insert(WallFlags::DOOR_OPENED);
                    game.events.push(GameEvent::WallOpened { wall: w });
                }
            }
            WallState::Open => {
                if !game.world.walls[w].flags.contains(WallFlags::DOOR_AUTO) {
                    continue;
                }
                game.world.walls[w].open_time += frame_time;
                if game.world.walls[w].open_time >= DOOR_WAIT_TIME && !door_is_obstructed(game, w) {
                    let door = &mut game.world.walls[w];
                    door.state = WallState::Closing;
                    door.open_time = 0.0;
                }
            }
            WallState::Closing => {
                let door = &mut game.world.walls[w];
                door.open_time += frame_time;
                if door.open_time >= DOOR_MOVE_TIME {
                    door.state = WallState::Closed;
                    door.open_time = 0.0;
                    door.flags.remove(WallFlags::DOOR_OPENED);
                }
            }
            WallState::Closed => {}
        }
    }
}

/// A player ran into (cube, side). Doors open if the player has the keys.
pub fn bump_wall(game: &mut Game, item: ItemId, cube: usize, side: usize) {
    if game.items[item].item_type != ItemType::Player {
        return;
    }
    let Some(w) = wall_at(game, cube, side) else {
        return;
    };
    let door = &game.world.walls[w];
    if door.wall_type != WallType::Door || door.state != WallState::Closed {
        return;
    }
    let locked = door.flags.contains(WallFlags::DOOR_LOCKED) || !game.player_state.keys.contains(door.keys);
    if locked {
        let pos = game.items[item].pos;
        game.sound(SOUND_DOOR_LOCKED, pos);
        return;
    }
    open_door(game, w);
}

// ============================================================
// Damage and textures
// ============================================================

/// Shots hitting (cube, side). Blastable walls come down when out of hit
/// points.
pub fn damage_wall(game: &mut Game, cube: usize, side: usize, damage: f32) {
    let Some(w) = wall_at(game, cube, side) else {
        return;
    };
    let wall = &mut game.world.walls[w];
    if wall.wall_type != WallType::Blastable || wall.flags.contains(WallFlags::BLASTED) {
        return;
    }
    wall.hps -= damage;
    if wall.hps > 0.0 {
        return;
    }
    for l in wall_and_link(game, w) {
        game.world.walls[l].flags.insert(WallFlags::BLASTED);
        game.events.push(GameEvent::WallOpened { wall: l });
    }
    let center = game.world.cubes[cube].sides[side].center;
    game.sound(SOUND_WALL_REMOVED, center);
    com_dprintf(&format!("wall {} blasted\n", w));
}

/// Replace a shot-out texture with its destroyed version. Returns whether
/// anything changed.
pub fn swap_destroyed_texture(game: &mut Game, cube: usize, side: usize) -> bool {
    let s = &game.world.cubes[cube].sides[side];
    let (tex1, tex2) = (s.tex1, s.tex2);
    let (new1, new2) = if s.has_overlay() {
        match game.data.destroyed_textures.get(&s.tex2_index()) {
            Some(&d) => (tex1, (tex2 & !TEX2_INDEX_MASK) | (d & TEX2_INDEX_MASK)),
            None => return false,
        }
    } else {
        match game.data.destroyed_textures.get(&tex1) {
            Some(&d) => (d, tex2),
            None => return false,
        }
    };
    let s = &mut game.world.cubes[cube].sides[side];
    s.tex1 = new1;
    s.tex2 = new2;
    game.events.push(GameEvent::TextureChanged {
        cube,
        side,
        tex1: new1,
        tex2: new2,
    });
    true
}

// ============================================================
// Triggers
// ============================================================

/// `item` crossed (cube, side). Players set off the wall's trigger.
pub fn check_trigger(game: &mut Game, cube: usize, side: usize, item: ItemId) {
    if game.items[item].item_type != ItemType::Player {
        return;
    }
    let Some(w) = wall_at(game, cube, side) else {
        return;
    };
    let Some(t) = game.world.walls[w].trigger else {
        return;
    };
    let Some(trigger) = game.world.triggers.get(t) else {
        return;
    };
    if !trigger.is_enabled() {
        return;
    }
    let trigger_type = trigger.trigger_type;
    let links = trigger.links.clone();
    let targets: Vec<usize> = links.iter().filter_map(|&(c, s)| wall_at(game, c, s)).collect();

    match trigger_type {
        TriggerType::OpenDoor => targets.iter().for_each(|&tw| open_door(game, tw)),
        TriggerType::CloseDoor => targets.iter().for_each(|&tw| close_door(game, tw)),
        TriggerType::IllusionOff | TriggerType::IllusionOn => {
            for &tw in &targets {
                for l in wall_and_link(game, tw) {
                    game.world.walls[l]
                        .flags
                        .set(WallFlags::ILLUSION_OFF, trigger_type == TriggerType::IllusionOff);
                }
            }
        }
        TriggerType::Exit => game.level_state.exit = Some(LevelExit::Normal),
        TriggerType::SecretExit => game.level_state.exit = Some(LevelExit::Secret),
        // robot generators aren't simulated; the trigger still fires
        TriggerType::Matcen => com_dprintf(&format!("check_trigger: matcen trigger {} has no generator\n", t)),
    }

    let trigger = &mut game.world.triggers[t];
    if trigger.flags.contains(TriggerFlags::ONE_SHOT) {
        trigger.flags.insert(TriggerFlags::DISABLED);
    }
    game.events.push(GameEvent::Trigger { trigger: t, item });
}

// ============================================================
// Tests
// ============================================================
