// g_spawn.rs — turning level objects into items, and the cube bag protocol
//
// An item is always in exactly one cube's object bag, at the slot recorded
// in `cube_index`. Every add, remove and move of an item goes through
// link_item / unlink_item so that stays true.

use myd1_common::common::com_dprintf;
use myd1_common::dfiles::*;
use myd1_common::error::{LoadError, LoadResult};

use crate::g_local::*;
use crate::g_main::Game;
use crate::g_tables::GameData;

// ============================================================
// Object records
// ============================================================

fn mover_from(movement: &DMovement) -> Mover {
    match *movement {
        DMovement::None => Mover::None,
        DMovement::Physics {
            velocity,
            thrust,
            mass,
            drag,
            rotvel,
            rotthrust,
            turnroll,
            flags,
        } => Mover::Physics(PhysicsInfo {
            velocity,
            thrust,
            mass,
            drag,
            rotvel,
            rotthrust,
            turnroll,
            flags: PhysicsFlags::from_bits_truncate(flags),
        }),
        DMovement::Spinning { spin_rate } => Mover::Spinning(SpinInfo { spin_rate }),
    }
}

fn control_from(control_type: u8, control: &DControl) -> LoadResult<ControlInfo> {
    Ok(match (control_type, control) {
        (CT_NONE, _) => ControlInfo::None,
        (CT_AI, &DControl::Ai { behavior }) => ControlInfo::Ai { behavior },
        (
            CT_EXPLOSION,
            &DControl::Explosion {
                spawn_time,
                delete_time,
                delete_obj,
            },
        ) => ControlInfo::Explosion {
            spawn_time,
            delete_time,
            delete_item: delete_obj,
        },
        (CT_FLYING, _) => ControlInfo::Flying,
        (CT_SLEW, _) => ControlInfo::Slew,
        (CT_FLARE, _) => ControlInfo::Flare,
        (CT_WEAPON, &DControl::Weapon { parent }) => ControlInfo::Weapon { parent },
        (CT_REPAIRCEN, _) => ControlInfo::RepairCenter,
        (CT_MORPH, _) => ControlInfo::Morph,
        (CT_DEBRIS, _) => ControlInfo::Debris,
        (CT_POWERUP, &DControl::Powerup { count }) => ControlInfo::Powerup { count },
        (CT_LIGHT, &DControl::Light { intensity }) => ControlInfo::Light { intensity },
        (CT_REMOTE, _) => ControlInfo::Remote,
        (CT_CNTRLCEN, _) => ControlInfo::ControlCenter,
        (t, _) => return Err(LoadError::UnknownControlType(t)),
    })
}

fn render_from(render_type: u8, render: &DRender) -> LoadResult<RenderInfo> {
    let vclip = match *render {
        DRender::Vclip {
            vclip,
            frametime,
            framenum,
        } => Some(VClipInfo {
            vclip,
            frametime,
            framenum,
            frame_elapsed: 0.0,
        }),
        _ => None,
    };
    Ok(match (render_type, render, vclip) {
        (RT_NONE, _, _) => RenderInfo::None,
        (
            RT_POLYOBJ,
            &DRender::Polyobj {
                model,
                subobj_flags,
                tmap_override,
            },
            _,
        ) => RenderInfo::Polyobj {
            model,
            subobj_flags,
            tmap_override,
        },
        (RT_FIREBALL, _, Some(v)) => RenderInfo::Fireball(v),
        (RT_LASER, _, _) => RenderInfo::Laser,
        (RT_HOSTAGE, _, Some(v)) => RenderInfo::Hostage(v),
        (RT_POWERUP, _, Some(v)) => RenderInfo::Powerup(v),
        (RT_MORPH, _, _) => RenderInfo::Morph,
        (RT_WEAPON_VCLIP, _, Some(v)) => RenderInfo::WeaponVclip(v),
        (t, _, _) => return Err(LoadError::UnknownRenderType(t)),
    })
}

/// Build an item from a level object. The id and bag slot are filled in
/// when it is spawned.
pub fn item_from_object(obj: &DObject, data: &GameData) -> LoadResult<Item> {
    let item_type = ItemType::from_tag(obj.obj_type).ok_or(LoadError::UnknownItemType(obj.obj_type))?;
    if !data.has_info(item_type, obj.id) {
        return Err(LoadError::InvalidItemId {
            item_type: obj.obj_type,
            id: obj.id,
        });
    }
    if !(obj.pos.x.is_finite() && obj.pos.y.is_finite() && obj.pos.z.is_finite()) {
        return Err(LoadError::NonFinite("object position"));
    }
    if !obj.size.is_finite() || obj.size < 0.0 {
        return Err(LoadError::NonFinite("object size"));
    }

    let control = control_from(obj.control_type, &obj.control)?;
    let mut item = Item::new(item_type, obj.id, obj.cube, obj.pos, obj.size);
    item.orient = obj.orient;
    item.shields = obj.shields;
    item.flags = ItemFlags::from_bits_truncate(obj.flags);
    item.mover = mover_from(&obj.movement);
    item.render = render_from(obj.render_type, &obj.render)?;
    if let ControlInfo::Weapon { parent } = control {
        item.parent = parent;
    }
    item.control = control;

    if item_type == ItemType::Player {
        if let Mover::None = item.mover {
            item.mover = Mover::Physics(player_physics(data));
        }
    }
    if item_type == ItemType::Weapon {
        if let Some(w) = data.weapon(obj.id) {
            item.lifeleft = w.lifetime;
        }
    }
    Ok(item)
}

pub fn player_physics(data: &GameData) -> PhysicsInfo {
    PhysicsInfo {
        mass: data.ship.mass,
        drag: data.ship.drag,
        flags: PhysicsFlags::TURNROLL | PhysicsFlags::LEVELLING | PhysicsFlags::USES_THRUST,
        ..Default::default()
    }
}

/// A player ship at `pos` with stock physics.
pub fn make_player(data: &GameData, cube: usize, pos: Vec3) -> Item {
    let mut item = Item::new(ItemType::Player, 0, cube, pos, data.ship.size);
    item.shields = data.ship.max_shields * 0.5;
    item.mover = Mover::Physics(player_physics(data));
    item.render = RenderInfo::Polyobj {
        model: 43,
        subobj_flags: 0,
        tmap_override: None,
    };
    item
}

// ============================================================
// Bags
// ============================================================

/// Put `id` into the bag of the cube it names.
pub fn link_item(game: &mut Game, id: ItemId) {
    let cube = game.items[id].cube;
    game.items[id].cube_index = game.world.cubes[cube].link(id);
}

pub fn unlink_item(game: &mut Game, id: ItemId) {
    let (cube, slot) = (game.items[id].cube, game.items[id].cube_index);
    debug_assert_eq!(
        game.world.cubes[cube].objects.get(slot).copied(),
        Some(id),
        "item {} not at its bag slot",
        id
    );
    if let Some(moved) = game.world.cubes[cube].unlink(slot) {
        game.items[moved].cube_index = slot;
    }
}

/// Move `id` into `cube`'s bag if it is not already there.
pub fn relink_item(game: &mut Game, id: ItemId, cube: usize) {
    if game.items[id].cube == cube {
        return;
    }
    unlink_item(game, id);
    game.items[id].cube = cube;
    link_item(game, id);
}

/// Give `item` a slot in the item list and link it into its cube.
pub fn spawn_item(game: &mut Game, mut item: Item) -> ItemId {
    item.in_use = true;
    let id = match game.free_items.pop() {
        Some(id) => {
            item.id = id;
            game.items[id] = item;
            id
        }
        None => {
            item.id = game.items.len();
            game.items.push(item);
            game.items.len() - 1
        }
    };
    link_item(game, id);
    id
}

/// Unlink and release a slot. The slot is reused by later spawns.
pub fn free_item(game: &mut Game, id: ItemId) {
    if !game.items[id].in_use {
        return;
    }
    unlink_item(game, id);
    let item = &mut game.items[id];
    item.in_use = false;
    let item_type = item.item_type;
    game.free_items.push(id);
    if game.player == Some(id) {
        game.player = None;
    }
    game.events.push(GameEvent::ItemRemoved { item: id, item_type });
}

/// Spawn every object of a freshly loaded level, in file order so object
/// indices and item ids agree.
pub fn spawn_level_objects(game: &mut Game, objects: &[DObject]) -> LoadResult<()> {
    let cubes = game.world.cubes.len();
    for obj in objects {
        if obj.cube >= cubes {
            return Err(LoadError::BadCubeIndex {
                index: obj.cube,
                count: cubes,
            });
        }
        let mut item = item_from_object(obj, &game.data)?;
        if !game.world.cubes[item.cube].is_point_inside(item.pos) {
            match game.world.find_cube(item.pos, Some(item.cube)) {
                Some(c) => item.cube = c,
                None => com_dprintf(&format!(
                    "object type {} at {:?} outside cube {}\n",
                    obj.obj_type, obj.pos, obj.cube
                )),
            }
        }
        let is_player = item.item_type == ItemType::Player;
        let id = spawn_item(game, item);
        if is_player && game.player.is_none() {
            game.player = Some(id);
        }
    }
    Ok(())
}

// ============================================================
// Tests
// ============================================================
