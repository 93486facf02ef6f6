// g_main.rs — game context, level loading and the per-frame loop

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;

use myd1_common::common::{com_dprintf, com_printf, set_developer};
use myd1_common::cvar::{
    CvarContext, CVAR_DEVELOPER, CVAR_PHYS_MAX_BOUNCES, CVAR_VIS_DISTANCE, CVAR_VIS_MAX_DEPTH,
};
use myd1_common::cworld::{SideRef, World};
use myd1_common::dfiles::{read_level, DLevel};
use myd1_common::error::LoadResult;
use myd1_common::vis_queue::VisWorker;

use crate::g_collide::CollisionTable;
use crate::g_local::*;
use crate::g_phys::{move_item, spin_item, PHYS_MAX_BOUNCES};
use crate::g_spawn::{free_item, spawn_level_objects};
use crate::g_tables::GameData;
use crate::g_wall::update_walls;
use crate::g_weapon::fire_weapon;

/// Longest frame the simulation will take in one step.
pub const MAX_FRAME_TIME: f32 = 0.25;
/// Frames in a looping vclip.
const VCLIP_FRAMES: u8 = 8;
const RNG_SEED: u64 = 0x6d79_6431;

// ============================================================
// Game
// ============================================================

/// Everything a running level owns. Items and the world refer to each
/// other by index only.
pub struct Game {
    pub world: World,
    pub items: Vec<Item>,
    pub(crate) free_items: Vec<ItemId>,
    pub data: GameData,
    pub collisions: CollisionTable,
    pub cvars: CvarContext,
    pub events: Vec<GameEvent>,
    pub time: f32,
    pub frame: u64,
    pub rng: StdRng,
    pub vis: Option<VisWorker>,
    pub player: Option<ItemId>,
    pub player_state: PlayerState,
    pub level_state: LevelState,
    /// Item pairs that already collided this frame.
    pub(crate) frame_pairs: HashSet<(ItemId, ItemId)>,
}

impl Game {
    pub fn from_level(level: &DLevel, data: GameData) -> LoadResult<Game> {
        let world = World::from_level(level)?;
        let mut game = Game {
            world,
            items: Vec::with_capacity(level.objects.len()),
            free_items: Vec::new(),
            data,
            collisions: CollisionTable::standard(),
            cvars: CvarContext::with_engine_defaults(),
            events: Vec::new(),
            time: 0.0,
            frame: 0,
            rng: StdRng::seed_from_u64(RNG_SEED),
            vis: None,
            player: None,
            player_state: PlayerState::default(),
            level_state: LevelState::default(),
            frame_pairs: HashSet::new(),
        };
        spawn_level_objects(&mut game, &level.objects)?;
        game.apply_cvars();
        com_printf(&format!(
            "level loaded: {} cubes, {} walls, {} items\n",
            game.world.cubes.len(),
            game.world.walls.len(),
            game.items.len()
        ));
        Ok(game)
    }

    /// Parse and load a binary level with the built-in tables.
    pub fn load(bytes: &[u8]) -> LoadResult<Game> {
        Self::load_with(bytes, GameData::builtin())
    }

    pub fn load_with(bytes: &[u8], data: GameData) -> LoadResult<Game> {
        let level = read_level(bytes)?;
        Self::from_level(&level, data)
    }

    /// Start the background visibility thread and hand it this level.
    pub fn enable_vis_worker(&mut self) -> std::io::Result<()> {
        let mut worker = VisWorker::spawn()?;
        worker.load(&self.world, self.vis_distance(), self.vis_max_depth());
        self.vis = Some(worker);
        Ok(())
    }

    pub fn max_bounces(&self) -> usize {
        let v = self.cvars.variable_value(CVAR_PHYS_MAX_BOUNCES);
        if v >= 1.0 {
            v as usize
        } else {
            PHYS_MAX_BOUNCES
        }
    }

    fn vis_distance(&self) -> f32 {
        self.cvars.variable_value(CVAR_VIS_DISTANCE)
    }

    fn vis_max_depth(&self) -> usize {
        self.cvars.variable_value(CVAR_VIS_MAX_DEPTH).max(1.0) as usize
    }

    pub fn sound(&mut self, sound: u32, pos: Vec3) {
        self.events.push(GameEvent::Sound { sound, pos });
    }

    pub fn kill_item(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(id) {
            item.kill();
        }
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn alive_items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.iter().filter(|i| i.is_alive())
    }

    /// React to changed cvars. Visibility settings restart the worker's
    /// level so later answers use them; results already merged into the
    /// world stay cached.
    pub fn apply_cvars(&mut self) {
        let mut reload_vis = false;
        for name in self.cvars.take_modified() {
            match name.as_str() {
                CVAR_DEVELOPER => set_developer(self.cvars.variable_value(CVAR_DEVELOPER) != 0.0),
                CVAR_VIS_DISTANCE | CVAR_VIS_MAX_DEPTH => reload_vis = true,
                _ => {}
            }
        }
        if reload_vis {
            let (distance, depth) = (self.vis_distance(), self.vis_max_depth());
            if let Some(vis) = self.vis.as_mut() {
                com_dprintf("vis settings changed, reloading worker\n");
                vis.load(&self.world, distance, depth);
            }
        }
    }

    // ============================================================
    // Frame
    // ============================================================

    /// Advance the level by `frame_time` seconds.
    pub fn run_frame(&mut self, frame_time: f32, controls: &PlayerControls) {
        let dt = if frame_time.is_finite() {
            frame_time.clamp(0.0, MAX_FRAME_TIME)
        } else {
            0.0
        };

        self.apply_cvars();
        self.update_visibility();
        self.frame_pairs.clear();

        self.player_input(controls);
        self.update_controls(dt);
        update_walls(self, dt);
        self.move_items(dt);
        self.remove_dead_items();

        self.time += dt;
        self.frame += 1;
    }

    fn update_visibility(&mut self) {
        let Some(vis) = self.vis.as_mut() else {
            return;
        };
        vis.poll(&mut self.world);
        if let Some(cube) = self.player.map(|p| self.items[p].cube) {
            if !self.world.has_visibility(cube) {
                vis.request(cube);
            }
        }
    }

    fn player_input(&mut self, controls: &PlayerControls) {
        let Some(player) = self.player else {
            return;
        };
        if !self.items[player].is_alive() {
            return;
        }
        let ship = self.data.ship.clone();
        let item = &mut self.items[player];
        let orient = item.orient;
        if let Some(phys) = item.physics_mut() {
            let thrust = orient.fvec.scale(controls.forward)
                + orient.rvec.scale(controls.sideways)
                + orient.uvec.scale(controls.vertical);
            phys.thrust = thrust.scale(ship.max_thrust);
            phys.rotthrust = Vec3::new(controls.pitch, controls.heading, controls.bank).scale(ship.max_rotthrust);
        }

        if controls.fire_primary && self.time >= self.player_state.next_fire_time {
            let weapon = self.player_state.primary_weapon;
            let wait = self.data.weapon(weapon).map_or(0.0, |w| w.fire_wait);
            if fire_weapon(self, player, weapon).is_some() {
                self.player_state.next_fire_time = self.time + wait;
            }
        }
    }

    fn update_controls(&mut self, dt: f32) {
        self.world.clear_light();
        let time = self.time;
        for id in 0..self.items.len() {
            if !self.items[id].is_alive() {
                continue;
            }
            let item = &mut self.items[id];
            item.lifeleft -= dt;
            if item.lifeleft <= 0.0 {
                item.kill();
                continue;
            }
            if let Some(clip) = item.render.vclip_mut() {
                clip.advance(dt, VCLIP_FRAMES);
            }

            let (cube, pos) = (item.cube, item.pos);
            let mut expired = false;
            let mut victim = None;
            let mut light = None;
            match &mut item.control {
                ControlInfo::Explosion {
                    delete_time,
                    delete_item,
                    ..
                } => {
                    expired = time >= *delete_time;
                    victim = delete_item.take();
                }
                ControlInfo::Light { intensity } => light = Some(*intensity),
                _ => {}
            }
            if expired {
                item.kill();
            }
            if let Some(victim) = victim {
                self.kill_item(victim);
            }
            if let Some(intensity) = light {
                self.world.add_light(cube, pos, intensity);
            }
        }
    }

    fn move_items(&mut self, dt: f32) {
        for id in 0..self.items.len() {
            if !self.items[id].is_alive() {
                continue;
            }
            match self.items[id].mover {
                Mover::Physics(_) => {
                    if !move_item(self, id, dt) {
                        self.items[id].kill();
                    }
                }
                Mover::Spinning(_) => spin_item(self, id, dt),
                Mover::None => {}
            }
        }
    }

    fn remove_dead_items(&mut self) {
        for id in 0..self.items.len() {
            if self.items[id].in_use && !self.items[id].is_alive() {
                free_item(self, id);
            }
        }
    }

    // ============================================================
    // Render data
    // ============================================================

    /// What to draw from `root`. Before the cube's visibility is known
    /// everything is listed, sorted by distance from the root's centre.
    pub fn render_list(&self, root: usize) -> RenderList {
        let (cubes, sides, blended, complete) = match &self.world.cubes[root].visibility {
            Some(vis) => (
                vis.visible_neighbors.clone(),
                vis.visible_sides.clone(),
                vis.visible_sides_blended.clone(),
                true,
            ),
            None => {
                let (sides, blended) = self.fallback_sides(root);
                ((0..self.world.cubes.len()).collect(), sides, blended, false)
            }
        };
        let items = cubes
            .iter()
            .flat_map(|&c| self.world.cubes[c].objects.iter().copied())
            .filter(|&id| self.items[id].is_alive())
            .collect();
        RenderList {
            root,
            cubes,
            sides,
            blended,
            items,
            complete,
        }
    }

    fn fallback_sides(&self, root: usize) -> (Vec<SideRef>, Vec<SideRef>) {
        let eye = self.world.cubes[root].center;
        let mut solid = Vec::new();
        let mut blended = Vec::new();
        for cube in &self.world.cubes {
            for side in &cube.sides {
                let r = SideRef::new(cube.index, side.index);
                match (side.neighbor, side.wall) {
                    (None, _) => solid.push((side.center.distance2(eye), r)),
                    (Some(_), Some(_)) => blended.push((side.center.distance2(eye), r)),
                    (Some(_), None) => {}
                }
            }
        }
        solid.sort_by(|a, b| b.0.total_cmp(&a.0));
        blended.sort_by(|a, b| a.0.total_cmp(&b.0));
        (
            solid.into_iter().map(|(_, r)| r).collect(),
            blended.into_iter().map(|(_, r)| r).collect(),
        )
    }
}

/// Draw lists for one viewpoint. Solid sides run far to near, blended
/// sides near to far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderList {
    pub root: usize,
    pub cubes: Vec<usize>,
    pub sides: Vec<SideRef>,
    pub blended: Vec<SideRef>,
    pub items: Vec<ItemId>,
    /// False while the root's visibility is still being computed.
    pub complete: bool,
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_spawn::{make_player, spawn_item};
    use myd1_common::builder::LevelBuilder;
    use myd1_common::vis::compute_visibility;
    use myd1_common::vis::VIS_MAX_DEPTH;

    fn game(cubes: usize) -> Game {
        Game::from_level(&LevelBuilder::corridor(cubes, 20.0).build(), GameData::builtin()).unwrap()
    }

    #[test]
    fn test_load_from_bytes() {
        let bytes = myd1_common::dfiles::write_level(&LevelBuilder::corridor(2, 20.0).build());
        let g = Game::load(&bytes).unwrap();
        assert_eq!(g.world.cubes.len(), 2);
        assert!(g.player.is_none());
        assert!(Game::load(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_frame_advances_time() {
        let mut g = game(1);
        g.run_frame(0.1, &PlayerControls::default());
        g.run_frame(5.0, &PlayerControls::default());
        g.run_frame(f32::NAN, &PlayerControls::default());
        assert_eq!(g.frame, 3);
        assert!((g.time - (0.1 + MAX_FRAME_TIME)).abs() < 1e-6);
    }

    #[test]
    fn test_thrust_moves_player() {
        let mut g = game(3);
        let data = g.data.clone();
        let player = spawn_item(&mut g, make_player(&data, 0, Vec3::ZERO));
        g.player = Some(player);
        let controls = PlayerControls {
            forward: 1.0,
            ..Default::default()
        };
        for _ in 0..10 {
            g.run_frame(0.1, &controls);
        }
        let item = &g.items[player];
        assert!(item.pos.z > 0.0);
        assert!(g.world.cubes[item.cube].is_point_inside(item.pos));
    }

    #[test]
    fn test_fire_respects_wait() {
        let mut g = game(3);
        let data = g.data.clone();
        let player = spawn_item(&mut g, make_player(&data, 0, Vec3::ZERO));
        g.player = Some(player);
        let controls = PlayerControls {
            fire_primary: true,
            ..Default::default()
        };
        g.run_frame(0.01, &controls);
        g.run_frame(0.01, &controls);
        let shots = g.alive_items().filter(|i| i.item_type == ItemType::Weapon).count();
        assert_eq!(shots, 1);
    }

    #[test]
    fn test_explosion_expires() {
        let mut g = game(1);
        let id = crate::g_weapon::spawn_explosion(&mut g, 0, Vec3::ZERO, 2.0, None);
        g.run_frame(0.2, &PlayerControls::default());
        assert!(g.items[id].is_alive());
        for _ in 0..3 {
            g.run_frame(0.2, &PlayerControls::default());
        }
        assert!(!g.items[id].in_use);
        assert!(g.drain_events().iter().any(|e| matches!(e, GameEvent::ItemRemoved { item, .. } if *item == id)));
        assert!(g.events.is_empty());
    }

    #[test]
    fn test_bounce_limit_cvar() {
        let mut g = game(1);
        assert_eq!(g.max_bounces(), PHYS_MAX_BOUNCES);
        g.cvars.set(CVAR_PHYS_MAX_BOUNCES, "5");
        assert_eq!(g.max_bounces(), 5);
        g.cvars.set(CVAR_PHYS_MAX_BOUNCES, "0");
        assert_eq!(g.max_bounces(), PHYS_MAX_BOUNCES);
    }

    #[test]
    fn test_render_list_fallback_then_cached() {
        let mut g = game(3);
        let fallback = g.render_list(0);
        assert!(!fallback.complete);
        assert_eq!(fallback.cubes, vec![0, 1, 2]);
        let eye = g.world.cubes[0].center;
        let d: Vec<f32> = fallback.sides.iter().map(|r| g.world.side(*r).center.distance2(eye)).collect();
        assert!(d.windows(2).all(|w| w[0] >= w[1]));

        let vis = compute_visibility(&g.world, 0, 80.0, VIS_MAX_DEPTH);
        g.world.set_visibility(0, vis.clone());
        let cached = g.render_list(0);
        assert!(cached.complete);
        assert_eq!(cached.sides, vis.visible_sides);
    }
}
