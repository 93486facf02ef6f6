// vis_queue.rs — visibility worker thread
//
// The solver runs on its own thread with its own copy of the level geometry.
// The game thread sends one Load per level and a GetVisibility per cube it
// needs; answers come back as plain messages and are merged into the world
// whenever the game polls. Nothing is shared but the channels and a stats
// block.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::common::{com_dprintf, com_printf};
use crate::cworld::{CubeVisibility, GeometrySnapshot, SideRef, World};
use crate::vis::compute_visibility;

// ============================================================
// Protocol
// ============================================================

pub enum VisRequest {
    Load {
        level: GeometrySnapshot,
        distance_threshold: f32,
        max_depth: usize,
    },
    GetVisibility(usize),
    Shutdown,
}

/// One cube's result with sides flattened to (cube, side) pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityMessage {
    pub checksum: u32,
    pub cube_index: usize,
    pub visible_neighbors: Vec<usize>,
    pub lighting_neighbors: Vec<usize>,
    pub visible_sides: Vec<(usize, usize)>,
    pub visible_sides_blended: Vec<(usize, usize)>,
}

impl VisibilityMessage {
    pub fn from_visibility(checksum: u32, cube_index: usize, vis: &CubeVisibility) -> Self {
        let flatten = |v: &[SideRef]| -> Vec<(usize, usize)> { v.iter().map(|r| (r.cube, r.side)).collect() };
        Self {
            checksum,
            cube_index,
            visible_neighbors: vis.visible_neighbors.clone(),
            lighting_neighbors: vis.lighting_neighbors.clone(),
            visible_sides: flatten(&vis.visible_sides),
            visible_sides_blended: flatten(&vis.visible_sides_blended),
        }
    }

    pub fn into_visibility(self) -> CubeVisibility {
        let rewrap = |v: Vec<(usize, usize)>| -> Vec<SideRef> { v.into_iter().map(|(c, s)| SideRef::new(c, s)).collect() };
        CubeVisibility {
            visible_neighbors: self.visible_neighbors,
            lighting_neighbors: self.lighting_neighbors,
            visible_sides: rewrap(self.visible_sides),
            visible_sides_blended: rewrap(self.visible_sides_blended),
        }
    }

    /// Every index in range for a world of `cubes` cubes.
    fn is_valid_for(&self, cubes: usize) -> bool {
        self.cube_index < cubes
            && self.visible_neighbors.iter().all(|&c| c < cubes)
            && self.lighting_neighbors.iter().all(|&c| c < cubes)
            && self
                .visible_sides
                .iter()
                .chain(self.visible_sides_blended.iter())
                .all(|&(c, s)| c < cubes && s < 6)
    }
}

pub enum VisResponse {
    SetVisibility(VisibilityMessage),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisStats {
    pub requested: u64,
    pub computed: u64,
    pub merged: u64,
    /// Responses for another level or already-cached cubes.
    pub ignored: u64,
}

// ============================================================
// Worker thread
// ============================================================

struct WorkerLevel {
    world: World,
    distance_threshold: f32,
    max_depth: usize,
}

fn worker_loop(requests: Receiver<VisRequest>, responses: Sender<VisResponse>, stats: Arc<Mutex<VisStats>>) {
    let mut level: Option<WorkerLevel> = None;

    for req in requests.iter() {
        match req {
            VisRequest::Load {
                level: snap,
                distance_threshold,
                max_depth,
            } => {
                level = match World::from_snapshot(&snap) {
                    Ok(world) => {
                        com_dprintf(&format!("vis worker: loaded {} cubes\n", world.cubes.len()));
                        Some(WorkerLevel {
                            world,
                            distance_threshold,
                            max_depth,
                        })
                    }
                    Err(e) => {
                        com_printf(&format!("vis worker: bad snapshot: {}\n", e));
                        None
                    }
                };
            }
            VisRequest::GetVisibility(cube) => {
                let Some(lvl) = level.as_ref() else {
                    com_dprintf(&format!("vis worker: request for cube {} with no level\n", cube));
                    continue;
                };
                if cube >= lvl.world.cubes.len() {
                    continue;
                }
                let vis = compute_visibility(&lvl.world, cube, lvl.distance_threshold, lvl.max_depth);
                stats.lock().computed += 1;
                let msg = VisibilityMessage::from_visibility(lvl.world.checksum, cube, &vis);
                if responses.send(VisResponse::SetVisibility(msg)).is_err() {
                    break;
                }
            }
            VisRequest::Shutdown => break,
        }
    }
}

// ============================================================
// Game-side handle
// ============================================================

pub struct VisWorker {
    requests: Sender<VisRequest>,
    responses: Receiver<VisResponse>,
    pending: HashSet<usize>,
    checksum: u32,
    stats: Arc<Mutex<VisStats>>,
    handle: Option<JoinHandle<()>>,
}

impl VisWorker {
    pub fn spawn() -> std::io::Result<Self> {
        let (req_tx, req_rx) = unbounded();
        let (resp_tx, resp_rx) = unbounded();
        let stats = Arc::new(Mutex::new(VisStats::default()));
        let worker_stats = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name("vis-worker".to_string())
            .spawn(move || worker_loop(req_rx, resp_tx, worker_stats))?;
        Ok(Self {
            requests: req_tx,
            responses: resp_rx,
            pending: HashSet::new(),
            checksum: 0,
            stats,
            handle: Some(handle),
        })
    }

    /// Hand the worker a new level. Requests for the previous level are
    /// forgotten; their late answers will fail the checksum test.
    pub fn load(&mut self, world: &World, distance_threshold: f32, max_depth: usize) {
        self.pending.clear();
        self.checksum = world.checksum;
        let _ = self.requests.send(VisRequest::Load {
            level: world.snapshot(),
            distance_threshold,
            max_depth,
        });
    }

    /// Ask for a cube's visibility. Returns false if it is already pending.
    pub fn request(&mut self, cube: usize) -> bool {
        if !self.pending.insert(cube) {
            return false;
        }
        self.stats.lock().requested += 1;
        if self.requests.send(VisRequest::GetVisibility(cube)).is_err() {
            self.pending.remove(&cube);
            return false;
        }
        true
    }

    pub fn is_pending(&self, cube: usize) -> bool {
        self.pending.contains(&cube)
    }

    fn merge(&mut self, world: &mut World, resp: VisResponse) -> bool {
        let VisResponse::SetVisibility(msg) = resp;
        let cube = msg.cube_index;
        if msg.checksum != self.checksum || msg.checksum != world.checksum || !msg.is_valid_for(world.cubes.len()) {
            self.stats.lock().ignored += 1;
            return false;
        }
        self.pending.remove(&cube);
        if world.set_visibility(cube, msg.into_visibility()) {
            self.stats.lock().merged += 1;
            true
        } else {
            self.stats.lock().ignored += 1;
            false
        }
    }

    /// Merge every answer that has arrived. Never blocks.
    pub fn poll(&mut self, world: &mut World) -> usize {
        let mut merged = 0;
        while let Ok(resp) = self.responses.try_recv() {
            if self.merge(world, resp) {
                merged += 1;
            }
        }
        merged
    }

    /// Wait up to `timeout` for at least one answer, then drain. For tools
    /// and tests; the frame loop uses `poll`.
    pub fn poll_blocking(&mut self, world: &mut World, timeout: Duration) -> usize {
        let mut merged = 0;
        match self.responses.recv_timeout(timeout) {
            Ok(resp) => {
                if self.merge(world, resp) {
                    merged += 1;
                }
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return 0,
        }
        merged + self.poll(world)
    }

    pub fn stats(&self) -> VisStats {
        *self.stats.lock()
    }

    pub fn shutdown(&mut self) {
        let _ = self.requests.send(VisRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                com_printf("vis worker panicked\n");
            }
        }
    }
}

impl Drop for VisWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LevelBuilder;
    use crate::vis::VIS_MAX_DEPTH;

    fn corridor(n: usize) -> World {
        World::from_level(&LevelBuilder::corridor(n, 20.0).build()).unwrap()
    }

    fn wait_for(worker: &mut VisWorker, world: &mut World, cube: usize) {
        for _ in 0..200 {
            worker.poll_blocking(world, Duration::from_millis(25));
            if world.has_visibility(cube) {
                return;
            }
        }
        panic!("no visibility for cube {}", cube);
    }

    #[test]
    fn test_message_conversion_keeps_sides() {
        let vis = CubeVisibility {
            visible_neighbors: vec![0, 1],
            lighting_neighbors: vec![0],
            visible_sides: vec![SideRef::new(1, 4), SideRef::new(0, 2)],
            visible_sides_blended: vec![SideRef::new(0, 4)],
        };
        let msg = VisibilityMessage::from_visibility(7, 0, &vis);
        assert_eq!(msg.visible_sides, vec![(1, 4), (0, 2)]);
        assert!(msg.is_valid_for(2));
        assert!(!msg.is_valid_for(1));
        assert_eq!(msg.into_visibility(), vis);
    }

    #[test]
    fn test_worker_answers_and_dedups() {
        let mut world = corridor(3);
        let mut worker = VisWorker::spawn().unwrap();
        worker.load(&world, 80.0, VIS_MAX_DEPTH);

        assert!(worker.request(1));
        assert!(!worker.request(1), "second request while pending is dropped");
        assert!(worker.is_pending(1));
        wait_for(&mut worker, &mut world, 1);

        assert!(!worker.is_pending(1));
        let expected = compute_visibility(&world, 1, 80.0, VIS_MAX_DEPTH);
        assert_eq!(world.cubes[1].visibility.as_ref(), Some(&expected));
        let stats = worker.stats();
        assert_eq!(stats.requested, 1);
        assert_eq!(stats.merged, 1);
    }

    #[test]
    fn test_duplicate_answer_ignored() {
        let mut world = corridor(2);
        let mut worker = VisWorker::spawn().unwrap();
        worker.load(&world, 80.0, VIS_MAX_DEPTH);
        let first = CubeVisibility {
            visible_neighbors: vec![0],
            ..Default::default()
        };
        world.set_visibility(0, first.clone());
        worker.request(0);
        for _ in 0..200 {
            worker.poll_blocking(&mut world, Duration::from_millis(25));
            if worker.stats().ignored > 0 {
                break;
            }
        }
        assert_eq!(worker.stats().ignored, 1);
        assert_eq!(world.cubes[0].visibility.as_ref(), Some(&first));
    }

    #[test]
    fn test_stale_level_ignored() {
        let mut old = corridor(2);
        let mut new = corridor(4);
        let mut worker = VisWorker::spawn().unwrap();
        worker.load(&old, 80.0, VIS_MAX_DEPTH);
        worker.request(0);
        // switch levels before the answer is merged
        worker.load(&new, 80.0, VIS_MAX_DEPTH);
        worker.request(3);
        wait_for(&mut worker, &mut new, 3);
        assert!(!new.has_visibility(0));
        assert_eq!(worker.stats().ignored, 1);
        assert!(!old.has_visibility(0));
        assert_eq!(worker.poll(&mut old), 0);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut worker = VisWorker::spawn().unwrap();
        worker.shutdown();
        worker.shutdown();
        assert!(!worker.request(0));
        assert!(!worker.is_pending(0));
    }
}
