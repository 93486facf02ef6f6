#![allow(clippy::too_many_arguments, clippy::manual_range_contains, clippy::float_cmp,
         clippy::needless_range_loop, clippy::new_without_default)]

pub mod d_shared;
pub mod geometry;
pub mod bitmap;
pub mod error;
pub mod common;
pub mod crc;
pub mod cvar;
pub mod walls;
pub mod dfiles;
pub mod cworld;
pub mod builder;
pub mod vis;
pub mod vis_queue;
