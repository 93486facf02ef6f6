#![allow(clippy::too_many_arguments, clippy::float_cmp, clippy::needless_range_loop,
         clippy::new_without_default, clippy::collapsible_if)]

pub mod g_local;
pub mod g_tables;
pub mod g_spawn;
pub mod g_collide;
pub mod g_weapon;
pub mod g_wall;
pub mod g_phys;
pub mod g_main;

pub use g_local::{GameEvent, Item, ItemId, ItemType, PlayerControls};
pub use g_main::{Game, RenderList};
pub use g_tables::GameData;
