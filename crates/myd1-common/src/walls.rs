// walls.rs — wall and trigger records attached to cube sides
//
// These are the static records loaded with the level. The gameplay side
// (door timers, blasting, trigger firing) lives in the game crate.

use bitflags::bitflags;

// ============================================================
// Walls
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WallType {
    Normal,
    Blastable,
    Door,
    Illusion,
    Open,
    Closed,
    Overlay,
    Cloaked,
}

impl WallType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => WallType::Normal,
            1 => WallType::Blastable,
            2 => WallType::Door,
            3 => WallType::Illusion,
            4 => WallType::Open,
            5 => WallType::Closed,
            6 => WallType::Overlay,
            7 => WallType::Cloaked,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WallState {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

impl WallState {
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            1 => WallState::Opening,
            2 => WallState::Open,
            3 => WallState::Closing,
            _ => WallState::Closed,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WallFlags: u8 {
        const BLASTED      = 0x01;
        const DOOR_OPENED  = 0x02;
        const DOOR_LOCKED  = 0x08;
        const DOOR_AUTO    = 0x10;
        const ILLUSION_OFF = 0x20;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WallKeys: u8 {
        const BLUE = 0x02;
        const RED  = 0x04;
        const GOLD = 0x08;
    }
}

/// Seconds a door takes to open or close.
pub const DOOR_MOVE_TIME: f32 = 1.0;
/// Seconds an auto door stays open.
pub const DOOR_WAIT_TIME: f32 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Wall {
    pub cube: usize,
    pub side: usize,
    pub wall_type: WallType,
    pub state: WallState,
    pub flags: WallFlags,
    pub hps: f32,
    pub trigger: Option<usize>,
    pub linked_wall: Option<usize>,
    pub keys: WallKeys,
    /// Time spent in the current Opening/Open/Closing state.
    pub open_time: f32,
}

impl Wall {
    pub fn new(cube: usize, side: usize, wall_type: WallType) -> Self {
        Self {
            cube,
            side,
            wall_type,
            state: WallState::Closed,
            flags: WallFlags::empty(),
            hps: 0.0,
            trigger: None,
            linked_wall: None,
            keys: WallKeys::empty(),
            open_time: 0.0,
        }
    }

    /// Whether an item can move through the side this wall sits on.
    pub fn is_passable(&self) -> bool {
        match self.wall_type {
            WallType::Open | WallType::Illusion => true,
            WallType::Blastable => self.flags.contains(WallFlags::BLASTED),
            WallType::Door => self.state == WallState::Open,
            _ => false,
        }
    }

    /// Whether the portal behind this wall can be seen through at all.
    pub fn is_see_through(&self) -> bool {
        match self.wall_type {
            WallType::Open | WallType::Illusion | WallType::Cloaked => true,
            WallType::Blastable => self.flags.contains(WallFlags::BLASTED),
            WallType::Door => self.state != WallState::Closed,
            _ => false,
        }
    }
}

// ============================================================
// Triggers
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerType {
    OpenDoor,
    CloseDoor,
    Exit,
    SecretExit,
    IllusionOff,
    IllusionOn,
    Matcen,
}

impl TriggerType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => TriggerType::OpenDoor,
            1 => TriggerType::CloseDoor,
            2 => TriggerType::Exit,
            3 => TriggerType::SecretExit,
            4 => TriggerType::IllusionOff,
            5 => TriggerType::IllusionOn,
            6 => TriggerType::Matcen,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct TriggerFlags: u16 {
        /// Fires once, then disables itself.
        const ONE_SHOT = 0x01;
        const DISABLED = 0x02;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub trigger_type: TriggerType,
    pub flags: TriggerFlags,
    pub value: f32,
    pub time: f32,
    /// (cube, side) pairs acted on.
    pub links: Vec<(usize, usize)>,
}

impl Trigger {
    pub fn new(trigger_type: TriggerType) -> Self {
        Self {
            trigger_type,
            flags: TriggerFlags::empty(),
            value: 0.0,
            time: 0.0,
            links: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.flags.contains(TriggerFlags::DISABLED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_type_tags() {
        for tag in 0..8u8 {
            assert_eq!(WallType::from_tag(tag).unwrap().tag(), tag);
        }
        assert!(WallType::from_tag(8).is_none());
        assert!(TriggerType::from_tag(7).is_none());
        assert_eq!(TriggerType::from_tag(2), Some(TriggerType::Exit));
    }

    #[test]
    fn test_door_passability_follows_state() {
        let mut w = Wall::new(0, 1, WallType::Door);
        assert!(!w.is_passable());
        assert!(!w.is_see_through());
        w.state = WallState::Opening;
        assert!(!w.is_passable());
        assert!(w.is_see_through());
        w.state = WallState::Open;
        assert!(w.is_passable());
    }

    #[test]
    fn test_blastable_and_illusion() {
        let mut w = Wall::new(0, 0, WallType::Blastable);
        assert!(!w.is_passable());
        w.flags |= WallFlags::BLASTED;
        assert!(w.is_passable());

        let i = Wall::new(0, 0, WallType::Illusion);
        assert!(i.is_passable());
        let c = Wall::new(0, 0, WallType::Cloaked);
        assert!(!c.is_passable());
        assert!(c.is_see_through());
    }
}
