// error.rs — fatal level load errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("level data truncated at offset {offset} (wanted {wanted} more bytes)")]
    Truncated { offset: usize, wanted: usize },

    #[error("bad level magic {0:?}")]
    BadMagic([u8; 4]),

    #[error("unsupported level version {0}")]
    UnsupportedVersion(u32),

    #[error("unknown item type {0}")]
    UnknownItemType(u8),

    #[error("unknown control type {0}")]
    UnknownControlType(u8),

    #[error("unknown movement type {0}")]
    UnknownMovementType(u8),

    #[error("unknown render type {0}")]
    UnknownRenderType(u8),

    #[error("item type {item_type} has no info entry {id}")]
    InvalidItemId { item_type: u8, id: u8 },

    #[error("cube index {index} out of range ({count} cubes)")]
    BadCubeIndex { index: usize, count: usize },

    #[error("vertex index {index} out of range ({count} vertices)")]
    BadVertexIndex { index: usize, count: usize },

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("portal {cube}:{side} -> {neighbor} has no matching side back")]
    AsymmetricPortal {
        cube: usize,
        side: usize,
        neighbor: usize,
    },

    #[error("unknown wall type {0}")]
    UnknownWallType(u8),

    #[error("unknown trigger type {0}")]
    UnknownTriggerType(u8),

    #[error("side index {0} out of range")]
    BadSideIndex(usize),

    #[error("wall index {index} out of range ({count} walls)")]
    BadWallIndex { index: usize, count: usize },

    #[error("trigger index {index} out of range ({count} triggers)")]
    BadTriggerIndex { index: usize, count: usize },
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = LoadError::BadCubeIndex { index: 9, count: 2 };
        assert_eq!(e.to_string(), "cube index 9 out of range (2 cubes)");
        let e = LoadError::AsymmetricPortal {
            cube: 0,
            side: 2,
            neighbor: 1,
        };
        assert!(e.to_string().contains("0:2 -> 1"));
    }
}
