// common.rs — engine print helpers
//
// Call sites keep the classic com_printf / com_dprintf shape; output goes
// through `tracing`. The embedding application installs the subscriber.

use std::sync::atomic::{AtomicBool, Ordering};

static DEVELOPER: AtomicBool = AtomicBool::new(false);

/// Mirrors the "developer" cvar. Set by the game when cvars change.
pub fn set_developer(on: bool) {
    DEVELOPER.store(on, Ordering::Relaxed);
}

pub fn developer() -> bool {
    DEVELOPER.load(Ordering::Relaxed)
}

/// General message.
pub fn com_printf(msg: &str) {
    tracing::info!(target: "myd1", "{}", msg.trim_end());
}

/// Developer-only message. Dropped unless developer mode is on.
pub fn com_dprintf(msg: &str) {
    if !developer() {
        return;
    }
    tracing::debug!(target: "myd1", "{}", msg.trim_end());
}

/// Non-fatal problem worth surfacing regardless of developer mode.
pub fn com_warnf(msg: &str) {
    tracing::warn!(target: "myd1", "{}", msg.trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_developer_toggle() {
        set_developer(true);
        assert!(developer());
        com_dprintf("visible\n");
        set_developer(false);
        assert!(!developer());
        com_dprintf("dropped\n");
        com_printf("always\n");
    }
}
