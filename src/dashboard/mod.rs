pub mod state;

use std::fmt;

/// Identifies one controllable switch: (room name, relay name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelayKey {
    pub room: String,
    pub relay: String,
}

impl RelayKey {
    pub fn new(room: impl Into<String>, relay: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            relay: relay.into(),
        }
    }

    /// Id of the toggle control this relay is rendered as.
    /// ("kitchen", "1") → "switch-kitchen-1"
    pub fn element_id(&self) -> String {
        format!("switch-{}-{}", self.room, self.relay)
    }
}

impl fmt::Display for RelayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.room, self.relay)
    }
}

/// A read-only projection of one relay for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlView {
    pub element_id: String,
    pub label: String,
    pub checked: bool,
    pub motion_active: bool,
    /// True while a local toggle waits for the server to confirm.
    pub pending: bool,
}

impl fmt::Display for ControlView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<24} {:<20} motion:{}{}",
            if self.checked { "x" } else { " " },
            self.element_id,
            self.label,
            if self.motion_active { "active" } else { "off" },
            if self.pending { " (pending)" } else { "" },
        )
    }
}
