use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use crate::config::RelayLayout;
use crate::stream::StatusEvent;

use super::{ControlView, RelayKey};

/// Newest-first server log lines kept for the `log` view.
const COMMAND_LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
struct RelayEntry {
    label: String,
    on: bool,
    motion_control: bool,
    pending_on: Option<bool>,
    pending_motion: Option<bool>,
}

/// Local mirror of the server's relay state, keyed by (room, relay).
///
/// The server stays authoritative: optimistic local changes are marked
/// pending and get overwritten by the next matching event.
#[derive(Debug, Default)]
pub struct DashboardState {
    relays: BTreeMap<RelayKey, RelayEntry>,
    command_log: VecDeque<String>,
}

impl DashboardState {
    pub fn from_layout(layout: &[RelayLayout]) -> Self {
        let relays = layout
            .iter()
            .map(|r| {
                (
                    r.key.clone(),
                    RelayEntry {
                        label: r.label.clone(),
                        on: r.on,
                        motion_control: r.motion_control,
                        pending_on: None,
                        pending_motion: None,
                    },
                )
            })
            .collect();

        Self {
            relays,
            command_log: VecDeque::new(),
        }
    }

    /// Apply one server event. Returns true if the mirror changed.
    ///
    /// Events for relays missing from the layout are dropped, as is
    /// anything that is not a state event.
    pub fn apply(&mut self, event: &StatusEvent) -> bool {
        match event {
            StatusEvent::StatusUpdate {
                room,
                relay,
                status,
            } => {
                let Some(entry) = self.relays.get_mut(&RelayKey::new(room, relay)) else {
                    debug!("status_update for unknown relay {}/{}", room, relay);
                    return false;
                };
                let on = status == "ON";
                let changed = entry.on != on || entry.pending_on.is_some();
                entry.on = on;
                entry.pending_on = None;
                changed
            }
            StatusEvent::MotionUpdate {
                room,
                relay,
                motion_control,
            } => {
                let Some(entry) = self.relays.get_mut(&RelayKey::new(room, relay)) else {
                    debug!("motion_update for unknown relay {}/{}", room, relay);
                    return false;
                };
                let changed =
                    entry.motion_control != *motion_control || entry.pending_motion.is_some();
                entry.motion_control = *motion_control;
                entry.pending_motion = None;
                changed
            }
            StatusEvent::Log { log } => {
                self.command_log.push_front(log.clone());
                self.command_log.truncate(COMMAND_LOG_CAPACITY);
                true
            }
            StatusEvent::VoiceFeedback { .. } | StatusEvent::Unknown => false,
        }
    }

    /// Optimistically switch a relay and mark it pending.
    /// `None` flips the current state. Returns the requested state.
    pub fn request_relay(&mut self, key: &RelayKey, on: Option<bool>) -> Option<bool> {
        let entry = self.relays.get_mut(key)?;
        let desired = on.unwrap_or(!entry.on);
        entry.on = desired;
        entry.pending_on = Some(desired);
        Some(desired)
    }

    /// Optimistically flip motion control and mark it pending.
    pub fn request_motion_toggle(&mut self, key: &RelayKey) -> Option<bool> {
        let entry = self.relays.get_mut(key)?;
        let desired = !entry.motion_control;
        entry.motion_control = desired;
        entry.pending_motion = Some(desired);
        Some(desired)
    }

    pub fn view(&self, key: &RelayKey) -> Option<ControlView> {
        self.relays.get(key).map(|entry| project(key, entry))
    }

    pub fn views(&self) -> Vec<ControlView> {
        self.relays
            .iter()
            .map(|(key, entry)| project(key, entry))
            .collect()
    }

    /// Full dashboard as text, one control per line.
    pub fn render(&self) -> String {
        self.views()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn command_log(&self) -> impl Iterator<Item = &str> {
        self.command_log.iter().map(String::as_str)
    }
}

fn project(key: &RelayKey, entry: &RelayEntry) -> ControlView {
    ControlView {
        element_id: key.element_id(),
        label: entry.label.clone(),
        checked: entry.on,
        motion_active: entry.motion_control,
        pending: entry.pending_on.is_some() || entry.pending_motion.is_some(),
    }
}
