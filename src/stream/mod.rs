pub mod client;

use serde::Deserialize;

/// One message pushed by the server on the status stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    StatusUpdate {
        room: String,
        relay: String,
        status: String,
    },
    MotionUpdate {
        room: String,
        relay: String,
        motion_control: bool,
    },
    VoiceFeedback {
        text: String,
    },
    /// A line from the server's command log.
    Log {
        log: String,
    },
    /// Any `type` this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Parse the JSON payload of one stream frame.
pub fn parse_event(data: &str) -> Result<StatusEvent, serde_json::Error> {
    serde_json::from_str(data)
}
