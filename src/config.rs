use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::dashboard::RelayKey;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub timing: TimingConfig,
    pub speech: SpeechConfig,
    pub settings_file: PathBuf,
    pub layout: Vec<RelayLayout>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL without trailing slash, e.g. "http://raspberrypi.local:5000"
    pub base_url: String,
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct TimingConfig {
    pub reconnect_delay_ms: u64,
    pub record_limit_ms: u64,
    pub speech_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Voice names tried in order before falling back to the locale.
    pub preferred_voices: Vec<String>,
    pub preferred_locale: Option<String>,
}

/// One relay as declared in the layout file.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayLayout {
    pub key: RelayKey,
    pub label: String,
    pub on: bool,
    pub motion_control: bool,
}

// Serde structs for the server's device_config.json: room -> relay -> entry
#[derive(Deserialize)]
struct RawRelay {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    motion_control: bool,
}

// Rooms also carry non-relay keys such as "wake_word": "jarvis".
type RawLayout = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, String> {
    lookup(key).ok_or_else(|| format!("{key} environment variable is required"))
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.is_empty())
}

fn or_default<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let layout_file = or_default(&lookup, "LAYOUT_FILE", "device_config.json".to_string());
        let layout = load_layout(&layout_file)?;

        let preferred_voices = optional(&lookup, "SPEECH_VOICES")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            server: ServerConfig {
                base_url: required(&lookup, "DASHBOARD_URL")?
                    .trim_end_matches('/')
                    .to_string(),
                http_timeout_secs: or_default(&lookup, "HTTP_TIMEOUT_SECS", 10),
            },
            timing: TimingConfig {
                reconnect_delay_ms: or_default(&lookup, "RECONNECT_DELAY_MS", 3000),
                record_limit_ms: or_default(&lookup, "RECORD_LIMIT_MS", 4000),
                speech_delay_ms: or_default(&lookup, "SPEECH_DELAY_MS", 50),
            },
            speech: SpeechConfig {
                preferred_voices,
                preferred_locale: Some(or_default(&lookup, "SPEECH_LOCALE", "en-US".to_string()))
                    .filter(|l| !l.is_empty()),
            },
            settings_file: or_default(
                &lookup,
                "SETTINGS_FILE",
                PathBuf::from("dashboard-settings.json"),
            ),
            layout,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.server.base_url.is_empty() {
            return Err("DASHBOARD_URL must not be empty".into());
        }
        if self.layout.is_empty() {
            return Err("No relays found in layout file".into());
        }
        if self.timing.reconnect_delay_ms == 0 {
            return Err("RECONNECT_DELAY_MS must be > 0".into());
        }
        if self.timing.record_limit_ms == 0 {
            return Err("RECORD_LIMIT_MS must be > 0".into());
        }
        if self.server.http_timeout_secs == 0 {
            return Err("HTTP_TIMEOUT_SECS must be > 0".into());
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.timing.reconnect_delay_ms)
    }

    pub fn record_limit(&self) -> Duration {
        Duration::from_millis(self.timing.record_limit_ms)
    }

    pub fn speech_delay(&self) -> Duration {
        Duration::from_millis(self.timing.speech_delay_ms)
    }

    /// Rooms in layout order, deduplicated.
    pub fn rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.layout.iter().map(|r| r.key.room.clone()).collect();
        rooms.dedup();
        rooms
    }
}

fn load_layout(path: &str) -> Result<Vec<RelayLayout>, String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read {path}: {e}"))?;
    parse_layout(&content).map_err(|e| format!("Failed to parse {path}: {e}"))
}

fn parse_layout(content: &str) -> Result<Vec<RelayLayout>, serde_json::Error> {
    let raw: RawLayout = serde_json::from_str(content)?;

    let mut layout = Vec::new();
    for (room, entries) in raw {
        for (relay, value) in entries {
            if !value.is_object() {
                continue;
            }
            let entry: RawRelay = serde_json::from_value(value)?;
            layout.push(RelayLayout {
                label: entry.label.unwrap_or_else(|| relay.clone()),
                on: entry.status.as_deref() == Some("ON"),
                motion_control: entry.motion_control,
                key: RelayKey::new(room.clone(), relay),
            });
        }
    }
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn write_layout(name: &str, body: &str) -> String {
        let path = env::temp_dir().join(format!("dashboard-client-{name}-{}.json", std::process::id()));
        std::fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn lookup_from(vars: HashMap<&'static str, String>) -> impl Fn(&str) -> Option<String> {
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn parse_layout_applies_defaults() {
        let layout = parse_layout(
            r#"{
                "kitchen": {
                    "1": {"label": "Main Light", "status": "ON", "motion_control": true},
                    "2": {}
                },
                "bedroom": {"1": {"status": "OFF"}}
            }"#,
        )
        .unwrap();

        assert_eq!(layout.len(), 3);
        assert_eq!(layout[0].key, RelayKey::new("bedroom", "1"));
        assert!(!layout[0].on);

        let main_light = &layout[1];
        assert_eq!(main_light.key, RelayKey::new("kitchen", "1"));
        assert_eq!(main_light.label, "Main Light");
        assert!(main_light.on);
        assert!(main_light.motion_control);

        let bare = &layout[2];
        assert_eq!(bare.label, "2");
        assert!(!bare.on);
        assert!(!bare.motion_control);
    }

    #[test]
    fn parse_layout_skips_room_settings() {
        let layout = parse_layout(
            r#"{
                "kitchen": {
                    "wake_word": "jarvis",
                    "relay1": {"label": "Main Light", "status": "OFF", "motion_control": false}
                },
                "hall": {"wake_word": "computer"}
            }"#,
        )
        .unwrap();

        assert_eq!(layout.len(), 1);
        assert_eq!(layout[0].key, RelayKey::new("kitchen", "relay1"));
        assert_eq!(layout[0].label, "Main Light");
    }

    #[test]
    fn parse_layout_rejects_bad_relay_fields() {
        assert!(parse_layout(r#"{"kitchen": {"1": {"motion_control": "yes"}}}"#).is_err());
    }

    #[test]
    fn from_lookup_reads_defaults() {
        let layout = write_layout("defaults", r#"{"kitchen": {"1": {}}}"#);
        let vars = HashMap::from([
            ("DASHBOARD_URL", "http://pi.local:5000/".to_string()),
            ("LAYOUT_FILE", layout),
        ]);

        let config = Config::from_lookup(lookup_from(vars)).unwrap();
        assert_eq!(config.server.base_url, "http://pi.local:5000");
        assert_eq!(config.reconnect_delay(), Duration::from_millis(3000));
        assert_eq!(config.record_limit(), Duration::from_millis(4000));
        assert_eq!(config.speech_delay(), Duration::from_millis(50));
        assert_eq!(config.speech.preferred_locale.as_deref(), Some("en-US"));
        assert!(config.speech.preferred_voices.is_empty());
        assert_eq!(config.rooms(), vec!["kitchen".to_string()]);
    }

    #[test]
    fn from_lookup_splits_voice_list() {
        let layout = write_layout("voices", r#"{"kitchen": {"1": {}}}"#);
        let vars = HashMap::from([
            ("DASHBOARD_URL", "http://pi.local".to_string()),
            ("LAYOUT_FILE", layout),
            ("SPEECH_VOICES", "en-us, , English (Great Britain)".to_string()),
        ]);

        let config = Config::from_lookup(lookup_from(vars)).unwrap();
        assert_eq!(
            config.speech.preferred_voices,
            vec!["en-us".to_string(), "English (Great Britain)".to_string()]
        );
    }

    #[test]
    fn missing_url_is_an_error() {
        let layout = write_layout("nourl", r#"{"kitchen": {"1": {}}}"#);
        let vars = HashMap::from([("LAYOUT_FILE", layout)]);
        let err = Config::from_lookup(lookup_from(vars)).unwrap_err();
        assert!(err.contains("DASHBOARD_URL"));
    }

    #[test]
    fn empty_layout_is_an_error() {
        let layout = write_layout("empty", "{}");
        let vars = HashMap::from([
            ("DASHBOARD_URL", "http://pi.local".to_string()),
            ("LAYOUT_FILE", layout),
        ]);
        let err = Config::from_lookup(lookup_from(vars)).unwrap_err();
        assert!(err.contains("No relays"));
    }

    #[test]
    fn zero_reconnect_delay_is_rejected() {
        let layout = write_layout("zerodelay", r#"{"kitchen": {"1": {}}}"#);
        let vars = HashMap::from([
            ("DASHBOARD_URL", "http://pi.local".to_string()),
            ("LAYOUT_FILE", layout),
            ("RECONNECT_DELAY_MS", "0".to_string()),
        ]);
        let err = Config::from_lookup(lookup_from(vars)).unwrap_err();
        assert!(err.contains("RECONNECT_DELAY_MS"));
    }
}
