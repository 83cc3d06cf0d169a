use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

// On-disk shape; only the theme survives restarts.
#[derive(Default, Serialize, Deserialize)]
struct StoredSettings {
    #[serde(default)]
    theme: Theme,
}

/// Client-local flags.
#[derive(Debug)]
pub struct Settings {
    path: PathBuf,
    theme: Theme,
    /// Per-session: never written to disk.
    time_synced: bool,
}

impl Settings {
    /// Load from `path`. A missing or unreadable file gives defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stored = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<StoredSettings>(&content).unwrap_or_else(|e| {
                warn!("Ignoring invalid settings file {}: {}", path.display(), e);
                StoredSettings::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredSettings::default(),
            Err(e) => {
                warn!("Could not read settings file {}: {}", path.display(), e);
                StoredSettings::default()
            }
        };

        Self {
            path,
            theme: stored.theme,
            time_synced: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Flip dark/light and persist it.
    pub fn toggle_theme(&mut self) -> Result<Theme, ClientError> {
        self.theme = self.theme.toggled();
        self.save()?;
        Ok(self.theme)
    }

    pub fn time_synced(&self) -> bool {
        self.time_synced
    }

    pub fn mark_time_synced(&mut self) {
        self.time_synced = true;
    }

    fn save(&self) -> Result<(), ClientError> {
        let stored = StoredSettings { theme: self.theme };
        std::fs::write(&self.path, serde_json::to_vec_pretty(&stored)?)?;
        Ok(())
    }
}
