pub mod espeak;
pub mod queue;

use async_trait::async_trait;

use crate::config::SpeechConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    pub name: String,
    /// BCP 47-ish locale, e.g. "en-US" (backends may report "en_us" or "en-us").
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// A speech synthesis backend.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn voices(&self) -> Vec<Voice>;

    /// Stop the active utterance, if any.
    async fn cancel(&self);

    /// Start speaking. `None` means the system default voice.
    async fn speak(&self, text: &str, voice: Option<&Voice>);
}

fn normalize_locale(lang: &str) -> String {
    lang.replace('_', "-").to_ascii_lowercase()
}

/// Pick a voice: first exact name match in preference order, then
/// locale match, else `None` for the system default.
pub fn select_voice<'a>(voices: &'a [Voice], prefs: &SpeechConfig) -> Option<&'a Voice> {
    for name in &prefs.preferred_voices {
        if let Some(voice) = voices.iter().find(|v| &v.name == name) {
            return Some(voice);
        }
    }

    let locale = normalize_locale(prefs.preferred_locale.as_deref()?);
    voices.iter().find(|v| normalize_locale(&v.lang) == locale)
}
