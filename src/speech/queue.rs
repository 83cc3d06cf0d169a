use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::SpeechConfig;

use super::{Speaker, Voice, select_voice};

/// Speaks voice feedback one message at a time.
pub struct SpeechQueue {
    speaker: Arc<dyn Speaker>,
    prefs: SpeechConfig,
    delay: Duration,
}

impl SpeechQueue {
    /// `delay` is the pause between cancelling the old utterance and
    /// starting the new one.
    pub fn new(speaker: Arc<dyn Speaker>, prefs: SpeechConfig, delay: Duration) -> Self {
        Self {
            speaker,
            prefs,
            delay,
        }
    }

    /// Process texts until the sender side is dropped.
    pub async fn run(self, mut text_rx: mpsc::Receiver<String>) {
        let mut voice = self.pick_voice().await;
        if voice.is_none() {
            info!("Speech voice: system default until a matching voice appears");
        }

        while let Some(text) = text_rx.recv().await {
            debug!("Speaking: {}", text);
            // The voice list may still be loading at startup.
            if voice.is_none() {
                voice = self.pick_voice().await;
            }
            self.speaker.cancel().await;
            tokio::time::sleep(self.delay).await;
            self.speaker.speak(&text, voice.as_ref()).await;
        }

        self.speaker.cancel().await;
        debug!("Speech queue closed");
    }

    async fn pick_voice(&self) -> Option<Voice> {
        let voices = self.speaker.voices().await;
        let voice = select_voice(&voices, &self.prefs).cloned();
        if let Some(v) = &voice {
            info!("Speech voice: {} ({})", v.name, v.lang);
        }
        voice
    }
}
