use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::console::ConsoleCommand;
use crate::control::{ControlRequest, DashboardApi};
use crate::dashboard::RelayKey;
use crate::dashboard::state::DashboardState;
use crate::error::RecorderError;
use crate::recorder::{AudioCapture, PushToTalk};
use crate::settings::Settings;
use crate::stream::StatusEvent;
use crate::time_sync;

/// Owns the state mirror and routes server events and user commands.
pub struct Dashboard {
    state: DashboardState,
    settings: Settings,
    api: Arc<dyn DashboardApi>,
    speech_tx: mpsc::Sender<String>,
    talk: HashMap<String, PushToTalk>,
}

impl Dashboard {
    pub fn new(
        config: &Config,
        api: Arc<dyn DashboardApi>,
        capture: Arc<dyn AudioCapture>,
        speech_tx: mpsc::Sender<String>,
    ) -> Self {
        let talk = config
            .rooms()
            .into_iter()
            .map(|room| {
                let ptt = PushToTalk::new(
                    room.clone(),
                    capture.clone(),
                    api.clone(),
                    config.record_limit(),
                );
                (room, ptt)
            })
            .collect();

        Self {
            state: DashboardState::from_layout(&config.layout),
            settings: Settings::load(&config.settings_file),
            api,
            speech_tx,
            talk,
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn sync_time(&mut self, now: NaiveDateTime) -> bool {
        time_sync::sync_once(self.api.as_ref(), &mut self.settings, now).await
    }

    pub async fn handle_event(&mut self, event: StatusEvent) {
        match &event {
            StatusEvent::VoiceFeedback { text } => {
                if self.speech_tx.send(text.clone()).await.is_err() {
                    warn!("Speech queue closed, dropping: {}", text);
                }
            }
            StatusEvent::StatusUpdate { room, relay, .. }
            | StatusEvent::MotionUpdate { room, relay, .. } => {
                let key = RelayKey::new(room, relay);
                if self.state.apply(&event) {
                    if let Some(view) = self.state.view(&key) {
                        info!("{}", view);
                    }
                }
            }
            StatusEvent::Log { log } => {
                self.state.apply(&event);
                info!("Server: {}", log);
            }
            StatusEvent::Unknown => {}
        }
    }

    pub async fn handle_command(&mut self, cmd: ConsoleCommand) {
        match cmd {
            ConsoleCommand::Switch { key, on } => match self.state.request_relay(&key, on) {
                Some(desired) => self.send_control(ControlRequest::switch(&key, desired)),
                None => warn!("Unknown relay {}", key),
            },
            ConsoleCommand::Motion { key } => match self.state.request_motion_toggle(&key) {
                Some(enabled) => self.send_control(ControlRequest::motion(&key, enabled)),
                None => warn!("Unknown relay {}", key),
            },
            ConsoleCommand::Talk { room } => {
                let Some(ptt) = self.talk.get(&room) else {
                    warn!("Unknown room {}", room);
                    return;
                };
                match ptt.press().await {
                    Ok(true) => {}
                    Ok(false) => info!("Already listening in {}", room),
                    Err(RecorderError::PermissionDenied) => error!("Microphone access denied."),
                    Err(e) => error!("Could not start recording in {}: {}", room, e),
                }
            }
            ConsoleCommand::StopTalk { room } => match self.talk.get(&room) {
                Some(ptt) => {
                    if !ptt.release() {
                        info!("Not listening in {}", room);
                    }
                }
                None => warn!("Unknown room {}", room),
            },
            ConsoleCommand::Theme => match self.settings.toggle_theme() {
                Ok(theme) => info!("Theme: {}", theme.as_str()),
                Err(e) => warn!(
                    "Could not save theme to {}: {}",
                    self.settings.path().display(),
                    e
                ),
            },
            ConsoleCommand::Status => {
                println!("Theme: {}", self.settings.theme().as_str());
                println!("{}", self.state.render());
            }
            ConsoleCommand::Log => {
                for line in self.state.command_log() {
                    println!("{}", line);
                }
            }
        }
    }

    /// Fire-and-forget `POST /control`; failures are only logged.
    fn send_control(&self, request: ControlRequest) {
        let api = self.api.clone();
        tokio::spawn(async move {
            if let Err(e) = api.send_control(&request).await {
                warn!("Control request {:?} failed: {}", request, e);
            }
        });
    }
}
