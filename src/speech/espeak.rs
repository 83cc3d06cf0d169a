use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Speaker, Voice};

/// Speaks through an `espeak-ng` child process; one child at a time.
pub struct EspeakSpeaker {
    program: String,
    current: Mutex<Option<Child>>,
}

impl EspeakSpeaker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            current: Mutex::new(None),
        }
    }
}

impl Default for EspeakSpeaker {
    fn default() -> Self {
        Self::new("espeak-ng")
    }
}

#[async_trait]
impl Speaker for EspeakSpeaker {
    async fn voices(&self) -> Vec<Voice> {
        match Command::new(&self.program).arg("--voices").output().await {
            Ok(output) if output.status.success() => {
                parse_voice_list(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                warn!("{} --voices exited with {}", self.program, output.status);
                Vec::new()
            }
            Err(e) => {
                warn!("Could not list voices from {}: {}", self.program, e);
                Vec::new()
            }
        }
    }

    async fn cancel(&self) {
        let mut current = self.current.lock().await;
        stop_child(&mut current).await;
    }

    async fn speak(&self, text: &str, voice: Option<&Voice>) {
        let mut current = self.current.lock().await;
        stop_child(&mut current).await;

        let mut cmd = Command::new(&self.program);
        if let Some(voice) = voice {
            cmd.arg("-v").arg(&voice.lang);
        }
        cmd.arg("--").arg(text).kill_on_drop(true);

        match cmd.spawn() {
            Ok(child) => *current = Some(child),
            Err(e) => warn!("Failed to start {}: {}", self.program, e),
        }
    }
}

async fn stop_child(current: &mut Option<Child>) {
    if let Some(mut child) = current.take() {
        // Already-finished children report an error here; nothing to do.
        if let Err(e) = child.kill().await {
            debug!("Speech process already gone: {}", e);
        }
    }
}

/// Parse `espeak-ng --voices` output.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  2  en-us           --/M      English_(America)  gmw/en-US            (en 3)
/// ```
fn parse_voice_list(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let lang = cols.next()?;
            let _age_gender = cols.next()?;
            let name = cols.next()?;
            Some(Voice::new(name.replace('_', " "), lang))
        })
        .collect()
}
