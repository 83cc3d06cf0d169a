use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::debug;

use super::{AudioCapture, CaptureSession};
use crate::error::RecorderError;

const DEFAULT_ARGS: [&str; 10] = ["-q", "-f", "S16_LE", "-c", "1", "-t", "wav", "-r", "16000", "-"];

/// A capture process that dies this quickly never got the device.
const STARTUP_GRACE: Duration = Duration::from_millis(200);

/// Records 16 kHz mono WAV from the default ALSA device via `arecord`.
pub struct ArecordCapture {
    program: String,
    args: Vec<String>,
}

impl ArecordCapture {
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_args(program, DEFAULT_ARGS)
    }

    /// Any program that writes audio to stdout until killed.
    pub fn with_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for ArecordCapture {
    fn default() -> Self {
        Self::new("arecord")
    }
}

struct ArecordSession {
    child: Child,
    stdout: JoinHandle<std::io::Result<Vec<u8>>>,
    stderr: JoinHandle<std::io::Result<Vec<u8>>>,
}

fn drain<R>(mut reader: R) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    })
}

#[async_trait]
impl AudioCapture for ArecordCapture {
    async fn start(&self) -> Result<Box<dyn CaptureSession>, RecorderError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::PermissionDenied => RecorderError::PermissionDenied,
                _ => RecorderError::Unavailable(format!("{}: {e}", self.program)),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RecorderError::Unavailable("no stdout pipe".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RecorderError::Unavailable("no stderr pipe".into()))?;

        let stdout = drain(stdout);
        let stderr = drain(stderr);

        // ALSA refuses the device after spawn, so check for an early exit.
        match tokio::time::timeout(STARTUP_GRACE, child.wait()).await {
            Ok(Ok(status)) if !status.success() => {
                stdout.abort();
                let diagnostics = join_output(stderr).await.unwrap_or_default();
                return Err(capture_failure(status, &diagnostics));
            }
            Ok(Err(e)) => return Err(RecorderError::Capture(e.to_string())),
            Ok(Ok(_)) | Err(_) => {}
        }

        Ok(Box::new(ArecordSession {
            child,
            stdout,
            stderr,
        }))
    }
}

fn capture_failure(status: ExitStatus, diagnostics: &[u8]) -> RecorderError {
    let message = String::from_utf8_lossy(diagnostics).trim().to_string();
    if message.contains("Permission denied") {
        return RecorderError::PermissionDenied;
    }
    RecorderError::Capture(format!("no audio captured ({status}): {message}"))
}

#[async_trait]
impl CaptureSession for ArecordSession {
    async fn stop(self: Box<Self>) -> Result<Vec<u8>, RecorderError> {
        let ArecordSession {
            mut child,
            stdout,
            stderr,
        } = *self;

        if let Err(e) = child.start_kill() {
            debug!("arecord already exited: {}", e);
        }
        let status = child
            .wait()
            .await
            .map_err(|e| RecorderError::Capture(e.to_string()))?;

        let audio = join_output(stdout).await?;
        let diagnostics = join_output(stderr).await.unwrap_or_default();

        if audio.is_empty() {
            return Err(capture_failure(status, &diagnostics));
        }
        Ok(audio)
    }
}

async fn join_output(
    handle: JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, RecorderError> {
    handle
        .await
        .map_err(|e| RecorderError::Capture(e.to_string()))?
        .map_err(|e| RecorderError::Capture(e.to_string()))
}
