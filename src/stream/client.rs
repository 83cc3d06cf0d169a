use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ClientError;

use super::{StatusEvent, parse_event};

/// Raw `data` payloads of one open stream.
pub type FrameStream = BoxStream<'static, Result<String, ClientError>>;

/// Delay policy between reconnect attempts.
pub trait Backoff: Send {
    fn next_delay(&mut self) -> Duration;

    /// Called once a connection opens successfully.
    fn reset(&mut self) {}
}

/// Same delay every time: no growth, no jitter, no cap on attempts.
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Backoff for FixedBackoff {
    fn next_delay(&mut self) -> Duration {
        self.delay
    }
}

/// Something that can open the status stream.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn open(&self) -> Result<FrameStream, ClientError>;
}

/// `GET /status-stream` over HTTP with Server-Sent Events framing.
pub struct HttpStatusSource {
    client: reqwest::Client,
    url: String,
}

impl HttpStatusSource {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, ClientError> {
        // No overall timeout: the response body never ends on a healthy stream.
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            client,
            url: format!("{}/status-stream", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn open(&self) -> Result<FrameStream, ClientError> {
        let resp = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let frames = resp
            .bytes_stream()
            .eventsource()
            .map(|event| {
                event
                    .map(|e| e.data)
                    .map_err(|e| ClientError::Stream(e.to_string()))
            })
            .boxed();
        Ok(frames)
    }
}

/// Keeps the status stream open and forwards parsed events.
pub struct StatusStreamClient<S> {
    source: S,
    backoff: Box<dyn Backoff>,
}

impl<S: StatusSource> StatusStreamClient<S> {
    pub fn new(source: S, backoff: impl Backoff + 'static) -> Self {
        Self {
            source,
            backoff: Box::new(backoff),
        }
    }

    /// Connect, forward events, and reconnect after every failure or
    /// end of stream. Returns only once `event_tx` has no receiver.
    pub async fn run(mut self, event_tx: mpsc::Sender<StatusEvent>) {
        loop {
            info!("Connecting to status stream");

            match self.source.open().await {
                Ok(frames) => {
                    info!("Status stream open");
                    self.backoff.reset();
                    if !forward_frames(frames, &event_tx).await {
                        info!("Event channel closed, leaving status stream");
                        return;
                    }
                }
                Err(e) => {
                    warn!("Status stream connect failed: {}", e);
                }
            }

            if event_tx.is_closed() {
                return;
            }

            let delay = self.backoff.next_delay();
            warn!("Status stream closed. Reconnecting in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }
}

/// Drain one connection. Returns false if the receiver went away.
async fn forward_frames(mut frames: FrameStream, event_tx: &mpsc::Sender<StatusEvent>) -> bool {
    while let Some(frame) = frames.next().await {
        let data = match frame {
            Ok(data) => data,
            Err(e) => {
                warn!("Status stream error: {}", e);
                return true;
            }
        };

        if data.trim().is_empty() {
            continue;
        }

        match parse_event(&data) {
            Ok(StatusEvent::Unknown) => {
                debug!("Ignoring unknown event type: {}", data);
            }
            Ok(event) => {
                if event_tx.send(event).await.is_err() {
                    return false;
                }
            }
            Err(e) => {
                warn!("Skipping malformed status frame ({}): {}", e, data);
            }
        }
    }

    info!("Status stream ended");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    enum Script {
        Refuse,
        Frames(Vec<Result<String, ClientError>>),
    }

    /// Plays back one script entry per `open`; stays open forever afterwards.
    struct ScriptedSource {
        scripts: Mutex<VecDeque<Script>>,
        attempts: Arc<Mutex<Vec<Instant>>>,
    }

    impl ScriptedSource {
        fn new(scripts: Vec<Script>) -> (Self, Arc<Mutex<Vec<Instant>>>) {
            let attempts = Arc::new(Mutex::new(Vec::new()));
            let source = Self {
                scripts: Mutex::new(scripts.into()),
                attempts: attempts.clone(),
            };
            (source, attempts)
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn open(&self) -> Result<FrameStream, ClientError> {
            self.attempts.lock().unwrap().push(Instant::now());
            let next = self.scripts.lock().unwrap().pop_front();
            match next {
                Some(Script::Refuse) => Err(ClientError::Stream("connection refused".into())),
                Some(Script::Frames(frames)) => Ok(futures::stream::iter(frames).boxed()),
                None => Ok(futures::stream::pending::<Result<String, ClientError>>().boxed()),
            }
        }
    }

    const KITCHEN_ON: &str =
        r#"{"type":"status_update","room":"kitchen","relay":"1","status":"ON"}"#;
    const GREETING: &str = r#"{"type":"voice_feedback","text":"Hello"}"#;

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_fixed_delay() {
        let (source, attempts) = ScriptedSource::new(vec![
            Script::Frames(vec![
                Ok(KITCHEN_ON.into()),
                Err(ClientError::Stream("reset by peer".into())),
            ]),
            Script::Refuse,
            Script::Frames(vec![Ok(GREETING.into())]),
        ]);
        let client = StatusStreamClient::new(source, FixedBackoff::new(Duration::from_millis(3000)));
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(client.run(tx));

        assert!(matches!(rx.recv().await, Some(StatusEvent::StatusUpdate { .. })));
        assert!(matches!(rx.recv().await, Some(StatusEvent::VoiceFeedback { .. })));

        let attempts = attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[1] - attempts[0], Duration::from_millis(3000));
        assert_eq!(attempts[2] - attempts[1], Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn end_of_stream_counts_as_failure() {
        let (source, attempts) = ScriptedSource::new(vec![
            Script::Frames(vec![]),
            Script::Frames(vec![Ok(KITCHEN_ON.into())]),
        ]);
        let client = StatusStreamClient::new(source, FixedBackoff::new(Duration::from_millis(3000)));
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(client.run(tx));

        assert!(rx.recv().await.is_some());
        let attempts = attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1] - attempts[0], Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_are_skipped() {
        let (source, attempts) = ScriptedSource::new(vec![Script::Frames(vec![
            Ok("not json".into()),
            Ok(r#"{"type":"status_update","room":"kitchen"}"#.into()),
            Ok(r#"{"type":"firmware_update"}"#.into()),
            Ok("".into()),
            Ok(KITCHEN_ON.into()),
        ])]);
        let client = StatusStreamClient::new(source, FixedBackoff::new(Duration::from_millis(3000)));
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(client.run(tx));

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            StatusEvent::StatusUpdate {
                room: "kitchen".into(),
                relay: "1".into(),
                status: "ON".into(),
            }
        );
        // The bad frames did not tear the connection down.
        assert_eq!(attempts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_receiver_is_gone() {
        let (source, attempts) = ScriptedSource::new(vec![Script::Refuse, Script::Refuse]);
        let client = StatusStreamClient::new(source, FixedBackoff::new(Duration::from_millis(3000)));
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        client.run(tx).await;
        assert_eq!(attempts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn http_source_reads_sse_frames() {
        let mut server = mockito::Server::new_async().await;
        let body = format!("data: {KITCHEN_ON}\n\n: keepalive\n\ndata: {GREETING}\n\n");
        let mock = server
            .mock("GET", "/status-stream")
            .match_header("accept", "text/event-stream")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let source = HttpStatusSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        let frames: Vec<String> = source
            .open()
            .await
            .unwrap()
            .filter_map(|f| async move { f.ok() })
            .collect()
            .await;

        assert_eq!(frames, vec![KITCHEN_ON.to_string(), GREETING.to_string()]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_source_rejects_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/status-stream")
            .with_status(503)
            .with_body("busy")
            .create_async()
            .await;

        let source = HttpStatusSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = source.open().await.err().unwrap();
        assert!(matches!(err, ClientError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn http_client_reconnects_when_server_closes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/status-stream")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(format!("data: {KITCHEN_ON}\n\n"))
            .expect_at_least(2)
            .create_async()
            .await;

        let source = HttpStatusSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        let client = StatusStreamClient::new(source, FixedBackoff::new(Duration::from_millis(10)));
        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(client.run(tx));

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        handle.abort();
        mock.assert_async().await;
    }
}
