//! Outbound calls to the dashboard server.
//!
//! Every call is fire-once: callers log failures and move on.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::dashboard::RelayKey;
use crate::error::ClientError;

/// Body of `POST /control`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlRequest {
    Switch {
        room: String,
        relay: String,
        action: &'static str,
    },
    Motion {
        room: String,
        relay: String,
        motion_control: bool,
    },
}

impl ControlRequest {
    pub fn switch(key: &RelayKey, on: bool) -> Self {
        Self::Switch {
            room: key.room.clone(),
            relay: key.relay.clone(),
            action: if on { "ON" } else { "OFF" },
        }
    }

    pub fn motion(key: &RelayKey, enabled: bool) -> Self {
        Self::Motion {
            room: key.room.clone(),
            relay: key.relay.clone(),
            motion_control: enabled,
        }
    }
}

#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn send_control(&self, request: &ControlRequest) -> Result<(), ClientError>;

    async fn upload_audio(&self, room: &str, audio: Vec<u8>) -> Result<(), ClientError>;

    /// `time` is local wall-clock time as "YYYY-MM-DD HH:MM:SS".
    async fn sync_time(&self, time: &str) -> Result<(), ClientError>;
}

pub struct HttpDashboardApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDashboardApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn check_response(resp: reqwest::Response) -> Result<(), ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl DashboardApi for HttpDashboardApi {
    async fn send_control(&self, request: &ControlRequest) -> Result<(), ClientError> {
        debug!("POST /control {:?}", request);
        let resp = self
            .client
            .post(self.url("/control"))
            .json(request)
            .send()
            .await?;
        check_response(resp).await
    }

    async fn upload_audio(&self, room: &str, audio: Vec<u8>) -> Result<(), ClientError> {
        debug!("POST /process_browser_audio room={} ({} bytes)", room, audio.len());
        let resp = self
            .client
            .post(self.url("/process_browser_audio"))
            .query(&[("room", room)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(audio)
            .send()
            .await?;
        check_response(resp).await
    }

    async fn sync_time(&self, time: &str) -> Result<(), ClientError> {
        debug!("POST /sync_time {}", time);
        let resp = self
            .client
            .post(self.url("/sync_time"))
            .json(&serde_json::json!({ "time": time }))
            .send()
            .await?;
        check_response(resp).await
    }
}
