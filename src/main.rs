mod app;
mod config;
mod console;
mod control;
mod dashboard;
mod error;
mod recorder;
mod settings;
mod speech;
mod stream;
mod time_sync;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::control::{DashboardApi, HttpDashboardApi};
use crate::recorder::AudioCapture;
use crate::recorder::arecord::ArecordCapture;
use crate::speech::Speaker;
use crate::speech::espeak::EspeakSpeaker;
use crate::speech::queue::SpeechQueue;
use crate::stream::StatusEvent;
use crate::stream::client::{FixedBackoff, HttpStatusSource, StatusStreamClient};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting dashboard client (server={}, relays={}, reconnect={:?})",
        config.server.base_url,
        config.layout.len(),
        config.reconnect_delay(),
    );

    for relay in &config.layout {
        info!("  Relay: {} ({}) as {}", relay.label, relay.key, relay.key.element_id());
    }

    let http_timeout = Duration::from_secs(config.server.http_timeout_secs);
    let api: Arc<dyn DashboardApi> =
        match HttpDashboardApi::new(&config.server.base_url, http_timeout) {
            Ok(api) => Arc::new(api),
            Err(e) => {
                error!("Failed to build HTTP client: {}", e);
                std::process::exit(1);
            }
        };
    let source = match HttpStatusSource::new(&config.server.base_url, http_timeout) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to build status stream client: {}", e);
            std::process::exit(1);
        }
    };

    // Channels
    let (event_tx, mut event_rx) = mpsc::channel::<StatusEvent>(100);
    let (speech_tx, speech_rx) = mpsc::channel::<String>(20);
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<console::ConsoleCommand>(20);

    let stream_client = StatusStreamClient::new(source, FixedBackoff::new(config.reconnect_delay()));
    let stream_handle = tokio::spawn(stream_client.run(event_tx));

    let speaker: Arc<dyn Speaker> = Arc::new(EspeakSpeaker::default());
    let speech = SpeechQueue::new(speaker, config.speech.clone(), config.speech_delay());
    let speech_handle = tokio::spawn(speech.run(speech_rx));

    let console_handle = tokio::spawn(console::read_commands(
        BufReader::new(tokio::io::stdin()),
        cmd_tx,
    ));

    let capture: Arc<dyn AudioCapture> = Arc::new(ArecordCapture::default());
    let mut dashboard = app::Dashboard::new(&config, api, capture, speech_tx);
    info!(
        "Theme: {} (settings in {})",
        dashboard.settings().theme().as_str(),
        dashboard.settings().path().display()
    );

    println!("{}", dashboard.state().render());

    dashboard.sync_time(chrono::Local::now().naive_local()).await;

    // Main loop: apply server events + console commands, handle shutdown
    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                dashboard.handle_event(event).await;
            }
            Some(cmd) = cmd_rx.recv() => {
                dashboard.handle_command(cmd).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                break;
            }
            _ = async {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            } => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    // Cleanup
    stream_handle.abort();
    console_handle.abort();
    drop(dashboard);
    speech_handle.abort();
    info!("Dashboard client stopped");
}
