use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::control::DashboardApi;
use crate::settings::Settings;

/// "YYYY-MM-DD HH:MM:SS"
pub fn format_time(time: &NaiveDateTime) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Push the local clock to the server once per session.
/// Returns true if a sync request succeeded during this call.
pub async fn sync_once(
    api: &dyn DashboardApi,
    settings: &mut Settings,
    now: NaiveDateTime,
) -> bool {
    if settings.time_synced() {
        return false;
    }

    let time = format_time(&now);
    info!("Syncing server time to: {}", time);
    match api.sync_time(&time).await {
        Ok(()) => {
            info!("Time synced successfully");
            settings.mark_time_synced();
            true
        }
        Err(e) => {
            warn!("Time sync failed: {}", e);
            false
        }
    }
}
