use tracing::{info, warn};

use crate::App;

pub async fn run(app: App) -> anyhow::Result<()> {
    match app.store.sweep().await? {
        Some(report) => info!(
            "purge finished: scanned={}, removed={}, failed={}",
            report.scanned, report.removed, report.failed
        ),
        None => warn!("another sweep is already running, doing nothing"),
    }
    Ok(())
}
