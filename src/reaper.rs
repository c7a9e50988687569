use std::sync::Arc;
use std::time::Duration;

use crate::registry::Registry;

/// Periodic sweep that stops any supervisor that is running but has gone idle.
/// Runs as a single background task for the process lifetime; errors from an
/// individual stop are logged and never abort the loop.
pub async fn run(registry: Arc<Registry>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        for supervisor in registry.all() {
            if supervisor.is_running() && !supervisor.liveness.is_active() {
                tracing::info!(id = %supervisor.spec.id, "reaping idle stream");
                supervisor.stop().await;
            }
        }
    }
}
