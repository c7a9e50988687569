use std::future::Future;
use std::sync::Arc;

use crate::registry::Registry;

/// Resolves on SIGINT or (on unix) SIGTERM. Kept separate from `drain` so tests can
/// inject their own trigger future instead of depending on real OS signals.
pub async fn os_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Stops every supervisor in the registry. Awaits `trigger` first, so callers can
/// pass `os_signal()` in production or a test-controlled future in tests; either
/// way this returns only once every stream has been told to stop.
pub async fn drain(registry: Arc<Registry>, trigger: impl Future<Output = ()>) {
    trigger.await;
    tracing::info!("shutdown signal received, draining streams");

    let handles: Vec<_> = registry
        .all()
        .into_iter()
        .map(|supervisor| tokio::spawn(async move { supervisor.stop().await }))
        .collect();

    for handle in handles {
        let _ = handle.await;
    }
    tracing::info!("all streams drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::{StreamSpec, Supervisor};
    use std::time::Duration;

    #[tokio::test]
    async fn drain_stops_every_registered_stream() {
        let base = tempfile::TempDir::new().unwrap();
        let registry = Arc::new(Registry::new());

        for i in 0..3 {
            let store_dir = base.path().join(format!("s{i}"));
            tokio::fs::create_dir_all(&store_dir).await.unwrap();
            let sup = Arc::new(Supervisor::new(
                StreamSpec {
                    id: format!("s{i}"),
                    original_uri: format!("rtsp://cam/{i}"),
                    store_dir,
                    binary: "true".to_string(),
                    audio_enabled: true,
                    keep_files: true,
                    wait_timeout: Duration::from_millis(100),
                },
                Duration::from_secs(60),
                None,
            ));
            registry.insert(sup, None);
        }

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let trigger = async move {
            let _ = rx.await;
        };

        let registry_clone = registry.clone();
        let handle = tokio::spawn(async move { drain(registry_clone, trigger).await });
        let _ = tx.send(());
        handle.await.unwrap();

        for supervisor in registry.all() {
            assert!(!supervisor.is_running());
        }
    }
}
