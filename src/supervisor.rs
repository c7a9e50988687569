use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant as TokioInstant;

use crate::error::GatewayError;
use crate::liveness::Liveness;
use crate::logsink::RotatingWriter;
use crate::spawner::{self, KeepFiles};

/// Outcome of the readiness race in `start_child`. Exactly one variant is ever
/// produced per attempt: whichever of "playlist appeared", "child exited", or
/// "deadline elapsed" completes first. `tokio::select!` is the single-resolution
/// primitive here — no separate done-channel or once-guard is needed because only
/// one branch of a `select!` ever runs to completion.
enum Readiness {
    Ready,
    ChildExited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
}

async fn race_readiness(playlist_path: &std::path::Path, child: &mut Child, wait_timeout: Duration) -> Readiness {
    let mut poll = tokio::time::interval(Duration::from_millis(25));
    let deadline = tokio::time::sleep(wait_timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = poll.tick() => {
                if playlist_path.exists() {
                    return Readiness::Ready;
                }
            }
            status = child.wait() => return Readiness::ChildExited(status),
            _ = &mut deadline => return Readiness::TimedOut,
        }
    }
}

pub struct StreamSpec {
    pub id: String,
    pub original_uri: String,
    pub store_dir: PathBuf,
    pub binary: String,
    pub audio_enabled: bool,
    pub keep_files: bool,
    pub wait_timeout: Duration,
}

struct Running {
    child: Child,
    log_task: Option<tokio::task::JoinHandle<()>>,
}

/// Owns one transcoder child process and its output directory. Transitions
/// (start/restart/stop) are serialized by `transition`; `running` is a plain
/// atomic so readers (the reaper, `/list`) never contend with an in-flight
/// transition for a simple liveness check.
pub struct Supervisor {
    pub spec: StreamSpec,
    pub liveness: Liveness,
    running: AtomicBool,
    transition: AsyncMutex<Option<Running>>,
    log_sink_config: Option<LogSinkConfig>,
}

pub struct LogSinkConfig {
    pub dir: PathBuf,
    pub max_size_bytes: u64,
    pub max_age: Duration,
    pub max_backups: u32,
    pub compress: bool,
}

impl Supervisor {
    pub fn new(spec: StreamSpec, active_window: Duration, log_sink_config: Option<LogSinkConfig>) -> Self {
        Supervisor {
            spec,
            liveness: Liveness::new(active_window),
            running: AtomicBool::new(false),
            transition: AsyncMutex::new(None),
            log_sink_config,
        }
    }

    pub fn playlist_path(&self) -> PathBuf {
        self.spec.store_dir.join("index.m3u8")
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts the transcoder if not already running. Idempotent: a second call
    /// while already running returns immediately without spawning anything.
    pub async fn start(&self) -> Result<(), GatewayError> {
        let mut slot = self.transition.lock().await;
        if slot.is_some() && self.running.load(Ordering::Acquire) {
            return Ok(());
        }
        self.launch(&mut slot).await
    }

    /// Kills the current child (if any) and launches a fresh one.
    pub async fn restart(&self) -> Result<(), GatewayError> {
        let mut slot = self.transition.lock().await;
        if let Some(mut running) = slot.take() {
            let _ = running.child.start_kill();
            if let Some(h) = running.log_task.take() {
                h.abort();
            }
        }
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if was_running {
            crate::metrics::STREAMS_RUNNING.dec();
        }
        crate::metrics::TRANSCODER_RESTARTS_TOTAL.inc();
        self.launch(&mut slot).await
    }

    async fn launch(&self, slot: &mut Option<Running>) -> Result<(), GatewayError> {
        tokio::fs::create_dir_all(&self.spec.store_dir)
            .await
            .map_err(|e| GatewayError::Internal(e.into()))?;

        let keep = if self.spec.keep_files { KeepFiles::Keep } else { KeepFiles::Delete };
        let args = spawner::build_args(&self.spec.original_uri, &self.spec.store_dir, self.spec.audio_enabled, keep);

        let mut child = spawner::spawn(&self.spec.binary, &args)
            .map_err(|e| GatewayError::TranscoderStartFailure(e.to_string()))?;

        let log_task = self.attach_log_sink(&mut child);

        let playlist = self.playlist_path();
        let started_at = TokioInstant::now();
        let outcome = race_readiness(&playlist, &mut child, self.spec.wait_timeout).await;

        match outcome {
            Readiness::Ready => {
                self.running.store(true, Ordering::Release);
                crate::metrics::STREAMS_RUNNING.inc();
                tracing::info!(
                    id = %self.spec.id,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "stream ready"
                );
                *slot = Some(Running { child, log_task });
                Ok(())
            }
            Readiness::ChildExited(status) => {
                self.running.store(false, Ordering::Release);
                crate::metrics::TRANSCODER_CRASHES_TOTAL.inc();
                if let Some(h) = log_task {
                    h.abort();
                }
                Err(GatewayError::TranscoderStartFailure(format!(
                    "transcoder exited before producing a playlist: {status:?}"
                )))
            }
            Readiness::TimedOut => {
                let _ = child.start_kill();
                self.running.store(false, Ordering::Release);
                if let Some(h) = log_task {
                    h.abort();
                }
                Err(GatewayError::TranscoderStartFailure(format!(
                    "transcoder did not produce a playlist within {:?}",
                    self.spec.wait_timeout
                )))
            }
        }
    }

    fn attach_log_sink(&self, child: &mut Child) -> Option<tokio::task::JoinHandle<()>> {
        let cfg = self.log_sink_config.as_ref()?;
        let stdout = child.stdout.take()?;
        let stderr = child.stderr.take()?;
        let writer = RotatingWriter::create(
            &cfg.dir,
            &self.spec.id,
            cfg.max_size_bytes,
            cfg.max_age,
            cfg.max_backups,
            cfg.compress,
        )
        .ok()?;
        let writer = Arc::new(std::sync::Mutex::new(writer));

        let w1 = Arc::clone(&writer);
        let w2 = Arc::clone(&writer);
        let id = self.spec.id.clone();

        Some(tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut out = stdout;
            let mut err = stderr;
            let mut out_buf = [0u8; 4096];
            let mut err_buf = [0u8; 4096];
            loop {
                tokio::select! {
                    n = out.read(&mut out_buf) => {
                        match n {
                            Ok(0) | Err(_) => break,
                            Ok(n) => { let mut w = w1.lock().unwrap_or_else(|e| e.into_inner()); let _ = std::io::Write::write_all(&mut *w, &out_buf[..n]); }
                        }
                    }
                    n = err.read(&mut err_buf) => {
                        match n {
                            Ok(0) | Err(_) => break,
                            Ok(n) => { let mut w = w2.lock().unwrap_or_else(|e| e.into_inner()); let _ = std::io::Write::write_all(&mut *w, &err_buf[..n]); }
                        }
                    }
                }
            }
            tracing::debug!(id = %id, "log sink task exiting");
        }))
    }

    /// Kills the child (if alive) and, unless configured to keep files, removes the
    /// output directory. "process already finished" style errors from the kill call
    /// are treated as success since the end state (no running child) is identical.
    pub async fn stop(&self) {
        self.liveness.deactivate();
        let mut slot = self.transition.lock().await;
        if let Some(mut running) = slot.take() {
            match running.child.start_kill() {
                Ok(()) | Err(_) => {}
            }
            let _ = running.child.wait().await;
            if let Some(h) = running.log_task.take() {
                h.abort();
            }
        }
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if was_running {
            crate::metrics::STREAMS_RUNNING.dec();
        }

        if !self.spec.keep_files {
            if let Err(e) = tokio::fs::remove_dir_all(&self.spec.store_dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(id = %self.spec.id, error = %e, "failed to remove stream directory");
                }
            }
        }
    }
}
