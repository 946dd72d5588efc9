//! Configuration lifecycle: bootstrap, initial read, hot reload, teardown.
//!
//! The active snapshot lives in an [`ArcSwapOption`]; only the reload task
//! writes it, any thread may read it, and a reader sees either the old or
//! the new snapshot, never a mix.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::{mpsc, watch};

use crate::config::error::ConfigError;
use crate::config::loader::{ConfigResolver, LoadResult, WatchedFileSet};
use crate::config::schema::Config;
use crate::config::watcher::ConfigFileWatcher;
use crate::observability::metrics;

/// Outcome of one reload attempt.
pub type ReloadOutcome = Result<Arc<Config>, ConfigError>;

/// Callback receiving reload outcomes. Runs on the reload task.
pub type ReloadCallback = Arc<dyn Fn(ReloadOutcome) + Send + Sync>;

/// Quiet period used to coalesce bursts of file events.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Owns the active configuration snapshot and keeps it in sync with disk.
pub struct ConfigManager {
    on_reload: ReloadCallback,
    active: Arc<ArcSwapOption<Config>>,
    session: Mutex<Option<WatchSession>>,
    debounce: Duration,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("has_snapshot", &self.active.load().is_some())
            .field("debounce", &self.debounce)
            .finish()
    }
}

struct WatchSession {
    watcher: ConfigFileWatcher,
    live: Arc<AtomicBool>,
    stop: watch::Sender<bool>,
}

/// State the reload task needs. The resolver carries the program-argument
/// layer parsed during the initial read.
struct ReloadContext {
    resolver: ConfigResolver,
    files: WatchedFileSet,
    active: Arc<ArcSwapOption<Config>>,
    on_reload: ReloadCallback,
    live: Arc<AtomicBool>,
    debounce: Duration,
}

impl ConfigManager {
    /// Create a manager that reports reloads to `on_reload`.
    pub fn new(on_reload: impl Fn(ReloadOutcome) + Send + Sync + 'static) -> Self {
        Self {
            on_reload: Arc::new(on_reload),
            active: Arc::new(ArcSwapOption::empty()),
            session: Mutex::new(None),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Create a manager that forwards reload outcomes into a channel.
    pub fn with_channel() -> (Self, mpsc::UnboundedReceiver<ReloadOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Self::new(move |outcome| {
            let _ = tx.send(outcome);
        });
        (manager, rx)
    }

    /// Set the quiet period used to coalesce file events.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// The active snapshot, if the initial read has succeeded.
    pub fn current(&self) -> Option<Arc<Config>> {
        self.active.load_full()
    }

    /// Bootstrap, read, validate and start watching.
    ///
    /// Must be called from within a Tokio runtime; the reload task is
    /// spawned onto it. A previous watch session is torn down first. The
    /// snapshot becomes current only once the watcher is running.
    pub fn initiate(
        &self,
        config_dir: impl Into<PathBuf>,
        profile_names: &[String],
        program_args: &BTreeMap<String, String>,
    ) -> Result<LoadResult, ConfigError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        self.teardown();

        let resolver = ConfigResolver::new(config_dir, program_args)?;
        let read = resolver.initial_read(profile_names)?;

        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let watcher = ConfigFileWatcher::start(read.watched.paths(), changes_tx)?;
        self.active.store(Some(read.result.snapshot.clone()));

        let live = Arc::new(AtomicBool::new(true));
        let (stop, stop_rx) = watch::channel(false);
        let ctx = ReloadContext {
            resolver,
            files: read.watched,
            active: self.active.clone(),
            on_reload: self.on_reload.clone(),
            live: live.clone(),
            debounce: self.debounce,
        };
        runtime.spawn(ctx.run(changes_rx, stop_rx));

        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        *session = Some(WatchSession { watcher, live, stop });

        Ok(read.result)
    }

    /// Stop watching. Safe to call any number of times, including before
    /// [`ConfigManager::initiate`].
    pub fn teardown(&self) {
        let session = self.session.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(session) = session {
            session.live.store(false, Ordering::SeqCst);
            let _ = session.stop.send(true);
            session.watcher.stop();
        }
    }
}

impl Drop for ConfigManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl ReloadContext {
    async fn run(self, mut changes: mpsc::UnboundedReceiver<()>, mut stop: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                _ = stop.changed() => break,
                change = changes.recv() => {
                    if change.is_none() {
                        break;
                    }
                }
            }

            tokio::time::sleep(self.debounce).await;
            while changes.try_recv().is_ok() {}

            if !self.live.load(Ordering::SeqCst) {
                break;
            }
            let resolver = self.resolver.clone();
            let files = self.files.clone();
            let outcome = match tokio::task::spawn_blocking(move || resolver.resolve(&files)).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Config resolution task failed: {}", e);
                    continue;
                }
            };
            if !self.live.load(Ordering::SeqCst) {
                tracing::debug!("Discarding config reload finished after teardown");
                break;
            }
            self.deliver(outcome);
        }
        tracing::debug!("Config reload task exiting");
    }

    fn deliver(&self, outcome: Result<Config, ConfigError>) {
        match outcome {
            Ok(config) => {
                if self.active.load().as_deref() == Some(&config) {
                    tracing::debug!("New config identical to previous, skipping");
                    metrics::record_reload("unchanged");
                    return;
                }
                let config = Arc::new(config);
                self.active.store(Some(config.clone()));
                tracing::info!("Config reloaded");
                metrics::record_reload("applied");
                (self.on_reload)(Ok(config));
            }
            Err(e) => {
                tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
                metrics::record_reload("failed");
                (self.on_reload)(Err(e));
            }
        }
    }
}
