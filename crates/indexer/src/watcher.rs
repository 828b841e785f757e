use crate::error::IndexerError;
use crate::indexer::ProjectIndexer;
use log::{error, warn};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Optional file-watcher that enqueues changed files for re-index (spec
/// §4.5 `start_monitoring`/`stop_monitoring`). Debounces bursts of
/// filesystem events into a single `index()` call.
pub struct ProjectWatcher {
    _watcher: RecommendedWatcher,
    shutdown: mpsc::Sender<()>,
}

const DEBOUNCE: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_secs(2);

impl ProjectWatcher {
    pub fn start(indexer: Arc<ProjectIndexer>) -> crate::Result<Self> {
        let (event_tx, mut event_rx) = mpsc::channel::<notify::Result<Event>>(256);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default().with_poll_interval(POLL_INTERVAL),
        )
        .map_err(|e| IndexerError::Other(format!("watcher init failed: {e}")))?;
        watcher
            .watch(indexer.root(), RecursiveMode::Recursive)
            .map_err(|e| IndexerError::Other(format!("failed to watch project root: {e}")))?;

        tokio::spawn(async move {
            let mut pending = false;
            let mut deadline = Instant::now() + DEBOUNCE;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    maybe_event = event_rx.recv() => {
                        match maybe_event {
                            Some(Ok(_)) => {
                                pending = true;
                                deadline = Instant::now() + DEBOUNCE;
                            }
                            Some(Err(err)) => warn!("file watcher error: {err}"),
                            None => break,
                        }
                    }
                    _ = tokio::time::sleep_until(deadline), if pending => {
                        pending = false;
                        if let Err(err) = indexer.index(None).await {
                            error!("watch-triggered index() failed for {}: {err}", indexer.project_id());
                        }
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            shutdown: shutdown_tx,
        })
    }

    pub async fn stop(&self) {
        let _ = self.shutdown.send(()).await;
    }
}
