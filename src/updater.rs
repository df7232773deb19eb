//! Background updater
//!
//! A single-consumer queue that batches enqueued items and applies them
//! through `Engine::add` off the caller's critical path, debounced so a
//! burst of individual `enqueue` calls collapses into one batch. Built on
//! `tokio::sync::Mutex` + `tokio::time::sleep`, matching the teacher's
//! exclusive use of `tokio` for every asynchronous subsystem rather than a
//! bespoke thread+channel primitive (`postgres::server`, `rest::server`).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::embedder::Embedder;
use crate::engine::Engine;
use crate::error::CoreError;
use crate::item::Item;

/// Debounce/batch-size configuration. Defaults match spec §4.7.
#[derive(Debug, Clone, Copy)]
pub struct UpdaterConfig {
    pub batch_delay: Duration,
    pub max_batch_size: usize,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_millis(100),
            max_batch_size: 100,
        }
    }
}

/// Snapshot of the updater's running counters.
#[derive(Debug, Clone, Default)]
pub struct UpdaterStats {
    pub total_processed: u64,
    pub pending_count: usize,
    pub batch_count: u64,
    pub avg_batch_size: f64,
    pub is_processing: bool,
}

struct State {
    queue: VecDeque<Item>,
    stats: UpdaterStats,
    /// Generation counter: bumped on every `enqueue`. A pending debounce
    /// timer checks this before firing so only the most recent one actually
    /// drains the queue; older ones become no-ops rather than racing.
    generation: u64,
}

type ErrorCallback = Arc<dyn Fn(&Item, &CoreError) + Send + Sync>;

/// Batches inserts for an [`Engine`] so callers don't pay the embedding
/// latency of every single `add` inline.
pub struct BackgroundUpdater<E: Embedder + Send + Sync + 'static> {
    engine: Arc<Mutex<Engine<E>>>,
    state: Arc<Mutex<State>>,
    config: UpdaterConfig,
    error_callback: Option<ErrorCallback>,
}

impl<E: Embedder + Send + Sync + 'static> BackgroundUpdater<E> {
    pub fn new(engine: Arc<Mutex<Engine<E>>>, config: UpdaterConfig) -> Self {
        Self {
            engine,
            state: Arc::new(Mutex::new(State {
                queue: VecDeque::new(),
                stats: UpdaterStats::default(),
                generation: 0,
            })),
            config,
            error_callback: None,
        }
    }

    /// Install a callback invoked once per item in any batch that fails to
    /// apply. The queue continues with the next batch regardless (§4.7,
    /// §7 "Recoverable in background").
    pub fn on_error(&mut self, callback: impl Fn(&Item, &CoreError) + Send + Sync + 'static) {
        self.error_callback = Some(Arc::new(callback));
    }

    /// Append items to the pending queue and schedule a debounced batch.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn enqueue(&self, items: Vec<Item>) {
        let generation = {
            let mut state = self.state.lock().await;
            state.queue.extend(items);
            state.stats.pending_count = state.queue.len();
            state.generation += 1;
            state.generation
        };

        let state = self.state.clone();
        let engine = self.engine.clone();
        let config = self.config;
        let error_callback = self.error_callback.clone();

        tokio::spawn(async move {
            sleep(config.batch_delay).await;
            let should_run = {
                let state_guard = state.lock().await;
                state_guard.generation == generation
            };
            if should_run {
                drain(&engine, &state, config, error_callback).await;
            }
        });
    }

    /// Process whatever is queued immediately, without waiting for the
    /// debounce timer.
    pub async fn flush(&self) {
        drain(&self.engine, &self.state, self.config, self.error_callback.clone()).await;
    }

    /// Poll until the queue is empty and no batch is in flight.
    pub async fn wait_for_completion(&self) {
        loop {
            let (empty, processing) = {
                let state = self.state.lock().await;
                (state.queue.is_empty(), state.stats.is_processing)
            };
            if empty && !processing {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn stats(&self) -> UpdaterStats {
        self.state.lock().await.stats.clone()
    }
}

/// Drain the queue in `max_batch_size` chunks, applying each through
/// `Engine::add`. Runs until the queue is empty; errors are reported per
/// item and do not stop the loop.
async fn drain<E: Embedder + Send + Sync + 'static>(
    engine: &Arc<Mutex<Engine<E>>>,
    state: &Arc<Mutex<State>>,
    config: UpdaterConfig,
    error_callback: Option<ErrorCallback>,
) {
    loop {
        let batch: Vec<Item> = {
            let mut state = state.lock().await;
            if state.queue.is_empty() {
                return;
            }
            state.stats.is_processing = true;
            let take = config.max_batch_size.min(state.queue.len());
            state.queue.drain(..take).collect()
        };

        debug!(batch_size = batch.len(), "processing background batch");

        let result = engine.lock().await.add(batch.clone()).await;

        let mut state = state.lock().await;
        state.stats.batch_count += 1;
        state.stats.total_processed += batch.len() as u64;
        state.stats.avg_batch_size = state.stats.total_processed as f64 / state.stats.batch_count as f64;
        state.stats.pending_count = state.queue.len();
        state.stats.is_processing = !state.queue.is_empty();

        if let Err(e) = result {
            warn!(error = %e, batch_size = batch.len(), "background batch failed");
            if let Some(cb) = &error_callback {
                for item in &batch {
                    cb(item, &e);
                }
            }
        }

        if state.queue.is_empty() {
            return;
        }
    }
}

#[cfg(all(test, feature = "test-util"))]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::embedder::TestEmbedder;

    async fn engine(dim: usize) -> Arc<Mutex<Engine<TestEmbedder>>> {
        let e = Engine::build(Vec::new(), EngineConfig::new(dim, "m"), TestEmbedder { dimensions: dim })
            .await
            .unwrap();
        Arc::new(Mutex::new(e))
    }

    #[tokio::test]
    async fn test_enqueue_and_wait_applies_items() {
        let eng = engine(8).await;
        let updater = BackgroundUpdater::new(
            eng.clone(),
            UpdaterConfig { batch_delay: Duration::from_millis(10), max_batch_size: 10 },
        );

        updater.enqueue(vec![Item::new("1", "hello"), Item::new("2", "world")]).await;
        updater.wait_for_completion().await;

        assert_eq!(eng.lock().await.size(), 2);
        let stats = updater.stats().await;
        assert_eq!(stats.total_processed, 2);
        assert_eq!(stats.pending_count, 0);
        assert!(!stats.is_processing);
    }

    #[tokio::test]
    async fn test_flush_processes_immediately() {
        let eng = engine(8).await;
        let updater = BackgroundUpdater::new(
            eng.clone(),
            UpdaterConfig { batch_delay: Duration::from_secs(60), max_batch_size: 10 },
        );

        updater.enqueue(vec![Item::new("1", "hello")]).await;
        updater.flush().await;

        assert_eq!(eng.lock().await.size(), 1);
    }

    #[tokio::test]
    async fn test_max_batch_size_splits_batches() {
        let eng = engine(8).await;
        let updater = BackgroundUpdater::new(
            eng.clone(),
            UpdaterConfig { batch_delay: Duration::from_millis(5), max_batch_size: 2 },
        );

        let items: Vec<Item> = (0..5).map(|i| Item::new(i.to_string(), format!("item {i}"))).collect();
        updater.enqueue(items).await;
        updater.wait_for_completion().await;

        let stats = updater.stats().await;
        assert_eq!(stats.total_processed, 5);
        assert!(stats.batch_count >= 3);
    }

    struct FailingEmbedder;

    #[async_trait::async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str, _model: &str) -> Result<Vec<f32>, crate::embedder::EmbedError> {
            Err(crate::embedder::EmbedError::new("embedder unavailable"))
        }
    }

    #[tokio::test]
    async fn test_error_callback_invoked_and_queue_continues() {
        let eng = Arc::new(Mutex::new(
            Engine::build(Vec::new(), EngineConfig::new(8, "m"), FailingEmbedder)
                .await
                .unwrap(),
        ));
        let mut updater = BackgroundUpdater::new(
            eng.clone(),
            UpdaterConfig { batch_delay: Duration::from_millis(5), max_batch_size: 10 },
        );

        let failure_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let failure_count_cb = failure_count.clone();
        updater.on_error(move |_item, _err| {
            failure_count_cb.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        updater.enqueue(vec![Item::new("1", "ok"), Item::new("2", "also ok")]).await;
        updater.wait_for_completion().await;

        // the embedder always errors, so the whole batch fails and nothing is applied
        assert_eq!(eng.lock().await.size(), 0);
        assert_eq!(failure_count.load(std::sync::atomic::Ordering::SeqCst), 2);
        let stats = updater.stats().await;
        assert_eq!(stats.batch_count, 1);
    }
}
