use super::{ConnectError, ConnectNode, NodeKey};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Spacing between identifies allowed by the gateway
pub const DEFAULT_CONNECT_INTERVAL: Duration = Duration::from_secs(5);

struct Running {
    key: NodeKey,
    /// Removed while running; must not be queued again
    cancelled: bool,
}

type WorkerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default)]
struct State {
    queue: VecDeque<Arc<dyn ConnectNode>>,
    worker_running: bool,
    last_run: Option<Instant>,
    running: Option<Running>,
}

impl State {
    fn remove_where(&mut self, pred: impl Fn(&NodeKey) -> bool) -> usize {
        let before = self.queue.len();
        self.queue.retain(|node| !pred(&node.key()));
        if let Some(running) = self.running.as_mut() {
            if pred(&running.key) {
                running.cancelled = true;
            }
        }
        before - self.queue.len()
    }

    fn push(&mut self, node: Arc<dyn ConnectNode>) {
        let key = node.key();
        self.queue.retain(|queued| queued.key() != key);
        self.queue.push_back(node);
    }
}

struct Shared {
    state: Mutex<State>,
    min_interval: Duration,
}

/// Serializes connect attempts across connections
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct ConnectScheduler {
    shared: Arc<Shared>,
}

impl ConnectScheduler {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                min_interval,
            }),
        }
    }

    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.shared.min_interval
    }

    /// Queue a node, replacing any queued node with the same key
    pub fn append(&self, node: Arc<dyn ConnectNode>) {
        let key = node.key();
        let mut state = self.shared.state.lock();
        state.push(node);
        tracing::debug!(node = %key, queued = state.queue.len(), "Connect node appended");

        if !state.worker_running {
            state.worker_running = true;
            spawn_worker(Arc::clone(&self.shared));
        }
    }

    /// Drop a queued node; returns whether one was queued
    pub fn remove(&self, key: NodeKey) -> bool {
        self.shared.state.lock().remove_where(|k| *k == key) > 0
    }

    /// Drop every node belonging to a connection
    pub fn remove_connection(&self, connection_id: u64) -> usize {
        let removed = self
            .shared
            .state
            .lock()
            .remove_where(|k| k.connection_id == connection_id);
        if removed > 0 {
            tracing::debug!(connection_id, removed, "Connect nodes removed");
        }
        removed
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.shared.state.lock().queue.iter().any(|n| n.key() == key)
    }

    pub fn contains_connection(&self, connection_id: u64) -> bool {
        self.shared
            .state
            .lock()
            .queue
            .iter()
            .any(|n| n.key().connection_id == connection_id)
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConnectScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_INTERVAL)
    }
}

impl fmt::Debug for ConnectScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ConnectScheduler")
            .field("queued", &state.queue.len())
            .field("worker_running", &state.worker_running)
            .field("min_interval", &self.shared.min_interval)
            .finish()
    }
}

/// The worker respawns itself, so its future needs a nameable type
fn spawn_worker(shared: Arc<Shared>) {
    let worker: WorkerFuture = Box::pin(run_worker(shared));
    tokio::spawn(worker);
}

async fn run_worker(shared: Arc<Shared>) {
    let mut multiple = shared.state.lock().queue.len() > 1;
    tracing::trace!("Connect worker started");

    loop {
        let last_run = shared.state.lock().last_run;
        if let Some(last_run) = last_run {
            tokio::time::sleep_until(last_run + shared.min_interval).await;
        }

        let (node, is_last) = {
            let mut state = shared.state.lock();
            let Some(node) = state.queue.pop_front() else {
                state.worker_running = false;
                return;
            };
            state.running = Some(Running {
                key: node.key(),
                cancelled: false,
            });
            (node, multiple && state.queue.is_empty())
        };

        let key = node.key();
        tracing::debug!(node = %key, is_last, "Running connect node");
        let result = node.run(is_last).await;
        multiple = true;

        let mut state = shared.state.lock();
        state.last_run = Some(Instant::now());
        let cancelled = state.running.take().is_some_and(|r| r.cancelled);

        match result {
            Ok(()) => {}
            Err(_) if cancelled => {
                tracing::debug!(node = %key, "Connect node removed while running, not requeued");
            }
            Err(ConnectError::Recoverable(reason)) => {
                tracing::warn!(node = %key, %reason, "Connect attempt failed, requeueing");
                state.push(node);
            }
            Err(ConnectError::Interrupted) => {
                tracing::warn!(node = %key, "Connect worker interrupted, handing over");
                state.push(node);
                spawn_worker(Arc::clone(&shared));
                return;
            }
        }

        if state.queue.is_empty() {
            state.worker_running = false;
            tracing::trace!("Connect worker idle, exiting");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<(NodeKey, Instant, bool)>>>;

    struct Recording {
        key: NodeKey,
        log: Log,
        fail: bool,
        runtime: Duration,
    }

    #[async_trait]
    impl ConnectNode for Recording {
        fn key(&self) -> NodeKey {
            self.key
        }

        async fn run(&self, is_last: bool) -> Result<(), ConnectError> {
            self.log.lock().push((self.key, Instant::now(), is_last));
            tokio::time::sleep(self.runtime).await;
            if self.fail {
                Err(ConnectError::Recoverable("refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn node(id: u64, log: &Log) -> Arc<dyn ConnectNode> {
        Arc::new(Recording {
            key: NodeKey::start(id),
            log: Arc::clone(log),
            fail: false,
            runtime: Duration::ZERO,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_appends_are_spaced() {
        let scheduler = ConnectScheduler::new(Duration::from_secs(5));
        let log: Log = Arc::default();
        let runtime = tokio::runtime::Handle::current();
        let barrier = Arc::new(std::sync::Barrier::new(6));

        let threads: Vec<_> = (0..6)
            .map(|id| {
                let scheduler = scheduler.clone();
                let log = Arc::clone(&log);
                let runtime = runtime.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let _guard = runtime.enter();
                    barrier.wait();
                    scheduler.append(node(id, &log));
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        tokio::time::sleep(Duration::from_secs(60)).await;

        let log = log.lock();
        assert_eq!(log.len(), 6);
        let mut ids: Vec<u64> = log.iter().map(|(k, _, _)| k.connection_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
        for pair in log.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_secs(5));
        }
        assert!(scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_counts_from_completion() {
        let scheduler = ConnectScheduler::new(Duration::from_secs(5));
        let log: Log = Arc::default();
        for id in 0..2 {
            scheduler.append(Arc::new(Recording {
                key: NodeKey::start(id),
                log: Arc::clone(&log),
                fail: false,
                runtime: Duration::from_secs(3),
            }));
        }

        tokio::time::sleep(Duration::from_secs(30)).await;

        let log = log.lock();
        assert_eq!(log[1].1 - log[0].1, Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_last_flag() {
        let scheduler = ConnectScheduler::new(Duration::from_secs(1));
        let log: Log = Arc::default();

        scheduler.append(node(1, &log));
        tokio::time::sleep(Duration::from_secs(5)).await;
        // A lone node is never "last of a batch"
        assert!(!log.lock()[0].2);

        scheduler.append(node(2, &log));
        scheduler.append(node(3, &log));
        tokio::time::sleep(Duration::from_secs(5)).await;

        let log = log.lock();
        assert!(!log[1].2);
        assert!(log[2].2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_node_does_not_starve_others() {
        let scheduler = ConnectScheduler::new(Duration::from_secs(5));
        let log: Log = Arc::default();

        scheduler.append(Arc::new(Recording {
            key: NodeKey::reconnect(1),
            log: Arc::clone(&log),
            fail: true,
            runtime: Duration::ZERO,
        }));
        scheduler.append(node(2, &log));

        tokio::time::sleep(Duration::from_secs(62)).await;

        let log = log.lock();
        let succeeded = log.iter().filter(|(k, _, _)| k.connection_id == 2).count();
        assert_eq!(succeeded, 1);
        assert!(log.len() > 3, "failing node keeps being retried");
        assert!(scheduler.contains(NodeKey::reconnect(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_append_collapses() {
        let scheduler = ConnectScheduler::new(Duration::from_secs(5));
        let log: Log = Arc::default();

        // Occupy the worker so the rest stay queued
        scheduler.append(node(1, &log));
        scheduler.append(node(2, &log));
        scheduler.append(node(2, &log));
        scheduler.append(node(3, &log));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(scheduler.len(), 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        let ids: Vec<u64> = log.lock().iter().map(|(k, _, _)| k.connection_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_connection_clears_queue() {
        let scheduler = ConnectScheduler::new(Duration::from_secs(5));
        let log: Log = Arc::default();

        scheduler.append(node(1, &log));
        scheduler.append(node(2, &log));
        scheduler.append(Arc::new(Recording {
            key: NodeKey::reconnect(2),
            log: Arc::clone(&log),
            fail: false,
            runtime: Duration::ZERO,
        }));
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(scheduler.contains_connection(2));
        assert_eq!(scheduler.remove_connection(2), 2);
        assert!(!scheduler.contains_connection(2));
        assert!(!scheduler.remove(NodeKey::start(2)));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(log.lock().len(), 1);
    }

    struct Interrupting {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ConnectNode for Interrupting {
        fn key(&self) -> NodeKey {
            NodeKey::start(9)
        }

        async fn run(&self, _is_last: bool) -> Result<(), ConnectError> {
            if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ConnectError::Interrupted)
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_node_is_rerun_by_fresh_worker() {
        let scheduler = ConnectScheduler::new(Duration::from_secs(5));
        let runs = Arc::new(AtomicUsize::new(0));
        scheduler.append(Arc::new(Interrupting {
            runs: Arc::clone(&runs),
        }));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_removed_while_running_is_not_requeued() {
        let scheduler = ConnectScheduler::new(Duration::from_secs(5));
        let log: Log = Arc::default();
        scheduler.append(Arc::new(Recording {
            key: NodeKey::reconnect(4),
            log: Arc::clone(&log),
            fail: true,
            runtime: Duration::from_secs(2),
        }));

        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.remove_connection(4);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(log.lock().len(), 1);
        assert!(scheduler.is_empty());
    }
}
