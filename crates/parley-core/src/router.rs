//! Message routing and fan-out.
//!
//! Messages enter a bounded queue and are drained by a fixed worker
//! pool. Each message is delivered in one atomic pass over a single
//! registry snapshot, so its recipient set is always consistent. Global
//! order across messages is not guaranteed once multiple workers run;
//! chat messages are independently addressed, so that is acceptable.

use crate::history::History;
use crate::message::{utc_timestamp, Message};
use crate::registry::Registry;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Router errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The bounded queue is full (only from [`Router::try_enqueue`];
    /// [`Router::enqueue`] waits instead).
    #[error("message queue is full")]
    QueueFull,

    /// The router has shut down and accepts no more messages.
    #[error("router is shut down")]
    ShutDown,
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Bounded queue capacity.
    pub queue_capacity: usize,
    /// Fixed worker pool size.
    pub workers: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            workers: 10,
        }
    }
}

/// The message router.
///
/// Owns the bounded queue and the worker pool; reads the registry for
/// fan-out and records every accepted message into history.
pub struct Router {
    registry: Arc<Registry>,
    history: Arc<History>,
    tx: Mutex<Option<mpsc::Sender<Message>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Router {
    /// Create the router and spawn its worker pool.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(config: RouterConfig, registry: Arc<Registry>, history: Arc<History>) -> Self {
        info!(
            queue = config.queue_capacity,
            workers = config.workers,
            "starting router"
        );
        let (tx, rx) = mpsc::channel::<Message>(config.queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let workers = (0..config.workers)
            .map(|id| {
                let rx = Arc::clone(&rx);
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    loop {
                        // Workers share the receiver; the lock is held only
                        // across the dequeue, never across delivery.
                        let msg = rx.lock().await.recv().await;
                        match msg {
                            Some(msg) => deliver(&registry, &msg).await,
                            None => break,
                        }
                    }
                    trace!(worker = id, "router worker stopped");
                })
            })
            .collect();

        Self {
            registry,
            history,
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<Message>, RouterError> {
        self.tx
            .lock()
            .unwrap()
            .as_ref()
            .cloned()
            .ok_or(RouterError::ShutDown)
    }

    /// Enqueue a message, waiting for queue space if needed, and record
    /// it into history. Nothing is ever silently dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::ShutDown`] after shutdown.
    pub async fn enqueue(&self, msg: Message) -> Result<(), RouterError> {
        let tx = self.sender()?;
        let timestamp = utc_timestamp();
        tx.send(msg.clone())
            .await
            .map_err(|_| RouterError::ShutDown)?;
        self.history.record(&msg, &timestamp);
        Ok(())
    }

    /// Non-waiting variant of [`Router::enqueue`].
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::QueueFull`] when the queue is at capacity.
    pub fn try_enqueue(&self, msg: Message) -> Result<(), RouterError> {
        let tx = self.sender()?;
        let timestamp = utc_timestamp();
        tx.try_send(msg.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RouterError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => RouterError::ShutDown,
        })?;
        self.history.record(&msg, &timestamp);
        Ok(())
    }

    /// Stop accepting messages, drain the queue, and wait for every
    /// in-flight delivery to complete.
    pub async fn shutdown(&self) {
        // Closing the channel lets workers finish what is queued.
        self.tx.lock().unwrap().take();
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock().unwrap());
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "router worker panicked");
            }
        }
        info!("router drained");
    }
}

/// Deliver one message to every eligible session in one snapshot pass.
///
/// A single recipient's write failure is logged and skipped; the
/// session's own loops detect the broken transport independently.
async fn deliver(registry: &Registry, msg: &Message) {
    let snapshot = registry.snapshot();
    let mut delivered = 0usize;
    for (username, conn) in snapshot {
        if !msg.addressed_to(&username) {
            continue;
        }
        match conn.send_line(msg.rendered()).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                warn!(user = %username, error = %e, "delivery failed");
            }
        }
    }
    debug!(
        kind = ?msg.kind(),
        recipients = delivered,
        "message delivered"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, ConnectionError};
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    /// Records every delivered line.
    struct RecordingConnection {
        lines: Mutex<Vec<String>>,
    }

    impl RecordingConnection {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                lines: Mutex::new(Vec::new()),
            })
        }

        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connection for RecordingConnection {
        async fn send_line(&self, line: &str) -> Result<(), ConnectionError> {
            self.lines.lock().unwrap().push(line.to_string());
            Ok(())
        }
        async fn close(&self) {}
    }

    /// Fails every write.
    struct BrokenConnection;

    #[async_trait]
    impl Connection for BrokenConnection {
        async fn send_line(&self, _line: &str) -> Result<(), ConnectionError> {
            Err(ConnectionError::Closed)
        }
        async fn close(&self) {}
    }

    fn setup() -> (Arc<Registry>, Arc<History>) {
        let registry = Arc::new(Registry::new());
        let history = Arc::new(History::new(100, Arc::new(MemoryStore::new())));
        (registry, history)
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone() {
        let (registry, history) = setup();
        let alice = RecordingConnection::new();
        let bob = RecordingConnection::new();
        registry.register("alice", alice.clone()).unwrap();
        registry.register("bob", bob.clone()).unwrap();

        let router = Router::start(RouterConfig::default(), registry, Arc::clone(&history));
        router
            .enqueue(Message::broadcast("alice", "hello"))
            .await
            .unwrap();
        router.shutdown().await;

        assert_eq!(alice.lines(), vec!["[alice] hello"]);
        assert_eq!(bob.lines(), vec!["[alice] hello"]);
        assert_eq!(history.get_all(), vec!["[alice] hello"]);
    }

    #[tokio::test]
    async fn test_private_reaches_target_and_sender_only() {
        let (registry, history) = setup();
        let alice = RecordingConnection::new();
        let bob = RecordingConnection::new();
        let carol = RecordingConnection::new();
        registry.register("alice", alice.clone()).unwrap();
        registry.register("bob", bob.clone()).unwrap();
        registry.register("carol", carol.clone()).unwrap();

        let router = Router::start(RouterConfig::default(), registry, history);
        router
            .enqueue(Message::private("alice", "bob", "secret"))
            .await
            .unwrap();
        router.shutdown().await;

        assert_eq!(alice.lines(), vec!["[PRIVATE from alice] secret"]);
        assert_eq!(bob.lines(), vec!["[PRIVATE from alice] secret"]);
        assert!(carol.lines().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_abort_fanout() {
        let (registry, history) = setup();
        let alice = RecordingConnection::new();
        registry.register("broken", Arc::new(BrokenConnection)).unwrap();
        registry.register("alice", alice.clone()).unwrap();

        let router = Router::start(RouterConfig::default(), registry.clone(), history);
        router.enqueue(Message::system("still delivered")).await.unwrap();
        router.shutdown().await;

        assert_eq!(alice.lines(), vec!["[SYSTEM] still delivered"]);
        // The failing session is not torn down by the router.
        assert!(registry.contains("broken"));
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown() {
        let (registry, history) = setup();
        let router = Router::start(RouterConfig::default(), registry, history);
        router.shutdown().await;

        assert!(matches!(
            router.enqueue(Message::system("late")).await,
            Err(RouterError::ShutDown)
        ));
        assert!(matches!(
            router.try_enqueue(Message::system("late")),
            Err(RouterError::ShutDown)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_messages() {
        let (registry, history) = setup();
        let alice = RecordingConnection::new();
        registry.register("alice", alice.clone()).unwrap();

        // One worker so messages queue up behind each other.
        let config = RouterConfig {
            queue_capacity: 50,
            workers: 1,
        };
        let router = Router::start(config, registry, history);
        for i in 0..20 {
            router
                .enqueue(Message::broadcast("alice", format!("m{i}")))
                .await
                .unwrap();
        }
        router.shutdown().await;

        // Every queued message was delivered before shutdown returned,
        // in submission order under a single worker.
        let lines = alice.lines();
        assert_eq!(lines.len(), 20);
        assert_eq!(lines[0], "[alice] m0");
        assert_eq!(lines[19], "[alice] m19");
    }
}
