// External crates
use tokio::sync::broadcast;
use tracing::instrument;

/// Shutdown broadcaster shared by running pipelines.
///
/// - Each pipeline task calls `.subscribe()` to get its own receiver before it is spawned.
/// - Calling `.trigger()` sends the shutdown signal to every subscriber at once.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// A small buffer is enough since only one message is ever sent.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    #[instrument(name = "shutdown::subscribe", skip_all, level = "trace")]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        tracing::trace!("Shutdown subscriber created");
        self.tx.subscribe()
    }

    #[instrument(name = "shutdown::trigger", skip_all, level = "trace")]
    pub fn trigger(&self) {
        tracing::trace!(
            subscribers = self.tx.receiver_count(),
            "Shutdown triggered, notifying subscribers"
        );
        let _ = self.tx.send(());
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
