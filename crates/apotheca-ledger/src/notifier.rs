//! # Change Notifier
//!
//! A typed broadcast channel telling dependent views to re-query after any
//! successful mutation.
//!
//! ## Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Change Notification Flow                           │
//! │                                                                         │
//! │  MutationEngine ──commit──► notifier.notify()                          │
//! │                                  │                                      │
//! │               ┌──────────────────┼──────────────────┐                   │
//! │               ▼                  ▼                  ▼                   │
//! │         stock grid         low-stock alert     dashboard tile          │
//! │         (re-query)         (re-query)          (re-query)              │
//! │                                                                         │
//! │  • Zero payload: subscribers re-query what they care about             │
//! │  • Fire-and-forget: no delivery guarantee, no replay for late joiners  │
//! │  • Explicit lifecycle: subscribe() hands out a receiver; dropping it   │
//! │    unsubscribes - no ambient singleton                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tokio::sync::broadcast;

/// Capacity of the notification channel. Subscribers that fall further
/// behind than this miss notifications, which is acceptable: the next one
/// triggers the same re-query.
const NOTIFY_CAPACITY: usize = 256;

/// Zero-payload "stock changed somewhere" event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockUpdated;

/// Broadcast notifier owned by the mutation engine.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<StockUpdated>,
}

impl ChangeNotifier {
    /// Creates a notifier with the default capacity.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        ChangeNotifier { tx }
    }

    /// Registers a new subscriber.
    ///
    /// Subscribers only see notifications emitted after this call; there is
    /// no replay.
    pub fn subscribe(&self) -> broadcast::Receiver<StockUpdated> {
        self.tx.subscribe()
    }

    /// Emits one notification to all current subscribers.
    ///
    /// A send error only means there are no subscribers right now, which is
    /// a valid state; it is deliberately discarded.
    pub fn notify(&self) {
        let _ = self.tx.send(StockUpdated);
    }

    /// Number of currently attached subscribers (for diagnostics).
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        ChangeNotifier::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
