//! Calculation progress events
//!
//! Provides the event definitions and the EventBus used to report the
//! progress of a hazard calculation to whoever is listening (a progress
//! bar, a job supervisor). Events are informational only: a calculation
//! never waits for subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Hazard calculation event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CalculationEvent {
    /// Logic trees resolved into realizations
    RealizationsInitialized {
        calculation_id: Uuid,
        num_realizations: usize,
        /// True when realizations were sampled rather than enumerated
        sampled: bool,
        timestamp: DateTime<Utc>,
    },

    /// Task blocks generated for the map phase
    TasksPlanned {
        calculation_id: Uuid,
        num_tasks: usize,
        timestamp: DateTime<Utc>,
    },

    /// One block finished (successfully or not)
    BlockCompleted {
        calculation_id: Uuid,
        block: String,
        succeeded: bool,
        completed: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// All blocks of a realization were folded into its curves
    RealizationCompleted {
        calculation_id: Uuid,
        ordinal: usize,
        timestamp: DateTime<Utc>,
    },

    /// Recovered condition worth surfacing to the user
    Warning {
        calculation_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Curves, statistics and post-processed outputs are complete
    CalculationCompleted {
        calculation_id: Uuid,
        num_curves: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Calculation aborted
    CalculationFailed {
        calculation_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast channel for calculation progress
///
/// Publishing never blocks. A subscriber that falls more than `capacity`
/// events behind sees `RecvError::Lagged` and skips ahead.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CalculationEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Receiver for events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CalculationEvent> {
        self.tx.subscribe()
    }

    /// Send to every current subscriber, returning how many received it
    ///
    /// Fails when nobody is subscribed.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CalculationEvent,
    ) -> Result<usize, broadcast::error::SendError<CalculationEvent>> {
        self.tx.send(event)
    }

    /// Send, dropping the event when nobody is subscribed
    pub fn emit_lossy(&self, event: CalculationEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
