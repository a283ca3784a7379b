//! Ordering strategies for a flushed batch of raw events.

use std::fmt::Debug;
use std::sync::Arc;

use super::events::RawEvent;

/// Puts a flushed batch into dispatch order.
pub trait EventOrdering: Send + Sync + Debug {
    fn order(&self, batch: &mut [RawEvent]);
}

/// Keep arrival order.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArrivalOrder;

impl EventOrdering for ArrivalOrder {
    fn order(&self, _batch: &mut [RawEvent]) {}
}

/// Stable sort by the platform sequence id.
///
/// Falls back to arrival order unless every event in the batch carries an id.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceOrder;

impl EventOrdering for SequenceOrder {
    fn order(&self, batch: &mut [RawEvent]) {
        if batch.iter().all(|event| event.sequence.is_some()) {
            batch.sort_by_key(|event| event.sequence);
        }
    }
}

/// Strategy used when none is configured.
#[must_use]
pub fn default_ordering() -> Arc<dyn EventOrdering> {
    Arc::new(SequenceOrder)
}
