use std::mem;

use config::shared::BatchConfig;

use crate::types::{SizeHint, TableEvent};

/// Events waiting to be posted to a single Data Source, with their accumulated size.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    events: Vec<TableEvent>,
    size_bytes: usize,
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns the delivered size of the buffered events in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Returns `true` if the buffer must be flushed before `event` can be added.
    ///
    /// That is the case when adding it would exceed the byte ceiling or when the buffer already
    /// holds the maximum number of events. An empty buffer always accepts the event, so a single
    /// event larger than the byte ceiling still forms a batch of its own.
    pub fn needs_flush_before(&self, event: &TableEvent, config: &BatchConfig) -> bool {
        if self.events.is_empty() {
            return false;
        }

        self.size_bytes + event.size_hint() > config.max_bytes
            || self.events.len() >= config.max_records
    }

    pub fn push(&mut self, event: TableEvent) {
        self.size_bytes += event.size_hint();
        self.events.push(event);
    }

    /// Empties the buffer, returning its events and resetting the accumulated size.
    pub fn take(&mut self) -> Vec<TableEvent> {
        self.size_bytes = 0;
        mem::take(&mut self.events)
    }
}
