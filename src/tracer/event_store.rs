//! Event storage with callbacks and filtering
//!
//! This module provides thread-safe storage for recorded run events, with
//! support for an on-store callback, filtering by time range and custom
//! predicates, and per-run lineage queries.

use super::run_events::{EventFilterFn, RunTraceEvent};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Type alias for event callback functions
pub type EventCallback = Arc<dyn Fn(&dyn RunTraceEvent) + Send + Sync>;

/// Store for capturing and querying recorded run events
///
/// EventStore provides thread-safe storage with support for:
/// - A callback triggered on each stored event
/// - Filtering by time range
/// - Custom filter predicates
/// - Query for the last N events
/// - Query for all events of one run
pub struct EventStore {
    events: Mutex<Vec<Box<dyn RunTraceEvent>>>,
    on_store_callback: Option<EventCallback>,
}

impl EventStore {
    /// Create a new event store
    ///
    /// # Arguments
    ///
    /// * `on_store_callback` - Optional callback function called whenever an event is stored
    pub fn new(on_store_callback: Option<EventCallback>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            on_store_callback,
        }
    }

    /// Store an event.
    ///
    /// If a callback is configured, it is called with the event before the
    /// event is stored.
    pub fn store(&self, event: Box<dyn RunTraceEvent>) {
        if let Some(callback) = &self.on_store_callback {
            callback(event.as_ref());
        }

        let mut events = self.events.lock().unwrap();
        events.push(event);
    }

    /// Count events matching filters
    ///
    /// # Arguments
    ///
    /// * `start_time` - Include events with timestamp >= start_time
    /// * `end_time` - Include events with timestamp <= end_time
    /// * `filter_func` - Custom filter function to apply to events
    pub fn count_events(
        &self,
        start_time: Option<f64>,
        end_time: Option<f64>,
        filter_func: Option<&dyn EventFilterFn>,
    ) -> usize {
        let events = self.events.lock().unwrap();
        events
            .iter()
            .filter(|e| Self::passes(e.as_ref(), start_time, end_time, filter_func))
            .count()
    }

    /// Get summaries of events matching filters
    ///
    /// # Arguments
    ///
    /// * `start_time` - Include events with timestamp >= start_time
    /// * `end_time` - Include events with timestamp <= end_time
    /// * `filter_func` - Custom filter function to apply to events
    ///
    /// # Returns
    ///
    /// Vector of event summaries matching the filter criteria
    pub fn get_event_summaries(
        &self,
        start_time: Option<f64>,
        end_time: Option<f64>,
        filter_func: Option<&dyn EventFilterFn>,
    ) -> Vec<String> {
        let events = self.events.lock().unwrap();
        events
            .iter()
            .filter(|e| Self::passes(e.as_ref(), start_time, end_time, filter_func))
            .map(|e| e.printable_summary())
            .collect()
    }

    /// Get the last N event summaries, optionally filtered
    pub fn get_last_n_summaries(
        &self,
        n: usize,
        filter_func: Option<&dyn EventFilterFn>,
    ) -> Vec<String> {
        let events = self.events.lock().unwrap();

        let filtered: Vec<_> = events
            .iter()
            .filter(|e| filter_func.map_or(true, |f| f.matches(e.as_ref())))
            .collect();

        let start_idx = filtered.len().saturating_sub(n);
        filtered[start_idx..].iter().map(|e| e.printable_summary()).collect()
    }

    /// Get summaries of every event recorded for one run, in arrival order
    pub fn events_for_run(&self, run_id: Uuid) -> Vec<String> {
        let events = self.events.lock().unwrap();
        events
            .iter()
            .filter(|e| e.run_id() == run_id)
            .map(|e| e.printable_summary())
            .collect()
    }

    /// Clear all events from the store
    pub fn clear(&self) {
        let mut events = self.events.lock().unwrap();
        events.clear();
    }

    /// Get the total number of events in the store
    pub fn len(&self) -> usize {
        let events = self.events.lock().unwrap();
        events.len()
    }

    /// Check if the event store is empty
    pub fn is_empty(&self) -> bool {
        let events = self.events.lock().unwrap();
        events.is_empty()
    }

    fn passes(
        event: &dyn RunTraceEvent,
        start_time: Option<f64>,
        end_time: Option<f64>,
        filter_func: Option<&dyn EventFilterFn>,
    ) -> bool {
        if let Some(start) = start_time {
            if event.timestamp() < start {
                return false;
            }
        }

        if let Some(end) = end_time {
            if event.timestamp() > end {
                return false;
            }
        }

        filter_func.map_or(true, |f| f.matches(event))
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(None)
    }
}
