//! Search analytics
//!
//! The orchestrator reports each completed query through a bounded channel.
//! Sending never blocks: when the channel is full or its consumer is gone
//! the event is dropped and a warning is logged. The search itself never
//! fails because of analytics.
//!
//! The consumer side drains events at its own pace and can fold them into an
//! [`AnalyticsSummary`].

use std::collections::BTreeMap;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::warn;
use tread_core::{Metadata, SearchMode};

/// One completed query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    /// Query text, or a description of a non-text query
    pub query_text: String,
    pub query_type: SearchMode,
    /// Filters applied, as a JSON object
    pub filters: Metadata,
    pub result_count: usize,
}

/// Create a connected sink/receiver pair holding at most `capacity` events
pub fn analytics_channel(capacity: usize) -> (AnalyticsSink, AnalyticsReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    (AnalyticsSink { tx }, AnalyticsReceiver { rx })
}

/// Producer half, cheap to clone
#[derive(Debug, Clone)]
pub struct AnalyticsSink {
    tx: Sender<AnalyticsEvent>,
}

impl AnalyticsSink {
    /// Fire and forget
    ///
    /// Returns whether the event was queued.
    pub fn emit(&self, event: AnalyticsEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(
                    target: "tread::analytics",
                    query_type = event.query_type.as_str(),
                    "Analytics channel full, dropping event"
                );
                false
            }
            Err(TrySendError::Disconnected(event)) => {
                warn!(
                    target: "tread::analytics",
                    query_type = event.query_type.as_str(),
                    "Analytics consumer gone, dropping event"
                );
                false
            }
        }
    }
}

/// Consumer half
#[derive(Debug)]
pub struct AnalyticsReceiver {
    rx: Receiver<AnalyticsEvent>,
}

impl AnalyticsReceiver {
    /// Everything queued right now
    pub fn drain(&self) -> Vec<AnalyticsEvent> {
        self.rx.try_iter().collect()
    }

    /// Wait up to `timeout` for the next event
    ///
    /// `None` on timeout or once every sink is dropped and the queue is empty.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<AnalyticsEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Aggregate over a window of events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_searches: usize,
    /// Count per query type name
    pub query_types: BTreeMap<String, usize>,
    pub avg_results_per_search: f64,
}

impl AnalyticsSummary {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a AnalyticsEvent>) -> Self {
        let mut summary = AnalyticsSummary::default();
        let mut total_results = 0usize;
        for event in events {
            summary.total_searches += 1;
            *summary
                .query_types
                .entry(event.query_type.as_str().to_string())
                .or_insert(0) += 1;
            total_results += event.result_count;
        }
        if summary.total_searches > 0 {
            summary.avg_results_per_search =
                total_results as f64 / summary.total_searches as f64;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(mode: SearchMode, results: usize) -> AnalyticsEvent {
        AnalyticsEvent {
            query_text: "red shoes".to_string(),
            query_type: mode,
            filters: Metadata::new(),
            result_count: results,
        }
    }

    #[test]
    fn test_emit_and_drain() {
        let (sink, rx) = analytics_channel(4);
        assert!(sink.emit(event(SearchMode::Text, 3)));
        assert!(sink.emit(event(SearchMode::Image, 1)));
        assert_eq!(rx.len(), 2);
        let events = rx.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].query_type, SearchMode::Text);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_full_channel_drops_without_blocking() {
        let (sink, rx) = analytics_channel(1);
        assert!(sink.emit(event(SearchMode::Text, 1)));
        assert!(!sink.emit(event(SearchMode::Text, 2)));
        assert_eq!(rx.drain().len(), 1);
    }

    #[test]
    fn test_disconnected_consumer_is_tolerated() {
        let (sink, rx) = analytics_channel(4);
        drop(rx);
        assert!(!sink.emit(event(SearchMode::Hybrid, 0)));
    }

    #[test]
    fn test_recv_timeout() {
        let (sink, rx) = analytics_channel(4);
        assert!(rx.recv_timeout(Duration::from_millis(1)).is_none());
        sink.emit(event(SearchMode::Metadata, 7));
        let got = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(got.result_count, 7);
    }

    #[test]
    fn test_summary() {
        let events = vec![
            event(SearchMode::Text, 4),
            event(SearchMode::Text, 2),
            event(SearchMode::Image, 0),
        ];
        let summary = AnalyticsSummary::from_events(&events);
        assert_eq!(summary.total_searches, 3);
        assert_eq!(summary.query_types["text"], 2);
        assert_eq!(summary.query_types["image"], 1);
        assert!((summary.avg_results_per_search - 2.0).abs() < 1e-9);

        assert_eq!(AnalyticsSummary::from_events(std::iter::empty()), AnalyticsSummary::default());
    }
}
