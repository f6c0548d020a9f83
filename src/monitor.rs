//! Prometheus counters for the SDK
//!
//! Counters are registered on a caller-supplied [`Registry`] so several SDK
//! instances (or tests) never collide in the global default registry.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use crate::error::Result;
use crate::parser::EventKind;

#[derive(Debug, Clone)]
pub struct SdkCounters {
    messages: IntCounterVec,
    decode_errors: IntCounter,
    sequence_gaps: IntCounter,
    views_published: IntCounter,
    updates_buffered: IntCounter,
}

impl SdkCounters {
    pub fn register(registry: &Registry) -> Result<Self> {
        let messages = IntCounterVec::new(
            Opts::new("sdk_messages_total", "Decoded messages by event kind"),
            &["kind"],
        )?;
        let decode_errors = IntCounter::new("sdk_decode_errors_total", "Messages dropped as undecodable")?;
        let sequence_gaps = IntCounter::new("sdk_sequence_gaps_total", "Depth sequence gaps detected")?;
        let views_published = IntCounter::new("sdk_views_published_total", "Order book views published")?;
        let updates_buffered = IntCounter::new(
            "sdk_updates_buffered_total",
            "Depth updates held while awaiting a snapshot",
        )?;

        registry.register(Box::new(messages.clone()))?;
        registry.register(Box::new(decode_errors.clone()))?;
        registry.register(Box::new(sequence_gaps.clone()))?;
        registry.register(Box::new(views_published.clone()))?;
        registry.register(Box::new(updates_buffered.clone()))?;

        Ok(Self {
            messages,
            decode_errors,
            sequence_gaps,
            views_published,
            updates_buffered,
        })
    }

    /// Counters on a private registry nobody scrapes
    pub fn unregistered() -> Result<Self> {
        Self::register(&Registry::new())
    }

    pub fn message(&self, kind: EventKind) {
        self.messages.with_label_values(&[kind.as_str()]).inc();
    }

    pub fn decode_error(&self) {
        self.decode_errors.inc();
    }

    pub fn sequence_gaps(&self, count: usize) {
        self.sequence_gaps.inc_by(count as u64);
    }

    pub fn views_published_by(&self, count: u64) {
        self.views_published.inc_by(count);
    }

    pub fn update_buffered(&self) {
        self.updates_buffered.inc();
    }

    pub fn messages_of(&self, kind: EventKind) -> u64 {
        self.messages.with_label_values(&[kind.as_str()]).get()
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.get()
    }

    pub fn gaps(&self) -> u64 {
        self.sequence_gaps.get()
    }

    pub fn views_published(&self) -> u64 {
        self.views_published.get()
    }

    pub fn updates_buffered(&self) -> u64 {
        self.updates_buffered.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_exported() {
        let registry = Registry::new();
        let counters = SdkCounters::register(&registry).unwrap();
        counters.message(EventKind::DepthUpdate);
        counters.message(EventKind::DepthUpdate);
        counters.decode_error();
        counters.sequence_gaps(2);

        assert_eq!(counters.messages_of(EventKind::DepthUpdate), 2);
        assert_eq!(counters.gaps(), 2);

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"sdk_messages_total".to_string()));
        assert!(names.contains(&"sdk_decode_errors_total".to_string()));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        assert!(SdkCounters::register(&registry).is_ok());
        assert!(SdkCounters::register(&registry).is_err());
    }
}
