//! Fire-and-forget metrics sink.
//!
//! The room reports counters through this trait and never looks at the
//! result; a missing or broken exporter must not affect correctness. The
//! binary wires in a real sink; everything else defaults to [`NullMetrics`].

/// A sink for room counters.
pub trait MetricsSink: Send + Sync {
    /// Increment a counter by one.
    fn incr(&self, name: &str);

    /// Record an instantaneous value (queue depths, player counts).
    fn record(&self, name: &str, value: i64);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetrics;

impl MetricsSink for NullMetrics {
    fn incr(&self, _name: &str) {}

    fn record(&self, _name: &str, _value: i64) {}
}
