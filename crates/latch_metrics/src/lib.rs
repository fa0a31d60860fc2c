//! Latch Metrics - Storage counters for the entity engine
//!
//! Provides zero-cost named counters that completely vanish in production
//! builds via feature flags. The entity storage engine uses them to count
//! structural events (archetypes and allocations created, entity moves,
//! deferred commands applied or rejected).
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use latch_metrics::Counter;
//!
//! let mut counters = Counter::new();
//! counters.increment("allocations_created", 1);
//! println!("allocations: {}", counters.get("allocations_created"));
//! ```
//!
//! In production builds (without `metrics` feature), all instrumentation
//! is compiled out to zero overhead.

#[cfg(feature = "metrics")]
mod counter;

#[cfg(feature = "metrics")]
pub use counter::Counter;

/// Whether counters record anything in this build.
pub const ENABLED: bool = cfg!(feature = "metrics");

// ============================================================================
// Macros for conditional compilation
// ============================================================================

/// Execute code only when metrics are enabled
#[macro_export]
macro_rules! metrics {
    ($($tt:tt)*) => {
        #[cfg(feature = "metrics")]
        {
            $($tt)*
        }
    };
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default, Clone)]
pub struct Counter;

#[cfg(not(feature = "metrics"))]
impl Counter {
    pub fn new() -> Self { Self }
    pub fn increment(&mut self, _name: &'static str, _value: u64) {}
    pub fn set(&mut self, _name: &'static str, _value: u64) {}
    pub fn get(&self, _name: &str) -> u64 { 0 }
    pub fn reset_all(&mut self) {}
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ { std::iter::empty() }
}

#[cfg(test)]
mod tests {
    use super::Counter;

    #[test]
    fn counter_api_is_available_in_every_build() {
        let mut counter = Counter::new();
        counter.increment("allocations_created", 2);
        counter.set("entity_moves", 7);
        if super::ENABLED {
            assert_eq!(counter.get("allocations_created"), 2);
            assert_eq!(counter.get("entity_moves"), 7);
        } else {
            assert_eq!(counter.get("allocations_created"), 0);
        }
        counter.reset_all();
        assert_eq!(counter.get("allocations_created"), 0);
    }
}
