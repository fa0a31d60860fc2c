//! Memory accounting for allocation blocks
//!
//! Tracks the bytes reserved by archetype allocations so callers can budget
//! chunk memory and observe the effect of compaction.

/// Running totals of the memory reserved by allocation blocks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocationTracker {
    reserved_bytes: usize,
    peak_reserved_bytes: usize,
    live_allocations: usize,
}

impl AllocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_allocation(&mut self, bytes: usize) {
        self.reserved_bytes += bytes;
        self.live_allocations += 1;
        self.peak_reserved_bytes = self.peak_reserved_bytes.max(self.reserved_bytes);
    }

    pub fn record_release(&mut self, bytes: usize) {
        debug_assert!(self.live_allocations > 0, "released more allocations than recorded");
        self.reserved_bytes = self.reserved_bytes.saturating_sub(bytes);
        self.live_allocations = self.live_allocations.saturating_sub(1);
    }

    /// Bytes currently held by live allocation blocks.
    pub fn reserved_bytes(&self) -> usize {
        self.reserved_bytes
    }

    /// Highest value `reserved_bytes` has reached.
    pub fn peak_reserved_bytes(&self) -> usize {
        self.peak_reserved_bytes
    }

    pub fn live_allocations(&self) -> usize {
        self.live_allocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_keeps_peak() {
        let mut tracker = AllocationTracker::new();
        tracker.record_allocation(4096);
        tracker.record_allocation(1024);
        tracker.record_release(4096);
        assert_eq!(tracker.reserved_bytes(), 1024);
        assert_eq!(tracker.peak_reserved_bytes(), 5120);
        assert_eq!(tracker.live_allocations(), 1);
    }
}
