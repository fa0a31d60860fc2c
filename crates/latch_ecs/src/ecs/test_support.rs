//! Deterministic randomness for property-style tests.

/// 64-bit linear congruential generator (Knuth MMIX constants).
/// Reproducible for a given seed on every platform.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        const A: u64 = 6364136223846793005;
        const C: u64 = 1442695040888963407;
        self.state = self.state.wrapping_mul(A).wrapping_add(C);
        // High bits have the longest period.
        (self.state >> 32) as u32
    }

    /// Uniform-ish value in `0..bound`.
    pub fn below(&mut self, bound: u32) -> u32 {
        self.next_u32() % bound
    }
}
