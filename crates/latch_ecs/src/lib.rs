//! Latch Entity Storage
//!
//! Archetype-based entity/component storage shared by the simulation and
//! sequencer subsystems:
//! - Component registry and fixed-capacity component masks
//! - Archetypes with fixed-capacity, contiguous allocations (chunks)
//! - Mask-filtered allocation iteration and per-chunk execution contexts
//! - Deferred structural mutation via command buffers
//! - Storage configuration and chunk memory accounting

pub mod config;
pub mod ecs;
pub mod memory;

pub use config::{ConfigError, StorageConfig};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
