//! Untyped chunk storage: aligned blocks, fixed-capacity allocations and the
//! store of shared component values.

mod allocation;
mod block;
mod shared;

pub use allocation::{Allocation, AllocationFull, AllocationHandle};
pub use block::RawBlock;
pub use shared::{SharedValueHandle, SharedValueSet, SharedValueStore};
