/*!
 * Instrumentation
 * Decorators that observe a policy without changing what it hands out
 */

pub mod corruption;
pub mod options;
mod records;
pub mod stats;

pub use corruption::{CorruptionPolicy, CorruptionReport, Guard, MemoryCorruptionDetector};
pub use options::StatsOptions;
pub use records::AllocationRecord;
pub use stats::{AllocatorWithStats, StatsSnapshot};
