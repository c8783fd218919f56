/*!
 * Core Module
 * Block type, capability contract and the machinery shared by every policy
 */

pub mod block;
pub mod errors;
pub mod limits;
pub mod realloc;
pub mod sync;
pub mod traits;
pub mod tunable;

// Re-export for convenience
pub use block::{round_to_alignment, Block};
pub use errors::*;
pub use sync::{Local, Shared, SharingMode};
pub use traits::*;
pub use tunable::Tunable;
