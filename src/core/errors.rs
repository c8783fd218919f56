/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 *
 * Ordinary allocation failure is never an error value: policies return the
 * empty block. These errors cover configuration validation, one-time
 * settings and memory corruption reports.
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allocator operation result
pub type AllocResult<T> = Result<T, AllocError>;

/// Which guard of a block was damaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardSide {
    /// Guard in front of the user region (buffer underrun)
    Prefix,
    /// Guard behind the user region (buffer overrun)
    Suffix,
}

impl std::fmt::Display for GuardSide {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            GuardSide::Prefix => write!(f, "prefix"),
            GuardSide::Suffix => write!(f, "suffix"),
        }
    }
}

/// Allocator errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum AllocError {
    #[error("Invalid allocator configuration: {0}")]
    #[diagnostic(
        code(alloc::invalid_config),
        help("Check sizes, bounds and step widths passed at construction time.")
    )]
    InvalidConfig(String),

    #[error("Alignment {0} is not a power of two")]
    #[diagnostic(
        code(alloc::invalid_alignment),
        help("Alignments must be non-zero powers of two.")
    )]
    InvalidAlignment(usize),

    #[error("Size setting is fixed and cannot be changed (current value {0})")]
    #[diagnostic(
        code(alloc::setting_frozen),
        help("Static settings and dynamic settings that were already assigned are immutable.")
    )]
    SettingFrozen(usize),

    #[error("Memory corruption detected at 0x{address:x}: {side} guard expected 0x{expected:x}, found 0x{found:x}")]
    #[diagnostic(
        code(alloc::corruption_detected),
        help("A buffer under- or overrun wrote into the guard region. Memory safety is already violated.")
    )]
    CorruptionDetected {
        address: usize,
        side: GuardSide,
        expected: u64,
        found: u64,
    },
}
