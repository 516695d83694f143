//! Error taxonomy shared by every crate above this one.
//!
//! Each layer propagates the innermost kind and only adds context; no
//! layer is allowed to silently turn `Fatal` into something recoverable.

use std::fmt;

/// Error kinds for pipeline/component/buffer operations.
///
/// Unlike a C-ABI error code, variants here carry the context that
/// makes them actionable (a deficit in bytes, a diagnostic string for
/// `Fatal`) since there is no FFI boundary in this workspace to keep
/// the type `repr(C)`-compatible for.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A referenced id does not exist.
    InvalidResource,
    /// Lifecycle command illegal from the current state.
    InvalidState,
    /// Shape/size/format mismatch between connected components.
    InvalidArgument,
    /// Allocator refused.
    OutOfMemory,
    /// Another core or task holds the required resource.
    Busy,
    /// Consumer outran the producer on a Buffer.
    Underrun {
        /// Bytes short of the requested read.
        deficit_bytes: usize,
    },
    /// Producer outran the consumer on a Buffer.
    Overrun {
        /// Bytes that did not fit and were dropped.
        deficit_bytes: usize,
    },
    /// A bounded wait (DMA stop, task drain) exceeded its bound.
    Timeout,
    /// Invariant violation: double-free, an unbroken cycle, a corrupted header.
    Fatal(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidResource => write!(f, "invalid resource"),
            CoreError::InvalidState => write!(f, "invalid state"),
            CoreError::InvalidArgument => write!(f, "invalid argument"),
            CoreError::OutOfMemory => write!(f, "out of memory"),
            CoreError::Busy => write!(f, "busy"),
            CoreError::Underrun { deficit_bytes } => write!(f, "underrun: {deficit_bytes} bytes short"),
            CoreError::Overrun { deficit_bytes } => write!(f, "overrun: {deficit_bytes} bytes dropped"),
            CoreError::Timeout => write!(f, "timeout"),
            CoreError::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

/// Result type alias used throughout the pipeline engine.
pub type Result<T> = std::result::Result<T, CoreError>;
