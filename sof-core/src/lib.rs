//! Foundational utilities shared by the pipeline engine above this
//! crate: the error taxonomy, explicit cache writeback/invalidate
//! bookkeeping, stack-allocated collections for the scheduler's hot
//! path, and the sample stream descriptor.

pub mod cache;
pub mod error;
pub mod stack_vec;
pub mod stream;

pub use cache::{CachePadded, CoherenceCounters};
pub use error::{CoreError, Result};
pub use stack_vec::StackVec;
pub use stream::{Direction, Interleaving, SampleFormat, StreamParams};
