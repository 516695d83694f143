//! Identity component: moves bytes between two buffers of identical
//! stream layout, unchanged. Used where the graph needs a node (a
//! measurement tap, a placeholder for a not-yet-wired kernel) but no
//! transform.

use sof_core::{CoreError, Result};

use crate::buffer::Buffer;
use crate::component::ComponentOps;

pub struct PassThrough;

impl PassThrough {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PassThrough {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentOps for PassThrough {
    fn copy(&mut self, frames: usize, inputs: &mut [&mut Buffer], outputs: &mut [&mut Buffer]) -> Result<i64> {
        let input = inputs.first_mut().ok_or(CoreError::InvalidArgument)?;
        let output = outputs.first_mut().ok_or(CoreError::InvalidArgument)?;
        debug_assert_eq!(
            input.stream(),
            output.stream(),
            "pass-through connects buffers of matching stream layout"
        );
        let want = frames * input.stream().frame_bytes();

        let mut scratch = vec![0u8; want];
        let read = input.consume(&mut scratch)?;
        output.produce(&scratch[..read])?;
        Ok((read / input.stream().frame_bytes().max(1)) as i64)
    }
}
