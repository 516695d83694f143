//! Byte mover standing in for format/rate conversion (spec Non-goal:
//! the conversion kernel itself; `original_source/src/include/ipc4/
//! copier.h` names this role in the original graph). Moves raw bytes
//! unchanged between buffers whose frame layouts may otherwise differ
//! in channel count or container width.

use sof_core::{CoreError, Result};

use crate::buffer::Buffer;
use crate::component::ComponentOps;

pub struct Copier;

impl Copier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Copier {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentOps for Copier {
    fn copy(&mut self, frames: usize, inputs: &mut [&mut Buffer], outputs: &mut [&mut Buffer]) -> Result<i64> {
        let input = inputs.first_mut().ok_or(CoreError::InvalidArgument)?;
        let output = outputs.first_mut().ok_or(CoreError::InvalidArgument)?;
        let want = frames * input.stream().frame_bytes();

        let mut scratch = vec![0u8; want];
        let read = input.consume(&mut scratch)?;
        output.produce(&scratch[..read])?;
        Ok((read / input.stream().frame_bytes().max(1)) as i64)
    }
}
