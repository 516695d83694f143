//! Fixed-point gain stage (grounded on the dB-to-linear idea in
//! `bbx_dsp::blocks::effectors::gain`, simplified to a single Q16
//! linear multiplier since smoothing/dB curves are DSP-kernel detail
//! out of scope here).

use sof_core::{CoreError, Result};

use crate::buffer::Buffer;
use crate::component::ComponentOps;

const Q16_UNITY: i64 = 1 << 16;

pub struct Volume {
    gain_q16: i64,
}

impl Volume {
    pub fn new() -> Self {
        Self { gain_q16: Q16_UNITY }
    }

    /// Sets the linear gain as a Q16.16 fixed-point value.
    pub fn set_gain_q16(&mut self, gain_q16: i64) {
        self.gain_q16 = gain_q16;
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentOps for Volume {
    fn copy(&mut self, frames: usize, inputs: &mut [&mut Buffer], outputs: &mut [&mut Buffer]) -> Result<i64> {
        let input = inputs.first_mut().ok_or(CoreError::InvalidArgument)?;
        let output = outputs.first_mut().ok_or(CoreError::InvalidArgument)?;
        let frame_bytes = input.stream().frame_bytes();
        let want = frames * frame_bytes;

        let mut scratch = vec![0u8; want];
        let _ = input.consume(&mut scratch);

        for chunk in scratch.chunks_exact_mut(2) {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]) as i64;
            let scaled = (sample * self.gain_q16) >> 16;
            let clamped = scaled.clamp(i16::MIN as i64, i16::MAX as i64) as i16;
            chunk.copy_from_slice(&clamped.to_le_bytes());
        }

        output.produce(&scratch)?;
        Ok(frames as i64)
    }
}
