//! N-input saturating mixer (grounded on `mix_n_s16` in
//! `original_source/src/audio/mixer.c`): sums every connected input
//! into the single output, clamping to the sample range rather than
//! wrapping on overflow.

use sof_core::CoreError;
use sof_core::Result;

use crate::buffer::Buffer;
use crate::component::ComponentOps;

pub struct Mixer;

impl Mixer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

/// Saturating sum of S16LE sample planes, byte-wise.
pub fn mix_s16(inputs: &[Vec<u8>], out: &mut [u8]) {
    let samples = out.len() / 2;
    for i in 0..samples {
        let mut acc: i32 = 0;
        for input in inputs {
            if input.len() >= i * 2 + 2 {
                acc += i16::from_le_bytes([input[i * 2], input[i * 2 + 1]]) as i32;
            }
        }
        let clamped = acc.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        out[i * 2..i * 2 + 2].copy_from_slice(&clamped.to_le_bytes());
    }
}

impl ComponentOps for Mixer {
    fn copy(&mut self, frames: usize, inputs: &mut [&mut Buffer], outputs: &mut [&mut Buffer]) -> Result<i64> {
        let output = outputs.first_mut().ok_or(CoreError::InvalidArgument)?;
        let frame_bytes = output.stream().frame_bytes();
        let want = frames * frame_bytes;

        let mut scratches = Vec::with_capacity(inputs.len());
        for input in inputs.iter_mut() {
            let mut scratch = vec![0u8; want];
            // A short input just leaves its tail zeroed, i.e. silent;
            // an input with nothing to say should never stall the mix.
            let _ = input.consume(&mut scratch);
            scratches.push(scratch);
        }

        let mut out_bytes = vec![0u8; want];
        mix_s16(&scratches, &mut out_bytes);
        output.produce(&out_bytes)?;
        Ok(frames as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_s16_sums_in_range_samples() {
        let a = 1000i16.to_le_bytes().to_vec();
        let b = 2000i16.to_le_bytes().to_vec();
        let mut out = [0u8; 2];
        mix_s16(&[a, b], &mut out);
        assert_eq!(i16::from_le_bytes(out), 3000);
    }

    #[test]
    fn mix_s16_saturates_instead_of_wrapping() {
        let a = i16::MAX.to_le_bytes().to_vec();
        let b = 1000i16.to_le_bytes().to_vec();
        let mut out = [0u8; 2];
        mix_s16(&[a, b], &mut out);
        assert_eq!(i16::from_le_bytes(out), i16::MAX);
    }

    #[test]
    fn mix_s16_treats_missing_sample_as_silence() {
        let a = 500i16.to_le_bytes().to_vec();
        let short: Vec<u8> = Vec::new();
        let mut out = [0u8; 2];
        mix_s16(&[a, short], &mut out);
        assert_eq!(i16::from_le_bytes(out), 500);
    }
}
