//! Test-double DMA gateways: no real hardware backs this simulator, so
//! a handful of deterministic channel behaviours stand in for it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sof_core::Result;
use sof_pipeline::interfaces::dma::{DmaChannel, DmaStatus};

/// Generates a deterministic pseudo-random S16LE tone, as if an
/// application were streaming real audio into a playback host buffer.
pub struct ToneSource {
    rng: StdRng,
}

impl ToneSource {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl DmaChannel for ToneSource {
    fn copy(&mut self, buf: &mut [u8]) -> Result<usize> {
        for chunk in buf.chunks_exact_mut(2) {
            let sample: i16 = self.rng.gen_range(-4000..=4000);
            chunk.copy_from_slice(&sample.to_le_bytes());
        }
        Ok(buf.len() - buf.len() % 2)
    }
}

/// Accepts whatever bytes it's handed and counts them, standing in
/// for a codec or a capture application draining the pipeline.
#[derive(Default)]
pub struct Sink {
    pub bytes_received: u64,
}

impl DmaChannel for Sink {
    fn copy(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.bytes_received += buf.len() as u64;
        Ok(buf.len())
    }
}

/// A gateway that never moves a byte and reports itself drained
/// immediately, grounding the "DMA stalls and the pipeline must
/// recover" scenario: the bound ring is left untouched every period,
/// so its producer eventually overruns.
#[derive(Default)]
pub struct Stalled;

impl DmaChannel for Stalled {
    fn copy(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn status(&self) -> DmaStatus {
        DmaStatus::Drained
    }
}

/// A gateway whose hardware side never finishes draining once
/// stopped, grounding the "DMA stop timeout" scenario: `status` keeps
/// reporting `Draining` forever, so a bounded stop-drain wait runs out
/// its clock and resets the channel instead of hanging.
#[derive(Default)]
pub struct NeverStops {
    pub stopped: bool,
    pub reset_calls: u32,
}

impl DmaChannel for NeverStops {
    fn copy(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(buf.len())
    }

    fn stop(&mut self) -> Result<()> {
        self.stopped = true;
        Ok(())
    }

    fn status(&self) -> DmaStatus {
        if self.stopped {
            DmaStatus::Draining
        } else {
            DmaStatus::Running
        }
    }

    fn reset_channel(&mut self) -> Result<()> {
        self.reset_calls += 1;
        Ok(())
    }
}
