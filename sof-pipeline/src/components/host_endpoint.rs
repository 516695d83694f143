//! Host PCM endpoint: the pipeline's edge facing the application.

use sof_core::{CoreError, Direction, Result};

use crate::buffer::Buffer;
use crate::component::{ComponentOps, TriggerCmd};
use crate::interfaces::dma::{stop_and_drain, DmaChannel, DmaStatus, DMA_STOP_POLL_INTERVAL_US};

pub struct HostEndpoint {
    direction: Direction,
    dma: Option<Box<dyn DmaChannel>>,
}

impl HostEndpoint {
    pub fn new(direction: Direction) -> Self {
        Self { direction, dma: None }
    }

    pub fn bind_dma(&mut self, channel: Box<dyn DmaChannel>) {
        self.dma = Some(channel);
    }
}

impl ComponentOps for HostEndpoint {
    fn trigger(&mut self, cmd: TriggerCmd) -> Result<()> {
        let channel = match self.dma.as_deref_mut() {
            Some(channel) => channel,
            None => return Ok(()),
        };
        match cmd {
            TriggerCmd::Start => channel.start(),
            TriggerCmd::Pause => channel.pause(),
            TriggerCmd::Release => channel.release(),
            TriggerCmd::Stop => {
                // A stop that blows its bound is reported, not fatal:
                // the component still finishes its transition to
                // `Prepare` with the channel forced idle by reset.
                if let Err(e) = stop_and_drain(channel, DMA_STOP_POLL_INTERVAL_US) {
                    eprintln!("host endpoint: dma stop exceeded its bound: {e}");
                }
                Ok(())
            }
            TriggerCmd::Free => channel.release(),
            _ => Ok(()),
        }
    }

    fn copy(&mut self, frames: usize, inputs: &mut [&mut Buffer], outputs: &mut [&mut Buffer]) -> Result<i64> {
        let channel = self
            .dma
            .as_mut()
            .ok_or_else(|| CoreError::Fatal("host endpoint has no bound dma channel".into()))?;

        match self.direction {
            Direction::Playback => {
                let output = outputs.first_mut().ok_or(CoreError::InvalidArgument)?;
                let frame_bytes = output.stream().frame_bytes();
                let mut scratch = vec![0u8; frames * frame_bytes];
                let moved = channel.copy(&mut scratch)?;
                output.produce(&scratch[..moved])?;
                Ok((moved / frame_bytes) as i64)
            }
            Direction::Capture => {
                // The application has stopped reading; leave the ring
                // alone rather than discarding frames it never asked
                // to drop.
                if channel.status() == DmaStatus::Drained {
                    return Ok(0);
                }
                let input = inputs.first_mut().ok_or(CoreError::InvalidArgument)?;
                let frame_bytes = input.stream().frame_bytes();
                let mut scratch = vec![0u8; frames * frame_bytes];
                let read = input.consume(&mut scratch)?;
                let moved = channel.copy(&mut scratch[..read])?;
                Ok((moved / frame_bytes) as i64)
            }
        }
    }
}
