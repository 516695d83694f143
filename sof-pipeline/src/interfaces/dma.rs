//! The DMA gateway abstraction endpoints bind to (spec §5, §6.2).
//!
//! Host and DAI endpoints hold a `Box<dyn DmaChannel>` and drive it
//! through the same lifecycle their own component state machine goes
//! through: `set_config` at `Prepare`, `start`/`pause`/`release` on the
//! matching trigger, `copy` every scheduled period, and a bounded
//! `stop`/drain/reset sequence on `Stop` (see [`DmaStopWait`]).

use sof_core::{CoreError, Result};

/// Matches the direction a channel was configured to move bytes in;
/// `copy` itself stays direction-agnostic so endpoint code doesn't
/// have to branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDirection {
    MemToDev,
    DevToMem,
}

/// Parameters programmed into a channel on `Prepare` (spec §4.5 "DMA
/// binding"): transfer size is one period's worth of bytes, and
/// `cyclic` marks a ring-wrapping transfer rather than a one-shot.
#[derive(Debug, Clone, Copy)]
pub struct DmaTransferConfig {
    pub size_bytes: usize,
    pub direction: DmaDirection,
    pub cyclic: bool,
}

/// A channel's reported hardware state, polled by [`DmaStopWait`] and
/// by the per-period `copy` guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaStatus {
    Idle,
    Running,
    Paused,
    /// Stop was requested; the channel is polling down its in-flight
    /// transfer rather than accepting new ones.
    Draining,
    /// Nothing further to deliver or accept; the ring should not be
    /// touched on its behalf, and a pending stop-drain is complete.
    Drained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqOp {
    StatusGet,
    Clear,
    Mask,
    Unmask,
}

pub trait DmaChannel: Send {
    /// Programs source/destination sizing and the ring wrap. Called
    /// once on `Prepare`; channels that need no configuration (test
    /// doubles) can take the default no-op.
    fn set_config(&mut self, _config: DmaTransferConfig) -> Result<()> {
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Requests the channel stop accepting new transfers. Does not by
    /// itself guarantee the channel has drained; see [`DmaStopWait`].
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }

    /// Moves up to `buf.len()` bytes between `buf` and the channel's
    /// hardware side, returning the count actually moved. An
    /// implementation decides for itself whether a call fills `buf`
    /// from its hardware side or drains `buf` into it, per the
    /// direction it was configured with.
    fn copy(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn status(&self) -> DmaStatus {
        DmaStatus::Running
    }

    fn irq(&mut self, _op: IrqOp) -> Result<bool> {
        Ok(false)
    }

    /// Forces the channel back to a known-idle state after a bounded
    /// stop-drain wait expires. Only called on a timeout, never as
    /// part of ordinary shutdown.
    fn reset_channel(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Bounded poll for a channel's stop-drain (spec §4.5: 500 ms default
/// clock). Advanced in explicit `elapsed_us` increments rather than a
/// wall clock, so the same bound drives both real scheduler ticks and
/// deterministic tests.
pub const DMA_STOP_TIMEOUT_US: u32 = 500_000;

/// Default step `stop_and_drain` advances the wait by between polls.
pub const DMA_STOP_POLL_INTERVAL_US: u32 = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPoll {
    Pending,
    Drained,
    TimedOut,
}

pub struct DmaStopWait {
    remaining_us: u32,
}

impl DmaStopWait {
    pub fn new() -> Self {
        Self {
            remaining_us: DMA_STOP_TIMEOUT_US,
        }
    }

    /// Advances the wait by `elapsed_us` and reports whether the
    /// channel has drained, is still pending, or has blown through its
    /// bound. A timeout issues `reset_channel` before reporting out,
    /// matching the original's "on timeout the channel is reset".
    pub fn poll(&mut self, channel: &mut dyn DmaChannel, elapsed_us: u32) -> Result<DrainPoll> {
        if channel.status() == DmaStatus::Drained {
            return Ok(DrainPoll::Drained);
        }
        self.remaining_us = self.remaining_us.saturating_sub(elapsed_us);
        if self.remaining_us == 0 {
            channel.reset_channel()?;
            Ok(DrainPoll::TimedOut)
        } else {
            Ok(DrainPoll::Pending)
        }
    }
}

impl Default for DmaStopWait {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives a channel's stop through to completion or timeout in one
/// call, for callers that don't need to interleave other work between
/// polls.
pub fn stop_and_drain(channel: &mut dyn DmaChannel, poll_interval_us: u32) -> Result<()> {
    channel.stop()?;
    let mut wait = DmaStopWait::new();
    loop {
        match wait.poll(channel, poll_interval_us)? {
            DrainPoll::Drained => return Ok(()),
            DrainPoll::TimedOut => return Err(CoreError::Timeout),
            DrainPoll::Pending => continue,
        }
    }
}
