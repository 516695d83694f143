//! Trigger propagation (spec §4.5): fans a host-issued lifecycle
//! command out across every pipeline linked to the one the host named,
//! optionally after a delay, and handles the two edge behaviours a
//! bare `Pipeline::trigger` doesn't: playback pre-fill and the
//! stop-time drain copy.

use sof_core::Result;

use crate::arena::Arena;
use crate::buffer::Buffer;
use crate::component::{Component, TriggerCmd};
use crate::pipeline::{Pipeline, PipelineHandle};

/// Issues `cmd` to every pipeline in `linked`. A zero delay fires
/// immediately; a non-zero delay parks the command on each pipeline's
/// `TriggerState` for [`poll_pending`] to fire once the delay elapses,
/// so pipelines sharing a downstream mixer start in the same period
/// rather than racing each other.
pub fn request(
    components: &mut Arena<Component>,
    buffers: &Arena<Buffer>,
    pipelines: &mut Arena<Pipeline>,
    linked: &[PipelineHandle],
    cmd: TriggerCmd,
    delay_us: u32,
) -> Result<()> {
    for &handle in linked {
        if delay_us == 0 {
            if let Some(pipeline) = pipelines.get_mut(handle) {
                pipeline.trigger(components, buffers, cmd)?;
            }
        } else if let Some(pipeline) = pipelines.get_mut(handle) {
            pipeline.trigger.pending = Some(cmd);
            pipeline.trigger.delay_us = delay_us;
            pipeline.trigger.aborted = false;
        }
    }
    Ok(())
}

/// Advances every pipeline's pending delayed trigger by `elapsed_us`,
/// firing any that have counted down to zero.
pub fn poll_pending(
    components: &mut Arena<Component>,
    buffers: &Arena<Buffer>,
    pipelines: &mut Arena<Pipeline>,
    elapsed_us: u32,
) -> Result<()> {
    let due: Vec<PipelineHandle> = pipelines
        .iter()
        .filter_map(|(handle, pipeline)| {
            if pipeline.trigger.pending.is_some() && !pipeline.trigger.aborted {
                Some(handle)
            } else {
                None
            }
        })
        .collect();

    for handle in due {
        let cmd = {
            let pipeline = match pipelines.get_mut(handle) {
                Some(p) => p,
                None => continue,
            };
            pipeline.trigger.delay_us = pipeline.trigger.delay_us.saturating_sub(elapsed_us);
            if pipeline.trigger.delay_us > 0 {
                continue;
            }
            pipeline.trigger.pending.take()
        };
        if let Some(cmd) = cmd {
            if let Some(pipeline) = pipelines.get_mut(handle) {
                pipeline.trigger(components, buffers, cmd)?;
            }
        }
    }
    Ok(())
}

/// Cancels a pipeline's pending delayed trigger before it fires.
pub fn abort_pending(pipelines: &mut Arena<Pipeline>, handle: PipelineHandle) {
    if let Some(pipeline) = pipelines.get_mut(handle) {
        pipeline.trigger.aborted = true;
        pipeline.trigger.pending = None;
    }
}

/// Pre-fills a pipeline's scheduling component's output buffers with
/// one period of silence, so the first scheduled copy after `Start`
/// has input available rather than immediately underrunning while the
/// real source catches up.
pub fn prefill_playback(pipeline: &Pipeline, components: &Arena<Component>, buffers: &mut Arena<Buffer>) -> Result<()> {
    let component = match components.get(pipeline.scheduling_component) {
        Some(c) => c,
        None => return Ok(()),
    };
    for &out in component.outputs.as_slice() {
        if let Some(buf) = buffers.get_mut(out) {
            let frame_bytes = buf.stream().frame_bytes();
            let zeros = vec![0u8; pipeline.period_frames * frame_bytes];
            let _ = buf.produce(&zeros);
        }
    }
    Ok(())
}

/// Forces one last copy after `Stop` so any frames already in flight
/// through a DMA gateway get flushed instead of left stale in the
/// ring for the next `Start`.
pub fn stop_drain(pipeline: &mut Pipeline, components: &mut Arena<Component>, buffers: &mut Arena<Buffer>) -> Result<()> {
    // A drain copy running after Stop is expected to starve; an xrun
    // here is not a real underrun, it's the intended end of stream.
    let _ = pipeline.copy(components, buffers);
    Ok(())
}
