//! Pipeline: a connected component graph scheduled and triggered as a
//! unit (spec §4).

use std::collections::HashSet;

use sof_core::{CoreError, Result};

use crate::arena::{Arena, Handle};
use crate::buffer::{Buffer, ConnectDir};
use crate::component::{Component, ComponentHandle, ComponentState, TriggerCmd, WalkStatus};

pub type PipelineHandle = Handle<Pipeline>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Created,
    Paused,
    Running,
    Stopping,
}

/// xrun handling policy. Kept to a single variant (Decision D2 in
/// `DESIGN.md`): the original's per-platform recovery strategies
/// collapse to one fixed threshold-then-reset policy here.
#[derive(Debug, Clone, Copy)]
pub enum XrunPolicy {
    CumulativeDeficit { limit_periods: u32 },
}

/// Result of a single scheduled copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Ran,
    XrunSkipped,
    XrunRecovered,
}

/// Pending delayed-start bookkeeping for a pipeline that is linked to
/// another pipeline's trigger (spec §4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerState {
    pub pending: Option<TriggerCmd>,
    pub delay_us: u32,
    pub aborted: bool,
}

pub struct Pipeline {
    pub scheduling_component: ComponentHandle,
    pub components: Vec<ComponentHandle>,
    pub status: PipelineStatus,
    pub period_frames: usize,
    pub xrun_policy: XrunPolicy,
    pub xrun_periods: u32,
    pub trigger: TriggerState,
    /// 0 lowest, 10 highest (spec §4.1). Drives scheduling order within
    /// a `Scheduler` tick, not copy order inside this pipeline's own
    /// walk.
    pub priority: u8,
}

impl Pipeline {
    pub fn new(scheduling_component: ComponentHandle, period_frames: usize, xrun_policy: XrunPolicy, priority: u8) -> Self {
        Self {
            scheduling_component,
            components: vec![scheduling_component],
            status: PipelineStatus::Created,
            period_frames,
            xrun_policy,
            xrun_periods: 0,
            trigger: TriggerState::default(),
            priority,
        }
    }

    /// Adds `handle` to this pipeline's membership, so its own period
    /// copy walk is allowed to run it. A component belongs to exactly
    /// one pipeline; a downstream node another pipeline schedules
    /// (a shared mixer, say) is reached over the connecting buffer but
    /// must NOT be claimed here, or both pipelines would run it every
    /// period.
    pub fn own(&mut self, handle: ComponentHandle) {
        if !self.components.contains(&handle) {
            self.components.push(handle);
        }
    }

    /// Removes `handle` from this pipeline's membership, e.g. when a
    /// host frees a single component without tearing down the whole
    /// pipeline.
    pub fn disown(&mut self, handle: ComponentHandle) {
        self.components.retain(|&h| h != handle);
    }

    /// Links `source`'s output to `sink`'s input through `buffer`.
    /// Does not change pipeline membership: call [`Pipeline::own`]
    /// for any component besides the scheduling component that
    /// belongs to this pipeline.
    pub fn connect(
        &mut self,
        components: &mut Arena<Component>,
        buffers: &mut Arena<Buffer>,
        buffer: Handle<Buffer>,
        source: ComponentHandle,
        sink: ComponentHandle,
    ) -> Result<()> {
        {
            let buf = buffers.get_mut(buffer).ok_or(CoreError::InvalidResource)?;
            buf.connect(ConnectDir::Producer, source);
            buf.connect(ConnectDir::Consumer, sink);
        }
        components
            .get_mut(source)
            .ok_or(CoreError::InvalidResource)?
            .connect_output(buffer)?;
        components
            .get_mut(sink)
            .ok_or(CoreError::InvalidResource)?
            .connect_input(buffer)?;
        Ok(())
    }

    pub fn disconnect(
        &mut self,
        components: &mut Arena<Component>,
        buffers: &mut Arena<Buffer>,
        buffer: Handle<Buffer>,
    ) -> Result<()> {
        let (producer, consumer) = {
            let buf = buffers.get_mut(buffer).ok_or(CoreError::InvalidResource)?;
            let producer = buf.producer();
            let consumer = buf.consumer();
            buf.disconnect(ConnectDir::Producer);
            buf.disconnect(ConnectDir::Consumer);
            (producer, consumer)
        };
        if let Some(p) = producer {
            if let Some(c) = components.get_mut(p) {
                c.remove_output(buffer);
            }
        }
        if let Some(c) = consumer {
            if let Some(comp) = components.get_mut(c) {
                comp.remove_input(buffer);
            }
        }
        Ok(())
    }

    /// Finalizes construction: every member component leaves `Init`
    /// for `Ready`, making the graph eligible for `prepare`/`trigger`.
    pub fn complete(&mut self, components: &mut Arena<Component>) -> Result<()> {
        for &handle in &self.components {
            components.get_mut(handle).ok_or(CoreError::InvalidResource)?.mark_ready()?;
        }
        Ok(())
    }

    /// Propagates `cmd` to every component reachable from the
    /// scheduling component, in either data-flow direction, since a
    /// lifecycle command must reach the whole connected pipeline
    /// regardless of which way samples flow.
    pub fn trigger(&mut self, components: &mut Arena<Component>, buffers: &Arena<Buffer>, cmd: TriggerCmd) -> Result<()> {
        trigger_walk(components, buffers, self.scheduling_component, cmd)?;
        self.status = match cmd {
            TriggerCmd::Start | TriggerCmd::Release => PipelineStatus::Running,
            TriggerCmd::Pause => PipelineStatus::Paused,
            TriggerCmd::Stop => PipelineStatus::Stopping,
            TriggerCmd::Reset | TriggerCmd::Prepare | TriggerCmd::Free => self.status,
        };
        Ok(())
    }

    /// Runs one scheduled period's worth of copying across the graph,
    /// folding any underrun/overrun into the xrun policy.
    pub fn copy(&mut self, components: &mut Arena<Component>, buffers: &mut Arena<Buffer>) -> Result<CopyOutcome> {
        match walk_copy(components, buffers, self.scheduling_component, self.period_frames, &self.components) {
            Ok(_frames) => {
                self.xrun_periods = 0;
                Ok(CopyOutcome::Ran)
            }
            Err(CoreError::Underrun { .. }) | Err(CoreError::Overrun { .. }) => {
                self.xrun_periods += 1;
                let XrunPolicy::CumulativeDeficit { limit_periods } = self.xrun_policy;
                if self.xrun_periods >= limit_periods {
                    self.recover(components, buffers)?;
                    Ok(CopyOutcome::XrunRecovered)
                } else {
                    Ok(CopyOutcome::XrunSkipped)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Cumulative-deficit recovery: `Stop` the whole graph back to
    /// `Ready` without releasing prepare-time allocations, re-prepare
    /// it, and restart it from a clean state.
    pub fn recover(&mut self, components: &mut Arena<Component>, buffers: &Arena<Buffer>) -> Result<()> {
        self.xrun_periods = 0;
        trigger_walk(components, buffers, self.scheduling_component, TriggerCmd::Stop)?;
        trigger_walk(components, buffers, self.scheduling_component, TriggerCmd::Prepare)?;
        trigger_walk(components, buffers, self.scheduling_component, TriggerCmd::Start)?;
        self.status = PipelineStatus::Running;
        Ok(())
    }
}

fn component_buffer_neighbors(component: &Component) -> Vec<Handle<Buffer>> {
    component
        .inputs
        .as_slice()
        .iter()
        .chain(component.outputs.as_slice().iter())
        .copied()
        .collect()
}

/// Propagates `cmd` outward from `start`, following buffer
/// connections in both directions. A component whose transition is
/// illegal from its current state stops that path (`PathStop`)
/// without aborting the rest of the walk; a component that
/// successfully frees itself terminates the path permanently
/// (`PathTerminate`), since nothing downstream of a freed component
/// should be visited again.
fn trigger_walk(
    components: &mut Arena<Component>,
    buffers: &Arena<Buffer>,
    start: ComponentHandle,
    cmd: TriggerCmd,
) -> Result<()> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];

    while let Some(handle) = stack.pop() {
        if !seen.insert(handle.index()) {
            continue;
        }
        let component = components.get_mut(handle).ok_or(CoreError::InvalidResource)?;
        let status = match component.trigger(cmd) {
            Ok(()) if cmd == TriggerCmd::Free => WalkStatus::PathTerminate,
            Ok(()) => WalkStatus::Continue,
            Err(CoreError::InvalidState) => WalkStatus::PathStop,
            Err(e) => return Err(e),
        };
        if status != WalkStatus::Continue {
            continue;
        }
        for buf_handle in component_buffer_neighbors(component) {
            if let Some(buf) = buffers.get(buf_handle) {
                if let Some(p) = buf.producer() {
                    if !seen.contains(&p.index()) {
                        stack.push(p);
                    }
                }
                if let Some(c) = buf.consumer() {
                    if !seen.contains(&c.index()) {
                        stack.push(c);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Runs one component's `copy`, handing it simultaneous `&mut` access
/// to every input and output buffer it owns.
fn run_component_copy(
    components: &mut Arena<Component>,
    buffers: &mut Arena<Buffer>,
    handle: ComponentHandle,
    frames: usize,
) -> Result<i64> {
    let component = components.get_mut(handle).ok_or(CoreError::InvalidResource)?;
    if component.state != ComponentState::Active {
        return Ok(0);
    }
    let is_endpoint = component.kind.is_endpoint();
    let n_inputs = component.inputs.len();
    let mut handles: Vec<Handle<Buffer>> = component.inputs.as_slice().to_vec();
    handles.extend_from_slice(component.outputs.as_slice());

    let mut refs = buffers.get_many_mut(&handles);
    let (input_bufs, output_bufs) = refs.split_at_mut(n_inputs);

    // An endpoint is the DMA-driven edge of the graph: it moves exactly
    // the scheduled period, since there is no upstream/downstream
    // buffer of its own to clamp against. Every other component must
    // not read or write past what its neighbors actually hold.
    let frames = if is_endpoint {
        frames
    } else {
        let min_avail = input_bufs.iter().map(|b| Buffer::avail_frames(b.avail(), b.stream().frame_bytes())).min();
        let min_free = output_bufs.iter().map(|b| Buffer::avail_frames(b.free(), b.stream().frame_bytes())).min();
        min_avail.into_iter().chain(min_free).chain(std::iter::once(frames)).min().unwrap_or(frames)
    };

    component.kind.copy(frames, input_bufs, output_bufs)
}

/// Walks the graph downstream from `start`, running one period's copy
/// on each reachable *active* component exactly once. Branching
/// fan-out (one component feeding several outputs) is supported;
/// fan-in merges happen only across pipelines (a shared mixer is
/// itself a scheduling component of its own pipeline), so a single
/// walk never needs to join two paths back together.
fn walk_copy(
    components: &mut Arena<Component>,
    buffers: &mut Arena<Buffer>,
    start: ComponentHandle,
    frames: usize,
    members: &[ComponentHandle],
) -> Result<i64> {
    let mut stack = vec![start];
    let mut touched = Vec::new();
    let mut total = 0i64;

    while let Some(handle) = stack.pop() {
        total += run_component_copy(components, buffers, handle, frames)?;

        if let Some(component) = components.get(handle) {
            for &out in component.outputs.as_slice() {
                if let Some(buf) = buffers.get_mut(out) {
                    if buf.begin_walk() {
                        touched.push(out);
                        // A consumer outside this pipeline's
                        // membership belongs to another scheduling
                        // component (e.g. a shared downstream mixer);
                        // that pipeline's own walk runs it, so this
                        // walk stops at the boundary instead of
                        // running it twice.
                        if let Some(consumer) = buf.consumer() {
                            if members.contains(&consumer) {
                                stack.push(consumer);
                            }
                        }
                    }
                }
            }
        }
    }

    for buf_handle in touched {
        if let Some(buf) = buffers.get_mut(buf_handle) {
            buf.end_walk();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentKind;
    use crate::components::passthrough::PassThrough;
    use sof_core::{Direction, Interleaving, SampleFormat, StreamParams};

    fn test_stream() -> StreamParams {
        StreamParams {
            format: SampleFormat::S16Le,
            channels: 1,
            rate_hz: 48_000,
            interleaving: Interleaving::Interleaved,
            direction: Direction::Playback,
        }
    }

    #[test]
    fn complete_moves_members_to_ready() {
        let mut components: Arena<Component> = Arena::new();
        let a = components.insert(Component::new(ComponentKind::PassThrough(PassThrough::new())));
        let mut pipeline = Pipeline::new(a, 32, XrunPolicy::CumulativeDeficit { limit_periods: 2 }, 5);
        pipeline.complete(&mut components).unwrap();
        assert_eq!(components.get(a).unwrap().state, ComponentState::Ready);
    }

    #[test]
    fn trigger_walk_reaches_connected_component_through_a_buffer() {
        let mut components: Arena<Component> = Arena::new();
        let mut buffers: Arena<Buffer> = Arena::new();
        let source = components.insert(Component::new(ComponentKind::PassThrough(PassThrough::new())));
        let sink = components.insert(Component::new(ComponentKind::PassThrough(PassThrough::new())));
        let buf = buffers.insert(Buffer::new(64, test_stream(), false));

        let mut pipeline = Pipeline::new(source, 8, XrunPolicy::CumulativeDeficit { limit_periods: 2 }, 5);
        pipeline.connect(&mut components, &mut buffers, buf, source, sink).unwrap();
        pipeline.own(sink);
        pipeline.complete(&mut components).unwrap();

        pipeline.trigger(&mut components, &buffers, TriggerCmd::Prepare).unwrap();
        pipeline.trigger(&mut components, &buffers, TriggerCmd::Start).unwrap();

        assert_eq!(components.get(source).unwrap().state, ComponentState::Active);
        assert_eq!(components.get(sink).unwrap().state, ComponentState::Active);
    }

    #[test]
    fn copy_moves_samples_from_source_to_sink() {
        let mut components: Arena<Component> = Arena::new();
        let mut buffers: Arena<Buffer> = Arena::new();
        let source = components.insert(Component::new(ComponentKind::PassThrough(PassThrough::new())));
        let sink = components.insert(Component::new(ComponentKind::PassThrough(PassThrough::new())));
        let feed = buffers.insert(Buffer::new(64, test_stream(), false));
        let drain = buffers.insert(Buffer::new(64, test_stream(), false));

        let mut pipeline = Pipeline::new(source, 4, XrunPolicy::CumulativeDeficit { limit_periods: 2 }, 5);
        // `source`'s own input buffer is pre-filled directly; `source`
        // copies it into `feed`, `sink` copies `feed` into `drain`.
        pipeline.connect(&mut components, &mut buffers, feed, source, sink).unwrap();
        pipeline.own(sink);
        components.get_mut(sink).unwrap().connect_output(drain).unwrap();
        buffers.get_mut(drain).unwrap().connect(ConnectDir::Consumer, sink);
        pipeline.complete(&mut components).unwrap();

        let input = buffers.insert(Buffer::new(64, test_stream(), false));
        components.get_mut(source).unwrap().connect_input(input).unwrap();
        buffers.get_mut(input).unwrap().produce(&[1, 0, 2, 0, 3, 0, 4, 0]).unwrap();

        pipeline.trigger(&mut components, &buffers, TriggerCmd::Prepare).unwrap();
        pipeline.trigger(&mut components, &buffers, TriggerCmd::Start).unwrap();

        let outcome = pipeline.copy(&mut components, &mut buffers).unwrap();
        assert_eq!(outcome, CopyOutcome::Ran);
        assert_eq!(buffers.get(drain).unwrap().avail(), 8);
    }
}
