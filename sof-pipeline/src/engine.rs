//! The per-core engine: owns one core's component/pipeline/buffer
//! arenas and scheduler, and turns host verbs into graph mutations
//! (spec §5, §6.1). `sof-sim` wraps one of these per simulated core
//! and forwards verbs to it over an `mpsc` channel.

use std::collections::HashMap;

use sof_core::{Result, StreamParams};

use crate::arena::Arena;
use crate::buffer::Buffer;
use crate::component::{Component, ComponentHandle, ComponentKind};
use crate::components::{
    copier::Copier, dai_endpoint::DaiEndpoint, host_endpoint::HostEndpoint, mixer::Mixer,
    passthrough::PassThrough, volume::Volume,
};
use crate::component::TriggerCmd;
use crate::interfaces::host::{ComponentKindTag, HostDispatcher, HostStatus, HostVerb, Reply};
use crate::interfaces::posn::StreamPosnTable;
use crate::pipeline::{Pipeline, PipelineHandle, XrunPolicy};
use crate::scheduler::{Scheduler, SchedulingDomain, TaskId};
use crate::trigger;

/// Fallback stream format for a `Connect` whose endpoints never had
/// `SetParams` applied to them; mirrors the host-endpoint defaults
/// `sof-sim`'s built-in topology uses.
fn default_stream_params() -> StreamParams {
    StreamParams {
        format: sof_core::SampleFormat::S16Le,
        channels: 2,
        rate_hz: 48_000,
        interleaving: sof_core::Interleaving::Interleaved,
        direction: sof_core::Direction::Playback,
    }
}

/// Owns one core's graph and dispatches host verbs against it. Not
/// `Send` on its own: it is meant to live on the thread that also
/// drives its `Scheduler`'s ticks, the same way a real DSP core's
/// firmware loop is both the IPC handler and the scheduler.
pub struct Engine {
    components: Arena<Component>,
    pipelines: Arena<Pipeline>,
    buffers: Arena<Buffer>,
    scheduler: Scheduler,
    posn: StreamPosnTable,
    tasks: HashMap<u32, TaskId>,
    formats: HashMap<u32, StreamParams>,
    now_us: u64,
}

impl Engine {
    pub fn new(domain: SchedulingDomain) -> Self {
        Self {
            components: Arena::new(),
            pipelines: Arena::new(),
            buffers: Arena::new(),
            scheduler: Scheduler::new(domain),
            posn: StreamPosnTable::new(),
            tasks: HashMap::new(),
            formats: HashMap::new(),
            now_us: 0,
        }
    }

    /// Advances the engine's clock and runs every pipeline whose task
    /// came due, in the priority order `Scheduler::tick` returns them.
    /// Advances each pipeline's tracked position by the frames it
    /// actually moved.
    pub fn tick(&mut self, now_us: u64) -> Vec<Result<crate::pipeline::CopyOutcome>> {
        self.now_us = now_us;
        let due = self.scheduler.tick(now_us);
        let mut outcomes = Vec::with_capacity(due.len());
        for handle in due {
            let Some(pipeline) = self.pipelines.get_mut(handle) else { continue };
            let scheduling_component = pipeline.scheduling_component;
            let period_frames = pipeline.period_frames;
            let outcome = pipeline.copy(&mut self.components, &mut self.buffers);
            if matches!(outcome, Ok(crate::pipeline::CopyOutcome::Ran)) {
                self.posn.advance(scheduling_component, period_frames as i64);
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    fn make_component(&mut self, kind: ComponentKindTag) -> ComponentKind {
        match kind {
            ComponentKindTag::HostEndpoint(direction) => ComponentKind::HostEndpoint(HostEndpoint::new(direction)),
            ComponentKindTag::DaiEndpoint(direction) => ComponentKind::DaiEndpoint(DaiEndpoint::new(direction)),
            ComponentKindTag::Mixer => ComponentKind::Mixer(Mixer::new()),
            ComponentKindTag::Copier => ComponentKind::Copier(Copier::new()),
            ComponentKindTag::Volume => ComponentKind::Volume(Volume::new()),
            ComponentKindTag::PassThrough => ComponentKind::PassThrough(PassThrough::new()),
        }
    }

    fn find_connecting_buffer(&self, source: ComponentHandle, sink: ComponentHandle) -> Option<crate::arena::Handle<Buffer>> {
        self.buffers
            .iter()
            .find(|(_, buf)| buf.producer() == Some(source) && buf.consumer() == Some(sink))
            .map(|(handle, _)| handle)
    }

    fn owning_pipeline(&self, component: ComponentHandle) -> Option<PipelineHandle> {
        self.pipelines
            .iter()
            .find(|(_, p)| p.components.contains(&component))
            .map(|(handle, _)| handle)
    }
}

impl HostDispatcher for Engine {
    fn dispatch(&mut self, verb: HostVerb) -> Reply {
        match verb {
            HostVerb::CreatePipeline {
                scheduling_component,
                period_frames,
                period_us,
                xrun_limit_periods,
                priority,
            } => {
                if self.components.get(scheduling_component).is_none() {
                    return Reply::err(HostStatus::InvalidResource);
                }
                if self.owning_pipeline(scheduling_component).is_some() {
                    return Reply::err(HostStatus::InvalidState);
                }
                let pipeline = Pipeline::new(
                    scheduling_component,
                    period_frames,
                    XrunPolicy::CumulativeDeficit { limit_periods: xrun_limit_periods },
                    priority,
                );
                let handle = self.pipelines.insert(pipeline);
                let task = self.scheduler.register(handle, period_us, self.now_us, priority);
                self.tasks.insert(handle.index(), task);
                self.components.get_mut(scheduling_component).expect("checked above").pipeline = Some(handle);
                Reply { status: HostStatus::Success, pipeline: Some(handle), component: None, posn: None }
            }

            HostVerb::FreePipeline(handle) => {
                if let Some(task) = self.tasks.remove(&handle.index()) {
                    let _ = self.scheduler.unregister(task);
                }
                match self.pipelines.remove(handle) {
                    Some(_) => Reply::ok(),
                    None => Reply::err(HostStatus::InvalidResource),
                }
            }

            HostVerb::CreateComponent { kind } => {
                let component_kind = self.make_component(kind);
                let handle = self.components.insert(Component::new(component_kind));
                Reply { status: HostStatus::Success, pipeline: None, component: Some(handle), posn: None }
            }

            HostVerb::Own { pipeline, component } => {
                if self.components.get(component).is_none() {
                    return Reply::err(HostStatus::InvalidResource);
                }
                let Some(pipeline_ref) = self.pipelines.get_mut(pipeline) else {
                    return Reply::err(HostStatus::InvalidResource);
                };
                pipeline_ref.own(component);
                self.components.get_mut(component).expect("checked above").pipeline = Some(pipeline);
                Reply::ok()
            }

            HostVerb::FreeComponent(handle) => {
                let owner = self.owning_pipeline(handle);
                if let Some(component) = self.components.get_mut(handle) {
                    if let Err(e) = component.trigger(TriggerCmd::Free) {
                        return Reply::err(e.into());
                    }
                } else {
                    return Reply::err(HostStatus::InvalidResource);
                }
                if let Some(owner) = owner {
                    if let Some(pipeline) = self.pipelines.get_mut(owner) {
                        pipeline.disown(handle);
                    }
                }
                self.formats.remove(&handle.index());
                self.posn.reset(handle);
                self.components.remove(handle);
                Reply::ok()
            }

            HostVerb::Connect { source, sink, buffer_size_bytes } => {
                let Some(owner) = self.owning_pipeline(source).or_else(|| self.owning_pipeline(sink)) else {
                    return Reply::err(HostStatus::InvalidResource);
                };
                let stream = self
                    .formats
                    .get(&source.index())
                    .or_else(|| self.formats.get(&sink.index()))
                    .copied()
                    .unwrap_or_else(default_stream_params);
                let buffer = self.buffers.insert(Buffer::new(buffer_size_bytes, stream, false));
                let Some(pipeline) = self.pipelines.get_mut(owner) else {
                    return Reply::err(HostStatus::InvalidResource);
                };
                match pipeline.connect(&mut self.components, &mut self.buffers, buffer, source, sink) {
                    Ok(()) => Reply::ok(),
                    Err(e) => Reply::err(e.into()),
                }
            }

            HostVerb::Disconnect { source, sink } => {
                let Some(buffer) = self.find_connecting_buffer(source, sink) else {
                    return Reply::err(HostStatus::InvalidResource);
                };
                let Some(owner) = self.owning_pipeline(source).or_else(|| self.owning_pipeline(sink)) else {
                    return Reply::err(HostStatus::InvalidResource);
                };
                let Some(pipeline) = self.pipelines.get_mut(owner) else {
                    return Reply::err(HostStatus::InvalidResource);
                };
                match pipeline.disconnect(&mut self.components, &mut self.buffers, buffer) {
                    Ok(()) => {
                        self.buffers.remove(buffer);
                        Reply::ok()
                    }
                    Err(e) => Reply::err(e.into()),
                }
            }

            HostVerb::SetParams { component, params } => {
                if self.components.get(component).is_none() {
                    return Reply::err(HostStatus::InvalidResource);
                }
                self.formats.insert(component.index(), params);
                Reply::ok()
            }

            HostVerb::CompletePipeline(pipeline) => {
                let Some(pipeline_ref) = self.pipelines.get_mut(pipeline) else {
                    return Reply::err(HostStatus::InvalidResource);
                };
                match pipeline_ref.complete(&mut self.components) {
                    Ok(()) => Reply::ok(),
                    Err(e) => Reply::err(e.into()),
                }
            }

            HostVerb::Trigger { pipeline, cmd } => {
                if self.pipelines.get(pipeline).is_none() {
                    return Reply::err(HostStatus::InvalidResource);
                }
                if cmd == TriggerCmd::Start {
                    let pipeline_ref = self.pipelines.get(pipeline).expect("checked above");
                    let _ = trigger::prefill_playback(pipeline_ref, &self.components, &mut self.buffers);
                }
                let pipeline_ref = self.pipelines.get_mut(pipeline).expect("checked above");
                match pipeline_ref.trigger(&mut self.components, &self.buffers, cmd) {
                    Ok(()) => {
                        if cmd == TriggerCmd::Stop {
                            let pipeline_ref = self.pipelines.get_mut(pipeline).expect("checked above");
                            let _ = trigger::stop_drain(pipeline_ref, &mut self.components, &mut self.buffers);
                        }
                        Reply { status: HostStatus::Success, pipeline: Some(pipeline), component: None, posn: None }
                    }
                    Err(e) => Reply::err(e.into()),
                }
            }

            HostVerb::GetPosition(component) => {
                if self.components.get(component).is_none() {
                    return Reply::err(HostStatus::InvalidResource);
                }
                Reply { status: HostStatus::Success, pipeline: None, component: Some(component), posn: Some(self.posn.get(component)) }
            }
        }
    }
}
