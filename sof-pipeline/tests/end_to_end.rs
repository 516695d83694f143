//! End-to-end scenarios exercising the full build -> prepare -> start
//! -> copy -> stop lifecycle across a small graph.

use sof_core::{Direction, Interleaving, Result, SampleFormat, StreamParams};
use sof_pipeline::component::{Component, ComponentKind, ComponentState, TriggerCmd};
use sof_pipeline::components::{dai_endpoint::DaiEndpoint, host_endpoint::HostEndpoint, mixer::Mixer};
use sof_pipeline::interfaces::dma::{DmaChannel, DmaStatus};
use sof_pipeline::pipeline::{CopyOutcome, Pipeline, XrunPolicy};
use sof_pipeline::{trigger, Arena, Buffer};

fn stream() -> StreamParams {
    StreamParams {
        format: SampleFormat::S16Le,
        channels: 1,
        rate_hz: 48_000,
        interleaving: Interleaving::Interleaved,
        direction: Direction::Playback,
    }
}

/// Always fills/drains whatever it's given with a fixed sample value,
/// and reports itself drained as soon as it's stopped.
struct ConstantChannel {
    sample: i16,
    stopped: bool,
}

impl ConstantChannel {
    fn new(sample: i16) -> Self {
        Self { sample, stopped: false }
    }
}

impl DmaChannel for ConstantChannel {
    fn copy(&mut self, buf: &mut [u8]) -> Result<usize> {
        for chunk in buf.chunks_exact_mut(2) {
            chunk.copy_from_slice(&self.sample.to_le_bytes());
        }
        Ok(buf.len())
    }

    fn stop(&mut self) -> Result<()> {
        self.stopped = true;
        Ok(())
    }

    fn status(&self) -> DmaStatus {
        if self.stopped {
            DmaStatus::Drained
        } else {
            DmaStatus::Running
        }
    }
}

struct NeverDrains;

impl DmaChannel for NeverDrains {
    fn copy(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn status(&self) -> DmaStatus {
        DmaStatus::Drained
    }
}

/// A hardware sink whose `status` never reports `Drained` once
/// `stop` is called, grounding the bounded stop-timeout scenario.
/// `reset_calls` is shared so the test can inspect it after the
/// channel has been moved into a `Box<dyn DmaChannel>`.
struct NeverStopsChannel {
    stopped: bool,
    reset_calls: std::sync::Arc<std::sync::atomic::AtomicU32>,
}

impl DmaChannel for NeverStopsChannel {
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
        self.reset_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn host_to_dai_playback_chain_moves_samples_every_period() {
    let mut components: Arena<Component> = Arena::new();
    let mut buffers: Arena<Buffer> = Arena::new();

    let host = components.insert(Component::new(ComponentKind::HostEndpoint(HostEndpoint::new(Direction::Playback))));
    let dai = components.insert(Component::new(ComponentKind::DaiEndpoint(DaiEndpoint::new(Direction::Playback))));

    if let ComponentKind::HostEndpoint(ep) = &mut components.get_mut(host).unwrap().kind {
        ep.bind_dma(Box::new(ConstantChannel::new(1234)));
    }
    if let ComponentKind::DaiEndpoint(ep) = &mut components.get_mut(dai).unwrap().kind {
        ep.bind_dma(Box::new(ConstantChannel::new(0)));
    }

    let mut pipeline = Pipeline::new(host, 16, XrunPolicy::CumulativeDeficit { limit_periods: 2 }, 5);
    let buf = buffers.insert(Buffer::new(256, stream(), false));
    pipeline.connect(&mut components, &mut buffers, buf, host, dai).unwrap();
    pipeline.own(dai);
    pipeline.complete(&mut components).unwrap();

    pipeline.trigger(&mut components, &buffers, TriggerCmd::Prepare).unwrap();
    trigger::prefill_playback(&pipeline, &components, &mut buffers).unwrap();
    pipeline.trigger(&mut components, &buffers, TriggerCmd::Start).unwrap();

    for _ in 0..5 {
        let outcome = pipeline.copy(&mut components, &mut buffers).unwrap();
        assert_eq!(outcome, CopyOutcome::Ran);
    }

    pipeline.trigger(&mut components, &buffers, TriggerCmd::Stop).unwrap();
    trigger::stop_drain(&mut pipeline, &mut components, &mut buffers).unwrap();
}

#[test]
fn two_source_pipelines_feed_a_shared_mixer() {
    let mut components: Arena<Component> = Arena::new();
    let mut buffers: Arena<Buffer> = Arena::new();

    let source_a = components.insert(Component::new(ComponentKind::HostEndpoint(HostEndpoint::new(Direction::Playback))));
    let source_b = components.insert(Component::new(ComponentKind::HostEndpoint(HostEndpoint::new(Direction::Playback))));
    let mixer = components.insert(Component::new(ComponentKind::Mixer(Mixer::new())));
    let dai = components.insert(Component::new(ComponentKind::DaiEndpoint(DaiEndpoint::new(Direction::Playback))));

    if let ComponentKind::HostEndpoint(ep) = &mut components.get_mut(source_a).unwrap().kind {
        ep.bind_dma(Box::new(ConstantChannel::new(1000)));
    }
    if let ComponentKind::HostEndpoint(ep) = &mut components.get_mut(source_b).unwrap().kind {
        ep.bind_dma(Box::new(ConstantChannel::new(2000)));
    }
    if let ComponentKind::DaiEndpoint(ep) = &mut components.get_mut(dai).unwrap().kind {
        ep.bind_dma(Box::new(ConstantChannel::new(0)));
    }

    let mut pipeline_a = Pipeline::new(source_a, 8, XrunPolicy::CumulativeDeficit { limit_periods: 2 }, 5);
    let buf_a = buffers.insert(Buffer::new(128, stream(), false));
    pipeline_a.connect(&mut components, &mut buffers, buf_a, source_a, mixer).unwrap();

    let mut pipeline_b = Pipeline::new(source_b, 8, XrunPolicy::CumulativeDeficit { limit_periods: 2 }, 6);
    let buf_b = buffers.insert(Buffer::new(128, stream(), false));
    pipeline_b.connect(&mut components, &mut buffers, buf_b, source_b, mixer).unwrap();

    let mut mixer_pipeline = Pipeline::new(mixer, 8, XrunPolicy::CumulativeDeficit { limit_periods: 2 }, 6);
    let buf_out = buffers.insert(Buffer::new(128, stream(), false));
    mixer_pipeline.connect(&mut components, &mut buffers, buf_out, mixer, dai).unwrap();
    mixer_pipeline.own(dai);

    pipeline_a.complete(&mut components).unwrap();
    pipeline_b.complete(&mut components).unwrap();
    mixer_pipeline.complete(&mut components).unwrap();

    for pipeline in [&mut pipeline_a, &mut pipeline_b, &mut mixer_pipeline] {
        pipeline.trigger(&mut components, &buffers, TriggerCmd::Prepare).unwrap();
        pipeline.trigger(&mut components, &buffers, TriggerCmd::Start).unwrap();
    }

    pipeline_a.copy(&mut components, &mut buffers).unwrap();
    pipeline_b.copy(&mut components, &mut buffers).unwrap();
    let outcome = mixer_pipeline.copy(&mut components, &mut buffers).unwrap();
    assert_eq!(outcome, CopyOutcome::Ran);

    let mut out = [0u8; 2];
    buffers.get_mut(buf_out).unwrap().consume(&mut out).unwrap();
    assert_eq!(i16::from_le_bytes(out), 3000);
}

#[test]
fn a_dma_that_never_drains_triggers_xrun_recovery() {
    let mut components: Arena<Component> = Arena::new();
    let mut buffers: Arena<Buffer> = Arena::new();

    let host = components.insert(Component::new(ComponentKind::HostEndpoint(HostEndpoint::new(Direction::Playback))));
    let dai = components.insert(Component::new(ComponentKind::DaiEndpoint(DaiEndpoint::new(Direction::Playback))));

    if let ComponentKind::HostEndpoint(ep) = &mut components.get_mut(host).unwrap().kind {
        ep.bind_dma(Box::new(ConstantChannel::new(1)));
    }
    if let ComponentKind::DaiEndpoint(ep) = &mut components.get_mut(dai).unwrap().kind {
        ep.bind_dma(Box::new(NeverDrains));
    }

    let mut pipeline = Pipeline::new(host, 64, XrunPolicy::CumulativeDeficit { limit_periods: 2 }, 5);
    let buf = buffers.insert(Buffer::new(128, stream(), false));
    pipeline.connect(&mut components, &mut buffers, buf, host, dai).unwrap();
    pipeline.own(dai);
    pipeline.complete(&mut components).unwrap();

    pipeline.trigger(&mut components, &buffers, TriggerCmd::Prepare).unwrap();
    pipeline.trigger(&mut components, &buffers, TriggerCmd::Start).unwrap();

    // Period 1 fills the ring; the stalled dai never drains it, so
    // every following host copy overruns until the policy's
    // `limit_periods` is reached and the pipeline resets.
    let mut outcomes = Vec::new();
    for _ in 0..4 {
        outcomes.push(pipeline.copy(&mut components, &mut buffers).unwrap());
    }
    assert_eq!(outcomes[0], CopyOutcome::Ran);
    assert!(outcomes.contains(&CopyOutcome::XrunRecovered));
}

#[test]
fn dma_stop_that_never_drains_times_out_and_resets_the_channel() {
    let mut components: Arena<Component> = Arena::new();
    let mut buffers: Arena<Buffer> = Arena::new();

    let host = components.insert(Component::new(ComponentKind::HostEndpoint(HostEndpoint::new(Direction::Playback))));
    let dai = components.insert(Component::new(ComponentKind::DaiEndpoint(DaiEndpoint::new(Direction::Playback))));

    if let ComponentKind::HostEndpoint(ep) = &mut components.get_mut(host).unwrap().kind {
        ep.bind_dma(Box::new(ConstantChannel::new(1)));
    }
    let reset_calls = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    if let ComponentKind::DaiEndpoint(ep) = &mut components.get_mut(dai).unwrap().kind {
        ep.bind_dma(Box::new(NeverStopsChannel {
            stopped: false,
            reset_calls: reset_calls.clone(),
        }));
    }

    let mut pipeline = Pipeline::new(host, 32, XrunPolicy::CumulativeDeficit { limit_periods: 2 }, 5);
    let buf = buffers.insert(Buffer::new(128, stream(), false));
    pipeline.connect(&mut components, &mut buffers, buf, host, dai).unwrap();
    pipeline.own(dai);
    pipeline.complete(&mut components).unwrap();

    pipeline.trigger(&mut components, &buffers, TriggerCmd::Prepare).unwrap();
    pipeline.trigger(&mut components, &buffers, TriggerCmd::Start).unwrap();

    // The dai's channel never reports itself drained once stopped, so
    // the bounded 500 ms wait inside its `trigger` runs out and resets
    // it instead of blocking the transition.
    pipeline.trigger(&mut components, &buffers, TriggerCmd::Stop).unwrap();

    assert_eq!(components.get(dai).unwrap().state, ComponentState::Prepare);
    assert_eq!(reset_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}
