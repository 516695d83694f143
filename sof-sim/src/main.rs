//! Drives a JSON-described pipeline topology through its lifecycle and
//! a fixed number of scheduled periods, printing what happened each
//! period. Stands in for the host driver + DSP firmware pair this
//! workspace's libraries would run inside.

mod config;
mod core_thread;
mod sim_dma;

use std::env;
use std::path::PathBuf;

use sof_pipeline::component::{ComponentKind, TriggerCmd};
use sof_pipeline::pipeline::CopyOutcome;
use sof_pipeline::scheduler::{Scheduler, SchedulingDomain};
use sof_pipeline::{trigger, Arena, Buffer};

use config::TopologyConfig;

const DEFAULT_TOPOLOGY: &str = r#"
{
    "sample_rate_hz": 48000,
    "channels": 2,
    "period_frames": 480,
    "xrun_limit_periods": 3,
    "components": [
        {"name": "host", "kind": "host_endpoint", "direction": "playback"},
        {"name": "vol", "kind": "volume", "gain_db": -3.0},
        {"name": "dai", "kind": "dai_endpoint", "direction": "playback"}
    ],
    "connections": [
        {"from": "host", "to": "vol", "buffer_size_bytes": 4096},
        {"from": "vol", "to": "dai", "buffer_size_bytes": 4096}
    ]
}
"#;

fn load_config() -> TopologyConfig {
    match env::args().nth(1).map(PathBuf::from) {
        Some(path) => TopologyConfig::load(&path).unwrap_or_else(|e| {
            eprintln!("sof-sim: failed to load {}: {e}, falling back to built-in topology", path.display());
            serde_json::from_str(DEFAULT_TOPOLOGY).expect("built-in topology is valid JSON")
        }),
        None => serde_json::from_str(DEFAULT_TOPOLOGY).expect("built-in topology is valid JSON"),
    }
}

fn main() {
    let topology = load_config();
    let period_us = (topology.period_frames as u64 * 1_000_000) / topology.sample_rate_hz as u64;

    let mut components = Arena::new();
    let handles = config::build_components(&topology, &mut components).expect("building components");
    let host = *handles.get("host").expect("topology names a 'host' component");

    let mut buffers: Arena<Buffer> = Arena::new();
    let mut pipeline = config::build_pipeline(&topology, &mut components, &mut buffers, &handles, host)
        .expect("wiring pipeline connections");

    for (name, &handle) in &handles {
        let component = components.get_mut(handle).expect("handle from its own arena");
        match &mut component.kind {
            ComponentKind::HostEndpoint(ep) => {
                println!("sof-sim: binding tone source to '{name}'");
                ep.bind_dma(Box::new(sim_dma::ToneSource::new(42)));
            }
            ComponentKind::DaiEndpoint(ep) => {
                println!("sof-sim: binding sink to '{name}'");
                ep.bind_dma(Box::new(sim_dma::Sink::default()));
            }
            _ => {}
        }
    }

    pipeline
        .trigger(&mut components, &buffers, TriggerCmd::Prepare)
        .expect("prepare");
    trigger::prefill_playback(&pipeline, &components, &mut buffers).expect("prefill");
    pipeline
        .trigger(&mut components, &buffers, TriggerCmd::Start)
        .expect("start");

    let mut scheduler = Scheduler::new(SchedulingDomain::Timer { ticks_per_ms: 1 });
    let priority = pipeline.priority;
    let mut pipelines = Arena::new();
    let pipeline_handle = pipelines.insert(pipeline);
    scheduler.register(pipeline_handle, period_us, 0, priority);

    let mut now_us = 0u64;
    for period in 0..20 {
        now_us += period_us;
        for due in scheduler.tick(now_us) {
            let pipeline = pipelines.get_mut(due).expect("scheduled pipeline handle is valid");
            match pipeline.copy(&mut components, &mut buffers) {
                Ok(CopyOutcome::Ran) => println!("period {period}: ran"),
                Ok(CopyOutcome::XrunSkipped) => println!("period {period}: xrun (skipped, within recovery window)"),
                Ok(CopyOutcome::XrunRecovered) => println!("period {period}: xrun -> recovered"),
                Err(e) => println!("period {period}: fatal error: {e}"),
            }
        }
    }

    let pipeline = pipelines.get_mut(pipeline_handle).expect("pipeline handle still valid");
    pipeline
        .trigger(&mut components, &buffers, TriggerCmd::Stop)
        .expect("stop");
    trigger::stop_drain(pipeline, &mut components, &mut buffers).expect("stop drain");
    println!("sof-sim: stopped after drain");
}
