//! JSON topology loading: describes the graph the simulator should
//! build, so a scenario can be edited without recompiling.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use sof_core::{CoreError, Direction, Interleaving, Result, SampleFormat, StreamParams};
use sof_pipeline::component::{Component, ComponentHandle, ComponentKind};
use sof_pipeline::components::{
    copier::Copier, dai_endpoint::DaiEndpoint, host_endpoint::HostEndpoint, mixer::Mixer,
    passthrough::PassThrough, volume::Volume,
};
use sof_pipeline::pipeline::{Pipeline, XrunPolicy};
use sof_pipeline::{Arena, Buffer};

fn default_priority() -> u8 {
    5
}

#[derive(Debug, Deserialize)]
pub struct TopologyConfig {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub period_frames: usize,
    pub xrun_limit_periods: u32,
    /// 0 lowest, 10 highest (spec §4.1); defaults to the middle band
    /// for topologies that don't care.
    #[serde(default = "default_priority")]
    pub priority: u8,
    pub components: Vec<ComponentConfig>,
    pub connections: Vec<ConnectionConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub gain_db: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    pub from: String,
    pub to: String,
    pub buffer_size_bytes: usize,
}

impl TopologyConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CoreError::Fatal(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| CoreError::Fatal(format!("parsing {}: {e}", path.display())))
    }
}

fn parse_direction(raw: Option<&str>) -> Result<Direction> {
    match raw {
        Some("playback") => Ok(Direction::Playback),
        Some("capture") => Ok(Direction::Capture),
        _ => Err(CoreError::InvalidArgument),
    }
}

fn db_to_q16(db: f32) -> i64 {
    let linear = 10f32.powf(db / 20.0);
    (linear * 65536.0) as i64
}

/// Instantiates every component named in `config`, returning the
/// arena of components plus a name -> handle lookup for wiring
/// connections.
pub fn build_components(config: &TopologyConfig, components: &mut Arena<Component>) -> Result<HashMap<String, ComponentHandle>> {
    let mut handles = HashMap::new();
    for entry in &config.components {
        let kind = match entry.kind.as_str() {
            "host_endpoint" => ComponentKind::HostEndpoint(HostEndpoint::new(parse_direction(entry.direction.as_deref())?)),
            "dai_endpoint" => ComponentKind::DaiEndpoint(DaiEndpoint::new(parse_direction(entry.direction.as_deref())?)),
            "mixer" => ComponentKind::Mixer(Mixer::new()),
            "copier" => ComponentKind::Copier(Copier::new()),
            "volume" => {
                let mut volume = Volume::new();
                if let Some(db) = entry.gain_db {
                    volume.set_gain_q16(db_to_q16(db));
                }
                ComponentKind::Volume(volume)
            }
            "passthrough" => ComponentKind::PassThrough(PassThrough::new()),
            other => return Err(CoreError::Fatal(format!("unknown component kind '{other}'"))),
        };
        let handle = components.insert(Component::new(kind));
        handles.insert(entry.name.clone(), handle);
    }
    Ok(handles)
}

/// Wires every connection named in `config` into a single pipeline
/// rooted at `scheduling_component`.
pub fn build_pipeline(
    config: &TopologyConfig,
    components: &mut Arena<Component>,
    buffers: &mut Arena<Buffer>,
    handles: &HashMap<String, ComponentHandle>,
    scheduling_component: ComponentHandle,
) -> Result<Pipeline> {
    let stream = StreamParams {
        format: SampleFormat::S16Le,
        channels: config.channels,
        rate_hz: config.sample_rate_hz,
        interleaving: Interleaving::Interleaved,
        direction: Direction::Playback,
    };

    let mut pipeline = Pipeline::new(
        scheduling_component,
        config.period_frames,
        XrunPolicy::CumulativeDeficit {
            limit_periods: config.xrun_limit_periods,
        },
        config.priority,
    );

    for conn in &config.connections {
        let source = *handles.get(&conn.from).ok_or(CoreError::InvalidResource)?;
        let sink = *handles.get(&conn.to).ok_or(CoreError::InvalidResource)?;
        let buffer = buffers.insert(Buffer::new(conn.buffer_size_bytes, stream, false));
        pipeline.connect(components, buffers, buffer, source, sink)?;
        pipeline.own(sink);
    }

    pipeline.complete(components)?;
    Ok(pipeline)
}
