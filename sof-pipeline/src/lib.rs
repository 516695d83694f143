//! Pipeline/component graph scheduler, SPSC ring buffer, and the
//! trigger/copy loop that drives a programmable audio DSP's real-time
//! data path.

pub mod arena;
pub mod buffer;
pub mod component;
pub mod components;
pub mod engine;
pub mod interfaces;
pub mod pipeline;
pub mod scheduler;
pub mod trigger;

pub use arena::{Arena, Handle};
pub use buffer::{Buffer, ConnectDir};
pub use component::{
    Component, ComponentHandle, ComponentKind, ComponentOps, ComponentState, TriggerCmd, WalkStatus,
    MAX_COMPONENT_INPUTS, MAX_COMPONENT_OUTPUTS,
};
pub use engine::Engine;
pub use pipeline::{CopyOutcome, Pipeline, PipelineHandle, PipelineStatus, TriggerState, XrunPolicy};
pub use scheduler::{Scheduler, SchedulingDomain, TaskId, TaskState};

pub use sof_core::{CoreError, Result};
