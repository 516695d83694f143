//! Host command surface: the verbs a driver issues against a
//! pipeline/component graph. Wire-format parsing of an actual IPC
//! mailbox message is out of scope (spec Non-goals); this module is
//! the dispatch boundary those bytes would be decoded into.

use sof_core::{Direction, StreamParams};

use crate::component::{ComponentHandle, TriggerCmd};
use crate::pipeline::PipelineHandle;

/// Which concrete component kind a `CreateComponent` verb instantiates.
/// Endpoint kinds carry the `Direction` their constructor needs; the
/// others take none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKindTag {
    HostEndpoint(Direction),
    DaiEndpoint(Direction),
    Mixer,
    Copier,
    Volume,
    PassThrough,
}

#[derive(Debug, Clone, Copy)]
pub enum HostVerb {
    /// Creates a pipeline rooted at an already-created component.
    /// `period_frames` sizes each scheduled copy; `period_us` is the
    /// scheduler tick this pipeline's task is registered at.
    CreatePipeline {
        scheduling_component: ComponentHandle,
        period_frames: usize,
        period_us: u64,
        xrun_limit_periods: u32,
        priority: u8,
    },
    FreePipeline(PipelineHandle),
    /// Instantiates a freestanding component, belonging to no
    /// pipeline yet. `CreatePipeline` claims one as its scheduling
    /// root directly; any other member joins via `Own`.
    CreateComponent { kind: ComponentKindTag },
    FreeComponent(ComponentHandle),
    /// Adds an already-created component to a pipeline's membership
    /// (mirrors `Pipeline::own`), for every member besides the
    /// scheduling root `CreatePipeline` claimed.
    Own { pipeline: PipelineHandle, component: ComponentHandle },
    /// Connects `source`'s output to `sink`'s input through a new
    /// buffer of `buffer_size_bytes` (spec Non-goal: no wire-level
    /// buffer negotiation, so the caller states the size directly).
    Connect { source: ComponentHandle, sink: ComponentHandle, buffer_size_bytes: usize },
    Disconnect { source: ComponentHandle, sink: ComponentHandle },
    SetParams { component: ComponentHandle, params: StreamParams },
    /// Finalizes a pipeline's construction once every `CreateComponent`
    /// / `Own` / `Connect` call for it is done (mirrors
    /// `Pipeline::complete`): every member leaves `Init` for `Ready`.
    CompletePipeline(PipelineHandle),
    Trigger { pipeline: PipelineHandle, cmd: TriggerCmd },
    GetPosition(ComponentHandle),
}

/// Outcome status for a dispatched verb, independent of any wire
/// encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Success,
    InvalidResource,
    InvalidState,
    InvalidArgument,
    OutOfMemory,
    Busy,
    Timeout,
    Error,
}

impl From<sof_core::CoreError> for HostStatus {
    fn from(err: sof_core::CoreError) -> Self {
        use sof_core::CoreError::*;
        match err {
            InvalidResource => HostStatus::InvalidResource,
            InvalidState => HostStatus::InvalidState,
            InvalidArgument => HostStatus::InvalidArgument,
            OutOfMemory => HostStatus::OutOfMemory,
            Busy => HostStatus::Busy,
            Timeout => HostStatus::Timeout,
            Underrun { .. } | Overrun { .. } | Fatal(_) => HostStatus::Error,
        }
    }
}

/// A reply to a dispatched verb; `pipeline`/`component`/`posn` are
/// populated only by the verbs that produce a new handle or a
/// position reading.
#[derive(Debug, Clone, Copy)]
pub struct Reply {
    pub status: HostStatus,
    pub pipeline: Option<PipelineHandle>,
    pub component: Option<ComponentHandle>,
    pub posn: Option<u64>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            status: HostStatus::Success,
            pipeline: None,
            component: None,
            posn: None,
        }
    }

    pub fn err(status: HostStatus) -> Self {
        Self {
            status,
            pipeline: None,
            component: None,
            posn: None,
        }
    }
}

/// Implemented by whatever owns the graph (the per-core engine) to
/// turn a verb into a mutation plus a reply.
pub trait HostDispatcher {
    fn dispatch(&mut self, verb: HostVerb) -> Reply;
}
