//! Component lifecycle state machine and the per-kind copy operation
//! (spec §2, §4.2).

use sof_core::{CoreError, Result, StackVec, StreamParams};

use crate::arena::Handle;
use crate::buffer::Buffer;
use crate::components::{
    copier::Copier, dai_endpoint::DaiEndpoint, host_endpoint::HostEndpoint, mixer::Mixer,
    passthrough::PassThrough, volume::Volume,
};

pub const MAX_COMPONENT_INPUTS: usize = 8;
pub const MAX_COMPONENT_OUTPUTS: usize = 8;

pub type ComponentHandle = Handle<Component>;

/// A component's position in its lifecycle (spec §2 transition table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Init,
    Ready,
    Prepare,
    Paused,
    Active,
    Free,
}

/// A command the scheduler or host may issue to a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCmd {
    Prepare,
    Start,
    Pause,
    Release,
    Stop,
    Reset,
    Free,
}

/// Outcome of a single component's step within a graph walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    /// Keep walking downstream as normal.
    Continue,
    /// Stop walking this path, but the walk as a whole keeps going.
    PathStop,
    /// Tear down the remainder of this path; it will not be revisited.
    PathTerminate,
}

/// Validates a requested state transition against the fixed lifecycle
/// graph, returning the resulting state or `None` if illegal.
fn legal_transition(state: ComponentState, cmd: TriggerCmd) -> Option<ComponentState> {
    use ComponentState::*;
    use TriggerCmd::*;
    match (cmd, state) {
        (Prepare, Ready) => Some(Prepare),
        (Start, Prepare) | (Start, Paused) => Some(Active),
        (Pause, Active) => Some(Paused),
        (Release, Paused) => Some(Active),
        (Stop, Active) | (Stop, Paused) => Some(Prepare),
        (Reset, _) => Some(Ready),
        (Free, Ready) => Some(Free),
        _ => None,
    }
}

/// Per-kind behaviour a component plugs into the shared lifecycle and
/// copy loop. Every method defaults to a no-op / refusal so a kind
/// only needs to override what it actually does.
pub trait ComponentOps {
    fn params(&self) -> Option<StreamParams> {
        None
    }

    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    fn trigger(&mut self, _cmd: TriggerCmd) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn free(&mut self) -> Result<()> {
        Ok(())
    }

    /// Moves up to `frames` frames from `inputs` to `outputs`.
    /// Returns the number of frames actually moved, or a negative
    /// count is never used here (see `DESIGN.md` for why the
    /// spec's negative-return `PathStop` signal was not carried over).
    fn copy(&mut self, frames: usize, inputs: &mut [&mut Buffer], outputs: &mut [&mut Buffer]) -> Result<i64> {
        let _ = (frames, inputs, outputs);
        Err(CoreError::Fatal("component kind has no copy implementation".into()))
    }
}

/// Tagged union of every concrete component kind this firmware image
/// carries. New DSP kernels and endpoint types are out of scope (spec
/// Non-goals); the kinds here are the ones the graph actually needs to
/// move bytes and demonstrate the scheduler end to end.
pub enum ComponentKind {
    HostEndpoint(HostEndpoint),
    DaiEndpoint(DaiEndpoint),
    Mixer(Mixer),
    Copier(Copier),
    Volume(Volume),
    PassThrough(PassThrough),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            ComponentKind::HostEndpoint($inner) => $body,
            ComponentKind::DaiEndpoint($inner) => $body,
            ComponentKind::Mixer($inner) => $body,
            ComponentKind::Copier($inner) => $body,
            ComponentKind::Volume($inner) => $body,
            ComponentKind::PassThrough($inner) => $body,
        }
    };
}

impl ComponentKind {
    pub fn is_endpoint(&self) -> bool {
        matches!(self, ComponentKind::HostEndpoint(_) | ComponentKind::DaiEndpoint(_))
    }
}

impl ComponentOps for ComponentKind {
    fn params(&self) -> Option<StreamParams> {
        dispatch!(self, inner => inner.params())
    }

    fn prepare(&mut self) -> Result<()> {
        dispatch!(self, inner => inner.prepare())
    }

    fn trigger(&mut self, cmd: TriggerCmd) -> Result<()> {
        dispatch!(self, inner => inner.trigger(cmd))
    }

    fn reset(&mut self) -> Result<()> {
        dispatch!(self, inner => inner.reset())
    }

    fn free(&mut self) -> Result<()> {
        dispatch!(self, inner => inner.free())
    }

    fn copy(&mut self, frames: usize, inputs: &mut [&mut Buffer], outputs: &mut [&mut Buffer]) -> Result<i64> {
        dispatch!(self, inner => inner.copy(frames, inputs, outputs))
    }
}

/// A node in the pipeline graph: lifecycle state plus the
/// per-kind behaviour and its connected buffers.
pub struct Component {
    pub kind: ComponentKind,
    pub state: ComponentState,
    pub pipeline: Option<Handle<crate::pipeline::Pipeline>>,
    pub inputs: StackVec<Handle<Buffer>, MAX_COMPONENT_INPUTS>,
    pub outputs: StackVec<Handle<Buffer>, MAX_COMPONENT_OUTPUTS>,
}

impl Component {
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            state: ComponentState::Init,
            pipeline: None,
            inputs: StackVec::new(),
            outputs: StackVec::new(),
        }
    }

    /// Validates and applies a lifecycle transition, dispatching into
    /// the kind's `trigger` only once the move is legal.
    pub fn trigger(&mut self, cmd: TriggerCmd) -> Result<()> {
        let next = legal_transition(self.state, cmd).ok_or(CoreError::InvalidState)?;
        self.kind.trigger(cmd)?;
        self.state = next;
        Ok(())
    }

    /// One-time construction step moving a freshly built component out
    /// of `Init` and into the runtime lifecycle at `Ready`. Not a
    /// `TriggerCmd`: nothing in the legal transition table can produce
    /// `Init`, so there is nothing for a host trigger to transition
    /// away from.
    pub fn mark_ready(&mut self) -> Result<()> {
        if self.state == ComponentState::Init {
            self.state = ComponentState::Ready;
            Ok(())
        } else {
            Err(CoreError::InvalidState)
        }
    }

    pub fn connect_input(&mut self, buffer: Handle<Buffer>) -> Result<()> {
        self.inputs.push(buffer).map_err(|_| CoreError::OutOfMemory)
    }

    pub fn connect_output(&mut self, buffer: Handle<Buffer>) -> Result<()> {
        self.outputs.push(buffer).map_err(|_| CoreError::OutOfMemory)
    }

    pub fn remove_input(&mut self, buffer: Handle<Buffer>) {
        self.inputs.retain(|b| *b != buffer);
    }

    pub fn remove_output(&mut self, buffer: Handle<Buffer>) {
        self.outputs.retain(|b| *b != buffer);
    }
}
