//! One OS thread per simulated core, forwarding host verbs and tick
//! requests to its `Engine` over an `mpsc` channel (spec §5: cross-core
//! register/trigger/cancel forwarding), the same `Sender`-plus-
//! background-thread shape a real-time input stream forwards its
//! messages through.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use sof_pipeline::engine::Engine;
use sof_pipeline::interfaces::host::{HostDispatcher, HostVerb, Reply};
use sof_pipeline::scheduler::SchedulingDomain;

enum Message {
    Verb(HostVerb, Sender<Reply>),
    Tick(u64),
    Shutdown,
}

/// A handle to a core's engine thread. Every verb and tick request
/// crosses the same channel a real cross-core IPC forwarder would use;
/// the engine itself never leaves the thread it was created on.
pub struct CoreHandle {
    tx: Sender<Message>,
    join: Option<JoinHandle<()>>,
}

impl CoreHandle {
    pub fn spawn(domain: SchedulingDomain) -> Self {
        let (tx, rx) = mpsc::channel::<Message>();
        let join = thread::spawn(move || {
            let mut engine = Engine::new(domain);
            for message in rx {
                match message {
                    Message::Verb(verb, reply_tx) => {
                        let reply = engine.dispatch(verb);
                        let _ = reply_tx.send(reply);
                    }
                    Message::Tick(now_us) => {
                        let _ = engine.tick(now_us);
                    }
                    Message::Shutdown => break,
                }
            }
        });
        Self { tx, join: Some(join) }
    }

    /// Forwards `verb` to the core thread and blocks for its reply.
    pub fn dispatch(&self, verb: HostVerb) -> Reply {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx.send(Message::Verb(verb, reply_tx)).expect("core thread is gone");
        reply_rx.recv().expect("core thread dropped the reply sender")
    }

    /// Asks the core thread to advance its scheduler to `now_us`.
    /// Fire-and-forget: a tick produces no reply a caller needs to
    /// wait on, mirroring a timer interrupt rather than a host call.
    pub fn tick(&self, now_us: u64) {
        let _ = self.tx.send(Message::Tick(now_us));
    }
}

impl Drop for CoreHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
