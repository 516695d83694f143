//! Per-core scheduling domain: decides when each pipeline's next copy
//! is due (spec §4.4).

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use sof_core::{CoreError, Result};

use crate::pipeline::PipelineHandle;

/// How a core's task clock advances.
#[derive(Debug, Clone, Copy)]
pub enum SchedulingDomain {
    /// Fixed-rate timer interrupt; ticks land on an ideal grid
    /// (`next = prev + period`), immune to jitter in when `tick` is
    /// actually called.
    Timer { ticks_per_ms: u32 },
    /// One DMA completion interrupt schedules every pipeline on the
    /// core at once.
    DmaAggregated,
    /// Each pipeline is woken by its own channel's completion
    /// interrupt, independently of the others.
    DmaPerChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Running,
    Free,
}

struct Task {
    pipeline: PipelineHandle,
    period_us: u64,
    next_tick_us: u64,
    state: TaskState,
    cancel: Arc<(Mutex<bool>, Condvar)>,
    priority: u8,
}

/// Opaque id for a registered task, scoped to one `Scheduler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(usize);

pub struct Scheduler {
    domain: SchedulingDomain,
    tasks: Vec<Option<Task>>,
}

impl Scheduler {
    pub fn new(domain: SchedulingDomain) -> Self {
        Self { domain, tasks: Vec::new() }
    }

    pub fn register(&mut self, pipeline: PipelineHandle, period_us: u64, now_us: u64, priority: u8) -> TaskId {
        let task = Task {
            pipeline,
            period_us,
            next_tick_us: now_us + period_us,
            state: TaskState::Queued,
            cancel: Arc::new((Mutex::new(false), Condvar::new())),
            priority,
        };
        self.tasks.push(Some(task));
        TaskId(self.tasks.len() - 1)
    }

    pub fn unregister(&mut self, id: TaskId) -> Result<()> {
        self.tasks
            .get_mut(id.0)
            .and_then(|slot| slot.take())
            .map(|_| ())
            .ok_or(CoreError::InvalidResource)
    }

    /// Requests cancellation and blocks until the scheduler
    /// acknowledges it (or `timeout` elapses).
    pub fn cancel(&mut self, id: TaskId, timeout: Duration) -> Result<()> {
        let cancel = {
            let task = self.tasks.get(id.0).and_then(|t| t.as_ref()).ok_or(CoreError::InvalidResource)?;
            Arc::clone(&task.cancel)
        };
        let (lock, condvar) = &*cancel;
        let mut cancelled = lock.lock().expect("scheduler cancel mutex poisoned");
        *cancelled = true;
        let (guard, result) = condvar
            .wait_timeout_while(cancelled, timeout, |c| *c)
            .expect("scheduler cancel condvar poisoned");
        drop(guard);
        if result.timed_out() {
            Err(CoreError::Timeout)
        } else {
            Ok(())
        }
    }

    /// Requests the task stop being ticked and blocks until the
    /// scheduler's own tick loop has acknowledged that (or `timeout`
    /// elapses), then removes it for good (spec §8 scenario 5: a free
    /// issued while a tick is in flight blocks until that tick
    /// finishes, completes within a bound, and the task is never
    /// ticked again).
    pub fn free(&mut self, id: TaskId, timeout: Duration) -> Result<()> {
        self.cancel(id, timeout)?;
        self.unregister(id)
    }

    /// Advances the clock to `now_us`, returning every pipeline whose
    /// task came due, and rescheduling each one's next tick. Due tasks
    /// are returned in strict priority order (highest first); tasks at
    /// the same priority keep the FIFO order they were registered in
    /// (spec §4.4: "tasks within a domain are executed in strict
    /// priority order; ties are served FIFO").
    pub fn tick(&mut self, now_us: u64) -> Vec<PipelineHandle> {
        let mut due: Vec<(u8, PipelineHandle)> = Vec::new();
        for slot in self.tasks.iter_mut() {
            let Some(task) = slot else { continue };

            {
                let (lock, condvar) = &*task.cancel;
                let mut cancelled = lock.lock().expect("scheduler cancel mutex poisoned");
                if *cancelled {
                    *cancelled = false;
                    task.state = TaskState::Free;
                    condvar.notify_all();
                    continue;
                }
            }

            if task.next_tick_us <= now_us {
                task.state = TaskState::Running;
                due.push((task.priority, task.pipeline));
                task.next_tick_us = match self.domain {
                    SchedulingDomain::Timer { .. } => task.next_tick_us + task.period_us,
                    SchedulingDomain::DmaAggregated | SchedulingDomain::DmaPerChannel => {
                        now_us + task.period_us
                    }
                };
                task.state = TaskState::Queued;
            }
        }
        due.sort_by_key(|(priority, _)| std::cmp::Reverse(*priority));
        due.into_iter().map(|(_, pipeline)| pipeline).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::component::Component;
    use crate::component::ComponentKind;
    use crate::components::passthrough::PassThrough;
    use crate::pipeline::{Pipeline, XrunPolicy};

    fn dummy_pipeline_handle() -> PipelineHandle {
        let mut components: Arena<Component> = Arena::new();
        let comp = components.insert(Component::new(ComponentKind::PassThrough(PassThrough::new())));
        let mut pipelines: Arena<Pipeline> = Arena::new();
        pipelines.insert(Pipeline::new(comp, 32, XrunPolicy::CumulativeDeficit { limit_periods: 2 }, 5))
    }

    #[test]
    fn higher_priority_task_runs_before_lower_priority_within_the_same_tick() {
        let mut scheduler = Scheduler::new(SchedulingDomain::Timer { ticks_per_ms: 1 });
        let low = dummy_pipeline_handle();
        let high = dummy_pipeline_handle();
        // Registered low-priority first: a naive FIFO-only order would
        // return [low, high], priority must still win.
        scheduler.register(low, 1000, 0, 5);
        scheduler.register(high, 1000, 0, 6);

        assert_eq!(scheduler.tick(1000), vec![high, low]);
    }

    #[test]
    fn equal_priority_tasks_stay_in_registration_order() {
        let mut scheduler = Scheduler::new(SchedulingDomain::Timer { ticks_per_ms: 1 });
        let first = dummy_pipeline_handle();
        let second = dummy_pipeline_handle();
        scheduler.register(first, 1000, 0, 5);
        scheduler.register(second, 1000, 0, 5);

        assert_eq!(scheduler.tick(1000), vec![first, second]);
    }

    #[test]
    fn timer_domain_ticks_on_an_ideal_grid() {
        let mut scheduler = Scheduler::new(SchedulingDomain::Timer { ticks_per_ms: 1 });
        let pipeline = dummy_pipeline_handle();
        scheduler.register(pipeline, 1000, 0, 5);

        assert!(scheduler.tick(500).is_empty());
        assert_eq!(scheduler.tick(1000), vec![pipeline]);
        // Late call at 2500 still only fires once; next tick lands at 2000, not 2500+1000.
        assert_eq!(scheduler.tick(2500), vec![pipeline]);
    }

    #[test]
    fn dma_domain_resyncs_to_actual_fire_time() {
        let mut scheduler = Scheduler::new(SchedulingDomain::DmaAggregated);
        let pipeline = dummy_pipeline_handle();
        scheduler.register(pipeline, 1000, 0, 5);

        assert_eq!(scheduler.tick(1200), vec![pipeline]);
        assert!(scheduler.tick(1300).is_empty());
        assert_eq!(scheduler.tick(2200), vec![pipeline]);
    }

    #[test]
    fn unregister_removes_task_from_future_ticks() {
        let mut scheduler = Scheduler::new(SchedulingDomain::Timer { ticks_per_ms: 1 });
        let pipeline = dummy_pipeline_handle();
        let id = scheduler.register(pipeline, 1000, 0, 5);
        scheduler.unregister(id).unwrap();
        assert!(scheduler.tick(1000).is_empty());
    }

    #[test]
    fn free_returns_once_a_concurrent_tick_acknowledges_the_cancel() {
        use std::thread;

        let mut scheduler = Scheduler::new(SchedulingDomain::Timer { ticks_per_ms: 1 });
        let pipeline = dummy_pipeline_handle();
        let id = scheduler.register(pipeline, 1000, 0, 5);

        // The scheduler instance itself stays single-owner (one core,
        // one thread); only the per-task cancel handle crosses the
        // thread boundary, the same handle `tick` would clear if it
        // found this task mid-cancel on the owning thread.
        let handle = scheduler.tasks[id.0].as_ref().unwrap().cancel.clone();
        let acker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let (lock, condvar) = &*handle;
            *lock.lock().expect("scheduler cancel mutex poisoned") = false;
            condvar.notify_all();
        });

        assert!(scheduler.free(id, Duration::from_millis(500)).is_ok());
        acker.join().unwrap();
        assert!(scheduler.tick(1000).is_empty());
    }

    #[test]
    fn free_times_out_if_no_tick_ever_acknowledges_it() {
        let mut scheduler = Scheduler::new(SchedulingDomain::Timer { ticks_per_ms: 1 });
        let pipeline = dummy_pipeline_handle();
        let id = scheduler.register(pipeline, 1000, 0, 5);

        let err = scheduler.free(id, Duration::from_millis(10)).unwrap_err();
        assert_eq!(err, CoreError::Timeout);
    }
}
