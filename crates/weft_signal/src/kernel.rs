//! The delta-cycle scheduler.
//!
//! [`Kernel`] owns a [`SimContext`] and a set of processes. A run resumes
//! every process once, then alternates two phases until nothing is left to
//! do: delta cycles at the current tick while any signal has a pending
//! write, and a jump to the earliest future event once the tick is quiet.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use weft_common::Arena;
use weft_config::{load_config, ConfigError, SimulationConfig, DEFAULT_MAX_DELTAS};

use crate::context::SimContext;
use crate::error::SimError;
use crate::time::SimTime;
use crate::waiter::ProcessId;
use crate::waveform::VcdRecorder;

/// What a process wants after being resumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Suspended on whatever waits it registered; resume it when one fires.
    Waiting,
    /// Finished; never resume it again.
    Done,
}

/// A unit of behavior resumed by the kernel.
///
/// Before returning [`ProcessStatus::Waiting`], a process registers what it
/// waits for, using [`SimContext::wait_on`] or [`SimContext::wake_after`].
pub trait Process {
    /// Name used in error messages.
    fn name(&self) -> &str {
        "process"
    }

    /// Runs the process until it next suspends.
    fn resume(&mut self, ctx: &mut SimContext, me: ProcessId) -> Result<ProcessStatus, SimError>;
}

impl<F> Process for F
where
    F: FnMut(&mut SimContext, ProcessId) -> Result<ProcessStatus, SimError>,
{
    fn resume(&mut self, ctx: &mut SimContext, me: ProcessId) -> Result<ProcessStatus, SimError> {
        self(ctx, me)
    }
}

struct ProcessSlot {
    process: Box<dyn Process>,
    done: bool,
}

/// The result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Time at which the run stopped.
    pub final_time: SimTime,
    /// Delta cycles executed.
    pub total_deltas: u64,
    /// Warnings emitted, such as bus contention.
    pub warnings: usize,
}

/// The result of a single scheduler step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// More work may follow.
    Continued,
    /// No pending writes and no future events, or the time limit was reached.
    Done,
}

/// The simulation scheduler.
pub struct Kernel {
    ctx: SimContext,
    processes: Arena<ProcessId, ProcessSlot>,
    max_delta_per_step: u32,
    time_limit: Option<u64>,
    deltas_at_current_time: u32,
    total_deltas: u64,
    started: bool,
}

impl Kernel {
    /// Creates a kernel around an existing context.
    pub fn new(ctx: SimContext) -> Self {
        Self {
            ctx,
            processes: Arena::new(),
            max_delta_per_step: DEFAULT_MAX_DELTAS,
            time_limit: None,
            deltas_at_current_time: 0,
            total_deltas: 0,
            started: false,
        }
    }

    /// Creates a kernel configured by `config`, opening the trace file if tracing is enabled.
    pub fn from_config(mut ctx: SimContext, config: &SimulationConfig) -> Result<Self, SimError> {
        if config.trace.enabled {
            let path = config
                .trace
                .path
                .as_ref()
                .ok_or_else(|| ConfigError::MissingField("trace.path".to_string()))?;
            let file = File::create(path)?;
            let recorder =
                VcdRecorder::with_timescale(BufWriter::new(file), config.trace.timescale.to_string());
            ctx.set_recorder(Box::new(recorder), "top")?;
        }
        let mut kernel = Self::new(ctx);
        kernel.set_max_delta(config.simulation.max_deltas_per_step);
        kernel.time_limit = config.simulation.time_limit;
        Ok(kernel)
    }

    /// Creates a kernel configured by the `weft.toml` in `dir`.
    pub fn from_project_dir(ctx: SimContext, dir: &Path) -> Result<Self, SimError> {
        let config = load_config(dir)?;
        Self::from_config(ctx, &config)
    }

    /// Sets the maximum number of delta cycles per tick.
    pub fn set_max_delta(&mut self, max: u32) {
        self.max_delta_per_step = max;
    }

    /// Stops the run before any event later than `limit`.
    pub fn set_time_limit(&mut self, limit: u64) {
        self.time_limit = Some(limit);
    }

    /// The simulation context.
    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    /// The simulation context, for building signals and wiring processes.
    pub fn context_mut(&mut self) -> &mut SimContext {
        &mut self.ctx
    }

    /// Consumes the kernel and returns its context.
    pub fn into_context(self) -> SimContext {
        self.ctx
    }

    /// Current simulated time.
    pub fn current_time(&self) -> SimTime {
        self.ctx.now()
    }

    /// Adds a process; it first runs when the simulation starts.
    pub fn add_process(&mut self, process: impl Process + 'static) -> ProcessId {
        self.processes.alloc(ProcessSlot {
            process: Box::new(process),
            done: false,
        })
    }

    /// Number of processes, finished or not.
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Returns `true` once `pid` has returned [`ProcessStatus::Done`].
    pub fn is_done(&self, pid: ProcessId) -> bool {
        self.processes.try_get(pid).is_some_and(|slot| slot.done)
    }

    /// Runs until no work is left or the time limit is reached, then flushes the trace.
    pub fn run(&mut self) -> Result<RunResult, SimError> {
        while self.step_delta()? == StepResult::Continued {}
        self.ctx.finish_trace()?;
        Ok(RunResult {
            final_time: self.ctx.now(),
            total_deltas: self.total_deltas,
            warnings: self.ctx.diagnostics().warning_count(),
        })
    }

    /// Runs for `duration` ticks from the current time.
    pub fn run_for(&mut self, duration: u64) -> Result<RunResult, SimError> {
        self.time_limit = Some(self.ctx.now().time.saturating_add(duration));
        self.run()
    }

    /// Executes one step: the initial resumption of all processes, one
    /// delta cycle, or one advance of time.
    pub fn step_delta(&mut self) -> Result<StepResult, SimError> {
        if !self.started {
            self.started = true;
            let all: Vec<ProcessId> = self.processes.iter().map(|(pid, _)| pid).collect();
            self.resume(all)?;
            return Ok(StepResult::Continued);
        }

        if self.ctx.has_changes() {
            if self.deltas_at_current_time >= self.max_delta_per_step {
                return Err(SimError::DeltaCycleLimit {
                    time: self.ctx.now().time,
                    max_deltas: self.max_delta_per_step,
                });
            }
            let fired = self.ctx.commit_changed()?;
            self.deltas_at_current_time += 1;
            self.total_deltas += 1;
            let pids = self.ctx.wake(fired)?;
            self.resume(pids)?;
            return Ok(StepResult::Continued);
        }

        let Some(next) = self.ctx.next_event_time() else {
            return Ok(StepResult::Done);
        };
        if self.time_limit.is_some_and(|limit| next > limit) {
            return Ok(StepResult::Done);
        }
        if next != self.ctx.now().time {
            self.deltas_at_current_time = 0;
        }
        let fired = self.ctx.advance_to(next)?;
        let pids = self.ctx.wake(fired)?;
        self.resume(pids)?;
        Ok(StepResult::Continued)
    }

    fn resume(&mut self, pids: Vec<ProcessId>) -> Result<(), SimError> {
        for pid in pids {
            let slot = self.processes.get_mut(pid);
            if slot.done {
                continue;
            }
            if slot.process.resume(&mut self.ctx, pid)? == ProcessStatus::Done {
                slot.done = true;
                self.ctx.purge_process(pid);
            }
        }
        Ok(())
    }
}
