//! The simulation context: owner of every signal, observer, and future event.
//!
//! [`SimContext`] is the handle processes and the kernel use to create
//! signals, write pending values, and run the two halves of a delta cycle:
//! [`commit_changed`](SimContext::commit_changed) moves pending values into
//! current and collects the fired waiters, then [`wake`](SimContext::wake)
//! runs the fired observers and returns the processes to resume.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use serde::{Deserialize, Serialize};
use weft_common::Arena;
use weft_diagnostics::{Diagnostic, DiagnosticSink};

use crate::delayed::{FutureEvent, ScheduledEvent};
use crate::derived::Derivation;
use crate::error::{SignalError, SimError};
use crate::observer::{assigned_value, AssignObserver, Observer, ObserverCtx};
use crate::signal::{DriveKind, SignalId, SignalRole, SignalState, SignalTable};
use crate::time::SimTime;
use crate::value::{coerce, Drive, Value};
use crate::waiter::{Edge, ObserverId, ProcessId, Waiter};
use crate::waveform::WaveformRecorder;

/// A request for one edge of one signal, as handed to code generators.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct EdgeDescriptor {
    /// The signal whose edge is meant.
    pub signal: SignalId,
    /// Which edge.
    pub edge: Edge,
}

/// Owns all simulation state shared between processes.
pub struct SimContext {
    pub(crate) table: SignalTable,
    pub(crate) observers: Arena<ObserverId, Box<dyn Observer>>,
    pub(crate) diagnostics: DiagnosticSink,
    pub(crate) now: SimTime,
    pub(crate) future: BinaryHeap<Reverse<ScheduledEvent>>,
    pub(crate) next_seq: u64,
    pub(crate) recorder: Option<Box<dyn WaveformRecorder>>,
    pub(crate) trace_dumped: bool,
}

impl Default for SimContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SimContext {
    /// Creates an empty context at time zero.
    pub fn new() -> Self {
        Self {
            table: SignalTable::new(),
            observers: Arena::new(),
            diagnostics: DiagnosticSink::new(),
            now: SimTime::zero(),
            future: BinaryHeap::new(),
            next_seq: 0,
            recorder: None,
            trace_dumped: false,
        }
    }

    // ---- Construction ----

    /// Creates a plain signal whose kind is fixed by `init`.
    pub fn signal(&mut self, init: impl Into<Value>) -> Result<SignalId, SignalError> {
        let init = init.into();
        let kind = init
            .kind()
            .ok_or_else(|| SignalError::InvalidInit("only tristate signals can start undriven".into()))?;
        Ok(self.table.alloc(SignalState::new(kind, init, SignalRole::Plain)))
    }

    /// Creates an independent plain signal seeded with the current value of `source`.
    pub fn copy_signal(&mut self, source: SignalId) -> Result<SignalId, SignalError> {
        let state = self.table.try_get(source)?;
        if state.current.is_undriven() {
            return Err(SignalError::InvalidInit(format!(
                "{} is undriven and cannot seed a copy",
                self.table.label(source)
            )));
        }
        let kind = state.kind.clone();
        let init = state.current.clone();
        Ok(self.table.alloc(SignalState::new(kind, init, SignalRole::Plain)))
    }

    /// Makes `target` follow `source` on every change, coercing into the target's kind.
    ///
    /// The source's current value is written to the target's pending slot
    /// immediately and commits with the next delta cycle.
    pub fn assign(&mut self, target: SignalId, source: SignalId) -> Result<ObserverId, SignalError> {
        self.table.try_get(source)?;
        if self.table.try_get(target)?.is_read_only() {
            return Err(SignalError::ReadOnlyAssignment {
                signal: self.table.label(target),
            });
        }
        let value = assigned_value(&self.table, target, source)?;
        self.table.drive_pending(target, value);

        let state = self.table.get_mut(target);
        state.driven = Some(DriveKind::Wire);
        state.structural_driven = Some(DriveKind::Wire);
        self.mark_read(source)?;
        Ok(self.add_observer(Box::new(AssignObserver { target, source })))
    }

    /// Registers an observer on the change lists of its sources.
    pub fn add_observer(&mut self, observer: Box<dyn Observer>) -> ObserverId {
        let target = observer.target();
        let oid = self.observers.alloc(observer);
        self.arm_observer(oid);
        if self.table.try_get(target).is_ok() {
            self.table.get_mut(target).observer = Some(oid);
        }
        oid
    }

    // ---- Access ----

    /// Returns the state of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not created by this context.
    pub fn get(&self, id: SignalId) -> &SignalState {
        self.table.get(id)
    }

    /// Returns the state of `id`, or an error for a foreign ID.
    pub fn try_get(&self, id: SignalId) -> Result<&SignalState, SignalError> {
        self.table.try_get(id)
    }

    /// The committed value of `id`.
    pub fn current(&self, id: SignalId) -> &Value {
        self.table.current(id)
    }

    /// The pending value of `id`.
    pub fn pending(&self, id: SignalId) -> &Value {
        self.table.get(id).pending()
    }

    /// All signals.
    pub fn signals(&self) -> &SignalTable {
        &self.table
    }

    /// The current simulated time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Warnings raised during the run.
    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.diagnostics
    }

    /// Drains the buffered diagnostics; the sink's counters are kept.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.take_all()
    }

    // ---- Metadata ----

    /// Names a signal for diagnostics, traces, and code generation.
    pub fn set_name(&mut self, id: SignalId, name: impl Into<String>) -> Result<(), SignalError> {
        self.table.try_get_mut(id)?.name = Some(name.into());
        Ok(())
    }

    /// Records how a signal is driven.
    pub fn set_driven(&mut self, id: SignalId, kind: DriveKind) -> Result<(), SignalError> {
        self.table.try_get_mut(id)?.driven = Some(kind);
        Ok(())
    }

    /// Marks a signal as read; derived signals pass the mark on to their sources.
    pub fn mark_read(&mut self, id: SignalId) -> Result<(), SignalError> {
        self.cascade(id, |s| s.read = true)
    }

    /// Marks a signal as used; derived signals pass the mark on to their sources.
    pub fn mark_used(&mut self, id: SignalId) -> Result<(), SignalError> {
        self.cascade(id, |s| s.used = true)
    }

    fn cascade(&mut self, id: SignalId, mut mark: impl FnMut(&mut SignalState)) -> Result<(), SignalError> {
        self.table.try_get(id)?;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let state = self.table.get_mut(next);
            mark(state);
            if let SignalRole::Derived(derivation) = &state.role {
                stack.extend(derivation.sources());
            }
        }
        Ok(())
    }

    /// Describes an edge of `id` for a code generator. Asking for an edge reads the signal.
    pub fn edge_descriptor(&mut self, id: SignalId, edge: Edge) -> Result<EdgeDescriptor, SignalError> {
        self.mark_read(id)?;
        Ok(EdgeDescriptor { signal: id, edge })
    }

    /// How a derived signal is computed, or `None` for other roles.
    pub fn derivation(&self, id: SignalId) -> Option<&Derivation> {
        match &self.table.try_get(id).ok()?.role {
            SignalRole::Derived(derivation) => Some(derivation),
            _ => None,
        }
    }

    /// Drivers of a tristate bus in creation order; empty for other roles.
    pub fn bus_drivers(&self, id: SignalId) -> &[SignalId] {
        match self.table.try_get(id).map(|s| &s.role) {
            Ok(SignalRole::TristateBus { drivers }) => drivers,
            _ => &[],
        }
    }

    // ---- Writing and committing ----

    /// Writes the pending value of a writable signal.
    ///
    /// The value is coerced into the signal's kind first; on error neither
    /// pending nor current changes. The signal is queued for the next commit.
    pub fn set_pending(&mut self, id: SignalId, drive: impl Into<Drive>) -> Result<(), SignalError> {
        let state = self.table.try_get(id)?;
        if state.is_read_only() {
            return Err(SignalError::ReadOnlyAssignment {
                signal: self.table.label(id),
            });
        }
        let drive = self.resolve_drive(drive.into())?;
        let value = coerce(&state.kind, drive, state.accepts_undriven()).map_err(|reason| {
            SignalError::TypeCoercion {
                signal: self.table.label(id),
                reason,
            }
        })?;
        self.table.drive_pending(id, value);
        Ok(())
    }

    /// Replaces signal references with the referenced current values.
    fn resolve_drive(&self, drive: Drive) -> Result<Drive, SignalError> {
        match drive {
            Drive::Signal(src) => Ok(Drive::Value(self.table.try_get(src)?.current.clone())),
            Drive::Concat(parts) => parts
                .into_iter()
                .map(|p| self.resolve_drive(p))
                .collect::<Result<Vec<_>, _>>()
                .map(Drive::Concat),
            other => Ok(other),
        }
    }

    /// Signals written since the last commit.
    pub fn changed(&self) -> &[SignalId] {
        self.table.changed()
    }

    /// Returns `true` if any signal has an uncommitted write.
    pub fn has_changes(&self) -> bool {
        !self.table.changed().is_empty()
    }

    /// Commits one signal and returns the waiters its change fired.
    ///
    /// Does nothing when pending equals current. Delayed signals do not
    /// commit here; they schedule the commit `delay` ticks ahead.
    pub fn update(&mut self, id: SignalId) -> Result<Vec<Waiter>, SimError> {
        if self.table.try_get(id)?.delay.is_some() {
            self.schedule_delayed(id);
            return Ok(Vec::new());
        }
        self.dump_traced()?;
        match self.table.get_mut(id).commit() {
            Some(fired) => {
                self.record(id)?;
                Ok(fired)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Commits every signal written this delta cycle and opens the next one.
    ///
    /// Each signal is committed once however often it was written. The
    /// returned waiters are deduplicated and in firing order.
    pub fn commit_changed(&mut self) -> Result<Vec<Waiter>, SimError> {
        let changed = self.table.take_changed();
        let mut seen = HashSet::new();
        let mut fired = Vec::new();
        for id in changed {
            if seen.insert(id) {
                fired.extend(self.update(id)?);
            }
        }
        self.now = self.now.next_delta();
        Ok(dedup(fired))
    }

    /// Runs fired observers and returns the processes to resume.
    ///
    /// Observers write their targets' pending values, so their effects
    /// commit in the following delta cycle. Each observer is re-armed on
    /// its sources before it runs. A failing observer does not stop the
    /// rest of the batch; the first error is returned once all have run.
    pub fn wake(&mut self, waiters: Vec<Waiter>) -> Result<Vec<ProcessId>, SignalError> {
        let mut processes = Vec::new();
        let mut first_error = None;
        for waiter in waiters {
            match waiter {
                Waiter::Process(pid) => {
                    if !processes.contains(&pid) {
                        processes.push(pid);
                    }
                }
                Waiter::Observer(oid) => {
                    if let Err(err) = self.run_observer(oid) {
                        first_error.get_or_insert(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(processes),
        }
    }

    fn run_observer(&mut self, oid: ObserverId) -> Result<(), SignalError> {
        self.arm_observer(oid);
        let mut ctx = ObserverCtx {
            table: &mut self.table,
            diagnostics: &self.diagnostics,
            now: self.now,
        };
        self.observers.get_mut(oid).on_source_changed(&mut ctx)
    }

    /// Puts `oid` on the change list of each of its sources.
    fn arm_observer(&mut self, oid: ObserverId) {
        for src in self.observers.get(oid).sources(&self.table) {
            self.table
                .get_mut(src)
                .waiters
                .register_once(Waiter::Observer(oid), Edge::Any);
        }
    }

    /// Suspends a process until `id` changes in the given way.
    pub fn wait_on(&mut self, id: SignalId, edge: Edge, process: ProcessId) -> Result<(), SignalError> {
        self.table
            .try_get_mut(id)?
            .waiters
            .register(Waiter::Process(process), edge);
        Ok(())
    }

    /// Drops a finished process from every waiter list and the future queue.
    pub fn purge_process(&mut self, process: ProcessId) {
        let gone = Waiter::Process(process);
        for state in self.table.values_mut() {
            state.waiters.purge(|w| *w == gone);
        }
        self.future
            .retain(|Reverse(e)| !matches!(e.event, FutureEvent::Wake(p) if p == process));
    }

    // ---- Tracing ----

    /// Attaches a waveform recorder and opens a top-level scope in it.
    pub fn set_recorder(&mut self, mut recorder: Box<dyn WaveformRecorder>, scope: &str) -> Result<(), SimError> {
        recorder.begin_scope(scope)?;
        self.recorder = Some(recorder);
        Ok(())
    }

    /// Registers `id` with the recorder.
    ///
    /// Traced signals are dumped with their current values right before the
    /// first commit; after that, registering more signals fails.
    pub fn trace(&mut self, id: SignalId) -> Result<(), SimError> {
        let label = self.table.label(id);
        let state = self.table.try_get_mut(id)?;
        let Some(recorder) = self.recorder.as_mut() else {
            return Err(SimError::UnregisteredTrace(label));
        };
        if state.traced {
            return Ok(());
        }
        if self.trace_dumped {
            return Err(SimError::TraceStarted(label));
        }
        recorder.register_signal(id, &label, &state.kind)?;
        state.traced = true;
        Ok(())
    }

    /// Writes the initial values of all traced signals, once.
    pub(crate) fn dump_traced(&mut self) -> Result<(), SimError> {
        if self.trace_dumped {
            return Ok(());
        }
        let Some(recorder) = self.recorder.as_mut() else {
            return Ok(());
        };
        self.trace_dumped = true;
        for (id, state) in self.table.iter().filter(|(_, s)| s.traced) {
            recorder.record_change(self.now.time, id, &state.current)?;
        }
        Ok(())
    }

    /// Flushes the attached recorder.
    pub fn finish_trace(&mut self) -> Result<(), SimError> {
        self.dump_traced()?;
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.finalize()?;
        }
        Ok(())
    }

    pub(crate) fn record(&mut self, id: SignalId) -> Result<(), SimError> {
        let state = self.table.get(id);
        if !state.traced {
            return Ok(());
        }
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record_change(self.now.time, id, &state.current)?;
        }
        Ok(())
    }

    // ---- Restart ----

    /// Returns every cell to its initial value and clears all run-time state.
    ///
    /// Waiters, usage flags, names, pending writes, future events, and
    /// diagnostics are dropped. Observers then restart in creation order:
    /// derived signals are recomputed from their reset sources and
    /// continuous assignments re-drive their targets, as at construction.
    ///
    /// An attached recorder is finalized and detached, since a waveform
    /// cannot go back in time; attach a new one to trace the next run.
    pub fn reset(&mut self) -> Result<(), SimError> {
        self.finish_trace()?;
        self.recorder = None;
        self.trace_dumped = false;
        for state in self.table.values_mut() {
            state.reset();
            state.traced = false;
        }
        self.table.clear_changed();
        self.future.clear();
        self.next_seq = 0;
        self.now = SimTime::zero();
        self.diagnostics.clear();

        let ids: Vec<ObserverId> = self.observers.iter().map(|(oid, _)| oid).collect();
        for oid in ids {
            self.arm_observer(oid);
            let mut ctx = ObserverCtx {
                table: &mut self.table,
                diagnostics: &self.diagnostics,
                now: self.now,
            };
            self.observers.get_mut(oid).on_reset(&mut ctx)?;
        }
        Ok(())
    }
}

fn dedup(waiters: Vec<Waiter>) -> Vec<Waiter> {
    let mut seen = HashSet::new();
    waiters.into_iter().filter(|w| seen.insert(*w)).collect()
}
