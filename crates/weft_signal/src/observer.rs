//! Observers: internal waiters that keep one signal in step with others.
//!
//! Derived signals, tristate buses, and continuous assignments are all
//! maintained by an [`Observer`] registered on the change lists of its
//! sources. When a source commits a change, the observer recomputes its
//! target and writes the target's pending value, which commits one delta
//! cycle later like any other write.

use std::fmt;

use weft_diagnostics::DiagnosticSink;

use crate::error::SignalError;
use crate::signal::{SignalId, SignalState, SignalTable};
use crate::time::SimTime;
use crate::value::{coerce, Drive, Value};

/// What an observer may see and touch while it runs.
pub struct ObserverCtx<'a> {
    pub(crate) table: &'a mut SignalTable,
    pub(crate) diagnostics: &'a DiagnosticSink,
    pub(crate) now: SimTime,
}

impl ObserverCtx<'_> {
    /// The committed value of `id`.
    pub fn current(&self, id: SignalId) -> &Value {
        self.table.current(id)
    }

    /// The full state of `id`.
    pub fn signal(&self, id: SignalId) -> &SignalState {
        self.table.get(id)
    }

    /// Read access to every signal.
    pub fn table(&self) -> &SignalTable {
        self.table
    }

    /// Name of `id`, or its ID when unnamed.
    pub fn label(&self, id: SignalId) -> String {
        self.table.label(id)
    }

    /// Writes the pending value of the observer's target.
    ///
    /// Bypasses the read-only check; the value must already have the
    /// target's kind.
    pub fn drive(&mut self, id: SignalId, value: Value) {
        self.table.drive_pending(id, value);
    }

    /// Sink for warnings raised while recomputing.
    pub fn diagnostics(&self) -> &DiagnosticSink {
        self.diagnostics
    }

    /// The current simulated time.
    pub fn now(&self) -> SimTime {
        self.now
    }
}

/// Keeps a target signal consistent with its sources.
pub trait Observer: fmt::Debug {
    /// The signal this observer writes.
    fn target(&self) -> SignalId;

    /// The signals whose changes trigger a recomputation.
    ///
    /// Asked again each time the observer is re-armed, so the set may grow
    /// as the table does.
    fn sources(&self, signals: &SignalTable) -> Vec<SignalId>;

    /// Recomputes the target after one or more sources committed a change.
    fn on_source_changed(&mut self, ctx: &mut ObserverCtx<'_>) -> Result<(), SignalError>;

    /// Re-establishes the target after [`SimContext::reset`].
    ///
    /// Runs once per observer in creation order, after every cell is back
    /// at its initial value.
    ///
    /// [`SimContext::reset`]: crate::SimContext::reset
    fn on_reset(&mut self, _ctx: &mut ObserverCtx<'_>) -> Result<(), SignalError> {
        Ok(())
    }
}

/// A continuous assignment `target = source`.
///
/// The source value is coerced into the target's kind on every change, so a
/// narrower vector can feed a wider one, and an out-of-range value is
/// reported as a coercion error.
#[derive(Debug)]
pub(crate) struct AssignObserver {
    pub(crate) target: SignalId,
    pub(crate) source: SignalId,
}

impl Observer for AssignObserver {
    fn target(&self) -> SignalId {
        self.target
    }

    fn sources(&self, _signals: &SignalTable) -> Vec<SignalId> {
        vec![self.source]
    }

    fn on_source_changed(&mut self, ctx: &mut ObserverCtx<'_>) -> Result<(), SignalError> {
        let value = assigned_value(ctx.table, self.target, self.source)?;
        ctx.drive(self.target, value);
        Ok(())
    }

    fn on_reset(&mut self, ctx: &mut ObserverCtx<'_>) -> Result<(), SignalError> {
        self.on_source_changed(ctx)
    }
}

/// The value `source` contributes to `target` under continuous assignment.
pub(crate) fn assigned_value(
    table: &SignalTable,
    target: SignalId,
    source: SignalId,
) -> Result<Value, SignalError> {
    let state = table.get(target);
    let drive = Drive::Value(table.current(source).clone());
    coerce(&state.kind, drive, state.accepts_undriven()).map_err(|reason| {
        SignalError::TypeCoercion {
            signal: table.label(target),
            reason,
        }
    })
}
