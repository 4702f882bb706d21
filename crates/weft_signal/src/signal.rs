//! Signal cells and the table that owns them.
//!
//! Each [`SignalState`] holds a committed `current` value and a `pending`
//! value written during the active delta cycle. Only [`SignalState::commit`]
//! moves data from pending to current, so every reader in a delta cycle sees
//! the same values regardless of write order.

use std::fmt;

use serde::{Deserialize, Serialize};
use weft_common::{Arena, ArenaId};

use crate::derived::Derivation;
use crate::error::SignalError;
use crate::time::SimTime;
use crate::value::{Value, ValueKind};
use crate::waiter::{ObserverId, Waiter, WaiterRegistry};

/// Opaque ID of a signal cell.
///
/// Two signals with equal values are still distinct; identity is the ID.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(u32);

impl ArenaId for SignalId {
    fn from_raw(index: u32) -> Self {
        Self(index)
    }

    fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// How a signal is driven, as seen by a code generator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveKind {
    /// Assigned from clocked logic.
    Reg,
    /// Continuously assigned.
    Wire,
}

/// The structural role of a signal.
#[derive(Clone, Debug)]
pub enum SignalRole {
    /// An ordinary, writable cell.
    Plain,
    /// A read-only cell recomputed from other signals.
    Derived(Derivation),
    /// A read-only cell resolved from its drivers.
    TristateBus {
        /// Drivers in creation order.
        drivers: Vec<SignalId>,
    },
    /// A writable cell feeding a bus; may be released to `Undriven`.
    TristateDriver {
        /// The bus this driver feeds.
        bus: SignalId,
    },
}

/// Transport delay bookkeeping of a delayed signal.
#[derive(Clone, Debug)]
pub(crate) struct DelayState {
    pub(crate) delay: u64,
    /// The value of the most recently scheduled distinct change.
    pub(crate) scheduled: Value,
    /// When that change was scheduled; older in-flight events are stale.
    pub(crate) stamp: SimTime,
}

/// The full state of one signal cell.
#[derive(Debug)]
pub struct SignalState {
    pub(crate) name: Option<String>,
    pub(crate) kind: ValueKind,
    pub(crate) init: Value,
    pub(crate) current: Value,
    pub(crate) pending: Value,
    pub(crate) driven: Option<DriveKind>,
    pub(crate) structural_driven: Option<DriveKind>,
    pub(crate) read: bool,
    pub(crate) used: bool,
    pub(crate) waiters: WaiterRegistry,
    pub(crate) role: SignalRole,
    pub(crate) observer: Option<ObserverId>,
    pub(crate) delay: Option<DelayState>,
    pub(crate) traced: bool,
}

impl SignalState {
    pub(crate) fn new(kind: ValueKind, init: Value, role: SignalRole) -> Self {
        Self {
            name: None,
            kind,
            current: init.clone(),
            pending: init.clone(),
            init,
            driven: None,
            structural_driven: None,
            read: false,
            used: false,
            waiters: WaiterRegistry::new(),
            role,
            observer: None,
            delay: None,
            traced: false,
        }
    }

    /// The assigned name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The kind fixed by the initial value.
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// The initial value.
    pub fn init(&self) -> &Value {
        &self.init
    }

    /// The committed value visible to readers.
    pub fn current(&self) -> &Value {
        &self.current
    }

    /// The value written during the active delta cycle.
    pub fn pending(&self) -> &Value {
        &self.pending
    }

    /// Bit width, or `0` for unsized kinds.
    pub fn bit_width(&self) -> u32 {
        self.kind.bit_width()
    }

    /// Inclusive lower bound of a vector kind.
    pub fn min(&self) -> Option<i128> {
        match self.kind {
            ValueKind::Bits { min, .. } => min,
            _ => None,
        }
    }

    /// Exclusive upper bound of a vector kind.
    pub fn max(&self) -> Option<i128> {
        match self.kind {
            ValueKind::Bits { max, .. } => max,
            _ => None,
        }
    }

    /// Returns `true` for a vector kind with a negative lower bound.
    pub fn is_signed(&self) -> bool {
        self.min().is_some_and(|m| m < 0)
    }

    /// How the signal is driven, if known.
    pub fn driven(&self) -> Option<DriveKind> {
        self.driven
    }

    /// Whether anything reads this signal.
    pub fn is_read(&self) -> bool {
        self.read
    }

    /// Whether the signal is used at all.
    pub fn is_used(&self) -> bool {
        self.used
    }

    /// The structural role.
    pub fn role(&self) -> &SignalRole {
        &self.role
    }

    /// Derived signals and tristate buses reject direct assignment.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self.role,
            SignalRole::Derived(_) | SignalRole::TristateBus { .. }
        )
    }

    /// Tristate buses and drivers may hold `Undriven`.
    pub fn accepts_undriven(&self) -> bool {
        matches!(
            self.role,
            SignalRole::TristateBus { .. } | SignalRole::TristateDriver { .. }
        )
    }

    /// The registered waiters.
    pub fn waiters(&self) -> &WaiterRegistry {
        &self.waiters
    }

    /// Transport delay in ticks, for delayed signals.
    pub fn delay(&self) -> Option<u64> {
        self.delay.as_ref().map(|d| d.delay)
    }

    /// Whether value changes are being recorded to a waveform.
    pub fn is_traced(&self) -> bool {
        self.traced
    }

    /// Commits pending into current.
    ///
    /// Returns `None` when nothing changed, otherwise the waiters fired by the
    /// change, which are removed from their lists.
    pub(crate) fn commit(&mut self) -> Option<Vec<Waiter>> {
        if self.pending == self.current {
            return None;
        }
        let next = self.pending.clone_value();
        Some(self.transition(next))
    }

    /// Replaces current with `next` and fires the matching waiter lists.
    pub(crate) fn transition(&mut self, next: Value) -> Vec<Waiter> {
        let fired = self
            .waiters
            .take_triggered(self.current.is_truthy(), next.is_truthy());
        self.current = next;
        fired
    }

    /// Replaces the initial, current, and pending values at once.
    pub(crate) fn reseed(&mut self, value: Value) {
        self.current = value.clone_value();
        self.pending = value.clone_value();
        self.init = value;
    }

    /// Restores the state a fresh simulation starts from.
    pub(crate) fn reset(&mut self) {
        self.current = self.init.clone();
        self.pending = self.init.clone();
        self.waiters.clear();
        self.name = None;
        self.driven = self.structural_driven;
        self.read = false;
        self.used = false;
        if let Some(delay) = &mut self.delay {
            delay.scheduled = self.init.clone();
            delay.stamp = SimTime::zero();
        }
    }
}

/// All signal cells of a context plus the worklist of cells written this cycle.
#[derive(Debug, Default)]
pub struct SignalTable {
    signals: Arena<SignalId, SignalState>,
    changed: Vec<SignalId>,
}

impl SignalTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc(&mut self, state: SignalState) -> SignalId {
        self.signals.alloc(state)
    }

    /// Returns the state of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this table.
    pub fn get(&self, id: SignalId) -> &SignalState {
        self.signals.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: SignalId) -> &mut SignalState {
        self.signals.get_mut(id)
    }

    /// Returns the state of `id`, or an error for a foreign ID.
    pub fn try_get(&self, id: SignalId) -> Result<&SignalState, SignalError> {
        self.signals
            .try_get(id)
            .ok_or(SignalError::UnknownSignal(id.as_raw()))
    }

    pub(crate) fn try_get_mut(&mut self, id: SignalId) -> Result<&mut SignalState, SignalError> {
        if !self.signals.contains(id) {
            return Err(SignalError::UnknownSignal(id.as_raw()));
        }
        Ok(self.signals.get_mut(id))
    }

    /// The committed value of `id`.
    pub fn current(&self, id: SignalId) -> &Value {
        &self.get(id).current
    }

    /// The name of `id`, or its ID when unnamed.
    pub fn label(&self, id: SignalId) -> String {
        match self.signals.try_get(id).and_then(|s| s.name.as_deref()) {
            Some(name) => name.to_string(),
            None => id.to_string(),
        }
    }

    /// Writes a pending value without coercion or read-only checks.
    pub(crate) fn drive_pending(&mut self, id: SignalId, value: Value) {
        self.get_mut(id).pending = value;
        self.changed.push(id);
    }

    pub(crate) fn mark_changed(&mut self, id: SignalId) {
        self.changed.push(id);
    }

    /// Signals written since the last commit, in write order, possibly repeated.
    pub fn changed(&self) -> &[SignalId] {
        &self.changed
    }

    pub(crate) fn take_changed(&mut self) -> Vec<SignalId> {
        std::mem::take(&mut self.changed)
    }

    pub(crate) fn clear_changed(&mut self) {
        self.changed.clear();
    }

    /// Iterates over all signals in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (SignalId, &SignalState)> {
        self.signals.iter()
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut SignalState> {
        self.signals.values_mut()
    }

    /// Number of signals.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Returns `true` if no signal exists.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}
