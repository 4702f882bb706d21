//! Per-signal lists of parties waiting for a change or an edge.
//!
//! A waiter is either a simulation process or an internal observer that
//! recomputes a derived signal. Waiters are one-shot: a commit that fires a
//! list hands every entry back to the scheduler and empties the list.

use serde::{Deserialize, Serialize};
use weft_common::ArenaId;

/// Opaque ID of a simulation process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(u32);

impl ArenaId for ProcessId {
    fn from_raw(index: u32) -> Self {
        Self(index)
    }

    fn as_raw(self) -> u32 {
        self.0
    }
}

/// Opaque ID of an internal observer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObserverId(u32);

impl ArenaId for ObserverId {
    fn from_raw(index: u32) -> Self {
        Self(index)
    }

    fn as_raw(self) -> u32 {
        self.0
    }
}

/// Something that can be woken when a signal commits a change.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Waiter {
    /// A user process, resumed by the kernel.
    Process(ProcessId),
    /// An observer, run by the context to refresh its target signal.
    Observer(ObserverId),
}

/// Which transitions a waiter wants to hear about.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// Any change of value.
    Any,
    /// Falsy to truthy.
    Rising,
    /// Truthy to falsy.
    Falling,
}

/// The three waiter lists of one signal.
#[derive(Clone, Debug, Default)]
pub struct WaiterRegistry {
    on_change: Vec<Waiter>,
    on_rising: Vec<Waiter>,
    on_falling: Vec<Waiter>,
}

impl WaiterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a waiter to the list for `edge`.
    pub fn register(&mut self, waiter: Waiter, edge: Edge) {
        self.list_mut(edge).push(waiter);
    }

    /// Appends a waiter unless it is already in the list for `edge`.
    pub fn register_once(&mut self, waiter: Waiter, edge: Edge) {
        let list = self.list_mut(edge);
        if !list.contains(&waiter) {
            list.push(waiter);
        }
    }

    /// Returns `true` if `waiter` is in the list for `edge`.
    pub fn contains(&self, waiter: Waiter, edge: Edge) -> bool {
        self.list(edge).contains(&waiter)
    }

    /// Returns the list for `edge` in registration order.
    pub fn list(&self, edge: Edge) -> &[Waiter] {
        match edge {
            Edge::Any => &self.on_change,
            Edge::Rising => &self.on_rising,
            Edge::Falling => &self.on_falling,
        }
    }

    /// Waiters woken by any change.
    pub fn on_change(&self) -> &[Waiter] {
        &self.on_change
    }

    /// Waiters woken by a falsy-to-truthy transition.
    pub fn on_rising(&self) -> &[Waiter] {
        &self.on_rising
    }

    /// Waiters woken by a truthy-to-falsy transition.
    pub fn on_falling(&self) -> &[Waiter] {
        &self.on_falling
    }

    fn list_mut(&mut self, edge: Edge) -> &mut Vec<Waiter> {
        match edge {
            Edge::Any => &mut self.on_change,
            Edge::Rising => &mut self.on_rising,
            Edge::Falling => &mut self.on_falling,
        }
    }

    /// Drains the lists fired by a change from `was` to `now` truthiness.
    ///
    /// The change list always fires; the rising or falling list fires only
    /// when truthiness actually flipped in that direction.
    pub fn take_triggered(&mut self, was: bool, now: bool) -> Vec<Waiter> {
        let mut fired = std::mem::take(&mut self.on_change);
        if !was && now {
            fired.append(&mut self.on_rising);
        } else if was && !now {
            fired.append(&mut self.on_falling);
        }
        fired
    }

    /// Drops every waiter for which `finished` returns `true`.
    pub fn purge(&mut self, mut finished: impl FnMut(&Waiter) -> bool) {
        self.on_change.retain(|w| !finished(w));
        self.on_rising.retain(|w| !finished(w));
        self.on_falling.retain(|w| !finished(w));
    }

    /// Empties all three lists.
    pub fn clear(&mut self) {
        self.on_change.clear();
        self.on_rising.clear();
        self.on_falling.clear();
    }

    /// Total number of registered waiters.
    pub fn len(&self) -> usize {
        self.on_change.len() + self.on_rising.len() + self.on_falling.len()
    }

    /// Returns `true` if nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
