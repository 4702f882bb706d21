//! Delta-cycle signal propagation for the weft hardware modeling engine.
//!
//! This crate implements the storage and propagation layer of an
//! event-driven hardware simulator: value cells with separate current and
//! pending slots, per-signal waiter lists for change and edge sensitivity,
//! read-only derived signals (slices, bit indices, clones, reversals,
//! concatenations), tristate buses with contention warnings, and delayed
//! signals with transport delay.
//!
//! # Architecture
//!
//! All signals live in one [`SimContext`] and are addressed by [`SignalId`].
//! Writes go to the pending slot; [`SimContext::commit_changed`] moves
//! pending values into current for every signal written in the delta cycle
//! and returns the fired waiters. Derived signals and buses are maintained
//! by internal observers that run when their sources change, so their values
//! follow one delta cycle later. The [`Kernel`] drives the loop for a set of
//! [`Process`]es and advances time through the future-event queue.
//!
//! # Usage
//!
//! ```ignore
//! use weft_signal::{IntBv, Kernel, SimContext};
//!
//! let mut ctx = SimContext::new();
//! let data = ctx.signal(IntBv::unsigned(0xA5, 8)?)?;
//! let high = ctx.slice(data, 8, 4)?;
//! assert_eq!(ctx.current(high).as_int(), Some(0xA));
//! let result = Kernel::new(ctx).run()?;
//! ```
//!
//! # Modules
//!
//! - `error`: Signal and simulation error types
//! - `time`: Tick time with delta cycles
//! - `value`: Values, kinds, and coercion of assigned data
//! - `waiter`: Waiter lists and edge sensitivity
//! - `signal`: Signal cells and the signal table
//! - `observer`: Observers that maintain one signal from others
//! - `context`: The simulation context and delta-cycle primitives
//! - `derived`: Slices, indices, clones, reversals, and concatenations
//! - `tristate`: Tristate buses and drivers
//! - `delayed`: Delayed signals and the future-event queue
//! - `kernel`: The scheduler loop
//! - `waveform`: Waveform recording (VCD format)

#![warn(missing_docs)]

pub mod context;
pub mod delayed;
pub mod derived;
pub mod error;
pub mod kernel;
pub mod observer;
pub mod signal;
pub mod time;
pub mod tristate;
pub mod value;
pub mod waiter;
pub mod waveform;

pub use context::{EdgeDescriptor, SimContext};
pub use derived::{ConcatField, ConcatLayout, ConcatSlot, Derivation, SlotSource};
pub use error::{SignalError, SimError};
pub use kernel::{Kernel, Process, ProcessStatus, RunResult, StepResult};
pub use observer::{Observer, ObserverCtx};
pub use signal::{DriveKind, SignalId, SignalRole, SignalState, SignalTable};
pub use time::SimTime;
pub use value::{Drive, OpaqueValue, Value, ValueKind};
pub use waiter::{Edge, ObserverId, ProcessId, Waiter, WaiterRegistry};
pub use waveform::{VcdRecorder, WaveformRecorder};

pub use weft_common::{EnumItem, EnumType, Encoding, IntBv};
