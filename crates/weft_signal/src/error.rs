//! Error types for signal construction, assignment, and simulation runs.
//!
//! [`SignalError`] covers everything a single cell operation can reject;
//! [`SimError`] wraps it together with failures of the delta-cycle loop and
//! waveform output.

use std::io;

use weft_config::ConfigError;

/// Errors raised synchronously by cell construction and assignment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// A value whose shape does not fit the cell's kind, width, or bounds.
    #[error("cannot assign to {signal}: {reason}")]
    TypeCoercion {
        /// Name (or id) of the target signal.
        signal: String,
        /// What was wrong with the value.
        reason: String,
    },

    /// A direct assignment to a derived signal or tristate bus.
    #[error("{signal} is read-only")]
    ReadOnlyAssignment {
        /// Name (or id) of the target signal.
        signal: String,
    },

    /// A concatenation field or tristate prototype of a kind that has no bit layout.
    #[error("unsupported field {index}: {reason}")]
    UnsupportedFieldType {
        /// Position of the field in declaration order.
        index: usize,
        /// Why the field was rejected.
        reason: String,
    },

    /// A concatenation with no fields.
    #[error("concatenation needs at least one field")]
    EmptyConcat,

    /// A slice that is empty, reversed, or reaches past its source.
    #[error("invalid slice [{high}:{low}] of {signal}: {reason}")]
    InvalidSlice {
        /// Name (or id) of the source signal.
        signal: String,
        /// Exclusive upper bit.
        high: u32,
        /// Inclusive lower bit.
        low: u32,
        /// Why the range was rejected.
        reason: String,
    },

    /// A bit index outside the source, or a source that cannot be indexed.
    #[error("invalid bit index {bit} of {signal}: {reason}")]
    InvalidIndex {
        /// Name (or id) of the source signal.
        signal: String,
        /// The requested bit.
        bit: u32,
        /// Why the index was rejected.
        reason: String,
    },

    /// A driver was requested from a signal that is not a tristate bus.
    #[error("{0} is not a tristate bus")]
    NotATristateBus(String),

    /// A signal id that this context never allocated.
    #[error("unknown signal id {0}")]
    UnknownSignal(u32),

    /// An initial value that cannot seed a cell.
    #[error("invalid initial value: {0}")]
    InvalidInit(String),
}

/// Errors that abort a simulation run.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A cell operation failed.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// Too many delta cycles at one time step, indicating a combinational loop.
    #[error("delta cycle limit exceeded at t={time} (max {max_deltas} deltas)")]
    DeltaCycleLimit {
        /// Simulated time at which the limit was hit.
        time: u64,
        /// The configured limit.
        max_deltas: u32,
    },

    /// Writing waveform data failed.
    #[error("waveform I/O error: {0}")]
    WaveformIo(#[from] io::Error),

    /// A change was recorded for a signal the recorder never registered.
    #[error("{0} is not registered for tracing")]
    UnregisteredTrace(String),

    /// A signal was traced after the waveform definitions were closed.
    #[error("cannot trace {0} after recording has started")]
    TraceStarted(String),

    /// The run configuration was invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Future events must not be scheduled in the past.
    #[error("cannot move time backwards from {from} to {to}")]
    TimeReversal {
        /// Current time.
        from: u64,
        /// Requested time.
        to: u64,
    },

    /// A process reported a failure of its own.
    #[error("process '{name}' failed: {reason}")]
    Process {
        /// The process name.
        name: String,
        /// Description of the failure.
        reason: String,
    },
}
