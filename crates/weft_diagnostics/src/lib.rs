//! Structured diagnostics raised while a simulation runs.
//!
//! Conditions that are worth reporting but do not stop the simulation (bus
//! contention being the main one) are emitted as [`Diagnostic`]s into a
//! [`DiagnosticSink`]. Callers drain the sink between runs and format entries
//! with a [`DiagnosticRenderer`].

#![warn(missing_docs)]

pub mod diagnostic;
pub mod renderer;
pub mod sink;

pub use diagnostic::{codes, Category, Diagnostic, DiagnosticCode, Severity};
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use sink::DiagnosticSink;
