//! Text rendering of diagnostics.

use crate::diagnostic::Diagnostic;

/// Formats a diagnostic for display.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;

    /// Renders several diagnostics, one after another.
    fn render_all(&self, diags: &[Diagnostic]) -> String {
        diags.iter().map(|d| self.render(d)).collect()
    }
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// ```text
/// warning[W101]: bus contention
///   --> signal `top.bus` at t=40
///    = note: 2 drivers active
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalRenderer {
    /// Whether to wrap the header in ANSI color codes.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();

        let header = format!("{}[{}]", diag.severity, diag.code);
        if self.color {
            let color = if diag.severity.is_error() { 31 } else { 33 };
            out.push_str(&format!("\x1b[1;{color}m{header}\x1b[0m: {}\n", diag.message));
        } else {
            out.push_str(&format!("{header}: {}\n", diag.message));
        }

        match (&diag.signal, diag.time) {
            (Some(name), Some(t)) => out.push_str(&format!("  --> signal `{name}` at t={t}\n")),
            (Some(name), None) => out.push_str(&format!("  --> signal `{name}`\n")),
            (None, Some(t)) => out.push_str(&format!("  --> at t={t}\n")),
            (None, None) => {}
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}
