//! Output sinks for flushed diagnostics.

mod terminal;

pub use terminal::{ColorMode, TerminalEmitter};

use crate::Diagnostic;

pub trait DiagnosticEmitter {
    fn emit(&mut self, diagnostic: &Diagnostic);

    fn emit_all(&mut self, diagnostics: &[Diagnostic]) {
        diagnostics.iter().for_each(|d| self.emit(d));
    }

    fn flush(&mut self);

    /// Closing line: abort notice when errors were seen, else a warning count.
    fn emit_summary(&mut self, error_count: usize, warning_count: usize);
}
