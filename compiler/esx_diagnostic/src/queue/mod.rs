//! Collection point for diagnostics raised while checking kernels.
//!
//! The queue drops exact duplicates, caps the number of errors, and hands
//! everything back in source order. The first error rejected by the cap is
//! replaced with a single E9002 so the output says why it stopped.

use esx_ir::Span;

use crate::{Diagnostic, ErrorCode, ErrorGuaranteed};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiagnosticConfig {
    /// Errors kept before the rest are dropped; 0 keeps all of them.
    pub error_limit: usize,
    pub deduplicate: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        DiagnosticConfig {
            error_limit: 10,
            deduplicate: true,
        }
    }
}

impl DiagnosticConfig {
    pub fn unlimited() -> Self {
        DiagnosticConfig {
            error_limit: 0,
            deduplicate: false,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    errors: usize,
    warnings: usize,
    truncated: bool,
    config: DiagnosticConfig,
}

impl DiagnosticQueue {
    pub fn new() -> Self {
        Self::with_config(DiagnosticConfig::default())
    }

    pub fn with_config(config: DiagnosticConfig) -> Self {
        DiagnosticQueue {
            config,
            ..DiagnosticQueue::default()
        }
    }

    /// Queue `diag`; `false` when it was a duplicate or over the error cap.
    pub fn add(&mut self, diag: Diagnostic) -> bool {
        if diag.is_error() && self.limit_reached() {
            if !self.truncated {
                self.truncated = true;
                let span = diag.primary_span().unwrap_or(Span::DUMMY);
                self.diagnostics
                    .push(too_many_errors(self.config.error_limit, span));
            }
            return false;
        }
        if self.config.deduplicate && self.diagnostics.contains(&diag) {
            return false;
        }

        if diag.is_error() {
            self.errors += 1;
        } else {
            self.warnings += 1;
        }
        self.diagnostics.push(diag);
        true
    }

    pub fn extend(&mut self, diags: impl IntoIterator<Item = Diagnostic>) {
        for diag in diags {
            self.add(diag);
        }
    }

    /// Queue an error and return proof that compilation has failed.
    ///
    /// The proof holds even when the cap drops `diag`: earlier errors, or
    /// the E9002 that replaced it, already account for the failure.
    pub fn emit_error(&mut self, diag: Diagnostic) -> ErrorGuaranteed {
        debug_assert!(diag.is_error(), "emit_error called with a warning");
        self.add(diag);
        ErrorGuaranteed::new()
    }

    pub fn limit_reached(&self) -> bool {
        self.config.error_limit > 0 && self.errors >= self.config.error_limit
    }

    /// Whether an error has been dropped by the cap since the last flush.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn has_errors(&self) -> Option<ErrorGuaranteed> {
        ErrorGuaranteed::from_error_count(self.errors)
    }

    /// Drain the queue in source order.
    ///
    /// Diagnostics without a location come first, and E9002 always comes
    /// last. Ties keep the order they were reported in.
    pub fn flush(&mut self) -> Vec<Diagnostic> {
        let mut drained = std::mem::take(&mut self.diagnostics);
        drained.sort_by_key(|d| {
            (
                d.code == ErrorCode::E9002,
                d.primary_span().map_or(0, |s| s.start),
            )
        });
        self.errors = 0;
        self.warnings = 0;
        self.truncated = false;
        drained
    }

    pub fn peek(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }
}

/// The note that replaces errors past the cap.
#[cold]
pub fn too_many_errors(limit: usize, span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E9002)
        .with_message(format!("aborting due to {limit} previous errors"))
        .with_label(span, "error limit reached here")
        .with_note("use --error-limit to increase the limit")
}
