//! The [`Diagnostic`] record and its builder.
//!
//! A diagnostic points at one primary location, may point at related
//! locations, and remembers which kernel it was raised for so the report
//! can name the entry point even when the span sits inside a helper.

use esx_ir::Span;
use std::fmt;

use crate::ErrorCode;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    /// Severity a code carries unless a caller overrides it.
    pub fn of(code: ErrorCode) -> Self {
        if code.is_warning() {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A span with the text shown beside it.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

impl Label {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Label {
            span,
            message: message.into(),
        }
    }
}

/// Trailing `= kind: text` lines of a rendered diagnostic.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Footer<'a> {
    Kernel(&'a str),
    Note(&'a str),
    Help(&'a str),
}

impl<'a> Footer<'a> {
    pub fn kind(self) -> &'static str {
        match self {
            Footer::Kernel(_) => "kernel",
            Footer::Note(_) => "note",
            Footer::Help(_) => "help",
        }
    }

    pub fn text(self) -> &'a str {
        match self {
            Footer::Kernel(text) | Footer::Note(text) | Footer::Help(text) => text,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[must_use = "diagnostics should be reported or returned, not silently dropped"]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    /// Where the problem is; `None` for whole-compilation problems.
    pub primary: Option<Label>,
    pub related: Vec<Label>,
    /// Name of the kernel being checked when this was raised.
    pub kernel: Option<String>,
    pub notes: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// A diagnostic with the severity `code` implies.
    pub fn new(code: ErrorCode) -> Self {
        Diagnostic {
            code,
            severity: Severity::of(code),
            message: String::new(),
            primary: None,
            related: Vec::new(),
            kernel: None,
            notes: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    #[cold]
    pub fn error(code: ErrorCode) -> Self {
        Diagnostic {
            severity: Severity::Error,
            ..Self::new(code)
        }
    }

    #[cold]
    pub fn warning(code: ErrorCode) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Self::new(code)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the primary location. A second call demotes the previous one
    /// to a related label.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        if let Some(previous) = self.primary.replace(Label::new(span, message)) {
            self.related.insert(0, previous);
        }
        self
    }

    pub fn with_secondary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.related.push(Label::new(span, message));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Attach the kernel name unless one is already recorded.
    pub fn in_kernel(mut self, kernel: &str) -> Self {
        if self.kernel.is_none() {
            self.kernel = Some(kernel.to_string());
        }
        self
    }

    pub fn primary_span(&self) -> Option<Span> {
        self.primary.as_ref().map(|l| l.span)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Footer lines in render order: kernel, notes, then suggestions.
    pub fn footers(&self) -> impl Iterator<Item = Footer<'_>> {
        self.kernel
            .as_deref()
            .map(Footer::Kernel)
            .into_iter()
            .chain(self.notes.iter().map(|n| Footer::Note(n)))
            .chain(self.suggestions.iter().map(|s| Footer::Help(s)))
    }
}

/// Gutter marker for the primary location.
pub const PRIMARY_MARKER: &str = "-->";
/// Gutter marker for related locations.
pub const RELATED_MARKER: &str = ":::";

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(primary) = &self.primary {
            write!(f, "\n  {PRIMARY_MARKER} {}: {}", primary.span, primary.message)?;
        }
        for label in &self.related {
            write!(f, "\n  {RELATED_MARKER} {}: {}", label.span, label.message)?;
        }
        for footer in self.footers() {
            write!(f, "\n  = {}: {}", footer.kind(), footer.text())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
