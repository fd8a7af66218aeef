//! Plain or ANSI-colored text output.
//!
//! Uncolored output is byte-for-byte the `Display` form of each diagnostic
//! followed by a blank line.

use std::io::{self, Write};

use crate::diagnostic::{Footer, PRIMARY_MARKER, RELATED_MARKER};
use crate::{Diagnostic, Severity};

use super::DiagnosticEmitter;

/// Text styles the emitter paints with.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Style {
    Error,
    Warning,
    Emphasis,
    Related,
    Help,
}

impl Style {
    fn ansi(self) -> &'static str {
        match self {
            Style::Error => "\x1b[1;31m",
            Style::Warning => "\x1b[1;33m",
            Style::Emphasis => "\x1b[1m",
            Style::Related => "\x1b[1;34m",
            Style::Help => "\x1b[1;32m",
        }
    }

    fn severity(severity: Severity) -> Self {
        match severity {
            Severity::Error => Style::Error,
            Severity::Warning => Style::Warning,
        }
    }
}

const RESET: &str = "\x1b[0m";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Color only when writing to a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn should_use_colors(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

/// Writes diagnostics as text. Write failures are ignored; there is
/// nowhere left to report them.
pub struct TerminalEmitter<W: Write> {
    writer: W,
    colors: bool,
}

impl<W: Write> TerminalEmitter<W> {
    pub fn with_color_mode(writer: W, mode: ColorMode, is_tty: bool) -> Self {
        TerminalEmitter {
            writer,
            colors: mode.should_use_colors(is_tty),
        }
    }

    pub fn stderr(mode: ColorMode, is_tty: bool) -> TerminalEmitter<io::Stderr> {
        TerminalEmitter::with_color_mode(io::stderr(), mode, is_tty)
    }

    fn paint(&mut self, text: &str, style: Style) -> io::Result<()> {
        if self.colors {
            write!(self.writer, "{}{text}{RESET}", style.ansi())
        } else {
            self.writer.write_all(text.as_bytes())
        }
    }

    fn write_diagnostic(&mut self, diag: &Diagnostic) -> io::Result<()> {
        let severity = Style::severity(diag.severity);
        self.paint(diag.severity.as_str(), severity)?;
        self.paint(&format!("[{}]", diag.code), Style::Emphasis)?;
        writeln!(self.writer, ": {}", diag.message)?;

        let labels = diag
            .primary
            .iter()
            .map(|l| (PRIMARY_MARKER, l, severity))
            .chain(diag.related.iter().map(|l| (RELATED_MARKER, l, Style::Related)));
        for (marker, label, style) in labels {
            write!(self.writer, "  {marker} {}: ", label.span)?;
            self.paint(&label.message, style)?;
            writeln!(self.writer)?;
        }

        for footer in diag.footers() {
            let style = match footer {
                Footer::Help(_) => Style::Help,
                Footer::Kernel(_) | Footer::Note(_) => Style::Emphasis,
            };
            write!(self.writer, "  = ")?;
            self.paint(footer.kind(), style)?;
            writeln!(self.writer, ": {}", footer.text())?;
        }
        writeln!(self.writer)
    }

    fn write_summary(&mut self, errors: usize, warnings: usize) -> io::Result<()> {
        let warned = match warnings {
            0 => None,
            1 => Some("1 warning emitted".to_string()),
            n => Some(format!("{n} warnings emitted")),
        };
        match (errors, warned) {
            (0, None) => Ok(()),
            (0, Some(warned)) => {
                self.paint("warning", Style::Warning)?;
                writeln!(self.writer, ": {warned}")
            }
            (errors, warned) => {
                self.paint("error", Style::Error)?;
                let previous = if errors == 1 {
                    "previous error".to_string()
                } else {
                    format!("{errors} previous errors")
                };
                match warned {
                    Some(warned) => writeln!(self.writer, ": aborting due to {previous}; {warned}"),
                    None => writeln!(self.writer, ": aborting due to {previous}"),
                }
            }
        }
    }
}

impl<W: Write> DiagnosticEmitter for TerminalEmitter<W> {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        let _ = self.write_diagnostic(diagnostic);
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }

    fn emit_summary(&mut self, error_count: usize, warning_count: usize) {
        let _ = self.write_summary(error_count, warning_count);
    }
}
