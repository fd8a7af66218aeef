//! Proof that an error was reported.

use std::fmt;

/// Zero-sized token returned when an error reaches the queue.
///
/// Rejecting a kernel requires one, so a kernel can only be dropped from
/// synthesis after the user was told why.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ErrorGuaranteed(());

impl ErrorGuaranteed {
    pub(crate) const fn new() -> Self {
        ErrorGuaranteed(())
    }

    /// `None` unless at least one error has been counted.
    pub fn from_error_count(count: usize) -> Option<Self> {
        (count > 0).then(Self::new)
    }
}

impl fmt::Display for ErrorGuaranteed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("errors were reported")
    }
}
