//! Diagnostic system for kernel checking and attribute propagation.
//!
//! Every user-facing problem is a [`Diagnostic`] carrying a stable code, a
//! primary span, and the name of the kernel it was found in. The
//! [`queue`] collects them during a compilation and the [`emitter`]
//! renders the flushed result.
//!
//! # Error Guarantees
//!
//! The `ErrorGuaranteed` type provides type-level proof that at least one
//! error was emitted. A kernel that fails validation carries one, so
//! synthesis cannot silently skip a kernel without having reported why.
//!
//! ```text
//! let guarantee = queue.emit_error(diagnostic);
//! fn check_kernel() -> Result<(), ErrorGuaranteed> { ... }
//! ```

mod diagnostic;
pub mod emitter;
mod error_code;
pub mod errors;
mod guarantee;
pub mod queue;

pub use diagnostic::{Diagnostic, Footer, Label, Severity};
pub use error_code::ErrorCode;
pub use errors::ErrorDocs;
pub use guarantee::ErrorGuaranteed;
