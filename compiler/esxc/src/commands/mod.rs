//! Command handlers for the `esxc` CLI.
//!
//! Each handler prints to stdout and exits with status 1 on bad input. The
//! string-producing halves are public so they can be tested without a
//! process.

mod demangle;
mod explain;
mod lower_name;
mod rules;

pub use demangle::{demangle, demangle_symbol};
pub use explain::explain_error;
pub use lower_name::print_lower_name;
pub use rules::{format_rule, list_rules, matching_rules};
