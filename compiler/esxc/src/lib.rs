//! Explicit-SIMD device compiler driver.
//!
//! Ties the two engines together: kernel entry synthesis over the front-end
//! declaration model ([`esx_kernel`]), then intrinsic lowering over the
//! device module ([`esx_lower`]). The `esxc` binary exposes the inspection
//! commands in [`commands`].

pub mod commands;
mod config;
mod pipeline;

use std::sync::Once;

pub use config::{Config, ConfigError};
pub use pipeline::{annotate_module, compile_device, emit_diagnostics, emit_to_stderr, DeviceOutput};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call more than once. Enable with `RUST_LOG=esx_kernel=debug` or
/// `RUST_LOG=esx_lower=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
