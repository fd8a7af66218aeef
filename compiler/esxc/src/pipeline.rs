//! The device pipeline.
//!
//! 1. Synthesize kernel entries and propagate kernel attributes.
//! 2. Carry what synthesis learned (explicit SIMD, accessor pointers,
//!    argument types) onto the device module's functions.
//! 3. Lower explicit-SIMD intrinsics.
//!
//! Synthesis errors stop the pipeline before lowering; they are returned as
//! diagnostics, not as an `Err`. Lowering errors are fatal.

use std::io::{IsTerminal, Write};

use esx_diagnostic::emitter::{ColorMode, DiagnosticEmitter, TerminalEmitter};
use esx_diagnostic::queue::DiagnosticQueue;
use esx_diagnostic::{Diagnostic, Severity};
use esx_ir::Program;
use esx_kernel::{synthesize, Synthesis};
use esx_lower::{lower_module, LowerError, LowerStats, Module};
use tracing::{debug, warn};

use crate::Config;

/// Everything one device compilation produced.
#[derive(Debug)]
pub struct DeviceOutput {
    pub synthesis: Synthesis,
    /// Sorted diagnostics from synthesis and attribute propagation.
    pub diagnostics: Vec<Diagnostic>,
    /// `None` when synthesis failed and lowering did not run.
    pub lowering: Option<LowerStats>,
    /// Integration header text, when requested and synthesis succeeded.
    pub header: Option<String>,
}

impl DeviceOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Run synthesis over `program`, then lower `module`.
pub fn compile_device(
    program: &mut Program,
    module: &mut Module,
    config: &Config,
) -> Result<DeviceOutput, LowerError> {
    let mut diags = DiagnosticQueue::with_config(config.diagnostic_config());
    let synthesis = synthesize(program, &config.synthesis_options(), &mut diags);
    let failed = diags.has_errors().is_some();
    let diagnostics = diags.flush();

    if failed {
        debug!(
            diagnostics = diagnostics.len(),
            "synthesis failed, skipping lowering"
        );
        return Ok(DeviceOutput {
            synthesis,
            diagnostics,
            lowering: None,
            header: None,
        });
    }

    let annotated = annotate_module(program, &synthesis, module);
    let stats = lower_module(module, &config.lower_options())?;
    debug!(
        kernels = synthesis.kernels.len(),
        annotated,
        functions = stats.functions,
        intrinsics = stats.intrinsics,
        "device pipeline finished"
    );

    let header = config.emit_header.then(|| synthesis.header.to_string());
    Ok(DeviceOutput {
        synthesis,
        diagnostics,
        lowering: Some(stats),
        header,
    })
}

/// Copy synthesis results onto the device functions of the same name.
///
/// Returns how many synthesized kernels found their device function.
pub fn annotate_module(program: &Program, synthesis: &Synthesis, module: &mut Module) -> usize {
    let mut annotated = 0;
    for kernel in &synthesis.kernels {
        let name = &program.function(kernel.kernel).name;
        let Some(id) = module.find_function(name) else {
            warn!(kernel = %name, "no device function for synthesized kernel");
            continue;
        };
        let metadata = &mut module.function_mut(id).metadata;
        metadata.explicit_simd |= kernel.simd;
        metadata.arg_types = kernel
            .params
            .iter()
            .map(|p| program.type_name(p.ty))
            .collect();
        metadata.accessor_ptrs = kernel.params.iter().map(|p| p.esimd_accessor_ptr).collect();
        annotated += 1;
    }

    // Propagation floods explicit SIMD through everything a SIMD body calls.
    for (_, decl) in program.functions().filter(|(_, f)| f.is_explicit_simd()) {
        if let Some(id) = module.find_function(&decl.name) {
            module.function_mut(id).metadata.explicit_simd = true;
        }
    }
    annotated
}

/// Render `diagnostics` and a summary to `writer`.
pub fn emit_diagnostics<W: Write>(
    writer: W,
    diagnostics: &[Diagnostic],
    color: ColorMode,
    is_tty: bool,
) {
    let mut emitter = TerminalEmitter::with_color_mode(writer, color, is_tty);
    emitter.emit_all(diagnostics);
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count();
    emitter.emit_summary(errors, warnings);
    emitter.flush();
}

/// Render `diagnostics` to stderr.
pub fn emit_to_stderr(diagnostics: &[Diagnostic], color: ColorMode) {
    let stderr = std::io::stderr();
    let is_tty = stderr.is_terminal();
    emit_diagnostics(stderr, diagnostics, color, is_tty);
}

#[cfg(test)]
mod tests;
