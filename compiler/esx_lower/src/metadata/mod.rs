//! Kernel metadata for explicit-SIMD device modules.
//!
//! The back-end finds its kernels through the `genx.kernels` table: one
//! entry per explicit-SIMD kernel, carrying per-argument kinds, argument
//! descriptors, and the shared local memory size that `slm_init` raises.
//!
//! Globals tagged `genx_volatile` whose struct wraps a single `simd` vector
//! pin that vector type: loads and stores of it must stay intrinsic calls.

use std::fmt;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::ir::{FuncId, Function, GlobalTy, Module, Ty};

/// Name of the named metadata holding kernel entries.
pub const GENX_KERNELS: &str = "genx.kernels";

/// Architecture component written into the target triple.
pub const GENX_ARCH: &str = "genx64";

/// Struct name suffix of the vector wrapper type a volatile global holds.
const SIMD_STRUCT_SUFFIX: &str = "cl::sycl::INTEL::gpu::simd";

const IMAGE_TYPES: [&str; 3] = ["image1d_t", "image2d_t", "image3d_t"];

/// Kind of a kernel argument, as the back-end's input records encode it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArgKind {
    General,
    Sampler,
    Surface,
    Vme,
}

impl ArgKind {
    pub const fn code(self) -> u32 {
        match self {
            ArgKind::General => 0,
            ArgKind::Sampler => 1,
            ArgKind::Surface => 2,
            ArgKind::Vme => 3,
        }
    }
}

/// Input/output kind of a kernel argument. Only `Normal` is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IoKind {
    Normal,
    Input,
    Output,
    InputOutput,
}

impl IoKind {
    pub const fn code(self) -> u32 {
        match self {
            IoKind::Normal => 0,
            IoKind::Input => 1,
            IoKind::Output => 2,
            IoKind::InputOutput => 3,
        }
    }
}

/// One `genx.kernels` entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelMetadata {
    pub function: FuncId,
    pub name: String,
    pub arg_kinds: Vec<ArgKind>,
    /// Shared local memory in bytes.
    pub slm_size: u64,
    /// Argument offsets are assigned by the back-end; always 0 here.
    pub arg_offsets: u32,
    pub io_kinds: Vec<IoKind>,
    /// `buffer_t`, `svmptr_t`, an image type name, or empty.
    pub arg_descs: Vec<String>,
}

impl fmt::Display for KernelMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<String> = self.arg_kinds.iter().map(|k| k.code().to_string()).collect();
        let io: Vec<String> = self.io_kinds.iter().map(|k| k.code().to_string()).collect();
        let descs: Vec<String> = self.arg_descs.iter().map(|d| format!("\"{d}\"")).collect();
        write!(
            f,
            "!{{@{name}, \"{name}\", !{{{}}}, i32 {}, i32 {}, !{{{}}}, !{{{}}}}}",
            kinds.join(", "),
            self.slm_size,
            self.arg_offsets,
            io.join(", "),
            descs.join(", "),
            name = self.name,
        )
    }
}

/// Build `genx.kernels` for every explicit-SIMD kernel and retarget the
/// module. Returns `false` without touching the module when the table
/// already exists.
pub fn generate_kernel_metadata(module: &mut Module) -> bool {
    if module.genx_kernels.is_some() {
        return false;
    }
    module.set_arch(GENX_ARCH);

    let simd_kernels: Vec<FuncId> = module
        .functions()
        .filter(|(_, f)| f.is_kernel() && f.metadata.explicit_simd)
        .map(|(id, _)| id)
        .collect();

    let mut entries = Vec::with_capacity(simd_kernels.len());
    for id in simd_kernels {
        let entry = describe_kernel(id, module.function(id));
        debug!(kernel = %entry.name, args = entry.arg_kinds.len(), "kernel metadata");
        entries.push(entry);

        let function = module.function_mut(id);
        function.add_attr("oclrt", Some("1"));
        function.add_attr("CMGenxMain", None);
    }
    module.genx_kernels = Some(entries);
    true
}

fn describe_kernel(id: FuncId, function: &Function) -> KernelMetadata {
    let mut arg_kinds = Vec::with_capacity(function.params.len());
    let mut arg_descs = Vec::with_capacity(function.params.len());

    for (index, param) in function.params.iter().enumerate() {
        let arg_type = function
            .metadata
            .arg_types
            .get(index)
            .map_or("", String::as_str);
        let (kind, desc) = if IMAGE_TYPES.iter().any(|image| arg_type.contains(image)) {
            (ArgKind::Surface, arg_type)
        } else if param.is_pointer() {
            let is_accessor = function
                .metadata
                .accessor_ptrs
                .get(index)
                .copied()
                .unwrap_or(false);
            if is_accessor {
                (ArgKind::Surface, "buffer_t")
            } else {
                (ArgKind::General, "svmptr_t")
            }
        } else {
            (ArgKind::General, "")
        };
        arg_kinds.push(kind);
        arg_descs.push(desc.to_string());
    }

    KernelMetadata {
        function: id,
        name: function.name.clone(),
        io_kinds: vec![IoKind::Normal; arg_kinds.len()],
        arg_kinds,
        slm_size: 0,
        arg_offsets: 0,
        arg_descs,
    }
}

/// Vector types held by `genx_volatile` globals.
pub fn collect_volatile_types(module: &Module) -> FxHashSet<Ty> {
    let mut types = FxHashSet::default();
    for global in module.globals().filter(|g| g.genx_volatile) {
        let GlobalTy::Struct { name, fields } = &global.ty else {
            continue;
        };
        if !name.ends_with(SIMD_STRUCT_SUFFIX) {
            continue;
        }
        match fields.as_slice() {
            [ty] if ty.is_vector() => {
                types.insert(*ty);
            }
            _ => debug!(global = %global.name, "volatile global is not a single-vector wrapper"),
        }
    }
    types
}

/// Index of the `genx.kernels` entry `func` runs under: its own entry, or
/// the first one reached walking up through callers.
pub fn enclosing_kernel(module: &Module, func: FuncId) -> Option<usize> {
    let kernels = module.genx_kernels.as_ref()?;
    let mut visited = FxHashSet::default();
    let mut stack = vec![func];
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        if let Some(index) = kernels.iter().position(|k| k.function == current) {
            return Some(index);
        }
        stack.extend(module.callers_of(current).into_iter().rev());
    }
    None
}
