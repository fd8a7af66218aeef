//! Integration header: the host-side description of every kernel.
//!
//! The runtime needs, for each kernel, its name and how to rebuild its
//! arguments from the host-side kernel object. [`IntegrationHeader`]
//! collects one [`KernelDesc`] per synthesized kernel and renders either the
//! C++ header text (`Display`) or a compact binary table ([`encode`]).
//!
//! [`encode`]: IntegrationHeader::encode

use std::fmt;

use crate::handlers::SpecConstantId;

/// What a kernel argument is, as the runtime sees it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ParamKind {
    Accessor = 0,
    StdLayout = 1,
    Sampler = 2,
    Pointer = 3,
}

impl ParamKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ParamKind::Accessor => "kind_accessor",
            ParamKind::StdLayout => "kind_std_layout",
            ParamKind::Sampler => "kind_sampler",
            ParamKind::Pointer => "kind_pointer",
        }
    }
}

/// One kernel argument descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParamDesc {
    pub kind: ParamKind,
    /// Accessor: target code | dims << 11. Otherwise the size in bytes.
    pub info: u32,
    /// Offset of the source member within the kernel object.
    pub offset: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelDesc {
    /// Name the kernel entry is emitted under.
    pub name: String,
    /// Spelling of the kernel name type.
    pub type_name: String,
    pub stable_name: String,
    pub params: Vec<ParamDesc>,
    pub esimd: bool,
    pub calls_this_item: bool,
}

/// Position of one kernel's descriptors in the flat table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub start: u32,
    pub count: u32,
}

#[derive(Clone, Debug, Default)]
pub struct IntegrationHeader {
    kernels: Vec<KernelDesc>,
    spec_constants: Vec<SpecConstantId>,
    unnamed_lambda: bool,
}

impl IntegrationHeader {
    pub fn new(unnamed_lambda: bool) -> Self {
        IntegrationHeader {
            unnamed_lambda,
            ..Self::default()
        }
    }

    pub fn start_kernel(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        stable_name: impl Into<String>,
        esimd: bool,
    ) -> &mut KernelDesc {
        self.kernels.push(KernelDesc {
            name: name.into(),
            type_name: type_name.into(),
            stable_name: stable_name.into(),
            params: Vec::new(),
            esimd,
            calls_this_item: false,
        });
        let last = self.kernels.len() - 1;
        &mut self.kernels[last]
    }

    pub fn add_spec_constants(&mut self, ids: impl IntoIterator<Item = SpecConstantId>) {
        self.spec_constants.extend(ids);
    }

    pub fn kernels(&self) -> &[KernelDesc] {
        &self.kernels
    }

    pub fn kernel(&self, name: &str) -> Option<&KernelDesc> {
        self.kernels.iter().find(|k| k.name == name)
    }

    /// Spec constants ordered by ID, one per type.
    pub fn spec_constants(&self) -> Vec<&SpecConstantId> {
        let mut sorted: Vec<_> = self.spec_constants.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.type_name.cmp(&b.type_name)));
        sorted.dedup_by(|a, b| a.type_name == b.type_name);
        sorted
    }

    /// `(name, start, count)` for each kernel, in kernel order.
    pub fn index(&self) -> Vec<IndexEntry> {
        let mut start = 0u32;
        self.kernels
            .iter()
            .map(|k| {
                let count = u32::try_from(k.params.len()).unwrap_or(u32::MAX);
                let entry = IndexEntry {
                    name: k.name.clone(),
                    start,
                    count,
                };
                start = start.saturating_add(count);
                entry
            })
            .collect()
    }

    /// All descriptors as consecutive little-endian `u32` triples.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.kernels.iter().map(|k| k.params.len() * 12).sum());
        for param in self.kernels.iter().flat_map(|k| &k.params) {
            out.extend_from_slice(&(param.kind as u32).to_le_bytes());
            out.extend_from_slice(&param.info.to_le_bytes());
            out.extend_from_slice(&param.offset.to_le_bytes());
        }
        out
    }

    fn write_kernel_info(&self, f: &mut fmt::Formatter<'_>, kernel: &KernelDesc) -> fmt::Result {
        if self.unnamed_lambda {
            let chars: Vec<String> = kernel.stable_name.chars().map(|c| format!("'{c}'")).collect();
            writeln!(f, "template <> struct KernelInfoData<{}> {{", chars.join(", "))
        } else {
            writeln!(f, "template <> struct KernelInfo<{}> {{", kernel.type_name)
        }
    }
}

impl fmt::Display for IntegrationHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// This is auto-generated SYCL integration header.")?;
        writeln!(f)?;
        writeln!(f, "#include <CL/sycl/detail/defines_elementary.hpp>")?;
        writeln!(f, "#include <CL/sycl/detail/kernel_desc.hpp>")?;
        writeln!(f)?;

        let spec_constants = self.spec_constants();
        if !spec_constants.is_empty() {
            writeln!(f, "// Specialization constants IDs:")?;
            for sc in spec_constants {
                writeln!(
                    f,
                    "template <> struct sycl::detail::SpecConstantInfo<{}> {{",
                    sc.type_name
                )?;
                writeln!(f, "  static constexpr const char* getName() {{")?;
                writeln!(f, "    return \"{}\";", sc.id)?;
                writeln!(f, "  }}")?;
                writeln!(f, "}};")?;
            }
        }
        writeln!(f)?;

        writeln!(f, "__SYCL_INLINE_NAMESPACE(cl) {{")?;
        writeln!(f, "namespace sycl {{")?;
        writeln!(f, "namespace detail {{")?;
        writeln!(f)?;

        writeln!(f, "// names of all kernels defined in the corresponding source")?;
        writeln!(f, "static constexpr")?;
        writeln!(f, "const char* const kernel_names[] = {{")?;
        let names: Vec<String> = self
            .kernels
            .iter()
            .map(|k| format!("  \"{}\"", k.name))
            .collect();
        if !names.is_empty() {
            writeln!(f, "{}", names.join(",\n"))?;
        }
        writeln!(f, "}};")?;
        writeln!(f)?;

        writeln!(f, "// array representing signatures of all kernels defined in the")?;
        writeln!(f, "// corresponding source")?;
        writeln!(f, "static constexpr")?;
        writeln!(f, "const kernel_param_desc_t kernel_signatures[] = {{")?;
        for kernel in &self.kernels {
            writeln!(f, "  //--- {}", kernel.name)?;
            for p in &kernel.params {
                writeln!(
                    f,
                    "  {{ kernel_param_kind_t::{}, {}, {} }},",
                    p.kind.as_str(),
                    p.info,
                    p.offset
                )?;
            }
            writeln!(f)?;
        }
        writeln!(f, "}};")?;
        writeln!(f)?;

        writeln!(f, "// Specializations of KernelInfo for kernel function types:")?;
        for (kernel, entry) in self.kernels.iter().zip(self.index()) {
            self.write_kernel_info(f, kernel)?;
            writeln!(f, "  __SYCL_DLL_LOCAL")?;
            writeln!(
                f,
                "  static constexpr const char* getName() {{ return \"{}\"; }}",
                kernel.name
            )?;
            writeln!(f, "  __SYCL_DLL_LOCAL")?;
            writeln!(
                f,
                "  static constexpr unsigned getNumParams() {{ return {}; }}",
                entry.count
            )?;
            writeln!(f, "  __SYCL_DLL_LOCAL")?;
            writeln!(
                f,
                "  static constexpr const kernel_param_desc_t& getParamDesc(unsigned i) {{"
            )?;
            writeln!(f, "    return kernel_signatures[i+{}];", entry.start)?;
            writeln!(f, "  }}")?;
            writeln!(f, "  __SYCL_DLL_LOCAL")?;
            writeln!(
                f,
                "  static constexpr bool isESIMD() {{ return {}; }}",
                u8::from(kernel.esimd)
            )?;
            writeln!(f, "  __SYCL_DLL_LOCAL")?;
            writeln!(
                f,
                "  static constexpr bool callsThisItem() {{ return {}; }}",
                u8::from(kernel.calls_this_item)
            )?;
            writeln!(f, "}};")?;
        }
        writeln!(f)?;
        writeln!(f, "}} // namespace detail")?;
        writeln!(f, "}} // namespace sycl")?;
        writeln!(f, "}} // __SYCL_INLINE_NAMESPACE(cl)")?;
        writeln!(f)
    }
}
