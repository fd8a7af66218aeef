//! Fatal lowering errors.

use thiserror::Error;

use crate::demangle::DemangleError;
use crate::ir::Ty;

/// An internal invariant of the input module does not hold.
///
/// Lowering stops at the first such error; the driver reports it and aborts.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum LowerError {
    #[error("failed to demangle `{symbol}`")]
    Demangle {
        symbol: String,
        #[source]
        source: DemangleError,
    },

    #[error("`{symbol}` is not a function encoding")]
    NotFunctionEncoding { symbol: String },

    #[error("`{0}` is not an explicit-SIMD intrinsic")]
    NotAnIntrinsic(String),

    #[error("`{0}` has no template arguments")]
    MissingTemplateArgs(String),

    #[error("template argument {index} out of range for `{intrinsic}`")]
    TemplateArgOutOfRange { intrinsic: String, index: u32 },

    #[error("unsupported template argument `{0}`")]
    UnsupportedTemplateArg(String),

    #[error("unknown primitive type `{0}` in template argument")]
    UnknownPrimitiveType(String),

    #[error("invalid integer literal `{0}`")]
    InvalidIntegerLiteral(String),

    #[error("unknown atomic opcode {0:#x}")]
    UnknownBinOp(i64),

    #[error("no target intrinsic `llvm.genx.{0}`")]
    UnknownTarget(String),

    #[error("`{intrinsic}` has no operand {index}")]
    MissingOperand { intrinsic: String, index: i32 },

    #[error("operand {index} of `{intrinsic}` has unexpected type {ty}")]
    InvalidOperand {
        intrinsic: String,
        index: i32,
        ty: Ty,
    },

    #[error("element width {0} is not 8, 16, or 32 bits")]
    NumBytesWidth(u32),

    #[error("no single cast converts {from} to {to}")]
    NoCast { from: Ty, to: Ty },

    #[error("slm_init size must be a constant integer")]
    SlmSizeNotConstant,

    #[error("slm_init size must be non-zero")]
    ZeroSlmSize,

    #[error("slm_init in `{0}` is not reachable from any explicit-SIMD kernel")]
    SlmInitOutsideKernel(String),

    #[error("bad work-item coordinate in `{0}`")]
    BadCoordinate(String),
}
