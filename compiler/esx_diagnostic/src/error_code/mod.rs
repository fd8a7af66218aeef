//! Error codes for all user-facing diagnostics.
//!
//! Each code is a unique identifier (e.g., `E1001`) whose first digit
//! indicates the check that produced it.

use std::fmt;

/// Error codes for all diagnostics.
///
/// Format: E#### where first digit indicates the check:
/// - E1xxx: Kernel parameter legality
/// - E2xxx: Union legality
/// - E3xxx: Kernel attribute conflicts
/// - E9xxx: Internal errors
/// - W1xxx: Warnings
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Kernel Parameter Errors (E1xxx)
    /// Reference captured by a kernel
    E1001,
    /// Kernel parameter is not trivially copyable
    E1002,
    /// Variable-length array in kernel parameter
    E1003,
    /// Zero-length array in kernel parameter
    E1004,
    /// Type not supported on the device
    E1005,
    /// Accessor property list is malformed
    E1006,
    /// Wrong number of template parameters for a property
    E1007,
    /// `buffer_location` argument is not a non-negative integer
    E1008,
    /// Property repeated in one accessor property list
    E1009,
    /// Lambda implicitly captures `this`
    E1010,
    /// Kernel parameter is not standard layout
    E1011,
    /// Unsupported kernel parameter type
    E1012,

    // Union Errors (E2xxx)
    /// Special type inside a union
    E2001,

    // Attribute Errors (E3xxx)
    /// Conflicting values for one attribute
    E3001,
    /// Required work-group size exceeds the maximum
    E3002,
    /// Sub-group size other than 1 on an explicit SIMD kernel
    E3003,
    /// Explicit SIMD function reached from a non-SIMD kernel
    E3004,

    // Internal Errors (E9xxx)
    /// Lowering invariant violated
    E9001,
    /// Too many errors
    E9002,

    // Warnings (W1xxx)
    /// Kernel arguments exceed the size limit
    W1001,
    /// Recursive function reachable from a kernel
    W1002,
    /// Attribute ignored in this position
    W1003,
}

impl ErrorCode {
    /// All error code variants, for exhaustive testing.
    pub const ALL: &[ErrorCode] = &[
        ErrorCode::E1001,
        ErrorCode::E1002,
        ErrorCode::E1003,
        ErrorCode::E1004,
        ErrorCode::E1005,
        ErrorCode::E1006,
        ErrorCode::E1007,
        ErrorCode::E1008,
        ErrorCode::E1009,
        ErrorCode::E1010,
        ErrorCode::E1011,
        ErrorCode::E1012,
        ErrorCode::E2001,
        ErrorCode::E3001,
        ErrorCode::E3002,
        ErrorCode::E3003,
        ErrorCode::E3004,
        ErrorCode::E9001,
        ErrorCode::E9002,
        ErrorCode::W1001,
        ErrorCode::W1002,
        ErrorCode::W1003,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E1003 => "E1003",
            ErrorCode::E1004 => "E1004",
            ErrorCode::E1005 => "E1005",
            ErrorCode::E1006 => "E1006",
            ErrorCode::E1007 => "E1007",
            ErrorCode::E1008 => "E1008",
            ErrorCode::E1009 => "E1009",
            ErrorCode::E1010 => "E1010",
            ErrorCode::E1011 => "E1011",
            ErrorCode::E1012 => "E1012",
            ErrorCode::E2001 => "E2001",
            ErrorCode::E3001 => "E3001",
            ErrorCode::E3002 => "E3002",
            ErrorCode::E3003 => "E3003",
            ErrorCode::E3004 => "E3004",
            ErrorCode::E9001 => "E9001",
            ErrorCode::E9002 => "E9002",
            ErrorCode::W1001 => "W1001",
            ErrorCode::W1002 => "W1002",
            ErrorCode::W1003 => "W1003",
        }
    }

    /// Check if this is a kernel parameter error (E1xxx range).
    pub fn is_kernel_param_error(&self) -> bool {
        self.as_str().starts_with("E1")
    }

    /// Check if this is an attribute conflict (E3xxx range).
    pub fn is_attribute_error(&self) -> bool {
        self.as_str().starts_with("E3")
    }

    /// Check if this is a warning code (Wxxx range).
    pub fn is_warning(&self) -> bool {
        self.as_str().starts_with('W')
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse an error code string like `"E2001"` or `"W1001"`.
///
/// Case-insensitive.
impl std::str::FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        Self::ALL
            .iter()
            .find(|code| code.as_str() == upper)
            .copied()
            .ok_or(())
    }
}
