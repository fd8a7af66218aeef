//! Embedded error documentation for `explain` support.
//!
//! Each error code has a markdown file in this directory, embedded at compile
//! time and looked up through [`ErrorDocs::get`].

use crate::ErrorCode;

/// Registry of embedded error documentation.
pub struct ErrorDocs;

impl ErrorDocs {
    /// Markdown documentation for `code`, if any.
    pub fn get(code: ErrorCode) -> Option<&'static str> {
        DOCS.iter().find(|(c, _)| *c == code).map(|(_, doc)| *doc)
    }

    /// Every documented error code.
    pub fn all_codes() -> impl Iterator<Item = ErrorCode> {
        DOCS.iter().map(|(code, _)| *code)
    }

    pub fn has_docs(code: ErrorCode) -> bool {
        DOCS.iter().any(|(c, _)| *c == code)
    }
}

static DOCS: &[(ErrorCode, &str)] = &[
    // Kernel parameter errors (E1xxx)
    (ErrorCode::E1001, include_str!("E1001.md")),
    (ErrorCode::E1002, include_str!("E1002.md")),
    (ErrorCode::E1003, include_str!("E1003.md")),
    (ErrorCode::E1004, include_str!("E1004.md")),
    (ErrorCode::E1005, include_str!("E1005.md")),
    (ErrorCode::E1006, include_str!("E1006.md")),
    (ErrorCode::E1007, include_str!("E1007.md")),
    (ErrorCode::E1008, include_str!("E1008.md")),
    (ErrorCode::E1009, include_str!("E1009.md")),
    (ErrorCode::E1010, include_str!("E1010.md")),
    (ErrorCode::E1011, include_str!("E1011.md")),
    (ErrorCode::E1012, include_str!("E1012.md")),
    // Union errors (E2xxx)
    (ErrorCode::E2001, include_str!("E2001.md")),
    // Attribute errors (E3xxx)
    (ErrorCode::E3001, include_str!("E3001.md")),
    (ErrorCode::E3002, include_str!("E3002.md")),
    (ErrorCode::E3003, include_str!("E3003.md")),
    (ErrorCode::E3004, include_str!("E3004.md")),
    // Internal errors (E9xxx)
    (ErrorCode::E9001, include_str!("E9001.md")),
    (ErrorCode::E9002, include_str!("E9002.md")),
    // Warnings (W1xxx)
    (ErrorCode::W1001, include_str!("W1001.md")),
    (ErrorCode::W1002, include_str!("W1002.md")),
    (ErrorCode::W1003, include_str!("W1003.md")),
];

#[cfg(test)]
mod tests;
