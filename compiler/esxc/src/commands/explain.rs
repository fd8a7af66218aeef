//! The `explain` command: display documentation for an error code.

use esx_diagnostic::{ErrorCode, ErrorDocs};

pub fn explain_error(code_str: &str) {
    let Ok(code) = code_str.parse::<ErrorCode>() else {
        eprintln!("Unknown error code: {code_str}");
        eprintln!();
        eprintln!("Codes have the format EXXXX (errors) or WXXXX (warnings) where X is a digit.");
        eprintln!("Examples: E1001, E3001, W1001");
        std::process::exit(1);
    };

    if let Some(doc) = ErrorDocs::get(code) {
        println!("{doc}");
    } else {
        eprintln!("No documentation available for {code_str}");
        std::process::exit(1);
    }
}
