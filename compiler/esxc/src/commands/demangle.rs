//! The `demangle` command: render an Itanium-mangled symbol.

use esx_lower::demangle::{parse, DemangleError};

/// Human-readable form of `symbol`.
pub fn demangle(symbol: &str) -> Result<String, DemangleError> {
    let ast = parse(symbol)?;
    Ok(ast.render(ast.root()))
}

pub fn demangle_symbol(symbol: &str) {
    match demangle(symbol) {
        Ok(demangled) => println!("{demangled}"),
        Err(err) => {
            eprintln!("error: cannot demangle `{symbol}`: {err}");
            std::process::exit(1);
        }
    }
}
