//! The `lower-name` command: show the target intrinsic a call lowers to.

use esx_lower::lower_name;

pub fn print_lower_name(symbol: &str) {
    match lower_name(symbol) {
        Ok(Some(target)) => println!("{target}"),
        Ok(None) => {
            eprintln!("`{symbol}` has no lowering rule; calls to it are left in place");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
