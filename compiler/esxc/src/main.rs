//! Explicit-SIMD device compiler CLI.

use esxc::commands::{demangle_symbol, explain_error, list_rules, print_lower_name};

fn main() {
    esxc::init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = &args[1];

    match command.as_str() {
        "demangle" => {
            if args.len() < 3 {
                eprintln!("Usage: esxc demangle <symbol>");
                std::process::exit(1);
            }
            demangle_symbol(&args[2]);
        }
        "lower-name" => {
            if args.len() < 3 {
                eprintln!("Usage: esxc lower-name <symbol>");
                eprintln!();
                eprintln!("Example: esxc lower-name _Z17__esimd_flat_readIiLi16EEDv16_iDv16_yiDv16_t");
                std::process::exit(1);
            }
            print_lower_name(&args[2]);
        }
        "rules" => {
            let mut filter = None;
            for arg in args.iter().skip(2) {
                if let Some(pattern) = arg.strip_prefix("--filter=") {
                    filter = Some(pattern);
                } else if !arg.starts_with('-') && filter.is_none() {
                    filter = Some(arg.as_str());
                }
            }
            list_rules(filter);
        }
        "explain" | "--explain" => {
            if args.len() < 3 {
                eprintln!("Usage: esxc explain <code>");
                eprintln!("Example: esxc explain E1001");
                std::process::exit(1);
            }
            explain_error(&args[2]);
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        "version" | "--version" | "-V" => {
            println!("esxc {}", env!("CARGO_PKG_VERSION"));
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Explicit-SIMD device compiler");
    println!();
    println!("Usage: esxc <command> [options]");
    println!();
    println!("Commands:");
    println!("  demangle <symbol>    Demangle an Itanium symbol name");
    println!("  lower-name <symbol>  Show the target intrinsic a call lowers to");
    println!("  rules [pattern]      List intrinsic rewrite rules");
    println!("  explain <code>       Explain an error code (e.g., E1001)");
    println!("  help                 Show this help message");
    println!("  version              Show version information");
    println!();
    println!("Rules options:");
    println!("  --filter=<pattern>   Only list rules whose source name contains pattern");
    println!();
    println!("Environment:");
    println!("  RUST_LOG             Enable tracing, e.g. RUST_LOG=esx_lower=debug");
}
