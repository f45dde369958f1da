//! `hessian2-unpack` — decode Hessian 2 (stdin) to JSON (stdout).
//!
//! Usage:
//!   hessian2-unpack [--max-depth N] < value.bin
//!
//! Every value in the input is printed, one JSON document per value.

use hessian2::cli::{init_logging, unpack, unpack_options, CliError};
use std::io::{self, Read, Write};

fn run() -> Result<(), CliError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = unpack_options(&args)?;
    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf)?;
    let json = unpack(&buf, options)?;
    io::stdout().write_all(json.as_bytes())?;
    Ok(())
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
