//! `hessian2-pack` — encode JSON (stdin) to Hessian 2 (stdout).
//!
//! Usage:
//!   hessian2-pack < value.json > value.bin

use hessian2::cli::{init_logging, pack, CliError};
use std::io::{self, Read, Write};

fn run() -> Result<(), CliError> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    let bytes = pack(buf.trim())?;
    io::stdout().write_all(&bytes)?;
    Ok(())
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
