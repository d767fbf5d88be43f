#![deny(unsafe_code)]

use mimalloc::MiMalloc;

/// High-performance memory allocator for improved allocation throughput.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::env;
use std::process::ExitCode;

fn main() -> ExitCode {
    cli::exit_code_from(cli::run(env::args_os()))
}
