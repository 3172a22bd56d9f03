//! # Kabinet CLI
//!
//! The binary is intentionally thin: argument parsing, dispatch and
//! rendering live in [`cli`], while this file only invokes `cli::run()` and
//! handles process termination. Everything below the CLI layer is the
//! `kabinetapp` library, which never assumes terminal I/O.

mod cli;

fn main() {
    if let Err(err) = cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
