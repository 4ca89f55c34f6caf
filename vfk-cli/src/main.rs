//! Entry point for the `vfk` command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = vfk_cli::run() {
        eprintln!("vfk: {err}");
        std::process::exit(1);
    }
}
