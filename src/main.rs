use clap::Parser;
use tdxformula::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
