use clap::Parser;

use mftrawcopy::cli::Cli;
use mftrawcopy::commands;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = commands::dump::run(&cli) {
        eprintln!("[!] {e}");
        std::process::exit(e.exit_code());
    }
}
