mod browser;
mod cli;
mod config;
mod core;
mod models;
mod sources;

use clap::Parser;
use log::LevelFilter;

fn main() {
    let cli = cli::Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut clog = colog::default_builder();
    clog.filter(None, LevelFilter::Warn);
    clog.filter(Some(env!("CARGO_CRATE_NAME")), level);
    clog.init();

    if let Err(e) = cli::run(cli) {
        eprintln!("오류: {:#}", e);
        std::process::exit(1);
    }
}
