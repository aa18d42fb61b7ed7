use clap::Parser;
use env_logger::Builder;
use log::error;
use log::LevelFilter;
use macromol_rs::application::{run, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if std::env::var("RUST_LOG").is_ok() {
        env_logger::init();
    } else {
        let mut verbosity_level = LevelFilter::Info;
        if cli.verbose {
            verbosity_level = LevelFilter::Debug
        };
        if cli.trace {
            verbosity_level = LevelFilter::Trace
        };

        let mut builder = Builder::new();
        builder
            .filter_module("macromol_rs", verbosity_level)
            .filter_module("macromol_cli", verbosity_level)
            .format_target(false)
            .init();
    }

    let Err(error) = run(cli) else {
        return ExitCode::SUCCESS;
    };
    error!("{error}");
    ExitCode::FAILURE
}
