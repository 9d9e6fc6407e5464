//! Pulverize CLI - multi-process rendering for Blender VSE projects
//!
//! Splits the project's frame range across several Blender processes and joins
//! the rendered chunks with ffmpeg.

use clap::Parser;
use std::process::ExitCode;

use pulverize_cli::{commands, logging};

mod cli_args;

use cli_args::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = commands::render::run(&cli.run_options(), &cli.config());

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
