//! A thin wrapper that loads a configuration file and constructs a `Controller` from it.
//!
//! The real entry point for running a simulation is a Manager implementation embedding this
//! crate; there is no supported user-facing CLI here. This binary exists so the core can be
//! smoke-tested against a real configuration file without a Manager attached.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use netsim_controller::config::ConfigOptions;
use netsim_controller::core::controller::Controller;

#[derive(Parser)]
#[command(about = "Load a simulation configuration and construct its Controller")]
struct Args {
    /// Path to the YAML configuration file.
    config: PathBuf,
}

fn run(args: Args) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.config)?;
    let config = ConfigOptions::from_yaml_str(&text)?;
    let _controller = Controller::new(&config)?;
    log::info!("configuration loaded and controller constructed successfully");
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
