use anyhow::{Context, Result};
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use std::{ops::Deref, panic, time::Duration};
use toshiba_ac_lib::engine::{ControlRequest, StateObserver};
use toshiba_ac_lib::serialport::ToshibaAc;

mod commandline;
mod daemon;
mod engine_config;
mod mqtt;

use commandline::{CliArgs, CliCommands};

/// Time to collect the replies of a full sweep.
const SWEEP_WAIT: Duration = Duration::from_secs(60);

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown>", 0, 0));
        let cause = panic_info
            .payload()
            .downcast_ref::<String>()
            .map(String::deref);
        let cause = cause.unwrap_or_else(|| {
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .unwrap_or("<cause unknown>")
        });

        error!(
            "Thread '{}' panicked at {}:{}:{}: {}",
            std::thread::current().name().unwrap_or("<unknown>"),
            filename,
            line,
            column,
            cause
        );
    }));
    log_handle
}

fn open<O: StateObserver>(args: &CliArgs, observer: O) -> Result<ToshibaAc<O>> {
    let config = engine_config::load(args.config.as_deref())?;
    debug!("Unit config: {config:?}");
    ToshibaAc::new(&args.device, args.timeout, config, observer)
        .with_context(|| format!("Cannot open serial port '{}'", args.device))
}

fn connect<O: StateObserver>(args: &CliArgs, observer: O) -> Result<ToshibaAc<O>> {
    let mut ac = open(args, observer)?;
    if !ac.connect(args.wait).with_context(|| "Handshake failed")? {
        warn!("Unit did not answer all initial requests within {:?}", args.wait);
    }
    Ok(ac)
}

fn finish<O: StateObserver>(ac: &mut ToshibaAc<O>, wait: Duration) -> Result<()> {
    if !ac.wait_idle(wait).with_context(|| "Cannot send commands")? {
        warn!("Not all commands were sent within {wait:?}");
    }
    println!("State: {:?}", ac.state());
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());

    match args.command.clone() {
        CliCommands::Status => {
            let ac = connect(&args, ())?;
            println!("State: {:?}", ac.state());
        }
        CliCommands::Set {
            mode,
            temperature,
            fan,
            swing,
        } => {
            let request = ControlRequest {
                mode,
                target_temperature: temperature,
                fan,
                swing,
            };
            if request.is_empty() {
                anyhow::bail!(
                    "Nothing to set, pass at least one of --mode, --temperature, --fan or --swing"
                );
            }
            let mut ac = connect(&args, ())?;
            ac.apply_control(request)
                .with_context(|| "Cannot apply settings")?;
            finish(&mut ac, args.wait)?;
        }
        CliCommands::PowerLevel { level } => {
            let mut ac = connect(&args, ())?;
            ac.set_power_level(level)
                .with_context(|| "Cannot set power level")?;
            finish(&mut ac, args.wait)?;
        }
        CliCommands::SpecialMode { mode } => {
            let mut ac = connect(&args, ())?;
            ac.set_special_mode(mode)
                .with_context(|| "Cannot set special mode")?;
            finish(&mut ac, args.wait)?;
        }
        CliCommands::ComfortSleep { enable } => {
            let mut ac = connect(&args, ())?;
            ac.set_comfort_sleep(enable)
                .with_context(|| "Cannot set comfort sleep")?;
            finish(&mut ac, args.wait)?;
        }
        CliCommands::Sweep => {
            let mut ac = connect(&args, ())?;
            ac.sweep().with_context(|| "Cannot start sweep")?;
            finish(&mut ac, SWEEP_WAIT)?;
        }
        CliCommands::Daemon { output, interval } => {
            let (observer, updates) = daemon::ChannelObserver::new();
            let ac = open(&args, observer)?;
            daemon::run(ac, updates, output, interval)?;
        }
    }

    Ok(())
}
