use crate::mqtt;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::time::Duration;
use toshiba_ac_lib::engine::FanSetting;
use toshiba_ac_lib::state::{ClimateMode, PowerLevel, SpecialMode, SwingMode};

fn default_device_name() -> String {
    if cfg!(target_os = "windows") {
        String::from("COM1")
    } else {
        String::from("/dev/ttyUSB0")
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Show power, mode, temperatures, fan, swing and special mode
    Status,
    /// Change mode, target temperature, fan and swing in one go
    Set {
        /// Climate mode: off, auto, cool, heat, dry or fan_only
        #[clap(long, short)]
        mode: Option<ClimateMode>,
        /// Target temperature in °C, below 17 switches to the "8 degrees" special mode
        #[clap(long, short)]
        temperature: Option<u8>,
        /// Fan: auto, quiet, low, medium, high or "Level 1" to "Level 5"
        #[clap(long, short)]
        fan: Option<FanSetting>,
        /// Swing: off, vertical, horizontal or both
        #[clap(long, short)]
        swing: Option<SwingMode>,
    },
    /// Limit the compressor power
    PowerLevel {
        /// "50 %", "75 %" or "100 %"
        level: PowerLevel,
    },
    /// Select a special mode like "Hi POWER", "ECO" or "8 degrees"
    SpecialMode {
        /// Must be listed in the special_modes of the unit configuration
        mode: SpecialMode,
    },
    /// Enable or disable the comfort sleep function
    ComfortSleep {
        /// Enable comfort sleep. If this flag is not present, it will be disabled.
        #[clap(long, short, action)]
        enable: bool,
    },
    /// Request every command type from 128 to 254 and log what the unit answers
    Sweep,
    /// Run in daemon mode, reporting state changes and polling the temperatures
    Daemon {
        /// Output destination for state updates
        #[command(subcommand)]
        output: DaemonOutput,
        /// Interval for polling room and outdoor temperature (e.g., "30s", "1m")
        #[clap(long, short, value_parser = humantime::parse_duration, default_value = "60s")]
        interval: Duration,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, PartialEq)]
pub enum MqttFormat {
    Simple,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum DaemonOutput {
    /// Print state updates to the standard output (console).
    Console,
    /// Publish state updates to an MQTT broker and accept commands on <topic>/set/<attribute>.
    Mqtt {
        /// The configuration file for the MQTT broker
        #[arg(long, default_value_t = mqtt::MqttConfig::DEFAULT_CONFIG_FILE.to_string())]
        config_file: String,
        /// Output format for MQTT messages
        #[arg(long, value_enum, default_value_t = MqttFormat::Simple)]
        format: MqttFormat,
    },
}

const fn about_text() -> &'static str {
    "toshiba air conditioner command line tool"
}

#[derive(Parser, Debug)]
#[command(version, about=about_text(), long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Serial port device path (e.g., /dev/ttyUSB0 on Linux, COM1 on Windows)
    #[arg(short, long, default_value_t = default_device_name())]
    pub device: String,

    #[command(subcommand)]
    pub command: CliCommands,

    /// Read timeout of the serial port (e.g., "10ms", "50ms")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "10ms")]
    pub timeout: Duration,

    /// Maximum time to wait for the handshake and queued commands (e.g., "10s", "1m")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "10s")]
    pub wait: Duration,

    /// YAML file describing the optional capabilities of the unit
    #[arg(short, long)]
    pub config: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use toshiba_ac_lib::state::FanMode;

    #[test]
    fn set_command() {
        let args = CliArgs::try_parse_from([
            "toshiba-ac",
            "set",
            "--mode",
            "heat",
            "--temperature",
            "21",
            "--fan",
            "Level 3",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            CliCommands::Set {
                mode: Some(ClimateMode::Heat),
                temperature: Some(21),
                fan: Some(FanSetting::Custom("Level 3".into())),
                swing: None,
            }
        );
        assert_eq!(args.timeout, Duration::from_millis(10));
    }

    #[test]
    fn standard_fan_and_power_level() {
        let args = CliArgs::try_parse_from(["toshiba-ac", "set", "-f", "auto"]).unwrap();
        assert!(matches!(
            args.command,
            CliCommands::Set {
                fan: Some(FanSetting::Standard(FanMode::Auto)),
                ..
            }
        ));
        let args = CliArgs::try_parse_from(["toshiba-ac", "power-level", "75"]).unwrap();
        assert_eq!(
            args.command,
            CliCommands::PowerLevel {
                level: PowerLevel::Percent75
            }
        );
    }

    #[test]
    fn invalid_mode_is_rejected() {
        assert!(CliArgs::try_parse_from(["toshiba-ac", "set", "--mode", "turbo"]).is_err());
        assert!(CliArgs::try_parse_from(["toshiba-ac", "special-mode", "Party"]).is_err());
    }

    #[test]
    fn daemon_defaults() {
        let args = CliArgs::try_parse_from(["toshiba-ac", "daemon", "mqtt"]).unwrap();
        assert_eq!(
            args.command,
            CliCommands::Daemon {
                output: DaemonOutput::Mqtt {
                    config_file: "mqtt.yaml".into(),
                    format: MqttFormat::Simple
                },
                interval: Duration::from_secs(60),
            }
        );
    }
}
