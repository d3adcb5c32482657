use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use serde_json::json;
use std::sync::mpsc;
use std::time::Duration;
use toshiba_ac_lib::engine::{ControlRequest, StateObserver};
use toshiba_ac_lib::serialport::ToshibaAc;
use toshiba_ac_lib::state::{ClimateState, PowerLevel, SpecialMode};

use crate::{commandline, mqtt};

/// Everything the engine reports, forwarded out of the observer callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    State(ClimateState),
    OutdoorTemperature(i8),
    PowerLevel(PowerLevel),
    SpecialMode(SpecialMode),
}

impl Update {
    fn name(&self) -> &'static str {
        match self {
            Update::State(_) => "state",
            Update::OutdoorTemperature(_) => "outdoor_temperature",
            Update::PowerLevel(_) => "power_level",
            Update::SpecialMode(_) => "special_mode",
        }
    }

    fn to_json_value(&self) -> Result<serde_json::Value> {
        match self {
            Update::State(s) => serde_json::to_value(s).map_err(Into::into),
            Update::OutdoorTemperature(t) => Ok(json!(t)),
            Update::PowerLevel(l) => serde_json::to_value(l).map_err(Into::into),
            Update::SpecialMode(m) => serde_json::to_value(m).map_err(Into::into),
        }
    }
}

pub struct ChannelObserver {
    sender: mpsc::Sender<Update>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::Receiver<Update>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }

    fn forward(&self, update: Update) {
        if let Err(e) = self.sender.send(update) {
            error!("Failed to forward '{}': daemon loop stopped", e.0.name());
        }
    }
}

impl StateObserver for ChannelObserver {
    fn on_state(&mut self, state: &ClimateState) {
        self.forward(Update::State(state.clone()));
    }

    fn on_outdoor_temperature(&mut self, celsius: i8) {
        self.forward(Update::OutdoorTemperature(celsius));
    }

    fn on_power_level(&mut self, level: PowerLevel) {
        self.forward(Update::PowerLevel(level));
    }

    fn on_special_mode(&mut self, mode: SpecialMode) {
        self.forward(Update::SpecialMode(mode));
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Control {
    Climate(ControlRequest),
    PowerLevel(PowerLevel),
    SpecialMode(SpecialMode),
    ComfortSleep(bool),
}

fn parse_switch(payload: &str) -> Result<bool> {
    match payload.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => bail!("Expected on or off, got '{other}'"),
    }
}

/// Translates a message on `<topic>/set/<attribute>` into an engine call.
fn parse_control(attribute: &str, payload: &str) -> Result<Control> {
    let payload = payload.trim();
    let control = match attribute {
        "mode" => Control::Climate(ControlRequest {
            mode: Some(payload.parse()?),
            ..Default::default()
        }),
        "temperature" => Control::Climate(ControlRequest {
            target_temperature: Some(
                payload
                    .parse()
                    .with_context(|| format!("Invalid temperature '{payload}'"))?,
            ),
            ..Default::default()
        }),
        "fan" => Control::Climate(ControlRequest {
            fan: Some(payload.parse()?),
            ..Default::default()
        }),
        "swing" => Control::Climate(ControlRequest {
            swing: Some(payload.parse()?),
            ..Default::default()
        }),
        "power_level" => Control::PowerLevel(payload.parse()?),
        "special_mode" => Control::SpecialMode(payload.parse()?),
        "comfort_sleep" => Control::ComfortSleep(parse_switch(payload)?),
        other => bail!("Unknown attribute '{other}'"),
    };
    Ok(control)
}

fn apply_control(ac: &mut ToshibaAc<ChannelObserver>, control: Control) -> Result<()> {
    let result = match control {
        Control::Climate(request) => ac.apply_control(request),
        Control::PowerLevel(level) => ac.set_power_level(level),
        Control::SpecialMode(mode) => ac.set_special_mode(mode),
        Control::ComfortSleep(enabled) => ac.set_comfort_sleep(enabled),
    };
    result.with_context(|| "Cannot send command to the air conditioner")
}

fn publish_simple_format(
    publisher: &mqtt::MqttPublisher,
    base_topic: &str,
    name: &str,
    value: &serde_json::Value,
) {
    fn publish_recursive(publisher: &mqtt::MqttPublisher, topic: &str, val: &serde_json::Value) {
        let payload = match val {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    publish_recursive(publisher, &format!("{topic}/{k}"), v);
                }
                return;
            }
            serde_json::Value::Array(arr) => {
                for (i, v) in arr.iter().enumerate() {
                    publish_recursive(publisher, &format!("{topic}/{i}"), v);
                }
                return;
            }
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            // Attributes not reported yet
            serde_json::Value::Null => return,
        };
        if let Err(e) = publisher.publish(topic, &payload) {
            error!("Failed to publish message to topic {topic}: {e}");
        }
    }
    publish_recursive(publisher, &format!("{base_topic}/{name}"), value);
}

fn emit(
    output: &commandline::DaemonOutput,
    publisher: Option<&mqtt::MqttPublisher>,
    update: &Update,
) {
    match output {
        commandline::DaemonOutput::Console => {
            println!(
                "{} {}: {:?}",
                chrono::Local::now().to_rfc3339(),
                update.name(),
                update
            );
        }
        commandline::DaemonOutput::Mqtt { format, .. } => {
            let Some(publisher) = publisher else {
                warn!("MQTT output selected, but publisher is not initialized. Skipping publish.");
                return;
            };
            let value = match update.to_json_value() {
                Ok(value) => value,
                Err(e) => {
                    error!("Failed to serialize '{}': {e}", update.name());
                    return;
                }
            };
            match format {
                commandline::MqttFormat::Json => {
                    let mut data_to_publish = serde_json::Map::new();
                    data_to_publish.insert(
                        "timestamp".to_string(),
                        json!(chrono::Utc::now().to_rfc3339()),
                    );
                    data_to_publish.insert(update.name().to_string(), value);
                    let payload = serde_json::Value::Object(data_to_publish).to_string();
                    let topic = format!("{}/{}", publisher.topic(), update.name());
                    if let Err(e) = publisher.publish(&topic, &payload) {
                        error!("Failed to publish data to MQTT: {e:?}");
                    }
                }
                commandline::MqttFormat::Simple => {
                    publish_simple_format(publisher, publisher.topic(), update.name(), &value);
                }
            }
        }
    }
}

pub fn run(
    mut ac: ToshibaAc<ChannelObserver>,
    updates: mpsc::Receiver<Update>,
    output: commandline::DaemonOutput,
    interval: Duration,
) -> Result<()> {
    info!("Starting daemon mode: output={output:?}, interval={interval:?}");

    let mut mqtt_publisher: Option<mqtt::MqttPublisher> = None;
    let mut commands: Option<mpsc::Receiver<mqtt::IncomingCommand>> = None;

    if let commandline::DaemonOutput::Mqtt { config_file, .. } = &output {
        let config = mqtt::MqttConfig::load(config_file)
            .with_context(|| format!("Failed to open MQTT config file at '{config_file}'"))?;
        info!("Successfully loaded MQTT config from {config_file}: {config:?}");
        let (publisher, receiver) =
            mqtt::MqttPublisher::new(config).with_context(|| "Failed to create MQTT publisher")?;
        info!("MQTT Publisher created successfully.");
        mqtt_publisher = Some(publisher);
        commands = Some(receiver);
    }

    ac.set_poll_interval(Some(interval));
    ac.engine_mut()
        .start(std::time::Instant::now())
        .with_context(|| "Cannot start handshake")?;

    let mut last_state: Option<ClimateState> = None;
    loop {
        ac.service()
            .with_context(|| "Cannot communicate with the air conditioner")?;

        if let Some(receiver) = &commands {
            while let Ok(command) = receiver.try_recv() {
                match parse_control(&command.attribute, &command.payload) {
                    Ok(control) => {
                        info!("Applying {control:?}");
                        apply_control(&mut ac, control)?;
                    }
                    Err(e) => warn!("Ignoring command {command:?}: {e}"),
                }
            }
        }

        while let Ok(update) = updates.try_recv() {
            if let Update::State(state) = &update {
                if last_state.as_ref() == Some(state) {
                    continue;
                }
                last_state = Some(state.clone());
            }
            emit(&output, mqtt_publisher.as_ref(), &update);
        }
    }
}
