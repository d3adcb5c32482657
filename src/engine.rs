use crate::config::EngineConfig;
use crate::protocol::{handshake_sequence, Accumulate, Command, CommandType, Response};
use crate::scheduler::Scheduler;
use crate::state::{
    comfort_sleep_from_wire, comfort_sleep_to_wire, decode_target_temperature,
    encode_target_temperature, ClimateMode, ClimateState, CustomFanLevel, Fan, FanMode,
    PowerLevel, PowerState, SpecialMode, SwingMode, FROST_GUARD_THRESHOLD,
};
use crate::transport::Transport;
use crate::Error;
use std::{fmt, str::FromStr, time::Instant};

/// Command types polled after the handshake, in this order.
///
/// The special mode comes before the target temperature, which is biased under frost guard.
const INITIAL_REQUESTS: [CommandType; 9] = [
    CommandType::PowerState,
    CommandType::Mode,
    CommandType::SpecialMode,
    CommandType::TargetTemperature,
    CommandType::Fan,
    CommandType::PowerLevel,
    CommandType::Swing,
    CommandType::RoomTemperature,
    CommandType::OutdoorTemperature,
];

/// First and last command type probed by [`Engine::sweep`].
pub const SWEEP_RANGE: std::ops::RangeInclusive<u8> = 128..=254;

/// Receives state updates from the [`Engine`].
///
/// `on_state` fires after every successfully decoded response and after every
/// control batch. The other callbacks are dedicated sinks that only fire when the
/// matching capability is enabled in the [`EngineConfig`].
pub trait StateObserver {
    fn on_state(&mut self, _state: &ClimateState) {}

    fn on_outdoor_temperature(&mut self, _celsius: i8) {}

    fn on_power_level(&mut self, _level: PowerLevel) {}

    fn on_special_mode(&mut self, _mode: SpecialMode) {}
}

impl StateObserver for () {}

/// Fan as requested by the user: a standard mode or a custom level name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanSetting {
    Standard(FanMode),
    Custom(String),
}

impl FanSetting {
    pub fn resolve(&self) -> Result<Fan, Error> {
        match self {
            FanSetting::Standard(mode) => Ok(Fan::Standard(*mode)),
            FanSetting::Custom(name) => CustomFanLevel::from_name(name).map(Fan::Custom),
        }
    }
}

impl FromStr for FanSetting {
    type Err = Error;

    /// Standard names win, everything else is kept as a custom level name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match FanMode::from_name(s) {
            Ok(mode) => FanSetting::Standard(mode),
            Err(_) => FanSetting::Custom(s.trim().to_string()),
        })
    }
}

impl fmt::Display for FanSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanSetting::Standard(mode) => fmt::Display::fmt(mode, f),
            FanSetting::Custom(name) => f.write_str(name),
        }
    }
}

/// A batch of user changes, applied in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlRequest {
    pub mode: Option<ClimateMode>,
    pub target_temperature: Option<u8>,
    pub fan: Option<FanSetting>,
    pub swing: Option<SwingMode>,
}

impl ControlRequest {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.target_temperature.is_none()
            && self.fan.is_none()
            && self.swing.is_none()
    }
}

/// Protocol engine for one air conditioner.
///
/// The engine never sleeps. Callers hand in the current time, which keeps the
/// pacing deterministic under test.
pub struct Engine<T, O> {
    transport: T,
    observer: O,
    config: EngineConfig,
    state: ClimateState,
    scheduler: Scheduler,
}

impl<T: Transport, O: StateObserver> Engine<T, O> {
    pub fn new(transport: T, observer: O, config: EngineConfig) -> Self {
        Self {
            transport,
            observer,
            config,
            state: ClimateState::default(),
            scheduler: Scheduler::new(),
        }
    }

    pub fn state(&self) -> &ClimateState {
        &self.state
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Queue drained and no frame in flight.
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }

    /// Queues the handshake followed by the initial state requests.
    pub fn start(&mut self, now: Instant) -> Result<(), Error> {
        log::info!("Starting handshake");
        for command in handshake_sequence() {
            self.enqueue(command, now)?;
        }
        for command_type in INITIAL_REQUESTS {
            let wanted = match command_type {
                CommandType::PowerLevel => self.config.power_level,
                CommandType::OutdoorTemperature => self.config.outdoor_temperature,
                _ => true,
            };
            if wanted {
                self.enqueue(Command::request(command_type), now)?;
            }
        }
        Ok(())
    }

    /// Requests the temperatures that change without user interaction.
    pub fn poll_sensors(&mut self, now: Instant) -> Result<(), Error> {
        self.enqueue(Command::request(CommandType::RoomTemperature), now)?;
        if self.config.outdoor_temperature {
            self.enqueue(Command::request(CommandType::OutdoorTemperature), now)?;
        }
        Ok(())
    }

    /// Requests every command type in [`SWEEP_RANGE`]; replies are logged by the decoder.
    pub fn sweep(&mut self, now: Instant) -> Result<(), Error> {
        log::info!(
            "Requesting command types {} to {}",
            SWEEP_RANGE.start(),
            SWEEP_RANGE.end()
        );
        for command_type in SWEEP_RANGE {
            self.enqueue(Command::request(command_type), now)?;
        }
        Ok(())
    }

    /// Reads everything the transport has buffered, then runs the scheduler.
    pub fn service(&mut self, now: Instant) -> Result<(), Error> {
        while self.transport.bytes_available()? > 0 {
            match self.transport.read_byte()? {
                Some(byte) => self.receive(byte, now)?,
                None => break,
            }
        }
        self.tick(now)
    }

    /// Feeds received bytes without going through the transport.
    pub fn on_bytes(&mut self, bytes: &[u8], now: Instant) -> Result<(), Error> {
        for byte in bytes {
            self.receive(*byte, now)?;
        }
        Ok(())
    }

    pub fn tick(&mut self, now: Instant) -> Result<(), Error> {
        match self.scheduler.tick(now) {
            Some(command) => self.transmit(&command),
            None => Ok(()),
        }
    }

    /// Applies a batch of changes and publishes the resulting state once.
    ///
    /// A target temperature crossing [`FROST_GUARD_THRESHOLD`] switches the special mode
    /// even when `special_modes` is empty, since the wire bias depends on it. Only the
    /// special mode sink stays gated by the configuration.
    pub fn apply_control(&mut self, request: ControlRequest, now: Instant) -> Result<(), Error> {
        if let Some(mode) = request.mode {
            self.control_mode(mode, now)?;
        }
        if let Some(celsius) = request.target_temperature {
            self.control_target_temperature(celsius, now)?;
        }
        if let Some(setting) = request.fan {
            match setting.resolve() {
                Ok(fan) => {
                    log::info!("Setting fan to {fan}");
                    self.enqueue(Command::set(CommandType::Fan, fan.to_wire()), now)?;
                    self.state.fan = Some(fan);
                }
                Err(err) => log::warn!("Dropping fan request: {err}"),
            }
        }
        if let Some(swing) = request.swing {
            if self.config.supports_swing(swing) {
                log::info!("Setting swing to {swing}");
                self.enqueue(Command::set(CommandType::Swing, swing.to_wire()), now)?;
                self.state.swing = Some(swing);
            } else {
                log::warn!("Swing mode {swing} is not supported by this unit");
            }
        }
        self.observer.on_state(&self.state);
        Ok(())
    }

    fn control_mode(&mut self, mode: ClimateMode, now: Instant) -> Result<(), Error> {
        log::info!("Setting mode to {mode}");
        match mode.to_wire() {
            None => {
                self.enqueue(
                    Command::set(CommandType::PowerState, PowerState::Off.to_wire()),
                    now,
                )?;
                self.state.power = PowerState::Off;
            }
            Some(wire) => {
                if self.state.mode == ClimateMode::Off {
                    self.enqueue(
                        Command::set(CommandType::PowerState, PowerState::On.to_wire()),
                        now,
                    )?;
                    self.state.power = PowerState::On;
                }
                self.enqueue(Command::set(CommandType::Mode, wire), now)?;
            }
        }
        self.state.mode = mode;
        Ok(())
    }

    fn control_target_temperature(&mut self, celsius: u8, now: Instant) -> Result<(), Error> {
        if !self.config.supports_temperature(celsius) {
            log::warn!(
                "Target temperature {celsius}°C outside of {}..={}°C",
                self.config.min_temperature,
                self.config.max_temperature
            );
            return Ok(());
        }

        let frost_guard = celsius < FROST_GUARD_THRESHOLD;
        let current = self.state.special_mode;
        let switch_to = if frost_guard && !current.is_frost_guard() {
            Some(SpecialMode::FrostGuard)
        } else if !frost_guard && current.is_frost_guard() {
            Some(SpecialMode::Standard)
        } else {
            None
        };
        if let Some(special_mode) = switch_to {
            log::info!("Switching special mode to {special_mode} for {celsius}°C");
            self.enqueue(
                Command::set(CommandType::SpecialMode, special_mode.to_wire()),
                now,
            )?;
            self.state.special_mode = special_mode;
            if !self.config.special_modes.is_empty() {
                self.observer.on_special_mode(special_mode);
            }
        }

        log::info!("Setting target temperature to {celsius}°C");
        let wire = encode_target_temperature(celsius, self.state.special_mode);
        self.enqueue(Command::set(CommandType::TargetTemperature, wire), now)?;
        self.state.target_temperature = Some(celsius);
        Ok(())
    }

    pub fn set_power_level(&mut self, level: PowerLevel, now: Instant) -> Result<(), Error> {
        log::info!("Setting power level to {level}");
        self.enqueue(Command::set(CommandType::PowerLevel, level.to_wire()), now)?;
        self.state.power_level = Some(level);
        if self.config.power_level {
            self.observer.on_power_level(level);
        }
        self.observer.on_state(&self.state);
        Ok(())
    }

    /// Refused with a warning unless `mode` is one of the configured special modes.
    pub fn set_special_mode(&mut self, mode: SpecialMode, now: Instant) -> Result<(), Error> {
        if !self.config.supports_special_mode(mode) {
            log::warn!("Special mode {mode} is not enabled for this unit");
            return Ok(());
        }
        log::info!("Setting special mode to {mode}");
        self.enqueue(Command::set(CommandType::SpecialMode, mode.to_wire()), now)?;
        self.state.special_mode = mode;
        self.observer.on_special_mode(mode);
        self.observer.on_state(&self.state);
        Ok(())
    }

    pub fn set_comfort_sleep(&mut self, enabled: bool, now: Instant) -> Result<(), Error> {
        log::info!("Setting comfort sleep to {enabled}");
        self.enqueue(
            Command::set(CommandType::ComfortSleep, comfort_sleep_to_wire(enabled)),
            now,
        )?;
        self.state.comfort_sleep = Some(enabled);
        self.observer.on_state(&self.state);
        Ok(())
    }

    fn enqueue(&mut self, command: Command, now: Instant) -> Result<(), Error> {
        match self.scheduler.enqueue(command, now) {
            Some(command) => self.transmit(&command),
            None => Ok(()),
        }
    }

    fn transmit(&mut self, command: &Command) -> Result<(), Error> {
        if command.payload().is_empty() {
            log::trace!("Pause {:?} elapsed", command.kind());
            return Ok(());
        }
        log::trace!("TX {:?}: {:02X?}", command.kind(), command.payload());
        self.transport.write_bytes(command.payload())
    }

    fn receive(&mut self, byte: u8, now: Instant) -> Result<(), Error> {
        match self.scheduler.receive(byte, now) {
            Accumulate::Continue => Ok(()),
            Accumulate::Complete(frame) => self.decode_frame(&frame, now),
            Accumulate::Invalid(err @ Error::Framing(_)) => {
                log::trace!("{err}");
                Ok(())
            }
            Accumulate::Invalid(err) => {
                log::warn!("Dropping frame: {err}");
                Ok(())
            }
        }
    }

    fn decode_frame(&mut self, frame: &[u8], now: Instant) -> Result<(), Error> {
        log::trace!("RX {:02X?}", frame);
        let (command_type, value) = match Response::parse(frame) {
            Ok(Response::Value {
                command_type,
                value,
            }) => (command_type, value),
            Ok(Response::Acknowledge) => return Ok(()),
            Err(err) => {
                log::warn!("Ignoring frame {:02X?}: {err}", frame);
                return Ok(());
            }
        };

        match self.apply_response(command_type, value) {
            Ok(follow_up) => {
                self.observer.on_state(&self.state);
                if let Some(command) = follow_up {
                    self.enqueue(command, now)?;
                }
            }
            Err(err) => log::warn!("Ignoring response {command_type}={value}: {err}"),
        }
        Ok(())
    }

    /// Updates the state from one reported value and returns a command to queue, if any.
    fn apply_response(&mut self, command_type: u8, value: u8) -> Result<Option<Command>, Error> {
        match CommandType::try_from(command_type)? {
            CommandType::PowerState => {
                let power = PowerState::from_wire(value)
                    .ok_or_else(|| Error::unresolvable("power state", value))?;
                log::debug!("Received power state: {power}");
                let previous = self.state.power;
                self.state.power = power;
                if power == PowerState::Off {
                    self.state.mode = ClimateMode::Off;
                } else if previous == PowerState::Off {
                    return Ok(Some(Command::request(CommandType::Mode)));
                }
            }
            CommandType::Mode => {
                let mode = ClimateMode::from_wire(value)
                    .ok_or_else(|| Error::unresolvable("climate mode", value))?;
                log::debug!("Received mode: {mode}");
                if self.state.power == PowerState::On {
                    self.state.mode = mode;
                } else {
                    log::debug!("Unit is off, keeping mode {}", self.state.mode);
                }
            }
            CommandType::TargetTemperature => {
                let celsius = decode_target_temperature(value, self.state.special_mode)
                    .ok_or_else(|| Error::unresolvable("target temperature", value))?;
                log::debug!("Received target temperature: {celsius}°C");
                self.state.target_temperature = Some(celsius);
            }
            CommandType::RoomTemperature => {
                log::debug!("Received room temperature: {value}°C");
                self.state.current_temperature = Some(value);
            }
            CommandType::OutdoorTemperature => {
                let celsius = value as i8;
                log::debug!("Received outdoor temperature: {celsius}°C");
                self.state.outdoor_temperature = Some(celsius);
                if self.config.outdoor_temperature {
                    self.observer.on_outdoor_temperature(celsius);
                }
            }
            CommandType::Fan => {
                let fan =
                    Fan::from_wire(value).ok_or_else(|| Error::unresolvable("fan", value))?;
                log::debug!("Received fan: {fan}");
                self.state.fan = Some(fan);
            }
            CommandType::Swing => {
                let swing = SwingMode::from_wire(value)
                    .ok_or_else(|| Error::unresolvable("swing mode", value))?;
                log::debug!("Received swing: {swing}");
                self.state.swing = Some(swing);
            }
            CommandType::PowerLevel => {
                let level = PowerLevel::from_wire(value)
                    .ok_or_else(|| Error::unresolvable("power level", value))?;
                log::debug!("Received power level: {level}");
                self.state.power_level = Some(level);
                if self.config.power_level {
                    self.observer.on_power_level(level);
                }
            }
            CommandType::SpecialMode => {
                let mode = SpecialMode::from_wire(value)
                    .ok_or_else(|| Error::unresolvable("special mode", value))?;
                log::debug!("Received special mode: {mode}");
                let bias_changed =
                    mode.is_frost_guard() != self.state.special_mode.is_frost_guard();
                self.state.special_mode = mode;
                if !self.config.special_modes.is_empty() {
                    self.observer.on_special_mode(mode);
                }
                if bias_changed {
                    return Ok(Some(Command::request(CommandType::TargetTemperature)));
                }
            }
            CommandType::ComfortSleep => {
                let enabled = comfort_sleep_from_wire(value)
                    .ok_or_else(|| Error::unresolvable("comfort sleep", value))?;
                log::debug!("Received comfort sleep: {enabled}");
                self.state.comfort_sleep = Some(enabled);
            }
            CommandType::WifiLed => {
                log::debug!("Received Wi-Fi LED value {value}");
            }
        }
        Ok(None)
    }
}
