use crate::config::EngineConfig;
use crate::engine::{ControlRequest, Engine, StateObserver};
use crate::protocol::RECEIVE_TIMEOUT;
use crate::state::{ClimateState, PowerLevel, SpecialMode};
use crate::transport::Transport;
use crate::Error;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

pub const BAUD_RATE: u32 = 9600;
/// Sleep between two engine services.
pub const SERVICE_PERIOD: Duration = Duration::from_millis(10);

/// 9600 baud, 8 data bits, even parity, one stop bit.
pub struct SerialTransport {
    serial: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn open(port: &str, timeout: Duration) -> Result<Self, Error> {
        let serial = serialport::new(port, BAUD_RATE)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::Even)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(timeout)
            .open()?;
        log::debug!("Opened serial port '{port}'");
        Ok(Self { serial })
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.serial.name())
            .finish()
    }
}

impl Transport for SerialTransport {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.serial.write_all(bytes)?;
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, Error> {
        Ok(self.serial.bytes_to_read()? as usize)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        let mut buf = [0u8; 1];
        match self.serial.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(err) if err.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Blocking client that drives an [`Engine`] over a serial port.
pub struct ToshibaAc<O: StateObserver> {
    engine: Engine<SerialTransport, O>,
    poll_interval: Option<Duration>,
    last_poll: Instant,
}

impl<O: StateObserver> ToshibaAc<O> {
    pub fn new(
        port: &str,
        timeout: Duration,
        config: EngineConfig,
        observer: O,
    ) -> Result<Self, Error> {
        Ok(Self {
            engine: Engine::new(SerialTransport::open(port, timeout)?, observer, config),
            poll_interval: None,
            last_poll: Instant::now(),
        })
    }

    /// Periodically request the room and outdoor temperature while servicing.
    pub fn set_poll_interval(&mut self, interval: Option<Duration>) {
        self.poll_interval = interval;
    }

    pub fn engine_mut(&mut self) -> &mut Engine<SerialTransport, O> {
        &mut self.engine
    }

    pub fn state(&self) -> &ClimateState {
        self.engine.state()
    }

    /// Runs the handshake and the initial state requests.
    ///
    /// Returns `false` if the queue did not drain within `timeout`.
    pub fn connect(&mut self, timeout: Duration) -> Result<bool, Error> {
        self.engine.start(Instant::now())?;
        self.wait_idle(timeout)
    }

    /// Receives pending bytes, transmits the next due command and sleeps one [`SERVICE_PERIOD`].
    pub fn service(&mut self) -> Result<(), Error> {
        let now = Instant::now();
        if let Some(interval) = self.poll_interval {
            if now.duration_since(self.last_poll) >= interval {
                self.last_poll = now;
                self.engine.poll_sensors(now)?;
            }
        }
        self.engine.service(now)?;
        std::thread::sleep(SERVICE_PERIOD);
        Ok(())
    }

    pub fn run_for(&mut self, duration: Duration) -> Result<(), Error> {
        let until = Instant::now() + duration;
        while Instant::now() < until {
            self.service()?;
        }
        Ok(())
    }

    /// Services until the queue is drained and the last reply had time to arrive.
    pub fn wait_idle(&mut self, timeout: Duration) -> Result<bool, Error> {
        let until = Instant::now() + timeout;
        while !self.engine.is_idle() {
            if Instant::now() >= until {
                log::warn!("{} commands still queued after {timeout:?}", self.engine.pending());
                return Ok(false);
            }
            self.service()?;
        }
        self.run_for(RECEIVE_TIMEOUT)?;
        Ok(true)
    }

    pub fn apply_control(&mut self, request: ControlRequest) -> Result<(), Error> {
        self.engine.apply_control(request, Instant::now())
    }

    pub fn set_power_level(&mut self, level: PowerLevel) -> Result<(), Error> {
        self.engine.set_power_level(level, Instant::now())
    }

    pub fn set_special_mode(&mut self, mode: SpecialMode) -> Result<(), Error> {
        self.engine.set_special_mode(mode, Instant::now())
    }

    pub fn set_comfort_sleep(&mut self, enabled: bool) -> Result<(), Error> {
        self.engine.set_comfort_sleep(enabled, Instant::now())
    }

    pub fn sweep(&mut self) -> Result<(), Error> {
        self.engine.sweep(Instant::now())
    }
}
