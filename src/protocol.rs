use crate::Error;
use std::time::Duration;

/// Every frame starts with this byte.
pub const START_BYTE: u8 = 0x02;
/// Byte #2 of a frame with a length prefix and a checksum.
pub const STANDARD_FRAME_MARKER: u8 = 0x03;

const MARKER_INDEX: usize = 2;
const LENGTH_INDEX: usize = 6;

/// A partially received frame is dropped after this much silence on the line.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(200);
/// Minimum time between two transmitted commands.
pub const COMMAND_SPACING: Duration = Duration::from_millis(100);
/// Pause between the handshake and the after-handshake frames.
pub const HANDSHAKE_PAUSE: Duration = Duration::from_millis(2000);

pub const REQUEST_LENGTH: usize = 14;
pub const SET_LENGTH: usize = 15;
const ACKNOWLEDGE_LENGTH: usize = 16;
const ROUTED_RESPONSE_LENGTH: usize = 17;

const REQUEST_PREAMBLE: [u8; 12] = [
    0x02, 0x00, 0x03, 0x10, 0x00, 0x00, 0x06, 0x01, 0x30, 0x01, 0x00, 0x01,
];
const SET_PREAMBLE: [u8; 12] = [
    0x02, 0x00, 0x03, 0x10, 0x00, 0x00, 0x07, 0x01, 0x30, 0x01, 0x00, 0x02,
];

// Captured from the vendor Wi-Fi module while it boots.
const HANDSHAKE: [&[u8]; 6] = [
    &[0x02, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x02],
    &[0x02, 0xFF, 0xFF, 0x01, 0x00, 0x00, 0x01, 0x02, 0xFE],
    &[0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x02, 0x02, 0xFA],
    &[0x02, 0x00, 0x01, 0x81, 0x01, 0x00, 0x02, 0x00, 0x00, 0x7B],
    &[0x02, 0x00, 0x01, 0x02, 0x00, 0x00, 0x02, 0x00, 0x00, 0xFE],
    &[0x02, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0xFE],
];
const AFTER_HANDSHAKE: [&[u8]; 2] = [
    &[0x02, 0x00, 0x02, 0x01, 0x00, 0x00, 0x02, 0x00, 0x00, 0xFB],
    &[0x02, 0x00, 0x02, 0x02, 0x00, 0x00, 0x02, 0x00, 0x00, 0xFA],
];

/// Readable and writable attributes of the air conditioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    PowerState = 128,
    PowerLevel = 135,
    ComfortSleep = 148,
    Fan = 160,
    Swing = 163,
    Mode = 176,
    TargetTemperature = 179,
    RoomTemperature = 187,
    OutdoorTemperature = 190,
    WifiLed = 223,
    SpecialMode = 247,
}

impl TryFrom<u8> for CommandType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            128 => Ok(CommandType::PowerState),
            135 => Ok(CommandType::PowerLevel),
            148 => Ok(CommandType::ComfortSleep),
            160 => Ok(CommandType::Fan),
            163 => Ok(CommandType::Swing),
            176 => Ok(CommandType::Mode),
            179 => Ok(CommandType::TargetTemperature),
            187 => Ok(CommandType::RoomTemperature),
            190 => Ok(CommandType::OutdoorTemperature),
            223 => Ok(CommandType::WifiLed),
            247 => Ok(CommandType::SpecialMode),
            other => Err(Error::UnknownCommandType(other)),
        }
    }
}

impl From<CommandType> for u8 {
    fn from(command_type: CommandType) -> u8 {
        command_type as u8
    }
}

/// Two's complement of the sum of all bytes between the start byte and the
/// checksum slot, which is expected to be the last byte of `frame`.
pub fn checksum(frame: &[u8]) -> u8 {
    frame
        .get(1..frame.len().saturating_sub(1))
        .unwrap_or_default()
        .iter()
        .fold(0u8, |sum, b| sum.wrapping_add(*b))
        .wrapping_neg()
}

fn checksum_and_set(frame: &mut [u8]) {
    if let Some(last) = frame.len().checked_sub(1) {
        frame[last] = checksum(frame);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Literal frame of the start-up handshake.
    Handshake,
    /// Holds the queue until this much time passed since the previous transmission.
    Delay(Duration),
    /// Asks the unit to report the value of a command type.
    Request(u8),
    /// Writes a value for a command type.
    Set(u8, u8),
}

/// A queued unit of work for the [`Scheduler`](crate::scheduler::Scheduler),
/// together with the bytes that go on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    payload: Vec<u8>,
}

impl Command {
    pub fn request(command_type: impl Into<u8>) -> Self {
        let command_type = command_type.into();
        let mut payload = vec![0; REQUEST_LENGTH];
        payload[..REQUEST_PREAMBLE.len()].copy_from_slice(&REQUEST_PREAMBLE);
        payload[12] = command_type;
        checksum_and_set(&mut payload);
        Self {
            kind: CommandKind::Request(command_type),
            payload,
        }
    }

    pub fn set(command_type: impl Into<u8>, value: u8) -> Self {
        let command_type = command_type.into();
        let mut payload = vec![0; SET_LENGTH];
        payload[..SET_PREAMBLE.len()].copy_from_slice(&SET_PREAMBLE);
        payload[12] = command_type;
        payload[13] = value;
        checksum_and_set(&mut payload);
        Self {
            kind: CommandKind::Set(command_type, value),
            payload,
        }
    }

    pub fn handshake(frame: &[u8]) -> Self {
        Self {
            kind: CommandKind::Handshake,
            payload: frame.to_vec(),
        }
    }

    pub fn delay(duration: Duration) -> Self {
        Self {
            kind: CommandKind::Delay(duration),
            payload: Vec::new(),
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// The start-up sequence: handshake frames, a pause, then the after-handshake frames.
pub fn handshake_sequence() -> Vec<Command> {
    HANDSHAKE
        .iter()
        .map(|frame| Command::handshake(frame))
        .chain(std::iter::once(Command::delay(HANDSHAKE_PAUSE)))
        .chain(AFTER_HANDSHAKE.iter().map(|frame| Command::handshake(frame)))
        .collect()
}

/// Outcome of feeding one byte to a [`FrameAccumulator`].
#[derive(Debug)]
pub enum Accumulate {
    /// More bytes are needed.
    Continue,
    /// A standard frame with a valid checksum.
    Complete(Vec<u8>),
    /// The buffered bytes were discarded.
    Invalid(Error),
}

/// Incremental frame validation over the receive byte stream.
///
/// Handshake frames (marker byte other than [`STANDARD_FRAME_MARKER`]) carry no
/// usable length, so they are never completed here. The scheduler drops them
/// once the line has been silent for [`RECEIVE_TIMEOUT`].
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    buffer: Vec<u8>,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&mut self, byte: u8) -> Accumulate {
        self.buffer.push(byte);
        let at = self.buffer.len() - 1;

        if at == 0 {
            if byte == START_BYTE {
                return Accumulate::Continue;
            }
            self.buffer.clear();
            return Accumulate::Invalid(Error::Framing(byte));
        }
        if at < MARKER_INDEX || self.buffer[MARKER_INDEX] != STANDARD_FRAME_MARKER {
            return Accumulate::Continue;
        }
        if at < LENGTH_INDEX {
            return Accumulate::Continue;
        }

        let length = LENGTH_INDEX + self.buffer[LENGTH_INDEX] as usize + 1;
        if at < length {
            return Accumulate::Continue;
        }

        let frame = std::mem::take(&mut self.buffer);
        let calculated = checksum(&frame);
        if calculated != byte {
            return Accumulate::Invalid(Error::ChecksumMismatch {
                calculated,
                received: byte,
            });
        }
        Accumulate::Complete(frame)
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Payload of a validated frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// The unit reports the value of a command type.
    Value { command_type: u8, value: u8 },
    /// Bare acknowledgement, nothing to decode.
    Acknowledge,
}

impl Response {
    /// Locates command type and value; their offsets depend on the frame length.
    pub fn parse(frame: &[u8]) -> Result<Self, Error> {
        match frame.len() {
            SET_LENGTH => Ok(Response::Value {
                command_type: frame[12],
                value: frame[13],
            }),
            ROUTED_RESPONSE_LENGTH => Ok(Response::Value {
                command_type: frame[14],
                value: frame[15],
            }),
            REQUEST_LENGTH | ACKNOWLEDGE_LENGTH => Ok(Response::Acknowledge),
            len => Err(Error::UnrecognizedFrameLength(len)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn feed(accumulator: &mut FrameAccumulator, bytes: &[u8]) -> Vec<Accumulate> {
        bytes.iter().map(|b| accumulator.accumulate(*b)).collect()
    }

    fn response_17(command_type: u8, value: u8) -> Vec<u8> {
        let mut frame = vec![
            0x02, 0x00, 0x03, 0x90, 0x00, 0x00, 0x09, 0x01, 0x30, 0x01, 0x00, 0x02, 0x00, 0x00,
            command_type, value, 0x00,
        ];
        checksum_and_set(&mut frame);
        frame
    }

    #[test_case(HANDSHAKE[0]; "handshake_1")]
    #[test_case(HANDSHAKE[1]; "handshake_2")]
    #[test_case(HANDSHAKE[2]; "handshake_3")]
    #[test_case(HANDSHAKE[3]; "handshake_4")]
    #[test_case(HANDSHAKE[5]; "handshake_6")]
    #[test_case(AFTER_HANDSHAKE[0]; "after_handshake_1")]
    #[test_case(AFTER_HANDSHAKE[1]; "after_handshake_2")]
    fn captured_frames_checksum(frame: &[u8]) {
        assert_eq!(checksum(frame), frame[frame.len() - 1]);
    }

    #[test]
    fn captured_frames_are_sent_verbatim() {
        // The fifth boot frame does not carry a valid checksum.
        assert_ne!(checksum(HANDSHAKE[4]), 0xFE);
        assert_eq!(handshake_sequence()[4].payload(), HANDSHAKE[4]);
    }

    #[test]
    fn checksum_wraps() {
        assert_eq!(checksum(&[0x02, 0xFF, 0x01, 0x00]), 0x00);
        assert_eq!(checksum(&[0x02, 0x01, 0x00]), 0xFF);
        assert_eq!(checksum(&[0x02]), 0x00);
    }

    #[test]
    fn request_encoding() {
        assert_eq!(
            Command::request(CommandType::RoomTemperature).payload(),
            &[0x02, 0x00, 0x03, 0x10, 0x00, 0x00, 0x06, 0x01, 0x30, 0x01, 0x00, 0x01, 0xBB, 0xF9]
        );
        assert_eq!(
            Command::request(CommandType::PowerState).kind(),
            CommandKind::Request(128)
        );
    }

    #[test]
    fn set_encoding() {
        let command = Command::set(CommandType::Mode, 66);
        assert_eq!(
            command.payload(),
            &[0x02, 0x00, 0x03, 0x10, 0x00, 0x00, 0x07, 0x01, 0x30, 0x01, 0x00, 0x02, 0xB0, 0x42, 0xC0]
        );
        assert_eq!(command.kind(), CommandKind::Set(176, 66));
        assert_eq!(
            Command::set(CommandType::TargetTemperature, 32).payload()[14],
            0xDF
        );
    }

    #[test]
    fn handshake_sequence_layout() {
        let sequence = handshake_sequence();
        assert_eq!(sequence.len(), 9);
        assert!(sequence[..6]
            .iter()
            .all(|c| c.kind() == CommandKind::Handshake));
        assert_eq!(sequence[6].kind(), CommandKind::Delay(HANDSHAKE_PAUSE));
        assert!(sequence[6].payload().is_empty());
        assert_eq!(sequence[8].payload(), AFTER_HANDSHAKE[1]);
    }

    #[test]
    fn encoded_commands_are_complete_frames() {
        let mut accumulator = FrameAccumulator::new();
        for raw in 128..=254u8 {
            for command in [Command::request(raw), Command::set(raw, raw.wrapping_mul(3))] {
                let results = feed(&mut accumulator, command.payload());
                let (last, rest) = results.split_last().unwrap();
                assert!(rest.iter().all(|r| matches!(r, Accumulate::Continue)));
                match last {
                    Accumulate::Complete(frame) => assert_eq!(frame, command.payload()),
                    other => panic!("expected complete frame, got {other:?}"),
                }
                assert!(accumulator.is_empty());
            }
        }
    }

    #[test]
    fn corrupted_payload_is_invalid() {
        let command = Command::set(CommandType::Fan, 65);
        for index in 7..command.payload().len() - 1 {
            let mut frame = command.payload().to_vec();
            frame[index] ^= 0x01;
            let mut accumulator = FrameAccumulator::new();
            let results = feed(&mut accumulator, &frame);
            assert!(
                matches!(
                    results.last(),
                    Some(Accumulate::Invalid(Error::ChecksumMismatch { .. }))
                ),
                "byte {index} flipped: {results:?}"
            );
            assert!(accumulator.is_empty());
        }
    }

    #[test]
    fn junk_before_start_byte() {
        let mut accumulator = FrameAccumulator::new();
        assert!(matches!(
            accumulator.accumulate(0x55),
            Accumulate::Invalid(Error::Framing(0x55))
        ));
        assert!(accumulator.is_empty());

        let frame = Command::request(CommandType::Fan);
        let results = feed(&mut accumulator, frame.payload());
        assert!(matches!(results.last(), Some(Accumulate::Complete(_))));
    }

    #[test]
    fn handshake_frames_never_complete() {
        let mut accumulator = FrameAccumulator::new();
        let mut bytes = vec![0x02, 0x00, 0x02, 0x01, 0x00, 0x00, 0x02];
        bytes.extend(std::iter::repeat(0xA5).take(40));
        let results = feed(&mut accumulator, &bytes);
        assert!(results.iter().all(|r| matches!(r, Accumulate::Continue)));
        assert_eq!(accumulator.len(), bytes.len());
    }

    #[test]
    fn response_offsets() {
        let short = Command::set(CommandType::RoomTemperature, 22);
        assert_eq!(
            Response::parse(short.payload()).unwrap(),
            Response::Value {
                command_type: 187,
                value: 22
            }
        );
        assert_eq!(
            Response::parse(&response_17(179, 21)).unwrap(),
            Response::Value {
                command_type: 179,
                value: 21
            }
        );
        assert_eq!(Response::parse(&[0; 16]).unwrap(), Response::Acknowledge);
        assert_eq!(
            Response::parse(Command::request(CommandType::Fan).payload()).unwrap(),
            Response::Acknowledge
        );
        assert!(matches!(
            Response::parse(&[0; 12]),
            Err(Error::UnrecognizedFrameLength(12))
        ));
    }

    #[test]
    fn command_type_table() {
        assert_eq!(CommandType::try_from(247).unwrap(), CommandType::SpecialMode);
        assert_eq!(u8::from(CommandType::OutdoorTemperature), 190);
        assert!(matches!(
            CommandType::try_from(200),
            Err(Error::UnknownCommandType(200))
        ));
    }
}
