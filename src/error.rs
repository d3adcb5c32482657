/// Errors raised while talking to the air conditioner.
///
/// Protocol errors are absorbed by the [`Engine`](crate::engine::Engine): they are
/// logged and the offending bytes are dropped. Only transport errors are ever
/// returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The first byte of a frame was not the start marker.
    #[error("Frame start expected, got {0:#04X}")]
    Framing(u8),
    /// The received checksum does not match the calculated one.
    #[error("Invalid checksum - calculated={calculated:#04X} received={received:#04X}")]
    ChecksumMismatch { calculated: u8, received: u8 },
    /// A decoded command type has no known meaning.
    #[error("Unknown command type {0}")]
    UnknownCommandType(u8),
    /// A validated frame has a length the decoder does not know how to read.
    #[error("Unrecognized frame length {0}")]
    UnrecognizedFrameLength(usize),
    /// A partially received frame was abandoned after the receive timeout.
    #[error("Receive stalled, discarded {0} bytes")]
    ReceiveStall(usize),
    /// A semantic value (name or wire byte) has no mapping.
    #[error("No {kind} mapping for '{value}'")]
    Unresolvable { kind: &'static str, value: String },
    /// An I/O error from the transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// An error from the `serialport` crate.
    #[cfg(feature = "serialport")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl Error {
    pub(crate) fn unresolvable(kind: &'static str, value: impl ToString) -> Self {
        Error::Unresolvable {
            kind,
            value: value.to_string(),
        }
    }
}
