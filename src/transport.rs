use crate::Error;

/// Byte pipe to the air conditioner.
///
/// Implementations must not block longer than their read timeout; the
/// [`Engine`](crate::engine::Engine) only reads what `bytes_available` announces.
pub trait Transport {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error>;

    fn bytes_available(&mut self) -> Result<usize, Error>;

    /// Reads a single byte, `None` if nothing arrived.
    fn read_byte(&mut self) -> Result<Option<u8>, Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        (**self).write_bytes(bytes)
    }

    fn bytes_available(&mut self) -> Result<usize, Error> {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        (**self).read_byte()
    }
}
