/// Trait for modem communication backends.
/// Implement this trait for different transports (UART, serial port, etc.)
pub trait ModemTransport {
    /// Error type for transport operations
    type Error: std::fmt::Debug;

    /// Write data to the transport, returning how many bytes were accepted
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Number of bytes the transport can accept right now without blocking
    fn available_for_write(&mut self) -> Result<usize, Self::Error>;

    /// Push any buffered output to the modem
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Read into `buf` until `terminator` is seen, `buf` is full or the read times out.
    ///
    /// The terminator is consumed but not stored. Returns 0 when nothing arrived.
    fn read_until(&mut self, terminator: u8, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Number of received bytes waiting to be read
    fn bytes_available(&mut self) -> Result<usize, Self::Error>;
}
