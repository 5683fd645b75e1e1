//! SCPI transport abstraction
//!
//! The Rigol driver talks SCPI text commands plus IEEE 488.2 binary blocks.
//! Splitting the byte transport behind [`ScpiTransport`] keeps the driver
//! testable against a scripted transport and leaves the wire choice (raw LXI
//! socket here, VISA elsewhere) to the composition root.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::ScopeError;

/// Byte-level transport for SCPI instruments
pub trait ScpiTransport {
    /// Send a command that produces no response
    fn write(&mut self, command: &str) -> Result<(), ScopeError>;

    /// Send a query and read one line of text response
    fn query(&mut self, command: &str) -> Result<String, ScopeError>;

    /// Send a query and read an IEEE 488.2 definite-length binary block
    fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, ScopeError>;
}

/// Raw SCPI over TCP (LXI port 5555 on the DS1000Z series)
pub struct TcpTransport {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl TcpTransport {
    /// Connect to an instrument, applying read/write timeouts
    pub fn connect<A: ToSocketAddrs>(addr: A, timeout: Duration) -> Result<Self, ScopeError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self { stream, reader })
    }

    fn send(&mut self, command: &str) -> Result<(), ScopeError> {
        tracing::trace!(command, "scpi_write");
        self.stream.write_all(command.as_bytes())?;
        self.stream.write_all(b"\n")?;
        Ok(())
    }
}

impl ScpiTransport for TcpTransport {
    fn write(&mut self, command: &str) -> Result<(), ScopeError> {
        self.send(command)
    }

    fn query(&mut self, command: &str) -> Result<String, ScopeError> {
        self.send(command)?;
        let mut line = String::new();
        self.reader.read_line(&mut line)?;
        Ok(line.trim_end().to_string())
    }

    fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, ScopeError> {
        self.send(command)?;

        // Definite-length block: '#', one digit N, N digits of payload length,
        // payload bytes, trailing newline.
        let mut header = [0u8; 2];
        self.reader.read_exact(&mut header)?;
        if header[0] != b'#' {
            return Err(ScopeError::UnexpectedResponse {
                command: command.to_string(),
                response: format!("block header started with 0x{:02x}", header[0]),
            });
        }
        let digit_count = (header[1] as char).to_digit(10).ok_or_else(|| {
            ScopeError::UnexpectedResponse {
                command: command.to_string(),
                response: format!("block length digit was 0x{:02x}", header[1]),
            }
        })? as usize;

        let mut length_digits = vec![0u8; digit_count];
        self.reader.read_exact(&mut length_digits)?;
        let length: usize = std::str::from_utf8(&length_digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ScopeError::UnexpectedResponse {
                command: command.to_string(),
                response: format!("unparseable block length {length_digits:?}"),
            })?;

        let mut payload = vec![0u8; length];
        self.reader.read_exact(&mut payload)?;

        // Consume the block terminator
        let mut terminator = [0u8; 1];
        let _ = self.reader.read(&mut terminator)?;

        Ok(payload)
    }
}
