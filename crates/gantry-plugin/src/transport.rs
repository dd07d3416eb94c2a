//! `Content-Length` framed transport over a byte stream.
//!
//! Plugins speak JSON-RPC over their stdio using the same framing as LSP:
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <payload>
//! ```

use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::process::{ChildStdin, ChildStdout};

use crate::error::TransportError;

const CONTENT_LENGTH: &str = "Content-Length:";

/// Reads and writes framed messages.
///
/// The default type parameters are the stdio handles of a spawned plugin;
/// plugins themselves and tests use other readers and writers.
pub struct FramedTransport<R = ChildStdout, W: Write = ChildStdin> {
    reader: BufReader<R>,
    writer: BufWriter<W>,
}

impl<R: Read, W: Write> FramedTransport<R, W> {
    /// Creates a new transport over the given halves.
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
        }
    }

    /// Sends one framed message.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Io` if writing fails.
    pub fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        let header = format!("{CONTENT_LENGTH} {}\r\n\r\n", message.len());
        self.writer.write_all(header.as_bytes())?;
        self.writer.write_all(message)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Receives one framed message, blocking until it is complete.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Closed` if the stream ends between messages,
    /// `TransportError::MissingContentLength` or `InvalidHeader` for bad
    /// framing, and `TransportError::Io` for read failures.
    pub fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        let length = self.read_headers()?;
        let mut content = vec![0_u8; length];
        self.reader.read_exact(&mut content)?;
        Ok(content)
    }

    /// Receives one message, or `None` if the peer closed the stream cleanly.
    ///
    /// # Errors
    ///
    /// As [`Self::receive`], except that a clean close is not an error.
    pub fn receive_optional(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.receive() {
            Ok(message) => Ok(Some(message)),
            Err(TransportError::Closed) => Ok(None),
            Err(other) => Err(other),
        }
    }

    /// Returns the writer half, flushing any buffered bytes first.
    ///
    /// Dropping the returned writer closes the peer's input.
    #[must_use]
    pub fn into_writer(self) -> Option<W> {
        self.writer.into_inner().ok()
    }

    fn read_headers(&mut self) -> Result<usize, TransportError> {
        let mut length: Option<usize> = None;
        let mut seen_any = false;

        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(if seen_any {
                    TransportError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed while reading headers",
                    ))
                } else {
                    TransportError::Closed
                });
            }
            seen_any = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            if let Some(value) = trimmed.strip_prefix(CONTENT_LENGTH) {
                length = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|_| TransportError::InvalidHeader)?,
                );
            }
            // Other headers, such as Content-Type, are ignored.
        }

        length.ok_or(TransportError::MissingContentLength)
    }
}
