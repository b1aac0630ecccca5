//! Duplex byte channels beneath the packet framer.
//!
//! Two transports exist: a loopback TCP listener that serves exactly one
//! debug client, and the process's inherited standard streams. The framer
//! above never cares which one is active.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsFd;

use tracing::info;

use crate::errors::TransportError;

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Inbound half of the duplex channel.
#[derive(Debug)]
pub enum TransportReader {
    /// Connected debug client socket.
    Tcp(TcpStream),
    /// Duplicate of the inherited standard input.
    Stdio(File),
}

/// Outbound half of the duplex channel.
#[derive(Debug)]
pub enum TransportWriter {
    /// Connected debug client socket.
    Tcp(TcpStream),
    /// Duplicate of the inherited standard output.
    Stdio(File),
}

impl Read for TransportReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            Self::Stdio(stream) => stream.read(buf),
        }
    }
}

impl Write for TransportWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            Self::Stdio(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            Self::Stdio(stream) => stream.flush(),
        }
    }
}

/// Loopback listener that serves exactly one debug client.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Binds the loopback interface on `port` (0 picks a free port).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] when the bind fails.
    pub fn bind(port: u16) -> Result<Self, TransportError> {
        let inner = TcpListener::bind((Ipv4Addr::LOCALHOST, port))?;
        Ok(Self { inner })
    }

    /// The bound address, including the resolved port.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] when the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.inner.local_addr()?)
    }

    /// Blocks until one client connects, then consumes the listener; this
    /// process serves a single session per lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] when the accept fails for any reason
    /// other than an interruption.
    pub fn accept_one(self) -> Result<(TransportReader, TransportWriter), TransportError> {
        let (stream, peer) = loop {
            match self.inner.accept() {
                Ok(accepted) => break accepted,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(TransportError::Io(error)),
            }
        };
        info!(target: TRANSPORT_TARGET, peer = %peer, "debug client connected");
        let reader = stream.try_clone()?;
        Ok((TransportReader::Tcp(reader), TransportWriter::Tcp(stream)))
    }
}

/// Treats the inherited standard streams as the duplex channel.
///
/// Both descriptors are duplicated first, so the wire stays attached to the
/// original streams even after standard output is redirected into the
/// output-capture pipe.
///
/// # Errors
///
/// Returns [`TransportError::Io`] when a descriptor cannot be duplicated.
pub fn stdio() -> Result<(TransportReader, TransportWriter), TransportError> {
    let stdin = io::stdin();
    let input = stdin.as_fd().try_clone_to_owned()?;
    let stdout = io::stdout();
    let output = stdout.as_fd().try_clone_to_owned()?;
    Ok((
        TransportReader::Stdio(File::from(input)),
        TransportWriter::Stdio(File::from(output)),
    ))
}

/// Reads until `buf` is filled, retrying on interruption.
///
/// # Errors
///
/// Returns [`TransportError::Eof`] on a zero-length read and
/// [`TransportError::Io`] on any other failure.
pub fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<(), TransportError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(TransportError::Eof),
            Ok(count) => filled += count,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(TransportError::Io(error)),
        }
    }
    Ok(())
}

/// Writes all of `bytes`, retrying on interruption.
///
/// # Errors
///
/// Returns [`TransportError::Io`] when the writer fails or refuses bytes.
pub fn write_full<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> Result<(), TransportError> {
    let mut written = 0;
    while written < bytes.len() {
        match writer.write(&bytes[written..]) {
            Ok(0) => {
                return Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "writer accepted no bytes",
                )));
            }
            Ok(count) => written += count,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(TransportError::Io(error)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::net::TcpStream;
    use std::thread;

    use super::*;

    #[test]
    fn read_full_fills_the_buffer_across_short_reads() {
        let mut reader = Cursor::new(b"abcdef".to_vec());
        let mut buf = [0_u8; 4];
        read_full(&mut reader, &mut buf).expect("read");
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn read_full_reports_eof_on_exhausted_input() {
        let mut reader = Cursor::new(b"ab".to_vec());
        let mut buf = [0_u8; 4];
        let error = read_full(&mut reader, &mut buf).expect_err("must fail");
        assert!(matches!(error, TransportError::Eof));
    }

    #[test]
    fn write_full_transfers_every_byte() {
        let mut sink = Vec::new();
        write_full(&mut sink, b"payload").expect("write");
        assert_eq!(sink, b"payload");
    }

    #[test]
    fn listener_serves_one_duplex_connection() {
        let listener = Listener::bind(0).expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let server = thread::spawn(move || {
            let (mut reader, mut writer) = listener.accept_one().expect("accept");
            let mut buf = [0_u8; 4];
            read_full(&mut reader, &mut buf).expect("server read");
            write_full(&mut writer, &buf).expect("server write");
        });

        let mut client = TcpStream::connect(addr).expect("connect");
        client.write_all(b"ping").expect("client write");
        let mut echoed = [0_u8; 4];
        client.read_exact(&mut echoed).expect("client read");
        assert_eq!(&echoed, b"ping");

        server.join().expect("join server");
    }
}
