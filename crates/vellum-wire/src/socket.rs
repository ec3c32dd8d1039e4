//! Local (filesystem path) socket transport.

use std::io::{self, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use crate::channel::ByteChannel;

/// Server end of a local socket bound to a filesystem path.
///
/// Accepts at most one client at a time. Accept can be polled (the default,
/// suited to a render loop) or blocking. Once connected, reads and writes
/// block until the full length has been transferred or the peer hangs up.
pub struct LocalSocketChannel {
    path: PathBuf,
    listener: UnixListener,
    stream: Option<UnixStream>,
    /// One byte pulled off the stream by `data_available`.
    lookahead: Option<u8>,
    blocking_accept: bool,
}

impl LocalSocketChannel {
    /// Binds `path`, replacing a stale socket file left by a previous run.
    pub fn bind(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            log::debug!("removing stale socket file {}", path.display());
            std::fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;
        log::info!("listening on {}", path.display());

        Ok(Self {
            path,
            listener,
            stream: None,
            lookahead: None,
            blocking_accept: false,
        })
    }

    /// When set, `accept_connection` waits for a client instead of polling.
    pub fn set_blocking_accept(&mut self, blocking: bool) {
        self.blocking_accept = blocking;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Drops the current client, if any. The listener stays bound.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            log::info!("client disconnected from {}", self.path.display());
        }
        self.lookahead = None;
    }
}

impl ByteChannel for LocalSocketChannel {
    fn accept_connection(&mut self) -> io::Result<bool> {
        if self.stream.is_some() {
            return Ok(true);
        }

        self.listener.set_nonblocking(!self.blocking_accept)?;
        match self.listener.accept() {
            Ok((stream, _addr)) => {
                stream.set_nonblocking(false)?;
                log::info!("client connected on {}", self.path.display());
                self.stream = Some(stream);
                self.lookahead = None;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn data_available(&mut self) -> io::Result<bool> {
        if self.lookahead.is_some() {
            return Ok(true);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(false);
        };

        stream.set_nonblocking(true)?;
        let mut byte = [0u8; 1];
        let polled = stream.read(&mut byte);
        stream.set_nonblocking(false)?;

        match polled {
            Ok(1) => {
                self.lookahead = Some(byte[0]);
                Ok(true)
            }
            // Hang-up: report readable so the next read observes end of stream.
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn read_bytes(&mut self, dest: &mut [u8]) -> io::Result<usize> {
        if dest.is_empty() {
            return Ok(0);
        }
        let mut filled = 0;
        if let Some(byte) = self.lookahead.take() {
            dest[0] = byte;
            filled = 1;
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no client connected"));
        };

        while filled < dest.len() {
            match stream.read(&mut dest[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn send_bytes(&mut self, src: &[u8]) -> io::Result<usize> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no client connected"));
        };

        let mut sent = 0;
        while sent < src.len() {
            match stream.write(&src[sent..]) {
                Ok(0) => break,
                Ok(n) => sent += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if sent > 0 => {
                    log::debug!("send interrupted after {sent} bytes: {e}");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(sent)
    }
}

impl Drop for LocalSocketChannel {
    fn drop(&mut self) {
        self.disconnect();
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("vellum-{tag}-{}.socket", std::process::id()))
    }

    #[test]
    fn poll_accept_without_client() {
        let mut ch = LocalSocketChannel::bind(socket_path("idle")).unwrap();
        assert!(!ch.accept_connection().unwrap());
        assert!(!ch.data_available().unwrap());
    }

    #[test]
    fn exchange_with_client() {
        let path = socket_path("exchange");
        let mut ch = LocalSocketChannel::bind(&path).unwrap();
        ch.set_blocking_accept(true);

        let mut client = UnixStream::connect(&path).unwrap();
        assert!(ch.accept_connection().unwrap());

        client.write_all(&[9, 8, 7, 6]).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(ch.read_bytes(&mut buf).unwrap(), 4);
        assert_eq!(buf, [9, 8, 7, 6]);

        assert_eq!(ch.send_bytes(&[1, 2]).unwrap(), 2);
        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).unwrap();
        assert_eq!(reply, [1, 2]);
    }

    #[test]
    fn lookahead_byte_is_not_lost() {
        let path = socket_path("lookahead");
        let mut ch = LocalSocketChannel::bind(&path).unwrap();
        ch.set_blocking_accept(true);

        let mut client = UnixStream::connect(&path).unwrap();
        assert!(ch.accept_connection().unwrap());
        client.write_all(&[5, 6, 7]).unwrap();

        // Data may take a moment to become visible on the server end.
        let mut spins = 0;
        while !ch.data_available().unwrap() {
            spins += 1;
            assert!(spins < 10_000, "client data never arrived");
            std::thread::yield_now();
        }

        let mut buf = [0u8; 3];
        assert_eq!(ch.read_bytes(&mut buf).unwrap(), 3);
        assert_eq!(buf, [5, 6, 7]);
    }

    #[test]
    fn hang_up_reads_short() {
        let path = socket_path("hangup");
        let mut ch = LocalSocketChannel::bind(&path).unwrap();
        ch.set_blocking_accept(true);

        let mut client = UnixStream::connect(&path).unwrap();
        assert!(ch.accept_connection().unwrap());
        client.write_all(&[1, 2]).unwrap();
        drop(client);

        let mut buf = [0u8; 4];
        assert_eq!(ch.read_bytes(&mut buf).unwrap(), 2);
    }
}
