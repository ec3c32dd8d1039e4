use std::collections::VecDeque;
use std::io;

/// Ordered, reliable byte stream to a single connected peer.
///
/// Reads and writes block: `read_bytes` returns once `dest` is full or the peer
/// has closed, so a count smaller than `dest.len()` always means the stream
/// ended early. The same holds for `send_bytes`.
pub trait ByteChannel {
    /// Accepts a pending client, if any. Returns `true` while a peer is connected.
    fn accept_connection(&mut self) -> io::Result<bool>;

    /// Returns `true` when at least one byte can be read without blocking
    /// (or the peer has hung up and the next read will report it).
    fn data_available(&mut self) -> io::Result<bool>;

    /// Fills `dest`; returns the number of bytes actually read.
    fn read_bytes(&mut self, dest: &mut [u8]) -> io::Result<usize>;

    /// Sends all of `src`; returns the number of bytes actually sent.
    fn send_bytes(&mut self, src: &[u8]) -> io::Result<usize>;
}

impl<C: ByteChannel + ?Sized> ByteChannel for &mut C {
    fn accept_connection(&mut self) -> io::Result<bool> {
        (**self).accept_connection()
    }

    fn data_available(&mut self) -> io::Result<bool> {
        (**self).data_available()
    }

    fn read_bytes(&mut self, dest: &mut [u8]) -> io::Result<usize> {
        (**self).read_bytes(dest)
    }

    fn send_bytes(&mut self, src: &[u8]) -> io::Result<usize> {
        (**self).send_bytes(src)
    }
}

impl<C: ByteChannel + ?Sized> ByteChannel for Box<C> {
    fn accept_connection(&mut self) -> io::Result<bool> {
        (**self).accept_connection()
    }

    fn data_available(&mut self) -> io::Result<bool> {
        (**self).data_available()
    }

    fn read_bytes(&mut self, dest: &mut [u8]) -> io::Result<usize> {
        (**self).read_bytes(dest)
    }

    fn send_bytes(&mut self, src: &[u8]) -> io::Result<usize> {
        (**self).send_bytes(src)
    }
}

/// In-memory channel with a scripted peer.
///
/// Bytes queued with [`push_incoming`](Self::push_incoming) are what the peer
/// "sent"; everything written by the server side lands in
/// [`outgoing`](Self::outgoing). Each read/send call is recorded with the
/// length requested so callers can check how a payload was split.
#[derive(Debug, Default)]
pub struct LoopbackChannel {
    incoming: VecDeque<u8>,
    outgoing: Vec<u8>,
    consumed: usize,
    read_calls: Vec<usize>,
    send_calls: Vec<usize>,
    /// Remaining bytes the peer will accept; `None` is unlimited.
    send_budget: Option<usize>,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_incoming(bytes: impl AsRef<[u8]>) -> Self {
        let mut ch = Self::new();
        ch.push_incoming(bytes);
        ch
    }

    pub fn push_incoming(&mut self, bytes: impl AsRef<[u8]>) {
        self.incoming.extend(bytes.as_ref().iter().copied());
    }

    /// Caps the total number of bytes the peer accepts from now on.
    /// Sends past the cap are truncated (short writes).
    pub fn limit_sends(&mut self, budget: usize) {
        self.send_budget = Some(budget);
    }

    pub fn outgoing(&self) -> &[u8] {
        &self.outgoing
    }

    pub fn take_outgoing(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outgoing)
    }

    /// Total bytes handed out by `read_bytes` so far.
    pub fn bytes_consumed(&self) -> usize {
        self.consumed
    }

    pub fn remaining(&self) -> usize {
        self.incoming.len()
    }

    /// Requested length of every `read_bytes` call, in order.
    pub fn read_calls(&self) -> &[usize] {
        &self.read_calls
    }

    /// Requested length of every `send_bytes` call, in order.
    pub fn send_calls(&self) -> &[usize] {
        &self.send_calls
    }
}

impl ByteChannel for LoopbackChannel {
    fn accept_connection(&mut self) -> io::Result<bool> {
        Ok(true)
    }

    fn data_available(&mut self) -> io::Result<bool> {
        Ok(!self.incoming.is_empty())
    }

    fn read_bytes(&mut self, dest: &mut [u8]) -> io::Result<usize> {
        self.read_calls.push(dest.len());
        let n = dest.len().min(self.incoming.len());
        for (slot, byte) in dest.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = byte;
        }
        self.consumed += n;
        Ok(n)
    }

    fn send_bytes(&mut self, src: &[u8]) -> io::Result<usize> {
        self.send_calls.push(src.len());
        let n = match self.send_budget.as_mut() {
            Some(budget) => {
                let n = src.len().min(*budget);
                *budget -= n;
                n
            }
            None => src.len(),
        };
        self.outgoing.extend_from_slice(&src[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_stops_at_end_of_script() {
        let mut ch = LoopbackChannel::with_incoming([1u8, 2, 3]);
        let mut buf = [0u8; 4];
        assert_eq!(ch.read_bytes(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(ch.read_calls(), &[4]);
        assert_eq!(ch.bytes_consumed(), 3);
    }

    #[test]
    fn send_budget_truncates() {
        let mut ch = LoopbackChannel::new();
        ch.limit_sends(5);
        assert_eq!(ch.send_bytes(&[0; 4]).unwrap(), 4);
        assert_eq!(ch.send_bytes(&[1; 4]).unwrap(), 1);
        assert_eq!(ch.send_bytes(&[2; 4]).unwrap(), 0);
        assert_eq!(ch.outgoing().len(), 5);
        assert_eq!(ch.send_calls(), &[4, 4, 4]);
    }
}
