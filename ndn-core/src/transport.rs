//! Transport seam: something that moves whole TLV elements to and from a forwarder.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("transport I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("stream framing: {0}")]
    Framing(#[from] crate::wire::FrameDecodeError),
}

/// Delivers complete top-level elements. Framing is the transport's job;
/// the face never sees partial elements.
pub trait Transport {
    fn send(&mut self, element: &[u8]) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the next element. `None` timeout means
    /// wait indefinitely; `Some(Duration::ZERO)` polls. `Ok(None)` on timeout.
    fn recv_timeout(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>, TransportError>;

    fn close(&mut self) {}
}

/// In-memory transport. [`ChannelTransport::pair`] returns two connected ends.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: Option<Sender<Vec<u8>>>,
    rx: Receiver<Vec<u8>>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            Self {
                tx: Some(a_tx),
                rx: a_rx,
            },
            Self {
                tx: Some(b_tx),
                rx: b_rx,
            },
        )
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, element: &[u8]) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(element.to_vec()).map_err(|_| TransportError::Closed)
    }

    fn recv_timeout(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>, TransportError> {
        match timeout {
            None => self.rx.recv().map(Some).map_err(|_| TransportError::Closed),
            Some(d) if d.is_zero() => match self.rx.try_recv() {
                Ok(element) => Ok(Some(element)),
                Err(TryRecvError::Empty) => Ok(None),
                Err(TryRecvError::Disconnected) => Err(TransportError::Closed),
            },
            Some(d) => match self.rx.recv_timeout(d) {
                Ok(element) => Ok(Some(element)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
            },
        }
    }

    fn close(&mut self) {
        self.tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_connected_both_ways() {
        let (mut a, mut b) = ChannelTransport::pair();
        a.send(b"ping").unwrap();
        assert_eq!(b.recv_timeout(Some(Duration::ZERO)).unwrap(), Some(b"ping".to_vec()));
        b.send(b"pong").unwrap();
        assert_eq!(a.recv_timeout(None).unwrap(), Some(b"pong".to_vec()));
        assert_eq!(a.recv_timeout(Some(Duration::from_millis(1))).unwrap(), None);
    }

    #[test]
    fn close_is_seen_by_peer() {
        let (mut a, mut b) = ChannelTransport::pair();
        a.close();
        assert!(matches!(a.send(b"x"), Err(TransportError::Closed)));
        assert!(matches!(
            b.recv_timeout(Some(Duration::ZERO)),
            Err(TransportError::Closed)
        ));
    }
}
