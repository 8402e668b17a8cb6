//! Socket transport: a tokio stream to the forwarder, bridged to the
//! blocking [`Transport`] the face drives.

use std::io;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use ndn_core::{ElementBuffer, Transport, TransportError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::config::TransportUri;

const READ_CHUNK: usize = 8 * 1024;

type Inbound = Result<Vec<u8>, TransportError>;

/// Elements in from a reader task, elements out to a writer task.
/// Both tasks run on the runtime that was current at [`connect`].
pub struct SocketTransport {
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    inbound: std_mpsc::Receiver<Inbound>,
}

pub async fn connect(uri: &TransportUri) -> io::Result<SocketTransport> {
    match uri {
        TransportUri::Tcp { host, port } => {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            let stream = TcpStream::connect((host, *port)).await?;
            stream.set_nodelay(true)?;
            Ok(SocketTransport::spawn(stream))
        }
        #[cfg(unix)]
        TransportUri::Unix(path) => {
            let stream = tokio::net::UnixStream::connect(path).await?;
            Ok(SocketTransport::spawn(stream))
        }
        #[cfg(not(unix))]
        TransportUri::Unix(_) => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets are not available on this platform",
        )),
    }
}

impl SocketTransport {
    fn spawn<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (in_tx, in_rx) = std_mpsc::channel::<Inbound>();

        tokio::spawn(async move {
            while let Some(element) = out_rx.recv().await {
                if let Err(e) = writer.write_all(&element).await {
                    tracing::debug!(error = %e, "forwarder write failed");
                    return;
                }
                let _ = writer.flush().await;
            }
            let _ = writer.shutdown().await;
        });

        tokio::spawn(async move {
            let mut frames = ElementBuffer::new();
            let mut chunk = vec![0u8; READ_CHUNK];
            loop {
                let n = match reader.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        let _ = in_tx.send(Err(e.into()));
                        break;
                    }
                };
                frames.extend(&chunk[..n]);
                loop {
                    match frames.next_element() {
                        Ok(Some(element)) => {
                            if in_tx.send(Ok(element)).is_err() {
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = in_tx.send(Err(e.into()));
                            return;
                        }
                    }
                }
            }
            if frames.buffered() > 0 {
                tracing::debug!(bytes = frames.buffered(), "stream ended mid-element");
            }
        });

        Self {
            outbound: Some(out_tx),
            inbound: in_rx,
        }
    }
}

impl Transport for SocketTransport {
    fn send(&mut self, element: &[u8]) -> Result<(), TransportError> {
        let tx = self.outbound.as_ref().ok_or(TransportError::Closed)?;
        tx.send(element.to_vec()).map_err(|_| TransportError::Closed)
    }

    fn recv_timeout(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>, TransportError> {
        let next = match timeout {
            None => self.inbound.recv().map_err(|_| TransportError::Closed),
            Some(d) if d.is_zero() => match self.inbound.try_recv() {
                Ok(item) => Ok(item),
                Err(std_mpsc::TryRecvError::Empty) => return Ok(None),
                Err(std_mpsc::TryRecvError::Disconnected) => Err(TransportError::Closed),
            },
            Some(d) => match self.inbound.recv_timeout(d) {
                Ok(item) => Ok(item),
                Err(std_mpsc::RecvTimeoutError::Timeout) => return Ok(None),
                Err(std_mpsc::RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
            },
        };
        next?.map(Some)
    }

    fn close(&mut self) {
        self.outbound = None;
    }
}
