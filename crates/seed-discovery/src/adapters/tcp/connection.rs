//! An established TCP connection.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::codec::{read_frame, write_frame, Packet};
use super::handshake::NodeInfo;
use crate::domain::{NodeId, PeerAddress, PexMessage, TransportError};
use crate::ports::PeerConnection;

/// Decoded messages buffered ahead of the worker.
const INBOUND_QUEUE: usize = 16;

/// A handshaken TCP connection.
///
/// A background task owns the read half and decodes frames into a queue,
/// which keeps [`PeerConnection::receive`] cancel-safe.
pub struct TcpConnection {
    remote: NodeInfo,
    remote_addr: SocketAddr,
    listen_addr: Option<PeerAddress>,
    writer: OwnedWriteHalf,
    inbound: mpsc::Receiver<Result<PexMessage, TransportError>>,
    reader: JoinHandle<()>,
    max_frame_size: usize,
    write_timeout: Duration,
    closed: bool,
}

impl TcpConnection {
    pub(crate) fn spawn(
        stream: TcpStream,
        remote: NodeInfo,
        remote_addr: SocketAddr,
        listen_addr: Option<PeerAddress>,
        max_frame_size: usize,
        write_timeout: Duration,
    ) -> Self {
        let (read_half, writer) = stream.into_split();
        let (tx, inbound) = mpsc::channel(INBOUND_QUEUE);
        let reader = tokio::spawn(read_loop(read_half, tx, max_frame_size, remote.id));
        Self {
            remote,
            remote_addr,
            listen_addr,
            writer,
            inbound,
            reader,
            max_frame_size,
            write_timeout,
            closed: false,
        }
    }

    /// What the remote announced in the handshake.
    pub fn node_info(&self) -> &NodeInfo {
        &self.remote
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    tx: mpsc::Sender<Result<PexMessage, TransportError>>,
    max_frame_size: usize,
    peer: NodeId,
) {
    loop {
        let item = match read_frame::<_, Packet>(&mut reader, max_frame_size).await {
            Ok(None) => break,
            Ok(Some(packet)) => {
                let channel = packet.channel;
                match packet.into_pex() {
                    Ok(Some(msg)) => Ok(msg),
                    Ok(None) => {
                        trace!(%peer, channel, "Dropping packet on unknown channel");
                        continue;
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };

        let fatal = item.is_err();
        if tx.send(item).await.is_err() || fatal {
            break;
        }
    }
    debug!(%peer, "Reader finished");
}

#[async_trait]
impl PeerConnection for TcpConnection {
    fn remote_id(&self) -> NodeId {
        self.remote.id
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    fn listen_addr(&self) -> Option<PeerAddress> {
        self.listen_addr
    }

    async fn send(&mut self, msg: PexMessage) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let packet = Packet::pex(&msg)?;
        let written = tokio::time::timeout(
            self.write_timeout,
            write_frame(&mut self.writer, &packet, self.max_frame_size),
        )
        .await;
        match written {
            Ok(result) => result,
            Err(_) => {
                // A partial frame may be on the wire; the stream is unusable.
                self.closed = true;
                Err(TransportError::Timeout(format!("write to {}", self.remote.id)))
            }
        }
    }

    async fn receive(&mut self) -> Result<Option<PexMessage>, TransportError> {
        self.inbound.recv().await.transpose()
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.writer.shutdown().await;
        self.reader.abort();
        self.inbound.close();
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
