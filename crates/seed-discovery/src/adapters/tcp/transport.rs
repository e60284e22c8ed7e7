//! TCP implementation of the transport port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::codec::DEFAULT_MAX_FRAME_SIZE;
use super::connection::TcpConnection;
use super::handshake::{exchange_node_info, NodeInfo};
use crate::domain::{PeerAddress, TransportError};
use crate::ports::{Listener, PeerConnection, Transport};

/// Handshaken inbound connections waiting for `accept`.
const ACCEPT_QUEUE: usize = 64;
/// Back-off after a failed `accept(2)`, e.g. on fd exhaustion.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// TCP transport configuration.
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// What we announce in every handshake.
    pub node_info: NodeInfo,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Handshake timeout, both directions.
    pub handshake_timeout: Duration,
    /// Bound on writing one frame once connected.
    pub write_timeout: Duration,
    /// Maximum frame size.
    pub max_frame_size: usize,
}

impl TcpTransportConfig {
    /// Default timeouts and frame bound for `node_info`.
    pub fn new(node_info: NodeInfo) -> Self {
        Self {
            node_info,
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(20),
            write_timeout: Duration::from_secs(10),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// [`Transport`] over plain TCP.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    config: Arc<TcpTransportConfig>,
}

impl TcpTransport {
    /// Create a transport announcing `config.node_info`.
    pub fn new(config: TcpTransportConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &TcpTransportConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn listen(&self, addr: SocketAddr) -> Result<Box<dyn Listener>, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (tx, rx) = mpsc::channel(ACCEPT_QUEUE);
        let task = tokio::spawn(accept_loop(listener, Arc::clone(&self.config), tx));
        debug!(%local_addr, "Listening");
        Ok(Box::new(TcpListenerHandle { local_addr, rx, task }))
    }

    async fn dial(&self, addr: &PeerAddress) -> Result<Box<dyn PeerConnection>, TransportError> {
        let target = addr.socket_addr();
        let mut stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(target))
            .await
            .map_err(|_| TransportError::Timeout(format!("connect to {target}")))??;
        stream.set_nodelay(true)?;

        let remote = exchange_node_info(
            &mut stream,
            &self.config.node_info,
            self.config.max_frame_size,
            self.config.handshake_timeout,
        )
        .await?;
        if remote.id != addr.id {
            return Err(TransportError::IdentityMismatch {
                expected: addr.id.to_string(),
                actual: remote.id.to_string(),
            });
        }

        Ok(Box::new(TcpConnection::spawn(
            stream,
            remote,
            target,
            Some(*addr),
            self.config.max_frame_size,
            self.config.write_timeout,
        )))
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: Arc<TcpTransportConfig>,
    tx: mpsc::Sender<Box<dyn PeerConnection>>,
) {
    loop {
        tokio::select! {
            _ = tx.closed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote_addr)) => {
                    let config = Arc::clone(&config);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        match inbound_handshake(stream, remote_addr, &config).await {
                            Ok(conn) => {
                                let _ = tx.send(Box::new(conn)).await;
                            }
                            Err(e) => debug!(%remote_addr, error = %e, "Inbound handshake failed"),
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }
}

async fn inbound_handshake(
    mut stream: TcpStream,
    remote_addr: SocketAddr,
    config: &TcpTransportConfig,
) -> Result<TcpConnection, TransportError> {
    stream.set_nodelay(true)?;
    let remote = exchange_node_info(
        &mut stream,
        &config.node_info,
        config.max_frame_size,
        config.handshake_timeout,
    )
    .await?;
    let listen_addr = remote.listen_peer_address(remote_addr);
    Ok(TcpConnection::spawn(
        stream,
        remote,
        remote_addr,
        listen_addr,
        config.max_frame_size,
        config.write_timeout,
    ))
}

struct TcpListenerHandle {
    local_addr: SocketAddr,
    rx: mpsc::Receiver<Box<dyn PeerConnection>>,
    task: JoinHandle<()>,
}

#[async_trait]
impl Listener for TcpListenerHandle {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn accept(&mut self) -> Result<Box<dyn PeerConnection>, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }
}

impl Drop for TcpListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
