//! Identity exchange run on every new connection.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use super::codec::{read_frame, write_frame};
use crate::domain::{NodeId, PeerAddress, TransportError};

/// What a node announces about itself when a connection opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node identity.
    pub id: NodeId,
    /// Address the node accepts connections on, `[tcp://]ip:port`.
    pub listen_addr: String,
    /// Network (chain) identifier; peers on other networks are refused.
    pub network: String,
    /// Software version.
    pub version: String,
    /// Human-readable node name.
    pub moniker: String,
}

impl NodeInfo {
    /// Check the remote's announcement against ours.
    pub fn validate_remote(&self, remote: &NodeInfo) -> Result<(), TransportError> {
        if remote.network != self.network {
            return Err(TransportError::NetworkMismatch {
                ours: self.network.clone(),
                theirs: remote.network.clone(),
            });
        }
        if remote.id == self.id {
            return Err(TransportError::Handshake("connected to self".to_string()));
        }
        Ok(())
    }

    /// The announced listen address as a dialable peer address.
    ///
    /// An unspecified IP (`0.0.0.0`, `::`) is replaced by the IP the
    /// connection was observed from. `None` when the announcement does not
    /// parse or names port 0.
    pub fn listen_peer_address(&self, observed: SocketAddr) -> Option<PeerAddress> {
        let raw = self.listen_addr.strip_prefix("tcp://").unwrap_or(&self.listen_addr);
        let announced: SocketAddr = raw.parse().ok()?;
        if announced.port() == 0 {
            return None;
        }
        let ip = if announced.ip().is_unspecified() {
            observed.ip()
        } else {
            announced.ip()
        };
        Some(PeerAddress::new(self.id, ip, announced.port()))
    }
}

/// Send ours, read theirs, validate. Bounded by `timeout`.
pub(crate) async fn exchange_node_info<S>(
    stream: &mut S,
    ours: &NodeInfo,
    max_frame_size: usize,
    timeout: Duration,
) -> Result<NodeInfo, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let exchange = async {
        write_frame(stream, ours, max_frame_size).await?;
        read_frame::<_, NodeInfo>(stream, max_frame_size)
            .await?
            .ok_or_else(|| TransportError::Handshake("closed during handshake".to_string()))
    };

    let remote = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| TransportError::Timeout("handshake".to_string()))??;
    ours.validate_remote(&remote)?;
    Ok(remote)
}
