//! Camera command transport
//!
//! VISCA-over-IP is connectionless and, as used here, unacknowledged: a frame
//! is written to the camera's UDP port and nothing is read back. There is no
//! retry.

use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tracing::{debug, info, trace};

use crate::error::{AppError, Result};

/// Transport seam for motion frames
#[async_trait]
pub trait FrameTransport: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &'static str;

    /// Send one frame to `target`. Best-effort: `Ok` only means the frame left
    /// this process.
    async fn send_frame(&self, target: SocketAddr, frame: &[u8]) -> Result<()>;
}

/// UDP transport with one lazily bound socket per address family
///
/// A socket is created on first send and shared by every camera the process
/// talks to. Sockets are released when the transport is dropped.
pub struct UdpTransport {
    v4: OnceCell<UdpSocket>,
    v6: OnceCell<UdpSocket>,
}

impl UdpTransport {
    pub fn new() -> Self {
        Self {
            v4: OnceCell::new(),
            v6: OnceCell::new(),
        }
    }

    /// Get (creating on first use) the socket for the target's address family
    async fn socket_for(&self, target: &SocketAddr) -> Result<&UdpSocket> {
        let (cell, bind_addr) = match target {
            SocketAddr::V4(_) => (&self.v4, SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))),
            SocketAddr::V6(_) => (&self.v6, SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))),
        };

        cell.get_or_try_init(|| async move {
            let socket = UdpSocket::bind(bind_addr).await.map_err(|e| AppError::Transport {
                target: target.to_string(),
                reason: format!("Failed to bind UDP socket: {}", e),
            })?;
            if let Ok(local) = socket.local_addr() {
                info!("Camera UDP socket bound to {}", local);
            }
            Ok::<_, AppError>(socket)
        })
        .await
    }

    /// Whether a socket has been created yet
    pub fn is_bound(&self) -> bool {
        self.v4.initialized() || self.v6.initialized()
    }
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameTransport for UdpTransport {
    fn name(&self) -> &'static str {
        "udp"
    }

    async fn send_frame(&self, target: SocketAddr, frame: &[u8]) -> Result<()> {
        let socket = self.socket_for(&target).await?;

        trace!("VISCA TX -> {}: {:02X?}", target, frame);
        let sent = socket
            .send_to(frame, target)
            .await
            .map_err(|e| AppError::Transport {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        if sent != frame.len() {
            debug!("Short UDP write to {}: {}/{} bytes", target, sent, frame.len());
        }
        Ok(())
    }
}
