//! Session transport abstraction.
//!
//! A duplex, message-oriented connection to exactly one client. The web
//! frontend implements this for an axum WebSocket; tests and embedders can
//! use the in-memory [`ChannelTransport`].

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{BridgeError, BridgeResult};

/// One client's ordered, duplex message stream.
///
/// `receive` resolves with the next discrete client message, or with
/// [`BridgeError::TransportClosed`] once the peer is gone. `send` delivers one
/// discrete text frame; sending after close fails with the same error, which
/// is not fatal to a process already running.
#[async_trait]
pub trait SessionTransport: Send {
    async fn receive(&mut self) -> BridgeResult<Bytes>;
    async fn send(&mut self, frame: &[u8]) -> BridgeResult<()>;
}

/// In-memory transport backed by bounded channels.
pub struct ChannelTransport {
    incoming: mpsc::Receiver<Bytes>,
    outgoing: mpsc::Sender<Bytes>,
}

/// The far (client) side of a [`ChannelTransport`].
pub struct ChannelPeer {
    pub to_session: mpsc::Sender<Bytes>,
    pub from_session: mpsc::Receiver<Bytes>,
}

/// Build a connected transport/peer pair. Dropping either side of the peer
/// closes the corresponding direction.
pub fn channel_pair(capacity: usize) -> (ChannelTransport, ChannelPeer) {
    let (to_session, incoming) = mpsc::channel(capacity);
    let (outgoing, from_session) = mpsc::channel(capacity);
    (
        ChannelTransport { incoming, outgoing },
        ChannelPeer {
            to_session,
            from_session,
        },
    )
}

#[async_trait]
impl SessionTransport for ChannelTransport {
    async fn receive(&mut self) -> BridgeResult<Bytes> {
        self.incoming
            .recv()
            .await
            .ok_or(BridgeError::TransportClosed)
    }

    async fn send(&mut self, frame: &[u8]) -> BridgeResult<()> {
        self.outgoing
            .send(Bytes::copy_from_slice(frame))
            .await
            .map_err(|_| BridgeError::TransportClosed)
    }
}
