//! Input collection: the fixed two-value handshake.

use bytes::Bytes;

use crate::error::BridgeResult;
use crate::transport::SessionTransport;

/// The two ordered input lines a session collects before launching the
/// runner. Each element carries its trailing line feed; the pair is immutable
/// once collected and is written to the runner's stdin exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPair {
    first: Vec<u8>,
    second: Vec<u8>,
}

impl InputPair {
    /// Read exactly two messages from the transport, in receipt order,
    /// appending a line terminator to each.
    ///
    /// If the transport closes before both values arrive the handshake fails
    /// with [`BridgeError::TransportClosed`](crate::BridgeError::TransportClosed)
    /// and the caller must not launch a process.
    pub async fn collect<T>(transport: &mut T) -> BridgeResult<Self>
    where
        T: SessionTransport + ?Sized,
    {
        let first = terminated(transport.receive().await?);
        let second = terminated(transport.receive().await?);
        Ok(Self { first, second })
    }

    /// Build a pair directly from two values, as collected from a client.
    pub fn from_values(first: impl AsRef<[u8]>, second: impl AsRef<[u8]>) -> Self {
        Self {
            first: terminated(Bytes::copy_from_slice(first.as_ref())),
            second: terminated(Bytes::copy_from_slice(second.as_ref())),
        }
    }

    /// First input line, terminator included.
    pub fn first(&self) -> &[u8] {
        &self.first
    }

    /// Second input line, terminator included.
    pub fn second(&self) -> &[u8] {
        &self.second
    }
}

fn terminated(payload: Bytes) -> Vec<u8> {
    let mut line = payload.to_vec();
    line.push(b'\n');
    line
}
