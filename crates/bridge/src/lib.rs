//! Interactive process bridge.
//!
//! Collects a fixed two-line handshake from a client transport, launches the
//! configured test-runner executable, feeds the collected input to its stdin,
//! and relays the merged stdout/stderr back to the client line by line,
//! finishing with a sentinel marker. Each [`Session`] is independent; a failed
//! session never affects the host process or other sessions.

pub mod error;
pub mod inputs;
pub mod relay;
pub mod runner;
pub mod session;
pub mod transport;

pub use error::{BridgeError, BridgeResult};
pub use inputs::InputPair;
pub use relay::relay;
pub use runner::{RunnerConfig, RunnerProcess};
pub use session::{Session, FINISHED_MARKER, SPAWN_ERROR_MESSAGE, TIMEOUT_MESSAGE};
pub use transport::{channel_pair, ChannelPeer, ChannelTransport, SessionTransport};
