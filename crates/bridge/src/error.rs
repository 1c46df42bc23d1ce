//! Error types for the process bridge.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The client disconnected or the transport failed. Terminal for the
    /// session; never reported back over the wire.
    #[error("transport closed")]
    TransportClosed,

    /// The configured runner executable could not be started.
    #[error("cannot start test runner {}: {source}", program.display())]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The runner outlived the configured deadline and was killed.
    #[error("test runner exceeded deadline of {0:?}")]
    RunnerTimeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
