//! Session orchestration: handshake, launch, relay, finalize.

use std::io;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BridgeError, BridgeResult};
use crate::inputs::InputPair;
use crate::relay::relay;
use crate::runner::{RunnerConfig, RunnerProcess};
use crate::transport::SessionTransport;

/// Sentinel sent after the relay completes; the client must treat its receipt
/// as "no further output will arrive".
pub const FINISHED_MARKER: &str = "=== Test finished ===";

/// The only message sent when the runner executable cannot be started.
pub const SPAWN_ERROR_MESSAGE: &str = "[Error: cannot start test runner]";

/// Sent when a configured deadline expires and the runner is killed.
pub const TIMEOUT_MESSAGE: &str = "[Error: test runner timed out]";

/// One client connection's end-to-end interaction with one spawned runner.
///
/// The session owns its transport and process exclusively; nothing is shared
/// across sessions and no failure here escapes to the host process.
pub struct Session<T: SessionTransport> {
    id: Uuid,
    transport: T,
    config: RunnerConfig,
}

impl<T: SessionTransport> Session<T> {
    pub fn new(transport: T, config: RunnerConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Drive the session to completion.
    ///
    /// Collects the input pair, launches the runner, feeds stdin concurrently
    /// with relaying output, waits for exit, then sends the finalization
    /// marker. The runner is started only after both inputs are in hand; a
    /// transport that closes earlier aborts the session with no process side
    /// effects.
    pub async fn run(mut self) -> BridgeResult<()> {
        let inputs = InputPair::collect(&mut self.transport).await?;
        debug!(session = %self.id, "input pair collected");

        let mut process = match RunnerProcess::spawn(&self.config) {
            Ok(process) => process,
            Err(e) => {
                warn!(session = %self.id, "runner spawn failed: {e}");
                let _ = self.transport.send(SPAWN_ERROR_MESSAGE.as_bytes()).await;
                return Err(e);
            }
        };
        info!(session = %self.id, pid = ?process.id(), "runner started");
        let fed = process.feed_input(inputs);

        match self.config.deadline {
            None => {
                let forwarded = relay(&mut process, &mut self.transport).await;
                self.finalize(process, fed, forwarded).await
            }
            Some(deadline) => {
                let started = Instant::now();
                let relayed =
                    tokio::time::timeout(deadline, relay(&mut process, &mut self.transport)).await;
                match relayed {
                    Ok(forwarded) => {
                        // Closed pipes do not prove exit; reaping stays on
                        // the same clock.
                        let remaining = deadline.saturating_sub(started.elapsed());
                        if tokio::time::timeout(remaining, process.wait())
                            .await
                            .is_err()
                        {
                            return self.expire(process, deadline).await;
                        }
                        self.finalize(process, fed, forwarded).await
                    }
                    Err(_) => self.expire(process, deadline).await,
                }
            }
        }
    }

    async fn expire(
        mut self,
        mut process: RunnerProcess,
        deadline: Duration,
    ) -> BridgeResult<()> {
        warn!(session = %self.id, ?deadline, "runner deadline expired, killing");
        if let Err(e) = process.kill().await {
            warn!(session = %self.id, "failed to kill runner: {e}");
        }
        let _ = process.wait().await;
        let _ = self.transport.send(TIMEOUT_MESSAGE.as_bytes()).await;
        Err(BridgeError::RunnerTimeout(deadline))
    }

    async fn finalize(
        mut self,
        mut process: RunnerProcess,
        fed: oneshot::Receiver<io::Result<()>>,
        forwarded: usize,
    ) -> BridgeResult<()> {
        // Output reached end-of-stream, so the writer task has finished one
        // way or the other; surface its result before reaping the process.
        if let Ok(Err(e)) = fed.await {
            debug!(session = %self.id, "input feed error: {e}");
        }
        match process.wait().await {
            Ok(status) => debug!(session = %self.id, forwarded, ?status, "runner exited"),
            Err(e) => warn!(session = %self.id, "failed to wait on runner: {e}"),
        }
        // A failure here means the client left mid-relay; the process has
        // still been reaped above.
        let _ = self.transport.send(FINISHED_MARKER.as_bytes()).await;
        info!(session = %self.id, "session finalized");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::transport::{channel_pair, ChannelPeer};

    fn sh(script: &str) -> RunnerConfig {
        let mut config = RunnerConfig::new("/bin/sh");
        config.args = vec!["-c".to_string(), script.to_string()];
        config
    }

    async fn drain(peer: &mut ChannelPeer) -> Vec<String> {
        let mut messages = Vec::new();
        while let Some(frame) = peer.from_session.recv().await {
            messages.push(String::from_utf8(frame.to_vec()).unwrap());
        }
        messages
    }

    #[tokio::test]
    async fn echo_scenario_delivers_lines_then_marker() {
        let (transport, mut peer) = channel_pair(16);
        let session = Session::new(
            transport,
            sh("read a; read b; echo \"got: $a\"; echo \"got: $b\""),
        );

        peer.to_session.send(Bytes::from_static(b"3")).await.unwrap();
        peer.to_session.send(Bytes::from_static(b"1")).await.unwrap();

        session.run().await.unwrap();

        assert_eq!(
            drain(&mut peer).await,
            vec![
                "got: 3\n".to_string(),
                "got: 1\n".to_string(),
                FINISHED_MARKER.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn spawn_failure_sends_only_the_diagnostic() {
        let (transport, mut peer) = channel_pair(16);
        let session = Session::new(transport, RunnerConfig::new("/nonexistent/test-runner"));

        peer.to_session.send(Bytes::from_static(b"3")).await.unwrap();
        peer.to_session.send(Bytes::from_static(b"1")).await.unwrap();

        let result = session.run().await;
        assert!(matches!(result, Err(BridgeError::SpawnFailed { .. })));

        assert_eq!(drain(&mut peer).await, vec![SPAWN_ERROR_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn close_after_one_input_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("spawned");

        let (transport, peer) = channel_pair(16);
        let session = Session::new(
            transport,
            sh(&format!("touch {}", marker.display())),
        );

        peer.to_session.send(Bytes::from_static(b"3")).await.unwrap();
        drop(peer);

        let result = session.run().await;
        assert!(matches!(result, Err(BridgeError::TransportClosed)));
        assert!(!marker.exists(), "runner must not be launched");
    }

    #[tokio::test]
    async fn close_before_any_input_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("spawned");

        let (transport, peer) = channel_pair(16);
        let session = Session::new(
            transport,
            sh(&format!("touch {}", marker.display())),
        );
        drop(peer);

        assert!(session.run().await.is_err());
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn marker_is_sent_even_when_runner_produces_no_output() {
        let (transport, mut peer) = channel_pair(16);
        let session = Session::new(transport, sh("true"));

        peer.to_session.send(Bytes::from_static(b"3")).await.unwrap();
        peer.to_session.send(Bytes::from_static(b"1")).await.unwrap();

        session.run().await.unwrap();
        assert_eq!(drain(&mut peer).await, vec![FINISHED_MARKER.to_string()]);
    }

    #[tokio::test]
    async fn partial_trailing_line_never_reaches_the_client() {
        let (transport, mut peer) = channel_pair(16);
        let session = Session::new(transport, sh("printf 'done\\ntrailing'"));

        peer.to_session.send(Bytes::from_static(b"3")).await.unwrap();
        peer.to_session.send(Bytes::from_static(b"1")).await.unwrap();

        session.run().await.unwrap();
        assert_eq!(
            drain(&mut peer).await,
            vec!["done\n".to_string(), FINISHED_MARKER.to_string()]
        );
    }

    #[tokio::test]
    async fn deadline_kills_a_hung_runner() {
        let (transport, mut peer) = channel_pair(16);
        let mut config = sh("sleep 30");
        config.deadline = Some(Duration::from_millis(200));
        let session = Session::new(transport, config);

        peer.to_session.send(Bytes::from_static(b"3")).await.unwrap();
        peer.to_session.send(Bytes::from_static(b"1")).await.unwrap();

        let result = session.run().await;
        assert!(matches!(result, Err(BridgeError::RunnerTimeout(_))));

        assert_eq!(drain(&mut peer).await, vec![TIMEOUT_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn deadline_covers_a_runner_that_hangs_after_closing_its_pipes() {
        let (transport, mut peer) = channel_pair(16);
        // Output reaches end-of-stream, but the process itself lives on.
        let mut config = sh("echo done; exec 1>&- 2>&-; sleep 30");
        config.deadline = Some(Duration::from_millis(200));
        let session = Session::new(transport, config);

        peer.to_session.send(Bytes::from_static(b"3")).await.unwrap();
        peer.to_session.send(Bytes::from_static(b"1")).await.unwrap();

        let result = session.run().await;
        assert!(matches!(result, Err(BridgeError::RunnerTimeout(_))));

        assert_eq!(
            drain(&mut peer).await,
            vec!["done\n".to_string(), TIMEOUT_MESSAGE.to_string()]
        );
    }

    #[tokio::test]
    async fn client_disconnect_mid_relay_still_reaps_the_runner() {
        let (transport, mut peer) = channel_pair(4);
        let session = Session::new(
            transport,
            sh("i=0; while [ $i -lt 100 ]; do echo line$i; i=$((i+1)); done"),
        );
        let running = tokio::spawn(session.run());

        peer.to_session.send(Bytes::from_static(b"3")).await.unwrap();
        peer.to_session.send(Bytes::from_static(b"1")).await.unwrap();

        // Read one line, then walk away.
        let _ = peer.from_session.recv().await.unwrap();
        drop(peer);

        // The session must still complete (process drained and waited on)
        // rather than hang on a full pipe.
        running.await.unwrap().unwrap();
    }
}
