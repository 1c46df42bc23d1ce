//! Child process controller: spawn, stdin feed, merged output, lifecycle.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::inputs::InputPair;

/// How many merged output lines may sit unconsumed before the reader tasks
/// apply backpressure to the child's pipes.
const OUTPUT_CHANNEL_CAPACITY: usize = 64;

/// Fixed launch parameters for the test-runner executable.
///
/// Client input never appears here: the collected [`InputPair`] is written to
/// the process's stdin, not passed as arguments.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Path to the runner executable.
    pub program: PathBuf,
    /// Fixed launch arguments.
    pub args: Vec<String>,
    /// Hard deadline for the whole run; the process is killed when it
    /// expires. `None` means a hung runner hangs its session.
    pub deadline: Option<Duration>,
}

impl RunnerConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            deadline: None,
        }
    }
}

/// A running test-runner process.
///
/// stdout and stderr feed one bounded channel, so the caller observes a
/// single ordered stream of lines. Interleaving across the two pipes is
/// whatever the OS delivers; within each pipe, order is preserved.
pub struct RunnerProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    output: mpsc::Receiver<Vec<u8>>,
}

impl RunnerProcess {
    /// Spawn the configured executable with stdin piped and stdout/stderr
    /// merged into the output stream.
    pub fn spawn(config: &RunnerConfig) -> BridgeResult<Self> {
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BridgeError::SpawnFailed {
                program: config.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let (tx, output) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(read_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_lines(stderr, tx));
        }

        Ok(Self {
            child,
            stdin,
            output,
        })
    }

    /// Write both input values in order, then close the sink so the process
    /// sees end-of-input. This is the only write for the process's lifetime.
    ///
    /// The write runs on its own task so the caller can start draining output
    /// immediately (a runner that prints before reading would otherwise
    /// deadlock both pipes). The returned one-shot resolves once the sink has
    /// been closed.
    pub fn feed_input(&mut self, inputs: InputPair) -> oneshot::Receiver<io::Result<()>> {
        let (done_tx, done_rx) = oneshot::channel();
        let Some(mut stdin) = self.stdin.take() else {
            let _ = done_tx.send(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "runner stdin already consumed",
            )));
            return done_rx;
        };
        tokio::spawn(async move {
            let result = async {
                stdin.write_all(inputs.first()).await?;
                stdin.write_all(inputs.second()).await?;
                stdin.shutdown().await
            }
            .await;
            if let Err(ref e) = result {
                // Expected when the runner exits without reading its input.
                debug!("runner input feed ended early: {e}");
            }
            let _ = done_tx.send(result);
        });
        done_rx
    }

    /// Next merged output line, trailing line feed included. `None` once both
    /// pipes have reached end-of-stream.
    pub async fn next_line(&mut self) -> Option<Vec<u8>> {
        self.output.recv().await
    }

    /// Wait for process exit. Call only after output end-of-stream so
    /// buffered lines are not lost.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcibly terminate the process. Used on deadline expiry.
    pub async fn kill(&mut self) -> io::Result<()> {
        self.child.kill().await
    }

    /// OS process id, if the process is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

async fn read_lines<R>(stream: R, tx: mpsc::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                // A read without a trailing line feed is the final partial
                // line of a terminated process; line-oriented relaying drops
                // it.
                if !buf.ends_with(b"\n") {
                    debug!(len = buf.len(), "dropping unterminated trailing output");
                    break;
                }
                if tx.send(buf.clone()).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("runner output read failed: {e}");
                break;
            }
        }
    }
}
