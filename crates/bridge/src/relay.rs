//! Relay loop: forward merged runner output to the client, line by line.

use tracing::debug;

use crate::runner::RunnerProcess;
use crate::transport::SessionTransport;

/// Forward each output line verbatim to the transport until end-of-stream.
///
/// A transport send failure is completion, not an error: forwarding stops,
/// but the output stream is still drained to end-of-stream so the runner can
/// flush its pipes and exit instead of blocking forever. Returns the number
/// of lines actually delivered.
pub async fn relay<T>(process: &mut RunnerProcess, transport: &mut T) -> usize
where
    T: SessionTransport + ?Sized,
{
    let mut forwarded = 0;
    let mut interrupted = false;
    while let Some(line) = process.next_line().await {
        if interrupted {
            continue;
        }
        match transport.send(&line).await {
            Ok(()) => forwarded += 1,
            Err(e) => {
                debug!("relay interrupted, discarding remaining output: {e}");
                interrupted = true;
            }
        }
    }
    forwarded
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::inputs::InputPair;
    use crate::runner::RunnerConfig;
    use crate::transport::channel_pair;

    fn sh(script: &str) -> RunnerConfig {
        let mut config = RunnerConfig::new("/bin/sh");
        config.args = vec!["-c".to_string(), script.to_string()];
        config
    }

    #[tokio::test]
    async fn relay_forwards_lines_in_order() {
        let (mut transport, mut peer) = channel_pair(16);
        let mut process = RunnerProcess::spawn(&sh("echo L1; echo L2; echo L3")).unwrap();
        drop(process.feed_input(InputPair::from_values("", "")));

        let forwarded = relay(&mut process, &mut transport).await;
        assert_eq!(forwarded, 3);

        assert_eq!(&peer.from_session.recv().await.unwrap()[..], b"L1\n");
        assert_eq!(&peer.from_session.recv().await.unwrap()[..], b"L2\n");
        assert_eq!(&peer.from_session.recv().await.unwrap()[..], b"L3\n");

        process.wait().await.unwrap();
    }

    #[tokio::test]
    async fn relay_survives_a_closed_transport_and_drains_output() {
        let (mut transport, peer) = channel_pair(4);
        drop(peer);

        // More output than the channel would buffer; the runner must still
        // reach end-of-stream and exit.
        let mut process = RunnerProcess::spawn(&sh("i=0; while [ $i -lt 200 ]; do echo line$i; i=$((i+1)); done")).unwrap();
        drop(process.feed_input(InputPair::from_values("", "")));

        let forwarded = relay(&mut process, &mut transport).await;
        assert_eq!(forwarded, 0);
        assert!(process.wait().await.unwrap().success());
    }
}
