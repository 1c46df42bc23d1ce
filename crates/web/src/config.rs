//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use testwire_bridge::RunnerConfig;

/// Testwire: run a local test-runner executable from the browser.
#[derive(Debug, Clone, Parser)]
#[command(name = "testwire", version, about)]
pub struct WebConfig {
    /// Address to listen on.
    #[arg(long, env = "TESTWIRE_LISTEN_ADDR", default_value = "127.0.0.1:8080")]
    pub listen_addr: SocketAddr,

    /// Directory served as the web root.
    #[arg(long, env = "TESTWIRE_STATIC_DIR", default_value = ".")]
    pub static_dir: PathBuf,

    /// Path to the test-runner executable spawned per session.
    #[arg(long, env = "TESTWIRE_RUNNER", default_value = "./testrunner")]
    pub runner: PathBuf,

    /// Fixed arguments passed to the runner on every launch.
    #[arg(
        long = "runner-arg",
        env = "TESTWIRE_RUNNER_ARGS",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    pub runner_args: Vec<String>,

    /// Kill a runner that has not finished after this many seconds.
    /// Unset means a hung runner hangs its session.
    #[arg(long, env = "TESTWIRE_RUNNER_DEADLINE_SECS")]
    pub runner_deadline_secs: Option<u64>,

    /// Open the default browser at the console URL once the server is up.
    #[arg(long, env = "TESTWIRE_OPEN_BROWSER")]
    pub open_browser: bool,

    /// Browser executable to use instead of the platform default opener.
    #[arg(long, env = "TESTWIRE_BROWSER")]
    pub browser: Option<String>,

    /// Accept WebSocket upgrades and API calls from any origin.
    /// Leave off unless a cross-origin page needs to reach this server.
    #[arg(long, env = "TESTWIRE_ALLOW_ANY_ORIGIN")]
    pub allow_any_origin: bool,
}

impl WebConfig {
    /// Launch parameters for the bridge, fixed for the server's lifetime.
    pub fn runner_config(&self) -> RunnerConfig {
        let mut config = RunnerConfig::new(&self.runner);
        config.args = self.runner_args.clone();
        config.deadline = self.runner_deadline_secs.map(Duration::from_secs);
        config
    }

    /// URL the browser is pointed at.
    pub fn console_url(&self) -> String {
        format!("http://{}/", self.listen_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = WebConfig::parse_from(["testwire"]);
        assert_eq!(cfg.listen_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.static_dir, PathBuf::from("."));
        assert_eq!(cfg.runner, PathBuf::from("./testrunner"));
        assert!(cfg.runner_args.is_empty());
        assert!(cfg.runner_deadline_secs.is_none());
        assert!(!cfg.open_browser);
        assert!(!cfg.allow_any_origin);
    }

    #[test]
    fn runner_config_carries_args_and_deadline() {
        let cfg = WebConfig::parse_from([
            "testwire",
            "--runner",
            "/usr/local/bin/runner",
            "--runner-arg",
            "--fast",
            "--runner-arg",
            "--quiet",
            "--runner-deadline-secs",
            "90",
        ]);
        let runner = cfg.runner_config();
        assert_eq!(runner.program, PathBuf::from("/usr/local/bin/runner"));
        assert_eq!(runner.args, vec!["--fast".to_string(), "--quiet".to_string()]);
        assert_eq!(runner.deadline, Some(Duration::from_secs(90)));
    }

    #[test]
    fn console_url_uses_the_listen_address() {
        let cfg = WebConfig::parse_from(["testwire", "--listen-addr", "127.0.0.1:9000"]);
        assert_eq!(cfg.console_url(), "http://127.0.0.1:9000/");
    }
}
