use clap::Parser;
use tracing::info;

use testwire_web::{browser, WebConfig, WebServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = WebConfig::parse();
    info!(
        "starting testwire on http://{} (runner: {})",
        config.listen_addr,
        config.runner.display()
    );

    if config.open_browser {
        let url = config.console_url();
        let browser_bin = config.browser.clone();
        // Give the listener a moment to come up before pointing a browser at it.
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            browser::open(&url, browser_bin.as_deref());
        });
    }

    let addr = config.listen_addr;
    WebServer::new(&config).serve(addr).await
}
