//! Best-effort local browser launch.

use std::process::Command;

use tracing::{debug, warn};

/// Open `url` in a browser. With an explicit `browser` the executable is run
/// directly; otherwise the platform's default opener is used. Failure is
/// logged and swallowed, the server runs fine without a browser.
pub fn open(url: &str, browser: Option<&str>) {
    let mut command = match browser {
        Some(program) => {
            let mut c = Command::new(program);
            c.arg(url);
            c
        }
        None => default_opener(url),
    };

    match command.spawn() {
        Ok(child) => debug!(pid = child.id(), "browser launched for {url}"),
        Err(e) => warn!("could not open browser for {url}: {e}"),
    }
}

#[cfg(target_os = "macos")]
fn default_opener(url: &str) -> Command {
    let mut c = Command::new("open");
    c.arg(url);
    c
}

#[cfg(target_os = "windows")]
fn default_opener(url: &str) -> Command {
    let mut c = Command::new("cmd");
    c.args(["/C", "start", url]);
    c
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn default_opener(url: &str) -> Command {
    let mut c = Command::new("xdg-open");
    c.arg(url);
    c
}
