// --------------------------
// --- CLI RELOAD HANDLER ---
// --------------------------

use crate::cli::stop::read_pid;
use nix::sys::signal::{Signal, kill};

/// Ask a running agent to re-read its configuration sources. The agent
/// consumes the SIGHUP on its next loop iteration.
pub fn reload_agent() {
    match read_pid() {
        None => println!("not_running: The agent is not running."),
        Some(pid) => match kill(pid, Some(Signal::SIGHUP)) {
            Ok(()) => println!("reloaded: The agent was asked to re-read its configuration."),
            Err(e) => eprintln!("failed: Could not signal the agent: {e}"),
        },
    }
}
