// ------------------------
// --- CLI STOP HANDLER ---
// ------------------------

use super::{HASH_FILE, PID_FILE, STATE_FILE};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::fs::{read_to_string, remove_file};
use std::path::Path;
use std::thread::sleep;
use std::time::{Duration, Instant};

pub enum StopMode {
    NotRunning,
    Stopped,
    ForceKilled,
    Failed,
}

pub fn stop_agent() {
    match terminate_agent() {
        StopMode::NotRunning => println!("stopped: The agent was not running."),
        StopMode::Stopped => println!("stopped: The agent has been stopped."),
        StopMode::ForceKilled => println!("stopped: The agent has been stopped by forced kill."),
        StopMode::Failed => eprintln!(
            "timeout: The agent did not stop within the expected time and the force kill failed."
        ),
    }
}

/// Graceful-then-forceful termination ladder: SIGTERM through the PID
/// file, bounded wait for the agent's own cleanup, SIGKILL fallback.
pub fn terminate_agent() -> StopMode {
    let Some(pid) = read_pid() else {
        return StopMode::NotRunning;
    };

    match kill(pid, Some(Signal::SIGTERM)) {
        Ok(()) => wait_for_cleanup(),
        // The process is already gone; the files are stale leftovers.
        Err(_) => {
            remove_runtime_files();
            StopMode::NotRunning
        }
    }
}

pub fn read_pid() -> Option<Pid> {
    if Path::new(PID_FILE).exists()
        && let Ok(contents) = read_to_string(PID_FILE)
        && let Ok(raw_pid) = contents.trim().parse::<i32>()
    {
        Some(Pid::from_raw(raw_pid))
    } else {
        None
    }
}

/// A cleanly exiting agent removes its own runtime files via its guards;
/// their disappearance is the stop signal.
fn wait_for_cleanup() -> StopMode {
    let wait_start = Instant::now();
    while Path::new(PID_FILE).exists() {
        sleep(Duration::from_millis(25));
        if wait_start.elapsed() > Duration::from_secs(5) {
            return force_kill_agent();
        }
    }
    StopMode::Stopped
}

fn force_kill_agent() -> StopMode {
    if let Some(pid) = read_pid()
        && kill(pid, Some(Signal::SIGKILL)).is_ok()
    {
        remove_runtime_files();
        StopMode::ForceKilled
    } else {
        StopMode::Failed
    }
}

fn remove_runtime_files() {
    let _ = remove_file(PID_FILE);
    let _ = remove_file(HASH_FILE);
    let _ = remove_file(STATE_FILE);
}
