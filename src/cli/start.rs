// -------------------------
// --- CLI START HANDLER ---
// -------------------------

use super::{HASH_FILE, PID_FILE, STATE_FILE, TMP_DIR};
use crate::{
    cli::{AgentConfig, daemon::start_daemon, status, stop::terminate_agent},
    config::HttpdConfig,
    http_server,
};
use anyhow::Result;
use std::{
    fs::{create_dir_all, read_to_string, remove_file, set_permissions, write},
    os::unix::fs::PermissionsExt,
    path::Path,
    process::{self, exit},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct PidFileGuard;

impl PidFileGuard {
    fn create() -> Result<Self> {
        let pid = process::id();
        write(PID_FILE, format!("{pid}\n"))?;
        Ok(Self)
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        let _ = remove_file(PID_FILE);
    }
}

struct HashFileGuard;

impl HashFileGuard {
    fn create(config: &HttpdConfig) -> Result<Self> {
        let hash = config.hash();
        write(HASH_FILE, format!("{hash}\n"))?;
        Ok(Self)
    }
}

impl Drop for HashFileGuard {
    fn drop(&mut self) {
        let _ = remove_file(HASH_FILE);
    }
}

struct StateFileGuard;

impl StateFileGuard {
    fn create(config: &HttpdConfig) -> Result<Self> {
        let state = serde_json::to_string_pretty(config)?;
        write(STATE_FILE, format!("{state}\n"))?;
        Ok(Self)
    }
}

impl Drop for StateFileGuard {
    fn drop(&mut self) {
        let _ = remove_file(STATE_FILE);
    }
}

enum Preflight {
    AlreadyStarted,
    StartFresh,
}

/// Called when cmd is `daemon` (which is started below).
/// This function detaches the process and runs the agent in the background.
pub fn start_daemon_child(config: AgentConfig) {
    use nix::unistd::setsid;
    // Detach into a new session; ignore any error
    let _ = setsid();
    // Run the agent in the child process (blocking)
    start_proc(config).unwrap_or_else(|e| {
        eprintln!("failed: {e:#}");
        exit(1);
    });
}

/// Called when cmd is `start` or `run`.
/// This function starts the agent in the foreground
/// or spawns the daemon process, after conducting
/// preflight checks.
pub fn start_agent(config: AgentConfig) {
    create_dir_all(TMP_DIR).expect("failed: Failed to create /tmp/hellod directory");

    set_permissions(TMP_DIR, PermissionsExt::from_mode(0o700))
        .expect("failed: Failed to set permissions on /tmp/hellod directory");

    match preflight(&config) {
        Preflight::AlreadyStarted => {
            println!("already_started: The agent is already running with the same configuration.");
        }
        Preflight::StartFresh => if config.start_daemon {
            start_daemon(config)
        } else {
            start_proc(config)
        }
        .unwrap_or_else(|e| {
            eprintln!("failed: {e:#}");
            exit(1);
        }),
    }
}

/// If the agent is already running, compare the config hash
/// to check whether to restart or not.
fn preflight(config: &AgentConfig) -> Preflight {
    if Path::new(PID_FILE).exists()
        && Path::new(HASH_FILE).exists()
        && let Some(running) = status::running_state()
        && status::probe(running.port).is_ok()
        && let new_hash = config.httpd.hash()
        && let Some(prev_hash) = read_to_string(HASH_FILE).ok().map(|s| s.trim().to_string())
        && prev_hash == new_hash
    {
        Preflight::AlreadyStarted
    } else {
        terminate_agent();
        Preflight::StartFresh
    }
}

fn start_proc(config: AgentConfig) -> Result<()> {
    init_tracing();

    // Create the runtime files, and ensure they're deleted on exit.
    // Automatic cleanup is handled by each guard's Drop impl.
    let _pid_guard = PidFileGuard::create()?;
    let _hash_guard = HashFileGuard::create(&config.httpd)?;
    let _state_guard = StateFileGuard::create(&config.httpd)?;

    http_server::start_server(config.httpd)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
