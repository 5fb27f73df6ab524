// ----------------------------------
// --- SIGNALS & HOST SUPERVISION ---
// ----------------------------------

use anyhow::Result;
use nix::libc::c_int;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, kill, sigaction};
use nix::unistd::Pid;
use std::env::var;
use std::sync::atomic::{AtomicBool, Ordering};

static RELOAD_REQUESTED: AtomicBool = AtomicBool::new(false);
static TERMINATE_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_reload(_sig: c_int) {
    RELOAD_REQUESTED.store(true, Ordering::SeqCst);
}

extern "C" fn on_terminate(_sig: c_int) {
    TERMINATE_REQUESTED.store(true, Ordering::SeqCst);
}

/// Install the agent's signal handlers.
///
/// SIGHUP requests a config reload; SIGTERM and SIGINT request
/// termination. The handlers only set a flag each; the serve loop
/// consumes the flags once per iteration. Installed without SA_RESTART so
/// a pending poll returns EINTR and the loop observes the flags promptly
/// instead of sleeping out its full timeout.
pub fn install() -> Result<()> {
    let reload = SigAction::new(
        SigHandler::Handler(on_reload),
        SaFlags::empty(),
        SigSet::empty(),
    );
    let terminate = SigAction::new(
        SigHandler::Handler(on_terminate),
        SaFlags::empty(),
        SigSet::empty(),
    );

    unsafe {
        sigaction(Signal::SIGHUP, &reload)?;
        sigaction(Signal::SIGTERM, &terminate)?;
        sigaction(Signal::SIGINT, &terminate)?;
    }

    Ok(())
}

/// Read-and-clear the reload flag. Each SIGHUP triggers one reload.
pub fn take_reload() -> bool {
    RELOAD_REQUESTED.swap(false, Ordering::SeqCst)
}

/// Whether termination has been requested. Sticky: once set, the agent is
/// on its way out.
pub fn terminate_requested() -> bool {
    TERMINATE_REQUESTED.load(Ordering::SeqCst)
}

// ---------------------------
// --- SUPERVISOR WATCHDOG ---
// ---------------------------

/// Watches the process that supervises this agent, when there is one.
///
/// The supervisor names itself through $HELLOD_SUPERVISOR_PID at spawn
/// time. The serve loop probes it every iteration and bails out
/// immediately if it has disappeared, rather than lingering as an orphan.
pub struct Watchdog {
    supervisor: Option<Pid>,
}

impl Watchdog {
    pub fn from_env() -> Self {
        let supervisor = var("HELLOD_SUPERVISOR_PID")
            .ok()
            .and_then(|raw| raw.trim().parse::<i32>().ok())
            .map(Pid::from_raw);

        Self { supervisor }
    }

    /// Signal 0 probes for existence without delivering anything. With no
    /// supervisor configured this always reports alive.
    pub fn supervisor_alive(&self) -> bool {
        match self.supervisor {
            None => true,
            Some(pid) => kill(pid, None::<Signal>).is_ok(),
        }
    }
}

// -------------
// --- TESTS ---
// -------------

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::raise;
    use nix::unistd::getpid;

    #[test]
    fn test_reload_flag_is_consumed_once() {
        install().expect("install handlers");

        assert!(!take_reload());
        raise(Signal::SIGHUP).expect("raise SIGHUP");
        assert!(take_reload());
        assert!(!take_reload(), "reload flag must clear on read");
    }

    #[test]
    fn test_watchdog_none_is_always_alive() {
        let watchdog = Watchdog { supervisor: None };
        assert!(watchdog.supervisor_alive());
    }

    #[test]
    fn test_watchdog_live_and_dead_pids() {
        let live = Watchdog {
            supervisor: Some(getpid()),
        };
        assert!(live.supervisor_alive());

        // Far above any real pid_max; the probe must come back ESRCH.
        let dead = Watchdog {
            supervisor: Some(Pid::from_raw(999_999_999)),
        };
        assert!(!dead.supervisor_alive());
    }
}
