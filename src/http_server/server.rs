// -------------------
// --- HTTP SERVER ---
// -------------------

use crate::config::{self, HttpdConfig};
use crate::http_server::mux::Multiplexer;
use crate::signals::{self, Watchdog};
use anyhow::Result;
use socket2::{Domain, Protocol, Socket as Socket2, Type};
use std::net::{SocketAddr, TcpListener};
use std::process;
use std::time::Duration;
use tracing::{error, info, warn};

/// The poll wait is bounded so the loop re-checks terminate/reload flags
/// and the supervisor watchdog even with no traffic at all.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Open the listening socket: IPv4 TCP on all interfaces, reusable address,
/// the configured backlog, nonblocking.
///
/// This runs once at startup. Any failure here is unrecoverable and must
/// terminate the owning process; the serve loop itself never touches
/// socket/bind/listen again.
pub fn bind_listener(port: u16, queue_depth: i32) -> Result<TcpListener> {
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let socket = Socket2::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(queue_depth)?;
    let listener: TcpListener = socket.into();
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Run the serving loop until asked to terminate.
///
/// Each iteration consumes the signal flags, probes the supervisor, and
/// runs one multiplexer pass. Operational failures inside a pass are
/// logged and never abort the loop.
pub fn serve(mut config: HttpdConfig) -> Result<()> {
    signals::install()?;
    let watchdog = Watchdog::from_env();

    let listener = bind_listener(config.port, config.queue_depth)?;
    let mut mux = Multiplexer::new(listener, config.max_clients);

    info!(
        port = config.port,
        max_clients = config.max_clients,
        queue_depth = config.queue_depth,
        "httpd listening"
    );

    while !signals::terminate_requested() {
        // Emergency bailout: if the supervising process is gone, so are we.
        if !watchdog.supervisor_alive() {
            error!("supervisor process is gone, exiting");
            process::exit(1);
        }

        if signals::take_reload() {
            reload_config(&mut config);
        }

        mux.poll_once(POLL_TIMEOUT);
    }

    info!(open = mux.occupied(), "terminate requested, shutting down");
    Ok(())
}

/// Re-read the configuration sources on SIGHUP.
///
/// All three listener settings are fixed at startup: the socket is already
/// bound and the slot table sized. A changed value is reported and takes
/// effect on the next restart; the running values stay as they are.
fn reload_config(current: &mut HttpdConfig) {
    let fresh = match config::load() {
        Ok(fresh) => fresh,
        Err(e) => {
            warn!("config reload failed: {e:#}");
            return;
        }
    };

    if fresh == *current {
        info!("config reloaded, no changes");
        return;
    }

    if fresh.port != current.port {
        warn!(
            running = current.port,
            configured = fresh.port,
            "port changed, takes effect on restart"
        );
    }
    if fresh.max_clients != current.max_clients {
        warn!(
            running = current.max_clients,
            configured = fresh.max_clients,
            "max_clients changed, takes effect on restart"
        );
    }
    if fresh.queue_depth != current.queue_depth {
        warn!(
            running = current.queue_depth,
            configured = fresh.queue_depth,
            "queue_depth changed, takes effect on restart"
        );
    }
}

// -------------
// --- TESTS ---
// -------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{ErrorKind, Read, Write};
    use std::net::TcpStream;
    use std::thread::sleep;

    #[test]
    fn test_bind_listener_is_nonblocking() {
        let listener = bind_listener(0, 32).expect("bind");

        // With nothing pending, a nonblocking accept must not hang.
        let err = listener.accept().expect_err("accept should not block");
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }

    #[test]
    fn test_bound_listener_accepts_traffic() {
        let listener = bind_listener(0, 32).expect("bind");
        let port = listener.local_addr().expect("local addr").port();

        let mut client = TcpStream::connect(("127.0.0.1", port)).expect("connect");
        let (mut server_side, _) = loop {
            match listener.accept() {
                Ok(pair) => break pair,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    sleep(Duration::from_millis(10));
                }
                Err(e) => panic!("accept failed: {e}"),
            }
        };

        client.write_all(b"hi").expect("client write");
        let mut buf = [0u8; 2];
        server_side.read_exact(&mut buf).expect("server read");
        assert_eq!(&buf, b"hi");
    }
}
