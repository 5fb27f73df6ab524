// --------------------------
// --- CLI STATUS HANDLER ---
// --------------------------

use super::{PID_FILE, STATE_FILE};
use crate::config::HttpdConfig;
use anyhow::{Result, anyhow};
use std::fs::read_to_string;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

pub fn agent_status() {
    match running_state() {
        Some(state) if probe(state.port).is_ok() => {
            let pretty = serde_json::to_string_pretty(&state).unwrap_or_default();
            println!("running\n\n{pretty}");
        }
        _ => println!("not_running"),
    }
}

/// The effective configuration of the running instance, as recorded in the
/// state file at startup.
pub fn running_state() -> Option<HttpdConfig> {
    if !Path::new(PID_FILE).exists() {
        return None;
    }
    let raw = read_to_string(STATE_FILE).ok()?;
    serde_json::from_str(&raw).ok()
}

/// Connect to the listening port and check for the fixed 200 OK reply.
///
/// The server answers every connection the same way, so any successful
/// exchange is proof of life.
pub fn probe(port: u16) -> Result<()> {
    match TcpStream::connect(("127.0.0.1", port)) {
        Ok(mut stream) => {
            stream.set_read_timeout(Some(Duration::from_secs(2))).ok();
            let _ = stream.write_all(b"GET / HTTP/1.0\r\n\r\n");
            let mut buffer = String::new();
            let _ = stream.read_to_string(&mut buffer);

            if buffer.contains("200 OK") {
                Ok(())
            } else {
                Err(anyhow!("Failed to fetch status"))
            }
        }
        Err(e) => Err(anyhow!("error_sending_status_request: {e}")),
    }
}

// -------------
// --- TESTS ---
// -------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_probe_accepts_hello_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();

        let server = thread::spawn(move || {
            let (mut stream, _addr) = listener.accept().expect("accept");
            let mut buf = [0u8; 2048];
            let _ = stream.read(&mut buf);
            stream
                .write_all(b"HTTP/1.0 200 OK\r\nContent-Length: 12\r\n\r\nHello world!")
                .expect("write reply");
        });

        assert!(probe(port).is_ok());
        server.join().expect("server thread join");
    }

    #[test]
    fn test_probe_fails_with_nothing_listening() {
        // Bind then drop to get a port that is known to be closed.
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        assert!(probe(port).is_err());
    }
}
