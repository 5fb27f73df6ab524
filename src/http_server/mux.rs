// ------------------------------
// --- CONNECTION MULTIPLEXER ---
// ------------------------------

use crate::http_server::response::hello_reply;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::os::fd::AsFd;
use std::time::Duration;
use tracing::{debug, warn};

/// A single read drains at most this many bytes; the payload is discarded
/// either way, so anything the client sends beyond it is simply left unread.
const READ_BUF_SIZE: usize = 2048;

/// Bounds how long a slow client can stall the loop once its slot is
/// serviced. The loop is single-threaded, so without these a stuck peer
/// would hold up every other connection.
const RW_TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

/// Hangup and error conditions count as readable: the slot still gets its
/// one-shot service pass (the read comes back empty or failing, the reply
/// is attempted regardless).
const READY: PollFlags = PollFlags::POLLIN
    .union(PollFlags::POLLHUP)
    .union(PollFlags::POLLERR);

/// Fixed-capacity table of accepted client sockets.
///
/// A slot is either empty or holds one live connection. Slot index has no
/// meaning beyond reuse; claims always go to the first empty slot.
struct SlotTable {
    slots: Vec<Option<TcpStream>>,
}

impl SlotTable {
    fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Store the stream in the first empty slot, or hand it back if the
    /// table is full.
    fn claim(&mut self, stream: TcpStream) -> Result<usize, TcpStream> {
        match self.slots.iter().position(Option::is_none) {
            Some(idx) => {
                self.slots[idx] = Some(stream);
                Ok(idx)
            }
            None => Err(stream),
        }
    }

    /// Remove and return the stream in `idx`, leaving the slot empty.
    fn take(&mut self, idx: usize) -> Option<TcpStream> {
        self.slots[idx].take()
    }

    /// Occupied slots in slot order.
    fn iter_occupied(&self) -> impl Iterator<Item = (usize, &TcpStream)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| Some((idx, slot.as_ref()?)))
    }
}

/// Demultiplexes one listening socket and up to `max_clients` client
/// sockets with a single poll call per iteration.
///
/// The listener and the slot table are owned exclusively by this struct;
/// the whole exchange for a ready slot (read, reply, close) runs to
/// completion inside one iteration, so there is no per-connection state
/// beyond the socket itself.
pub struct Multiplexer {
    listener: TcpListener,
    slots: SlotTable,
    reply: Vec<u8>,
}

impl Multiplexer {
    /// The listener must already be bound, listening, and nonblocking.
    pub fn new(listener: TcpListener, max_clients: usize) -> Self {
        Self {
            listener,
            slots: SlotTable::new(max_clients),
            reply: hello_reply().into_bytes(),
        }
    }

    /// Number of currently open client connections.
    pub fn occupied(&self) -> usize {
        self.slots.occupied()
    }

    /// One demultiplexing pass.
    ///
    /// Waits for readiness on the listener or any occupied slot, accepts at
    /// most one pending connection, then services every slot that polled
    /// ready. Returns on timeout with nothing ready (the idle path) and on
    /// EINTR (a signal woke the wait; the caller rechecks its flags before
    /// the next pass). Operational failures are logged, never raised.
    pub fn poll_once(&mut self, timeout: Duration) {
        let timeout = PollTimeout::from(timeout.as_millis().min(u128::from(u16::MAX)) as u16);

        let mut fds = Vec::with_capacity(1 + self.slots.capacity());
        let mut indices = Vec::with_capacity(self.slots.capacity());

        fds.push(PollFd::new(self.listener.as_fd(), PollFlags::POLLIN));

        for (idx, stream) in self.slots.iter_occupied() {
            indices.push(idx);
            fds.push(PollFd::new(stream.as_fd(), PollFlags::POLLIN));
        }

        let nready = match poll(&mut fds, timeout) {
            Ok(n) => n,
            Err(Errno::EINTR) => return,
            Err(e) => {
                warn!("poll failed: {e}");
                return;
            }
        };

        if nready == 0 {
            return;
        }

        let listener_ready = fds[0].revents().is_some_and(|r| r.intersects(READY));

        // A connection accepted below is deliberately not in this set; it
        // gets serviced once it polls ready on a later pass.
        let ready: Vec<usize> = indices
            .iter()
            .zip(fds[1..].iter())
            .filter(|(_, fd)| fd.revents().is_some_and(|r| r.intersects(READY)))
            .map(|(&idx, _)| idx)
            .collect();

        drop(fds);

        if listener_ready {
            self.accept_pending();
        }

        for idx in ready {
            self.service(idx);
        }
    }

    /// Accept exactly one pending connection into the first empty slot.
    ///
    /// With the table full the connection is still accepted, then closed
    /// immediately with nothing written, so the kernel backlog keeps
    /// draining instead of starving.
    fn accept_pending(&mut self) {
        let (stream, peer) = match self.listener.accept() {
            Ok(pair) => pair,
            // Readiness can be stale; nothing was actually pending.
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => return,
            Err(e) => {
                warn!("accept failed: {e}");
                return;
            }
        };

        stream.set_nodelay(true).ok();
        stream.set_read_timeout(RW_TIMEOUT).ok();
        stream.set_write_timeout(RW_TIMEOUT).ok();

        match self.slots.claim(stream) {
            Ok(idx) => debug!(client = %peer, slot = idx, "accepted"),
            Err(stream) => {
                warn!(client = %peer, "server too busy, dropping connection");
                drop(stream);
            }
        }
    }

    /// One-shot exchange for a ready slot: drain whatever the client sent,
    /// send the fixed reply, close, clear the slot.
    ///
    /// The reply is sent and the connection closed even when the read
    /// failed or returned nothing. A failed write is ignored too; the
    /// client is gone either way.
    fn service(&mut self, idx: usize) {
        let Some(mut stream) = self.slots.take(idx) else {
            return;
        };

        let mut buf = [0u8; READ_BUF_SIZE];
        let _ = stream.read(&mut buf);

        let _ = stream.write_all(&self.reply);
        let _ = stream.flush();
        let _ = stream.shutdown(Shutdown::Both);

        debug!(slot = idx, "serviced");
    }
}

// -------------
// --- TESTS ---
// -------------
