//! BSD-style blocking socket
//!
//! Wraps a `socket2` handle with an explicit lifecycle:
//!
//! ```text
//! Closed <- close() -- Open --bind--> Bound --listen--> Listening --accept--> (new Connected socket)
//!                        |              |
//!                        +---connect----+--> Connected
//! ```
//!
//! Transfers on a connected (or connectionless datagram) socket are
//! best-effort: `send`/`recv` report transient native failures as a zero
//! count, while `recvfrom` and the state transitions raise a distinct
//! [`SocketError`] kind.
//!
//! The native handle sits behind an `Arc` so a blocking call can run without
//! holding the state lock. `close` marks the socket closed and shuts the
//! handle down, which wakes any call blocked on it; that call then fails with
//! `NotInState { state: Closed }`. The descriptor itself is released when the
//! last in-flight call drops its reference.

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket as RawSocket, Type};
use std::io::{self, ErrorKind};
use std::mem::MaybeUninit;
use std::net::Shutdown;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::buffer::{BufferView, BufferViewMut};
use crate::config::SocketConfig;
use crate::constants::MAX_RECV_LEN;
use crate::error::SocketError;
use crate::network::address::Address;

/// Raw family code for IPv4, the only supported family
pub const AF_INET: i32 = 0;
/// Raw type code for stream sockets
pub const SOCK_STREAM: i32 = 0;
/// Raw type code for datagram sockets
pub const SOCK_DGRAM: i32 = 1;
/// Raw type code for raw sockets (never supported)
pub const SOCK_RAW: i32 = 2;

/// Address family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Inet,
    Inet6,
    Unix,
}

impl Family {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            AF_INET => Some(Family::Inet),
            _ => None,
        }
    }
}

/// Socket kind, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Stream,
    Datagram,
}

impl SocketKind {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            SOCK_STREAM => Some(SocketKind::Stream),
            SOCK_DGRAM => Some(SocketKind::Datagram),
            _ => None,
        }
    }

    fn native(self) -> (Type, Protocol) {
        match self {
            SocketKind::Stream => (Type::STREAM, Protocol::TCP),
            SocketKind::Datagram => (Type::DGRAM, Protocol::UDP),
        }
    }
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Closed,
    Open,
    Bound,
    Listening,
    Connected,
}

struct SocketInner {
    state: SocketState,
    handle: Option<Arc<RawSocket>>,
}

/// Transfer counters
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Blocking stream or datagram socket
pub struct Socket {
    kind: SocketKind,
    inner: Mutex<SocketInner>,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl Socket {
    /// Open a new IPv4 socket of the given kind
    pub fn open(kind: SocketKind) -> Result<Self, SocketError> {
        Self::open_in(Family::Inet, kind)
    }

    /// Open a socket in an explicit family; anything but IPv4 is rejected.
    pub fn open_in(family: Family, kind: SocketKind) -> Result<Self, SocketError> {
        if family != Family::Inet {
            return Err(SocketError::UnsupportedFamily);
        }

        let (ty, protocol) = kind.native();
        let raw = RawSocket::new(Domain::IPV4, ty, Some(protocol))
            .map_err(SocketError::OpenFailed)?;

        tracing::debug!("Opened {:?} socket", kind);
        Ok(Self::from_raw_socket(raw, kind, SocketState::Open))
    }

    /// Open from raw family/type codes (`AF_INET`, `SOCK_STREAM`, ...)
    pub fn open_raw(family: i32, kind: i32) -> Result<Self, SocketError> {
        let family = Family::from_raw(family).ok_or(SocketError::UnsupportedFamily)?;
        let kind = SocketKind::from_raw(kind).ok_or_else(|| {
            SocketError::OpenFailed(io::Error::new(
                ErrorKind::Unsupported,
                format!("unsupported socket type {}", kind),
            ))
        })?;
        Self::open_in(family, kind)
    }

    /// Open and apply the configured socket options
    pub fn open_configured(kind: SocketKind, config: &SocketConfig) -> Result<Self, SocketError> {
        let socket = Self::open(kind)?;
        let handle = socket.handle("configure", |_| true)?;
        handle
            .set_reuse_address(config.reuse_address)
            .map_err(SocketError::OpenFailed)?;
        Ok(socket)
    }

    fn from_raw_socket(raw: RawSocket, kind: SocketKind, state: SocketState) -> Self {
        Self {
            kind,
            inner: Mutex::new(SocketInner {
                state,
                handle: Some(Arc::new(raw)),
            }),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    /// Get socket kind
    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    /// Get current lifecycle state
    pub fn state(&self) -> SocketState {
        self.inner.lock().state
    }

    /// Check if the socket has been closed
    pub fn is_closed(&self) -> bool {
        self.state() == SocketState::Closed
    }

    /// Bind to a local address: `Open -> Bound`
    pub fn bind(&self, addr: &Address) -> Result<(), SocketError> {
        let handle = self.handle("bind", |s| s == SocketState::Open)?;

        handle
            .bind(&addr.to_sock_addr())
            .map_err(|e| self.failed_or_closed("bind", e, SocketError::BindFailed))?;

        self.transition(SocketState::Bound);
        tracing::debug!("Socket bound to {}", addr);
        Ok(())
    }

    /// Start accepting connections: `Bound -> Listening` (stream only)
    pub fn listen(&self, backlog: i32) -> Result<(), SocketError> {
        let handle = self.handle("listen", |s| s == SocketState::Bound)?;

        if self.kind != SocketKind::Stream {
            return Err(SocketError::ListenFailed(io::Error::new(
                ErrorKind::Unsupported,
                "listen requires a stream socket",
            )));
        }
        if backlog < 0 {
            return Err(SocketError::ListenFailed(io::Error::new(
                ErrorKind::InvalidInput,
                format!("negative backlog {}", backlog),
            )));
        }

        handle
            .listen(backlog)
            .map_err(|e| self.failed_or_closed("listen", e, SocketError::ListenFailed))?;

        self.transition(SocketState::Listening);
        tracing::debug!("Socket listening (backlog {})", backlog);
        Ok(())
    }

    /// Block until a peer connects and return the connection as a new socket.
    ///
    /// The listener's own state never changes; the peer address is not
    /// reported here (see [`Socket::peer_addr`]).
    pub fn accept(&self) -> Result<Socket, SocketError> {
        let handle = self.handle("accept", |s| s == SocketState::Listening)?;

        let (raw, _peer) = handle
            .accept()
            .map_err(|e| self.failed_or_closed("accept", e, SocketError::AcceptFailed))?;

        tracing::debug!("Accepted connection");
        Ok(Self::from_raw_socket(raw, SocketKind::Stream, SocketState::Connected))
    }

    /// Connect to a remote address.
    ///
    /// Stream sockets block until the connection is established; datagram
    /// sockets just fix their default peer (and may be re-connected).
    pub fn connect(&self, addr: &Address) -> Result<(), SocketError> {
        let kind = self.kind;
        let handle = self.handle("connect", |s| match kind {
            SocketKind::Stream => matches!(s, SocketState::Open | SocketState::Bound),
            SocketKind::Datagram => matches!(
                s,
                SocketState::Open | SocketState::Bound | SocketState::Connected
            ),
        })?;

        handle
            .connect(&addr.to_sock_addr())
            .map_err(|e| self.failed_or_closed("connect", e, SocketError::ConnectFailed))?;

        self.transition(SocketState::Connected);
        tracing::debug!("Socket connected to {}", addr);
        Ok(())
    }

    /// Send as much of `buf` as the stack accepts.
    ///
    /// Native failures are reported as `Ok(0)` so the caller can retry.
    pub fn send<'a>(&self, buf: impl Into<BufferView<'a>>) -> Result<usize, SocketError> {
        let buf = buf.into();
        let handle = self.transfer_handle("send")?;

        match handle.send(&buf) {
            Ok(n) => {
                self.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
                tracing::trace!("Sent {} of {} bytes", n, buf.len());
                Ok(n)
            }
            Err(e) => {
                self.check_closed("send")?;
                tracing::warn!("Socket send failed, reporting 0 bytes: {}", e);
                Ok(0)
            }
        }
    }

    /// Repeat `send` until the whole buffer went out or a send made no
    /// progress. Returns the total accepted.
    pub fn sendall<'a>(&self, buf: impl Into<BufferView<'a>>) -> Result<usize, SocketError> {
        let buf = buf.into();
        let mut total = 0;
        while total < buf.len() {
            let n = self.send(&buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }

    /// Send a datagram to `addr`.
    ///
    /// Transient failures yield `Ok(0)`; anything else is `SendFailed`.
    pub fn sendto<'a>(
        &self,
        buf: impl Into<BufferView<'a>>,
        addr: &Address,
    ) -> Result<usize, SocketError> {
        let buf = buf.into();
        if self.kind != SocketKind::Datagram {
            return Err(SocketError::SendFailed(io::Error::new(
                ErrorKind::Unsupported,
                "sendto requires a datagram socket",
            )));
        }
        let handle = self.transfer_handle("sendto")?;

        match handle.send_to(&buf, &addr.to_sock_addr()) {
            Ok(n) => {
                self.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
                tracing::trace!("Sent {} bytes to {}", n, addr);
                Ok(n)
            }
            Err(e) => {
                self.check_closed("sendto")?;
                if is_transient(&e) {
                    tracing::warn!("Socket sendto to {} failed, reporting 0 bytes: {}", addr, e);
                    Ok(0)
                } else {
                    Err(SocketError::SendFailed(e))
                }
            }
        }
    }

    /// Receive up to `maxlen` bytes.
    ///
    /// An empty result means the peer closed in order or the native read
    /// failed; short reads are never errors. At most [`MAX_RECV_LEN`] bytes
    /// are returned per call.
    pub fn recv(&self, maxlen: usize) -> Result<Bytes, SocketError> {
        let mut buf = BytesMut::zeroed(maxlen.min(MAX_RECV_LEN));
        let n = self.recv_into(BufferViewMut::new(&mut buf))?;
        buf.truncate(n);
        Ok(buf.freeze())
    }

    /// Receive into caller memory, same policy as [`Socket::recv`]
    pub fn recv_into(&self, mut buf: BufferViewMut<'_>) -> Result<usize, SocketError> {
        let handle = self.transfer_handle("recv")?;

        let n = match handle.recv(as_uninit(buf.unfilled_mut())) {
            Ok(n) => n,
            Err(e) => {
                self.check_closed("recv")?;
                tracing::warn!("Socket recv failed, reporting no data: {}", e);
                0
            }
        };
        if n == 0 {
            self.check_closed("recv")?;
        }

        buf.advance(n);
        self.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
        tracing::trace!("Received {} bytes", n);
        Ok(n)
    }

    /// Receive up to `maxlen` bytes together with the sender's address.
    ///
    /// Unlike `recv`, every failure is raised as `ReceiveFailed`, including a
    /// sender address that is not IPv4.
    pub fn recvfrom(&self, maxlen: usize) -> Result<(Bytes, Address), SocketError> {
        let mut buf = BytesMut::zeroed(maxlen.min(MAX_RECV_LEN));
        let (n, addr) = self.recvfrom_into(BufferViewMut::new(&mut buf))?;
        buf.truncate(n);
        Ok((buf.freeze(), addr))
    }

    /// Receive into caller memory, same policy as [`Socket::recvfrom`]
    pub fn recvfrom_into(&self, mut buf: BufferViewMut<'_>) -> Result<(usize, Address), SocketError> {
        let handle = self.transfer_handle("recvfrom")?;

        let (n, from) = handle
            .recv_from(as_uninit(buf.unfilled_mut()))
            .map_err(|e| self.failed_or_closed("recvfrom", e, SocketError::ReceiveFailed))?;
        self.check_closed("recvfrom")?;

        let addr = Address::from_sock_addr(&from).map_err(|e| {
            SocketError::ReceiveFailed(io::Error::new(ErrorKind::InvalidData, e))
        })?;

        buf.advance(n);
        self.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
        tracing::trace!("Received {} bytes from {}", n, addr);
        Ok((n, addr))
    }

    /// Shut down one or both directions of a connected socket without
    /// releasing the handle.
    pub fn shutdown(&self, how: Shutdown) -> Result<(), SocketError> {
        let handle = self.handle("shutdown", |s| s == SocketState::Connected)?;
        handle.shutdown(how).map_err(SocketError::CloseFailed)
    }

    /// Release the native handle. Closing a closed socket is a no-op.
    pub fn close(&self) -> Result<(), SocketError> {
        let handle = {
            let mut inner = self.inner.lock();
            if inner.state == SocketState::Closed {
                tracing::debug!("Socket already closed");
                return Ok(());
            }
            inner.state = SocketState::Closed;
            inner.handle.take()
        };

        if let Some(handle) = handle {
            // Wakes calls blocked on the handle; fails harmlessly when the
            // socket was never connected.
            let _ = handle.shutdown(Shutdown::Both);
        }

        tracing::debug!("Closed {:?} socket", self.kind);
        Ok(())
    }

    /// Get the locally bound address
    pub fn local_addr(&self) -> Result<Address, SocketError> {
        let handle = self.handle("query local address of", |_| true)?;
        let addr = handle.local_addr().map_err(SocketError::BindFailed)?;
        Address::from_sock_addr(&addr)
            .map_err(|e| SocketError::BindFailed(io::Error::new(ErrorKind::InvalidData, e)))
    }

    /// Get the connected peer's address
    pub fn peer_addr(&self) -> Result<Address, SocketError> {
        let handle = self.handle("query peer address of", |s| s == SocketState::Connected)?;
        let addr = handle.peer_addr().map_err(SocketError::ConnectFailed)?;
        Address::from_sock_addr(&addr)
            .map_err(|e| SocketError::ConnectFailed(io::Error::new(ErrorKind::InvalidData, e)))
    }

    /// Get transfer counters
    pub fn stats(&self) -> SocketStats {
        SocketStats {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }

    /// Clone the handle if the current state satisfies `valid`
    fn handle(
        &self,
        operation: &'static str,
        valid: impl FnOnce(SocketState) -> bool,
    ) -> Result<Arc<RawSocket>, SocketError> {
        let inner = self.inner.lock();
        match &inner.handle {
            Some(handle) if valid(inner.state) => Ok(Arc::clone(handle)),
            _ => Err(SocketError::NotInState {
                operation,
                state: inner.state,
            }),
        }
    }

    /// Streams transfer only when connected; datagrams in any open state
    fn transfer_handle(&self, operation: &'static str) -> Result<Arc<RawSocket>, SocketError> {
        let kind = self.kind;
        self.handle(operation, |s| match kind {
            SocketKind::Stream => s == SocketState::Connected,
            SocketKind::Datagram => matches!(
                s,
                SocketState::Open | SocketState::Bound | SocketState::Connected
            ),
        })
    }

    fn transition(&self, to: SocketState) {
        let mut inner = self.inner.lock();
        if inner.state != SocketState::Closed {
            inner.state = to;
        }
    }

    fn check_closed(&self, operation: &'static str) -> Result<(), SocketError> {
        if self.is_closed() {
            return Err(SocketError::NotInState {
                operation,
                state: SocketState::Closed,
            });
        }
        Ok(())
    }

    /// A native failure caused by a concurrent `close` is reported as such
    fn failed_or_closed(
        &self,
        operation: &'static str,
        err: io::Error,
        kind: fn(io::Error) -> SocketError,
    ) -> SocketError {
        match self.check_closed(operation) {
            Err(closed) => closed,
            Ok(()) => kind(err),
        }
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::WouldBlock
            | ErrorKind::Interrupted
            | ErrorKind::TimedOut
            | ErrorKind::ConnectionRefused
    )
}

fn as_uninit(buf: &mut [u8]) -> &mut [MaybeUninit<u8>] {
    // SAFETY: `MaybeUninit<u8>` has the layout of `u8`, the slice is fully
    // initialized, and the socket only ever writes initialized bytes into it.
    unsafe { std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind as Kind;
    use std::thread;
    use std::time::Duration;

    fn listener() -> (Socket, Address) {
        let socket = Socket::open(SocketKind::Stream).unwrap();
        socket.bind(&Address::localhost(0)).unwrap();
        socket.listen(1).unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    fn kind_of(err: SocketError) -> Kind {
        err.kind()
    }

    #[test]
    fn test_open_states() {
        let socket = Socket::open(SocketKind::Stream).unwrap();
        assert_eq!(socket.state(), SocketState::Open);
        assert_eq!(socket.kind(), SocketKind::Stream);

        let socket = Socket::open(SocketKind::Datagram).unwrap();
        assert_eq!(socket.state(), SocketState::Open);
    }

    #[test]
    fn test_unsupported_family() {
        let err = Socket::open_in(Family::Inet6, SocketKind::Stream).unwrap_err();
        assert_eq!(kind_of(err), Kind::UnsupportedFamily);

        let err = Socket::open_raw(10, SOCK_STREAM).unwrap_err();
        assert_eq!(kind_of(err), Kind::UnsupportedFamily);

        let err = Socket::open_raw(AF_INET, SOCK_RAW).unwrap_err();
        assert_eq!(kind_of(err), Kind::OpenFailed);

        let socket = Socket::open_raw(AF_INET, SOCK_DGRAM).unwrap();
        assert_eq!(socket.kind(), SocketKind::Datagram);
    }

    #[test]
    fn test_listen_before_bind_fails() {
        let socket = Socket::open(SocketKind::Stream).unwrap();
        let err = socket.listen(1).unwrap_err();
        assert!(matches!(
            err,
            SocketError::NotInState {
                operation: "listen",
                state: SocketState::Open
            }
        ));
        assert_eq!(socket.state(), SocketState::Open);
    }

    #[test]
    fn test_accept_requires_listening() {
        let socket = Socket::open(SocketKind::Stream).unwrap();
        socket.bind(&Address::localhost(0)).unwrap();
        let err = socket.accept().unwrap_err();
        assert_eq!(kind_of(err), Kind::NotInState);
        assert_eq!(socket.state(), SocketState::Bound);
    }

    #[test]
    fn test_listen_on_datagram_fails() {
        let socket = Socket::open(SocketKind::Datagram).unwrap();
        socket.bind(&Address::localhost(0)).unwrap();
        assert_eq!(kind_of(socket.listen(1).unwrap_err()), Kind::ListenFailed);
    }

    #[test]
    fn test_bind_address_in_use() {
        let (_listener, addr) = listener();
        let other = Socket::open(SocketKind::Stream).unwrap();
        let err = other.bind(&addr).unwrap_err();
        assert_eq!(kind_of(err), Kind::BindFailed);
        assert_eq!(other.state(), SocketState::Open);
    }

    #[test]
    fn test_stream_send_requires_connection() {
        let socket = Socket::open(SocketKind::Stream).unwrap();
        assert_eq!(kind_of(socket.send(b"x").unwrap_err()), Kind::NotInState);
        assert_eq!(kind_of(socket.recv(1).unwrap_err()), Kind::NotInState);
    }

    #[test]
    fn test_ping_over_stream() {
        let (listener, addr) = listener();

        let peer = thread::spawn(move || {
            let client = Socket::open(SocketKind::Stream).unwrap();
            client.connect(&addr).unwrap();
            assert_eq!(client.state(), SocketState::Connected);
            assert_eq!(client.send(b"ping").unwrap(), 4);
            client
        });

        let conn = listener.accept().unwrap();
        assert_eq!(conn.state(), SocketState::Connected);
        assert_eq!(listener.state(), SocketState::Listening);

        let mut received = Vec::new();
        while received.len() < 4 {
            let chunk = conn.recv(4 - received.len()).unwrap();
            assert!(!chunk.is_empty());
            received.extend_from_slice(&chunk);
        }
        assert_eq!(received, b"ping");

        let _client = peer.join().unwrap();
        assert_eq!(conn.stats().bytes_received, 4);
    }

    #[test]
    fn test_accepted_socket_outlives_listener() {
        let (listener, addr) = listener();

        let peer = thread::spawn(move || {
            let client = Socket::open(SocketKind::Stream).unwrap();
            client.connect(&addr).unwrap();
            let reply = client.recv(5).unwrap();
            assert_eq!(&reply[..], b"hello");
        });

        let conn = listener.accept().unwrap();
        listener.close().unwrap();
        assert_eq!(listener.state(), SocketState::Closed);

        assert_eq!(conn.state(), SocketState::Connected);
        assert_eq!(conn.sendall(b"hello").unwrap(), 5);
        peer.join().unwrap();
    }

    #[test]
    fn test_recv_after_orderly_close_is_empty() {
        let (listener, addr) = listener();

        let peer = thread::spawn(move || {
            let client = Socket::open(SocketKind::Stream).unwrap();
            client.connect(&addr).unwrap();
            client.close().unwrap();
        });

        let conn = listener.accept().unwrap();
        peer.join().unwrap();
        assert!(conn.recv(16).unwrap().is_empty());
    }

    #[test]
    fn test_connect_refused() {
        // Grab a free port, then release it so nothing listens there.
        let addr = {
            let (listener, addr) = listener();
            listener.close().unwrap();
            addr
        };
        let client = Socket::open(SocketKind::Stream).unwrap();
        let err = client.connect(&addr).unwrap_err();
        assert_eq!(kind_of(err), Kind::ConnectFailed);
        assert_eq!(client.state(), SocketState::Open);
    }

    #[test]
    fn test_datagram_sendto_recvfrom() {
        let server = Socket::open(SocketKind::Datagram).unwrap();
        server.bind(&Address::localhost(0)).unwrap();
        let server_addr = server.local_addr().unwrap();

        let client = Socket::open(SocketKind::Datagram).unwrap();
        client.bind(&Address::localhost(0)).unwrap();
        let client_addr = client.local_addr().unwrap();

        assert_eq!(client.sendto(b"datagram", &server_addr).unwrap(), 8);

        let (data, from) = server.recvfrom(64).unwrap();
        assert_eq!(&data[..], b"datagram");
        assert_eq!(from, client_addr);
        assert_eq!(from.ip_text(), "127.0.0.1");
    }

    #[test]
    fn test_datagram_connect_then_send() {
        let server = Socket::open(SocketKind::Datagram).unwrap();
        server.bind(&Address::localhost(0)).unwrap();
        let server_addr = server.local_addr().unwrap();

        let client = Socket::open(SocketKind::Datagram).unwrap();
        client.connect(&server_addr).unwrap();
        assert_eq!(client.state(), SocketState::Connected);
        assert_eq!(client.send(b"abc").unwrap(), 3);

        let mut storage = [0u8; 8];
        let n = server.recv_into(BufferViewMut::new(&mut storage)).unwrap();
        assert_eq!(&storage[..n], b"abc");
    }

    #[test]
    fn test_sendto_on_stream_fails() {
        let socket = Socket::open(SocketKind::Stream).unwrap();
        let err = socket.sendto(b"x", &Address::localhost(9)).unwrap_err();
        assert_eq!(kind_of(err), Kind::SendFailed);
    }

    #[test]
    fn test_close_is_idempotent() {
        let socket = Socket::open(SocketKind::Datagram).unwrap();
        socket.close().unwrap();
        socket.close().unwrap();
        assert!(socket.is_closed());

        let err = socket.bind(&Address::localhost(0)).unwrap_err();
        assert!(matches!(
            err,
            SocketError::NotInState {
                state: SocketState::Closed,
                ..
            }
        ));
    }

    #[test]
    fn test_close_unblocks_accept() {
        let (listener, _addr) = listener();
        let listener = Arc::new(listener);

        let blocked = {
            let listener = Arc::clone(&listener);
            thread::spawn(move || listener.accept())
        };

        thread::sleep(Duration::from_millis(50));
        listener.close().unwrap();

        let err = blocked.join().unwrap().unwrap_err();
        assert!(matches!(
            err,
            SocketError::NotInState {
                operation: "accept",
                state: SocketState::Closed
            }
        ));
    }

    #[test]
    fn test_close_unblocks_recvfrom() {
        let socket = Socket::open(SocketKind::Datagram).unwrap();
        socket.bind(&Address::localhost(0)).unwrap();
        let socket = Arc::new(socket);

        let blocked = {
            let socket = Arc::clone(&socket);
            thread::spawn(move || socket.recvfrom(16))
        };

        thread::sleep(Duration::from_millis(50));
        socket.close().unwrap();

        let err = blocked.join().unwrap().unwrap_err();
        assert_eq!(kind_of(err), Kind::NotInState);
    }

    #[test]
    fn test_close_unblocks_stream_recv() {
        let (listener, addr) = listener();
        let client = Socket::open(SocketKind::Stream).unwrap();
        client.connect(&addr).unwrap();
        let _conn = listener.accept().unwrap();
        let client = Arc::new(client);

        let blocked = {
            let client = Arc::clone(&client);
            thread::spawn(move || client.recv(16))
        };

        thread::sleep(Duration::from_millis(50));
        client.close().unwrap();

        let err = blocked.join().unwrap().unwrap_err();
        assert!(matches!(
            err,
            SocketError::NotInState {
                operation: "recv",
                state: SocketState::Closed
            }
        ));
    }

    #[test]
    fn test_listen_on_closed_datagram_reports_state() {
        let socket = Socket::open(SocketKind::Datagram).unwrap();
        socket.close().unwrap();
        let err = socket.listen(1).unwrap_err();
        assert!(matches!(
            err,
            SocketError::NotInState {
                operation: "listen",
                state: SocketState::Closed
            }
        ));
    }

    #[test]
    fn test_huge_maxlen_is_capped() {
        let socket = Socket::open(SocketKind::Datagram).unwrap();
        socket.bind(&Address::localhost(0)).unwrap();
        let addr = socket.local_addr().unwrap();

        socket.sendto(b"first", &addr).unwrap();
        assert_eq!(&socket.recv(usize::MAX).unwrap()[..], b"first");

        socket.sendto(b"second", &addr).unwrap();
        let (data, from) = socket.recvfrom(usize::MAX).unwrap();
        assert_eq!(&data[..], b"second");
        assert_eq!(from, addr);
    }

    #[test]
    fn test_shutdown_write_signals_peer() {
        let (listener, addr) = listener();

        let peer = thread::spawn(move || {
            let client = Socket::open(SocketKind::Stream).unwrap();
            client.connect(&addr).unwrap();
            client.shutdown(Shutdown::Write).unwrap();
            assert_eq!(client.state(), SocketState::Connected);
            client
        });

        let conn = listener.accept().unwrap();
        assert!(conn.recv(8).unwrap().is_empty());
        let _client = peer.join().unwrap();
    }
}
