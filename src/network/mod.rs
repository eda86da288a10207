//! Network subsystem: addresses and blocking sockets

pub mod address;
pub mod socket;

pub use address::Address;
pub use socket::{Family, Socket, SocketKind, SocketState, SocketStats};
