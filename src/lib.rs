//! # Kernel I/O
//!
//! Blocking I/O and synchronization primitives layered over a native kernel:
//! IPv4 sockets, a bounded byte queue, a bitmask event and a DAC converter.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Binding layer (caller / host)                   │
//! │      parses arguments, owns handles, maps error::ErrorKind          │
//! └───────┬───────────────┬───────────────┬───────────────┬─────────────┘
//!         │               │               │               │
//!         │        ┌──────┴───────────────┴──────┐        │
//!         │        │  object::ObjectTable        │        │
//!         │        │  (optional uniform Channel) │        │
//!         │        └──────┬───────────────┬──────┘        │
//!         ▼               ▼               ▼               ▼
//! ┌───────────────┐ ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐
//! │network::Socket│ │ sync::Queue │ │ sync::Event │ │drivers::Converter│
//! │ Open → Bound  │ │ bounded ring│ │ u32 bitmask │ │ 1-2 output lines │
//! │ → Listening   │ │ MPMC, block │ │ set / wait  │ │ sync + async     │
//! │ → Connected   │ │ on full/emp │ │ and clear   │ │ conversion       │
//! └───────┬───────┘ └─────────────┘ └─────────────┘ └────────┬────────┘
//!         │                                                   │
//!         ▼                                                   ▼
//! ┌───────────────┐                                 ┌──────────────────┐
//! │   socket2     │                                 │ DacDriver        │
//! │ (OS sockets)  │                                 │ (SimulatedDac)   │
//! └───────────────┘                                 └──────────────────┘
//! ```
//!
//! Buffers cross every boundary as [`buffer::BufferView`] (read-only) or
//! [`buffer::BufferViewMut`] (caller-owned destination).

pub mod buffer;
pub mod config;
pub mod drivers;
pub mod error;
pub mod network;
pub mod object;
pub mod sync;

pub use buffer::{BufferView, BufferViewMut};
pub use drivers::Converter;
pub use error::{Error, ErrorKind, Result};
pub use network::{Address, Socket, SocketKind, SocketState};
pub use object::{Channel, KernelObject, ObjectId, ObjectTable};
pub use sync::{Event, Queue};

/// Crate-wide constants
pub mod constants {
    /// Converter sample rate when none is given, in Hz
    pub const DEFAULT_SAMPLE_RATE: u32 = 100;

    /// Encoded width of an event mask in bytes
    pub const EVENT_MASK_WIDTH: usize = 4;

    /// Output lines a single converter can drive
    pub const MAX_OUTPUT_LINES: usize = 2;

    /// Queue capacity in bytes when none is configured
    pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

    /// Pending-connection backlog for `listen`
    pub const DEFAULT_BACKLOG: i32 = 1;

    /// Largest buffer a single `recv`/`recvfrom` allocates (max UDP datagram)
    pub const MAX_RECV_LEN: usize = 64 * 1024;
}
