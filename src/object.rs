//! Uniform dispatch over the kernel objects
//!
//! Most callers use the concrete types directly. A host that hands out
//! opaque handles instead stores objects in an [`ObjectTable`] and drives
//! them through the [`Channel`] capability interface.

use bytes::Bytes;
use dashmap::DashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use uuid::Uuid;

use crate::buffer::BufferView;
use crate::drivers::Converter;
use crate::error::{Error, Result};
use crate::network::Socket;
use crate::sync::{Event, Queue};

/// Byte-oriented capability shared by every kernel object
pub trait Channel {
    /// Read up to `maxlen` bytes, blocking as the object's own `read` does
    fn read(&self, maxlen: usize) -> Result<Bytes>;

    /// Write `buf`, returning the number of bytes consumed
    fn write(&self, buf: BufferView<'_>) -> Result<usize>;

    /// Object-specific size: buffered bytes for a queue, mask width for an
    /// event, bytes per frame for a converter and 0 for a socket.
    fn size(&self) -> usize;

    fn close(&self) -> Result<()>;
}

impl Channel for Socket {
    fn read(&self, maxlen: usize) -> Result<Bytes> {
        Ok(self.recv(maxlen)?)
    }

    fn write(&self, buf: BufferView<'_>) -> Result<usize> {
        Ok(self.send(buf)?)
    }

    fn size(&self) -> usize {
        0
    }

    fn close(&self) -> Result<()> {
        Ok(Socket::close(self)?)
    }
}

impl Channel for Queue {
    fn read(&self, maxlen: usize) -> Result<Bytes> {
        Ok(Queue::read(self, maxlen)?)
    }

    fn write(&self, buf: BufferView<'_>) -> Result<usize> {
        Ok(Queue::write(self, buf)?)
    }

    fn size(&self) -> usize {
        Queue::size(self)
    }

    fn close(&self) -> Result<()> {
        Queue::close(self);
        Ok(())
    }
}

impl Channel for Event {
    fn read(&self, maxlen: usize) -> Result<Bytes> {
        Ok(self.read_encoded(maxlen)?)
    }

    fn write(&self, buf: BufferView<'_>) -> Result<usize> {
        let len = buf.len();
        self.write_encoded(buf)?;
        Ok(len)
    }

    fn size(&self) -> usize {
        Event::size(self)
    }

    fn close(&self) -> Result<()> {
        Event::close(self);
        Ok(())
    }
}

impl Channel for Converter {
    fn read(&self, _maxlen: usize) -> Result<Bytes> {
        Err(Error::Io(io::Error::new(
            io::ErrorKind::Unsupported,
            "converters are output only",
        )))
    }

    fn write(&self, buf: BufferView<'_>) -> Result<usize> {
        let len = buf.len();
        self.convert(buf)?;
        Ok(len)
    }

    fn size(&self) -> usize {
        self.lines().len()
    }

    /// Finish any outstanding conversion; the lines are released on drop.
    fn close(&self) -> Result<()> {
        Ok(self.async_wait()?)
    }
}

/// Closed set of objects a table can hold
#[derive(Debug)]
pub enum KernelObject {
    Socket(Socket),
    Queue(Queue),
    Event(Event),
    Converter(Converter),
}

impl KernelObject {
    /// Get a short name for the object type
    pub fn type_name(&self) -> &'static str {
        match self {
            KernelObject::Socket(_) => "socket",
            KernelObject::Queue(_) => "queue",
            KernelObject::Event(_) => "event",
            KernelObject::Converter(_) => "converter",
        }
    }

    fn channel(&self) -> &dyn Channel {
        match self {
            KernelObject::Socket(s) => s,
            KernelObject::Queue(q) => q,
            KernelObject::Event(e) => e,
            KernelObject::Converter(c) => c,
        }
    }
}

impl Channel for KernelObject {
    fn read(&self, maxlen: usize) -> Result<Bytes> {
        self.channel().read(maxlen)
    }

    fn write(&self, buf: BufferView<'_>) -> Result<usize> {
        self.channel().write(buf)
    }

    fn size(&self) -> usize {
        self.channel().size()
    }

    fn close(&self) -> Result<()> {
        self.channel().close()
    }
}

impl From<Socket> for KernelObject {
    fn from(socket: Socket) -> Self {
        KernelObject::Socket(socket)
    }
}

impl From<Queue> for KernelObject {
    fn from(queue: Queue) -> Self {
        KernelObject::Queue(queue)
    }
}

impl From<Event> for KernelObject {
    fn from(event: Event) -> Self {
        KernelObject::Event(event)
    }
}

impl From<Converter> for KernelObject {
    fn from(converter: Converter) -> Self {
        KernelObject::Converter(converter)
    }
}

/// Opaque handle to an object in an [`ObjectTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(Uuid);

impl ObjectId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Concurrent handle table
#[derive(Default)]
pub struct ObjectTable {
    objects: DashMap<ObjectId, Arc<KernelObject>>,
}

impl ObjectTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object and return its handle
    pub fn insert(&self, object: impl Into<KernelObject>) -> ObjectId {
        let object = object.into();
        let id = ObjectId::new();
        tracing::debug!("Registered {} {}", object.type_name(), id);
        self.objects.insert(id, Arc::new(object));
        id
    }

    /// Get a shared handle to a registered object
    pub fn get(&self, id: ObjectId) -> Option<Arc<KernelObject>> {
        self.objects.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Unregister and close the object. Returns `false` for an unknown id.
    ///
    /// The object is freed once the last outstanding `get` handle drops.
    pub fn remove(&self, id: ObjectId) -> Result<bool> {
        match self.objects.remove(&id) {
            Some((_, object)) => {
                tracing::debug!("Removing {} {}", object.type_name(), id);
                object.close()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Get number of registered objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Close and drop every object
    pub fn clear(&self) {
        let ids: Vec<ObjectId> = self.objects.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Err(e) = self.remove(id) {
                tracing::warn!("Closing {} failed: {}", id, e);
            }
        }
    }
}

impl fmt::Debug for ObjectTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectTable")
            .field("objects", &self.objects.len())
            .finish()
    }
}
