//! In-memory duplex byte channels.
//!
//! A [`ByteChannel`] is one endpoint of a point-to-point pipe between two
//! simulated protocol participants. Bytes written to an endpoint are
//! delivered synchronously to the buffer of every attached peer, and the
//! peer announces the arrival to its listeners. Nothing is ever delivered
//! back to the writer.
//!
//! Channels are cheap handles: cloning one yields another handle to the
//! same endpoint. Peers are held weakly, so two endpoints attached to each
//! other do not keep each other alive.
//!
//! # Example
//!
//! ```rust
//! use scriptstate::channel::ByteChannel;
//!
//! let (programmer, device) = ByteChannel::pair();
//! programmer.write(b"boot\n").unwrap();
//!
//! assert!(device.has_complete_line());
//! assert_eq!(device.read_line(), Some(b"boot\n".to_vec()));
//! assert_eq!(programmer.bytes_available(), 0);
//! ```

pub mod matcher;

pub use matcher::contains_pattern;

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;
use uuid::Uuid;

/// Identity of a channel endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(Uuid);

impl ChannelId {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access mode of a channel endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    NotOpen,
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl OpenMode {
    pub fn is_readable(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// Errors reported by channel operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChannelError {
    #[error("Channel {channel} is not open for writing (mode: {mode:?})")]
    NotWritable { channel: ChannelId, mode: OpenMode },
}

/// Notification emitted by a channel to its listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelEvent<'a> {
    /// This endpoint wrote the bytes towards its peers.
    Outgoing(&'a [u8]),
    /// A peer delivered the bytes into this endpoint's buffer.
    Incoming(&'a [u8]),
    /// New bytes are available for reading.
    DataArrived,
}

/// Handle returned by [`ByteChannel::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&ByteChannel, &ChannelEvent<'_>)>;

struct ChannelInner {
    id: ChannelId,
    mode: Cell<OpenMode>,
    buffer: RefCell<VecDeque<u8>>,
    peers: RefCell<Vec<Weak<ChannelInner>>>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener: Cell<u64>,
}

/// One endpoint of an in-memory duplex byte pipe.
#[derive(Clone)]
pub struct ByteChannel {
    inner: Rc<ChannelInner>,
}

impl ByteChannel {
    /// Create an unattached endpoint opened in `mode`.
    pub fn new(mode: OpenMode) -> Self {
        Self {
            inner: Rc::new(ChannelInner {
                id: ChannelId::fresh(),
                mode: Cell::new(mode),
                buffer: RefCell::new(VecDeque::new()),
                peers: RefCell::new(Vec::new()),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
            }),
        }
    }

    /// Create an endpoint that must be opened before use.
    pub fn unopened() -> Self {
        Self::new(OpenMode::NotOpen)
    }

    /// Create two read-write endpoints attached to each other.
    pub fn pair() -> (Self, Self) {
        let a = Self::new(OpenMode::ReadWrite);
        let b = Self::new(OpenMode::ReadWrite);
        a.attach(&b);
        b.attach(&a);
        (a, b)
    }

    pub fn id(&self) -> ChannelId {
        self.inner.id
    }

    pub fn mode(&self) -> OpenMode {
        self.inner.mode.get()
    }

    pub fn open(&self, mode: OpenMode) {
        self.inner.mode.set(mode);
    }

    pub fn is_readable(&self) -> bool {
        self.mode().is_readable()
    }

    pub fn is_writable(&self) -> bool {
        self.mode().is_writable()
    }

    /// Forward every future write on this endpoint to `peer`.
    ///
    /// Attaching an already attached peer has no effect, so each write is
    /// delivered at most once per peer.
    pub fn attach(&self, peer: &ByteChannel) {
        let mut peers = self.inner.peers.borrow_mut();
        peers.retain(|p| p.strong_count() > 0);
        if !links_to(&peers, peer) {
            peers.push(Rc::downgrade(&peer.inner));
        }
    }

    /// Stop forwarding writes to `peer`. Returns whether it was attached.
    pub fn detach(&self, peer: &ByteChannel) -> bool {
        let mut peers = self.inner.peers.borrow_mut();
        let was_attached = links_to(&peers, peer);
        peers.retain(|p| p.upgrade().is_some_and(|p| !Rc::ptr_eq(&p, &peer.inner)));
        was_attached
    }

    /// Whether writes on this endpoint currently reach `peer`.
    pub fn is_attached(&self, peer: &ByteChannel) -> bool {
        links_to(&self.inner.peers.borrow(), peer)
    }

    /// Write `data` to every attached peer, in attachment order.
    ///
    /// Listeners of this endpoint see [`ChannelEvent::Outgoing`] first; each
    /// peer then buffers the bytes and raises [`ChannelEvent::Incoming`] and
    /// [`ChannelEvent::DataArrived`] on its own listeners. An empty write
    /// is accepted and does nothing.
    pub fn write(&self, data: &[u8]) -> Result<usize, ChannelError> {
        if !self.is_writable() {
            return Err(ChannelError::NotWritable {
                channel: self.id(),
                mode: self.mode(),
            });
        }
        if data.is_empty() {
            return Ok(0);
        }

        tracing::trace!(channel = %self.id(), len = data.len(), "channel write");
        self.emit(&ChannelEvent::Outgoing(data));

        let peers: Vec<Rc<ChannelInner>> = self
            .inner
            .peers
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for peer in peers {
            ByteChannel { inner: peer }.deliver(data);
        }
        Ok(data.len())
    }

    fn deliver(&self, data: &[u8]) {
        if !self.is_readable() {
            tracing::warn!(
                channel = %self.id(),
                len = data.len(),
                "dropping data delivered to a channel that is not readable"
            );
            return;
        }
        self.inner.buffer.borrow_mut().extend(data.iter().copied());
        self.emit(&ChannelEvent::Incoming(data));
        self.emit(&ChannelEvent::DataArrived);
    }

    fn emit(&self, event: &ChannelEvent<'_>) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(self, event);
        }
    }

    /// Drain up to `max_len` bytes from the front of the buffer.
    pub fn read(&self, max_len: usize) -> Vec<u8> {
        if !self.is_readable() {
            return Vec::new();
        }
        let mut buffer = self.inner.buffer.borrow_mut();
        let n = max_len.min(buffer.len());
        buffer.drain(..n).collect()
    }

    /// Drain one complete line, including its terminating `\n`.
    pub fn read_line(&self) -> Option<Vec<u8>> {
        if !self.is_readable() {
            return None;
        }
        let mut buffer = self.inner.buffer.borrow_mut();
        let end = buffer.iter().position(|&b| b == b'\n')?;
        Some(buffer.drain(..=end).collect())
    }

    pub fn has_complete_line(&self) -> bool {
        self.is_readable() && self.inner.buffer.borrow().contains(&b'\n')
    }

    pub fn bytes_available(&self) -> usize {
        if self.is_readable() {
            self.inner.buffer.borrow().len()
        } else {
            0
        }
    }

    /// Close the endpoint, discarding unread bytes.
    pub fn close(&self) {
        self.inner.mode.set(OpenMode::NotOpen);
        self.inner.buffer.borrow_mut().clear();
    }

    /// Register a listener for this endpoint's events.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ByteChannel, &ChannelEvent<'_>) + 'static,
    {
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(l, _)| *l != id);
        before != listeners.len()
    }

    /// Whether both handles refer to the same endpoint.
    pub fn same_endpoint(&self, other: &ByteChannel) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

fn links_to(peers: &[Weak<ChannelInner>], peer: &ByteChannel) -> bool {
    peers
        .iter()
        .any(|p| p.upgrade().is_some_and(|p| Rc::ptr_eq(&p, &peer.inner)))
}

impl fmt::Debug for ByteChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteChannel")
            .field("id", &self.id())
            .field("mode", &self.mode())
            .field("buffered", &self.inner.buffer.borrow().len())
            .finish()
    }
}
