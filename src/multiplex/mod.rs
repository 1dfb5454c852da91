//! A single portable readiness-poll interface wrapping `epoll` on Linux
//! and `kqueue` on macOS. The two kernel APIs differ in
//! default trigger mode (macOS filters are edge-triggered via
//! `EV_CLEAR`, Linux registrations are level-triggered) and in how
//! write-interest is withdrawn; both asymmetries are preserved here
//! rather than papered over.

use std::fmt;

#[cfg_attr(target_os = "linux", path = "epoll.rs")]
#[cfg_attr(target_os = "macos", path = "kqueue.rs")]
mod sys;

use crate::net::error::{Error, ErrorCode};
use crate::net::tcp::Socket;

/// Desired readiness direction(s) for a registration. Combinable with
/// `|`, matching the C `MULTIPLEX_REGISTER_TYPE_FLAG_{READ,WRITE}` bit
/// layout (`READ = 1`, `WRITE = 2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest(u8);

impl Interest {
    pub const READ: Interest = Interest(0b01);
    pub const WRITE: Interest = Interest(0b10);

    pub fn is_readable(self) -> bool {
        self.0 & Self::READ.0 != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & Self::WRITE.0 != 0
    }
}

impl std::ops::BitOr for Interest {
    type Output = Interest;
    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cookie({})", self.0)
    }
}

/// An opaque value associated with a registration, handed back unchanged
/// on every [`Event`] it produces. Callers
/// typically stash a slab index or a raw pointer's bit pattern here.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Cookie(pub u64);

/// One readiness record produced by [`Multiplex::wait`].
pub struct Event(sys::RawEvent);

impl Event {
    pub fn cookie(&self) -> Cookie {
        sys::event_cookie(&self.0)
    }

    pub fn is_readable(&self) -> bool {
        sys::event_is_readable(&self.0)
    }

    pub fn is_writable(&self) -> bool {
        sys::event_is_writable(&self.0)
    }
}

/// Preallocated storage for a [`Multiplex::wait`] call.
pub struct Events {
    inner: sys::RawEvents,
}

impl Events {
    pub fn with_capacity(capacity: usize) -> Events {
        Events {
            inner: sys::raw_events_with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        sys::raw_events_capacity(&self.inner)
    }

    pub fn len(&self) -> usize {
        sys::raw_events_len(&self.inner)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, idx: usize) -> Option<Event> {
        sys::raw_events_get(&self.inner, idx).map(Event)
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter { events: self, pos: 0 }
    }
}

pub struct Iter<'a> {
    events: &'a Events,
    pos: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let ev = self.events.get(self.pos);
        if ev.is_some() {
            self.pos += 1;
        }
        ev
    }
}

impl<'a> IntoIterator for &'a Events {
    type Item = Event;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// One event-poll fd (kqueue or epoll), resource-tracked identically to
/// a socket fd.
pub struct Multiplex {
    inner: sys::Selector,
}

impl Multiplex {
    /// Allocates kernel readiness-poll state.
    pub fn init() -> Result<Multiplex, Error> {
        Ok(Multiplex {
            inner: sys::Selector::new().map_err(|e| Error::new(ErrorCode::MultiplexInit, e))?,
        })
    }

    /// Idempotently associates `socket` with the readiness directions in
    /// `interest` and `cookie`. A prior registration is replaced (Linux:
    /// `EPOLL_CTL_ADD` retried as `MOD` on `EEXIST`; macOS: `EV_ADD` is
    /// idempotent by contract). Each requested direction becomes a
    /// separate kqueue filter on macOS.
    pub fn register(&self, socket: &Socket, interest: Interest, cookie: Cookie) -> Result<(), Error> {
        self.inner
            .register(socket.fd(), interest, cookie)
            .map_err(|e| Error::new(ErrorCode::Register, e))
    }

    /// Removes write interest while retaining read interest — an
    /// asymmetric operation because outgoing interest is transient
    /// (armed only while there is data to flush) while incoming
    /// interest is steady.
    pub fn unregister_write(&self, socket: &Socket, cookie: Cookie) -> Result<(), Error> {
        self.inner
            .unregister_write(socket.fd(), cookie)
            .map_err(|e| Error::new(ErrorCode::Register, e))
    }

    /// Blocks up to `timeout_ms` (`None` means indefinite, `Some(0)`
    /// means poll-and-return) and returns the number of readiness
    /// records written into `events`.
    pub fn wait(&self, events: &mut Events, timeout_ms: Option<i64>) -> Result<usize, Error> {
        self.inner
            .wait(&mut events.inner, timeout_ms)
            .map_err(|e| Error::new(ErrorCode::MultiplexInit, e))
    }
}
