use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use super::{Cookie, Interest};
use crate::sys::fd::FileDesc;

pub struct Selector {
    epfd: FileDesc,
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        let fd = syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?;
        Ok(Selector { epfd: FileDesc::new(fd) })
    }

    fn events_for(interest: Interest) -> u32 {
        let mut events = 0u32;
        if interest.is_readable() {
            events |= libc::EPOLLIN as u32;
        }
        if interest.is_writable() {
            events |= libc::EPOLLOUT as u32;
        }
        events
    }

    pub fn register(&self, fd: RawFd, interest: Interest, cookie: Cookie) -> io::Result<()> {
        let mut ev = libc::epoll_event {
            events: Self::events_for(interest),
            u64: cookie.0,
        };

        match syscall!(epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_ADD, fd, &mut ev)) {
            Ok(_) => Ok(()),
            Err(e) if e.raw_os_error() == Some(libc::EEXIST) => {
                syscall!(epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_MOD, fd, &mut ev))
                    .map(|_| ())
            }
            Err(e) => Err(e),
        }
    }

    pub fn unregister_write(&self, fd: RawFd, cookie: Cookie) -> io::Result<()> {
        let mut ev = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: cookie.0,
        };
        syscall!(epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_MOD, fd, &mut ev)).map(|_| ())
    }

    pub fn wait(&self, events: &mut RawEvents, timeout_ms: Option<i64>) -> io::Result<usize> {
        let timeout = timeout_ms
            .map(|ms| ms.clamp(0, libc::c_int::MAX as i64) as libc::c_int)
            .unwrap_or(-1);

        loop {
            let cnt = unsafe {
                libc::epoll_wait(
                    self.epfd.as_raw_fd(),
                    events.buf.as_mut_ptr(),
                    events.buf.capacity() as i32,
                    timeout,
                )
            };
            if cnt < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            unsafe { events.buf.set_len(cnt as usize) };
            return Ok(cnt as usize);
        }
    }
}

pub type RawEvent = libc::epoll_event;

pub struct RawEvents {
    buf: Vec<libc::epoll_event>,
}

pub fn raw_events_with_capacity(capacity: usize) -> RawEvents {
    RawEvents { buf: Vec::with_capacity(capacity) }
}

pub fn raw_events_capacity(events: &RawEvents) -> usize {
    events.buf.capacity()
}

pub fn raw_events_len(events: &RawEvents) -> usize {
    events.buf.len()
}

pub fn raw_events_get(events: &RawEvents, idx: usize) -> Option<RawEvent> {
    events.buf.get(idx).copied()
}

pub fn event_cookie(ev: &RawEvent) -> Cookie {
    Cookie(ev.u64)
}

pub fn event_is_readable(ev: &RawEvent) -> bool {
    ev.events & (libc::EPOLLIN as u32) != 0
}

pub fn event_is_writable(ev: &RawEvent) -> bool {
    ev.events & (libc::EPOLLOUT as u32) != 0
}
