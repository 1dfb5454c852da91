use std::io;
use std::mem;
use std::os::unix::io::{AsRawFd, RawFd};

use super::{Cookie, Interest};
use crate::sys::fd::FileDesc;

pub struct Selector {
    kq: FileDesc,
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        let fd = syscall!(kqueue())?;
        Ok(Selector { kq: FileDesc::new(fd) })
    }

    pub fn register(&self, fd: RawFd, interest: Interest, cookie: Cookie) -> io::Result<()> {
        let udata = cookie.0 as usize as *mut libc::c_void;
        let mut changes = [unsafe { mem::zeroed::<libc::kevent>() }; 2];
        let mut n = 0;

        if interest.is_readable() {
            changes[n] = kevent_for(fd, libc::EVFILT_READ, libc::EV_ADD | libc::EV_ENABLE | libc::EV_CLEAR, udata);
            n += 1;
        }
        if interest.is_writable() {
            changes[n] = kevent_for(fd, libc::EVFILT_WRITE, libc::EV_ADD | libc::EV_ENABLE | libc::EV_CLEAR, udata);
            n += 1;
        }

        submit(self.kq.as_raw_fd(), &mut changes[..n])
    }

    pub fn unregister_write(&self, fd: RawFd, _cookie: Cookie) -> io::Result<()> {
        let mut change = [kevent_for(
            fd,
            libc::EVFILT_WRITE,
            libc::EV_DELETE | libc::EV_ENABLE | libc::EV_CLEAR,
            std::ptr::null_mut(),
        )];
        submit(self.kq.as_raw_fd(), &mut change)
    }

    pub fn wait(&self, events: &mut RawEvents, timeout_ms: Option<i64>) -> io::Result<usize> {
        let ts = timeout_ms.map(|ms| libc::timespec {
            tv_sec: (ms / 1000) as libc::time_t,
            tv_nsec: ((ms % 1000) * 1_000_000) as libc::c_long,
        });

        loop {
            let timeout_ptr = ts
                .as_ref()
                .map(|ts| ts as *const libc::timespec)
                .unwrap_or(std::ptr::null());

            let cnt = unsafe {
                libc::kevent(
                    self.kq.as_raw_fd(),
                    std::ptr::null(),
                    0,
                    events.buf.as_mut_ptr(),
                    events.buf.capacity() as i32,
                    timeout_ptr,
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

fn kevent_for(fd: RawFd, filter: i16, flags: u16, udata: *mut libc::c_void) -> libc::kevent {
    libc::kevent {
        ident: fd as usize,
        filter,
        flags,
        fflags: 0,
        data: 0,
        udata,
    }
}

fn submit(kq: RawFd, changes: &mut [libc::kevent]) -> io::Result<()> {
    syscall!(kevent(
        kq,
        changes.as_ptr(),
        changes.len() as i32,
        std::ptr::null_mut(),
        0,
        std::ptr::null()
    ))
    .map(|_| ())
}

pub type RawEvent = libc::kevent;

pub struct RawEvents {
    buf: Vec<libc::kevent>,
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
    Cookie(ev.udata as usize as u64)
}

pub fn event_is_readable(ev: &RawEvent) -> bool {
    ev.filter == libc::EVFILT_READ
}

pub fn event_is_writable(ev: &RawEvent) -> bool {
    ev.filter == libc::EVFILT_WRITE
}
