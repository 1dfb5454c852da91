use std::mem;
use std::os::unix::io::{AsRawFd, RawFd};

use crate::net::error::{Error, ErrorCode, Result};
use crate::sys::fd::FileDesc;

/// A single nonblocking IPv4 TCP socket (listener, client, or accepted
/// connection — there is no separate type per role, exactly as
/// `net.c`'s `SocketHandle` has no role tag).
///
/// Equality is fd equality (`AsRawFd`), matching `socket_handle_eq`.
#[derive(Debug)]
pub struct Socket {
    fd: FileDesc,
}

fn set_nonblocking(fd: &FileDesc) -> Result<()> {
    fd.set_nonblocking(true)
        .map_err(|e| Error::new(ErrorCode::Fcntl, e))
}

fn sockaddr_in(addr: [u8; 4], port: u16) -> libc::sockaddr_in {
    let mut sa: libc::sockaddr_in = unsafe { mem::zeroed() };
    sa.sin_family = libc::AF_INET as libc::sa_family_t;
    sa.sin_port = port.to_be();
    sa.sin_addr.s_addr = u32::from_ne_bytes(addr);
    sa
}

impl Socket {
    /// Opens a TCP connection to `addr:port`. The returned socket is
    /// nonblocking; if setting that flag fails the socket is closed and
    /// `ErrorCode::Fcntl` is returned.
    pub fn connect(addr: [u8; 4], port: u16) -> Result<Socket> {
        let fd = syscall!(socket(libc::AF_INET, libc::SOCK_STREAM, 0))
            .map_err(|e| Error::new(ErrorCode::Socket, e))?;
        let fd = FileDesc::new(fd);

        let sa = sockaddr_in(addr, port);
        let ret = syscall!(connect(
            fd.raw(),
            &sa as *const _ as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t
        ));
        if let Err(e) = ret {
            drop(fd);
            return Err(Error::new(ErrorCode::Connect, e));
        }

        set_nonblocking(&fd)?;

        Ok(Socket { fd })
    }

    /// Binds `INADDR_ANY` on `port` (`addr` is accepted for parity with
    /// the original interface but ignored — see DESIGN.md Open
    /// Questions, carried over verbatim from `net.c`'s `socket_listen`),
    /// sets `SO_REUSEADDR`/`SO_REUSEPORT`, and returns the socket along
    /// with the actual bound port (via `getsockname`, so `port == 0`
    /// allocates an ephemeral port).
    pub fn listen(_addr: [u8; 4], port: u16, backlog: i32) -> Result<(Socket, u16)> {
        let raw = syscall!(socket(libc::AF_INET, libc::SOCK_STREAM, 0))
            .map_err(|e| Error::new(ErrorCode::Socket, e))?;
        let fd = FileDesc::new(raw);

        let opt: libc::c_int = 1;
        for name in [libc::SO_REUSEADDR, libc::SO_REUSEPORT] {
            if let Err(e) = syscall!(setsockopt(
                fd.raw(),
                libc::SOL_SOCKET,
                name,
                &opt as *const _ as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t
            )) {
                drop(fd);
                return Err(Error::new(ErrorCode::Setsockopt, e));
            }
        }

        set_nonblocking(&fd)?;

        let mut sa = sockaddr_in([0, 0, 0, 0], port);
        sa.sin_addr.s_addr = libc::INADDR_ANY;
        if let Err(e) = syscall!(bind(
            fd.raw(),
            &sa as *const _ as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t
        )) {
            drop(fd);
            return Err(Error::new(ErrorCode::Bind, e));
        }

        if let Err(e) = syscall!(listen(fd.raw(), backlog)) {
            drop(fd);
            return Err(Error::new(ErrorCode::Listen, e));
        }

        let mut bound: libc::sockaddr_in = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        if let Err(e) = syscall!(getsockname(
            fd.raw(),
            &mut bound as *mut _ as *mut libc::sockaddr,
            &mut len
        )) {
            drop(fd);
            return Err(Error::new(ErrorCode::Getsockname, e));
        }

        let bound_port = u16::from_be(bound.sin_port);
        Ok((Socket { fd }, bound_port))
    }

    /// Accepts one pending connection, placing it in nonblocking mode.
    /// Distinguishes `ErrorCode::Eagain` ("would block") from a hard
    /// `ErrorCode::Accept` failure.
    pub fn accept(&self) -> Result<Socket> {
        let mut storage: libc::sockaddr_in = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;

        let raw = unsafe {
            libc::accept(
                self.fd.raw(),
                &mut storage as *mut _ as *mut libc::sockaddr,
                &mut len,
            )
        };
        if raw < 0 {
            let err = std::io::Error::last_os_error();
            return if err.kind() == std::io::ErrorKind::WouldBlock {
                Err(Error::new(ErrorCode::Eagain, err))
            } else {
                Err(Error::new(ErrorCode::Accept, err))
            };
        }

        let fd = FileDesc::new(raw);
        set_nonblocking(&fd)?;
        Ok(Socket { fd })
    }

    /// Writes `buf`, mapping `EWOULDBLOCK`/`EAGAIN` to
    /// `ErrorCode::Eagain` rather than a hard error.
    pub fn send(&self, buf: &[u8]) -> Result<usize> {
        let ret = unsafe {
            libc::write(self.fd.raw(), buf.as_ptr() as *const libc::c_void, buf.len())
        };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            return if err.kind() == std::io::ErrorKind::WouldBlock {
                Err(Error::new(ErrorCode::Eagain, err))
            } else {
                Err(Error::new(ErrorCode::Socket, err))
            };
        }
        Ok(ret as usize)
    }

    /// Reads into `buf`. A zero-byte return means the peer performed an
    /// orderly shutdown; `ErrorCode::Eagain` means no data is pending
    /// yet.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let ret =
            unsafe { libc::read(self.fd.raw(), buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            return if err.kind() == std::io::ErrorKind::WouldBlock {
                Err(Error::new(ErrorCode::Eagain, err))
            } else {
                Err(Error::new(ErrorCode::Socket, err))
            };
        }
        Ok(ret as usize)
    }

    /// Half-closes both directions. Independent of `close` — the fd is
    /// still owned and open afterwards.
    pub fn shutdown(&self) -> Result<()> {
        syscall!(shutdown(self.fd.raw(), libc::SHUT_RDWR))
            .map(|_| ())
            .map_err(|e| Error::new(ErrorCode::Socket, e))
    }

    /// Drains a readable fd (this socket or a self-pipe end) until
    /// `EAGAIN`. Returns `Ok(())` once drained; any hard read error is
    /// propagated.
    pub fn clear_pipe(&self) -> Result<()> {
        let mut buf = [0u8; 512];
        loop {
            match self.recv(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(_) => continue,
                Err(e) if e.is_eagain() => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd.raw()
    }

    pub(crate) fn from_fd(fd: FileDesc) -> Socket {
        Socket { fd }
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.raw()
    }
}

impl PartialEq for Socket {
    fn eq(&self, other: &Socket) -> bool {
        self.fd.raw() == other.fd.raw()
    }
}

impl Eq for Socket {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ephemeral_port_echo() {
        let (listener, port) = Socket::listen([0, 0, 0, 0], 0, 8).unwrap();
        assert!(port > 0);

        let client = Socket::connect([127, 0, 0, 1], port).unwrap();

        let server = loop {
            match listener.accept() {
                Ok(s) => break s,
                Err(e) if e.is_eagain() => continue,
                Err(e) => panic!("{e}"),
            }
        };

        assert_eq!(client.send(b"ping").unwrap(), 4);

        let mut buf = [0u8; 4];
        let n = loop {
            match server.recv(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.is_eagain() => continue,
                Err(e) => panic!("{e}"),
            }
        };
        assert_eq!(n, 4);
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn recv_on_empty_nonblocking_socket_is_eagain() {
        let (listener, port) = Socket::listen([0, 0, 0, 0], 0, 8).unwrap();
        let client = Socket::connect([127, 0, 0, 1], port).unwrap();
        let server = loop {
            match listener.accept() {
                Ok(s) => break s,
                Err(e) if e.is_eagain() => continue,
                Err(e) => panic!("{e}"),
            }
        };

        let mut buf = [0u8; 4];
        assert!(server.recv(&mut buf).unwrap_err().is_eagain());

        client.shutdown().unwrap();
        // After peer shutdown, recv eventually observes orderly close (0).
        let n = loop {
            match server.recv(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.is_eagain() => continue,
                Err(e) => panic!("{e}"),
            }
        };
        assert_eq!(n, 0);
    }
}
