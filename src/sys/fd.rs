use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};

use crate::fdcount;

/// A single owned, non-dup'd file descriptor.
///
/// Unlike `std::fs::File`-backed wrappers, `FileDesc` does not assume the
/// fd is seekable or even a regular file — it is used for sockets, pipe
/// ends and multiplexer fds alike. Closing is explicit in `Drop` so every
/// successful constructor/close pair can be counted (`crate::fdcount`).
#[derive(Debug)]
pub struct FileDesc(RawFd);

impl FileDesc {
    /// Takes ownership of `fd`. The caller must have just created it
    /// successfully; this bumps the live-fd counter under `stats`.
    pub fn new(fd: RawFd) -> Self {
        fdcount::inc();
        FileDesc(fd)
    }

    pub fn raw(&self) -> RawFd {
        self.0
    }

    pub fn try_clone(&self) -> io::Result<FileDesc> {
        let fd = syscall!(fcntl(self.0, libc::F_DUPFD_CLOEXEC, 0))?;
        Ok(FileDesc::new(fd))
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        let flags = syscall!(fcntl(self.0, libc::F_GETFL, 0))?;
        let flags = if nonblocking {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        syscall!(fcntl(self.0, libc::F_SETFL, flags))?;
        Ok(())
    }
}

impl Read for FileDesc {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
}

impl Read for &FileDesc {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = syscall!(read(
            self.0,
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len()
        ))?;
        Ok(n as usize)
    }
}

impl Write for FileDesc {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Write for &FileDesc {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = syscall!(write(
            self.0,
            buf.as_ptr() as *const libc::c_void,
            buf.len()
        ))?;
        Ok(n as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FromRawFd for FileDesc {
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        FileDesc::new(fd)
    }
}

impl AsRawFd for FileDesc {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl IntoRawFd for FileDesc {
    fn into_raw_fd(self) -> RawFd {
        let fd = self.0;
        std::mem::forget(self);
        fd
    }
}

impl Drop for FileDesc {
    fn drop(&mut self) {
        if unsafe { libc::close(self.0) } == 0 {
            fdcount::dec();
        }
    }
}
