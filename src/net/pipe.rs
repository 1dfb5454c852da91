use crate::net::error::{Error, ErrorCode};
use crate::net::tcp::Socket;
use crate::sys::fd::FileDesc;

/// Opens a `pipe(2)` pair with both ends nonblocking — the standard
/// mechanism ("self-pipe") by which a thread
/// blocked in `Multiplex::wait` is woken from another thread: register
/// the read end, and have the waking thread write one byte to the write
/// end.
///
/// Returns `(read_end, write_end)`.
pub fn self_pipe() -> Result<(Socket, Socket), Error> {
    let mut fds = [0i32; 2];
    syscall!(pipe(fds.as_mut_ptr())).map_err(|e| Error::new(ErrorCode::Socket, e))?;

    let reader = FileDesc::new(fds[0]);
    let writer = FileDesc::new(fds[1]);

    for fd in [&reader, &writer] {
        fd.set_nonblocking(true)
            .map_err(|e| Error::new(ErrorCode::Fcntl, e))?;
    }

    Ok((Socket::from_fd(reader), Socket::from_fd(writer)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wake_via_self_pipe() {
        let (reader, writer) = self_pipe().unwrap();

        let mut buf = [0u8; 1];
        assert!(reader.recv(&mut buf).unwrap_err().is_eagain());

        writer.send(&[1]).unwrap();
        assert_eq!(reader.recv(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 1);

        reader.clear_pipe().unwrap();
    }
}
