use std::fmt;
use std::io;

/// Stable negative sentinel codes, numbered exactly as the C original's
/// `ERROR_*` defines so callers across language boundaries can
/// pattern-match on a number rather than parse a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    Socket = -1,
    Connect = -2,
    Setsockopt = -3,
    Bind = -4,
    Listen = -5,
    Accept = -6,
    Fcntl = -7,
    Register = -8,
    MultiplexInit = -9,
    Getsockname = -10,
    Eagain = -11,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::Socket => "SOCKET",
            ErrorCode::Connect => "CONNECT",
            ErrorCode::Setsockopt => "SETSOCKOPT",
            ErrorCode::Bind => "BIND",
            ErrorCode::Listen => "LISTEN",
            ErrorCode::Accept => "ACCEPT",
            ErrorCode::Fcntl => "FCNTL",
            ErrorCode::Register => "REGISTER",
            ErrorCode::MultiplexInit => "MULTIPLEX_INIT",
            ErrorCode::Getsockname => "GETSOCKNAME",
            ErrorCode::Eagain => "EAGAIN",
        };
        write!(f, "{name}")
    }
}

/// A recoverable I/O failure, tagged with the stable sentinel from
/// the stable error taxonomy below in addition to the underlying `io::Error`.
#[derive(Debug)]
pub struct Error {
    pub code: ErrorCode,
    pub source: io::Error,
}

impl Error {
    pub(crate) fn new(code: ErrorCode, source: io::Error) -> Error {
        Error { code, source }
    }

    pub fn is_eagain(&self) -> bool {
        self.code == ErrorCode::Eagain
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        e.source
    }
}

pub type Result<T> = std::result::Result<T, Error>;
