//! A small portable systems substrate: nonblocking TCP sockets behind one
//! multiplexer interface over `kqueue` (macOS) and `epoll` (Linux), an
//! intrusive any-to-any message channel for handoff between native
//! threads, and an AES-CTR CSPRNG seeded from OS entropy before `main`
//! runs.
//!
//! ## Example
//!
//! ```no_run
//! use anchor_io::multiplex::{Multiplex, Interest, Cookie};
//! use anchor_io::net::tcp::Socket;
//!
//! let (listener, port) = Socket::listen([0, 0, 0, 0], 0, 8).unwrap();
//! println!("listening on port {port}");
//!
//! let mplex = Multiplex::init().unwrap();
//! mplex.register(&listener, Interest::READ, Cookie(0)).unwrap();
//! ```

#[macro_use]
extern crate log;

#[macro_use]
mod macros;

pub mod backtrace;
pub mod channel;
pub mod csprng;
pub mod fdcount;
pub mod multiplex;
pub mod net;
mod sys;

pub use channel::{Channel, Message};
pub use multiplex::{Cookie, Interest, Multiplex};
pub use net::tcp::Socket;
