//! Process-wide live-fd counter.
//!
//! Every successful fd-producing constructor in `sys`/`net`/`multiplex`
//! increments this; every successful close decrements it. Under the
//! `stats` feature, [`count`] lets tests assert no leaks at teardown
//! (spec invariant: `fd_count == successful constructors - successful
//! closes`). Outside `stats` this is a pair of no-ops so the bookkeeping
//! costs nothing in production builds.

#[cfg(feature = "stats")]
use std::sync::atomic::{AtomicI64, Ordering};

#[cfg(feature = "stats")]
static FD_COUNT: AtomicI64 = AtomicI64::new(0);

#[cfg(feature = "stats")]
pub(crate) fn inc() {
    FD_COUNT.fetch_add(1, Ordering::SeqCst);
}

#[cfg(feature = "stats")]
pub(crate) fn dec() {
    FD_COUNT.fetch_sub(1, Ordering::SeqCst);
}

#[cfg(not(feature = "stats"))]
pub(crate) fn inc() {}

#[cfg(not(feature = "stats"))]
pub(crate) fn dec() {}

/// Number of fds currently live across sockets, pipes and multiplexers
/// created through this crate. Only tracked when built with `--features
/// stats`; returns 0 otherwise.
pub fn count() -> i64 {
    #[cfg(feature = "stats")]
    {
        FD_COUNT.load(Ordering::SeqCst)
    }
    #[cfg(not(feature = "stats"))]
    {
        0
    }
}
