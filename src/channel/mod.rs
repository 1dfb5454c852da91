//! An intrusive, unbounded, any-to-any message channel.
//!
//! The queue is a singly linked list of heap-allocated [`Message`] nodes
//! threaded through their own `next` pointer — one allocation per
//! message, no separate node allocation. A `Mutex` serialises all
//! mutation and a `Condvar` wakes blocked receivers, exactly as
//! `channel.c`'s `pthread_mutex_t`/`pthread_cond_t` pair.

use std::sync::{Condvar, Mutex};

/// One heap-allocated queue node. Ownership transfers from producer to
/// channel on [`Channel::send`], and from channel to consumer on
/// [`Channel::recv`] — in safe Rust this is just `Box`
/// ownership, so the channel never has to free anything itself.
pub struct Message<T> {
    pub payload: T,
    next: Option<Box<Message<T>>>,
}

struct State<T> {
    head: Option<Box<Message<T>>>,
    tail: *mut Message<T>,
    closed: bool,
}

// Safety: `tail` only ever points at a node owned by `head`'s chain (or
// is null), and is only read/written under the channel's mutex.
unsafe impl<T: Send> Send for State<T> {}

/// A many-producer/many-consumer FIFO with no capacity bound and no
/// backpressure. Messages sent by a single producer are
/// received in send order; there is no ordering guarantee across
/// producers.
pub struct Channel<T> {
    state: Mutex<State<T>>,
    cond: Condvar,
}

/// Lock/condvar primitive failures are treated as unrecoverable: a
/// poisoned/broken primitive implies the address space is already
/// corrupt, so there is nothing left to recover into. Mirrors
/// `channel.c`'s `perror` + `_exit`.
fn unrecoverable(what: &str) -> ! {
    error!("channel {what} failed: primitive is unusable, aborting process");
    std::process::abort();
}

impl<T> Channel<T> {
    pub fn new() -> Channel<T> {
        Channel {
            state: Mutex::new(State {
                head: None,
                tail: std::ptr::null_mut(),
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Enqueues `payload`, waking exactly one blocked receiver (the
    /// condvar is broadcast to all waiters, but only one will observe a
    /// non-empty head — lock, link, signal, unlock).
    pub fn send(&self, payload: T) {
        let mut node = Box::new(Message { payload, next: None });
        let tail_ptr: *mut Message<T> = &mut *node;

        let mut state = self.state.lock().unwrap_or_else(|_| unrecoverable("lock"));

        if state.tail.is_null() {
            state.head = Some(node);
        } else {
            // Safety: `tail` points into a live node owned by `head`'s
            // chain, valid until the next mutation under this same lock.
            unsafe { (*state.tail).next = Some(node) };
        }
        state.tail = tail_ptr;

        self.cond.notify_all();
    }

    /// Blocks until a message is available or the channel is closed.
    /// Returns `None` only once the channel is closed and fully
    /// drained (an addition over the C original, which has no closed
    /// state — see DESIGN.md).
    pub fn recv(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap_or_else(|_| unrecoverable("lock"));

        loop {
            if let Some(mut node) = state.head.take() {
                state.head = node.next.take();
                if state.head.is_none() {
                    state.tail = std::ptr::null_mut();
                }
                return Some(node.payload);
            }

            if state.closed {
                return None;
            }

            state = self
                .cond
                .wait(state)
                .unwrap_or_else(|_| unrecoverable("wait"));
        }
    }

    /// Advisory, unsynchronised snapshot of "is anything queued right
    /// now" (mirrors `channel.c`'s `channel_pending`).
    pub fn pending(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|_| unrecoverable("lock"));
        state.head.is_some()
    }

    /// Marks the channel closed and wakes every blocked receiver.
    /// `recv` still drains whatever was already queued before returning
    /// `None`; no message is ever dropped by closing.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|_| unrecoverable("lock"));
        state.closed = true;
        self.cond.notify_all();
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Channel<T> {
        Channel::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn single_producer_order_preserved() {
        let channel = Channel::new();
        for i in 1..=1000 {
            channel.send(i);
        }

        let mut seen = Vec::with_capacity(1000);
        for _ in 0..1000 {
            seen.push(channel.recv().unwrap());
        }

        assert_eq!(seen, (1..=1000).collect::<Vec<_>>());
    }

    #[test]
    fn blocking_recv_wakes_on_send() {
        let channel = Arc::new(Channel::new());
        let sender = channel.clone();

        let start = Instant::now();
        let th = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            sender.send(42);
        });

        let got = channel.recv().unwrap();
        assert_eq!(got, 42);
        assert!(start.elapsed() >= Duration::from_millis(90));

        th.join().unwrap();
    }

    #[test]
    fn many_producers_each_preserve_own_order() {
        let channel = Arc::new(Channel::new());
        let mut handles = Vec::new();

        for p in 0usize..4 {
            let ch = channel.clone();
            handles.push(thread::spawn(move || {
                for i in 0..250 {
                    ch.send((p, i));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let mut last_seen = [None; 4];
        for _ in 0..1000 {
            let (p, i) = channel.recv().unwrap();
            if let Some(last) = last_seen[p] {
                assert!(i > last, "producer {p} observed out of order");
            }
            last_seen[p] = Some(i);
        }
    }

    #[test]
    fn close_unblocks_waiting_receiver() {
        let channel = Arc::new(Channel::<i32>::new());
        let closer = channel.clone();

        let th = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            closer.close();
        });

        assert_eq!(channel.recv(), None);
        th.join().unwrap();
    }

    #[test]
    fn pending_reflects_queue_state() {
        let channel = Channel::new();
        assert!(!channel.pending());
        channel.send(1);
        assert!(channel.pending());
        channel.recv().unwrap();
        assert!(!channel.pending());
    }
}
