//! End-to-end scenarios against the public API only.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anchor_io::multiplex::{Cookie, Events, Interest, Multiplex};
use anchor_io::net::tcp::Socket;
use anchor_io::Channel;

fn accept_blocking(listener: &Socket) -> Socket {
    loop {
        match listener.accept() {
            Ok(s) => return s,
            Err(e) if e.is_eagain() => continue,
            Err(e) => panic!("accept failed: {e}"),
        }
    }
}

#[test]
fn ephemeral_port_echo() {
    let (listener, port) = Socket::listen([0, 0, 0, 0], 0, 8).unwrap();
    assert!(port > 0);

    let client = Socket::connect([127, 0, 0, 1], port).unwrap();
    let server = accept_blocking(&listener);

    assert_eq!(client.send(b"ping").unwrap(), 4);

    let mut buf = [0u8; 4];
    let n = loop {
        match server.recv(&mut buf) {
            Ok(n) => break n,
            Err(e) if e.is_eagain() => continue,
            Err(e) => panic!("recv failed: {e}"),
        }
    };
    assert_eq!(n, 4);
    assert_eq!(&buf, b"ping");
}

#[test]
fn would_block_plumbing() {
    let (listener, port) = Socket::listen([0, 0, 0, 0], 0, 8).unwrap();
    let client = Socket::connect([127, 0, 0, 1], port).unwrap();
    let server = accept_blocking(&listener);

    let mut buf = [0u8; 8];
    assert!(server.recv(&mut buf).unwrap_err().is_eagain());

    let mplex = Multiplex::init().unwrap();
    mplex.register(&server, Interest::READ, Cookie(7)).unwrap();

    client.send(b"x").unwrap();

    let mut events = Events::with_capacity(8);
    thread::sleep(Duration::from_millis(20));
    let n = mplex.wait(&mut events, Some(1000)).unwrap();
    assert_eq!(n, 1);

    let ev = events.get(0).unwrap();
    assert!(ev.is_readable());
    assert_eq!(ev.cookie(), Cookie(7));

    assert_eq!(server.recv(&mut buf).unwrap(), 1);
}

#[test]
fn write_interest_toggle() {
    let (listener, port) = Socket::listen([0, 0, 0, 0], 0, 8).unwrap();
    let client = Socket::connect([127, 0, 0, 1], port).unwrap();
    let _server = accept_blocking(&listener);

    let mplex = Multiplex::init().unwrap();
    mplex
        .register(&client, Interest::READ | Interest::WRITE, Cookie(1))
        .unwrap();

    let mut events = Events::with_capacity(8);
    let n = mplex.wait(&mut events, Some(1000)).unwrap();
    assert!((0..n).any(|i| events.get(i).unwrap().is_writable()));

    mplex.unregister_write(&client, Cookie(1)).unwrap();

    let mut events = Events::with_capacity(8);
    let n = mplex.wait(&mut events, Some(50)).unwrap();
    assert_eq!(n, 0, "withdrawing write interest must not spuriously wake");
}

#[test]
fn channel_ordering() {
    let channel = Channel::new();
    for i in 1..=1000 {
        channel.send(i);
    }

    let seen: Vec<i32> = (0..1000).map(|_| channel.recv().unwrap()).collect();
    assert_eq!(seen, (1..=1000).collect::<Vec<_>>());
}

#[test]
fn channel_blocking_wake() {
    let channel = Arc::new(Channel::new());
    let sender = channel.clone();

    let start = Instant::now();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        sender.send("payload");
    });

    let got = channel.recv().unwrap();
    let elapsed = start.elapsed();

    assert_eq!(got, "payload");
    assert!(elapsed >= Duration::from_millis(90));
    assert!(elapsed < Duration::from_secs(2), "recv woke too late: {elapsed:?}");

    handle.join().unwrap();
}

#[cfg(feature = "stats")]
#[test]
fn fd_count_matches_successful_constructors_minus_closes() {
    let before = anchor_io::fdcount::count();

    let (listener, port) = Socket::listen([0, 0, 0, 0], 0, 8).unwrap();
    let client = Socket::connect([127, 0, 0, 1], port).unwrap();
    let server = accept_blocking(&listener);

    assert_eq!(anchor_io::fdcount::count(), before + 3);

    drop(client);
    drop(server);
    drop(listener);

    assert_eq!(anchor_io::fdcount::count(), before);
}
