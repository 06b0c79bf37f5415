mod common;

use common::{WAIT, announced, chunks, count, init_tracing, received, recorder, start_listener};

use strand::config::ListenerBuilder;
use strand::hive::{Actor, Context, Hive};
use strand::message::{Body, Envelope, directive, field};
use strand::net::Listener;
use strand::{Error, Result};

use std::cell::Cell;
use std::collections::HashSet;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

/// Handler answering every chunk with its upper-cased bytes, then closing.
#[derive(Default)]
struct Shouter {
    answered: Rc<Cell<bool>>,
}

impl Actor for Shouter {
    fn handle(&mut self, envelope: &Envelope, ctx: &mut Context<'_>) -> Result<()> {
        if envelope.directive() == directive::HANDLE_CHUNK {
            let connection = envelope.body().require_connection(field::CONNECTION)?;
            let chunk = envelope.body().require_bytes(field::CHUNK)?;

            ctx.reply(
                envelope,
                directive::RESPOND,
                Body::new()
                    .with(field::CONNECTION, connection)
                    .with(field::RESPONSE, chunk.to_ascii_uppercase()),
            );
            self.answered.set(true);
        }
        Ok(())
    }
}

#[test]
fn test_each_accepted_connection_is_announced_once() {
    init_tracing();

    let mut hive = Hive::new();
    let (handler, inbox) = recorder();
    hive.spawn("handler", handler);
    let (listener, addr) = start_listener(&mut hive, "listener", ListenerBuilder::new("handler"));

    let clients: Vec<TcpStream> = (0..3)
        .map(|_| TcpStream::connect(addr).expect("Failed to connect to listener"))
        .collect();

    assert!(hive.run_until(WAIT, |_| announced(&inbox).len() == 3));

    let ids = announced(&inbox);
    let distinct: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(distinct.len(), 3, "connection ids must be distinct");

    hive.with_actor(&listener, |l: &Listener| {
        assert_eq!(l.connection_count(), 3);
        for id in &ids {
            assert!(l.contains(*id));
        }
    })
    .unwrap();

    for envelope in received(&inbox, directive::HANDLE_CONNECTION) {
        assert_eq!(envelope.from().map(|a| a.as_str()), Some("listener"));
        assert!(envelope.body().addr(field::PEER).is_some());
    }

    drop(clients);
}

#[test]
fn test_accepts_at_most_one_connection_per_turn() {
    let mut hive = Hive::new();
    let (handler, inbox) = recorder();
    hive.spawn("handler", handler);
    let (listener, addr) = start_listener(&mut hive, "listener", ListenerBuilder::new("handler"));

    let _clients: Vec<TcpStream> = (0..4)
        .map(|_| TcpStream::connect(addr).expect("Failed to connect to listener"))
        .collect();

    let mut previous = 0;
    let done = hive.run_until(WAIT, |hive| {
        let now = hive
            .with_actor(&listener, Listener::connection_count)
            .unwrap();
        assert!(now <= previous + 1, "accepted {} connections in one turn", now - previous);
        previous = now;
        now == 4
    });

    assert!(done);
    assert!(hive.run_until(WAIT, |_| count(&inbox, directive::HANDLE_CONNECTION) == 4));
}

#[test]
fn test_respond_writes_then_closes() {
    init_tracing();

    let mut hive = Hive::new();
    let (handler, inbox) = recorder();
    hive.spawn("handler", handler);
    let (listener, addr) = start_listener(&mut hive, "listener", ListenerBuilder::new("handler"));

    let mut client = TcpStream::connect(addr).expect("Failed to connect to listener");
    assert!(hive.run_until(WAIT, |_| announced(&inbox).len() == 1));

    let announcement = received(&inbox, directive::HANDLE_CONNECTION).remove(0);
    let id = announced(&inbox)[0];

    hive.reply_to(
        announcement.id(),
        &listener,
        directive::RESPOND,
        Body::new()
            .with(field::CONNECTION, id)
            .with(field::RESPONSE, b"OK"),
    );
    assert!(hive.run_until(WAIT, |hive| {
        !hive.with_actor(&listener, |l: &Listener| l.contains(id)).unwrap()
    }));

    let mut response = Vec::new();
    client
        .read_to_end(&mut response)
        .expect("Failed to read from stream");
    assert_eq!(response, b"OK");

    let again = hive
        .with_actor_mut(&listener, |l: &mut Listener| l.respond(id, b"late"))
        .unwrap();
    assert!(matches!(again, Err(Error::UnknownCorrelation(missing)) if missing == id));
}

#[test]
fn test_respond_to_unknown_connection_is_reported() {
    let mut hive = Hive::new();
    let (handler, _inbox) = recorder();
    hive.spawn("handler", handler);
    let (listener, _addr) = start_listener(&mut hive, "listener", ListenerBuilder::new("handler"));

    hive.send_message(
        &listener,
        directive::RESPOND,
        Body::new()
            .with(field::CONNECTION, strand::message::ConnectionId::new(99))
            .with(field::RESPONSE, b"nobody"),
    );

    assert!(hive.run_until(WAIT, |hive| !hive.failures().is_empty()));
    assert!(matches!(
        hive.failures()[0].error,
        Error::UnknownCorrelation(_)
    ));
    assert!(!hive.is_stopped(&listener));
}

#[test]
fn test_send_keeps_the_entry_until_respond() {
    let mut hive = Hive::new();
    let (handler, inbox) = recorder();
    hive.spawn("handler", handler);
    let (listener, addr) = start_listener(&mut hive, "listener", ListenerBuilder::new("handler"));

    let mut client = TcpStream::connect(addr).expect("Failed to connect to listener");
    assert!(hive.run_until(WAIT, |_| announced(&inbox).len() == 1));
    let id = announced(&inbox)[0];

    hive.with_actor_mut(&listener, |l: &mut Listener| {
        l.send(id, b"first, ").unwrap();
        l.send(id, b"second, ").unwrap();
        assert!(l.contains(id));

        l.respond(id, b"last").unwrap();
        assert!(!l.contains(id));
        assert_eq!(l.connection_count(), 0);
    })
    .unwrap();

    let mut response = String::new();
    client
        .read_to_string(&mut response)
        .expect("Failed to read from stream");
    assert_eq!(response, "first, second, last");
}

#[test]
fn test_close_evicts_the_entry() {
    let mut hive = Hive::new();
    let (handler, inbox) = recorder();
    hive.spawn("handler", handler);
    let (listener, addr) = start_listener(&mut hive, "listener", ListenerBuilder::new("handler"));

    let mut client = TcpStream::connect(addr).expect("Failed to connect to listener");
    assert!(hive.run_until(WAIT, |_| announced(&inbox).len() == 1));
    let id = announced(&inbox)[0];

    hive.send_message(&listener, directive::CLOSE, Body::new().with(field::CONNECTION, id));
    assert!(hive.run_until(WAIT, |hive| {
        hive.with_actor(&listener, Listener::connection_count).unwrap() == 0
    }));

    let mut rest = Vec::new();
    client
        .read_to_end(&mut rest)
        .expect("Failed to read from stream");
    assert!(rest.is_empty());

    let again = hive
        .with_actor_mut(&listener, |l: &mut Listener| l.close(id))
        .unwrap();
    assert!(matches!(again, Err(Error::UnknownCorrelation(_))));
}

#[test]
fn test_inbound_bytes_are_forwarded() {
    let mut hive = Hive::new();
    let (handler, inbox) = recorder();
    hive.spawn("handler", handler);
    let (listener, addr) = start_listener(&mut hive, "listener", ListenerBuilder::new("handler"));

    let mut client = TcpStream::connect(addr).expect("Failed to connect to listener");
    client.write_all(b"ping").expect("Failed to write to stream");
    client
        .shutdown(Shutdown::Write)
        .expect("Failed to shut down stream");

    assert!(hive.run_until(WAIT, |_| count(&inbox, directive::CONNECTION_CLOSED) == 1));

    let id = announced(&inbox)[0];
    assert_eq!(chunks(&inbox), b"ping");

    for envelope in received(&inbox, directive::HANDLE_CHUNK) {
        assert_eq!(envelope.body().connection(field::CONNECTION), Some(id));
    }

    // The peer finished sending, but the entry stays for the response.
    hive.with_actor_mut(&listener, |l: &mut Listener| {
        assert!(l.contains(id));
        l.respond(id, b"pong").unwrap();
    })
    .unwrap();

    let mut response = Vec::new();
    client
        .read_to_end(&mut response)
        .expect("Failed to read from stream");
    assert_eq!(response, b"pong");
}

#[test]
fn test_forwarding_can_be_disabled() {
    let mut hive = Hive::new();
    let (handler, inbox) = recorder();
    hive.spawn("handler", handler);
    let (_listener, addr) = start_listener(
        &mut hive,
        "listener",
        ListenerBuilder::new("handler").forward_reads(false),
    );

    let mut client = TcpStream::connect(addr).expect("Failed to connect to listener");
    client.write_all(b"ignored").expect("Failed to write to stream");

    assert!(hive.run_until(WAIT, |_| announced(&inbox).len() == 1));
    for _ in 0..100 {
        hive.tick();
    }

    assert_eq!(count(&inbox, directive::HANDLE_CHUNK), 0);
}

#[test]
fn test_handler_round_trip() {
    init_tracing();

    let mut hive = Hive::new();
    let shouter = Shouter::default();
    let answered = shouter.answered.clone();
    hive.spawn("shouter", shouter);
    let (listener, addr) = start_listener(&mut hive, "listener", ListenerBuilder::new("shouter"));

    let mut client = TcpStream::connect(addr).expect("Failed to connect to listener");
    client.write_all(b"hello").expect("Failed to write to stream");

    assert!(hive.run_until(WAIT, |hive| {
        answered.get()
            && hive
                .with_actor(&listener, Listener::connection_count)
                .unwrap()
                == 0
    }));
    assert!(hive.failures().is_empty());

    let mut response = Vec::new();
    client
        .read_to_end(&mut response)
        .expect("Failed to read from stream");
    assert_eq!(response, b"HELLO");
}

#[test]
fn test_start_listening_twice_is_rejected() {
    let mut hive = Hive::new();
    let (handler, _inbox) = recorder();
    hive.spawn("handler", handler);
    let (listener, addr) = start_listener(&mut hive, "listener", ListenerBuilder::new("handler"));

    hive.send_message(
        &listener,
        directive::START_LISTENING,
        Body::new().with(field::PORT, 0),
    );
    assert!(hive.run_until(WAIT, |hive| !hive.failures().is_empty()));

    assert!(matches!(hive.failures()[0].error, Error::InvalidArguments(_)));
    assert!(!hive.is_stopped(&listener));
    assert_eq!(
        hive.with_actor(&listener, Listener::local_addr).flatten(),
        Some(addr)
    );
}

#[test]
fn test_unknown_directive_is_rejected() {
    let mut hive = Hive::new();
    let (handler, _inbox) = recorder();
    hive.spawn("handler", handler);
    let (listener, _addr) = start_listener(&mut hive, "listener", ListenerBuilder::new("handler"));

    hive.send_message(&listener, "dance", Body::new());
    assert!(hive.run_until(WAIT, |hive| !hive.failures().is_empty()));

    assert!(matches!(
        &hive.failures()[0].error,
        Error::UnknownDirective { directive, .. } if directive == "dance"
    ));
}

#[test]
fn test_stalled_peer_cannot_hold_the_listener() {
    init_tracing();

    let mut hive = Hive::new();
    let (handler, inbox) = recorder();
    hive.spawn("handler", handler);
    let (listener, addr) = start_listener(
        &mut hive,
        "listener",
        ListenerBuilder::new("handler").write_timeout(Duration::from_millis(200)),
    );

    // Connected, but never reads what it is sent.
    let _stalled = TcpStream::connect(addr).expect("Failed to connect to listener");
    assert!(hive.run_until(WAIT, |_| announced(&inbox).len() == 1));
    let id = announced(&inbox)[0];

    hive.send_message(
        &listener,
        directive::RESPOND,
        Body::new()
            .with(field::CONNECTION, id)
            .with(field::RESPONSE, vec![7u8; 64 * 1024 * 1024]),
    );

    let started = Instant::now();
    assert!(hive.run_until(WAIT, |hive| !hive.failures().is_empty()));
    assert!(started.elapsed() < Duration::from_secs(2));

    assert!(matches!(
        hive.failures()[0].error,
        Error::PeerDisconnected(evicted) if evicted == id
    ));
    assert!(!hive.is_stopped(&listener));
    assert!(!hive.with_actor(&listener, |l: &Listener| l.contains(id)).unwrap());

    // The accept loop keeps going.
    let _next = TcpStream::connect(addr).expect("Failed to connect to listener");
    assert!(hive.run_until(WAIT, |_| announced(&inbox).len() == 2));
}

#[test]
fn test_write_to_departed_peer_evicts_the_entry() {
    init_tracing();

    let mut hive = Hive::new();
    let (handler, inbox) = recorder();
    hive.spawn("handler", handler);
    let (listener, addr) = start_listener(&mut hive, "listener", ListenerBuilder::new("handler"));

    let client = TcpStream::connect(addr).expect("Failed to connect to listener");
    assert!(hive.run_until(WAIT, |_| announced(&inbox).len() == 1));
    let id = announced(&inbox)[0];

    drop(client);

    // The first write after the peer left may still be accepted locally;
    // the peer's reset makes a later one fail.
    let mut outcome = Ok(());
    for _ in 0..100 {
        outcome = hive
            .with_actor_mut(&listener, |l: &mut Listener| l.send(id, b"anyone there?"))
            .unwrap();
        if outcome.is_err() {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }

    assert!(matches!(outcome, Err(Error::PeerDisconnected(gone)) if gone == id));
    hive.with_actor(&listener, |l: &Listener| {
        assert!(!l.contains(id));
        assert_eq!(l.connection_count(), 0);
    })
    .unwrap();
}

#[test]
fn test_send_directive_keeps_the_connection_open() {
    let mut hive = Hive::new();
    let (handler, inbox) = recorder();
    hive.spawn("handler", handler);
    let (listener, addr) = start_listener(&mut hive, "listener", ListenerBuilder::new("handler"));

    let mut client = TcpStream::connect(addr).expect("Failed to connect to listener");
    assert!(hive.run_until(WAIT, |_| announced(&inbox).len() == 1));
    let id = announced(&inbox)[0];

    for part in ["a", "b"] {
        hive.send_message(
            &listener,
            directive::SEND,
            Body::new()
                .with(field::CONNECTION, id)
                .with(field::RESPONSE, part),
        );
    }
    hive.tick();

    assert!(hive.failures().is_empty());
    assert!(hive.with_actor(&listener, |l: &Listener| l.contains(id)).unwrap());

    hive.send_message(
        &listener,
        directive::RESPOND,
        Body::new()
            .with(field::CONNECTION, id)
            .with(field::RESPONSE, "c"),
    );
    hive.tick();

    let mut response = String::new();
    client
        .read_to_string(&mut response)
        .expect("Failed to read from stream");
    assert_eq!(response, "abc");
}
