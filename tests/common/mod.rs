#![allow(dead_code)]

use strand::Result;
use strand::config::ListenerBuilder;
use strand::hive::{Actor, Context, Hive};
use strand::message::{ActorId, Body, ConnectionId, Envelope, directive, field};
use strand::net::Listener;

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

/// Upper bound for any wait in the tests.
pub const WAIT: Duration = Duration::from_secs(5);

pub type Inbox = Rc<RefCell<Vec<Envelope>>>;

/// Handler that keeps every message it receives.
pub struct Recorder {
    inbox: Inbox,
}

impl Actor for Recorder {
    fn handle(&mut self, envelope: &Envelope, _ctx: &mut Context<'_>) -> Result<()> {
        self.inbox.borrow_mut().push(envelope.clone());
        Ok(())
    }
}

pub fn recorder() -> (Recorder, Inbox) {
    let inbox = Inbox::default();
    (
        Recorder {
            inbox: inbox.clone(),
        },
        inbox,
    )
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Messages in `inbox` carrying `directive`, in arrival order.
pub fn received(inbox: &Inbox, directive: &str) -> Vec<Envelope> {
    inbox
        .borrow()
        .iter()
        .filter(|e| e.directive() == directive)
        .cloned()
        .collect()
}

pub fn count(inbox: &Inbox, directive: &str) -> usize {
    inbox
        .borrow()
        .iter()
        .filter(|e| e.directive() == directive)
        .count()
}

/// Connection ids announced to the handler so far.
pub fn announced(inbox: &Inbox) -> Vec<ConnectionId> {
    received(inbox, directive::HANDLE_CONNECTION)
        .iter()
        .filter_map(|e| e.body().connection(field::CONNECTION))
        .collect()
}

/// Concatenation of every `chunk` field received.
pub fn chunks(inbox: &Inbox) -> Vec<u8> {
    received(inbox, directive::HANDLE_CHUNK)
        .iter()
        .filter_map(|e| e.body().bytes(field::CHUNK).map(<[u8]>::to_vec))
        .flatten()
        .collect()
}

/// Spawns a listener bound to an ephemeral localhost port and starts it.
pub fn start_listener(hive: &mut Hive, name: &str, builder: ListenerBuilder) -> (ActorId, SocketAddr) {
    let listener = hive.spawn(name, builder.build());

    hive.send_message(
        &listener,
        directive::START_LISTENING,
        Body::new().with(field::HOST, "127.0.0.1").with(field::PORT, 0),
    );

    let started = hive.run_until(WAIT, |hive| {
        hive.with_actor(&listener, Listener::is_listening)
            .unwrap_or(false)
    });
    assert!(started, "listener did not start");

    let addr = hive
        .with_actor(&listener, Listener::local_addr)
        .flatten()
        .expect("listener has a local address");

    (listener, addr)
}
