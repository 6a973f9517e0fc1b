//! Loopback transport and helpers shared by the handshake tests.

#![allow(unused)]

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use dflight::alert::{Alert, AlertDescription, AlertLevel};
use dflight::message::Header;
use dflight::record::{unpack_datagram, Content, ContentType, Packet, RecordLayer};
use dflight::record::{RecordLayerHeader, RECORD_HEADER_LEN};
use dflight::signal::{self, Listener, Notifier};
use dflight::state::ConnectionState;
use dflight::{Certificate, Config, ConfigBuilder, Context, Error, FlightConn};
use dflight::{FragmentBuffer, HandshakeCache, Handshaker};

/// Everything one side sent or was told, shared with the test.
#[derive(Debug, Default)]
pub struct Observed {
    /// Datagrams handed to the wire, dropped ones included.
    pub datagrams: Vec<Vec<u8>>,
    pub dropped: usize,
    pub alerts_sent: Vec<Alert>,
    pub alerts_received: Vec<Alert>,
}

/// One end of an in-memory datagram link.
///
/// Records go out in plaintext. Keys are never installed, so the
/// `should_encrypt` hint of a packet is only honored by its epoch.
pub struct Loopback {
    peer: Sender<Vec<u8>>,
    listener: Listener,
    record_sequence: u64,
    local_epoch: u16,
    session_key: Vec<u8>,
    /// Indexes of `write_packets` calls to lose.
    lost_writes: Vec<usize>,
    pub observed: Arc<Mutex<Observed>>,
}

impl Loopback {
    /// Create a connected client/server pair. Each side's receive path
    /// fills the given cache.
    pub fn pair(client_cache: Arc<HandshakeCache>, server_cache: Arc<HandshakeCache>) -> (Self, Self) {
        let (to_server, server_rx) = mpsc::channel();
        let (to_client, client_rx) = mpsc::channel();

        let client = Loopback::new(to_server, client_rx, client_cache, true);
        let server = Loopback::new(to_client, server_rx, server_cache, false);
        (client, server)
    }

    fn new(
        peer: Sender<Vec<u8>>,
        incoming: Receiver<Vec<u8>>,
        cache: Arc<HandshakeCache>,
        is_client: bool,
    ) -> Self {
        let (notifier, listener) = signal::channel();
        let observed = Arc::new(Mutex::new(Observed::default()));

        let received = observed.clone();
        thread::spawn(move || receive(incoming, cache, notifier, is_client, received));

        Loopback {
            peer,
            listener,
            record_sequence: 0,
            local_epoch: 0,
            session_key: b"127.0.0.1:4444".to_vec(),
            lost_writes: Vec::new(),
            observed,
        }
    }

    /// Lose the writes with these indexes, counting from 0.
    pub fn lose_writes(&mut self, writes: impl IntoIterator<Item = usize>) {
        self.lost_writes.extend(writes);
    }

    pub fn local_epoch(&self) -> u16 {
        self.local_epoch
    }

    fn send(&mut self, datagram: Vec<u8>) {
        let mut observed = self.observed.lock().unwrap();
        let index = observed.datagrams.len();
        observed.datagrams.push(datagram.clone());

        if self.lost_writes.contains(&index) {
            observed.dropped += 1;
            return;
        }

        // The peer going away is not our problem.
        let _ = self.peer.send(datagram);
    }
}

impl FlightConn for Loopback {
    fn notify(&mut self, level: AlertLevel, description: AlertDescription) -> Result<(), Error> {
        let alert = Alert { level, description };
        self.observed.lock().unwrap().alerts_sent.push(alert);

        let mut record = RecordLayer::new(Content::Alert(alert)).with_epoch(self.local_epoch);
        record.header.sequence_number = self.record_sequence;
        self.record_sequence += 1;

        let _ = self.peer.send(record.to_bytes());
        Ok(())
    }

    fn write_packets(
        &mut self,
        ctx: &Context,
        packets: &[Packet],
        _state: &ConnectionState,
    ) -> Result<(), Error> {
        ctx.check()?;

        let mut datagram = Vec::new();
        for packet in packets {
            if packet.reset_local_sequence_number {
                self.record_sequence = 0;
            }
            let mut record = packet.record.clone();
            record.header.sequence_number = self.record_sequence;
            self.record_sequence += 1;
            record.serialize(&mut datagram);
        }

        self.send(datagram);
        Ok(())
    }

    fn recv_handshake(&self) -> &Listener {
        &self.listener
    }

    fn set_local_epoch(&mut self, epoch: u16) {
        self.local_epoch = epoch;
    }

    fn handle_queued_packets(
        &mut self,
        _ctx: &Context,
        _state: &ConnectionState,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn session_key(&self) -> Vec<u8> {
        self.session_key.clone()
    }
}

/// The receive path: reassemble handshake messages, cache them and wake
/// the driver. Ends on a fatal alert, which closes the driver's listener.
fn receive(
    incoming: Receiver<Vec<u8>>,
    cache: Arc<HandshakeCache>,
    notifier: Notifier,
    is_client: bool,
    observed: Arc<Mutex<Observed>>,
) {
    let mut buffer = FragmentBuffer::new();
    let mut expected_sequence = 0u16;

    while let Ok(datagram) = incoming.recv() {
        let mut arrived = false;
        let mut retransmit = false;

        for record in unpack_datagram(&datagram) {
            let Ok((_, header)) = RecordLayerHeader::parse(record) else {
                continue;
            };
            let fragment = &record[RECORD_HEADER_LEN..];

            match header.content_type {
                ContentType::Alert => {
                    let Ok((_, alert)) = Alert::parse(fragment) else {
                        continue;
                    };
                    observed.lock().unwrap().alerts_received.push(alert);
                    if alert.is_fatal_or_close_notify() {
                        return;
                    }
                }
                ContentType::Handshake => {
                    if let Ok((_, handshake)) = Header::parse(fragment) {
                        if handshake.message_seq < expected_sequence {
                            retransmit = true;
                        }
                    }

                    if buffer.push(record).is_err() {
                        continue;
                    }

                    while let Some((message, epoch)) = buffer.pop() {
                        let Ok((_, header)) = Header::parse(&message) else {
                            continue;
                        };
                        expected_sequence = header.message_seq.wrapping_add(1);
                        let sequence = header.message_seq;
                        if cache.push(message, epoch, sequence, header.msg_type, !is_client) {
                            arrived = true;
                        } else {
                            retransmit = true;
                        }
                    }
                }
                _ => {}
            }
        }

        let notified = if arrived {
            notifier.notify()
        } else if retransmit {
            notifier.notify_retransmit()
        } else {
            Ok(())
        };

        if notified.is_err() {
            return;
        }
    }
}

/// How long the server keeps answering resent client flights.
pub const SERVER_LINGER: Duration = Duration::from_millis(600);

pub fn test_config() -> ConfigBuilder {
    Config::builder().handshake_timeout(Duration::from_secs(20))
}

/// Short timers for tests that lose flights on purpose.
pub fn fast_retransmit() -> ConfigBuilder {
    test_config()
        .flight_start_rto(Duration::from_millis(100))
        .flight_retries(6)
}

pub fn self_signed(name: &str) -> Certificate {
    Certificate::generate_self_signed(vec![name.to_string()]).expect("generate certificate")
}

/// Both drivers after their handshakes ended.
pub struct Outcome {
    pub client: Handshaker,
    pub client_result: Result<(), Error>,
    pub client_conn: Loopback,
    pub server: Handshaker,
    pub server_result: Result<(), Error>,
    pub server_conn: Loopback,
}

impl Outcome {
    pub fn assert_ok(&self) {
        if let Err(e) = &self.client_result {
            panic!("client failed: {}", e);
        }
        if let Err(e) = &self.server_result {
            panic!("server failed: {}", e);
        }
    }
}

/// Run a client and a server against each other, each on its own thread.
pub fn handshake(client_cfg: Config, server_cfg: Config) -> Outcome {
    handshake_with(client_cfg, server_cfg, |_, _| {})
}

/// Like [`handshake`], with a hook to set up the transports first.
pub fn handshake_with(
    client_cfg: Config,
    server_cfg: Config,
    setup: impl FnOnce(&mut Loopback, &mut Loopback),
) -> Outcome {
    let client_cache = Arc::new(HandshakeCache::new());
    let server_cache = Arc::new(HandshakeCache::new());
    let (mut client_conn, mut server_conn) =
        Loopback::pair(client_cache.clone(), server_cache.clone());
    setup(&mut client_conn, &mut server_conn);

    let mut server = Handshaker::new(Arc::new(server_cfg), server_cache, false);
    let server_thread = thread::spawn(move || {
        let ctx = Context::background();
        let result = server.run(&ctx, &mut server_conn);
        if result.is_ok() {
            // Answer a resent client flight in case our last one got lost.
            let linger = Context::with_timeout(SERVER_LINGER);
            let _ = server.linger(&linger, &mut server_conn);
        }
        (server, result, server_conn)
    });

    let mut client = Handshaker::new(Arc::new(client_cfg), client_cache, true);
    let client_result = client.run(&Context::background(), &mut client_conn);

    let (server, server_result, server_conn) = server_thread.join().expect("server thread");

    Outcome {
        client,
        client_result,
        client_conn,
        server,
        server_result,
        server_conn,
    }
}

/// Handshake message types in a datagram, in order.
pub fn handshake_types(datagram: &[u8]) -> Vec<u8> {
    unpack_datagram(datagram)
        .into_iter()
        .filter(|r| r[0] == ContentType::Handshake.as_u8())
        .map(|r| r[RECORD_HEADER_LEN])
        .collect()
}
