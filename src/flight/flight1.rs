//! Client, sending the first ClientHello.

use super::{client_hello_extensions, default_curve, generate_connection_id, handshake_packet};
use super::{Ctx, Fatal, Flight, FlightFailure, Step};
use crate::alert::AlertDescription;
use crate::cache::PullRule;
use crate::message::{Body, ClientHello, CompressionMethod, Cookie, MessageType};
use crate::message::{ProtocolVersion, SessionId};
use crate::record::Packet;
use crate::Error;

pub(super) fn generate(c: &mut Ctx) -> Result<Vec<Packet>, FlightFailure> {
    c.state.set_local_epoch(0);
    c.state.set_remote_epoch(0);
    c.state.named_curve = default_curve(c.cfg);
    c.state.cookie = None;
    c.state.local_random.populate();

    if let Some(store) = c.cfg.session_store() {
        trace!("Try to resume session");
        let key = c.conn.session_key();
        if let Some(session) = store.get(c.ctx, &key)? {
            debug!("Offer saved session {:02x?}", session.id);
            c.state.session_id = SessionId::try_new(&session.id).map_err(Error::from)?;
            c.state.master_secret = session.secret;
        }
    }

    // An empty ID asks the server for one without giving it one to use.
    if let Some(cid) = generate_connection_id(c.cfg)? {
        c.state.local_connection_id = Some(cid);
    }

    Ok(vec![handshake_packet(Body::ClientHello(client_hello(c)))])
}

/// The ClientHello of flights 1 and 3. They differ only in the cookie.
pub(super) fn client_hello(c: &Ctx) -> ClientHello {
    let cookie = c.state.cookie.unwrap_or_else(Cookie::empty);

    ClientHello {
        client_version: ProtocolVersion::DTLS1_2,
        random: c.state.local_random,
        session_id: c.state.session_id,
        cookie,
        cipher_suites: c.cfg.cipher_suites().iter().copied().collect(),
        compression_methods: [CompressionMethod::Null].into_iter().collect(),
        extensions: client_hello_extensions(c.cfg, c.state.local_connection_id.as_deref()),
    }
}

pub(super) fn parse(c: &mut Ctx) -> Result<Step, FlightFailure> {
    let epoch = c.cfg.initial_epoch();

    // The server may skip the HelloVerifyRequest.
    let Some(pulled) = c.cache.full_pull_map(
        c.state.handshake_recv_sequence,
        c.state.key_exchange_algorithm(),
        &[
            PullRule::new(MessageType::HelloVerifyRequest, epoch, false, true),
            PullRule::new(MessageType::ServerHello, epoch, false, true),
        ],
    ) else {
        return Ok(Step::Wait);
    };

    if pulled.contains(MessageType::ServerHello) {
        return Ok(Step::Delegate(Flight::Flight3));
    }

    let Some(request) = pulled.hello_verify_request() else {
        return Err(FlightFailure::alert(AlertDescription::InternalError));
    };

    // RFC 6347 4.2.1: the HelloVerifyRequest version does not have to match
    // the one the server will pick.
    if !matches!(
        request.server_version,
        ProtocolVersion::DTLS1_0 | ProtocolVersion::DTLS1_2
    ) {
        return Err(Error::UnsupportedProtocolVersion).fatal(AlertDescription::ProtocolVersion);
    }

    c.state.cookie = Some(request.cookie);
    c.state.handshake_recv_sequence = pulled.sequence;

    Ok(Step::Next(Flight::Flight3))
}
