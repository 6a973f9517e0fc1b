//! Server, waiting for the first ClientHello.

use super::{default_curve, Ctx, Fatal, Flight, FlightFailure, Step, COOKIE_LENGTH};
use crate::alert::AlertDescription;
use crate::cache::PullRule;
use crate::cipher_suite::cipher_suite_for_id;
use crate::config::ExtendedMasterSecretType;
use crate::crypto::KeyPair;
use crate::message::{ClientHello, CompressionMethod, Cookie, Extension, KeyExchangeAlgorithm};
use crate::message::{MessageType, ProtocolVersion, SessionId};
use crate::record::Packet;
use crate::Error;

pub(super) fn generate(c: &mut Ctx) -> Result<Vec<Packet>, FlightFailure> {
    if !c.cfg.insecure_skip_hello_verify() {
        c.state.cookie = Some(Cookie::random(COOKIE_LENGTH));
    }

    c.state.set_local_epoch(0);
    c.state.set_remote_epoch(0);
    c.state.named_curve = default_curve(c.cfg);
    c.state.local_random.populate();

    Ok(Vec::new())
}

pub(super) fn parse(c: &mut Ctx) -> Result<Step, FlightFailure> {
    let epoch = c.cfg.initial_epoch();
    let Some(pulled) = c.cache.full_pull_map(
        0,
        c.state.key_exchange_algorithm(),
        &[PullRule::new(MessageType::ClientHello, epoch, true, false)],
    ) else {
        return Ok(Step::Wait);
    };

    let Some(hello) = pulled.client_hello() else {
        return Err(FlightFailure::alert(AlertDescription::InternalError));
    };

    // Connection IDs are negotiated afresh, also on resumption (RFC 9146 3).
    c.state.local_connection_id = None;
    c.state.remote_connection_id = None;
    c.state.handshake_recv_sequence = pulled.sequence;

    if hello.client_version != ProtocolVersion::DTLS1_2 {
        return Err(FlightFailure::new(
            AlertDescription::ProtocolVersion,
            Error::UnsupportedProtocolVersion,
        ));
    }

    if !hello.compression_methods.contains(&CompressionMethod::Null) {
        return Err(FlightFailure::new(
            AlertDescription::IllegalParameter,
            Error::NullCompressionMissing,
        ));
    }

    c.state.remote_random = hello.random;

    // Our preference order decides.
    let Some(suite) = c
        .cfg
        .cipher_suites()
        .iter()
        .find(|id| hello.cipher_suites.contains(id))
        .and_then(|id| cipher_suite_for_id(*id))
    else {
        return Err(FlightFailure::new(
            AlertDescription::InsufficientSecurity,
            Error::CipherSuiteNoIntersection,
        ));
    };
    debug!("Use cipher suite {:?}", suite.id());
    let is_ecdhe = suite.key_exchange_algorithm() == KeyExchangeAlgorithm::Ecdhe;
    c.state.cipher_suite = Some(suite);

    apply_extensions(c, hello)?;

    // No ConnectionId from the client means it will not send one either.
    if c.state.remote_connection_id.is_none() {
        c.state.local_connection_id = None;
    }

    if c.cfg.extended_master_secret() == ExtendedMasterSecretType::Require
        && !c.state.extended_master_secret
    {
        return Err(FlightFailure::new(
            AlertDescription::InsufficientSecurity,
            Error::ServerRequiredButNoClientEms,
        ));
    }

    if is_ecdhe && c.state.local_keypair.is_none() {
        let keypair = KeyPair::generate(c.state.named_curve).fatal(AlertDescription::IllegalParameter)?;
        c.state.local_keypair = Some(keypair);
    }

    let next = if c.cfg.insecure_skip_hello_verify() {
        Flight::Flight4
    } else {
        Flight::Flight2
    };

    let session_id = hello.session_id.to_vec();
    resume_or(c, &session_id, next)
}

fn apply_extensions(c: &mut Ctx, hello: &ClientHello) -> Result<(), FlightFailure> {
    for extension in &hello.extensions {
        match extension {
            Extension::SupportedEllipticCurves(e) => {
                let Some(curve) = e.groups.iter().find(|g| c.cfg.curves().contains(g)) else {
                    return Err(FlightFailure::new(
                        AlertDescription::InsufficientSecurity,
                        Error::NoSupportedEllipticCurves,
                    ));
                };
                c.state.named_curve = *curve;
            }
            Extension::UseSrtp(e) => {
                let Some(profile) =
                    super::find_matching_srtp_profile(&e.profiles, c.cfg.srtp_protection_profiles())
                else {
                    return Err(FlightFailure::new(
                        AlertDescription::InsufficientSecurity,
                        Error::ServerNoMatchingSrtpProfile,
                    ));
                };
                c.state.srtp_protection_profile = Some(profile);
            }
            Extension::UseExtendedMasterSecret => {
                if c.cfg.extended_master_secret() != ExtendedMasterSecretType::Disable {
                    c.state.extended_master_secret = true;
                }
            }
            Extension::ServerName(e) => {
                c.state.server_name = Some(e.server_name.clone());
            }
            Extension::Alpn(e) => {
                c.state.peer_supported_protocols = e.protocol_name_list.clone();
            }
            Extension::ConnectionId(e) => {
                if c.cfg.connection_id_generator().is_some() {
                    c.state.remote_connection_id = Some(e.cid.clone());
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Continue with an abbreviated handshake if the client offered a session we
/// know, otherwise with `next`.
fn resume_or(c: &mut Ctx, session_id: &[u8], next: Flight) -> Result<Step, FlightFailure> {
    let Some(store) = c.cfg.session_store() else {
        return Ok(Step::Next(next));
    };
    if session_id.is_empty() {
        return Ok(Step::Next(next));
    }

    let Some(session) = store.get(c.ctx, session_id)? else {
        return Ok(Step::Next(next));
    };

    debug!("Resume session {:02x?}", session.id);
    c.state.session_id = SessionId::try_new(&session.id).map_err(Error::from)?;
    c.state.master_secret = session.secret;
    c.state.init_cipher_suite()?;

    Ok(Step::Next(Flight::Flight4b))
}
