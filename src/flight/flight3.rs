//! Client, resending the ClientHello with the cookie and reading the
//! server's hello flight.

use super::flight1::client_hello;
use super::{find_matching_srtp_profile, handshake_packet, Ctx, Fatal, Flight, FlightFailure, Step};
use crate::alert::AlertDescription;
use crate::cache::PullRule;
use crate::cipher_suite::{cipher_suite_for_id, AuthenticationType};
use crate::config::ExtendedMasterSecretType;
use crate::crypto::{prf, KeyPair};
use crate::message::{Body, Extension, KeyExchangeAlgorithm, MessageType, ProtocolVersion};
use crate::message::{ServerHello, ServerKeyExchange, SessionId};
use crate::record::Packet;
use crate::Error;

pub(super) fn generate(c: &mut Ctx) -> Result<Vec<Packet>, FlightFailure> {
    Ok(vec![handshake_packet(Body::ClientHello(client_hello(c)))])
}

pub(super) fn parse(c: &mut Ctx) -> Result<Step, FlightFailure> {
    let epoch = c.cfg.initial_epoch();

    // A server may send several HelloVerifyRequests with different cookies
    // (RFC 6347 4.2.1). Each gets a new ClientHello.
    if let Some(pulled) = c.cache.full_pull_map(
        c.state.handshake_recv_sequence,
        c.state.key_exchange_algorithm(),
        &[PullRule::new(MessageType::HelloVerifyRequest, epoch, false, true)],
    ) {
        if let Some(request) = pulled.hello_verify_request() {
            if !matches!(
                request.server_version,
                ProtocolVersion::DTLS1_0 | ProtocolVersion::DTLS1_2
            ) {
                return Err(Error::UnsupportedProtocolVersion)
                    .fatal(AlertDescription::ProtocolVersion);
            }
            c.state.cookie = Some(request.cookie);
            c.state.handshake_recv_sequence = pulled.sequence;
            return Ok(Step::Next(Flight::Flight3));
        }
    }

    let Some(pulled) = c.cache.full_pull_map(
        c.state.handshake_recv_sequence,
        c.state.key_exchange_algorithm(),
        &[PullRule::new(MessageType::ServerHello, epoch, false, false)],
    ) else {
        return Ok(Step::Wait);
    };

    let Some(hello) = pulled.server_hello() else {
        return Err(FlightFailure::alert(AlertDescription::InternalError));
    };

    if hello.server_version != ProtocolVersion::DTLS1_2 {
        return Err(Error::UnsupportedProtocolVersion).fatal(AlertDescription::ProtocolVersion);
    }

    apply_extensions(c, hello)?;

    // A server without connection ID support will not use ours.
    if c.state.remote_connection_id.is_none() {
        c.state.local_connection_id = None;
    }

    if c.cfg.extended_master_secret() == ExtendedMasterSecretType::Require
        && !c.state.extended_master_secret
    {
        return Err(Error::ClientRequiredButNoServerEms).fatal(AlertDescription::HandshakeFailure);
    }

    if !c.cfg.srtp_protection_profiles().is_empty() && c.state.srtp_protection_profile.is_none() {
        return Err(Error::RequestedButNoSrtpExtension)
            .fatal(AlertDescription::InsufficientSecurity);
    }

    let Some(suite) = cipher_suite_for_id(hello.cipher_suite) else {
        return Err(Error::CipherSuiteNoIntersection).fatal(AlertDescription::InsufficientSecurity);
    };
    if !c.cfg.cipher_suites().contains(&suite.id()) {
        return Err(Error::InvalidCipherSuite).fatal(AlertDescription::InsufficientSecurity);
    }
    debug!("Use cipher suite {:?}", suite.id());
    c.state.cipher_suite = Some(suite);
    c.state.remote_random = hello.random;

    if !hello.session_id.is_empty() && *hello.session_id == *c.state.session_id {
        return handle_resumption(c);
    }

    // The offered session stays in place until the whole server flight is
    // in, so a partial flight is parsed the same way next time.
    let step = parse_server_flight(c)?;
    if matches!(step, Step::Next(_)) {
        forget_offered_session(c)?;
        c.state.session_id = if c.cfg.session_store().is_some() {
            hello.session_id
        } else {
            SessionId::empty()
        };
        c.state.master_secret.clear();
    }

    Ok(step)
}

/// The server did not resume the session we offered.
fn forget_offered_session(c: &mut Ctx) -> Result<(), FlightFailure> {
    if c.state.session_id.is_empty() {
        return Ok(());
    }
    if let Some(store) = c.cfg.session_store() {
        trace!("Drop old session {:02x?}", &*c.state.session_id);
        store.del(&c.conn.session_key())?;
    }
    Ok(())
}

fn apply_extensions(c: &mut Ctx, hello: &ServerHello) -> Result<(), FlightFailure> {
    for extension in &hello.extensions {
        match extension {
            Extension::UseSrtp(e) => {
                let Some(profile) =
                    find_matching_srtp_profile(&e.profiles, c.cfg.srtp_protection_profiles())
                else {
                    return Err(Error::ClientNoMatchingSrtpProfile)
                        .fatal(AlertDescription::IllegalParameter);
                };
                c.state.srtp_protection_profile = Some(profile);
            }
            Extension::UseExtendedMasterSecret => {
                if c.cfg.extended_master_secret() != ExtendedMasterSecretType::Disable {
                    c.state.extended_master_secret = true;
                }
            }
            Extension::Alpn(e) => {
                let [protocol] = e.protocol_name_list.as_slice() else {
                    return Err(Error::InvalidAlpnFormat).fatal(AlertDescription::InternalError);
                };
                c.state.negotiated_protocol = Some(protocol.clone());
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

/// The server accepted our session id. Its Finished follows right after the
/// ServerHello.
fn handle_resumption(c: &mut Ctx) -> Result<Step, FlightFailure> {
    debug!("Server resumed session {:02x?}", &*c.state.session_id);
    c.state.init_cipher_suite()?;
    c.conn.handle_queued_packets(c.ctx, c.state)?;

    let epoch = c.cfg.initial_epoch();
    let Some(pulled) = c.cache.full_pull_map(
        c.state.handshake_recv_sequence.wrapping_add(1),
        c.state.key_exchange_algorithm(),
        &[PullRule::new(MessageType::Finished, epoch + 1, false, false)],
    ) else {
        return Ok(Step::Wait);
    };
    c.state.handshake_recv_sequence = pulled.sequence;

    let Some(finished) = pulled.finished() else {
        return Err(FlightFailure::alert(AlertDescription::InternalError));
    };

    let transcript = c.cache.pull_and_merge(&[
        PullRule::new(MessageType::ClientHello, epoch, true, false),
        PullRule::new(MessageType::ServerHello, epoch, false, false),
    ]);
    let expected =
        prf::verify_data_server(&c.state.master_secret, &transcript, c.state.hash_algorithm()?)?;
    if expected != finished.verify_data {
        return Err(Error::VerifyDataMismatch).fatal(AlertDescription::HandshakeFailure);
    }

    Ok(Step::Next(Flight::Flight5b))
}

/// Certificate, ServerKeyExchange, CertificateRequest and ServerHelloDone.
fn parse_server_flight(c: &mut Ctx) -> Result<Step, FlightFailure> {
    let epoch = c.cfg.initial_epoch();
    let kx = c.state.key_exchange_algorithm();

    let rules = if kx == Some(KeyExchangeAlgorithm::Psk) {
        vec![
            PullRule::new(MessageType::ServerKeyExchange, epoch, false, true),
            PullRule::new(MessageType::ServerHelloDone, epoch, false, false),
        ]
    } else {
        vec![
            PullRule::new(MessageType::Certificate, epoch, false, true),
            PullRule::new(MessageType::ServerKeyExchange, epoch, false, false),
            PullRule::new(MessageType::CertificateRequest, epoch, false, true),
            PullRule::new(MessageType::ServerHelloDone, epoch, false, false),
        ]
    };

    let Some(pulled) =
        c.cache
            .full_pull_map(c.state.handshake_recv_sequence.wrapping_add(1), kx, &rules)
    else {
        return Ok(Step::Wait);
    };
    c.state.handshake_recv_sequence = pulled.sequence;

    let authentication = c
        .state
        .cipher_suite
        .as_ref()
        .map(|s| s.authentication_type());

    if let Some(certificate) = pulled.certificate() {
        c.state.peer_certificates = certificate.certificate_list.clone();
    } else if authentication == Some(AuthenticationType::Certificate) {
        return Err(Error::InvalidCertificate).fatal(AlertDescription::NoCertificate);
    }

    match pulled.server_key_exchange() {
        Some(ServerKeyExchange::Psk { identity_hint }) => {
            psk_pre_master_secret(c, identity_hint)?;
        }
        Some(ServerKeyExchange::Ecdhe {
            named_curve,
            public_key,
            ..
        }) => {
            if !c.cfg.curves().contains(named_curve) {
                return Err(Error::UnsupportedCurve(*named_curve))
                    .fatal(AlertDescription::IllegalParameter);
            }
            let keypair = KeyPair::generate(*named_curve).fatal(AlertDescription::IllegalParameter)?;
            c.state.pre_master_secret = keypair
                .shared_secret(public_key)
                .fatal(AlertDescription::IllegalParameter)?;
            c.state.named_curve = *named_curve;
            c.state.local_keypair = Some(keypair);
        }
        // The hint is optional for plain PSK.
        None => psk_pre_master_secret(c, &[])?,
    }

    if pulled.certificate_request().is_some() {
        c.state.remote_requested_certificate = true;
    }

    Ok(Step::Next(Flight::Flight5))
}

fn psk_pre_master_secret(c: &mut Ctx, identity_hint: &[u8]) -> Result<(), FlightFailure> {
    let Some(psk) = c.cfg.psk() else {
        return Err(Error::Psk("no PSK callback configured".into()))
            .fatal(AlertDescription::InternalError);
    };
    let key = psk(identity_hint)?;
    c.state.pre_master_secret = prf::psk_pre_master_secret(&key);
    c.state.identity_hint = identity_hint.to_vec();
    Ok(())
}
