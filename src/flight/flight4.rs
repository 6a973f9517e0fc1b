//! Server, sending its hello flight and reading the client's key exchange.

use super::{generate_connection_id, handshake_packet, transcript_rules, verify_peer_certificates};
use super::{Ctx, Fatal, Flight, FlightFailure, Step, SESSION_ID_LENGTH};
use crate::alert::AlertDescription;
use crate::cache::PullRule;
use crate::cipher_suite::AuthenticationType;
use crate::config::{ClientAuthType, ExtendedMasterSecretType};
use crate::crypto::{key_signature_message, prf, select_signature_scheme, verify_with_chain};
use crate::message::extensions::alpn::select_protocol;
use crate::message::extensions::*;
use crate::message::{Body, Certificate, CertificateRequest, ClientCertificateType, ClientKeyExchange};
use crate::message::{CompressionMethod, Extension, MessageType, ProtocolVersion, ServerHello};
use crate::message::{ServerKeyExchange, SessionId};
use crate::record::Packet;
use crate::session::Session;
use crate::Error;

pub(super) fn generate(c: &mut Ctx) -> Result<Vec<Packet>, FlightFailure> {
    let Some(suite) = c.state.cipher_suite.as_ref() else {
        return Err(Error::InvalidCipherSuite).fatal(AlertDescription::InternalError);
    };
    let suite_id = suite.id();
    let authentication = suite.authentication_type();
    let certificate_type = suite.certificate_type();

    let mut extensions =
        server_hello_extensions(c, authentication == AuthenticationType::Certificate)?;

    // Only hand out an ID if the client can send records with one.
    if c.state.remote_connection_id.is_some() {
        if let Some(cid) = generate_connection_id(c.cfg)? {
            extensions.push(Extension::ConnectionId(ConnectionIdExtension::new(&cid)));
            c.state.local_connection_id = Some(cid);
        }
    }

    if c.cfg.session_store().is_some() && c.state.session_id.is_empty() {
        c.state.session_id = SessionId::random(SESSION_ID_LENGTH);
    }

    let mut packets = vec![handshake_packet(Body::ServerHello(ServerHello {
        server_version: ProtocolVersion::DTLS1_2,
        random: c.state.local_random,
        session_id: c.state.session_id,
        cipher_suite: suite_id,
        compression_method: CompressionMethod::Null,
        extensions,
    }))];

    match authentication {
        AuthenticationType::Certificate => {
            certificate_messages(c, certificate_type, &mut packets)?;
        }
        // Without a hint the ServerKeyExchange is omitted (RFC 4279 2).
        _ => {
            if let Some(hint) = c.cfg.psk_identity_hint() {
                packets.push(handshake_packet(Body::ServerKeyExchange(
                    ServerKeyExchange::Psk {
                        identity_hint: hint.to_vec(),
                    },
                )));
            }
        }
    }

    packets.push(handshake_packet(Body::ServerHelloDone));

    Ok(packets)
}

/// ServerHello extensions answering what the client asked for.
pub(super) fn server_hello_extensions(
    c: &mut Ctx,
    point_formats: bool,
) -> Result<Vec<Extension>, FlightFailure> {
    let mut extensions = vec![Extension::RenegotiationInfo(
        RenegotiationInfoExtension::default(),
    )];

    if c.state.extended_master_secret
        && c.cfg.extended_master_secret() != ExtendedMasterSecretType::Disable
    {
        extensions.push(Extension::UseExtendedMasterSecret);
    }

    if let Some(profile) = c.state.srtp_protection_profile {
        extensions.push(Extension::UseSrtp(UseSrtpExtension::new(&[profile])));
    }

    if point_formats {
        extensions.push(Extension::SupportedPointFormats(
            ECPointFormatsExtension::uncompressed(),
        ));
    }

    let selected = select_protocol(c.cfg.supported_protocols(), &c.state.peer_supported_protocols)
        .fatal(AlertDescription::NoApplicationProtocol)?;
    if let Some(protocol) = selected {
        extensions.push(Extension::Alpn(AlpnExtension::new(&[protocol.clone()])));
        c.state.negotiated_protocol = Some(protocol);
    }

    Ok(extensions)
}

/// Certificate, ServerKeyExchange and the optional CertificateRequest.
fn certificate_messages(
    c: &mut Ctx,
    certificate_type: Option<ClientCertificateType>,
    packets: &mut Vec<Packet>,
) -> Result<(), FlightFailure> {
    let Some(certificate) = c.cfg.certificate_for(certificate_type) else {
        return Err(Error::NoCertificates).fatal(AlertDescription::HandshakeFailure);
    };

    packets.push(handshake_packet(Body::Certificate(Certificate::new(
        certificate.certificate.clone(),
    ))));

    let scheme = select_signature_scheme(c.cfg.signature_schemes(), &certificate.private_key)
        .fatal(AlertDescription::InsufficientSecurity)?;

    let Some(keypair) = c.state.local_keypair.as_ref() else {
        return Err(Error::KeyExchange("no local key pair".into()))
            .fatal(AlertDescription::InternalError);
    };
    let public_key = keypair.public_key();

    // Signed once so that a resent flight carries the same bytes.
    if c.state.local_key_signature.is_empty() {
        let message = key_signature_message(
            &c.state.client_random(),
            &c.state.server_random(),
            c.state.named_curve,
            &public_key,
        );
        c.state.local_key_signature = certificate.private_key.sign(&message, scheme.hash)?;
    }

    packets.push(handshake_packet(Body::ServerKeyExchange(
        ServerKeyExchange::Ecdhe {
            named_curve: c.state.named_curve,
            public_key,
            algorithm: scheme,
            signature: c.state.local_key_signature.clone(),
        },
    )));

    if c.cfg.client_auth() > ClientAuthType::NoClientCert {
        // An empty CA list lets the client pick any certificate.
        packets.push(handshake_packet(Body::CertificateRequest(CertificateRequest {
            certificate_types: [ClientCertificateType::RSA_SIGN, ClientCertificateType::ECDSA_SIGN]
                .into_iter()
                .collect(),
            signature_algorithms: c.cfg.signature_schemes().iter().copied().collect(),
            certificate_authorities: c.cfg.client_cas().to_vec(),
        })));
    }

    Ok(())
}

pub(super) fn parse(c: &mut Ctx) -> Result<Step, FlightFailure> {
    let epoch = c.cfg.initial_epoch();

    let Some(pulled) = c.cache.full_pull_map(
        c.state.handshake_recv_sequence,
        c.state.key_exchange_algorithm(),
        &[
            PullRule::new(MessageType::Certificate, epoch, true, true),
            PullRule::new(MessageType::ClientKeyExchange, epoch, true, false),
            PullRule::new(MessageType::CertificateVerify, epoch, true, true),
        ],
    ) else {
        return Ok(Step::Wait);
    };

    let Some(key_exchange) = pulled.client_key_exchange() else {
        return Err(FlightFailure::alert(AlertDescription::InternalError));
    };

    if let Some(certificate) = pulled.certificate() {
        c.state.peer_certificates = certificate.certificate_list.clone();
        // No resumption for certificate authenticated clients; the stored
        // session could not be tied to the certificate.
        c.state.session_id = SessionId::empty();
    }

    if let Some(verify) = pulled.certificate_verify() {
        if c.state.peer_certificates.is_empty() {
            return Err(Error::CertificateVerifyNoCertificate)
                .fatal(AlertDescription::NoCertificate);
        }

        if !c.cfg.signature_schemes().contains(&verify.algorithm) {
            return Err(Error::NoAvailableSignatureSchemes)
                .fatal(AlertDescription::InsufficientSecurity);
        }

        let transcript = c.cache.pull_and_merge(&transcript_rules(epoch)[..8]);
        verify_with_chain(
            &c.state.peer_certificates,
            &transcript,
            &verify.signature,
            verify.algorithm,
        )
        .fatal(AlertDescription::BadCertificate)?;

        let required = c.cfg.client_auth() >= ClientAuthType::VerifyClientCertIfGiven;
        c.state.peer_certificates_verified =
            verify_peer_certificates(c.cfg, &c.state.peer_certificates, required)
                .fatal(AlertDescription::BadCertificate)?;
    } else if !c.state.peer_certificates.is_empty() {
        // The CertificateVerify is still in flight.
        return Ok(Step::Wait);
    }

    let initialized = c
        .state
        .cipher_suite
        .as_ref()
        .map_or(false, |s| s.is_initialized());

    if !initialized {
        derive_master_secret(c, key_exchange)?;
        c.state.init_cipher_suite()?;
    }

    if !c.state.session_id.is_empty() {
        if let Some(store) = c.cfg.session_store() {
            trace!("Save new session {:02x?}", &*c.state.session_id);
            store.set(
                &c.state.session_id,
                Session {
                    id: c.state.session_id.to_vec(),
                    secret: c.state.master_secret.clone(),
                },
            )?;
        }
    }

    c.conn.handle_queued_packets(c.ctx, c.state)?;

    let Some(finished) = c.cache.full_pull_map(
        pulled.sequence,
        c.state.key_exchange_algorithm(),
        &[PullRule::new(MessageType::Finished, epoch + 1, true, false)],
    ) else {
        return Ok(Step::Wait);
    };
    c.state.handshake_recv_sequence = finished.sequence;

    let Some(finished) = finished.finished() else {
        return Err(FlightFailure::alert(AlertDescription::InternalError));
    };

    let transcript = c.cache.pull_and_merge(&transcript_rules(epoch));
    let expected =
        prf::verify_data_client(&c.state.master_secret, &transcript, c.state.hash_algorithm()?)?;
    if expected != finished.verify_data {
        return Err(Error::VerifyDataMismatch).fatal(AlertDescription::HandshakeFailure);
    }

    let authentication = c
        .state
        .cipher_suite
        .as_ref()
        .map(|s| s.authentication_type());
    if authentication == Some(AuthenticationType::Certificate) {
        check_client_auth(c)?;
    }

    Ok(Step::Next(Flight::Flight6))
}

fn derive_master_secret(c: &mut Ctx, key_exchange: &ClientKeyExchange) -> Result<(), FlightFailure> {
    let pre_master_secret = match key_exchange {
        ClientKeyExchange::Psk { identity } => {
            let Some(psk) = c.cfg.psk() else {
                return Err(Error::Psk("no PSK callback configured".into()))
                    .fatal(AlertDescription::InternalError);
            };
            let key = psk(identity)?;
            c.state.identity_hint = identity.clone();
            prf::psk_pre_master_secret(&key)
        }
        ClientKeyExchange::Ecdhe { public_key } => {
            let Some(keypair) = c.state.local_keypair.as_ref() else {
                return Err(Error::KeyExchange("no local key pair".into()))
                    .fatal(AlertDescription::InternalError);
            };
            keypair
                .shared_secret(public_key)
                .fatal(AlertDescription::IllegalParameter)?
        }
    };

    let hash = c.state.hash_algorithm()?;
    c.state.master_secret = if c.state.extended_master_secret {
        let session_hash = c.cache.session_hash(hash, c.cfg.initial_epoch(), &[])?;
        prf::extended_master_secret(&pre_master_secret, &session_hash, hash)?
    } else {
        prf::master_secret(
            &pre_master_secret,
            &c.state.client_random(),
            &c.state.server_random(),
            hash,
        )?
    };

    Ok(())
}

fn check_client_auth(c: &Ctx) -> Result<(), FlightFailure> {
    let has_certificate = !c.state.peer_certificates.is_empty();
    let verified = c.state.peer_certificates_verified;

    let (require, verify) = match c.cfg.client_auth() {
        ClientAuthType::NoClientCert | ClientAuthType::RequestClientCert => (false, false),
        ClientAuthType::RequireAnyClientCert => (true, false),
        ClientAuthType::VerifyClientCertIfGiven => (false, true),
        ClientAuthType::RequireAndVerifyClientCert => (true, true),
    };

    if require && !has_certificate {
        return Err(Error::ClientCertificateRequired).fatal(AlertDescription::NoCertificate);
    }
    if verify && has_certificate && !verified {
        return Err(Error::ClientCertificateNotVerified).fatal(AlertDescription::BadCertificate);
    }

    Ok(())
}
