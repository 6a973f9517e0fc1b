//! Client, sending its key exchange and Finished.

use super::{change_cipher_spec_packet, finished_packet, handshake_packet, predict_sequences};
use super::{transcript_rules, verify_peer_certificates};
use super::{Ctx, Fatal, Flight, FlightFailure, Step};
use crate::alert::AlertDescription;
use crate::cache::PullRule;
use crate::cipher_suite::AuthenticationType;
use crate::crypto::{key_signature_message, prf, select_signature_scheme, verify_with_chain};
use crate::message::{Body, Certificate, CertificateVerify, ClientKeyExchange, Handshake};
use crate::message::{KeyExchangeAlgorithm, MessageType, ServerKeyExchange};
use crate::record::Packet;
use crate::session::Session;
use crate::Error;

pub(super) fn generate(c: &mut Ctx) -> Result<Vec<Packet>, FlightFailure> {
    let cfg = c.cfg;
    let epoch = cfg.initial_epoch();
    let mut packets = Vec::new();

    let local_certificate = cfg.certificates().first();
    if c.state.remote_requested_certificate {
        // An empty list tells the server we have nothing to offer.
        let certificate_list = local_certificate
            .map(|cert| cert.certificate.clone())
            .unwrap_or_default();
        packets.push(handshake_packet(Body::Certificate(Certificate::new(
            certificate_list,
        ))));
    }

    let key_exchange = match c.state.key_exchange_algorithm() {
        Some(KeyExchangeAlgorithm::Ecdhe) => {
            let Some(keypair) = c.state.local_keypair.as_ref() else {
                return Err(Error::KeyExchange("no local key pair".into()))
                    .fatal(AlertDescription::InternalError);
            };
            ClientKeyExchange::Ecdhe {
                public_key: keypair.public_key(),
            }
        }
        Some(KeyExchangeAlgorithm::Psk) => ClientKeyExchange::Psk {
            identity: cfg.psk_identity_hint().unwrap_or_default().to_vec(),
        },
        None => return Err(Error::InvalidCipherSuite).fatal(AlertDescription::InternalError),
    };
    packets.push(handshake_packet(Body::ClientKeyExchange(key_exchange)));

    let start = c.state.handshake_send_sequence;
    let merged = predict_sequences(&mut packets, start);

    initialize_cipher_suite(c, &merged)?;

    // Only sign when we actually sent a certificate.
    let signing_certificate =
        local_certificate.filter(|_| c.state.remote_requested_certificate);
    if let Some(certificate) = signing_certificate {
        let scheme = select_signature_scheme(cfg.signature_schemes(), &certificate.private_key)
            .fatal(AlertDescription::InsufficientSecurity)?;

        if c.state.local_certificates_verify.is_empty() {
            let mut transcript = c.cache.pull_and_merge(&transcript_rules(epoch)[..6]);
            transcript.extend_from_slice(&merged);
            c.state.local_certificates_verify =
                certificate.private_key.sign(&transcript, scheme.hash)?;
        }

        packets.push(handshake_packet(Body::CertificateVerify(CertificateVerify {
            algorithm: scheme,
            signature: c.state.local_certificates_verify.clone(),
        })));
    }

    // Number again now that the CertificateVerify may be part of it.
    let merged = predict_sequences(&mut packets, start);

    if c.state.local_verify_data.is_empty() {
        let mut transcript = c.cache.pull_and_merge(&transcript_rules(epoch)[..6]);
        transcript.extend_from_slice(&merged);
        c.state.local_verify_data =
            prf::verify_data_client(&c.state.master_secret, &transcript, c.state.hash_algorithm()?)?;
    }

    packets.push(change_cipher_spec_packet());
    packets.push(finished_packet(c.state, c.state.local_verify_data.clone()));

    Ok(packets)
}

/// Derive the master secret and keys once the server's flight checks out.
///
/// `merged` holds our own Certificate and ClientKeyExchange, which are not
/// cached until sent.
fn initialize_cipher_suite(c: &mut Ctx, merged: &[u8]) -> Result<(), FlightFailure> {
    let initialized = c
        .state
        .cipher_suite
        .as_ref()
        .map_or(false, |s| s.is_initialized());
    if initialized {
        return Ok(());
    }

    let epoch = c.cfg.initial_epoch();
    let hash = c.state.hash_algorithm()?;

    c.state.master_secret = if c.state.extended_master_secret {
        let session_hash = c.cache.session_hash(hash, epoch, merged)?;
        prf::extended_master_secret(&c.state.pre_master_secret, &session_hash, hash)?
    } else {
        prf::master_secret(
            &c.state.pre_master_secret,
            &c.state.client_random(),
            &c.state.server_random(),
            hash,
        )?
    };

    let authentication = c
        .state
        .cipher_suite
        .as_ref()
        .map(|s| s.authentication_type());
    if authentication == Some(AuthenticationType::Certificate) {
        verify_server_key_signature(c)?;

        let required = !c.cfg.insecure_skip_verify();
        c.state.peer_certificates_verified =
            verify_peer_certificates(c.cfg, &c.state.peer_certificates, required)
                .fatal(AlertDescription::BadCertificate)?;
    }

    c.state.init_cipher_suite()?;
    Ok(())
}

fn verify_server_key_signature(c: &mut Ctx) -> Result<(), FlightFailure> {
    let epoch = c.cfg.initial_epoch();
    let raw = c
        .cache
        .pull(&[PullRule::new(MessageType::ServerKeyExchange, epoch, false, false)])
        .pop()
        .flatten();
    let Some(raw) = raw else {
        return Err(FlightFailure::alert(AlertDescription::InternalError));
    };
    let (_, handshake) = Handshake::parse(&raw, c.state.key_exchange_algorithm())
        .map_err(|e| Error::Parse(e.to_string()))?;

    let Body::ServerKeyExchange(ServerKeyExchange::Ecdhe {
        named_curve,
        public_key,
        algorithm,
        signature,
    }) = handshake.body
    else {
        return Err(FlightFailure::alert(AlertDescription::InternalError));
    };

    if !c.cfg.signature_schemes().contains(&algorithm) {
        return Err(Error::NoAvailableSignatureSchemes)
            .fatal(AlertDescription::InsufficientSecurity);
    }

    let message = key_signature_message(
        &c.state.client_random(),
        &c.state.server_random(),
        named_curve,
        &public_key,
    );
    verify_with_chain(&c.state.peer_certificates, &message, &signature, algorithm)
        .fatal(AlertDescription::BadCertificate)
}

pub(super) fn parse(c: &mut Ctx) -> Result<Step, FlightFailure> {
    let epoch = c.cfg.initial_epoch();

    c.conn.handle_queued_packets(c.ctx, c.state)?;

    let Some(pulled) = c.cache.full_pull_map(
        c.state.handshake_recv_sequence,
        c.state.key_exchange_algorithm(),
        &[PullRule::new(MessageType::Finished, epoch + 1, false, false)],
    ) else {
        return Ok(Step::Wait);
    };

    let Some(finished) = pulled.finished() else {
        return Err(FlightFailure::alert(AlertDescription::InternalError));
    };

    let mut transcript = c.cache.pull_and_merge(&transcript_rules(epoch));
    transcript.extend_from_slice(&c.cache.pull_and_merge(&[PullRule::new(
        MessageType::Finished,
        epoch + 1,
        true,
        false,
    )]));
    let expected =
        prf::verify_data_server(&c.state.master_secret, &transcript, c.state.hash_algorithm()?)?;
    if expected != finished.verify_data {
        return Err(Error::VerifyDataMismatch).fatal(AlertDescription::HandshakeFailure);
    }

    c.state.handshake_recv_sequence = pulled.sequence;

    if !c.state.session_id.is_empty() {
        if let Some(store) = c.cfg.session_store() {
            trace!("Save session {:02x?}", &*c.state.session_id);
            store.set(
                &c.conn.session_key(),
                Session {
                    id: c.state.session_id.to_vec(),
                    secret: c.state.master_secret.clone(),
                },
            )?;
        }
    }

    Ok(Step::Next(Flight::Flight5))
}
