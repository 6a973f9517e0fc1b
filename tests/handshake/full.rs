//! Full ECDHE handshakes with certificates.

use std::sync::{Arc, Mutex};

use dflight::message::{CipherSuiteId, MessageType, SrtpProtectionProfile};
use dflight::{ClientAuthType, ConnectionIdGenerator, Flight, VerifyPeerCertificate};

use crate::common::*;

/// A verifier that accepts anything and remembers what it was shown.
fn recording_verifier() -> (VerifyPeerCertificate, Arc<Mutex<Vec<Vec<u8>>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_verifier = seen.clone();
    let verifier: VerifyPeerCertificate = Arc::new(move |chain: &[Vec<u8>]| {
        *seen_by_verifier.lock().unwrap() = chain.to_vec();
        Ok(())
    });
    (verifier, seen)
}

fn cid(id: &'static [u8]) -> ConnectionIdGenerator {
    Arc::new(move || Some(id.to_vec()))
}

#[test]
fn ecdsa_handshake() {
    let _ = env_logger::try_init();

    let server_cert = self_signed("server.test");
    let (verifier, seen) = recording_verifier();

    let client_cfg = test_config()
        .verify_peer_certificate(verifier)
        .build()
        .unwrap();
    let server_cfg = test_config()
        .certificate(server_cert.clone())
        .build()
        .unwrap();

    let outcome = handshake(client_cfg, server_cfg);
    outcome.assert_ok();

    let client = outcome.client.state();
    let server = outcome.server.state();

    assert_eq!(
        client.cipher_suite.as_ref().map(|s| s.id()),
        Some(CipherSuiteId::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256)
    );
    assert!(client.cipher_suite.as_ref().unwrap().is_initialized());
    assert!(server.cipher_suite.as_ref().unwrap().is_initialized());

    assert!(!client.master_secret.is_empty());
    assert_eq!(&client.master_secret[..], &server.master_secret[..]);

    // Both sides offer it by default.
    assert!(client.extended_master_secret);
    assert!(server.extended_master_secret);

    assert_eq!(client.peer_certificates, server_cert.certificate);
    assert_eq!(*seen.lock().unwrap(), server_cert.certificate);
    assert!(client.peer_certificates_verified);

    assert_eq!(outcome.client.flight(), Flight::Flight5);
    assert_eq!(outcome.server.flight(), Flight::Flight6);
    assert_eq!(outcome.client_conn.local_epoch(), 1);
    assert_eq!(outcome.server_conn.local_epoch(), 1);
}

#[test]
fn hello_verify_round_trip() {
    let _ = env_logger::try_init();

    let client_cfg = test_config().insecure_skip_verify(true).build().unwrap();
    let server_cfg = test_config()
        .certificate(self_signed("server.test"))
        .build()
        .unwrap();

    let outcome = handshake(client_cfg, server_cfg);
    outcome.assert_ok();

    let observed = outcome.server_conn.observed.lock().unwrap();
    assert_eq!(
        handshake_types(&observed.datagrams[0]),
        vec![MessageType::HelloVerifyRequest.as_u8()]
    );
    assert_eq!(
        handshake_types(&observed.datagrams[1]),
        vec![
            MessageType::ServerHello.as_u8(),
            MessageType::Certificate.as_u8(),
            MessageType::ServerKeyExchange.as_u8(),
            MessageType::ServerHelloDone.as_u8(),
        ]
    );

    // Both client hellos and the client's third flight.
    let client_observed = outcome.client_conn.observed.lock().unwrap();
    assert_eq!(client_observed.datagrams.len(), 3);
}

#[test]
fn skip_hello_verify() {
    let _ = env_logger::try_init();

    let client_cfg = test_config().insecure_skip_verify(true).build().unwrap();
    let server_cfg = test_config()
        .certificate(self_signed("server.test"))
        .insecure_skip_hello_verify(true)
        .build()
        .unwrap();

    let outcome = handshake(client_cfg, server_cfg);
    outcome.assert_ok();

    let observed = outcome.server_conn.observed.lock().unwrap();
    assert_eq!(
        handshake_types(&observed.datagrams[0])[0],
        MessageType::ServerHello.as_u8()
    );

    // One ClientHello, then the key exchange flight.
    let client_observed = outcome.client_conn.observed.lock().unwrap();
    assert_eq!(client_observed.datagrams.len(), 2);
}

#[test]
fn client_certificate() {
    let _ = env_logger::try_init();

    let client_cert = self_signed("client.test");
    let (client_verifier, _) = recording_verifier();
    let (server_verifier, seen_by_server) = recording_verifier();

    let client_cfg = test_config()
        .certificate(client_cert.clone())
        .verify_peer_certificate(client_verifier)
        .build()
        .unwrap();
    let server_cfg = test_config()
        .certificate(self_signed("server.test"))
        .client_auth(ClientAuthType::RequireAndVerifyClientCert)
        .verify_peer_certificate(server_verifier)
        .build()
        .unwrap();

    let outcome = handshake(client_cfg, server_cfg);
    outcome.assert_ok();

    let server = outcome.server.state();
    assert_eq!(server.peer_certificates, client_cert.certificate);
    assert!(server.peer_certificates_verified);
    assert_eq!(*seen_by_server.lock().unwrap(), client_cert.certificate);
    assert!(outcome.client.state().remote_requested_certificate);

    // The client flight carries a CertificateVerify.
    let observed = outcome.client_conn.observed.lock().unwrap();
    let last = observed.datagrams.last().unwrap();
    assert!(handshake_types(last).contains(&MessageType::CertificateVerify.as_u8()));
}

#[test]
fn negotiated_extensions() {
    let _ = env_logger::try_init();

    let client_cfg = test_config()
        .insecure_skip_verify(true)
        .srtp_protection_profiles(&[
            SrtpProtectionProfile::AeadAes128Gcm,
            SrtpProtectionProfile::Aes128CmHmacSha1_80,
        ])
        .supported_protocols(&["h2", "webrtc"])
        .connection_id_generator(cid(&[1, 2, 3, 4]))
        .server_name("server.test")
        .build()
        .unwrap();
    let server_cfg = test_config()
        .certificate(self_signed("server.test"))
        .srtp_protection_profiles(&[SrtpProtectionProfile::Aes128CmHmacSha1_80])
        .supported_protocols(&["webrtc"])
        .connection_id_generator(cid(&[9; 8]))
        .build()
        .unwrap();

    let outcome = handshake(client_cfg, server_cfg);
    outcome.assert_ok();

    let client = outcome.client.state();
    let server = outcome.server.state();

    for state in [client, server] {
        assert_eq!(
            state.srtp_protection_profile,
            Some(SrtpProtectionProfile::Aes128CmHmacSha1_80)
        );
        assert_eq!(state.negotiated_protocol.as_deref(), Some("webrtc"));
    }

    assert_eq!(server.server_name.as_deref(), Some("server.test"));

    assert_eq!(client.local_connection_id.as_deref(), Some(&[1, 2, 3, 4][..]));
    assert_eq!(client.remote_connection_id.as_deref(), Some(&[9; 8][..]));
    assert_eq!(server.local_connection_id.as_deref(), Some(&[9; 8][..]));
    assert_eq!(server.remote_connection_id.as_deref(), Some(&[1, 2, 3, 4][..]));
}

#[test]
fn keying_material_agrees() {
    let _ = env_logger::try_init();

    let client_cfg = test_config().insecure_skip_verify(true).build().unwrap();
    let server_cfg = test_config()
        .certificate(self_signed("server.test"))
        .build()
        .unwrap();

    let outcome = handshake(client_cfg, server_cfg);
    outcome.assert_ok();

    let label = "EXTRACTOR-dtls_srtp";
    let client = outcome
        .client
        .state()
        .export_keying_material(label, None, 60)
        .unwrap();
    let server = outcome
        .server
        .state()
        .export_keying_material(label, None, 60)
        .unwrap();

    assert_eq!(client.len(), 60);
    assert_eq!(client, server);
}
