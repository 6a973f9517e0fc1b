//! Handshakes that must fail, and the alerts they leave behind.

use std::sync::Arc;

use dflight::alert::{Alert, AlertDescription};
use dflight::message::CipherSuiteId;
use dflight::{ClientAuthType, Error, ExtendedMasterSecretType, PskCallback};
use dflight::VerifyPeerCertificate;

use crate::common::*;

fn alerts(conn: &Loopback) -> (Vec<Alert>, Vec<Alert>) {
    let observed = conn.observed.lock().unwrap();
    (observed.alerts_sent.clone(), observed.alerts_received.clone())
}

#[test]
fn no_shared_cipher_suite() {
    let _ = env_logger::try_init();

    let client_cfg = test_config()
        .cipher_suites(&[CipherSuiteId::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256])
        .insecure_skip_verify(true)
        .build()
        .unwrap();
    let psk: PskCallback = Arc::new(|_: &[u8]| Ok(vec![1, 2, 3]));
    let server_cfg = test_config().psk(psk).build().unwrap();

    let outcome = handshake(client_cfg, server_cfg);

    assert!(matches!(
        outcome.server_result,
        Err(Error::CipherSuiteNoIntersection)
    ));
    assert!(matches!(outcome.client_result, Err(Error::ConnectionClosed)));

    let expected = Alert::fatal(AlertDescription::InsufficientSecurity);
    assert_eq!(alerts(&outcome.server_conn).0, vec![expected]);
    assert_eq!(alerts(&outcome.client_conn).1, vec![expected]);
}

#[test]
fn missing_client_certificate() {
    let _ = env_logger::try_init();

    let client_cfg = test_config().insecure_skip_verify(true).build().unwrap();
    let server_cfg = test_config()
        .certificate(self_signed("server.test"))
        .client_auth(ClientAuthType::RequireAnyClientCert)
        .build()
        .unwrap();

    let outcome = handshake(client_cfg, server_cfg);

    assert!(matches!(
        outcome.server_result,
        Err(Error::ClientCertificateRequired)
    ));
    assert!(outcome.client_result.is_err());
    assert_eq!(
        alerts(&outcome.client_conn).1,
        vec![Alert::fatal(AlertDescription::NoCertificate)]
    );
}

#[test]
fn rejected_server_certificate() {
    let _ = env_logger::try_init();

    let reject: VerifyPeerCertificate = Arc::new(|_: &[Vec<u8>]| Err(Error::InvalidCertificate));
    let client_cfg = test_config().verify_peer_certificate(reject).build().unwrap();
    let server_cfg = test_config()
        .certificate(self_signed("server.test"))
        .build()
        .unwrap();

    let outcome = handshake(client_cfg, server_cfg);

    assert!(matches!(outcome.client_result, Err(Error::InvalidCertificate)));
    assert!(matches!(outcome.server_result, Err(Error::ConnectionClosed)));
    assert_eq!(
        alerts(&outcome.server_conn).1,
        vec![Alert::fatal(AlertDescription::BadCertificate)]
    );
}

#[test]
fn required_extended_master_secret() {
    let _ = env_logger::try_init();

    let client_cfg = test_config()
        .extended_master_secret(ExtendedMasterSecretType::Require)
        .insecure_skip_verify(true)
        .build()
        .unwrap();
    let server_cfg = test_config()
        .extended_master_secret(ExtendedMasterSecretType::Disable)
        .certificate(self_signed("server.test"))
        .build()
        .unwrap();

    let outcome = handshake(client_cfg, server_cfg);

    assert!(matches!(
        outcome.client_result,
        Err(Error::ClientRequiredButNoServerEms)
    ));
    assert_eq!(
        alerts(&outcome.client_conn).0,
        vec![Alert::fatal(AlertDescription::HandshakeFailure)]
    );
}
