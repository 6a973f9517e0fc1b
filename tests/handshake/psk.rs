//! Pre-shared key handshakes.

use std::sync::{Arc, Mutex};

use dflight::message::{CipherSuiteId, MessageType};
use dflight::{Error, PskCallback};

use crate::common::*;

const KEY: &[u8] = &[0xAB, 0xC1, 0x23];

/// Hands out `KEY` and records the identities it was asked about.
fn psk() -> (PskCallback, Arc<Mutex<Vec<Vec<u8>>>>) {
    let asked = Arc::new(Mutex::new(Vec::new()));
    let asked_by_callback = asked.clone();
    let callback: PskCallback = Arc::new(move |identity: &[u8]| {
        asked_by_callback.lock().unwrap().push(identity.to_vec());
        Ok(KEY.to_vec())
    });
    (callback, asked)
}

#[test]
fn psk_handshake() {
    let _ = env_logger::try_init();

    let (client_psk, _) = psk();
    let (server_psk, identities) = psk();

    let client_cfg = test_config()
        .psk(client_psk)
        .psk_identity_hint(b"client-1")
        .build()
        .unwrap();
    let server_cfg = test_config().psk(server_psk).build().unwrap();

    let outcome = handshake(client_cfg, server_cfg);
    outcome.assert_ok();

    let client = outcome.client.state();
    let server = outcome.server.state();
    assert_eq!(
        server.cipher_suite.as_ref().map(|s| s.id()),
        Some(CipherSuiteId::TLS_PSK_WITH_AES_128_GCM_SHA256)
    );
    assert_eq!(&client.master_secret[..], &server.master_secret[..]);

    // The client's configured hint is its identity.
    assert_eq!(*identities.lock().unwrap(), vec![b"client-1".to_vec()]);
    assert_eq!(server.identity_hint, b"client-1");

    // Without a server hint there is no ServerKeyExchange.
    let observed = outcome.server_conn.observed.lock().unwrap();
    let key_exchange_flight = &observed.datagrams[1];
    assert_eq!(
        handshake_types(key_exchange_flight),
        vec![
            MessageType::ServerHello.as_u8(),
            MessageType::ServerHelloDone.as_u8()
        ]
    );
}

#[test]
fn psk_server_hint() {
    let _ = env_logger::try_init();

    let (client_psk, hints) = psk();
    let (server_psk, _) = psk();

    let client_cfg = test_config().psk(client_psk).build().unwrap();
    let server_cfg = test_config()
        .psk(server_psk)
        .psk_identity_hint(b"server hint")
        .insecure_skip_hello_verify(true)
        .build()
        .unwrap();

    let outcome = handshake(client_cfg, server_cfg);
    outcome.assert_ok();

    assert_eq!(*hints.lock().unwrap(), vec![b"server hint".to_vec()]);
    assert_eq!(outcome.client.state().identity_hint, b"server hint");
}

#[test]
fn psk_mismatch() {
    let _ = env_logger::try_init();

    let (client_psk, _) = psk();
    let server_psk: PskCallback = Arc::new(|_: &[u8]| Ok(vec![0x01, 0x02]));

    let client_cfg = test_config().psk(client_psk).build().unwrap();
    let server_cfg = test_config().psk(server_psk).build().unwrap();

    let outcome = handshake(client_cfg, server_cfg);

    // Different keys, different master secrets: the server cannot verify
    // the client Finished.
    assert!(matches!(outcome.server_result, Err(Error::VerifyDataMismatch)));
    assert!(outcome.client_result.is_err());
}
