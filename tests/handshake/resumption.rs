//! Session resumption through the session stores.

use std::sync::Arc;

use dflight::message::MessageType;
use dflight::{Context, Flight, FlightConn, MemorySessionStore, SessionStore};

use crate::common::*;

#[test]
fn resumed_handshake() {
    let _ = env_logger::try_init();

    let client_store = Arc::new(MemorySessionStore::new());
    let server_store = Arc::new(MemorySessionStore::new());

    let client_cfg = test_config()
        .insecure_skip_verify(true)
        .session_store(client_store.clone())
        .build()
        .unwrap();
    let server_cfg = test_config()
        .certificate(self_signed("server.test"))
        .session_store(server_store.clone())
        .build()
        .unwrap();

    let first = handshake(client_cfg.clone(), server_cfg.clone());
    first.assert_ok();

    let session_id = first.client.state().session_id.to_vec();
    assert_eq!(session_id.len(), 32);
    assert_eq!(&*first.server.state().session_id, &session_id[..]);
    assert_eq!(client_store.len(), 1);
    assert_eq!(server_store.len(), 1);

    let second = handshake(client_cfg, server_cfg);
    second.assert_ok();

    assert_eq!(second.client.flight(), Flight::Flight5b);
    assert_eq!(second.server.flight(), Flight::Flight4b);

    let client = second.client.state();
    let server = second.server.state();
    assert_eq!(&*client.session_id, &session_id[..]);
    assert_eq!(&client.master_secret[..], &first.client.state().master_secret[..]);
    assert_eq!(&server.master_secret[..], &client.master_secret[..]);

    // No certificate, no key exchange, no cookie round trip.
    let observed = second.server_conn.observed.lock().unwrap();
    assert_eq!(
        handshake_types(&observed.datagrams[0]),
        vec![
            MessageType::ServerHello.as_u8(),
            MessageType::Finished.as_u8()
        ]
    );
    assert!(client.peer_certificates.is_empty());
}

#[test]
fn unknown_session_falls_back() {
    let _ = env_logger::try_init();

    let client_store = Arc::new(MemorySessionStore::new());
    let client_cfg = test_config()
        .insecure_skip_verify(true)
        .session_store(client_store.clone())
        .build()
        .unwrap();

    let first = handshake(
        client_cfg.clone(),
        test_config()
            .certificate(self_signed("server.test"))
            .session_store(Arc::new(MemorySessionStore::new()))
            .build()
            .unwrap(),
    );
    first.assert_ok();
    let old_id = first.client.state().session_id.to_vec();

    // A server that forgot the session runs a full handshake.
    let second = handshake(
        client_cfg,
        test_config()
            .certificate(self_signed("server.test"))
            .session_store(Arc::new(MemorySessionStore::new()))
            .build()
            .unwrap(),
    );
    second.assert_ok();

    assert_eq!(second.client.flight(), Flight::Flight5);
    let new_id = second.client.state().session_id.to_vec();
    assert_ne!(new_id, old_id);

    // Stored under the same key, so the old session is gone.
    assert_eq!(client_store.len(), 1);
    let key = second.client_conn.session_key();
    let saved = client_store
        .get(&Context::background(), &key)
        .unwrap()
        .unwrap();
    assert_eq!(saved.id, new_id);
}
