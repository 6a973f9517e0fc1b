//! Lost flights and the retransmission timer.

use std::time::Duration;

use dflight::message::MessageType;
use dflight::Error;

use crate::common::*;

#[test]
fn lost_client_hello() {
    let _ = env_logger::try_init();

    let client_cfg = fast_retransmit().insecure_skip_verify(true).build().unwrap();
    let server_cfg = fast_retransmit()
        .certificate(self_signed("server.test"))
        .build()
        .unwrap();

    let outcome = handshake_with(client_cfg, server_cfg, |client, _| client.lose_writes([0]));
    outcome.assert_ok();

    let observed = outcome.client_conn.observed.lock().unwrap();
    assert_eq!(observed.dropped, 1);
    assert_eq!(
        handshake_types(&observed.datagrams[0]),
        handshake_types(&observed.datagrams[1])
    );
}

#[test]
fn lost_server_flight() {
    let _ = env_logger::try_init();

    let client_cfg = fast_retransmit().insecure_skip_verify(true).build().unwrap();
    let server_cfg = fast_retransmit()
        .certificate(self_signed("server.test"))
        .insecure_skip_hello_verify(true)
        .build()
        .unwrap();

    // The server's first flight is ServerHello to ServerHelloDone.
    let outcome = handshake_with(client_cfg, server_cfg, |_, server| server.lose_writes([0]));
    outcome.assert_ok();

    let observed = outcome.server_conn.observed.lock().unwrap();
    assert_eq!(observed.dropped, 1);
    assert_eq!(
        handshake_types(&observed.datagrams[0]),
        handshake_types(&observed.datagrams[1])
    );

    // Resent flights carry the same messages, only the record numbers move.
    let first = &observed.datagrams[0];
    let second = &observed.datagrams[1];
    assert_eq!(first.len(), second.len());
}

#[test]
fn lost_final_flight() {
    let _ = env_logger::try_init();

    let client_cfg = fast_retransmit().insecure_skip_verify(true).build().unwrap();
    let server_cfg = test_config()
        .certificate(self_signed("server.test"))
        .insecure_skip_hello_verify(true)
        .build()
        .unwrap();

    // Server writes: ServerHello flight, then the Finished flight.
    let outcome = handshake_with(client_cfg, server_cfg, |_, server| server.lose_writes([1]));
    outcome.assert_ok();

    // Only the lingering server could have answered the resent client flight.
    let observed = outcome.server_conn.observed.lock().unwrap();
    assert_eq!(observed.dropped, 1);
    assert!(observed.datagrams.len() >= 3);
    let last = observed.datagrams.last().unwrap();
    assert_eq!(handshake_types(last), vec![MessageType::Finished.as_u8()]);
}

#[test]
fn retransmissions_exhausted() {
    let _ = env_logger::try_init();

    let client_cfg = fast_retransmit()
        .flight_retries(2)
        .insecure_skip_verify(true)
        .build()
        .unwrap();
    let server_cfg = fast_retransmit()
        .flight_retries(1)
        .certificate(self_signed("server.test"))
        .build()
        .unwrap();

    // Nothing the server says arrives.
    let outcome = handshake_with(client_cfg, server_cfg, |_, server| server.lose_writes(0..100));

    assert!(matches!(outcome.client_result, Err(Error::Timeout(_))));
    assert!(matches!(outcome.server_result, Err(Error::Timeout(_))));

    // First ClientHello plus two resends.
    let observed = outcome.client_conn.observed.lock().unwrap();
    assert_eq!(observed.datagrams.len(), 3);
}

#[test]
fn handshake_timeout() {
    let _ = env_logger::try_init();

    let client_cfg = test_config()
        .handshake_timeout(Duration::from_millis(300))
        .insecure_skip_verify(true)
        .build()
        .unwrap();
    let server_cfg = fast_retransmit()
        .flight_retries(1)
        .certificate(self_signed("server.test"))
        .build()
        .unwrap();

    let outcome = handshake_with(client_cfg, server_cfg, |_, server| server.lose_writes(0..100));

    assert!(matches!(outcome.client_result, Err(Error::DeadlineExceeded)));
}
