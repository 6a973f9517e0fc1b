//! Client, finishing a resumed session.

use super::{change_cipher_spec_packet, finished_packet, Ctx, Flight, FlightFailure, Step};
use crate::cache::PullRule;
use crate::crypto::prf;
use crate::message::MessageType;
use crate::record::Packet;

pub(super) fn generate(c: &mut Ctx) -> Result<Vec<Packet>, FlightFailure> {
    let epoch = c.cfg.initial_epoch();

    if c.state.local_verify_data.is_empty() {
        let transcript = c.cache.pull_and_merge(&[
            PullRule::new(MessageType::ClientHello, epoch, true, false),
            PullRule::new(MessageType::ServerHello, epoch, false, false),
            PullRule::new(MessageType::Finished, epoch + 1, false, false),
        ]);
        c.state.local_verify_data =
            prf::verify_data_client(&c.state.master_secret, &transcript, c.state.hash_algorithm()?)?;
    }

    Ok(vec![
        change_cipher_spec_packet(),
        finished_packet(c.state, c.state.local_verify_data.clone()),
    ])
}

/// Only reached once our Finished is out. Seeing the server's Finished
/// again means it did not get ours.
pub(super) fn parse(c: &mut Ctx) -> Result<Step, FlightFailure> {
    let epoch = c.cfg.initial_epoch();

    let found = c.cache.full_pull_map(
        c.state.handshake_recv_sequence.wrapping_sub(1),
        c.state.key_exchange_algorithm(),
        &[PullRule::new(MessageType::Finished, epoch + 1, false, false)],
    );

    Ok(match found {
        Some(_) => Step::Next(Flight::Flight5b),
        None => Step::Wait,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::HandshakeCache;
    use crate::cipher_suite::cipher_suite_for_id;
    use crate::context::Context;
    use crate::flight::test_util::{push, MockConn};
    use crate::message::{Body, CipherSuiteId, Finished};
    use crate::state::ConnectionState;
    use crate::Config;
    use zeroize::Zeroizing;

    #[test]
    fn finished_and_resend_trigger() {
        let ctx = Context::background();
        let mut conn = MockConn::new();
        let cache = HandshakeCache::new();
        let cfg = Config::default();

        let mut state = ConnectionState::new(true);
        state.cipher_suite =
            cipher_suite_for_id(CipherSuiteId::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256);
        state.master_secret = Zeroizing::new(vec![5; 48]);
        state.handshake_recv_sequence = 2;

        push(&cache, Body::Finished(Finished::new(vec![1; 12])), 1, 1, false);

        let packets = Flight::Flight5b
            .generate(&ctx, &mut conn, &mut state, &cache, &cfg)
            .unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(state.local_verify_data.len(), 12);

        let next = Flight::Flight5b
            .parse(&ctx, &mut conn, &mut state, &cache, &cfg)
            .unwrap();
        assert_eq!(next, Some(Flight::Flight5b));

        let empty = HandshakeCache::new();
        let next = Flight::Flight5b
            .parse(&ctx, &mut conn, &mut state, &empty, &cfg)
            .unwrap();
        assert_eq!(next, None);
    }
}
