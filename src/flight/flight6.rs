//! Server, finishing a full handshake.

use super::{change_cipher_spec_packet, finished_packet, transcript_rules};
use super::{Ctx, Flight, FlightFailure, Step};
use crate::cache::PullRule;
use crate::crypto::prf;
use crate::message::MessageType;
use crate::record::Packet;

pub(super) fn generate(c: &mut Ctx) -> Result<Vec<Packet>, FlightFailure> {
    let epoch = c.cfg.initial_epoch();

    if c.state.local_verify_data.is_empty() {
        let mut transcript = c.cache.pull_and_merge(&transcript_rules(epoch));
        transcript.extend_from_slice(&c.cache.pull_and_merge(&[PullRule::new(
            MessageType::Finished,
            epoch + 1,
            true,
            false,
        )]));
        c.state.local_verify_data =
            prf::verify_data_server(&c.state.master_secret, &transcript, c.state.hash_algorithm()?)?;
    }

    Ok(vec![
        change_cipher_spec_packet(),
        finished_packet(c.state, c.state.local_verify_data.clone()),
    ])
}

/// The client resending its Finished means ours was lost.
pub(super) fn parse(c: &mut Ctx) -> Result<Step, FlightFailure> {
    let epoch = c.cfg.initial_epoch();

    c.conn.handle_queued_packets(c.ctx, c.state)?;

    let found = c.cache.full_pull_map(
        c.state.handshake_recv_sequence.wrapping_sub(1),
        c.state.key_exchange_algorithm(),
        &[PullRule::new(MessageType::Finished, epoch + 1, true, false)],
    );

    Ok(match found {
        Some(_) => Step::Next(Flight::Flight6),
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
    use crate::message::{Body, CipherSuiteId, ClientKeyExchange, Finished, HashAlgorithm};
    use crate::state::ConnectionState;
    use crate::Config;
    use zeroize::Zeroizing;

    #[test]
    fn finished_covers_client_finished() {
        let ctx = Context::background();
        let mut conn = MockConn::new();
        let cache = HandshakeCache::new();
        let cfg = Config::default();

        let mut state = ConnectionState::new(false);
        state.cipher_suite =
            cipher_suite_for_id(CipherSuiteId::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256);
        state.master_secret = Zeroizing::new(vec![8; 48]);
        state.handshake_recv_sequence = 4;

        push(
            &cache,
            Body::ClientKeyExchange(ClientKeyExchange::Ecdhe {
                public_key: vec![4; 65],
            }),
            0,
            2,
            true,
        );
        push(&cache, Body::Finished(Finished::new(vec![2; 12])), 1, 3, true);

        let packets = Flight::Flight6
            .generate(&ctx, &mut conn, &mut state, &cache, &cfg)
            .unwrap();
        assert_eq!(packets.len(), 2);

        let transcript = cache.pull_and_merge(&[
            PullRule::new(MessageType::ClientKeyExchange, 0, true, false),
            PullRule::new(MessageType::Finished, 1, true, false),
        ]);
        let expected =
            prf::verify_data_server(&state.master_secret, &transcript, HashAlgorithm::SHA256)
                .unwrap();
        assert_eq!(state.local_verify_data, expected);

        let next = Flight::Flight6
            .parse(&ctx, &mut conn, &mut state, &cache, &cfg)
            .unwrap();
        assert_eq!(next, Some(Flight::Flight6));
    }
}
