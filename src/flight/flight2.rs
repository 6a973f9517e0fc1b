//! Server, sending the HelloVerifyRequest.

use super::{handshake_packet, Ctx, Fatal, Flight, FlightFailure, Step};
use crate::alert::AlertDescription;
use crate::cache::PullRule;
use crate::message::{Body, Cookie, HelloVerifyRequest, MessageType, ProtocolVersion};
use crate::record::Packet;
use crate::Error;

pub(super) fn generate(c: &mut Ctx) -> Result<Vec<Packet>, FlightFailure> {
    // The HelloVerifyRequest does not count towards the transcript, but it
    // does take message_seq 0.
    c.state.handshake_send_sequence = 0;

    let cookie = c.state.cookie.unwrap_or_else(Cookie::empty);

    Ok(vec![handshake_packet(Body::HelloVerifyRequest(
        HelloVerifyRequest {
            server_version: ProtocolVersion::DTLS1_2,
            cookie,
        },
    ))])
}

pub(super) fn parse(c: &mut Ctx) -> Result<Step, FlightFailure> {
    let epoch = c.cfg.initial_epoch();
    let Some(pulled) = c.cache.full_pull_map(
        c.state.handshake_recv_sequence,
        c.state.key_exchange_algorithm(),
        &[PullRule::new(MessageType::ClientHello, epoch, true, false)],
    ) else {
        // Our HelloVerifyRequest may have been lost and the client resent
        // its first hello.
        return Ok(Step::Delegate(Flight::Flight0));
    };

    c.state.handshake_recv_sequence = pulled.sequence;

    let Some(hello) = pulled.client_hello() else {
        return Err(FlightFailure::alert(AlertDescription::InternalError));
    };

    if hello.client_version != ProtocolVersion::DTLS1_2 {
        return Err(Error::UnsupportedProtocolVersion).fatal(AlertDescription::ProtocolVersion);
    }

    if hello.cookie.is_empty() {
        return Ok(Step::Wait);
    }

    let expected = c.state.cookie.as_deref().unwrap_or_default();
    if *hello.cookie != *expected {
        return Err(Error::CookieMismatch).fatal(AlertDescription::AccessDenied);
    }

    Ok(Step::Next(Flight::Flight4))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::HandshakeCache;
    use crate::context::Context;
    use crate::flight::test_util::{push, MockConn};
    use crate::message::{CipherSuiteId, ClientHello, CompressionMethod, Random, SessionId};
    use crate::state::ConnectionState;
    use crate::Config;

    fn hello(cookie: &[u8]) -> Body {
        Body::ClientHello(ClientHello {
            client_version: ProtocolVersion::DTLS1_2,
            random: Random::new(),
            session_id: SessionId::empty(),
            cookie: Cookie::try_new(cookie).unwrap(),
            cipher_suites: [CipherSuiteId::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256]
                .into_iter()
                .collect(),
            compression_methods: [CompressionMethod::Null].into_iter().collect(),
            extensions: vec![],
        })
    }

    struct Server {
        ctx: Context,
        conn: MockConn,
        state: ConnectionState,
        cache: HandshakeCache,
        cfg: Config,
    }

    impl Server {
        /// A server that has answered the first hello.
        fn new() -> Self {
            let mut s = Server {
                ctx: Context::background(),
                conn: MockConn::new(),
                state: ConnectionState::new(false),
                cache: HandshakeCache::new(),
                cfg: Config::default(),
            };
            Flight::Flight0
                .generate(&s.ctx, &mut s.conn, &mut s.state, &s.cache, &s.cfg)
                .unwrap();
            push(&s.cache, hello(&[]), 0, 0, true);
            let next = Flight::Flight0
                .parse(&s.ctx, &mut s.conn, &mut s.state, &s.cache, &s.cfg)
                .unwrap();
            assert_eq!(next, Some(Flight::Flight2));
            s
        }

        fn parse(&mut self) -> Result<Option<Flight>, FlightFailure> {
            Flight::Flight2.parse(
                &self.ctx,
                &mut self.conn,
                &mut self.state,
                &self.cache,
                &self.cfg,
            )
        }
    }

    #[test]
    fn request_carries_cookie() {
        let mut s = Server::new();
        s.state.handshake_send_sequence = 3;
        let packets = Flight::Flight2
            .generate(&s.ctx, &mut s.conn, &mut s.state, &s.cache, &s.cfg)
            .unwrap();

        assert_eq!(s.state.handshake_send_sequence, 0);
        let Some(Body::HelloVerifyRequest(request)) = packets[0].handshake().map(|h| &h.body)
        else {
            panic!("expected HelloVerifyRequest");
        };
        assert_eq!(*request.cookie, *s.state.cookie.unwrap());
    }

    #[test]
    fn matching_cookie() {
        let mut s = Server::new();
        let cookie = s.state.cookie.unwrap();
        push(&s.cache, hello(&cookie), 0, 1, true);

        assert_eq!(s.parse().unwrap(), Some(Flight::Flight4));
        assert_eq!(s.state.handshake_recv_sequence, 2);
    }

    #[test]
    fn wrong_cookie() {
        let mut s = Server::new();
        push(&s.cache, hello(&[1; 20]), 0, 1, true);

        let failure = s.parse().unwrap_err();
        assert_eq!(
            failure.alert.map(|a| a.description),
            Some(AlertDescription::AccessDenied)
        );
        assert!(matches!(failure.error, Some(Error::CookieMismatch)));
    }

    #[test]
    fn resent_first_hello() {
        let mut s = Server::new();

        // Nothing new at seq 1: the first hello is parsed again.
        assert_eq!(s.parse().unwrap(), Some(Flight::Flight2));
        assert_eq!(s.state.handshake_recv_sequence, 1);
    }
}
