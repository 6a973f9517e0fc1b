//! Server, answering a resumed session with ServerHello and Finished.

use super::flight4::server_hello_extensions;
use super::{change_cipher_spec_packet, finished_packet, handshake_packet, predict_sequences};
use super::{Ctx, Fatal, Flight, FlightFailure, Step};
use crate::alert::AlertDescription;
use crate::cache::PullRule;
use crate::crypto::prf;
use crate::message::{Body, CompressionMethod, MessageType, ProtocolVersion, ServerHello};
use crate::record::Packet;
use crate::Error;

pub(super) fn generate(c: &mut Ctx) -> Result<Vec<Packet>, FlightFailure> {
    let Some(suite_id) = c.state.cipher_suite.as_ref().map(|s| s.id()) else {
        return Err(Error::InvalidCipherSuite).fatal(AlertDescription::InternalError);
    };

    let extensions = server_hello_extensions(c, false)?;

    let mut hello = vec![handshake_packet(Body::ServerHello(ServerHello {
        server_version: ProtocolVersion::DTLS1_2,
        random: c.state.local_random,
        session_id: c.state.session_id,
        cipher_suite: suite_id,
        compression_method: CompressionMethod::Null,
        extensions,
    }))];

    // The ServerHello is not cached before it is sent, so hash it as the
    // driver will number it.
    let server_hello = predict_sequences(&mut hello, c.state.handshake_send_sequence);

    if c.state.local_verify_data.is_empty() {
        let epoch = c.cfg.initial_epoch();
        let mut transcript = c.cache.pull_and_merge(&[PullRule::new(
            MessageType::ClientHello,
            epoch,
            true,
            false,
        )]);
        transcript.extend_from_slice(&server_hello);

        c.state.local_verify_data =
            prf::verify_data_server(&c.state.master_secret, &transcript, c.state.hash_algorithm()?)?;
    }

    let mut packets = hello;
    packets.push(change_cipher_spec_packet());
    packets.push(finished_packet(c.state, c.state.local_verify_data.clone()));

    Ok(packets)
}

pub(super) fn parse(c: &mut Ctx) -> Result<Step, FlightFailure> {
    let epoch = c.cfg.initial_epoch();

    c.conn.handle_queued_packets(c.ctx, c.state)?;

    let Some(pulled) = c.cache.full_pull_map(
        c.state.handshake_recv_sequence,
        c.state.key_exchange_algorithm(),
        &[PullRule::new(MessageType::Finished, epoch + 1, true, false)],
    ) else {
        return Ok(Step::Wait);
    };

    let Some(finished) = pulled.finished() else {
        return Err(FlightFailure::alert(AlertDescription::InternalError));
    };

    let transcript = c.cache.pull_and_merge(&[
        PullRule::new(MessageType::ClientHello, epoch, true, false),
        PullRule::new(MessageType::ServerHello, epoch, false, false),
        PullRule::new(MessageType::Finished, epoch + 1, false, false),
    ]);
    let expected =
        prf::verify_data_client(&c.state.master_secret, &transcript, c.state.hash_algorithm()?)?;
    if expected != finished.verify_data {
        return Err(Error::VerifyDataMismatch).fatal(AlertDescription::HandshakeFailure);
    }

    c.state.handshake_recv_sequence = pulled.sequence;

    // Nothing further to read; the handshake is done.
    Ok(Step::Next(Flight::Flight4b))
}
