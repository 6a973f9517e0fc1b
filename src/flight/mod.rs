// DTLS 1.2 flights (RFC 6347 4.2.4):
//
//   Client                                          Server
//   ------                                          ------
//                                      Waiting                 Flight 0
//
//   ClientHello             -------->                          Flight 1
//
//                           <-------    HelloVerifyRequest     Flight 2
//
//   ClientHello             -------->                          Flight 3
//
//                                              ServerHello    \
//                                             Certificate*     \
//                                       ServerKeyExchange*      Flight 4
//                                      CertificateRequest*     /
//                           <--------      ServerHelloDone    /
//
//   Certificate*                                              \
//   ClientKeyExchange                                          \
//   CertificateVerify*                                          Flight 5
//   [ChangeCipherSpec]                                         /
//   Finished                -------->                         /
//
//                                       [ChangeCipherSpec]    \ Flight 6
//                           <--------             Finished    /
//
// An abbreviated (resumed) handshake replaces flights 2 to 6:
//
//                                              ServerHello    \
//                                       [ChangeCipherSpec]     Flight 4b
//                           <--------             Finished    /
//
//   [ChangeCipherSpec]                                        \ Flight 5b
//   Finished                -------->                         /
//
// A server may skip the HelloVerifyRequest round trip, in which case the
// client goes straight from Flight 1 to parsing the server's Flight 4.

//! The flight state machine.
//!
//! Every [`Flight`] has a `generate` producing the packets to send and a
//! `parse` reading the peer's answer out of the [`HandshakeCache`].

use std::fmt;

use crate::alert::{Alert, AlertDescription, AlertLevel};
use crate::cache::{HandshakeCache, PullRule};
use crate::cipher_suite::cipher_suite_for_id;
use crate::config::{Config, ExtendedMasterSecretType};
use crate::context::Context;
use crate::message::extensions::*;
use crate::message::{Body, Extension, Finished, Handshake, MessageType, NamedCurve};
use crate::message::SrtpProtectionProfile;
use crate::record::{Content, Packet};
use crate::signal::Listener;
use crate::state::ConnectionState;
use crate::Error;

mod flight0;
mod flight1;
mod flight2;
mod flight3;
mod flight4;
mod flight4b;
mod flight5;
mod flight5b;
mod flight6;

/// Length of the server's HelloVerifyRequest cookie.
pub(crate) const COOKIE_LENGTH: usize = 20;

/// Length of a server assigned session id.
pub(crate) const SESSION_ID_LENGTH: usize = 32;

/// The transport as seen by the flights.
///
/// Implemented by whatever owns the socket and the record layer.
pub trait FlightConn {
    /// Send an alert to the peer.
    fn notify(&mut self, level: AlertLevel, description: AlertDescription) -> Result<(), Error>;

    /// Hand packets to the record layer. Epochs and handshake message
    /// sequences are already filled in.
    fn write_packets(
        &mut self,
        ctx: &Context,
        packets: &[Packet],
        state: &ConnectionState,
    ) -> Result<(), Error>;

    /// Arrivals of new handshake messages in the cache.
    fn recv_handshake(&self) -> &Listener;

    fn set_local_epoch(&mut self, epoch: u16);

    /// Process records that arrived for an epoch whose keys were not
    /// installed yet.
    fn handle_queued_packets(&mut self, ctx: &Context, state: &ConnectionState)
        -> Result<(), Error>;

    /// Key under which a client stores and looks up its session.
    fn session_key(&self) -> Vec<u8>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flight {
    Flight0,
    Flight1,
    Flight2,
    Flight3,
    Flight4,
    Flight4b,
    Flight5,
    Flight5b,
    Flight6,
}

/// A fatal outcome of a flight.
///
/// The alert goes to the peer. The error, when present, is what the
/// handshake fails with; otherwise the alert itself is the failure.
#[derive(Debug)]
pub struct FlightFailure {
    pub alert: Option<Alert>,
    pub error: Option<Error>,
}

impl FlightFailure {
    pub fn new(description: AlertDescription, error: Error) -> Self {
        FlightFailure {
            alert: Some(Alert::fatal(description)),
            error: Some(error),
        }
    }

    /// A failure fully described by its alert.
    pub fn alert(description: AlertDescription) -> Self {
        FlightFailure {
            alert: Some(Alert::fatal(description)),
            error: None,
        }
    }

    /// The error the handshake ends with.
    pub fn into_error(self) -> Error {
        match (self.error, self.alert) {
            (Some(error), _) => error,
            (None, Some(alert)) => Error::Alert(alert),
            (None, None) => Error::Alert(Alert::fatal(AlertDescription::InternalError)),
        }
    }
}

impl From<Error> for FlightFailure {
    fn from(error: Error) -> Self {
        FlightFailure::new(AlertDescription::InternalError, error)
    }
}

impl fmt::Display for FlightFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.alert, &self.error) {
            (Some(alert), Some(error)) => write!(f, "{} ({})", error, alert),
            (Some(alert), None) => write!(f, "{}", alert),
            (None, Some(error)) => write!(f, "{}", error),
            (None, None) => write!(f, "flight failed"),
        }
    }
}

/// Attach the alert to send with an error.
pub(crate) trait Fatal<T> {
    fn fatal(self, description: AlertDescription) -> Result<T, FlightFailure>;
}

impl<T> Fatal<T> for Result<T, Error> {
    fn fatal(self, description: AlertDescription) -> Result<T, FlightFailure> {
        self.map_err(|e| FlightFailure::new(description, e))
    }
}

/// Outcome of a single flight parser.
pub(crate) enum Step {
    /// Move on to this flight.
    Next(Flight),
    /// Not enough messages yet.
    Wait,
    /// Parse the cache as this flight instead.
    Delegate(Flight),
}

/// Everything a flight function gets to work with.
pub(crate) struct Ctx<'a> {
    pub ctx: &'a Context,
    pub conn: &'a mut dyn FlightConn,
    pub state: &'a mut ConnectionState,
    pub cache: &'a HandshakeCache,
    pub cfg: &'a Config,
}

impl Flight {
    pub fn is_last_send_flight(&self) -> bool {
        matches!(self, Flight::Flight6 | Flight::Flight5b)
    }

    pub fn is_last_recv_flight(&self) -> bool {
        matches!(self, Flight::Flight5 | Flight::Flight4b)
    }

    /// The flight a side starts in.
    pub fn initial(is_client: bool) -> Self {
        if is_client {
            Flight::Flight1
        } else {
            Flight::Flight0
        }
    }

    /// Read the peer's messages for this flight out of the cache.
    ///
    /// `Ok(None)` means the messages are not all there yet.
    pub fn parse(
        self,
        ctx: &Context,
        conn: &mut dyn FlightConn,
        state: &mut ConnectionState,
        cache: &HandshakeCache,
        cfg: &Config,
    ) -> Result<Option<Flight>, FlightFailure> {
        ctx.check()?;

        let mut c = Ctx {
            ctx,
            conn,
            state,
            cache,
            cfg,
        };

        let mut flight = self;
        loop {
            let step = match flight {
                Flight::Flight0 => flight0::parse(&mut c),
                Flight::Flight1 => flight1::parse(&mut c),
                Flight::Flight2 => flight2::parse(&mut c),
                Flight::Flight3 => flight3::parse(&mut c),
                Flight::Flight4 => flight4::parse(&mut c),
                Flight::Flight4b => flight4b::parse(&mut c),
                Flight::Flight5 => flight5::parse(&mut c),
                Flight::Flight5b => flight5b::parse(&mut c),
                Flight::Flight6 => flight6::parse(&mut c),
            }?;

            match step {
                Step::Next(next) => return Ok(Some(next)),
                Step::Wait => return Ok(None),
                Step::Delegate(other) => {
                    trace!("{:?} parses as {:?}", flight, other);
                    flight = other;
                }
            }
        }
    }

    /// Build the packets of this flight.
    ///
    /// Packet epochs are relative to the configured initial epoch and
    /// handshake message sequences are left for the driver to assign.
    pub fn generate(
        self,
        ctx: &Context,
        conn: &mut dyn FlightConn,
        state: &mut ConnectionState,
        cache: &HandshakeCache,
        cfg: &Config,
    ) -> Result<Vec<Packet>, FlightFailure> {
        ctx.check()?;

        let mut c = Ctx {
            ctx,
            conn,
            state,
            cache,
            cfg,
        };

        match self {
            Flight::Flight0 => flight0::generate(&mut c),
            Flight::Flight1 => flight1::generate(&mut c),
            Flight::Flight2 => flight2::generate(&mut c),
            Flight::Flight3 => flight3::generate(&mut c),
            Flight::Flight4 => flight4::generate(&mut c),
            Flight::Flight4b => flight4b::generate(&mut c),
            Flight::Flight5 => flight5::generate(&mut c),
            Flight::Flight5b => flight5b::generate(&mut c),
            Flight::Flight6 => flight6::generate(&mut c),
        }
    }
}

pub(crate) fn handshake_packet(body: Body) -> Packet {
    Packet::plain(Content::Handshake(Handshake::new(body)))
}

pub(crate) fn change_cipher_spec_packet() -> Packet {
    Packet::plain(Content::ChangeCipherSpec)
}

/// The Finished message, first record of epoch 1.
pub(crate) fn finished_packet(state: &ConnectionState, verify_data: Vec<u8>) -> Packet {
    let finished = Handshake::new(Body::Finished(Finished::new(verify_data)));
    let mut packet = Packet::plain(Content::Handshake(finished));
    packet.record.header.epoch = 1;
    packet.should_encrypt = true;
    packet.reset_local_sequence_number = true;
    packet.should_wrap_cid = state
        .remote_connection_id
        .as_ref()
        .map_or(false, |cid| !cid.is_empty());
    packet
}

/// Number the handshake messages in `packets` from `start` the way the
/// driver will, and return their serialized form for the transcript.
pub(crate) fn predict_sequences(packets: &mut [Packet], start: u16) -> Vec<u8> {
    let mut merged = Vec::new();
    let mut sequence = start;
    for packet in packets {
        if let Content::Handshake(handshake) = &mut packet.record.content {
            handshake.header.message_seq = sequence;
            sequence = sequence.wrapping_add(1);
            handshake.serialize(&mut merged);
        }
    }
    merged
}

/// Rules for the full handshake transcript up to the client's
/// CertificateVerify, in transcript order.
pub(crate) fn transcript_rules(epoch: u16) -> [PullRule; 9] {
    [
        PullRule::new(MessageType::ClientHello, epoch, true, false),
        PullRule::new(MessageType::ServerHello, epoch, false, false),
        PullRule::new(MessageType::Certificate, epoch, false, false),
        PullRule::new(MessageType::ServerKeyExchange, epoch, false, false),
        PullRule::new(MessageType::CertificateRequest, epoch, false, false),
        PullRule::new(MessageType::ServerHelloDone, epoch, false, false),
        PullRule::new(MessageType::Certificate, epoch, true, false),
        PullRule::new(MessageType::ClientKeyExchange, epoch, true, false),
        PullRule::new(MessageType::CertificateVerify, epoch, true, false),
    ]
}

/// Extensions of both client hellos.
///
/// `connection_id` is the ID we ask the server to use, `None` when
/// connection IDs are not supported.
pub(crate) fn client_hello_extensions(
    cfg: &Config,
    connection_id: Option<&[u8]>,
) -> Vec<Extension> {
    let mut extensions = vec![
        Extension::SupportedSignatureAlgorithms(SignatureAlgorithmsExtension::new(
            cfg.signature_schemes(),
        )),
        Extension::RenegotiationInfo(RenegotiationInfoExtension::default()),
    ];

    let any_elliptic = cfg
        .cipher_suites()
        .iter()
        .filter_map(|id| cipher_suite_for_id(*id))
        .any(|s| s.is_elliptic());

    if any_elliptic {
        extensions.push(Extension::SupportedEllipticCurves(
            SupportedGroupsExtension::new(cfg.curves()),
        ));
        extensions.push(Extension::SupportedPointFormats(
            ECPointFormatsExtension::uncompressed(),
        ));
    }

    if !cfg.srtp_protection_profiles().is_empty() {
        extensions.push(Extension::UseSrtp(UseSrtpExtension::new(
            cfg.srtp_protection_profiles(),
        )));
    }

    if cfg.extended_master_secret() != ExtendedMasterSecretType::Disable {
        extensions.push(Extension::UseExtendedMasterSecret);
    }

    if let Some(server_name) = cfg.server_name() {
        extensions.push(Extension::ServerName(ServerNameExtension::new(server_name)));
    }

    if !cfg.supported_protocols().is_empty() {
        extensions.push(Extension::Alpn(AlpnExtension::new(
            cfg.supported_protocols(),
        )));
    }

    if let Some(cid) = connection_id {
        extensions.push(Extension::ConnectionId(ConnectionIdExtension::new(cid)));
    }

    extensions
}

/// Curve used until the peer's supported groups are known.
pub(crate) fn default_curve(cfg: &Config) -> NamedCurve {
    cfg.curves().first().copied().unwrap_or(NamedCurve::X25519)
}

/// Longest connection ID the u8 length prefix can carry.
pub(crate) const MAX_CONNECTION_ID_LEN: usize = 255;

/// Ask the configured generator for our connection ID.
///
/// A generator returning `None` yields the empty ID.
pub(crate) fn generate_connection_id(cfg: &Config) -> Result<Option<Vec<u8>>, FlightFailure> {
    let Some(generator) = cfg.connection_id_generator() else {
        return Ok(None);
    };
    let cid = generator().unwrap_or_default();
    if cid.len() > MAX_CONNECTION_ID_LEN {
        return Err(Error::Config(format!(
            "connection id is {} bytes, at most {} allowed",
            cid.len(),
            MAX_CONNECTION_ID_LEN
        ))
        .into());
    }
    Ok(Some(cid))
}

/// First of our profiles the peer also offers.
pub(crate) fn find_matching_srtp_profile(
    offered: &[SrtpProtectionProfile],
    local: &[SrtpProtectionProfile],
) -> Option<SrtpProtectionProfile> {
    local.iter().find(|p| offered.contains(p)).copied()
}

/// Decide whether the peer's certificate chain is acceptable.
///
/// Returns whether the chain was actually checked by a verifier.
pub(crate) fn verify_peer_certificates(
    cfg: &Config,
    certificates: &[Vec<u8>],
    required: bool,
) -> Result<bool, Error> {
    if let Some(verifier) = cfg.verify_peer_certificate() {
        (**verifier)(certificates)?;
        return Ok(true);
    }
    if required {
        return Err(Error::NoCertificateVerifier);
    }
    Ok(false)
}
