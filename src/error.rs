use std::fmt;

use thiserror::Error;

use crate::alert::Alert;
use crate::message::NamedCurve;

/// Errors surfaced by the handshake engine.
///
/// Flights pair most of these with an [`Alert`] for the peer, see
/// [`FlightFailure`](crate::flight::FlightFailure).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported protocol version")]
    UnsupportedProtocolVersion,

    #[error("Handshake cancelled")]
    Cancelled,

    #[error("Handshake deadline exceeded")]
    DeadlineExceeded,

    #[error("Timeout: {0}")]
    Timeout(&'static str),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Handshake is still in progress")]
    HandshakeInProgress,

    /// The handshake gave up with this fatal alert and sent it to the peer.
    #[error("Handshake aborted, sent alert: {0}")]
    Alert(Alert),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No cipher suite in common with the peer")]
    CipherSuiteNoIntersection,

    #[error("Invalid or unexpected cipher suite")]
    InvalidCipherSuite,

    #[error("Cipher suite used before it was initialized")]
    CipherSuiteNotInitialized,

    #[error("No elliptic curve in common with the peer")]
    NoSupportedEllipticCurves,

    #[error("Unsupported elliptic curve {0:?}")]
    UnsupportedCurve(NamedCurve),

    #[error("Client offered no matching SRTP profile")]
    ServerNoMatchingSrtpProfile,

    #[error("Server selected an SRTP profile we did not offer")]
    ClientNoMatchingSrtpProfile,

    #[error("SRTP was requested but the server did not negotiate it")]
    RequestedButNoSrtpExtension,

    #[error("Extended master secret required but not supported by the server")]
    ClientRequiredButNoServerEms,

    #[error("Extended master secret required but not supported by the client")]
    ServerRequiredButNoClientEms,

    #[error("ALPN extension must carry exactly one protocol")]
    InvalidAlpnFormat,

    #[error("No application protocol in common with the peer")]
    NoApplicationProtocol,

    #[error("Client did not offer null compression")]
    NullCompressionMissing,

    #[error("Cookie mismatch")]
    CookieMismatch,

    #[error("Peer did not send a certificate")]
    InvalidCertificate,

    #[error("CertificateVerify received without a certificate")]
    CertificateVerifyNoCertificate,

    #[error("Client certificate required")]
    ClientCertificateRequired,

    #[error("Client certificate was not verified")]
    ClientCertificateNotVerified,

    #[error("No certificate configured")]
    NoCertificates,

    #[error("No configured signature scheme fits the key")]
    NoAvailableSignatureSchemes,

    #[error("Signature verification failed: {0}")]
    InvalidSignature(String),

    #[error("Peer certificate rejected: {0}")]
    PeerCertificateRejected(String),

    #[error("No peer certificate verifier configured")]
    NoCertificateVerifier,

    #[error("Finished verify data mismatch")]
    VerifyDataMismatch,

    #[error("PSK: {0}")]
    Psk(String),

    #[error("Key exchange failed: {0}")]
    KeyExchange(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Unexpected content type")]
    InvalidContentType,

    #[error("Handshake message too large: {0}")]
    MessageTooLarge(usize),

    #[error("Certificate generation failed: {0}")]
    CertificateGeneration(String),
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        let reason = match value {
            nom::Err::Incomplete(_) => "incomplete input".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!("{:?} at {} remaining bytes", e.code, e.input.len())
            }
        };
        Error::Parse(reason)
    }
}

impl From<aes_gcm::Error> for Error {
    fn from(_: aes_gcm::Error) -> Self {
        Error::Crypto("AEAD operation failed".into())
    }
}

impl From<InvalidLength> for Error {
    fn from(value: InvalidLength) -> Self {
        Error::Parse(value.to_string())
    }
}

/// Length check failure for variable sized ids such as cookies.
pub struct InvalidLength {
    pub(crate) name: &'static str,
    pub(crate) min: usize,
    pub(crate) max: usize,
    pub(crate) actual: usize,
}

impl fmt::Debug for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Incorrect variable ID ({}) length: {} <= {} <= {}",
            self.name, self.min, self.actual, self.max
        )
    }
}

impl std::error::Error for InvalidLength {}
