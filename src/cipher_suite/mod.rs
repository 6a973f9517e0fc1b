//! Cipher suites as seen by the handshake: negotiation properties plus
//! record protection once keys are installed.

use std::fmt;

use crate::message::{CipherSuiteId, ClientCertificateType, HashAlgorithm, KeyExchangeAlgorithm};
use crate::record::RecordLayerHeader;
use crate::Error;

mod aes_gcm;

pub use self::aes_gcm::AesGcmSuite;

/// How the server proves its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationType {
    Certificate,
    PreSharedKey,
    Anonymous,
}

/// A negotiated cipher suite.
///
/// Created uninitialized when a suite is chosen and initialized exactly once
/// with the master secret.
pub trait CipherSuite: fmt::Debug + Send + Sync {
    fn id(&self) -> CipherSuiteId;

    /// Whether the suite uses elliptic curve key exchange or signatures.
    fn is_elliptic(&self) -> bool;

    fn authentication_type(&self) -> AuthenticationType;

    fn key_exchange_algorithm(&self) -> KeyExchangeAlgorithm;

    /// Hash for the PRF and the handshake transcript.
    fn hash_algorithm(&self) -> HashAlgorithm;

    /// The certificate key type the suite signs with, if any.
    fn certificate_type(&self) -> Option<ClientCertificateType>;

    fn is_initialized(&self) -> bool;

    /// Derive and install the traffic keys.
    fn init(
        &mut self,
        master_secret: &[u8],
        client_random: &[u8],
        server_random: &[u8],
        is_client: bool,
    ) -> Result<(), Error>;

    /// Seal a record payload. Returns the record fragment to send.
    fn encrypt(&self, header: &RecordLayerHeader, payload: &[u8]) -> Result<Vec<u8>, Error>;

    /// Open a record fragment. Returns the plaintext payload.
    fn decrypt(&self, header: &RecordLayerHeader, fragment: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Uninitialized implementation of a suite id, if this crate has one.
pub fn cipher_suite_for_id(id: CipherSuiteId) -> Option<Box<dyn CipherSuite>> {
    AesGcmSuite::new(id).map(|s| Box::new(s) as Box<dyn CipherSuite>)
}

/// The cipher suites used when none are configured.
pub fn default_cipher_suites() -> Vec<CipherSuiteId> {
    vec![
        CipherSuiteId::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        CipherSuiteId::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        CipherSuiteId::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        CipherSuiteId::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    ]
}
