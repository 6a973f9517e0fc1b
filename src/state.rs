//! Mutable per-connection handshake state.
//!
//! Flights own a `&mut ConnectionState` while they run. The epoch counters are
//! the one part that is shared with the record layer, so they live behind an
//! `Arc` of atomics.

use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::cipher_suite::CipherSuite;
use crate::crypto::{prf, KeyPair};
use crate::message::{Cookie, HashAlgorithm, KeyExchangeAlgorithm, NamedCurve, Random};
use crate::message::{SessionId, SrtpProtectionProfile};
use crate::Error;

/// Local and remote epoch, readable from the record layer.
#[derive(Debug, Default)]
pub struct EpochCounters {
    local: AtomicU16,
    remote: AtomicU16,
}

impl EpochCounters {
    pub fn local(&self) -> u16 {
        self.local.load(Ordering::SeqCst)
    }

    pub fn remote(&self) -> u16 {
        self.remote.load(Ordering::SeqCst)
    }

    pub fn set_local(&self, epoch: u16) {
        self.local.store(epoch, Ordering::SeqCst);
    }

    pub fn set_remote(&self, epoch: u16) {
        self.remote.store(epoch, Ordering::SeqCst);
    }
}

/// Everything the flights learn and decide during one handshake attempt.
pub struct ConnectionState {
    epochs: Arc<EpochCounters>,

    /// The side this state belongs to.
    pub is_client: bool,

    /// Next message_seq for an outgoing handshake message.
    pub handshake_send_sequence: u16,
    /// Next message_seq expected from the peer.
    pub handshake_recv_sequence: u16,

    pub local_random: Random,
    pub remote_random: Random,

    /// Absent until the server hands one out.
    pub cookie: Option<Cookie>,
    pub session_id: SessionId,

    pub master_secret: Zeroizing<Vec<u8>>,
    pub pre_master_secret: Zeroizing<Vec<u8>>,
    pub extended_master_secret: bool,

    pub cipher_suite: Option<Box<dyn CipherSuite>>,
    pub named_curve: NamedCurve,
    pub local_keypair: Option<KeyPair>,

    /// `None`: connection IDs not in use. `Some(empty)`: supported, but
    /// no ID assigned in this direction.
    pub local_connection_id: Option<Vec<u8>>,
    pub remote_connection_id: Option<Vec<u8>>,

    pub peer_certificates: Vec<Vec<u8>>,
    pub peer_certificates_verified: bool,

    pub srtp_protection_profile: Option<SrtpProtectionProfile>,
    pub negotiated_protocol: Option<String>,
    /// ALPN protocols the client offered, server side only.
    pub peer_supported_protocols: Vec<String>,
    pub server_name: Option<String>,

    /// PSK identity hint from the server, or the client's PSK identity on the
    /// server side.
    pub identity_hint: Vec<u8>,
    pub remote_requested_certificate: bool,

    // Cached once per flight entry so that a regenerated flight repeats
    // the same bytes.
    pub local_verify_data: Vec<u8>,
    pub local_certificates_verify: Vec<u8>,
    pub local_key_signature: Vec<u8>,
}

impl ConnectionState {
    pub fn new(is_client: bool) -> Self {
        ConnectionState {
            epochs: Arc::new(EpochCounters::default()),
            is_client,
            handshake_send_sequence: 0,
            handshake_recv_sequence: 0,
            local_random: Random::default(),
            remote_random: Random::default(),
            cookie: None,
            session_id: SessionId::empty(),
            master_secret: Zeroizing::new(Vec::new()),
            pre_master_secret: Zeroizing::new(Vec::new()),
            extended_master_secret: false,
            cipher_suite: None,
            named_curve: NamedCurve::default(),
            local_keypair: None,
            local_connection_id: None,
            remote_connection_id: None,
            peer_certificates: Vec::new(),
            peer_certificates_verified: false,
            srtp_protection_profile: None,
            negotiated_protocol: None,
            peer_supported_protocols: Vec::new(),
            server_name: None,
            identity_hint: Vec::new(),
            remote_requested_certificate: false,
            local_verify_data: Vec::new(),
            local_certificates_verify: Vec::new(),
            local_key_signature: Vec::new(),
        }
    }

    /// Handle for the record layer.
    pub fn epoch_counters(&self) -> Arc<EpochCounters> {
        self.epochs.clone()
    }

    pub fn local_epoch(&self) -> u16 {
        self.epochs.local()
    }

    pub fn remote_epoch(&self) -> u16 {
        self.epochs.remote()
    }

    pub fn set_local_epoch(&self, epoch: u16) {
        self.epochs.set_local(epoch);
    }

    pub fn set_remote_epoch(&self, epoch: u16) {
        self.epochs.set_remote(epoch);
    }

    /// Key exchange of the negotiated suite, used to pick message layouts.
    pub fn key_exchange_algorithm(&self) -> Option<KeyExchangeAlgorithm> {
        self.cipher_suite.as_ref().map(|s| s.key_exchange_algorithm())
    }

    pub fn hash_algorithm(&self) -> Result<HashAlgorithm, Error> {
        self.cipher_suite
            .as_ref()
            .map(|s| s.hash_algorithm())
            .ok_or(Error::InvalidCipherSuite)
    }

    pub fn client_random(&self) -> [u8; 32] {
        if self.is_client {
            self.local_random.to_bytes()
        } else {
            self.remote_random.to_bytes()
        }
    }

    pub fn server_random(&self) -> [u8; 32] {
        if self.is_client {
            self.remote_random.to_bytes()
        } else {
            self.local_random.to_bytes()
        }
    }

    /// Derive traffic keys for the negotiated suite from the master secret.
    ///
    /// No-op if already done.
    pub fn init_cipher_suite(&mut self) -> Result<(), Error> {
        let client_random = self.client_random();
        let server_random = self.server_random();
        let is_client = self.is_client;

        let suite = self.cipher_suite.as_mut().ok_or(Error::InvalidCipherSuite)?;
        if suite.is_initialized() {
            return Ok(());
        }

        trace!("Init cipher suite {:?}", suite.id());
        suite.init(&self.master_secret, &client_random, &server_random, is_client)
    }

    /// RFC 5705 exporter over the finished handshake.
    pub fn export_keying_material(
        &self,
        label: &str,
        context: Option<&[u8]>,
        length: usize,
    ) -> Result<Vec<u8>, Error> {
        let suite = self
            .cipher_suite
            .as_ref()
            .filter(|s| s.is_initialized())
            .ok_or(Error::CipherSuiteNotInitialized)?;

        prf::export_keying_material(
            &self.master_secret,
            label,
            context,
            &self.client_random(),
            &self.server_random(),
            length,
            suite.hash_algorithm(),
        )
    }
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionState")
            .field("is_client", &self.is_client)
            .field("local_epoch", &self.local_epoch())
            .field("remote_epoch", &self.remote_epoch())
            .field("handshake_send_sequence", &self.handshake_send_sequence)
            .field("handshake_recv_sequence", &self.handshake_recv_sequence)
            .field("cipher_suite", &self.cipher_suite.as_ref().map(|s| s.id()))
            .field("named_curve", &self.named_curve)
            .field("extended_master_secret", &self.extended_master_secret)
            .finish_non_exhaustive()
    }
}
