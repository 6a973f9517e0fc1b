use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::certificate::Certificate;
use crate::cipher_suite::{cipher_suite_for_id, default_cipher_suites};
use crate::message::{CipherSuiteId, ClientCertificateType, HashAlgorithm, NamedCurve};
use crate::message::{SignatureAlgorithm, SignatureAndHashAlgorithm, SrtpProtectionProfile};
use crate::session::SessionStore;
use crate::Error;

/// Looks up the pre-shared key for an identity (client: the server's hint).
pub type PskCallback = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>, Error> + Send + Sync>;

/// Inspects the peer's raw DER certificate chain after the handshake
/// signature checks succeed.
pub type VerifyPeerCertificate = Arc<dyn Fn(&[Vec<u8>]) -> Result<(), Error> + Send + Sync>;

/// Produces the connection ID we ask the peer to use. `None` offers support
/// without requesting an ID.
pub type ConnectionIdGenerator = Arc<dyn Fn() -> Option<Vec<u8>> + Send + Sync>;

/// Extended Master Secret (RFC 7627) policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtendedMasterSecretType {
    /// Offer it, accept peers without it.
    #[default]
    Request,
    /// Fail the handshake unless the peer supports it.
    Require,
    /// Never offer it.
    Disable,
}

/// Server policy for client certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ClientAuthType {
    #[default]
    NoClientCert,
    RequestClientCert,
    RequireAnyClientCert,
    VerifyClientCertIfGiven,
    RequireAndVerifyClientCert,
}

/// Handshake configuration
#[derive(Clone)]
pub struct Config {
    cipher_suites: Vec<CipherSuiteId>,
    signature_schemes: Vec<SignatureAndHashAlgorithm>,
    curves: Vec<NamedCurve>,
    srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    extended_master_secret: ExtendedMasterSecretType,
    server_name: Option<String>,
    supported_protocols: Vec<String>,
    session_store: Option<Arc<dyn SessionStore>>,
    connection_id_generator: Option<ConnectionIdGenerator>,
    certificates: Vec<Certificate>,
    psk: Option<PskCallback>,
    psk_identity_hint: Option<Vec<u8>>,
    insecure_skip_verify: bool,
    verify_peer_certificate: Option<VerifyPeerCertificate>,
    client_auth: ClientAuthType,
    client_cas: Vec<Vec<u8>>,
    insecure_skip_hello_verify: bool,
    initial_epoch: u16,
    flight_start_rto: Duration,
    flight_retries: usize,
    handshake_timeout: Duration,
    rng_seed: Option<u64>,
}

/// Signature schemes offered when none are configured.
pub fn default_signature_schemes() -> Vec<SignatureAndHashAlgorithm> {
    use HashAlgorithm::*;
    use SignatureAlgorithm::*;
    vec![
        SignatureAndHashAlgorithm::new(SHA256, ECDSA),
        SignatureAndHashAlgorithm::new(SHA384, ECDSA),
        SignatureAndHashAlgorithm::new(SHA256, RSA),
        SignatureAndHashAlgorithm::new(SHA384, RSA),
        SignatureAndHashAlgorithm::new(SHA512, RSA),
    ]
}

/// Curves offered when none are configured.
pub fn default_curves() -> Vec<NamedCurve> {
    vec![
        NamedCurve::X25519,
        NamedCurve::Secp256r1,
        NamedCurve::Secp384r1,
    ]
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            cipher_suites: None,
            signature_schemes: default_signature_schemes(),
            curves: default_curves(),
            srtp_protection_profiles: Vec::new(),
            extended_master_secret: ExtendedMasterSecretType::Request,
            server_name: None,
            supported_protocols: Vec::new(),
            session_store: None,
            connection_id_generator: None,
            certificates: Vec::new(),
            psk: None,
            psk_identity_hint: None,
            insecure_skip_verify: false,
            verify_peer_certificate: None,
            client_auth: ClientAuthType::NoClientCert,
            client_cas: Vec::new(),
            insecure_skip_hello_verify: false,
            initial_epoch: 0,
            flight_start_rto: Duration::from_secs(1),
            flight_retries: 4,
            handshake_timeout: Duration::from_secs(40),
            rng_seed: None,
        }
    }

    /// Cipher suites in order of preference.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[CipherSuiteId] {
        &self.cipher_suites
    }

    /// Signature schemes we accept and sign with.
    #[inline(always)]
    pub fn signature_schemes(&self) -> &[SignatureAndHashAlgorithm] {
        &self.signature_schemes
    }

    /// ECDHE curves in order of preference.
    #[inline(always)]
    pub fn curves(&self) -> &[NamedCurve] {
        &self.curves
    }

    /// SRTP protection profiles (RFC 5764). Empty disables DTLS-SRTP.
    #[inline(always)]
    pub fn srtp_protection_profiles(&self) -> &[SrtpProtectionProfile] {
        &self.srtp_protection_profiles
    }

    #[inline(always)]
    pub fn extended_master_secret(&self) -> ExtendedMasterSecretType {
        self.extended_master_secret
    }

    /// Server name sent in SNI by a client.
    #[inline(always)]
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// ALPN protocols in order of preference.
    #[inline(always)]
    pub fn supported_protocols(&self) -> &[String] {
        &self.supported_protocols
    }

    /// Store for resumable sessions. Resumption is off without one.
    #[inline(always)]
    pub fn session_store(&self) -> Option<&Arc<dyn SessionStore>> {
        self.session_store.as_ref()
    }

    #[inline(always)]
    pub fn connection_id_generator(&self) -> Option<&ConnectionIdGenerator> {
        self.connection_id_generator.as_ref()
    }

    /// Local certificate chains.
    #[inline(always)]
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    #[inline(always)]
    pub fn psk(&self) -> Option<&PskCallback> {
        self.psk.as_ref()
    }

    #[inline(always)]
    pub fn psk_identity_hint(&self) -> Option<&[u8]> {
        self.psk_identity_hint.as_deref()
    }

    /// Skip the peer certificate verifier. Signatures are still checked.
    #[inline(always)]
    pub fn insecure_skip_verify(&self) -> bool {
        self.insecure_skip_verify
    }

    #[inline(always)]
    pub fn verify_peer_certificate(&self) -> Option<&VerifyPeerCertificate> {
        self.verify_peer_certificate.as_ref()
    }

    /// For a server, the client certificate policy.
    #[inline(always)]
    pub fn client_auth(&self) -> ClientAuthType {
        self.client_auth
    }

    /// DER distinguished names sent in CertificateRequest.
    #[inline(always)]
    pub fn client_cas(&self) -> &[Vec<u8>] {
        &self.client_cas
    }

    /// For a server, answer the first ClientHello without a cookie exchange.
    #[inline(always)]
    pub fn insecure_skip_hello_verify(&self) -> bool {
        self.insecure_skip_hello_verify
    }

    /// Offset added to every record epoch the handshake produces.
    #[inline(always)]
    pub fn initial_epoch(&self) -> u16 {
        self.initial_epoch
    }

    /// Time of first retry.
    ///
    /// Every flight restarts with this value.
    /// Doubled for every retry with a ±25% jitter.
    #[inline(always)]
    pub fn flight_start_rto(&self) -> Duration {
        self.flight_start_rto
    }

    /// Max number of retries per flight.
    #[inline(always)]
    pub fn flight_retries(&self) -> usize {
        self.flight_retries
    }

    /// Timeout for the entire handshake, regardless of flights.
    #[inline(always)]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Seed for the retransmission jitter. Random when unset.
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }

    /// Local certificate to present for a suite.
    ///
    /// Prefers a chain whose key matches the suite's certificate type.
    pub fn certificate_for(&self, cert_type: Option<ClientCertificateType>) -> Option<&Certificate> {
        self.certificates
            .iter()
            .find(|c| Some(c.private_key.certificate_type()) == cert_type)
            .or_else(|| self.certificates.first())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("cipher_suites", &self.cipher_suites)
            .field("curves", &self.curves)
            .field("extended_master_secret", &self.extended_master_secret)
            .field("client_auth", &self.client_auth)
            .field("certificates", &self.certificates.len())
            .field("psk", &self.psk.is_some())
            .field("initial_epoch", &self.initial_epoch)
            .finish_non_exhaustive()
    }
}

/// Builder for handshake configuration.
pub struct ConfigBuilder {
    cipher_suites: Option<Vec<CipherSuiteId>>,
    signature_schemes: Vec<SignatureAndHashAlgorithm>,
    curves: Vec<NamedCurve>,
    srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    extended_master_secret: ExtendedMasterSecretType,
    server_name: Option<String>,
    supported_protocols: Vec<String>,
    session_store: Option<Arc<dyn SessionStore>>,
    connection_id_generator: Option<ConnectionIdGenerator>,
    certificates: Vec<Certificate>,
    psk: Option<PskCallback>,
    psk_identity_hint: Option<Vec<u8>>,
    insecure_skip_verify: bool,
    verify_peer_certificate: Option<VerifyPeerCertificate>,
    client_auth: ClientAuthType,
    client_cas: Vec<Vec<u8>>,
    insecure_skip_hello_verify: bool,
    initial_epoch: u16,
    flight_start_rto: Duration,
    flight_retries: usize,
    handshake_timeout: Duration,
    rng_seed: Option<u64>,
}

impl ConfigBuilder {
    /// Set the cipher suites in order of preference.
    ///
    /// Defaults to the four ECDHE AES-GCM suites, or the PSK suite when a
    /// PSK callback is set.
    pub fn cipher_suites(mut self, suites: &[CipherSuiteId]) -> Self {
        self.cipher_suites = Some(suites.to_vec());
        self
    }

    pub fn signature_schemes(mut self, schemes: &[SignatureAndHashAlgorithm]) -> Self {
        self.signature_schemes = schemes.to_vec();
        self
    }

    /// Defaults to X25519, P-256, P-384.
    pub fn curves(mut self, curves: &[NamedCurve]) -> Self {
        self.curves = curves.to_vec();
        self
    }

    pub fn srtp_protection_profiles(mut self, profiles: &[SrtpProtectionProfile]) -> Self {
        self.srtp_protection_profiles = profiles.to_vec();
        self
    }

    /// Defaults to [`ExtendedMasterSecretType::Request`].
    pub fn extended_master_secret(mut self, ems: ExtendedMasterSecretType) -> Self {
        self.extended_master_secret = ems;
        self
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn supported_protocols(mut self, protocols: &[&str]) -> Self {
        self.supported_protocols = protocols.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn connection_id_generator(mut self, generator: ConnectionIdGenerator) -> Self {
        self.connection_id_generator = Some(generator);
        self
    }

    pub fn certificate(mut self, certificate: Certificate) -> Self {
        self.certificates.push(certificate);
        self
    }

    pub fn psk(mut self, callback: PskCallback) -> Self {
        self.psk = Some(callback);
        self
    }

    pub fn psk_identity_hint(mut self, hint: &[u8]) -> Self {
        self.psk_identity_hint = Some(hint.to_vec());
        self
    }

    /// Defaults to false.
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    pub fn verify_peer_certificate(mut self, verifier: VerifyPeerCertificate) -> Self {
        self.verify_peer_certificate = Some(verifier);
        self
    }

    /// Defaults to [`ClientAuthType::NoClientCert`].
    pub fn client_auth(mut self, client_auth: ClientAuthType) -> Self {
        self.client_auth = client_auth;
        self
    }

    pub fn client_cas(mut self, names: Vec<Vec<u8>>) -> Self {
        self.client_cas = names;
        self
    }

    /// Defaults to false.
    pub fn insecure_skip_hello_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_hello_verify = skip;
        self
    }

    /// Defaults to 0. The handshake uses this epoch and the one after it,
    /// so `u16::MAX` is refused by [`build`](Self::build).
    pub fn initial_epoch(mut self, epoch: u16) -> Self {
        self.initial_epoch = epoch;
        self
    }

    /// Set the time of first retry.
    ///
    /// Defaults to 1 second.
    pub fn flight_start_rto(mut self, rto: Duration) -> Self {
        self.flight_start_rto = rto;
        self
    }

    /// Defaults to 4.
    pub fn flight_retries(mut self, retries: usize) -> Self {
        self.flight_retries = retries;
        self
    }

    /// Defaults to 40 seconds.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::Config` for combinations that cannot handshake.
    pub fn build(self) -> Result<Config, Error> {
        let psk_only = vec![CipherSuiteId::TLS_PSK_WITH_AES_128_GCM_SHA256];
        let cipher_suites = match self.cipher_suites {
            Some(suites) => suites,
            None if self.psk.is_some() => psk_only,
            None => default_cipher_suites(),
        };

        if cipher_suites.is_empty() {
            return Err(Error::Config("no cipher suites configured".into()));
        }

        let mut has_psk_suite = false;
        for id in &cipher_suites {
            let suite = cipher_suite_for_id(*id)
                .ok_or_else(|| Error::Config(format!("unsupported cipher suite {:?}", id)))?;
            if !suite.is_elliptic() {
                has_psk_suite = true;
            }
        }

        if has_psk_suite && self.psk.is_none() {
            return Err(Error::Config("PSK cipher suite without a PSK callback".into()));
        }
        if self.psk.is_some() && !self.certificates.is_empty() {
            return Err(Error::Config("PSK and certificates are exclusive".into()));
        }
        if self.psk_identity_hint.is_some() && self.psk.is_none() {
            return Err(Error::Config("PSK identity hint without a PSK callback".into()));
        }

        if let Some(curve) = self.curves.iter().find(|c| !c.is_supported()) {
            return Err(Error::Config(format!("unsupported curve {:?}", curve)));
        }

        if self.supported_protocols.iter().any(|p| p.is_empty() || p.len() > 255) {
            return Err(Error::InvalidAlpnFormat);
        }

        if self.initial_epoch == u16::MAX {
            return Err(Error::Config("initial epoch leaves no room for the next one".into()));
        }

        Ok(Config {
            cipher_suites,
            signature_schemes: self.signature_schemes,
            curves: self.curves,
            srtp_protection_profiles: self.srtp_protection_profiles,
            extended_master_secret: self.extended_master_secret,
            server_name: self.server_name,
            supported_protocols: self.supported_protocols,
            session_store: self.session_store,
            connection_id_generator: self.connection_id_generator,
            certificates: self.certificates,
            psk: self.psk,
            psk_identity_hint: self.psk_identity_hint,
            insecure_skip_verify: self.insecure_skip_verify,
            verify_peer_certificate: self.verify_peer_certificate,
            client_auth: self.client_auth,
            client_cas: self.client_cas,
            insecure_skip_hello_verify: self.insecure_skip_hello_verify,
            initial_epoch: self.initial_epoch,
            flight_start_rto: self.flight_start_rto,
            flight_retries: self.flight_retries,
            handshake_timeout: self.handshake_timeout,
            rng_seed: self.rng_seed,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}
