use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};

use super::{AuthenticationType, CipherSuite};
use crate::crypto::prf::key_expansion;
use crate::message::{CipherSuiteId, ClientCertificateType, HashAlgorithm, KeyExchangeAlgorithm};
use crate::record::{RecordLayerHeader, RECORD_HEADER_LEN};
use crate::util::put_u48;
use crate::Error;

const FIXED_IV_LEN: usize = 4;
const EXPLICIT_NONCE_LEN: usize = 8;
const TAG_LEN: usize = 16;

enum GcmKey {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl GcmKey {
    fn new(key: &[u8]) -> Result<Self, Error> {
        match key.len() {
            16 => Ok(GcmKey::Aes128(Box::new(
                Aes128Gcm::new_from_slice(key).map_err(|_| Error::Crypto("bad key".into()))?,
            ))),
            32 => Ok(GcmKey::Aes256(Box::new(
                Aes256Gcm::new_from_slice(key).map_err(|_| Error::Crypto("bad key".into()))?,
            ))),
            n => Err(Error::Crypto(format!("invalid AES-GCM key size: {}", n))),
        }
    }

    fn seal(&self, nonce: &[u8; 12], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>, Error> {
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload { msg, aad };
        let out = match self {
            GcmKey::Aes128(c) => c.encrypt(nonce, payload)?,
            GcmKey::Aes256(c) => c.encrypt(nonce, payload)?,
        };
        Ok(out)
    }

    fn open(&self, nonce: &[u8; 12], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>, Error> {
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload { msg, aad };
        let out = match self {
            GcmKey::Aes128(c) => c.decrypt(nonce, payload)?,
            GcmKey::Aes256(c) => c.decrypt(nonce, payload)?,
        };
        Ok(out)
    }
}

struct Keys {
    local: GcmKey,
    local_iv: Vec<u8>,
    remote: GcmKey,
    remote_iv: Vec<u8>,
}

/// The AES-GCM suites (RFC 5288, RFC 6655 style DTLS 1.2 AEAD).
pub struct AesGcmSuite {
    id: CipherSuiteId,
    keys: Option<Keys>,
}

impl AesGcmSuite {
    pub fn new(id: CipherSuiteId) -> Option<Self> {
        match id {
            CipherSuiteId::Unknown(_) => None,
            _ => Some(AesGcmSuite { id, keys: None }),
        }
    }

    fn key_len(&self) -> usize {
        match self.id {
            CipherSuiteId::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
            | CipherSuiteId::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 => 32,
            _ => 16,
        }
    }

    fn keys(&self) -> Result<&Keys, Error> {
        self.keys.as_ref().ok_or(Error::CipherSuiteNotInitialized)
    }
}

impl std::fmt::Debug for AesGcmSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmSuite")
            .field("id", &self.id)
            .field("initialized", &self.keys.is_some())
            .finish()
    }
}

/// seq_num(epoch + sequence) + type + version + length
fn additional_data(header: &RecordLayerHeader, payload_len: usize) -> Vec<u8> {
    let mut aad = Vec::with_capacity(RECORD_HEADER_LEN);
    aad.extend_from_slice(&header.epoch.to_be_bytes());
    put_u48(&mut aad, header.sequence_number);
    aad.push(header.content_type.as_u8());
    header.version.serialize(&mut aad);
    aad.extend_from_slice(&(payload_len as u16).to_be_bytes());
    aad
}

impl CipherSuite for AesGcmSuite {
    fn id(&self) -> CipherSuiteId {
        self.id
    }

    fn is_elliptic(&self) -> bool {
        self.key_exchange_algorithm() == KeyExchangeAlgorithm::Ecdhe
    }

    fn authentication_type(&self) -> AuthenticationType {
        match self.id {
            CipherSuiteId::TLS_PSK_WITH_AES_128_GCM_SHA256 => AuthenticationType::PreSharedKey,
            _ => AuthenticationType::Certificate,
        }
    }

    fn key_exchange_algorithm(&self) -> KeyExchangeAlgorithm {
        match self.id {
            CipherSuiteId::TLS_PSK_WITH_AES_128_GCM_SHA256 => KeyExchangeAlgorithm::Psk,
            _ => KeyExchangeAlgorithm::Ecdhe,
        }
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        match self.id {
            CipherSuiteId::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
            | CipherSuiteId::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 => HashAlgorithm::SHA384,
            _ => HashAlgorithm::SHA256,
        }
    }

    fn certificate_type(&self) -> Option<ClientCertificateType> {
        match self.id {
            CipherSuiteId::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
            | CipherSuiteId::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 => {
                Some(ClientCertificateType::ECDSA_SIGN)
            }
            CipherSuiteId::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
            | CipherSuiteId::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 => {
                Some(ClientCertificateType::RSA_SIGN)
            }
            _ => None,
        }
    }

    fn is_initialized(&self) -> bool {
        self.keys.is_some()
    }

    fn init(
        &mut self,
        master_secret: &[u8],
        client_random: &[u8],
        server_random: &[u8],
        is_client: bool,
    ) -> Result<(), Error> {
        let k = key_expansion(
            master_secret,
            client_random,
            server_random,
            self.key_len(),
            FIXED_IV_LEN,
            self.hash_algorithm(),
        )?;

        let (local_key, local_iv, remote_key, remote_iv) = if is_client {
            (
                &k.client_write_key,
                &k.client_write_iv,
                &k.server_write_key,
                &k.server_write_iv,
            )
        } else {
            (
                &k.server_write_key,
                &k.server_write_iv,
                &k.client_write_key,
                &k.client_write_iv,
            )
        };

        self.keys = Some(Keys {
            local: GcmKey::new(local_key)?,
            local_iv: local_iv.clone(),
            remote: GcmKey::new(remote_key)?,
            remote_iv: remote_iv.clone(),
        });

        Ok(())
    }

    fn encrypt(&self, header: &RecordLayerHeader, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let keys = self.keys()?;

        let mut explicit = Vec::with_capacity(EXPLICIT_NONCE_LEN);
        explicit.extend_from_slice(&header.epoch.to_be_bytes());
        put_u48(&mut explicit, header.sequence_number);

        let mut nonce = [0u8; 12];
        nonce[..FIXED_IV_LEN].copy_from_slice(&keys.local_iv);
        nonce[FIXED_IV_LEN..].copy_from_slice(&explicit);

        let aad = additional_data(header, payload.len());
        let sealed = keys.local.seal(&nonce, &aad, payload)?;

        let mut out = explicit;
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, header: &RecordLayerHeader, fragment: &[u8]) -> Result<Vec<u8>, Error> {
        let keys = self.keys()?;

        if fragment.len() < EXPLICIT_NONCE_LEN + TAG_LEN {
            return Err(Error::Crypto(format!(
                "AES-GCM fragment too short: {}",
                fragment.len()
            )));
        }

        let (explicit, sealed) = fragment.split_at(EXPLICIT_NONCE_LEN);
        let mut nonce = [0u8; 12];
        nonce[..FIXED_IV_LEN].copy_from_slice(&keys.remote_iv);
        nonce[FIXED_IV_LEN..].copy_from_slice(explicit);

        let aad = additional_data(header, sealed.len() - TAG_LEN);
        keys.remote.open(&nonce, &aad, sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ProtocolVersion;
    use crate::record::ContentType;

    fn pair(id: CipherSuiteId) -> (AesGcmSuite, AesGcmSuite) {
        let master = [0x42; 48];
        let mut client = AesGcmSuite::new(id).unwrap();
        let mut server = AesGcmSuite::new(id).unwrap();
        client.init(&master, &[1; 32], &[2; 32], true).unwrap();
        server.init(&master, &[1; 32], &[2; 32], false).unwrap();
        (client, server)
    }

    fn header() -> RecordLayerHeader {
        RecordLayerHeader {
            content_type: ContentType::Handshake,
            version: ProtocolVersion::DTLS1_2,
            epoch: 1,
            sequence_number: 0,
            length: 0,
        }
    }

    #[test]
    fn client_to_server() {
        let (client, server) = pair(CipherSuiteId::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256);
        let sealed = client.encrypt(&header(), b"finished").unwrap();
        assert_eq!(sealed.len(), 8 + 8 + 16);
        assert_eq!(server.decrypt(&header(), &sealed).unwrap(), b"finished");
    }

    #[test]
    fn aes256_suite() {
        let (client, server) = pair(CipherSuiteId::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384);
        assert_eq!(client.hash_algorithm(), HashAlgorithm::SHA384);
        let sealed = server.encrypt(&header(), b"data").unwrap();
        assert_eq!(client.decrypt(&header(), &sealed).unwrap(), b"data");
    }

    #[test]
    fn tampered_header_fails() {
        let (client, server) = pair(CipherSuiteId::TLS_PSK_WITH_AES_128_GCM_SHA256);
        let sealed = client.encrypt(&header(), b"hello").unwrap();
        let mut other = header();
        other.epoch = 2;
        assert!(server.decrypt(&other, &sealed).is_err());
    }

    #[test]
    fn uninitialized_suite() {
        let suite = AesGcmSuite::new(CipherSuiteId::TLS_PSK_WITH_AES_128_GCM_SHA256).unwrap();
        assert!(!suite.is_initialized());
        assert!(matches!(
            suite.encrypt(&header(), b"x"),
            Err(Error::CipherSuiteNotInitialized)
        ));
        assert_eq!(suite.key_exchange_algorithm(), KeyExchangeAlgorithm::Psk);
        assert!(!suite.is_elliptic());
    }
}
