//! Local certificates and self-signed certificate generation.

use rcgen::{
    Certificate as RcgenCertificate, CertificateParams, DistinguishedName, DnType, IsCa,
    KeyPair as RcgenKeyPair, PKCS_ECDSA_P256_SHA256,
};
use sha2::{Digest, Sha256};

use crate::crypto::PrivateKey;
use crate::Error;

/// A certificate chain with the private key of its leaf.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// DER encoded certificates, leaf first.
    pub certificate: Vec<Vec<u8>>,
    pub private_key: PrivateKey,
}

impl Certificate {
    pub fn new(certificate: Vec<Vec<u8>>, private_key: PrivateKey) -> Self {
        Certificate {
            certificate,
            private_key,
        }
    }

    /// Generate a self-signed ECDSA P-256 certificate valid for one year.
    pub fn generate_self_signed(subject_alt_names: Vec<String>) -> Result<Self, Error> {
        let failed = |e: rcgen::RcgenError| Error::CertificateGeneration(e.to_string());

        let key_pair = RcgenKeyPair::generate(&PKCS_ECDSA_P256_SHA256).map_err(failed)?;

        let common_name = subject_alt_names
            .first()
            .cloned()
            .unwrap_or_else(|| "dflight".to_string());
        let mut params = CertificateParams::new(subject_alt_names);

        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::CommonName, common_name);
        params.distinguished_name = distinguished_name;
        params.is_ca = IsCa::NoCa;
        params.key_pair = Some(key_pair);

        let not_before = time::OffsetDateTime::now_utc();
        params.not_before = not_before;
        params.not_after = not_before + time::Duration::days(365);

        let cert = RcgenCertificate::from_params(params).map_err(failed)?;
        let cert_der = cert.serialize_der().map_err(failed)?;
        let private_key = PrivateKey::from_der(&cert.serialize_private_key_der())?;

        Ok(Certificate {
            certificate: vec![cert_der],
            private_key,
        })
    }

    /// SHA-256 fingerprint of the leaf, as "AF:12:F6:...".
    pub fn fingerprint(&self) -> Option<String> {
        let leaf = self.certificate.first()?;
        let digest = Sha256::digest(leaf);
        Some(
            digest
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(":"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SignatureAlgorithm;

    #[test]
    fn self_signed() {
        let cert = Certificate::generate_self_signed(vec!["example.com".into()]).unwrap();
        assert_eq!(cert.certificate.len(), 1);
        assert_eq!(
            cert.private_key.signature_algorithm(),
            SignatureAlgorithm::ECDSA
        );

        let fp = cert.fingerprint().unwrap();
        assert_eq!(fp.len(), 32 * 3 - 1);
    }
}
