//! Handshake signatures: ServerKeyExchange params and CertificateVerify.

use std::fmt;

use der::{Decode, Encode};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use pkcs8::DecodePrivateKey;
use rand::thread_rng;
use rsa::pkcs8::DecodePublicKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use signature::{RandomizedSigner, SignatureEncoding, Verifier};
use spki::ObjectIdentifier;
use x509_cert::Certificate as X509Certificate;

use super::prf::digest;
use crate::message::{ecdh_params, ClientCertificateType, HashAlgorithm, NamedCurve};
use crate::message::{SignatureAlgorithm, SignatureAndHashAlgorithm};
use crate::Error;

const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// Private key of a local certificate.
#[derive(Clone)]
pub enum PrivateKey {
    EcdsaP256(p256::ecdsa::SigningKey),
    EcdsaP384(p384::ecdsa::SigningKey),
    Rsa(Box<RsaPrivateKey>),
}

impl PrivateKey {
    /// Load a PKCS#8 DER private key.
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_der(der) {
            return Ok(PrivateKey::EcdsaP256(key));
        }
        if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_der(der) {
            return Ok(PrivateKey::EcdsaP384(key));
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(der) {
            return Ok(PrivateKey::Rsa(Box::new(key)));
        }
        Err(Error::Crypto("unsupported private key format".into()))
    }

    /// Load a PKCS#8 PEM private key.
    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        let (_, doc) = pkcs8::SecretDocument::from_pem(pem)
            .map_err(|e| Error::Crypto(format!("invalid PEM private key: {}", e)))?;
        Self::from_der(doc.as_bytes())
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            PrivateKey::EcdsaP256(_) | PrivateKey::EcdsaP384(_) => SignatureAlgorithm::ECDSA,
            PrivateKey::Rsa(_) => SignatureAlgorithm::RSA,
        }
    }

    pub fn certificate_type(&self) -> ClientCertificateType {
        match self {
            PrivateKey::EcdsaP256(_) | PrivateKey::EcdsaP384(_) => {
                ClientCertificateType::ECDSA_SIGN
            }
            PrivateKey::Rsa(_) => ClientCertificateType::RSA_SIGN,
        }
    }

    /// Sign `message` hashed with `hash`. ECDSA signatures are DER encoded.
    pub fn sign(&self, message: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>, Error> {
        let failed = |e: signature::Error| Error::Crypto(format!("signing failed: {}", e));

        match self {
            PrivateKey::EcdsaP256(key) => {
                let prehash = digest(hash, message)?;
                let sig: p256::ecdsa::Signature = key.sign_prehash(&prehash).map_err(failed)?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            PrivateKey::EcdsaP384(key) => {
                let prehash = digest(hash, message)?;
                let sig: p384::ecdsa::Signature = key.sign_prehash(&prehash).map_err(failed)?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            PrivateKey::Rsa(key) => {
                use rsa::pkcs1v15::SigningKey;

                let key = (**key).clone();
                let mut rng = thread_rng();
                let sig = match hash {
                    HashAlgorithm::SHA256 => SigningKey::<Sha256>::new(key)
                        .try_sign_with_rng(&mut rng, message)
                        .map_err(failed)?
                        .to_vec(),
                    HashAlgorithm::SHA384 => SigningKey::<Sha384>::new(key)
                        .try_sign_with_rng(&mut rng, message)
                        .map_err(failed)?
                        .to_vec(),
                    HashAlgorithm::SHA512 => SigningKey::<Sha512>::new(key)
                        .try_sign_with_rng(&mut rng, message)
                        .map_err(failed)?
                        .to_vec(),
                    _ => return Err(Error::Crypto(format!("unsupported RSA hash: {:?}", hash))),
                };
                Ok(sig)
            }
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivateKey::EcdsaP256(_) => f.debug_tuple("PrivateKey::EcdsaP256").finish(),
            PrivateKey::EcdsaP384(_) => f.debug_tuple("PrivateKey::EcdsaP384").finish(),
            PrivateKey::Rsa(_) => f.debug_tuple("PrivateKey::Rsa").finish(),
        }
    }
}

/// First scheme in `schemes` that `key` can produce.
pub fn select_signature_scheme(
    schemes: &[SignatureAndHashAlgorithm],
    key: &PrivateKey,
) -> Result<SignatureAndHashAlgorithm, Error> {
    schemes
        .iter()
        .find(|s| s.signature == key.signature_algorithm())
        .copied()
        .ok_or(Error::NoAvailableSignatureSchemes)
}

/// client_random + server_random + ServerECDHParams, the signed content of
/// an ECDHE ServerKeyExchange.
pub fn key_signature_message(
    client_random: &[u8],
    server_random: &[u8],
    named_curve: NamedCurve,
    public_key: &[u8],
) -> Vec<u8> {
    let mut message = Vec::with_capacity(64 + 4 + public_key.len());
    message.extend_from_slice(client_random);
    message.extend_from_slice(server_random);
    message.extend_from_slice(&ecdh_params(named_curve, public_key));
    message
}

/// Verify `signature` over `message` with the leaf of `chain`.
pub fn verify_with_chain(
    chain: &[Vec<u8>],
    message: &[u8],
    signature: &[u8],
    algorithm: SignatureAndHashAlgorithm,
) -> Result<(), Error> {
    let leaf = chain.first().ok_or(Error::NoCertificates)?;
    verify(leaf, message, signature, algorithm)
}

/// Verify `signature` over `message` with the public key of a DER certificate.
pub fn verify(
    certificate_der: &[u8],
    message: &[u8],
    signature: &[u8],
    algorithm: SignatureAndHashAlgorithm,
) -> Result<(), Error> {
    let invalid = |msg: &str| Error::InvalidSignature(msg.to_string());

    let cert = X509Certificate::from_der(certificate_der).map_err(|_| Error::InvalidCertificate)?;
    let spki = &cert.tbs_certificate.subject_public_key_info;

    if spki.algorithm.oid == OID_EC_PUBLIC_KEY {
        if algorithm.signature != SignatureAlgorithm::ECDSA {
            return Err(invalid("ECDSA key with non-ECDSA scheme"));
        }

        let public_key = spki
            .subject_public_key
            .as_bytes()
            .ok_or(Error::InvalidCertificate)?;
        let curve: ObjectIdentifier = spki
            .algorithm
            .parameters
            .as_ref()
            .ok_or(Error::InvalidCertificate)?
            .decode_as()
            .map_err(|_| Error::InvalidCertificate)?;

        let prehash = digest(algorithm.hash, message)?;

        match curve {
            OID_P256 => {
                let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
                    .map_err(|_| Error::InvalidCertificate)?;
                let sig = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|_| invalid("malformed ECDSA signature"))?;
                key.verify_prehash(&prehash, &sig)
                    .map_err(|_| invalid("ECDSA verification failed"))
            }
            OID_P384 => {
                let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
                    .map_err(|_| Error::InvalidCertificate)?;
                let sig = p384::ecdsa::Signature::from_der(signature)
                    .map_err(|_| invalid("malformed ECDSA signature"))?;
                key.verify_prehash(&prehash, &sig)
                    .map_err(|_| invalid("ECDSA verification failed"))
            }
            _ => Err(invalid("unsupported EC curve")),
        }
    } else if spki.algorithm.oid == OID_RSA_ENCRYPTION {
        use rsa::pkcs1v15::{Signature, VerifyingKey};

        if algorithm.signature != SignatureAlgorithm::RSA {
            return Err(invalid("RSA key with non-RSA scheme"));
        }

        let spki_der = spki.to_der().map_err(|_| Error::InvalidCertificate)?;
        let key = RsaPublicKey::from_public_key_der(&spki_der)
            .map_err(|_| Error::InvalidCertificate)?;
        let sig = Signature::try_from(signature).map_err(|_| invalid("malformed RSA signature"))?;
        let res = match algorithm.hash {
            HashAlgorithm::SHA256 => VerifyingKey::<Sha256>::new(key).verify(message, &sig),
            HashAlgorithm::SHA384 => VerifyingKey::<Sha384>::new(key).verify(message, &sig),
            HashAlgorithm::SHA512 => VerifyingKey::<Sha512>::new(key).verify(message, &sig),
            _ => return Err(invalid("unsupported RSA hash")),
        };
        res.map_err(|_| invalid("RSA verification failed"))
    } else {
        Err(invalid("unsupported public key algorithm"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::Certificate;

    const ECDSA_SHA256: SignatureAndHashAlgorithm =
        SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::ECDSA);

    #[test]
    fn ecdsa_sign_and_verify() {
        let cert = Certificate::generate_self_signed(vec!["localhost".into()]).unwrap();
        let sig = cert.private_key.sign(b"hello", HashAlgorithm::SHA256).unwrap();

        verify_with_chain(&cert.certificate, b"hello", &sig, ECDSA_SHA256).unwrap();
        assert!(verify_with_chain(&cert.certificate, b"other", &sig, ECDSA_SHA256).is_err());
    }

    #[test]
    fn scheme_must_match_key() {
        let cert = Certificate::generate_self_signed(vec!["localhost".into()]).unwrap();
        let sig = cert.private_key.sign(b"hello", HashAlgorithm::SHA256).unwrap();
        let rsa = SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::RSA);
        assert!(verify_with_chain(&cert.certificate, b"hello", &sig, rsa).is_err());
    }

    #[test]
    fn empty_chain() {
        let res = verify_with_chain(&[], b"hello", &[], ECDSA_SHA256);
        assert!(matches!(res, Err(Error::NoCertificates)));
    }

    #[test]
    fn select_scheme_for_key() {
        let cert = Certificate::generate_self_signed(vec!["localhost".into()]).unwrap();
        let rsa = SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::RSA);

        let scheme = select_signature_scheme(&[rsa, ECDSA_SHA256], &cert.private_key).unwrap();
        assert_eq!(scheme, ECDSA_SHA256);
        assert!(select_signature_scheme(&[rsa], &cert.private_key).is_err());
    }
}
