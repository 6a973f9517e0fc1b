use std::fmt;

use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::thread_rng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::message::NamedCurve;
use crate::Error;

/// Ephemeral ECDHE key pair.
///
/// Kept in the connection state between generating a flight and parsing the
/// reply, and cloned when a flight is regenerated.
#[derive(Clone)]
pub enum KeyPair {
    X25519 {
        secret: StaticSecret,
        public: X25519PublicKey,
    },
    P256(p256::SecretKey),
    P384(p384::SecretKey),
}

impl KeyPair {
    pub fn generate(curve: NamedCurve) -> Result<Self, Error> {
        let mut rng = thread_rng();
        match curve {
            NamedCurve::X25519 => {
                let secret = StaticSecret::random_from_rng(&mut rng);
                let public = X25519PublicKey::from(&secret);
                Ok(KeyPair::X25519 { secret, public })
            }
            NamedCurve::Secp256r1 => Ok(KeyPair::P256(p256::SecretKey::random(&mut rng))),
            NamedCurve::Secp384r1 => Ok(KeyPair::P384(p384::SecretKey::random(&mut rng))),
            _ => Err(Error::UnsupportedCurve(curve)),
        }
    }

    pub fn curve(&self) -> NamedCurve {
        match self {
            KeyPair::X25519 { .. } => NamedCurve::X25519,
            KeyPair::P256(_) => NamedCurve::Secp256r1,
            KeyPair::P384(_) => NamedCurve::Secp384r1,
        }
    }

    /// Public key as sent on the wire. NIST curves use the uncompressed
    /// SEC1 point.
    pub fn public_key(&self) -> Vec<u8> {
        match self {
            KeyPair::X25519 { public, .. } => public.as_bytes().to_vec(),
            KeyPair::P256(secret) => secret
                .public_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec(),
            KeyPair::P384(secret) => secret
                .public_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec(),
        }
    }

    /// ECDH with the peer's public key, the pre-master secret of ECDHE suites.
    pub fn shared_secret(&self, peer_public_key: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        match self {
            KeyPair::X25519 { secret, .. } => {
                let peer: [u8; 32] = peer_public_key.try_into().map_err(|_| {
                    Error::KeyExchange(format!(
                        "X25519 public key must be 32 bytes, got {}",
                        peer_public_key.len()
                    ))
                })?;
                let shared = secret.diffie_hellman(&X25519PublicKey::from(peer));
                if !shared.was_contributory() {
                    return Err(Error::KeyExchange("non-contributory X25519 key".into()));
                }
                Ok(Zeroizing::new(shared.as_bytes().to_vec()))
            }
            KeyPair::P256(secret) => {
                let peer = p256::PublicKey::from_sec1_bytes(peer_public_key)
                    .map_err(|_| Error::KeyExchange("invalid P-256 public key".into()))?;
                let shared =
                    p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
                Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            }
            KeyPair::P384(secret) => {
                let peer = p384::PublicKey::from_sec1_bytes(peer_public_key)
                    .map_err(|_| Error::KeyExchange("invalid P-384 public key".into()))?;
                let shared =
                    p384::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
                Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            }
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("curve", &self.curve())
            .finish_non_exhaustive()
    }
}
