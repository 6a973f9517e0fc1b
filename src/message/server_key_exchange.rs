use nom::error::{Error, ErrorKind};
use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use super::{CurveType, KeyExchangeAlgorithm, NamedCurve, SignatureAndHashAlgorithm};
use crate::util::{put_vec16, put_vec8};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerKeyExchange {
    /// Ephemeral ECDH public key signed with the certificate key.
    Ecdhe {
        named_curve: NamedCurve,
        public_key: Vec<u8>,
        algorithm: SignatureAndHashAlgorithm,
        signature: Vec<u8>,
    },
    /// PSK identity hint (RFC 4279 2).
    Psk { identity_hint: Vec<u8> },
}

impl ServerKeyExchange {
    /// Parse with the layout decided by `kx`.
    ///
    /// Without a hint the PSK layout is assumed when the leading u16 length
    /// spans the whole body.
    pub fn parse(
        input: &[u8],
        kx: Option<KeyExchangeAlgorithm>,
    ) -> IResult<&[u8], ServerKeyExchange> {
        let kx = kx.unwrap_or_else(|| guess_layout(input));

        match kx {
            KeyExchangeAlgorithm::Psk => {
                let (input, hint) = length_data(be_u16)(input)?;
                Ok((
                    input,
                    ServerKeyExchange::Psk {
                        identity_hint: hint.to_vec(),
                    },
                ))
            }
            KeyExchangeAlgorithm::Ecdhe => {
                let (input, curve_type) = CurveType::parse(input)?;
                if curve_type != CurveType::NamedCurve {
                    return Err(Err::Failure(Error::new(input, ErrorKind::Tag)));
                }
                let (input, named_curve) = NamedCurve::parse(input)?;
                let (input, public_key) = length_data(be_u8)(input)?;
                let (input, algorithm) = SignatureAndHashAlgorithm::parse(input)?;
                let (input, signature) = length_data(be_u16)(input)?;

                Ok((
                    input,
                    ServerKeyExchange::Ecdhe {
                        named_curve,
                        public_key: public_key.to_vec(),
                        algorithm,
                        signature: signature.to_vec(),
                    },
                ))
            }
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            ServerKeyExchange::Psk { identity_hint } => put_vec16(output, identity_hint),
            ServerKeyExchange::Ecdhe {
                named_curve,
                public_key,
                algorithm,
                signature,
            } => {
                output.extend_from_slice(&ecdh_params(*named_curve, public_key));
                algorithm.serialize(output);
                put_vec16(output, signature);
            }
        }
    }
}

/// The `ServerECDHParams` encoding that the server signs.
pub fn ecdh_params(named_curve: NamedCurve, public_key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + public_key.len());
    CurveType::NamedCurve.serialize(&mut out);
    named_curve.serialize(&mut out);
    put_vec8(&mut out, public_key);
    out
}

fn guess_layout(input: &[u8]) -> KeyExchangeAlgorithm {
    if input.len() >= 2 && u16::from_be_bytes([input[0], input[1]]) as usize + 2 == input.len() {
        KeyExchangeAlgorithm::Psk
    } else {
        KeyExchangeAlgorithm::Ecdhe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{HashAlgorithm, SignatureAlgorithm};

    const MESSAGE: &[u8] = &[
        0x03, // CurveType::NamedCurve
        0x00, 0x1D, // NamedCurve::X25519
        0x04, // Public key length
        0x01, 0x02, 0x03, 0x04, // Public key
        0x04, 0x03, // ecdsa_secp256r1_sha256
        0x00, 0x02, // Signature length
        0xAA, 0xBB, // Signature
    ];

    const PSK: &[u8] = &[
        0x00, 0x03, // Identity hint length
        0x61, 0x62, 0x63, // "abc"
    ];

    #[test]
    fn ecdhe_parse() {
        let (rest, ske) = ServerKeyExchange::parse(MESSAGE, None).unwrap();
        assert!(rest.is_empty());
        let ServerKeyExchange::Ecdhe {
            named_curve,
            public_key,
            algorithm,
            signature,
        } = &ske
        else {
            panic!("expected ECDHE params");
        };
        assert_eq!(*named_curve, NamedCurve::X25519);
        assert_eq!(public_key, &[1, 2, 3, 4]);
        assert_eq!(
            *algorithm,
            SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::ECDSA)
        );
        assert_eq!(signature, &[0xAA, 0xBB]);
        assert_eq!(ecdh_params(*named_curve, public_key), &MESSAGE[..8]);

        let mut out = Vec::new();
        ske.serialize(&mut out);
        assert_eq!(out, MESSAGE);
    }

    #[test]
    fn psk_hint_guessed_without_suite() {
        let (_, ske) = ServerKeyExchange::parse(PSK, None).unwrap();
        assert_eq!(
            ske,
            ServerKeyExchange::Psk {
                identity_hint: b"abc".to_vec()
            }
        );
    }

    #[test]
    fn explicit_layout_wins() {
        assert!(ServerKeyExchange::parse(PSK, Some(KeyExchangeAlgorithm::Ecdhe)).is_err());
    }
}
