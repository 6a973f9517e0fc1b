use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use super::KeyExchangeAlgorithm;
use crate::util::{put_vec16, put_vec8};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientKeyExchange {
    /// The client's ephemeral ECDH public key.
    Ecdhe { public_key: Vec<u8> },
    /// The PSK identity the client uses.
    Psk { identity: Vec<u8> },
}

impl ClientKeyExchange {
    /// Parse with the layout decided by `kx`, or by the length prefix that
    /// fits the body when the cipher suite is not known yet.
    pub fn parse(
        input: &[u8],
        kx: Option<KeyExchangeAlgorithm>,
    ) -> IResult<&[u8], ClientKeyExchange> {
        let kx = kx.unwrap_or_else(|| {
            let u16_fits = input.len() >= 2
                && u16::from_be_bytes([input[0], input[1]]) as usize + 2 == input.len();
            if u16_fits {
                KeyExchangeAlgorithm::Psk
            } else {
                KeyExchangeAlgorithm::Ecdhe
            }
        });

        match kx {
            KeyExchangeAlgorithm::Psk => {
                let (input, identity) = length_data(be_u16)(input)?;
                Ok((
                    input,
                    ClientKeyExchange::Psk {
                        identity: identity.to_vec(),
                    },
                ))
            }
            KeyExchangeAlgorithm::Ecdhe => {
                let (input, public_key) = length_data(be_u8)(input)?;
                Ok((
                    input,
                    ClientKeyExchange::Ecdhe {
                        public_key: public_key.to_vec(),
                    },
                ))
            }
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            ClientKeyExchange::Ecdhe { public_key } => put_vec8(output, public_key),
            ClientKeyExchange::Psk { identity } => put_vec16(output, identity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x04, // Public key length
        0x11, 0x22, 0x33, 0x44, // Public key
    ];

    #[test]
    fn ecdhe_parse() {
        let (rest, cke) = ClientKeyExchange::parse(MESSAGE, None).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            cke,
            ClientKeyExchange::Ecdhe {
                public_key: vec![0x11, 0x22, 0x33, 0x44]
            }
        );

        let mut out = Vec::new();
        cke.serialize(&mut out);
        assert_eq!(out, MESSAGE);
    }

    #[test]
    fn psk_identity() {
        let data = &[0x00, 0x02, b'i', b'd'];
        let (_, cke) = ClientKeyExchange::parse(data, Some(KeyExchangeAlgorithm::Psk)).unwrap();
        assert_eq!(
            cke,
            ClientKeyExchange::Psk {
                identity: b"id".to_vec()
            }
        );
    }
}
