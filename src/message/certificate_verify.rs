use nom::multi::length_data;
use nom::number::complete::be_u16;
use nom::IResult;

use super::SignatureAndHashAlgorithm;
use crate::util::put_vec16;

/// CertificateVerify, a signature over the handshake transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    pub algorithm: SignatureAndHashAlgorithm,
    pub signature: Vec<u8>,
}

impl CertificateVerify {
    pub fn parse(input: &[u8]) -> IResult<&[u8], CertificateVerify> {
        let (input, algorithm) = SignatureAndHashAlgorithm::parse(input)?;
        let (input, signature) = length_data(be_u16)(input)?;

        Ok((
            input,
            CertificateVerify {
                algorithm,
                signature: signature.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.algorithm.serialize(output);
        put_vec16(output, &self.signature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{HashAlgorithm, SignatureAlgorithm};

    const MESSAGE: &[u8] = &[
        0x04, 0x03, // ecdsa_secp256r1_sha256
        0x00, 0x04, // Signature length
        0x30, 0x02, 0x01, 0x00, // Signature
    ];

    #[test]
    fn certificate_verify_parse() {
        let (rest, cv) = CertificateVerify::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(cv.algorithm.hash, HashAlgorithm::SHA256);
        assert_eq!(cv.algorithm.signature, SignatureAlgorithm::ECDSA);
        assert_eq!(cv.signature, &[0x30, 0x02, 0x01, 0x00]);

        let mut out = Vec::new();
        cv.serialize(&mut out);
        assert_eq!(out, MESSAGE);
    }
}
