use nom::bytes::complete::take;
use nom::combinator::all_consuming;
use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;
use tinyvec::ArrayVec;

use super::{ClientCertificateType, SignatureAndHashAlgorithm};
use crate::util::{many0, many1, put_vec16};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CertificateRequest {
    pub certificate_types: ArrayVec<[ClientCertificateType; 8]>,
    pub signature_algorithms: ArrayVec<[SignatureAndHashAlgorithm; 64]>,
    /// DER encoded distinguished names of acceptable CAs.
    pub certificate_authorities: Vec<Vec<u8>>,
}

impl CertificateRequest {
    pub fn parse(input: &[u8]) -> IResult<&[u8], CertificateRequest> {
        let (input, types) = length_data(be_u8)(input)?;
        let (_, certificate_types) = all_consuming(many1(ClientCertificateType::parse))(types)?;

        let (input, algs) = length_data(be_u16)(input)?;
        let (_, signature_algorithms) =
            all_consuming(many0(SignatureAndHashAlgorithm::parse))(algs)?;

        let (input, mut names) = length_data(be_u16)(input)?;
        let mut certificate_authorities = Vec::new();
        while !names.is_empty() {
            let (rest, len) = be_u16(names)?;
            let (rest, name) = take(len as usize)(rest)?;
            certificate_authorities.push(name.to_vec());
            names = rest;
        }

        Ok((
            input,
            CertificateRequest {
                certificate_types,
                signature_algorithms,
                certificate_authorities,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.certificate_types.len() as u8);
        for t in &self.certificate_types {
            t.serialize(output);
        }

        let mut algs = Vec::with_capacity(self.signature_algorithms.len() * 2);
        for alg in &self.signature_algorithms {
            alg.serialize(&mut algs);
        }
        put_vec16(output, &algs);

        let mut names = Vec::new();
        for name in &self.certificate_authorities {
            put_vec16(&mut names, name);
        }
        put_vec16(output, &names);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{HashAlgorithm, SignatureAlgorithm};

    const MESSAGE: &[u8] = &[
        0x02, // Certificate types length
        0x01, 0x40, // RSA_SIGN, ECDSA_SIGN
        0x00, 0x04, // Signature algorithms length
        0x04, 0x03, // ecdsa_secp256r1_sha256
        0x04, 0x01, // rsa_pkcs1_sha256
        0x00, 0x05, // Certificate authorities length
        0x00, 0x03, // Distinguished name length
        0x30, 0x01, 0x00, // Distinguished name
    ];

    #[test]
    fn certificate_request_parse() {
        let (rest, cr) = CertificateRequest::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            cr.certificate_types.as_slice(),
            &[ClientCertificateType::RSA_SIGN, ClientCertificateType::ECDSA_SIGN]
        );
        assert_eq!(
            cr.signature_algorithms[1],
            SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::RSA)
        );
        assert_eq!(cr.certificate_authorities, vec![vec![0x30, 0x01, 0x00]]);

        let mut out = Vec::new();
        cr.serialize(&mut out);
        assert_eq!(out, MESSAGE);
    }
}
