use nom::combinator::all_consuming;
use nom::multi::length_data;
use nom::number::complete::be_u16;
use nom::IResult;
use tinyvec::ArrayVec;

use crate::message::SignatureAndHashAlgorithm;
use crate::util::many0;

/// SignatureAlgorithms extension, RFC 5246 7.4.1.4.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureAlgorithmsExtension {
    pub supported_signature_algorithms: ArrayVec<[SignatureAndHashAlgorithm; 64]>,
}

impl SignatureAlgorithmsExtension {
    pub fn new(schemes: &[SignatureAndHashAlgorithm]) -> Self {
        SignatureAlgorithmsExtension {
            supported_signature_algorithms: schemes.iter().copied().take(64).collect(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureAlgorithmsExtension> {
        let (input, data) = length_data(be_u16)(input)?;
        let (_, algorithms) = all_consuming(many0(SignatureAndHashAlgorithm::parse))(data)?;
        Ok((
            input,
            SignatureAlgorithmsExtension {
                supported_signature_algorithms: algorithms,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(
            &((self.supported_signature_algorithms.len() * 2) as u16).to_be_bytes(),
        );
        for alg in &self.supported_signature_algorithms {
            alg.serialize(output);
        }
    }
}
