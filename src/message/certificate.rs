use nom::bytes::complete::take;
use nom::number::complete::be_u24;
use nom::IResult;

use crate::util::put_u24;

/// Certificate message: a chain of DER certificates, leaf first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Certificate {
    pub certificate_list: Vec<Vec<u8>>,
}

impl Certificate {
    pub fn new(certificate_list: Vec<Vec<u8>>) -> Self {
        Certificate { certificate_list }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Certificate> {
        let (input, total) = be_u24(input)?;
        let (input, mut rest) = take(total as usize)(input)?;

        let mut certificate_list = Vec::new();
        while !rest.is_empty() {
            let (r, len) = be_u24(rest)?;
            let (r, der) = take(len as usize)(r)?;
            certificate_list.push(der.to_vec());
            rest = r;
        }

        Ok((input, Certificate { certificate_list }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let total: usize = self.certificate_list.iter().map(|c| c.len() + 3).sum();
        put_u24(output, total);
        for der in &self.certificate_list {
            put_u24(output, der.len());
            output.extend_from_slice(der);
        }
    }
}
