use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;
use tinyvec::ArrayVec;

use super::{CipherSuiteId, CompressionMethod, Cookie, Extension, ProtocolVersion};
use super::{Random, SessionId};
use crate::util::{many1, put_vec16, put_vec8};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cookie: Cookie,
    pub cipher_suites: ArrayVec<[CipherSuiteId; 128]>,
    pub compression_methods: ArrayVec<[CompressionMethod; 16]>,
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientHello> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cookie) = Cookie::parse(input)?;

        let (input, suites) = length_data(be_u16)(input)?;
        let (_, cipher_suites) = many1(CipherSuiteId::parse)(suites)?;

        let (input, methods) = length_data(be_u8)(input)?;
        let (_, compression_methods) = many1(CompressionMethod::parse)(methods)?;

        let (input, extensions) = Extension::parse_list(input)?;

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cookie,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.client_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        self.cookie.serialize(output);

        let mut suites = Vec::with_capacity(self.cipher_suites.len() * 2);
        for suite in &self.cipher_suites {
            suite.serialize(&mut suites);
        }
        put_vec16(output, &suites);

        let methods: Vec<u8> = self.compression_methods.iter().map(|m| m.as_u8()).collect();
        put_vec8(output, &methods);

        Extension::serialize_list(&self.extensions, output);
    }
}
