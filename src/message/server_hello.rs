use nom::IResult;

use super::{CipherSuiteId, CompressionMethod, Extension, ProtocolVersion, Random, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuiteId,
    pub compression_method: CompressionMethod,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ServerHello> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = CipherSuiteId::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;
        let (input, extensions) = Extension::parse_list(input)?;

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.server_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        self.cipher_suite.serialize(output);
        self.compression_method.serialize(output);
        Extension::serialize_list(&self.extensions, output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::extensions::UseSrtpExtension;
    use crate::message::SrtpProtectionProfile;

    const MESSAGE: &[u8] = &[
        0xFE, 0xFD, // ProtocolVersion::DTLS1_2
        0x00, 0x00, 0x00, 0x01, // gmt_unix_time
        0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, //
        0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03,
        0x01, // SessionId length
        0x07, // SessionId
        0xC0, 0x2F, // TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
        0x00, // CompressionMethod::Null
        0x00, 0x09, // Extensions length
        0x00, 0x0E, // ExtensionType::UseSrtp
        0x00, 0x05, // Extension length
        0x00, 0x02, 0x00, 0x01, // Aes128CmHmacSha1_80
        0x00, // MKI length
    ];

    #[test]
    fn server_hello_parse() {
        let (rest, hello) = ServerHello::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(&*hello.session_id, &[0x07]);
        assert_eq!(
            hello.cipher_suite,
            CipherSuiteId::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
        );
        assert_eq!(
            hello.extensions,
            vec![Extension::UseSrtp(UseSrtpExtension::new(&[
                SrtpProtectionProfile::Aes128CmHmacSha1_80
            ]))]
        );

        let mut out = Vec::new();
        hello.serialize(&mut out);
        assert_eq!(out, MESSAGE);
    }
}
