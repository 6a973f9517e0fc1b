use nom::IResult;

use super::{Cookie, ProtocolVersion};

/// HelloVerifyRequest, the stateless cookie exchange of RFC 6347 4.2.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub server_version: ProtocolVersion,
    pub cookie: Cookie,
}

impl HelloVerifyRequest {
    pub fn parse(input: &[u8]) -> IResult<&[u8], HelloVerifyRequest> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, cookie) = Cookie::parse(input)?;

        Ok((
            input,
            HelloVerifyRequest {
                server_version,
                cookie,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.server_version.serialize(output);
        self.cookie.serialize(output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0xFE, 0xFF, // ProtocolVersion::DTLS1_0
        0x03, // Cookie length
        0x25, 0xFB, 0xEE, // Cookie
    ];

    #[test]
    fn hello_verify_parse() {
        let (rest, hvr) = HelloVerifyRequest::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(hvr.server_version, ProtocolVersion::DTLS1_0);
        assert_eq!(&*hvr.cookie, &[0x25, 0xFB, 0xEE]);

        let mut out = Vec::new();
        hvr.serialize(&mut out);
        assert_eq!(out, MESSAGE);
    }
}
