use nom::bytes::complete::take;
use nom::combinator::all_consuming;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::{Err, IResult};

use super::{
    Certificate, CertificateRequest, CertificateVerify, ClientHello, ClientKeyExchange, Finished,
    HelloVerifyRequest, KeyExchangeAlgorithm, ServerHello, ServerKeyExchange,
};
use crate::util::put_u24;

/// Size of the DTLS handshake header.
pub const HANDSHAKE_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub msg_type: MessageType,
    pub length: u32,
    pub message_seq: u16,
    pub fragment_offset: u32,
    pub fragment_length: u32,
}

impl Header {
    pub fn is_fragment(&self) -> bool {
        self.fragment_offset > 0 || self.fragment_length < self.length
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Header> {
        let (input, msg_type) = MessageType::parse(input)?;
        let (input, length) = be_u24(input)?;
        let (input, message_seq) = be_u16(input)?;
        let (input, fragment_offset) = be_u24(input)?;
        let (input, fragment_length) = be_u24(input)?;

        Ok((
            input,
            Header {
                msg_type,
                length,
                message_seq,
                fragment_offset,
                fragment_length,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.msg_type.serialize(output);
        put_u24(output, self.length as usize);
        output.extend_from_slice(&self.message_seq.to_be_bytes());
        put_u24(output, self.fragment_offset as usize);
        put_u24(output, self.fragment_length as usize);
    }
}

/// A complete (never fragmented) handshake message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub header: Header,
    pub body: Body,
}

impl Handshake {
    /// Wrap a body. Lengths are filled in by [`Handshake::serialize`], the
    /// message sequence by the driver.
    pub fn new(body: Body) -> Self {
        Handshake {
            header: Header {
                msg_type: body.msg_type(),
                ..Default::default()
            },
            body,
        }
    }

    /// Parse one whole handshake message.
    ///
    /// `kx` picks the ServerKeyExchange/ClientKeyExchange layout when the
    /// cipher suite is already known. Fragments are rejected, they must be
    /// reassembled first.
    pub fn parse(input: &[u8], kx: Option<KeyExchangeAlgorithm>) -> IResult<&[u8], Handshake> {
        let (input, header) = Header::parse(input)?;

        if header.is_fragment() {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }

        let (input, body_bytes) = take(header.length as usize)(input)?;
        let (_, body) = all_consuming(|i| Body::parse(i, header.msg_type, kx))(body_bytes)?;

        Ok((input, Handshake { header, body }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let mut body = Vec::new();
        self.body.serialize(&mut body);

        let header = Header {
            msg_type: self.body.msg_type(),
            length: body.len() as u32,
            message_seq: self.header.message_seq,
            fragment_offset: 0,
            fragment_length: body.len() as u32,
        };
        header.serialize(output);
        output.extend_from_slice(&body);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::new();
        self.serialize(&mut output);
        output
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    HelloRequest,
    ClientHello(ClientHello),
    HelloVerifyRequest(HelloVerifyRequest),
    ServerHello(ServerHello),
    Certificate(Certificate),
    ServerKeyExchange(ServerKeyExchange),
    CertificateRequest(CertificateRequest),
    ServerHelloDone,
    CertificateVerify(CertificateVerify),
    ClientKeyExchange(ClientKeyExchange),
    Finished(Finished),
}

impl Body {
    pub fn msg_type(&self) -> MessageType {
        match self {
            Body::HelloRequest => MessageType::HelloRequest,
            Body::ClientHello(_) => MessageType::ClientHello,
            Body::HelloVerifyRequest(_) => MessageType::HelloVerifyRequest,
            Body::ServerHello(_) => MessageType::ServerHello,
            Body::Certificate(_) => MessageType::Certificate,
            Body::ServerKeyExchange(_) => MessageType::ServerKeyExchange,
            Body::CertificateRequest(_) => MessageType::CertificateRequest,
            Body::ServerHelloDone => MessageType::ServerHelloDone,
            Body::CertificateVerify(_) => MessageType::CertificateVerify,
            Body::ClientKeyExchange(_) => MessageType::ClientKeyExchange,
            Body::Finished(_) => MessageType::Finished,
        }
    }

    pub fn parse(
        input: &[u8],
        msg_type: MessageType,
        kx: Option<KeyExchangeAlgorithm>,
    ) -> IResult<&[u8], Body> {
        match msg_type {
            MessageType::HelloRequest => Ok((input, Body::HelloRequest)),
            MessageType::ClientHello => {
                let (input, m) = ClientHello::parse(input)?;
                Ok((input, Body::ClientHello(m)))
            }
            MessageType::HelloVerifyRequest => {
                let (input, m) = HelloVerifyRequest::parse(input)?;
                Ok((input, Body::HelloVerifyRequest(m)))
            }
            MessageType::ServerHello => {
                let (input, m) = ServerHello::parse(input)?;
                Ok((input, Body::ServerHello(m)))
            }
            MessageType::Certificate => {
                let (input, m) = Certificate::parse(input)?;
                Ok((input, Body::Certificate(m)))
            }
            MessageType::ServerKeyExchange => {
                let (input, m) = ServerKeyExchange::parse(input, kx)?;
                Ok((input, Body::ServerKeyExchange(m)))
            }
            MessageType::CertificateRequest => {
                let (input, m) = CertificateRequest::parse(input)?;
                Ok((input, Body::CertificateRequest(m)))
            }
            MessageType::ServerHelloDone => Ok((input, Body::ServerHelloDone)),
            MessageType::CertificateVerify => {
                let (input, m) = CertificateVerify::parse(input)?;
                Ok((input, Body::CertificateVerify(m)))
            }
            MessageType::ClientKeyExchange => {
                let (input, m) = ClientKeyExchange::parse(input, kx)?;
                Ok((input, Body::ClientKeyExchange(m)))
            }
            MessageType::Finished => {
                let (input, m) = Finished::parse(input)?;
                Ok((input, Body::Finished(m)))
            }
            MessageType::Unknown(_) => Err(Err::Failure(Error::new(input, ErrorKind::Switch))),
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            Body::HelloRequest | Body::ServerHelloDone => {}
            Body::ClientHello(m) => m.serialize(output),
            Body::HelloVerifyRequest(m) => m.serialize(output),
            Body::ServerHello(m) => m.serialize(output),
            Body::Certificate(m) => m.serialize(output),
            Body::ServerKeyExchange(m) => m.serialize(output),
            Body::CertificateRequest(m) => m.serialize(output),
            Body::CertificateVerify(m) => m.serialize(output),
            Body::ClientKeyExchange(m) => m.serialize(output),
            Body::Finished(m) => m.serialize(output),
        }
    }
}

codepoints! {
    pub enum MessageType: u8 [from_u8, as_u8, be_u8] {
        HelloRequest = 0,
        ClientHello = 1,
        ServerHello = 2,
        HelloVerifyRequest = 3,
        Certificate = 11,
        ServerKeyExchange = 12,
        CertificateRequest = 13,
        ServerHelloDone = 14,
        CertificateVerify = 15,
        ClientKeyExchange = 16,
        Finished = 20,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x14, // msg_type: Finished
        0x00, 0x00, 0x0C, // length
        0x00, 0x03, // message_seq
        0x00, 0x00, 0x00, // fragment_offset
        0x00, 0x00, 0x0C, // fragment_length
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, // verify_data
    ];

    #[test]
    fn parse_finished() {
        let (rest, handshake) = Handshake::parse(MESSAGE, None).unwrap();
        assert!(rest.is_empty());
        assert_eq!(handshake.header.message_seq, 3);
        let Body::Finished(finished) = &handshake.body else {
            panic!("expected Finished");
        };
        assert_eq!(finished.verify_data, &MESSAGE[12..]);

        assert_eq!(handshake.to_bytes(), MESSAGE);
    }

    #[test]
    fn fragment_is_rejected() {
        let mut data = MESSAGE.to_vec();
        // fragment_length 6 of 12
        data[11] = 0x06;
        data.truncate(18);
        assert!(Handshake::parse(&data, None).is_err());
    }

    #[test]
    fn empty_bodies() {
        let done = Handshake::new(Body::ServerHelloDone);
        let bytes = done.to_bytes();
        assert_eq!(bytes.len(), HANDSHAKE_HEADER_LEN);
        assert_eq!(bytes[0], 14);

        let (_, parsed) = Handshake::parse(&bytes, None).unwrap();
        assert_eq!(parsed.body, Body::ServerHelloDone);
    }
}
