//! DTLS 1.2 records and the packets flights hand to the transport.

use nom::bytes::complete::take;
use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use crate::alert::Alert;
use crate::message::{Handshake, KeyExchangeAlgorithm, ProtocolVersion};
use crate::util::{be_u48, put_u48};

pub const RECORD_HEADER_LEN: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordLayerHeader {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub epoch: u16,
    /// 48 bit record sequence number.
    pub sequence_number: u64,
    pub length: u16,
}

impl RecordLayerHeader {
    pub fn parse(input: &[u8]) -> IResult<&[u8], RecordLayerHeader> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, epoch) = be_u16(input)?;
        let (input, sequence_number) = be_u48(input)?;
        let (input, length) = be_u16(input)?;

        Ok((
            input,
            RecordLayerHeader {
                content_type,
                version,
                epoch,
                sequence_number,
                length,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.content_type.as_u8());
        self.version.serialize(output);
        output.extend_from_slice(&self.epoch.to_be_bytes());
        put_u48(output, self.sequence_number);
        output.extend_from_slice(&self.length.to_be_bytes());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    ChangeCipherSpec,
    Alert(Alert),
    Handshake(Handshake),
}

impl Content {
    pub fn content_type(&self) -> ContentType {
        match self {
            Content::ChangeCipherSpec => ContentType::ChangeCipherSpec,
            Content::Alert(_) => ContentType::Alert,
            Content::Handshake(_) => ContentType::Handshake,
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            Content::ChangeCipherSpec => output.push(0x01),
            Content::Alert(alert) => alert.serialize(output),
            Content::Handshake(handshake) => handshake.serialize(output),
        }
    }
}

/// One record with decoded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayer {
    pub header: RecordLayerHeader,
    pub content: Content,
}

impl RecordLayer {
    /// A DTLS 1.2 record in epoch 0. The driver fixes up the epoch and the
    /// record layer assigns sequence numbers.
    pub fn new(content: Content) -> Self {
        RecordLayer {
            header: RecordLayerHeader {
                content_type: content.content_type(),
                version: ProtocolVersion::DTLS1_2,
                ..Default::default()
            },
            content,
        }
    }

    pub fn with_epoch(mut self, epoch: u16) -> Self {
        self.header.epoch = epoch;
        self
    }

    /// Parse a plaintext record. Handshake content must be unfragmented.
    pub fn parse(input: &[u8], kx: Option<KeyExchangeAlgorithm>) -> IResult<&[u8], RecordLayer> {
        let (input, header) = RecordLayerHeader::parse(input)?;
        let (input, fragment) = take(header.length as usize)(input)?;

        let content = match header.content_type {
            ContentType::ChangeCipherSpec => {
                let (_, value) = be_u8(fragment)?;
                if value != 0x01 {
                    return Err(Err::Failure(NomError::new(fragment, ErrorKind::Tag)));
                }
                Content::ChangeCipherSpec
            }
            ContentType::Alert => Content::Alert(Alert::parse(fragment)?.1),
            ContentType::Handshake => Content::Handshake(Handshake::parse(fragment, kx)?.1),
            _ => return Err(Err::Failure(NomError::new(fragment, ErrorKind::Switch))),
        };

        Ok((input, RecordLayer { header, content }))
    }

    /// Serialize with the length field computed from the content.
    pub fn serialize(&self, output: &mut Vec<u8>) {
        let mut body = Vec::new();
        self.content.serialize(&mut body);

        let header = RecordLayerHeader {
            content_type: self.content.content_type(),
            length: body.len() as u16,
            ..self.header
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

/// Split a datagram into its records. A truncated tail is dropped.
pub fn unpack_datagram(mut input: &[u8]) -> Vec<&[u8]> {
    let mut records = Vec::new();
    while input.len() >= RECORD_HEADER_LEN {
        let length = u16::from_be_bytes([input[11], input[12]]) as usize;
        let end = RECORD_HEADER_LEN + length;
        if input.len() < end {
            break;
        }
        records.push(&input[..end]);
        input = &input[end..];
    }
    records
}

/// A record produced by a flight, with instructions for the record layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub record: RecordLayer,
    /// Seal with the negotiated cipher suite.
    pub should_encrypt: bool,
    /// Use the tls12_cid record format with the peer's connection ID.
    pub should_wrap_cid: bool,
    /// Restart the record sequence numbering (first record of a new epoch).
    pub reset_local_sequence_number: bool,
}

impl Packet {
    pub fn plain(content: Content) -> Self {
        Packet {
            record: RecordLayer::new(content),
            should_encrypt: false,
            should_wrap_cid: false,
            reset_local_sequence_number: false,
        }
    }

    pub fn handshake(&self) -> Option<&Handshake> {
        match &self.record.content {
            Content::Handshake(h) => Some(h),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    ConnectionId,
    #[default]
    Invalid,
    Unknown(u8),
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ContentType::Invalid,
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            25 => ContentType::ConnectionId,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::Invalid => 0,
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::ConnectionId => 25,
            ContentType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}
