//! Reassembly of fragmented handshake messages on the receive path.

use std::collections::HashMap;

use crate::message::{Header, HANDSHAKE_HEADER_LEN};
use crate::record::{ContentType, RecordLayerHeader, RECORD_HEADER_LEN};
use crate::Error;

/// Upper bound on buffered fragment bytes.
const MAX_BUFFER_SIZE: usize = 2_000_000;

#[derive(Debug)]
struct Fragment {
    record_epoch: u16,
    header: Header,
    data: Vec<u8>,
}

/// Buffers handshake fragments until whole messages can be handed out in
/// message sequence order.
#[derive(Debug, Default)]
pub struct FragmentBuffer {
    cache: HashMap<u16, Vec<Fragment>>,
    current_message_sequence: u16,
}

impl FragmentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn size(&self) -> usize {
        self.cache
            .values()
            .flat_map(|frags| frags.iter())
            .map(|f| f.data.len())
            .sum()
    }

    /// Add a plaintext record.
    ///
    /// Returns `Ok(false)` for records that are not handshake records, which
    /// the caller handles itself.
    pub fn push(&mut self, record: &[u8]) -> Result<bool, Error> {
        if self.size() + record.len() >= MAX_BUFFER_SIZE {
            return Err(Error::MessageTooLarge(MAX_BUFFER_SIZE));
        }

        let (_, record_header) = RecordLayerHeader::parse(record)?;
        if record_header.content_type != ContentType::Handshake {
            return Ok(false);
        }

        let mut rest = record
            .get(RECORD_HEADER_LEN..)
            .ok_or(Error::InvalidContentType)?;
        let end = (record_header.length as usize).min(rest.len());
        rest = &rest[..end];

        while !rest.is_empty() {
            let (_, header) = Header::parse(rest)?;
            let end = HANDSHAKE_HEADER_LEN + header.fragment_length as usize;
            if rest.len() < end {
                return Err(Error::Parse("truncated handshake fragment".into()));
            }

            let fragment = Fragment {
                record_epoch: record_header.epoch,
                header,
                data: rest[HANDSHAKE_HEADER_LEN..end].to_vec(),
            };

            // Messages already handed out are retransmissions.
            if header.message_seq >= self.current_message_sequence {
                self.cache
                    .entry(header.message_seq)
                    .or_default()
                    .push(fragment);
            }

            rest = &rest[end..];
        }

        Ok(true)
    }

    /// Next whole handshake message and the epoch of the record it came in.
    pub fn pop(&mut self) -> Option<(Vec<u8>, u16)> {
        let frags = self.cache.get(&self.current_message_sequence)?;

        let first = frags.iter().find(|f| f.header.fragment_offset == 0)?;
        let total = first.header.length as usize;
        let record_epoch = first.record_epoch;
        let mut header = first.header;

        let mut body = Vec::with_capacity(total);
        while body.len() < total {
            let offset = body.len() as u32;
            let next = frags.iter().find(|f| {
                f.header.fragment_offset <= offset
                    && f.header.fragment_offset + f.header.fragment_length > offset
            })?;
            let skip = (offset - next.header.fragment_offset) as usize;
            body.extend_from_slice(&next.data[skip..]);
        }
        body.truncate(total);

        header.fragment_offset = 0;
        header.fragment_length = header.length;

        let mut message = Vec::with_capacity(HANDSHAKE_HEADER_LEN + total);
        header.serialize(&mut message);
        message.extend_from_slice(&body);

        self.cache.remove(&self.current_message_sequence);
        self.current_message_sequence = self.current_message_sequence.wrapping_add(1);

        Some((message, record_epoch))
    }
}
