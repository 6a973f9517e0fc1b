//! The handshake message cache.
//!
//! Holds every handshake message of the connection in both directions, keyed
//! by originator, record epoch and message sequence. Flights pull ordered
//! views out of it and the transcript hashes are computed from it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::crypto::prf::digest;
use crate::message::{Body, Handshake, HashAlgorithm, KeyExchangeAlgorithm, MessageType};
use crate::message::{Certificate, CertificateRequest, CertificateVerify, ClientHello};
use crate::message::{ClientKeyExchange, Finished, HelloVerifyRequest, ServerHello};
use crate::message::ServerKeyExchange;
use crate::Error;

#[derive(Debug, Clone)]
struct CacheItem {
    typ: MessageType,
    is_client: bool,
    epoch: u16,
    message_sequence: u16,
    data: Vec<u8>,
}

/// Selects one message type from one side in one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullRule {
    pub typ: MessageType,
    pub epoch: u16,
    /// Sent by the client (`true`) or the server (`false`).
    pub is_client: bool,
    pub optional: bool,
}

impl PullRule {
    pub const fn new(typ: MessageType, epoch: u16, is_client: bool, optional: bool) -> Self {
        PullRule {
            typ,
            epoch,
            is_client,
            optional,
        }
    }
}

#[derive(Debug, Default)]
pub struct HandshakeCache {
    items: Mutex<Vec<CacheItem>>,
}

impl HandshakeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CacheItem>> {
        // The item list stays consistent even if a holder panicked.
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a whole handshake message (header included).
    ///
    /// Returns `false` when a message with the same originator, epoch and
    /// message sequence is already cached; the first one wins.
    pub fn push(
        &self,
        data: Vec<u8>,
        epoch: u16,
        message_sequence: u16,
        typ: MessageType,
        is_client: bool,
    ) -> bool {
        let mut items = self.lock();

        if let Some(existing) = items.iter().find(|i| {
            i.is_client == is_client && i.epoch == epoch && i.message_sequence == message_sequence
        }) {
            if existing.data != data {
                debug!(
                    "Ignore different {:?} at epoch {} seq {} (client: {})",
                    typ, epoch, message_sequence, is_client
                );
            }
            return false;
        }

        items.push(CacheItem {
            typ,
            is_client,
            epoch,
            message_sequence,
            data,
        });
        true
    }

    fn select<'a>(items: &'a [CacheItem], rule: &PullRule) -> Option<&'a CacheItem> {
        items
            .iter()
            .filter(|i| i.typ == rule.typ && i.is_client == rule.is_client && i.epoch == rule.epoch)
            .max_by_key(|i| i.message_sequence)
    }

    /// Raw bytes of the newest message matching each rule.
    pub fn pull(&self, rules: &[PullRule]) -> Vec<Option<Vec<u8>>> {
        let items = self.lock();
        rules
            .iter()
            .map(|r| Self::select(&items, r).map(|i| i.data.clone()))
            .collect()
    }

    /// Concatenation of the messages found for `rules`, in rule order.
    pub fn pull_and_merge(&self, rules: &[PullRule]) -> Vec<u8> {
        let items = self.lock();
        let mut merged = Vec::new();
        for rule in rules {
            if let Some(item) = Self::select(&items, rule) {
                merged.extend_from_slice(&item.data);
            }
        }
        merged
    }

    /// Pull a contiguous run of messages starting at `start_sequence`.
    ///
    /// All-or-nothing: `None` when a required message is missing, when the
    /// found messages are not contiguous in rule order, when one fails to
    /// parse, or when nothing matched at all.
    pub fn full_pull_map(
        &self,
        start_sequence: u16,
        kx: Option<KeyExchangeAlgorithm>,
        rules: &[PullRule],
    ) -> Option<Pulled> {
        let items = self.lock();

        let mut selected = Vec::with_capacity(rules.len());
        for rule in rules {
            let item = Self::select(&items, rule);
            if item.is_none() && !rule.optional {
                return None;
            }
            selected.push(item);
        }

        if selected.iter().all(|i| i.is_none()) {
            return None;
        }

        let mut sequence = start_sequence;
        let mut messages = HashMap::new();
        for item in selected.into_iter().flatten() {
            let handshake = match Handshake::parse(&item.data, kx) {
                Ok((_, h)) => h,
                Err(e) => {
                    trace!("Cached {:?} does not parse: {:?}", item.typ, e);
                    return None;
                }
            };
            if handshake.header.message_seq != sequence {
                return None;
            }
            sequence = sequence.wrapping_add(1);
            messages.insert(item.typ, handshake);
        }

        Some(Pulled { sequence, messages })
    }

    /// Hash of the handshake up to ClientKeyExchange for the extended master
    /// secret (RFC 7627 3).
    pub fn session_hash(
        &self,
        hash: HashAlgorithm,
        epoch: u16,
        additional: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let mut merged = self.pull_and_merge(&[
            PullRule::new(MessageType::ClientHello, epoch, true, false),
            PullRule::new(MessageType::ServerHello, epoch, false, false),
            PullRule::new(MessageType::Certificate, epoch, false, false),
            PullRule::new(MessageType::ServerKeyExchange, epoch, false, false),
            PullRule::new(MessageType::CertificateRequest, epoch, false, false),
            PullRule::new(MessageType::ServerHelloDone, epoch, false, false),
            PullRule::new(MessageType::Certificate, epoch, true, false),
            PullRule::new(MessageType::ClientKeyExchange, epoch, true, false),
        ]);
        merged.extend_from_slice(additional);

        digest(hash, &merged)
    }
}

/// Result of [`HandshakeCache::full_pull_map`].
#[derive(Debug)]
pub struct Pulled {
    /// The message sequence following the last pulled message.
    pub sequence: u16,
    messages: HashMap<MessageType, Handshake>,
}

macro_rules! accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(&self) -> Option<&$ty> {
            match self.messages.get(&MessageType::$variant).map(|h| &h.body) {
                Some(Body::$variant(m)) => Some(m),
                _ => None,
            }
        }
    };
}

impl Pulled {
    pub fn get(&self, typ: MessageType) -> Option<&Handshake> {
        self.messages.get(&typ)
    }

    pub fn contains(&self, typ: MessageType) -> bool {
        self.messages.contains_key(&typ)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    accessor!(client_hello, ClientHello, ClientHello);
    accessor!(hello_verify_request, HelloVerifyRequest, HelloVerifyRequest);
    accessor!(server_hello, ServerHello, ServerHello);
    accessor!(certificate, Certificate, Certificate);
    accessor!(server_key_exchange, ServerKeyExchange, ServerKeyExchange);
    accessor!(certificate_request, CertificateRequest, CertificateRequest);
    accessor!(certificate_verify, CertificateVerify, CertificateVerify);
    accessor!(client_key_exchange, ClientKeyExchange, ClientKeyExchange);
    accessor!(finished, Finished, Finished);
}
