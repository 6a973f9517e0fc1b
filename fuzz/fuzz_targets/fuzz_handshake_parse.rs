#![no_main]

//! Fuzz target for handshake message parsing.
//!
//! The first byte picks the key exchange the ServerKeyExchange and
//! ClientKeyExchange bodies are read with.

use libfuzzer_sys::fuzz_target;

use dflight::message::{Handshake, KeyExchangeAlgorithm};

fuzz_target!(|data: &[u8]| {
    let Some((selector, input)) = data.split_first() else {
        return;
    };

    let kx = match selector % 3 {
        0 => None,
        1 => Some(KeyExchangeAlgorithm::Ecdhe),
        _ => Some(KeyExchangeAlgorithm::Psk),
    };

    if let Ok((_, handshake)) = Handshake::parse(input, kx) {
        // Whatever parses must serialize without panicking.
        let _ = handshake.to_bytes();
    }
});
