#![no_main]

//! Fuzz target for handshake reassembly.
//!
//! Splits the input into datagrams, feeds their records through a
//! `FragmentBuffer` and parses every message it hands out, the way a
//! receive path would.

use libfuzzer_sys::fuzz_target;

use dflight::message::{Handshake, Header};
use dflight::record::unpack_datagram;
use dflight::FragmentBuffer;

/// Largest datagram the input is cut into.
const MAX_DATAGRAM: usize = 1200;

fuzz_target!(|data: &[u8]| {
    let mut buffer = FragmentBuffer::new();

    for chunk in data.chunks(MAX_DATAGRAM) {
        for record in unpack_datagram(chunk) {
            // Errors are fine, we are looking for panics.
            if buffer.push(record).is_err() {
                continue;
            }

            while let Some((message, _epoch)) = buffer.pop() {
                let Ok((_, header)) = Header::parse(&message) else {
                    panic!("reassembled message without a valid header");
                };
                assert!(!header.is_fragment());
                let _ = Handshake::parse(&message, None);
            }
        }
    }
});
