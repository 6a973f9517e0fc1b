//! Key exchange, handshake signatures and the TLS 1.2 PRF.

mod key_exchange;
pub mod prf;
mod signing;

pub use key_exchange::KeyPair;
pub use signing::{key_signature_message, select_signature_scheme};
pub use signing::{verify, verify_with_chain, PrivateKey};
