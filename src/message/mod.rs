//! DTLS 1.2 handshake messages.
//!
//! Every type follows the same shape: `parse(input) -> IResult<&[u8], Self>`
//! for decoding and `serialize(&self, output: &mut Vec<u8>)` for encoding.
//! Parsed messages own their data so they can outlive the cache lock.

/// Declare an enum of wire code points.
///
/// Every listed variant maps to its value, anything else to `Unknown`,
/// which is also the default. The two accessor names are given so each
/// type keeps the width in its API (`from_u8`/`as_u8`, `from_u16`/`as_u16`).
macro_rules! codepoints {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $repr:ty [$from:ident, $to:ident, $read:path] {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            Unknown($repr),
        }

        impl Default for $name {
            fn default() -> Self {
                $name::Unknown(0)
            }
        }

        impl $name {
            pub fn $from(value: $repr) -> Self {
                match value {
                    $( $value => $name::$variant, )+
                    _ => $name::Unknown(value),
                }
            }

            pub fn $to(&self) -> $repr {
                match self {
                    $( $name::$variant => $value, )+
                    $name::Unknown(value) => *value,
                }
            }

            pub fn parse(input: &[u8]) -> nom::IResult<&[u8], $name> {
                let (input, value) = $read(input)?;
                Ok((input, $name::$from(value)))
            }

            pub fn serialize(&self, output: &mut Vec<u8>) {
                output.extend_from_slice(&self.$to().to_be_bytes());
            }
        }
    };
}

mod certificate;
mod certificate_request;
mod certificate_verify;
mod client_hello;
mod client_key_exchange;
mod extension;
pub mod extensions;
mod finished;
mod handshake;
mod hello_verify;
mod id;
mod named_curve;
mod random;
mod server_hello;
mod server_key_exchange;

pub use certificate::Certificate;
pub use certificate_request::CertificateRequest;
pub use certificate_verify::CertificateVerify;
pub use client_hello::ClientHello;
pub use client_key_exchange::ClientKeyExchange;
pub use extension::{Extension, ExtensionType};
pub use finished::Finished;
pub use handshake::{Body, Handshake, Header, MessageType, HANDSHAKE_HEADER_LEN};
pub use hello_verify::HelloVerifyRequest;
pub use id::{Cookie, OpaqueId, SessionId};
pub use named_curve::{CurveType, NamedCurve};
pub use random::Random;
pub use server_hello::ServerHello;
pub use server_key_exchange::{ecdh_params, ServerKeyExchange};

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

codepoints! {
    pub enum ProtocolVersion: u16 [from_u16, as_u16, be_u16] {
        DTLS1_0 = 0xFEFF,
        DTLS1_2 = 0xFEFD,
    }
}

codepoints! {
    /// Wire identifiers of the cipher suites this crate implements.
    ///
    /// The behaviour behind an id lives in [`crate::cipher_suite`].
    #[allow(non_camel_case_types)]
    pub enum CipherSuiteId: u16 [from_u16, as_u16, be_u16] {
        TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 = 0xC02B,
        TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 = 0xC02C,
        TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 = 0xC02F,
        TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 = 0xC030,
        TLS_PSK_WITH_AES_128_GCM_SHA256 = 0x00A8,
    }
}

codepoints! {
    pub enum CompressionMethod: u8 [from_u8, as_u8, be_u8] {
        Null = 0,
        Deflate = 1,
    }
}

/// How the premaster secret is agreed.
///
/// Also decides the body layout of ServerKeyExchange and ClientKeyExchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeAlgorithm {
    Ecdhe,
    Psk,
}

codepoints! {
    /// Certificate types a server accepts from the client (RFC 5246 7.4.4).
    #[allow(non_camel_case_types)]
    pub enum ClientCertificateType: u8 [from_u8, as_u8, be_u8] {
        RSA_SIGN = 1,
        ECDSA_SIGN = 64,
    }
}

codepoints! {
    #[allow(non_camel_case_types)]
    pub enum SignatureAlgorithm: u8 [from_u8, as_u8, be_u8] {
        Anonymous = 0,
        RSA = 1,
        DSA = 2,
        ECDSA = 3,
        Ed25519 = 7,
    }
}

codepoints! {
    #[allow(non_camel_case_types)]
    pub enum HashAlgorithm: u8 [from_u8, as_u8, be_u8] {
        None = 0,
        MD5 = 1,
        SHA1 = 2,
        SHA224 = 3,
        SHA256 = 4,
        SHA384 = 5,
        SHA512 = 6,
    }
}

/// A (hash, signature) pair, also called a signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SignatureAndHashAlgorithm {
    pub hash: HashAlgorithm,
    pub signature: SignatureAlgorithm,
}

impl SignatureAndHashAlgorithm {
    pub const fn new(hash: HashAlgorithm, signature: SignatureAlgorithm) -> Self {
        SignatureAndHashAlgorithm { hash, signature }
    }

    /// Hash in the high byte, signature in the low one.
    pub fn from_u16(value: u16) -> Self {
        let [hash, signature] = value.to_be_bytes();
        SignatureAndHashAlgorithm {
            hash: HashAlgorithm::from_u8(hash),
            signature: SignatureAlgorithm::from_u8(signature),
        }
    }

    pub fn as_u16(&self) -> u16 {
        u16::from_be_bytes([self.hash.as_u8(), self.signature.as_u8()])
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureAndHashAlgorithm> {
        let (input, hash) = HashAlgorithm::parse(input)?;
        let (input, signature) = SignatureAlgorithm::parse(input)?;
        Ok((input, SignatureAndHashAlgorithm { hash, signature }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.hash.serialize(output);
        self.signature.serialize(output);
    }
}

codepoints! {
    /// SRTP protection profiles (RFC 5764 4.1.2, RFC 7714 14.2).
    pub enum SrtpProtectionProfile: u16 [from_u16, as_u16, be_u16] {
        Aes128CmHmacSha1_80 = 0x0001,
        Aes128CmHmacSha1_32 = 0x0002,
        AeadAes128Gcm = 0x0007,
        AeadAes256Gcm = 0x0008,
    }
}
