//! DTLS 1.2 handshake engine.
//!
//! The handshake runs as a sequence of [`Flight`]s. Each flight generates
//! the packets to send and parses the peer's answer out of a
//! [`HandshakeCache`], which the receive path fills from the network. A
//! [`Handshaker`] drives the flights, resending the current one on timeout.
//!
//! Sockets and the record layer are not part of this crate. They are reached
//! through the [`FlightConn`] trait.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dflight::{Config, Context, HandshakeCache, Handshaker};
//! # fn transport() -> Box<dyn dflight::FlightConn> { unimplemented!() }
//!
//! let cfg = Arc::new(Config::default());
//! let cache = Arc::new(HandshakeCache::new());
//! let mut conn = transport();
//!
//! let mut handshaker = Handshaker::new(cfg, cache, true);
//! handshaker.run(&Context::background(), conn.as_mut()).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

pub mod alert;
pub mod cache;
pub mod certificate;
pub mod cipher_suite;
mod config;
mod context;
pub mod crypto;
mod error;
pub mod flight;
pub mod fragment_buffer;
mod handshaker;
pub mod message;
pub mod record;
pub mod session;
pub mod signal;
pub mod state;
mod timer;
mod util;

pub use alert::{Alert, AlertDescription, AlertLevel};
pub use cache::{HandshakeCache, PullRule, Pulled};
pub use certificate::Certificate;
pub use config::{ClientAuthType, Config, ConfigBuilder, ConnectionIdGenerator};
pub use config::{ExtendedMasterSecretType, PskCallback, VerifyPeerCertificate};
pub use context::Context;
pub use error::Error;
pub use flight::{Flight, FlightConn, FlightFailure};
pub use fragment_buffer::FragmentBuffer;
pub use handshaker::Handshaker;
pub use session::{MemorySessionStore, Session, SessionStore};
pub use state::ConnectionState;
