//! Server-side SSLv3 / TLS 1.0-1.2 handshake engine.
//!
//! The crate owns handshake message framing, negotiation and the per-state
//! driver. Everything below the handshake layer (record protection, X.509,
//! the PRF, raw public-key math) is reached through the contracts in
//! [`record`] and [`provider`], so the engine itself never touches a socket
//! or a bignum.

#[macro_use]
pub mod macros;

pub mod alert;
pub mod cipher_suite;
pub mod errors;
pub mod extensions;
pub mod handshake;
pub mod key_exchange;
pub mod options;
pub mod provider;
pub mod record;
pub mod server;
pub mod session;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::errors::{Error, Result};
pub use crate::options::{ServerConfig, VerifyMode};
pub use crate::server::{HandshakeState, ServerHandshake};
pub use crate::session::Session;
