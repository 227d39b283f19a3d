use std::sync::Arc;

use zeroize::Zeroizing;

use crate::cipher_suite::{CipherSuite, SUPPORTED_SUITES};
use crate::extensions::NamedCurve;
use crate::handshake::{MINOR_VERSION_TLS1_0, MINOR_VERSION_TLS1_2};
use crate::provider::{Certificate, RsaPrivateKey};
use crate::session::{SessionCache, SniResolver};

/// Whether and how hard to ask for a client certificate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyMode {
    None,
    Optional,
    Required,
}

/// Stance towards peers without RFC 5746 support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LegacyRenegotiationPolicy {
    /// Accept legacy peers (initial handshakes only stay safe by the
    /// renegotiation table).
    Allow,
    /// Refuse renegotiation with legacy peers.
    NoRenegotiation,
    /// Refuse legacy peers outright, including the initial handshake.
    BreakHandshake,
}

pub struct PresharedKey {
    pub identity: Vec<u8>,
    pub key: Zeroizing<Vec<u8>>,
}

/// Certificate chain plus the matching private key. The SNI resolver may
/// swap a different one in per requested name.
#[derive(Clone)]
pub struct ServerCredentials {
    pub chain: Vec<Certificate>,
    pub key: Arc<dyn RsaPrivateKey + Send + Sync>,
}

impl std::fmt::Debug for ServerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCredentials")
            .field("chain", &self.chain)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Configuration for how the server negotiates handshakes. Shared across
/// connections; never mutated by the engine.
pub struct ServerConfig {
    pub min_minor_version: u8,
    pub max_minor_version: u8,

    /// Negotiable suites in server preference order.
    pub ciphersuites: Vec<CipherSuite>,

    /// Supported curves for ECDHE, in server preference order.
    pub curves: Vec<NamedCurve>,

    pub authmode: VerifyMode,
    pub legacy_renegotiation: LegacyRenegotiationPolicy,

    pub credentials: Option<ServerCredentials>,

    /// CA certificates whose subject DNs go into CertificateRequest.
    pub ca_chain: Vec<Certificate>,

    pub psk: Option<PresharedKey>,

    pub sni_resolver: Option<Box<dyn SniResolver>>,
    pub session_cache: Option<Box<dyn SessionCache>>,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self {
            min_minor_version: MINOR_VERSION_TLS1_0,
            max_minor_version: MINOR_VERSION_TLS1_2,
            ciphersuites: SUPPORTED_SUITES.iter().map(|info| info.suite).collect(),
            curves: vec![
                NamedCurve::secp256r1,
                NamedCurve::secp384r1,
                NamedCurve::secp521r1,
            ],
            authmode: VerifyMode::None,
            legacy_renegotiation: LegacyRenegotiationPolicy::Allow,
            credentials: None,
            ca_chain: Vec::new(),
            psk: None,
            sni_resolver: None,
            session_cache: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
