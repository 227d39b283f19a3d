use crate::handshake::{MINOR_VERSION_SSL3, MINOR_VERSION_TLS1_2};

tls_enum_u16!(CipherSuite => {
    TLS_RSA_WITH_NULL_SHA256(0x003B),
    TLS_RSA_WITH_AES_128_CBC_SHA(0x002F),
    TLS_RSA_WITH_AES_256_CBC_SHA(0x0035),
    TLS_RSA_WITH_AES_128_CBC_SHA256(0x003C),
    TLS_RSA_WITH_AES_256_CBC_SHA256(0x003D),
    TLS_RSA_WITH_AES_128_GCM_SHA256(0x009C),
    TLS_RSA_WITH_AES_256_GCM_SHA384(0x009D),

    TLS_DHE_RSA_WITH_AES_128_CBC_SHA(0x0033),
    TLS_DHE_RSA_WITH_AES_256_CBC_SHA(0x0039),
    TLS_DHE_RSA_WITH_AES_128_CBC_SHA256(0x0067),
    TLS_DHE_RSA_WITH_AES_256_CBC_SHA256(0x006B),
    TLS_DHE_RSA_WITH_AES_128_GCM_SHA256(0x009E),
    TLS_DHE_RSA_WITH_AES_256_GCM_SHA384(0x009F),

    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA(0xC013),
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA(0xC014),
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256(0xC027),
    TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384(0xC028),
    TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256(0xC02F),
    TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384(0xC030),

    TLS_PSK_WITH_AES_128_CBC_SHA(0x008C),
    TLS_PSK_WITH_AES_256_CBC_SHA(0x008D),

    TLS_DHE_PSK_WITH_AES_128_CBC_SHA(0x0090),
    TLS_DHE_PSK_WITH_AES_256_CBC_SHA(0x0091),

    // Signaling value, never negotiable (RFC 5746).
    TLS_EMPTY_RENEGOTIATION_INFO_SCSV(0x00FF),
    (65535)
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyExchangeKind {
    Rsa,
    DheRsa,
    EcdheRsa,
    Psk,
    DhePsk,
}

impl KeyExchangeKind {
    /// True when the server authenticates with an RSA certificate (as
    /// opposed to the pre-shared key alone).
    pub fn uses_rsa_auth(&self) -> bool {
        !self.uses_psk()
    }

    pub fn uses_psk(&self) -> bool {
        matches!(self, KeyExchangeKind::Psk | KeyExchangeKind::DhePsk)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MacAlgorithm {
    Sha1,
    Sha256,
    Sha384,
}

/// Static negotiation metadata for one suite.
#[derive(Debug)]
pub struct CipherSuiteInfo {
    pub suite: CipherSuite,
    pub key_exchange: KeyExchangeKind,
    pub mac: MacAlgorithm,
    /// Inclusive window of minor versions the suite may be negotiated at.
    pub min_minor: u8,
    pub max_minor: u8,
    /// Requires an agreed elliptic curve.
    pub ec: bool,
}

impl CipherSuiteInfo {
    pub fn from_suite(suite: CipherSuite) -> Option<&'static CipherSuiteInfo> {
        SUPPORTED_SUITES.iter().find(|info| info.suite == suite)
    }

    /// Version-window half of the eligibility predicate. The curve half
    /// lives with the caller since it depends on the negotiated extensions.
    pub fn usable_at(&self, minor: u8) -> bool {
        self.min_minor <= minor && minor <= self.max_minor
    }
}

macro_rules! suite_info {
    ($suite:ident, $kx:ident, $mac:ident, $min:expr, $max:expr, $ec:expr) => {
        CipherSuiteInfo {
            suite: CipherSuite::$suite,
            key_exchange: KeyExchangeKind::$kx,
            mac: MacAlgorithm::$mac,
            min_minor: $min,
            max_minor: $max,
            ec: $ec,
        }
    };
}

/// All negotiable suites, in server preference order.
#[rustfmt::skip]
pub const SUPPORTED_SUITES: &[CipherSuiteInfo] = &[
    suite_info!(TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384, EcdheRsa, Sha384, MINOR_VERSION_TLS1_2, MINOR_VERSION_TLS1_2, true),
    suite_info!(TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256, EcdheRsa, Sha256, MINOR_VERSION_TLS1_2, MINOR_VERSION_TLS1_2, true),
    suite_info!(TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384, EcdheRsa, Sha384, MINOR_VERSION_TLS1_2, MINOR_VERSION_TLS1_2, true),
    suite_info!(TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256, EcdheRsa, Sha256, MINOR_VERSION_TLS1_2, MINOR_VERSION_TLS1_2, true),
    suite_info!(TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,    EcdheRsa, Sha1,   MINOR_VERSION_SSL3,   MINOR_VERSION_TLS1_2, true),
    suite_info!(TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,    EcdheRsa, Sha1,   MINOR_VERSION_SSL3,   MINOR_VERSION_TLS1_2, true),

    suite_info!(TLS_DHE_RSA_WITH_AES_256_GCM_SHA384,   DheRsa,   Sha384, MINOR_VERSION_TLS1_2, MINOR_VERSION_TLS1_2, false),
    suite_info!(TLS_DHE_RSA_WITH_AES_128_GCM_SHA256,   DheRsa,   Sha256, MINOR_VERSION_TLS1_2, MINOR_VERSION_TLS1_2, false),
    suite_info!(TLS_DHE_RSA_WITH_AES_256_CBC_SHA256,   DheRsa,   Sha256, MINOR_VERSION_TLS1_2, MINOR_VERSION_TLS1_2, false),
    suite_info!(TLS_DHE_RSA_WITH_AES_128_CBC_SHA256,   DheRsa,   Sha256, MINOR_VERSION_TLS1_2, MINOR_VERSION_TLS1_2, false),
    suite_info!(TLS_DHE_RSA_WITH_AES_256_CBC_SHA,      DheRsa,   Sha1,   MINOR_VERSION_SSL3,   MINOR_VERSION_TLS1_2, false),
    suite_info!(TLS_DHE_RSA_WITH_AES_128_CBC_SHA,      DheRsa,   Sha1,   MINOR_VERSION_SSL3,   MINOR_VERSION_TLS1_2, false),

    suite_info!(TLS_RSA_WITH_AES_256_GCM_SHA384,       Rsa,      Sha384, MINOR_VERSION_TLS1_2, MINOR_VERSION_TLS1_2, false),
    suite_info!(TLS_RSA_WITH_AES_128_GCM_SHA256,       Rsa,      Sha256, MINOR_VERSION_TLS1_2, MINOR_VERSION_TLS1_2, false),
    suite_info!(TLS_RSA_WITH_AES_256_CBC_SHA256,       Rsa,      Sha256, MINOR_VERSION_TLS1_2, MINOR_VERSION_TLS1_2, false),
    suite_info!(TLS_RSA_WITH_AES_128_CBC_SHA256,       Rsa,      Sha256, MINOR_VERSION_TLS1_2, MINOR_VERSION_TLS1_2, false),
    suite_info!(TLS_RSA_WITH_AES_256_CBC_SHA,          Rsa,      Sha1,   MINOR_VERSION_SSL3,   MINOR_VERSION_TLS1_2, false),
    suite_info!(TLS_RSA_WITH_AES_128_CBC_SHA,          Rsa,      Sha1,   MINOR_VERSION_SSL3,   MINOR_VERSION_TLS1_2, false),

    suite_info!(TLS_DHE_PSK_WITH_AES_256_CBC_SHA,      DhePsk,   Sha1,   MINOR_VERSION_SSL3,   MINOR_VERSION_TLS1_2, false),
    suite_info!(TLS_DHE_PSK_WITH_AES_128_CBC_SHA,      DhePsk,   Sha1,   MINOR_VERSION_SSL3,   MINOR_VERSION_TLS1_2, false),
    suite_info!(TLS_PSK_WITH_AES_256_CBC_SHA,          Psk,      Sha1,   MINOR_VERSION_SSL3,   MINOR_VERSION_TLS1_2, false),
    suite_info!(TLS_PSK_WITH_AES_128_CBC_SHA,          Psk,      Sha1,   MINOR_VERSION_SSL3,   MINOR_VERSION_TLS1_2, false),
];
