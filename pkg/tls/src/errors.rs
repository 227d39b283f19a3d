use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Handshake error taxonomy.
///
/// Validation failures map one-to-one onto the protocol situations that
/// produced them; `WantRead`/`WantWrite` are forwarded from the record layer
/// unchanged so the caller can poll and re-enter the driver.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("bad client hello message")]
    BadClientHello,

    #[error("client only supports protocol versions below our minimum")]
    BadProtocolVersion,

    #[error("got no ciphersuites in common")]
    NoCipherChosen,

    #[error("bad client key exchange message")]
    BadClientKeyExchange,

    #[error("bad client key exchange message (read public)")]
    BadClientKeyExchangeReadPublic,

    #[error("bad client key exchange message (calc secret)")]
    BadClientKeyExchangeCalcSecret,

    #[error("bad certificate verify message")]
    BadCertificateVerify,

    #[error("got no private key or pre-shared key")]
    PrivateKeyRequired,

    #[error("requested feature is not available")]
    FeatureUnavailable,

    #[error("bad input parameters")]
    BadInputData,

    /// The record layer needs more transport input before it can make
    /// progress. Retryable.
    #[error("want read")]
    WantRead,

    /// The record layer has pending output the transport did not accept yet.
    /// Retryable.
    #[error("want write")]
    WantWrite,

    #[error("crypto backend failure: {0}")]
    Crypto(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

impl Error {
    /// True for the transport conditions the caller is expected to retry
    /// after polling; everything else aborts the handshake.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::WantRead | Error::WantWrite)
    }
}
