use zeroize::Zeroize;

use crate::cipher_suite::CipherSuite;
use crate::options::ServerCredentials;
use crate::provider::PeerCertificate;

tls_enum_u8!(Compression => {
    null(0), deflate(1), (255)
});

/// The negotiated session: what survives the handshake and what the cache
/// persists for resumption. The master secret is wiped on drop.
#[derive(Clone, Debug)]
pub struct Session {
    id: [u8; 32],
    id_len: usize,
    pub cipher_suite: CipherSuite,
    pub compression: Compression,
    pub master: [u8; 48],
    pub peer_cert: Option<PeerCertificate>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: [0u8; 32],
            id_len: 0,
            cipher_suite: CipherSuite::unknown(0),
            compression: Compression::null,
            master: [0u8; 48],
            peer_cert: None,
        }
    }

    pub fn id(&self) -> &[u8] {
        &self.id[..self.id_len]
    }

    /// Replaces the session id. `id` must be at most 32 bytes; the caller
    /// has already range-checked wire input.
    pub fn set_id(&mut self, id: &[u8]) {
        assert!(id.len() <= 32);
        self.id = [0u8; 32];
        self.id[..id.len()].copy_from_slice(id);
        self.id_len = id.len();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.master.zeroize();
    }
}

/// Cross-connection session cache. Consulted read-mostly from many
/// connections; implementations provide their own locking.
pub trait SessionCache: Send + Sync {
    fn lookup(&self, id: &[u8]) -> Option<Session>;

    fn store(&self, session: &Session);
}

/// Virtual-hosting hook: maps a requested server name to the certificate
/// and key to serve it with. `None` rejects the name.
pub trait SniResolver: Send + Sync {
    fn resolve(&self, name: &[u8]) -> Option<ServerCredentials>;
}
