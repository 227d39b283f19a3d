// Contracts against the crypto/PKI backends. The engine moves wire bytes
// and negotiation state; everything that touches a bignum, a hash state or
// a DER blob is implemented behind these traits by the caller.

use std::sync::Arc;

use bytes::Bytes;

use crate::cipher_suite::CipherSuite;
use crate::errors::Result;
use crate::extensions::{HashAlgorithm, NamedCurve};
use crate::session::Compression;

/// Upper bound on the assembled premaster secret: the largest supported
/// key-exchange output plus the PSK framing around it.
pub const MAX_PREMASTER_SIZE: usize = 1060;

pub trait Rng {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()>;
}

/// The server's RSA private key. `len` is the modulus size in bytes.
///
/// `sign` produces a PKCS#1 v1.5 signature; `md_alg == None` signs the raw
/// 36-byte MD5||SHA-1 digest without a DigestInfo wrapper (SSLv3/TLS ≤ 1.1).
/// `decrypt` unpads PKCS#1 v1.5 and must itself be constant-time with
/// respect to the padding.
pub trait RsaPrivateKey {
    fn len(&self) -> usize;

    fn sign(
        &self,
        rng: &mut dyn Rng,
        md_alg: Option<HashAlgorithm>,
        hash: &[u8],
    ) -> Result<Vec<u8>>;

    fn decrypt(&self, input: &[u8], output: &mut [u8]) -> Result<usize>;
}

/// The peer's RSA public key, extracted from its certificate by the
/// (external) X.509 layer.
pub trait RsaPublicKey {
    fn len(&self) -> usize;

    fn verify(&self, md_alg: Option<HashAlgorithm>, hash: &[u8], sig: &[u8]) -> Result<()>;
}

/// Ephemeral Diffie-Hellman context, scoped to one handshake.
pub trait DhmProvider {
    /// Generates the ephemeral keypair and returns the wire-formatted
    /// `ServerDHParams` (`dh_p || dh_g || dh_Ys`, each length-prefixed).
    fn make_params(&mut self, rng: &mut dyn Rng) -> Result<Vec<u8>>;

    /// Modulus size in bytes; bounds the peer public value and sizes the
    /// shared secret.
    fn modulus_len(&self) -> usize;

    fn read_public(&mut self, public: &[u8]) -> Result<()>;

    fn calc_secret(&mut self, output: &mut [u8]) -> Result<usize>;
}

/// Ephemeral ECDH context, scoped to one handshake.
pub trait EcdhProvider {
    /// Generates the ephemeral keypair on `curve` and returns the
    /// wire-formatted `ECParameters || ECPoint`.
    fn make_params(&mut self, curve: NamedCurve, rng: &mut dyn Rng) -> Result<Vec<u8>>;

    /// Upper bound for an encoded peer point: `2 * |P| + 2`.
    fn point_limit(&self) -> usize;

    fn read_public(&mut self, point: &[u8]) -> Result<()>;

    fn calc_secret(&mut self, output: &mut [u8]) -> Result<usize>;
}

/// One-shot digests for the ServerKeyExchange signature input.
pub trait Digest {
    fn hash(&self, alg: HashAlgorithm, parts: &[&[u8]]) -> Result<Vec<u8>>;

    /// `MD5(parts) || SHA1(parts)`, the 36-byte digest signed before
    /// TLS 1.2.
    fn md5_sha1(&self, parts: &[&[u8]]) -> [u8; 36];
}

/// The PRF / transcript side of the handshake.
///
/// The driver feeds every handshake message through `update_transcript` in
/// arrival order; `calc_verify*` snapshots the running transcript hash
/// without disturbing it (taken before the CertificateVerify message itself
/// is absorbed).
pub trait SecretSchedule {
    fn update_transcript(&mut self, data: &[u8]);

    /// Expands the premaster into the master secret and the per-direction
    /// key material for the negotiated transform. `premaster == None` reuses
    /// the master already present (resumption).
    fn derive_keys(
        &mut self,
        premaster: Option<&[u8]>,
        master: &mut [u8; 48],
        randbytes: &[u8; 64],
        minor: u8,
        suite: CipherSuite,
        compression: Compression,
    ) -> Result<()>;

    /// MD5||SHA-1 transcript digest (SSLv3/TLS ≤ 1.1 CertificateVerify).
    fn calc_verify(&self) -> [u8; 36];

    /// Single-hash transcript digest (TLS 1.2 CertificateVerify).
    fn calc_verify_with(&self, alg: HashAlgorithm) -> Result<Vec<u8>>;
}

/// One certificate of the server's own chain (or a CA used for client-auth
/// DN advertisement). Parsing happened outside; the engine only ever needs
/// the raw DER and the subject DN slice.
#[derive(Clone, Debug)]
pub struct Certificate {
    pub der: Bytes,
    pub subject_dn: Bytes,
}

/// The client certificate as produced by the external X.509 validation,
/// reduced to what CertificateVerify needs.
#[derive(Clone)]
pub struct PeerCertificate {
    pub der: Bytes,
    pub rsa: Arc<dyn RsaPublicKey + Send + Sync>,
}

impl std::fmt::Debug for PeerCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerCertificate")
            .field("der_len", &self.der.len())
            .finish()
    }
}
