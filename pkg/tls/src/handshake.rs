use bytes::Bytes;

use crate::cipher_suite::CipherSuite;
use crate::errors::{Error, Result};
use crate::extensions::{HashAlgorithm, SIG_RSA};
use crate::provider::Certificate;
use crate::session::Compression;
use crate::wire::{Reader, Writer, U24_LIMIT};

pub const MAJOR_VERSION_3: u8 = 3;

pub const MINOR_VERSION_SSL3: u8 = 0;
pub const MINOR_VERSION_TLS1_0: u8 = 1;
pub const MINOR_VERSION_TLS1_1: u8 = 2;
pub const MINOR_VERSION_TLS1_2: u8 = 3;

/// Only client certificate type we ever request.
pub const CERT_TYPE_RSA_SIGN: u8 = 1;

/// Outgoing DN accumulation in CertificateRequest stops once the message
/// cursor crosses this position.
const CERTIFICATE_REQUEST_DN_LIMIT: usize = 4096;

tls_enum_u8!(HandshakeType => {
    hello_request(0),
    client_hello(1),
    server_hello(2),
    certificate(11),
    server_key_exchange(12),
    certificate_request(13),
    server_hello_done(14),
    certificate_verify(15),
    client_key_exchange(16),
    finished(20),
    (255)
});

/// Builds `msg_type || uint24 length || body`.
pub fn handshake_message<F>(typ: HandshakeType, f: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut Writer) -> Result<()>,
{
    let mut w = Writer::new();
    w.push_u8(typ.to_u8());
    w.varlen_vector(0, U24_LIMIT, f)?;
    Ok(w.into_vec())
}

/*
struct {
    ProtocolVersion client_version;
    Random random;
    SessionID session_id;
    CipherSuite cipher_suites<2..2^16-2>;
    CompressionMethod compression_methods<1..2^8-1>;
    select (extensions_present) {
        case false: struct {};
        case true:  Extension extensions<0..2^16-1>;
    };
} ClientHello;
*/

/// A structurally validated ClientHello, from either framing. Version
/// selection, extension interpretation and suite selection happen in the
/// driver, which also keeps the original advertised version for the RSA
/// premaster rollback check.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientHello {
    pub max_major: u8,
    pub max_minor: u8,
    pub random: [u8; 32],
    pub session_id: Bytes,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Bytes,
    /// `(extension id, payload)` in wire order. Empty for SSLv2 framing.
    pub extensions: Vec<(u16, Bytes)>,
}

impl ClientHello {
    /// Parses a TLS-framed ClientHello handshake message (`msg` starts at
    /// the handshake header; the 5-byte record header was already checked).
    pub fn parse_tls(msg: Bytes) -> Result<ClientHello> {
        let n = msg.len();
        let mut r = Reader::new(msg, Error::BadClientHello);

        if r.read_u8()? != HandshakeType::client_hello.to_u8() {
            return Err(Error::BadClientHello);
        }

        // The handshake length must account for the whole record: no
        // fragmented and no coalesced ClientHello.
        let hs_len = r.read_u24()? as usize;
        if hs_len >= (1 << 16) || n != 4 + hs_len {
            return Err(Error::BadClientHello);
        }

        let max_major = r.read_u8()?;
        let max_minor = r.read_u8()?;
        if max_major != MAJOR_VERSION_3 {
            return Err(Error::BadClientHello);
        }

        let mut random = [0u8; 32];
        random.copy_from_slice(&r.take(32)?);

        let session_id = r.varlen_vector(0, 32)?;

        let ciph_len = r.read_u16()? as usize;
        if ciph_len < 2 || ciph_len > 256 || ciph_len % 2 != 0 {
            return Err(Error::BadClientHello);
        }
        let suites_raw = r.take(ciph_len)?;
        let mut cipher_suites = Vec::with_capacity(ciph_len / 2);
        for chunk in suites_raw.chunks(2) {
            cipher_suites.push(CipherSuite::from_u16(u16::from_be_bytes([chunk[0], chunk[1]])));
        }

        let comp_len = r.read_u8()? as usize;
        if comp_len < 1 || comp_len > 16 {
            return Err(Error::BadClientHello);
        }
        let compression_methods = r.take(comp_len)?;

        let mut extensions = Vec::new();
        if !r.is_empty() {
            let ext_len = r.read_u16()? as usize;
            if (ext_len > 0 && ext_len < 4) || r.remaining() != ext_len {
                return Err(Error::BadClientHello);
            }

            while !r.is_empty() {
                // A residue shorter than one extension header is invalid.
                if r.remaining() < 4 {
                    return Err(Error::BadClientHello);
                }

                let ext_id = r.read_u16()?;
                let ext_size = r.read_u16()? as usize;
                let payload = r.take(ext_size)?;
                extensions.push((ext_id, payload));
            }
        }

        Ok(ClientHello {
            max_major,
            max_minor,
            random,
            session_id,
            cipher_suites,
            compression_methods,
            extensions,
        })
    }

    /*
     * SSLv2 ClientHello, after the 2-byte record length:
     *
     *     0  .   0   message type
     *     1  .   2   protocol version
     *     3  .   4   ciphersuitelist length
     *     5  .   6   session id length
     *     7  .   8   challenge length
     *     9  .  ..   ciphersuitelist (3 bytes each)
     *    ..  .  ..   session id
     *    ..  .  ..   challenge
     */

    /// Parses the legacy SSLv2-framed ClientHello. `msg` starts at the
    /// message-type byte; the 2-byte record length was already validated.
    pub fn parse_v2(msg: Bytes) -> Result<ClientHello> {
        let mut r = Reader::new(msg, Error::BadClientHello);

        if r.read_u8()? != HandshakeType::client_hello.to_u8() {
            return Err(Error::BadClientHello);
        }

        let max_major = r.read_u8()?;
        let max_minor = r.read_u8()?;
        if max_major != MAJOR_VERSION_3 {
            return Err(Error::BadClientHello);
        }

        let ciph_len = r.read_u16()? as usize;
        let sess_len = r.read_u16()? as usize;
        let chal_len = r.read_u16()? as usize;

        if ciph_len < 3 || ciph_len % 3 != 0 {
            return Err(Error::BadClientHello);
        }
        if sess_len > 32 {
            return Err(Error::BadClientHello);
        }
        if chal_len < 8 || chal_len > 32 {
            return Err(Error::BadClientHello);
        }
        if r.remaining() != ciph_len + sess_len + chal_len {
            return Err(Error::BadClientHello);
        }

        // V2 suites are 3 bytes. Anything with a non-zero high byte has no
        // TLS equivalent reachable from this framing and is left out.
        let suites_raw = r.take(ciph_len)?;
        let mut cipher_suites = Vec::new();
        for chunk in suites_raw.chunks(3) {
            if chunk[0] == 0 {
                cipher_suites.push(CipherSuite::from_u16(u16::from_be_bytes([
                    chunk[1], chunk[2],
                ])));
            }
        }

        let session_id = r.take(sess_len)?;

        // The challenge right-aligns into the low half of the random.
        let challenge = r.take(chal_len)?;
        let mut random = [0u8; 32];
        random[32 - chal_len..].copy_from_slice(&challenge);

        r.expect_end()?;

        Ok(ClientHello {
            max_major,
            max_minor,
            random,
            session_id,
            cipher_suites,
            compression_methods: Bytes::from_static(&[0]),
            extensions: Vec::new(),
        })
    }
}

/*
struct {
    ProtocolVersion server_version;
    Random random;
    SessionID session_id;
    CipherSuite cipher_suite;
    CompressionMethod compression_method;
    select (extensions_present) {
        case false: struct {};
        case true:  Extension extensions<0..2^16-1>;
    };
} ServerHello;
*/

#[derive(Debug)]
pub struct ServerHello {
    pub major: u8,
    pub minor: u8,
    /// `gmt_unix_time || random_bytes[28]`, filled by the driver.
    pub random: [u8; 32],
    pub session_id: Bytes,
    pub cipher_suite: CipherSuite,
    pub compression: Compression,
    /// `(peer_verify_data, own_verify_data)` of the previous handshake;
    /// present iff secure renegotiation was negotiated.
    pub renegotiation_info: Option<(Vec<u8>, Vec<u8>)>,
}

impl ServerHello {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        handshake_message(HandshakeType::server_hello, |w| {
            w.push_u8(self.major);
            w.push_u8(self.minor);
            w.extend(&self.random);

            w.varlen_vector(0, 32, |w| {
                w.extend(&self.session_id);
                Ok(())
            })?;

            w.push_u16(self.cipher_suite.to_u16());
            w.push_u8(self.compression.to_u8());

            if let Some((peer, own)) = &self.renegotiation_info {
                w.varlen_vector(0, crate::wire::U16_LIMIT, |w| {
                    w.push_u16(crate::extensions::ExtensionType::renegotiation_info.to_u16());
                    w.varlen_vector(0, crate::wire::U16_LIMIT, |w| {
                        w.varlen_vector(0, crate::wire::U8_LIMIT, |w| {
                            w.extend(peer);
                            w.extend(own);
                            Ok(())
                        })
                    })
                })?;
            }

            Ok(())
        })
    }
}

/*
struct {
    ClientCertificateType certificate_types<1..2^8-1>;
    SignatureAndHashAlgorithm supported_signature_algorithms<2..2^16-2>; // TLS 1.2
    DistinguishedName certificate_authorities<0..2^16-1>;
} CertificateRequest;
*/

#[derive(Debug)]
pub struct CertificateRequest<'a> {
    /// `Some(hash)` emits the TLS 1.2 signature-algorithms block.
    pub verify_sig_alg: Option<HashAlgorithm>,
    pub ca_chain: &'a [Certificate],
}

impl<'a> CertificateRequest<'a> {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        handshake_message(HandshakeType::certificate_request, |w| {
            w.push_u8(1);
            w.push_u8(CERT_TYPE_RSA_SIGN);

            if let Some(alg) = self.verify_sig_alg {
                w.push_u16(2);
                w.push_u8(alg.to_u8());
                w.push_u8(SIG_RSA);
            }

            w.varlen_vector(0, crate::wire::U16_LIMIT, |w| {
                for cert in self.ca_chain {
                    if w.len() > CERTIFICATE_REQUEST_DN_LIMIT {
                        break;
                    }

                    w.varlen_vector(0, crate::wire::U16_LIMIT, |w| {
                        w.extend(&cert.subject_dn);
                        Ok(())
                    })?;
                }
                Ok(())
            })
        })
    }
}

pub fn server_hello_done() -> Result<Vec<u8>> {
    handshake_message(HandshakeType::server_hello_done, |_| Ok(()))
}
