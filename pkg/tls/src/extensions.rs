// Hello-extension parsers. Each one receives the raw extension payload and
// must find the declared inner lengths consuming it exactly: trailing bytes
// and truncation are both `BadClientHello`.

use bytes::Bytes;
use subtle::ConstantTimeEq;

use crate::errors::{Error, Result};
use crate::session::SniResolver;
use crate::wire::{Reader, U16_LIMIT};

tls_enum_u16!(ExtensionType => {
    server_name(0x0000),
    supported_elliptic_curves(0x000A),
    supported_point_formats(0x000B),
    signature_algorithms(0x000D),
    renegotiation_info(0xFF01),
    (65535)
});

tls_enum_u8!(HashAlgorithm => {
    none(0), md5(1), sha1(2), sha224(3), sha256(4), sha384(5), sha512(6), (255)
});

/// SignatureAlgorithm value for RSA; the only signature kind we negotiate.
pub const SIG_RSA: u8 = 1;

const NAME_TYPE_HOSTNAME: u8 = 0;

tls_enum_u16!(NamedCurve => {
    secp192r1(19),
    secp224r1(21),
    secp256r1(23),
    secp384r1(24),
    secp521r1(25),
    (65535)
});

tls_enum_u8!(EcPointFormat => {
    uncompressed(0), ansiX962_compressed_prime(1), ansiX962_compressed_char2(2), (255)
});

/// What the SNI walk concluded. `Rejected` makes the driver send a fatal
/// `unrecognized_name` before failing the hello.
#[derive(Debug)]
pub enum SniOutcome {
    /// No hostname entry in the list; the extension is ignored.
    NoHostname,
    Accepted(crate::options::ServerCredentials),
    Rejected,
}

/*
struct {
    NameType name_type;
    opaque HostName<1..2^16-1>;
} ServerName;

struct {
    ServerName server_name_list<1..2^16-1>
} ServerNameList;
*/
pub(crate) fn parse_servername_ext(
    resolver: &dyn SniResolver,
    payload: Bytes,
) -> Result<SniOutcome> {
    let mut r = Reader::new(payload, Error::BadClientHello);
    let list = r.varlen_vector(1, U16_LIMIT)?;
    r.expect_end()?;

    let mut entries = Reader::new(list, Error::BadClientHello);
    while !entries.is_empty() {
        let typ = entries.read_u8()?;
        let name = entries.varlen_vector(0, U16_LIMIT)?;

        if typ == NAME_TYPE_HOSTNAME {
            return Ok(match resolver.resolve(&name) {
                Some(credentials) => SniOutcome::Accepted(credentials),
                None => SniOutcome::Rejected,
            });
        }
    }

    Ok(SniOutcome::NoHostname)
}

/// RFC 5746 renegotiation_info. On the initial handshake the payload must be
/// a single zero byte; during renegotiation it must carry exactly the
/// client's verify_data from the previous handshake.
pub(crate) fn parse_renegotiation_info(
    renegotiating: bool,
    peer_verify_data: &[u8],
    payload: &[u8],
) -> Result<()> {
    if !renegotiating {
        if payload.len() != 1 || payload[0] != 0 {
            log::debug!("non-zero length renegotiated connection field");
            return Err(Error::BadClientHello);
        }
        return Ok(());
    }

    if payload.len() != 1 + peer_verify_data.len()
        || payload[0] as usize != peer_verify_data.len()
        || payload[1..].ct_eq(peer_verify_data).unwrap_u8() != 1
    {
        log::debug!("non-matching renegotiated connection field");
        return Err(Error::BadClientHello);
    }

    Ok(())
}

/// Strongest-first preference for server signatures.
const SIG_HASH_PREFERENCE: &[HashAlgorithm] = &[
    HashAlgorithm::sha512,
    HashAlgorithm::sha384,
    HashAlgorithm::sha256,
    HashAlgorithm::sha224,
    HashAlgorithm::sha1,
    HashAlgorithm::md5,
];

/// signature_algorithms (TLS 1.2). Picks the strongest supported hash the
/// client pairs with RSA; `None` keeps the SHA-1 default downstream.
pub(crate) fn parse_signature_algorithms_ext(payload: Bytes) -> Result<Option<HashAlgorithm>> {
    let mut r = Reader::new(payload, Error::BadClientHello);
    let list = r.varlen_vector(0, U16_LIMIT)?;
    r.expect_end()?;

    if list.len() % 2 != 0 {
        return Err(Error::BadClientHello);
    }

    let mut best: Option<usize> = None;
    for pair in list.chunks(2) {
        if pair[1] != SIG_RSA {
            continue;
        }

        let hash = HashAlgorithm::from_u8(pair[0]);
        if let Some(rank) = SIG_HASH_PREFERENCE.iter().position(|h| *h == hash) {
            if best.map_or(true, |b| rank < b) {
                best = Some(rank);
            }
        }
    }

    Ok(best.map(|rank| SIG_HASH_PREFERENCE[rank]))
}

/// supported_elliptic_curves. Walks the server's preference order and takes
/// the first curve the client also listed.
pub(crate) fn parse_supported_elliptic_curves(
    server_curves: &[NamedCurve],
    payload: Bytes,
) -> Result<Option<NamedCurve>> {
    let mut r = Reader::new(payload, Error::BadClientHello);
    let list = r.varlen_vector(0, U16_LIMIT)?;
    r.expect_end()?;

    if list.len() % 2 != 0 {
        return Err(Error::BadClientHello);
    }

    let mut offered = Vec::with_capacity(list.len() / 2);
    for id in list.chunks(2) {
        offered.push(NamedCurve::from_u16(u16::from_be_bytes([id[0], id[1]])));
    }

    Ok(server_curves
        .iter()
        .find(|curve| offered.contains(curve))
        .copied())
}

/// supported_point_formats. One-byte list length, entries directly after it.
pub(crate) fn parse_supported_point_formats(payload: &[u8]) -> Result<Option<EcPointFormat>> {
    if payload.is_empty() || payload[0] as usize + 1 != payload.len() {
        return Err(Error::BadClientHello);
    }

    for b in &payload[1..] {
        let format = EcPointFormat::from_u8(*b);
        if format == EcPointFormat::uncompressed
            || format == EcPointFormat::ansiX962_compressed_prime
        {
            return Ok(Some(format));
        }
    }

    Ok(None)
}
