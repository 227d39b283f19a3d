// Key-exchange engine. Five variants share one state graph; the driver
// dispatches into here at every serializer/parser site with the tagged
// variant chosen during suite selection.

use bytes::Bytes;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use zeroize::Zeroizing;

use crate::cipher_suite::KeyExchangeKind;
use crate::errors::{Error, Result};
use crate::extensions::{HashAlgorithm, NamedCurve, SIG_RSA};
use crate::handshake::{handshake_message, HandshakeType, MINOR_VERSION_SSL3, MINOR_VERSION_TLS1_2};
use crate::options::PresharedKey;
use crate::provider::{
    DhmProvider, Digest, EcdhProvider, Rng, RsaPrivateKey, RsaPublicKey, MAX_PREMASTER_SIZE,
};
use crate::wire::{Reader, U16_LIMIT};

/// Per-handshake key-exchange state: the negotiated variant plus whatever
/// ephemeral contexts it needs. The contexts are wiped by their providers
/// when the handshake context goes away.
pub struct KeyExchange {
    pub kind: KeyExchangeKind,
    pub dhm: Option<Box<dyn DhmProvider>>,
    pub ecdh: Option<Box<dyn EcdhProvider>>,
}

pub(crate) struct ServerKexContext<'a> {
    pub minor_ver: u8,
    pub sig_alg: HashAlgorithm,
    pub curve: Option<NamedCurve>,
    pub randbytes: &'a [u8; 64],
    pub rsa_key: Option<&'a dyn RsaPrivateKey>,
    pub digest: &'a dyn Digest,
    pub rng: &'a mut dyn Rng,
}

pub(crate) struct ClientKexContext<'a> {
    pub minor_ver: u8,
    /// Version the client originally advertised, for the premaster
    /// anti-rollback check.
    pub max_major_ver: u8,
    pub max_minor_ver: u8,
    pub rsa_key: Option<&'a dyn RsaPrivateKey>,
    pub psk: Option<&'a PresharedKey>,
    pub rng: &'a mut dyn Rng,
}

impl KeyExchange {
    pub fn emits_server_key_exchange(&self) -> bool {
        matches!(
            self.kind,
            KeyExchangeKind::DheRsa | KeyExchangeKind::EcdheRsa | KeyExchangeKind::DhePsk
        )
    }

    /*
     * Ephemeral DH parameters:
     *
     * struct {
     *     opaque dh_p<1..2^16-1>;
     *     opaque dh_g<1..2^16-1>;
     *     opaque dh_Ys<1..2^16-1>;
     * } ServerDHParams;
     *
     * For *_RSA variants, followed by a signature over
     * client_random || server_random || params.
     */
    pub(crate) fn server_key_exchange(&mut self, cx: ServerKexContext<'_>) -> Result<Vec<u8>> {
        if !self.emits_server_key_exchange() {
            return Err(Error::FeatureUnavailable);
        }

        let signs = matches!(self.kind, KeyExchangeKind::DheRsa | KeyExchangeKind::EcdheRsa);
        if signs && cx.rsa_key.is_none() {
            log::debug!("got no private key");
            return Err(Error::PrivateKeyRequired);
        }

        let kind = self.kind;
        let dhm = &mut self.dhm;
        let ecdh = &mut self.ecdh;

        handshake_message(HandshakeType::server_key_exchange, move |w| {
            // No identity hint.
            if kind == KeyExchangeKind::DhePsk {
                w.push_u16(0);
            }

            let params = match kind {
                KeyExchangeKind::DheRsa | KeyExchangeKind::DhePsk => {
                    let dhm = dhm.as_mut().ok_or(Error::FeatureUnavailable)?;
                    dhm.make_params(&mut *cx.rng)?
                }
                KeyExchangeKind::EcdheRsa => {
                    let curve = cx.curve.ok_or(Error::BadInputData)?;
                    let ecdh = ecdh.as_mut().ok_or(Error::FeatureUnavailable)?;
                    ecdh.make_params(curve, &mut *cx.rng)?
                }
                _ => unreachable!(),
            };
            w.extend(&params);

            if signs {
                let rsa = match cx.rsa_key {
                    Some(rsa) => rsa,
                    None => return Err(Error::PrivateKeyRequired),
                };

                let sig = if cx.minor_ver != MINOR_VERSION_TLS1_2 {
                    // MD5(randbytes || params) || SHA1(randbytes || params),
                    // 36 bytes, signed without a DigestInfo wrapper.
                    let hash = cx.digest.md5_sha1(&[&cx.randbytes[..], &params]);
                    rsa.sign(&mut *cx.rng, None, &hash)?
                } else {
                    let hash = cx.digest.hash(cx.sig_alg, &[&cx.randbytes[..], &params])?;
                    w.push_u8(cx.sig_alg.to_u8());
                    w.push_u8(SIG_RSA);
                    rsa.sign(&mut *cx.rng, Some(cx.sig_alg), &hash)?
                };

                w.push_u16(sig.len() as u16);
                w.extend(&sig);
            }

            Ok(())
        })
    }

    /// Parses the ClientKeyExchange body (after the handshake header) and
    /// assembles the premaster secret.
    pub(crate) fn parse_client_key_exchange(
        &mut self,
        body: Bytes,
        cx: ClientKexContext<'_>,
        premaster: &mut Vec<u8>,
    ) -> Result<()> {
        match self.kind {
            KeyExchangeKind::DheRsa => {
                let dhm = self.dhm.as_mut().ok_or(Error::FeatureUnavailable)?;
                let mut r = Reader::new(body, Error::BadClientKeyExchange);
                read_dh_public(dhm.as_mut(), &mut r)?;

                let len = dhm.modulus_len();
                if len > MAX_PREMASTER_SIZE {
                    return Err(Error::BadInputData);
                }
                premaster.clear();
                premaster.resize(len, 0);
                let n = dhm.calc_secret(premaster).map_err(|e| {
                    log::debug!("dhm_calc_secret failed: {}", e);
                    Error::BadClientKeyExchangeCalcSecret
                })?;
                premaster.truncate(n);
            }

            KeyExchangeKind::EcdheRsa => {
                let ecdh = self.ecdh.as_mut().ok_or(Error::FeatureUnavailable)?;

                if body.is_empty() {
                    return Err(Error::BadClientKeyExchange);
                }
                let n = body[0] as usize;
                if n < 1 || n > ecdh.point_limit() || body.len() != 1 + n {
                    return Err(Error::BadClientKeyExchange);
                }

                ecdh.read_public(&body[1..]).map_err(|e| {
                    log::debug!("ecdh_read_public failed: {}", e);
                    Error::BadClientKeyExchangeReadPublic
                })?;

                premaster.clear();
                premaster.resize(MAX_PREMASTER_SIZE, 0);
                let n = ecdh.calc_secret(premaster).map_err(|e| {
                    log::debug!("ecdh_calc_secret failed: {}", e);
                    Error::BadClientKeyExchangeCalcSecret
                })?;
                premaster.truncate(n);
            }

            KeyExchangeKind::Psk => {
                let psk = configured_psk(cx.psk)?;
                let mut r = Reader::new(body, Error::BadClientKeyExchange);
                check_psk_identity(psk, &mut r)?;

                // premaster = len(psk) || 0^len(psk) || len(psk) || psk
                premaster.clear();
                premaster.extend_from_slice(&(psk.key.len() as u16).to_be_bytes());
                premaster.resize(premaster.len() + psk.key.len(), 0);
                premaster.extend_from_slice(&(psk.key.len() as u16).to_be_bytes());
                premaster.extend_from_slice(&psk.key);
            }

            KeyExchangeKind::DhePsk => {
                let psk = configured_psk(cx.psk)?;
                let dhm = self.dhm.as_mut().ok_or(Error::FeatureUnavailable)?;
                let mut r = Reader::new(body, Error::BadClientKeyExchange);
                check_psk_identity(psk, &mut r)?;
                read_dh_public(dhm.as_mut(), &mut r)?;

                let dhm_len = dhm.modulus_len();
                if 4 + dhm_len + psk.key.len() > MAX_PREMASTER_SIZE {
                    return Err(Error::BadInputData);
                }

                // premaster = len(dh) || dh_secret || len(psk) || psk
                premaster.clear();
                premaster.extend_from_slice(&(dhm_len as u16).to_be_bytes());
                let start = premaster.len();
                premaster.resize(start + dhm_len, 0);
                let n = dhm.calc_secret(&mut premaster[start..]).map_err(|e| {
                    log::debug!("dhm_calc_secret failed: {}", e);
                    Error::BadClientKeyExchangeCalcSecret
                })?;
                if n != dhm_len {
                    log::debug!("dhm_calc_secret result smaller than DHM");
                    return Err(Error::BadInputData);
                }
                premaster.extend_from_slice(&(psk.key.len() as u16).to_be_bytes());
                premaster.extend_from_slice(&psk.key);
            }

            KeyExchangeKind::Rsa => {
                parse_encrypted_premaster(body, cx, premaster)?;
            }
        }

        Ok(())
    }
}

fn configured_psk<'a>(psk: Option<&'a PresharedKey>) -> Result<&'a PresharedKey> {
    match psk {
        Some(psk) if !psk.identity.is_empty() && !psk.key.is_empty() => Ok(psk),
        _ => {
            log::debug!("got no pre-shared key");
            Err(Error::PrivateKeyRequired)
        }
    }
}

/// `opaque psk_identity<0..2^16-1>`, compared against the configured
/// identity without branching on the content.
fn check_psk_identity(psk: &PresharedKey, r: &mut Reader) -> Result<()> {
    let identity = r.varlen_vector(1, U16_LIMIT)?;

    if identity.len() != psk.identity.len()
        || identity.ct_eq(&psk.identity).unwrap_u8() != 1
    {
        log::debug!("unknown PSK identity");
        return Err(Error::BadClientKeyExchange);
    }

    Ok(())
}

/// `opaque dh_Yc<1..2^16-1>`; the peer public value bounded by the modulus.
fn read_dh_public(dhm: &mut dyn DhmProvider, r: &mut Reader) -> Result<()> {
    let n = r.read_u16()? as usize;
    if n < 1 || n > dhm.modulus_len() {
        return Err(Error::BadClientKeyExchange);
    }

    let public = r.take(n)?;
    dhm.read_public(&public).map_err(|e| {
        log::debug!("dhm_read_public failed: {}", e);
        Error::BadClientKeyExchangeReadPublic
    })
}

/// RSA-encrypted premaster.
///
/// Decryption failure, a premaster of the wrong length and a rolled-back
/// version are all indistinguishable from here on: the premaster is
/// replaced with fresh random bytes through a constant-time select, the RNG
/// runs unconditionally, and the handshake only falls over at the Finished
/// check (Bleichenbacher defence).
fn parse_encrypted_premaster(
    body: Bytes,
    cx: ClientKexContext<'_>,
    premaster: &mut Vec<u8>,
) -> Result<()> {
    let rsa = match cx.rsa_key {
        Some(rsa) => rsa,
        None => {
            log::debug!("got no private key");
            return Err(Error::PrivateKeyRequired);
        }
    };

    let n = rsa.len();
    let mut r = Reader::new(body, Error::BadClientKeyExchange);

    if cx.minor_ver != MINOR_VERSION_SSL3 {
        if r.read_u16()? as usize != n {
            return Err(Error::BadClientKeyExchange);
        }
    }

    let ciphertext = r.take(n)?;
    r.expect_end()?;

    let mut plain = Zeroizing::new(vec![0u8; MAX_PREMASTER_SIZE]);
    let (decrypt_ok, plen) = match rsa.decrypt(&ciphertext, &mut plain) {
        Ok(plen) => (Choice::from(1u8), plen),
        Err(_) => (Choice::from(0u8), 0),
    };

    let len_ok = plen.ct_eq(&48usize);
    let version_ok = plain[..2].ct_eq(&[cx.max_major_ver, cx.max_minor_ver][..]);
    let ok = decrypt_ok & len_ok & version_ok;

    // The RNG runs whether or not the ciphertext was good.
    let mut fallback = Zeroizing::new([0u8; 48]);
    cx.rng.fill(&mut fallback[..])?;

    premaster.clear();
    premaster.resize(48, 0);
    for i in 0..48 {
        premaster[i] = u8::conditional_select(&fallback[i], &plain[i], ok);
    }

    Ok(())
}

pub(crate) struct CertVerifyContext<'a> {
    pub minor_ver: u8,
    pub verify_sig_alg: HashAlgorithm,
    pub peer_rsa: &'a dyn RsaPublicKey,
    /// MD5||SHA-1 transcript snapshot, taken before this message.
    pub transcript_md5_sha1: [u8; 36],
    /// TLS 1.2 transcript digest under `verify_sig_alg`.
    pub transcript_tls12: Option<Vec<u8>>,
}

/*
struct {
    SignatureAndHashAlgorithm algorithm;  // TLS 1.2 only
    opaque signature<0..2^16-1>;
} DigitallySigned;
*/
pub(crate) fn parse_certificate_verify(body: Bytes, cx: CertVerifyContext<'_>) -> Result<()> {
    let mut r = Reader::new(body, Error::BadCertificateVerify);

    let (md_alg, hash): (Option<HashAlgorithm>, &[u8]) = if cx.minor_ver == MINOR_VERSION_TLS1_2 {
        // The client must use exactly the algorithm pair advertised in our
        // CertificateRequest.
        if r.read_u8()? != cx.verify_sig_alg.to_u8() || r.read_u8()? != SIG_RSA {
            log::debug!("peer not adhering to requested sig_alg for verify message");
            return Err(Error::BadCertificateVerify);
        }

        let digest = cx
            .transcript_tls12
            .as_ref()
            .ok_or(Error::BadInputData)?;
        (Some(cx.verify_sig_alg), digest.as_slice())
    } else {
        // hashlen is 36 in this leg: MD5 || SHA-1 of the transcript.
        (None, &cx.transcript_md5_sha1[..])
    };

    let sig_len = r.read_u16()? as usize;
    if sig_len != cx.peer_rsa.len() {
        return Err(Error::BadCertificateVerify);
    }

    let sig = r.take(sig_len)?;
    r.expect_end()?;

    cx.peer_rsa.verify(md_alg, hash, &sig)
}
