// Deterministic fakes for driver and key-exchange tests: an in-memory
// record layer, a counting RNG and byte-stable stand-ins for the crypto
// providers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::alert::{AlertDescription, AlertLevel};
use crate::cipher_suite::CipherSuite;
use crate::errors::{Error, Result};
use crate::extensions::{HashAlgorithm, NamedCurve};
use crate::handshake::{HandshakeType, MAJOR_VERSION_3};
use crate::options::{PresharedKey, ServerCredentials};
use crate::provider::{
    Certificate, DhmProvider, Digest, EcdhProvider, PeerCertificate, Rng, RsaPrivateKey,
    RsaPublicKey, SecretSchedule,
};
use crate::record::{ContentType, Record, RecordLayer};
use crate::server::ConnectionHooks;
use crate::session::{Compression, Session, SessionCache, SniResolver};
use crate::options::VerifyMode;

pub(crate) fn hash_len(alg: HashAlgorithm) -> usize {
    match alg {
        HashAlgorithm::md5 => 16,
        HashAlgorithm::sha1 => 20,
        HashAlgorithm::sha224 => 28,
        HashAlgorithm::sha256 => 32,
        HashAlgorithm::sha384 => 48,
        HashAlgorithm::sha512 => 64,
        _ => 0,
    }
}

/// Fills with a running counter so tests can predict every byte.
pub(crate) struct SeqRng {
    next: u8,
    calls: usize,
}

impl SeqRng {
    pub fn new() -> Self {
        Self { next: 0, calls: 0 }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn expected_fill(n: usize) -> Vec<u8> {
        (0..n).map(|i| i as u8).collect()
    }
}

impl Rng for SeqRng {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        for b in buf.iter_mut() {
            *b = self.next;
            self.next = self.next.wrapping_add(1);
        }
        self.calls += 1;
        Ok(())
    }
}

/// Toy RSA key: "ciphertext" is `0x02 || len || plaintext || padding` and a
/// signature is a fixed byte run of modulus length.
pub(crate) struct TestRsaKey {
    modulus: usize,
    signed_with: Mutex<Option<Option<HashAlgorithm>>>,
}

impl TestRsaKey {
    pub fn new(modulus: usize) -> Self {
        Self {
            modulus,
            signed_with: Mutex::new(None),
        }
    }

    pub fn encrypt(modulus: usize, plaintext: &[u8]) -> Vec<u8> {
        assert!(plaintext.len() + 2 <= modulus);
        let mut out = vec![0x02, plaintext.len() as u8];
        out.extend_from_slice(plaintext);
        out.resize(modulus, 0xFF);
        out
    }

    pub fn bad_ciphertext(modulus: usize) -> Vec<u8> {
        vec![0x00; modulus]
    }

    pub fn signature(modulus: usize) -> Vec<u8> {
        vec![0xA5; modulus]
    }

    pub fn signed_with(&self) -> Option<Option<HashAlgorithm>> {
        *self.signed_with.lock().unwrap()
    }
}

impl RsaPrivateKey for TestRsaKey {
    fn len(&self) -> usize {
        self.modulus
    }

    fn sign(
        &self,
        _rng: &mut dyn Rng,
        md_alg: Option<HashAlgorithm>,
        _hash: &[u8],
    ) -> Result<Vec<u8>> {
        *self.signed_with.lock().unwrap() = Some(md_alg);
        Ok(Self::signature(self.modulus))
    }

    fn decrypt(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        if input.len() != self.modulus || input[0] != 0x02 {
            return Err(Error::Crypto("bad padding".into()));
        }

        let n = input[1] as usize;
        if 2 + n > input.len() || n > output.len() {
            return Err(Error::Crypto("bad padding".into()));
        }

        output[..n].copy_from_slice(&input[2..2 + n]);
        Ok(n)
    }
}

pub(crate) struct TestRsaPublicKey {
    modulus: usize,
    last_hash_len: Mutex<Option<usize>>,
}

impl TestRsaPublicKey {
    pub fn new(modulus: usize) -> Self {
        Self {
            modulus,
            last_hash_len: Mutex::new(None),
        }
    }

    pub fn last_hash_len(&self) -> Option<usize> {
        *self.last_hash_len.lock().unwrap()
    }
}

impl RsaPublicKey for TestRsaPublicKey {
    fn len(&self) -> usize {
        self.modulus
    }

    fn verify(&self, _md_alg: Option<HashAlgorithm>, hash: &[u8], sig: &[u8]) -> Result<()> {
        *self.last_hash_len.lock().unwrap() = Some(hash.len());
        if sig == &TestRsaKey::signature(self.modulus)[..] {
            Ok(())
        } else {
            Err(Error::Crypto("bad signature".into()))
        }
    }
}

pub(crate) struct TestDhm {
    saw_public: bool,
}

impl TestDhm {
    pub fn new() -> Self {
        Self { saw_public: false }
    }

    pub fn params_bytes() -> Vec<u8> {
        vec![0x00, 0x01, 0xEF, 0x00, 0x01, 0x02, 0x00, 0x01, 0x9A]
    }

    pub fn shared_secret() -> [u8; 8] {
        [0x11; 8]
    }
}

impl DhmProvider for TestDhm {
    fn make_params(&mut self, _rng: &mut dyn Rng) -> Result<Vec<u8>> {
        Ok(Self::params_bytes())
    }

    fn modulus_len(&self) -> usize {
        8
    }

    fn read_public(&mut self, public: &[u8]) -> Result<()> {
        if public.is_empty() {
            return Err(Error::Crypto("empty public".into()));
        }
        self.saw_public = true;
        Ok(())
    }

    fn calc_secret(&mut self, output: &mut [u8]) -> Result<usize> {
        let secret = Self::shared_secret();
        output[..secret.len()].copy_from_slice(&secret);
        Ok(secret.len())
    }
}

pub(crate) struct TestEcdh {
    saw_public: bool,
}

impl TestEcdh {
    pub fn new() -> Self {
        Self { saw_public: false }
    }

    pub fn params_bytes(curve: NamedCurve) -> Vec<u8> {
        let mut out = vec![0x03];
        out.extend_from_slice(&curve.to_u16().to_be_bytes());
        out.extend_from_slice(&[0x04, 0x44, 0x44, 0x44, 0x44]);
        out
    }

    pub fn shared_secret() -> [u8; 32] {
        [0x22; 32]
    }
}

impl EcdhProvider for TestEcdh {
    fn make_params(&mut self, curve: NamedCurve, _rng: &mut dyn Rng) -> Result<Vec<u8>> {
        Ok(Self::params_bytes(curve))
    }

    fn point_limit(&self) -> usize {
        2 * 32 + 2
    }

    fn read_public(&mut self, point: &[u8]) -> Result<()> {
        if point.is_empty() {
            return Err(Error::Crypto("empty point".into()));
        }
        self.saw_public = true;
        Ok(())
    }

    fn calc_secret(&mut self, output: &mut [u8]) -> Result<usize> {
        let secret = Self::shared_secret();
        output[..secret.len()].copy_from_slice(&secret);
        Ok(secret.len())
    }
}

/// Hash output is `alg repeated` so tests can see which algorithm ran.
pub(crate) struct TestDigest;

impl Digest for TestDigest {
    fn hash(&self, alg: HashAlgorithm, _parts: &[&[u8]]) -> Result<Vec<u8>> {
        Ok(vec![alg.to_u8(); hash_len(alg)])
    }

    fn md5_sha1(&self, _parts: &[&[u8]]) -> [u8; 36] {
        [0x36; 36]
    }
}

pub(crate) fn test_psk(identity: &[u8], key: &[u8]) -> PresharedKey {
    PresharedKey {
        identity: identity.to_vec(),
        key: zeroize::Zeroizing::new(key.to_vec()),
    }
}

pub(crate) fn test_certificate() -> Certificate {
    Certificate {
        der: Bytes::from_static(&[0x30, 0x82, 0x01, 0x00]),
        subject_dn: Bytes::from_static(&[0x30, 0x03, 0x0C, 0x01, 0x61]),
    }
}

pub(crate) fn test_credentials() -> ServerCredentials {
    ServerCredentials {
        chain: vec![test_certificate()],
        key: Arc::new(TestRsaKey::new(64)),
    }
}

pub(crate) fn test_peer_certificate() -> PeerCertificate {
    PeerCertificate {
        der: Bytes::from_static(&[0x30, 0x82, 0x02, 0x00]),
        rsa: Arc::new(TestRsaPublicKey::new(64)),
    }
}

pub(crate) struct TestSniResolver {
    name: Vec<u8>,
}

impl TestSniResolver {
    pub fn accepting(name: &[u8]) -> Self {
        Self { name: name.to_vec() }
    }
}

impl SniResolver for TestSniResolver {
    fn resolve(&self, name: &[u8]) -> Option<ServerCredentials> {
        if name == &self.name[..] {
            Some(test_credentials())
        } else {
            None
        }
    }
}

pub(crate) struct TestSessionCache {
    sessions: Mutex<Vec<Session>>,
    stores: Mutex<usize>,
}

impl TestSessionCache {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            stores: Mutex::new(0),
        }
    }

    pub fn with_session(session: Session) -> Self {
        let cache = Self::new();
        cache.sessions.lock().unwrap().push(session);
        cache
    }

    pub fn store_count(&self) -> usize {
        *self.stores.lock().unwrap()
    }
}

impl SessionCache for TestSessionCache {
    fn lookup(&self, id: &[u8]) -> Option<Session> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id() == id)
            .cloned()
    }

    fn store(&self, session: &Session) {
        *self.stores.lock().unwrap() += 1;
        self.sessions.lock().unwrap().push(session.clone());
    }
}

// Lets tests hold on to the cache while the config owns a handle to it.
impl SessionCache for Arc<TestSessionCache> {
    fn lookup(&self, id: &[u8]) -> Option<Session> {
        self.as_ref().lookup(id)
    }

    fn store(&self, session: &Session) {
        self.as_ref().store(session)
    }
}

/// In-memory record layer: raw input for the hello bootstrap, a queue of
/// framed records afterwards, and capture of everything written.
pub(crate) struct TestRecordLayer {
    pub raw_input: Vec<u8>,
    pub records: VecDeque<Record>,
    pub written: Vec<(ContentType, Vec<u8>)>,
    pub alerts: Vec<(AlertLevel, AlertDescription)>,
    pub input_consumed: bool,
}

impl TestRecordLayer {
    pub fn new() -> Self {
        Self {
            raw_input: Vec::new(),
            records: VecDeque::new(),
            written: Vec::new(),
            alerts: Vec::new(),
            input_consumed: false,
        }
    }

    pub fn with_raw_input(input: Vec<u8>) -> Self {
        let mut layer = Self::new();
        layer.raw_input = input;
        layer
    }

    pub fn push_handshake(&mut self, payload: Vec<u8>) {
        self.records.push_back(Record {
            content_type: ContentType::handshake,
            payload: Bytes::from(payload),
        });
    }

    pub fn written_handshakes(&self) -> Vec<&[u8]> {
        self.written
            .iter()
            .filter(|(t, _)| *t == ContentType::handshake)
            .map(|(_, p)| p.as_slice())
            .collect()
    }
}

impl RecordLayer for TestRecordLayer {
    fn fetch_input(&mut self, need: usize) -> Result<Bytes> {
        if self.raw_input.len() < need {
            return Err(Error::WantRead);
        }
        Ok(Bytes::from(self.raw_input[..need].to_vec()))
    }

    fn consume_input(&mut self) {
        self.raw_input.clear();
        self.input_consumed = true;
    }

    fn read_record(&mut self) -> Result<Record> {
        self.records.pop_front().ok_or(Error::WantRead)
    }

    fn write_record(&mut self, content_type: ContentType, payload: &[u8]) -> Result<()> {
        self.written.push((content_type, payload.to_vec()));
        Ok(())
    }

    fn flush_output(&mut self) -> Result<()> {
        Ok(())
    }

    fn send_alert(&mut self, level: AlertLevel, description: AlertDescription) -> Result<()> {
        self.alerts.push((level, description));
        Ok(())
    }
}

pub(crate) struct TestSecrets {
    pub transcript: Vec<Vec<u8>>,
    pub derived_premaster: Option<Vec<u8>>,
    pub derive_calls: usize,
    pub resumed_derive: bool,
}

impl TestSecrets {
    pub fn new() -> Self {
        Self {
            transcript: Vec::new(),
            derived_premaster: None,
            derive_calls: 0,
            resumed_derive: false,
        }
    }
}

impl SecretSchedule for TestSecrets {
    fn update_transcript(&mut self, data: &[u8]) {
        self.transcript.push(data.to_vec());
    }

    fn derive_keys(
        &mut self,
        premaster: Option<&[u8]>,
        master: &mut [u8; 48],
        _randbytes: &[u8; 64],
        _minor: u8,
        _suite: CipherSuite,
        _compression: Compression,
    ) -> Result<()> {
        self.derive_calls += 1;
        match premaster {
            Some(pms) => {
                self.derived_premaster = Some(pms.to_vec());
                *master = [0x77; 48];
            }
            None => {
                // Resumption: the master secret is already in place.
                self.resumed_derive = true;
            }
        }
        Ok(())
    }

    fn calc_verify(&self) -> [u8; 36] {
        [0x55; 36]
    }

    fn calc_verify_with(&self, alg: HashAlgorithm) -> Result<Vec<u8>> {
        Ok(vec![0x66; hash_len(alg)])
    }
}

pub(crate) struct TestHooks {
    pub events: Vec<&'static str>,
    pub client_cert: Option<PeerCertificate>,
    pub client_finished: Vec<u8>,
    pub server_finished: Vec<u8>,
    pub wrapped_up: bool,
}

impl TestHooks {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            client_cert: None,
            client_finished: vec![0xF1; 12],
            server_finished: vec![0xF2; 12],
            wrapped_up: false,
        }
    }
}

impl ConnectionHooks for TestHooks {
    fn write_certificate(
        &mut self,
        records: &mut dyn RecordLayer,
        _secrets: &mut dyn SecretSchedule,
        _chain: Option<&[Certificate]>,
    ) -> Result<()> {
        self.events.push("write_certificate");
        records.write_record(
            ContentType::handshake,
            &[HandshakeType::certificate.to_u8(), 0, 0, 3, 0, 0, 0],
        )
    }

    fn parse_certificate(
        &mut self,
        _records: &mut dyn RecordLayer,
        _secrets: &mut dyn SecretSchedule,
        _authmode: VerifyMode,
    ) -> Result<Option<PeerCertificate>> {
        self.events.push("parse_certificate");
        Ok(self.client_cert.clone())
    }

    fn write_change_cipher_spec(&mut self, records: &mut dyn RecordLayer) -> Result<()> {
        self.events.push("write_change_cipher_spec");
        records.write_record(ContentType::change_cipher_spec, &[1])
    }

    fn parse_change_cipher_spec(&mut self, _records: &mut dyn RecordLayer) -> Result<()> {
        self.events.push("parse_change_cipher_spec");
        Ok(())
    }

    fn write_finished(
        &mut self,
        records: &mut dyn RecordLayer,
        _secrets: &mut dyn SecretSchedule,
    ) -> Result<Vec<u8>> {
        self.events.push("write_finished");
        let mut msg = vec![HandshakeType::finished.to_u8(), 0, 0, 12];
        msg.extend_from_slice(&self.server_finished);
        records.write_record(ContentType::handshake, &msg)?;
        Ok(self.server_finished.clone())
    }

    fn parse_finished(
        &mut self,
        _records: &mut dyn RecordLayer,
        _secrets: &mut dyn SecretSchedule,
    ) -> Result<Vec<u8>> {
        self.events.push("parse_finished");
        Ok(self.client_finished.clone())
    }

    fn handshake_wrapup(&mut self, _session: &Session) -> Result<()> {
        self.events.push("handshake_wrapup");
        self.wrapped_up = true;
        Ok(())
    }
}

/// Builds a TLS-framed ClientHello handshake message (no record header).
pub(crate) fn client_hello_bytes(
    minor: u8,
    suites: &[u16],
    extensions: &[(u16, Vec<u8>)],
) -> Vec<u8> {
    client_hello_bytes_with_session(minor, &[], suites, extensions)
}

pub(crate) fn client_hello_bytes_with_session(
    minor: u8,
    session_id: &[u8],
    suites: &[u16],
    extensions: &[(u16, Vec<u8>)],
) -> Vec<u8> {
    let mut body = vec![MAJOR_VERSION_3, minor];
    body.extend_from_slice(&[0x42; 32]);
    body.push(session_id.len() as u8);
    body.extend_from_slice(session_id);
    body.extend_from_slice(&((suites.len() * 2) as u16).to_be_bytes());
    for suite in suites {
        body.extend_from_slice(&suite.to_be_bytes());
    }
    body.extend_from_slice(&[1, 0]); // compression: null only

    if !extensions.is_empty() {
        let mut ext_block = Vec::new();
        for (id, payload) in extensions {
            ext_block.extend_from_slice(&id.to_be_bytes());
            ext_block.extend_from_slice(&(payload.len() as u16).to_be_bytes());
            ext_block.extend_from_slice(payload);
        }
        body.extend_from_slice(&(ext_block.len() as u16).to_be_bytes());
        body.extend_from_slice(&ext_block);
    }

    let mut msg = vec![HandshakeType::client_hello.to_u8()];
    msg.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    msg.extend_from_slice(&body);
    msg
}

/// Same, with the 5-byte record header for the raw-input bootstrap path.
pub(crate) fn client_hello_record(
    minor: u8,
    suites: &[u16],
    extensions: &[(u16, Vec<u8>)],
) -> Vec<u8> {
    record_for(client_hello_bytes(minor, suites, extensions))
}

pub(crate) fn client_hello_record_with_session(
    minor: u8,
    session_id: &[u8],
    suites: &[u16],
    extensions: &[(u16, Vec<u8>)],
) -> Vec<u8> {
    record_for(client_hello_bytes_with_session(minor, session_id, suites, extensions))
}

fn record_for(msg: Vec<u8>) -> Vec<u8> {
    let mut out = vec![ContentType::handshake.to_u8(), MAJOR_VERSION_3, 1];
    out.extend_from_slice(&(msg.len() as u16).to_be_bytes());
    out.extend_from_slice(&msg);
    out
}
