// Server-side handshake driver. One `step()` call advances exactly one
// state; the caller loops until `HandshakeOver` or a non-retryable error.

use arrayref::array_mut_ref;
use bytes::Bytes;
use zeroize::{Zeroize, Zeroizing};

use crate::alert::{AlertDescription, AlertLevel};
use crate::cipher_suite::{CipherSuiteInfo, KeyExchangeKind, MacAlgorithm};
use crate::errors::{Error, Result};
use crate::extensions::{
    self, EcPointFormat, ExtensionType, HashAlgorithm, NamedCurve, SniOutcome,
};
use crate::handshake::{
    server_hello_done, CertificateRequest, ClientHello, HandshakeType, ServerHello,
    MAJOR_VERSION_3, MINOR_VERSION_TLS1_2,
};
use crate::key_exchange::{
    parse_certificate_verify, CertVerifyContext, ClientKexContext, KeyExchange, ServerKexContext,
};
use crate::options::{LegacyRenegotiationPolicy, ServerConfig, VerifyMode};
use crate::provider::{
    Certificate, DhmProvider, Digest, EcdhProvider, PeerCertificate, Rng, RsaPrivateKey,
    SecretSchedule,
};
use crate::record::{ContentType, RecordLayer};
use crate::session::{Compression, Session};

/// Ordered handshake states. `step()` moves forward only; skipped messages
/// still advance by one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandshakeState {
    HelloRequest,
    ClientHello,
    ServerHello,
    ServerCertificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    ClientCertificate,
    ClientKeyExchange,
    CertificateVerify,
    ClientChangeCipherSpec,
    ClientFinished,
    ServerChangeCipherSpec,
    ServerFinished,
    FlushBuffers,
    HandshakeWrapup,
    HandshakeOver,
}

impl HandshakeState {
    fn next(self) -> HandshakeState {
        use HandshakeState::*;
        match self {
            HelloRequest => ClientHello,
            ClientHello => ServerHello,
            ServerHello => ServerCertificate,
            ServerCertificate => ServerKeyExchange,
            ServerKeyExchange => CertificateRequest,
            CertificateRequest => ServerHelloDone,
            ServerHelloDone => ClientCertificate,
            ClientCertificate => ClientKeyExchange,
            ClientKeyExchange => CertificateVerify,
            CertificateVerify => ClientChangeCipherSpec,
            ClientChangeCipherSpec => ClientFinished,
            ClientFinished => ServerChangeCipherSpec,
            ServerChangeCipherSpec => ServerFinished,
            ServerFinished => FlushBuffers,
            FlushBuffers => HandshakeWrapup,
            HandshakeWrapup => HandshakeOver,
            HandshakeOver => HandshakeOver,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecureRenegotiation {
    Legacy,
    Secure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenegotiationState {
    InitialHandshake,
    Renegotiation,
}

/// Shared connection plumbing outside this crate's scope: certificate
/// read/write (X.509), ChangeCipherSpec and Finished (transform switch and
/// PRF), and post-handshake promotion. All of it updates the transcript
/// through the `SecretSchedule` it is handed.
pub trait ConnectionHooks {
    fn write_certificate(
        &mut self,
        records: &mut dyn RecordLayer,
        secrets: &mut dyn SecretSchedule,
        chain: Option<&[Certificate]>,
    ) -> Result<()>;

    fn parse_certificate(
        &mut self,
        records: &mut dyn RecordLayer,
        secrets: &mut dyn SecretSchedule,
        authmode: VerifyMode,
    ) -> Result<Option<PeerCertificate>>;

    fn write_change_cipher_spec(&mut self, records: &mut dyn RecordLayer) -> Result<()>;

    fn parse_change_cipher_spec(&mut self, records: &mut dyn RecordLayer) -> Result<()>;

    /// Writes Finished and returns our verify_data.
    fn write_finished(
        &mut self,
        records: &mut dyn RecordLayer,
        secrets: &mut dyn SecretSchedule,
    ) -> Result<Vec<u8>>;

    /// Reads and checks the peer Finished, returning its verify_data.
    fn parse_finished(
        &mut self,
        records: &mut dyn RecordLayer,
        secrets: &mut dyn SecretSchedule,
    ) -> Result<Vec<u8>>;

    /// Promotes the negotiated session into the connection's transform
    /// state. The handshake context is destroyed right after.
    fn handshake_wrapup(&mut self, session: &Session) -> Result<()>;
}

/// Everything the driver borrows for the duration of one handshake.
pub struct HandshakeEnvironment<'a> {
    pub records: &'a mut dyn RecordLayer,
    pub secrets: &'a mut dyn SecretSchedule,
    pub hooks: &'a mut dyn ConnectionHooks,
    pub rng: &'a mut dyn Rng,
    pub digest: &'a dyn Digest,
    /// Ephemeral DH context for DHE suites, if the server has parameters.
    pub dhm: Option<Box<dyn DhmProvider>>,
    /// Ephemeral ECDH context for ECDHE suites.
    pub ecdh: Option<Box<dyn EcdhProvider>>,
}

/// State carried over from the previous handshake on this connection, for
/// RFC 5746 renegotiation.
pub struct PriorHandshake {
    pub secure_renegotiation: SecureRenegotiation,
    pub peer_verify_data: Vec<u8>,
    pub own_verify_data: Vec<u8>,
}

impl Default for PriorHandshake {
    fn default() -> Self {
        Self {
            secure_renegotiation: SecureRenegotiation::Legacy,
            peer_verify_data: Vec::new(),
            own_verify_data: Vec::new(),
        }
    }
}

/// One server handshake in flight. Created per handshake (or per
/// renegotiation) and discarded afterwards; the premaster is wiped on drop.
pub struct ServerHandshake<'a> {
    config: &'a ServerConfig,
    records: &'a mut dyn RecordLayer,
    secrets: &'a mut dyn SecretSchedule,
    hooks: &'a mut dyn ConnectionHooks,
    rng: &'a mut dyn Rng,
    digest: &'a dyn Digest,

    state: HandshakeState,
    renegotiation: RenegotiationState,
    secure_renegotiation: SecureRenegotiation,

    major_ver: u8,
    minor_ver: u8,
    /// Version the client advertised, kept even when we negotiate lower.
    max_major_ver: u8,
    max_minor_ver: u8,

    /// client_random || server_random.
    randbytes: [u8; 64],
    session: Session,
    suite_info: Option<&'static CipherSuiteInfo>,
    resume: bool,

    /// Hash for our ServerKeyExchange signature (TLS 1.2); SHA-1 applies
    /// when the client sent no signature_algorithms.
    sig_alg: HashAlgorithm,
    /// Hash we demand in the client's CertificateVerify (TLS 1.2).
    verify_sig_alg: HashAlgorithm,

    ec_curve: Option<NamedCurve>,
    ec_point_format: EcPointFormat,

    key_exchange: KeyExchange,
    premaster: Zeroizing<Vec<u8>>,

    sni_credentials: Option<crate::options::ServerCredentials>,

    peer_verify_data: Vec<u8>,
    own_verify_data: Vec<u8>,
}

impl<'a> ServerHandshake<'a> {
    pub fn new(config: &'a ServerConfig, env: HandshakeEnvironment<'a>) -> Self {
        Self::create(
            config,
            env,
            RenegotiationState::InitialHandshake,
            PriorHandshake::default(),
        )
    }

    /// Begins a renegotiation on an established connection. `prior` carries
    /// the previous handshake's verify_data and renegotiation standing.
    pub fn renegotiate(
        config: &'a ServerConfig,
        env: HandshakeEnvironment<'a>,
        prior: PriorHandshake,
    ) -> Self {
        Self::create(config, env, RenegotiationState::Renegotiation, prior)
    }

    fn create(
        config: &'a ServerConfig,
        env: HandshakeEnvironment<'a>,
        renegotiation: RenegotiationState,
        prior: PriorHandshake,
    ) -> Self {
        Self {
            config,
            records: env.records,
            secrets: env.secrets,
            hooks: env.hooks,
            rng: env.rng,
            digest: env.digest,

            state: HandshakeState::HelloRequest,
            renegotiation,
            secure_renegotiation: prior.secure_renegotiation,

            major_ver: 0,
            minor_ver: 0,
            max_major_ver: 0,
            max_minor_ver: 0,

            randbytes: [0u8; 64],
            session: Session::new(),
            suite_info: None,
            resume: false,

            sig_alg: HashAlgorithm::sha1,
            verify_sig_alg: HashAlgorithm::sha256,

            ec_curve: None,
            ec_point_format: EcPointFormat::uncompressed,

            key_exchange: KeyExchange {
                kind: KeyExchangeKind::Rsa,
                dhm: env.dhm,
                ecdh: env.ecdh,
            },
            premaster: Zeroizing::new(Vec::new()),

            sni_credentials: None,

            peer_verify_data: prior.peer_verify_data,
            own_verify_data: prior.own_verify_data,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_over(&self) -> bool {
        self.state == HandshakeState::HandshakeOver
    }

    pub fn is_resumed(&self) -> bool {
        self.resume
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn secure_renegotiation(&self) -> SecureRenegotiation {
        self.secure_renegotiation
    }

    pub fn negotiated_version(&self) -> (u8, u8) {
        (self.major_ver, self.minor_ver)
    }

    pub fn own_verify_data(&self) -> &[u8] {
        &self.own_verify_data
    }

    pub fn peer_verify_data(&self) -> &[u8] {
        &self.peer_verify_data
    }

    /// Advances the handshake by exactly one state. Retryable transport
    /// conditions surface as `WantRead`/`WantWrite` with the state
    /// unchanged; every other error is fatal to the handshake.
    pub fn step(&mut self) -> Result<()> {
        use HandshakeState::*;

        if self.state == HandshakeOver {
            return Err(Error::BadInputData);
        }

        log::trace!("server state: {:?}", self.state);

        self.records.flush_output()?;

        match self.state {
            HelloRequest => {
                self.state = ClientHello;
                Ok(())
            }

            ClientHello => self.parse_client_hello(),

            ServerHello => self.write_server_hello(),
            ServerCertificate => self.write_certificate(),
            ServerKeyExchange => self.write_server_key_exchange(),
            CertificateRequest => self.write_certificate_request(),
            ServerHelloDone => self.write_server_hello_done(),

            ClientCertificate => self.parse_certificate(),
            ClientKeyExchange => self.parse_client_key_exchange(),
            CertificateVerify => self.parse_certificate_verify(),

            ClientChangeCipherSpec => {
                self.hooks.parse_change_cipher_spec(&mut *self.records)?;
                self.state = self.state.next();
                Ok(())
            }

            ClientFinished => {
                let verify_data = self
                    .hooks
                    .parse_finished(&mut *self.records, &mut *self.secrets)?;
                self.peer_verify_data = verify_data;
                self.state = if self.resume {
                    FlushBuffers
                } else {
                    ServerChangeCipherSpec
                };
                Ok(())
            }

            ServerChangeCipherSpec => {
                self.hooks.write_change_cipher_spec(&mut *self.records)?;
                self.state = self.state.next();
                Ok(())
            }

            ServerFinished => {
                let verify_data = self
                    .hooks
                    .write_finished(&mut *self.records, &mut *self.secrets)?;
                self.own_verify_data = verify_data;
                self.state = if self.resume {
                    ClientChangeCipherSpec
                } else {
                    FlushBuffers
                };
                Ok(())
            }

            FlushBuffers => {
                log::debug!("handshake: done");
                self.state = HandshakeWrapup;
                Ok(())
            }

            HandshakeWrapup => self.handshake_wrapup(),

            HandshakeOver => unreachable!(),
        }
    }

    fn negotiate_version(&mut self, peer_major: u8, peer_minor: u8) -> Result<()> {
        self.major_ver = MAJOR_VERSION_3;
        self.minor_ver = peer_minor.min(self.config.max_minor_version);

        if self.minor_ver < self.config.min_minor_version {
            log::debug!(
                "client only supports ssl smaller than minimum [3:{}] < [3:{}]",
                peer_minor,
                self.config.min_minor_version
            );
            self.records
                .send_alert(AlertLevel::fatal, AlertDescription::protocol_version)?;
            return Err(Error::BadProtocolVersion);
        }

        self.max_major_ver = peer_major;
        self.max_minor_ver = peer_minor;
        Ok(())
    }

    fn parse_client_hello(&mut self) -> Result<()> {
        log::debug!("=> parse client hello");

        let (hello, from_sslv2) = if self.renegotiation == RenegotiationState::InitialHandshake {
            let header = self.records.fetch_input(5)?;

            if header[0] & 0x80 != 0 {
                (self.read_client_hello_v2(&header)?, true)
            } else {
                (self.read_client_hello_tls(&header)?, false)
            }
        } else {
            // The record layer has already framed the message. An SSLv2
            // hello cannot reach this path, which is exactly the rule: the
            // legacy framing is a version-negotiation bootstrap only.
            let record = self.records.read_record()?;
            if record.content_type != ContentType::handshake {
                return Err(Error::BadClientHello);
            }

            self.secrets.update_transcript(&record.payload);

            let hello = ClientHello::parse_tls(record.payload)?;
            self.negotiate_version(hello.max_major, hello.max_minor)?;
            (hello, false)
        };

        self.finish_client_hello(hello, from_sslv2)
    }

    /*
     * SSLv3/TLS ClientHello record:
     *     0  .   0   message type
     *     1  .   2   protocol version
     *     3  .   4   message length
     */
    fn read_client_hello_tls(&mut self, header: &[u8]) -> Result<ClientHello> {
        if header[0] != ContentType::handshake.to_u8() || header[1] != MAJOR_VERSION_3 {
            log::debug!("bad client hello message");
            return Err(Error::BadClientHello);
        }

        let n = u16::from_be_bytes([header[3], header[4]]) as usize;
        if n < 45 || n > 512 {
            log::debug!("bad client hello message");
            return Err(Error::BadClientHello);
        }

        let input = self.records.fetch_input(5 + n)?;
        let msg = input.slice(5..5 + n);

        // Fail-fast order: handshake header, then version policy, then the
        // message body.
        if msg[0] != HandshakeType::client_hello.to_u8() || msg[4] != MAJOR_VERSION_3 {
            log::debug!("bad client hello message");
            return Err(Error::BadClientHello);
        }
        if msg[1] != 0 || n != 4 + u16::from_be_bytes([msg[2], msg[3]]) as usize {
            log::debug!("bad client hello message");
            return Err(Error::BadClientHello);
        }

        self.negotiate_version(msg[4], msg[5])?;

        self.secrets.update_transcript(&msg);

        ClientHello::parse_tls(msg)
    }

    /*
     * SSLv2 ClientHello record:
     *     0  .   1   message length (high bit set)
     *     2  .   2   message type
     *     3  .   4   protocol version
     */
    fn read_client_hello_v2(&mut self, header: &[u8]) -> Result<ClientHello> {
        log::debug!("=> parse client hello v2");

        let n = (((header[0] as usize) << 8) | header[1] as usize) & 0x7FFF;

        if header[2] != HandshakeType::client_hello.to_u8() || header[3] != MAJOR_VERSION_3 {
            log::debug!("bad client hello message");
            return Err(Error::BadClientHello);
        }
        if n < 17 || n > 512 {
            log::debug!("bad client hello message");
            return Err(Error::BadClientHello);
        }

        self.negotiate_version(header[3], header[4])?;

        let input = self.records.fetch_input(2 + n)?;
        let msg = input.slice(2..2 + n);

        self.secrets.update_transcript(&msg);

        ClientHello::parse_v2(msg)
    }

    fn finish_client_hello(&mut self, hello: ClientHello, from_sslv2: bool) -> Result<()> {
        *array_mut_ref![self.randbytes, 0, 32] = hello.random;
        self.session.set_id(&hello.session_id);

        self.session.compression = Compression::null;
        #[cfg(feature = "zlib")]
        {
            if hello
                .compression_methods
                .contains(&Compression::deflate.to_u8())
            {
                self.session.compression = Compression::deflate;
            }
        }

        // TLS_EMPTY_RENEGOTIATION_INFO_SCSV
        if hello
            .cipher_suites
            .contains(&crate::cipher_suite::CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV)
        {
            log::debug!("received TLS_EMPTY_RENEGOTIATION_INFO");
            if self.renegotiation == RenegotiationState::Renegotiation {
                log::debug!("received RENEGOTIATION SCSV during renegotiation");
                self.records.send_fatal_handshake_failure()?;
                return Err(Error::BadClientHello);
            }
            self.secure_renegotiation = SecureRenegotiation::Secure;
        }

        let mut renegotiation_info_seen = false;

        for (ext_id, payload) in &hello.extensions {
            match ExtensionType::from_u16(*ext_id) {
                ExtensionType::server_name => {
                    if let Some(resolver) = &self.config.sni_resolver {
                        log::debug!("found ServerName extension");
                        match extensions::parse_servername_ext(
                            resolver.as_ref(),
                            payload.clone(),
                        )? {
                            SniOutcome::Accepted(credentials) => {
                                self.sni_credentials = Some(credentials);
                            }
                            SniOutcome::Rejected => {
                                self.records.send_alert(
                                    AlertLevel::fatal,
                                    AlertDescription::unrecognized_name,
                                )?;
                                return Err(Error::BadClientHello);
                            }
                            SniOutcome::NoHostname => {}
                        }
                    }
                }

                ExtensionType::renegotiation_info => {
                    log::debug!("found renegotiation extension");
                    renegotiation_info_seen = true;

                    let renegotiating =
                        self.renegotiation == RenegotiationState::Renegotiation;
                    if let Err(e) = extensions::parse_renegotiation_info(
                        renegotiating,
                        &self.peer_verify_data,
                        payload,
                    ) {
                        self.records.send_fatal_handshake_failure()?;
                        return Err(e);
                    }

                    if !renegotiating {
                        self.secure_renegotiation = SecureRenegotiation::Secure;
                    }
                }

                ExtensionType::signature_algorithms => {
                    log::debug!("found signature_algorithms extension");
                    if self.renegotiation == RenegotiationState::Renegotiation {
                        continue;
                    }

                    if let Some(alg) =
                        extensions::parse_signature_algorithms_ext(payload.clone())?
                    {
                        self.sig_alg = alg;
                    }
                }

                ExtensionType::supported_elliptic_curves => {
                    log::debug!("found supported elliptic curves extension");
                    if let Some(curve) = extensions::parse_supported_elliptic_curves(
                        &self.config.curves,
                        payload.clone(),
                    )? {
                        self.ec_curve = Some(curve);
                    }
                }

                ExtensionType::supported_point_formats => {
                    log::debug!("found supported point formats extension");
                    if let Some(format) = extensions::parse_supported_point_formats(payload)? {
                        self.ec_point_format = format;
                    }
                }

                _ => {
                    log::trace!("unknown extension found: {} (ignoring)", ext_id);
                }
            }
        }

        // Renegotiation security checks.
        let renegotiating = self.renegotiation == RenegotiationState::Renegotiation;
        let legacy = self.secure_renegotiation == SecureRenegotiation::Legacy;
        let handshake_failure = if legacy
            && self.config.legacy_renegotiation == LegacyRenegotiationPolicy::BreakHandshake
        {
            log::debug!("legacy renegotiation, breaking off handshake");
            true
        } else if renegotiating && !legacy && !renegotiation_info_seen {
            log::debug!("renegotiation_info extension missing (secure)");
            true
        } else if renegotiating
            && legacy
            && self.config.legacy_renegotiation == LegacyRenegotiationPolicy::NoRenegotiation
        {
            log::debug!("legacy renegotiation not allowed");
            true
        } else if renegotiating && legacy && renegotiation_info_seen {
            log::debug!("renegotiation_info extension present (legacy)");
            true
        } else {
            false
        };

        if handshake_failure {
            self.records.send_fatal_handshake_failure()?;
            return Err(Error::BadClientHello);
        }

        // Suite selection, last: it needs the EC extensions.
        let mut chosen: Option<&'static CipherSuiteInfo> = None;
        for suite in &self.config.ciphersuites {
            if !hello.cipher_suites.contains(suite) {
                continue;
            }

            let info = match CipherSuiteInfo::from_suite(*suite) {
                Some(info) => info,
                None => {
                    log::debug!("ciphersuite info for {:04x} not found", suite.to_u16());
                    return Err(Error::BadInputData);
                }
            };

            if !info.usable_at(self.minor_ver) {
                continue;
            }
            if info.ec && self.ec_curve.is_none() {
                continue;
            }

            chosen = Some(info);
            break;
        }

        let info = match chosen {
            Some(info) => info,
            None => {
                log::debug!("got no ciphersuites in common");
                if !from_sslv2 {
                    self.records.send_fatal_handshake_failure()?;
                }
                return Err(Error::NoCipherChosen);
            }
        };

        log::debug!(
            "chosen ciphersuite: {:04x}, version: [3:{}]",
            info.suite.to_u16(),
            self.minor_ver
        );

        self.session.cipher_suite = info.suite;
        self.suite_info = Some(info);
        self.key_exchange.kind = info.key_exchange;

        self.records.consume_input();
        self.state = self.state.next();

        log::debug!("<= parse client hello");
        Ok(())
    }

    fn kx_kind(&self) -> KeyExchangeKind {
        self.key_exchange.kind
    }

    fn write_server_hello(&mut self) -> Result<()> {
        log::debug!("=> write server hello");

        let mut random = [0u8; 32];
        let t = chrono::Utc::now().timestamp() as u32;
        random[..4].copy_from_slice(&t.to_be_bytes());
        self.rng.fill(&mut random[4..])?;
        *array_mut_ref![self.randbytes, 32, 32] = random;

        // Resumption is only offered on the initial handshake.
        self.resume = false;
        if self.renegotiation == RenegotiationState::InitialHandshake
            && !self.session.id().is_empty()
        {
            if let Some(cache) = &self.config.session_cache {
                if let Some(cached) = cache.lookup(self.session.id()) {
                    if cached.cipher_suite == self.session.cipher_suite
                        && cached.compression == self.session.compression
                    {
                        self.resume = true;
                        self.session.master = cached.master;
                        self.session.peer_cert = cached.peer_cert.clone();
                    }
                }
            }
        }

        if !self.resume {
            let mut id = [0u8; 32];
            self.rng.fill(&mut id)?;
            self.session.set_id(&id);
        }

        log::debug!(
            "{} session has been resumed",
            if self.resume { "a" } else { "no" }
        );

        let hello = ServerHello {
            major: self.major_ver,
            minor: self.minor_ver,
            random,
            session_id: Bytes::copy_from_slice(self.session.id()),
            cipher_suite: self.session.cipher_suite,
            compression: self.session.compression,
            renegotiation_info: if self.secure_renegotiation == SecureRenegotiation::Secure {
                Some((self.peer_verify_data.clone(), self.own_verify_data.clone()))
            } else {
                None
            },
        };

        let msg = hello.serialize()?;
        self.secrets.update_transcript(&msg);

        if self.resume {
            self.secrets.derive_keys(
                None,
                &mut self.session.master,
                &self.randbytes,
                self.minor_ver,
                self.session.cipher_suite,
                self.session.compression,
            )?;
            self.state = HandshakeState::ServerChangeCipherSpec;
        } else {
            self.state = self.state.next();
        }

        let ret = self.records.write_record(ContentType::handshake, &msg);
        log::debug!("<= write server hello");
        ret
    }

    fn write_certificate(&mut self) -> Result<()> {
        if self.kx_kind().uses_psk() {
            log::debug!("<= skip write certificate");
            self.state = self.state.next();
            return Ok(());
        }

        self.state = self.state.next();

        let chain = self
            .sni_credentials
            .as_ref()
            .or_else(|| self.config.credentials.as_ref())
            .map(|c| c.chain.as_slice());

        self.hooks
            .write_certificate(&mut *self.records, &mut *self.secrets, chain)
    }

    fn write_server_key_exchange(&mut self) -> Result<()> {
        log::debug!("=> write server key exchange");

        if !self.key_exchange.emits_server_key_exchange() {
            log::debug!("<= skip write server key exchange");
            self.state = self.state.next();
            return Ok(());
        }

        let creds = self
            .sni_credentials
            .as_ref()
            .or_else(|| self.config.credentials.as_ref());
        let rsa_key: Option<&dyn RsaPrivateKey> = match creds {
            Some(c) => Some(c.key.as_ref()),
            None => None,
        };

        let msg = self.key_exchange.server_key_exchange(ServerKexContext {
            minor_ver: self.minor_ver,
            sig_alg: self.sig_alg,
            curve: self.ec_curve,
            randbytes: &self.randbytes,
            rsa_key,
            digest: self.digest,
            rng: &mut *self.rng,
        })?;

        self.secrets.update_transcript(&msg);
        self.state = self.state.next();

        let ret = self.records.write_record(ContentType::handshake, &msg);
        log::debug!("<= write server key exchange");
        ret
    }

    fn write_certificate_request(&mut self) -> Result<()> {
        log::debug!("=> write certificate request");

        self.state = self.state.next();

        if self.kx_kind().uses_psk() || self.config.authmode == VerifyMode::None {
            log::debug!("<= skip write certificate request");
            return Ok(());
        }

        if self.minor_ver == MINOR_VERSION_TLS1_2 {
            let mac = self.suite_info.map(|info| info.mac);
            self.verify_sig_alg = if mac == Some(MacAlgorithm::Sha384) {
                HashAlgorithm::sha384
            } else {
                HashAlgorithm::sha256
            };
        }

        let msg = CertificateRequest {
            verify_sig_alg: if self.minor_ver == MINOR_VERSION_TLS1_2 {
                Some(self.verify_sig_alg)
            } else {
                None
            },
            ca_chain: &self.config.ca_chain,
        }
        .serialize()?;

        self.secrets.update_transcript(&msg);

        let ret = self.records.write_record(ContentType::handshake, &msg);
        log::debug!("<= write certificate request");
        ret
    }

    fn write_server_hello_done(&mut self) -> Result<()> {
        log::debug!("=> write server hello done");

        let msg = server_hello_done()?;
        self.secrets.update_transcript(&msg);
        self.state = self.state.next();

        let ret = self.records.write_record(ContentType::handshake, &msg);
        log::debug!("<= write server hello done");
        ret
    }

    fn parse_certificate(&mut self) -> Result<()> {
        if self.kx_kind().uses_psk() || self.config.authmode == VerifyMode::None {
            log::debug!("<= skip parse certificate");
            self.state = self.state.next();
            return Ok(());
        }

        let cert = self.hooks.parse_certificate(
            &mut *self.records,
            &mut *self.secrets,
            self.config.authmode,
        )?;
        self.session.peer_cert = cert;
        self.state = self.state.next();
        Ok(())
    }

    fn parse_client_key_exchange(&mut self) -> Result<()> {
        log::debug!("=> parse client key exchange");

        let record = self.records.read_record()?;
        if record.content_type != ContentType::handshake {
            log::debug!("bad client key exchange message");
            return Err(Error::BadClientKeyExchange);
        }

        let payload = record.payload;
        if payload.len() < 4
            || payload[0] != HandshakeType::client_key_exchange.to_u8()
        {
            log::debug!("bad client key exchange message");
            return Err(Error::BadClientKeyExchange);
        }

        let hs_len =
            u32::from_be_bytes([0, payload[1], payload[2], payload[3]]) as usize;
        if payload.len() != 4 + hs_len {
            log::debug!("bad client key exchange message");
            return Err(Error::BadClientKeyExchange);
        }

        self.secrets.update_transcript(&payload);

        let creds = self
            .sni_credentials
            .as_ref()
            .or_else(|| self.config.credentials.as_ref());
        let rsa_key: Option<&dyn RsaPrivateKey> = match creds {
            Some(c) => Some(c.key.as_ref()),
            None => None,
        };

        let body = payload.slice(4..);
        self.key_exchange.parse_client_key_exchange(
            body,
            ClientKexContext {
                minor_ver: self.minor_ver,
                max_major_ver: self.max_major_ver,
                max_minor_ver: self.max_minor_ver,
                rsa_key,
                psk: self.config.psk.as_ref(),
                rng: &mut *self.rng,
            },
            &mut self.premaster,
        )?;

        self.secrets.derive_keys(
            Some(&self.premaster),
            &mut self.session.master,
            &self.randbytes,
            self.minor_ver,
            self.session.cipher_suite,
            self.session.compression,
        )?;

        self.state = self.state.next();

        log::debug!("<= parse client key exchange");
        Ok(())
    }

    fn parse_certificate_verify(&mut self) -> Result<()> {
        log::debug!("=> parse certificate verify");

        if self.kx_kind().uses_psk() || self.session.peer_cert.is_none() {
            log::debug!("<= skip parse certificate verify");
            self.state = self.state.next();
            return Ok(());
        }

        // Transcript snapshots are taken before this message is absorbed.
        let transcript_md5_sha1 = self.secrets.calc_verify();
        let transcript_tls12 = if self.minor_ver == MINOR_VERSION_TLS1_2 {
            Some(self.secrets.calc_verify_with(self.verify_sig_alg)?)
        } else {
            None
        };

        let record = self.records.read_record()?;
        self.state = self.state.next();

        if record.content_type != ContentType::handshake {
            log::debug!("bad certificate verify message");
            return Err(Error::BadCertificateVerify);
        }

        let payload = record.payload;
        if payload.len() < 4
            || payload[0] != HandshakeType::certificate_verify.to_u8()
            || u32::from_be_bytes([0, payload[1], payload[2], payload[3]]) as usize
                != payload.len() - 4
        {
            log::debug!("bad certificate verify message");
            return Err(Error::BadCertificateVerify);
        }

        self.secrets.update_transcript(&payload);

        let peer_cert = match &self.session.peer_cert {
            Some(cert) => cert,
            None => return Err(Error::BadInputData),
        };

        parse_certificate_verify(
            payload.slice(4..),
            CertVerifyContext {
                minor_ver: self.minor_ver,
                verify_sig_alg: self.verify_sig_alg,
                peer_rsa: peer_cert.rsa.as_ref(),
                transcript_md5_sha1,
                transcript_tls12,
            },
        )?;

        log::debug!("<= parse certificate verify");
        Ok(())
    }

    fn handshake_wrapup(&mut self) -> Result<()> {
        if !self.resume {
            if let Some(cache) = &self.config.session_cache {
                cache.store(&self.session);
            }
        }

        self.hooks.handshake_wrapup(&self.session)?;

        self.premaster.zeroize();
        self.state = HandshakeState::HandshakeOver;
        Ok(())
    }
}

impl<'a> Drop for ServerHandshake<'a> {
    fn drop(&mut self) {
        self.premaster.zeroize();
        self.randbytes.zeroize();
    }
}
