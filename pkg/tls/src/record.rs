// Contract against the record layer. The handshake engine never owns a
// transport: it asks for raw input during the ClientHello bootstrap (where
// the framing itself is still being sniffed) and for framed records
// everywhere else.

use bytes::Bytes;

use crate::alert::{AlertDescription, AlertLevel};
use crate::errors::Result;

tls_enum_u8!(ContentType => {
    change_cipher_spec(20),
    alert(21),
    handshake(22),
    application_data(23),
    (255)
});

/// One decrypted, decompressed record. For handshake records the payload
/// starts at the first handshake-header byte.
#[derive(Debug)]
pub struct Record {
    pub content_type: ContentType,
    pub payload: Bytes,
}

/// The record layer owned by the caller.
///
/// `WantRead` / `WantWrite` from any method are forwarded out of the driver
/// unchanged. Returned payloads are owned; the engine never keeps references
/// into the layer's internal buffers across a step.
///
/// The layer does not touch the handshake transcript; the driver feeds every
/// handshake message to [`crate::provider::SecretSchedule::update_transcript`]
/// in arrival order itself.
pub trait RecordLayer {
    /// Ensures at least `need` raw bytes of input are buffered and returns
    /// them (the first `need` bytes of the pending input, headers included).
    /// Only used while parsing the ClientHello flight.
    fn fetch_input(&mut self, need: usize) -> Result<Bytes>;

    /// Drops the raw input consumed through `fetch_input`.
    fn consume_input(&mut self);

    /// Reads and unprotects the next record.
    fn read_record(&mut self) -> Result<Record>;

    /// Protects and queues one record, then attempts to send it.
    fn write_record(&mut self, content_type: ContentType, payload: &[u8]) -> Result<()>;

    /// Drains any queued output. `Ok(())` means nothing is pending.
    fn flush_output(&mut self) -> Result<()>;

    fn send_alert(&mut self, level: AlertLevel, description: AlertDescription) -> Result<()>;

    fn send_fatal_handshake_failure(&mut self) -> Result<()> {
        self.send_alert(AlertLevel::fatal, AlertDescription::handshake_failure)
    }
}
