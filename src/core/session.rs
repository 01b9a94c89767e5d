use crate::core::error::{ReadError, TransportError};
use pcsc::{Card, Context, Disposition, Protocol, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};
use serde::{Deserialize, Serialize};
use std::ffi::CString;

/// Snapshot of one reader slot, for listings and diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderInfo {
    pub name: String,
    pub card_present: bool,
    pub atr: Option<Vec<u8>>,
}

/// Raw byte exchange with a card. The one seam between the protocol logic
/// and PC/SC, so everything above it can be driven by a mock in tests.
pub trait CardTransport {
    /// Send a raw APDU and return the raw response including SW1/SW2
    fn transmit(&mut self, apdu: &[u8]) -> Result<Vec<u8>, TransportError>;
}

/// Owns the PC/SC context; enumerates readers and opens sessions.
///
/// Holds no session state itself: every open session is an explicit
/// [`CardSession`] value handed to the caller.
pub struct SessionManager {
    context: Context,
}

impl SessionManager {
    pub fn new() -> Result<Self, ReadError> {
        let context = Context::establish(Scope::User)
            .map_err(|e| ReadError::CardCommunication(format!("PC/SC unavailable: {e}")))?;
        Ok(Self { context })
    }

    /// List reader names. An empty list is a valid result, not an error.
    pub fn list_readers(&self) -> Result<Vec<String>, ReadError> {
        let mut readers_buf = vec![0; 2048];
        let readers = match self.context.list_readers(&mut readers_buf) {
            Ok(readers) => readers,
            Err(pcsc::Error::NoReadersAvailable) => return Ok(Vec::new()),
            Err(e) => {
                return Err(ReadError::CardCommunication(format!(
                    "failed to list readers: {e}"
                )))
            }
        };

        Ok(readers
            .map(|name| name.to_string_lossy().to_string())
            .collect())
    }

    /// Reader listing with card presence and ATR, probed per reader
    pub fn reader_infos(&self) -> Result<Vec<ReaderInfo>, ReadError> {
        let mut infos = Vec::new();
        for name in self.list_readers()? {
            let (card_present, atr) = self.probe_reader(&name);
            infos.push(ReaderInfo {
                name,
                card_present,
                atr,
            });
        }
        Ok(infos)
    }

    fn probe_reader(&self, reader_name: &str) -> (bool, Option<Vec<u8>>) {
        let Ok(reader_cstr) = CString::new(reader_name) else {
            return (false, None);
        };
        match self
            .context
            .connect(&reader_cstr, ShareMode::Shared, Protocols::ANY)
        {
            Ok(card) => match card.status2_owned() {
                Ok(status) => (true, Some(status.atr().to_vec())),
                Err(_) => (true, None),
            },
            Err(_) => (false, None),
        }
    }

    /// Open an exclusive session on `reader_name`.
    ///
    /// Per PC/SC semantics the card starts the session in its reset state, so
    /// application selection has to be redone on every session.
    pub fn connect(&self, reader_name: &str) -> Result<CardSession, ReadError> {
        log::info!("Connecting to reader: {reader_name}");

        let reader_cstr = CString::new(reader_name).map_err(|_| ReadError::ReaderUnavailable)?;
        let card = self
            .context
            .connect(&reader_cstr, ShareMode::Exclusive, Protocols::ANY)
            .map_err(map_connect_error)?;

        let protocol = card.status2_owned().ok().and_then(|s| s.protocol2());

        log::info!("Session open on {reader_name} (protocol {protocol:?})");
        Ok(CardSession {
            reader_name: reader_name.to_string(),
            protocol,
            card: Some(card),
        })
    }
}

/// Classify a PC/SC connect failure into the error taxonomy
pub(crate) fn map_connect_error(err: pcsc::Error) -> ReadError {
    match err {
        pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard => ReadError::NoCardPresent,
        pcsc::Error::UnknownReader
        | pcsc::Error::ReaderUnavailable
        | pcsc::Error::NoReadersAvailable
        | pcsc::Error::SharingViolation => ReadError::ReaderUnavailable,
        other => ReadError::CardCommunication(format!("connect failed: {other}")),
    }
}

/// One open connection to a card. At most one per reader handle; dropped or
/// disconnected on every exit path so the reader is never left claimed.
pub struct CardSession {
    reader_name: String,
    protocol: Option<Protocol>,
    card: Option<Card>,
}

impl CardSession {
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    /// Protocol negotiated at connect time
    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    /// Release the reader. Idempotent; safe to call on an already-closed
    /// session.
    pub fn disconnect(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err((_, e)) = card.disconnect(Disposition::LeaveCard) {
                log::warn!("Failed to disconnect cleanly from card: {e}");
            }
            log::info!("Disconnected from reader: {}", self.reader_name);
        }
    }
}

impl CardTransport for CardSession {
    fn transmit(&mut self, apdu: &[u8]) -> Result<Vec<u8>, TransportError> {
        let card = self
            .card
            .as_ref()
            .ok_or_else(|| TransportError::Io("session is closed".to_string()))?;

        let mut response_buf = [0; MAX_BUFFER_SIZE];
        match card.transmit(apdu, &mut response_buf) {
            Ok(response) => Ok(response.to_vec()),
            Err(pcsc::Error::RemovedCard | pcsc::Error::ResetCard | pcsc::Error::NoSmartcard) => {
                Err(TransportError::Removed)
            }
            Err(pcsc::Error::Timeout | pcsc::Error::ServerTooBusy | pcsc::Error::NotReady) => {
                Err(TransportError::Busy)
            }
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }
}

impl Drop for CardSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}
