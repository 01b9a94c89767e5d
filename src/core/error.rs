use thiserror::Error;

/// Everything that can go wrong between "button pressed" and a decoded
/// identity record. All variants are non-fatal and user-reportable; the
/// session is always released before one of these reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The requested reader does not exist, is busy, or no reader is attached.
    #[error("smartcard reader unavailable")]
    ReaderUnavailable,

    /// The reader exists but no card is inserted.
    #[error("no card present in the reader")]
    NoCardPresent,

    /// The card was removed while a command was in flight.
    #[error("card removed during communication")]
    CardRemoved,

    /// Driver or transport level I/O failure.
    #[error("card communication failed: {0}")]
    CardCommunication(String),

    /// The card answered with a status word this crate does not handle.
    /// The raw SW1/SW2 is kept for diagnostics.
    #[error("card returned status word {sw1:02X} {sw2:02X}")]
    CardStatus { sw1: u8, sw2: u8 },

    /// SELECT of the personal-data application failed: wrong card type.
    #[error("personal-data application not found on this card")]
    ApplicationNotFound,

    /// A file read was attempted before a successful application SELECT.
    #[error("no application selected on this session")]
    NotSelected,

    /// The elementary file id does not exist on the selected application.
    #[error("elementary file not found on card")]
    FileNotFound,

    /// The size bound was reached before the card signalled end-of-file.
    #[error("file read exceeded the configured size bound")]
    TruncatedRead,

    /// Structural TLV violation: truncated header or length past the buffer.
    #[error("malformed TLV structure: {0}")]
    MalformedTlv(String),

    /// TLV nesting deeper than the decoder allows.
    #[error("TLV nesting exceeds the maximum depth")]
    MaxDepthExceeded,
}

/// Transport-level failures reported by a [`CardTransport`] implementation.
///
/// `Busy` is the only transient kind; the transceiver retries it exactly once.
///
/// [`CardTransport`]: crate::core::session::CardTransport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("reader or driver busy")]
    Busy,

    #[error("card removed")]
    Removed,

    #[error("transport I/O error: {0}")]
    Io(String),
}

impl From<TransportError> for ReadError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Removed => ReadError::CardRemoved,
            TransportError::Busy => {
                ReadError::CardCommunication("reader stayed busy after retry".to_string())
            }
            TransportError::Io(msg) => ReadError::CardCommunication(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_status_display_includes_raw_sw() {
        let err = ReadError::CardStatus { sw1: 0x6A, sw2: 0x86 };
        assert_eq!(err.to_string(), "card returned status word 6A 86");
    }

    #[test]
    fn test_transport_error_conversion() {
        assert_eq!(
            ReadError::from(TransportError::Removed),
            ReadError::CardRemoved
        );
        assert!(matches!(
            ReadError::from(TransportError::Io("broken pipe".to_string())),
            ReadError::CardCommunication(_)
        ));
        assert!(matches!(
            ReadError::from(TransportError::Busy),
            ReadError::CardCommunication(_)
        ));
    }
}
