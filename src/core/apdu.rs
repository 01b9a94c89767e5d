use crate::core::error::{ReadError, TransportError};
use crate::core::session::CardTransport;
use crate::core::utils::format_hex_spaced;

/// Upper bound on GET RESPONSE continuations in one exchange, against cards
/// that keep answering 61XX forever.
const MAX_CHAIN_STEPS: usize = 64;

/// An ISO 7816-4 command APDU: CLA, INS, P1, P2, optional data, optional Le.
/// Immutable once built; constructed fresh per exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCommand {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Vec<u8>,
    le: Option<u8>,
}

impl ApduCommand {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// SELECT by name with the application identifier
    pub fn select_application(aid: &[u8]) -> Self {
        Self::new(0x00, 0xA4, 0x04, 0x00).data(aid.to_vec())
    }

    /// SELECT an elementary file by its two-byte file identifier
    pub fn select_file(file_id: &[u8]) -> Self {
        Self::new(0x00, 0xA4, 0x02, 0x04).data(file_id.to_vec())
    }

    /// READ BINARY at `offset` (15-bit), requesting `le` bytes
    pub fn read_binary(offset: u16, le: u8) -> Self {
        Self::new(0x00, 0xB0, ((offset >> 8) & 0x7F) as u8, (offset & 0xFF) as u8).le(le)
    }

    /// GET RESPONSE for `le` pending bytes signalled by 61XX
    pub fn get_response(le: u8) -> Self {
        Self::new(0x00, 0xC0, 0x00, 0x00).le(le)
    }

    /// Serialize to wire format (header, Lc+data if any, Le if any)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut apdu = vec![self.cla, self.ins, self.p1, self.p2];

        if !self.data.is_empty() {
            apdu.push(self.data.len() as u8);
            apdu.extend_from_slice(&self.data);
        }

        if let Some(le) = self.le {
            apdu.push(le);
        }

        apdu
    }
}

/// A response APDU: data bytes plus the two-byte status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    pub data: Vec<u8>,
    pub sw1: u8,
    pub sw2: u8,
}

impl ApduResponse {
    pub fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    pub fn status_word(&self) -> u16 {
        (u16::from(self.sw1) << 8) | u16::from(self.sw2)
    }

    /// For 61XX, the number of bytes waiting for GET RESPONSE
    pub fn more_available(&self) -> Option<u8> {
        (self.sw1 == 0x61).then_some(self.sw2)
    }

    /// Turn a non-success status into [`ReadError::CardStatus`]
    pub fn check_success(&self) -> Result<(), ReadError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(ReadError::CardStatus {
                sw1: self.sw1,
                sw2: self.sw2,
            })
        }
    }
}

/// Send one command and return the fully assembled response.
///
/// Retries exactly once when the driver reports a transient busy condition;
/// card-reported status words are never retried. 61XX continuations are
/// resolved transparently with GET RESPONSE, so the caller always sees a
/// single response containing all data. A completed exchange is returned
/// whatever its status word; the caller decides what is fatal.
pub fn exchange<T: CardTransport + ?Sized>(
    transport: &mut T,
    command: &ApduCommand,
) -> Result<ApduResponse, ReadError> {
    let mut response = transmit_once(transport, &command.to_bytes())?;
    let mut assembled = std::mem::take(&mut response.data);

    let mut steps = 0;
    while let Some(pending) = response.more_available() {
        steps += 1;
        if steps > MAX_CHAIN_STEPS {
            return Err(ReadError::CardCommunication(
                "GET RESPONSE chain did not terminate".to_string(),
            ));
        }

        log::debug!("GET RESPONSE for {pending} pending bytes");
        response = transmit_once(transport, &ApduCommand::get_response(pending).to_bytes())?;
        assembled.extend_from_slice(&response.data);
    }

    Ok(ApduResponse {
        data: assembled,
        sw1: response.sw1,
        sw2: response.sw2,
    })
}

fn transmit_once<T: CardTransport + ?Sized>(
    transport: &mut T,
    apdu: &[u8],
) -> Result<ApduResponse, ReadError> {
    log::debug!("APDU > {}", format_hex_spaced(apdu));

    let raw = match transport.transmit(apdu) {
        Ok(raw) => raw,
        Err(TransportError::Busy) => {
            log::warn!("Reader busy, retrying once");
            transport.transmit(apdu).map_err(ReadError::from)?
        }
        Err(e) => return Err(e.into()),
    };

    log::debug!("APDU < {}", format_hex_spaced(&raw));

    if raw.len() < 2 {
        return Err(ReadError::CardCommunication(format!(
            "response shorter than a status word ({} bytes)",
            raw.len()
        )));
    }

    let sw1 = raw[raw.len() - 2];
    let sw2 = raw[raw.len() - 1];
    Ok(ApduResponse {
        data: raw[..raw.len() - 2].to_vec(),
        sw1,
        sw2,
    })
}
