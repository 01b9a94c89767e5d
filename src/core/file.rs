use crate::core::apdu::{exchange, ApduCommand};
use crate::core::error::ReadError;
use crate::core::profile::CardProfile;
use crate::core::session::CardTransport;
use crate::core::utils::describe_status_word;

const SW_FILE_NOT_FOUND: u16 = 0x6A82;
const SW_END_OF_FILE: u16 = 0x6282;

/// Access to the personal-data application and its elementary file.
///
/// Selection state is per value: the card resets on connect, so a fresh
/// `PersonalDataFile` is built for every session and [`select_application`]
/// must succeed before [`read_file`].
///
/// [`select_application`]: PersonalDataFile::select_application
/// [`read_file`]: PersonalDataFile::read_file
pub struct PersonalDataFile<'a, T: CardTransport + ?Sized> {
    transport: &'a mut T,
    profile: &'a CardProfile,
    selected: bool,
}

impl<'a, T: CardTransport + ?Sized> PersonalDataFile<'a, T> {
    pub fn new(transport: &'a mut T, profile: &'a CardProfile) -> Self {
        Self {
            transport,
            profile,
            selected: false,
        }
    }

    /// SELECT the personal-data application by AID.
    ///
    /// Any status word other than 9000 means "wrong card type", reported as
    /// [`ReadError::ApplicationNotFound`] so the caller can tell it apart
    /// from communication failures.
    pub fn select_application(&mut self) -> Result<(), ReadError> {
        let command = ApduCommand::select_application(&self.profile.aid);
        let response = exchange(self.transport, &command)?;

        if !response.is_success() {
            log::warn!(
                "SELECT {} answered {:02X} {:02X} ({})",
                self.profile.name,
                response.sw1,
                response.sw2,
                describe_status_word(response.sw1, response.sw2)
            );
            return Err(ReadError::ApplicationNotFound);
        }

        log::info!("Selected application: {}", self.profile.name);
        self.selected = true;
        Ok(())
    }

    /// Read the personal-data EF in full.
    ///
    /// Selects the EF by file id, then issues READ BINARY in chunks from
    /// offset 0 until a short (or zero-length) read signals end-of-file.
    /// Returns the complete payload, never a partial one on success.
    pub fn read_file(&mut self) -> Result<Vec<u8>, ReadError> {
        if !self.selected {
            return Err(ReadError::NotSelected);
        }

        let response = exchange(self.transport, &ApduCommand::select_file(&self.profile.ef_id))?;
        match response.status_word() {
            0x9000 => {}
            SW_FILE_NOT_FOUND => return Err(ReadError::FileNotFound),
            _ => response.check_success()?,
        }

        let chunk = usize::from(self.profile.read_chunk);
        let mut payload = Vec::new();

        loop {
            if payload.len() >= self.profile.max_file_size {
                // Card never produced a short read within the safety bound
                return Err(ReadError::TruncatedRead);
            }

            let command = ApduCommand::read_binary(payload.len() as u16, self.profile.read_chunk);
            let response = exchange(self.transport, &command)?;

            match response.status_word() {
                0x9000 => {}
                // End-of-file warning carries the final partial chunk
                SW_END_OF_FILE => {
                    payload.extend_from_slice(&response.data);
                    break;
                }
                SW_FILE_NOT_FOUND => return Err(ReadError::FileNotFound),
                _ => response.check_success()?,
            }

            let received = response.data.len();
            payload.extend_from_slice(&response.data);

            if received < chunk {
                break;
            }
        }

        log::info!("Read {} bytes from EF", payload.len());
        Ok(payload)
    }
}
