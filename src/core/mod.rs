pub mod apdu;
pub mod error;
pub mod file;
pub mod identity;
pub mod profile;
pub mod session;
pub mod tlv;
pub mod utils;

use error::ReadError;
use file::PersonalDataFile;
use identity::{extract_identity, IdentityRecord};
use profile::CardProfile;
use session::SessionManager;

/// Read an identity record from the card in the given reader.
///
/// With no reader name the first enumerated reader is used;
/// [`ReadError::ReaderUnavailable`] if none exist. The whole
/// connect → select → read → decode sequence runs on the calling thread and
/// blocks on card I/O; the session is disconnected on every exit path.
pub fn read_identity(reader_name: Option<&str>) -> Result<IdentityRecord, ReadError> {
    read_identity_with_profile(reader_name, &CardProfile::default())
}

/// [`read_identity`] against a non-default card profile
pub fn read_identity_with_profile(
    reader_name: Option<&str>,
    profile: &CardProfile,
) -> Result<IdentityRecord, ReadError> {
    let payload = read_raw_personal_data(reader_name, profile)?;
    extract_identity(&payload, profile)
}

/// Connect, select and read the raw personal-data EF payload without
/// decoding it. Diagnostic surface backing the CLI `dump` command.
pub fn read_raw_personal_data(
    reader_name: Option<&str>,
    profile: &CardProfile,
) -> Result<Vec<u8>, ReadError> {
    let manager = SessionManager::new()?;

    let reader_name = match reader_name {
        Some(name) => name.to_string(),
        None => manager
            .list_readers()?
            .into_iter()
            .next()
            .ok_or(ReadError::ReaderUnavailable)?,
    };

    let mut session = manager.connect(&reader_name)?;

    let result = {
        let mut file = PersonalDataFile::new(&mut session, profile);
        file.select_application().and_then(|()| file.read_file())
    };

    // Session is released before any result reaches the caller; Drop would
    // also catch early exits, this keeps the release explicit.
    session.disconnect();
    result
}
