/// ecard-reader - Offline identity extraction from the Austrian e-card
///
/// This library talks ISO 7816-4 over PC/SC: it opens a session on a card
/// reader, selects the personal-data application, reads its elementary file
/// and decodes the BER-TLV payload into a normalized identity record.
pub mod cli;
pub mod core;

// Re-export the pieces callers actually need
pub use crate::core::{
    error::{ReadError, TransportError},
    identity::{IdentityRecord, Sex},
    profile::{CardProfile, FieldTags},
    read_identity, read_identity_with_profile, read_raw_personal_data,
    session::{CardSession, CardTransport, ReaderInfo, SessionManager},
};

// Common error type for the CLI layer
pub type Result<T> = anyhow::Result<T>;
