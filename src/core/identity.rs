use crate::core::error::ReadError;
use crate::core::profile::CardProfile;
use crate::core::tlv;
use serde::{Deserialize, Serialize};

/// Sex as recorded on the card, normalized.
///
/// `Unspecified` is a valid terminal value (card says `X`, an unrecognized
/// code, or nothing at all), distinct from any read failure. It renders as
/// the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    #[default]
    #[serde(rename = "")]
    Unspecified,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::Unspecified => "",
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized identity data extracted from the personal-data EF.
///
/// Returned to the caller by value; nothing is retained here afterwards.
/// Absent fields stay absent; they are never filled with defaults or guesses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Empty when the tag is missing from the card
    pub last_name: String,
    /// Empty when the tag is missing from the card
    pub first_name: String,
    /// ISO `YYYY-MM-DD`, or `None` when missing or not 8 digits
    pub date_of_birth: Option<String>,
    /// Exactly 10 digits, or `None` when no candidate field yields 10
    pub svnr: Option<String>,
    pub sex: Sex,
}

/// Decode an EF payload and map the known tags to an [`IdentityRecord`].
///
/// A tag missing from the tree leaves its field absent; only structural TLV
/// violations are errors. Decoding is deterministic: the same payload always
/// yields the same record.
pub fn extract_identity(
    payload: &[u8],
    profile: &CardProfile,
) -> Result<IdentityRecord, ReadError> {
    let nodes = tlv::parse(payload)?;
    let tags = &profile.tags;

    let mut record = IdentityRecord::default();

    if let Some(node) = tlv::find(&nodes, tags.last_name) {
        record.last_name = decode_text(&node.value);
    }
    if let Some(node) = tlv::find(&nodes, tags.first_name) {
        record.first_name = decode_text(&node.value);
    }
    record.date_of_birth = tlv::find(&nodes, tags.birth_date)
        .and_then(|node| normalize_birth_date(&decode_text(&node.value)));
    record.svnr = tags
        .svnr
        .iter()
        .filter_map(|&tag| tlv::find(&nodes, tag))
        .find_map(|node| normalize_svnr(&decode_text(&node.value)));
    record.sex = tlv::find(&nodes, tags.sex)
        .map(|node| normalize_sex(&decode_text(&node.value)))
        .unwrap_or_default();

    Ok(record)
}

fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// `YYYYMMDD` digits to ISO `YYYY-MM-DD`. Anything that is not exactly eight
/// ASCII digits yields `None` rather than a guess.
pub fn normalize_birth_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() != 8 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!(
        "{}-{}-{}",
        &trimmed[0..4],
        &trimmed[4..6],
        &trimmed[6..8]
    ))
}

/// Extract the digit characters of a raw SVNR field; accepted only when
/// exactly ten digits remain. Never padded, never fabricated.
pub fn normalize_svnr(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 10 {
        Some(digits)
    } else {
        None
    }
}

/// Map the raw sex code: `M` or ISO 5218 code 1 is male, `F` or code 2 is
/// female, everything else (including `X`) is unspecified.
pub fn normalize_sex(raw: &str) -> Sex {
    match raw.trim() {
        "M" | "m" | "1" => Sex::Male,
        "F" | "f" | "2" => Sex::Female,
        _ => Sex::Unspecified,
    }
}
