use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// All card-scheme constants in one place: the application identifier used
/// for SELECT, the elementary file holding the personal data, read sizing
/// bounds, and the tag table for field extraction.
///
/// `Default` is the Austrian e-card personal-data application; other schemes
/// can be described in a JSON file and loaded with [`CardProfile::from_file`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardProfile {
    /// Display name of the card scheme
    pub name: String,

    /// Application identifier sent with SELECT-by-name
    #[serde(with = "hex_bytes")]
    pub aid: Vec<u8>,

    /// Two-byte file identifier of the personal-data EF
    #[serde(with = "hex_bytes")]
    pub ef_id: Vec<u8>,

    /// Bytes requested per READ BINARY; a shorter answer means end-of-file
    pub read_chunk: u8,

    /// Safety bound against malformed cards that never signal end-of-file
    pub max_file_size: usize,

    /// Tags of the personal-data fields inside the EF payload
    pub tags: FieldTags,
}

/// Tag numbers of the known personal-data fields.
///
/// `svnr` is an ordered candidate list: digits may appear in more than one
/// field on real cards, so the first candidate that yields exactly ten digits
/// wins. The order is part of the profile so it can be corrected against real
/// card samples without touching code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTags {
    pub last_name: u32,
    pub first_name: u32,
    pub birth_date: u32,
    pub sex: u32,
    pub svnr: Vec<u32>,
}

impl Default for CardProfile {
    fn default() -> Self {
        Self {
            name: "Austrian e-card".to_string(),
            aid: vec![0xD0, 0x40, 0x00, 0x00, 0x17, 0x01, 0x01, 0x01],
            ef_id: vec![0xEF, 0x01],
            read_chunk: 0xE0,
            max_file_size: 4096,
            tags: FieldTags {
                last_name: 0x82,
                first_name: 0x81,
                birth_date: 0x83,
                sex: 0x84,
                svnr: vec![0x80],
            },
        }
    }
}

impl CardProfile {
    /// Load a profile from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile file: {}", path.display()))?;
        let profile: CardProfile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse profile file: {}", path.display()))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Sanity-check the constants. Also run after any field override, since
    /// the wire encoding has hard bounds the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.aid.is_empty(), "profile AID must not be empty");
        // ISO 7816-4 caps an AID at 16 bytes; anything longer would also
        // overflow the single Lc byte of the SELECT command
        anyhow::ensure!(
            self.aid.len() <= 16,
            "profile AID must be at most 16 bytes"
        );
        anyhow::ensure!(
            self.ef_id.len() == 2,
            "profile EF id must be exactly 2 bytes"
        );
        anyhow::ensure!(self.read_chunk > 0, "profile read chunk must be > 0");
        anyhow::ensure!(
            self.max_file_size > 0 && self.max_file_size <= 0x8000,
            "profile max file size must be within the 15-bit READ BINARY offset range"
        );
        Ok(())
    }
}

/// Serde adapter storing byte fields as upper-case hex strings in JSON.
/// Accepts the same human-friendly forms as the CLI (spaces, colons, 0x).
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode_upper(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        crate::core::utils::parse_hex(&s).map_err(serde::de::Error::custom)
    }
}
