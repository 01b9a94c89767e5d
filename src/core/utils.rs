use anyhow::{bail, Context, Result};

/// Parse a hex string into bytes.
///
/// Accepts pure hex ("D0400000"), spaced ("D0 40 00 00"), colon-separated
/// and 0x-prefixed forms, since profiles and CLI arguments come from humans.
pub fn parse_hex(hex_str: &str) -> Result<Vec<u8>> {
    let cleaned = clean_hex_string(hex_str);

    if cleaned.is_empty() {
        return Ok(Vec::new());
    }

    if cleaned.len() % 2 != 0 {
        bail!(
            "Hex string must have an even number of characters: '{}'",
            hex_str
        );
    }

    hex::decode(&cleaned).with_context(|| format!("Invalid hex string: '{hex_str}'"))
}

fn clean_hex_string(hex_str: &str) -> String {
    hex_str
        .trim()
        .replace("0x", "")
        .replace("0X", "")
        .replace([' ', ',', ':', '-', '\t', '\n', '\r'], "")
        .to_uppercase()
}

/// Format bytes as a compact upper-case hex string
pub fn format_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Format bytes as space-separated hex pairs
pub fn format_hex_spaced(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format bytes in hex dump style (offset, hex columns, ASCII gutter)
pub fn format_hex_dump(bytes: &[u8]) -> String {
    const BYTES_PER_LINE: usize = 16;

    if bytes.is_empty() {
        return String::from("(empty)");
    }

    let mut result = String::new();

    for (i, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        result.push_str(&format!("{:08X}: ", i * BYTES_PER_LINE));

        for (j, &byte) in chunk.iter().enumerate() {
            result.push_str(&format!("{byte:02X} "));
            if j == 7 {
                result.push(' ');
            }
        }

        let padding_needed = (BYTES_PER_LINE - chunk.len()) * 3;
        if chunk.len() <= 8 {
            result.push(' ');
        }
        result.push_str(&" ".repeat(padding_needed));

        result.push_str(" |");
        for &byte in chunk {
            if byte.is_ascii_graphic() || byte == b' ' {
                result.push(byte as char);
            } else {
                result.push('.');
            }
        }
        result.push('|');
        result.push('\n');
    }

    result.trim_end().to_string()
}

/// Human-readable description of an ISO 7816-4 status word, for diagnostics
pub fn describe_status_word(sw1: u8, sw2: u8) -> String {
    match (sw1, sw2) {
        (0x90, 0x00) => "Success".to_string(),
        (0x61, n) => format!("Success, {n} bytes available via GET RESPONSE"),
        (0x62, 0x81) => "Warning: Part of returned data may be corrupted".to_string(),
        (0x62, 0x82) => "Warning: End of file reached before Le bytes".to_string(),
        (0x64, 0x00) => "Error: Execution error".to_string(),
        (0x65, 0x81) => "Error: Memory failure".to_string(),
        (0x67, 0x00) => "Error: Wrong length".to_string(),
        (0x69, 0x81) => "Error: Command incompatible with file structure".to_string(),
        (0x69, 0x82) => "Error: Security status not satisfied".to_string(),
        (0x69, 0x85) => "Error: Conditions of use not satisfied".to_string(),
        (0x69, 0x86) => "Error: Command not allowed (no current EF)".to_string(),
        (0x6A, 0x80) => "Error: Incorrect parameters in data field".to_string(),
        (0x6A, 0x81) => "Error: Function not supported".to_string(),
        (0x6A, 0x82) => "Error: File not found".to_string(),
        (0x6A, 0x83) => "Error: Record not found".to_string(),
        (0x6A, 0x86) => "Error: Incorrect parameters P1-P2".to_string(),
        (0x6A, 0x88) => "Error: Referenced data not found".to_string(),
        (0x6B, 0x00) => "Error: Wrong parameter(s) P1-P2".to_string(),
        (0x6C, n) => format!("Error: Wrong Le field, exact length: {n}"),
        (0x6D, 0x00) => "Error: Instruction code not supported or invalid".to_string(),
        (0x6E, 0x00) => "Error: Class not supported".to_string(),
        (0x6F, 0x00) => "Error: No precise diagnosis".to_string(),
        _ => format!("Unknown status: {sw1:02X} {sw2:02X}"),
    }
}
