use crate::core::error::ReadError;

/// Nesting bound for constructed TLVs. Personal-data files are two or three
/// levels deep in practice; anything past this is a corrupt or hostile card.
pub const MAX_DEPTH: usize = 16;

/// One decoded BER-TLV node. Built once per read, immutable afterwards.
///
/// `value` always holds the raw value bytes; for constructed tags (bit 0x20
/// of the first tag byte) `children` additionally holds the decoded nested
/// nodes, for leaves it is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvNode {
    pub tag: u32,
    pub value: Vec<u8>,
    pub children: Vec<TlvNode>,
}

/// Decode a complete buffer into a sequence of top-level TLV nodes.
///
/// Fails with [`ReadError::MalformedTlv`] on a truncated header or a length
/// that overruns the buffer, and with [`ReadError::MaxDepthExceeded`] when
/// nesting passes [`MAX_DEPTH`]. Nothing partial is returned on failure.
pub fn parse(data: &[u8]) -> Result<Vec<TlvNode>, ReadError> {
    parse_nodes(data, 0)
}

/// Depth-first search for the first node carrying `tag`
pub fn find(nodes: &[TlvNode], tag: u32) -> Option<&TlvNode> {
    for node in nodes {
        if node.tag == tag {
            return Some(node);
        }
        if let Some(found) = find(&node.children, tag) {
            return Some(found);
        }
    }
    None
}

fn parse_nodes(data: &[u8], depth: usize) -> Result<Vec<TlvNode>, ReadError> {
    if depth >= MAX_DEPTH {
        return Err(ReadError::MaxDepthExceeded);
    }

    let mut nodes = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let (tag, constructed, tag_len) = read_tag(data, pos)?;
        pos += tag_len;

        let (len, len_len) = read_length(data, pos)?;
        pos += len_len;

        if len > data.len() - pos {
            return Err(ReadError::MalformedTlv(format!(
                "tag {tag:02X}: declared length {len} exceeds remaining {} bytes",
                data.len() - pos
            )));
        }

        let value = data[pos..pos + len].to_vec();
        pos += len;

        let children = if constructed {
            parse_nodes(&value, depth + 1)?
        } else {
            Vec::new()
        };

        nodes.push(TlvNode { tag, value, children });
    }

    Ok(nodes)
}

/// Decode a tag at `pos`, returning (tag, constructed bit, bytes consumed)
fn read_tag(data: &[u8], pos: usize) -> Result<(u32, bool, usize), ReadError> {
    let first = data[pos];
    let constructed = first & 0x20 != 0;

    // Single-byte tag unless the low five bits are all set
    if first & 0x1F != 0x1F {
        return Ok((u32::from(first), constructed, 1));
    }

    let mut tag = u32::from(first);
    let mut consumed = 1;
    loop {
        let b = *data
            .get(pos + consumed)
            .ok_or_else(|| ReadError::MalformedTlv("tag truncated at buffer end".to_string()))?;
        consumed += 1;
        tag = (tag << 8) | u32::from(b);
        if consumed > 4 {
            return Err(ReadError::MalformedTlv("tag longer than 4 bytes".to_string()));
        }
        if b & 0x80 == 0 {
            break;
        }
    }

    Ok((tag, constructed, consumed))
}

/// Decode a length at `pos`, returning (length, bytes consumed)
fn read_length(data: &[u8], pos: usize) -> Result<(usize, usize), ReadError> {
    let first = *data
        .get(pos)
        .ok_or_else(|| ReadError::MalformedTlv("length truncated at buffer end".to_string()))?;

    if first < 0x80 {
        return Ok((usize::from(first), 1));
    }
    if first == 0x80 {
        // Indefinite form is BER-only, not valid DER
        return Err(ReadError::MalformedTlv(
            "indefinite length not permitted".to_string(),
        ));
    }

    let num_bytes = usize::from(first & 0x7F);
    if num_bytes > 4 {
        return Err(ReadError::MalformedTlv(format!(
            "length-of-length {num_bytes} too large"
        )));
    }

    let mut len = 0usize;
    for i in 0..num_bytes {
        let b = *data.get(pos + 1 + i).ok_or_else(|| {
            ReadError::MalformedTlv("long-form length truncated at buffer end".to_string())
        })?;
        len = (len << 8) | usize::from(b);
    }

    Ok((len, 1 + num_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_buffer() {
        assert_eq!(parse(&[]).unwrap(), Vec::new());
    }

    #[test]
    fn test_parse_primitive_leaf() {
        let nodes = parse(&[0x80, 0x03, b'M', b'A', b'X']).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].tag, 0x80);
        assert_eq!(nodes[0].value, b"MAX");
        assert!(nodes[0].children.is_empty());
    }

    #[test]
    fn test_parse_constructed_sequence() {
        // 30 08 { 81 03 "MAX" 84 01 "M" }
        let data = [0x30, 0x08, 0x81, 0x03, b'M', b'A', b'X', 0x84, 0x01, b'M'];
        let nodes = parse(&data).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].tag, 0x30);
        assert_eq!(nodes[0].children.len(), 2);
        assert_eq!(nodes[0].children[0].tag, 0x81);
        assert_eq!(nodes[0].children[1].value, b"M");
    }

    #[test]
    fn test_parse_multi_byte_tag() {
        // 5F 20 is a two-byte tag (low five bits of 5F all set)
        let nodes = parse(&[0x5F, 0x20, 0x02, 0x41, 0x42]).unwrap();
        assert_eq!(nodes[0].tag, 0x5F20);
        assert_eq!(nodes[0].value, b"AB");
    }

    #[test]
    fn test_parse_long_form_length() {
        let mut data = vec![0x80, 0x81, 0x80];
        data.extend(vec![0x41; 0x80]);
        let nodes = parse(&data).unwrap();
        assert_eq!(nodes[0].value.len(), 0x80);
    }

    #[test]
    fn test_truncated_value_is_malformed_not_partial() {
        // Declared length 5, only 4 value bytes present
        let data = [0x80, 0x05, 0x01, 0x02, 0x03, 0x04];
        assert!(matches!(
            parse(&data),
            Err(ReadError::MalformedTlv(_))
        ));
    }

    #[test]
    fn test_truncated_one_byte_before_boundary() {
        // Valid node followed by one truncated a single byte short: the whole
        // parse must fail, no partial forest
        let data = [0x81, 0x01, 0x41, 0x82, 0x03, 0x42, 0x43];
        assert!(matches!(parse(&data), Err(ReadError::MalformedTlv(_))));
    }

    #[test]
    fn test_truncated_tag_header() {
        assert!(matches!(parse(&[0x5F]), Err(ReadError::MalformedTlv(_))));
    }

    #[test]
    fn test_truncated_length_header() {
        assert!(matches!(parse(&[0x80]), Err(ReadError::MalformedTlv(_))));
        assert!(matches!(parse(&[0x80, 0x82, 0x01]), Err(ReadError::MalformedTlv(_))));
    }

    #[test]
    fn test_indefinite_length_rejected() {
        assert!(matches!(
            parse(&[0x30, 0x80, 0x00, 0x00]),
            Err(ReadError::MalformedTlv(_))
        ));
    }

    #[test]
    fn test_max_depth_exceeded() {
        // MAX_DEPTH + 1 nested empty constructed nodes
        let mut data = Vec::new();
        for _ in 0..=MAX_DEPTH {
            let mut wrapped = vec![0x30, data.len() as u8];
            wrapped.extend_from_slice(&data);
            data = wrapped;
        }
        assert_eq!(parse(&data), Err(ReadError::MaxDepthExceeded));
    }

    #[test]
    fn test_find_depth_first() {
        let data = [0x30, 0x08, 0x81, 0x03, b'M', b'A', b'X', 0x84, 0x01, b'M'];
        let nodes = parse(&data).unwrap();

        assert_eq!(find(&nodes, 0x81).unwrap().value, b"MAX");
        assert_eq!(find(&nodes, 0x84).unwrap().value, b"M");
        assert_eq!(find(&nodes, 0x30).unwrap().children.len(), 2);
        assert!(find(&nodes, 0x85).is_none());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let data = [0x30, 0x05, 0x81, 0x03, b'M', b'A', b'X'];
        assert_eq!(parse(&data).unwrap(), parse(&data).unwrap());
    }
}
