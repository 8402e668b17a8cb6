//! TLV primitives: VAR-NUMBER, nonNegativeInteger, and a generic element.
//!
//! Every wire structure in this crate (names, packets, management parameters)
//! is built from [`Element`]. Encoding is canonical: type and length use the
//! shortest VAR-NUMBER form, integers the shortest nonNegativeInteger form,
//! and decoding rejects anything else.

/// Assigned TLV-TYPE numbers.
pub mod types {
    pub const INTEREST: u64 = 5;
    pub const DATA: u64 = 6;
    pub const NAME: u64 = 7;
    pub const NAME_COMPONENT: u64 = 8;
    pub const SELECTORS: u64 = 9;
    pub const NONCE: u64 = 10;
    pub const SCOPE: u64 = 11;
    pub const INTEREST_LIFETIME: u64 = 12;
    pub const MIN_SUFFIX_COMPONENTS: u64 = 13;
    pub const MAX_SUFFIX_COMPONENTS: u64 = 14;
    pub const CHILD_SELECTOR: u64 = 17;
    pub const MUST_BE_FRESH: u64 = 18;
    pub const META_INFO: u64 = 20;
    pub const CONTENT: u64 = 21;
    pub const SIGNATURE_INFO: u64 = 22;
    pub const SIGNATURE_VALUE: u64 = 23;
    pub const CONTENT_TYPE: u64 = 24;
    pub const FRESHNESS_PERIOD: u64 = 25;
    pub const FINAL_BLOCK_ID: u64 = 26;
    pub const SIGNATURE_TYPE: u64 = 27;
    pub const KEY_LOCATOR: u64 = 28;

    // Link protocol.
    pub const FRAGMENT: u64 = 80;
    pub const LP_PACKET: u64 = 100;
    pub const NACK: u64 = 800;
    pub const NACK_REASON: u64 = 801;

    // Forwarder management.
    pub const CONTROL_RESPONSE: u64 = 101;
    pub const STATUS_CODE: u64 = 102;
    pub const STATUS_TEXT: u64 = 103;
    pub const CONTROL_PARAMETERS: u64 = 104;
    pub const FACE_ID: u64 = 105;
    pub const COST: u64 = 106;
    pub const STRATEGY: u64 = 107;
    pub const FLAGS: u64 = 108;
    pub const EXPIRATION_PERIOD: u64 = 109;
    pub const LOCAL_CONTROL_FEATURE: u64 = 110;
    pub const ORIGIN: u64 = 111;
    pub const URI: u64 = 114;
}

/// Malformed wire bytes. Dropped by the dispatch loop, surfaced by direct decoders.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("truncated element")]
    Truncated,
    #[error("non-minimal VAR-NUMBER encoding")]
    NonMinimalVarNumber,
    #[error("expected TLV-TYPE {expected}, found {actual}")]
    UnexpectedType { expected: u64, actual: u64 },
    #[error("{0} trailing bytes after element")]
    TrailingBytes(usize),
    #[error("invalid nonNegativeInteger of {0} bytes")]
    InvalidNonNegativeInteger(usize),
    #[error("missing required element {0}")]
    MissingElement(u64),
    #[error("invalid {what}: {reason}")]
    Invalid {
        what: &'static str,
        reason: &'static str,
    },
}

/// Encoded size of `n` as a VAR-NUMBER.
pub fn var_number_len(n: u64) -> usize {
    if n < 253 {
        1
    } else if n <= u64::from(u16::MAX) {
        3
    } else if n <= u64::from(u32::MAX) {
        5
    } else {
        9
    }
}

pub fn write_var_number(out: &mut Vec<u8>, n: u64) {
    match var_number_len(n) {
        1 => out.push(n as u8),
        3 => {
            out.push(253);
            out.extend_from_slice(&(n as u16).to_be_bytes());
        }
        5 => {
            out.push(254);
            out.extend_from_slice(&(n as u32).to_be_bytes());
        }
        _ => {
            out.push(255);
            out.extend_from_slice(&n.to_be_bytes());
        }
    }
}

/// Read a VAR-NUMBER from the front of `buf`. Returns the value and bytes consumed.
pub fn read_var_number(buf: &[u8]) -> Result<(u64, usize), EncodingError> {
    let first = *buf.first().ok_or(EncodingError::Truncated)?;
    let (value, len) = match first {
        0..=252 => return Ok((u64::from(first), 1)),
        253 => (u64::from(u16::from_be_bytes(take_after_marker(buf)?)), 3),
        254 => (u64::from(u32::from_be_bytes(take_after_marker(buf)?)), 5),
        255 => (u64::from_be_bytes(take_after_marker(buf)?), 9),
    };
    if var_number_len(value) != len {
        return Err(EncodingError::NonMinimalVarNumber);
    }
    Ok((value, len))
}

fn take_after_marker<const N: usize>(buf: &[u8]) -> Result<[u8; N], EncodingError> {
    buf.get(1..1 + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(EncodingError::Truncated)
}

/// Encoded size of `n` as a nonNegativeInteger (1, 2, 4 or 8 bytes).
pub fn non_negative_integer_len(n: u64) -> usize {
    if n <= u64::from(u8::MAX) {
        1
    } else if n <= u64::from(u16::MAX) {
        2
    } else if n <= u64::from(u32::MAX) {
        4
    } else {
        8
    }
}

/// Shortest big-endian nonNegativeInteger form of `n`.
pub fn non_negative_integer_bytes(n: u64) -> Vec<u8> {
    let len = non_negative_integer_len(n);
    n.to_be_bytes()[8 - len..].to_vec()
}

/// Decode a nonNegativeInteger value. Rejects lengths other than 1/2/4/8 and
/// non-shortest forms.
pub fn read_non_negative_integer(value: &[u8]) -> Result<u64, EncodingError> {
    let n = match *value {
        [a] => u64::from(a),
        [a, b] => u64::from(u16::from_be_bytes([a, b])),
        [a, b, c, d] => u64::from(u32::from_be_bytes([a, b, c, d])),
        [a, b, c, d, e, f, g, h] => u64::from_be_bytes([a, b, c, d, e, f, g, h]),
        _ => return Err(EncodingError::InvalidNonNegativeInteger(value.len())),
    };
    if non_negative_integer_len(n) != value.len() {
        return Err(EncodingError::InvalidNonNegativeInteger(value.len()));
    }
    Ok(n)
}

/// Append one TLV (type, length, value) to `out`.
pub fn write_tlv(out: &mut Vec<u8>, tlv_type: u64, value: &[u8]) {
    write_var_number(out, tlv_type);
    write_var_number(out, value.len() as u64);
    out.extend_from_slice(value);
}

/// Read a TLV header. Returns (type, value length, header length); does not
/// check that the value is present.
pub fn read_header(buf: &[u8]) -> Result<(u64, usize, usize), EncodingError> {
    let (tlv_type, type_len) = read_var_number(buf)?;
    let (length, length_len) = read_var_number(&buf[type_len..])?;
    let length = usize::try_from(length).map_err(|_| EncodingError::Truncated)?;
    Ok((tlv_type, length, type_len + length_len))
}

/// One decoded TLV element. Nested elements are parsed lazily via [`Element::children`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element {
    tlv_type: u64,
    value: Vec<u8>,
}

impl Element {
    pub fn new(tlv_type: u64, value: impl Into<Vec<u8>>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Element whose value is the canonical nonNegativeInteger form of `n`.
    pub fn non_negative_integer(tlv_type: u64, n: u64) -> Self {
        Self::new(tlv_type, non_negative_integer_bytes(n))
    }

    /// Element whose value is the concatenation of `children`.
    pub fn nested<'a>(tlv_type: u64, children: impl IntoIterator<Item = &'a Element>) -> Self {
        let mut value = Vec::new();
        for child in children {
            child.encode_to(&mut value);
        }
        Self::new(tlv_type, value)
    }

    pub fn tlv_type(&self) -> u64 {
        self.tlv_type
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    pub fn encoded_len(&self) -> usize {
        let len = self.value.len();
        var_number_len(self.tlv_type) + var_number_len(len as u64) + len
    }

    pub fn encode_to(&self, out: &mut Vec<u8>) {
        write_tlv(out, self.tlv_type, &self.value);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_to(&mut out);
        out
    }

    /// Decode the first element of `buf`. Returns the element and bytes consumed.
    pub fn split_first(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let (tlv_type, length, header_len) = read_header(buf)?;
        let end = header_len
            .checked_add(length)
            .ok_or(EncodingError::Truncated)?;
        let value = buf.get(header_len..end).ok_or(EncodingError::Truncated)?;
        Ok((Self::new(tlv_type, value), end))
    }

    /// Decode `buf` as exactly one element.
    pub fn parse(buf: &[u8]) -> Result<Self, EncodingError> {
        let (element, consumed) = Self::split_first(buf)?;
        if consumed != buf.len() {
            return Err(EncodingError::TrailingBytes(buf.len() - consumed));
        }
        Ok(element)
    }

    /// Decode `buf` as exactly one element of the given type.
    pub fn parse_typed(buf: &[u8], tlv_type: u64) -> Result<Self, EncodingError> {
        Self::parse(buf)?.expect_type(tlv_type)
    }

    pub fn expect_type(self, tlv_type: u64) -> Result<Self, EncodingError> {
        if self.tlv_type != tlv_type {
            return Err(EncodingError::UnexpectedType {
                expected: tlv_type,
                actual: self.tlv_type,
            });
        }
        Ok(self)
    }

    /// Parse the value as a sequence of nested elements.
    pub fn children(&self) -> Result<Vec<Element>, EncodingError> {
        let mut out = Vec::new();
        let mut rest = self.value.as_slice();
        while !rest.is_empty() {
            let (child, consumed) = Self::split_first(rest)?;
            out.push(child);
            rest = &rest[consumed..];
        }
        Ok(out)
    }

    pub fn as_non_negative_integer(&self) -> Result<u64, EncodingError> {
        read_non_negative_integer(&self.value)
    }
}

/// Human-readable name of a TLV-TYPE, for dumps and logs.
pub fn type_name(tlv_type: u64) -> &'static str {
    use types::*;
    match tlv_type {
        INTEREST => "Interest",
        DATA => "Data",
        NAME => "Name",
        NAME_COMPONENT => "NameComponent",
        SELECTORS => "Selectors",
        NONCE => "Nonce",
        SCOPE => "Scope",
        INTEREST_LIFETIME => "InterestLifetime",
        MIN_SUFFIX_COMPONENTS => "MinSuffixComponents",
        MAX_SUFFIX_COMPONENTS => "MaxSuffixComponents",
        15 => "PublisherPublicKeyLocator",
        16 => "Exclude",
        CHILD_SELECTOR => "ChildSelector",
        MUST_BE_FRESH => "MustBeFresh",
        19 => "Any",
        META_INFO => "MetaInfo",
        CONTENT => "Content",
        SIGNATURE_INFO => "SignatureInfo",
        SIGNATURE_VALUE => "SignatureValue",
        CONTENT_TYPE => "ContentType",
        FRESHNESS_PERIOD => "FreshnessPeriod",
        FINAL_BLOCK_ID => "FinalBlockId",
        SIGNATURE_TYPE => "SignatureType",
        KEY_LOCATOR => "KeyLocator",
        29 => "KeyLocatorDigest",
        FRAGMENT => "Fragment",
        LP_PACKET => "LpPacket",
        NACK => "Nack",
        NACK_REASON => "NackReason",
        CONTROL_RESPONSE => "ControlResponse",
        STATUS_CODE => "StatusCode",
        STATUS_TEXT => "StatusText",
        CONTROL_PARAMETERS => "ControlParameters",
        FACE_ID => "FaceId",
        COST => "Cost",
        STRATEGY => "Strategy",
        FLAGS => "Flags",
        EXPIRATION_PERIOD => "ExpirationPeriod",
        LOCAL_CONTROL_FEATURE => "LocalControlFeature",
        ORIGIN => "Origin",
        URI => "Uri",
        0..=4 => "RESERVED",
        30..=127 => "RESERVED_1",
        128..=252 => "APP_TAG_1",
        253..=32766 => "RESERVED_3",
        _ => "APP_TAG_3",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::one_byte(252, &[0xFC])]
    #[case::three_bytes(253, &[0xFD, 0x00, 0xFD])]
    #[case::five_bytes(0x1_0000, &[0xFE, 0x00, 0x01, 0x00, 0x00])]
    #[case::nine_bytes(0x1_0000_0000, &[0xFF, 0, 0, 0, 1, 0, 0, 0, 0])]
    fn var_number_canonical_forms(#[case] n: u64, #[case] wire: &[u8]) {
        let mut out = Vec::new();
        write_var_number(&mut out, n);
        assert_eq!(out, wire);
        assert_eq!(read_var_number(wire).unwrap(), (n, wire.len()));
    }

    #[test]
    fn var_number_rejects_non_minimal() {
        assert_eq!(
            read_var_number(&[0xFD, 0x00, 0x10]),
            Err(EncodingError::NonMinimalVarNumber)
        );
    }

    #[test]
    fn var_number_truncated() {
        assert_eq!(read_var_number(&[]), Err(EncodingError::Truncated));
        assert_eq!(read_var_number(&[0xFE, 0x00]), Err(EncodingError::Truncated));
    }

    #[rstest]
    #[case(0, &[0x00])]
    #[case(255, &[0xFF])]
    #[case(256, &[0x01, 0x00])]
    #[case(0x1_0000, &[0x00, 0x01, 0x00, 0x00])]
    #[case(u64::MAX, &[0xFF; 8])]
    fn non_negative_integer_shortest_form(#[case] n: u64, #[case] value: &[u8]) {
        assert_eq!(non_negative_integer_bytes(n), value);
        assert_eq!(read_non_negative_integer(value).unwrap(), n);
    }

    #[rstest]
    #[case::empty(&[])]
    #[case::three_bytes(&[1, 2, 3])]
    #[case::padded(&[0x00, 0x05])]
    #[case::padded_wide(&[0, 0, 0, 0, 0, 0, 1, 0])]
    fn non_negative_integer_rejects(#[case] value: &[u8]) {
        assert!(read_non_negative_integer(value).is_err());
    }

    #[test]
    fn parse_nested_element() {
        let inner = Element::new(types::NAME_COMPONENT, b"hello".to_vec());
        let outer = Element::nested(types::NAME, [&inner, &inner]);
        let wire = outer.encode();
        assert_eq!(wire.len(), outer.encoded_len());
        let parsed = Element::parse_typed(&wire, types::NAME).unwrap();
        assert_eq!(parsed.children().unwrap(), vec![inner.clone(), inner]);
    }

    #[test]
    fn parse_rejects_length_past_end() {
        assert_eq!(
            Element::parse(&[0x07, 0x05, 0x08, 0x00]),
            Err(EncodingError::Truncated)
        );
    }

    #[test]
    fn parse_rejects_trailing_bytes() {
        assert_eq!(
            Element::parse(&[0x07, 0x00, 0x00]),
            Err(EncodingError::TrailingBytes(1))
        );
    }

    #[test]
    fn parse_typed_rejects_wrong_type() {
        let wire = Element::new(types::DATA, Vec::new()).encode();
        assert_eq!(
            Element::parse_typed(&wire, types::INTEREST),
            Err(EncodingError::UnexpectedType {
                expected: types::INTEREST,
                actual: types::DATA
            })
        );
    }

    #[test]
    fn type_names() {
        assert_eq!(type_name(5), "Interest");
        assert_eq!(type_name(100), "LpPacket");
        assert_eq!(type_name(200), "APP_TAG_1");
        assert_eq!(type_name(40000), "APP_TAG_3");
    }
}
