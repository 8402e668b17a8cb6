//! Names and name components: canonical TLV encoding, canonical order, URI text form.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::tlv::{self, types, Element, EncodingError};

/// Error from the text and number views of a name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("invalid escaped text: {0}")]
    InvalidText(String),
    #[error("component is not a canonical nonNegativeInteger")]
    NotANumber,
}

/// One name component: an opaque byte string.
///
/// Ordering is the NDN canonical order: shorter values first, equal-length
/// values byte by byte.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Component(Vec<u8>);

impl Component {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Component holding `number` as a nonNegativeInteger.
    pub fn from_number(number: u64) -> Self {
        Self(tlv::non_negative_integer_bytes(number))
    }

    /// Interpret the value as a nonNegativeInteger. Non-shortest forms are rejected.
    pub fn to_number(&self) -> Result<u64, NameError> {
        tlv::read_non_negative_integer(&self.0).map_err(|_| NameError::NotANumber)
    }

    /// Decode one escaped URI component. Returns `Ok(None)` for "", "." and "..",
    /// which name no component and are skipped.
    pub fn from_escaped(text: &str) -> Result<Option<Self>, NameError> {
        let value = unescape(text.trim())?;
        if value.iter().all(|&b| b == b'.') {
            if value.len() <= 2 {
                return Ok(None);
            }
            return Ok(Some(Self(value[3..].to_vec())));
        }
        Ok(Some(Self(value)))
    }

    /// Escaped URI form. A value made only of periods (or empty) gets three
    /// extra leading periods.
    pub fn to_escaped(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        self.write_escaped(&mut out);
        out
    }

    fn write_escaped(&self, out: &mut String) {
        if self.0.iter().all(|&b| b == b'.') {
            out.push_str("...");
            out.extend(self.0.iter().map(|_| '.'));
            return;
        }
        for &b in &self.0 {
            if b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.' | b'_') {
                out.push(char::from(b));
            } else {
                out.push_str(&format!("%{b:02X}"));
            }
        }
    }

    pub fn to_element(&self) -> Element {
        Element::new(types::NAME_COMPONENT, self.0.clone())
    }

    pub fn from_element(element: Element) -> Result<Self, EncodingError> {
        Ok(Self(element.expect_type(types::NAME_COMPONENT)?.into_value()))
    }

    pub fn encode_to(&self, out: &mut Vec<u8>) {
        tlv::write_tlv(out, types::NAME_COMPONENT, &self.0);
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_escaped())
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.to_escaped())
    }
}

impl From<&str> for Component {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Component {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Component {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

fn unescape(text: &str) -> Result<Vec<u8>, NameError> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let hex = bytes
            .get(i + 1..i + 3)
            .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(|| NameError::InvalidText(format!("bad percent-escape in {text:?}")))?;
        out.push(hex);
        i += 3;
    }
    Ok(out)
}

/// A hierarchical name. Immutable; [`Name::prefix`] shares storage with the
/// name it was taken from.
#[derive(Clone)]
pub struct Name {
    components: Arc<[Component]>,
    len: usize,
}

impl Name {
    /// The empty (root) name.
    pub fn new() -> Self {
        Self::from_components(Vec::new())
    }

    pub fn from_components(components: impl IntoIterator<Item = Component>) -> Self {
        let components: Arc<[Component]> = components.into_iter().collect();
        let len = components.len();
        Self { components, len }
    }

    pub fn components(&self) -> &[Component] {
        &self.components[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Component at `index`; negative indexes count from the end.
    pub fn get(&self, index: isize) -> Option<&Component> {
        let i = if index < 0 {
            self.len.checked_sub(index.unsigned_abs())?
        } else {
            index.unsigned_abs()
        };
        self.components().get(i)
    }

    /// The first `n` components (all of them if `n` exceeds the length).
    pub fn prefix(&self, n: usize) -> Name {
        Self {
            components: Arc::clone(&self.components),
            len: n.min(self.len),
        }
    }

    /// True if `self` equals `other` or is an ancestor of it.
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.len <= other.len && self.components() == &other.components()[..self.len]
    }

    /// New name with `component` appended.
    pub fn append(&self, component: impl Into<Component>) -> Name {
        let mut components = self.components().to_vec();
        components.push(component.into());
        Self::from_components(components)
    }

    pub fn append_number(&self, number: u64) -> Name {
        self.append(Component::from_number(number))
    }

    pub fn append_segment(&self, segment: u64) -> Name {
        self.append_number(segment)
    }

    pub fn append_version(&self, version: u64) -> Name {
        self.append_number(version)
    }

    /// New name with all of `other`'s components appended.
    pub fn join(&self, other: &Name) -> Name {
        Self::from_components(self.components().iter().chain(other.components()).cloned())
    }

    pub fn to_element(&self) -> Element {
        let mut value = Vec::new();
        for component in self.components() {
            component.encode_to(&mut value);
        }
        Element::new(types::NAME, value)
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_element().encode()
    }

    pub fn from_element(element: Element) -> Result<Self, EncodingError> {
        let element = element.expect_type(types::NAME)?;
        let components = element
            .children()?
            .into_iter()
            .map(Component::from_element)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_components(components))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EncodingError> {
        Self::from_element(Element::parse(bytes)?)
    }

    /// Parse the URI form: optional `ndn:` scheme, optional `//authority`,
    /// `/`-separated escaped components.
    pub fn from_uri(uri: &str) -> Result<Self, NameError> {
        let mut rest = uri.trim();
        if let Some(stripped) = rest.strip_prefix("ndn:") {
            rest = stripped;
        }
        if let Some(authority) = rest.strip_prefix("//") {
            rest = authority.find('/').map_or("", |slash| &authority[slash..]);
        }
        let mut components = Vec::new();
        for part in rest.split('/') {
            if let Some(component) = Component::from_escaped(part)? {
                components.push(component);
            }
        }
        Ok(Self::from_components(components))
    }

    pub fn to_uri(&self) -> String {
        if self.is_empty() {
            return "/".to_owned();
        }
        let mut out = String::new();
        for component in self.components() {
            out.push('/');
            component.write_escaped(&mut out);
        }
        out
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.components() == other.components()
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.components().hash(state);
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components().cmp(other.components())
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.to_uri())
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uri(s)
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_uri())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let uri = String::deserialize(d)?;
        Name::from_uri(&uri).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    #[test]
    fn encode_decode_roundtrip() {
        let n = name("/a/b%00c/.../%FF");
        let wire = n.encode();
        assert_eq!(Name::decode(&wire).unwrap(), n);
    }

    #[test]
    fn encoding_is_canonical() {
        let wire = name("/a/bc").encode();
        assert_eq!(wire, vec![0x07, 0x07, 0x08, 0x01, b'a', 0x08, 0x02, b'b', b'c']);
    }

    #[test]
    fn decode_rejects_wrong_outer_type() {
        let wire = Element::new(types::DATA, Vec::new()).encode();
        assert!(matches!(
            Name::decode(&wire),
            Err(EncodingError::UnexpectedType { .. })
        ));
    }

    #[test]
    fn decode_rejects_non_component_child() {
        let inner = Element::new(types::NONCE, vec![1]);
        let wire = Element::nested(types::NAME, [&inner]).encode();
        assert!(Name::decode(&wire).is_err());
    }

    #[test]
    fn decode_rejects_inconsistent_length() {
        assert_eq!(
            Name::decode(&[0x07, 0x04, 0x08, 0x05, b'a']),
            Err(EncodingError::Truncated)
        );
    }

    #[rstest]
    #[case::root("/", "/")]
    #[case::empty_text("", "/")]
    #[case::scheme("ndn:/a/b", "/a/b")]
    #[case::authority("ndn://host/a", "/a")]
    #[case::skips_dots("/a/./../b", "/a/b")]
    #[case::three_periods("/...", "/...")]
    #[case::four_periods("/....", "/....")]
    #[case::escapes("/hello%20world", "/hello%20world")]
    #[case::lowercase_escape("/%ff", "/%FF")]
    #[case::reserved_chars("/a+b-c.d_e", "/a+b-c.d_e")]
    fn uri_forms(#[case] input: &str, #[case] canonical: &str) {
        assert_eq!(name(input).to_uri(), canonical);
    }

    #[test]
    fn three_periods_is_empty_component() {
        let n = name("/...");
        assert_eq!(n.len(), 1);
        assert!(n.components()[0].is_empty());
        assert_eq!(Component::new(b"..".to_vec()).to_escaped(), ".....");
    }

    #[rstest]
    #[case("/a%")]
    #[case("/a%4")]
    #[case("/a%zz")]
    #[case("/a%+5")]
    #[case("/a%-1")]
    fn invalid_text(#[case] input: &str) {
        assert!(matches!(
            Name::from_uri(input),
            Err(NameError::InvalidText(_))
        ));
    }

    #[test]
    fn text_roundtrip_with_binary() {
        let n = Name::from_components([
            Component::new(vec![0u8, 1, 0x2e, 0xff]),
            Component::new(b"..".to_vec()),
            Component::default(),
        ]);
        assert_eq!(Name::from_uri(&n.to_uri()).unwrap(), n);
    }

    #[test]
    fn component_order_length_first() {
        let short = Component::from("zz");
        let long = Component::from("aaa");
        assert!(short < long);
        assert!(Component::from("ab") < Component::from("ac"));
        assert_eq!(Component::from("x").cmp(&Component::from("x")), Ordering::Equal);
    }

    #[test]
    fn component_order_is_total() {
        let cs: Vec<Component> = ["", "a", "b", "aa", "ab", "\u{0}"]
            .iter()
            .map(|s| Component::from(*s))
            .collect();
        for a in &cs {
            for b in &cs {
                assert_eq!(a.cmp(b), b.cmp(a).reverse());
                for c in &cs {
                    if a <= b && b <= c {
                        assert!(a <= c);
                    }
                }
            }
        }
    }

    #[test]
    fn name_order_prefix_first() {
        assert!(name("/a") < name("/a/b"));
        assert!(name("/a/z") < name("/aa"));
        assert!(name("/") < name("/a"));
    }

    #[rstest]
    #[case(0)]
    #[case(255)]
    #[case(256)]
    #[case(70_000)]
    #[case(u64::MAX)]
    fn number_component_roundtrip(#[case] n: u64) {
        assert_eq!(Component::from_number(n).to_number().unwrap(), n);
    }

    #[test]
    fn number_component_rejects_non_minimal() {
        assert_eq!(
            Component::new(vec![0x00, 0x01]).to_number(),
            Err(NameError::NotANumber)
        );
        assert_eq!(
            Component::new(vec![1, 2, 3]).to_number(),
            Err(NameError::NotANumber)
        );
    }

    #[test]
    fn prefix_is_shared_view() {
        let n = name("/a/b/c");
        let p = n.prefix(2);
        assert_eq!(p, name("/a/b"));
        assert!(p.is_prefix_of(&n));
        assert!(!n.is_prefix_of(&p));
        assert_eq!(n.prefix(10), n);
        assert!(Name::new().is_prefix_of(&n));
    }

    #[test]
    fn get_negative_index() {
        let n = name("/a/b/c");
        assert_eq!(n.get(-1), Some(&Component::from("c")));
        assert_eq!(n.get(0), Some(&Component::from("a")));
        assert_eq!(n.get(-4), None);
        assert_eq!(n.get(3), None);
    }

    #[test]
    fn append_segment() {
        let n = name("/video").append_segment(3);
        assert_eq!(n.get(-1).unwrap().to_number().unwrap(), 3);
        assert_eq!(n.len(), 2);
    }

    #[test]
    fn append_version_and_join() {
        let versioned = name("/doc").append_version(1_700_000_000);
        assert_eq!(versioned.get(-1).unwrap().to_number().unwrap(), 1_700_000_000);

        let joined = name("/a/b").join(&versioned.prefix(1));
        assert_eq!(joined, name("/a/b/doc"));
        assert_eq!(name("/a").join(&Name::new()), name("/a"));
        assert_eq!(Name::new().join(&name("/x/y")).len(), 2);
    }
}
