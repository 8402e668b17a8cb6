//! Network packets: Interest, Data, and link-layer Nack.

use std::time::Duration;

use rand::Rng;

use crate::name::{Component, Name};
use crate::tlv::{types, Element, EncodingError};

/// Interest selectors. Carried on the wire; only the suffix bounds take part
/// in the default match predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selectors {
    pub min_suffix_components: Option<u64>,
    pub max_suffix_components: Option<u64>,
    pub child_selector: Option<u64>,
    pub must_be_fresh: bool,
}

impl Selectors {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn to_element(&self) -> Element {
        let mut children = Vec::new();
        if let Some(n) = self.min_suffix_components {
            children.push(Element::non_negative_integer(types::MIN_SUFFIX_COMPONENTS, n));
        }
        if let Some(n) = self.max_suffix_components {
            children.push(Element::non_negative_integer(types::MAX_SUFFIX_COMPONENTS, n));
        }
        if let Some(n) = self.child_selector {
            children.push(Element::non_negative_integer(types::CHILD_SELECTOR, n));
        }
        if self.must_be_fresh {
            children.push(Element::new(types::MUST_BE_FRESH, Vec::new()));
        }
        Element::nested(types::SELECTORS, &children)
    }

    fn from_element(element: &Element) -> Result<Self, EncodingError> {
        let mut selectors = Self::default();
        for child in element.children()? {
            match child.tlv_type() {
                types::MIN_SUFFIX_COMPONENTS => {
                    selectors.min_suffix_components = Some(child.as_non_negative_integer()?)
                }
                types::MAX_SUFFIX_COMPONENTS => {
                    selectors.max_suffix_components = Some(child.as_non_negative_integer()?)
                }
                types::CHILD_SELECTOR => {
                    selectors.child_selector = Some(child.as_non_negative_integer()?)
                }
                types::MUST_BE_FRESH => selectors.must_be_fresh = true,
                // Exclude, PublisherPublicKeyLocator: not interpreted.
                _ => {}
            }
        }
        Ok(selectors)
    }
}

/// A named request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub selectors: Selectors,
    pub nonce: u32,
    /// `None` means the face's default lifetime.
    pub lifetime: Option<Duration>,
}

impl Interest {
    /// New Interest with a random nonce and no explicit lifetime.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            selectors: Selectors::default(),
            nonce: rand::thread_rng().gen(),
            lifetime: None,
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn with_selectors(mut self, selectors: Selectors) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn to_element(&self) -> Element {
        let mut children = vec![self.name.to_element()];
        if !self.selectors.is_empty() {
            children.push(self.selectors.to_element());
        }
        children.push(Element::new(types::NONCE, self.nonce.to_be_bytes().to_vec()));
        if let Some(lifetime) = self.lifetime {
            children.push(Element::non_negative_integer(
                types::INTEREST_LIFETIME,
                duration_millis(lifetime),
            ));
        }
        Element::nested(types::INTEREST, &children)
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_element().encode()
    }

    pub fn from_element(element: &Element) -> Result<Self, EncodingError> {
        if element.tlv_type() != types::INTEREST {
            return Err(EncodingError::UnexpectedType {
                expected: types::INTEREST,
                actual: element.tlv_type(),
            });
        }
        let mut name = None;
        let mut selectors = Selectors::default();
        let mut nonce = None;
        let mut lifetime = None;
        for child in element.children()? {
            match child.tlv_type() {
                types::NAME => name = Some(Name::from_element(child)?),
                types::SELECTORS => selectors = Selectors::from_element(&child)?,
                types::NONCE => {
                    let bytes: [u8; 4] =
                        child.value().try_into().map_err(|_| EncodingError::Invalid {
                            what: "Nonce",
                            reason: "must be 4 bytes",
                        })?;
                    nonce = Some(u32::from_be_bytes(bytes));
                }
                types::INTEREST_LIFETIME => {
                    lifetime = Some(Duration::from_millis(child.as_non_negative_integer()?))
                }
                _ => {}
            }
        }
        Ok(Self {
            name: name.ok_or(EncodingError::MissingElement(types::NAME))?,
            selectors,
            nonce: nonce.ok_or(EncodingError::MissingElement(types::NONCE))?,
            lifetime,
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EncodingError> {
        Self::from_element(&Element::parse(bytes)?)
    }
}

/// Data MetaInfo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaInfo {
    pub content_type: Option<u64>,
    pub freshness_period: Option<Duration>,
    pub final_block_id: Option<Component>,
}

impl MetaInfo {
    fn to_element(&self) -> Element {
        let mut children = Vec::new();
        if let Some(content_type) = self.content_type {
            children.push(Element::non_negative_integer(types::CONTENT_TYPE, content_type));
        }
        if let Some(freshness) = self.freshness_period {
            children.push(Element::non_negative_integer(
                types::FRESHNESS_PERIOD,
                duration_millis(freshness),
            ));
        }
        if let Some(block) = &self.final_block_id {
            children.push(Element::nested(types::FINAL_BLOCK_ID, [&block.to_element()]));
        }
        Element::nested(types::META_INFO, &children)
    }

    fn from_element(element: &Element) -> Result<Self, EncodingError> {
        let mut meta = Self::default();
        for child in element.children()? {
            match child.tlv_type() {
                types::CONTENT_TYPE => meta.content_type = Some(child.as_non_negative_integer()?),
                types::FRESHNESS_PERIOD => {
                    meta.freshness_period =
                        Some(Duration::from_millis(child.as_non_negative_integer()?))
                }
                types::FINAL_BLOCK_ID => {
                    let component = Element::parse(child.value())?;
                    meta.final_block_id = Some(Component::from_element(component)?);
                }
                _ => {}
            }
        }
        Ok(meta)
    }
}

/// SignatureInfo plus SignatureValue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub signature_type: u64,
    pub key_locator: Option<Name>,
    pub value: Vec<u8>,
}

impl Signature {
    /// DigestSha256.
    pub const DIGEST_SHA256: u64 = 0;

    pub fn info_element(&self) -> Element {
        let mut children = vec![Element::non_negative_integer(
            types::SIGNATURE_TYPE,
            self.signature_type,
        )];
        if let Some(locator) = &self.key_locator {
            children.push(Element::nested(types::KEY_LOCATOR, [&locator.to_element()]));
        }
        Element::nested(types::SIGNATURE_INFO, &children)
    }

    pub fn value_element(&self) -> Element {
        Element::new(types::SIGNATURE_VALUE, self.value.clone())
    }

    fn info_from_element(element: &Element) -> Result<(u64, Option<Name>), EncodingError> {
        let mut signature_type = None;
        let mut key_locator = None;
        for child in element.children()? {
            match child.tlv_type() {
                types::SIGNATURE_TYPE => signature_type = Some(child.as_non_negative_integer()?),
                types::KEY_LOCATOR => {
                    let inner = Element::parse(child.value())?;
                    if inner.tlv_type() == types::NAME {
                        key_locator = Some(Name::from_element(inner)?);
                    }
                }
                _ => {}
            }
        }
        let signature_type =
            signature_type.ok_or(EncodingError::MissingElement(types::SIGNATURE_TYPE))?;
        Ok((signature_type, key_locator))
    }
}

/// A named, optionally signed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub name: Name,
    pub meta_info: MetaInfo,
    pub content: Vec<u8>,
    pub signature: Option<Signature>,
}

impl Data {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            meta_info: MetaInfo::default(),
            content: Vec::new(),
            signature: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_freshness(mut self, period: Duration) -> Self {
        self.meta_info.freshness_period = Some(period);
        self
    }

    /// Name, MetaInfo, Content and SignatureInfo as encoded: the bytes a
    /// signature covers.
    pub fn signed_portion(&self, signature: &Signature) -> Vec<u8> {
        let mut out = Vec::new();
        for element in self.unsigned_elements() {
            element.encode_to(&mut out);
        }
        signature.info_element().encode_to(&mut out);
        out
    }

    fn unsigned_elements(&self) -> [Element; 3] {
        [
            self.name.to_element(),
            self.meta_info.to_element(),
            Element::new(types::CONTENT, self.content.clone()),
        ]
    }

    pub fn to_element(&self) -> Element {
        let mut children = self.unsigned_elements().to_vec();
        if let Some(signature) = &self.signature {
            children.push(signature.info_element());
            children.push(signature.value_element());
        }
        Element::nested(types::DATA, &children)
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_element().encode()
    }

    pub fn from_element(element: &Element) -> Result<Self, EncodingError> {
        if element.tlv_type() != types::DATA {
            return Err(EncodingError::UnexpectedType {
                expected: types::DATA,
                actual: element.tlv_type(),
            });
        }
        let mut name = None;
        let mut meta_info = MetaInfo::default();
        let mut content = Vec::new();
        let mut info = None;
        let mut value = None;
        for child in element.children()? {
            match child.tlv_type() {
                types::NAME => name = Some(Name::from_element(child)?),
                types::META_INFO => meta_info = MetaInfo::from_element(&child)?,
                types::CONTENT => content = child.into_value(),
                types::SIGNATURE_INFO => info = Some(Signature::info_from_element(&child)?),
                types::SIGNATURE_VALUE => value = Some(child.into_value()),
                _ => {}
            }
        }
        let signature = match (info, value) {
            (Some((signature_type, key_locator)), Some(value)) => Some(Signature {
                signature_type,
                key_locator,
                value,
            }),
            (None, None) => None,
            _ => {
                return Err(EncodingError::Invalid {
                    what: "Data",
                    reason: "SignatureInfo and SignatureValue must appear together",
                })
            }
        };
        Ok(Self {
            name: name.ok_or(EncodingError::MissingElement(types::NAME))?,
            meta_info,
            content,
            signature,
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EncodingError> {
        Self::from_element(&Element::parse(bytes)?)
    }
}

/// Why a forwarder refused an Interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
    None,
    Congestion,
    Duplicate,
    NoRoute,
    Other(u64),
}

impl NackReason {
    pub fn code(self) -> u64 {
        match self {
            NackReason::None => 0,
            NackReason::Congestion => 50,
            NackReason::Duplicate => 100,
            NackReason::NoRoute => 150,
            NackReason::Other(code) => code,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            0 => NackReason::None,
            50 => NackReason::Congestion,
            100 => NackReason::Duplicate,
            150 => NackReason::NoRoute,
            other => NackReason::Other(other),
        }
    }
}

impl std::fmt::Display for NackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NackReason::None => f.write_str("None"),
            NackReason::Congestion => f.write_str("Congestion"),
            NackReason::Duplicate => f.write_str("Duplicate"),
            NackReason::NoRoute => f.write_str("NoRoute"),
            NackReason::Other(code) => write!(f, "{code}"),
        }
    }
}

/// Negative acknowledgement for an Interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nack {
    pub reason: NackReason,
    pub interest: Interest,
}

impl Nack {
    pub fn new(interest: Interest, reason: NackReason) -> Self {
        Self { reason, interest }
    }

    /// LpPacket carrying a Nack header and the Interest as its fragment.
    pub fn to_element(&self) -> Element {
        let header = if self.reason == NackReason::None {
            Element::new(types::NACK, Vec::new())
        } else {
            let reason = Element::non_negative_integer(types::NACK_REASON, self.reason.code());
            Element::nested(types::NACK, [&reason])
        };
        let fragment = Element::new(types::FRAGMENT, self.interest.encode());
        Element::nested(types::LP_PACKET, [&header, &fragment])
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_element().encode()
    }
}

/// Any packet the face understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Interest(Interest),
    Data(Data),
    Nack(Nack),
}

impl Packet {
    /// Classify a top-level element. `Ok(None)` for types this face does not
    /// handle (including an LpPacket with no fragment).
    pub fn from_element(element: &Element) -> Result<Option<Self>, EncodingError> {
        match element.tlv_type() {
            types::INTEREST => Ok(Some(Packet::Interest(Interest::from_element(element)?))),
            types::DATA => Ok(Some(Packet::Data(Data::from_element(element)?))),
            types::LP_PACKET => Self::from_lp_packet(element),
            _ => Ok(None),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Option<Self>, EncodingError> {
        Self::from_element(&Element::parse(bytes)?)
    }

    fn from_lp_packet(element: &Element) -> Result<Option<Self>, EncodingError> {
        let mut nack = None;
        let mut fragment = None;
        for child in element.children()? {
            match child.tlv_type() {
                types::NACK => {
                    let mut reason = NackReason::None;
                    for field in child.children()? {
                        if field.tlv_type() == types::NACK_REASON {
                            reason = NackReason::from_code(field.as_non_negative_integer()?);
                        }
                    }
                    nack = Some(reason);
                }
                types::FRAGMENT => fragment = Some(Element::parse(child.value())?),
                _ => {}
            }
        }
        let Some(fragment) = fragment else {
            return Ok(None);
        };
        match nack {
            Some(reason) => Ok(Some(Packet::Nack(Nack {
                reason,
                interest: Interest::from_element(&fragment)?,
            }))),
            None => Self::from_element(&fragment),
        }
    }

    pub fn name(&self) -> &Name {
        match self {
            Packet::Interest(interest) => &interest.name,
            Packet::Data(data) => &data.name,
            Packet::Nack(nack) => &nack.interest.name,
        }
    }
}

pub(crate) fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
