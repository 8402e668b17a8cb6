//! ControlParameters: arguments and results of forwarder management commands.

use std::fmt;
use std::time::Duration;

use crate::name::Name;
use crate::protocol::duration_millis;
use crate::tlv::{types, Element, EncodingError};

/// Route flag: the route also applies to longer prefixes.
pub const ROUTE_FLAG_CHILD_INHERIT: u64 = 1;
/// Route flag: the route captures the namespace.
pub const ROUTE_FLAG_CAPTURE: u64 = 2;

/// Route origin of routes registered by applications.
pub const ROUTE_ORIGIN_APP: u64 = 0;

/// One ControlParameters field, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    FaceId,
    Uri,
    LocalControlFeature,
    Origin,
    Cost,
    Flags,
    Strategy,
    ExpirationPeriod,
}

impl Field {
    pub fn tlv_type(self) -> u64 {
        match self {
            Field::Name => types::NAME,
            Field::FaceId => types::FACE_ID,
            Field::Uri => types::URI,
            Field::LocalControlFeature => types::LOCAL_CONTROL_FEATURE,
            Field::Origin => types::ORIGIN,
            Field::Cost => types::COST,
            Field::Flags => types::FLAGS,
            Field::Strategy => types::STRATEGY,
            Field::ExpirationPeriod => types::EXPIRATION_PERIOD,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Field::Name => "Name",
            Field::FaceId => "FaceId",
            Field::Uri => "Uri",
            Field::LocalControlFeature => "LocalControlFeature",
            Field::Origin => "Origin",
            Field::Cost => "Cost",
            Field::Flags => "Flags",
            Field::Strategy => "Strategy",
            Field::ExpirationPeriod => "ExpirationPeriod",
        };
        f.write_str(label)
    }
}

pub const ALL_FIELDS: [Field; 9] = [
    Field::Name,
    Field::FaceId,
    Field::Uri,
    Field::LocalControlFeature,
    Field::Origin,
    Field::Cost,
    Field::Flags,
    Field::Strategy,
    Field::ExpirationPeriod,
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlParameters {
    pub name: Option<Name>,
    pub face_id: Option<u64>,
    pub uri: Option<String>,
    pub local_control_feature: Option<u64>,
    pub origin: Option<u64>,
    pub cost: Option<u64>,
    pub flags: Option<u64>,
    pub strategy: Option<Name>,
    pub expiration_period: Option<Duration>,
}

impl ControlParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: Name) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_face_id(mut self, face_id: u64) -> Self {
        self.face_id = Some(face_id);
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_origin(mut self, origin: u64) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn with_strategy(mut self, strategy: Name) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_expiration_period(mut self, period: Duration) -> Self {
        self.expiration_period = Some(period);
        self
    }

    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::Name => self.name.is_some(),
            Field::FaceId => self.face_id.is_some(),
            Field::Uri => self.uri.is_some(),
            Field::LocalControlFeature => self.local_control_feature.is_some(),
            Field::Origin => self.origin.is_some(),
            Field::Cost => self.cost.is_some(),
            Field::Flags => self.flags.is_some(),
            Field::Strategy => self.strategy.is_some(),
            Field::ExpirationPeriod => self.expiration_period.is_some(),
        }
    }

    pub fn to_element(&self) -> Element {
        let mut children = Vec::new();
        if let Some(name) = &self.name {
            children.push(name.to_element());
        }
        push_number(&mut children, types::FACE_ID, self.face_id);
        if let Some(uri) = &self.uri {
            children.push(Element::new(types::URI, uri.as_bytes().to_vec()));
        }
        push_number(&mut children, types::LOCAL_CONTROL_FEATURE, self.local_control_feature);
        push_number(&mut children, types::ORIGIN, self.origin);
        push_number(&mut children, types::COST, self.cost);
        push_number(&mut children, types::FLAGS, self.flags);
        if let Some(strategy) = &self.strategy {
            children.push(Element::nested(types::STRATEGY, [&strategy.to_element()]));
        }
        if let Some(period) = self.expiration_period {
            children.push(Element::non_negative_integer(
                types::EXPIRATION_PERIOD,
                duration_millis(period),
            ));
        }
        Element::nested(types::CONTROL_PARAMETERS, &children)
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_element().encode()
    }

    pub fn from_element(element: &Element) -> Result<Self, EncodingError> {
        if element.tlv_type() != types::CONTROL_PARAMETERS {
            return Err(EncodingError::UnexpectedType {
                expected: types::CONTROL_PARAMETERS,
                actual: element.tlv_type(),
            });
        }
        let mut params = Self::default();
        for child in element.children()? {
            match child.tlv_type() {
                types::NAME => params.name = Some(Name::from_element(child)?),
                types::FACE_ID => params.face_id = Some(child.as_non_negative_integer()?),
                types::URI => {
                    let uri = String::from_utf8(child.into_value()).map_err(|_| {
                        EncodingError::Invalid {
                            what: "Uri",
                            reason: "not UTF-8",
                        }
                    })?;
                    params.uri = Some(uri);
                }
                types::LOCAL_CONTROL_FEATURE => {
                    params.local_control_feature = Some(child.as_non_negative_integer()?)
                }
                types::ORIGIN => params.origin = Some(child.as_non_negative_integer()?),
                types::COST => params.cost = Some(child.as_non_negative_integer()?),
                types::FLAGS => params.flags = Some(child.as_non_negative_integer()?),
                types::STRATEGY => {
                    params.strategy = Some(Name::from_element(Element::parse(child.value())?)?)
                }
                types::EXPIRATION_PERIOD => {
                    params.expiration_period =
                        Some(Duration::from_millis(child.as_non_negative_integer()?))
                }
                _ => {}
            }
        }
        Ok(params)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EncodingError> {
        Self::from_element(&Element::parse(bytes)?)
    }
}

fn push_number(children: &mut Vec<Element>, tlv_type: u64, value: Option<u64>) {
    if let Some(value) = value {
        children.push(Element::non_negative_integer(tlv_type, value));
    }
}

impl fmt::Display for ControlParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ControlParameters(")?;
        if let Some(name) = &self.name {
            write!(f, "Name: {name}, ")?;
        }
        if let Some(face_id) = self.face_id {
            write!(f, "FaceId: {face_id}, ")?;
        }
        if let Some(uri) = &self.uri {
            write!(f, "Uri: {uri}, ")?;
        }
        if let Some(feature) = self.local_control_feature {
            write!(f, "LocalControlFeature: {feature}, ")?;
        }
        if let Some(origin) = self.origin {
            write!(f, "Origin: {origin}, ")?;
        }
        if let Some(cost) = self.cost {
            write!(f, "Cost: {cost}, ")?;
        }
        if let Some(flags) = self.flags {
            write!(f, "Flags: {flags:#x}, ")?;
        }
        if let Some(strategy) = &self.strategy {
            write!(f, "Strategy: {strategy}, ")?;
        }
        if let Some(period) = self.expiration_period {
            write!(f, "ExpirationPeriod: {}ms, ", period.as_millis())?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_roundtrip_in_wire_order() {
        let params = ControlParameters::new()
            .with_name("/a/b".parse().unwrap())
            .with_face_id(7)
            .with_uri("udp4://192.0.2.1:6363")
            .with_origin(ROUTE_ORIGIN_APP)
            .with_cost(10)
            .with_flags(ROUTE_FLAG_CHILD_INHERIT | ROUTE_FLAG_CAPTURE)
            .with_strategy("/localhost/nfd/strategy/best-route".parse().unwrap())
            .with_expiration_period(Duration::from_secs(30));
        let element = params.to_element();
        let order: Vec<u64> = element.children().unwrap().iter().map(Element::tlv_type).collect();
        assert_eq!(
            order,
            vec![
                types::NAME,
                types::FACE_ID,
                types::URI,
                types::ORIGIN,
                types::COST,
                types::FLAGS,
                types::STRATEGY,
                types::EXPIRATION_PERIOD
            ]
        );
        assert_eq!(ControlParameters::decode(&params.encode()).unwrap(), params);
    }

    #[test]
    fn empty_parameters() {
        let params = ControlParameters::new();
        assert_eq!(params.encode(), vec![104, 0]);
        assert!(ALL_FIELDS.iter().all(|&f| !params.has(f)));
    }

    #[test]
    fn wrong_outer_type_rejected() {
        let wire = Element::new(types::CONTROL_RESPONSE, Vec::new()).encode();
        assert!(ControlParameters::decode(&wire).is_err());
    }

    #[test]
    fn display_lists_present_fields() {
        let params = ControlParameters::new()
            .with_name("/p".parse().unwrap())
            .with_face_id(3);
        assert_eq!(params.to_string(), "ControlParameters(Name: /p, FaceId: 3, )");
    }
}
