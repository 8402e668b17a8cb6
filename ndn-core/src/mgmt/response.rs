//! ControlResponse envelope.

use crate::tlv::{types, Element, EncodingError};

/// Status code, status text and an optional body element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlResponse {
    pub code: u32,
    pub text: String,
    pub body: Option<Element>,
}

impl ControlResponse {
    pub fn new(code: u32, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Element) -> Self {
        self.body = Some(body);
        self
    }

    pub fn to_element(&self) -> Element {
        let mut children = vec![
            Element::non_negative_integer(types::STATUS_CODE, u64::from(self.code)),
            Element::new(types::STATUS_TEXT, self.text.as_bytes().to_vec()),
        ];
        children.extend(self.body.iter().cloned());
        Element::nested(types::CONTROL_RESPONSE, &children)
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_element().encode()
    }

    /// StatusCode and StatusText are required; the first other child is the body.
    pub fn from_element(element: &Element) -> Result<Self, EncodingError> {
        if element.tlv_type() != types::CONTROL_RESPONSE {
            return Err(EncodingError::UnexpectedType {
                expected: types::CONTROL_RESPONSE,
                actual: element.tlv_type(),
            });
        }
        let mut code = None;
        let mut text = None;
        let mut body = None;
        for child in element.children()? {
            match child.tlv_type() {
                types::STATUS_CODE => {
                    let value = child.as_non_negative_integer()?;
                    code = Some(u32::try_from(value).map_err(|_| EncodingError::Invalid {
                        what: "StatusCode",
                        reason: "out of range",
                    })?);
                }
                types::STATUS_TEXT => {
                    text = Some(String::from_utf8_lossy(child.value()).into_owned());
                }
                _ if body.is_none() => body = Some(child),
                _ => {}
            }
        }
        Ok(Self {
            code: code.ok_or(EncodingError::MissingElement(types::STATUS_CODE))?,
            text: text.ok_or(EncodingError::MissingElement(types::STATUS_TEXT))?,
            body,
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EncodingError> {
        Self::from_element(&Element::parse(bytes)?)
    }
}
