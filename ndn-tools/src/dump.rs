//! Indented TLV tree dump, one element per line.

use std::fmt::Write as _;

use ndn_core::tlv::{self, types, Element, EncodingError};
use ndn_core::Component;

const HEX_PREVIEW: usize = 32;

fn is_container(tlv_type: u64) -> bool {
    matches!(
        tlv_type,
        types::INTEREST
            | types::DATA
            | types::NAME
            | types::SELECTORS
            | types::META_INFO
            | types::SIGNATURE_INFO
            | types::KEY_LOCATOR
            | types::FINAL_BLOCK_ID
            | types::LP_PACKET
            | types::NACK
            | types::FRAGMENT
            | types::CONTROL_RESPONSE
            | types::CONTROL_PARAMETERS
    )
}

fn is_number(tlv_type: u64) -> bool {
    matches!(
        tlv_type,
        types::SCOPE
            | types::INTEREST_LIFETIME
            | types::MIN_SUFFIX_COMPONENTS
            | types::MAX_SUFFIX_COMPONENTS
            | types::CHILD_SELECTOR
            | types::CONTENT_TYPE
            | types::FRESHNESS_PERIOD
            | types::SIGNATURE_TYPE
            | types::NACK_REASON
            | types::STATUS_CODE
            | types::FACE_ID
            | types::COST
            | types::FLAGS
            | types::EXPIRATION_PERIOD
            | types::LOCAL_CONTROL_FEATURE
            | types::ORIGIN
    )
}

/// Dump every top-level element in `bytes`. Fails on the first malformed one.
pub fn dump(bytes: &[u8]) -> Result<String, EncodingError> {
    let mut out = String::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let (element, used) = Element::split_first(rest)?;
        write_element(&mut out, &element, 0);
        rest = &rest[used..];
    }
    Ok(out)
}

fn write_element(out: &mut String, element: &Element, depth: usize) {
    let tlv_type = element.tlv_type();
    let value = element.value();
    let _ = write!(
        out,
        "{:indent$}{} ({}) (size: {})",
        "",
        tlv_type,
        tlv::type_name(tlv_type),
        value.len(),
        indent = depth * 2
    );

    // Content often carries a nested packet or ControlResponse.
    let nested = if is_container(tlv_type) || tlv_type == types::CONTENT {
        element.children().ok().filter(|c| !c.is_empty())
    } else {
        None
    };
    if let Some(children) = nested {
        out.push('\n');
        for child in &children {
            write_element(out, child, depth + 1);
        }
        return;
    }

    if tlv_type == types::NAME_COMPONENT {
        let _ = write!(out, " {}", Component::new(value).to_escaped());
    } else if tlv_type == types::STATUS_TEXT || tlv_type == types::URI {
        let _ = write!(out, " {:?}", String::from_utf8_lossy(value));
    } else if is_number(tlv_type) {
        match element.as_non_negative_integer() {
            Ok(n) => {
                let _ = write!(out, " {n}");
            }
            Err(_) => write_hex(out, value),
        }
    } else if !value.is_empty() {
        write_hex(out, value);
    }
    out.push('\n');
}

fn write_hex(out: &mut String, value: &[u8]) {
    out.push(' ');
    for byte in value.iter().take(HEX_PREVIEW) {
        let _ = write!(out, "{byte:02x}");
    }
    if value.len() > HEX_PREVIEW {
        out.push_str("...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndn_core::mgmt::{ControlParameters, ControlResponse};
    use ndn_core::{Data, Interest, Name};
    use std::time::Duration;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    #[test]
    fn dumps_interest_tree() {
        let interest = Interest::new(name("/a/b%20c"))
            .with_nonce(0x0102_0304)
            .with_lifetime(Duration::from_millis(1000));
        let text = dump(&interest.encode()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("5 (Interest)"));
        assert!(lines[1].starts_with("  7 (Name) (size: 8)"));
        assert_eq!(lines[2], "    8 (NameComponent) (size: 1) a");
        assert_eq!(lines[3], "    8 (NameComponent) (size: 3) b%20c");
        assert_eq!(lines[4], "  10 (Nonce) (size: 4) 01020304");
        assert_eq!(lines[5], "  12 (InterestLifetime) (size: 2) 1000");
    }

    #[test]
    fn descends_into_control_response_content() {
        let body = ControlParameters::new().with_name(name("/p")).with_face_id(7);
        let response = ControlResponse::new(200, "OK").with_body(body.to_element());
        let data = Data::new(name("/r")).with_content(response.encode());
        let text = dump(&data.encode()).unwrap();
        assert!(text.contains("    101 (ControlResponse)"));
        assert!(text.contains("      102 (StatusCode) (size: 1) 200"));
        assert!(text.contains("      103 (StatusText) (size: 2) \"OK\""));
        assert!(text.contains("        105 (FaceId) (size: 1) 7"));
    }

    #[test]
    fn opaque_content_is_hex() {
        let data = Data::new(name("/r")).with_content(vec![0xff; 40]);
        let text = dump(&data.encode()).unwrap();
        let expected = format!("  21 (Content) (size: 40) {}...", "ff".repeat(32));
        assert!(text.lines().any(|l| l == expected), "{text}");
    }

    #[test]
    fn several_top_level_elements() {
        let mut bytes = Interest::new(name("/x")).encode();
        bytes.extend(Interest::new(name("/y")).encode());
        let text = dump(&bytes).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("5 ")).count(), 2);
    }

    #[test]
    fn truncated_input_fails() {
        let bytes = Interest::new(name("/x")).encode();
        assert!(dump(&bytes[..bytes.len() - 1]).is_err());
    }
}
