//! Stream framing: split a byte stream into top-level TLV elements.

use crate::tlv::{self, EncodingError};

/// Largest element accepted from a stream (NDN packets are bounded by 8800 bytes;
/// leave headroom for link-layer wrapping).
pub const MAX_ELEMENT_LEN: usize = 16 * 1024;

/// Decode one element from the front of `bytes`. Returns the raw element wire
/// and the number of bytes consumed.
/// Call with a partial buffer; returns `NeedMore` until the element is complete.
pub fn decode_element(bytes: &[u8]) -> Result<(Vec<u8>, usize), FrameDecodeError> {
    let (_, length, header_len) = match tlv::read_header(bytes) {
        Ok(header) => header,
        Err(EncodingError::Truncated) => return Err(FrameDecodeError::NeedMore),
        Err(e) => return Err(FrameDecodeError::Malformed(e)),
    };
    let total = header_len.saturating_add(length);
    if total > MAX_ELEMENT_LEN {
        return Err(FrameDecodeError::TooLarge(total));
    }
    if bytes.len() < total {
        return Err(FrameDecodeError::NeedMore);
    }
    Ok((bytes[..total].to_vec(), total))
}

/// Error decoding a frame (need more bytes, too large, or malformed header).
#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("need more bytes")]
    NeedMore,
    #[error("element of {0} bytes exceeds limit")]
    TooLarge(usize),
    #[error("malformed element header: {0}")]
    Malformed(EncodingError),
}

/// Accumulates stream reads and yields complete elements in arrival order.
#[derive(Debug, Default)]
pub struct ElementBuffer {
    buf: Vec<u8>,
}

impl ElementBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete element, or `None` if more bytes are needed.
    /// A framing error is unrecoverable for the stream.
    pub fn next_element(&mut self) -> Result<Option<Vec<u8>>, FrameDecodeError> {
        match decode_element(&self.buf) {
            Ok((element, consumed)) => {
                self.buf.drain(..consumed);
                Ok(Some(element))
            }
            Err(FrameDecodeError::NeedMore) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
