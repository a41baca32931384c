use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use vantage_core::error::VantageError;

/// Opening header marker
pub const LHEADER: &[u8] = b"vpts{";

/// Closing header marker
pub const RHEADER: &[u8] = b"}vpts";

/// The only header field
pub const LENGTH_FIELD: &[u8] = b"length";

/// Separates the field name from its value
pub const FIELD_SEP: u8 = b'=';

/// Longest header accepted before the closing marker must appear.
///
/// `vpts{length=` + 20 digits + `}vpts` is 37 bytes.
pub const MAX_HEADER_LEN: usize = 64;

/// Upper bound on payload capacity reserved up front from a declared length.
const MAX_PREALLOC: usize = 64 * 1024;

/// Framing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("missing message header")]
    MissingHeader,

    #[error("failed to read message header: {0}")]
    BadHeader(String),

    #[error("message header longer than {MAX_HEADER_LEN} bytes")]
    HeaderTooLong,

    #[error("frame too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    #[error("stream closed before message header")]
    ClosedBeforeHeader,

    #[error("stream closed after {received} of {expected} payload bytes")]
    Truncated { expected: usize, received: usize },
}

impl From<FrameError> for VantageError {
    fn from(e: FrameError) -> Self {
        Self::protocol(e.to_string())
    }
}

/// Result type alias for framing operations
pub type Result<T> = std::result::Result<T, FrameError>;

/// Encode only the header for a payload of `len` bytes.
pub fn encode_header(len: usize) -> Bytes {
    let digits = len.to_string();
    let mut out =
        BytesMut::with_capacity(LHEADER.len() + LENGTH_FIELD.len() + 1 + digits.len() + RHEADER.len());

    out.extend_from_slice(LHEADER);
    out.extend_from_slice(LENGTH_FIELD);
    out.put_u8(FIELD_SEP);
    out.extend_from_slice(digits.as_bytes());
    out.extend_from_slice(RHEADER);
    out.freeze()
}

/// Encode a complete frame (header + payload).
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let header = encode_header(payload.len());
    let mut out = BytesMut::with_capacity(header.len() + payload.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(payload);
    out.freeze()
}

/// Stateful frame decoder
///
/// The frame must start the input: any byte before `vpts{` is a
/// [`FrameError::MissingHeader`], as soon as it arrives. Leading noise is
/// never skipped.
///
/// Header phase: the accumulated input is re-scanned from the start on
/// every call, so markers split across reads are found once the rest
/// arrives.
///
/// Payload phase: bytes are moved into a staging buffer until the declared
/// length is reached. Anything after the payload is left in `src`.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    max_len: Option<usize>,
    expected: Option<usize>,
    payload: BytesMut,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject frames declaring more than `max` payload bytes.
    #[must_use]
    pub fn with_max_len(mut self, max: Option<usize>) -> Self {
        self.max_len = max;
        self
    }

    /// Declared payload length, once the header has been parsed.
    #[must_use]
    pub const fn expected_len(&self) -> Option<usize> {
        self.expected
    }

    /// Payload bytes buffered so far.
    #[must_use]
    pub fn received_len(&self) -> usize {
        self.payload.len()
    }

    /// Decode a single frame from `src`
    ///
    /// Returns:
    /// - Ok(Some(payload)) → frame complete
    /// - Ok(None) → need more data
    /// - Err → protocol violation
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        // === Header parsing ===
        let expected = match self.expected {
            Some(n) => n,
            None => {
                let Some(n) = self.parse_header(src)? else {
                    return Ok(None);
                };
                self.expected = Some(n);
                self.payload = BytesMut::with_capacity(n.min(MAX_PREALLOC));
                n
            }
        };

        // === Payload accumulation ===
        let needed = expected - self.payload.len();
        let take = needed.min(src.len());
        self.payload.extend_from_slice(&src[..take]);
        src.advance(take);

        if self.payload.len() < expected {
            return Ok(None);
        }

        self.expected = None;
        Ok(Some(self.payload.split().freeze()))
    }

    /// The error to report when the stream ends before a frame completes.
    #[must_use]
    pub fn eof_error(&self) -> FrameError {
        match self.expected {
            None => FrameError::ClosedBeforeHeader,
            Some(expected) => FrameError::Truncated {
                expected,
                received: self.payload.len(),
            },
        }
    }

    fn parse_header(&self, src: &mut BytesMut) -> Result<Option<usize>> {
        let prefix = src.len().min(LHEADER.len());
        if src[..prefix] != LHEADER[..prefix] {
            return Err(FrameError::MissingHeader);
        }
        if src.len() < LHEADER.len() {
            return Ok(None);
        }

        let window = &src[LHEADER.len()..src.len().min(MAX_HEADER_LEN)];
        let Some(stop) = find(window, RHEADER) else {
            if src.len() >= MAX_HEADER_LEN {
                return Err(FrameError::HeaderTooLong);
            }
            return Ok(None);
        };

        let len = parse_length(&window[..stop])?;
        if let Some(max) = self.max_len {
            if len > max {
                return Err(FrameError::TooLarge { size: len, max });
            }
        }

        src.advance(LHEADER.len() + stop + RHEADER.len());
        Ok(Some(len))
    }
}

/// Parse `length=<decimal>` from the bytes between the markers.
fn parse_length(field: &[u8]) -> Result<usize> {
    let bad = || FrameError::BadHeader(String::from_utf8_lossy(field).into_owned());

    let sep = field.iter().position(|&b| b == FIELD_SEP).ok_or_else(bad)?;
    if &field[..sep] != LENGTH_FIELD {
        return Err(bad());
    }

    let digits = &field[sep + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(bad());
    }

    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(bad)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
