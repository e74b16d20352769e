//! WebSocket frame codec (RFC 6455 subset).
//!
//! Stateless functions that read one frame from a byte source and
//! serialize text into a frame.
//!
//! # Wire Format
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |      (16, if len == 126)      |
//! |N|V|V|V|       |S|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |  Masking-key, if MASK set     |          Payload Data         |
//! +-------------------------------+-------------------------------+
//! ```
//!
//! # Limits
//!
//! | Length field | Meaning | Supported |
//! |--------------|---------|-----------|
//! | `0..=125` | Inline length | Yes |
//! | `126` | 16-bit extended length | Yes |
//! | `127` | 64-bit extended length | No, [`Error::UnsupportedFrameSize`] |
//!
//! Fragmentation is not supported: every frame is handled as if FIN were set.

// ============================================================================
// Imports
// ============================================================================

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Largest payload this codec reads or writes.
///
/// The ceiling is the largest value the 16-bit extended length can carry.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Payload a client sends to quit (close code 1001, "going away").
pub const CLOSE_SENTINEL: [u8; 2] = [0x03, 0xE9];

const FIN_BIT: u8 = 0b1000_0000;
const RSV_BITS: u8 = 0b0111_0000;
const OPCODE_BITS: u8 = 0b0000_1111;
const MASK_BIT: u8 = 0b1000_0000;
const LEN_BITS: u8 = 0b0111_1111;

/// Length marker for a 16-bit extended length.
const LEN_EXTENDED_16: u8 = 126;

/// Length marker for a 64-bit extended length.
const LEN_EXTENDED_64: u8 = 127;

// ============================================================================
// Opcode
// ============================================================================

/// Frame type carried in the low 4 bits of the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Continuation of a fragmented message.
    Continuation = 0x0,
    /// UTF-8 text.
    Text = 0x1,
    /// Binary data.
    Binary = 0x2,
    /// Connection close.
    Close = 0x8,
    /// Ping.
    Ping = 0x9,
    /// Pong.
    Pong = 0xA,
}

impl Opcode {
    /// Parses the 4-bit opcode, returning `None` for reserved values.
    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Self::Continuation),
            0x1 => Some(Self::Text),
            0x2 => Some(Self::Binary),
            0x8 => Some(Self::Close),
            0x9 => Some(Self::Ping),
            0xA => Some(Self::Pong),
            _ => None,
        }
    }

    /// Returns the wire value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns `true` for close, ping and pong.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }
}

// ============================================================================
// Frame
// ============================================================================

/// A single decoded frame.
///
/// `payload` is always stored unmasked. `mask` records the key the frame
/// was (or will be) masked with on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame type.
    pub opcode: Opcode,
    /// Masking key, present when the MASK bit is set.
    pub mask: Option<[u8; 4]>,
    /// Unmasked payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates an unmasked final text frame.
    #[inline]
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self {
            fin: true,
            opcode: Opcode::Text,
            mask: None,
            payload: text.as_bytes().to_vec(),
        }
    }

    /// Returns this frame with the given masking key.
    #[inline]
    #[must_use]
    pub fn masked(mut self, key: [u8; 4]) -> Self {
        self.mask = Some(key);
        self
    }

    /// Returns `true` if the MASK bit is set.
    #[inline]
    #[must_use]
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Returns the payload length in bytes.
    #[inline]
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` if the payload is the client quit sentinel.
    #[inline]
    #[must_use]
    pub fn is_close_sentinel(&self) -> bool {
        self.payload == CLOSE_SENTINEL
    }

    /// Interprets the payload as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPayload`] if the payload is not valid UTF-8.
    pub fn as_text(&self) -> Result<&str> {
        std::str::from_utf8(&self.payload)
            .map_err(|e| Error::malformed_payload(format!("payload is not UTF-8: {e}")))
    }

    /// Serializes the frame, masking the payload if a key is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFrameSize`] if the payload exceeds
    /// [`MAX_PAYLOAD_LEN`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_frame(self.fin, self.opcode, self.mask, &self.payload)
    }
}

// ============================================================================
// Decode
// ============================================================================

/// Reads exactly one frame from `reader`.
///
/// Returns `Ok(None)` when the stream ends cleanly before the first header
/// byte (peer closed). End of stream anywhere inside a frame is an
/// [`Error::Io`] with kind `UnexpectedEof`.
///
/// # Errors
///
/// - [`Error::Protocol`] if reserved bits are set or the opcode is unknown
/// - [`Error::UnsupportedFrameSize`] if the frame uses the 64-bit length
/// - [`Error::Io`] if the underlying read fails
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let first = match reader.read_u8().await {
        Ok(byte) => byte,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let second = reader.read_u8().await?;

    if first & RSV_BITS != 0 {
        return Err(Error::protocol(format!(
            "reserved bits set: {:#05b}",
            (first & RSV_BITS) >> 4
        )));
    }

    let fin = first & FIN_BIT != 0;
    let opcode = Opcode::from_u8(first & OPCODE_BITS)
        .ok_or_else(|| Error::protocol(format!("unknown opcode {:#x}", first & OPCODE_BITS)))?;
    let masked = second & MASK_BIT != 0;

    let payload_len = match second & LEN_BITS {
        LEN_EXTENDED_16 => usize::from(reader.read_u16().await?),
        // Rejected on the marker; the 8 length bytes are never read.
        LEN_EXTENDED_64 => {
            return Err(Error::unsupported_frame_size(
                MAX_PAYLOAD_LEN as u64 + 1,
                MAX_PAYLOAD_LEN,
            ));
        }
        len => usize::from(len),
    };

    let mask = if masked {
        let mut key = [0u8; 4];
        reader.read_exact(&mut key).await?;
        Some(key)
    } else {
        None
    };

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await?;

    if let Some(key) = mask {
        apply_mask(key, &mut payload);
    }

    trace!(?opcode, fin, masked, len = payload_len, "Frame decoded");

    Ok(Some(Frame {
        fin,
        opcode,
        mask,
        payload,
    }))
}

// ============================================================================
// Encode
// ============================================================================

/// Serializes `text` as a single unmasked server frame.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFrameSize`] if the UTF-8 payload exceeds
/// [`MAX_PAYLOAD_LEN`].
pub fn encode(text: &str, opcode: Opcode) -> Result<Vec<u8>> {
    encode_frame(true, opcode, None, text.as_bytes())
}

/// Serializes `text` as a text frame.
///
/// # Errors
///
/// See [`encode`].
#[inline]
pub fn encode_text(text: &str) -> Result<Vec<u8>> {
    encode(text, Opcode::Text)
}

/// XORs `data` in place with `key`, cycling every 4 bytes.
///
/// Masking and unmasking are the same operation.
#[inline]
pub fn apply_mask(key: [u8; 4], data: &mut [u8]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

fn encode_frame(
    fin: bool,
    opcode: Opcode,
    mask: Option<[u8; 4]>,
    payload: &[u8],
) -> Result<Vec<u8>> {
    let len = payload.len();
    if len > MAX_PAYLOAD_LEN {
        return Err(Error::unsupported_frame_size(len as u64, MAX_PAYLOAD_LEN));
    }

    let mut buf = Vec::with_capacity(2 + 2 + 4 + len);

    let fin_bit = if fin { FIN_BIT } else { 0 };
    buf.push(fin_bit | opcode.as_u8());

    let mask_bit = if mask.is_some() { MASK_BIT } else { 0 };
    if len < usize::from(LEN_EXTENDED_16) {
        buf.push(mask_bit | len as u8);
    } else {
        buf.push(mask_bit | LEN_EXTENDED_16);
        buf.extend_from_slice(&(len as u16).to_be_bytes());
    }

    match mask {
        Some(key) => {
            buf.extend_from_slice(&key);
            let start = buf.len();
            buf.extend_from_slice(payload);
            apply_mask(key, &mut buf[start..]);
        }
        None => buf.extend_from_slice(payload),
    }

    Ok(buf)
}

// ============================================================================
// Tests
// ============================================================================
