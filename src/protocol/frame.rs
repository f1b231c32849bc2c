//! Transport Framing
//!
//! Servers wrap each passive check request in a small binary header:
//!
//! ```text
//! ┌────────┬───────┬──────────────┬──────────────┬─────────────┐
//! │ "ZBXD" │ flags │ data length  │ reserved     │ payload ... │
//! │ 4 bytes│ 1 byte│ u32 LE       │ u32 LE       │             │
//! └────────┴───────┴──────────────┴──────────────┴─────────────┘
//! ```
//!
//! With the large-packet flag both length fields are u64 LE instead.
//! Older servers and tools (`echo agent.ping | nc host 10050`) send the key
//! without any header; such a request ends at the first newline or when the
//! peer closes its write half.
//!
//! Like the rest of the protocol layer, decoding is incremental:
//!
//! - `Ok(Some((payload, consumed)))` - a complete request was found
//! - `Ok(None)` - more data is needed
//! - `Err(FrameError)` - the data can never form a valid request

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Magic bytes opening every framed message
pub const HEADER: &[u8; 4] = b"ZBXD";

/// Protocol flags
pub mod flags {
    pub const PROTOCOL: u8 = 0x01;
    pub const COMPRESSED: u8 = 0x02;
    pub const LARGE: u8 = 0x04;
}

/// Header length for standard packets: magic + flags + 2 x u32
pub const STANDARD_HEADER_LEN: usize = 4 + 1 + 4 + 4;

/// Header length for large packets: magic + flags + 2 x u64
pub const LARGE_HEADER_LEN: usize = 4 + 1 + 8 + 8;

/// Maximum accepted request payload (128 KB)
pub const MAX_REQUEST_SIZE: usize = 128 * 1024;

/// Errors that can occur while decoding a request frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Protocol flag missing from the header
    #[error("unsupported protocol flags: {0:#04x}")]
    UnsupportedFlags(u8),

    /// Compressed payloads are not supported
    #[error("compressed requests are not supported")]
    CompressionUnsupported,

    /// The request exceeds the configured maximum size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: u64, max: usize },

    /// The peer closed the connection in the middle of a frame
    #[error("unexpected end of stream after {0} bytes")]
    UnexpectedEof(usize),
}

/// Result type for framing operations.
pub type FrameResult<T> = Result<T, FrameError>;

/// Incremental request decoder.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(MAX_REQUEST_SIZE)
    }
}

impl FrameDecoder {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Attempts to decode one request from `buf`.
    ///
    /// `eof` tells the decoder the peer will send nothing more, which
    /// completes an unframed request and turns a partial frame into an error.
    pub fn decode(&self, buf: &[u8], eof: bool) -> FrameResult<Option<(Bytes, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        let prefix_len = buf.len().min(HEADER.len());
        if buf[..prefix_len] == HEADER[..prefix_len] {
            if prefix_len < HEADER.len() && !eof {
                return Ok(None);
            }
            if prefix_len == HEADER.len() {
                return self.decode_framed(buf, eof);
            }
        }

        self.decode_unframed(buf, eof)
    }

    fn decode_framed(&self, buf: &[u8], eof: bool) -> FrameResult<Option<(Bytes, usize)>> {
        let incomplete = |len: usize| {
            if eof {
                Err(FrameError::UnexpectedEof(len))
            } else {
                Ok(None)
            }
        };

        if buf.len() < HEADER.len() + 1 {
            return incomplete(buf.len());
        }

        let flag = buf[HEADER.len()];
        if flag & flags::PROTOCOL == 0 {
            return Err(FrameError::UnsupportedFlags(flag));
        }
        if flag & flags::COMPRESSED != 0 {
            return Err(FrameError::CompressionUnsupported);
        }

        let large = flag & flags::LARGE != 0;
        let header_len = if large {
            LARGE_HEADER_LEN
        } else {
            STANDARD_HEADER_LEN
        };
        if buf.len() < header_len {
            return incomplete(buf.len());
        }

        let len_start = HEADER.len() + 1;
        let data_len = if large {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[len_start..len_start + 8]);
            u64::from_le_bytes(raw)
        } else {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&buf[len_start..len_start + 4]);
            u32::from_le_bytes(raw) as u64
        };

        if data_len > self.max_size as u64 {
            return Err(FrameError::MessageTooLarge {
                size: data_len,
                max: self.max_size,
            });
        }

        let total = header_len + data_len as usize;
        if buf.len() < total {
            return incomplete(buf.len());
        }

        let payload = Bytes::copy_from_slice(&buf[header_len..total]);
        Ok(Some((payload, total)))
    }

    fn decode_unframed(&self, buf: &[u8], eof: bool) -> FrameResult<Option<(Bytes, usize)>> {
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line = &buf[..pos];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            return Ok(Some((Bytes::copy_from_slice(line), pos + 1)));
        }

        if buf.len() > self.max_size {
            return Err(FrameError::MessageTooLarge {
                size: buf.len() as u64,
                max: self.max_size,
            });
        }

        if eof {
            Ok(Some((Bytes::copy_from_slice(buf), buf.len())))
        } else {
            Ok(None)
        }
    }
}

/// Wraps a response payload in a protocol header.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let large = payload.len() > u32::MAX as usize;
    let header_len = if large {
        LARGE_HEADER_LEN
    } else {
        STANDARD_HEADER_LEN
    };

    let mut buf = BytesMut::with_capacity(header_len + payload.len());
    buf.put_slice(HEADER);
    if large {
        buf.put_u8(flags::PROTOCOL | flags::LARGE);
        buf.put_u64_le(payload.len() as u64);
        buf.put_u64_le(0);
    } else {
        buf.put_u8(flags::PROTOCOL);
        buf.put_u32_le(payload.len() as u32);
        buf.put_u32_le(0);
    }
    buf.put_slice(payload);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(buf: &[u8], eof: bool) -> FrameResult<Option<(Bytes, usize)>> {
        FrameDecoder::default().decode(buf, eof)
    }

    #[test]
    fn test_encode_frame() {
        let frame = encode_frame(b"1");
        assert_eq!(&frame[..], b"ZBXD\x01\x01\x00\x00\x00\x00\x00\x00\x001");
    }

    #[test]
    fn test_decode_framed() {
        let frame = encode_frame(b"agent.ping");
        let (payload, consumed) = decode(&frame, false).unwrap().unwrap();
        assert_eq!(payload, Bytes::from_static(b"agent.ping"));
        assert_eq!(consumed, STANDARD_HEADER_LEN + 10);
    }

    #[test]
    fn test_decode_framed_incomplete() {
        let frame = encode_frame(b"agent.ping");
        assert!(decode(&frame[..2], false).unwrap().is_none());
        assert!(decode(&frame[..7], false).unwrap().is_none());
        assert!(decode(&frame[..frame.len() - 1], false).unwrap().is_none());
    }

    #[test]
    fn test_decode_framed_truncated_at_eof() {
        let frame = encode_frame(b"agent.ping");
        assert_eq!(
            decode(&frame[..frame.len() - 3], true),
            Err(FrameError::UnexpectedEof(frame.len() - 3))
        );
    }

    #[test]
    fn test_decode_large_frame() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"ZBXD");
        buf.push(flags::PROTOCOL | flags::LARGE);
        buf.extend_from_slice(&3u64.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(b"abc");

        let (payload, consumed) = decode(&buf, false).unwrap().unwrap();
        assert_eq!(payload, Bytes::from_static(b"abc"));
        assert_eq!(consumed, LARGE_HEADER_LEN + 3);
    }

    #[test]
    fn test_decode_rejects_compression() {
        let buf = b"ZBXD\x03\x01\x00\x00\x00\x01\x00\x00\x00x";
        assert_eq!(decode(buf, false), Err(FrameError::CompressionUnsupported));
    }

    #[test]
    fn test_decode_rejects_missing_protocol_flag() {
        let buf = b"ZBXD\x00\x01\x00\x00\x00\x00\x00\x00\x00x";
        assert_eq!(decode(buf, false), Err(FrameError::UnsupportedFlags(0)));
    }

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"ZBXD\x01");
        buf.extend_from_slice(&(MAX_REQUEST_SIZE as u32 + 1).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            decode(&buf, false),
            Err(FrameError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_unframed_line() {
        let (payload, consumed) = decode(b"agent.ping\r\nrest", false).unwrap().unwrap();
        assert_eq!(payload, Bytes::from_static(b"agent.ping"));
        assert_eq!(consumed, 12);
    }

    #[test]
    fn test_decode_unframed_waits_for_newline_or_eof() {
        assert!(decode(b"agent.pi", false).unwrap().is_none());

        let (payload, consumed) = decode(b"agent.ping", true).unwrap().unwrap();
        assert_eq!(payload, Bytes::from_static(b"agent.ping"));
        assert_eq!(consumed, 10);
    }

    #[test]
    fn test_decode_short_magic_prefix_at_eof_is_unframed() {
        let (payload, _) = decode(b"ZB", true).unwrap().unwrap();
        assert_eq!(payload, Bytes::from_static(b"ZB"));
    }

    #[test]
    fn test_decode_unframed_too_large() {
        let decoder = FrameDecoder::new(8);
        assert!(matches!(
            decoder.decode(b"0123456789", false),
            Err(FrameError::MessageTooLarge { size: 10, max: 8 })
        ));
    }
}
