#![deny(unsafe_code)]

//! Length-delimited framing for the kestrel IPC channel.
//!
//! Each frame on the wire is a varint-encoded byte length followed by exactly
//! that many bytes of protobuf-serialized payload. Framing is symmetric
//! between client and runtime, and the codec never interprets message
//! contents.
//!
//! Decoding is bounded-buffer safe: a frame whose length prefix or payload is
//! not fully buffered yet reports [`CodecError::PartialMessage`] and leaves
//! the caller's offset untouched, so a reader can retry after the next read.

use std::fmt;

use bytes::{BufMut, BytesMut};
use prost::Message;

/// Maximum varint length in bytes. A length prefix whose continuation bit is
/// still set after this many bytes is malformed, not partial.
pub const MAX_VARINT_LEN: usize = 10;

/// Errors surfaced by [`decode_delimited`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ends before the frame does. Not an error state: the caller
    /// should keep the unconsumed tail and retry once more bytes arrive.
    PartialMessage,
    /// The frame can never parse: oversized varint or an undecodable payload.
    Malformed(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::PartialMessage => write!(f, "partial message, more bytes required"),
            CodecError::Malformed(msg) => write!(f, "malformed frame: {}", msg),
        }
    }
}

impl std::error::Error for CodecError {}

/// Encode a u64 as a varint into `buf`, returning the number of bytes written.
fn encode_varint(mut value: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf[i] = byte;
            return i + 1;
        } else {
            buf[i] = byte | 0x80;
            i += 1;
        }
    }
}

/// Read a varint from `buf` starting at `offset`.
///
/// Returns the value and the number of prefix bytes consumed.
fn decode_varint_at(buf: &[u8], offset: usize) -> Result<(u64, usize), CodecError> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;

    for i in 0..MAX_VARINT_LEN {
        let Some(&byte) = buf.get(offset + i) else {
            return Err(CodecError::PartialMessage);
        };
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }

    Err(CodecError::Malformed(
        "length prefix exceeded 10 bytes".to_string(),
    ))
}

/// Append one framed message to `buf`: varint length prefix, then the
/// serialized payload. Appends only; never flushes.
pub fn encode_delimited<M: Message>(buf: &mut BytesMut, msg: &M) {
    let len = msg.encoded_len();
    let mut prefix = [0u8; MAX_VARINT_LEN];
    let prefix_len = encode_varint(len as u64, &mut prefix);

    buf.reserve(prefix_len + len);
    buf.put_slice(&prefix[..prefix_len]);
    msg.encode_raw(buf);
}

/// Decode one framed message from `buf` at `offset`.
///
/// On success returns the message and the new offset just past its payload.
/// [`CodecError::PartialMessage`] means the frame is incomplete; the caller
/// must not advance its buffer state.
pub fn decode_delimited<M: Message + Default>(
    buf: &[u8],
    offset: usize,
) -> Result<(M, usize), CodecError> {
    let (len, prefix_len) = decode_varint_at(buf, offset)?;
    let start = offset + prefix_len;
    let end = start
        .checked_add(len as usize)
        .ok_or_else(|| CodecError::Malformed("length prefix overflows usize".to_string()))?;
    if end > buf.len() {
        return Err(CodecError::PartialMessage);
    }

    let msg = M::decode(&buf[start..end]).map_err(|e| CodecError::Malformed(e.to_string()))?;
    Ok((msg, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal stand-in message so the codec tests stay independent of the
    /// real wire types.
    #[derive(Clone, PartialEq, ::prost::Message)]
    struct Probe {
        #[prost(uint32, tag = "1")]
        id: u32,
        #[prost(bytes = "vec", tag = "2")]
        payload: Vec<u8>,
    }

    fn probe(id: u32, payload: &[u8]) -> Probe {
        Probe {
            id,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn roundtrip_single_message() {
        let msg = probe(42, b"hello");
        let mut buf = BytesMut::new();
        encode_delimited(&mut buf, &msg);

        let (decoded, offset) = decode_delimited::<Probe>(&buf, 0).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(offset, buf.len());
    }

    #[test]
    fn roundtrip_back_to_back_messages() {
        let msgs = [probe(1, b"a"), probe(2, b"bb"), probe(3, b"ccc")];
        let mut buf = BytesMut::new();
        for m in &msgs {
            encode_delimited(&mut buf, m);
        }

        let mut offset = 0;
        for expected in &msgs {
            let (decoded, next) = decode_delimited::<Probe>(&buf, offset).unwrap();
            assert_eq!(&decoded, expected);
            assert!(next > offset);
            offset = next;
        }
        assert_eq!(offset, buf.len());
    }

    #[test]
    fn empty_buffer_is_partial() {
        assert_eq!(
            decode_delimited::<Probe>(&[], 0).unwrap_err(),
            CodecError::PartialMessage
        );
    }

    #[test]
    fn truncated_payload_is_partial() {
        let msg = probe(7, &[0xAB; 64]);
        let mut buf = BytesMut::new();
        encode_delimited(&mut buf, &msg);

        for cut in 0..buf.len() {
            assert_eq!(
                decode_delimited::<Probe>(&buf[..cut], 0).unwrap_err(),
                CodecError::PartialMessage,
                "cut at {cut} should be partial"
            );
        }
    }

    #[test]
    fn partial_does_not_depend_on_offset_advancing() {
        // A complete frame followed by half of another: the first decodes,
        // the second reports partial at the first frame's end offset.
        let mut buf = BytesMut::new();
        encode_delimited(&mut buf, &probe(1, b"full"));
        let boundary = buf.len();
        encode_delimited(&mut buf, &probe(2, b"truncated"));
        let cut = buf.len() - 3;

        let (first, offset) = decode_delimited::<Probe>(&buf[..cut], 0).unwrap();
        assert_eq!(first, probe(1, b"full"));
        assert_eq!(offset, boundary);
        assert_eq!(
            decode_delimited::<Probe>(&buf[..cut], offset).unwrap_err(),
            CodecError::PartialMessage
        );
    }

    #[test]
    fn oversized_varint_is_malformed() {
        // Eleven continuation bytes: can never terminate within the cap.
        let buf = [0x80u8; 11];
        match decode_delimited::<Probe>(&buf, 0) {
            Err(CodecError::Malformed(msg)) => assert!(msg.contains("10 bytes")),
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn garbage_payload_is_malformed() {
        // Valid prefix declaring 3 bytes, followed by bytes that do not
        // decode as the probe message (field 1 wire-type mismatch).
        let buf = [0x03u8, 0x0D, 0xFF, 0xFF];
        assert!(matches!(
            decode_delimited::<Probe>(&buf, 0),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn large_payload_roundtrip() {
        let msg = probe(9, &vec![0x5A; 300_000]);
        let mut buf = BytesMut::new();
        encode_delimited(&mut buf, &msg);

        // Length prefix for a ~300KB frame takes 3 varint bytes.
        assert!(buf.len() > 300_000);
        let (decoded, offset) = decode_delimited::<Probe>(&buf, 0).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(offset, buf.len());
    }
}
