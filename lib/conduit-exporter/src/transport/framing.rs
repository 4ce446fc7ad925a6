//! gRPC length-prefixed message framing.
//!
//! Every message on a gRPC stream is preceded by a one-byte compressed flag and its length as a big-endian `u32`.

use bytes::{BufMut as _, Bytes, BytesMut};

/// Size of the frame header.
pub const HEADER_LEN: usize = 5;

/// Frames a single message.
///
/// `compressed` must be set if, and only if, `message` was compressed with the encoding named in `grpc-encoding`.
pub fn encode_frame(message: &[u8], compressed: bool) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + message.len());
    buf.put_u8(u8::from(compressed));
    buf.put_u32(message.len() as u32);
    buf.put_slice(message);
    buf.freeze()
}

/// A decoded frame.
#[derive(Debug, Eq, PartialEq)]
pub struct Frame<'a> {
    /// Whether the message is compressed.
    pub compressed: bool,

    /// The message.
    pub message: &'a [u8],
}

/// Decodes the first frame in `data`.
///
/// Returns `None` if `data` is shorter than the frame header or the length it announces.
pub fn decode_frame(data: &[u8]) -> Option<Frame<'_>> {
    let (header, rest) = data.split_first_chunk::<HEADER_LEN>()?;
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    let message = rest.get(..len)?;
    Some(Frame {
        compressed: header[0] == 1,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let frame = encode_frame(b"hello", true);
        assert_eq!(&frame[..], &[1, 0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o']);

        let decoded = decode_frame(&frame).unwrap();
        assert!(decoded.compressed);
        assert_eq!(decoded.message, b"hello");
    }

    #[test]
    fn truncated_frames_are_rejected() {
        assert_eq!(decode_frame(&[0, 0, 0]), None);
        assert_eq!(decode_frame(&[0, 0, 0, 0, 4, 1, 2]), None);
        assert_eq!(
            decode_frame(&[0, 0, 0, 0, 0]),
            Some(Frame {
                compressed: false,
                message: &[]
            })
        );
    }
}
