//! WebSocket frame header encoding and decoding
//!
//! Headers are read in two phases: the second byte alone determines the full
//! header size ([`FrameHeader::header_size`]), so a reader can peek two bytes,
//! wait for the rest of the header, and only then call [`FrameHeader::decode`].

use crate::{
    error::{FrameError, Result},
    protocol::{constants::MAX_PAYLOAD_LEN, frame::*, Opcode},
};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// The prefix of one WebSocket frame, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Indicates if this is the final frame in a message
    pub fin: bool,
    /// Frame opcode
    pub opcode: Opcode,
    /// Masking key, present iff the payload is masked
    pub mask_key: Option<u32>,
    /// Payload length in bytes
    pub payload_len: u64,
}

impl FrameHeader {
    /// Create an unmasked header
    pub fn new(opcode: Opcode, fin: bool, payload_len: u64) -> Self {
        Self {
            fin,
            opcode,
            mask_key: None,
            payload_len,
        }
    }

    /// Attach a masking key
    pub fn with_mask(mut self, mask_key: u32) -> Self {
        self.mask_key = Some(mask_key);
        self
    }

    /// Whether the payload following this header is masked
    pub fn is_masked(&self) -> bool {
        self.mask_key.is_some()
    }

    /// Total header size implied by the second header byte.
    ///
    /// Returns 2, 4 or 10 for the three length encodings, plus 4 when the
    /// mask bit is set.
    pub fn header_size(second_byte: u8) -> usize {
        let len_size = match second_byte & PAYLOAD_LEN_MASK {
            PAYLOAD_LEN_16 => 2 + 2,
            PAYLOAD_LEN_64 => 2 + 8,
            _ => 2,
        };
        if second_byte & MASK_BIT != 0 {
            len_size + MASKING_KEY_LEN
        } else {
            len_size
        }
    }

    /// Size this header occupies once encoded
    pub fn encoded_len(&self) -> usize {
        let len_size = if self.payload_len < PAYLOAD_LEN_16 as u64 {
            2
        } else if self.payload_len <= u16::MAX as u64 {
            4
        } else {
            10
        };
        if self.is_masked() {
            len_size + MASKING_KEY_LEN
        } else {
            len_size
        }
    }

    /// Parse a header from the start of `buf`.
    ///
    /// `buf` must hold at least [`FrameHeader::header_size`] bytes; anything
    /// past the header is ignored.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(FrameError::InsufficientData {
                needed: 2,
                have: buf.len(),
            }
            .into());
        }

        let needed = Self::header_size(buf[1]);
        if buf.len() < needed {
            return Err(FrameError::InsufficientData {
                needed,
                have: buf.len(),
            }
            .into());
        }

        let mut cursor = &buf[..needed];
        let first_byte = cursor.get_u8();
        let second_byte = cursor.get_u8();

        let fin = first_byte & FIN_BIT != 0;
        let opcode = Opcode::from_u8(first_byte & OPCODE_MASK)
            .ok_or(FrameError::InvalidOpcode(first_byte & OPCODE_MASK))?;

        let payload_len = match second_byte & PAYLOAD_LEN_MASK {
            PAYLOAD_LEN_16 => cursor.get_u16() as u64,
            PAYLOAD_LEN_64 => cursor.get_u64(),
            len => len as u64,
        };
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(FrameError::InvalidPayloadLength(payload_len).into());
        }

        let mask_key = (second_byte & MASK_BIT != 0).then(|| cursor.get_u32());

        Ok(Self {
            fin,
            opcode,
            mask_key,
            payload_len,
        })
    }

    /// Write the header using the narrowest length encoding
    pub fn write_to(&self, buf: &mut BytesMut) {
        debug_assert!(self.payload_len <= MAX_PAYLOAD_LEN);

        buf.reserve(self.encoded_len());
        buf.put_u8(((self.fin as u8) << 7) | self.opcode.value());

        let mask_bit = (self.is_masked() as u8) << 7;
        if self.payload_len < PAYLOAD_LEN_16 as u64 {
            buf.put_u8(mask_bit | self.payload_len as u8);
        } else if self.payload_len <= u16::MAX as u64 {
            buf.put_u8(mask_bit | PAYLOAD_LEN_16);
            buf.put_u16(self.payload_len as u16);
        } else {
            buf.put_u8(mask_bit | PAYLOAD_LEN_64);
            buf.put_u64(self.payload_len);
        }

        if let Some(key) = self.mask_key {
            buf.put_u32(key);
        }
    }

    /// Serialize the header to bytes
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use proptest::prelude::*;

    #[test]
    fn test_header_size_from_second_byte() {
        assert_eq!(FrameHeader::header_size(0x00), 2);
        assert_eq!(FrameHeader::header_size(125), 2);
        assert_eq!(FrameHeader::header_size(126), 4);
        assert_eq!(FrameHeader::header_size(127), 10);
        assert_eq!(FrameHeader::header_size(0x80 | 5), 6);
        assert_eq!(FrameHeader::header_size(0x80 | 126), 8);
        assert_eq!(FrameHeader::header_size(0x80 | 127), 14);
    }

    #[test]
    fn test_text_header_serialization() {
        let bytes = FrameHeader::new(Opcode::Text, true, 5).encode();
        assert_eq!(&bytes[..], &[0x81, 0x05]);

        let bytes = FrameHeader::new(Opcode::Continuation, false, 3)
            .with_mask(0x37fa_213d)
            .encode();
        assert_eq!(&bytes[..], &[0x00, 0x83, 0x37, 0xfa, 0x21, 0x3d]);
    }

    #[test]
    fn test_minimal_length_encoding() {
        let cases: [(u64, &[u8]); 6] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (125, &[0x7d]),
            (126, &[0x7e, 0x00, 0x7e]),
            (65535, &[0x7e, 0xff, 0xff]),
            (65536, &[0x7f, 0, 0, 0, 0, 0, 1, 0, 0]),
        ];

        for (len, expected_len_bytes) in cases {
            for mask_key in [None, Some(0xdead_beef)] {
                let header = FrameHeader {
                    fin: len % 2 == 0,
                    opcode: Opcode::Binary,
                    mask_key,
                    payload_len: len,
                };
                let bytes = header.encode();

                let mut expected = expected_len_bytes.to_vec();
                if mask_key.is_some() {
                    expected[0] |= MASK_BIT;
                    expected.extend_from_slice(&0xdead_beef_u32.to_be_bytes());
                }
                assert_eq!(&bytes[1..], &expected[..], "length {len}");
                assert_eq!(bytes.len(), header.encoded_len());
                assert_eq!(FrameHeader::header_size(bytes[1]), bytes.len());
                assert_eq!(FrameHeader::decode(&bytes).unwrap(), header);
            }
        }
    }

    #[test]
    fn test_decode_ignores_trailing_payload() {
        let mut buf = BytesMut::new();
        FrameHeader::new(Opcode::Ping, true, 4).write_to(&mut buf);
        buf.extend_from_slice(b"ping");

        let header = FrameHeader::decode(&buf).unwrap();
        assert_eq!(header.opcode, Opcode::Ping);
        assert_eq!(header.payload_len, 4);
        assert!(!header.is_masked());
    }

    #[test]
    fn test_decode_insufficient_data() {
        let err = FrameHeader::decode(&[0x81]).unwrap_err();
        assert!(matches!(
            err,
            Error::Frame(FrameError::InsufficientData { needed: 2, have: 1 })
        ));

        let err = FrameHeader::decode(&[0x82, 0xfe, 0x01]).unwrap_err();
        assert!(matches!(
            err,
            Error::Frame(FrameError::InsufficientData { needed: 8, have: 3 })
        ));
    }

    #[test]
    fn test_decode_rejects_reserved_opcode() {
        let err = FrameHeader::decode(&[0x83, 0x00]).unwrap_err();
        assert!(matches!(err, Error::Frame(FrameError::InvalidOpcode(0x3))));
    }

    #[test]
    fn test_decode_rejects_oversized_length() {
        let mut bytes = vec![0x82, 0x7f];
        bytes.extend_from_slice(&u64::MAX.to_be_bytes());
        let err = FrameHeader::decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::Frame(FrameError::InvalidPayloadLength(u64::MAX))
        ));
    }

    fn opcode_strategy() -> impl Strategy<Value = Opcode> {
        prop_oneof![
            Just(Opcode::Continuation),
            Just(Opcode::Text),
            Just(Opcode::Binary),
            Just(Opcode::Close),
            Just(Opcode::Ping),
            Just(Opcode::Pong),
        ]
    }

    proptest! {
        #[test]
        fn prop_header_roundtrip(
            fin in any::<bool>(),
            opcode in opcode_strategy(),
            mask_key in proptest::option::of(any::<u32>()),
            payload_len in 0..=MAX_PAYLOAD_LEN,
        ) {
            let header = FrameHeader { fin, opcode, mask_key, payload_len };
            let bytes = header.encode();
            prop_assert_eq!(FrameHeader::header_size(bytes[1]), bytes.len());
            prop_assert_eq!(FrameHeader::decode(&bytes).unwrap(), header);
        }
    }
}
