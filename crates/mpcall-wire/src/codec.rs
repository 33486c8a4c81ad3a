use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::{Result, WireError};
use crate::value::{Integer, WireValue};

/// Default maximum size of one encoded message: 16 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default maximum container nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Configuration for the MessagePack codec and message I/O.
#[derive(Debug, Clone)]
pub struct WireConfig {
    /// Maximum encoded message size in bytes. Default: 16 MiB.
    pub max_message_size: usize,
    /// Maximum array/map nesting depth. Default: 64.
    pub max_depth: usize,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Encode a value in its smallest MessagePack form.
pub fn encode_value(value: &WireValue, dst: &mut BytesMut) -> Result<()> {
    match value {
        WireValue::Nil => dst.put_u8(0xc0),
        WireValue::Boolean(false) => dst.put_u8(0xc2),
        WireValue::Boolean(true) => dst.put_u8(0xc3),
        WireValue::Integer(int) => encode_integer(*int, dst),
        WireValue::F32(v) => {
            dst.put_u8(0xca);
            dst.put_f32(*v);
        }
        WireValue::F64(v) => {
            dst.put_u8(0xcb);
            dst.put_f64(*v);
        }
        WireValue::String(s) => {
            let len = checked_len(s.len())?;
            match len {
                0..=31 => dst.put_u8(0xa0 | len as u8),
                32..=0xff => {
                    dst.put_u8(0xd9);
                    dst.put_u8(len as u8);
                }
                0x100..=0xffff => {
                    dst.put_u8(0xda);
                    dst.put_u16(len as u16);
                }
                _ => {
                    dst.put_u8(0xdb);
                    dst.put_u32(len);
                }
            }
            dst.put_slice(s.as_bytes());
        }
        WireValue::Binary(b) => {
            let len = checked_len(b.len())?;
            match len {
                0..=0xff => {
                    dst.put_u8(0xc4);
                    dst.put_u8(len as u8);
                }
                0x100..=0xffff => {
                    dst.put_u8(0xc5);
                    dst.put_u16(len as u16);
                }
                _ => {
                    dst.put_u8(0xc6);
                    dst.put_u32(len);
                }
            }
            dst.put_slice(b);
        }
        WireValue::Array(items) => {
            let len = checked_len(items.len())?;
            match len {
                0..=15 => dst.put_u8(0x90 | len as u8),
                16..=0xffff => {
                    dst.put_u8(0xdc);
                    dst.put_u16(len as u16);
                }
                _ => {
                    dst.put_u8(0xdd);
                    dst.put_u32(len);
                }
            }
            for item in items {
                encode_value(item, dst)?;
            }
        }
        WireValue::Map(entries) => {
            let len = checked_len(entries.len())?;
            match len {
                0..=15 => dst.put_u8(0x80 | len as u8),
                16..=0xffff => {
                    dst.put_u8(0xde);
                    dst.put_u16(len as u16);
                }
                _ => {
                    dst.put_u8(0xdf);
                    dst.put_u32(len);
                }
            }
            for (key, value) in entries {
                encode_value(key, dst)?;
                encode_value(value, dst)?;
            }
        }
        WireValue::Ext(ty, data) => {
            let len = checked_len(data.len())?;
            match len {
                1 => dst.put_u8(0xd4),
                2 => dst.put_u8(0xd5),
                4 => dst.put_u8(0xd6),
                8 => dst.put_u8(0xd7),
                16 => dst.put_u8(0xd8),
                0..=0xff => {
                    dst.put_u8(0xc7);
                    dst.put_u8(len as u8);
                }
                0x100..=0xffff => {
                    dst.put_u8(0xc8);
                    dst.put_u16(len as u16);
                }
                _ => {
                    dst.put_u8(0xc9);
                    dst.put_u32(len);
                }
            }
            dst.put_i8(*ty);
            dst.put_slice(data);
        }
    }
    Ok(())
}

fn encode_integer(int: Integer, dst: &mut BytesMut) {
    if let Some(v) = int.as_u64() {
        match v {
            0..=0x7f => dst.put_u8(v as u8),
            0x80..=0xff => {
                dst.put_u8(0xcc);
                dst.put_u8(v as u8);
            }
            0x100..=0xffff => {
                dst.put_u8(0xcd);
                dst.put_u16(v as u16);
            }
            0x1_0000..=0xffff_ffff => {
                dst.put_u8(0xce);
                dst.put_u32(v as u32);
            }
            _ => {
                dst.put_u8(0xcf);
                dst.put_u64(v);
            }
        }
        return;
    }

    // Negative: as_i64 always succeeds for the negative form.
    let v = int.as_i64().unwrap_or(i64::MIN);
    if v >= -32 {
        dst.put_i8(v as i8);
    } else if v >= i64::from(i8::MIN) {
        dst.put_u8(0xd0);
        dst.put_i8(v as i8);
    } else if v >= i64::from(i16::MIN) {
        dst.put_u8(0xd1);
        dst.put_i16(v as i16);
    } else if v >= i64::from(i32::MIN) {
        dst.put_u8(0xd2);
        dst.put_i32(v as i32);
    } else {
        dst.put_u8(0xd3);
        dst.put_i64(v);
    }
}

fn checked_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| WireError::TooLarge {
        size: len,
        max: u32::MAX as usize,
    })
}

/// Encode a value into a fresh byte vector.
pub fn to_vec(value: &WireValue) -> Result<Vec<u8>> {
    let mut buf = BytesMut::new();
    encode_value(value, &mut buf)?;
    Ok(buf.to_vec())
}

/// Decode one value from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete value yet.
/// On success, consumes the value's bytes from the buffer.
pub fn decode_value(src: &mut BytesMut, config: &WireConfig) -> Result<Option<WireValue>> {
    decode_next(&mut Scanner::default(), src, config)
}

/// Decode with a scanner that remembers how far earlier calls got, so a
/// value arriving in many chunks is walked once rather than once per chunk.
///
/// Nothing is allocated until the scanner has seen the whole value.
pub(crate) fn decode_next(
    scanner: &mut Scanner,
    src: &mut BytesMut,
    config: &WireConfig,
) -> Result<Option<WireValue>> {
    let end = match scanner.scan(src, config) {
        Ok(Some(end)) => end,
        Ok(None) => {
            if src.len() > config.max_message_size {
                debug!(
                    buffered = src.len(),
                    max = config.max_message_size,
                    "incomplete value exceeds message size limit"
                );
                scanner.reset();
                return Err(WireError::TooLarge {
                    size: src.len(),
                    max: config.max_message_size,
                });
            }
            return Ok(None);
        }
        Err(err) => {
            debug!(error = %err, "rejecting msgpack input");
            scanner.reset();
            return Err(err);
        }
    };
    scanner.reset();

    let value = from_slice(&src[..end], config)?;
    src.advance(end);
    Ok(Some(value))
}

/// Resumable measurement of the next value in a growing buffer.
///
/// `pending` holds the number of items each open container still owes,
/// innermost last. The bottom entry stands for the top-level value itself.
#[derive(Debug, Default)]
pub(crate) struct Scanner {
    pos: usize,
    pending: Vec<usize>,
}

impl Scanner {
    pub(crate) fn reset(&mut self) {
        self.pos = 0;
        self.pending.clear();
    }

    /// Offset just past the first complete value in `buf`, or `None` while
    /// more input is needed. `buf` must only grow between calls.
    fn scan(&mut self, buf: &[u8], config: &WireConfig) -> Result<Option<usize>> {
        if self.pos == 0 && self.pending.is_empty() {
            self.pending.push(1);
        }
        loop {
            match self.pending.last() {
                None => return Ok(Some(self.pos)),
                Some(0) => {
                    self.pending.pop();
                    continue;
                }
                Some(_) => {}
            }

            let mut parser = Parser {
                buf,
                pos: self.pos,
                config,
            };
            let item = match parser.skip_item() {
                Ok(item) => item,
                Err(Failure::Incomplete) => return Ok(None),
                Err(Failure::Invalid(err)) => return Err(err),
            };
            if let Item::Container(_) = item {
                let depth = self.pending.len() - 1;
                if depth >= config.max_depth {
                    return Err(WireError::TooDeep {
                        max: config.max_depth,
                    });
                }
            }

            self.pos = parser.pos;
            if let Some(left) = self.pending.last_mut() {
                *left -= 1;
            }
            if let Item::Container(items) = item {
                self.pending.push(items);
            }
        }
    }

    #[cfg(test)]
    fn position(&self) -> usize {
        self.pos
    }
}

enum Item {
    Scalar,
    /// Array or map header followed by this many values.
    Container(usize),
}

/// Decode exactly one value from a complete byte slice.
///
/// Truncated input and trailing bytes are both errors.
pub fn from_slice(bytes: &[u8], config: &WireConfig) -> Result<WireValue> {
    let mut parser = Parser {
        buf: bytes,
        pos: 0,
        config,
    };
    let value = match parser.value(0) {
        Ok(value) => value,
        Err(Failure::Incomplete) => {
            return Err(WireError::Malformed(format!(
                "truncated input ({} bytes)",
                bytes.len()
            )))
        }
        Err(Failure::Invalid(err)) => return Err(err),
    };
    if parser.pos != bytes.len() {
        return Err(WireError::Malformed(format!(
            "{} trailing bytes after value",
            bytes.len() - parser.pos
        )));
    }
    Ok(value)
}

enum Failure {
    Incomplete,
    Invalid(WireError),
}

impl From<WireError> for Failure {
    fn from(err: WireError) -> Self {
        Failure::Invalid(err)
    }
}

type Step<T> = std::result::Result<T, Failure>;

struct Parser<'a> {
    buf: &'a [u8],
    pos: usize,
    config: &'a WireConfig,
}

impl<'a> Parser<'a> {
    fn take(&mut self, n: usize) -> Step<&'a [u8]> {
        if self.buf.len() - self.pos < n {
            return Err(Failure::Incomplete);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Step<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Step<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Step<usize> {
        Ok(u16::from_be_bytes(self.array()?) as usize)
    }

    fn u32(&mut self) -> Step<usize> {
        Ok(u32::from_be_bytes(self.array()?) as usize)
    }

    fn check_len(&self, len: usize) -> Step<usize> {
        if len > self.config.max_message_size {
            return Err(WireError::TooLarge {
                size: len,
                max: self.config.max_message_size,
            }
            .into());
        }
        Ok(len)
    }

    fn value(&mut self, depth: usize) -> Step<WireValue> {
        let marker = self.u8()?;
        let value = match marker {
            0x00..=0x7f => WireValue::Integer(Integer::from_u64(u64::from(marker))),
            0x80..=0x8f => self.map((marker & 0x0f) as usize, depth)?,
            0x90..=0x9f => self.seq((marker & 0x0f) as usize, depth)?,
            0xa0..=0xbf => self.str((marker & 0x1f) as usize)?,
            0xc0 => WireValue::Nil,
            0xc1 => {
                return Err(WireError::Malformed("reserved marker 0xc1".to_string()).into());
            }
            0xc2 => WireValue::Boolean(false),
            0xc3 => WireValue::Boolean(true),
            0xc4 => {
                let len = self.u8()? as usize;
                self.bin(len)?
            }
            0xc5 => {
                let len = self.u16()?;
                self.bin(len)?
            }
            0xc6 => {
                let len = self.u32()?;
                self.bin(len)?
            }
            0xc7 => {
                let len = self.u8()? as usize;
                self.ext(len)?
            }
            0xc8 => {
                let len = self.u16()?;
                self.ext(len)?
            }
            0xc9 => {
                let len = self.u32()?;
                self.ext(len)?
            }
            0xca => WireValue::F32(f32::from_be_bytes(self.array()?)),
            0xcb => WireValue::F64(f64::from_be_bytes(self.array()?)),
            0xcc => WireValue::Integer(Integer::from_u64(u64::from(self.u8()?))),
            0xcd => WireValue::Integer(Integer::from_u64(u64::from(u16::from_be_bytes(
                self.array()?,
            )))),
            0xce => WireValue::Integer(Integer::from_u64(u64::from(u32::from_be_bytes(
                self.array()?,
            )))),
            0xcf => WireValue::Integer(Integer::from_u64(u64::from_be_bytes(self.array()?))),
            0xd0 => WireValue::Integer(Integer::from_i64(i64::from(i8::from_be_bytes(
                self.array()?,
            )))),
            0xd1 => WireValue::Integer(Integer::from_i64(i64::from(i16::from_be_bytes(
                self.array()?,
            )))),
            0xd2 => WireValue::Integer(Integer::from_i64(i64::from(i32::from_be_bytes(
                self.array()?,
            )))),
            0xd3 => WireValue::Integer(Integer::from_i64(i64::from_be_bytes(self.array()?))),
            0xd4 => self.ext(1)?,
            0xd5 => self.ext(2)?,
            0xd6 => self.ext(4)?,
            0xd7 => self.ext(8)?,
            0xd8 => self.ext(16)?,
            0xd9 => {
                let len = self.u8()? as usize;
                self.str(len)?
            }
            0xda => {
                let len = self.u16()?;
                self.str(len)?
            }
            0xdb => {
                let len = self.u32()?;
                self.str(len)?
            }
            0xdc => {
                let len = self.u16()?;
                self.seq(len, depth)?
            }
            0xdd => {
                let len = self.u32()?;
                self.seq(len, depth)?
            }
            0xde => {
                let len = self.u16()?;
                self.map(len, depth)?
            }
            0xdf => {
                let len = self.u32()?;
                self.map(len, depth)?
            }
            0xe0..=0xff => WireValue::Integer(Integer::from_i64(i64::from(marker as i8))),
        };
        Ok(value)
    }

    /// Step over one scalar, or over the header of a container.
    fn skip_item(&mut self) -> Step<Item> {
        let marker = self.u8()?;
        let payload = match marker {
            0x00..=0x7f | 0xc0 | 0xc2 | 0xc3 | 0xe0..=0xff => 0,
            0x80..=0x8f => return self.map_header((marker & 0x0f) as usize),
            0x90..=0x9f => return self.seq_header((marker & 0x0f) as usize),
            0xa0..=0xbf => self.check_len((marker & 0x1f) as usize)?,
            0xc1 => {
                return Err(WireError::Malformed("reserved marker 0xc1".to_string()).into());
            }
            0xc4 | 0xd9 => {
                let len = self.u8()? as usize;
                self.check_len(len)?
            }
            0xc5 | 0xda => {
                let len = self.u16()?;
                self.check_len(len)?
            }
            0xc6 | 0xdb => {
                let len = self.u32()?;
                self.check_len(len)?
            }
            // Extension payloads carry one extra type byte.
            0xc7 => {
                let len = self.u8()? as usize;
                self.check_len(len)? + 1
            }
            0xc8 => {
                let len = self.u16()?;
                self.check_len(len)? + 1
            }
            0xc9 => {
                let len = self.u32()?;
                self.check_len(len)? + 1
            }
            0xcc | 0xd0 => 1,
            0xcd | 0xd1 => 2,
            0xca | 0xce | 0xd2 => 4,
            0xcb | 0xcf | 0xd3 => 8,
            0xd4 => 2,
            0xd5 => 3,
            0xd6 => 5,
            0xd7 => 9,
            0xd8 => 17,
            0xdc => {
                let len = self.u16()?;
                return self.seq_header(len);
            }
            0xdd => {
                let len = self.u32()?;
                return self.seq_header(len);
            }
            0xde => {
                let len = self.u16()?;
                return self.map_header(len);
            }
            0xdf => {
                let len = self.u32()?;
                return self.map_header(len);
            }
        };
        self.take(payload)?;
        Ok(Item::Scalar)
    }

    fn seq_header(&self, len: usize) -> Step<Item> {
        Ok(Item::Container(self.check_len(len)?))
    }

    fn map_header(&self, len: usize) -> Step<Item> {
        Ok(Item::Container(self.check_len(len)?.saturating_mul(2)))
    }

    fn str(&mut self, len: usize) -> Step<WireValue> {
        let len = self.check_len(len)?;
        let bytes = self.take(len)?;
        Ok(match std::str::from_utf8(bytes) {
            Ok(text) => WireValue::String(text.to_string()),
            Err(_) => WireValue::Binary(Bytes::copy_from_slice(bytes)),
        })
    }

    fn bin(&mut self, len: usize) -> Step<WireValue> {
        let len = self.check_len(len)?;
        Ok(WireValue::Binary(Bytes::copy_from_slice(self.take(len)?)))
    }

    fn ext(&mut self, len: usize) -> Step<WireValue> {
        let len = self.check_len(len)?;
        let ty = i8::from_be_bytes(self.array()?);
        Ok(WireValue::Ext(ty, Bytes::copy_from_slice(self.take(len)?)))
    }

    fn enter(&self, depth: usize) -> Step<usize> {
        if depth >= self.config.max_depth {
            return Err(WireError::TooDeep {
                max: self.config.max_depth,
            }
            .into());
        }
        Ok(depth + 1)
    }

    fn seq(&mut self, len: usize, depth: usize) -> Step<WireValue> {
        let len = self.check_len(len)?;
        let depth = self.enter(depth)?;
        // Every element takes at least one byte; never trust `len` for the
        // allocation beyond what is buffered.
        let mut items = Vec::with_capacity(len.min(self.buf.len() - self.pos));
        for _ in 0..len {
            items.push(self.value(depth)?);
        }
        Ok(WireValue::Array(items))
    }

    fn map(&mut self, len: usize, depth: usize) -> Step<WireValue> {
        let len = self.check_len(len)?;
        let depth = self.enter(depth)?;
        let mut entries = Vec::with_capacity(len.min((self.buf.len() - self.pos) / 2));
        for _ in 0..len {
            let key = self.value(depth)?;
            let value = self.value(depth)?;
            entries.push((key, value));
        }
        Ok(WireValue::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: &WireValue) -> Vec<u8> {
        to_vec(value).unwrap()
    }

    fn decoded(bytes: &[u8]) -> WireValue {
        from_slice(bytes, &WireConfig::default()).unwrap()
    }

    #[test]
    fn test_integer_forms_are_minimal() {
        assert_eq!(encoded(&WireValue::from(0i64)), vec![0x00]);
        assert_eq!(encoded(&WireValue::from(127i64)), vec![0x7f]);
        assert_eq!(encoded(&WireValue::from(128i64)), vec![0xcc, 0x80]);
        assert_eq!(encoded(&WireValue::from(256i64)), vec![0xcd, 0x01, 0x00]);
        assert_eq!(
            encoded(&WireValue::from(70_000i64)),
            vec![0xce, 0x00, 0x01, 0x11, 0x70]
        );
        assert_eq!(encoded(&WireValue::from(-1i64)), vec![0xff]);
        assert_eq!(encoded(&WireValue::from(-32i64)), vec![0xe0]);
        assert_eq!(encoded(&WireValue::from(-33i64)), vec![0xd0, 0xdf]);
        assert_eq!(encoded(&WireValue::from(-129i64)), vec![0xd1, 0xff, 0x7f]);
        assert_eq!(encoded(&WireValue::from(u64::MAX))[0], 0xcf);
        assert_eq!(encoded(&WireValue::from(i64::MIN))[0], 0xd3);
    }

    #[test]
    fn test_signed_family_with_positive_value_is_canonical() {
        // 0xd0 0x05 is int8 5; it must equal the positive fixint form.
        assert_eq!(decoded(&[0xd0, 0x05]), WireValue::from(5u64));
        assert_eq!(decoded(&[0xd3, 0, 0, 0, 0, 0, 0, 0, 7]), WireValue::from(7u64));
    }

    #[test]
    fn test_string_forms() {
        assert_eq!(encoded(&WireValue::from("")), vec![0xa0]);
        assert_eq!(encoded(&WireValue::from("abc")), vec![0xa3, b'a', b'b', b'c']);
        let long = "x".repeat(40);
        let bytes = encoded(&WireValue::from(long.as_str()));
        assert_eq!(&bytes[..2], &[0xd9, 40]);
        assert_eq!(decoded(&bytes), WireValue::from(long.as_str()));
    }

    #[test]
    fn test_invalid_utf8_str_surfaces_as_binary() {
        let value = decoded(&[0xa2, 0xff, 0xfe]);
        assert_eq!(value, WireValue::Binary(Bytes::from_static(&[0xff, 0xfe])));
    }

    #[test]
    fn test_nested_structure() {
        let value = WireValue::Array(vec![
            WireValue::from("k"),
            WireValue::from(42i64),
            WireValue::Map(vec![
                (WireValue::from("a"), WireValue::F64(1.5)),
                (WireValue::from("b"), WireValue::Boolean(true)),
            ]),
            WireValue::Binary(Bytes::from_static(b"\x00\x01")),
            WireValue::Nil,
            WireValue::F32(0.25),
            WireValue::Ext(-3, Bytes::from_static(b"abcd")),
        ]);
        assert_eq!(decoded(&encoded(&value)), value);
    }

    #[test]
    fn test_large_array_uses_array16() {
        let value = WireValue::Array((0..20i64).map(WireValue::from).collect());
        let bytes = encoded(&value);
        assert_eq!(&bytes[..3], &[0xdc, 0x00, 20]);
        assert_eq!(decoded(&bytes), value);
    }

    #[test]
    fn test_decode_incomplete_returns_none() {
        let bytes = encoded(&WireValue::Array(vec![
            WireValue::from("hello"),
            WireValue::from(1i64),
        ]));
        let mut buf = BytesMut::from(&bytes[..bytes.len() - 1]);
        let result = decode_value(&mut buf, &WireConfig::default()).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), bytes.len() - 1, "incomplete input is not consumed");
    }

    #[test]
    fn test_decode_consumes_one_value() {
        let mut buf = BytesMut::new();
        encode_value(&WireValue::from(1i64), &mut buf).unwrap();
        encode_value(&WireValue::from("two"), &mut buf).unwrap();

        let config = WireConfig::default();
        let first = decode_value(&mut buf, &config).unwrap().unwrap();
        let second = decode_value(&mut buf, &config).unwrap().unwrap();
        assert_eq!(first, WireValue::from(1i64));
        assert_eq!(second, WireValue::from("two"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_value_walks_every_marker_family() {
        let value = WireValue::Array(vec![
            WireValue::from(200u64),
            WireValue::from(70_000u64),
            WireValue::from(u64::MAX),
            WireValue::from(-100i64),
            WireValue::from(-40_000i64),
            WireValue::from(i64::MIN),
            WireValue::F32(2.5),
            WireValue::F64(-0.5),
            WireValue::from("x".repeat(300).as_str()),
            WireValue::Binary(Bytes::from(vec![7u8; 300])),
            WireValue::Ext(1, Bytes::from_static(b"ab")),
            WireValue::Ext(2, Bytes::from_static(b"abc")),
            WireValue::Map(
                (0..20i64)
                    .map(|i| (WireValue::from(i), WireValue::Nil))
                    .collect(),
            ),
        ]);
        let mut buf = BytesMut::from(encoded(&value).as_slice());
        encode_value(&WireValue::Boolean(true), &mut buf).unwrap();

        let config = WireConfig::default();
        assert_eq!(decode_value(&mut buf, &config).unwrap(), Some(value));
        assert_eq!(
            decode_value(&mut buf, &config).unwrap(),
            Some(WireValue::Boolean(true))
        );
    }

    #[test]
    fn test_scanner_resumes_where_it_stopped() {
        let value = WireValue::Array((0..1000i64).map(WireValue::from).collect());
        let bytes = encoded(&value);
        let config = WireConfig::default();
        let mut scanner = Scanner::default();

        let mut buf = BytesMut::from(&bytes[..600]);
        assert!(decode_next(&mut scanner, &mut buf, &config).unwrap().is_none());
        assert!(scanner.position() > 500, "scanned bytes are remembered");

        buf.extend_from_slice(&bytes[600..]);
        let decoded = decode_next(&mut scanner, &mut buf, &config).unwrap();
        assert_eq!(decoded, Some(value));
        assert!(buf.is_empty());
        assert_eq!(scanner.position(), 0);
    }

    #[test]
    fn test_reserved_marker_rejected() {
        let mut buf = BytesMut::from(&[0xc1][..]);
        let result = decode_value(&mut buf, &WireConfig::default());
        assert!(matches!(result, Err(WireError::Malformed(_))));
    }

    #[test]
    fn test_declared_length_over_limit_rejected_early() {
        let config = WireConfig {
            max_message_size: 16,
            ..WireConfig::default()
        };
        // str32 declaring 1 MiB, only header present.
        let mut buf = BytesMut::from(&[0xdb, 0x00, 0x10, 0x00, 0x00][..]);
        let result = decode_value(&mut buf, &config);
        assert!(matches!(result, Err(WireError::TooLarge { .. })));
    }

    #[test]
    fn test_depth_limit() {
        let config = WireConfig {
            max_depth: 3,
            ..WireConfig::default()
        };
        let mut value = WireValue::Nil;
        for _ in 0..4 {
            value = WireValue::Array(vec![value]);
        }
        let mut buf = BytesMut::from(encoded(&value).as_slice());
        let result = decode_value(&mut buf, &config);
        assert!(matches!(result, Err(WireError::TooDeep { max: 3 })));
    }

    #[test]
    fn test_from_slice_rejects_trailing_and_truncated() {
        let config = WireConfig::default();
        assert!(matches!(
            from_slice(&[0x01, 0x02], &config),
            Err(WireError::Malformed(_))
        ));
        assert!(matches!(
            from_slice(&[0x92, 0x01], &config),
            Err(WireError::Malformed(_))
        ));
    }

    #[test]
    fn test_float_bits_preserved() {
        assert_eq!(
            encoded(&WireValue::F64(1.0)),
            vec![0xcb, 0x3f, 0xf0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(encoded(&WireValue::F32(1.0)), vec![0xca, 0x3f, 0x80, 0, 0]);
    }
}
