//! TOON tagged-byte serialization
//!
//! Wire format for stage-state snapshots. Every value is a one-byte tag
//! followed by a little-endian payload. `FLOAT_ARRAY` payloads are aligned
//! to a 32-byte boundary (zero padding) so readers can hand out SIMD-friendly
//! views without copying.
//!
//! The deserializer never panics on malformed input: it enters a sticky
//! error state and all subsequent reads return defaults. Callers check
//! `require_ok()` once after decoding a block.

use crate::{DspError, DspResult, Sample};

/// TOON protocol tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    Null = 0x00,
    Int32 = 0x01,
    Float = 0x02,
    String = 0x03,
    FloatArray = 0x04,
    ObjectStart = 0x10,
    ObjectEnd = 0x11,
    ArrayStart = 0x12,
    ArrayEnd = 0x13,
    Bool = 0x14,
    Double = 0x15,
}

impl Tag {
    fn from_byte(b: u8) -> Option<Tag> {
        Some(match b {
            0x00 => Tag::Null,
            0x01 => Tag::Int32,
            0x02 => Tag::Float,
            0x03 => Tag::String,
            0x04 => Tag::FloatArray,
            0x10 => Tag::ObjectStart,
            0x11 => Tag::ObjectEnd,
            0x12 => Tag::ArrayStart,
            0x13 => Tag::ArrayEnd,
            0x14 => Tag::Bool,
            0x15 => Tag::Double,
            _ => return None,
        })
    }
}

/// Alignment of `FLOAT_ARRAY` payloads relative to the blob start.
pub const FLOAT_ARRAY_ALIGN: usize = 32;

// ---------- Serializer ----------

/// Append-only TOON writer.
#[derive(Debug, Default)]
pub struct Serializer {
    buffer: Vec<u8>,
}

impl Serializer {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    fn tag(&mut self, tag: Tag) {
        self.buffer.push(tag as u8);
    }

    pub fn write_i32(&mut self, val: i32) {
        self.tag(Tag::Int32);
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_f32(&mut self, val: f32) {
        self.tag(Tag::Float);
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_f64(&mut self, val: f64) {
        self.tag(Tag::Double);
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_bool(&mut self, val: bool) {
        self.tag(Tag::Bool);
        self.buffer.push(val as u8);
    }

    pub fn write_str(&mut self, val: &str) {
        self.tag(Tag::String);
        self.buffer
            .extend_from_slice(&(val.len() as i32).to_le_bytes());
        self.buffer.extend_from_slice(val.as_bytes());
    }

    /// Float array with a 32-byte-aligned payload.
    pub fn write_f32_array(&mut self, data: &[Sample]) {
        self.tag(Tag::FloatArray);
        self.buffer
            .extend_from_slice(&(data.len() as i32).to_le_bytes());

        let remainder = self.buffer.len() % FLOAT_ARRAY_ALIGN;
        if remainder != 0 {
            self.buffer
                .resize(self.buffer.len() + (FLOAT_ARRAY_ALIGN - remainder), 0);
        }

        #[cfg(target_endian = "little")]
        self.buffer.extend_from_slice(bytemuck::cast_slice(data));

        #[cfg(target_endian = "big")]
        for &v in data {
            self.buffer.extend_from_slice(&v.to_le_bytes());
        }
    }

    pub fn start_object(&mut self) {
        self.tag(Tag::ObjectStart);
    }

    pub fn end_object(&mut self) {
        self.tag(Tag::ObjectEnd);
    }

    pub fn start_array(&mut self) {
        self.tag(Tag::ArrayStart);
    }

    pub fn end_array(&mut self) {
        self.tag(Tag::ArrayEnd);
    }

    /// Convenience for `key: value` fields inside objects.
    pub fn field_i32(&mut self, key: &str, val: i32) {
        self.write_str(key);
        self.write_i32(val);
    }

    pub fn field_f32(&mut self, key: &str, val: f32) {
        self.write_str(key);
        self.write_f32(val);
    }

    pub fn field_f64(&mut self, key: &str, val: f64) {
        self.write_str(key);
        self.write_f64(val);
    }

    pub fn field_bool(&mut self, key: &str, val: bool) {
        self.write_str(key);
        self.write_bool(val);
    }

    pub fn field_str(&mut self, key: &str, val: &str) {
        self.write_str(key);
        self.write_str(val);
    }

    pub fn field_f32_array(&mut self, key: &str, val: &[Sample]) {
        self.write_str(key);
        self.write_f32_array(val);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

// ---------- Deserializer ----------

/// TOON reader over a borrowed byte slice.
///
/// Reads after the first malformed token return defaults; the sticky error
/// flag records the failure.
#[derive(Debug)]
pub struct Deserializer<'a> {
    data: &'a [u8],
    pos: usize,
    error: bool,
}

impl<'a> Deserializer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            error: false,
        }
    }

    #[inline]
    pub fn has_error(&self) -> bool {
        self.error
    }

    /// Map the sticky error state onto the pipeline error type.
    pub fn require_ok(&self) -> DspResult<()> {
        if self.error {
            Err(DspError::StateCorrupt(
                "TOON stream malformed or truncated".into(),
            ))
        } else {
            Ok(())
        }
    }

    pub fn peek(&self) -> Tag {
        if self.pos >= self.data.len() {
            return Tag::Null;
        }
        Tag::from_byte(self.data[self.pos]).unwrap_or(Tag::Null)
    }

    pub fn consume(&mut self, expected: Tag) -> bool {
        if self.pos >= self.data.len() || self.data[self.pos] != expected as u8 {
            self.error = true;
            return false;
        }
        self.pos += 1;
        true
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.pos + n > self.data.len() {
            self.error = true;
            return None;
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    pub fn read_i32(&mut self) -> i32 {
        if !self.consume(Tag::Int32) {
            return 0;
        }
        self.take(4)
            .map(|b| i32::from_le_bytes(b.try_into().unwrap()))
            .unwrap_or(0)
    }

    pub fn read_f32(&mut self) -> f32 {
        if !self.consume(Tag::Float) {
            return 0.0;
        }
        self.take(4)
            .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
            .unwrap_or(0.0)
    }

    pub fn read_f64(&mut self) -> f64 {
        if !self.consume(Tag::Double) {
            return 0.0;
        }
        self.take(8)
            .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
            .unwrap_or(0.0)
    }

    pub fn read_bool(&mut self) -> bool {
        if !self.consume(Tag::Bool) {
            return false;
        }
        self.take(1).map(|b| b[0] != 0).unwrap_or(false)
    }

    /// Zero-copy string view.
    pub fn read_str(&mut self) -> &'a str {
        if !self.consume(Tag::String) {
            return "";
        }
        let Some(len_bytes) = self.take(4) else {
            return "";
        };
        let len = i32::from_le_bytes(len_bytes.try_into().unwrap());
        if len < 0 {
            self.error = true;
            return "";
        }
        let Some(bytes) = self.take(len as usize) else {
            return "";
        };
        match std::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(_) => {
                self.error = true;
                ""
            }
        }
    }

    pub fn read_string(&mut self) -> String {
        self.read_str().to_owned()
    }

    fn float_array_payload(&mut self) -> Option<&'a [u8]> {
        if !self.consume(Tag::FloatArray) {
            return None;
        }
        let len_bytes = self.take(4)?;
        let count = i32::from_le_bytes(len_bytes.try_into().unwrap());
        if count < 0 {
            self.error = true;
            return None;
        }

        let remainder = self.pos % FLOAT_ARRAY_ALIGN;
        if remainder != 0 {
            self.pos += FLOAT_ARRAY_ALIGN - remainder;
        }

        self.take(count as usize * std::mem::size_of::<Sample>())
    }

    /// Zero-copy view into the source buffer.
    ///
    /// Only available on little-endian targets when the payload happens to
    /// be 4-byte aligned in memory. On `None` (and no error) the read
    /// position is rewound so callers can fall back to `read_f32_array`.
    pub fn read_f32_span(&mut self) -> Option<&'a [Sample]> {
        let start = self.pos;
        let payload = self.float_array_payload()?;
        if cfg!(target_endian = "little") {
            if let Ok(slice) = bytemuck::try_cast_slice(payload) {
                return Some(slice);
            }
        }
        self.pos = start;
        None
    }

    /// Float array as an owned vector; works on any target.
    pub fn read_f32_array(&mut self) -> Vec<Sample> {
        let Some(payload) = self.float_array_payload() else {
            return Vec::new();
        };

        #[cfg(target_endian = "little")]
        if let Ok(slice) = bytemuck::try_cast_slice::<u8, Sample>(payload) {
            return slice.to_vec();
        }

        payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }

    /// Key string of the next object field.
    pub fn read_key(&mut self) -> &'a str {
        self.read_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_round_trip() {
        let mut s = Serializer::new();
        s.write_i32(-42);
        s.write_f32(1.5);
        s.write_f64(std::f64::consts::PI);
        s.write_bool(true);
        s.write_str("biopipe");

        let bytes = s.into_bytes();
        let mut d = Deserializer::new(&bytes);
        assert_eq!(d.read_i32(), -42);
        assert_eq!(d.read_f32(), 1.5);
        assert_eq!(d.read_f64(), std::f64::consts::PI);
        assert!(d.read_bool());
        assert_eq!(d.read_str(), "biopipe");
        assert!(d.require_ok().is_ok());
    }

    #[test]
    fn test_float_array_round_trip_and_alignment() {
        let data: Vec<f32> = (0..37).map(|i| i as f32 * 0.25).collect();
        let mut s = Serializer::new();
        s.write_str("pad"); // misalign the head on purpose
        s.write_f32_array(&data);
        let bytes = s.into_bytes();

        // Payload must start on a 32-byte boundary: tag(1)+len(4)+"pad"(3)
        // then array tag(1)+count(4) = 13, padded up to 32.
        let payload_offset = bytes.len() - data.len() * 4;
        assert_eq!(payload_offset % FLOAT_ARRAY_ALIGN, 0);

        let mut d = Deserializer::new(&bytes);
        assert_eq!(d.read_str(), "pad");
        assert_eq!(d.read_f32_array(), data);
        assert!(d.require_ok().is_ok());
    }

    #[test]
    fn test_empty_float_array() {
        let mut s = Serializer::new();
        s.write_f32_array(&[]);
        let bytes = s.into_bytes();
        let mut d = Deserializer::new(&bytes);
        assert!(d.read_f32_array().is_empty());
        assert!(d.require_ok().is_ok());
    }

    #[test]
    fn test_object_fields() {
        let mut s = Serializer::new();
        s.start_object();
        s.field_i32("windowSize", 64);
        s.field_f32_array("buffer", &[1.0, 2.0, 3.0]);
        s.end_object();

        let bytes = s.into_bytes();
        let mut d = Deserializer::new(&bytes);
        assert!(d.consume(Tag::ObjectStart));
        assert_eq!(d.read_key(), "windowSize");
        assert_eq!(d.read_i32(), 64);
        assert_eq!(d.read_key(), "buffer");
        assert_eq!(d.read_f32_array(), vec![1.0, 2.0, 3.0]);
        assert!(d.consume(Tag::ObjectEnd));
        assert!(d.require_ok().is_ok());
    }

    #[test]
    fn test_encode_is_deterministic() {
        let encode = || {
            let mut s = Serializer::new();
            s.start_object();
            s.field_str("mode", "moving");
            s.field_f32_array("buffer", &[0.5; 16]);
            s.end_object();
            s.into_bytes()
        };
        assert_eq!(encode(), encode());
    }

    #[test]
    fn test_truncated_input_sets_error() {
        let mut s = Serializer::new();
        s.write_f64(1.0);
        let bytes = s.into_bytes();
        let mut d = Deserializer::new(&bytes[..4]);
        let _ = d.read_f64();
        assert!(d.has_error());
        assert!(d.require_ok().is_err());
    }

    #[test]
    fn test_tag_mismatch_sets_error() {
        let mut s = Serializer::new();
        s.write_i32(7);
        let bytes = s.into_bytes();
        let mut d = Deserializer::new(&bytes);
        assert_eq!(d.read_f32(), 0.0);
        assert!(d.has_error());
    }

    #[test]
    fn test_negative_array_count_sets_error() {
        let mut bytes = vec![Tag::FloatArray as u8];
        bytes.extend_from_slice(&(-5i32).to_le_bytes());
        let mut d = Deserializer::new(&bytes);
        assert!(d.read_f32_array().is_empty());
        assert!(d.has_error());
    }

    #[test]
    fn test_oversized_payload_sets_error() {
        let mut bytes = vec![Tag::FloatArray as u8];
        bytes.extend_from_slice(&1000i32.to_le_bytes());
        bytes.resize(64, 0);
        let mut d = Deserializer::new(&bytes);
        assert!(d.read_f32_array().is_empty());
        assert!(d.has_error());
    }
}
