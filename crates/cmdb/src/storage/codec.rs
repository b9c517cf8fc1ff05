//! Little-endian binary codec for store snapshots.
//!
//! Snapshot layout:
//!
//! ```text
//! [magic "CMDB"][u16 version]            optional, absent in legacy files
//! [u64 count]([u64 len][bytes])*         levels
//! [u64 count](CI)*                       configuration items
//! [u64 count]([u64 len][source] REL)*    relationships keyed by source id
//!
//! CI  = str id, str name, str type, i32 level, u64 count, (str key, str value)*
//! REL = str type, str source, str destination, f64 weight
//! ```
//!
//! Strings are length-prefixed UTF-8. Files written before the header was
//! introduced start directly with the level count and are still readable.

use crate::error::{CmdbError, Result};
use crate::model::{Ci, Relationship};
use log::{trace, warn};

/// Magic bytes identifying a headered snapshot.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"CMDB";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Append-only byte writer.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Create an empty encoder.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Write a collection length or string length.
    pub fn put_len(&mut self, len: usize) {
        self.buf.extend_from_slice(&(len as u64).to_le_bytes());
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn put_str(&mut self, value: &str) {
        self.put_len(value.len());
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Write a signed 32-bit integer.
    pub fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a 64-bit float.
    pub fn put_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write raw bytes with no length prefix.
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the encoder and return the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked reader over an encoded buffer.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Create a decoder positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Look at the next `n` bytes without consuming them.
    pub fn peek(&self, n: usize) -> Option<&'a [u8]> {
        self.data.get(self.pos..self.pos.checked_add(n)?)
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let bytes = self.peek(n).ok_or_else(|| {
            CmdbError::serialization(
                format!(
                    "unexpected end of snapshot: needed {n} bytes at offset {}, {} left",
                    self.pos,
                    self.remaining()
                ),
                None::<std::io::Error>,
            )
        })?;
        self.pos += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read a collection length or string length.
    pub fn read_len(&mut self) -> Result<usize> {
        let raw = u64::from_le_bytes(self.take_array()?);
        usize::try_from(raw).map_err(|e| {
            CmdbError::serialization(format!("length {raw} does not fit in memory"), Some(e))
        })
    }

    /// Read a collection count, rejecting counts that cannot possibly fit in
    /// the remaining bytes given a minimum encoded size per element.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize> {
        let count = self.read_len()?;
        let needed = count.saturating_mul(min_element_size.max(1));
        if needed > self.remaining() {
            return Err(CmdbError::serialization(
                format!(
                    "collection of {count} elements cannot fit in the {} remaining bytes",
                    self.remaining()
                ),
                None::<std::io::Error>,
            ));
        }
        Ok(count)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> Result<String> {
        let len = self.read_len()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CmdbError::serialization("string is not valid UTF-8", Some(e)))
    }

    /// Read an unsigned 16-bit integer.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    /// Read a signed 32-bit integer.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    /// Read a 64-bit float.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }
}

/// Decoded store contents. Secondary indices are not part of a snapshot.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Level names in index order
    pub levels: Vec<String>,
    /// CIs in insertion order
    pub cis: Vec<Ci>,
    /// All relationships
    pub relationships: Vec<Relationship>,
}

// Smallest possible encodings, used to reject absurd counts early.
const MIN_STR: usize = 8;
const MIN_CI: usize = MIN_STR * 3 + 4 + 8;
const MIN_REL_ENTRY: usize = MIN_STR + MIN_STR * 3 + 8;

/// Encode a snapshot with the current header.
pub fn encode_snapshot(levels: &[String], cis: &[Ci], relationships: &[&Relationship]) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.put_raw(&SNAPSHOT_MAGIC);
    enc.put_raw(&SNAPSHOT_VERSION.to_le_bytes());

    enc.put_len(levels.len());
    for level in levels {
        enc.put_str(level);
    }

    enc.put_len(cis.len());
    for ci in cis {
        ci.encode(&mut enc);
    }

    enc.put_len(relationships.len());
    for relationship in relationships {
        enc.put_str(relationship.source());
        relationship.encode(&mut enc);
    }

    trace!("Encoded snapshot of {} bytes", enc.len());
    enc.into_bytes()
}

/// Decode a snapshot, accepting both headered and legacy layouts.
pub fn decode_snapshot(data: &[u8]) -> Result<Snapshot> {
    let mut dec = Decoder::new(data);

    if dec.peek(SNAPSHOT_MAGIC.len()) == Some(&SNAPSHOT_MAGIC[..]) {
        dec.take(SNAPSHOT_MAGIC.len())?;
        let version = dec.read_u16()?;
        if version > SNAPSHOT_VERSION {
            return Err(CmdbError::serialization(
                format!("unsupported snapshot version: {version}"),
                None::<std::io::Error>,
            ));
        }
    } else {
        trace!("Snapshot has no header, reading legacy layout");
    }

    let level_count = dec.read_count(MIN_STR)?;
    let mut levels = Vec::with_capacity(level_count);
    for _ in 0..level_count {
        levels.push(dec.read_str()?);
    }

    let ci_count = dec.read_count(MIN_CI)?;
    let mut cis = Vec::with_capacity(ci_count);
    for i in 0..ci_count {
        let ci = Ci::decode(&mut dec).map_err(|e| {
            CmdbError::serialization(format!("failed to decode CI #{i}"), Some(e))
        })?;
        cis.push(ci);
    }

    let rel_count = dec.read_count(MIN_REL_ENTRY)?;
    let mut relationships = Vec::with_capacity(rel_count);
    for i in 0..rel_count {
        let key = dec.read_str()?;
        let relationship = Relationship::decode(&mut dec).map_err(|e| {
            CmdbError::serialization(format!("failed to decode relationship #{i}"), Some(e))
        })?;
        if key != relationship.source() {
            warn!(
                "Relationship #{i} is keyed by '{key}' but its source is '{}'; using the source",
                relationship.source()
            );
        }
        relationships.push(relationship);
    }

    if dec.remaining() != 0 {
        return Err(CmdbError::serialization(
            format!("{} trailing bytes after snapshot", dec.remaining()),
            None::<std::io::Error>,
        ));
    }

    Ok(Snapshot {
        levels,
        cis,
        relationships,
    })
}
