// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! RPM header data structures.

An RPM package carries two *headers*: a signature header holding integrity
tags over the rest of the file, and an immutable header describing the
package itself. Both share the same framing: an 8-byte magic, an entry
count, the data region size, an array of 16-byte index records, and the data
region those records point into.

Each header also carries a *region trailer*: an index record whose data is a
second index-style record recapitulating the region with a negative offset
pointing back across the index record array. The trailer's index record
leads the index array while its 16 bytes of data sit last in the data
region. rpm rejects headers lacking this record.
*/

use {
    crate::error::{Result, RpmPackagingError},
    byteorder::{BigEndian, WriteBytesExt},
    std::{collections::BTreeMap, io::Write},
};

/// Magic and reserved bytes opening every header section.
pub const HEADER_MAGIC: [u8; 8] = [0x8e, 0xad, 0xe8, 0x01, 0x00, 0x00, 0x00, 0x00];

const REGION_SIGNATURES: i32 = 0x3e;
const REGION_IMMUTABLE: i32 = 0x3f;

const TYPE_INT16: i32 = 0x03;
const TYPE_INT32: i32 = 0x04;
const TYPE_STRING: i32 = 0x06;
const TYPE_BINARY: i32 = 0x07;
const TYPE_STRING_ARRAY: i32 = 0x08;
const TYPE_I18N_STRING: i32 = 0x09;

/// Size in bytes of one index record.
const INDEX_RECORD_LEN: usize = 16;

/// A typed value stored under a header tag.
///
/// Signed and unsigned integers of the same width share a wire type, so each
/// integer variant carries whichever Rust representation callers naturally
/// hold and converts bitwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryValue {
    /// Big-endian 16-bit integer array.
    Int16(Vec<u16>),
    /// Big-endian 32-bit integer array.
    Int32(Vec<i32>),
    /// A single NUL-terminated string.
    String(String),
    /// Opaque bytes.
    Binary(Vec<u8>),
    /// A sequence of NUL-terminated strings.
    StringArray(Vec<String>),
    /// Same wire form as [Self::StringArray], one string per locale.
    I18nString(Vec<String>),
}

impl EntryValue {
    fn rpm_type(&self) -> i32 {
        match self {
            Self::Int16(_) => TYPE_INT16,
            Self::Int32(_) => TYPE_INT32,
            Self::String(_) => TYPE_STRING,
            Self::Binary(_) => TYPE_BINARY,
            Self::StringArray(_) => TYPE_STRING_ARRAY,
            Self::I18nString(_) => TYPE_I18N_STRING,
        }
    }

    /// Element count as understood by the wire format.
    fn count(&self) -> usize {
        match self {
            Self::Int16(values) => values.len(),
            Self::Int32(values) => values.len(),
            Self::String(_) => 1,
            Self::Binary(data) => data.len(),
            Self::StringArray(values) | Self::I18nString(values) => values.len(),
        }
    }

    /// Required alignment of the entry's data within the data region.
    ///
    /// Only integer entries are aligned. This is not just an optimization:
    /// some rpm versions fail on unaligned integers, and others fail when
    /// non-integer entries are padded.
    fn alignment(&self) -> usize {
        match self {
            Self::Int16(_) => 2,
            Self::Int32(_) => 4,
            _ => 1,
        }
    }

    fn write_data(&self, writer: &mut impl Write) -> std::io::Result<()> {
        match self {
            Self::Int16(values) => {
                for value in values {
                    writer.write_u16::<BigEndian>(*value)?;
                }
            }
            Self::Int32(values) => {
                for value in values {
                    writer.write_i32::<BigEndian>(*value)?;
                }
            }
            Self::String(value) => {
                writer.write_all(value.as_bytes())?;
                writer.write_all(&[0])?;
            }
            Self::Binary(data) => {
                writer.write_all(data)?;
            }
            Self::StringArray(values) | Self::I18nString(values) => {
                writer.write_all(values.join("\0").as_bytes())?;
                writer.write_all(&[0])?;
            }
        }

        Ok(())
    }
}

impl From<&str> for EntryValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EntryValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for EntryValue {
    fn from(values: Vec<String>) -> Self {
        Self::StringArray(values)
    }
}

impl From<Vec<u8>> for EntryValue {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(data)
    }
}

impl From<Vec<i16>> for EntryValue {
    fn from(values: Vec<i16>) -> Self {
        Self::Int16(values.into_iter().map(|v| v as u16).collect())
    }
}

impl From<Vec<u16>> for EntryValue {
    fn from(values: Vec<u16>) -> Self {
        Self::Int16(values)
    }
}

impl From<Vec<i32>> for EntryValue {
    fn from(values: Vec<i32>) -> Self {
        Self::Int32(values)
    }
}

impl From<Vec<u32>> for EntryValue {
    fn from(values: Vec<u32>) -> Self {
        Self::Int32(values.into_iter().map(|v| v as i32).collect())
    }
}

/// An ordered tag table for one header region.
#[derive(Clone, Debug)]
pub struct Header {
    region_tag: i32,
    entries: BTreeMap<i32, EntryValue>,
}

impl Header {
    /// Construct an empty signature header.
    pub fn signature() -> Self {
        Self {
            region_tag: REGION_SIGNATURES,
            entries: BTreeMap::new(),
        }
    }

    /// Construct an empty immutable header.
    pub fn immutable() -> Self {
        Self {
            region_tag: REGION_IMMUTABLE,
            entries: BTreeMap::new(),
        }
    }

    /// Set a tag's value. Setting a tag twice keeps the last value.
    pub fn add(&mut self, tag: i32, value: impl Into<EntryValue>) {
        self.entries.insert(tag, value.into());
    }

    /// Serialize the header.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        // Alignment padding means sizes and offsets are only known after
        // the data region is materialised, so build that first.
        let mut data = Vec::new();
        let mut records = Vec::with_capacity(self.entries.len());
        for (tag, value) in &self.entries {
            let alignment = value.alignment();
            if alignment > 1 && data.len() % alignment != 0 {
                let pad = alignment - data.len() % alignment;
                data.extend(std::iter::repeat(0u8).take(pad));
            }
            let offset = int32_len(data.len(), "header entry offset")?;
            value.write_data(&mut data)?;
            records.push((*tag, value.rpm_type(), offset, int32_len(value.count(), "header entry count")?));
        }

        let record_count = self.entries.len() + 1;
        self.write_region_trailer_data(&mut data, record_count)?;
        let data_len = int32_len(data.len(), "header data region")?;

        let mut out = Vec::with_capacity(HEADER_MAGIC.len() + 8 + record_count * INDEX_RECORD_LEN + data.len());
        out.write_all(&HEADER_MAGIC)?;
        out.write_i32::<BigEndian>(int32_len(record_count, "header record count")?)?;
        out.write_i32::<BigEndian>(data_len)?;
        write_index_record(
            &mut out,
            self.region_tag,
            TYPE_BINARY,
            data_len - INDEX_RECORD_LEN as i32,
            INDEX_RECORD_LEN as i32,
        )?;
        for (tag, rpm_type, offset, count) in records {
            write_index_record(&mut out, tag, rpm_type, offset, count)?;
        }
        out.write_all(&data)?;

        Ok(out)
    }

    /// Append the trailer's 16 data bytes: an index-style record whose
    /// offset is the negated byte length of the index record array.
    fn write_region_trailer_data(&self, data: &mut Vec<u8>, record_count: usize) -> Result<()> {
        let span = int32_len(record_count * INDEX_RECORD_LEN, "header index region")?;
        write_index_record(data, self.region_tag, TYPE_BINARY, -span, INDEX_RECORD_LEN as i32)?;
        Ok(())
    }
}

fn write_index_record(writer: &mut impl Write, tag: i32, rpm_type: i32, offset: i32, count: i32) -> std::io::Result<()> {
    writer.write_i32::<BigEndian>(tag)?;
    writer.write_i32::<BigEndian>(rpm_type)?;
    writer.write_i32::<BigEndian>(offset)?;
    writer.write_i32::<BigEndian>(count)
}

fn int32_len(value: usize, what: &'static str) -> Result<i32> {
    i32::try_from(value).map_err(|_| RpmPackagingError::EncodingOverflow(what))
}

/// Compose the fixed 96-byte lead opening an RPM v3 binary package.
///
/// Layout: format magic, version 3.0, type binary, archnum, the
/// `name-version` string NUL-padded to 66 bytes (truncated at 65), osnum,
/// header-style signature type, and 16 reserved zero bytes.
pub fn lead(name: &str, full_version: &str) -> Vec<u8> {
    let mut name_field = format!("{}-{}", name, full_version).into_bytes();
    name_field.truncate(65);
    name_field.resize(66, 0);

    let mut lead = Vec::with_capacity(96);
    lead.extend_from_slice(&[0xed, 0xab, 0xee, 0xdb, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01]);
    lead.extend_from_slice(&name_field);
    lead.extend_from_slice(&[0x00, 0x01, 0x00, 0x05]);
    lead.extend_from_slice(&[0u8; 16]);
    lead
}
