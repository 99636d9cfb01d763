// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Test helpers for picking emitted packages apart. */

use std::io::Read;

/// One decoded 16-byte header index record.
pub(crate) type IndexRecord = (i32, i32, i32, i32);

/// A header re-parsed from emitted bytes.
pub(crate) struct ParsedHeader {
    /// Declared record count, including the region trailer.
    pub record_count: usize,
    /// Entry records in index order, excluding the region trailer.
    pub records: Vec<IndexRecord>,
    pub data: Vec<u8>,
    pub total_len: usize,
}

fn be_i32(data: &[u8]) -> i32 {
    i32::from_be_bytes(data[0..4].try_into().unwrap())
}

fn index_record(data: &[u8], base: usize) -> IndexRecord {
    (
        be_i32(&data[base..]),
        be_i32(&data[base + 4..]),
        be_i32(&data[base + 8..]),
        be_i32(&data[base + 12..]),
    )
}

/// Parse one header from the front of `buf`, asserting its framing.
pub(crate) fn parse_header(buf: &[u8]) -> ParsedHeader {
    assert_eq!(&buf[0..8], &[0x8e, 0xad, 0xe8, 0x01, 0, 0, 0, 0], "header magic");

    let record_count = be_i32(&buf[8..]) as usize;
    let data_len = be_i32(&buf[12..]) as usize;

    let region = index_record(buf, 16);
    assert_eq!(region.1, 7, "region trailer is a binary entry");
    assert_eq!(region.2 as usize, data_len - 16);
    assert_eq!(region.3, 16);

    let records = (1..record_count)
        .map(|i| index_record(buf, 16 + 16 * i))
        .collect();

    let data_start = 16 + 16 * record_count;
    let data = buf[data_start..data_start + data_len].to_vec();

    ParsedHeader {
        record_count,
        records,
        data,
        total_len: data_start + data_len,
    }
}

impl ParsedHeader {
    pub fn has(&self, tag: i32) -> bool {
        self.records.iter().any(|record| record.0 == tag)
    }

    pub fn record(&self, tag: i32) -> IndexRecord {
        *self
            .records
            .iter()
            .find(|record| record.0 == tag)
            .unwrap_or_else(|| panic!("tag {} not present", tag))
    }

    pub fn string(&self, tag: i32) -> String {
        let (_, rpm_type, offset, _) = self.record(tag);
        assert_eq!(rpm_type, 6, "tag {} is not a string", tag);
        read_string(&self.data, offset as usize)
    }

    pub fn string_array(&self, tag: i32) -> Vec<String> {
        let (_, rpm_type, offset, count) = self.record(tag);
        assert!(rpm_type == 8 || rpm_type == 9, "tag {} is not a string array", tag);

        let mut values = Vec::with_capacity(count as usize);
        let mut position = offset as usize;
        for _ in 0..count {
            let value = read_string(&self.data, position);
            position += value.len() + 1;
            values.push(value);
        }
        values
    }

    pub fn i32_array(&self, tag: i32) -> Vec<i32> {
        let (_, rpm_type, offset, count) = self.record(tag);
        assert_eq!(rpm_type, 4, "tag {} is not an int32 array", tag);

        (0..count as usize)
            .map(|i| be_i32(&self.data[offset as usize + 4 * i..]))
            .collect()
    }

    pub fn u16_array(&self, tag: i32) -> Vec<u16> {
        let (_, rpm_type, offset, count) = self.record(tag);
        assert_eq!(rpm_type, 3, "tag {} is not an int16 array", tag);

        (0..count as usize)
            .map(|i| {
                let base = offset as usize + 2 * i;
                u16::from_be_bytes(self.data[base..base + 2].try_into().unwrap())
            })
            .collect()
    }
}

fn read_string(data: &[u8], offset: usize) -> String {
    let end = data[offset..]
        .iter()
        .position(|&b| b == 0)
        .expect("unterminated string")
        + offset;
    String::from_utf8(data[offset..end].to_vec()).unwrap()
}

/// An emitted package split back into its sections.
pub(crate) struct ParsedPackage {
    pub lead: Vec<u8>,
    pub signature: ParsedHeader,
    pub header: ParsedHeader,
    /// The immutable header's exact bytes as written.
    pub header_bytes: Vec<u8>,
    pub payload: Vec<u8>,
}

pub(crate) fn parse_package(buf: &[u8]) -> ParsedPackage {
    let lead = buf[..96].to_vec();

    let signature = parse_header(&buf[96..]);
    let pad = (8 - signature.total_len % 8) % 8;
    let padding = &buf[96 + signature.total_len..96 + signature.total_len + pad];
    assert!(padding.iter().all(|&b| b == 0), "signature padding");

    let header_start = 96 + signature.total_len + pad;
    let header = parse_header(&buf[header_start..]);
    let header_end = header_start + header.total_len;

    ParsedPackage {
        lead,
        header_bytes: buf[header_start..header_end].to_vec(),
        signature,
        header,
        payload: buf[header_end..].to_vec(),
    }
}

/// One member read back from a "newc" cpio stream.
pub(crate) struct CpioEntry {
    pub name: String,
    pub mode: u32,
    pub nlink: u32,
    pub file_size: u32,
}

/// Read all members of a "newc" stream up to (excluding) the trailer.
pub(crate) fn cpio_entries(data: &[u8]) -> Vec<CpioEntry> {
    let mut entries = Vec::new();
    let mut position = 0;

    loop {
        assert_eq!(&data[position..position + 6], b"070701", "member magic");
        let field = |index: usize| {
            let start = position + 6 + index * 8;
            let text = std::str::from_utf8(&data[start..start + 8]).unwrap();
            u32::from_str_radix(text, 16).unwrap()
        };

        let mode = field(1);
        let nlink = field(4);
        let file_size = field(6);
        let name_size = field(11) as usize;

        let name_start = position + 110;
        let name = String::from_utf8(data[name_start..name_start + name_size - 1].to_vec()).unwrap();

        position = name_start + name_size;
        position += (4 - position % 4) % 4;

        if name == "TRAILER!!!" {
            return entries;
        }

        position += file_size as usize;
        position += (4 - position % 4) % 4;

        entries.push(CpioEntry {
            name,
            mode,
            nlink,
            file_size,
        });
    }
}

/// Decompress a gzip stream.
pub(crate) fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    flate2::read::GzDecoder::new(data).read_to_end(&mut decoded)?;
    Ok(decoded)
}
