// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! SVR4 "newc" cpio archive writing.

An archive is a sequence of members, each a 110-byte header (all numeric
fields zero-padded ASCII hex) followed by the NUL-terminated member name and
the member data. Header-plus-name and data are independently padded with NUL
bytes to 4-byte boundaries. A member named `TRAILER!!!` terminates the
archive.
*/

use std::io::Write;

/// Magic opening every member header.
pub const MAGIC: &[u8] = b"070701";

/// Name of the terminating member.
const TRAILER_NAME: &str = "TRAILER!!!";

/// Length of the fixed portion of a member header.
const HEADER_LEN: usize = 110;

/// Streaming writer for SVR4 "newc" cpio archives.
pub struct NewcWriter<W: Write> {
    writer: W,
    next_inode: u32,
}

impl<W: Write> NewcWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            next_inode: 1,
        }
    }

    /// Append one archive member.
    ///
    /// Inodes are assigned sequentially from 1. Owner and group are always
    /// recorded as uid/gid 0; rpm takes ownership from the package header,
    /// not the payload.
    pub fn append(&mut self, name: &str, mode: u32, mtime: u32, nlink: u32, data: &[u8]) -> std::io::Result<()> {
        let inode = self.next_inode;
        self.next_inode += 1;

        self.write_header(inode, name, mode, mtime, nlink, data.len() as u32)?;
        self.writer.write_all(data)?;
        self.write_pad(data.len())
    }

    /// Write the `TRAILER!!!` terminator and hand back the underlying
    /// writer.
    pub fn finish(mut self) -> std::io::Result<W> {
        self.write_header(0, TRAILER_NAME, 0, 0, 1, 0)?;
        Ok(self.writer)
    }

    fn write_header(
        &mut self,
        inode: u32,
        name: &str,
        mode: u32,
        mtime: u32,
        nlink: u32,
        file_size: u32,
    ) -> std::io::Result<()> {
        let name_size = name.len() as u32 + 1;

        self.writer.write_all(MAGIC)?;
        for field in [
            inode, mode, 0, 0, // uid, gid
            nlink, mtime, file_size, 0, 0, // devmajor, devminor
            0, 0, // rdevmajor, rdevminor
            name_size, 0, // checksum, unused with this magic
        ] {
            write!(self.writer, "{:08X}", field)?;
        }

        self.writer.write_all(name.as_bytes())?;
        self.writer.write_all(&[0])?;
        self.write_pad(HEADER_LEN + name_size as usize)
    }

    fn write_pad(&mut self, written: usize) -> std::io::Result<()> {
        const PAD: [u8; 3] = [0; 3];
        self.writer.write_all(&PAD[..(4 - written % 4) % 4])
    }
}
