// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Payload compression.

The cpio payload stream is compressed while it is produced. [Compressor] is
the streaming encoder over an in-memory buffer, one variant per selectable
format, all sharing the same contract: bytes go in through [std::io::Write]
and [Compressor::finish] flushes the stream and returns the compressed
buffer.
*/

use {
    crate::error::{Result, RpmPackagingError},
    flate2::write::GzEncoder,
    std::io::Write,
    xz2::{
        stream::{LzmaOptions, Stream},
        write::XzEncoder,
    },
};

const GZIP_LEVEL: u32 = 9;
const XZ_PRESET: u32 = 6;

/// A streaming payload compressor writing into an in-memory buffer.
pub enum Compressor {
    Gzip(GzEncoder<Vec<u8>>),
    /// Accepted for compatibility with parallel-gzip selectors; the output
    /// is ordinary gzip.
    Pgzip(GzEncoder<Vec<u8>>),
    Zstd(zstd::stream::write::Encoder<'static, Vec<u8>>),
    Xz(XzEncoder<Vec<u8>>),
    /// Legacy lzma-alone container.
    Lzma(XzEncoder<Vec<u8>>),
}

impl Compressor {
    /// Construct a compressor from its metadata selector string.
    ///
    /// The empty selector means gzip.
    pub fn from_selector(selector: &str) -> Result<Self> {
        match selector {
            "" | "gzip" => Ok(Self::Gzip(GzEncoder::new(
                Vec::new(),
                flate2::Compression::new(GZIP_LEVEL),
            ))),
            "pgzip" => Ok(Self::Pgzip(GzEncoder::new(
                Vec::new(),
                flate2::Compression::new(GZIP_LEVEL),
            ))),
            "zstd" => Ok(Self::Zstd(zstd::stream::write::Encoder::new(
                Vec::new(),
                zstd::DEFAULT_COMPRESSION_LEVEL,
            )?)),
            "xz" => Ok(Self::Xz(XzEncoder::new(Vec::new(), XZ_PRESET))),
            "lzma" => {
                let options = LzmaOptions::new_preset(XZ_PRESET).map_err(stream_error)?;
                let stream = Stream::new_lzma_encoder(&options).map_err(stream_error)?;
                Ok(Self::Lzma(XzEncoder::new_stream(Vec::new(), stream)))
            }
            other => Err(RpmPackagingError::UnknownCompressor(other.to_string())),
        }
    }

    /// The compressor name recorded in the package header.
    ///
    /// rpm resolves its decompressor from this value, so the `pgzip`
    /// selector reports itself as `gzip`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gzip(_) | Self::Pgzip(_) => "gzip",
            Self::Zstd(_) => "zstd",
            Self::Xz(_) => "xz",
            Self::Lzma(_) => "lzma",
        }
    }

    /// Flush the stream and return the compressed bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        Ok(match self {
            Self::Gzip(encoder) | Self::Pgzip(encoder) => encoder.finish()?,
            Self::Zstd(encoder) => encoder.finish()?,
            Self::Xz(encoder) | Self::Lzma(encoder) => encoder.finish()?,
        })
    }
}

impl Write for Compressor {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Gzip(encoder) | Self::Pgzip(encoder) => encoder.write(buf),
            Self::Zstd(encoder) => encoder.write(buf),
            Self::Xz(encoder) | Self::Lzma(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Gzip(encoder) | Self::Pgzip(encoder) => encoder.flush(),
            Self::Zstd(encoder) => encoder.flush(),
            Self::Xz(encoder) | Self::Lzma(encoder) => encoder.flush(),
        }
    }
}

fn stream_error(error: xz2::stream::Error) -> RpmPackagingError {
    RpmPackagingError::Io(std::io::Error::new(std::io::ErrorKind::Other, error))
}
