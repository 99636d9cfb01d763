// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use thiserror::Error;

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum RpmPackagingError {
    #[error("rpm write after close")]
    WriteAfterClose,

    #[error("unknown compressor type: {0}")]
    UnknownCompressor(String),

    #[error("failed to parse relation expression: {0}")]
    MalformedRelation(String),

    #[error("unknown scriptlet slot: {0}")]
    UnknownScriptletSlot(String),

    #[error("required package metadata is empty: {0}")]
    MissingMetadata(&'static str),

    #[error("value does not fit in an int32 header field: {0}")]
    EncodingOverflow(&'static str),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("signing operation failed: {0}")]
    Sign(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, RpmPackagingError>;
