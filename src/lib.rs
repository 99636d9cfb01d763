// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Pure Rust creation of binary RPM package files.

This crate assembles `.rpm` binary packages entirely in memory, without
`rpmbuild`, an rpm database, spec files or any filesystem state. Callers
describe the package through [RpmBuilder] and receive a single byte stream
that `rpm` and `yum` accept for install, query and verify.

```
use rpm_packaging::{RpmBuilder, RpmFile, RpmMetadata};

# fn main() -> rpm_packaging::Result<()> {
let mut builder = RpmBuilder::new(RpmMetadata {
    name: "hello".into(),
    version: "2.10".into(),
    release: "1".into(),
    ..Default::default()
})?;

builder.add_file(RpmFile {
    path: "/usr/bin/hello".into(),
    body: b"#!/bin/sh\necho hello\n".to_vec(),
    mode: 0o755,
    ..Default::default()
});
builder.requires.add_text("sh")?;

let mut out = Vec::new();
builder.write(&mut out)?;
# Ok(())
# }
```

# A Tour of Functionality

[builder::RpmBuilder] is the assembler: it owns the package metadata
([builder::RpmMetadata]), the file set, the six dependency relation sets,
the scriptlet registry and the payload pipeline, and emits the finished
package through [builder::RpmBuilder::write].

The [header] module implements the tagged index format shared by the
signature and immutable headers, including the typed entry codec
([header::EntryValue]), selective integer alignment and the self-referential
region trailer, plus the fixed 96-byte lead.

Dependency relations live in [dependency]: [dependency::Relation] parses the
`name OP version` grammar, [dependency::RpmSense] carries the comparison
bitmask and [dependency::Relations] is the ordered, deduplicated set emitted
as three parallel header arrays.

The payload is an SVR4 "newc" cpio stream ([cpio::NewcWriter]) fed through a
selectable streaming compressor ([payload::Compressor]): gzip by default,
with zstd, xz and legacy lzma available, all buffered in memory.

Scriptlets ([scriptlet::Scriptlets]) cover the seven lifecycle slots rpm
runs, including the `<lua>` interpreter marker for `pretrans` and
`posttrans`.
*/

pub mod builder;
pub mod cpio;
pub mod dependency;
pub mod error;
pub mod files;
pub mod header;
pub mod payload;
pub mod scriptlet;
mod tags;
#[cfg(test)]
mod testutil;

pub use crate::{
    builder::{RpmBuilder, RpmMetadata, SignerCallback},
    dependency::{Relation, Relations, RpmSense},
    error::{Result, RpmPackagingError},
    files::{
        DirIndex, RpmFile, FILE_FLAG_CONFIG, FILE_FLAG_DOC, FILE_FLAG_DONOTUSE, FILE_FLAG_GHOST,
        FILE_FLAG_LICENCE, FILE_FLAG_MISSINGOK, FILE_FLAG_NONE, FILE_FLAG_NOREPLACE,
        FILE_FLAG_README, FILE_FLAG_SPECFILE,
    },
    payload::Compressor,
    scriptlet::{ScriptletSlot, Scriptlets, DEFAULT_INTERPRETER, LUA_MARKER},
};
