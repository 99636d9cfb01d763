// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Create binary RPM package files.

[RpmBuilder] is the assembler tying the other modules together. Callers
describe the package through it, then call [RpmBuilder::write] once to emit
the finished byte stream: the 96-byte lead, the signature header, padding to
an 8-byte boundary, the immutable header and the compressed cpio payload.
*/

use {
    crate::{
        cpio::NewcWriter,
        dependency::{Relation, Relations, RpmSense},
        error::{Result, RpmPackagingError},
        files::{DirIndex, RpmFile, FILE_FLAG_GHOST},
        header::{lead, EntryValue, Header},
        payload::Compressor,
        scriptlet::{ScriptletSlot, Scriptlets},
        tags,
    },
    log::debug,
    sha2::{Digest, Sha256},
    std::{collections::BTreeMap, io::Write},
};

/// Callback producing a signature blob over the immutable header bytes.
pub type SignerCallback = Box<
    dyn Fn(&[u8]) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>
        + Send
        + Sync,
>;

/// Package-level metadata.
///
/// `name` and `version` must be non-empty by the time the package is
/// written; everything else may be left at its default.
#[derive(Clone, Debug, Default)]
pub struct RpmMetadata {
    pub name: String,
    pub version: String,
    pub release: String,
    pub epoch: Option<u32>,
    /// Target architecture. Empty means `noarch`.
    pub arch: String,
    /// Target operating system. Empty means `linux`.
    pub os: String,
    pub summary: String,
    pub description: String,
    pub vendor: String,
    pub url: String,
    pub packager: String,
    pub group: String,
    pub licence: String,
    /// Payload compressor selector: `gzip` (default), `pgzip`, `zstd`, `xz`
    /// or `lzma`.
    pub compressor: String,
    /// Build time in seconds since the UNIX epoch.
    pub build_time: Option<u32>,
    /// Relocatable installation roots.
    pub prefixes: Vec<String>,
}

/// Assembles one binary RPM package in memory.
pub struct RpmBuilder {
    meta: RpmMetadata,

    pub provides: Relations,
    pub requires: Relations,
    pub obsoletes: Relations,
    pub suggests: Relations,
    pub recommends: Relations,
    pub conflicts: Relations,

    files: BTreeMap<String, RpmFile>,
    scriptlets: Scriptlets,
    signer: Option<SignerCallback>,

    cpio: Option<NewcWriter<Compressor>>,
    compressor_name: &'static str,
    payload_size: u64,

    dirs: DirIndex,
    basenames: Vec<String>,
    dirindexes: Vec<u32>,
    filesizes: Vec<u32>,
    filemodes: Vec<u16>,
    fileowners: Vec<String>,
    filegroups: Vec<String>,
    filemtimes: Vec<u32>,
    filedigests: Vec<String>,
    filelinktos: Vec<String>,
    fileflags: Vec<u32>,

    closed: bool,
}

impl RpmBuilder {
    /// Construct a builder for the given metadata.
    ///
    /// The payload compressor is created here, so an unknown selector fails
    /// immediately rather than at write time.
    pub fn new(mut meta: RpmMetadata) -> Result<Self> {
        if meta.arch.is_empty() {
            meta.arch = "noarch".to_string();
        }
        if meta.os.is_empty() {
            meta.os = "linux".to_string();
        }

        let compressor = Compressor::from_selector(&meta.compressor)?;
        let compressor_name = compressor.name();

        Ok(Self {
            meta,
            provides: Relations::default(),
            requires: Relations::default(),
            obsoletes: Relations::default(),
            suggests: Relations::default(),
            recommends: Relations::default(),
            conflicts: Relations::default(),
            files: BTreeMap::new(),
            scriptlets: Scriptlets::default(),
            signer: None,
            cpio: Some(NewcWriter::new(compressor)),
            compressor_name,
            payload_size: 0,
            dirs: DirIndex::new(),
            basenames: Vec::new(),
            dirindexes: Vec::new(),
            filesizes: Vec::new(),
            filemodes: Vec::new(),
            fileowners: Vec::new(),
            filegroups: Vec::new(),
            filemtimes: Vec::new(),
            filedigests: Vec::new(),
            filelinktos: Vec::new(),
            fileflags: Vec::new(),
            closed: false,
        })
    }

    /// The version-release string used in the lead, the self-provides entry
    /// and the source rpm name.
    pub fn full_version(&self) -> String {
        if self.meta.release.is_empty() {
            self.meta.version.clone()
        } else {
            format!("{}-{}", self.meta.version, self.meta.release)
        }
    }

    /// Register a file. Adding the same path again replaces the earlier
    /// entry. rpm does not allow the root directory to be packaged, so `/`
    /// is silently dropped.
    pub fn add_file(&mut self, file: RpmFile) {
        if file.path == "/" {
            return;
        }
        self.files.insert(file.path.clone(), file);
    }

    pub fn add_prein(&mut self, body: impl Into<String>) {
        self.scriptlets.set_body(ScriptletSlot::Prein, body);
    }

    pub fn add_postin(&mut self, body: impl Into<String>) {
        self.scriptlets.set_body(ScriptletSlot::Postin, body);
    }

    pub fn add_preun(&mut self, body: impl Into<String>) {
        self.scriptlets.set_body(ScriptletSlot::Preun, body);
    }

    pub fn add_postun(&mut self, body: impl Into<String>) {
        self.scriptlets.set_body(ScriptletSlot::Postun, body);
    }

    pub fn add_pretrans(&mut self, body: impl Into<String>) {
        self.scriptlets.set_body(ScriptletSlot::Pretrans, body);
    }

    pub fn add_posttrans(&mut self, body: impl Into<String>) {
        self.scriptlets.set_body(ScriptletSlot::Posttrans, body);
    }

    pub fn add_verify_script(&mut self, body: impl Into<String>) {
        self.scriptlets.set_body(ScriptletSlot::VerifyScript, body);
    }

    /// See [Scriptlets::set_default_interpreter].
    pub fn set_default_scriptlet_interpreter(&mut self, path: &str) {
        self.scriptlets.set_default_interpreter(path);
    }

    /// See [Scriptlets::set_interpreter_for].
    pub fn set_scriptlet_interpreter(&mut self, slot_name: &str, path: &str) -> Result<()> {
        self.scriptlets.set_interpreter_for(slot_name, path)
    }

    /// Install a signer. On write, the callback receives the serialized
    /// immutable header and its return value is stored verbatim under the
    /// signature header's PGP tag.
    pub fn set_signer<F>(&mut self, signer: F)
    where
        F: Fn(&[u8]) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.signer = Some(Box::new(signer));
    }

    /// Assemble the package and write it to `writer`.
    ///
    /// This consumes the builder's payload state; a second call fails with
    /// [RpmPackagingError::WriteAfterClose] without touching the writer.
    pub fn write<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        if self.closed {
            return Err(RpmPackagingError::WriteAfterClose);
        }
        if self.meta.name.is_empty() {
            return Err(RpmPackagingError::MissingMetadata("name"));
        }
        if self.meta.version.is_empty() {
            return Err(RpmPackagingError::MissingMetadata("version"));
        }

        let mut cpio = self.cpio.take().ok_or(RpmPackagingError::WriteAfterClose)?;

        // BTreeMap iteration gives ascending full-path order, which must
        // match between the header file arrays and the cpio stream.
        let files = std::mem::take(&mut self.files);
        for (path, file) in &files {
            self.append_file(&mut cpio, path, file)?;
        }

        // The cpio trailer must be written before the compressor flushes.
        let compressed = cpio.finish()?.finish()?;

        self.ensure_self_provides();

        let mut header = Header::immutable();
        self.add_general_tags(&mut header)?;
        self.add_relation_tags(&mut header);
        self.add_scriptlet_tags(&mut header);
        self.add_file_tags(&mut header);
        self.add_payload_tags(&mut header, &compressed);
        let header_bytes = header.to_bytes()?;

        let mut signature = Header::signature();
        signature.add(
            tags::SIG_SIZE,
            vec![int32(compressed.len() + header_bytes.len(), "signature size")?],
        );
        signature.add(tags::SIG_SHA256, hex_sha256(&header_bytes));
        signature.add(
            tags::SIG_PAYLOAD_SIZE,
            vec![int32(self.payload_size, "signature payload size")?],
        );
        if let Some(signer) = &self.signer {
            let blob = signer(&header_bytes).map_err(RpmPackagingError::Sign)?;
            signature.add(tags::SIG_PGP, EntryValue::Binary(blob));
        }
        let signature_bytes = signature.to_bytes()?;

        debug!(
            "writing rpm {}-{}: {} files, {} payload bytes ({} compressed)",
            self.meta.name,
            self.full_version(),
            self.basenames.len(),
            self.payload_size,
            compressed.len(),
        );

        writer.write_all(&lead(&self.meta.name, &self.full_version()))?;
        writer.write_all(&signature_bytes)?;
        // The immutable header must start on an 8-byte boundary. The lead
        // is 96 bytes, so only the signature header needs padding out.
        writer.write_all(&vec![0u8; (8 - signature_bytes.len() % 8) % 8])?;
        writer.write_all(&header_bytes)?;
        writer.write_all(&compressed)?;

        self.closed = true;

        Ok(())
    }

    /// Record one file in the parallel header arrays and, unless it is a
    /// ghost, the cpio stream.
    fn append_file(&mut self, cpio: &mut NewcWriter<Compressor>, path: &str, file: &RpmFile) -> Result<()> {
        let (dir, base) = split_path(path);
        let dir_index = self.dirs.get(dir);
        self.dirindexes.push(dir_index);
        self.basenames.push(base.to_string());
        self.fileowners.push(name_or_root(&file.owner));
        self.filegroups.push(name_or_root(&file.group));
        self.filemtimes.push(file.mtime);
        self.fileflags.push(file.flags);

        let ghost = file.flags & FILE_FLAG_GHOST != 0;
        let mut mode = file.mode;
        let mut nlink = 1;
        if ghost {
            // Tracked as a regular file with no shipped content.
            mode |= 0o100000;
            self.filesizes.push(0);
            self.filedigests.push(String::new());
            self.filelinktos.push(String::new());
        } else if mode & 0o40000 != 0 {
            self.filesizes.push(4096);
            self.filedigests.push(String::new());
            self.filelinktos.push(String::new());
            nlink = 2;
        } else if mode & 0o120000 == 0o120000 {
            self.filesizes.push(file.body.len() as u32);
            self.filedigests.push(String::new());
            self.filelinktos.push(String::from_utf8_lossy(&file.body).into_owned());
        } else {
            mode |= 0o100000;
            self.filesizes.push(file.body.len() as u32);
            self.filedigests.push(hex_sha256(&file.body));
            self.filelinktos.push(String::new());
        }
        self.filemodes.push(mode as u16);

        if !ghost {
            cpio.append(path, mode, file.mtime, nlink, &file.body)?;
            self.payload_size += file.body.len() as u64;
        }

        Ok(())
    }

    /// Guarantee the package provides itself at its exact version. A
    /// caller-supplied entry naming the package is rewritten; otherwise a
    /// synthetic entry is appended.
    fn ensure_self_provides(&mut self) {
        let full_version = self.full_version();

        let mut found = false;
        for relation in self.provides.iter_mut() {
            if relation.name == self.meta.name {
                relation.version = full_version.clone();
                relation.sense = RpmSense::EQUAL;
                found = true;
            }
        }

        if found {
            // Rewriting may have collapsed several user entries into
            // identical ones.
            self.provides.dedup();
        } else {
            self.provides.add(Relation {
                name: self.meta.name.clone(),
                version: full_version,
                sense: RpmSense::EQUAL,
            });
        }
    }

    fn add_general_tags(&self, header: &mut Header) -> Result<()> {
        header.add(tags::HEADER_I18N_TABLE, "C");
        header.add(tags::SIZE, vec![int32(self.payload_size, "payload size")?]);
        header.add(tags::NAME, self.meta.name.clone());
        header.add(tags::VERSION, self.meta.version.clone());
        header.add(tags::RELEASE, self.meta.release.clone());
        header.add(tags::SUMMARY, self.meta.summary.clone());
        header.add(tags::DESCRIPTION, self.meta.description.clone());
        header.add(tags::OS, self.meta.os.clone());
        header.add(tags::ARCH, self.meta.arch.clone());
        header.add(tags::VENDOR, self.meta.vendor.clone());
        header.add(tags::URL, self.meta.url.clone());
        header.add(tags::PACKAGER, self.meta.packager.clone());
        header.add(tags::GROUP, self.meta.group.clone());
        header.add(tags::LICENCE, self.meta.licence.clone());

        // rpm utilities deduce from the presence of a sourcerpm tag that
        // this is not a source rpm.
        header.add(
            tags::SOURCE_RPM,
            format!("{}-{}.src.rpm", self.meta.name, self.full_version()),
        );

        if let Some(build_time) = self.meta.build_time {
            header.add(tags::BUILD_TIME, vec![build_time as i32]);
        }
        if let Some(epoch) = self.meta.epoch {
            header.add(tags::EPOCH, vec![epoch as i32]);
        }
        if !self.meta.prefixes.is_empty() {
            header.add(tags::PREFIXES, self.meta.prefixes.clone());
        }

        Ok(())
    }

    fn add_relation_tags(&self, header: &mut Header) {
        self.provides
            .apply_to_header(header, tags::PROVIDE_NAME, tags::PROVIDE_VERSION, tags::PROVIDE_FLAGS);
        self.requires
            .apply_to_header(header, tags::REQUIRE_NAME, tags::REQUIRE_VERSION, tags::REQUIRE_FLAGS);
        self.obsoletes
            .apply_to_header(header, tags::OBSOLETE_NAME, tags::OBSOLETE_VERSION, tags::OBSOLETE_FLAGS);
        self.suggests
            .apply_to_header(header, tags::SUGGEST_NAME, tags::SUGGEST_VERSION, tags::SUGGEST_FLAGS);
        self.recommends
            .apply_to_header(header, tags::RECOMMEND_NAME, tags::RECOMMEND_VERSION, tags::RECOMMEND_FLAGS);
        self.conflicts
            .apply_to_header(header, tags::CONFLICT_NAME, tags::CONFLICT_VERSION, tags::CONFLICT_FLAGS);
    }

    fn add_scriptlet_tags(&self, header: &mut Header) {
        for (slot, interpreter, body) in self.scriptlets.resolve() {
            let (body_tag, prog_tag) = slot.tag_pair();
            header.add(body_tag, body);
            header.add(prog_tag, interpreter);
        }
    }

    fn add_file_tags(&self, header: &mut Header) {
        header.add(tags::BASENAMES, self.basenames.clone());
        header.add(tags::DIR_INDEXES, self.dirindexes.clone());
        header.add(tags::DIR_NAMES, self.dirs.all().to_vec());
        header.add(tags::FILE_SIZES, self.filesizes.clone());
        header.add(tags::FILE_MODES, self.filemodes.clone());
        header.add(tags::FILE_USERNAME, self.fileowners.clone());
        header.add(tags::FILE_GROUPNAME, self.filegroups.clone());
        header.add(tags::FILE_MTIMES, self.filemtimes.clone());
        header.add(tags::FILE_DIGESTS, self.filedigests.clone());
        header.add(tags::FILE_LINKTOS, self.filelinktos.clone());
        header.add(tags::FILE_FLAGS, self.fileflags.clone());

        let count = self.basenames.len();
        header.add(tags::FILE_INODES, (1..=count as i32).collect::<Vec<i32>>());
        // Only sha256 digests are emitted, algo id 8.
        header.add(tags::FILE_DIGEST_ALGO, vec![8i32; count]);
        // All verification checks enabled for every file.
        header.add(tags::FILE_VERIFY_FLAGS, vec![-1i32; count]);
        header.add(tags::FILE_RDEVS, vec![1u16; count]);
        header.add(tags::FILE_LANGS, vec![String::new(); count]);
    }

    fn add_payload_tags(&self, header: &mut Header, compressed: &[u8]) {
        header.add(tags::PAYLOAD_FORMAT, "cpio");
        header.add(tags::PAYLOAD_COMPRESSOR, self.compressor_name);
        header.add(tags::PAYLOAD_FLAGS, "9");
        header.add(tags::PAYLOAD_DIGEST, vec![hex_sha256(compressed)]);
        header.add(tags::PAYLOAD_DIGEST_ALGO, vec![8i32]);
    }
}

/// Split a path into its parent (with trailing slash) and final component.
fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(index) => (&path[..=index], &path[index + 1..]),
        None => ("", path),
    }
}

fn name_or_root(name: &str) -> String {
    if name.is_empty() {
        "root".to_string()
    } else {
        name.to_string()
    }
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn int32<T: TryInto<i32>>(value: T, what: &'static str) -> Result<i32> {
    value
        .try_into()
        .map_err(|_| RpmPackagingError::EncodingOverflow(what))
}
