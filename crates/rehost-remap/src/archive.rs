//! Archive container I/O.
//!
//! Archives are read whole into memory: mod archives are small, and the
//! metadata step needs random access to delete and replace entries, which
//! the zip format cannot do in place.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::trace;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::engine::OutputSink;
use crate::error::{RemapError, RemapResult};

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

fn options() -> FileOptions {
    FileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Whether an entry holds a compiled unit the engine should rename.
pub fn is_class_entry(name: &str) -> bool {
    name.ends_with(".class") && !name.starts_with("META-INF/")
}

/// Jar signature files, which no longer match once units are rewritten.
pub fn is_signature_entry(name: &str) -> bool {
    let Some(file) = name.strip_prefix("META-INF/") else {
        return false;
    };
    if file.contains('/') {
        return false;
    }
    let upper = file.to_ascii_uppercase();
    upper.starts_with("SIG-") || [".SF", ".RSA", ".DSA", ".EC"].iter().any(|ext| upper.ends_with(ext))
}

/// The main section of a jar manifest, without per-entry digests.
pub fn main_manifest_section(text: &str) -> String {
    text.split_inclusive('\n')
        .take_while(|line| !line.trim_end_matches(['\r', '\n']).is_empty())
        .collect()
}

/// Look up an attribute in the main section of a jar manifest, joining
/// continuation lines.
pub fn manifest_attribute(text: &str, key: &str) -> Option<String> {
    let mut current: Option<(String, String)> = None;
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }
        if let Some(rest) = line.strip_prefix(' ') {
            if let Some((_, value)) = current.as_mut() {
                value.push_str(rest);
            }
            continue;
        }
        if let Some((name, value)) = current.take() {
            if name.eq_ignore_ascii_case(key) {
                return Some(value);
            }
        }
        current = line
            .split_once(':')
            .map(|(name, value)| (name.trim().to_string(), value.trim_start().to_string()));
    }
    current.filter(|(name, _)| name.eq_ignore_ascii_case(key)).map(|(_, value)| value)
}

fn read_zip<R: Read + Seek>(reader: R) -> RemapResult<IndexMap<String, Vec<u8>>> {
    let mut zip = ZipArchive::new(reader)?;
    let mut entries = IndexMap::with_capacity(zip.len());
    for index in 0..zip.len() {
        let mut file = zip.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        entries.insert(name, data);
    }
    Ok(entries)
}

/// The entries of one archive, in their original order.
#[derive(Clone, Debug, Default)]
pub struct ArchiveContents {
    entries: IndexMap<String, Vec<u8>>,
}

impl ArchiveContents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(path: &Path) -> RemapResult<Self> {
        let file = File::open(path)?;
        let entries = read_zip(BufReader::new(file))?;
        trace!(path = %path.display(), entries = entries.len(), "read archive");
        Ok(Self { entries })
    }

    pub fn from_bytes(bytes: &[u8]) -> RemapResult<Self> {
        Ok(Self {
            entries: read_zip(Cursor::new(bytes))?,
        })
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Add or replace an entry. A replaced entry keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) -> Option<Vec<u8>> {
        self.entries.insert(name.into(), data)
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries.shift_remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_bytes(&self) -> RemapResult<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in &self.entries {
            zip.start_file(name.as_str(), options())?;
            zip.write_all(data)?;
        }
        Ok(zip.finish()?.into_inner())
    }

    /// Write the archive to `path`, replacing it atomically.
    pub fn write(&self, path: &Path) -> RemapResult<()> {
        let bytes = self.to_bytes()?;
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        staged.write_all(&bytes)?;
        staged.persist(path).map_err(|err| RemapError::Persist {
            path: path.to_path_buf(),
            reason: err.error.to_string(),
        })?;
        Ok(())
    }
}

/// Streams entries into a new archive file.
pub struct ArchiveWriter {
    path: PathBuf,
    zip: ZipWriter<File>,
    written: HashSet<String>,
}

impl ArchiveWriter {
    pub fn create(path: &Path) -> RemapResult<Self> {
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            zip: ZipWriter::new(file),
            written: HashSet::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, name: &str) -> bool {
        self.written.contains(name)
    }

    /// Write the central directory and close the file.
    pub fn finish(mut self) -> RemapResult<()> {
        self.zip.finish()?;
        trace!(path = %self.path.display(), entries = self.written.len(), "wrote archive");
        Ok(())
    }
}

impl OutputSink for ArchiveWriter {
    fn accept(&mut self, name: &str, data: &[u8]) -> RemapResult<()> {
        if !self.written.insert(name.to_string()) {
            return Err(RemapError::DuplicateEntry(name.to_string()));
        }
        self.zip.start_file(name, options())?;
        self.zip.write_all(data)?;
        Ok(())
    }
}

/// Copy every non-class entry of `input` into `output`. Signature files
/// are dropped and the manifest is cut down to its main section. Returns
/// the number of entries copied.
pub fn copy_resources(input: &Path, output: &mut dyn OutputSink) -> RemapResult<usize> {
    let contents = ArchiveContents::read(input)?;
    let mut copied = 0;
    for (name, data) in contents.iter() {
        if is_class_entry(name) || is_signature_entry(name) {
            continue;
        }
        if name == MANIFEST_PATH {
            let text = String::from_utf8_lossy(data);
            output.accept(name, main_manifest_section(&text).as_bytes())?;
        } else {
            output.accept(name, data)?;
        }
        copied += 1;
    }
    Ok(copied)
}
