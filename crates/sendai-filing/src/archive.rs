//! Filing package reading and entry classification.
//!
//! An EDINET filing package is a zip archive carrying the XBRL instance
//! (and its linkbases) at the document root, plus an optional
//! `XBRL_TO_CSV/` directory with one tab-delimited rendition file per
//! element category. Entries are decompressed into memory and classified;
//! nothing is written to disk.

use std::io::{Cursor, Read};

use crate::error::{FilingError, Result};

/// Zip local-file-header signature.
const ZIP_LOCAL_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
/// Zip end-of-central-directory signature (empty archive).
const ZIP_EMPTY_MAGIC: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

/// Reserved subdirectory holding the CSV rendition of the instance.
pub const CSV_RENDITION_DIR: &str = "XBRL_TO_CSV/";

/// Classification of a single package entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// An XBRL document (`.xbrl` or `.xml`) from the document root.
    XbrlInstance,
    /// A tab-delimited rendition file under [`CSV_RENDITION_DIR`].
    CsvRendition,
    /// Anything else; ignored downstream.
    Other,
}

/// A decompressed entry of a filing package.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Path of the entry inside the package.
    pub name: String,
    /// Classification used to pick a fact source.
    pub kind: EntryKind,
    /// Decompressed entry bytes.
    pub bytes: Vec<u8>,
}

/// An opened filing package with classified, in-memory entries.
#[derive(Debug)]
pub struct FilingArchive {
    entries: Vec<ArchiveEntry>,
}

impl FilingArchive {
    /// Open a filing package from raw archive bytes.
    ///
    /// Fails with [`FilingError::ArchiveFormat`] when the leading magic
    /// bytes are not a zip signature, and [`FilingError::ArchiveCorrupt`]
    /// when the central directory or an entry stream cannot be
    /// decompressed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(FilingError::ArchiveFormat(format!(
                "{} bytes is too short for an archive",
                bytes.len()
            )));
        }
        if bytes[..4] != ZIP_LOCAL_MAGIC && bytes[..4] != ZIP_EMPTY_MAGIC {
            return Err(FilingError::ArchiveFormat(
                "leading bytes do not match the zip signature".to_string(),
            ));
        }

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| FilingError::ArchiveCorrupt(e.to_string()))?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| FilingError::ArchiveCorrupt(e.to_string()))?;
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            let kind = classify_entry(&name);

            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)
                .map_err(|e| FilingError::ArchiveCorrupt(format!("{name}: {e}")))?;

            tracing::debug!(entry = %name, ?kind, size = buf.len(), "package entry");
            entries.push(ArchiveEntry {
                name,
                kind,
                bytes: buf,
            });
        }

        Ok(Self { entries })
    }

    /// All entries in package order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Entries of one classification, in package order.
    pub fn entries_of(&self, kind: EntryKind) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Whether the package carries at least one CSV rendition entry.
    pub fn has_csv_rendition(&self) -> bool {
        self.entries_of(EntryKind::CsvRendition).next().is_some()
    }

    /// Whether the package carries at least one XBRL document entry.
    pub fn has_xbrl_instance(&self) -> bool {
        self.entries_of(EntryKind::XbrlInstance).next().is_some()
    }
}

fn classify_entry(name: &str) -> EntryKind {
    let lower = name.to_ascii_lowercase();
    if name.contains(CSV_RENDITION_DIR) && lower.ends_with(".csv") {
        EntryKind::CsvRendition
    } else if lower.ends_with(".xbrl") || lower.ends_with(".xml") {
        EntryKind::XbrlInstance
    } else {
        EntryKind::Other
    }
}

/// Build an in-memory zip package from `(name, bytes)` pairs. Test helper.
#[cfg(test)]
pub(crate) fn build_package(files: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::{SimpleFileOptions, ZipWriter};

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
