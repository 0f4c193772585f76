//! In-memory view of a ZIP-based OOXML package

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{EngineError, Result};
use crate::opc::canonical_part_name;

/// Upper bound on the inflated size of a single part read into memory.
pub const MAX_PART_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
enum PartOverride {
    Replace(Vec<u8>),
    Delete,
}

/// A package opened from bytes.
///
/// Reads go to the source archive; writes and deletes are recorded as
/// overrides and only materialize in [`Package::serialize`]. Entries without
/// an override are raw-copied, so their compressed bytes and compression
/// method survive unchanged.
pub struct Package {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    /// Canonical part names in archive order
    names: Vec<String>,
    /// Canonical part name -> archive index
    index: HashMap<String, usize>,
    overrides: HashMap<String, PartOverride>,
    /// Parts that did not exist in the source archive
    added: Vec<String>,
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("names", &self.names)
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .field("added", &self.added)
            .finish()
    }
}

impl Package {
    /// Open a package from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec()))
            .map_err(|e| EngineError::InvalidContainer(e.to_string()))?;

        let mut names = Vec::with_capacity(archive.len());
        let mut index = HashMap::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive
                .by_index_raw(i)
                .map_err(|e| EngineError::InvalidContainer(e.to_string()))?;
            let name = canonical_part_name(entry.name());
            // First entry wins when a producer wrote duplicates
            index.entry(name.clone()).or_insert(i);
            names.push(name);
        }

        log::debug!("opened package with {} entries", names.len());
        Ok(Self {
            archive,
            names,
            index,
            overrides: HashMap::new(),
            added: Vec::new(),
        })
    }

    /// Effective part names in serialization order, excluding directories and
    /// deleted parts.
    pub fn part_names(&self) -> Vec<&str> {
        self.names
            .iter()
            .chain(self.added.iter())
            .filter(|name| !name.ends_with('/'))
            .filter(|name| !matches!(self.overrides.get(*name), Some(PartOverride::Delete)))
            .map(String::as_str)
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = canonical_part_name(name);
        match self.overrides.get(&name) {
            Some(PartOverride::Delete) => false,
            Some(PartOverride::Replace(_)) => true,
            None => self.index.contains_key(&name),
        }
    }

    /// Read the current bytes of a part.
    pub fn read_part(&mut self, name: &str) -> Result<Vec<u8>> {
        let name = canonical_part_name(name);
        match self.overrides.get(&name) {
            Some(PartOverride::Replace(bytes)) => return Ok(bytes.clone()),
            Some(PartOverride::Delete) => return Err(EngineError::PartNotFound(name)),
            None => {}
        }

        let idx = *self
            .index
            .get(&name)
            .ok_or_else(|| EngineError::PartNotFound(name.clone()))?;
        let mut file = self.archive.by_index(idx)?;
        if file.size() > MAX_PART_BYTES {
            return Err(EngineError::InvalidContainer(format!(
                "part {} inflates to {} bytes, above the {} byte limit",
                name,
                file.size(),
                MAX_PART_BYTES
            )));
        }

        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Replace (or add) a part.
    pub fn write_part(&mut self, name: &str, bytes: Vec<u8>) {
        let name = canonical_part_name(name);
        if !self.index.contains_key(&name) && !self.added.contains(&name) {
            self.added.push(name.clone());
        }
        self.overrides.insert(name, PartOverride::Replace(bytes));
    }

    /// Delete a part. Fails when the part is not present.
    pub fn delete_part(&mut self, name: &str) -> Result<()> {
        if !self.contains(name) {
            return Err(EngineError::PartNotFound(canonical_part_name(name)));
        }
        let name = canonical_part_name(name);
        if let Some(pos) = self.added.iter().position(|n| *n == name) {
            self.added.remove(pos);
            self.overrides.remove(&name);
        } else {
            self.overrides.insert(name, PartOverride::Delete);
        }
        Ok(())
    }

    /// Write the package out as a new ZIP archive.
    ///
    /// Nothing is returned unless the whole archive was written.
    pub fn serialize(&mut self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for i in 0..self.archive.len() {
            let file = self.archive.by_index_raw(i)?;
            let name = canonical_part_name(file.name());
            if self.index.get(&name) != Some(&i) {
                // Shadowed duplicate entry
                continue;
            }

            match self.overrides.get(&name) {
                Some(PartOverride::Delete) => {}
                Some(PartOverride::Replace(bytes)) => {
                    let options =
                        SimpleFileOptions::default().compression_method(file.compression());
                    let entry_name = file.name().to_string();
                    drop(file);
                    writer.start_file(entry_name, options)?;
                    writer.write_all(bytes)?;
                }
                None => writer.raw_copy_file(file)?,
            }
        }

        for name in &self.added {
            if let Some(PartOverride::Replace(bytes)) = self.overrides.get(name) {
                let options =
                    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                writer.start_file(name.as_str(), options)?;
                writer.write_all(bytes)?;
            }
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}
