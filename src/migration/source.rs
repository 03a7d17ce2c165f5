//! Migration script sources
//!
//! A script source is a read-only, flat set of named entries. The catalog
//! builder only needs to list them and read them, which keeps the engine
//! testable against [`MemorySource`] without touching the filesystem.

use crate::migration::CatalogError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Kind of a listed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry of a script source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    /// Bare file name, e.g. `1700000000000_init.up.sql`
    pub name: String,
    pub kind: EntryKind,
}

impl ScriptEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
        }
    }
}

/// Read-only provider of migration scripts
pub trait ScriptSource {
    /// Human-readable location, used in error messages
    fn location(&self) -> String;

    /// List every entry
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::List` if the source cannot be enumerated.
    fn entries(&self) -> Result<Vec<ScriptEntry>, CatalogError>;

    /// Read the entry called `name`
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Read` if the entry cannot be read.
    fn read(&self, name: &str) -> Result<String, CatalogError>;
}

/// Scripts stored as files in one directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ScriptSource for DirectorySource {
    fn location(&self) -> String {
        self.dir.display().to_string()
    }

    fn entries(&self) -> Result<Vec<ScriptEntry>, CatalogError> {
        let list_error = |source: io::Error| CatalogError::List {
            location: self.location(),
            source,
        };

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(list_error)? {
            let entry = entry.map_err(list_error)?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    log::warn!(
                        "Skipping file with invalid migration filename: {}",
                        raw.to_string_lossy()
                    );
                    continue;
                }
            };
            let kind = if entry.file_type().map_err(list_error)?.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(ScriptEntry { name, kind });
        }
        Ok(entries)
    }

    fn read(&self, name: &str) -> Result<String, CatalogError> {
        fs::read_to_string(self.dir.join(name)).map_err(|source| CatalogError::Read {
            name: name.to_string(),
            source,
        })
    }
}

/// Scripts held in memory
///
/// Entries are listed in insertion order. Useful for tests and for script sets
/// compiled into the binary with `include_str!`.
///
/// # Example
///
/// ```rust
/// use sluice::migration::MemorySource;
///
/// static SCRIPTS: &[(&str, &str)] = &[
///     ("1700000000000_init.up.sql", "CREATE TABLE users (id INTEGER PRIMARY KEY);"),
///     ("1700000000000_init.down.sql", "DROP TABLE users;"),
/// ];
///
/// let source = MemorySource::from_static(SCRIPTS);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: Vec<(ScriptEntry, String)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a source from `(file name, content)` pairs
    pub fn from_static(files: &[(&str, &str)]) -> Self {
        files
            .iter()
            .fold(Self::new(), |source, (name, content)| source.with_file(*name, *content))
    }

    /// Add a file entry
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.entries.push((ScriptEntry::file(name), content.into()));
        self
    }

    /// Add a directory entry
    #[must_use]
    pub fn with_dir(mut self, name: impl Into<String>) -> Self {
        self.entries.push((ScriptEntry::directory(name), String::new()));
        self
    }

    /// Add both scripts of a migration
    #[must_use]
    pub fn with_migration(self, id: &str, up: impl Into<String>, down: impl Into<String>) -> Self {
        self.with_file(format!("{id}.up.sql"), up)
            .with_file(format!("{id}.down.sql"), down)
    }
}

impl ScriptSource for MemorySource {
    fn location(&self) -> String {
        "<memory>".to_string()
    }

    fn entries(&self) -> Result<Vec<ScriptEntry>, CatalogError> {
        Ok(self.entries.iter().map(|(entry, _)| entry.clone()).collect())
    }

    fn read(&self, name: &str) -> Result<String, CatalogError> {
        self.entries
            .iter()
            .find(|(entry, _)| entry.kind == EntryKind::File && entry.name == name)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| CatalogError::Read {
                name: name.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such script"),
            })
    }
}
