//! File and directory entry types.

use std::collections::BTreeMap;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Modification timestamp carried by entries.
pub type Timestamp = DateTime<Utc>;

/// Per-extension rollup, keyed by extension within one directory.
pub type Extensions = BTreeMap<CompactString, ExtensionEntry>;

/// Size, count and latest modification of all files sharing one extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionEntry {
    /// The extension key, including the leading dot, or empty.
    #[serde(default)]
    pub name: CompactString,

    /// Total size in bytes.
    #[serde(default)]
    pub size: u64,

    /// Number of files.
    #[serde(default)]
    pub count: u64,

    /// Latest modification time among the files.
    #[serde(rename = "time", default, with = "time_or_zero")]
    pub modified: Option<Timestamp>,
}

impl ExtensionEntry {
    /// Create an empty rollup for `name`.
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add `count` files totalling `size` bytes.
    pub fn add(&mut self, size: u64, count: u64, modified: Option<Timestamp>) {
        self.size += size;
        self.count += count;
        self.modified = self.modified.max(modified);
    }
}

/// A file or directory value stored in a [`crate::Tree`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File/directory name (not full path).
    #[serde(default)]
    pub name: CompactString,

    /// Whether this entry is a directory.
    #[serde(default)]
    pub is_dir: bool,

    /// Size in bytes (aggregate for directories).
    #[serde(default)]
    pub size: u64,

    /// 1 for a file, number of files below for a directory.
    #[serde(default)]
    pub count: u64,

    /// Latest modification time (aggregate for directories).
    #[serde(rename = "time", default, with = "time_or_zero")]
    pub modified: Option<Timestamp>,

    /// Extension rollup; `None` for files.
    #[serde(default)]
    pub extensions: Option<Extensions>,
}

impl FileEntry {
    /// Create a file entry.
    pub fn file(
        name: impl Into<CompactString>,
        size: u64,
        modified: Option<Timestamp>,
    ) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            size,
            count: 1,
            modified,
            extensions: None,
        }
    }

    /// Create an empty directory entry.
    pub fn directory(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            size: 0,
            count: 0,
            modified: None,
            extensions: Some(Extensions::new()),
        }
    }

    /// Add `count` files totalling `size` bytes to this entry's scalar totals.
    pub fn add(&mut self, size: u64, count: u64, modified: Option<Timestamp>) {
        self.size += size;
        self.count += count;
        self.modified = self.modified.max(modified);
    }

    /// Account for one file directly inside this directory, including its
    /// extension rollup.
    pub fn add_file(&mut self, file_name: &str, size: u64, modified: Option<Timestamp>) {
        self.add(size, 1, modified);
        let ext = extension_of(file_name);
        self.extensions
            .get_or_insert_with(Extensions::new)
            .entry(CompactString::from(ext))
            .or_insert_with(|| ExtensionEntry::new(ext))
            .add(size, 1, modified);
    }

    /// Merge another extension table into this one, key by key.
    pub fn merge_extensions(&mut self, other: &Extensions) {
        let own = self.extensions.get_or_insert_with(Extensions::new);
        for (key, entry) in other {
            own.entry(key.clone())
                .or_insert_with(|| ExtensionEntry::new(key.clone()))
                .add(entry.size, entry.count, entry.modified);
        }
    }

    /// Fold a child's rolled-up totals into this entry.
    ///
    /// Only directory children contribute; files were already accounted in
    /// their parent while walking.
    pub fn merge_child(&mut self, child: &FileEntry) {
        if !child.is_dir {
            return;
        }
        self.add(child.size, child.count, child.modified);
        if let Some(ext) = &child.extensions {
            self.merge_extensions(ext);
        }
    }
}

/// Extension key of a file name: the suffix from the last `.`, or empty.
///
/// `archive.tar.gz` gives `.gz`, `.bashrc` gives `.bashrc`, `README` gives `""`.
pub fn extension_of(file_name: &str) -> &str {
    file_name.rfind('.').map_or("", |i| &file_name[i..])
}

/// Convert a filesystem timestamp.
pub fn timestamp(time: SystemTime) -> Timestamp {
    Timestamp::from(time)
}

/// RFC 3339 timestamps where "unset" travels as the zero time.
mod time_or_zero {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Timestamp;

    const ZERO: &str = "0001-01-01T00:00:00Z";

    pub fn serialize<S>(time: &Option<Timestamp>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_str(ZERO),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") | Some(ZERO) => Ok(None),
            Some(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}
