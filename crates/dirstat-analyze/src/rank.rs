//! Display ordering of sibling entries with optional tail bucketing.
//!
//! Ranking never touches the tree: it returns borrowed rows in display order,
//! where the tail past the cutoff is folded into one [`SkippedBucket`].

use std::cmp::Ordering;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::trace;

use dirstat_core::{ExtensionEntry, FileEntry, Timestamp, Tree};

/// Key that siblings are ordered by.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Largest first.
    #[default]
    Size,
    /// Most files first.
    Count,
    /// Oldest modification first; unset times come before everything.
    Age,
    /// Case-insensitive alphabetical.
    Name,
}

impl SortKey {
    /// Whether a cutoff bucket can be formed for this key.
    pub fn supports_cutoff(self) -> bool {
        matches!(self, Self::Size | Self::Count)
    }
}

/// Anything that can be shown as a row of a listing.
pub trait Measured {
    fn name(&self) -> &str;
    fn size(&self) -> u64;
    fn count(&self) -> u64;
    fn modified(&self) -> Option<Timestamp>;
}

impl Measured for FileEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn modified(&self) -> Option<Timestamp> {
        self.modified
    }
}

impl Measured for ExtensionEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn modified(&self) -> Option<Timestamp> {
        self.modified
    }
}

impl Measured for Tree<FileEntry> {
    fn name(&self) -> &str {
        &self.value.name
    }

    fn size(&self) -> u64 {
        self.value.size
    }

    fn count(&self) -> u64 {
        self.value.count
    }

    fn modified(&self) -> Option<Timestamp> {
        self.value.modified
    }
}

/// Summed statistics of the entries hidden by a cutoff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkippedBucket {
    /// Display name, `<skipped N>`.
    pub name: String,
    /// Number of entries folded into the bucket.
    pub skipped: usize,
    pub size: u64,
    pub count: u64,
    pub modified: Option<Timestamp>,
}

impl SkippedBucket {
    fn absorb(&mut self, item: &impl Measured) {
        self.skipped += 1;
        self.size += item.size();
        self.count += item.count();
        self.modified = self.modified.max(item.modified());
    }
}

impl Measured for SkippedBucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn modified(&self) -> Option<Timestamp> {
        self.modified
    }
}

/// One row of a ranked listing.
#[derive(Debug, Clone, PartialEq)]
pub enum Row<'a, T> {
    /// A real sibling, borrowed from the tree.
    Item(&'a T),
    /// The folded tail; always the last row when present.
    Skipped(SkippedBucket),
}

impl<'a, T> Row<'a, T> {
    /// The borrowed sibling, if this is not the bucket.
    pub fn item(&self) -> Option<&'a T> {
        match self {
            Self::Item(item) => Some(*item),
            Self::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

impl<T: Measured> Measured for Row<'_, T> {
    fn name(&self) -> &str {
        match self {
            Self::Item(item) => item.name(),
            Self::Skipped(bucket) => bucket.name(),
        }
    }

    fn size(&self) -> u64 {
        match self {
            Self::Item(item) => item.size(),
            Self::Skipped(bucket) => bucket.size,
        }
    }

    fn count(&self) -> u64 {
        match self {
            Self::Item(item) => item.count(),
            Self::Skipped(bucket) => bucket.count,
        }
    }

    fn modified(&self) -> Option<Timestamp> {
        match self {
            Self::Item(item) => item.modified(),
            Self::Skipped(bucket) => bucket.modified,
        }
    }
}

/// Configuration for ranking.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct RankConfig {
    /// Ordering key.
    #[builder(default)]
    #[serde(default)]
    pub key: SortKey,

    /// Fraction of the key total to show before bucketing the rest.
    /// 1.0 shows everything.
    #[builder(default = "1.0")]
    #[serde(default = "default_cutoff")]
    pub cutoff: f64,
}

fn default_cutoff() -> f64 {
    1.0
}

impl RankConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(cutoff) = self.cutoff {
            if !(cutoff > 0.0 && cutoff <= 1.0) {
                return Err(format!("cutoff must be in (0, 1], got {cutoff}"));
            }
        }
        Ok(())
    }
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            key: SortKey::default(),
            cutoff: default_cutoff(),
        }
    }
}

impl RankConfig {
    /// Create a new config builder.
    pub fn builder() -> RankConfigBuilder {
        RankConfigBuilder::default()
    }
}

/// Orders sibling lists for display.
#[derive(Debug, Clone, Default)]
pub struct Ranker {
    config: RankConfig,
}

impl Ranker {
    /// Create a ranker with the given configuration.
    pub fn new(config: RankConfig) -> Self {
        Self { config }
    }

    /// Create a ranker for `key` without a cutoff.
    pub fn with_key(key: SortKey) -> Self {
        Self::new(RankConfig {
            key,
            ..RankConfig::default()
        })
    }

    /// Order `items` by the configured key.
    ///
    /// For size and count with a cutoff below 1, rows are kept until their
    /// running total first exceeds `cutoff * total`; everything after that
    /// row is folded into a trailing [`Row::Skipped`].
    pub fn rank<'a, T, I>(&self, items: I) -> Vec<Row<'a, T>>
    where
        T: Measured + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut sorted: Vec<&'a T> = items.into_iter().collect();
        let key = self.config.key;
        sorted.sort_by(|a, b| compare(key, *a, *b));

        if !key.supports_cutoff() || self.config.cutoff >= 1.0 {
            return sorted.into_iter().map(Row::Item).collect();
        }

        let metric = |item: &T| match key {
            SortKey::Count => item.count(),
            _ => item.size(),
        };
        let total: u64 = sorted.iter().map(|&item| metric(item)).sum();
        let threshold = total as f64 * self.config.cutoff;

        let mut rows = Vec::with_capacity(sorted.len());
        let mut bucket = SkippedBucket::default();
        let mut running = 0u64;
        let mut cut = false;

        for item in sorted {
            if cut {
                bucket.absorb(item);
            } else {
                rows.push(Row::Item(item));
            }
            running += metric(item);
            if running as f64 > threshold {
                cut = true;
            }
        }

        if bucket.skipped > 0 {
            trace!(skipped = bucket.skipped, key = %key, "folded tail into bucket");
            bucket.name = format!("<skipped {}>", bucket.skipped);
            rows.push(Row::Skipped(bucket));
        }
        rows
    }
}

/// Stable display comparison for `key`.
fn compare<T: Measured>(key: SortKey, a: &T, b: &T) -> Ordering {
    match key {
        SortKey::Size => b.size().cmp(&a.size()),
        SortKey::Count => b.count().cmp(&a.count()),
        SortKey::Age => a.modified().cmp(&b.modified()),
        SortKey::Name => a
            .name()
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(b.name().chars().flat_map(char::to_lowercase)),
    }
}
