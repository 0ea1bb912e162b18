//! Immutable view of the cached records and their tag index.

use crate::store::AssetRecord;
use std::collections::{BTreeSet, HashMap};

/// Sentinel tag that selects every record.
pub const ALL_TAG: &str = "all";

/// Distinct tag tokens across a set of records, `"all"` appended last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
    tags: Vec<String>,
}

impl TagIndex {
    /// Derive the index from every record's tag field.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AssetRecord>) -> Self {
        let mut tokens = BTreeSet::new();
        for record in records {
            if record.tags.trim().is_empty() {
                continue;
            }
            tokens.extend(record.tag_tokens().map(str::to_string));
        }

        // A user tag literally named "all" would shadow the sentinel.
        tokens.remove(ALL_TAG);

        let mut tags: Vec<String> = tokens.into_iter().collect();
        tags.push(ALL_TAG.to_string());
        Self { tags }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.tags
    }

    /// The first tag, used as the default selection.
    #[must_use]
    pub fn first(&self) -> &str {
        self.tags.first().map_or(ALL_TAG, String::as_str)
    }
}

/// One rebuild's worth of records and the tags derived from them.
///
/// Snapshots are never modified after construction; the cache swaps in a
/// new one on every rebuild.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    images: HashMap<String, AssetRecord>,
    tags: TagIndex,
    generation: u64,
}

impl CacheSnapshot {
    /// Build the name index and tag index from a full store read.
    #[must_use]
    pub fn build(records: Vec<AssetRecord>, generation: u64) -> Self {
        let tags = TagIndex::from_records(&records);
        let images = records
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();
        Self {
            images,
            tags,
            generation,
        }
    }

    /// Which rebuild produced this snapshot (0 = startup load).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AssetRecord> {
        self.images.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> impl Iterator<Item = &AssetRecord> {
        self.images.values()
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        self.tags.as_slice()
    }

    #[must_use]
    pub fn tag_index(&self) -> &TagIndex {
        &self.tags
    }

    /// Records carrying `tag`, or every record for [`ALL_TAG`].
    ///
    /// Sorted by name so callers get stable output.
    #[must_use]
    pub fn tagged(&self, tag: &str) -> Vec<&AssetRecord> {
        let mut out: Vec<&AssetRecord> = self
            .images
            .values()
            .filter(|record| tag == ALL_TAG || record.has_tag(tag))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Every record ordered by creation time, oldest first.
    #[must_use]
    pub fn by_creation(&self) -> Vec<&AssetRecord> {
        let mut out: Vec<&AssetRecord> = self.images.values().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        out
    }
}
