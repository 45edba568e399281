//! Lookup keys: the join keys of the facet caches and of the diff indexes.

use media_sync_models::{MediaIds, MediaRecord};
use std::collections::{HashMap, HashSet};

use crate::id_matching::{matches, normalize_title};

/// Key of the item identity itself, ignoring season/episode.
///
/// Primary ID, else secondary ID, else `title_year`.
pub fn identity_key(ids: &MediaIds, title: &str, year: Option<u32>) -> String {
    if let Some(trakt) = ids.primary() {
        return format!("trakt:{}", trakt);
    }
    if let Some(imdb) = ids.secondary() {
        return imdb.to_string();
    }
    match year {
        Some(year) => format!("{}_{}", normalize_title(title), year),
        None => normalize_title(title),
    }
}

fn with_episode(record: &MediaRecord, key: String) -> String {
    if record.is_episode_level() {
        format!(
            "{}_{}_{}",
            key,
            record.season.unwrap_or_default(),
            record.episode.unwrap_or_default()
        )
    } else {
        key
    }
}

/// Deterministic lookup key of a record; episode-level records are
/// `"{show-key}_{season}_{episode}"`.
pub fn lookup_key(record: &MediaRecord) -> String {
    with_episode(record, identity_key(&record.ids, &record.title, record.year))
}

/// Key under which episodes of the same show are grouped.
pub fn show_key(record: &MediaRecord) -> String {
    identity_key(&record.ids, &record.title, record.year)
}

/// Buckets of records by primary ID, secondary ID and normalized title, so a
/// lookup only runs [`matches`] against a handful of candidates.
pub struct RecordIndex<'a> {
    records: &'a [MediaRecord],
    by_primary: HashMap<String, Vec<usize>>,
    by_secondary: HashMap<String, Vec<usize>>,
    by_title: HashMap<String, Vec<usize>>,
}

impl<'a> RecordIndex<'a> {
    pub fn new(records: &'a [MediaRecord]) -> Self {
        let mut index = Self {
            records,
            by_primary: HashMap::new(),
            by_secondary: HashMap::new(),
            by_title: HashMap::new(),
        };
        for (i, record) in records.iter().enumerate() {
            if let Some(trakt) = record.ids.primary() {
                index.by_primary.entry(with_episode(record, trakt.to_string())).or_default().push(i);
            }
            if let Some(imdb) = record.ids.secondary() {
                index.by_secondary.entry(with_episode(record, imdb.to_string())).or_default().push(i);
            }
            let title = normalize_title(&record.title);
            if !title.is_empty() {
                index.by_title.entry(with_episode(record, title)).or_default().push(i);
            }
        }
        index
    }

    /// First indexed record that matches `target`, searching the buckets in
    /// identifier priority order.
    pub fn find(&self, target: &MediaRecord) -> Option<&'a MediaRecord> {
        self.find_all(target).into_iter().next()
    }

    /// Every indexed record that matches `target`, in identifier priority
    /// order. Duplicate copies of one item all show up here.
    pub fn find_all(&self, target: &MediaRecord) -> Vec<&'a MediaRecord> {
        let mut buckets = Vec::with_capacity(3);
        if let Some(trakt) = target.ids.primary() {
            buckets.push(self.by_primary.get(&with_episode(target, trakt.to_string())));
        }
        if let Some(imdb) = target.ids.secondary() {
            buckets.push(self.by_secondary.get(&with_episode(target, imdb.to_string())));
        }
        buckets.push(self.by_title.get(&with_episode(target, normalize_title(&target.title))));

        let mut seen = HashSet::new();
        buckets
            .into_iter()
            .flatten()
            .flatten()
            .filter(|&&i| seen.insert(i))
            .map(|&i| &self.records[i])
            .filter(|candidate| matches(target, candidate))
            .collect()
    }

    pub fn contains(&self, target: &MediaRecord) -> bool {
        self.find(target).is_some()
    }
}
