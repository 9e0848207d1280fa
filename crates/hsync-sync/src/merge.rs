//! History merge by URL.
//!
//! Local records seed a map keyed by `url`. Each remote record either
//! inserts a new entry (`remote_only`) or is folded into the existing one
//! (`updated`): newest `last_visit_time` wins, visit counts add up, and a
//! non-empty remote title replaces the local one. The id of the first record
//! seen for a URL is kept.

use std::collections::{HashMap, HashSet};

use hsync_core::HistoryItem;
use serde::Serialize;

/// Outcome of [`merge`]. Counters are derived while merging and read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    items: Vec<HistoryItem>,
    local_only: usize,
    remote_only: usize,
    updated: usize,
}

impl MergeResult {
    /// Merged records, newest first
    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<HistoryItem> {
        self.items
    }

    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    /// Local records whose URL matches no remote record
    pub fn local_only(&self) -> usize {
        self.local_only
    }

    /// Remote records whose URL was new
    pub fn remote_only(&self) -> usize {
        self.remote_only
    }

    /// Remote records folded into an existing URL
    pub fn updated(&self) -> usize {
        self.updated
    }
}

fn fold(existing: &mut HistoryItem, remote: &HistoryItem) {
    if let Some(title) = remote.title.as_deref().filter(|t| !t.is_empty()) {
        existing.title = Some(title.to_string());
    }
    existing.last_visit_time = existing.last_visit_time.max(remote.last_visit_time);
    existing.visit_count = existing.visit_count.saturating_add(remote.visit_count);
}

/// Merge local and remote history. Pure; inputs are not modified.
pub fn merge(local: &[HistoryItem], remote: &[HistoryItem]) -> MergeResult {
    // Preserve first-insertion order so the stable sort is deterministic
    let mut order: Vec<String> = Vec::with_capacity(local.len() + remote.len());
    let mut by_url: HashMap<String, HistoryItem> = HashMap::with_capacity(local.len());

    for item in local {
        if by_url.insert(item.url.clone(), item.clone()).is_none() {
            order.push(item.url.clone());
        }
    }

    let mut remote_only = 0usize;
    let mut updated = 0usize;
    for item in remote {
        match by_url.get_mut(&item.url) {
            Some(existing) => {
                fold(existing, item);
                updated += 1;
            }
            None => {
                by_url.insert(item.url.clone(), item.clone());
                order.push(item.url.clone());
                remote_only += 1;
            }
        }
    }

    let mut items: Vec<HistoryItem> = order
        .iter()
        .filter_map(|url| by_url.remove(url))
        .collect();
    items.sort_by(|a, b| b.last_visit_time.cmp(&a.last_visit_time));

    let remote_urls: HashSet<&str> = remote.iter().map(|i| i.url.as_str()).collect();
    let local_only = local
        .iter()
        .filter(|i| !remote_urls.contains(i.url.as_str()))
        .count();

    MergeResult {
        items,
        local_only,
        remote_only,
        updated,
    }
}
