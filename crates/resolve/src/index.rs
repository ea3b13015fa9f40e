use std::collections::HashSet;

use tracing::debug;

use crate::record::{EntityRecord, MatchCandidate};
use crate::scorer::partial_ratio;

/// Minimum partial-ratio score for a fuzzy hit. Anything at or below this is
/// treated as unrelated, not as a weak match.
const MIN_SCORE: f32 = 60.0;

/// Default number of results from `search` and `suggest`.
pub const DEFAULT_LIMIT: usize = 10;

/// Which fields an index searches and how it identifies entities.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Fields scored against the query, in priority order (ties in score
    /// keep this order).
    pub search_fields: Vec<String>,
    /// Field whose value identifies an entity; results are deduplicated on it.
    pub primary_key: String,
    /// Fields whose values feed `suggest`. Defaults to the primary key.
    pub display_fields: Vec<String>,
}

impl IndexConfig {
    pub fn new(search_fields: Vec<String>, primary_key: impl Into<String>) -> Self {
        let primary_key = primary_key.into();
        Self {
            search_fields,
            display_fields: vec![primary_key.clone()],
            primary_key,
        }
    }

    pub fn with_display_fields(mut self, display_fields: Vec<String>) -> Self {
        self.display_fields = display_fields;
        self
    }
}

/// In-memory fuzzy index over the text fields of a record set.
///
/// The snapshot taken at build time is immutable; all queries are `&self`
/// and safe to run from any number of tasks concurrently.
pub struct FuzzyIndex {
    records: Vec<EntityRecord>,
    config: IndexConfig,
    /// Distinct display names, sorted, for `suggest`.
    display_names: Vec<String>,
}

impl FuzzyIndex {
    pub fn build(records: Vec<EntityRecord>, config: IndexConfig) -> Self {
        let mut seen = HashSet::new();
        let mut display_names = Vec::new();
        for field in &config.display_fields {
            for record in &records {
                if let Some(value) = record.get(field) {
                    if !value.trim().is_empty() && seen.insert(value.to_string()) {
                        display_names.push(value.to_string());
                    }
                }
            }
        }
        display_names.sort();

        Self {
            records,
            config,
            display_names,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ranked, deduplicated candidates for a free-text query.
    ///
    /// Every configured field of every record is scored; hits above the
    /// confidence floor are merged across fields, sorted descending by score
    /// (stable, so ties keep field-then-row order), deduplicated by primary
    /// key keeping the best hit per entity, and truncated to `limit`.
    ///
    /// When the same value appears on multiple records, the first row wins.
    /// That is a known tradeoff for duplicate data, not a defect.
    pub fn search(&self, query: &str, limit: usize) -> Vec<MatchCandidate> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<MatchCandidate> = Vec::new();
        for field in &self.config.search_fields {
            let mut seen_values: HashSet<&str> = HashSet::new();
            for record in &self.records {
                let Some(value) = record.get(field) else {
                    continue;
                };
                if value.is_empty() || !seen_values.insert(value) {
                    continue;
                }
                let score = partial_ratio(query, value);
                if score > MIN_SCORE {
                    hits.push(MatchCandidate {
                        record: record.clone(),
                        score,
                        matched_field: field.clone(),
                        matched_value: value.to_string(),
                    });
                }
            }
        }

        // Stable sort keeps first-encountered order on equal scores.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut seen_keys = HashSet::new();
        let mut results = Vec::new();
        for hit in hits {
            if results.len() >= limit {
                break;
            }
            // Records without a primary key fall back to the matched value,
            // so they still deduplicate against themselves.
            let key = hit
                .record
                .get(&self.config.primary_key)
                .unwrap_or(&hit.matched_value)
                .to_string();
            if seen_keys.insert(key) {
                results.push(hit);
            }
        }

        debug!(query, results = results.len(), "fuzzy search");
        results
    }

    /// Autocomplete over the display names.
    ///
    /// Case-insensitive substring hits come first, unfiltered by score; if
    /// fewer than `limit`, fuzzy hits above the confidence floor backfill,
    /// best first.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<String> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut suggestions: Vec<String> = self
            .display_names
            .iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .cloned()
            .collect();

        if suggestions.len() < limit {
            let mut fuzzy: Vec<(&String, f32)> = self
                .display_names
                .iter()
                .filter(|name| !suggestions.contains(name))
                .map(|name| (name, partial_ratio(query, name)))
                .filter(|(_, score)| *score > MIN_SCORE)
                .collect();
            fuzzy.sort_by(|a, b| b.1.total_cmp(&a.1));

            for (name, _) in fuzzy {
                if suggestions.len() >= limit {
                    break;
                }
                suggestions.push(name.clone());
            }
        }

        suggestions.truncate(limit);
        suggestions
    }
}
