use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One row of the dataset: field name -> string value.
///
/// Lookup contract: a missing field reads as `None`, never an error. Upstream
/// datasets are ragged and a record is not required to carry every column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    fields: HashMap<String, String>,
}

impl EntityRecord {
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Value of `field`, or `None` when the record does not carry it.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for EntityRecord {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl From<HashMap<String, String>> for EntityRecord {
    fn from(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }
}

/// One ranked hit from `FuzzyIndex::search`. Produced per query, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate {
    pub record: EntityRecord,
    /// Partial-ratio similarity on a 0-100 scale.
    pub score: f32,
    /// Which configured field produced the match.
    pub matched_field: String,
    /// The field value that matched.
    pub matched_value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_reads_as_none() {
        let mut record = EntityRecord::new();
        record.set("name", "Acme Capital");

        assert_eq!(record.get("name"), Some("Acme Capital"));
        assert_eq!(record.get("hq_location"), None);
    }
}
