//! Fact catalog and the risk request draft built against it.
//!
//! The backend sends the catalog as a JSON object whose key order defines the
//! form layout. It is decoded straight into an ordered `Vec<Fact>` so the
//! order survives regardless of how `serde_json` stores maps.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Turn an identifier such as `gradeAverage` into `Grade Average`.
pub fn format_label(id: &str) -> String {
    let mut spaced = String::with_capacity(id.len() + 4);
    for c in id.chars() {
        if c.is_ascii_uppercase() {
            spaced.push(' ');
        }
        spaced.push(c);
    }
    let mut chars = spaced.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };
    capitalized.trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub id: String,
    pub label: String,
    /// Allowed values, in backend order.
    pub options: Vec<String>,
}

impl Fact {
    pub fn new(id: impl Into<String>, options: Vec<String>) -> Self {
        let id = id.into();
        Self {
            label: format_label(&id),
            id,
            options,
        }
    }

    pub fn allows(&self, value: &str) -> bool {
        self.options.iter().any(|o| o == value)
    }

    pub fn options_line(&self) -> String {
        self.options.join(" / ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactCatalog {
    facts: Vec<Fact>,
}

impl FactCatalog {
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<String>)>,
        K: Into<String>,
    {
        let mut catalog = FactCatalog::default();
        for (id, options) in pairs {
            catalog.upsert(id.into(), options);
        }
        catalog
    }

    // A repeated key keeps its first position and takes the last options.
    fn upsert(&mut self, id: String, options: Vec<String>) {
        match self.facts.iter_mut().find(|f| f.id == id) {
            Some(existing) => existing.options = options,
            None => self.facts.push(Fact::new(id, options)),
        }
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Fact> {
        self.facts.iter().find(|f| f.id == id)
    }
}

impl<'de> Deserialize<'de> for FactCatalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CatalogVisitor;

        impl<'de> Visitor<'de> for CatalogVisitor {
            type Value = FactCatalog;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping fact names to lists of options")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FactCatalog, A::Error> {
                let mut catalog = FactCatalog::default();
                while let Some((id, options)) = map.next_entry::<String, Vec<String>>()? {
                    catalog.upsert(id, options);
                }
                Ok(catalog)
            }
        }

        deserializer.deserialize_map(CatalogVisitor)
    }
}

// =============================================================================
// Draft and request body
// =============================================================================

/// Selections made so far. Keys keep the order in which they were first
/// touched; clearing a selection keeps the key but drops the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    entries: Vec<(String, Option<String>)>,
}

impl Draft {
    /// An empty value means "not specified".
    pub fn set(&mut self, id: &str, value: Option<&str>) {
        let value = value.filter(|v| !v.is_empty()).map(str::to_string);
        match self.entries.iter_mut().find(|(k, _)| k == id) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((id.to_string(), value)),
        }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == id)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn filled_count(&self) -> usize {
        self.entries.iter().filter(|(_, v)| v.is_some()).count()
    }

    pub fn to_request(&self) -> RiskRequest {
        RiskRequest {
            entries: self
                .entries
                .iter()
                .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
                .collect(),
        }
    }
}

/// Body of the evaluation call: only the facts that carry a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskRequest {
    entries: Vec<(String, String)>,
}

impl RiskRequest {
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for RiskRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_label() {
        assert_eq!(format_label("gradeAverage"), "Grade Average");
        assert_eq!(format_label("attendance"), "Attendance");
        assert_eq!(format_label("familyIncomeLevel"), "Family Income Level");
        assert_eq!(format_label("GPA"), "G P A");
        assert_eq!(format_label(""), "");
    }

    #[test]
    fn test_catalog_keeps_backend_order() {
        let raw = r#"{"gradeAverage":["High","Medium","Low"],"attendance":["Good","Poor"],"familyIncome":["Low","Medium","High"]}"#;
        let catalog: FactCatalog = serde_json::from_str(raw).unwrap();
        let ids: Vec<&str> = catalog.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["gradeAverage", "attendance", "familyIncome"]);
        assert_eq!(catalog.get("gradeAverage").unwrap().options, vec!["High", "Medium", "Low"]);
        assert_eq!(catalog.get("familyIncome").unwrap().label, "Family Income");
        assert_eq!(catalog.get("attendance").unwrap().options_line(), "Good / Poor");
    }

    #[test]
    fn test_catalog_rejects_non_object() {
        assert!(serde_json::from_str::<FactCatalog>(r#"["a","b"]"#).is_err());
        assert!(serde_json::from_str::<FactCatalog>(r#"{"a":"not a list"}"#).is_err());
    }

    #[test]
    fn test_repeated_key_keeps_first_position() {
        let catalog: FactCatalog = serde_json::from_str(r#"{"a":["1"],"b":["2"],"a":["3"]}"#).unwrap();
        let ids: Vec<&str> = catalog.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(catalog.get("a").unwrap().options, vec!["3"]);
    }

    #[test]
    fn test_draft_counts_only_filled_values() {
        let mut draft = Draft::default();
        draft.set("gradeAverage", Some("Low"));
        draft.set("attendance", Some(""));
        draft.set("familyIncome", Some("Low"));
        assert_eq!(draft.filled_count(), 2);
        draft.set("familyIncome", None);
        assert_eq!(draft.filled_count(), 1);
        assert_eq!(draft.get("gradeAverage"), Some("Low"));
        assert_eq!(draft.get("attendance"), None);
    }

    #[test]
    fn test_request_omits_unset_entries() {
        let mut draft = Draft::default();
        draft.set("gradeAverage", Some("Low"));
        draft.set("attendance", None);
        draft.set("familyIncome", Some("High"));
        let body = serde_json::to_string(&draft.to_request()).unwrap();
        assert_eq!(body, r#"{"gradeAverage":"Low","familyIncome":"High"}"#);
    }
}
