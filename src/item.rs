//! Core content types: the records every relevance signal is computed from.
//!
//! A [`ContentItem`] is one parsed, enriched piece of content identified by an
//! [`ItemId`] that stays stable across re-crawls. Items are immutable once
//! built; re-ingestion with a new content hash yields a new version that
//! replaces the old one under the same id.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Stable identifier for a content item.
///
/// Ordering is lexicographic on the underlying string; edges use it to store
/// each unordered pair exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Create an id from any string-like value.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A parsed content record with its enrichment signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Stable identifier.
    pub id: ItemId,
    /// Embedding vector produced by the upstream embedding model.
    pub embedding: Vec<f32>,
    /// Normalised topic labels.
    pub topics: BTreeSet<String>,
    /// Normalised named-entity labels.
    pub entities: BTreeSet<String>,
    /// Hash of the source content, used for change detection.
    pub content_hash: String,
}

impl ContentItem {
    /// Create an item, normalising topic and entity labels.
    pub fn new<T, E, S1, S2>(
        id: impl Into<ItemId>,
        embedding: Vec<f32>,
        topics: T,
        entities: E,
        content_hash: impl Into<String>,
    ) -> Self
    where
        T: IntoIterator<Item = S1>,
        E: IntoIterator<Item = S2>,
        S1: AsRef<str>,
        S2: AsRef<str>,
    {
        Self {
            id: id.into(),
            embedding,
            topics: normalize_topics(topics),
            entities: normalize_entities(entities),
            content_hash: content_hash.into(),
        }
    }

    /// Embedding dimension of this item.
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }

    /// Whether `other` is a different version of the same item.
    pub fn is_changed_version_of(&self, other: &ContentItem) -> bool {
        self.id == other.id && self.content_hash != other.content_hash
    }
}

// ---------------------------------------------------------------------------
// Label normalisation
// ---------------------------------------------------------------------------

/// Quotes, brackets and sentence punctuation around a label. Inner symbols
/// such as `+`, `#` and `.` are part of the topic ("C++", "C#", ".NET").
static TOPIC_EDGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[\s"'“‘«(\[{¡¿]+|[\s"'”’»)\]}!?,;:.]+$"#).expect("static topic regex is valid")
});

/// Leading honorifics and articles dropped from entity names.
const ENTITY_PREFIXES: &[&str] = &["prof.", "dr.", "professor", "the", "mr.", "ms.", "mrs."];

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalise a topic label: NFKC, lowercase, surrounding punctuation trimmed,
/// whitespace collapsed.
///
/// Returns `None` when nothing meaningful remains.
pub fn normalize_topic(label: &str) -> Option<String> {
    let folded: String = label.nfkc().collect::<String>().to_lowercase();
    let stripped = TOPIC_EDGE.replace_all(&folded, "");
    let collapsed = collapse_whitespace(&stripped);
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Normalise an entity name: NFKC, lowercase, whitespace collapsed, one title prefix removed.
///
/// "Prof. John Smith" becomes "john smith"; "The University of London"
/// becomes "university of london".
pub fn normalize_entity(name: &str) -> Option<String> {
    let folded = collapse_whitespace(&name.nfkc().collect::<String>().to_lowercase());
    let mut normalized = folded.as_str();
    for prefix in ENTITY_PREFIXES {
        if let Some(rest) = normalized.strip_prefix(prefix) {
            if let Some(rest) = rest.strip_prefix(' ') {
                normalized = rest;
                break;
            }
        }
    }
    let normalized = normalized.trim();
    (!normalized.is_empty()).then(|| normalized.to_string())
}

/// Normalise and deduplicate a collection of topic labels.
pub fn normalize_topics<I, S>(labels: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .filter_map(|l| normalize_topic(l.as_ref()))
        .collect()
}

/// Normalise and deduplicate a collection of entity names.
pub fn normalize_entities<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|n| normalize_entity(n.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_orders_lexicographically() {
        let a = ItemId::new("page/a");
        let b = ItemId::new("page/b");
        assert!(a < b);
        assert_eq!(a.to_string(), "page/a");
    }

    #[test]
    fn topic_normalisation() {
        assert_eq!(normalize_topic("  Machine   Learning! "), Some("machine learning".into()));
        assert_eq!(normalize_topic("Private-Equity"), Some("private-equity".into()));
        assert_eq!(normalize_topic("\"Venture Capital\","), Some("venture capital".into()));
        assert_eq!(normalize_topic("!!!"), None);
        assert_eq!(normalize_topic(""), None);
    }

    #[test]
    fn topic_symbols_keep_labels_distinct() {
        assert_eq!(normalize_topic("C++"), Some("c++".into()));
        assert_eq!(normalize_topic("C#"), Some("c#".into()));
        assert_eq!(normalize_topic(".NET"), Some(".net".into()));
        assert_ne!(normalize_topic("C++"), normalize_topic("C#"));
        assert_ne!(normalize_topic("C++"), normalize_topic("C"));
    }

    #[test]
    fn topic_normalisation_folds_compatibility_forms() {
        // Fullwidth letters fold to ASCII under NFKC.
        assert_eq!(normalize_topic("ＡＩ"), Some("ai".into()));
    }

    #[test]
    fn entity_normalisation_strips_one_prefix() {
        assert_eq!(normalize_entity("Prof. John Smith"), Some("john smith".into()));
        assert_eq!(
            normalize_entity("The University of London"),
            Some("university of london".into())
        );
        assert_eq!(normalize_entity("Theodore Roosevelt"), Some("theodore roosevelt".into()));
        assert_eq!(normalize_entity("   "), None);
    }

    #[test]
    fn new_item_deduplicates_labels() {
        let item = ContentItem::new(
            "x",
            vec![1.0, 0.0],
            ["Finance", "finance ", "FINANCE"],
            ["Dr. Jane Doe", "dr. jane doe"],
            "h1",
        );
        assert_eq!(item.topics.len(), 1);
        assert_eq!(item.entities.len(), 1);
        assert!(item.entities.contains("jane doe"));
        assert_eq!(item.dimension(), 2);
    }

    #[test]
    fn changed_version_detection() {
        let v1 = ContentItem::new("x", vec![1.0], ["a"], Vec::<&str>::new(), "h1");
        let v2 = ContentItem::new("x", vec![1.0], ["a"], Vec::<&str>::new(), "h2");
        let other = ContentItem::new("y", vec![1.0], ["a"], Vec::<&str>::new(), "h2");
        assert!(v2.is_changed_version_of(&v1));
        assert!(!v1.is_changed_version_of(&v1));
        assert!(!other.is_changed_version_of(&v1));
    }
}
