use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::KnowledgeError;

/// Length of generated fragment ids.
const ID_LEN: usize = 8;

/// Source recorded for fragments created without an explicit provenance.
pub const DEFAULT_SOURCE: &str = "manual";

/// Partition of the knowledge base a fragment belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Team-wide knowledge, committed alongside the project.
    #[default]
    Shared,
    /// Private knowledge that never leaves the local machine.
    Personal,
}

impl Scope {
    /// Lowercase name used on disk and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Shared => "shared",
            Scope::Personal => "personal",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shared" => Ok(Scope::Shared),
            "personal" => Ok(Scope::Personal),
            other => Err(KnowledgeError::InvalidScope(other.to_string())),
        }
    }
}

/// Generate a short random fragment id (eight lowercase hex characters).
pub fn new_fragment_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(ID_LEN);
    id
}

/// Whether `id` is safe to use as a record file name.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

/// A knowledge fragment, the atomic unit stored and retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Short unique identifier, also the record file name.
    #[serde(default = "new_fragment_id")]
    pub id: String,
    /// The knowledge itself. Never empty for a stored fragment.
    pub content: String,
    /// Labels used for categorization and context boosting.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Provenance, e.g. `manual` or `session:<id>`.
    #[serde(default = "default_source")]
    pub source: String,
    /// Owning partition.
    #[serde(default)]
    pub scope: Scope,
    /// Creation time.
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    /// Number of times the fragment was handed to a caller.
    #[serde(default)]
    pub accessed_count: u64,
    /// Time of the most recent access, absent until the first one.
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
    /// Caller-supplied auxiliary data. Not indexed.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Fragment {
    /// Creates a fragment with a fresh id and the default source.
    pub fn new(content: impl Into<String>, scope: Scope) -> Self {
        Self {
            id: new_fragment_id(),
            content: content.into(),
            tags: Vec::new(),
            source: default_source(),
            scope,
            created: Utc::now(),
            accessed_count: 0,
            last_accessed: None,
            metadata: HashMap::new(),
        }
    }

    /// Creates a fragment in [`Scope::Shared`].
    pub fn shared(content: impl Into<String>) -> Self {
        Self::new(content, Scope::Shared)
    }

    /// Creates a fragment in [`Scope::Personal`].
    pub fn personal(content: impl Into<String>) -> Self {
        Self::new(content, Scope::Personal)
    }

    /// Replaces the tags, dropping blanks and duplicates while keeping first-seen order.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.clear();
        for tag in tags {
            let tag = tag.into().trim().to_string();
            if !tag.is_empty() && !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }

    /// Sets the provenance string.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Inserts one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Uses a caller-chosen id instead of the generated one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Whether the fragment carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Records one access: bumps the counter and stamps the current time.
    pub fn mark_accessed(&mut self) {
        self.accessed_count += 1;
        self.last_accessed = Some(Utc::now());
    }

    /// Checks the invariants a fragment must satisfy before it is persisted.
    pub fn validate(&self) -> Result<(), KnowledgeError> {
        if self.content.trim().is_empty() {
            return Err(KnowledgeError::InvalidFragment(format!(
                "fragment {} has empty content",
                self.id
            )));
        }
        if !is_valid_id(&self.id) {
            return Err(KnowledgeError::InvalidFragment(format!(
                "fragment id {:?} must be ASCII alphanumeric, '-' or '_'",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_short_and_valid() {
        let id = new_fragment_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(is_valid_id(&id));
        assert_ne!(id, new_fragment_id());
    }

    #[test]
    fn test_with_tags_dedupes_and_trims() {
        let f = Fragment::shared("x").with_tags(["api", " api ", "", "react"]);
        assert_eq!(f.tags, vec!["api".to_string(), "react".to_string()]);
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!("Shared".parse::<Scope>().unwrap(), Scope::Shared);
        assert_eq!("personal".parse::<Scope>().unwrap(), Scope::Personal);
        assert!("team".parse::<Scope>().is_err());
    }

    #[test]
    fn test_validate_rejects_path_like_ids() {
        assert!(Fragment::shared("ok").with_id("../etc").validate().is_err());
        assert!(Fragment::shared("ok").with_id("a/b").validate().is_err());
        assert!(Fragment::shared("ok").with_id("abc-12_x").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_content() {
        assert!(Fragment::personal("   ").validate().is_err());
    }

    #[test]
    fn test_record_with_missing_optional_fields() {
        let f: Fragment = serde_json::from_str(r#"{"id": "abcd1234", "content": "hi"}"#).unwrap();
        assert_eq!(f.source, DEFAULT_SOURCE);
        assert_eq!(f.scope, Scope::Shared);
        assert_eq!(f.accessed_count, 0);
        assert!(f.last_accessed.is_none());
        assert!(f.tags.is_empty());
    }
}
