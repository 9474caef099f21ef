//! Canonical push payloads and their content hashes.

use super::{FieldMapping, SyncDomainError};
use crate::planning::domain::{EntityKind, EntityRef, Epic, EpicField, ItemContent};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Provider-neutral description of one issue.
///
/// Field order is fixed, so the JSON rendering used for hashing is
/// canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalPayload {
    kind: EntityKind,
    title: String,
    description: Option<String>,
    acceptance_criteria: Vec<String>,
    labels: Vec<String>,
    issue_type: String,
}

impl CanonicalPayload {
    /// Builds the payload of an epic. Confirmed epic fields become sections
    /// of the description.
    #[must_use]
    pub fn for_epic(epic: &Epic, mapping: &FieldMapping) -> Self {
        let content = epic.content();
        let sections: Vec<String> = [
            ("Problem", EpicField::ProblemStatement),
            ("Desired outcome", EpicField::DesiredOutcome),
            ("Summary", EpicField::Summary),
        ]
        .into_iter()
        .filter_map(|(heading, field)| {
            content
                .field(field)
                .map(|text| format!("## {heading}\n\n{text}"))
        })
        .collect();
        let description = (!sections.is_empty()).then(|| sections.join("\n\n"));
        Self {
            kind: EntityKind::Epic,
            title: content.title().to_owned(),
            description,
            acceptance_criteria: Vec::new(),
            labels: merge_labels(&[], mapping),
            issue_type: mapping.issue_type(EntityKind::Epic).to_owned(),
        }
    }

    /// Builds the payload of a feature, story, or bug.
    #[must_use]
    pub fn for_item(kind: EntityKind, content: &ItemContent, mapping: &FieldMapping) -> Self {
        let acceptance_criteria = if mapping.include_acceptance_criteria {
            content.acceptance_criteria().to_vec()
        } else {
            Vec::new()
        };
        let own_labels: &[String] = if mapping.include_labels {
            content.labels()
        } else {
            &[]
        };
        Self {
            kind,
            title: content.title().to_owned(),
            description: content.description().map(str::to_owned),
            acceptance_criteria,
            labels: merge_labels(own_labels, mapping),
            issue_type: mapping.issue_type(kind).to_owned(),
        }
    }

    /// Returns the local entity kind.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Returns the issue title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the issue description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the acceptance criteria.
    #[must_use]
    pub fn acceptance_criteria(&self) -> &[String] {
        &self.acceptance_criteria
    }

    /// Returns the labels.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Returns the tracker issue type.
    #[must_use]
    pub fn issue_type(&self) -> &str {
        &self.issue_type
    }

    /// Renders the description with acceptance criteria appended as a
    /// checklist, for trackers without a dedicated field.
    #[must_use]
    pub fn body(&self) -> String {
        let mut parts: Vec<String> = self.description.iter().cloned().collect();
        if !self.acceptance_criteria.is_empty() {
            let items: Vec<String> = self
                .acceptance_criteria
                .iter()
                .map(|criterion| format!("- [ ] {criterion}"))
                .collect();
            parts.push(format!("## Acceptance criteria\n\n{}", items.join("\n")));
        }
        parts.join("\n\n")
    }

    /// Hashes the canonical JSON rendering of the payload.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::Serialization`] if the payload cannot be
    /// rendered.
    pub fn content_hash(&self) -> Result<ContentHash, SyncDomainError> {
        let json = serde_json::to_vec(self)
            .map_err(|err| SyncDomainError::Serialization(err.to_string()))?;
        Ok(ContentHash(format!("{:x}", Sha256::digest(&json))))
    }
}

fn merge_labels(own: &[String], mapping: &FieldMapping) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for label in own.iter().chain(mapping.extra_labels.iter()) {
        let trimmed = label.trim();
        if !trimmed.is_empty() && !labels.iter().any(|existing| existing == trimmed) {
            labels.push(trimmed.to_owned());
        }
    }
    labels
}

/// Lowercase hex SHA-256 of a canonical payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wraps a stored hash.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the hash as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// External counterpart of an entity's parent, already pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    /// Local parent entity.
    pub entity: EntityRef,
    /// Tracker identifier of the parent issue.
    pub external_id: String,
    /// Human-readable tracker key, where the tracker has one.
    pub external_key: Option<String>,
}

/// Payload handed to a provider adapter.
///
/// The parent link travels with the payload but is not part of the content
/// hash: it depends on what has been pushed before, not on the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPayload {
    /// Hashed content.
    pub content: CanonicalPayload,
    /// Parent issue, when known.
    pub parent: Option<ParentLink>,
}
