//! Content value objects carried by planning artefacts.

use super::PlanningDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

fn normalize_title(raw: impl Into<String>) -> Result<String, PlanningDomainError> {
    let value = raw.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PlanningDomainError::EmptyTitle);
    }
    Ok(trimmed.to_owned())
}

fn normalize_optional(raw: impl Into<String>) -> Option<String> {
    let value = raw.into();
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn normalize_list(values: impl IntoIterator<Item = String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Editable content of a feature, user story, or bug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemContent {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    acceptance_criteria: Vec<String>,
    #[serde(default)]
    labels: Vec<String>,
}

impl ItemContent {
    /// Creates content with a required title.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::EmptyTitle`] if the title is blank.
    pub fn new(title: impl Into<String>) -> Result<Self, PlanningDomainError> {
        Ok(Self {
            title: normalize_title(title)?,
            description: None,
            acceptance_criteria: Vec::new(),
            labels: Vec::new(),
        })
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = normalize_optional(description);
        self
    }

    /// Sets the acceptance criteria.
    #[must_use]
    pub fn with_acceptance_criteria(mut self, criteria: impl IntoIterator<Item = String>) -> Self {
        self.acceptance_criteria = normalize_list(criteria);
        self
    }

    /// Sets the labels.
    #[must_use]
    pub fn with_labels(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.labels = normalize_list(labels);
        self
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description.
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

    /// Returns a copy of this content with `patch` applied.
    ///
    /// The receiver is never modified, so a failed patch leaves the original
    /// content untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::EmptyTitle`] if the patch blanks the
    /// title.
    pub fn patched(&self, patch: ContentPatch) -> Result<Self, PlanningDomainError> {
        let mut next = self.clone();
        if let Some(title) = patch.title {
            next.title = normalize_title(title)?;
        }
        if let Some(description) = patch.description {
            next.description = description.and_then(|value| normalize_optional(value));
        }
        if let Some(criteria) = patch.acceptance_criteria {
            next.acceptance_criteria = normalize_list(criteria);
        }
        if let Some(labels) = patch.labels {
            next.labels = normalize_list(labels);
        }
        Ok(next)
    }
}

/// Partial update for [`ItemContent`]. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPatch {
    /// Replacement title.
    pub title: Option<String>,
    /// Replacement description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// Replacement acceptance criteria.
    pub acceptance_criteria: Option<Vec<String>>,
    /// Replacement labels.
    pub labels: Option<Vec<String>>,
}

impl ContentPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replaces the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    /// Clears the description.
    #[must_use]
    pub fn clear_description(mut self) -> Self {
        self.description = Some(None);
        self
    }

    /// Replaces the acceptance criteria.
    #[must_use]
    pub fn acceptance_criteria(mut self, criteria: impl IntoIterator<Item = String>) -> Self {
        self.acceptance_criteria = Some(criteria.into_iter().collect());
        self
    }

    /// Replaces the labels.
    #[must_use]
    pub fn labels(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.labels = Some(labels.into_iter().collect());
        self
    }
}

/// Bug severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BugSeverity {
    /// Cosmetic or minor.
    Low,
    /// Default severity.
    Medium,
    /// Major functionality affected.
    High,
    /// Outage or data loss.
    Critical,
}

impl BugSeverity {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl TryFrom<&str> for BugSeverity {
    type Error = PlanningDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(PlanningDomainError::InvalidSeverity(value.to_owned())),
        }
    }
}

impl fmt::Display for BugSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Epic field that a proposal may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpicField {
    /// Problem statement captured in `problem_capture`.
    ProblemStatement,
    /// Desired outcome captured in `outcome_capture`.
    DesiredOutcome,
    /// Final summary written when the epic is finalised or locked.
    Summary,
}

impl EpicField {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProblemStatement => "problem_statement",
            Self::DesiredOutcome => "desired_outcome",
            Self::Summary => "summary",
        }
    }
}

impl TryFrom<&str> for EpicField {
    type Error = PlanningDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "problem_statement" => Ok(Self::ProblemStatement),
            "desired_outcome" => Ok(Self::DesiredOutcome),
            "summary" => Ok(Self::Summary),
            _ => Err(PlanningDomainError::InvalidEpicField(value.to_owned())),
        }
    }
}

impl fmt::Display for EpicField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content area of an epic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicContent {
    title: String,
    #[serde(default)]
    problem_statement: Option<String>,
    #[serde(default)]
    desired_outcome: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

impl EpicContent {
    /// Creates epic content with a required title.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningDomainError::EmptyTitle`] if the title is blank.
    pub fn new(title: impl Into<String>) -> Result<Self, PlanningDomainError> {
        Ok(Self {
            title: normalize_title(title)?,
            problem_statement: None,
            desired_outcome: None,
            summary: None,
        })
    }

    /// Sets `field`, normalising blank content to `None`.
    #[must_use]
    pub fn with_field(mut self, field: EpicField, content: &str) -> Self {
        self.set_field(field, content);
        self
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the value of `field`.
    #[must_use]
    pub fn field(&self, field: EpicField) -> Option<&str> {
        match field {
            EpicField::ProblemStatement => self.problem_statement.as_deref(),
            EpicField::DesiredOutcome => self.desired_outcome.as_deref(),
            EpicField::Summary => self.summary.as_deref(),
        }
    }

    pub(crate) fn set_title(
        &mut self,
        title: impl Into<String>,
    ) -> Result<(), PlanningDomainError> {
        self.title = normalize_title(title)?;
        Ok(())
    }

    pub(crate) fn retitled(&self, title: &str) -> Self {
        Self {
            title: title.to_owned(),
            ..self.clone()
        }
    }

    pub(crate) fn set_field(&mut self, field: EpicField, content: &str) {
        let value = normalize_optional(content);
        match field {
            EpicField::ProblemStatement => self.problem_statement = value,
            EpicField::DesiredOutcome => self.desired_outcome = value,
            EpicField::Summary => self.summary = value,
        }
    }
}
