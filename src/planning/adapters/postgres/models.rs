//! Diesel row models for planning persistence.

use super::schema::{
    bug_links, bugs, decision_logs, deletion_receipts, epics, features, user_stories,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for epics.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = epics)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EpicRow {
    /// Epic identifier.
    pub id: uuid::Uuid,
    /// Owning user.
    pub owner_id: uuid::Uuid,
    /// Title.
    pub title: String,
    /// Problem statement.
    pub problem_statement: Option<String>,
    /// Desired outcome.
    pub desired_outcome: Option<String>,
    /// Summary.
    pub summary: Option<String>,
    /// Lifecycle stage.
    pub stage: String,
    /// Pending proposal JSON payload.
    pub pending_proposal: Option<Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for epics.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = epics)]
pub struct NewEpicRow {
    /// Epic identifier.
    pub id: uuid::Uuid,
    /// Owning user.
    pub owner_id: uuid::Uuid,
    /// Title.
    pub title: String,
    /// Problem statement.
    pub problem_statement: Option<String>,
    /// Desired outcome.
    pub desired_outcome: Option<String>,
    /// Summary.
    pub summary: Option<String>,
    /// Lifecycle stage.
    pub stage: String,
    /// Pending proposal JSON payload.
    pub pending_proposal: Option<Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for features.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = features)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FeatureRow {
    /// Feature identifier.
    pub id: uuid::Uuid,
    /// Owning epic.
    pub epic_id: uuid::Uuid,
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Acceptance criteria JSON array.
    pub acceptance_criteria: Value,
    /// Labels JSON array.
    pub labels: Value,
    /// Lifecycle stage.
    pub stage: String,
    /// Approval timestamp.
    pub approved_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert and update model for features.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = features)]
#[diesel(treat_none_as_null = true)]
pub struct FeatureWrite {
    /// Feature identifier.
    pub id: uuid::Uuid,
    /// Owning epic.
    pub epic_id: uuid::Uuid,
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Acceptance criteria JSON array.
    pub acceptance_criteria: Value,
    /// Labels JSON array.
    pub labels: Value,
    /// Lifecycle stage.
    pub stage: String,
    /// Approval timestamp.
    pub approved_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for user stories.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_stories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StoryRow {
    /// Story identifier.
    pub id: uuid::Uuid,
    /// Owning feature.
    pub feature_id: Option<uuid::Uuid>,
    /// Owning user of a standalone story.
    pub owner_id: Option<uuid::Uuid>,
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Acceptance criteria JSON array.
    pub acceptance_criteria: Value,
    /// Labels JSON array.
    pub labels: Value,
    /// Lifecycle stage.
    pub stage: String,
    /// Approval timestamp.
    pub approved_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert and update model for user stories.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = user_stories)]
#[diesel(treat_none_as_null = true)]
pub struct StoryWrite {
    /// Story identifier.
    pub id: uuid::Uuid,
    /// Owning feature.
    pub feature_id: Option<uuid::Uuid>,
    /// Owning user of a standalone story.
    pub owner_id: Option<uuid::Uuid>,
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Acceptance criteria JSON array.
    pub acceptance_criteria: Value,
    /// Labels JSON array.
    pub labels: Value,
    /// Lifecycle stage.
    pub stage: String,
    /// Approval timestamp.
    pub approved_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for bugs.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bugs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BugRow {
    /// Bug identifier.
    pub id: uuid::Uuid,
    /// Owning user.
    pub owner_id: uuid::Uuid,
    /// Severity.
    pub severity: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Acceptance criteria JSON array.
    pub acceptance_criteria: Value,
    /// Labels JSON array.
    pub labels: Value,
    /// Lifecycle stage.
    pub stage: String,
    /// Approval timestamp.
    pub approved_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert and update model for bugs.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = bugs)]
#[diesel(treat_none_as_null = true)]
pub struct BugWrite {
    /// Bug identifier.
    pub id: uuid::Uuid,
    /// Owning user.
    pub owner_id: uuid::Uuid,
    /// Severity.
    pub severity: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Acceptance criteria JSON array.
    pub acceptance_criteria: Value,
    /// Labels JSON array.
    pub labels: Value,
    /// Lifecycle stage.
    pub stage: String,
    /// Approval timestamp.
    pub approved_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for bug links.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bug_links)]
pub struct NewBugLinkRow {
    /// Linked bug.
    pub bug_id: uuid::Uuid,
    /// Target entity kind.
    pub target_kind: String,
    /// Target entity identifier.
    pub target_id: uuid::Uuid,
    /// Link type.
    pub link_type: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Query result row for decision log entries.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = decision_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DecisionRow {
    /// Entry identifier.
    pub id: uuid::Uuid,
    /// Decided epic.
    pub epic_id: uuid::Uuid,
    /// Decided proposal.
    pub proposal_id: String,
    /// Outcome.
    pub outcome: String,
    /// Targeted field.
    pub field: String,
    /// Stage before the decision.
    pub from_stage: String,
    /// Stage after the decision.
    pub to_stage: String,
    /// Content snapshot.
    pub content: String,
    /// Decision timestamp.
    pub decided_at: DateTime<Utc>,
}

/// Insert model for decision log entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = decision_logs)]
pub struct NewDecisionRow {
    /// Entry identifier.
    pub id: uuid::Uuid,
    /// Decided epic.
    pub epic_id: uuid::Uuid,
    /// Decided proposal.
    pub proposal_id: String,
    /// Outcome.
    pub outcome: String,
    /// Targeted field.
    pub field: String,
    /// Stage before the decision.
    pub from_stage: String,
    /// Stage after the decision.
    pub to_stage: String,
    /// Content snapshot.
    pub content: String,
    /// Decision timestamp.
    pub decided_at: DateTime<Utc>,
}

/// Row shape shared by the transcript and conversation event tables.
#[derive(Debug, Clone, QueryableByName)]
pub struct EventRow {
    /// Event identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
    /// Owner entity kind.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub owner_kind: String,
    /// Owner entity identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub owner_id: uuid::Uuid,
    /// Speaker.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub role: String,
    /// Event text.
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub content: String,
    /// Per-owner sequence.
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub sequence: i64,
    /// Insertion timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
}

/// Query result row for deletion receipts.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = deletion_receipts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReceiptRow {
    /// Deleted entity kind.
    pub target_kind: String,
    /// Deleted entity identifier.
    pub target_id: uuid::Uuid,
    /// Confirming user.
    pub actor_id: uuid::Uuid,
    /// Stated reason.
    pub reason: String,
    /// Append-only rows removed.
    pub cascaded_rows: i64,
    /// Deletion timestamp.
    pub deleted_at: DateTime<Utc>,
}

/// Insert model for deletion receipts.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = deletion_receipts)]
pub struct NewReceiptRow {
    /// Receipt identifier.
    pub id: uuid::Uuid,
    /// Deleted entity kind.
    pub target_kind: String,
    /// Deleted entity identifier.
    pub target_id: uuid::Uuid,
    /// Confirming user.
    pub actor_id: uuid::Uuid,
    /// Stated reason.
    pub reason: String,
    /// Append-only rows removed.
    pub cascaded_rows: i64,
    /// Deletion timestamp.
    pub deleted_at: DateTime<Utc>,
}
