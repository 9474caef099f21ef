//! `PostgreSQL` repository implementation for planning storage.

use super::{
    models::{
        BugRow, BugWrite, DecisionRow, EpicRow, EventRow, FeatureRow, FeatureWrite, NewBugLinkRow,
        NewDecisionRow, NewEpicRow, NewReceiptRow, ReceiptRow, StoryRow, StoryWrite,
    },
    schema::{bug_links, bugs, decision_logs, deletion_receipts, epics, features, user_stories},
};
use crate::planning::{
    domain::{
        Bug, BugId, BugLink, BugMeta, BugSeverity, DecisionId, DecisionOutcome, DecisionRecord,
        DeletionConfirmation, DeletionReceipt, EntityKind, EntityRef, Epic, EpicContent,
        EpicField, EpicId, EpicStage, EventDraft, EventId, EventRole, Feature, FeatureId,
        FeatureMeta, ItemContent, ItemStage, LogEvent, PendingProposal, PersistedEpicData,
        PersistedItemData, ProposalId, StageGraph, StoryId, StoryMeta, StoryParent, UserId,
        UserStory, may_overwrite,
    },
    ports::{PlanningRepository, PlanningRepositoryError, PlanningRepositoryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Array, BigInt, Text, Timestamptz, Uuid as SqlUuid, Varchar};
use serde_json::Value;

/// `PostgreSQL` connection pool type used by planning adapters.
pub type PlanningPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed planning repository.
///
/// Append-only tables are protected by triggers; [`Self::delete_cascade`]
/// is the only code path that opts in to removing their rows, and it does so
/// with a transaction-local setting.
///
/// [`Self::delete_cascade`]: PlanningRepository::delete_cascade
#[derive(Debug, Clone)]
pub struct PostgresPlanningRepository {
    pool: PlanningPgPool,
}

impl PostgresPlanningRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: PlanningPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> PlanningRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> PlanningRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(PlanningRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(PlanningRepositoryError::persistence)?
    }
}

impl From<DieselError> for PlanningRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

#[derive(Debug, QueryableByName)]
struct NextSequence {
    #[diesel(sql_type = BigInt)]
    next: i64,
}

const fn event_table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Epic => "transcript_events",
        EntityKind::Feature | EntityKind::Story | EntityKind::Bug => "conversation_events",
    }
}

fn map_insert_error(
    err: DieselError,
    entity: EntityRef,
    parent: Option<EntityRef>,
) -> PlanningRepositoryError {
    match (&err, parent) {
        (DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _), _) => {
            PlanningRepositoryError::Duplicate(entity)
        }
        (DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _), Some(owner)) => {
            PlanningRepositoryError::NotFound(owner)
        }
        _ => PlanningRepositoryError::persistence(err),
    }
}

fn overwritable_stages(incoming: ItemStage) -> Vec<&'static str> {
    ItemStage::ORDER
        .iter()
        .filter(|stored| may_overwrite(**stored, incoming))
        .map(|stored| stored.as_str())
        .collect()
}

fn string_list(value: Value) -> PlanningRepositoryResult<Vec<String>> {
    serde_json::from_value(value).map_err(PlanningRepositoryError::persistence)
}

fn string_list_value(values: &[String]) -> PlanningRepositoryResult<Value> {
    serde_json::to_value(values).map_err(PlanningRepositoryError::persistence)
}

fn item_content(
    title: String,
    description: Option<String>,
    acceptance_criteria: Value,
    labels: Value,
) -> PlanningRepositoryResult<ItemContent> {
    let mut content = ItemContent::new(title)
        .map_err(PlanningRepositoryError::persistence)?
        .with_acceptance_criteria(string_list(acceptance_criteria)?)
        .with_labels(string_list(labels)?);
    if let Some(text) = description {
        content = content.with_description(text);
    }
    Ok(content)
}

fn item_stage(raw: &str) -> PlanningRepositoryResult<ItemStage> {
    ItemStage::try_from(raw).map_err(PlanningRepositoryError::persistence)
}

fn to_epic_row(epic: &Epic) -> PlanningRepositoryResult<NewEpicRow> {
    let pending_proposal = epic
        .pending_proposal()
        .map(serde_json::to_value)
        .transpose()
        .map_err(PlanningRepositoryError::persistence)?;
    let content = epic.content();
    Ok(NewEpicRow {
        id: epic.id().into_inner(),
        owner_id: epic.owner().into_inner(),
        title: content.title().to_owned(),
        problem_statement: content.field(EpicField::ProblemStatement).map(str::to_owned),
        desired_outcome: content.field(EpicField::DesiredOutcome).map(str::to_owned),
        summary: content.field(EpicField::Summary).map(str::to_owned),
        stage: epic.stage().as_str().to_owned(),
        pending_proposal,
        created_at: epic.created_at(),
        updated_at: epic.updated_at(),
    })
}

fn row_to_epic(row: EpicRow) -> PlanningRepositoryResult<Epic> {
    let EpicRow {
        id,
        owner_id,
        title,
        problem_statement,
        desired_outcome,
        summary,
        stage,
        pending_proposal,
        created_at,
        updated_at,
    } = row;

    let mut content = EpicContent::new(title).map_err(PlanningRepositoryError::persistence)?;
    for (field, value) in [
        (EpicField::ProblemStatement, problem_statement),
        (EpicField::DesiredOutcome, desired_outcome),
        (EpicField::Summary, summary),
    ] {
        if let Some(text) = value {
            content = content.with_field(field, &text);
        }
    }
    let pending = pending_proposal
        .map(serde_json::from_value::<PendingProposal>)
        .transpose()
        .map_err(PlanningRepositoryError::persistence)?;

    Ok(Epic::from_persisted(PersistedEpicData {
        id: EpicId::from_uuid(id),
        owner: UserId::from_uuid(owner_id),
        content,
        stage: EpicStage::try_from(stage.as_str()).map_err(PlanningRepositoryError::persistence)?,
        pending_proposal: pending,
        created_at,
        updated_at,
    }))
}

fn to_feature_write(feature: &Feature) -> PlanningRepositoryResult<FeatureWrite> {
    let content = feature.content();
    Ok(FeatureWrite {
        id: feature.id().into_inner(),
        epic_id: feature.epic_id().into_inner(),
        title: content.title().to_owned(),
        description: content.description().map(str::to_owned),
        acceptance_criteria: string_list_value(content.acceptance_criteria())?,
        labels: string_list_value(content.labels())?,
        stage: feature.stage().as_str().to_owned(),
        approved_at: feature.approved_at(),
        created_at: feature.created_at(),
        updated_at: feature.updated_at(),
    })
}

fn row_to_feature(row: FeatureRow) -> PlanningRepositoryResult<Feature> {
    Ok(Feature::from_persisted(PersistedItemData {
        id: FeatureId::from_uuid(row.id),
        meta: FeatureMeta {
            epic_id: EpicId::from_uuid(row.epic_id),
        },
        content: item_content(row.title, row.description, row.acceptance_criteria, row.labels)?,
        stage: item_stage(&row.stage)?,
        approved_at: row.approved_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

fn to_story_write(story: &UserStory) -> PlanningRepositoryResult<StoryWrite> {
    let content = story.content();
    let (feature_id, owner_id) = match story.parent() {
        StoryParent::Feature(feature_id) => (Some(feature_id.into_inner()), None),
        StoryParent::Standalone(owner) => (None, Some(owner.into_inner())),
    };
    Ok(StoryWrite {
        id: story.id().into_inner(),
        feature_id,
        owner_id,
        title: content.title().to_owned(),
        description: content.description().map(str::to_owned),
        acceptance_criteria: string_list_value(content.acceptance_criteria())?,
        labels: string_list_value(content.labels())?,
        stage: story.stage().as_str().to_owned(),
        approved_at: story.approved_at(),
        created_at: story.created_at(),
        updated_at: story.updated_at(),
    })
}

fn row_to_story(row: StoryRow) -> PlanningRepositoryResult<UserStory> {
    let parent = match (row.feature_id, row.owner_id) {
        (Some(feature_id), _) => StoryParent::Feature(FeatureId::from_uuid(feature_id)),
        (None, Some(owner)) => StoryParent::Standalone(UserId::from_uuid(owner)),
        (None, None) => {
            return Err(PlanningRepositoryError::persistence(std::io::Error::other(
                format!("story {} has neither a feature nor an owner", row.id),
            )));
        }
    };
    Ok(UserStory::from_persisted(PersistedItemData {
        id: StoryId::from_uuid(row.id),
        meta: StoryMeta { parent },
        content: item_content(row.title, row.description, row.acceptance_criteria, row.labels)?,
        stage: item_stage(&row.stage)?,
        approved_at: row.approved_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

fn to_bug_write(bug: &Bug) -> PlanningRepositoryResult<BugWrite> {
    let content = bug.content();
    Ok(BugWrite {
        id: bug.id().into_inner(),
        owner_id: bug.owner().into_inner(),
        severity: bug.severity().as_str().to_owned(),
        title: content.title().to_owned(),
        description: content.description().map(str::to_owned),
        acceptance_criteria: string_list_value(content.acceptance_criteria())?,
        labels: string_list_value(content.labels())?,
        stage: bug.stage().as_str().to_owned(),
        approved_at: bug.approved_at(),
        created_at: bug.created_at(),
        updated_at: bug.updated_at(),
    })
}

fn row_to_bug(row: BugRow) -> PlanningRepositoryResult<Bug> {
    Ok(Bug::from_persisted(PersistedItemData {
        id: BugId::from_uuid(row.id),
        meta: BugMeta {
            owner: UserId::from_uuid(row.owner_id),
            severity: BugSeverity::try_from(row.severity.as_str())
                .map_err(PlanningRepositoryError::persistence)?,
        },
        content: item_content(row.title, row.description, row.acceptance_criteria, row.labels)?,
        stage: item_stage(&row.stage)?,
        approved_at: row.approved_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

fn to_decision_row(record: &DecisionRecord) -> NewDecisionRow {
    NewDecisionRow {
        id: record.id.into_inner(),
        epic_id: record.epic_id.into_inner(),
        proposal_id: record.proposal_id.as_str().to_owned(),
        outcome: record.outcome.as_str().to_owned(),
        field: record.field.as_str().to_owned(),
        from_stage: record.from_stage.as_str().to_owned(),
        to_stage: record.to_stage.as_str().to_owned(),
        content: record.content.clone(),
        decided_at: record.decided_at,
    }
}

fn row_to_decision(row: DecisionRow) -> PlanningRepositoryResult<DecisionRecord> {
    Ok(DecisionRecord {
        id: DecisionId::from_uuid(row.id),
        epic_id: EpicId::from_uuid(row.epic_id),
        proposal_id: ProposalId::new(row.proposal_id),
        outcome: DecisionOutcome::try_from(row.outcome.as_str())
            .map_err(PlanningRepositoryError::persistence)?,
        field: EpicField::try_from(row.field.as_str())
            .map_err(PlanningRepositoryError::persistence)?,
        from_stage: EpicStage::try_from(row.from_stage.as_str())
            .map_err(PlanningRepositoryError::persistence)?,
        to_stage: EpicStage::try_from(row.to_stage.as_str())
            .map_err(PlanningRepositoryError::persistence)?,
        content: row.content,
        decided_at: row.decided_at,
    })
}

fn row_to_event(row: EventRow) -> PlanningRepositoryResult<LogEvent> {
    let kind = EntityKind::try_from(row.owner_kind.as_str())
        .map_err(PlanningRepositoryError::persistence)?;
    Ok(LogEvent {
        id: EventId::from_uuid(row.id),
        owner: EntityRef::new(kind, row.owner_id),
        role: EventRole::try_from(row.role.as_str()).map_err(PlanningRepositoryError::persistence)?,
        content: row.content,
        sequence: u64::try_from(row.sequence).map_err(PlanningRepositoryError::persistence)?,
        created_at: row.created_at,
    })
}

fn row_to_receipt(row: ReceiptRow) -> PlanningRepositoryResult<DeletionReceipt> {
    let kind = EntityKind::try_from(row.target_kind.as_str())
        .map_err(PlanningRepositoryError::persistence)?;
    Ok(DeletionReceipt {
        target: EntityRef::new(kind, row.target_id),
        actor: UserId::from_uuid(row.actor_id),
        reason: row.reason,
        cascaded_rows: u64::try_from(row.cascaded_rows)
            .map_err(PlanningRepositoryError::persistence)?,
        deleted_at: row.deleted_at,
    })
}

fn entity_exists(
    connection: &mut PgConnection,
    entity: EntityRef,
) -> PlanningRepositoryResult<bool> {
    let id = entity.id();
    let count: i64 = match entity.kind() {
        EntityKind::Epic => epics::table.filter(epics::id.eq(id)).count().get_result(connection)?,
        EntityKind::Feature => features::table
            .filter(features::id.eq(id))
            .count()
            .get_result(connection)?,
        EntityKind::Story => user_stories::table
            .filter(user_stories::id.eq(id))
            .count()
            .get_result(connection)?,
        EntityKind::Bug => bugs::table.filter(bugs::id.eq(id)).count().get_result(connection)?,
    };
    Ok(count > 0)
}

/// Distinguishes a missing row from a guarded write that lost.
fn missing_or_conflict(
    connection: &mut PgConnection,
    entity: EntityRef,
) -> PlanningRepositoryResult<()> {
    if entity_exists(connection, entity)? {
        return Err(PlanningRepositoryError::Conflict(entity));
    }
    Err(PlanningRepositoryError::NotFound(entity))
}

fn lock_epic(connection: &mut PgConnection, id: EpicId) -> PlanningRepositoryResult<Epic> {
    let row = epics::table
        .filter(epics::id.eq(id.into_inner()))
        .select(EpicRow::as_select())
        .for_update()
        .first::<EpicRow>(connection)
        .optional()?
        .ok_or_else(|| PlanningRepositoryError::NotFound(EntityRef::epic(id)))?;
    row_to_epic(row)
}

fn delete_events(
    connection: &mut PgConnection,
    kind: EntityKind,
    ids: &[uuid::Uuid],
) -> PlanningRepositoryResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let statement = format!(
        "DELETE FROM {} WHERE owner_kind = $1 AND owner_id = ANY($2)",
        event_table(kind)
    );
    Ok(diesel::sql_query(statement)
        .bind::<Varchar, _>(kind.as_str())
        .bind::<Array<SqlUuid>, _>(ids.to_vec())
        .execute(connection)?)
}

fn delete_links_to(
    connection: &mut PgConnection,
    kind: EntityKind,
    ids: &[uuid::Uuid],
) -> PlanningRepositoryResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    diesel::delete(
        bug_links::table
            .filter(bug_links::target_kind.eq(kind.as_str()))
            .filter(bug_links::target_id.eq_any(ids.to_vec())),
    )
    .execute(connection)?;
    Ok(())
}

/// Removes the target and its owned subtree, returning the number of
/// append-only rows removed. Must run inside a transaction that has enabled
/// `app.allow_append_only_cascade`.
fn cascade(connection: &mut PgConnection, target: EntityRef) -> PlanningRepositoryResult<usize> {
    let id = target.id();
    let feature_ids: Vec<uuid::Uuid> = match target.kind() {
        EntityKind::Epic => features::table
            .filter(features::epic_id.eq(id))
            .select(features::id)
            .load(connection)?,
        EntityKind::Feature => vec![id],
        EntityKind::Story | EntityKind::Bug => Vec::new(),
    };
    let mut story_ids: Vec<uuid::Uuid> = if feature_ids.is_empty() {
        Vec::new()
    } else {
        user_stories::table
            .filter(user_stories::feature_id.eq_any(feature_ids.clone()))
            .select(user_stories::id)
            .load(connection)?
    };
    if target.kind() == EntityKind::Story {
        story_ids.push(id);
    }

    let mut removed = delete_events(connection, EntityKind::Story, &story_ids)?;
    removed = removed.saturating_add(delete_events(connection, EntityKind::Feature, &feature_ids)?);
    delete_links_to(connection, EntityKind::Story, &story_ids)?;
    delete_links_to(connection, EntityKind::Feature, &feature_ids)?;
    if !story_ids.is_empty() {
        diesel::delete(user_stories::table.filter(user_stories::id.eq_any(story_ids)))
            .execute(connection)?;
    }
    if !feature_ids.is_empty() {
        diesel::delete(features::table.filter(features::id.eq_any(feature_ids)))
            .execute(connection)?;
    }

    match target.kind() {
        EntityKind::Epic => {
            removed = removed.saturating_add(delete_events(connection, EntityKind::Epic, &[id])?);
            removed = removed.saturating_add(
                diesel::delete(decision_logs::table.filter(decision_logs::epic_id.eq(id)))
                    .execute(connection)?,
            );
            delete_links_to(connection, EntityKind::Epic, &[id])?;
            diesel::delete(epics::table.filter(epics::id.eq(id))).execute(connection)?;
        }
        EntityKind::Bug => {
            removed = removed.saturating_add(delete_events(connection, EntityKind::Bug, &[id])?);
            diesel::delete(bug_links::table.filter(bug_links::bug_id.eq(id)))
                .execute(connection)?;
            diesel::delete(bugs::table.filter(bugs::id.eq(id))).execute(connection)?;
        }
        EntityKind::Feature | EntityKind::Story => {}
    }
    Ok(removed)
}

#[async_trait]
impl PlanningRepository for PostgresPlanningRepository {
    async fn store_epic(&self, epic: &Epic) -> PlanningRepositoryResult<()> {
        let entity = epic.entity_ref();
        let row = to_epic_row(epic)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(epics::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| map_insert_error(err, entity, None))?;
            Ok(())
        })
        .await
    }

    async fn find_epic(&self, id: EpicId) -> PlanningRepositoryResult<Option<Epic>> {
        self.run_blocking(move |connection| {
            let row = epics::table
                .filter(epics::id.eq(id.into_inner()))
                .select(EpicRow::as_select())
                .first::<EpicRow>(connection)
                .optional()?;
            row.map(row_to_epic).transpose()
        })
        .await
    }

    async fn list_epics(&self, owner: UserId) -> PlanningRepositoryResult<Vec<Epic>> {
        self.run_blocking(move |connection| {
            epics::table
                .filter(epics::owner_id.eq(owner.into_inner()))
                .order(epics::position.asc())
                .select(EpicRow::as_select())
                .load::<EpicRow>(connection)?
                .into_iter()
                .map(row_to_epic)
                .collect()
        })
        .await
    }

    async fn rename_epic(&self, epic: &Epic) -> PlanningRepositoryResult<()> {
        let entity = epic.entity_ref();
        let id = epic.id().into_inner();
        let title = epic.content().title().to_owned();
        let updated_at = epic.updated_at();
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                epics::table
                    .filter(epics::id.eq(id))
                    .filter(epics::stage.ne(EpicStage::TERMINAL.as_str())),
            )
            .set((epics::title.eq(title), epics::updated_at.eq(updated_at)))
            .execute(connection)?;
            if updated == 0 {
                return missing_or_conflict(connection, entity);
            }
            Ok(())
        })
        .await
    }

    async fn save_proposal(&self, epic: &Epic) -> PlanningRepositoryResult<()> {
        let incoming = to_epic_row(epic)?;
        let epic_id = epic.id();
        let entity = epic.entity_ref();
        let stage = epic.stage();
        self.run_blocking(move |connection| {
            connection.transaction::<_, PlanningRepositoryError, _>(|tx| {
                let stored = lock_epic(tx, epic_id)?;
                if stored.pending_proposal().is_some() {
                    return Err(PlanningRepositoryError::ProposalPending(epic_id));
                }
                if stored.stage() != stage {
                    return Err(PlanningRepositoryError::Conflict(entity));
                }
                diesel::update(epics::table.filter(epics::id.eq(epic_id.into_inner())))
                    .set((
                        epics::pending_proposal.eq(incoming.pending_proposal),
                        epics::updated_at.eq(incoming.updated_at),
                    ))
                    .execute(tx)?;
                Ok(())
            })
        })
        .await
    }

    async fn commit_decision(
        &self,
        epic: &Epic,
        expected: &ProposalId,
        decision: &DecisionRecord,
    ) -> PlanningRepositoryResult<()> {
        let epic_id = epic.id();
        let updated_at = epic.updated_at();
        let expected_id = expected.clone();
        let record = decision.clone();
        self.run_blocking(move |connection| {
            connection.transaction::<_, PlanningRepositoryError, _>(|tx| {
                let stored = lock_epic(tx, epic_id)?;
                let still_pending = stored
                    .pending_proposal()
                    .is_some_and(|pending| pending.proposal_id == expected_id);
                if !still_pending {
                    return Err(PlanningRepositoryError::StaleProposal {
                        epic_id,
                        expected: expected_id,
                    });
                }

                let mut content = stored.content().clone();
                if record.outcome == DecisionOutcome::Confirmed {
                    content = content.with_field(record.field, &record.content);
                }
                diesel::update(epics::table.filter(epics::id.eq(epic_id.into_inner())))
                    .set((
                        epics::problem_statement
                            .eq(content.field(EpicField::ProblemStatement).map(str::to_owned)),
                        epics::desired_outcome
                            .eq(content.field(EpicField::DesiredOutcome).map(str::to_owned)),
                        epics::summary.eq(content.field(EpicField::Summary).map(str::to_owned)),
                        epics::stage.eq(record.to_stage.as_str()),
                        epics::pending_proposal.eq(None::<Value>),
                        epics::updated_at.eq(updated_at),
                    ))
                    .execute(tx)?;
                diesel::insert_into(decision_logs::table)
                    .values(&to_decision_row(&record))
                    .execute(tx)?;
                Ok(())
            })
        })
        .await
    }

    async fn list_decisions(
        &self,
        epic_id: EpicId,
    ) -> PlanningRepositoryResult<Vec<DecisionRecord>> {
        self.run_blocking(move |connection| {
            decision_logs::table
                .filter(decision_logs::epic_id.eq(epic_id.into_inner()))
                .order(decision_logs::position.asc())
                .select(DecisionRow::as_select())
                .load::<DecisionRow>(connection)?
                .into_iter()
                .map(row_to_decision)
                .collect()
        })
        .await
    }

    async fn store_feature(&self, feature: &Feature) -> PlanningRepositoryResult<()> {
        let entity = feature.entity_ref();
        let parent = EntityRef::epic(feature.epic_id());
        let row = to_feature_write(feature)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(features::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| map_insert_error(err, entity, Some(parent)))?;
            Ok(())
        })
        .await
    }

    async fn update_feature(&self, feature: &Feature) -> PlanningRepositoryResult<()> {
        let entity = feature.entity_ref();
        let allowed = overwritable_stages(feature.stage());
        let row = to_feature_write(feature)?;
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                features::table
                    .filter(features::id.eq(row.id))
                    .filter(features::stage.eq_any(allowed)),
            )
            .set(&row)
            .execute(connection)?;
            if updated == 0 {
                return missing_or_conflict(connection, entity);
            }
            Ok(())
        })
        .await
    }

    async fn find_feature(&self, id: FeatureId) -> PlanningRepositoryResult<Option<Feature>> {
        self.run_blocking(move |connection| {
            let row = features::table
                .filter(features::id.eq(id.into_inner()))
                .select(FeatureRow::as_select())
                .first::<FeatureRow>(connection)
                .optional()?;
            row.map(row_to_feature).transpose()
        })
        .await
    }

    async fn list_features(&self, epic_id: EpicId) -> PlanningRepositoryResult<Vec<Feature>> {
        self.run_blocking(move |connection| {
            features::table
                .filter(features::epic_id.eq(epic_id.into_inner()))
                .order(features::position.asc())
                .select(FeatureRow::as_select())
                .load::<FeatureRow>(connection)?
                .into_iter()
                .map(row_to_feature)
                .collect()
        })
        .await
    }

    async fn store_story(&self, story: &UserStory) -> PlanningRepositoryResult<()> {
        let entity = story.entity_ref();
        let parent = story.feature_id().map(EntityRef::feature);
        let row = to_story_write(story)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(user_stories::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| map_insert_error(err, entity, parent))?;
            Ok(())
        })
        .await
    }

    async fn update_story(&self, story: &UserStory) -> PlanningRepositoryResult<()> {
        let entity = story.entity_ref();
        let allowed = overwritable_stages(story.stage());
        let row = to_story_write(story)?;
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                user_stories::table
                    .filter(user_stories::id.eq(row.id))
                    .filter(user_stories::stage.eq_any(allowed)),
            )
            .set(&row)
            .execute(connection)?;
            if updated == 0 {
                return missing_or_conflict(connection, entity);
            }
            Ok(())
        })
        .await
    }

    async fn find_story(&self, id: StoryId) -> PlanningRepositoryResult<Option<UserStory>> {
        self.run_blocking(move |connection| {
            let row = user_stories::table
                .filter(user_stories::id.eq(id.into_inner()))
                .select(StoryRow::as_select())
                .first::<StoryRow>(connection)
                .optional()?;
            row.map(row_to_story).transpose()
        })
        .await
    }

    async fn list_stories(
        &self,
        feature_id: FeatureId,
    ) -> PlanningRepositoryResult<Vec<UserStory>> {
        self.run_blocking(move |connection| {
            user_stories::table
                .filter(user_stories::feature_id.eq(feature_id.into_inner()))
                .order(user_stories::position.asc())
                .select(StoryRow::as_select())
                .load::<StoryRow>(connection)?
                .into_iter()
                .map(row_to_story)
                .collect()
        })
        .await
    }

    async fn store_bug(&self, bug: &Bug) -> PlanningRepositoryResult<()> {
        let entity = bug.entity_ref();
        let row = to_bug_write(bug)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(bugs::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| map_insert_error(err, entity, None))?;
            Ok(())
        })
        .await
    }

    async fn update_bug(&self, bug: &Bug) -> PlanningRepositoryResult<()> {
        let entity = bug.entity_ref();
        let allowed = overwritable_stages(bug.stage());
        let row = to_bug_write(bug)?;
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                bugs::table
                    .filter(bugs::id.eq(row.id))
                    .filter(bugs::stage.eq_any(allowed)),
            )
            .set(&row)
            .execute(connection)?;
            if updated == 0 {
                return missing_or_conflict(connection, entity);
            }
            Ok(())
        })
        .await
    }

    async fn find_bug(&self, id: BugId) -> PlanningRepositoryResult<Option<Bug>> {
        self.run_blocking(move |connection| {
            let row = bugs::table
                .filter(bugs::id.eq(id.into_inner()))
                .select(BugRow::as_select())
                .first::<BugRow>(connection)
                .optional()?;
            row.map(row_to_bug).transpose()
        })
        .await
    }

    async fn store_bug_link(&self, link: &BugLink) -> PlanningRepositoryResult<()> {
        let bug = EntityRef::bug(link.bug_id);
        let target = link.target;
        let row = NewBugLinkRow {
            bug_id: link.bug_id.into_inner(),
            target_kind: target.kind().as_str().to_owned(),
            target_id: target.id(),
            link_type: link.link_type.as_str().to_owned(),
            created_at: link.created_at,
        };
        self.run_blocking(move |connection| {
            connection.transaction::<_, PlanningRepositoryError, _>(|tx| {
                if !entity_exists(tx, target)? {
                    return Err(PlanningRepositoryError::NotFound(target));
                }
                diesel::insert_into(bug_links::table)
                    .values(&row)
                    .execute(tx)
                    .map_err(|err| map_insert_error(err, bug, Some(bug)))?;
                Ok(())
            })
        })
        .await
    }

    async fn list_bugs_linked_to(
        &self,
        targets: &[EntityRef],
    ) -> PlanningRepositoryResult<Vec<Bug>> {
        let wanted = targets.to_vec();
        self.run_blocking(move |connection| {
            if wanted.is_empty() {
                return Ok(Vec::new());
            }
            let ids: Vec<uuid::Uuid> = wanted.iter().map(EntityRef::id).collect();
            let candidates: Vec<(uuid::Uuid, String, uuid::Uuid)> = bug_links::table
                .filter(bug_links::target_id.eq_any(ids))
                .select((bug_links::bug_id, bug_links::target_kind, bug_links::target_id))
                .load(connection)?;
            let mut bug_ids: Vec<uuid::Uuid> = Vec::new();
            for (bug_id, kind, target_id) in candidates {
                let matches = EntityKind::try_from(kind.as_str())
                    .is_ok_and(|parsed| wanted.contains(&EntityRef::new(parsed, target_id)));
                if matches && !bug_ids.contains(&bug_id) {
                    bug_ids.push(bug_id);
                }
            }
            if bug_ids.is_empty() {
                return Ok(Vec::new());
            }
            bugs::table
                .filter(bugs::id.eq_any(bug_ids))
                .order(bugs::position.asc())
                .select(BugRow::as_select())
                .load::<BugRow>(connection)?
                .into_iter()
                .map(row_to_bug)
                .collect()
        })
        .await
    }

    async fn append_event(
        &self,
        owner: EntityRef,
        draft: &EventDraft,
        created_at: DateTime<Utc>,
    ) -> PlanningRepositoryResult<LogEvent> {
        let event_id = EventId::new().into_inner();
        let role = draft.role;
        let content = draft.content.clone();
        self.run_blocking(move |connection| {
            connection.transaction::<_, PlanningRepositoryError, _>(|tx| {
                if !entity_exists(tx, owner)? {
                    return Err(PlanningRepositoryError::NotFound(owner));
                }
                let table = event_table(owner.kind());
                let next = diesel::sql_query(format!(
                    "SELECT COALESCE(MAX(sequence), 0) + 1 AS next FROM {table} \
                     WHERE owner_kind = $1 AND owner_id = $2"
                ))
                .bind::<Varchar, _>(owner.kind().as_str())
                .bind::<SqlUuid, _>(owner.id())
                .get_result::<NextSequence>(tx)?;
                let row = diesel::sql_query(format!(
                    "INSERT INTO {table} \
                     (id, owner_kind, owner_id, role, content, sequence, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7) \
                     RETURNING id, owner_kind, owner_id, role, content, sequence, created_at"
                ))
                .bind::<SqlUuid, _>(event_id)
                .bind::<Varchar, _>(owner.kind().as_str())
                .bind::<SqlUuid, _>(owner.id())
                .bind::<Varchar, _>(role.as_str())
                .bind::<Text, _>(content)
                .bind::<BigInt, _>(next.next)
                .bind::<Timestamptz, _>(created_at)
                .get_result::<EventRow>(tx)?;
                row_to_event(row)
            })
        })
        .await
    }

    async fn list_events(&self, owner: EntityRef) -> PlanningRepositoryResult<Vec<LogEvent>> {
        self.run_blocking(move |connection| {
            diesel::sql_query(format!(
                "SELECT id, owner_kind, owner_id, role, content, sequence, created_at \
                 FROM {} WHERE owner_kind = $1 AND owner_id = $2 ORDER BY sequence ASC",
                event_table(owner.kind())
            ))
            .bind::<Varchar, _>(owner.kind().as_str())
            .bind::<SqlUuid, _>(owner.id())
            .load::<EventRow>(connection)?
            .into_iter()
            .map(row_to_event)
            .collect()
        })
        .await
    }

    async fn delete_cascade(
        &self,
        confirmation: &DeletionConfirmation,
        deleted_at: DateTime<Utc>,
    ) -> PlanningRepositoryResult<DeletionReceipt> {
        let target = confirmation.target();
        let actor = confirmation.actor();
        let reason = confirmation.reason().to_owned();
        self.run_blocking(move |connection| {
            connection.transaction::<_, PlanningRepositoryError, _>(|tx| {
                if !entity_exists(tx, target)? {
                    return Err(PlanningRepositoryError::NotFound(target));
                }
                diesel::sql_query("SET LOCAL app.allow_append_only_cascade = 'on'").execute(tx)?;
                let removed = cascade(tx, target)?;
                let cascaded_rows =
                    i64::try_from(removed).map_err(PlanningRepositoryError::persistence)?;
                let row = NewReceiptRow {
                    id: uuid::Uuid::new_v4(),
                    target_kind: target.kind().as_str().to_owned(),
                    target_id: target.id(),
                    actor_id: actor.into_inner(),
                    reason: reason.clone(),
                    cascaded_rows,
                    deleted_at,
                };
                diesel::insert_into(deletion_receipts::table)
                    .values(&row)
                    .execute(tx)?;
                Ok(DeletionReceipt {
                    target,
                    actor,
                    reason,
                    cascaded_rows: u64::try_from(removed)
                        .map_err(PlanningRepositoryError::persistence)?,
                    deleted_at,
                })
            })
        })
        .await
    }

    async fn list_deletion_receipts(
        &self,
        actor: UserId,
    ) -> PlanningRepositoryResult<Vec<DeletionReceipt>> {
        self.run_blocking(move |connection| {
            deletion_receipts::table
                .filter(deletion_receipts::actor_id.eq(actor.into_inner()))
                .order(deletion_receipts::position.asc())
                .select(ReceiptRow::as_select())
                .load::<ReceiptRow>(connection)?
                .into_iter()
                .map(row_to_receipt)
                .collect()
        })
        .await
    }
}
