//! `PostgreSQL` repository for mappings, push runs, and integrations.

use super::{
    models::{
        IntegrationChanges, IntegrationRow, MappingChanges, MappingRow, NewIntegrationRow,
        NewMappingRow, NewPushRunRow, PushRunOutcome, PushRunRow,
    },
    schema::{external_integrations, external_push_mappings, external_push_runs},
};
use crate::planning::domain::{EntityKind, EntityRef, EpicId, UserId};
use crate::sync::{
    domain::{
        ConnectionStatus, ContentHash, EncryptedCredentials, EncryptedSecret, ExternalIntegration,
        ExternalPushMapping, FieldMapping, IntegrationId, MappingKey, PersistedIntegrationData,
        Provider, PushRun, PushRunId, PushScope, PushStatus,
    },
    ports::{
        IntegrationRepository, IntegrationRepositoryError, IntegrationRepositoryResult,
        MappingRepository, MappingRepositoryError, MappingRepositoryResult, PushRunRepository,
        PushRunRepositoryError, PushRunRepositoryResult,
    },
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// `PostgreSQL` connection pool type used by sync adapters.
pub type SyncPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed store implementing every sync repository port.
#[derive(Debug, Clone)]
pub struct PostgresSyncRepository {
    pool: SyncPgPool,
}

/// Failure inside a blocking database closure, before it is mapped to the
/// error type of the calling port.
#[derive(Debug, Error)]
enum StoreFailure {
    #[error(transparent)]
    Database(#[from] DieselError),
    #[error(transparent)]
    Pool(diesel::r2d2::PoolError),
    #[error(transparent)]
    Join(tokio::task::JoinError),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("compare-and-set lost")]
    Conflict,
    #[error("row not found")]
    Missing,
    #[error("row already finalised")]
    Finished,
}

type StoreResult<T> = Result<T, StoreFailure>;

impl PostgresSyncRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: SyncPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(StoreFailure::Pool)?;
            f(&mut connection)
        })
        .await
        .map_err(StoreFailure::Join)?
    }
}

fn to_json<T: Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|err| StoreFailure::Corrupt(err.to_string()))
}

fn from_json<T: DeserializeOwned>(value: Value) -> StoreResult<T> {
    serde_json::from_value(value).map_err(|err| StoreFailure::Corrupt(err.to_string()))
}

fn parsed<T, E: std::fmt::Display>(result: Result<T, E>) -> StoreResult<T> {
    result.map_err(|err| StoreFailure::Corrupt(err.to_string()))
}

// Mappings

fn mapping_changes(mapping: &ExternalPushMapping) -> MappingChanges {
    MappingChanges {
        external_id: mapping.external_id.clone(),
        external_key: mapping.external_key.clone(),
        external_url: mapping.external_url.clone(),
        last_pushed_at: mapping.last_pushed_at,
        last_push_hash: mapping.last_push_hash.as_str().to_owned(),
    }
}

fn row_to_mapping(row: MappingRow) -> StoreResult<ExternalPushMapping> {
    let kind = parsed(EntityKind::try_from(row.entity_kind.as_str()))?;
    let provider = parsed(Provider::try_from(row.provider.as_str()))?;
    Ok(ExternalPushMapping {
        key: MappingKey::new(
            UserId::from_uuid(row.user_id),
            provider,
            EntityRef::new(kind, row.entity_id),
        ),
        external_id: row.external_id,
        external_key: row.external_key,
        external_url: row.external_url,
        last_pushed_at: row.last_pushed_at,
        last_push_hash: ContentHash::new(row.last_push_hash.trim_end()),
    })
}

fn mapping_error(err: StoreFailure, key: MappingKey) -> MappingRepositoryError {
    match err {
        StoreFailure::Conflict => MappingRepositoryError::Conflict(key),
        other => MappingRepositoryError::persistence(other),
    }
}

#[async_trait]
impl MappingRepository for PostgresSyncRepository {
    async fn find(
        &self,
        key: &MappingKey,
    ) -> MappingRepositoryResult<Option<ExternalPushMapping>> {
        let lookup = *key;
        self.run_blocking(move |conn| {
            external_push_mappings::table
                .filter(external_push_mappings::user_id.eq(lookup.user_id.into_inner()))
                .filter(external_push_mappings::provider.eq(lookup.provider.as_str()))
                .filter(external_push_mappings::entity_kind.eq(lookup.entity.kind().as_str()))
                .filter(external_push_mappings::entity_id.eq(lookup.entity.id()))
                .select(MappingRow::as_select())
                .first(conn)
                .optional()?
                .map(row_to_mapping)
                .transpose()
        })
        .await
        .map_err(|err| mapping_error(err, lookup))
    }

    async fn upsert_if(
        &self,
        mapping: &ExternalPushMapping,
        expected: Option<&ContentHash>,
    ) -> MappingRepositoryResult<()> {
        let key = mapping.key;
        let changes = mapping_changes(mapping);
        let expected_hash = expected.map(|hash| hash.as_str().to_owned());
        self.run_blocking(move |conn| {
            let written = match expected_hash {
                None => diesel::insert_into(external_push_mappings::table)
                    .values(NewMappingRow {
                        user_id: key.user_id.into_inner(),
                        provider: key.provider.as_str().to_owned(),
                        entity_kind: key.entity.kind().as_str().to_owned(),
                        entity_id: key.entity.id(),
                        changes,
                    })
                    .on_conflict_do_nothing()
                    .execute(conn)?,
                Some(hash) => diesel::update(
                    external_push_mappings::table
                        .filter(external_push_mappings::user_id.eq(key.user_id.into_inner()))
                        .filter(external_push_mappings::provider.eq(key.provider.as_str()))
                        .filter(
                            external_push_mappings::entity_kind.eq(key.entity.kind().as_str()),
                        )
                        .filter(external_push_mappings::entity_id.eq(key.entity.id()))
                        .filter(external_push_mappings::last_push_hash.eq(hash)),
                )
                .set(&changes)
                .execute(conn)?,
            };
            if written == 1 {
                Ok(())
            } else {
                Err(StoreFailure::Conflict)
            }
        })
        .await
        .map_err(|err| mapping_error(err, key))
    }

    async fn list(
        &self,
        user: UserId,
        provider: Provider,
    ) -> MappingRepositoryResult<Vec<ExternalPushMapping>> {
        self.run_blocking(move |conn| {
            external_push_mappings::table
                .filter(external_push_mappings::user_id.eq(user.into_inner()))
                .filter(external_push_mappings::provider.eq(provider.as_str()))
                .order((
                    external_push_mappings::entity_kind.asc(),
                    external_push_mappings::entity_id.asc(),
                ))
                .select(MappingRow::as_select())
                .load(conn)?
                .into_iter()
                .map(row_to_mapping)
                .collect()
        })
        .await
        .map_err(MappingRepositoryError::persistence)
    }
}

// Push runs

fn run_outcome(run: &PushRun) -> StoreResult<PushRunOutcome> {
    Ok(PushRunOutcome {
        status: run.status.as_str().to_owned(),
        created: to_json(&run.created)?,
        updated: to_json(&run.updated)?,
        failed: to_json(&run.failed)?,
        skipped: to_json(&run.skipped)?,
        preview: to_json(&run.preview)?,
        summary: to_json(&run.summary)?,
        ended_at: run.ended_at,
    })
}

fn row_to_run(row: PushRunRow) -> StoreResult<PushRun> {
    Ok(PushRun {
        id: PushRunId::from_uuid(row.id),
        user_id: UserId::from_uuid(row.user_id),
        provider: parsed(Provider::try_from(row.provider.as_str()))?,
        epic_id: EpicId::from_uuid(row.epic_id),
        scope: parsed(PushScope::try_from(row.scope.as_str()))?,
        include_bugs: row.include_bugs,
        is_dry_run: row.is_dry_run,
        status: parsed(PushStatus::try_from(row.status.as_str()))?,
        created: from_json(row.created)?,
        updated: from_json(row.updated)?,
        failed: from_json(row.failed)?,
        skipped: from_json(row.skipped)?,
        preview: from_json(row.preview)?,
        summary: from_json(row.summary)?,
        started_at: row.started_at,
        ended_at: row.ended_at,
    })
}

fn run_error(err: StoreFailure, id: PushRunId) -> PushRunRepositoryError {
    match err {
        StoreFailure::Database(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            _,
        )) => PushRunRepositoryError::Duplicate(id),
        StoreFailure::Missing => PushRunRepositoryError::NotFound(id),
        StoreFailure::Finished => PushRunRepositoryError::AlreadyFinished(id),
        other => PushRunRepositoryError::persistence(other),
    }
}

#[async_trait]
impl PushRunRepository for PostgresSyncRepository {
    async fn begin(&self, run: &PushRun) -> PushRunRepositoryResult<()> {
        let id = run.id;
        let row = NewPushRunRow {
            id: run.id.into_inner(),
            user_id: run.user_id.into_inner(),
            provider: run.provider.as_str().to_owned(),
            epic_id: run.epic_id.into_inner(),
            scope: run.scope.as_str().to_owned(),
            include_bugs: run.include_bugs,
            is_dry_run: run.is_dry_run,
            started_at: run.started_at,
            outcome: run_outcome(run).map_err(|err| run_error(err, id))?,
        };
        self.run_blocking(move |conn| {
            diesel::insert_into(external_push_runs::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
        .map_err(|err| run_error(err, id))
    }

    async fn finish(&self, run: &PushRun) -> PushRunRepositoryResult<()> {
        let id = run.id;
        let outcome = run_outcome(run).map_err(|err| run_error(err, id))?;
        self.run_blocking(move |conn| {
            conn.transaction::<_, StoreFailure, _>(|tx| {
                let written = diesel::update(
                    external_push_runs::table
                        .filter(external_push_runs::id.eq(id.into_inner()))
                        .filter(external_push_runs::ended_at.is_null()),
                )
                .set(&outcome)
                .execute(tx)?;
                if written == 1 {
                    return Ok(());
                }
                let exists: i64 = external_push_runs::table
                    .filter(external_push_runs::id.eq(id.into_inner()))
                    .count()
                    .get_result(tx)?;
                Err(if exists == 0 {
                    StoreFailure::Missing
                } else {
                    StoreFailure::Finished
                })
            })
        })
        .await
        .map_err(|err| run_error(err, id))
    }

    async fn find(&self, id: PushRunId) -> PushRunRepositoryResult<Option<PushRun>> {
        self.run_blocking(move |conn| {
            external_push_runs::table
                .filter(external_push_runs::id.eq(id.into_inner()))
                .select(PushRunRow::as_select())
                .first(conn)
                .optional()?
                .map(row_to_run)
                .transpose()
        })
        .await
        .map_err(|err| run_error(err, id))
    }

    async fn list_runs(&self, user: UserId, epic: EpicId) -> PushRunRepositoryResult<Vec<PushRun>> {
        self.run_blocking(move |conn| {
            external_push_runs::table
                .filter(external_push_runs::user_id.eq(user.into_inner()))
                .filter(external_push_runs::epic_id.eq(epic.into_inner()))
                .order(external_push_runs::started_at.desc())
                .select(PushRunRow::as_select())
                .load(conn)?
                .into_iter()
                .map(row_to_run)
                .collect()
        })
        .await
        .map_err(PushRunRepositoryError::persistence)
    }
}

// Integrations

fn integration_changes(integration: &ExternalIntegration) -> StoreResult<IntegrationChanges> {
    let credentials = integration.credentials();
    Ok(IntegrationChanges {
        status: integration.status().as_str().to_owned(),
        access_token_encrypted: credentials
            .map(|stored| stored.access_token().as_bytes().to_vec()),
        refresh_token_encrypted: credentials
            .and_then(EncryptedCredentials::refresh_token)
            .map(|secret| secret.as_bytes().to_vec()),
        token_expires_at: credentials.and_then(EncryptedCredentials::expires_at),
        default_project: integration.default_project().map(str::to_owned),
        default_team: integration.default_team().map(str::to_owned),
        field_mapping: to_json(integration.field_mapping())?,
        updated_at: integration.updated_at(),
    })
}

fn row_to_integration(row: IntegrationRow) -> StoreResult<ExternalIntegration> {
    let credentials = row.access_token_encrypted.map(|access| {
        EncryptedCredentials::new(
            EncryptedSecret::new(access),
            row.refresh_token_encrypted.map(EncryptedSecret::new),
            row.token_expires_at,
        )
    });
    let field_mapping: FieldMapping = from_json(row.field_mapping)?;
    Ok(ExternalIntegration::from_persisted(PersistedIntegrationData {
        id: IntegrationId::from_uuid(row.id),
        user_id: UserId::from_uuid(row.user_id),
        provider: parsed(Provider::try_from(row.provider.as_str()))?,
        status: parsed(ConnectionStatus::try_from(row.status.as_str()))?,
        credentials,
        default_project: row.default_project,
        default_team: row.default_team,
        field_mapping,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

#[async_trait]
impl IntegrationRepository for PostgresSyncRepository {
    async fn find(
        &self,
        user: UserId,
        provider: Provider,
    ) -> IntegrationRepositoryResult<Option<ExternalIntegration>> {
        self.run_blocking(move |conn| {
            external_integrations::table
                .filter(external_integrations::user_id.eq(user.into_inner()))
                .filter(external_integrations::provider.eq(provider.as_str()))
                .select(IntegrationRow::as_select())
                .first(conn)
                .optional()?
                .map(row_to_integration)
                .transpose()
        })
        .await
        .map_err(IntegrationRepositoryError::persistence)
    }

    async fn save(&self, integration: &ExternalIntegration) -> IntegrationRepositoryResult<()> {
        let changes =
            integration_changes(integration).map_err(IntegrationRepositoryError::persistence)?;
        let row = NewIntegrationRow {
            id: integration.id().into_inner(),
            user_id: integration.user_id().into_inner(),
            provider: integration.provider().as_str().to_owned(),
            changes: changes.clone(),
            created_at: integration.created_at(),
        };
        self.run_blocking(move |conn| {
            diesel::insert_into(external_integrations::table)
                .values(&row)
                .on_conflict((
                    external_integrations::user_id,
                    external_integrations::provider,
                ))
                .do_update()
                .set(&changes)
                .execute(conn)?;
            Ok(())
        })
        .await
        .map_err(IntegrationRepositoryError::persistence)
    }

    async fn list(&self, user: UserId) -> IntegrationRepositoryResult<Vec<ExternalIntegration>> {
        self.run_blocking(move |conn| {
            external_integrations::table
                .filter(external_integrations::user_id.eq(user.into_inner()))
                .order(external_integrations::provider.asc())
                .select(IntegrationRow::as_select())
                .load(conn)?
                .into_iter()
                .map(row_to_integration)
                .collect()
        })
        .await
        .map_err(IntegrationRepositoryError::persistence)
    }
}
