//! In-memory mapping, push run, and integration stores.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::planning::domain::{EntityRef, EpicId, UserId};
use crate::sync::{
    domain::{
        ContentHash, ExternalIntegration, ExternalPushMapping, MappingKey, Provider, PushRun,
        PushRunId,
    },
    ports::{
        IntegrationRepository, IntegrationRepositoryError, IntegrationRepositoryResult,
        MappingRepository, MappingRepositoryError, MappingRepositoryResult, PushRunRepository,
        PushRunRepositoryError, PushRunRepositoryResult,
    },
};

fn poisoned(err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(err.to_string())
}

#[derive(Debug, Default)]
struct MappingState {
    rows: HashMap<MappingKey, ExternalPushMapping>,
    contested: HashSet<EntityRef>,
}

/// Thread-safe in-memory mapping repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMappingRepository {
    state: Arc<RwLock<MappingState>>,
}

impl InMemoryMappingRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every compare-and-set on `entity` fail as if another push had
    /// written the row first.
    ///
    /// # Errors
    ///
    /// Returns [`MappingRepositoryError::Persistence`] if the state lock is
    /// poisoned.
    pub fn contest(&self, entity: EntityRef) -> MappingRepositoryResult<()> {
        self.write_state()?.contested.insert(entity);
        Ok(())
    }

    /// Returns the number of stored rows.
    ///
    /// # Errors
    ///
    /// Returns [`MappingRepositoryError::Persistence`] if the state lock is
    /// poisoned.
    pub fn len(&self) -> MappingRepositoryResult<usize> {
        Ok(self.read_state()?.rows.len())
    }

    /// Returns `true` when no rows are stored.
    ///
    /// # Errors
    ///
    /// Returns [`MappingRepositoryError::Persistence`] if the state lock is
    /// poisoned.
    pub fn is_empty(&self) -> MappingRepositoryResult<bool> {
        Ok(self.read_state()?.rows.is_empty())
    }

    fn read_state(&self) -> MappingRepositoryResult<RwLockReadGuard<'_, MappingState>> {
        self.state
            .read()
            .map_err(|err| MappingRepositoryError::persistence(poisoned(err)))
    }

    fn write_state(&self) -> MappingRepositoryResult<RwLockWriteGuard<'_, MappingState>> {
        self.state
            .write()
            .map_err(|err| MappingRepositoryError::persistence(poisoned(err)))
    }
}

#[async_trait]
impl MappingRepository for InMemoryMappingRepository {
    async fn find(
        &self,
        key: &MappingKey,
    ) -> MappingRepositoryResult<Option<ExternalPushMapping>> {
        Ok(self.read_state()?.rows.get(key).cloned())
    }

    async fn upsert_if(
        &self,
        mapping: &ExternalPushMapping,
        expected: Option<&ContentHash>,
    ) -> MappingRepositoryResult<()> {
        let mut state = self.write_state()?;
        if state.contested.contains(&mapping.key.entity) {
            return Err(MappingRepositoryError::Conflict(mapping.key));
        }
        let stored = state.rows.get(&mapping.key).map(|row| &row.last_push_hash);
        if stored != expected {
            return Err(MappingRepositoryError::Conflict(mapping.key));
        }
        state.rows.insert(mapping.key, mapping.clone());
        Ok(())
    }

    async fn list(
        &self,
        user: UserId,
        provider: Provider,
    ) -> MappingRepositoryResult<Vec<ExternalPushMapping>> {
        let state = self.read_state()?;
        let mut mappings: Vec<ExternalPushMapping> = state
            .rows
            .values()
            .filter(|row| row.key.user_id == user && row.key.provider == provider)
            .cloned()
            .collect();
        mappings.sort_by_key(|row| row.key.entity);
        Ok(mappings)
    }
}

/// Thread-safe in-memory push run repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPushRunRepository {
    runs: Arc<RwLock<Vec<PushRun>>>,
}

impl InMemoryPushRunRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_runs(&self) -> PushRunRepositoryResult<RwLockReadGuard<'_, Vec<PushRun>>> {
        self.runs
            .read()
            .map_err(|err| PushRunRepositoryError::persistence(poisoned(err)))
    }

    fn write_runs(&self) -> PushRunRepositoryResult<RwLockWriteGuard<'_, Vec<PushRun>>> {
        self.runs
            .write()
            .map_err(|err| PushRunRepositoryError::persistence(poisoned(err)))
    }
}

#[async_trait]
impl PushRunRepository for InMemoryPushRunRepository {
    async fn begin(&self, run: &PushRun) -> PushRunRepositoryResult<()> {
        let mut runs = self.write_runs()?;
        if runs.iter().any(|stored| stored.id == run.id) {
            return Err(PushRunRepositoryError::Duplicate(run.id));
        }
        runs.push(run.clone());
        Ok(())
    }

    async fn finish(&self, run: &PushRun) -> PushRunRepositoryResult<()> {
        let mut runs = self.write_runs()?;
        let stored = runs
            .iter_mut()
            .find(|stored| stored.id == run.id)
            .ok_or(PushRunRepositoryError::NotFound(run.id))?;
        if stored.is_finished() {
            return Err(PushRunRepositoryError::AlreadyFinished(run.id));
        }
        *stored = run.clone();
        Ok(())
    }

    async fn find(&self, id: PushRunId) -> PushRunRepositoryResult<Option<PushRun>> {
        Ok(self.read_runs()?.iter().find(|run| run.id == id).cloned())
    }

    async fn list_runs(&self, user: UserId, epic: EpicId) -> PushRunRepositoryResult<Vec<PushRun>> {
        let runs = self.read_runs()?;
        let mut selected: Vec<PushRun> = runs
            .iter()
            .rev()
            .filter(|run| run.user_id == user && run.epic_id == epic)
            .cloned()
            .collect();
        selected.sort_by(|left, right| right.started_at.cmp(&left.started_at));
        Ok(selected)
    }
}

type IntegrationRows = HashMap<(UserId, Provider), ExternalIntegration>;

/// Thread-safe in-memory integration repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIntegrationRepository {
    rows: Arc<RwLock<IntegrationRows>>,
    read_only: Arc<AtomicBool>,
}

impl InMemoryIntegrationRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later save fail as if the database were unreachable.
    pub fn reject_writes(&self) {
        self.read_only.store(true, Ordering::SeqCst);
    }

    fn read_rows(&self) -> IntegrationRepositoryResult<RwLockReadGuard<'_, IntegrationRows>> {
        self.rows
            .read()
            .map_err(|err| IntegrationRepositoryError::persistence(poisoned(err)))
    }

    fn write_rows(&self) -> IntegrationRepositoryResult<RwLockWriteGuard<'_, IntegrationRows>> {
        self.rows
            .write()
            .map_err(|err| IntegrationRepositoryError::persistence(poisoned(err)))
    }
}

#[async_trait]
impl IntegrationRepository for InMemoryIntegrationRepository {
    async fn find(
        &self,
        user: UserId,
        provider: Provider,
    ) -> IntegrationRepositoryResult<Option<ExternalIntegration>> {
        Ok(self.read_rows()?.get(&(user, provider)).cloned())
    }

    async fn save(&self, integration: &ExternalIntegration) -> IntegrationRepositoryResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(IntegrationRepositoryError::persistence(std::io::Error::other(
                "integration store rejects writes",
            )));
        }
        self.write_rows()?.insert(
            (integration.user_id(), integration.provider()),
            integration.clone(),
        );
        Ok(())
    }

    async fn list(&self, user: UserId) -> IntegrationRepositoryResult<Vec<ExternalIntegration>> {
        let rows = self.read_rows()?;
        let mut integrations: Vec<ExternalIntegration> = rows
            .values()
            .filter(|row| row.user_id() == user)
            .cloned()
            .collect();
        integrations.sort_by_key(ExternalIntegration::provider);
        Ok(integrations)
    }
}
