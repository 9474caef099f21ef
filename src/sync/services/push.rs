//! Push orchestration.
//!
//! A push walks the epic's subtree in a fixed order (epic, features,
//! stories per feature, linked bugs), classifies every entity with
//! [`decide`], and then either records the classifications as a preview or
//! executes them against the tracker. Both paths share one planning step, so
//! a preview and a push over the same store state agree entity by entity.
//! Per-entity failures are collected on the run and never abort it.

use super::credentials::{self, CredentialError, RefreshCause};
use super::retry::{Attempted, call_with_retry};
use super::{FailureMessages, ProviderRegistry, PushConfig};
use crate::planning::domain::{EntityRef, EpicId, EpicStage, ItemKind, UserId, WorkItem};
use crate::planning::ports::{PlanningRepository, PlanningRepositoryError};
use crate::sync::domain::{
    AccessToken, CanonicalPayload, ContentHash, ErrorCategory, ExternalIntegration,
    ExternalPushMapping, FailedItem, FieldMapping, MappingKey, ParentLink, PreviewItem, Provider,
    PushDecision, PushPayload, PushRun, PushRunId, PushScope, PushedItem, SkipReason,
    SkippedItem, SyncDomainError, decide,
};
use crate::sync::ports::{
    CreatedIssue, CredentialCipher, ErrorClass, IntegrationRepository, IntegrationRepositoryError,
    MappingRepository, MappingRepositoryError, ProviderAdapter, ProviderError, PushRunRepository,
    PushRunRepositoryError,
};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// What to push and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushRequest {
    /// Pushing user.
    pub user_id: UserId,
    /// Target tracker.
    pub provider: Provider,
    /// Root epic.
    pub epic_id: EpicId,
    /// Subtree to push.
    pub scope: PushScope,
    /// Whether bugs linked to in-scope entities are pushed too.
    pub include_bugs: bool,
}

impl PushRequest {
    /// Creates a request without linked bugs.
    #[must_use]
    pub const fn new(
        user_id: UserId,
        provider: Provider,
        epic_id: EpicId,
        scope: PushScope,
    ) -> Self {
        Self {
            user_id,
            provider,
            epic_id,
            scope,
            include_bugs: false,
        }
    }

    /// Includes linked bugs.
    #[must_use]
    pub const fn with_bugs(mut self) -> Self {
        self.include_bugs = true;
        self
    }

    const fn mapping_key(&self, entity: EntityRef) -> MappingKey {
        MappingKey::new(self.user_id, self.provider, entity)
    }
}

/// Errors that stop a push before or outside its per-entity work.
#[derive(Debug, Error)]
pub enum PushError {
    /// The user has no connected integration for the tracker.
    #[error("{0} integration is not connected")]
    IntegrationNotConnected(Provider),
    /// Neither a default project nor a default team is configured.
    #[error("{0} integration has no default project")]
    MissingDefaultProject(Provider),
    /// No adapter is registered for the tracker.
    #[error("no adapter registered for {0}")]
    AdapterNotRegistered(Provider),
    /// The root epic does not exist.
    #[error("epic not found: {0}")]
    EpicNotFound(EpicId),
    /// The run does not exist.
    #[error("push run not found: {0}")]
    RunNotFound(PushRunId),
    /// A payload could not be hashed.
    #[error(transparent)]
    Domain(#[from] SyncDomainError),
    /// Credentials could not be unlocked.
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    /// Reading planning artefacts failed.
    #[error(transparent)]
    Planning(#[from] PlanningRepositoryError),
    /// Reading mappings failed.
    #[error(transparent)]
    Mappings(#[from] MappingRepositoryError),
    /// Recording the run failed.
    #[error(transparent)]
    Runs(#[from] PushRunRepositoryError),
    /// Reading the integration failed.
    #[error(transparent)]
    Integrations(#[from] IntegrationRepositoryError),
}

/// Result type for push service operations.
pub type PushResult<T> = Result<T, PushError>;

/// Stores the push service reads and writes.
pub struct SyncStores<P, M, R, I> {
    /// Planning artefacts.
    pub planning: Arc<P>,
    /// Push mappings.
    pub mappings: Arc<M>,
    /// Push run records.
    pub runs: Arc<R>,
    /// Tracker integrations.
    pub integrations: Arc<I>,
}

impl<P, M, R, I> Clone for SyncStores<P, M, R, I> {
    fn clone(&self) -> Self {
        Self {
            planning: Arc::clone(&self.planning),
            mappings: Arc::clone(&self.mappings),
            runs: Arc::clone(&self.runs),
            integrations: Arc::clone(&self.integrations),
        }
    }
}

/// Entity selected for a push, before the mapping lookup.
struct Candidate {
    entity: EntityRef,
    parent: Option<EntityRef>,
    payload: CanonicalPayload,
    eligible: bool,
}

impl Candidate {
    fn item<K: ItemKind>(
        item: &WorkItem<K>,
        parent: Option<EntityRef>,
        mapping: &FieldMapping,
    ) -> Self {
        Self {
            entity: item.entity_ref(),
            parent,
            payload: CanonicalPayload::for_item(K::KIND, item.content(), mapping),
            eligible: item.is_approved(),
        }
    }
}

/// Classified entity.
struct Planned {
    entity: EntityRef,
    parent: Option<EntityRef>,
    payload: CanonicalPayload,
    hash: ContentHash,
    decision: PushDecision,
    existing: Option<ExternalPushMapping>,
}

/// Validated destination of a push.
struct Target {
    integration: ExternalIntegration,
    project: String,
    adapter: Arc<dyn ProviderAdapter>,
}

/// Mutable state of one real push.
struct RunState {
    run: PushRun,
    integration: ExternalIntegration,
    project: String,
    adapter: Arc<dyn ProviderAdapter>,
    token: AccessToken,
    refreshed: bool,
    links: HashMap<EntityRef, ParentLink>,
}

/// Outcome of a successful tracker call for one entity.
struct Delivered {
    issue: CreatedIssue,
    expected: Option<ContentHash>,
    is_create: bool,
    attempts: u32,
}

/// Push orchestration service.
#[derive(Clone)]
pub struct PushService<P, M, R, I, C>
where
    P: PlanningRepository,
    M: MappingRepository,
    R: PushRunRepository,
    I: IntegrationRepository,
    C: Clock + Send + Sync,
{
    stores: SyncStores<P, M, R, I>,
    cipher: Arc<dyn CredentialCipher>,
    registry: ProviderRegistry,
    messages: FailureMessages,
    config: PushConfig,
    clock: Arc<C>,
}

impl<P, M, R, I, C> PushService<P, M, R, I, C>
where
    P: PlanningRepository,
    M: MappingRepository,
    R: PushRunRepository,
    I: IntegrationRepository,
    C: Clock + Send + Sync,
{
    /// Creates a push service with the default configuration and messages.
    #[must_use]
    pub fn new(
        stores: SyncStores<P, M, R, I>,
        cipher: Arc<dyn CredentialCipher>,
        registry: ProviderRegistry,
        clock: Arc<C>,
    ) -> Self {
        Self {
            stores,
            cipher,
            registry,
            messages: FailureMessages::default(),
            config: PushConfig::default(),
            clock,
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub const fn with_config(mut self, config: PushConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the failure message templates.
    #[must_use]
    pub fn with_messages(mut self, messages: FailureMessages) -> Self {
        self.messages = messages;
        self
    }

    /// Classifies every entity in scope without calling the tracker or
    /// writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::IntegrationNotConnected`],
    /// [`PushError::MissingDefaultProject`], or [`PushError::EpicNotFound`]
    /// when the push could not start.
    pub async fn preview(&self, request: &PushRequest) -> PushResult<PushRun> {
        let target = self.target(request).await?;
        let plan = self.plan(request, target.integration.field_mapping()).await?;
        let mut run = PushRun::start(
            request.user_id,
            request.provider,
            request.epic_id,
            request.scope,
            request.include_bugs,
            true,
            &*self.clock,
        );
        for planned in plan {
            let skip_reason = skip_reason(&planned.decision);
            if let Some(reason) = skip_reason {
                run.skipped.push(SkippedItem {
                    entity: planned.entity,
                    reason,
                });
            }
            run.preview.push(PreviewItem {
                entity: planned.entity,
                title: planned.payload.title().to_owned(),
                action: planned.decision.action(),
                skip_reason,
            });
        }
        run.finish(&*self.clock);
        info!(
            run_id = %run.id,
            epic_id = %run.epic_id,
            provider = %run.provider,
            creates = run.summary.created,
            updates = run.summary.updated,
            skips = run.summary.skipped,
            "push previewed"
        );
        Ok(run)
    }

    /// Pushes every entity in scope and records the run.
    ///
    /// The returned run has raw provider error text removed.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::preview`], plus
    /// [`PushError::Credentials`] when the stored tokens cannot be decrypted
    /// and [`PushError::Runs`] when the run record cannot be written.
    /// Failures of individual entities are reported on the run instead.
    pub async fn push(&self, request: &PushRequest) -> PushResult<PushRun> {
        let target = self.target(request).await?;
        let plan = self.plan(request, target.integration.field_mapping()).await?;
        let token = credentials::unlock(&target.integration, self.cipher.as_ref())?;
        let run = PushRun::start(
            request.user_id,
            request.provider,
            request.epic_id,
            request.scope,
            request.include_bugs,
            false,
            &*self.clock,
        );
        self.stores.runs.begin(&run).await?;
        info!(
            run_id = %run.id,
            user_id = %request.user_id,
            epic_id = %request.epic_id,
            provider = %request.provider,
            scope = %request.scope,
            entities = plan.len(),
            "push run started"
        );
        let links = plan
            .iter()
            .filter_map(|planned| planned.existing.as_ref())
            .map(|mapping| (mapping.key.entity, parent_link(mapping.key.entity, mapping)))
            .collect();
        let mut state = RunState {
            run,
            integration: target.integration,
            project: target.project,
            adapter: target.adapter,
            token,
            refreshed: false,
            links,
        };
        self.refresh_if_expiring(&mut state).await;
        for planned in plan {
            self.push_entity(request, &mut state, planned).await;
        }
        let mut finished = state.run;
        finished.finish(&*self.clock);
        self.stores.runs.finish(&finished).await?;
        info!(
            run_id = %finished.id,
            status = %finished.status,
            created = finished.summary.created,
            updated = finished.summary.updated,
            failed = finished.summary.failed,
            skipped = finished.summary.skipped,
            duration_ms = finished.summary.duration_ms,
            "push run finished"
        );
        Ok(finished.redacted())
    }

    /// Lists the runs of `user` for `epic`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Runs`] when the lookup fails.
    pub async fn list_runs(&self, user: UserId, epic: EpicId) -> PushResult<Vec<PushRun>> {
        let runs = self.stores.runs.list_runs(user, epic).await?;
        Ok(runs.iter().map(PushRun::redacted).collect())
    }

    /// Retrieves one run.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::RunNotFound`] for unknown runs.
    pub async fn get_run(&self, id: PushRunId) -> PushResult<PushRun> {
        self.stores
            .runs
            .find(id)
            .await?
            .map(|run| run.redacted())
            .ok_or(PushError::RunNotFound(id))
    }

    async fn target(&self, request: &PushRequest) -> PushResult<Target> {
        let provider = request.provider;
        let integration = self
            .stores
            .integrations
            .find(request.user_id, provider)
            .await?
            .filter(|integration| integration.connected_credentials().is_ok())
            .ok_or(PushError::IntegrationNotConnected(provider))?;
        let project = integration
            .push_target()
            .map(str::to_owned)
            .ok_or(PushError::MissingDefaultProject(provider))?;
        let adapter = self
            .registry
            .get(provider)
            .ok_or(PushError::AdapterNotRegistered(provider))?;
        Ok(Target {
            integration,
            project,
            adapter,
        })
    }

    async fn plan(
        &self,
        request: &PushRequest,
        mapping: &FieldMapping,
    ) -> PushResult<Vec<Planned>> {
        let candidates = self.collect(request, mapping).await?;
        let mut plan = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let hash = candidate.payload.content_hash()?;
            let existing = self
                .stores
                .mappings
                .find(&request.mapping_key(candidate.entity))
                .await?;
            let decision = decide(candidate.eligible, &hash, existing.clone());
            debug!(
                entity = %candidate.entity,
                action = ?decision.action(),
                "entity classified"
            );
            plan.push(Planned {
                entity: candidate.entity,
                parent: candidate.parent,
                payload: candidate.payload,
                hash,
                decision,
                existing,
            });
        }
        Ok(plan)
    }

    async fn collect(
        &self,
        request: &PushRequest,
        mapping: &FieldMapping,
    ) -> PushResult<Vec<Candidate>> {
        let planning = &self.stores.planning;
        let epic = planning
            .find_epic(request.epic_id)
            .await?
            .ok_or(PushError::EpicNotFound(request.epic_id))?;
        let epic_ref = epic.entity_ref();
        let mut candidates = vec![Candidate {
            entity: epic_ref,
            parent: None,
            payload: CanonicalPayload::for_epic(&epic, mapping),
            eligible: epic.stage() == EpicStage::EpicLocked,
        }];
        if request.scope.includes_features() {
            let features = planning.list_features(epic.id()).await?;
            candidates.extend(
                features
                    .iter()
                    .map(|feature| Candidate::item(feature, Some(epic_ref), mapping)),
            );
            if request.scope.includes_stories() {
                for feature in &features {
                    let stories = planning.list_stories(feature.id()).await?;
                    let parent = Some(feature.entity_ref());
                    candidates.extend(
                        stories
                            .iter()
                            .map(|story| Candidate::item(story, parent, mapping)),
                    );
                }
            }
        }
        if request.include_bugs {
            let targets: Vec<EntityRef> = candidates.iter().map(|c| c.entity).collect();
            let bugs = planning.list_bugs_linked_to(&targets).await?;
            candidates.extend(bugs.iter().map(|bug| Candidate::item(bug, None, mapping)));
        }
        Ok(candidates)
    }

    async fn push_entity(&self, request: &PushRequest, state: &mut RunState, planned: Planned) {
        let Planned {
            entity,
            parent,
            payload: content,
            hash,
            decision,
            ..
        } = planned;
        let existing = match decision {
            PushDecision::Skip(reason) => {
                state.run.skipped.push(SkippedItem { entity, reason });
                return;
            }
            PushDecision::Create => None,
            PushDecision::Update(mapping) => Some(mapping),
        };
        let payload = PushPayload {
            content,
            parent: parent.and_then(|parent_ref| state.links.get(&parent_ref).cloned()),
        };
        match self.deliver(state, existing.as_ref(), &payload).await {
            Ok(delivered) => {
                self.record(request, state, entity, &payload, hash, delivered)
                    .await;
            }
            Err((err, attempts)) => {
                warn!(
                    run_id = %state.run.id,
                    entity = %entity,
                    attempts,
                    error = %err,
                    "entity push failed"
                );
                let failure = self.failure(
                    request.provider,
                    entity,
                    &payload,
                    err.category(),
                    err.to_string(),
                    attempts,
                );
                state.run.failed.push(failure);
            }
        }
    }

    /// Sends the create or update, refreshing the token at most once per run
    /// when the tracker reports it expired.
    async fn deliver(
        &self,
        state: &mut RunState,
        existing: Option<&ExternalPushMapping>,
        payload: &PushPayload,
    ) -> Result<Delivered, (ProviderError, u32)> {
        let first = self.call(state, existing, payload).await;
        let expired = first
            .result
            .as_ref()
            .is_err_and(|err| err.class() == ErrorClass::TokenExpired);
        let attempted = if expired && !state.refreshed {
            state.refreshed = true;
            match self.refresh(state, RefreshCause::Rejected).await {
                Ok(()) => {
                    let second = self.call(state, existing, payload).await;
                    Attempted {
                        result: second.result,
                        attempts: first.attempts.saturating_add(second.attempts),
                    }
                }
                Err(err) => Attempted {
                    result: Err(credentials::refresh_failure(err)),
                    attempts: first.attempts,
                },
            }
        } else {
            first
        };
        let attempts = attempted.attempts;
        attempted
            .result
            .map(|issue| Delivered {
                issue,
                expected: existing.map(|mapping| mapping.last_push_hash.clone()),
                is_create: existing.is_none(),
                attempts,
            })
            .map_err(|err| (err, attempts))
    }

    async fn call(
        &self,
        state: &RunState,
        existing: Option<&ExternalPushMapping>,
        payload: &PushPayload,
    ) -> Attempted<CreatedIssue> {
        let adapter = state.adapter.as_ref();
        let token = &state.token;
        let policy = &self.config.retry;
        match existing {
            None => {
                let project = state.project.as_str();
                call_with_retry(policy, || adapter.create_issue(token, project, payload)).await
            }
            Some(mapping) => {
                let external_id = mapping.external_id.as_str();
                let attempted =
                    call_with_retry(policy, || adapter.update_issue(token, external_id, payload))
                        .await;
                Attempted {
                    result: attempted.result.map(|url| CreatedIssue {
                        external_id: mapping.external_id.clone(),
                        external_key: mapping.external_key.clone(),
                        url: url.or_else(|| mapping.external_url.clone()),
                    }),
                    attempts: attempted.attempts,
                }
            }
        }
    }

    async fn refresh(
        &self,
        state: &mut RunState,
        cause: RefreshCause,
    ) -> Result<(), CredentialError> {
        state.token = credentials::refresh(
            &mut state.integration,
            state.adapter.as_ref(),
            self.cipher.as_ref(),
            self.stores.integrations.as_ref(),
            self.clock.as_ref(),
            cause,
        )
        .await?;
        Ok(())
    }

    async fn refresh_if_expiring(&self, state: &mut RunState) {
        let skew = self.config.refresh_skew();
        let now = self.clock.utc();
        let expiring = state
            .integration
            .credentials()
            .is_some_and(|stored| stored.expires_within(now, skew));
        if !expiring {
            return;
        }
        debug!(run_id = %state.run.id, "access token near expiry; refreshing");
        if let Err(err) = self.refresh(state, RefreshCause::Expiring).await {
            state.refreshed = true;
            warn!(
                run_id = %state.run.id,
                error = %err,
                "proactive token refresh failed; continuing with stored token"
            );
        }
    }

    async fn record(
        &self,
        request: &PushRequest,
        state: &mut RunState,
        entity: EntityRef,
        payload: &PushPayload,
        hash: ContentHash,
        delivered: Delivered,
    ) {
        let Delivered {
            issue,
            expected,
            is_create,
            attempts,
        } = delivered;
        let mapping = ExternalPushMapping {
            key: request.mapping_key(entity),
            external_id: issue.external_id,
            external_key: issue.external_key,
            external_url: issue.url,
            last_pushed_at: self.clock.utc(),
            last_push_hash: hash,
        };
        if let Err(err) = self.stores.mappings.upsert_if(&mapping, expected.as_ref()).await {
            warn!(
                run_id = %state.run.id,
                entity = %entity,
                external_id = %mapping.external_id,
                error = %err,
                "tracker call succeeded but the mapping was not written"
            );
            let failure = self.failure(
                request.provider,
                entity,
                payload,
                ErrorCategory::Unknown,
                err.to_string(),
                attempts,
            );
            state.run.failed.push(failure);
            return;
        }
        state.links.insert(entity, parent_link(entity, &mapping));
        let item = PushedItem {
            entity,
            external_id: mapping.external_id,
            external_key: mapping.external_key,
            external_url: mapping.external_url,
        };
        if is_create {
            state.run.created.push(item);
        } else {
            state.run.updated.push(item);
        }
    }

    fn failure(
        &self,
        provider: Provider,
        entity: EntityRef,
        payload: &PushPayload,
        category: ErrorCategory,
        detail: String,
        attempts: u32,
    ) -> FailedItem {
        FailedItem {
            entity,
            category,
            message: self.messages.render(
                category,
                provider,
                entity.kind(),
                payload.content.title(),
            ),
            detail: Some(detail),
            retried: attempts > 1,
            attempts,
        }
    }
}

const fn skip_reason(decision: &PushDecision) -> Option<SkipReason> {
    match decision {
        PushDecision::Skip(reason) => Some(*reason),
        PushDecision::Create | PushDecision::Update(_) => None,
    }
}

fn parent_link(entity: EntityRef, mapping: &ExternalPushMapping) -> ParentLink {
    ParentLink {
        entity,
        external_id: mapping.external_id.clone(),
        external_key: mapping.external_key.clone(),
    }
}
