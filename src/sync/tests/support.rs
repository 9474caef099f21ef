//! Shared harness for sync service tests.

use std::sync::Arc;

use crate::planning::{
    adapters::memory::InMemoryPlanningRepository,
    domain::{
        Epic, EpicField, EpicId, EpicStage, Feature, FeatureId, ItemContent, UserId, UserStory,
    },
    services::{LifecycleService, ProposeRequest},
};
use crate::sync::{
    adapters::memory::{
        InMemoryIntegrationRepository, InMemoryMappingRepository, InMemoryPushRunRepository,
        PlaintextCipher, ScriptedProviderAdapter,
    },
    domain::{AccessToken, Provider, PushScope, RefreshToken},
    services::{
        ConnectRequest, IntegrationService, ProviderRegistry, PushConfig, PushRequest,
        PushService, RetryPolicy, SyncStores,
    },
};
use chrono::{DateTime, Utc};
use eyre::Result;
use mockable::DefaultClock;

pub(super) type TestPushService = PushService<
    InMemoryPlanningRepository,
    InMemoryMappingRepository,
    InMemoryPushRunRepository,
    InMemoryIntegrationRepository,
    DefaultClock,
>;

/// Retries twice without waiting.
pub(super) const FAST_RETRY: RetryPolicy = RetryPolicy {
    max_retries: 2,
    base_delay_ms: 0,
    multiplier: 2,
    max_delay_ms: 0,
};

pub(super) struct Harness {
    pub user: UserId,
    pub provider: Provider,
    pub lifecycle: LifecycleService<InMemoryPlanningRepository, DefaultClock>,
    pub mappings: Arc<InMemoryMappingRepository>,
    pub runs: Arc<InMemoryPushRunRepository>,
    pub integrations: Arc<InMemoryIntegrationRepository>,
    pub adapter: ScriptedProviderAdapter,
    pub integration_service: IntegrationService<InMemoryIntegrationRepository, DefaultClock>,
    pub service: TestPushService,
}

impl Harness {
    pub fn new(provider: Provider) -> Self {
        let clock = Arc::new(DefaultClock);
        let planning = Arc::new(InMemoryPlanningRepository::new());
        let mappings = Arc::new(InMemoryMappingRepository::new());
        let runs = Arc::new(InMemoryPushRunRepository::new());
        let integrations = Arc::new(InMemoryIntegrationRepository::new());
        let adapter = ScriptedProviderAdapter::new(provider);
        let registry = ProviderRegistry::new().with_adapter(Arc::new(adapter.clone()));
        let cipher = Arc::new(PlaintextCipher::new());
        let stores = SyncStores {
            planning: Arc::clone(&planning),
            mappings: Arc::clone(&mappings),
            runs: Arc::clone(&runs),
            integrations: Arc::clone(&integrations),
        };
        let service = PushService::new(stores, cipher.clone(), registry.clone(), Arc::clone(&clock))
            .with_config(PushConfig {
                retry: FAST_RETRY,
                ..PushConfig::default()
            });
        let integration_service = IntegrationService::new(
            Arc::clone(&integrations),
            cipher,
            registry,
            Arc::clone(&clock),
        )
        .with_retry(FAST_RETRY);
        Self {
            user: UserId::new(),
            provider,
            lifecycle: LifecycleService::new(planning, clock),
            mappings,
            runs,
            integrations,
            adapter,
            integration_service,
            service,
        }
    }

    /// Connects the tracker with default project `PLAN` and team `TEAM`.
    pub async fn connect(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.integration_service
            .connect(
                self.user,
                self.provider,
                ConnectRequest {
                    access_token: AccessToken::new(access_token),
                    refresh_token: refresh_token.map(RefreshToken::new),
                    expires_at,
                },
            )
            .await?;
        self.integration_service
            .set_defaults(
                self.user,
                self.provider,
                Some("PLAN".to_owned()),
                Some("TEAM".to_owned()),
            )
            .await?;
        Ok(())
    }

    pub async fn epic(&self, title: &str) -> Result<Epic> {
        Ok(self.lifecycle.create_epic(self.user, title).await?)
    }

    pub async fn locked_epic(&self, title: &str) -> Result<Epic> {
        let epic = self.epic(title).await?;
        let steps = [
            (EpicField::ProblemStatement, EpicStage::OutcomeCapture),
            (EpicField::DesiredOutcome, EpicStage::EpicFinal),
            (EpicField::Summary, EpicStage::EpicLocked),
        ];
        for (field, target) in steps {
            let proposal = self
                .lifecycle
                .propose(ProposeRequest::new(epic.id(), field, "Agreed text", target))
                .await?;
            self.lifecycle
                .confirm(epic.id(), &proposal.proposal_id)
                .await?;
        }
        Ok(self.lifecycle.get_epic(epic.id()).await?)
    }

    pub async fn draft_feature(&self, epic_id: EpicId, title: &str) -> Result<Feature> {
        Ok(self
            .lifecycle
            .create_feature(epic_id, ItemContent::new(title)?)
            .await?)
    }

    pub async fn approved_feature(&self, epic_id: EpicId, title: &str) -> Result<Feature> {
        let feature = self.draft_feature(epic_id, title).await?;
        self.lifecycle.start_feature_refinement(feature.id()).await?;
        Ok(self.lifecycle.approve_feature(feature.id()).await?)
    }

    pub async fn approved_story(&self, feature_id: FeatureId, title: &str) -> Result<UserStory> {
        let story = self
            .lifecycle
            .create_story(feature_id, ItemContent::new(title)?)
            .await?;
        self.lifecycle.start_story_refinement(story.id()).await?;
        Ok(self.lifecycle.approve_story(story.id()).await?)
    }

    pub const fn request(&self, epic_id: EpicId, scope: PushScope) -> PushRequest {
        PushRequest::new(self.user, self.provider, epic_id, scope)
    }
}
