//! Shared wiring for in-memory integration tests.

use std::sync::Arc;

use mockable::DefaultClock;
use plansync::{
    planning::{
        adapters::memory::InMemoryPlanningRepository,
        domain::{Epic, EpicField, EpicStage, Feature, ItemContent, UserId},
        services::{LifecycleService, ProposeRequest},
    },
    sync::{
        adapters::{
            cipher::ChaChaCredentialCipher,
            memory::{
                InMemoryIntegrationRepository, InMemoryMappingRepository,
                InMemoryPushRunRepository, ScriptedProviderAdapter,
            },
        },
        domain::{AccessToken, Provider},
        services::{
            ConnectRequest, IntegrationService, ProviderRegistry, PushConfig, PushService,
            RetryPolicy, SyncStores,
        },
    },
};
use rstest::fixture;

/// Lifecycle service over the in-memory planning store.
pub type Lifecycle = LifecycleService<InMemoryPlanningRepository, DefaultClock>;

/// Push service over the in-memory stores.
pub type Push = PushService<
    InMemoryPlanningRepository,
    InMemoryMappingRepository,
    InMemoryPushRunRepository,
    InMemoryIntegrationRepository,
    DefaultClock,
>;

/// Every service of the crate wired to shared in-memory stores.
pub struct Stack {
    pub owner: UserId,
    pub lifecycle: Lifecycle,
    pub integrations: IntegrationService<InMemoryIntegrationRepository, DefaultClock>,
    pub push: Push,
    pub mappings: Arc<InMemoryMappingRepository>,
    pub jira: ScriptedProviderAdapter,
    pub linear: ScriptedProviderAdapter,
}

/// Provides a fresh stack with scripted Jira and Linear adapters.
#[fixture]
pub fn stack() -> Stack {
    let clock = Arc::new(DefaultClock);
    let planning = Arc::new(InMemoryPlanningRepository::new());
    let mappings = Arc::new(InMemoryMappingRepository::new());
    let integration_store = Arc::new(InMemoryIntegrationRepository::new());
    let jira = ScriptedProviderAdapter::new(Provider::Jira);
    let linear = ScriptedProviderAdapter::new(Provider::Linear);
    let registry = ProviderRegistry::new()
        .with_adapter(Arc::new(jira.clone()))
        .with_adapter(Arc::new(linear.clone()));
    let cipher = Arc::new(ChaChaCredentialCipher::from_secret("in-memory stack secret"));
    let stores = SyncStores {
        planning: Arc::clone(&planning),
        mappings: Arc::clone(&mappings),
        runs: Arc::new(InMemoryPushRunRepository::new()),
        integrations: Arc::clone(&integration_store),
    };
    let push = PushService::new(stores, cipher.clone(), registry.clone(), Arc::clone(&clock))
        .with_config(PushConfig {
            retry: RetryPolicy::NONE,
            ..PushConfig::default()
        });

    Stack {
        owner: UserId::new(),
        lifecycle: LifecycleService::new(planning, Arc::clone(&clock)),
        integrations: IntegrationService::new(integration_store, cipher, registry, clock),
        push,
        mappings,
        jira,
        linear,
    }
}

impl Stack {
    /// Connects `provider` with the given default project and team.
    ///
    /// # Errors
    ///
    /// Returns an error if the integration cannot be stored.
    pub async fn connect(
        &self,
        provider: Provider,
        project: Option<&str>,
        team: Option<&str>,
    ) -> Result<(), eyre::Report> {
        let request = ConnectRequest {
            access_token: AccessToken::new("token"),
            refresh_token: None,
            expires_at: None,
        };
        self.integrations
            .connect(self.owner, provider, request)
            .await?;
        self.integrations
            .set_defaults(
                self.owner,
                provider,
                project.map(str::to_owned),
                team.map(str::to_owned),
            )
            .await?;
        Ok(())
    }

    /// Creates an epic and walks it to `epic_locked`.
    ///
    /// # Errors
    ///
    /// Returns an error if any lifecycle step fails.
    pub async fn locked_epic(&self, title: &str) -> Result<Epic, eyre::Report> {
        let epic = self.lifecycle.create_epic(self.owner, title).await?;
        let steps = [
            (EpicField::ProblemStatement, EpicStage::OutcomeCapture),
            (EpicField::DesiredOutcome, EpicStage::EpicFinal),
            (EpicField::Summary, EpicStage::EpicLocked),
        ];
        for (field, target) in steps {
            let proposal = self
                .lifecycle
                .propose(ProposeRequest::new(epic.id(), field, "Agreed", target))
                .await?;
            self.lifecycle
                .confirm(epic.id(), &proposal.proposal_id)
                .await?;
        }
        Ok(self.lifecycle.get_epic(epic.id()).await?)
    }

    /// Creates and approves a feature under `epic`.
    ///
    /// # Errors
    ///
    /// Returns an error if any lifecycle step fails.
    pub async fn approved_feature(
        &self,
        epic: &Epic,
        title: &str,
    ) -> Result<Feature, eyre::Report> {
        let feature = self
            .lifecycle
            .create_feature(epic.id(), ItemContent::new(title)?)
            .await?;
        self.lifecycle.start_feature_refinement(feature.id()).await?;
        Ok(self.lifecycle.approve_feature(feature.id()).await?)
    }
}
