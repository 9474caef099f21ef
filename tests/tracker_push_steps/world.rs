//! Shared world state for tracker push BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use plansync::{
    planning::{
        adapters::memory::InMemoryPlanningRepository,
        domain::{Epic, UserId},
        services::LifecycleService,
    },
    sync::{
        adapters::memory::{
            InMemoryIntegrationRepository, InMemoryMappingRepository, InMemoryPushRunRepository,
            PlaintextCipher, ScriptedProviderAdapter,
        },
        domain::{Provider, PushRun, PushScope},
        services::{
            IntegrationService, ProviderRegistry, PushConfig, PushRequest, PushService,
            RetryPolicy, SyncStores,
        },
    },
};
use rstest::fixture;

/// Push service type used by the BDD world.
pub type TestPushService = PushService<
    InMemoryPlanningRepository,
    InMemoryMappingRepository,
    InMemoryPushRunRepository,
    InMemoryIntegrationRepository,
    DefaultClock,
>;

/// Scenario world for tracker push behaviour tests.
pub struct TrackerPushWorld {
    pub owner: UserId,
    pub provider: Provider,
    pub lifecycle: LifecycleService<InMemoryPlanningRepository, DefaultClock>,
    pub integrations: IntegrationService<InMemoryIntegrationRepository, DefaultClock>,
    pub push: TestPushService,
    pub adapter: ScriptedProviderAdapter,
    pub epic: Option<Epic>,
    pub last_run: Option<PushRun>,
}

impl TrackerPushWorld {
    /// Creates a world wired to a scripted Jira adapter.
    #[must_use]
    pub fn new() -> Self {
        let clock = Arc::new(DefaultClock);
        let planning = Arc::new(InMemoryPlanningRepository::new());
        let integration_store = Arc::new(InMemoryIntegrationRepository::new());
        let adapter = ScriptedProviderAdapter::new(Provider::Jira);
        let registry = ProviderRegistry::new().with_adapter(Arc::new(adapter.clone()));
        let cipher = Arc::new(PlaintextCipher::new());
        let stores = SyncStores {
            planning: Arc::clone(&planning),
            mappings: Arc::new(InMemoryMappingRepository::new()),
            runs: Arc::new(InMemoryPushRunRepository::new()),
            integrations: Arc::clone(&integration_store),
        };
        let push = PushService::new(stores, cipher.clone(), registry.clone(), Arc::clone(&clock))
            .with_config(PushConfig {
                retry: RetryPolicy::NONE,
                ..PushConfig::default()
            });

        Self {
            owner: UserId::new(),
            provider: Provider::Jira,
            lifecycle: LifecycleService::new(planning, Arc::clone(&clock)),
            integrations: IntegrationService::new(integration_store, cipher, registry, clock),
            push,
            adapter,
            epic: None,
            last_run: None,
        }
    }

    /// Builds a push request for the scenario epic.
    ///
    /// # Errors
    ///
    /// Returns an error when no epic has been created yet.
    pub fn request(&self, scope: PushScope) -> Result<PushRequest, eyre::Report> {
        let epic = self
            .epic
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing epic in scenario world"))?;
        Ok(PushRequest::new(self.owner, self.provider, epic.id(), scope))
    }

    /// Returns the last run.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing has been pushed or previewed yet.
    pub fn run(&self) -> Result<&PushRun, eyre::Report> {
        self.last_run
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing run in scenario world"))
    }
}

impl Default for TrackerPushWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> TrackerPushWorld {
    TrackerPushWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
