//! Shared world state for epic lifecycle BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use plansync::planning::{
    adapters::memory::InMemoryPlanningRepository,
    domain::{Epic, PendingProposal, UserId},
    services::{LifecycleError, LifecycleService},
};
use rstest::fixture;

/// Service type used by the BDD world.
pub type TestLifecycleService = LifecycleService<InMemoryPlanningRepository, DefaultClock>;

/// Scenario world for epic lifecycle behaviour tests.
pub struct EpicLifecycleWorld {
    pub service: TestLifecycleService,
    pub owner: UserId,
    pub epic: Option<Epic>,
    pub proposal: Option<PendingProposal>,
    pub last_error: Option<LifecycleError>,
}

impl EpicLifecycleWorld {
    /// Creates a world with no epic.
    #[must_use]
    pub fn new() -> Self {
        let service = LifecycleService::new(
            Arc::new(InMemoryPlanningRepository::new()),
            Arc::new(DefaultClock),
        );

        Self {
            service,
            owner: UserId::new(),
            epic: None,
            proposal: None,
            last_error: None,
        }
    }

    /// Returns the epic created by the scenario.
    ///
    /// # Errors
    ///
    /// Returns an error when no epic has been created yet.
    pub fn epic(&self) -> Result<&Epic, eyre::Report> {
        self.epic
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing epic in scenario world"))
    }
}

impl Default for EpicLifecycleWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> EpicLifecycleWorld {
    EpicLifecycleWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
