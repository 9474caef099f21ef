//! Scriptable provider adapter for exercising the push orchestrator.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::sync::{
    domain::{AccessToken, Provider, PushPayload, RefreshToken, TokenGrant},
    ports::{CreatedIssue, ExternalProject, ProviderAdapter, ProviderError, ProviderResult},
};

/// Call observed by a [`ScriptedProviderAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    /// `create_issue`
    Create {
        /// Issue title.
        title: String,
        /// Target project or team.
        project: String,
        /// External identifier of the parent issue.
        parent: Option<String>,
        /// Access token the call was made with.
        token: String,
    },
    /// `update_issue`
    Update {
        /// Updated issue.
        external_id: String,
        /// Issue title.
        title: String,
        /// Access token the call was made with.
        token: String,
    },
    /// `refresh_token`
    Refresh,
    /// `list_projects` or `list_teams`
    List {
        /// `projects` or `teams`.
        collection: String,
        /// Access token the call was made with.
        token: String,
    },
}

#[derive(Debug, Default)]
struct Script {
    queued: HashMap<String, VecDeque<ProviderError>>,
    always: HashMap<String, ProviderError>,
    expired_tokens: HashSet<String>,
    refresh: Option<Result<TokenGrant, ProviderError>>,
    projects: Vec<ExternalProject>,
    teams: Vec<ExternalProject>,
    listing_failures: VecDeque<ProviderError>,
    calls: Vec<ProviderCall>,
    issued: u64,
}

impl Script {
    fn outcome_for(&mut self, title: &str, token: &AccessToken) -> ProviderResult<()> {
        if self.expired_tokens.contains(token.expose()) {
            return Err(ProviderError::TokenExpired("token rejected".to_owned()));
        }
        if let Some(err) = self.queued.get_mut(title).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        self.always.get(title).map_or(Ok(()), |err| Err(err.clone()))
    }

    fn listing(
        &mut self,
        collection: &str,
        token: &AccessToken,
    ) -> ProviderResult<Vec<ExternalProject>> {
        self.calls.push(ProviderCall::List {
            collection: collection.to_owned(),
            token: token.expose().to_owned(),
        });
        if self.expired_tokens.contains(token.expose()) {
            return Err(ProviderError::TokenExpired("token rejected".to_owned()));
        }
        if let Some(err) = self.listing_failures.pop_front() {
            return Err(err);
        }
        Ok(if collection == "teams" {
            self.teams.clone()
        } else {
            self.projects.clone()
        })
    }
}

/// Provider adapter that answers from a script instead of a tracker.
///
/// Failures are keyed by issue title. Queued failures are consumed one per
/// call; permanent failures apply to every call. Project and team listings
/// share one failure queue. Successful creates hand out sequential keys
/// such as `PLAN-1`.
#[derive(Debug, Clone)]
pub struct ScriptedProviderAdapter {
    provider: Provider,
    script: Arc<Mutex<Script>>,
}

impl ScriptedProviderAdapter {
    /// Creates an adapter that succeeds on every call.
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    /// Queues failures for the next calls on issues titled `title`.
    pub fn fail_next(&self, title: &str, errors: impl IntoIterator<Item = ProviderError>) {
        if let Ok(mut script) = self.lock() {
            script
                .queued
                .entry(title.to_owned())
                .or_default()
                .extend(errors);
        }
    }

    /// Makes every call on issues titled `title` fail with `error`.
    pub fn fail_always(&self, title: &str, error: ProviderError) {
        if let Ok(mut script) = self.lock() {
            script.always.insert(title.to_owned(), error);
        }
    }

    /// Makes every call made with `token` fail with
    /// [`ProviderError::TokenExpired`].
    pub fn expire_token(&self, token: &str) {
        if let Ok(mut script) = self.lock() {
            script.expired_tokens.insert(token.to_owned());
        }
    }

    /// Sets the answer of the refresh endpoint.
    pub fn set_refresh(&self, outcome: Result<TokenGrant, ProviderError>) {
        if let Ok(mut script) = self.lock() {
            script.refresh = Some(outcome);
        }
    }

    /// Sets the projects returned by `list_projects`.
    pub fn set_projects(&self, projects: Vec<ExternalProject>) {
        if let Ok(mut script) = self.lock() {
            script.projects = projects;
        }
    }

    /// Sets the teams returned by `list_teams`.
    pub fn set_teams(&self, teams: Vec<ExternalProject>) {
        if let Ok(mut script) = self.lock() {
            script.teams = teams;
        }
    }

    /// Queues failures for the next project or team listings.
    pub fn fail_listing(&self, errors: impl IntoIterator<Item = ProviderError>) {
        if let Ok(mut script) = self.lock() {
            script.listing_failures.extend(errors);
        }
    }

    /// Returns the number of project and team listings made so far.
    #[must_use]
    pub fn list_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ProviderCall::List { .. }))
            .count()
    }

    /// Returns every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.lock()
            .map(|script| script.calls.clone())
            .unwrap_or_default()
    }

    /// Returns the number of create and update calls made so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    ProviderCall::Create { .. } | ProviderCall::Update { .. }
                )
            })
            .count()
    }

    fn lock(&self) -> ProviderResult<MutexGuard<'_, Script>> {
        self.script
            .lock()
            .map_err(|err| ProviderError::Unexpected(err.to_string()))
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProviderAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn create_issue(
        &self,
        token: &AccessToken,
        project: &str,
        payload: &PushPayload,
    ) -> ProviderResult<CreatedIssue> {
        let mut script = self.lock()?;
        let title = payload.content.title().to_owned();
        script.calls.push(ProviderCall::Create {
            title: title.clone(),
            project: project.to_owned(),
            parent: payload.parent.as_ref().map(|link| link.external_id.clone()),
            token: token.expose().to_owned(),
        });
        script.outcome_for(&title, token)?;
        script.issued = script.issued.saturating_add(1);
        let key = format!("PLAN-{}", script.issued);
        Ok(CreatedIssue {
            external_id: format!("{}-{}", self.provider, script.issued),
            url: Some(format!("https://tracker.test/browse/{key}")),
            external_key: Some(key),
        })
    }

    async fn update_issue(
        &self,
        token: &AccessToken,
        external_id: &str,
        payload: &PushPayload,
    ) -> ProviderResult<Option<String>> {
        let mut script = self.lock()?;
        let title = payload.content.title().to_owned();
        script.calls.push(ProviderCall::Update {
            external_id: external_id.to_owned(),
            title: title.clone(),
            token: token.expose().to_owned(),
        });
        script.outcome_for(&title, token)?;
        Ok(None)
    }

    async fn list_projects(&self, token: &AccessToken) -> ProviderResult<Vec<ExternalProject>> {
        self.lock()?.listing("projects", token)
    }

    async fn list_teams(&self, token: &AccessToken) -> ProviderResult<Vec<ExternalProject>> {
        self.lock()?.listing("teams", token)
    }

    async fn refresh_token(&self, _refresh_token: &RefreshToken) -> ProviderResult<TokenGrant> {
        let mut script = self.lock()?;
        script.calls.push(ProviderCall::Refresh);
        script.refresh.clone().unwrap_or_else(|| {
            Err(ProviderError::Auth("no refresh grant scripted".to_owned()))
        })
    }
}
