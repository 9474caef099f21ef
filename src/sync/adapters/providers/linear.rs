//! Linear GraphQL adapter.
//!
//! Linear answers GraphQL failures with HTTP 200 and an `errors` array, so
//! error codes are mapped from the response body as well as the status.

use super::http::{OAuthClientConfig, authorised, decode, send_checked};
use crate::sync::{
    domain::{AccessToken, Provider, PushPayload, RefreshToken, TokenGrant},
    ports::{
        CreatedIssue, ExternalProject, HttpMethod, HttpTransport, ProviderAdapter, ProviderError,
        ProviderResult,
    },
};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

/// Public GraphQL endpoint.
pub const LINEAR_GRAPHQL_URL: &str = "https://api.linear.app/graphql";

const CREATE_ISSUE: &str = "mutation IssueCreate($input: IssueCreateInput!) { \
    issueCreate(input: $input) { success issue { id identifier url } } }";
const UPDATE_ISSUE: &str = "mutation IssueUpdate($id: String!, $input: IssueUpdateInput!) { \
    issueUpdate(id: $id, input: $input) { success issue { id identifier url } } }";
const LIST_PROJECTS: &str = "query { projects(first: 100) { nodes { id name } } }";
const LIST_TEAMS: &str = "query { teams(first: 100) { nodes { id key name } } }";

/// Linear endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConfig {
    /// GraphQL endpoint, normally [`LINEAR_GRAPHQL_URL`].
    pub graphql_url: String,
    /// OAuth client used for token refresh.
    pub oauth: OAuthClientConfig,
}

impl LinearConfig {
    /// Creates a configuration for the public endpoint.
    #[must_use]
    pub fn new(oauth: OAuthClientConfig) -> Self {
        Self {
            graphql_url: LINEAR_GRAPHQL_URL.to_owned(),
            oauth,
        }
    }
}

/// Linear issue adapter. Issues are filed under a team.
#[derive(Clone)]
pub struct LinearAdapter {
    config: LinearConfig,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<GraphQlExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphQlExtensions {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateData {
    issue_create: MutationResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateData {
    issue_update: MutationResult,
}

#[derive(Debug, Deserialize)]
struct MutationResult {
    success: bool,
    issue: Option<IssueNode>,
}

#[derive(Debug, Deserialize)]
struct IssueNode {
    id: String,
    identifier: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ProjectsData {
    projects: Connection<NamedNode>,
}

#[derive(Debug, Deserialize)]
struct TeamsData {
    teams: Connection<NamedNode>,
}

#[derive(Debug, Deserialize)]
struct NamedNode {
    id: String,
    key: Option<String>,
    name: String,
}

fn graphql_error(error: GraphQlError) -> ProviderError {
    let code = error
        .extensions
        .and_then(|extensions| extensions.code)
        .unwrap_or_default();
    match code.as_str() {
        "AUTHENTICATION_ERROR" => ProviderError::TokenExpired(error.message),
        "FORBIDDEN" => ProviderError::Permission(error.message),
        "RATELIMITED" => ProviderError::RateLimited(error.message),
        "INTERNAL_SERVER_ERROR" => ProviderError::Server {
            status: 500,
            message: error.message,
        },
        _ => ProviderError::Validation {
            status: 0,
            message: error.message,
        },
    }
}

fn issue_input(payload: &PushPayload) -> serde_json::Map<String, Value> {
    let mut input = serde_json::Map::new();
    input.insert("title".to_owned(), json!(payload.content.title()));
    input.insert("description".to_owned(), json!(payload.content.body()));
    input
}

fn completed(result: MutationResult, operation: &str) -> ProviderResult<IssueNode> {
    match (result.success, result.issue) {
        (true, Some(issue)) => Ok(issue),
        _ => Err(ProviderError::Unexpected(format!(
            "{operation} reported no issue"
        ))),
    }
}

impl LinearAdapter {
    /// Creates an adapter.
    #[must_use]
    pub fn new(config: LinearConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    async fn execute<T: DeserializeOwned + Send>(
        &self,
        token: &AccessToken,
        query: &str,
        variables: Value,
    ) -> ProviderResult<T> {
        let request = authorised(HttpMethod::Post, self.config.graphql_url.as_str(), token)
            .json(json!({ "query": query, "variables": variables }));
        let response = send_checked(self.transport.as_ref(), request).await?;
        let envelope: GraphQlResponse<T> = decode(&response)?;
        if let Some(first) = envelope.errors.into_iter().next() {
            return Err(graphql_error(first));
        }
        envelope
            .data
            .ok_or_else(|| ProviderError::Unexpected("GraphQL response without data".to_owned()))
    }
}

#[async_trait]
impl ProviderAdapter for LinearAdapter {
    fn provider(&self) -> Provider {
        Provider::Linear
    }

    async fn create_issue(
        &self,
        token: &AccessToken,
        project: &str,
        payload: &PushPayload,
    ) -> ProviderResult<CreatedIssue> {
        let mut input = issue_input(payload);
        input.insert("teamId".to_owned(), json!(project));
        if let Some(parent) = &payload.parent {
            input.insert("parentId".to_owned(), json!(parent.external_id));
        }
        let data: CreateData = self
            .execute(token, CREATE_ISSUE, json!({ "input": input }))
            .await?;
        let issue = completed(data.issue_create, "issueCreate")?;
        Ok(CreatedIssue {
            external_id: issue.id,
            external_key: issue.identifier,
            url: issue.url,
        })
    }

    async fn update_issue(
        &self,
        token: &AccessToken,
        external_id: &str,
        payload: &PushPayload,
    ) -> ProviderResult<Option<String>> {
        let variables = json!({ "id": external_id, "input": issue_input(payload) });
        let data: UpdateData = self.execute(token, UPDATE_ISSUE, variables).await?;
        Ok(completed(data.issue_update, "issueUpdate")?.url)
    }

    async fn list_projects(&self, token: &AccessToken) -> ProviderResult<Vec<ExternalProject>> {
        let data: ProjectsData = self.execute(token, LIST_PROJECTS, json!({})).await?;
        Ok(data.projects.nodes.into_iter().map(into_project).collect())
    }

    async fn list_teams(&self, token: &AccessToken) -> ProviderResult<Vec<ExternalProject>> {
        let data: TeamsData = self.execute(token, LIST_TEAMS, json!({})).await?;
        Ok(data.teams.nodes.into_iter().map(into_project).collect())
    }

    async fn refresh_token(&self, refresh_token: &RefreshToken) -> ProviderResult<TokenGrant> {
        self.config
            .oauth
            .refresh(self.transport.as_ref(), refresh_token)
            .await
    }
}

fn into_project(node: NamedNode) -> ExternalProject {
    ExternalProject {
        id: node.id,
        key: node.key,
        name: node.name,
    }
}
