//! Jira Cloud REST v3 adapter.

use super::http::{OAuthClientConfig, authorised, send_checked, send_json};
use crate::sync::{
    domain::{AccessToken, Provider, PushPayload, RefreshToken, TokenGrant},
    ports::{
        CreatedIssue, ExternalProject, HttpMethod, HttpTransport, ProviderAdapter, ProviderResult,
    },
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Jira site configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraConfig {
    /// API base, such as `https://api.atlassian.com/ex/jira/<cloud-id>`.
    pub base_url: String,
    /// Browser base used to build issue links, such as
    /// `https://example.atlassian.net`.
    pub site_url: String,
    /// OAuth client used for token refresh.
    pub oauth: OAuthClientConfig,
}

/// Jira issue adapter.
#[derive(Clone)]
pub struct JiraAdapter {
    config: JiraConfig,
    transport: Arc<dyn HttpTransport>,
}

impl JiraAdapter {
    /// Creates an adapter.
    #[must_use]
    pub fn new(config: JiraConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/rest/api/3/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{key}", self.config.site_url.trim_end_matches('/'))
    }
}

/// Renders plain text as an Atlassian Document Format document, one
/// paragraph per blank-line separated block.
fn adf_document(text: &str) -> Value {
    let paragraphs: Vec<Value> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| json!({ "type": "paragraph", "content": [{ "type": "text", "text": block }] }))
        .collect();
    json!({ "type": "doc", "version": 1, "content": paragraphs })
}

fn issue_fields(payload: &PushPayload) -> Map<String, Value> {
    let content = &payload.content;
    let mut fields = Map::new();
    fields.insert("summary".to_owned(), json!(content.title()));
    let body = content.body();
    if !body.is_empty() {
        fields.insert("description".to_owned(), adf_document(&body));
    }
    fields.insert("labels".to_owned(), json!(jira_labels(content.labels())));
    fields
}

/// Jira labels cannot contain spaces.
fn jira_labels(labels: &[String]) -> Vec<String> {
    labels.iter().map(|label| label.replace(' ', "-")).collect()
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct ProjectPage {
    values: Vec<ProjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    id: String,
    key: String,
    name: String,
}

#[async_trait]
impl ProviderAdapter for JiraAdapter {
    fn provider(&self) -> Provider {
        Provider::Jira
    }

    async fn create_issue(
        &self,
        token: &AccessToken,
        project: &str,
        payload: &PushPayload,
    ) -> ProviderResult<CreatedIssue> {
        let mut fields = issue_fields(payload);
        fields.insert("project".to_owned(), json!({ "key": project }));
        fields.insert(
            "issuetype".to_owned(),
            json!({ "name": payload.content.issue_type() }),
        );
        if let Some(parent) = &payload.parent {
            let reference = parent.external_key.as_ref().unwrap_or(&parent.external_id);
            fields.insert("parent".to_owned(), json!({ "key": reference }));
        }
        let request = authorised(HttpMethod::Post, self.api("issue"), token)
            .json(json!({ "fields": fields }));
        let created: CreatedResponse = send_json(self.transport.as_ref(), request).await?;
        Ok(CreatedIssue {
            url: Some(self.browse_url(&created.key)),
            external_id: created.id,
            external_key: Some(created.key),
        })
    }

    async fn update_issue(
        &self,
        token: &AccessToken,
        external_id: &str,
        payload: &PushPayload,
    ) -> ProviderResult<Option<String>> {
        let request = authorised(
            HttpMethod::Put,
            self.api(&format!("issue/{external_id}")),
            token,
        )
        .json(json!({ "fields": issue_fields(payload) }));
        send_checked(self.transport.as_ref(), request).await?;
        Ok(None)
    }

    async fn list_projects(&self, token: &AccessToken) -> ProviderResult<Vec<ExternalProject>> {
        let request = authorised(HttpMethod::Get, self.api("project/search"), token);
        let page: ProjectPage = send_json(self.transport.as_ref(), request).await?;
        Ok(page
            .values
            .into_iter()
            .map(|entry| ExternalProject {
                id: entry.id,
                key: Some(entry.key),
                name: entry.name,
            })
            .collect())
    }

    async fn refresh_token(&self, refresh_token: &RefreshToken) -> ProviderResult<TokenGrant> {
        self.config
            .oauth
            .refresh(self.transport.as_ref(), refresh_token)
            .await
    }
}
